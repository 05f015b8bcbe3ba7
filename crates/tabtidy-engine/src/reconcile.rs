//! Converging physical tab groups to the computed logical groups.
//!
//! Reconciliation is two-phased: first every planned group's current
//! physical state is inspected (reads are sequenced because the retarget
//! decision depends on group titles), producing a minimal operation set;
//! then the set is applied, with independent ungroups fired as one batch
//! and everything else in order. A converged window produces no operations
//! at all.

use config::ColorRule;
use futures::future::join_all;
use tabtidy_world::{
    Error as WorldError, GroupColor, GroupDelta, GroupId, TabId, TabOps, WindowId,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::run::RunPlan;

/// One reconciliation operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum GroupOp {
    /// Create a fresh physical group around `tabs` and title/color it.
    Create {
        /// Desired title.
        name: String,
        /// Resolved color, when a rule matched.
        color: Option<GroupColor>,
        /// Full member list.
        tabs: Vec<TabId>,
    },
    /// Fold stray members into an existing, correctly-titled group.
    Retarget {
        /// Destination group.
        group: GroupId,
        /// Members not yet in the destination.
        add: Vec<TabId>,
        /// Full member list, used when the destination vanished and the
        /// retarget degrades to a create.
        all: Vec<TabId>,
        /// Desired title (for the degraded create).
        name: String,
        /// Resolved color.
        color: Option<GroupColor>,
    },
    /// Update an existing group's color.
    Recolor {
        /// Group to recolor.
        group: GroupId,
        /// New color.
        color: GroupColor,
    },
    /// Take tabs out of whatever groups they are in.
    Ungroup {
        /// Tabs to release.
        tabs: Vec<TabId>,
    },
}

/// Resolve a group name against the configured color rules.
///
/// The prefix is grown label by label, so a rule for `"google"` matches the
/// group `"google maps"` but not `"googleplex"`; the longest matching
/// prefix wins.
pub(crate) fn resolve_color(name: &str, rules: &[ColorRule]) -> Option<GroupColor> {
    let mut resolved = None;
    let mut prefix = String::new();
    for (at, label) in name.split(' ').enumerate() {
        if at > 0 {
            prefix.push(' ');
        }
        prefix.push_str(label);
        if let Some(rule) = rules.iter().find(|r| r.prefix == prefix) {
            resolved = Some(rule.color);
        }
    }
    resolved
}

/// Inspect the current physical state and compute the minimal operation
/// set converging it to `plan`.
pub(crate) async fn plan_group_ops(
    tabs: &dyn TabOps,
    plan: &RunPlan,
    rules: &[ColorRule],
) -> Vec<GroupOp> {
    let mut ops = Vec::new();

    for group in &plan.groups {
        let resolved = resolve_color(&group.name, rules);
        let all: Vec<TabId> = group.members.iter().map(|(id, _)| *id).collect();

        // Distinct pre-run group ids, sorted for deterministic reads.
        let mut distinct: Vec<GroupId> = group.members.iter().map(|(_, gid)| *gid).collect();
        distinct.sort_unstable();
        distinct.dedup();
        let has_ungrouped = distinct.iter().any(|gid| gid.is_none());
        let current: Vec<GroupId> = distinct.into_iter().filter(|gid| !gid.is_none()).collect();

        if current.is_empty() {
            ops.push(GroupOp::Create {
                name: group.name.clone(),
                color: resolved,
                tabs: all,
            });
            continue;
        }

        // Read the candidate groups' titles. A group that vanished since
        // the snapshot counts as a wrong group, never as a target.
        let mut target = None;
        let mut misplaced = has_ungrouped;
        for gid in current {
            match tabs.get_group(gid).await {
                Ok(found) if found.title == group.name && target.is_none() => {
                    target = Some(found);
                }
                Ok(_) => misplaced = true,
                Err(WorldError::GroupNotFound(_)) => {
                    debug!("group {} vanished since snapshot; treating as absent", gid);
                    misplaced = true;
                }
                Err(e) => {
                    warn!("group {} lookup failed: {}; treating as absent", gid, e);
                    misplaced = true;
                }
            }
        }

        match target {
            Some(found) => {
                if misplaced {
                    let add: Vec<TabId> = group
                        .members
                        .iter()
                        .filter(|(_, gid)| *gid != found.id)
                        .map(|(id, _)| *id)
                        .collect();
                    ops.push(GroupOp::Retarget {
                        group: found.id,
                        add,
                        all,
                        name: group.name.clone(),
                        color: resolved,
                    });
                }
                if let Some(color) = resolved
                    && color != found.color
                {
                    ops.push(GroupOp::Recolor {
                        group: found.id,
                        color,
                    });
                }
            }
            None => ops.push(GroupOp::Create {
                name: group.name.clone(),
                color: resolved,
                tabs: all,
            }),
        }
    }

    // Tabs that must stay ungrouped: release any that sit in a group.
    let strays: Vec<TabId> = plan
        .loose
        .iter()
        .filter(|(_, gid)| !gid.is_none())
        .map(|(id, _)| *id)
        .collect();
    if !strays.is_empty() {
        ops.push(GroupOp::Ungroup { tabs: strays });
    }

    ops
}

/// Apply an operation set, abandoning the remainder when `cancel` fires.
///
/// Individual failures are logged and skipped; the next triggering event
/// re-converges whatever is left over. Returns the number of operations
/// that took effect.
pub(crate) async fn apply_group_ops(
    tabs: &dyn TabOps,
    window: WindowId,
    ops: Vec<GroupOp>,
    cancel: &CancellationToken,
) -> usize {
    let mut applied = 0;
    let mut batches = Vec::new();
    let mut rest = Vec::new();
    for op in ops {
        match op {
            GroupOp::Ungroup { tabs: ids } => batches.push(ids),
            other => rest.push(other),
        }
    }

    // Ungroups touch disjoint tabs and depend on nothing else; batch them.
    if !batches.is_empty() && !cancel.is_cancelled() {
        let results = join_all(batches.iter().map(|ids| tabs.ungroup(ids))).await;
        for result in results {
            match result {
                Ok(()) => applied += 1,
                Err(e) => warn!("ungroup failed: {}", e),
            }
        }
    }

    for op in rest {
        if cancel.is_cancelled() {
            debug!("organizing run superseded; abandoning remaining group ops");
            break;
        }
        match op {
            GroupOp::Create {
                name,
                color,
                tabs: ids,
            } => applied += create_group(tabs, window, &name, color, &ids).await,
            GroupOp::Retarget {
                group,
                add,
                all,
                name,
                color,
            } => match tabs.add_to_group(&add, group).await {
                Ok(()) => applied += 1,
                Err(WorldError::GroupNotFound(_)) => {
                    debug!("retarget group {} vanished; creating {:?} anew", group, name);
                    applied += create_group(tabs, window, &name, color, &all).await;
                }
                Err(e) => warn!("retarget into group {} failed: {}", group, e),
            },
            GroupOp::Recolor { group, color } => {
                let delta = GroupDelta {
                    color: Some(color),
                    ..GroupDelta::default()
                };
                match tabs.update_group(group, delta).await {
                    Ok(()) => applied += 1,
                    Err(e) => warn!("recolor of group {} failed: {}", group, e),
                }
            }
            GroupOp::Ungroup { tabs: ids } => match tabs.ungroup(&ids).await {
                Ok(()) => applied += 1,
                Err(e) => warn!("ungroup failed: {}", e),
            },
        }
    }
    applied
}

/// Create, title, and color a group; failures are logged, not propagated.
async fn create_group(
    tabs: &dyn TabOps,
    window: WindowId,
    name: &str,
    color: Option<GroupColor>,
    ids: &[TabId],
) -> usize {
    match tabs.create_group(window, ids).await {
        Ok(gid) => {
            let delta = GroupDelta {
                title: Some(name.to_string()),
                color,
                collapsed: None,
            };
            if let Err(e) = tabs.update_group(gid, delta).await {
                warn!("titling new group {:?} failed: {}", name, e);
            }
            1
        }
        Err(e) => {
            warn!("creating group {:?} failed: {}", name, e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Vec<ColorRule> {
        vec![
            ColorRule {
                prefix: "google".to_string(),
                color: GroupColor::Blue,
            },
            ColorRule {
                prefix: "google maps".to_string(),
                color: GroupColor::Green,
            },
        ]
    }

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(
            resolve_color("google maps", &rules()),
            Some(GroupColor::Green)
        );
        assert_eq!(
            resolve_color("google search", &rules()),
            Some(GroupColor::Blue)
        );
        assert_eq!(resolve_color("google", &rules()), Some(GroupColor::Blue));
    }

    #[test]
    fn prefixes_match_whole_labels_only() {
        assert_eq!(resolve_color("googleplex", &rules()), None);
        assert_eq!(resolve_color("google mapsforge", &rules()), Some(GroupColor::Blue));
    }

    #[test]
    fn no_rule_resolves_to_nothing() {
        assert_eq!(resolve_color("example", &rules()), None);
        assert_eq!(resolve_color("", &rules()), None);
    }
}
