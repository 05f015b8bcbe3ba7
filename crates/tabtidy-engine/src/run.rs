//! Per-run planning: an immutable tab snapshot in, a move plan and group
//! plan out.
//!
//! Everything here is pure and synchronous; the [`crate::Organizer`] applies
//! the resulting plan against the host afterwards. A fresh set of values is
//! built for every run and discarded with it.

use std::cmp::Ordering;

use config::Settings;
use tabtidy_world::{GroupId, TabId, TabInfo};

use crate::{
    error::Result,
    key::{KeyExtractor, KeyOrder, SortKey},
    plan::{Move, plan_moves},
    tree::build_groups,
};

/// Per-run view of one tab.
#[derive(Clone, Debug)]
pub(crate) struct Tab {
    /// Host tab id.
    pub(crate) id: TabId,
    /// Pre-run position within the window.
    pub(crate) index: usize,
    /// Pre-run physical group membership.
    pub(crate) group: GroupId,
    /// Comparison key; `None` routes the tab to the unknown bucket.
    pub(crate) key: Option<SortKey>,
}

/// A logical group destined for a physical group.
#[derive(Clone, Debug)]
pub(crate) struct PlannedGroup {
    /// Desired physical title.
    pub(crate) name: String,
    /// Members in target visual order, with their pre-run group ids.
    pub(crate) members: Vec<(TabId, GroupId)>,
}

/// Everything one organizing run intends to do.
#[derive(Clone, Debug, Default)]
pub(crate) struct RunPlan {
    /// Tab moves, farthest displacement first.
    pub(crate) moves: Vec<Move>,
    /// Named groups to converge, in visual order.
    pub(crate) groups: Vec<PlannedGroup>,
    /// Tabs that must end up physically ungrouped (unknown bucket plus
    /// below-threshold leftovers), with their pre-run group ids.
    pub(crate) loose: Vec<(TabId, GroupId)>,
}

/// An ordered slice of the final arrangement: either a bucket of tabs under
/// one name, or a lone ungrouped tab keyed by its own label path.
enum Unit {
    Bucket { name: String, tabs: Vec<usize> },
    Single { name: String, tab: usize },
}

impl Unit {
    fn name(&self) -> &str {
        match self {
            Self::Bucket { name, .. } | Self::Single { name, .. } => name,
        }
    }
}

/// Total order over per-run tabs: key order, then pre-run position.
fn cmp_tabs(order: &KeyOrder, a: &Tab, b: &Tab) -> Ordering {
    match (&a.key, &b.key) {
        (Some(ka), Some(kb)) => order.keys(ka, kb).then(a.index.cmp(&b.index)),
        (None, None) => a.index.cmp(&b.index),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

/// Compute the full plan for one window.
///
/// `snapshot` is the window's unpinned tabs; `pinned` is the count of
/// pinned tabs occupying the leading indices.
pub(crate) fn plan_run(
    snapshot: &[TabInfo],
    pinned: usize,
    settings: &Settings,
    extractor: &KeyExtractor,
) -> Result<RunPlan> {
    let order = KeyOrder::new()?;
    let tabs: Vec<Tab> = snapshot
        .iter()
        .map(|info| Tab {
            id: info.id,
            index: info.index,
            group: info.group,
            key: extractor.extract(&settings.alt_domain_rules, &info.url),
        })
        .collect();

    let mut grouping = build_groups(&tabs, settings.group_threshold as usize);
    for group in &mut grouping.groups {
        group.tabs.sort_by(|a, b| cmp_tabs(&order, &tabs[*a], &tabs[*b]));
    }
    grouping.unknown.sort_by(|a, b| cmp_tabs(&order, &tabs[*a], &tabs[*b]));

    let mut units: Vec<Unit> = Vec::with_capacity(grouping.groups.len() + grouping.leftovers.len() + 1);
    if !grouping.unknown.is_empty() {
        units.push(Unit::Bucket {
            name: String::new(),
            tabs: grouping.unknown,
        });
    }
    for group in grouping.groups {
        units.push(Unit::Bucket {
            name: group.name,
            tabs: group.tabs,
        });
    }
    for at in grouping.leftovers {
        let name = tabs[at]
            .key
            .as_ref()
            .map(SortKey::joined_labels)
            .unwrap_or_default();
        units.push(Unit::Single { name, tab: at });
    }

    // Buckets and singles interleave by name; the unknown bucket's empty
    // name sorts it first. A name tie orders the bucket ahead of a single.
    units.sort_by(|a, b| {
        order.strings(a.name(), b.name()).then_with(|| match (a, b) {
            (Unit::Single { tab: x, .. }, Unit::Single { tab: y, .. }) => {
                cmp_tabs(&order, &tabs[*x], &tabs[*y])
            }
            (Unit::Bucket { .. }, Unit::Single { .. }) => Ordering::Less,
            (Unit::Single { .. }, Unit::Bucket { .. }) => Ordering::Greater,
            (Unit::Bucket { .. }, Unit::Bucket { .. }) => Ordering::Equal,
        })
    });

    let ordered: Vec<&Tab> = units
        .iter()
        .flat_map(|unit| match unit {
            Unit::Bucket { tabs: members, .. } => members.clone(),
            Unit::Single { tab, .. } => vec![*tab],
        })
        .map(|at| &tabs[at])
        .collect();

    let moves = if settings.enable_sort {
        plan_moves(&ordered, pinned)
    } else {
        Vec::new()
    };

    let mut plan = RunPlan {
        moves,
        ..RunPlan::default()
    };
    for unit in units {
        match unit {
            Unit::Bucket { name, tabs: members } if !name.is_empty() => {
                plan.groups.push(PlannedGroup {
                    name,
                    members: members
                        .into_iter()
                        .map(|at| (tabs[at].id, tabs[at].group))
                        .collect(),
                });
            }
            Unit::Bucket { tabs: members, .. } => {
                plan.loose
                    .extend(members.into_iter().map(|at| (tabs[at].id, tabs[at].group)));
            }
            Unit::Single { tab, .. } => plan.loose.push((tabs[tab].id, tabs[tab].group)),
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: TabId, index: usize, url: &str) -> TabInfo {
        TabInfo {
            id,
            window: 1,
            index,
            group: GroupId::NONE,
            url: url.to_string(),
            pinned: false,
        }
    }

    fn plan(snapshot: &[TabInfo], threshold: u32) -> RunPlan {
        let settings = Settings {
            group_threshold: threshold,
            ..Settings::default()
        };
        plan_run(snapshot, 0, &settings, &KeyExtractor::new()).unwrap()
    }

    /// Target visual order implied by the move plan plus in-place tabs.
    fn final_order(snapshot: &[TabInfo], run: &RunPlan) -> Vec<TabId> {
        let mut slots: Vec<Option<TabId>> = vec![None; snapshot.len()];
        for mv in &run.moves {
            slots[mv.to] = Some(mv.tab);
        }
        for tab in snapshot {
            if !run.moves.iter().any(|m| m.tab == tab.id) {
                slots[tab.index] = Some(tab.id);
            }
        }
        slots.into_iter().map(|slot| slot.unwrap()).collect()
    }

    #[test]
    fn unknown_bucket_sorts_first() {
        let snapshot = vec![
            info(1, 0, "https://zebra.com/"),
            info(2, 1, "about:blank"),
            info(3, 2, "https://apple.com/"),
        ];
        let run = plan(&snapshot, 4);
        assert_eq!(final_order(&snapshot, &run), vec![2, 3, 1]);
        // All three stay ungrouped.
        assert!(run.groups.is_empty());
        assert_eq!(run.loose.len(), 3);
    }

    #[test]
    fn groups_and_singles_interleave_by_name() {
        // Four maps tabs form "google maps"; a lone google.com tab and a
        // lone duckduckgo tab stay single.
        let mut snapshot: Vec<TabInfo> = (0..4usize)
            .map(|at| info(at as TabId + 1, at, &format!("https://maps.google.com/{at}")))
            .collect();
        snapshot.push(info(5, 4, "https://google.com/"));
        snapshot.push(info(6, 5, "https://duckduckgo.com/"));
        let run = plan(&snapshot, 4);
        assert_eq!(run.groups.len(), 1);
        assert_eq!(run.groups[0].name, "google maps");
        // duckduckgo < google < "google maps".
        assert_eq!(final_order(&snapshot, &run), vec![6, 5, 1, 2, 3, 4]);
    }

    #[test]
    fn every_tab_gets_exactly_one_target() {
        let snapshot = vec![
            info(1, 0, "https://b.example.com/2"),
            info(2, 1, "https://a.example.com/1"),
            info(3, 2, "chrome://settings"),
            info(4, 3, "https://example.com/"),
            info(5, 4, "https://other.net/"),
        ];
        let run = plan(&snapshot, 3);
        let order = final_order(&snapshot, &run);
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 2, 3, 4, 5]);
        let planned: usize = run.groups.iter().map(|g| g.members.len()).sum::<usize>()
            + run.loose.len();
        assert_eq!(planned, snapshot.len());
    }

    #[test]
    fn sort_disabled_plans_no_moves() {
        let settings = Settings {
            enable_sort: false,
            ..Settings::default()
        };
        let snapshot = vec![
            info(1, 0, "https://zebra.com/"),
            info(2, 1, "https://apple.com/"),
        ];
        let run = plan_run(&snapshot, 0, &settings, &KeyExtractor::new()).unwrap();
        assert!(run.moves.is_empty());
        // Grouping decisions are still made.
        assert_eq!(run.loose.len(), 2);
    }

    #[test]
    fn path_breaks_ties_within_a_group() {
        let snapshot = vec![
            info(1, 0, "https://example.com/z"),
            info(2, 1, "https://example.com/a"),
            info(3, 2, "https://example.com/m"),
            info(4, 3, "https://example.com/b"),
        ];
        let run = plan(&snapshot, 4);
        assert_eq!(final_order(&snapshot, &run), vec![2, 4, 3, 1]);
    }
}
