//! Placement planning: which tabs to move, and in what order.

use tabtidy_world::TabId;

use crate::run::Tab;

/// One planned tab move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Move {
    /// Tab to move.
    pub(crate) tab: TabId,
    /// Target window index.
    pub(crate) to: usize,
    /// Distance between the tab's current and target index.
    pub(crate) displacement: usize,
}

/// Plan moves for `ordered` tabs, whose target indices start at `offset`
/// (the count of pinned tabs excluded from reorganization).
///
/// Tabs already in place are skipped. The result is sorted by descending
/// displacement: applying the farthest moves first tends to shift trailing
/// tabs into their slots as a side effect, so many of the smaller moves are
/// no-ops by the time the host executes them.
pub(crate) fn plan_moves(ordered: &[&Tab], offset: usize) -> Vec<Move> {
    let mut moves: Vec<Move> = ordered
        .iter()
        .enumerate()
        .filter_map(|(at, tab)| {
            let to = offset + at;
            let displacement = tab.index.abs_diff(to);
            (displacement > 0).then_some(Move {
                tab: tab.id,
                to,
                displacement,
            })
        })
        .collect();
    moves.sort_by(|a, b| b.displacement.cmp(&a.displacement));
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabtidy_world::GroupId;

    fn tab(id: TabId, index: usize) -> Tab {
        Tab {
            id,
            index,
            group: GroupId::NONE,
            key: None,
        }
    }

    #[test]
    fn in_place_tabs_are_skipped() {
        let tabs = [tab(1, 0), tab(2, 1), tab(3, 2)];
        let ordered: Vec<&Tab> = tabs.iter().collect();
        assert!(plan_moves(&ordered, 0).is_empty());
    }

    #[test]
    fn farthest_displacement_first() {
        // Target order: 1, 2, 3 at indices 0..3; currently 3, 1, 2.
        let tabs = [tab(1, 1), tab(2, 2), tab(3, 0)];
        let ordered: Vec<&Tab> = tabs.iter().collect();
        let moves = plan_moves(&ordered, 0);
        assert_eq!(moves.len(), 3);
        assert_eq!(moves[0].tab, 3);
        assert_eq!(moves[0].displacement, 2);
        assert_eq!(moves[0].to, 2);
    }

    #[test]
    fn pinned_offset_shifts_targets() {
        let tabs = [tab(1, 2), tab(2, 3)];
        let ordered: Vec<&Tab> = tabs.iter().collect();
        // Two pinned tabs ahead: targets are 2 and 3, so nothing moves.
        assert!(plan_moves(&ordered, 2).is_empty());
        // No pinned tabs: both shift down.
        let moves = plan_moves(&ordered, 0);
        assert_eq!(moves.len(), 2);
        assert!(moves[0].displacement >= moves[1].displacement);
    }
}
