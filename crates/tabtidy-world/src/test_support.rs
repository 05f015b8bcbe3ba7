//! Scripted in-memory host for tests and smoketests.
//!
//! [`TestTabs`] implements [`TabOps`] over plain maps, mimicking the parts of
//! host behavior the engine depends on: window-relative indices shift when a
//! tab moves, and a physical group dissolves when its last member leaves.
//! Every successful mutation is appended to an operation log so tests can
//! assert on exactly what the engine asked for, and single operations can be
//! primed to fail.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    Error, GroupColor, GroupDelta, GroupId, Result, TabGroupInfo, TabId, TabInfo, TabOps, WindowId,
};

/// A successful mutation recorded by [`TestTabs`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// A tab move.
    Move {
        /// Moved tab.
        tab: TabId,
        /// Requested target index.
        index: usize,
    },
    /// A group creation.
    Create {
        /// Window the group was created in.
        window: WindowId,
        /// Initial members.
        tabs: Vec<TabId>,
    },
    /// Tabs folded into an existing group.
    AddTo {
        /// Destination group.
        group: GroupId,
        /// Moved tabs.
        tabs: Vec<TabId>,
    },
    /// A group update.
    Update {
        /// Updated group.
        group: GroupId,
        /// Applied delta.
        delta: GroupDelta,
    },
    /// Tabs removed from their groups.
    Ungroup {
        /// Ungrouped tabs.
        tabs: Vec<TabId>,
    },
}

/// Operation categories, used to prime failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum OpKind {
    Move,
    Create,
    AddTo,
    Update,
    Ungroup,
}

#[derive(Clone, Debug)]
struct TabRecord {
    window: WindowId,
    group: GroupId,
    url: String,
    pinned: bool,
}

#[derive(Clone, Debug)]
struct GroupRecord {
    window: WindowId,
    title: String,
    color: GroupColor,
    collapsed: bool,
}

#[derive(Default)]
struct State {
    /// Tab ordering per window; position in the vec is the tab's index.
    order: HashMap<WindowId, Vec<TabId>>,
    tabs: HashMap<TabId, TabRecord>,
    groups: HashMap<GroupId, GroupRecord>,
    ops: Vec<Op>,
    /// One-shot failures, consumed by the next operation of a matching kind.
    fail_next: Vec<OpKind>,
    next_tab: TabId,
    next_group: i64,
}

impl State {
    /// Consume a primed failure for `kind`, if any.
    fn take_failure(&mut self, kind: OpKind) -> bool {
        match self.fail_next.iter().position(|k| *k == kind) {
            Some(at) => {
                self.fail_next.remove(at);
                true
            }
            None => false,
        }
    }

    /// Drop groups that no longer have any member tab.
    fn collect_empty_groups(&mut self) {
        let empty: Vec<GroupId> = self
            .groups
            .keys()
            .copied()
            .filter(|gid| !self.tabs.values().any(|t| t.group == *gid))
            .collect();
        for gid in empty {
            self.groups.remove(&gid);
        }
    }
}

/// In-memory [`TabOps`] host.
#[derive(Default)]
pub struct TestTabs {
    state: Mutex<State>,
}

impl TestTabs {
    /// Create an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tab to `window` and return its id.
    pub fn add_tab(&self, window: WindowId, url: &str) -> TabId {
        self.insert_tab(window, url, false)
    }

    /// Append a pinned tab to `window` and return its id.
    pub fn add_pinned_tab(&self, window: WindowId, url: &str) -> TabId {
        self.insert_tab(window, url, true)
    }

    fn insert_tab(&self, window: WindowId, url: &str, pinned: bool) -> TabId {
        let mut st = self.state.lock();
        st.next_tab += 1;
        let id = st.next_tab;
        st.tabs.insert(
            id,
            TabRecord {
                window,
                group: GroupId::NONE,
                url: url.to_string(),
                pinned,
            },
        );
        st.order.entry(window).or_default().push(id);
        id
    }

    /// Remove a tab from the host.
    pub fn remove_tab(&self, tab: TabId) {
        let mut st = self.state.lock();
        if let Some(rec) = st.tabs.remove(&tab) {
            if let Some(order) = st.order.get_mut(&rec.window) {
                order.retain(|t| *t != tab);
            }
            st.collect_empty_groups();
        }
    }

    /// Change a tab's locator in place.
    pub fn set_url(&self, tab: TabId, url: &str) {
        let mut st = self.state.lock();
        if let Some(rec) = st.tabs.get_mut(&tab) {
            rec.url = url.to_string();
        }
    }

    /// Seed a pre-existing physical group around `tabs`, returning its id.
    pub fn seed_group(
        &self,
        window: WindowId,
        title: &str,
        color: GroupColor,
        tabs: &[TabId],
    ) -> GroupId {
        let mut st = self.state.lock();
        st.next_group += 1;
        let gid = GroupId::new(st.next_group);
        st.groups.insert(
            gid,
            GroupRecord {
                window,
                title: title.to_string(),
                color,
                collapsed: false,
            },
        );
        for tab in tabs {
            if let Some(rec) = st.tabs.get_mut(tab) {
                rec.group = gid;
            }
        }
        gid
    }

    /// Delete a group record while members still point at it, mimicking a
    /// group dissolved by the user between snapshot and mutation.
    pub fn dissolve_group(&self, group: GroupId) {
        self.state.lock().groups.remove(&group);
    }

    /// Mark a group collapsed or expanded without logging an op.
    pub fn set_collapsed(&self, group: GroupId, collapsed: bool) {
        let mut st = self.state.lock();
        if let Some(rec) = st.groups.get_mut(&group) {
            rec.collapsed = collapsed;
        }
    }

    /// Prime the next operation of `kind` to fail with [`Error::Rejected`].
    pub fn fail_next(&self, kind: OpKind) {
        self.state.lock().fail_next.push(kind);
    }

    /// Snapshot of the operation log.
    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().ops.clone()
    }

    /// Forget all logged operations.
    pub fn clear_ops(&self) {
        self.state.lock().ops.clear();
    }

    /// Current tab ordering of `window`.
    pub fn tab_order(&self, window: WindowId) -> Vec<TabId> {
        self.state.lock().order.get(&window).cloned().unwrap_or_default()
    }

    /// Current tab locators of `window` in visual order.
    pub fn urls_in_order(&self, window: WindowId) -> Vec<String> {
        let st = self.state.lock();
        st.order
            .get(&window)
            .map(|order| {
                order
                    .iter()
                    .filter_map(|t| st.tabs.get(t).map(|rec| rec.url.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Physical group of a tab.
    pub fn group_of(&self, tab: TabId) -> GroupId {
        self.state
            .lock()
            .tabs
            .get(&tab)
            .map(|rec| rec.group)
            .unwrap_or(GroupId::NONE)
    }

    /// Look up a group by title within a window.
    pub fn group_by_title(&self, window: WindowId, title: &str) -> Option<TabGroupInfo> {
        let st = self.state.lock();
        st.groups
            .iter()
            .find(|(_, rec)| rec.window == window && rec.title == title)
            .map(|(gid, rec)| TabGroupInfo {
                id: *gid,
                window: rec.window,
                title: rec.title.clone(),
                color: rec.color,
                collapsed: rec.collapsed,
            })
    }
}

#[async_trait]
impl TabOps for TestTabs {
    async fn list_tabs(&self, window: WindowId, pinned: Option<bool>) -> Result<Vec<TabInfo>> {
        let st = self.state.lock();
        let order = st
            .order
            .get(&window)
            .ok_or(Error::WindowNotFound(window))?;
        Ok(order
            .iter()
            .enumerate()
            .filter_map(|(index, id)| {
                let rec = st.tabs.get(id)?;
                if pinned.is_some_and(|want| rec.pinned != want) {
                    return None;
                }
                Some(TabInfo {
                    id: *id,
                    window,
                    index,
                    group: rec.group,
                    url: rec.url.clone(),
                    pinned: rec.pinned,
                })
            })
            .collect())
    }

    async fn move_tab(&self, tab: TabId, index: usize) -> Result<()> {
        let mut st = self.state.lock();
        if st.take_failure(OpKind::Move) {
            return Err(Error::Rejected("primed move failure".into()));
        }
        let window = st.tabs.get(&tab).ok_or(Error::TabNotFound(tab))?.window;
        let order = st
            .order
            .get_mut(&window)
            .ok_or(Error::WindowNotFound(window))?;
        let from = order
            .iter()
            .position(|t| *t == tab)
            .ok_or(Error::TabNotFound(tab))?;
        order.remove(from);
        let to = index.min(order.len());
        order.insert(to, tab);
        st.ops.push(Op::Move { tab, index });
        Ok(())
    }

    async fn get_group(&self, group: GroupId) -> Result<TabGroupInfo> {
        let st = self.state.lock();
        let rec = st.groups.get(&group).ok_or(Error::GroupNotFound(group))?;
        Ok(TabGroupInfo {
            id: group,
            window: rec.window,
            title: rec.title.clone(),
            color: rec.color,
            collapsed: rec.collapsed,
        })
    }

    async fn query_groups(&self, window: WindowId) -> Result<Vec<TabGroupInfo>> {
        let st = self.state.lock();
        let mut groups: Vec<TabGroupInfo> = st
            .groups
            .iter()
            .filter(|(_, rec)| rec.window == window)
            .map(|(gid, rec)| TabGroupInfo {
                id: *gid,
                window: rec.window,
                title: rec.title.clone(),
                color: rec.color,
                collapsed: rec.collapsed,
            })
            .collect();
        groups.sort_by_key(|g| g.id);
        Ok(groups)
    }

    async fn create_group(&self, window: WindowId, tabs: &[TabId]) -> Result<GroupId> {
        let mut st = self.state.lock();
        if st.take_failure(OpKind::Create) {
            return Err(Error::Rejected("primed create failure".into()));
        }
        st.next_group += 1;
        let gid = GroupId::new(st.next_group);
        st.groups.insert(
            gid,
            GroupRecord {
                window,
                title: String::new(),
                color: GroupColor::Grey,
                collapsed: false,
            },
        );
        for tab in tabs {
            match st.tabs.get_mut(tab) {
                Some(rec) => rec.group = gid,
                None => return Err(Error::TabNotFound(*tab)),
            }
        }
        st.collect_empty_groups();
        st.ops.push(Op::Create {
            window,
            tabs: tabs.to_vec(),
        });
        Ok(gid)
    }

    async fn add_to_group(&self, tabs: &[TabId], group: GroupId) -> Result<()> {
        let mut st = self.state.lock();
        if st.take_failure(OpKind::AddTo) {
            return Err(Error::Rejected("primed add failure".into()));
        }
        if !st.groups.contains_key(&group) {
            return Err(Error::GroupNotFound(group));
        }
        for tab in tabs {
            match st.tabs.get_mut(tab) {
                Some(rec) => rec.group = group,
                None => return Err(Error::TabNotFound(*tab)),
            }
        }
        st.collect_empty_groups();
        st.ops.push(Op::AddTo {
            group,
            tabs: tabs.to_vec(),
        });
        Ok(())
    }

    async fn update_group(&self, group: GroupId, delta: GroupDelta) -> Result<()> {
        let mut st = self.state.lock();
        if st.take_failure(OpKind::Update) {
            return Err(Error::Rejected("primed update failure".into()));
        }
        let rec = st
            .groups
            .get_mut(&group)
            .ok_or(Error::GroupNotFound(group))?;
        if let Some(title) = &delta.title {
            rec.title = title.clone();
        }
        if let Some(color) = delta.color {
            rec.color = color;
        }
        if let Some(collapsed) = delta.collapsed {
            rec.collapsed = collapsed;
        }
        st.ops.push(Op::Update { group, delta });
        Ok(())
    }

    async fn ungroup(&self, tabs: &[TabId]) -> Result<()> {
        let mut st = self.state.lock();
        if st.take_failure(OpKind::Ungroup) {
            return Err(Error::Rejected("primed ungroup failure".into()));
        }
        for tab in tabs {
            match st.tabs.get_mut(tab) {
                Some(rec) => rec.group = GroupId::NONE,
                None => return Err(Error::TabNotFound(*tab)),
            }
        }
        st.collect_empty_groups();
        st.ops.push(Op::Ungroup {
            tabs: tabs.to_vec(),
        });
        Ok(())
    }
}
