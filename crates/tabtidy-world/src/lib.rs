//! tabtidy-world: browser state types and the host operation seam.
//!
//! This crate defines everything the organizing engine knows about a browser:
//! - snapshot records for tabs and tab groups ([`TabInfo`], [`TabGroupInfo`])
//! - the host event vocabulary ([`TabEvent`])
//! - the [`TabOps`] trait, the single seam a host embedding the engine
//!   implements
//!
//! A scripted in-memory host ([`TestTabs`]) is available behind the
//! `test-utils` feature for tests and smoketests.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod error;
#[cfg(any(test, feature = "test-utils"))]
mod test_support;

pub use error::{Error, Result};
#[cfg(any(test, feature = "test-utils"))]
pub use test_support::{Op, OpKind, TestTabs};

/// Stable identifier for a tab, assigned by the host.
pub type TabId = i64;

/// Stable identifier for a browser window, assigned by the host.
pub type WindowId = i64;

/// Identifier for a physical tab group.
///
/// Hosts report `-1` for tabs that belong to no group; that sentinel is a
/// first-class value here ([`GroupId::NONE`]) so callers never compare raw
/// integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(i64);

impl GroupId {
    /// The "not in any group" sentinel.
    pub const NONE: Self = Self(-1);

    /// Wrap a raw host group id.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw host id.
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// True for the ungrouped sentinel.
    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Color of a physical tab group, using the host's fixed palette.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum GroupColor {
    Grey,
    Blue,
    Red,
    Yellow,
    Green,
    Pink,
    Purple,
    Cyan,
    Orange,
}

impl GroupColor {
    /// Host-facing lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grey => "grey",
            Self::Blue => "blue",
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Pink => "pink",
            Self::Purple => "purple",
            Self::Cyan => "cyan",
            Self::Orange => "orange",
        }
    }
}

impl fmt::Display for GroupColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a single tab as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabInfo {
    /// Host tab id.
    pub id: TabId,
    /// Window the tab lives in.
    pub window: WindowId,
    /// Current position within the window, pinned tabs included.
    pub index: usize,
    /// Physical group membership ([`GroupId::NONE`] when ungrouped).
    pub group: GroupId,
    /// The tab's current locator.
    pub url: String,
    /// Whether the tab is pinned.
    pub pinned: bool,
}

/// Snapshot of a physical tab group as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabGroupInfo {
    /// Host group id.
    pub id: GroupId,
    /// Window the group lives in.
    pub window: WindowId,
    /// Current title.
    pub title: String,
    /// Current color.
    pub color: GroupColor,
    /// Whether the group is currently collapsed.
    pub collapsed: bool,
}

/// Partial update applied to a physical group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupDelta {
    /// New title, if changing.
    pub title: Option<String>,
    /// New color, if changing.
    pub color: Option<GroupColor>,
    /// New collapsed state, if changing.
    pub collapsed: Option<bool>,
}

/// What changed on an updated tab.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TabChange {
    /// The tab's locator changed.
    Url,
    /// The tab finished loading (its locator may have settled).
    Status,
}

/// Host events the engine reacts to.
///
/// Debounce/coalescing policy is the host's business; the engine treats each
/// delivered event as a trigger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TabEvent {
    /// A tab was created.
    Created {
        /// Window the tab was created in.
        window: WindowId,
        /// The new tab.
        tab: TabId,
    },
    /// A tab changed.
    Updated {
        /// Window the tab lives in.
        window: WindowId,
        /// The changed tab.
        tab: TabId,
        /// What changed.
        change: TabChange,
    },
    /// A tab went away.
    Removed {
        /// Window the tab lived in.
        window: WindowId,
        /// The removed tab.
        tab: TabId,
        /// True when the whole window is closing.
        window_closing: bool,
    },
    /// A tab became the active tab of its window.
    Activated {
        /// Window the tab lives in.
        window: WindowId,
        /// The activated tab.
        tab: TabId,
    },
    /// The persisted options changed.
    ConfigChanged,
}

/// Operations the engine performs against the browser.
///
/// Implementations must be safe to call concurrently from independent
/// windows' runs. Every method is fallible: a host may reject an operation
/// at any time (a user drag in progress, a group dissolved between snapshot
/// and mutation), and callers are expected to downgrade rather than retry.
#[async_trait]
pub trait TabOps: Send + Sync {
    /// Enumerate tabs in `window`. `pinned` filters by pinned state when
    /// set; `None` returns every tab.
    async fn list_tabs(&self, window: WindowId, pinned: Option<bool>) -> Result<Vec<TabInfo>>;

    /// Move a tab to `index` within its window.
    async fn move_tab(&self, tab: TabId, index: usize) -> Result<()>;

    /// Look up a single group. Returns [`Error::GroupNotFound`] when the
    /// group no longer exists.
    async fn get_group(&self, group: GroupId) -> Result<TabGroupInfo>;

    /// Enumerate the physical groups of `window`.
    async fn query_groups(&self, window: WindowId) -> Result<Vec<TabGroupInfo>>;

    /// Create a new group in `window` containing `tabs`, returning its id.
    async fn create_group(&self, window: WindowId, tabs: &[TabId]) -> Result<GroupId>;

    /// Move `tabs` into an existing group.
    async fn add_to_group(&self, tabs: &[TabId], group: GroupId) -> Result<()>;

    /// Apply a partial update to a group.
    async fn update_group(&self, group: GroupId, delta: GroupDelta) -> Result<()>;

    /// Remove `tabs` from whatever groups they are in.
    async fn ungroup(&self, tabs: &[TabId]) -> Result<()>;
}
