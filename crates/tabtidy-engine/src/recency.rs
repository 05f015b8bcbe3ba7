//! Bounded recency list that drives group auto-collapse.

use std::num::NonZeroUsize;

use lru::LruCache;
use tabtidy_world::GroupId;

/// Most-recently-used list of physical group ids.
///
/// Pure bookkeeping: it knows nothing about group names or colors. Capacity
/// equals the configured auto-collapse limit; touching a new id past
/// capacity evicts the least-recently-touched one.
pub struct RecencyTracker {
    entries: LruCache<GroupId, ()>,
}

impl RecencyTracker {
    /// Create a tracker holding at most `capacity` group ids.
    pub fn new(capacity: u32) -> Self {
        Self {
            entries: LruCache::new(cap(capacity)),
        }
    }

    /// Adjust capacity, evicting least-recent entries when shrinking.
    pub fn resize(&mut self, capacity: u32) {
        self.entries.resize(cap(capacity));
    }

    /// Record that `group` was just used. The "no group" sentinel is
    /// ignored.
    pub fn touch(&mut self, group: GroupId) {
        if group.is_none() {
            return;
        }
        self.entries.put(group, ());
    }

    /// True when `group` has fallen out of the recency list. Does not
    /// promote the entry.
    pub fn should_collapse(&self, group: GroupId) -> bool {
        !self.entries.contains(&group)
    }
}

fn cap(capacity: u32) -> NonZeroUsize {
    NonZeroUsize::new(capacity.max(1) as usize).unwrap()
}
