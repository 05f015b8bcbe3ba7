//! Per-window session state.
//!
//! A window's only state that outlives a single organizing run is held
//! here: the run lock that serializes runs, the supersession token that
//! lets a newer run abandon an older one's remaining operations, and the
//! recency list feeding auto-collapse. Sessions are created on a window's
//! first event and dropped when the window closes.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tabtidy_world::WindowId;
use tokio_util::sync::CancellationToken;

use crate::recency::RecencyTracker;

/// State for one tracked window.
pub(crate) struct WindowSession {
    /// Serializes organizing runs for this window.
    pub(crate) run_lock: tokio::sync::Mutex<()>,
    /// Cancellation token of the most recently requested run.
    current: Mutex<CancellationToken>,
    /// Recency list for auto-collapse.
    pub(crate) recency: Mutex<RecencyTracker>,
}

impl WindowSession {
    fn new(capacity: u32) -> Self {
        Self {
            run_lock: tokio::sync::Mutex::new(()),
            current: Mutex::new(CancellationToken::new()),
            recency: Mutex::new(RecencyTracker::new(capacity)),
        }
    }

    /// Cancel the in-flight run (if any) and install a fresh token for the
    /// caller's run.
    pub(crate) fn supersede(&self) -> CancellationToken {
        let mut current = self.current.lock();
        current.cancel();
        let fresh = CancellationToken::new();
        *current = fresh.clone();
        fresh
    }
}

/// Keyed store of window sessions.
#[derive(Default)]
pub(crate) struct Sessions {
    map: Mutex<HashMap<WindowId, Arc<WindowSession>>>,
}

impl Sessions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Session for `window`, created on first use.
    pub(crate) fn ensure(&self, window: WindowId, recency_capacity: u32) -> Arc<WindowSession> {
        self.map
            .lock()
            .entry(window)
            .or_insert_with(|| Arc::new(WindowSession::new(recency_capacity)))
            .clone()
    }

    /// Drop a closed window's session, cancelling any in-flight run.
    pub(crate) fn remove(&self, window: WindowId) {
        if let Some(session) = self.map.lock().remove(&window) {
            session.current.lock().cancel();
        }
    }

    /// Windows currently tracked.
    pub(crate) fn windows(&self) -> Vec<WindowId> {
        self.map.lock().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supersede_cancels_the_previous_token() {
        let session = WindowSession::new(3);
        let first = session.supersede();
        assert!(!first.is_cancelled());
        let second = session.supersede();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn remove_cancels_and_forgets() {
        let sessions = Sessions::new();
        let session = sessions.ensure(1, 3);
        let token = session.supersede();
        sessions.remove(1);
        assert!(token.is_cancelled());
        assert!(sessions.windows().is_empty());
    }

    #[test]
    fn ensure_is_idempotent_per_window() {
        let sessions = Sessions::new();
        let a = sessions.ensure(1, 3);
        let b = sessions.ensure(1, 3);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(sessions.windows(), vec![1]);
    }
}
