//! Tabtidy Engine
//!
//! The engine keeps each browser window's tabs sorted by reversed-domain
//! order and clustered into named tab groups, converging the host with the
//! fewest operations it can:
//! - derives a hierarchical comparison key from every tab's locator
//! - clusters tabs bottom-up over a domain trie with a size threshold
//! - plans moves by descending displacement so later moves become no-ops
//! - diffs logical groups against the host's physical groups and emits the
//!   minimal create/retarget/recolor/ungroup set
//! - tracks group recency per window and collapses groups that fall idle
//!
//! The host is abstracted behind [`tabtidy_world::TabOps`]; the engine owns
//! no persistent state beyond per-window sessions (run serialization plus
//! the recency list). It exposes a minimal, documented API:
//! - [`Organizer`]: the primary type you construct and drive
//! - [`RunSummary`]: what one organizing run did
//!
//! All other modules are crate-private implementation details.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

mod error;
mod key;
mod plan;
mod recency;
mod reconcile;
mod run;
mod session;
mod tree;

use config::Settings;
use parking_lot::RwLock;
use tabtidy_world::{GroupDelta, TabEvent, TabId, TabOps, WindowId};
use tracing::{debug, info, warn};

pub use error::{Error, Result};
pub use key::{KeyExtractor, KeyOrder, SortKey};
pub use recency::RecencyTracker;

use session::Sessions;

/// Grace period between a tab activation and the auto-collapse pass, so the
/// pass never races a user's in-progress drag.
const ACTIVATION_GRACE: Duration = Duration::from_millis(500);

/// What a single organizing run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tabs considered (unpinned tabs of the window).
    pub tabs: usize,
    /// Moves actually issued.
    pub moves: usize,
    /// Group operations that took effect.
    pub group_ops: usize,
    /// True when a newer run superseded this one before it finished.
    pub superseded: bool,
}

/// Organizer coordinates per-window organizing runs against one host.
///
/// Construct via [`Organizer::new`], then feed host events through
/// [`Organizer::handle_event`] (or invoke [`Organizer::organize`] directly).
/// Runs for the same window are serialized; a newer run supersedes the
/// in-flight one, which abandons its remaining operations. Runs for
/// different windows are independent.
pub struct Organizer {
    /// The host seam.
    tabs: Arc<dyn TabOps>,
    /// Current options; snapshotted at the start of every run.
    settings: RwLock<Arc<Settings>>,
    /// Per-window session store.
    sessions: Sessions,
    /// Locator key derivation (holds the compiled-pattern cache).
    extractor: KeyExtractor,
}

impl Organizer {
    /// Create an organizer over `tabs` with the given options.
    pub fn new(tabs: Arc<dyn TabOps>, settings: Settings) -> Self {
        Self {
            tabs,
            settings: RwLock::new(Arc::new(settings)),
            sessions: Sessions::new(),
            extractor: KeyExtractor::new(),
        }
    }

    /// Current options snapshot.
    pub fn settings(&self) -> Arc<Settings> {
        self.settings.read().clone()
    }

    /// Replace the options. Takes effect from the next run; combine with
    /// [`TabEvent::ConfigChanged`] to reorganize tracked windows.
    pub fn update_settings(&self, settings: Settings) {
        *self.settings.write() = Arc::new(settings);
    }

    /// Forget a window's session (recency list included).
    pub fn drop_window(&self, window: WindowId) {
        self.sessions.remove(window);
    }

    /// React to one host event.
    pub async fn handle_event(&self, event: TabEvent) -> Result<()> {
        debug!("event: {:?}", event);
        match event {
            TabEvent::Created { window, .. } | TabEvent::Updated { window, .. } => {
                self.organize(window).await?;
            }
            TabEvent::Removed {
                window,
                window_closing,
                ..
            } => {
                if window_closing {
                    self.sessions.remove(window);
                } else {
                    self.organize(window).await?;
                }
            }
            TabEvent::Activated { window, tab } => self.collapse_idle(window, tab).await?,
            TabEvent::ConfigChanged => {
                for window in self.sessions.windows() {
                    if let Err(e) = self.organize(window).await {
                        warn!("reorganize of window {} failed: {}", window, e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Run one full organizing pass for `window`.
    ///
    /// Fails only when the initial snapshot cannot be read; individual
    /// mutation failures are logged and skipped, and the next triggering
    /// event re-converges whatever is left.
    pub async fn organize(&self, window: WindowId) -> Result<RunSummary> {
        let settings = self.settings();
        let session = self.sessions.ensure(window, settings.auto_collapse_limit);
        let cancel = session.supersede();
        let _guard = session.run_lock.lock().await;
        if cancel.is_cancelled() {
            // Superseded while queued behind the previous run.
            return Ok(RunSummary {
                superseded: true,
                ..RunSummary::default()
            });
        }

        let started = Instant::now();
        let snapshot = self.tabs.list_tabs(window, Some(false)).await?;
        let pinned = self.tabs.list_tabs(window, Some(true)).await?.len();
        let plan = run::plan_run(&snapshot, pinned, &settings, &self.extractor)?;

        let mut summary = RunSummary {
            tabs: snapshot.len(),
            ..RunSummary::default()
        };
        for mv in &plan.moves {
            if cancel.is_cancelled() {
                break;
            }
            match self.tabs.move_tab(mv.tab, mv.to).await {
                Ok(()) => summary.moves += 1,
                Err(e) => warn!("move of tab {} to {} failed: {}", mv.tab, mv.to, e),
            }
        }

        if settings.enable_groups && !cancel.is_cancelled() {
            let ops =
                reconcile::plan_group_ops(self.tabs.as_ref(), &plan, &settings.group_color_rules)
                    .await;
            summary.group_ops =
                reconcile::apply_group_ops(self.tabs.as_ref(), window, ops, &cancel).await;
        }
        summary.superseded = cancel.is_cancelled();

        info!(
            "reorganized {} tabs in window {} in {:?} ({} moves, {} group ops)",
            summary.tabs,
            window,
            started.elapsed(),
            summary.moves,
            summary.group_ops
        );
        Ok(summary)
    }

    /// Activation path: record recency and collapse groups that fell idle.
    ///
    /// Deliberately decoupled from organizing runs and delayed by a short
    /// grace period. Only currently-expanded groups are evaluated.
    async fn collapse_idle(&self, window: WindowId, tab: TabId) -> Result<()> {
        let settings = self.settings();
        if !settings.auto_collapse_enabled {
            return Ok(());
        }
        tokio::time::sleep(ACTIVATION_GRACE).await;

        let tabs = self.tabs.list_tabs(window, None).await?;
        let Some(active) = tabs.into_iter().find(|t| t.id == tab) else {
            // The tab closed during the grace period.
            return Ok(());
        };
        let session = self.sessions.ensure(window, settings.auto_collapse_limit);
        {
            let mut recency = session.recency.lock();
            recency.resize(settings.auto_collapse_limit);
            recency.touch(active.group);
        }
        for group in self.tabs.query_groups(window).await? {
            if group.collapsed || !session.recency.lock().should_collapse(group.id) {
                continue;
            }
            let delta = GroupDelta {
                collapsed: Some(true),
                ..GroupDelta::default()
            };
            if let Err(e) = self.tabs.update_group(group.id, delta).await {
                warn!("collapse of group {} failed: {}", group.id, e);
            }
        }
        Ok(())
    }
}
