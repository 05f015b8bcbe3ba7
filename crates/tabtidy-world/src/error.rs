//! Error type for host tab operations.

use std::result::Result as StdResult;

use thiserror::Error;

use crate::{GroupId, TabId, WindowId};

/// Convenient result type for host operations.
pub type Result<T> = StdResult<T, Error>;

/// Failures reported by a [`crate::TabOps`] host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The referenced tab no longer exists.
    #[error("no such tab: {0}")]
    TabNotFound(TabId),

    /// The referenced group no longer exists.
    #[error("no such group: {0}")]
    GroupNotFound(GroupId),

    /// The referenced window no longer exists.
    #[error("no such window: {0}")]
    WindowNotFound(WindowId),

    /// The host refused the operation (e.g. a user drag was in progress).
    #[error("operation rejected by host: {0}")]
    Rejected(String),
}
