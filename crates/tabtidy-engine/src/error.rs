use std::result::Result as StdResult;

use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the tabtidy engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Errors originating from the host tab layer.
    #[error("host operation failed: {0}")]
    World(#[from] tabtidy_world::Error),

    /// Generic error with context.
    #[error("engine error: {0}")]
    Msg(String),
}
