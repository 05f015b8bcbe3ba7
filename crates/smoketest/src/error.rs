//! Smoketest error type.

use thiserror::Error;

/// Convenient result type for smoketest cases.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures a smoketest case can report.
#[derive(Debug, Error)]
pub enum Error {
    /// The engine itself failed.
    #[error("engine error: {0}")]
    Engine(#[from] tabtidy_engine::Error),

    /// A post-condition did not hold.
    #[error("check failed: {0}")]
    Check(String),
}
