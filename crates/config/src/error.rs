//! Error type for options loading.

use thiserror::Error;

/// Errors produced while loading persisted options.
#[derive(Debug, Error)]
pub enum Error {
    /// The persisted blob is not valid JSON at all.
    #[error("options blob is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The persisted blob parsed, but its top level is not an object.
    #[error("options blob must be a JSON object, got {found}")]
    NotAnObject {
        /// JSON type name of the offending value.
        found: &'static str,
    },
}
