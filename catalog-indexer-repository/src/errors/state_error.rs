//! Watermark store error types.

use thiserror::Error;

/// Errors that can occur while persisting watermarks.
///
/// Loading never fails: unreadable state is treated as empty.
#[derive(Debug, Error)]
pub enum StateError {
    /// Reading or replacing the state file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The state could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StateError {
    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}
