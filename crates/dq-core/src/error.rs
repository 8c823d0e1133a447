//! Error types shared by the queue, the dispatcher and the backends.
//!
//! Malformed arguments, unsupported commands, unresolved references and
//! unbalanced scopes are never errors; they degrade to "nothing drawn".

use thiserror::Error;

/// Error type for drawing operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DrawError {
    #[error("Image load failed for '{uri}': {reason}")]
    ImageLoad { uri: String, reason: String },

    #[error("Handler failed: {0}")]
    Handler(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for drawing operations
pub type DrawResult<T> = Result<T, DrawError>;
