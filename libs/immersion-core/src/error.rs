//! Error types for immersion-core.

use thiserror::Error;

/// Result type alias using the core Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the core algorithms and adapters.
#[derive(Debug, Error)]
pub enum Error {
    #[error("operation cancelled")]
    Cancelled,

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("unknown text kind: {0}")]
    UnknownTextKind(String),
}
