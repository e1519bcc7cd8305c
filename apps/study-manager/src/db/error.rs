//! Database error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("text not found: {0}")]
    TextNotFound(i64),

    #[error("sentence not found: {0}")]
    SentenceNotFound(i64),

    #[error("card not found: {0}")]
    CardNotFound(i64),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
