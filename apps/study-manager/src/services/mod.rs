//! Study workflows built on the repositories and the core algorithms.

pub mod comprehension;
pub mod coverage;
pub mod ingest;
pub mod jobs;
pub mod library;
pub mod promotion;
pub mod ranking;

use crate::db::DbError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Core(#[from] immersion_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background job failed: {0}")]
    Job(String),
}

impl ServiceError {
    /// Whether the operation stopped because its cancel token fired.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Core(immersion_core::Error::Cancelled))
    }
}
