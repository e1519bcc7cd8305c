//! Application state.

use crate::config::Config;
use crate::db::SqliteRepository;
use std::sync::{Arc, Mutex};

/// Global application state.
pub struct AppState {
    pub repository: Arc<Mutex<SqliteRepository>>,
    pub config: Config,
}

impl AppState {
    pub fn new(repository: SqliteRepository, config: Config) -> Self {
        Self {
            repository: Arc::new(Mutex::new(repository)),
            config,
        }
    }
}
