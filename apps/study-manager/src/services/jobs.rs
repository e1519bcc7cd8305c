//! Background execution of the expensive coverage algorithms.
//!
//! Inputs are loaded under the repository lock; the algorithm itself runs on
//! tokio's blocking pool without holding it.

use super::coverage::{self as coverage_service, PredictionInputs};
use super::{Result, ServiceError};
use crate::db::{CoverageRepository, SqliteRepository};
use immersion_core::coverage::{self, CandidateCard, Prediction};
use immersion_core::types::{DictFormId, TextId};
use immersion_core::CancelToken;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Handle to a running job.
pub struct Job<T> {
    handle: JoinHandle<Result<T>>,
    cancel: CancelToken,
}

impl<T> Job<T> {
    /// Ask the job to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the job to finish.
    pub async fn join(self) -> Result<T> {
        self.handle
            .await
            .map_err(|e| ServiceError::Job(e.to_string()))?
    }
}

/// Run the comprehension prediction for `pool` in the background.
pub fn spawn_prediction(
    repository: Arc<Mutex<SqliteRepository>>,
    pool: Vec<CandidateCard>,
    max_cards: usize,
    cancel: CancelToken,
) -> Job<Prediction> {
    let token = cancel.clone();
    let handle = tokio::task::spawn_blocking(move || -> Result<Prediction> {
        token.check()?;
        let inputs: PredictionInputs = {
            let repo = repository.lock().expect("repository lock");
            coverage_service::load_prediction_inputs(&*repo)?
        };
        coverage_service::run_prediction(&pool, inputs, max_cards, &token)
    });
    Job { handle, cancel }
}

/// Run a set cover over `candidates` in the background.
pub fn spawn_set_cover(
    repository: Arc<Mutex<SqliteRepository>>,
    targets: BTreeSet<DictFormId>,
    candidates: Vec<TextId>,
    limit: Option<usize>,
    cancel: CancelToken,
) -> Job<Vec<TextId>> {
    let token = cancel.clone();
    let handle = tokio::task::spawn_blocking(move || -> Result<Vec<TextId>> {
        token.check()?;
        let lemmas = {
            let repo = repository.lock().expect("repository lock");
            repo.text_lemmas(&candidates)?
        };
        let chosen = coverage::greedy_set_cover(&targets, &lemmas, limit, &token)?;
        tracing::info!(chosen = chosen.len(), "background set cover complete");
        Ok(chosen)
    });
    Job { handle, cancel }
}
