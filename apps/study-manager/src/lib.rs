//! Immersion study manager: vocabulary coverage and comprehension tracking
//! over a library of subtitles and texts.

pub mod config;
pub mod db;
pub mod logging;
pub mod services;
pub mod state;

use config::Config;
use db::{KanjiQueue, LibraryRepository, SqliteRepository, StatsRepository, StudyStats};
use immersion_core::coverage::Prediction;
use immersion_core::CancelToken;
use serde::Serialize;
use services::library::ScanSummary;
use services::{comprehension, coverage, jobs, library, ranking};
use state::AppState;

/// Summary printed after a maintenance run.
#[derive(Debug, Serialize)]
pub struct MaintenanceReport {
    pub scanned: Vec<ScanSummary>,
    pub pruned_media: Vec<String>,
    pub kanji_parsed: usize,
    pub ranked: usize,
    pub stats: StudyStats,
    pub prediction: Prediction,
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let config = Config::from_env()?;
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "opening database");
    let repository = SqliteRepository::open(&config.db_path)?;
    let state = AppState::new(repository, config);

    let report = maintain(&state).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Refresh the library and every derived value, then predict the gain of
/// studying the current N+1 pool.
pub async fn maintain(state: &AppState) -> anyhow::Result<MaintenanceReport> {
    let config = &state.config;

    let (scanned, pruned_media, kanji_parsed, ranked, pool) = {
        let repo = state.repository.lock().expect("repository lock");
        let scanned = scan_media_dirs(&repo, config)?;
        let pruned_media = library::prune_missing_media(&*repo)?;
        let kanji_parsed = repo.parse_pending_kanji()?;
        let average = comprehension::refresh_studying_comprehension(&*repo)?;
        let ranked = ranking::update_dictionary_form_rankings(&*repo)?;
        let pool = coverage::n_plus_one_pool(&*repo, &config.words_deck, config.n_plus_one_threshold)?;
        tracing::info!(
            sources = repo.list_source_folders()?.len(),
            average,
            pool = pool.len(),
            "refreshed study data"
        );
        (scanned, pruned_media, kanji_parsed, ranked, pool)
    };

    let prediction = jobs::spawn_prediction(
        state.repository.clone(),
        pool,
        config.prediction_cards,
        CancelToken::new(),
    )
    .join()
    .await?;

    let stats = {
        let repo = state.repository.lock().expect("repository lock");
        repo.study_stats(&config.words_deck, &config.study_deck, config.n_plus_one_threshold)?
    };

    Ok(MaintenanceReport {
        scanned,
        pruned_media,
        kanji_parsed,
        ranked,
        stats,
        prediction,
    })
}

#[cfg(feature = "vibrato")]
fn scan_media_dirs(repo: &SqliteRepository, config: &Config) -> anyhow::Result<Vec<ScanSummary>> {
    use immersion_core::tokenizer::vibrato::{FeatureLayout, VibratoTokenizer};

    if config.media_dirs.is_empty() {
        return Ok(Vec::new());
    }
    let Some(path) = config.dictionary_path.as_ref() else {
        tracing::warn!("IMMERSION_DICTIONARY_PATH is not set, skipping media scan");
        return Ok(Vec::new());
    };
    let layout = match config.dictionary_layout {
        config::DictionaryLayout::Ipadic => FeatureLayout::IPADIC,
        config::DictionaryLayout::Unidic => FeatureLayout::UNIDIC,
    };
    let tokenizer = VibratoTokenizer::open(path, layout)?;

    let mut summaries = Vec::new();
    for dir in &config.media_dirs {
        summaries.push(library::scan_folder(
            repo,
            &tokenizer,
            dir,
            config.parse_kanji_on_ingest,
        )?);
    }
    Ok(summaries)
}

#[cfg(not(feature = "vibrato"))]
fn scan_media_dirs(_repo: &SqliteRepository, config: &Config) -> anyhow::Result<Vec<ScanSummary>> {
    if !config.media_dirs.is_empty() {
        tracing::warn!("built without a tokenizer backend, skipping media scan");
    }
    Ok(Vec::new())
}
