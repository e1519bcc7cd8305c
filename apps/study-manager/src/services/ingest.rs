//! Turning text into sentences, lemmas and surface forms.

use super::{comprehension, Result};
use crate::db::{CoverageRepository, LexiconRepository, TextRepository};
use immersion_core::tokenizer::{normalize_input, Tokenizer};
use immersion_core::types::{Cue, TextId, TextKind};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Counts reported by an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub text_id: TextId,
    pub sentences: usize,
    pub morphemes: usize,
    /// Sentences stored without any lemma link.
    pub unlinked: usize,
}

/// Compute SHA256 hash of content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One cue per non-blank line.
pub fn cues_from_lines(content: &str) -> Vec<Cue> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(Cue::line)
        .collect()
}

/// Store each cue as a sentence and link its morphemes.
///
/// Cues whose content yields no morphemes are kept as unlinked sentences.
pub fn ingest_cues<R, T>(
    repo: &R,
    tokenizer: &T,
    text_id: TextId,
    cues: &[Cue],
    parse_kanji: bool,
) -> Result<IngestSummary>
where
    R: TextRepository,
    T: Tokenizer + ?Sized,
{
    let mut summary = IngestSummary {
        text_id,
        ..Default::default()
    };

    for cue in cues {
        let morphemes = tokenizer.tokenize(&normalize_input(&cue.content));
        if morphemes.is_empty() {
            tracing::debug!(text_id, content = %cue.content, "no morphemes in line");
            summary.unlinked += 1;
        }
        repo.ingest_sentence(text_id, cue, &morphemes, parse_kanji)?;
        summary.sentences += 1;
        summary.morphemes += morphemes.len();
    }

    tracing::debug!(
        text_id,
        sentences = summary.sentences,
        morphemes = summary.morphemes,
        "ingested cues"
    );
    Ok(summary)
}

/// Replace the sentences of an edited text.
///
/// Frequencies contributed by the old sentences are taken back before the
/// new cues are ingested.
pub fn replace_text_sentences<R, T>(
    repo: &R,
    tokenizer: &T,
    text_id: TextId,
    cues: &[Cue],
    parse_kanji: bool,
) -> Result<IngestSummary>
where
    R: TextRepository,
    T: Tokenizer + ?Sized,
{
    let removed = repo.detach_text_sentences(text_id)?;
    tracing::debug!(text_id, removed, "detached old sentences");
    ingest_cues(repo, tokenizer, text_id, cues, parse_kanji)
}

/// Ingest a cue list as a text, replacing earlier content of the same text.
pub fn ingest_text<R, T>(
    repo: &R,
    tokenizer: &T,
    source: &str,
    kind: TextKind,
    cues: &[Cue],
    parse_kanji: bool,
) -> Result<IngestSummary>
where
    R: TextRepository + LexiconRepository + CoverageRepository,
    T: Tokenizer + ?Sized,
{
    let text_id = repo.add_text_source(source, kind)?;
    let summary = if repo.sentences_for_text(text_id)?.is_empty() {
        ingest_cues(repo, tokenizer, text_id, cues, parse_kanji)?
    } else {
        replace_text_sentences(repo, tokenizer, text_id, cues, parse_kanji)?
    };
    comprehension::compute_text_comprehension(repo, text_id)?;
    Ok(summary)
}

/// Ingest a UTF-8 text file, one sentence per non-blank line.
///
/// Returns `None` when the file content is unchanged since the last import.
pub fn ingest_text_file<R, T>(
    repo: &R,
    tokenizer: &T,
    path: &Path,
    kind: TextKind,
    parse_kanji: bool,
) -> Result<Option<IngestSummary>>
where
    R: TextRepository + LexiconRepository + CoverageRepository,
    T: Tokenizer + ?Sized,
{
    let content = fs::read_to_string(path)?;
    let hash = hash_content(&content);
    let source = path.to_string_lossy().to_string();

    if let Some(text) = repo.find_text(&source, kind)? {
        if text.content_hash.as_deref() == Some(hash.as_str()) {
            tracing::info!(source = %source, "text unchanged, skipping");
            return Ok(None);
        }
    }

    let summary = ingest_text(repo, tokenizer, &source, kind, &cues_from_lines(&content), parse_kanji)?;
    repo.set_text_content_hash(summary.text_id, &hash)?;
    tracing::info!(
        source = %source,
        sentences = summary.sentences,
        "imported text file"
    );
    Ok(Some(summary))
}
