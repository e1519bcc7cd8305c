//! Cached per-text comprehension.

use super::Result;
use crate::db::{CoverageRepository, LexiconRepository, TextRepository};
use immersion_core::coverage::comprehension_percentage;
use immersion_core::types::{DictFormId, TextId};
use std::collections::HashSet;

/// Compute the comprehension of a text and store it on the text.
pub fn compute_text_comprehension<R>(repo: &R, text_id: TextId) -> Result<f64>
where
    R: TextRepository + LexiconRepository + CoverageRepository,
{
    let known = repo.known_dictionary_form_ids()?;
    store_comprehension(repo, text_id, &known)
}

fn store_comprehension<R>(repo: &R, text_id: TextId, known: &HashSet<DictFormId>) -> Result<f64>
where
    R: TextRepository + CoverageRepository,
{
    let lemmas = repo.dictionary_forms_covered_by_text(text_id)?;
    let percentage = comprehension_percentage(&lemmas, known);
    repo.set_text_comprehension(text_id, percentage)?;
    Ok(percentage)
}

/// Flip the known flag of a lemma and refresh everything derived from it.
///
/// Sentence unknown counts and the cached comprehension of every text using
/// the lemma are recomputed. Returns the refreshed text ids.
pub fn set_dictionary_form_known<R>(repo: &R, id: DictFormId, known: bool) -> Result<Vec<TextId>>
where
    R: TextRepository + LexiconRepository + CoverageRepository,
{
    repo.set_dictionary_form_known(id, known)?;
    let sentences = repo.recompute_unknown_counts(id)?;

    let known_ids = repo.known_dictionary_form_ids()?;
    let texts = repo.texts_containing_dictionary_form(id)?;
    for text_id in &texts {
        store_comprehension(repo, *text_id, &known_ids)?;
    }

    tracing::debug!(
        dict_form_id = id,
        known,
        sentences,
        texts = texts.len(),
        "updated known flag"
    );
    Ok(texts)
}

/// Recompute every studying text and return their average.
pub fn refresh_studying_comprehension<R>(repo: &R) -> Result<f64>
where
    R: TextRepository + LexiconRepository + CoverageRepository,
{
    let known = repo.known_dictionary_form_ids()?;
    let ids = repo.studying_text_ids()?;
    if ids.is_empty() {
        return Ok(100.0);
    }
    let mut total = 0.0;
    for id in &ids {
        total += store_comprehension(repo, *id, &known)?;
    }
    Ok(total / ids.len() as f64)
}
