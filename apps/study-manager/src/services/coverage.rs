//! Set cover, obtainability and comprehension prediction against the store.

use super::Result;
use crate::db::{
    CardRepository, CoverageRepository, DeckRepository, LexiconRepository, TextRepository,
};
use immersion_core::coverage::{self, CandidateCard, Prediction, TextLemmas};
use immersion_core::types::{CardId, DictFormId, Obtainability, TextId, TextKind};
use immersion_core::CancelToken;
use std::collections::{BTreeSet, HashSet};

/// Choose texts among `candidates` covering as many of `targets` as possible.
pub fn greedy_set_cover<R: CoverageRepository>(
    repo: &R,
    targets: &BTreeSet<DictFormId>,
    candidates: &[TextId],
    limit: Option<usize>,
    cancel: &CancelToken,
) -> Result<Vec<TextId>> {
    if targets.is_empty() || candidates.is_empty() {
        return Ok(Vec::new());
    }
    let lemmas = repo.text_lemmas(candidates)?;
    let chosen = coverage::greedy_set_cover(targets, &lemmas, limit, cancel)?;
    tracing::info!(
        targets = targets.len(),
        candidates = candidates.len(),
        chosen = chosen.len(),
        "set cover complete"
    );
    Ok(chosen)
}

/// Cover the unknown lemmas of all gated cards with texts of `kind`.
pub fn cover_gated_cards<R>(
    repo: &R,
    kind: TextKind,
    limit: Option<usize>,
    cancel: &CancelToken,
) -> Result<Vec<TextId>>
where
    R: TextRepository + CoverageRepository + CardRepository,
{
    let targets = repo.gated_dictionary_forms()?;
    let candidates: Vec<TextId> = repo
        .list_texts(Some(kind))?
        .into_iter()
        .map(|t| t.id)
        .collect();
    greedy_set_cover(repo, &targets, &candidates, limit, cancel)
}

/// Mark each card obtainable or unobtainable against the chosen texts.
///
/// Returns the obtainable cards in input order.
pub fn filter_cards_by_coverage<R>(
    repo: &R,
    cards: &[CardId],
    chosen_texts: &[TextId],
) -> Result<Vec<CardId>>
where
    R: CardRepository + CoverageRepository,
{
    let covered: HashSet<DictFormId> = repo
        .text_lemmas(chosen_texts)?
        .into_iter()
        .flat_map(|t| t.lemmas)
        .collect();

    let mut obtainable = Vec::new();
    for &card_id in cards {
        let unknown = repo.unknown_dictionary_forms_for_card(card_id)?;
        let state = if coverage::is_obtainable(&unknown, &covered) {
            obtainable.push(card_id);
            Obtainability::Obtainable
        } else {
            Obtainability::Unobtainable
        };
        repo.set_card_obtainability(card_id, state)?;
    }

    tracing::info!(
        cards = cards.len(),
        obtainable = obtainable.len(),
        "filtered cards by coverage"
    );
    Ok(obtainable)
}

/// Default candidate pool: N+1 cards of the named deck with their unknown lemmas.
pub fn n_plus_one_pool<R>(repo: &R, deck_name: &str, threshold: u32) -> Result<Vec<CandidateCard>>
where
    R: CardRepository + DeckRepository,
{
    let Some(deck_id) = repo.deck_id_by_name(deck_name)? else {
        return Ok(Vec::new());
    };
    repo.n_plus_one_cards(deck_id, threshold, None)?
        .into_iter()
        .map(|card| -> Result<CandidateCard> {
            Ok(CandidateCard {
                card_id: card.id,
                unknown: repo.unknown_dictionary_forms_for_card(card.id)?,
            })
        })
        .collect()
}

/// Everything the prediction needs, loaded up front.
#[derive(Debug, Clone)]
pub struct PredictionInputs {
    pub studying: Vec<TextLemmas>,
    pub known: HashSet<DictFormId>,
}

pub fn load_prediction_inputs<R>(repo: &R) -> Result<PredictionInputs>
where
    R: TextRepository + LexiconRepository + CoverageRepository,
{
    let studying = repo.text_lemmas(&repo.studying_text_ids()?)?;
    let known = repo.known_dictionary_form_ids()?;
    Ok(PredictionInputs { studying, known })
}

/// Simulate learning up to `max_cards` cards of `pool`.
pub fn predict_comprehension_increase<R>(
    repo: &R,
    pool: &[CandidateCard],
    max_cards: usize,
    cancel: &CancelToken,
) -> Result<Prediction>
where
    R: TextRepository + LexiconRepository + CoverageRepository,
{
    let inputs = load_prediction_inputs(repo)?;
    run_prediction(pool, inputs, max_cards, cancel)
}

pub(crate) fn run_prediction(
    pool: &[CandidateCard],
    inputs: PredictionInputs,
    max_cards: usize,
    cancel: &CancelToken,
) -> Result<Prediction> {
    let prediction = coverage::predict_comprehension_increase(
        pool,
        &inputs.studying,
        inputs.known,
        max_cards,
        cancel,
    )?;
    tracing::info!(
        baseline = prediction.baseline,
        final_average = prediction.final_average,
        chosen = prediction.chosen.len(),
        "prediction complete"
    );
    Ok(prediction)
}
