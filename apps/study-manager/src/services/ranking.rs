//! Frequency rankings over the studying corpus.

use super::Result;
use crate::db::{CardRepository, DeckRepository, LexiconRepository};
use immersion_core::ranking::assign_rankings;
use immersion_core::types::{Card, Obtainability};

/// Rank every lemma by its frequency in studying texts and persist the ranks.
///
/// Returns the number of ranked lemmas.
pub fn update_dictionary_form_rankings<R: LexiconRepository>(repo: &R) -> Result<usize> {
    let totals = repo.dictionary_form_study_frequencies()?;
    let rankings = assign_rankings(totals);
    repo.set_dictionary_form_rankings(&rankings)?;
    tracing::info!(ranked = rankings.len(), "updated dictionary form rankings");
    Ok(rankings.len())
}

/// Cards of a deck ordered by the summed frequency of their sentence lemmas.
///
/// Cards already marked unobtainable are left out.
pub fn select_cards_by_frequency<R>(
    repo: &R,
    deck_name: &str,
    limit: usize,
) -> Result<Vec<(Card, u64)>>
where
    R: CardRepository + DeckRepository,
{
    let Some(deck_id) = repo.deck_id_by_name(deck_name)? else {
        return Ok(Vec::new());
    };

    let mut scored = Vec::new();
    for card in repo.cards_in_deck(deck_id)? {
        if card.obtainability == Obtainability::Unobtainable {
            continue;
        }
        let score = repo.card_frequency_score(card.id)?;
        scored.push((card, score));
    }
    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.id.cmp(&b.0.id)));
    scored.truncate(limit);
    Ok(scored)
}
