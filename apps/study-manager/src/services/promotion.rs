//! Moving cards between decks and keeping the external flashcard service in step.
//!
//! The sink is best effort: a `None` from it is logged and the local side of
//! the workflow still completes.

use super::{comprehension, Result};
use crate::db::{
    CardRepository, CoverageRepository, DbError, DeckRepository, LexiconRepository,
    TextRepository,
};
use immersion_core::sink::{CardSink, NoteRequest};
use immersion_core::types::{Card, CardId};
use std::collections::BTreeMap;

/// Tag marking a card the learner already knows.
pub const KNOWN_TAG: &str = "known";

/// Tag added to every note created here.
pub const GENERATED_TAG: &str = "auto_generated";

/// Move cards into `deck_name`, locally and in the sink.
///
/// Returns the number of local cards whose deck changed.
pub fn move_cards_to_deck<R>(
    repo: &R,
    sink: &dyn CardSink,
    deck_name: &str,
    cards: &[CardId],
) -> Result<usize>
where
    R: CardRepository + DeckRepository,
{
    if cards.is_empty() {
        return Ok(0);
    }
    let deck_id = repo.get_or_create_deck(deck_name)?;
    ensure_sink_deck(sink, deck_name);

    let external = repo.anki_ids_for_cards(cards)?;
    if !external.is_empty() && sink.change_deck(&external, deck_name).is_none() {
        tracing::warn!(deck = deck_name, cards = external.len(), "sink did not change deck");
    }

    let moved = repo.assign_cards_to_deck(cards, deck_id)?;
    tracing::info!(deck = deck_name, moved, "moved cards");
    Ok(moved)
}

fn ensure_sink_deck(sink: &dyn CardSink, deck_name: &str) {
    match sink.deck_names() {
        Some(names) if names.iter().any(|n| n == deck_name) => {}
        Some(_) => {
            if sink.create_deck(deck_name).is_none() {
                tracing::warn!(deck = deck_name, "sink did not create deck");
            }
        }
        None => tracing::warn!(deck = deck_name, "sink did not list decks"),
    }
}

/// Move up to `count` N+1 cards from one deck to another.
pub fn allocate_n_plus_one_cards<R>(
    repo: &R,
    sink: &dyn CardSink,
    from_deck: &str,
    to_deck: &str,
    count: usize,
    threshold: u32,
) -> Result<Vec<CardId>>
where
    R: CardRepository + DeckRepository,
{
    let Some(from_id) = repo.deck_id_by_name(from_deck)? else {
        tracing::debug!(deck = from_deck, "source deck does not exist");
        return Ok(Vec::new());
    };
    let ids: Vec<CardId> = repo
        .n_plus_one_cards(from_id, threshold, Some(count))?
        .into_iter()
        .map(|c| c.id)
        .collect();
    move_cards_to_deck(repo, sink, to_deck, &ids)?;
    Ok(ids)
}

fn note_for_card(card: &Card, deck: &str, model: &str, tags: Vec<String>) -> NoteRequest {
    let front = card.native_word.clone().unwrap_or_default();
    let back = format!(
        "Reading: {}\nPOS: {}",
        card.reading.as_deref().unwrap_or_default(),
        card.pos.as_deref().unwrap_or_default()
    );

    let mut fields = BTreeMap::new();
    fields.insert("Front".to_string(), front);
    fields.insert("Back".to_string(), back);

    let mut tags = tags;
    if !tags.iter().any(|t| t == GENERATED_TAG) {
        tags.push(GENERATED_TAG.to_string());
    }

    NoteRequest {
        deck: deck.to_string(),
        model: model.to_string(),
        fields,
        tags,
    }
}

/// Create a note for a local card and remember the external card id.
///
/// Returns `None` when the sink did not create or report the card.
pub fn push_card<R: CardRepository>(
    repo: &R,
    sink: &dyn CardSink,
    card_id: CardId,
    deck: &str,
    model: &str,
) -> Result<Option<i64>> {
    let card = repo
        .get_card(card_id)?
        .ok_or(DbError::CardNotFound(card_id))?;
    let note = note_for_card(&card, deck, model, repo.card_tags(card_id)?);

    let Some(note_id) = sink.add_note(&note) else {
        tracing::warn!(card_id, "sink did not add note");
        return Ok(None);
    };
    let Some(external) = sink
        .find_cards(&format!("nid:{note_id}"))
        .and_then(|ids| ids.first().copied())
    else {
        tracing::warn!(card_id, note_id, "no card found for new note");
        return Ok(None);
    };

    repo.set_card_anki_id(card_id, external)?;
    Ok(Some(external))
}

/// Mark the lemma of every card tagged known in the sink as known.
///
/// Returns the number of lemmas that changed.
pub fn sync_known_from_sink<R>(repo: &R, sink: &dyn CardSink, cards: &[CardId]) -> Result<usize>
where
    R: CardRepository + TextRepository + LexiconRepository + CoverageRepository,
{
    let external = repo.anki_ids_for_cards(cards)?;
    if external.is_empty() {
        return Ok(0);
    }
    let Some(infos) = sink.cards_info(&external) else {
        tracing::warn!(cards = external.len(), "sink did not return card info");
        return Ok(0);
    };

    let mut changed = 0;
    for info in infos.iter().filter(|i| i.has_tag(KNOWN_TAG)) {
        let Some(card) = repo.card_for_anki_id(info.card_id)? else {
            continue;
        };
        let Some(word) = card.native_word.as_deref() else {
            continue;
        };
        match repo.find_dictionary_form(word)? {
            Some(form) if !form.known => {
                comprehension::set_dictionary_form_known(repo, form.id, true)?;
                changed += 1;
            }
            Some(_) => {}
            None => tracing::debug!(word, "no lemma for known card"),
        }
    }

    tracing::info!(changed, "synced known flags from sink");
    Ok(changed)
}
