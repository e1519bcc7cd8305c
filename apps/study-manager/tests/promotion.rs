//! Card promotion tests against the recording sink.

mod common;

use common::fixtures::{RecordingSink, SinkCall};
use common::TestContext;
use immersion_study_lib::db::{CardRepository, DeckRepository, LexiconRepository, TextRepository};
use immersion_study_lib::services::promotion;
use pretty_assertions::assert_eq;

/// Test moving cards creates the deck in the sink and moves external cards.
#[test]
fn test_move_cards_to_new_deck() {
    let ctx = TestContext::new();
    let sink = RecordingSink::new();
    let a = ctx.add_card("Words", "犬", "犬");
    let b = ctx.add_card("Words", "猫", "猫");
    ctx.repo.set_card_anki_id(a, 501).unwrap();

    let moved = promotion::move_cards_to_deck(&ctx.repo, &sink, "Study", &[a, b]).unwrap();
    assert_eq!(moved, 2);

    assert_eq!(
        sink.calls(),
        vec![
            SinkCall::DeckNames,
            SinkCall::CreateDeck("Study".to_string()),
            SinkCall::ChangeDeck(vec![501], "Study".to_string()),
        ]
    );
    let study = ctx.repo.deck_id_by_name("Study").unwrap().unwrap();
    assert_eq!(ctx.repo.cards_in_deck(study).unwrap().len(), 2);
}

/// Test an existing sink deck is not created again.
#[test]
fn test_move_cards_to_existing_deck() {
    let ctx = TestContext::new();
    let sink = RecordingSink::new();
    let a = ctx.add_card("Words", "犬", "犬");

    promotion::move_cards_to_deck(&ctx.repo, &sink, "Default", &[a]).unwrap();
    assert_eq!(sink.calls(), vec![SinkCall::DeckNames]);
    assert_eq!(sink.decks(), vec!["Default".to_string()]);
}

/// Test an unreachable sink does not stop the local move.
#[test]
fn test_offline_sink_does_not_abort_move() {
    let ctx = TestContext::new();
    let sink = RecordingSink::offline();
    let a = ctx.add_card("Words", "犬", "犬");
    ctx.repo.set_card_anki_id(a, 77).unwrap();

    let moved = promotion::move_cards_to_deck(&ctx.repo, &sink, "Study", &[a]).unwrap();
    assert_eq!(moved, 1);
    let card = ctx.repo.get_card(a).unwrap().unwrap();
    assert_eq!(card.deck_id, ctx.repo.deck_id_by_name("Study").unwrap());
}

/// Test only N+1 cards are allocated to the study deck.
#[test]
fn test_allocate_n_plus_one_cards() {
    let ctx = TestContext::new();
    let sink = RecordingSink::new();
    let easy = ctx.add_card("Words", "犬", "犬");
    let also_easy = ctx.add_card("Words", "魚", "魚");
    ctx.add_card("Words", "猫", "猫が魚を食べた");

    let allocated =
        promotion::allocate_n_plus_one_cards(&ctx.repo, &sink, "Words", "Study", 1, 1).unwrap();
    assert_eq!(allocated, vec![easy]);

    let allocated =
        promotion::allocate_n_plus_one_cards(&ctx.repo, &sink, "Words", "Study", 5, 1).unwrap();
    assert_eq!(allocated, vec![also_easy]);

    let words = ctx.repo.deck_id_by_name("Words").unwrap().unwrap();
    assert_eq!(ctx.repo.cards_in_deck(words).unwrap().len(), 1);
    assert!(promotion::allocate_n_plus_one_cards(&ctx.repo, &sink, "Nope", "Study", 5, 1)
        .unwrap()
        .is_empty());
}

/// Test pushing a card stores the external card id.
#[test]
fn test_push_card() {
    let ctx = TestContext::new();
    let sink = RecordingSink::new();
    let card = ctx.add_card("Words", "犬", "犬");
    ctx.repo
        .update_card_tags(card, &["n5".to_string(), "n5".to_string()])
        .unwrap();
    assert_eq!(ctx.repo.card_tags(card).unwrap(), vec!["n5".to_string()]);

    let external = promotion::push_card(&ctx.repo, &sink, card, "Words", "Basic").unwrap();
    assert_eq!(external, Some(10_000));
    assert_eq!(ctx.repo.get_card(card).unwrap().unwrap().anki_card_id, Some(10_000));
    assert_eq!(ctx.repo.card_for_anki_id(10_000).unwrap().unwrap().id, card);

    let calls = sink.calls();
    let SinkCall::AddNote(note) = &calls[0] else {
        panic!("expected a note, got {calls:?}");
    };
    assert_eq!(note.fields["Front"], "犬");
    assert_eq!(
        note.tags,
        vec!["n5".to_string(), promotion::GENERATED_TAG.to_string()]
    );
    assert_eq!(calls[1], SinkCall::FindCards("nid:1000".to_string()));
}

/// Test a failed push leaves the card unlinked.
#[test]
fn test_push_card_offline() {
    let ctx = TestContext::new();
    let sink = RecordingSink::offline();
    let card = ctx.add_card("Words", "犬", "犬");

    assert_eq!(
        promotion::push_card(&ctx.repo, &sink, card, "Words", "Basic").unwrap(),
        None
    );
    assert_eq!(ctx.repo.get_card(card).unwrap().unwrap().anki_card_id, None);
}

/// Test pushing a missing card is an error.
#[test]
fn test_push_missing_card() {
    let ctx = TestContext::new();
    let sink = RecordingSink::new();
    assert!(promotion::push_card(&ctx.repo, &sink, 99, "Words", "Basic").is_err());
    assert!(sink.calls().is_empty());
}

/// Test cards tagged known in the sink mark their lemma known.
#[test]
fn test_sync_known_from_sink() {
    let ctx = TestContext::new();
    let sink = RecordingSink::new();
    let text = ctx.add_studying_text("show", &["犬猫"]);
    let dog = ctx.add_card("Words", "犬", "犬");
    let cat = ctx.add_card("Words", "猫", "猫");
    let dog_external = promotion::push_card(&ctx.repo, &sink, dog, "Words", "Basic")
        .unwrap()
        .unwrap();
    promotion::push_card(&ctx.repo, &sink, cat, "Words", "Basic").unwrap();
    sink.mark_known(dog_external);

    let changed = promotion::sync_known_from_sink(&ctx.repo, &sink, &[dog, cat]).unwrap();
    assert_eq!(changed, 1);
    assert!(ctx.repo.find_dictionary_form("犬").unwrap().unwrap().known);
    assert!(!ctx.repo.find_dictionary_form("猫").unwrap().unwrap().known);
    assert_eq!(ctx.repo.get_text(text).unwrap().unwrap().comprehension_percentage, 50.0);

    assert_eq!(
        promotion::sync_known_from_sink(&ctx.repo, &sink, &[dog, cat]).unwrap(),
        0
    );
}

/// Test an unreachable sink syncs nothing.
#[test]
fn test_sync_known_offline() {
    let ctx = TestContext::new();
    let sink = RecordingSink::offline();
    let dog = ctx.add_card("Words", "犬", "犬");
    ctx.repo.set_card_anki_id(dog, 5).unwrap();

    assert_eq!(promotion::sync_known_from_sink(&ctx.repo, &sink, &[dog]).unwrap(), 0);
    assert!(!ctx.repo.find_dictionary_form("犬").unwrap().unwrap().known);
}
