//! Common test utilities for integration tests.
//!
//! Provides a [`TestContext`] with an in-memory repository and the fixture
//! tokenizer, plus helpers for seeding texts and cards.

#![allow(dead_code)]

pub mod fixtures;

use fixtures::FixtureTokenizer;
use immersion_core::types::{CardId, Cue, NewCard, SentenceId, TextId, TextKind};
use immersion_study_lib::db::{CardRepository, DeckRepository, SqliteRepository, TextRepository};
use immersion_study_lib::services::ingest;

pub struct TestContext {
    pub repo: SqliteRepository,
    pub tokenizer: FixtureTokenizer,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            repo: SqliteRepository::open_in_memory().expect("in-memory database"),
            tokenizer: FixtureTokenizer::default(),
        }
    }

    /// Ingest `lines` as a text of kind `Text` and return its id.
    pub fn add_text(&self, source: &str, lines: &[&str]) -> TextId {
        let cues: Vec<Cue> = lines.iter().map(|l| Cue::line(*l)).collect();
        ingest::ingest_text(&self.repo, &self.tokenizer, source, TextKind::Text, &cues, false)
            .expect("ingest text")
            .text_id
    }

    /// Ingest `lines` as a studying text.
    pub fn add_studying_text(&self, source: &str, lines: &[&str]) -> TextId {
        let id = self.add_text(source, lines);
        self.repo.set_text_studying(id, true).expect("set studying");
        id
    }

    pub fn first_sentence(&self, text_id: TextId) -> SentenceId {
        self.repo.sentences_for_text(text_id).expect("sentences")[0].id
    }

    /// Create a card in `deck` for the first sentence of a new text.
    pub fn add_card(&self, deck: &str, word: &str, sentence: &str) -> CardId {
        let deck_id = self.repo.get_or_create_deck(deck).expect("deck");
        let text_id = self.add_text(&format!("card:{word}:{sentence}"), &[sentence]);
        self.repo
            .add_card(&NewCard {
                deck_id: Some(deck_id),
                sentence_id: Some(self.first_sentence(text_id)),
                native_word: Some(word.to_string()),
                native_sentence: Some(sentence.to_string()),
                ..Default::default()
            })
            .expect("add card")
    }
}
