//! Flashcard service capability.
//!
//! The study workflows push notes and move cards through a [`CardSink`].
//! Every call returns `Option`; `None` means the external service did not
//! perform the action (unreachable, rejected, malformed reply). Callers log
//! and degrade instead of failing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A note to create in the external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRequest {
    pub deck: String,
    pub model: String,
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

/// Card details reported by the external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInfo {
    pub card_id: i64,
    pub note_id: i64,
    pub deck_name: String,
    pub tags: Vec<String>,
}

impl CardInfo {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

pub trait CardSink: Send + Sync {
    /// Create a note, returning its note id.
    fn add_note(&self, note: &NoteRequest) -> Option<i64>;

    /// Card ids matching a search query such as `nid:123`.
    fn find_cards(&self, query: &str) -> Option<Vec<i64>>;

    fn change_deck(&self, card_ids: &[i64], deck: &str) -> Option<()>;

    fn cards_info(&self, card_ids: &[i64]) -> Option<Vec<CardInfo>>;

    fn deck_names(&self) -> Option<Vec<String>>;

    fn create_deck(&self, deck: &str) -> Option<i64>;
}
