//! Test fixtures: a dictionary-lookup tokenizer and a recording card sink.

use immersion_core::sink::{CardInfo, CardSink, NoteRequest};
use immersion_core::tokenizer::{Morpheme, Tokenizer};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// Words known to [`FixtureTokenizer::default`]: surface, lemma, reading, pos.
pub const LEXICON: &[(&str, &str, &str, &str)] = &[
    ("猫", "猫", "ネコ", "名詞"),
    ("犬", "犬", "イヌ", "名詞"),
    ("魚", "魚", "サカナ", "名詞"),
    ("日本", "日本", "ニホン", "名詞"),
    ("食べる", "食べる", "タベル", "動詞"),
    ("食べた", "食べる", "タベタ", "動詞"),
    ("行く", "行く", "イク", "動詞"),
    ("が", "が", "ガ", "助詞"),
    ("を", "を", "ヲ", "助詞"),
    ("。", "。", "", "補助記号"),
    ("、", "、", "", "補助記号"),
];

/// Longest-match tokenizer over a fixed word list.
///
/// Characters not starting any known word are skipped.
pub struct FixtureTokenizer {
    entries: Vec<(String, String, String, String)>,
}

impl FixtureTokenizer {
    pub fn new(entries: &[(&str, &str, &str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(s, l, r, p)| (s.to_string(), l.to_string(), r.to_string(), p.to_string()))
                .collect(),
        }
    }
}

impl Default for FixtureTokenizer {
    fn default() -> Self {
        Self::new(LEXICON)
    }
}

impl Tokenizer for FixtureTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Morpheme> {
        let chars: Vec<char> = text.chars().collect();
        let mut morphemes = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let rest: String = chars[i..].iter().collect();
            let hit = self
                .entries
                .iter()
                .filter(|(surface, ..)| rest.starts_with(surface.as_str()))
                .max_by_key(|(surface, ..)| surface.chars().count());
            match hit {
                Some((surface, lemma, reading, pos)) => {
                    if let Some(m) = Morpheme::from_token(surface, lemma, reading, pos) {
                        morphemes.push(m);
                    }
                    i += surface.chars().count();
                }
                None => i += 1,
            }
        }
        morphemes
    }
}

/// A call received by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    AddNote(NoteRequest),
    FindCards(String),
    ChangeDeck(Vec<i64>, String),
    CardsInfo(Vec<i64>),
    DeckNames,
    CreateDeck(String),
}

/// In-memory card sink that records every call.
///
/// With `offline` set every call returns `None`.
pub struct RecordingSink {
    pub offline: bool,
    calls: Mutex<Vec<SinkCall>>,
    decks: Mutex<Vec<String>>,
    known: Mutex<HashSet<i64>>,
    next_id: AtomicI64,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            offline: false,
            calls: Mutex::new(Vec::new()),
            decks: Mutex::new(vec!["Default".to_string()]),
            known: Mutex::new(HashSet::new()),
            next_id: AtomicI64::new(1000),
        }
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::new()
        }
    }

    /// Tag an external card as known.
    pub fn mark_known(&self, card_id: i64) {
        self.known.lock().unwrap().insert(card_id);
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn decks(&self) -> Vec<String> {
        self.decks.lock().unwrap().clone()
    }

    fn record(&self, call: SinkCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl CardSink for RecordingSink {
    fn add_note(&self, note: &NoteRequest) -> Option<i64> {
        self.record(SinkCall::AddNote(note.clone()));
        if self.offline {
            return None;
        }
        Some(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn find_cards(&self, query: &str) -> Option<Vec<i64>> {
        self.record(SinkCall::FindCards(query.to_string()));
        if self.offline {
            return None;
        }
        let note_id: i64 = query.strip_prefix("nid:")?.parse().ok()?;
        Some(vec![note_id * 10])
    }

    fn change_deck(&self, card_ids: &[i64], deck: &str) -> Option<()> {
        self.record(SinkCall::ChangeDeck(card_ids.to_vec(), deck.to_string()));
        if self.offline {
            return None;
        }
        Some(())
    }

    fn cards_info(&self, card_ids: &[i64]) -> Option<Vec<CardInfo>> {
        self.record(SinkCall::CardsInfo(card_ids.to_vec()));
        if self.offline {
            return None;
        }
        let known = self.known.lock().unwrap();
        Some(
            card_ids
                .iter()
                .map(|&id| CardInfo {
                    card_id: id,
                    note_id: id / 10,
                    deck_name: "Default".to_string(),
                    tags: if known.contains(&id) {
                        vec!["Known".to_string()]
                    } else {
                        Vec::new()
                    },
                })
                .collect(),
        )
    }

    fn deck_names(&self) -> Option<Vec<String>> {
        self.record(SinkCall::DeckNames);
        if self.offline {
            return None;
        }
        Some(self.decks())
    }

    fn create_deck(&self, deck: &str) -> Option<i64> {
        self.record(SinkCall::CreateDeck(deck.to_string()));
        if self.offline {
            return None;
        }
        self.decks.lock().unwrap().push(deck.to_string());
        Some(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}
