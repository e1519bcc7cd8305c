//! Core vocabulary coverage library shared by the study manager application.
//!
//! Provides:
//! - Tokenizer adapter types (morphemes, filtering, reading normalization)
//! - Comprehension, set-cover and prediction algorithms
//! - Frequency ranking
//! - Kanji decomposition helpers
//! - Typed media library trees and subtitle parsing
//! - The flashcard sink capability consumed by card workflows
//! - Shared types (Text, Sentence, DictionaryForm, Card, etc.)

pub mod cancel;
pub mod coverage;
pub mod error;
pub mod kanji;
pub mod library;
pub mod ranking;
pub mod sink;
pub mod subtitle;
pub mod tokenizer;
pub mod types;

pub use cancel::CancelToken;
pub use coverage::{
    average_comprehension, comprehension_percentage, greedy_set_cover, is_obtainable,
    predict_comprehension_increase, CandidateCard, Prediction, TextLemmas,
};
pub use error::{Error, Result};
pub use library::{Folder, MediaKind};
pub use ranking::assign_rankings;
pub use sink::{CardInfo, CardSink, NoteRequest};
pub use subtitle::SubtitleFormat;
pub use tokenizer::{Morpheme, Tokenizer};
pub use types::{
    Card, CardId, CompoundForm, Cue, Deck, DeckId, DictFormId, DictionaryForm, KanjiEntry,
    MediaFile, NewCard, Obtainability, Sentence, SentenceId, SurfaceForm, SurfaceFormId, Text,
    TextId, TextKind,
};
