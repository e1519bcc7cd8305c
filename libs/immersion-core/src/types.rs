//! Core types for the vocabulary coverage engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TextId = i64;
pub type SentenceId = i64;
pub type DictFormId = i64;
pub type SurfaceFormId = i64;
pub type CardId = i64;
pub type DeckId = i64;

/// Origin of a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    VideoSubtitle,
    Text,
    TextImport,
    AnkiImport,
    Challenge,
}

impl TextKind {
    /// Get the kind tag as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VideoSubtitle => "video_subtitle",
            Self::Text => "text",
            Self::TextImport => "text_import",
            Self::AnkiImport => "anki_import",
            Self::Challenge => "challenge",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "video_subtitle" => Some(Self::VideoSubtitle),
            "text" => Some(Self::Text),
            "text_import" => Some(Self::TextImport),
            "anki_import" => Some(Self::AnkiImport),
            "challenge" => Some(Self::Challenge),
            _ => None,
        }
    }
}

/// A document: subtitle file, plain-text import, imported deck source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text {
    pub id: TextId,
    pub source: String,
    pub kind: TextKind,
    pub comprehension_percentage: f64,
    pub studying: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One line of a text (subtitle cue or plain line).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentence {
    pub id: SentenceId,
    pub text_id: TextId,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    pub unknown_dictionary_form_count: u32,
}

/// Input line for ingestion, before it has a sentence id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub content: String,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

impl Cue {
    /// A cue without timing, as produced by plain-text imports.
    pub fn line(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            start_time: None,
            end_time: None,
        }
    }

    /// A timed subtitle cue.
    pub fn timed(content: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            content: content.into(),
            start_time: Some(start_time),
            end_time: Some(end_time),
        }
    }
}

/// Canonical (lemma) form of a word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryForm {
    pub id: DictFormId,
    pub base_form: String,
    pub reading: String,
    pub pos: String,
    pub frequency: u32,
    pub known: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking: Option<u32>,
}

/// Inflected form of a lemma as observed in a sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceForm {
    pub id: SurfaceFormId,
    pub dict_form_id: DictFormId,
    pub surface_form: String,
    pub reading: String,
    pub pos: String,
    pub frequency: u32,
    pub known: bool,
    pub kanji_parsed: bool,
}

/// Kanji-bearing surface form registered for kanji study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompoundForm {
    pub id: i64,
    pub surface_form_id: SurfaceFormId,
    pub compound_text: String,
    pub frequency: u32,
    pub known: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking: Option<u32>,
}

/// A single kanji of a compound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KanjiEntry {
    pub id: i64,
    pub compound_id: i64,
    pub kanji_char: String,
    pub frequency: u32,
    pub known: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking: Option<u32>,
}

/// Whether the chosen reading material teaches every word a card needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Obtainability {
    Unchecked,
    Obtainable,
    Unobtainable,
}

impl Default for Obtainability {
    fn default() -> Self {
        Self::Unchecked
    }
}

impl Obtainability {
    /// Database representation (`NULL` for unchecked).
    pub fn to_flag(self) -> Option<bool> {
        match self {
            Self::Unchecked => None,
            Self::Obtainable => Some(false),
            Self::Unobtainable => Some(true),
        }
    }

    /// Create from the nullable `unobtainable` column.
    pub fn from_flag(unobtainable: Option<bool>) -> Self {
        match unobtainable {
            None => Self::Unchecked,
            Some(false) => Self::Obtainable,
            Some(true) => Self::Unobtainable,
        }
    }
}

/// Local study card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck_id: Option<DeckId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence_id: Option<SentenceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anki_card_id: Option<i64>,
    pub deck_origin: Option<String>,
    pub native_word: Option<String>,
    pub translated_word: Option<String>,
    pub word_audio: Option<String>,
    pub pos: Option<String>,
    pub native_sentence: Option<String>,
    pub translated_sentence: Option<String>,
    pub sentence_audio: Option<String>,
    pub image: Option<String>,
    pub reading: Option<String>,
    pub obtainability: Obtainability,
    pub gated: bool,
}

/// Card fields accepted on insert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCard {
    pub deck_id: Option<DeckId>,
    pub sentence_id: Option<SentenceId>,
    pub anki_card_id: Option<i64>,
    pub deck_origin: Option<String>,
    pub native_word: Option<String>,
    pub translated_word: Option<String>,
    pub word_audio: Option<String>,
    pub pos: Option<String>,
    pub native_sentence: Option<String>,
    pub translated_sentence: Option<String>,
    pub sentence_audio: Option<String>,
    pub image: Option<String>,
    pub reading: Option<String>,
}

/// Named deck with its card count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    pub id: DeckId,
    pub name: String,
    pub card_count: usize,
}

/// Indexed media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub media_id: i64,
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_kind_round_trips_through_tag() {
        for kind in [
            TextKind::VideoSubtitle,
            TextKind::Text,
            TextKind::TextImport,
            TextKind::AnkiImport,
            TextKind::Challenge,
        ] {
            assert_eq!(TextKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(TextKind::from_str("podcast"), None);
    }

    #[test]
    fn test_obtainability_flag_mapping() {
        assert_eq!(Obtainability::from_flag(None), Obtainability::Unchecked);
        assert_eq!(Obtainability::from_flag(Some(true)), Obtainability::Unobtainable);
        assert_eq!(Obtainability::Obtainable.to_flag(), Some(false));
        assert_eq!(Obtainability::default(), Obtainability::Unchecked);
    }
}
