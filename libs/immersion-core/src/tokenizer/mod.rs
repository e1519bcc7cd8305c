//! Tokenizer adapter.
//!
//! Segmenters plug in through [`Tokenizer`]. Backends feed raw tokens through
//! [`Morpheme::from_token`] so every backend applies the same filtering and
//! reading normalization.

#[cfg(feature = "vibrato")]
pub mod vibrato;

use serde::{Deserialize, Serialize};

/// Coarse part-of-speech tags that never count as vocabulary.
const SYMBOL_POS: [&str; 2] = ["記号", "補助記号"];

/// One content token of a sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Morpheme {
    pub surface: String,
    /// Dictionary (lemma) form.
    pub lemma: String,
    /// Reading in hiragana.
    pub reading: String,
    pub pos: String,
}

impl Morpheme {
    /// Build a morpheme from raw segmenter output.
    ///
    /// Returns `None` for symbols, empty lemmas and blank surfaces. The
    /// reading is converted to hiragana.
    pub fn from_token(surface: &str, lemma: &str, reading: &str, pos: &str) -> Option<Self> {
        if is_symbol_pos(pos) || lemma.is_empty() || surface.trim().is_empty() {
            return None;
        }
        Some(Self {
            surface: surface.to_string(),
            lemma: lemma.to_string(),
            reading: katakana_to_hiragana(reading),
            pos: pos.to_string(),
        })
    }
}

/// A morphological analyzer producing content morphemes.
///
/// Implementations must be restartable: every call is independent of the
/// previous one.
pub trait Tokenizer {
    fn tokenize(&self, text: &str) -> Vec<Morpheme>;
}

impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn tokenize(&self, text: &str) -> Vec<Morpheme> {
        (**self).tokenize(text)
    }
}

/// Strip spaces (ASCII and ideographic) and every ASCII character, then trim.
pub fn normalize_input(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '　' && !c.is_ascii())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Shift katakana in the ァ..=ン block down to hiragana. Other characters,
/// including the long vowel mark, are kept.
pub fn katakana_to_hiragana(text: &str) -> String {
    const OFFSET: u32 = 'ァ' as u32 - 'ぁ' as u32;
    text.chars()
        .map(|c| {
            if ('ァ'..='ン').contains(&c) {
                char::from_u32(c as u32 - OFFSET).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

pub fn is_symbol_pos(pos: &str) -> bool {
    SYMBOL_POS.contains(&pos)
}
