//! Dictionary-based segmenter backed by `vibrato`.

use super::{normalize_input, Morpheme, Tokenizer};
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Column positions of the comma-separated feature string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureLayout {
    pub pos: usize,
    pub lemma: usize,
    pub reading: usize,
}

impl FeatureLayout {
    pub const IPADIC: Self = Self {
        pos: 0,
        lemma: 6,
        reading: 7,
    };

    pub const UNIDIC: Self = Self {
        pos: 0,
        lemma: 7,
        reading: 9,
    };
}

pub struct VibratoTokenizer {
    inner: vibrato::Tokenizer,
    layout: FeatureLayout,
}

impl VibratoTokenizer {
    /// Load a compiled system dictionary.
    pub fn from_reader<R: Read>(rdr: R, layout: FeatureLayout) -> Result<Self> {
        let dict =
            vibrato::Dictionary::read(rdr).map_err(|e| Error::Tokenizer(e.to_string()))?;
        let inner = vibrato::Tokenizer::new(dict)
            .ignore_space(true)
            .map_err(|e| Error::Tokenizer(e.to_string()))?;
        Ok(Self { inner, layout })
    }

    pub fn open(path: impl AsRef<Path>, layout: FeatureLayout) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            Error::Tokenizer(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_reader(BufReader::new(file), layout)
    }
}

impl Tokenizer for VibratoTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Morpheme> {
        let input = normalize_input(text);
        if input.is_empty() {
            return Vec::new();
        }

        let mut worker = self.inner.new_worker();
        worker.reset_sentence(&input);
        worker.tokenize();

        worker
            .token_iter()
            .filter_map(|token| {
                let surface = token.surface();
                let features: Vec<&str> = token.feature().split(',').collect();
                let field = |i: usize| features.get(i).copied().unwrap_or("");
                let pos = field(self.layout.pos);
                // Unknown words carry "*" in place of a lemma.
                let lemma = match field(self.layout.lemma) {
                    "" | "*" => surface,
                    lemma => lemma,
                };
                let reading = match field(self.layout.reading) {
                    "*" => "",
                    reading => reading,
                };
                Morpheme::from_token(surface, lemma, reading, pos)
            })
            .collect()
    }
}
