//! Environment configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Column layout of the morphological dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionaryLayout {
    Ipadic,
    Unidic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub media_dirs: Vec<PathBuf>,
    pub words_deck: String,
    pub study_deck: String,
    pub n_plus_one_threshold: u32,
    pub parse_kanji_on_ingest: bool,
    pub prediction_cards: usize,
    pub dictionary_path: Option<PathBuf>,
    pub dictionary_layout: DictionaryLayout,
    pub openai_api_key: Option<String>,
    pub tmdb_api_key: Option<String>,
    pub anki_connect_url: String,
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("immersion-study")
        .join("study_manager.db")
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let dictionary_layout = match get("IMMERSION_DICTIONARY_LAYOUT") {
            None => DictionaryLayout::Unidic,
            Some(v) => match v.to_lowercase().as_str() {
                "ipadic" => DictionaryLayout::Ipadic,
                "unidic" => DictionaryLayout::Unidic,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "IMMERSION_DICTIONARY_LAYOUT",
                        value: v,
                    })
                }
            },
        };

        Ok(Self {
            db_path: get("IMMERSION_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
            media_dirs: get("IMMERSION_MEDIA_DIRS")
                .map(|v| std::env::split_paths(&v).collect())
                .unwrap_or_default(),
            words_deck: get("IMMERSION_WORDS_DECK").unwrap_or_else(|| "Words".to_string()),
            study_deck: get("IMMERSION_STUDY_DECK").unwrap_or_else(|| "Study".to_string()),
            n_plus_one_threshold: parse_number(
                "IMMERSION_N_PLUS_ONE_THRESHOLD",
                get("IMMERSION_N_PLUS_ONE_THRESHOLD"),
                1,
            )?,
            parse_kanji_on_ingest: parse_bool(
                "IMMERSION_PARSE_KANJI_ON_INGEST",
                get("IMMERSION_PARSE_KANJI_ON_INGEST"),
                false,
            )?,
            prediction_cards: parse_number(
                "IMMERSION_PREDICTION_CARDS",
                get("IMMERSION_PREDICTION_CARDS"),
                10,
            )?,
            dictionary_path: get("IMMERSION_DICTIONARY_PATH").map(PathBuf::from),
            dictionary_layout,
            openai_api_key: get("OPENAI_API_KEY"),
            tmdb_api_key: get("TMDB_API_KEY"),
            anki_connect_url: get("ANKI_CONNECT_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8765".to_string()),
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

fn parse_bool(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: v }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.words_deck, "Words");
        assert_eq!(config.study_deck, "Study");
        assert_eq!(config.n_plus_one_threshold, 1);
        assert!(!config.parse_kanji_on_ingest);
        assert_eq!(config.anki_connect_url, "http://127.0.0.1:8765");
        assert_eq!(config.dictionary_layout, DictionaryLayout::Unidic);
        assert!(config.db_path.ends_with("immersion-study/study_manager.db"));
        assert!(config.media_dirs.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("IMMERSION_DB_PATH", "/tmp/study.db"),
            ("IMMERSION_WORDS_DECK", "Mining"),
            ("IMMERSION_N_PLUS_ONE_THRESHOLD", "2"),
            ("IMMERSION_PARSE_KANJI_ON_INGEST", "yes"),
            ("IMMERSION_DICTIONARY_LAYOUT", "IPADIC"),
            ("TMDB_API_KEY", "abc"),
        ])
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/study.db"));
        assert_eq!(config.words_deck, "Mining");
        assert_eq!(config.n_plus_one_threshold, 2);
        assert!(config.parse_kanji_on_ingest);
        assert_eq!(config.dictionary_layout, DictionaryLayout::Ipadic);
        assert_eq!(config.tmdb_api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_malformed_values_are_errors() {
        assert_eq!(
            config(&[("IMMERSION_N_PLUS_ONE_THRESHOLD", "one")]),
            Err(ConfigError::Invalid {
                key: "IMMERSION_N_PLUS_ONE_THRESHOLD",
                value: "one".to_string(),
            })
        );
        assert!(config(&[("IMMERSION_PARSE_KANJI_ON_INGEST", "maybe")]).is_err());
    }
}
