//! Repository pattern for database access.

use crate::db::error::DbError;
use chrono::{DateTime, Utc};
use immersion_core::coverage::TextLemmas;
use immersion_core::kanji::{contains_kanji, kanji_chars};
use immersion_core::library::MediaKind;
use immersion_core::types::{
    Card, CardId, CompoundForm, Cue, Deck, DeckId, DictFormId, DictionaryForm, KanjiEntry,
    MediaFile, NewCard, Obtainability, Sentence, SentenceId, SurfaceForm, SurfaceFormId, Text,
    TextId, TextKind,
};
use immersion_core::Morpheme;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, DbError>;

const TEXT_SELECT: &str = "SELECT t.text_id, t.source, t.type, t.comprehension_percentage, \
     t.studying, t.content_hash, t.created_at FROM texts t";

const SENTENCE_SELECT: &str = "SELECT s.sentence_id, s.text_id, s.content, s.start_time, \
     s.end_time, s.unknown_dictionary_form_count FROM sentences s";

const DICT_FORM_SELECT: &str = "SELECT df.dict_form_id, df.base_form, df.reading, df.pos, \
     df.frequency, df.known, df.ranking FROM dictionary_forms df";

const SURFACE_FORM_SELECT: &str = "SELECT sf.surface_form_id, sf.dict_form_id, sf.surface_form, \
     sf.reading, sf.pos, sf.frequency, sf.known, sf.kanji_parsed FROM surface_forms sf";

const CARD_SELECT: &str = "SELECT c.card_id, c.deck_id, c.sentence_id, c.anki_card_id, \
     c.deck_origin, c.native_word, c.translated_word, c.word_audio, c.pos, c.native_sentence, \
     c.translated_sentence, c.sentence_audio, c.image, c.reading, c.unobtainable, c.gated \
     FROM cards c";

/// Repository for texts and their sentences.
pub trait TextRepository {
    /// Find-or-create a text by `(source, kind)`.
    fn add_text_source(&self, source: &str, kind: TextKind) -> Result<TextId>;
    fn get_text(&self, id: TextId) -> Result<Option<Text>>;
    fn find_text(&self, source: &str, kind: TextKind) -> Result<Option<Text>>;
    fn list_texts(&self, kind: Option<TextKind>) -> Result<Vec<Text>>;
    fn studying_text_ids(&self) -> Result<Vec<TextId>>;
    fn set_text_studying(&self, id: TextId, studying: bool) -> Result<()>;
    fn set_text_comprehension(&self, id: TextId, percentage: f64) -> Result<()>;
    fn set_text_content_hash(&self, id: TextId, hash: &str) -> Result<()>;
    /// Delete a text with its sentences and prune orphaned forms.
    fn delete_text(&self, id: TextId) -> Result<bool>;

    fn insert_sentence(&self, text_id: TextId, cue: &Cue) -> Result<SentenceId>;
    fn add_sentence_if_not_exist(&self, text_id: TextId, content: &str) -> Result<SentenceId>;
    /// Insert a sentence and link every morpheme to it in one transaction.
    fn ingest_sentence(
        &self,
        text_id: TextId,
        cue: &Cue,
        morphemes: &[Morpheme],
        parse_kanji: bool,
    ) -> Result<SentenceId>;
    fn get_sentence(&self, id: SentenceId) -> Result<Option<Sentence>>;
    fn sentences_for_text(&self, text_id: TextId) -> Result<Vec<Sentence>>;
    fn recompute_sentence_unknown_count(&self, id: SentenceId) -> Result<u32>;
    /// Tear down the sentences of a text before re-ingesting edited content.
    ///
    /// Every frequency the sentences contributed is taken back (lemmas,
    /// surface forms, compounds and kanji), rows reaching zero are deleted and
    /// queued kanji work for them is dropped. Returns the number of sentences
    /// removed.
    fn detach_text_sentences(&self, text_id: TextId) -> Result<usize>;
}

/// Repository for lemmas and surface forms.
pub trait LexiconRepository {
    /// Find-or-create by base form; an existing lemma gains one frequency.
    fn upsert_dictionary_form(&self, base_form: &str, reading: &str, pos: &str)
        -> Result<DictFormId>;
    /// Find-or-create by `(lemma, surface, reading, pos)` and link to the sentence.
    fn upsert_surface_form(
        &self,
        dict_form_id: DictFormId,
        surface_form: &str,
        reading: &str,
        pos: &str,
        sentence_id: SentenceId,
        parse_kanji: bool,
    ) -> Result<SurfaceFormId>;
    fn get_dictionary_form(&self, id: DictFormId) -> Result<Option<DictionaryForm>>;
    fn find_dictionary_form(&self, base_form: &str) -> Result<Option<DictionaryForm>>;
    fn get_surface_form(&self, id: SurfaceFormId) -> Result<Option<SurfaceForm>>;
    /// Surface forms linked to a sentence, one entry per link.
    fn surface_forms_for_sentence(&self, sentence_id: SentenceId) -> Result<Vec<SurfaceForm>>;
    fn set_dictionary_form_known(&self, id: DictFormId, known: bool) -> Result<()>;
    fn set_surface_form_known(&self, id: SurfaceFormId, known: bool) -> Result<()>;
    fn known_dictionary_form_ids(&self) -> Result<HashSet<DictFormId>>;
    fn dictionary_forms_for_text(&self, text_id: TextId) -> Result<Vec<DictionaryForm>>;
    fn unknown_dictionary_forms_for_sentence(
        &self,
        sentence_id: SentenceId,
    ) -> Result<BTreeSet<DictFormId>>;
    fn sentence_ids_for_dictionary_form(&self, id: DictFormId) -> Result<Vec<SentenceId>>;
    /// Refresh the unknown count of every sentence linked to the lemma.
    fn recompute_unknown_counts(&self, dict_form_id: DictFormId) -> Result<usize>;
    /// Per lemma, the summed surface form frequency over links into
    /// studying texts (0 when there are none).
    fn dictionary_form_study_frequencies(&self) -> Result<Vec<(DictFormId, u64)>>;
    fn set_dictionary_form_rankings(&self, rankings: &[(DictFormId, u32)]) -> Result<()>;
    fn dictionary_forms_by_ranking(
        &self,
        limit: usize,
        unknown_only: bool,
    ) -> Result<Vec<DictionaryForm>>;
}

/// Deferred kanji decomposition.
///
/// Ingestion may skip decomposition; every skipped occurrence of a
/// kanji-bearing surface form is queued as a `(surface form, sentence)` pair
/// until [`KanjiQueue::parse_pending_kanji`] drains it.
pub trait KanjiQueue {
    /// Number of queued occurrences.
    fn pending_kanji_count(&self) -> Result<usize>;
    /// Decompose every queued occurrence once and empty the queue.
    fn parse_pending_kanji(&self) -> Result<usize>;
}

/// Repository for compound and kanji rows.
pub trait KanjiRepository {
    fn compound_for_surface_form(&self, surface_form_id: SurfaceFormId)
        -> Result<Option<CompoundForm>>;
    fn kanji_for_surface_form(&self, surface_form_id: SurfaceFormId) -> Result<Vec<KanjiEntry>>;
    fn set_compound_known(&self, compound_id: i64, known: bool) -> Result<()>;
    fn set_kanji_known(&self, kanji_id: i64, known: bool) -> Result<()>;
}

/// Text ranked by how many of a set of lemmas it contains.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TextCoverage {
    pub text_id: TextId,
    pub source: String,
    pub matched: usize,
}

/// Repository for coverage reads.
pub trait CoverageRepository {
    fn dictionary_forms_covered_by_text(&self, text_id: TextId) -> Result<BTreeSet<DictFormId>>;
    /// Whether the lemma occurs in any of `text_ids`. No texts means no.
    fn dictionary_form_covered_by_texts(
        &self,
        dict_form_id: DictFormId,
        text_ids: &[TextId],
    ) -> Result<bool>;
    fn texts_containing_dictionary_form(&self, dict_form_id: DictFormId) -> Result<Vec<TextId>>;
    /// Lemma sets for the given texts, in input order.
    fn text_lemmas(&self, text_ids: &[TextId]) -> Result<Vec<TextLemmas>>;
    fn text_coverage_for_forms(
        &self,
        forms: &[DictFormId],
        kind: TextKind,
    ) -> Result<Vec<TextCoverage>>;
    fn sentences_with_all_dictionary_forms(&self, forms: &[DictFormId])
        -> Result<Vec<SentenceId>>;
}

/// Repository for card operations.
pub trait CardRepository {
    fn add_card(&self, card: &NewCard) -> Result<CardId>;
    fn get_card(&self, id: CardId) -> Result<Option<Card>>;
    fn cards_in_deck(&self, deck_id: DeckId) -> Result<Vec<Card>>;
    fn set_card_anki_id(&self, id: CardId, anki_card_id: i64) -> Result<()>;
    fn set_card_gated(&self, id: CardId, gated: bool) -> Result<()>;
    fn set_card_obtainability(&self, id: CardId, state: Obtainability) -> Result<()>;
    /// Replace the tag set of a card.
    fn update_card_tags(&self, id: CardId, tags: &[String]) -> Result<()>;
    fn card_tags(&self, id: CardId) -> Result<Vec<String>>;
    /// Cards of a deck whose sentence has at most `threshold` unknown lemmas.
    fn n_plus_one_cards(
        &self,
        deck_id: DeckId,
        threshold: u32,
        limit: Option<usize>,
    ) -> Result<Vec<Card>>;
    fn unobtainable_cards_with_unknown_count(&self, count: u32, limit: usize)
        -> Result<Vec<Card>>;
    fn unknown_dictionary_forms_for_card(&self, id: CardId) -> Result<BTreeSet<DictFormId>>;
    /// Unknown lemmas of every gated card.
    fn gated_dictionary_forms(&self) -> Result<BTreeSet<DictFormId>>;
    /// Sum of lemma frequencies over the links of the card's sentence.
    fn card_frequency_score(&self, id: CardId) -> Result<u64>;
    /// External ids of the given cards, skipping cards never pushed.
    fn anki_ids_for_cards(&self, ids: &[CardId]) -> Result<Vec<i64>>;
    fn assign_cards_to_deck(&self, ids: &[CardId], deck_id: DeckId) -> Result<usize>;
    fn card_for_anki_id(&self, anki_card_id: i64) -> Result<Option<Card>>;
}

/// Repository for deck operations.
pub trait DeckRepository {
    fn get_or_create_deck(&self, name: &str) -> Result<DeckId>;
    fn deck_id_by_name(&self, name: &str) -> Result<Option<DeckId>>;
    fn list_decks(&self) -> Result<Vec<Deck>>;
}

/// Repository for the media library.
pub trait LibraryRepository {
    fn add_source_folder(&self, folder_path: &str) -> Result<i64>;
    fn list_source_folders(&self) -> Result<Vec<String>>;
    fn add_media(&self, file_path: &str, kind: MediaKind) -> Result<i64>;
    fn add_subtitle(
        &self,
        media_id: i64,
        subtitle_file: &str,
        language: &str,
        format: &str,
    ) -> Result<i64>;
    fn subtitle_exists(&self, subtitle_file: &str) -> Result<bool>;
    fn list_media(&self) -> Result<Vec<MediaFile>>;
    /// Remove a source folder, a media file, or every media file under a
    /// folder, together with the subtitle texts indexed from them.
    ///
    /// Returns `false` when the path matched nothing.
    fn remove_path(&self, path: &str) -> Result<bool>;
}

/// Overall study statistics.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StudyStats {
    pub n_plus_one_cards: usize,
    pub study_deck_cards: usize,
    pub studying_texts: usize,
    pub average_comprehension: f64,
    pub pending_kanji: usize,
}

/// Repository for statistics operations.
pub trait StatsRepository {
    fn study_stats(&self, words_deck: &str, study_deck: &str, threshold: u32)
        -> Result<StudyStats>;
}

/// SQLite implementation of repositories.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open database at path, creating if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    /// Open in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(super::schema::SCHEMA)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            params![super::schema::SCHEMA_VERSION],
        )?;
        Ok(())
    }

    fn row_to_text(row: &Row) -> rusqlite::Result<Text> {
        let tag: String = row.get(2)?;
        let kind = TextKind::from_str(&tag).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                Box::new(immersion_core::Error::UnknownTextKind(tag.clone())),
            )
        })?;
        Ok(Text {
            id: row.get(0)?,
            source: row.get(1)?,
            kind,
            comprehension_percentage: row.get(3)?,
            studying: row.get(4)?,
            content_hash: row.get(5)?,
            created_at: row
                .get::<_, Option<String>>(6)?
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|dt| dt.with_timezone(&Utc))),
        })
    }

    fn row_to_sentence(row: &Row) -> rusqlite::Result<Sentence> {
        Ok(Sentence {
            id: row.get(0)?,
            text_id: row.get(1)?,
            content: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            unknown_dictionary_form_count: row.get(5)?,
        })
    }

    fn row_to_dictionary_form(row: &Row) -> rusqlite::Result<DictionaryForm> {
        Ok(DictionaryForm {
            id: row.get(0)?,
            base_form: row.get(1)?,
            reading: row.get(2)?,
            pos: row.get(3)?,
            frequency: row.get(4)?,
            known: row.get(5)?,
            ranking: row.get(6)?,
        })
    }

    fn row_to_surface_form(row: &Row) -> rusqlite::Result<SurfaceForm> {
        Ok(SurfaceForm {
            id: row.get(0)?,
            dict_form_id: row.get(1)?,
            surface_form: row.get(2)?,
            reading: row.get(3)?,
            pos: row.get(4)?,
            frequency: row.get(5)?,
            known: row.get(6)?,
            kanji_parsed: row.get(7)?,
        })
    }

    fn row_to_card(row: &Row) -> rusqlite::Result<Card> {
        Ok(Card {
            id: row.get(0)?,
            deck_id: row.get(1)?,
            sentence_id: row.get(2)?,
            anki_card_id: row.get(3)?,
            deck_origin: row.get(4)?,
            native_word: row.get(5)?,
            translated_word: row.get(6)?,
            word_audio: row.get(7)?,
            pos: row.get(8)?,
            native_sentence: row.get(9)?,
            translated_sentence: row.get(10)?,
            sentence_audio: row.get(11)?,
            image: row.get(12)?,
            reading: row.get(13)?,
            obtainability: Obtainability::from_flag(row.get(14)?),
            gated: row.get(15)?,
        })
    }

    fn ids(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map(params, |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn cards(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Card>> {
        let mut stmt = self.conn.prepare(sql)?;
        let cards = stmt
            .query_map(params, Self::row_to_card)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    fn ensure_card_updated(id: CardId, changed: usize) -> Result<()> {
        if changed == 0 {
            return Err(DbError::CardNotFound(id));
        }
        Ok(())
    }

    fn ensure_text_updated(id: TextId, changed: usize) -> Result<()> {
        if changed == 0 {
            return Err(DbError::TextNotFound(id));
        }
        Ok(())
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn normalize_path(path: &str) -> PathBuf {
    Path::new(path).components().collect()
}

fn upsert_dictionary_form_in(
    conn: &Connection,
    base_form: &str,
    reading: &str,
    pos: &str,
) -> Result<DictFormId> {
    let existing: Option<DictFormId> = conn
        .query_row(
            "SELECT dict_form_id FROM dictionary_forms WHERE base_form = ?1",
            params![base_form],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        conn.execute(
            "UPDATE dictionary_forms SET frequency = frequency + 1 WHERE dict_form_id = ?1",
            params![id],
        )?;
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO dictionary_forms (base_form, reading, pos, frequency) VALUES (?1, ?2, ?3, 1)",
        params![base_form, reading, pos],
    )?;
    Ok(conn.last_insert_rowid())
}

fn upsert_surface_form_in(
    conn: &Connection,
    dict_form_id: DictFormId,
    surface_form: &str,
    reading: &str,
    pos: &str,
    sentence_id: SentenceId,
    parse_kanji: bool,
) -> Result<SurfaceFormId> {
    let existing: Option<SurfaceFormId> = conn
        .query_row(
            "SELECT surface_form_id FROM surface_forms
             WHERE dict_form_id = ?1 AND surface_form = ?2 AND reading = ?3 AND pos = ?4",
            params![dict_form_id, surface_form, reading, pos],
            |row| row.get(0),
        )
        .optional()?;

    let id = match existing {
        Some(id) => {
            conn.execute(
                "UPDATE surface_forms SET frequency = frequency + 1 WHERE surface_form_id = ?1",
                params![id],
            )?;
            id
        }
        None => {
            conn.execute(
                "INSERT INTO surface_forms (dict_form_id, surface_form, reading, pos, frequency)
                 VALUES (?1, ?2, ?3, ?4, 1)",
                params![dict_form_id, surface_form, reading, pos],
            )?;
            conn.last_insert_rowid()
        }
    };

    conn.execute(
        "INSERT INTO surface_form_sentences (surface_form_id, sentence_id) VALUES (?1, ?2)",
        params![id, sentence_id],
    )?;

    if contains_kanji(surface_form) {
        if parse_kanji {
            decompose_kanji_in(conn, id, surface_form, Some(sentence_id), None)?;
        } else {
            conn.execute(
                "INSERT INTO kanji_pending (surface_form_id, sentence_id) VALUES (?1, ?2)",
                params![id, sentence_id],
            )?;
        }
    }
    refresh_kanji_parsed_in(conn, id)?;

    Ok(id)
}

/// `kanji_parsed` holds while no occurrence of the form is queued.
fn refresh_kanji_parsed_in(conn: &Connection, surface_form_id: SurfaceFormId) -> Result<()> {
    conn.execute(
        "UPDATE surface_forms SET kanji_parsed = NOT EXISTS (
            SELECT 1 FROM kanji_pending kp WHERE kp.surface_form_id = surface_forms.surface_form_id
         )
         WHERE surface_form_id = ?1",
        params![surface_form_id],
    )?;
    Ok(())
}

/// Register one occurrence of a kanji-bearing surface form.
fn decompose_kanji_in(
    conn: &Connection,
    surface_form_id: SurfaceFormId,
    compound_text: &str,
    sentence_id: Option<SentenceId>,
    card_id: Option<CardId>,
) -> Result<()> {
    let chars = kanji_chars(compound_text);
    if chars.is_empty() {
        return Ok(());
    }

    conn.execute(
        "INSERT INTO compound_forms (surface_form_id, compound_text, frequency) VALUES (?1, ?2, 1)
         ON CONFLICT (surface_form_id, compound_text) DO UPDATE SET frequency = frequency + 1",
        params![surface_form_id, compound_text],
    )?;
    let compound_id: i64 = conn.query_row(
        "SELECT compound_id FROM compound_forms WHERE surface_form_id = ?1 AND compound_text = ?2",
        params![surface_form_id, compound_text],
        |row| row.get(0),
    )?;

    for kanji in chars {
        let kanji = kanji.to_string();
        conn.execute(
            "INSERT INTO kanji_entries (compound_id, kanji_char, frequency) VALUES (?1, ?2, 1)
             ON CONFLICT (compound_id, kanji_char) DO UPDATE SET frequency = frequency + 1",
            params![compound_id, kanji],
        )?;
        let kanji_id: i64 = conn.query_row(
            "SELECT kanji_id FROM kanji_entries WHERE compound_id = ?1 AND kanji_char = ?2",
            params![compound_id, kanji],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO kanji_linkage (kanji_id, surface_form_id, sentence_id, card_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![kanji_id, surface_form_id, sentence_id, card_id],
        )?;
    }
    Ok(())
}

fn recompute_sentence_unknown_count_in(conn: &Connection, sentence_id: SentenceId) -> Result<u32> {
    let changed = conn.execute(
        "UPDATE sentences SET unknown_dictionary_form_count = (
            SELECT COUNT(DISTINCT df.dict_form_id)
            FROM dictionary_forms df
            JOIN surface_forms sf ON df.dict_form_id = sf.dict_form_id
            JOIN surface_form_sentences sfs ON sf.surface_form_id = sfs.surface_form_id
            WHERE sfs.sentence_id = sentences.sentence_id AND df.known = 0
         )
         WHERE sentence_id = ?1",
        params![sentence_id],
    )?;
    if changed == 0 {
        return Err(DbError::SentenceNotFound(sentence_id));
    }
    let count = conn.query_row(
        "SELECT unknown_dictionary_form_count FROM sentences WHERE sentence_id = ?1",
        params![sentence_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Take back every count contributed by the sentences of a text, then
/// delete those sentences.
///
/// Lemma and surface form frequencies drop once per link, kanji entries once
/// per linkage row and compounds once per decomposition. Rows reaching zero
/// are deleted. Returns the number of sentences removed.
fn release_text_sentences_in(conn: &Connection, text_id: TextId) -> Result<usize> {
    let compounds: Vec<(i64, String, i64)> = {
        let mut stmt = conn.prepare(
            "SELECT cf.compound_id, cf.compound_text, COUNT(*)
             FROM kanji_linkage kl
             JOIN kanji_entries ke ON ke.kanji_id = kl.kanji_id
             JOIN compound_forms cf ON cf.compound_id = ke.compound_id
             JOIN sentences s ON s.sentence_id = kl.sentence_id
             WHERE s.text_id = ?1
             GROUP BY cf.compound_id",
        )?;
        let rows = stmt.query_map(params![text_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };
    for (compound_id, compound_text, linkages) in compounds {
        let per_decomposition = kanji_chars(&compound_text).len().max(1) as i64;
        conn.execute(
            "UPDATE compound_forms SET frequency = frequency - ?2 WHERE compound_id = ?1",
            params![compound_id, linkages / per_decomposition],
        )?;
    }

    conn.execute(
        "UPDATE kanji_entries SET frequency = frequency - (
            SELECT COUNT(*) FROM kanji_linkage kl
            JOIN sentences s ON s.sentence_id = kl.sentence_id
            WHERE kl.kanji_id = kanji_entries.kanji_id AND s.text_id = ?1
         )
         WHERE kanji_id IN (
            SELECT kl.kanji_id FROM kanji_linkage kl
            JOIN sentences s ON s.sentence_id = kl.sentence_id
            WHERE s.text_id = ?1
         )",
        params![text_id],
    )?;
    conn.execute(
        "UPDATE dictionary_forms SET frequency = frequency - (
            SELECT COUNT(*) FROM surface_form_sentences sfs
            JOIN surface_forms sf ON sf.surface_form_id = sfs.surface_form_id
            JOIN sentences s ON s.sentence_id = sfs.sentence_id
            WHERE sf.dict_form_id = dictionary_forms.dict_form_id AND s.text_id = ?1
         )
         WHERE dict_form_id IN (
            SELECT sf.dict_form_id FROM surface_form_sentences sfs
            JOIN surface_forms sf ON sf.surface_form_id = sfs.surface_form_id
            JOIN sentences s ON s.sentence_id = sfs.sentence_id
            WHERE s.text_id = ?1
         )",
        params![text_id],
    )?;
    conn.execute(
        "UPDATE surface_forms SET frequency = frequency - (
            SELECT COUNT(*) FROM surface_form_sentences sfs
            JOIN sentences s ON s.sentence_id = sfs.sentence_id
            WHERE sfs.surface_form_id = surface_forms.surface_form_id AND s.text_id = ?1
         )
         WHERE surface_form_id IN (
            SELECT sfs.surface_form_id FROM surface_form_sentences sfs
            JOIN sentences s ON s.sentence_id = sfs.sentence_id
            WHERE s.text_id = ?1
         )",
        params![text_id],
    )?;

    let queued: Vec<SurfaceFormId> = {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT kp.surface_form_id FROM kanji_pending kp
             JOIN sentences s ON s.sentence_id = kp.sentence_id
             WHERE s.text_id = ?1",
        )?;
        let rows = stmt.query_map(params![text_id], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };
    conn.execute(
        "DELETE FROM kanji_pending
         WHERE sentence_id IN (SELECT sentence_id FROM sentences WHERE text_id = ?1)",
        params![text_id],
    )?;
    for id in queued {
        refresh_kanji_parsed_in(conn, id)?;
    }

    conn.execute(
        "DELETE FROM kanji_linkage
         WHERE sentence_id IN (SELECT sentence_id FROM sentences WHERE text_id = ?1)",
        params![text_id],
    )?;
    conn.execute("DELETE FROM kanji_entries WHERE frequency <= 0", [])?;
    conn.execute("DELETE FROM compound_forms WHERE frequency <= 0", [])?;
    conn.execute("DELETE FROM surface_forms WHERE frequency <= 0", [])?;
    conn.execute(
        "DELETE FROM surface_form_sentences
         WHERE sentence_id IN (SELECT sentence_id FROM sentences WHERE text_id = ?1)",
        params![text_id],
    )?;
    let removed = conn.execute("DELETE FROM sentences WHERE text_id = ?1", params![text_id])?;
    Ok(removed)
}

/// Delete surface forms without sentence links, then lemmas without
/// surface forms.
fn prune_orphans_in(conn: &Connection) -> Result<(usize, usize)> {
    let surface = conn.execute(
        "DELETE FROM surface_forms
         WHERE surface_form_id NOT IN (SELECT surface_form_id FROM surface_form_sentences)",
        [],
    )?;
    let lemmas = conn.execute(
        "DELETE FROM dictionary_forms
         WHERE dict_form_id NOT IN (SELECT dict_form_id FROM surface_forms)",
        [],
    )?;
    Ok((surface, lemmas))
}

impl TextRepository for SqliteRepository {
    fn add_text_source(&self, source: &str, kind: TextKind) -> Result<TextId> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO texts (source, type, created_at) VALUES (?1, ?2, ?3)",
            params![source, kind.as_str(), now],
        )?;
        let id = self.conn.query_row(
            "SELECT text_id FROM texts WHERE source = ?1 AND type = ?2",
            params![source, kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_text(&self, id: TextId) -> Result<Option<Text>> {
        self.conn
            .query_row(
                &format!("{TEXT_SELECT} WHERE t.text_id = ?1"),
                params![id],
                Self::row_to_text,
            )
            .optional()
            .map_err(Into::into)
    }

    fn find_text(&self, source: &str, kind: TextKind) -> Result<Option<Text>> {
        self.conn
            .query_row(
                &format!("{TEXT_SELECT} WHERE t.source = ?1 AND t.type = ?2"),
                params![source, kind.as_str()],
                Self::row_to_text,
            )
            .optional()
            .map_err(Into::into)
    }

    fn list_texts(&self, kind: Option<TextKind>) -> Result<Vec<Text>> {
        let texts = match kind {
            Some(kind) => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{TEXT_SELECT} WHERE t.type = ?1 ORDER BY t.text_id"))?;
                let rows = stmt.query_map(params![kind.as_str()], Self::row_to_text)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{TEXT_SELECT} ORDER BY t.text_id"))?;
                let rows = stmt.query_map([], Self::row_to_text)?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(texts)
    }

    fn studying_text_ids(&self) -> Result<Vec<TextId>> {
        self.ids(
            "SELECT text_id FROM texts WHERE studying = 1 ORDER BY text_id",
            [],
        )
    }

    fn set_text_studying(&self, id: TextId, studying: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE texts SET studying = ?1 WHERE text_id = ?2",
            params![studying, id],
        )?;
        Self::ensure_text_updated(id, changed)
    }

    fn set_text_comprehension(&self, id: TextId, percentage: f64) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE texts SET comprehension_percentage = ?1 WHERE text_id = ?2",
            params![percentage, id],
        )?;
        Self::ensure_text_updated(id, changed)
    }

    fn set_text_content_hash(&self, id: TextId, hash: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE texts SET content_hash = ?1 WHERE text_id = ?2",
            params![hash, id],
        )?;
        Self::ensure_text_updated(id, changed)
    }

    fn delete_text(&self, id: TextId) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        release_text_sentences_in(&tx, id)?;
        let deleted = tx.execute("DELETE FROM texts WHERE text_id = ?1", params![id])?;
        if deleted > 0 {
            prune_orphans_in(&tx)?;
        }
        tx.commit()?;
        Ok(deleted > 0)
    }

    fn insert_sentence(&self, text_id: TextId, cue: &Cue) -> Result<SentenceId> {
        self.conn.execute(
            "INSERT INTO sentences (text_id, content, start_time, end_time) VALUES (?1, ?2, ?3, ?4)",
            params![text_id, cue.content, cue.start_time, cue.end_time],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn add_sentence_if_not_exist(&self, text_id: TextId, content: &str) -> Result<SentenceId> {
        let existing: Option<SentenceId> = self
            .conn
            .query_row(
                "SELECT sentence_id FROM sentences WHERE text_id = ?1 AND content = ?2",
                params![text_id, content],
                |row| row.get(0),
            )
            .optional()?;
        match existing {
            Some(id) => Ok(id),
            None => self.insert_sentence(text_id, &Cue::line(content)),
        }
    }

    fn ingest_sentence(
        &self,
        text_id: TextId,
        cue: &Cue,
        morphemes: &[Morpheme],
        parse_kanji: bool,
    ) -> Result<SentenceId> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO sentences (text_id, content, start_time, end_time) VALUES (?1, ?2, ?3, ?4)",
            params![text_id, cue.content, cue.start_time, cue.end_time],
        )?;
        let sentence_id = tx.last_insert_rowid();

        for m in morphemes {
            let dict_form_id = upsert_dictionary_form_in(&tx, &m.lemma, &m.reading, &m.pos)?;
            upsert_surface_form_in(
                &tx,
                dict_form_id,
                &m.surface,
                &m.reading,
                &m.pos,
                sentence_id,
                parse_kanji,
            )?;
        }
        recompute_sentence_unknown_count_in(&tx, sentence_id)?;
        tx.commit()?;
        Ok(sentence_id)
    }

    fn get_sentence(&self, id: SentenceId) -> Result<Option<Sentence>> {
        self.conn
            .query_row(
                &format!("{SENTENCE_SELECT} WHERE s.sentence_id = ?1"),
                params![id],
                Self::row_to_sentence,
            )
            .optional()
            .map_err(Into::into)
    }

    fn sentences_for_text(&self, text_id: TextId) -> Result<Vec<Sentence>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SENTENCE_SELECT} WHERE s.text_id = ?1 ORDER BY s.sentence_id"))?;
        let sentences = stmt
            .query_map(params![text_id], Self::row_to_sentence)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sentences)
    }

    fn recompute_sentence_unknown_count(&self, id: SentenceId) -> Result<u32> {
        recompute_sentence_unknown_count_in(&self.conn, id)
    }

    fn detach_text_sentences(&self, text_id: TextId) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = release_text_sentences_in(&tx, text_id)?;
        prune_orphans_in(&tx)?;
        tx.commit()?;
        Ok(removed)
    }
}

impl LexiconRepository for SqliteRepository {
    fn upsert_dictionary_form(
        &self,
        base_form: &str,
        reading: &str,
        pos: &str,
    ) -> Result<DictFormId> {
        upsert_dictionary_form_in(&self.conn, base_form, reading, pos)
    }

    fn upsert_surface_form(
        &self,
        dict_form_id: DictFormId,
        surface_form: &str,
        reading: &str,
        pos: &str,
        sentence_id: SentenceId,
        parse_kanji: bool,
    ) -> Result<SurfaceFormId> {
        let tx = self.conn.unchecked_transaction()?;
        let id = upsert_surface_form_in(
            &tx,
            dict_form_id,
            surface_form,
            reading,
            pos,
            sentence_id,
            parse_kanji,
        )?;
        tx.commit()?;
        Ok(id)
    }

    fn get_dictionary_form(&self, id: DictFormId) -> Result<Option<DictionaryForm>> {
        self.conn
            .query_row(
                &format!("{DICT_FORM_SELECT} WHERE df.dict_form_id = ?1"),
                params![id],
                Self::row_to_dictionary_form,
            )
            .optional()
            .map_err(Into::into)
    }

    fn find_dictionary_form(&self, base_form: &str) -> Result<Option<DictionaryForm>> {
        self.conn
            .query_row(
                &format!("{DICT_FORM_SELECT} WHERE df.base_form = ?1"),
                params![base_form],
                Self::row_to_dictionary_form,
            )
            .optional()
            .map_err(Into::into)
    }

    fn get_surface_form(&self, id: SurfaceFormId) -> Result<Option<SurfaceForm>> {
        self.conn
            .query_row(
                &format!("{SURFACE_FORM_SELECT} WHERE sf.surface_form_id = ?1"),
                params![id],
                Self::row_to_surface_form,
            )
            .optional()
            .map_err(Into::into)
    }

    fn surface_forms_for_sentence(&self, sentence_id: SentenceId) -> Result<Vec<SurfaceForm>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SURFACE_FORM_SELECT}
             JOIN surface_form_sentences sfs ON sf.surface_form_id = sfs.surface_form_id
             WHERE sfs.sentence_id = ?1
             ORDER BY sfs.rowid"
        ))?;
        let forms = stmt
            .query_map(params![sentence_id], Self::row_to_surface_form)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(forms)
    }

    fn set_dictionary_form_known(&self, id: DictFormId, known: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE dictionary_forms SET known = ?1 WHERE dict_form_id = ?2",
            params![known, id],
        )?;
        Ok(())
    }

    fn set_surface_form_known(&self, id: SurfaceFormId, known: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE surface_forms SET known = ?1 WHERE surface_form_id = ?2",
            params![known, id],
        )?;
        Ok(())
    }

    fn known_dictionary_form_ids(&self) -> Result<HashSet<DictFormId>> {
        let ids = self.ids("SELECT dict_form_id FROM dictionary_forms WHERE known = 1", [])?;
        Ok(ids.into_iter().collect())
    }

    fn dictionary_forms_for_text(&self, text_id: TextId) -> Result<Vec<DictionaryForm>> {
        let mut stmt = self.conn.prepare(&format!(
            "{DICT_FORM_SELECT}
             WHERE df.dict_form_id IN (
                SELECT sf.dict_form_id FROM surface_forms sf
                JOIN surface_form_sentences sfs ON sf.surface_form_id = sfs.surface_form_id
                JOIN sentences s ON s.sentence_id = sfs.sentence_id
                WHERE s.text_id = ?1
             )
             ORDER BY df.dict_form_id"
        ))?;
        let forms = stmt
            .query_map(params![text_id], Self::row_to_dictionary_form)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(forms)
    }

    fn unknown_dictionary_forms_for_sentence(
        &self,
        sentence_id: SentenceId,
    ) -> Result<BTreeSet<DictFormId>> {
        let ids = self.ids(
            "SELECT DISTINCT df.dict_form_id
             FROM dictionary_forms df
             JOIN surface_forms sf ON df.dict_form_id = sf.dict_form_id
             JOIN surface_form_sentences sfs ON sf.surface_form_id = sfs.surface_form_id
             WHERE sfs.sentence_id = ?1 AND df.known = 0",
            params![sentence_id],
        )?;
        Ok(ids.into_iter().collect())
    }

    fn sentence_ids_for_dictionary_form(&self, id: DictFormId) -> Result<Vec<SentenceId>> {
        self.ids(
            "SELECT DISTINCT sfs.sentence_id
             FROM surface_form_sentences sfs
             JOIN surface_forms sf ON sfs.surface_form_id = sf.surface_form_id
             WHERE sf.dict_form_id = ?1
             ORDER BY sfs.sentence_id",
            params![id],
        )
    }

    fn recompute_unknown_counts(&self, dict_form_id: DictFormId) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE sentences SET unknown_dictionary_form_count = (
                SELECT COUNT(DISTINCT df.dict_form_id)
                FROM dictionary_forms df
                JOIN surface_forms sf ON df.dict_form_id = sf.dict_form_id
                JOIN surface_form_sentences sfs ON sf.surface_form_id = sfs.surface_form_id
                WHERE sfs.sentence_id = sentences.sentence_id AND df.known = 0
             )
             WHERE sentence_id IN (
                SELECT DISTINCT sfs.sentence_id
                FROM surface_forms sf
                JOIN surface_form_sentences sfs ON sf.surface_form_id = sfs.surface_form_id
                WHERE sf.dict_form_id = ?1
             )",
            params![dict_form_id],
        )?;
        Ok(changed)
    }

    fn dictionary_form_study_frequencies(&self) -> Result<Vec<(DictFormId, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT df.dict_form_id,
                    IFNULL(SUM(CASE WHEN t.studying = 1 THEN sf.frequency ELSE 0 END), 0)
             FROM dictionary_forms df
             LEFT JOIN surface_forms sf ON df.dict_form_id = sf.dict_form_id
             LEFT JOIN surface_form_sentences sfs ON sf.surface_form_id = sfs.surface_form_id
             LEFT JOIN sentences s ON sfs.sentence_id = s.sentence_id
             LEFT JOIN texts t ON s.text_id = t.text_id
             GROUP BY df.dict_form_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let total: i64 = row.get(1)?;
                Ok((row.get(0)?, total.max(0) as u64))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn set_dictionary_form_rankings(&self, rankings: &[(DictFormId, u32)]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt =
                tx.prepare("UPDATE dictionary_forms SET ranking = ?1 WHERE dict_form_id = ?2")?;
            for (id, rank) in rankings {
                stmt.execute(params![rank, id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn dictionary_forms_by_ranking(
        &self,
        limit: usize,
        unknown_only: bool,
    ) -> Result<Vec<DictionaryForm>> {
        let filter = if unknown_only { "AND df.known = 0" } else { "" };
        let mut stmt = self.conn.prepare(&format!(
            "{DICT_FORM_SELECT} WHERE df.ranking IS NOT NULL {filter}
             ORDER BY df.ranking LIMIT ?1"
        ))?;
        let forms = stmt
            .query_map(params![limit], Self::row_to_dictionary_form)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(forms)
    }
}

impl KanjiQueue for SqliteRepository {
    fn pending_kanji_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM kanji_pending", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn parse_pending_kanji(&self) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;

        let pending: Vec<(SurfaceFormId, String, SentenceId)> = {
            let mut stmt = tx.prepare(
                "SELECT kp.surface_form_id, sf.surface_form, kp.sentence_id
                 FROM kanji_pending kp
                 JOIN surface_forms sf ON sf.surface_form_id = kp.surface_form_id
                 ORDER BY kp.rowid",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let mut forms = BTreeSet::new();
        for (id, surface, sentence_id) in &pending {
            decompose_kanji_in(&tx, *id, surface, Some(*sentence_id), None)?;
            forms.insert(*id);
        }
        tx.execute("DELETE FROM kanji_pending", [])?;
        for id in forms {
            refresh_kanji_parsed_in(&tx, id)?;
        }

        tx.commit()?;
        tracing::debug!(occurrences = pending.len(), "parsed pending kanji");
        Ok(pending.len())
    }
}

impl KanjiRepository for SqliteRepository {
    fn compound_for_surface_form(
        &self,
        surface_form_id: SurfaceFormId,
    ) -> Result<Option<CompoundForm>> {
        self.conn
            .query_row(
                "SELECT compound_id, surface_form_id, compound_text, frequency, known, ranking
                 FROM compound_forms WHERE surface_form_id = ?1
                 ORDER BY compound_id LIMIT 1",
                params![surface_form_id],
                |row| {
                    Ok(CompoundForm {
                        id: row.get(0)?,
                        surface_form_id: row.get(1)?,
                        compound_text: row.get(2)?,
                        frequency: row.get(3)?,
                        known: row.get(4)?,
                        ranking: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    fn kanji_for_surface_form(&self, surface_form_id: SurfaceFormId) -> Result<Vec<KanjiEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT k.kanji_id, k.compound_id, k.kanji_char, k.frequency, k.known, k.ranking
             FROM kanji_entries k
             JOIN compound_forms c ON c.compound_id = k.compound_id
             WHERE c.surface_form_id = ?1
             ORDER BY k.kanji_id",
        )?;
        let entries = stmt
            .query_map(params![surface_form_id], |row| {
                Ok(KanjiEntry {
                    id: row.get(0)?,
                    compound_id: row.get(1)?,
                    kanji_char: row.get(2)?,
                    frequency: row.get(3)?,
                    known: row.get(4)?,
                    ranking: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn set_compound_known(&self, compound_id: i64, known: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE compound_forms SET known = ?1 WHERE compound_id = ?2",
            params![known, compound_id],
        )?;
        Ok(())
    }

    fn set_kanji_known(&self, kanji_id: i64, known: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE kanji_entries SET known = ?1 WHERE kanji_id = ?2",
            params![known, kanji_id],
        )?;
        Ok(())
    }
}

impl CoverageRepository for SqliteRepository {
    fn dictionary_forms_covered_by_text(&self, text_id: TextId) -> Result<BTreeSet<DictFormId>> {
        let ids = self.ids(
            "SELECT DISTINCT sf.dict_form_id
             FROM surface_forms sf
             JOIN surface_form_sentences sfs ON sf.surface_form_id = sfs.surface_form_id
             JOIN sentences s ON s.sentence_id = sfs.sentence_id
             WHERE s.text_id = ?1",
            params![text_id],
        )?;
        Ok(ids.into_iter().collect())
    }

    fn dictionary_form_covered_by_texts(
        &self,
        dict_form_id: DictFormId,
        text_ids: &[TextId],
    ) -> Result<bool> {
        if text_ids.is_empty() {
            return Ok(false);
        }
        let sql = format!(
            "SELECT COUNT(*)
             FROM surface_forms sf
             JOIN surface_form_sentences sfs ON sf.surface_form_id = sfs.surface_form_id
             JOIN sentences s ON sfs.sentence_id = s.sentence_id
             WHERE sf.dict_form_id = ? AND s.text_id IN ({})",
            placeholders(text_ids.len())
        );
        let values = std::iter::once(dict_form_id).chain(text_ids.iter().copied());
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(count > 0)
    }

    fn texts_containing_dictionary_form(&self, dict_form_id: DictFormId) -> Result<Vec<TextId>> {
        self.ids(
            "SELECT DISTINCT s.text_id
             FROM surface_forms sf
             JOIN surface_form_sentences sfs ON sf.surface_form_id = sfs.surface_form_id
             JOIN sentences s ON s.sentence_id = sfs.sentence_id
             WHERE sf.dict_form_id = ?1
             ORDER BY s.text_id",
            params![dict_form_id],
        )
    }

    fn text_lemmas(&self, text_ids: &[TextId]) -> Result<Vec<TextLemmas>> {
        text_ids
            .iter()
            .map(|&text_id| -> Result<TextLemmas> {
                Ok(TextLemmas {
                    text_id,
                    lemmas: self.dictionary_forms_covered_by_text(text_id)?,
                })
            })
            .collect()
    }

    fn text_coverage_for_forms(
        &self,
        forms: &[DictFormId],
        kind: TextKind,
    ) -> Result<Vec<TextCoverage>> {
        if forms.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT t.text_id, t.source, COUNT(DISTINCT sf.dict_form_id) AS matched
             FROM texts t
             JOIN sentences s ON t.text_id = s.text_id
             JOIN surface_form_sentences sfs ON s.sentence_id = sfs.sentence_id
             JOIN surface_forms sf ON sfs.surface_form_id = sf.surface_form_id
             WHERE t.type = ? AND sf.dict_form_id IN ({})
             GROUP BY t.text_id
             ORDER BY matched DESC, t.text_id",
            placeholders(forms.len())
        );
        let kind_value: rusqlite::types::Value = kind.as_str().to_string().into();
        let values = std::iter::once(kind_value)
            .chain(forms.iter().map(|&id| rusqlite::types::Value::from(id)));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                let matched: i64 = row.get(2)?;
                Ok(TextCoverage {
                    text_id: row.get(0)?,
                    source: row.get(1)?,
                    matched: matched as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn sentences_with_all_dictionary_forms(
        &self,
        forms: &[DictFormId],
    ) -> Result<Vec<SentenceId>> {
        let distinct: BTreeSet<DictFormId> = forms.iter().copied().collect();
        if distinct.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT sfs.sentence_id
             FROM surface_form_sentences sfs
             JOIN surface_forms sf ON sfs.surface_form_id = sf.surface_form_id
             WHERE sf.dict_form_id IN ({})
             GROUP BY sfs.sentence_id
             HAVING COUNT(DISTINCT sf.dict_form_id) = ?
             ORDER BY sfs.sentence_id",
            placeholders(distinct.len())
        );
        let values = distinct
            .iter()
            .copied()
            .chain(std::iter::once(distinct.len() as i64));
        self.ids(&sql, params_from_iter(values))
    }
}

impl CardRepository for SqliteRepository {
    fn add_card(&self, card: &NewCard) -> Result<CardId> {
        self.conn.execute(
            "INSERT INTO cards (deck_id, sentence_id, anki_card_id, deck_origin, native_word,
                translated_word, word_audio, pos, native_sentence, translated_sentence,
                sentence_audio, image, reading)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                card.deck_id,
                card.sentence_id,
                card.anki_card_id,
                card.deck_origin,
                card.native_word,
                card.translated_word,
                card.word_audio,
                card.pos,
                card.native_sentence,
                card.translated_sentence,
                card.sentence_audio,
                card.image,
                card.reading,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_card(&self, id: CardId) -> Result<Option<Card>> {
        self.conn
            .query_row(
                &format!("{CARD_SELECT} WHERE c.card_id = ?1"),
                params![id],
                Self::row_to_card,
            )
            .optional()
            .map_err(Into::into)
    }

    fn cards_in_deck(&self, deck_id: DeckId) -> Result<Vec<Card>> {
        self.cards(
            &format!("{CARD_SELECT} WHERE c.deck_id = ?1 ORDER BY c.card_id"),
            params![deck_id],
        )
    }

    fn set_card_anki_id(&self, id: CardId, anki_card_id: i64) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE cards SET anki_card_id = ?1 WHERE card_id = ?2",
            params![anki_card_id, id],
        )?;
        Self::ensure_card_updated(id, changed)
    }

    fn set_card_gated(&self, id: CardId, gated: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE cards SET gated = ?1 WHERE card_id = ?2",
            params![gated, id],
        )?;
        Self::ensure_card_updated(id, changed)
    }

    fn set_card_obtainability(&self, id: CardId, state: Obtainability) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE cards SET unobtainable = ?1 WHERE card_id = ?2",
            params![state.to_flag(), id],
        )?;
        Self::ensure_card_updated(id, changed)
    }

    fn update_card_tags(&self, id: CardId, tags: &[String]) -> Result<()> {
        if self.get_card(id)?.is_none() {
            return Err(DbError::CardNotFound(id));
        }
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM card_tags WHERE card_id = ?1", params![id])?;
        for tag in tags {
            tx.execute(
                "INSERT OR IGNORE INTO card_tags (card_id, tag) VALUES (?1, ?2)",
                params![id, tag],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn card_tags(&self, id: CardId) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag FROM card_tags WHERE card_id = ?1 ORDER BY tag")?;
        let tags = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(tags)
    }

    fn n_plus_one_cards(
        &self,
        deck_id: DeckId,
        threshold: u32,
        limit: Option<usize>,
    ) -> Result<Vec<Card>> {
        let limit = limit.map_or(-1, |l| l as i64);
        self.cards(
            &format!(
                "{CARD_SELECT}
                 JOIN sentences s ON c.sentence_id = s.sentence_id
                 WHERE c.deck_id = ?1 AND s.unknown_dictionary_form_count <= ?2
                 ORDER BY c.card_id
                 LIMIT ?3"
            ),
            params![deck_id, threshold, limit],
        )
    }

    fn unobtainable_cards_with_unknown_count(
        &self,
        count: u32,
        limit: usize,
    ) -> Result<Vec<Card>> {
        self.cards(
            &format!(
                "{CARD_SELECT}
                 JOIN sentences s ON c.sentence_id = s.sentence_id
                 WHERE c.unobtainable = 1 AND s.unknown_dictionary_form_count = ?1
                 ORDER BY c.card_id
                 LIMIT ?2"
            ),
            params![count, limit],
        )
    }

    fn unknown_dictionary_forms_for_card(&self, id: CardId) -> Result<BTreeSet<DictFormId>> {
        let ids = self.ids(
            "SELECT DISTINCT sf.dict_form_id
             FROM cards c
             JOIN surface_form_sentences sfs ON sfs.sentence_id = c.sentence_id
             JOIN surface_forms sf ON sf.surface_form_id = sfs.surface_form_id
             JOIN dictionary_forms df ON df.dict_form_id = sf.dict_form_id
             WHERE c.card_id = ?1 AND df.known = 0",
            params![id],
        )?;
        Ok(ids.into_iter().collect())
    }

    fn gated_dictionary_forms(&self) -> Result<BTreeSet<DictFormId>> {
        let ids = self.ids(
            "SELECT DISTINCT sf.dict_form_id
             FROM cards c
             JOIN surface_form_sentences sfs ON sfs.sentence_id = c.sentence_id
             JOIN surface_forms sf ON sf.surface_form_id = sfs.surface_form_id
             JOIN dictionary_forms df ON df.dict_form_id = sf.dict_form_id
             WHERE c.gated = 1 AND df.known = 0",
            [],
        )?;
        Ok(ids.into_iter().collect())
    }

    fn card_frequency_score(&self, id: CardId) -> Result<u64> {
        let score: i64 = self.conn.query_row(
            "SELECT IFNULL(SUM(df.frequency), 0)
             FROM cards c
             JOIN surface_form_sentences sfs ON sfs.sentence_id = c.sentence_id
             JOIN surface_forms sf ON sf.surface_form_id = sfs.surface_form_id
             JOIN dictionary_forms df ON df.dict_form_id = sf.dict_form_id
             WHERE c.card_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(score.max(0) as u64)
    }

    fn anki_ids_for_cards(&self, ids: &[CardId]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.ids(
            &format!(
                "SELECT anki_card_id FROM cards
                 WHERE card_id IN ({}) AND anki_card_id IS NOT NULL
                 ORDER BY card_id",
                placeholders(ids.len())
            ),
            params_from_iter(ids.iter()),
        )
    }

    fn assign_cards_to_deck(&self, ids: &[CardId], deck_id: DeckId) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE cards SET deck_id = ? WHERE card_id IN ({})",
            placeholders(ids.len())
        );
        let values = std::iter::once(deck_id).chain(ids.iter().copied());
        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(changed)
    }

    fn card_for_anki_id(&self, anki_card_id: i64) -> Result<Option<Card>> {
        self.conn
            .query_row(
                &format!("{CARD_SELECT} WHERE c.anki_card_id = ?1"),
                params![anki_card_id],
                Self::row_to_card,
            )
            .optional()
            .map_err(Into::into)
    }
}

impl DeckRepository for SqliteRepository {
    fn get_or_create_deck(&self, name: &str) -> Result<DeckId> {
        self.conn.execute(
            "INSERT OR IGNORE INTO decks (name) VALUES (?1)",
            params![name],
        )?;
        let id = self.conn.query_row(
            "SELECT deck_id FROM decks WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn deck_id_by_name(&self, name: &str) -> Result<Option<DeckId>> {
        self.conn
            .query_row(
                "SELECT deck_id FROM decks WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn list_decks(&self) -> Result<Vec<Deck>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.deck_id, d.name, COUNT(c.card_id)
             FROM decks d
             LEFT JOIN cards c ON c.deck_id = d.deck_id
             GROUP BY d.deck_id
             ORDER BY d.name",
        )?;
        let decks = stmt
            .query_map([], |row| {
                let count: i64 = row.get(2)?;
                Ok(Deck {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    card_count: count as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(decks)
    }
}

impl LibraryRepository for SqliteRepository {
    fn add_source_folder(&self, folder_path: &str) -> Result<i64> {
        let path = normalize_path(folder_path).to_string_lossy().to_string();
        self.conn.execute(
            "INSERT OR IGNORE INTO sources (folder_path) VALUES (?1)",
            params![path],
        )?;
        let id = self.conn.query_row(
            "SELECT source_id FROM sources WHERE folder_path = ?1",
            params![path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn list_source_folders(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT folder_path FROM sources ORDER BY folder_path")?;
        let folders = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(folders)
    }

    fn add_media(&self, file_path: &str, kind: MediaKind) -> Result<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO media (file_path, type) VALUES (?1, ?2)",
            params![file_path, kind.as_str()],
        )?;
        let id = self.conn.query_row(
            "SELECT media_id FROM media WHERE file_path = ?1",
            params![file_path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn add_subtitle(
        &self,
        media_id: i64,
        subtitle_file: &str,
        language: &str,
        format: &str,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO subtitles (media_id, subtitle_file, language, format)
             VALUES (?1, ?2, ?3, ?4)",
            params![media_id, subtitle_file, language, format],
        )?;
        let id = self.conn.query_row(
            "SELECT sub_id FROM subtitles WHERE subtitle_file = ?1",
            params![subtitle_file],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn subtitle_exists(&self, subtitle_file: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM subtitles WHERE subtitle_file = ?1",
            params![subtitle_file],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn list_media(&self) -> Result<Vec<MediaFile>> {
        let mut stmt = self
            .conn
            .prepare("SELECT media_id, file_path FROM media ORDER BY file_path")?;
        let media = stmt
            .query_map([], |row| {
                Ok(MediaFile {
                    media_id: row.get(0)?,
                    path: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(media)
    }

    fn remove_path(&self, path: &str) -> Result<bool> {
        let target = normalize_path(path);
        let target_str = target.to_string_lossy().to_string();
        let tx = self.conn.unchecked_transaction()?;

        let source_id: Option<i64> = tx
            .query_row(
                "SELECT source_id FROM sources WHERE folder_path = ?1",
                params![target_str],
                |row| row.get(0),
            )
            .optional()?;

        let media: Vec<(i64, String)> = {
            let mut stmt = tx.prepare("SELECT media_id, file_path FROM media")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        let media_ids: Vec<i64> = media
            .into_iter()
            .filter(|(_, file)| normalize_path(file).starts_with(&target))
            .map(|(id, _)| id)
            .collect();

        if media_ids.is_empty() && source_id.is_none() {
            tracing::warn!(path = %target_str, "no media found under path");
            return Ok(false);
        }

        let mut texts_removed = 0;
        for media_id in &media_ids {
            let text_ids: Vec<TextId> = {
                let mut stmt = tx.prepare(
                    "SELECT text_id FROM texts
                     WHERE type = ?1
                       AND source IN (SELECT subtitle_file FROM subtitles WHERE media_id = ?2)",
                )?;
                let rows = stmt.query_map(
                    params![TextKind::VideoSubtitle.as_str(), media_id],
                    |row| row.get(0),
                )?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            };
            for text_id in text_ids {
                release_text_sentences_in(&tx, text_id)?;
                texts_removed +=
                    tx.execute("DELETE FROM texts WHERE text_id = ?1", params![text_id])?;
            }
            tx.execute("DELETE FROM media WHERE media_id = ?1", params![media_id])?;
        }
        if let Some(id) = source_id {
            tx.execute("DELETE FROM sources WHERE source_id = ?1", params![id])?;
        }
        let (surface_pruned, lemmas_pruned) = prune_orphans_in(&tx)?;

        tx.commit()?;
        tracing::info!(
            path = %target_str,
            media = media_ids.len(),
            texts = texts_removed,
            surface_pruned,
            lemmas_pruned,
            "removed library path"
        );
        Ok(true)
    }
}

impl StatsRepository for SqliteRepository {
    fn study_stats(
        &self,
        words_deck: &str,
        study_deck: &str,
        threshold: u32,
    ) -> Result<StudyStats> {
        let n_plus_one_cards: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM cards c
             JOIN decks d ON c.deck_id = d.deck_id
             JOIN sentences s ON c.sentence_id = s.sentence_id
             WHERE d.name = ?1 AND s.unknown_dictionary_form_count <= ?2",
            params![words_deck, threshold],
            |row| row.get(0),
        )?;
        let study_deck_cards: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cards c JOIN decks d ON c.deck_id = d.deck_id WHERE d.name = ?1",
            params![study_deck],
            |row| row.get(0),
        )?;
        let (studying_texts, average): (i64, Option<f64>) = self.conn.query_row(
            "SELECT COUNT(*), AVG(comprehension_percentage) FROM texts WHERE studying = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StudyStats {
            n_plus_one_cards: n_plus_one_cards as usize,
            study_deck_cards: study_deck_cards as usize,
            studying_texts: studying_texts as usize,
            average_comprehension: average.unwrap_or(100.0),
            pending_kanji: self.pending_kanji_count()?,
        })
    }
}
