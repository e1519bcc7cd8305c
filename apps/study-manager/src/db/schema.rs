//! SQLite schema definitions.

/// Current schema version for migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Complete schema for the study database.
pub const SCHEMA: &str = r#"
-- Documents: subtitle files, imported text, imported decks
CREATE TABLE IF NOT EXISTS texts (
    text_id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    type TEXT NOT NULL,
    comprehension_percentage REAL NOT NULL DEFAULT 0,
    studying INTEGER NOT NULL DEFAULT 0,
    content_hash TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (source, type)
);

-- Lines of a text
CREATE TABLE IF NOT EXISTS sentences (
    sentence_id INTEGER PRIMARY KEY AUTOINCREMENT,
    text_id INTEGER NOT NULL REFERENCES texts(text_id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    start_time REAL,
    end_time REAL,
    unknown_dictionary_form_count INTEGER NOT NULL DEFAULT 0
);

-- Lemmas
CREATE TABLE IF NOT EXISTS dictionary_forms (
    dict_form_id INTEGER PRIMARY KEY AUTOINCREMENT,
    base_form TEXT NOT NULL UNIQUE,
    reading TEXT NOT NULL DEFAULT '',
    pos TEXT NOT NULL DEFAULT '',
    frequency INTEGER NOT NULL DEFAULT 0,
    known INTEGER NOT NULL DEFAULT 0,
    ranking INTEGER
);

-- Inflected forms as they appear in sentences
CREATE TABLE IF NOT EXISTS surface_forms (
    surface_form_id INTEGER PRIMARY KEY AUTOINCREMENT,
    dict_form_id INTEGER NOT NULL REFERENCES dictionary_forms(dict_form_id) ON DELETE CASCADE,
    surface_form TEXT NOT NULL,
    reading TEXT NOT NULL DEFAULT '',
    pos TEXT NOT NULL DEFAULT '',
    frequency INTEGER NOT NULL DEFAULT 0,
    known INTEGER NOT NULL DEFAULT 0,
    kanji_parsed INTEGER NOT NULL DEFAULT 0,
    UNIQUE (dict_form_id, surface_form, reading, pos)
);

-- One row per occurrence of a surface form in a sentence
CREATE TABLE IF NOT EXISTS surface_form_sentences (
    surface_form_id INTEGER NOT NULL REFERENCES surface_forms(surface_form_id) ON DELETE CASCADE,
    sentence_id INTEGER NOT NULL REFERENCES sentences(sentence_id) ON DELETE CASCADE
);

-- Occurrences waiting for kanji decomposition
CREATE TABLE IF NOT EXISTS kanji_pending (
    surface_form_id INTEGER NOT NULL REFERENCES surface_forms(surface_form_id) ON DELETE CASCADE,
    sentence_id INTEGER NOT NULL REFERENCES sentences(sentence_id) ON DELETE CASCADE
);

-- Kanji-bearing surface forms
CREATE TABLE IF NOT EXISTS compound_forms (
    compound_id INTEGER PRIMARY KEY AUTOINCREMENT,
    surface_form_id INTEGER NOT NULL REFERENCES surface_forms(surface_form_id) ON DELETE CASCADE,
    compound_text TEXT NOT NULL,
    frequency INTEGER NOT NULL DEFAULT 0,
    known INTEGER NOT NULL DEFAULT 0,
    ranking INTEGER,
    UNIQUE (surface_form_id, compound_text)
);

CREATE TABLE IF NOT EXISTS kanji_entries (
    kanji_id INTEGER PRIMARY KEY AUTOINCREMENT,
    compound_id INTEGER NOT NULL REFERENCES compound_forms(compound_id) ON DELETE CASCADE,
    kanji_char TEXT NOT NULL,
    frequency INTEGER NOT NULL DEFAULT 0,
    known INTEGER NOT NULL DEFAULT 0,
    ranking INTEGER,
    UNIQUE (compound_id, kanji_char)
);

CREATE TABLE IF NOT EXISTS kanji_linkage (
    kanji_id INTEGER NOT NULL REFERENCES kanji_entries(kanji_id) ON DELETE CASCADE,
    surface_form_id INTEGER NOT NULL REFERENCES surface_forms(surface_form_id) ON DELETE CASCADE,
    sentence_id INTEGER REFERENCES sentences(sentence_id) ON DELETE CASCADE,
    card_id INTEGER REFERENCES cards(card_id) ON DELETE SET NULL
);

-- Local decks mirrored to the flashcard service
CREATE TABLE IF NOT EXISTS decks (
    deck_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS cards (
    card_id INTEGER PRIMARY KEY AUTOINCREMENT,
    deck_id INTEGER REFERENCES decks(deck_id) ON DELETE SET NULL,
    sentence_id INTEGER REFERENCES sentences(sentence_id) ON DELETE SET NULL,
    anki_card_id INTEGER UNIQUE,
    deck_origin TEXT,
    native_word TEXT,
    translated_word TEXT,
    word_audio TEXT,
    pos TEXT,
    native_sentence TEXT,
    translated_sentence TEXT,
    sentence_audio TEXT,
    image TEXT,
    reading TEXT,
    unobtainable INTEGER,
    gated INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS card_tags (
    card_id INTEGER NOT NULL REFERENCES cards(card_id) ON DELETE CASCADE,
    tag TEXT NOT NULL,
    UNIQUE (card_id, tag)
);

-- Media library
CREATE TABLE IF NOT EXISTS sources (
    source_id INTEGER PRIMARY KEY AUTOINCREMENT,
    folder_path TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS media (
    media_id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL UNIQUE,
    type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subtitles (
    sub_id INTEGER PRIMARY KEY AUTOINCREMENT,
    media_id INTEGER NOT NULL REFERENCES media(media_id) ON DELETE CASCADE,
    subtitle_file TEXT NOT NULL UNIQUE,
    language TEXT,
    format TEXT
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_sentences_text ON sentences(text_id);
CREATE INDEX IF NOT EXISTS idx_surface_forms_dict ON surface_forms(dict_form_id);
CREATE INDEX IF NOT EXISTS idx_kanji_pending_surface ON kanji_pending(surface_form_id);
CREATE INDEX IF NOT EXISTS idx_sfs_surface ON surface_form_sentences(surface_form_id);
CREATE INDEX IF NOT EXISTS idx_sfs_sentence ON surface_form_sentences(sentence_id);
CREATE INDEX IF NOT EXISTS idx_kanji_linkage_surface ON kanji_linkage(surface_form_id);
CREATE INDEX IF NOT EXISTS idx_kanji_linkage_sentence ON kanji_linkage(sentence_id);
CREATE INDEX IF NOT EXISTS idx_cards_deck ON cards(deck_id);
CREATE INDEX IF NOT EXISTS idx_cards_sentence ON cards(sentence_id);
"#;
