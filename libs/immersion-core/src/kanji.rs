//! Kanji detection and decomposition.

/// Whether the character is a CJK unified ideograph (U+4E00..=U+9FFF).
pub fn is_kanji(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// Whether the text contains at least one kanji.
pub fn contains_kanji(text: &str) -> bool {
    text.chars().any(is_kanji)
}

/// Kanji of the text in order of appearance, repeats included.
pub fn kanji_chars(text: &str) -> Vec<char> {
    text.chars().filter(|c| is_kanji(*c)).collect()
}
