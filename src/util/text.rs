//! Text helpers shared by normalization, dedup and scoring.
use html2text::render::TrivialDecorator;
use rustc_hash::FxHashSet;
use unicode_normalization::UnicodeNormalization;
use xxhash_rust::xxh3::xxh3_64;

/// Render width for markup stripping; wide enough that lines never wrap
/// mid-word, and wrapped lines are collapsed by [`clean_display`] anyway.
const RENDER_WIDTH: usize = 1_000;

/// Hash text with XXH3.
#[must_use]
pub fn hash_text(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

/// NFC-normalize and collapse runs of whitespace into single spaces.
#[must_use]
pub fn clean_display(text: &str) -> String {
    let normalized: String = text.nfc().collect();
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop markup from feed summaries, keeping the text content with entities
/// decoded once.
#[must_use]
pub fn strip_html(text: &str) -> String {
    html2text::config::with_decorator(TrivialDecorator::new())
        .string_from_read(text.as_bytes(), RENDER_WIDTH)
        .unwrap_or_default()
}

/// Comparison form of a title: lower-case, punctuation removed, whitespace
/// collapsed. Letters of every script survive.
#[must_use]
pub fn comparison_key(title: &str) -> String {
    let lowered: String = title.nfc().flat_map(char::to_lowercase).collect();
    lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Distinct whitespace-separated tokens of a comparison key.
#[must_use]
pub fn tokens(key: &str) -> FxHashSet<&str> {
    key.split_whitespace().collect()
}

/// Count of characters, not bytes.
#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
