//! Title similarity metrics for near-duplicate detection.
//!
//! Metrics work on comparison keys (see [`crate::util::text::comparison_key`]),
//! never on display titles.

use rustc_hash::FxHashSet;

use crate::config::SimilarityKind;
use crate::util::text::tokens;

/// A symmetric similarity between two comparison keys, in `0.0..=1.0`.
pub trait TitleSimilarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;

    /// Keys used to skip comparisons that cannot reach a positive threshold.
    ///
    /// Two keys with no blocking key in common must have similarity 0. Return
    /// `None` to disable blocking and compare everything.
    fn blocking_keys(&self, key: &str) -> Option<Vec<String>> {
        let _ = key;
        None
    }
}

/// Jaccard overlap of distinct word tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenJaccard;

impl TitleSimilarity for TokenJaccard {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        jaccard(&tokens(a), &tokens(b))
    }

    fn blocking_keys(&self, key: &str) -> Option<Vec<String>> {
        Some(tokens(key).into_iter().map(str::to_string).collect())
    }
}

/// Jaccard overlap of word bigrams; stricter about word order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigramJaccard;

impl TitleSimilarity for BigramJaccard {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        jaccard(&word_bigrams(a), &word_bigrams(b))
    }

    fn blocking_keys(&self, key: &str) -> Option<Vec<String>> {
        Some(word_bigrams(key).into_iter().collect())
    }
}

/// Build the metric selected in configuration.
#[must_use]
pub fn from_kind(kind: SimilarityKind) -> Box<dyn TitleSimilarity> {
    match kind {
        SimilarityKind::Jaccard => Box::new(TokenJaccard),
        SimilarityKind::Bigram => Box::new(BigramJaccard),
    }
}

fn word_bigrams(key: &str) -> FxHashSet<String> {
    let words: Vec<&str> = key.split_whitespace().collect();
    if words.len() == 1 {
        return words.iter().map(|w| (*w).to_string()).collect();
    }
    words.windows(2).map(|pair| pair.join(" ")).collect()
}

fn jaccard<T: Eq + std::hash::Hash>(a: &FxHashSet<T>, b: &FxHashSet<T>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    #[allow(clippy::cast_precision_loss)]
    let ratio = intersection as f64 / union as f64;
    ratio
}
