//! Core records passed between pipeline stages.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether an item's publish time came from the feed or was assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Known,
    /// No usable publish time; `published_at` holds the run's `now`.
    Unknown,
}

/// A canonicalized news item. Immutable once normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Hex digest of the canonical link.
    pub id: String,
    pub title: String,
    pub summary: String,
    pub link: String,
    pub canonical_link: String,
    /// Scheme-less `host/path` key used for published-history lookups.
    pub url_key: String,
    /// Lower-cased, punctuation-free title used for similarity only.
    pub comparison_key: String,
    pub source_id: String,
    pub published_at: DateTime<Utc>,
    pub freshness: Freshness,
    pub has_image: bool,
    pub body_length: usize,
    pub detected_entities: BTreeSet<String>,
}

/// Title heuristics that mark sensationalist headlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickbaitHeuristic {
    ExcessivePunctuation,
    AllCaps,
    BaitPhrase,
}

impl std::fmt::Display for ClickbaitHeuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClickbaitHeuristic::ExcessivePunctuation => write!(f, "excessive_punctuation"),
            ClickbaitHeuristic::AllCaps => write!(f, "all_caps"),
            ClickbaitHeuristic::BaitPhrase => write!(f, "bait_phrase"),
        }
    }
}

/// A default that was applied instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AuditNote {
    UnknownSource { source_id: String },
    UnknownFreshness,
    NoTopicMatch,
    TopicCapApplied,
    BodyLengthOutOfBand { body_length: usize },
    NonFiniteScore,
}

/// Score factor names, in breakdown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Source,
    Topic,
    Freshness,
    Engagement,
    Clickbait,
}

impl Factor {
    pub const ALL: [Factor; 5] = [
        Factor::Source,
        Factor::Topic,
        Factor::Freshness,
        Factor::Engagement,
        Factor::Clickbait,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Factor::Source => "source",
            Factor::Topic => "topic",
            Factor::Freshness => "freshness",
            Factor::Engagement => "engagement",
            Factor::Clickbait => "clickbait",
        }
    }
}

/// Contribution of each factor to the final score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub source: f64,
    pub topic: f64,
    pub freshness: f64,
    pub engagement: f64,
    /// Zero or negative.
    pub clickbait: f64,
}

impl ScoreBreakdown {
    #[must_use]
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Source => self.source,
            Factor::Topic => self.topic,
            Factor::Freshness => self.freshness,
            Factor::Engagement => self.engagement,
            Factor::Clickbait => self.clickbait,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Factor, f64)> + '_ {
        Factor::ALL.into_iter().map(move |factor| (factor, self.get(factor)))
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.iter().map(|(_, value)| value).sum()
    }

    /// Replace NaN and infinite factors with 0.
    pub fn clear_non_finite(&mut self) {
        for value in [
            &mut self.source,
            &mut self.topic,
            &mut self.freshness,
            &mut self.engagement,
            &mut self.clickbait,
        ] {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
    }
}

/// A cluster representative with its score and audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item: NewsItem,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub cluster_id: usize,
    pub cluster_size: usize,
    /// Trust used for scoring, after applying the unknown-source default.
    pub source_trust: u8,
    pub matched_topics: Vec<String>,
    pub triggered_heuristics: Vec<ClickbaitHeuristic>,
    pub notes: Vec<AuditNote>,
}

impl ScoredItem {
    #[must_use]
    pub fn tie_break_key(&self) -> TieBreakKey<'_> {
        TieBreakKey::new(&self.item, self.source_trust)
    }
}

/// Deterministic preference order shared by representative selection and
/// ranking: image first, then higher trust, then earlier publish time, then
/// the smaller id. `Ordering::Less` means "preferred".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TieBreakKey<'a> {
    pub has_image: bool,
    pub trust: u8,
    pub published_at: DateTime<Utc>,
    pub id: &'a str,
}

impl<'a> TieBreakKey<'a> {
    #[must_use]
    pub fn new(item: &'a NewsItem, trust: u8) -> Self {
        Self {
            has_image: item.has_image,
            trust,
            published_at: item.published_at,
            id: &item.id,
        }
    }
}

impl Ord for TieBreakKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .has_image
            .cmp(&self.has_image)
            .then_with(|| other.trust.cmp(&self.trust))
            .then_with(|| self.published_at.cmp(&other.published_at))
            .then_with(|| self.id.cmp(other.id))
    }
}

impl PartialOrd for TieBreakKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
