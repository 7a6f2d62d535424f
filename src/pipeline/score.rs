//! Five-factor scoring of cluster representatives.
//!
//! Every factor is expressed in points and the score is their plain sum, so
//! the breakdown always adds up to the score. Missing data never fails a
//! score: it falls back to a configured default and leaves an [`AuditNote`].

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::{RankerConfig, RankerSettings};
use crate::registry::Registries;

use super::clickbait::ClickbaitDetector;
use super::decay::DecayCurve;
use super::dedup::Cluster;
use super::types::{AuditNote, Freshness, NewsItem, ScoreBreakdown, ScoredItem};

pub struct Scorer {
    settings: RankerSettings,
    worst_case_age: Duration,
    decay: Box<dyn DecayCurve>,
    clickbait: ClickbaitDetector,
}

impl Scorer {
    #[must_use]
    pub fn new(config: &RankerConfig, decay: Box<dyn DecayCurve>) -> Self {
        Self {
            settings: config.settings().clone(),
            worst_case_age: config.freshness_worst_case_age(),
            decay,
            clickbait: ClickbaitDetector::new(config),
        }
    }

    /// Score the representative of `cluster`. `items` is the slice the cluster
    /// indexes into.
    #[must_use]
    pub fn score(
        &self,
        items: &[NewsItem],
        cluster: &Cluster,
        registries: &Registries,
        now: DateTime<Utc>,
    ) -> ScoredItem {
        let item = &items[cluster.representative];
        let mut notes = Vec::new();

        let (source, source_trust) = self.source_points(item, registries, &mut notes);
        let (topic, matched_topics) = self.topic_points(item, registries, &mut notes);
        let freshness = self.freshness_points(item, now, &mut notes);
        let engagement = self.engagement_points(item, &mut notes);
        let verdict = self.clickbait.assess(&item.title);

        let mut score_breakdown = ScoreBreakdown {
            source,
            topic,
            freshness,
            engagement,
            clickbait: 0.0 - verdict.penalty,
        };
        let mut score = score_breakdown.total();
        if !score.is_finite() {
            tracing::warn!(item_id = %item.id, ?score_breakdown, "non-finite factors replaced with 0");
            notes.push(AuditNote::NonFiniteScore);
            score_breakdown.clear_non_finite();
            score = score_breakdown.total();
            // finite factors can still overflow together
            if !score.is_finite() {
                score_breakdown = ScoreBreakdown::default();
                score = 0.0;
            }
        }

        ScoredItem {
            item: item.clone(),
            score,
            score_breakdown,
            cluster_id: cluster.cluster_id,
            cluster_size: cluster.len(),
            source_trust,
            matched_topics,
            triggered_heuristics: verdict.triggered,
            notes,
        }
    }

    fn source_points(
        &self,
        item: &NewsItem,
        registries: &Registries,
        notes: &mut Vec<AuditNote>,
    ) -> (f64, u8) {
        let s = &self.settings;
        let Some(entry) = registries.sources.get(&item.source_id) else {
            notes.push(AuditNote::UnknownSource {
                source_id: item.source_id.clone(),
            });
            let points = f64::from(s.source_default_trust) * s.trust_weight
                + f64::from(s.source_default_reach) * s.reach_weight;
            return (points, s.source_default_trust);
        };
        let bias = entry
            .bias_tag
            .as_deref()
            .and_then(|tag| s.bias_adjustments.get(tag))
            .copied()
            .unwrap_or(0.0);
        let points = f64::from(entry.trust) * s.trust_weight
            + f64::from(entry.reach) * s.reach_weight
            + f64::from(entry.boost)
            + bias;
        (points, entry.trust)
    }

    fn topic_points(
        &self,
        item: &NewsItem,
        registries: &Registries,
        notes: &mut Vec<AuditNote>,
    ) -> (f64, Vec<String>) {
        let s = &self.settings;
        let matched = registries
            .topics
            .matching(&format!("{} {}", item.title, item.summary));
        if matched.is_empty() {
            notes.push(AuditNote::NoTopicMatch);
            return (s.topic_baseline, Vec::new());
        }
        let mut points: f64 = matched
            .iter()
            .map(|topic| topic.weight * s.topic_points_per_weight)
            .sum();
        if let Some(cap) = s.topic_cap {
            if points > cap {
                notes.push(AuditNote::TopicCapApplied);
                points = cap;
            }
        }
        let ids = matched.iter().map(|topic| topic.topic_id.clone()).collect();
        (points, ids)
    }

    fn freshness_points(
        &self,
        item: &NewsItem,
        now: DateTime<Utc>,
        notes: &mut Vec<AuditNote>,
    ) -> f64 {
        let age = match item.freshness {
            // Negative ages (feed clocks ahead of ours) clamp to zero.
            Freshness::Known => (now - item.published_at).to_std().unwrap_or_default(),
            Freshness::Unknown => {
                notes.push(AuditNote::UnknownFreshness);
                self.worst_case_age
            }
        };
        self.settings.freshness_max_points * self.decay.factor(age)
    }

    fn engagement_points(&self, item: &NewsItem, notes: &mut Vec<AuditNote>) -> f64 {
        let s = &self.settings;
        let (min_len, max_len) = s.engagement_bonus_band;
        let image = if item.has_image { s.image_bonus } else { 0.0 };
        let band = if (min_len..=max_len).contains(&item.body_length) {
            s.band_bonus
        } else {
            notes.push(AuditNote::BodyLengthOutOfBand {
                body_length: item.body_length,
            });
            0.0 - s.out_of_band_penalty
        };
        image + band
    }
}
