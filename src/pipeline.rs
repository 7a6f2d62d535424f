//! Batch orchestration: normalize, deduplicate, score, rank.
//!
//! A [`Pipeline`] is built once from a validated [`RankerConfig`] and can then
//! run any number of batches. A run never fails: malformed items are dropped
//! and counted, everything else degrades to defaults with audit notes.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RankerConfig;
use crate::registry::Registries;

pub mod clickbait;
pub mod decay;
pub mod dedup;
pub mod entity_index;
pub mod normalize;
pub mod rank;
pub mod score;
pub mod similarity;
pub mod types;

use decay::DecayCurve;
use dedup::{Cluster, Deduplicator};
use entity_index::{EntityIndexRow, compute_index};
use normalize::{MalformedItem, Normalizer, RawItem};
use rank::{PublishedHistory, RankTrace, Ranker};
use score::Scorer;
use similarity::TitleSimilarity;
use types::{NewsItem, ScoredItem};

/// An input record that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedItem {
    /// Position in the input batch.
    pub index: usize,
    pub reason: String,
}

/// Result of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub ranked: Vec<ScoredItem>,
    pub input_items: usize,
    pub normalized_items: usize,
    pub dropped_malformed: Vec<DroppedItem>,
    pub clusters: usize,
    pub rank: RankTrace,
    pub entity_index: Vec<EntityIndexRow>,
}

pub struct Pipeline {
    config: RankerConfig,
    normalizer: Normalizer,
    deduplicator: Deduplicator,
    scorer: Scorer,
    ranker: Ranker,
}

pub struct PipelineBuilder {
    config: RankerConfig,
    similarity: Option<Box<dyn TitleSimilarity>>,
    decay: Option<Box<dyn DecayCurve>>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new(config: RankerConfig) -> Self {
        Self {
            config,
            similarity: None,
            decay: None,
        }
    }

    /// Replace the configured title similarity metric.
    #[must_use]
    pub fn with_similarity(mut self, similarity: Box<dyn TitleSimilarity>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// Replace the configured freshness curve.
    #[must_use]
    pub fn with_decay(mut self, decay: Box<dyn DecayCurve>) -> Self {
        self.decay = Some(decay);
        self
    }

    #[must_use]
    pub fn build(self) -> Pipeline {
        let settings = self.config.settings();
        let similarity = self
            .similarity
            .unwrap_or_else(|| similarity::from_kind(settings.similarity));
        let decay = self.decay.unwrap_or_else(|| {
            decay::from_kind(settings.decay, self.config.freshness_half_life())
        });

        Pipeline {
            normalizer: Normalizer::new(&self.config),
            deduplicator: Deduplicator::new(similarity, settings.dedup_threshold),
            scorer: Scorer::new(&self.config, decay),
            ranker: Ranker::new(&self.config),
            config: self.config,
        }
    }
}

impl Pipeline {
    /// Pipeline with the metric and curve named in `config`.
    #[must_use]
    pub fn new(config: RankerConfig) -> Self {
        PipelineBuilder::new(config).build()
    }

    #[must_use]
    pub fn builder(config: RankerConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Run one batch. The output is a pure function of the arguments.
    #[must_use]
    pub fn run(
        &self,
        raw: &[RawItem],
        registries: &Registries,
        history: &PublishedHistory,
        now: DateTime<Utc>,
    ) -> PipelineReport {
        let (items, dropped_malformed) = self.normalize_batch(raw, registries, now);
        let clusters = self.deduplicate(&items, registries);
        let scored = self.score_batch(&items, &clusters, registries, now);

        let representatives: Vec<&NewsItem> = clusters
            .iter()
            .map(|cluster| &items[cluster.representative])
            .collect();
        let entity_index = if registries.entities.is_empty() {
            Vec::new()
        } else {
            compute_index(&representatives, &registries.entities)
        };

        let outcome = self.ranker.rank(scored, history);

        info!(
            input = raw.len(),
            normalized = items.len(),
            malformed = dropped_malformed.len(),
            clusters = clusters.len(),
            dropped_by_trust_floor = outcome.trace.dropped_by_trust_floor,
            already_published = outcome.trace.already_published,
            capped_by_source = outcome.trace.capped_by_source,
            ranked = outcome.ranked.len(),
            "ranking run completed"
        );

        PipelineReport {
            ranked: outcome.ranked,
            input_items: raw.len(),
            normalized_items: items.len(),
            dropped_malformed,
            clusters: clusters.len(),
            rank: outcome.trace,
            entity_index,
        }
    }

    /// Normalize in parallel; `collect` keeps input order.
    fn normalize_batch(
        &self,
        raw: &[RawItem],
        registries: &Registries,
        now: DateTime<Utc>,
    ) -> (Vec<NewsItem>, Vec<DroppedItem>) {
        let results: Vec<Result<NewsItem, MalformedItem>> = raw
            .par_iter()
            .map(|item| self.normalizer.normalize(item, &registries.entities, now))
            .collect();

        let mut items = Vec::with_capacity(results.len());
        let mut dropped = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(item) => items.push(item),
                Err(reason) => {
                    warn!(index, reason = %reason, "dropping malformed item");
                    dropped.push(DroppedItem {
                        index,
                        reason: reason.to_string(),
                    });
                }
            }
        }
        (items, dropped)
    }

    fn deduplicate(&self, items: &[NewsItem], registries: &Registries) -> Vec<Cluster> {
        let clusters = self.deduplicator.deduplicate(
            items,
            &registries.sources,
            self.config.settings().source_default_trust,
        );
        debug!(
            items = items.len(),
            clusters = clusters.len(),
            "deduplicated batch"
        );
        clusters
    }

    fn score_batch(
        &self,
        items: &[NewsItem],
        clusters: &[Cluster],
        registries: &Registries,
        now: DateTime<Utc>,
    ) -> Vec<ScoredItem> {
        clusters
            .par_iter()
            .map(|cluster| self.scorer.score(items, cluster, registries, now))
            .collect()
    }
}
