//! Per-entity credibility index over a batch of deduplicated stories.
//!
//! Components are on a 0..=100 scale and combined with fixed weights:
//! consistency 0.45, fact integrity 0.35, transparency 0.10, correction
//! responsiveness 0.10.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::registry::EntityList;
use crate::util::links;
use crate::util::text::tokens;

use super::types::NewsItem;

const CONSISTENCY_WEIGHT: f64 = 0.45;
const FACT_WEIGHT: f64 = 0.35;
const TRANSPARENCY_WEIGHT: f64 = 0.10;
const CORRECTION_WEIGHT: f64 = 0.10;
const HEADLINE_SAMPLE: usize = 3;

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid digits regex"));
static DATES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,2}[./-]\d{1,2}[./-]\d{2,4}").expect("valid date regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityIndexRow {
    pub entity_id: String,
    pub name: String,
    pub party: Option<String>,
    pub role: Option<String>,
    pub mentions: usize,
    pub consistency: f64,
    pub fact_integrity: f64,
    pub transparency: f64,
    pub correction_responsiveness: f64,
    pub index_score: f64,
    /// Up to three headlines the consistency score was computed from.
    pub headlines: Vec<String>,
}

/// Build one row per entity mentioned in `items`, best index first.
///
/// Items are taken in the given order, so pass them in a deterministic one
/// (the pipeline uses cluster order).
#[must_use]
pub fn compute_index(items: &[&NewsItem], entities: &EntityList) -> Vec<EntityIndexRow> {
    let mut mentions: BTreeMap<&str, Vec<&NewsItem>> = BTreeMap::new();
    for item in items {
        for entity_id in &item.detected_entities {
            mentions.entry(entity_id.as_str()).or_default().push(*item);
        }
    }

    let mut rows: Vec<EntityIndexRow> = mentions
        .into_iter()
        .filter_map(|(entity_id, group)| {
            let entity = entities.get(entity_id)?;
            let headlines: Vec<String> = group
                .iter()
                .take(HEADLINE_SAMPLE)
                .map(|item| item.title.clone())
                .collect();
            let consistency = consistency(&group);
            let fact_integrity = fact_integrity(&group);
            // Every item in a batch counts as primary reporting; corrections are
            // not tracked yet.
            let transparency = 100.0;
            let correction_responsiveness = 0.0;
            let index_score = CONSISTENCY_WEIGHT * consistency
                + FACT_WEIGHT * fact_integrity
                + TRANSPARENCY_WEIGHT * transparency
                + CORRECTION_WEIGHT * correction_responsiveness;
            Some(EntityIndexRow {
                entity_id: entity.id.clone(),
                name: entity.name.clone(),
                party: entity.party.clone(),
                role: entity.role.clone(),
                mentions: group.len(),
                consistency,
                fact_integrity,
                transparency,
                correction_responsiveness,
                index_score,
                headlines,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.index_score
            .total_cmp(&a.index_score)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    rows
}

/// 60 plus 10 per token shared by the sampled headlines, clamped to 40..=100.
fn consistency(group: &[&NewsItem]) -> f64 {
    let mut sample = group.iter().take(HEADLINE_SAMPLE).map(|item| tokens(&item.comparison_key));
    let Some(first) = sample.next() else {
        return 0.0;
    };
    let shared = sample.fold(first, |acc, next| {
        acc.intersection(&next).copied().collect()
    });
    #[allow(clippy::cast_precision_loss)]
    let score = 60.0 + shared.len() as f64 * 10.0;
    score.clamp(40.0, 100.0)
}

/// Rewards independent corroboration and concrete numbers or dates.
fn fact_integrity(group: &[&NewsItem]) -> f64 {
    if group.is_empty() {
        return 0.0;
    }
    let domains: BTreeSet<String> = group
        .iter()
        .filter_map(|item| links::host(&item.link))
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let independent = domains.len().max(1) as f64;
    #[allow(clippy::cast_precision_loss)]
    let avg_specificity =
        group.iter().map(|item| specificity(item)).sum::<f64>() / group.len() as f64;
    let base = 50.0 + (15.0 * (independent - 1.0)).min(40.0);
    let bonus = (avg_specificity / 10.0).min(15.0);
    (base + bonus).min(100.0)
}

/// Numbers and dates per hundred words of the summary (or title when the
/// summary is empty).
fn specificity(item: &NewsItem) -> f64 {
    let text = if item.summary.is_empty() {
        item.title.as_str()
    } else {
        item.summary.as_str()
    };
    let words = text.split_whitespace().count().max(1);
    let facts = DIGITS.find_iter(text).count() + DATES.find_iter(text).count();
    #[allow(clippy::cast_precision_loss)]
    let value = 100.0 * facts as f64 / (words as f64 / 100.0);
    value
}
