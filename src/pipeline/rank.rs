//! Final ordering, filtering and truncation of scored stories.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::RankerConfig;
use crate::error::HistoryError;

use super::types::ScoredItem;

/// URL keys of stories that were already published downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedHistory {
    keys: BTreeSet<String>,
}

impl PublishedHistory {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Load a `{"keys": [...]}` document. A missing file is an empty history.
    ///
    /// # Errors
    /// Returns [`HistoryError`] when the file exists but cannot be read or parsed.
    pub fn from_json_path(path: &Path) -> Result<Self, HistoryError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(HistoryError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&contents).map_err(|source| HistoryError::Deserialize {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn contains(&self, url_key: &str) -> bool {
        self.keys.contains(url_key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// How many stories each ranking filter removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankTrace {
    pub candidates: usize,
    pub dropped_by_trust_floor: usize,
    pub already_published: usize,
    pub capped_by_source: usize,
    pub truncated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankOutcome {
    pub ranked: Vec<ScoredItem>,
    pub trace: RankTrace,
}

#[derive(Debug, Clone)]
pub struct Ranker {
    max_items: usize,
    max_items_per_source: Option<usize>,
    trust_floor: Option<u8>,
    allow_republish: bool,
}

impl Ranker {
    #[must_use]
    pub fn new(config: &RankerConfig) -> Self {
        let settings = config.settings();
        Self {
            max_items: settings.max_items,
            max_items_per_source: settings.max_items_per_source,
            trust_floor: settings.trust_floor,
            allow_republish: settings.allow_republish,
        }
    }

    /// Filter, order by score then tie-break chain, and truncate.
    #[must_use]
    pub fn rank(&self, scored: Vec<ScoredItem>, history: &PublishedHistory) -> RankOutcome {
        let mut trace = RankTrace {
            candidates: scored.len(),
            ..RankTrace::default()
        };

        let mut eligible = Vec::with_capacity(scored.len());
        for item in scored {
            if self.trust_floor.is_some_and(|floor| item.source_trust < floor) {
                trace.dropped_by_trust_floor += 1;
            } else if !self.allow_republish && history.contains(&item.item.url_key) {
                trace.already_published += 1;
            } else {
                eligible.push(item);
            }
        }

        eligible.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.tie_break_key().cmp(&b.tie_break_key()))
        });

        let mut per_source: FxHashMap<String, usize> = FxHashMap::default();
        let mut ranked = Vec::with_capacity(self.max_items.min(eligible.len()));
        for item in eligible {
            if ranked.len() >= self.max_items {
                trace.truncated += 1;
                continue;
            }
            if let Some(cap) = self.max_items_per_source {
                let count = per_source.entry(item.item.source_id.clone()).or_default();
                if *count >= cap {
                    trace.capped_by_source += 1;
                    continue;
                }
                *count += 1;
            }
            ranked.push(item);
        }

        RankOutcome { ranked, trace }
    }
}
