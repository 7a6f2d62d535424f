//! Story clustering.
//!
//! Items are grouped by canonical link first; each group then joins the most
//! similar existing cluster by title, or starts a new one. Clusters whose
//! representatives still reach the threshold are then merged, so running the
//! representatives through again yields singletons. Clusters refer to
//! items by index into the caller's slice, so the slice is the arena and a
//! cluster is just a list of member indices plus its representative.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::debug;

use crate::registry::SourceRegistry;

use super::similarity::TitleSimilarity;
use super::types::{NewsItem, TieBreakKey};

/// Items judged to report the same story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub cluster_id: usize,
    /// Indices into the deduplicated slice, ascending.
    pub members: Vec<usize>,
    pub representative: usize,
}

impl Cluster {
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

pub struct Deduplicator {
    similarity: Box<dyn TitleSimilarity>,
    threshold: f64,
}

impl Deduplicator {
    #[must_use]
    pub fn new(similarity: Box<dyn TitleSimilarity>, threshold: f64) -> Self {
        Self {
            similarity,
            threshold,
        }
    }

    /// Cluster `items`. Every item lands in exactly one cluster and the result
    /// does not depend on the order of `items`.
    #[must_use]
    pub fn deduplicate(
        &self,
        items: &[NewsItem],
        sources: &SourceRegistry,
        default_trust: u8,
    ) -> Vec<Cluster> {
        // Canonical link order makes the run independent of input order.
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (index, item) in items.iter().enumerate() {
            groups
                .entry(item.canonical_link.as_str())
                .or_default()
                .push(index);
        }

        let blocking: Vec<Option<Vec<String>>> = items
            .iter()
            .map(|item| self.similarity.blocking_keys(&item.comparison_key))
            .collect();

        let mut clusters: Vec<Vec<usize>> = Vec::new();
        let mut index: FxHashMap<&str, SmallVec<[usize; 4]>> = FxHashMap::default();
        let mut title_merges = 0usize;

        for group in groups.into_values() {
            let candidates = candidate_clusters(&group, &blocking, &index, clusters.len());

            let mut best: Option<(usize, f64)> = None;
            for cluster_index in candidates {
                let sim = self.group_similarity(items, &group, &clusters[cluster_index]);
                if sim >= self.threshold && best.is_none_or(|(_, best_sim)| sim > best_sim) {
                    best = Some((cluster_index, sim));
                }
            }

            let target = if let Some((cluster_index, sim)) = best {
                title_merges += 1;
                debug!(
                    cluster = cluster_index,
                    similarity = sim,
                    group_size = group.len(),
                    "merged story by title"
                );
                clusters[cluster_index].extend(group.iter().copied());
                cluster_index
            } else {
                clusters.push(group.clone());
                clusters.len() - 1
            };

            for &member in &group {
                if let Some(keys) = &blocking[member] {
                    for key in keys {
                        let slot = index.entry(key.as_str()).or_default();
                        if !slot.contains(&target) {
                            slot.push(target);
                        }
                    }
                }
            }
        }

        let trust_of = |item: &NewsItem| {
            sources
                .get(&item.source_id)
                .map_or(default_trust, |entry| entry.trust)
        };
        let pick = |members: &[usize]| representative(items, members, &trust_of);

        // A late group can become its cluster's representative and reach the
        // threshold against another representative; merge until no pair does.
        let mut settle_merges = 0usize;
        loop {
            let reps: Vec<usize> = clusters.iter().map(|members| pick(members.as_slice())).collect();
            let Some((keep, absorb)) = self.first_close_pair(items, &blocking, &reps) else {
                break;
            };
            let moved = clusters.remove(absorb);
            clusters[keep].extend(moved);
            settle_merges += 1;
            debug!(
                cluster = keep,
                absorbed = absorb,
                "merged clusters with close representatives"
            );
        }

        let result: Vec<Cluster> = clusters
            .into_iter()
            .enumerate()
            .map(|(cluster_id, mut members)| {
                members.sort_unstable();
                let representative = pick(members.as_slice());
                Cluster {
                    cluster_id,
                    members,
                    representative,
                }
            })
            .collect();

        debug!(
            items = items.len(),
            clusters = result.len(),
            title_merges,
            settle_merges,
            "deduplication finished"
        );
        result
    }

    /// Highest similarity between any member of `group` and any member of `cluster`.
    fn group_similarity(&self, items: &[NewsItem], group: &[usize], cluster: &[usize]) -> f64 {
        group
            .iter()
            .flat_map(|&g| cluster.iter().map(move |&m| (g, m)))
            .map(|(g, m)| {
                self.similarity
                    .similarity(&items[g].comparison_key, &items[m].comparison_key)
            })
            .fold(0.0, f64::max)
    }

    /// First pair of clusters, in cluster order, whose representatives reach
    /// the threshold. The earlier cluster absorbs the later one.
    fn first_close_pair(
        &self,
        items: &[NewsItem],
        blocking: &[Option<Vec<String>>],
        reps: &[usize],
    ) -> Option<(usize, usize)> {
        let mut index: FxHashMap<&str, SmallVec<[usize; 4]>> = FxHashMap::default();
        let mut unblocked: Vec<usize> = Vec::new();
        for (position, &rep) in reps.iter().enumerate() {
            match &blocking[rep] {
                Some(keys) => {
                    for key in keys {
                        index.entry(key.as_str()).or_default().push(position);
                    }
                }
                None => unblocked.push(position),
            }
        }

        for (i, &rep) in reps.iter().enumerate() {
            let candidates: BTreeSet<usize> = match &blocking[rep] {
                Some(keys) => keys
                    .iter()
                    .filter_map(|key| index.get(key.as_str()))
                    .flatten()
                    .chain(unblocked.iter())
                    .copied()
                    .filter(|&j| j > i)
                    .collect(),
                None => (i + 1..reps.len()).collect(),
            };
            let close = candidates.into_iter().find(|&j| {
                self.similarity
                    .similarity(&items[rep].comparison_key, &items[reps[j]].comparison_key)
                    >= self.threshold
            });
            if let Some(j) = close {
                return Some((i, j));
            }
        }
        None
    }
}

/// Member that wins the tie-break chain.
fn representative(
    items: &[NewsItem],
    members: &[usize],
    trust_of: &impl Fn(&NewsItem) -> u8,
) -> usize {
    members
        .iter()
        .copied()
        .min_by(|&a, &b| {
            TieBreakKey::new(&items[a], trust_of(&items[a]))
                .cmp(&TieBreakKey::new(&items[b], trust_of(&items[b])))
        })
        .unwrap_or_default()
}

/// Clusters worth comparing against `group`, ascending. Falls back to every
/// cluster when some member has no blocking keys.
fn candidate_clusters(
    group: &[usize],
    blocking: &[Option<Vec<String>>],
    index: &FxHashMap<&str, SmallVec<[usize; 4]>>,
    cluster_count: usize,
) -> Vec<usize> {
    let mut candidates = BTreeSet::new();
    for &member in group {
        match &blocking[member] {
            Some(keys) => {
                for key in keys {
                    if let Some(found) = index.get(key.as_str()) {
                        candidates.extend(found.iter().copied());
                    }
                }
            }
            None => return (0..cluster_count).collect(),
        }
    }
    candidates.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::similarity::TokenJaccard;
    use crate::pipeline::types::Freshness;
    use crate::registry::SourceEntry;
    use crate::util::text::comparison_key;
    use chrono::{DateTime, TimeZone, Utc};
    use rstest::rstest;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    fn item(id: &str, title: &str, canonical: &str, source: &str) -> NewsItem {
        NewsItem {
            id: id.to_string(),
            title: title.to_string(),
            summary: String::new(),
            link: canonical.to_string(),
            canonical_link: canonical.to_string(),
            url_key: canonical.to_string(),
            comparison_key: comparison_key(title),
            source_id: source.to_string(),
            published_at: at(8),
            freshness: Freshness::Known,
            has_image: false,
            body_length: 0,
            detected_entities: BTreeSet::new(),
        }
    }

    fn sources() -> SourceRegistry {
        SourceRegistry::from_entries(vec![
            SourceEntry {
                source_id: "high.com".into(),
                trust: 90,
                reach: 50,
                boost: 0,
                bias_tag: None,
            },
            SourceEntry {
                source_id: "low.com".into(),
                trust: 20,
                reach: 50,
                boost: 0,
                bias_tag: None,
            },
        ])
        .expect("valid sources")
    }

    fn dedup() -> Deduplicator {
        Deduplicator::new(Box::new(TokenJaccard), 0.85)
    }

    /// Same metric, but without blocking keys, so every pair is compared.
    struct Exhaustive;

    impl TitleSimilarity for Exhaustive {
        fn similarity(&self, a: &str, b: &str) -> f64 {
            TokenJaccard.similarity(a, b)
        }
    }

    fn member_ids(items: &[NewsItem], clusters: &[Cluster]) -> BTreeSet<Vec<String>> {
        clusters
            .iter()
            .map(|c| {
                let mut ids: Vec<String> = c.members.iter().map(|&m| items[m].id.clone()).collect();
                ids.sort();
                ids
            })
            .collect()
    }

    #[test]
    fn identical_links_cluster_regardless_of_title() {
        let mut a = item("a", "Budget passes first reading", "https://x.com/1", "low.com");
        let mut b = item("b", "Completely different words here", "https://x.com/1", "high.com");
        b.has_image = true;
        a.has_image = false;
        let items = vec![a, b];
        let clusters = dedup().deduplicate(&items, &sources(), 30);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![0, 1]);
        assert_eq!(items[clusters[0].representative].id, "b");
    }

    #[test]
    fn near_identical_titles_merge_across_sources() {
        let items = vec![
            item("a", "Knesset approves the state budget", "https://x.com/1", "low.com"),
            item("b", "Knesset approves the state budget!", "https://y.com/2", "high.com"),
            item("c", "Storm expected on the coast", "https://z.com/3", "low.com"),
        ];
        let clusters = dedup().deduplicate(&items, &sources(), 30);
        assert_eq!(clusters.len(), 2);
        let merged = clusters.iter().find(|c| c.len() == 2).expect("merged cluster");
        assert_eq!(items[merged.representative].id, "b");
    }

    #[test]
    fn titles_below_threshold_stay_apart() {
        let items = vec![
            item("a", "Knesset approves the state budget", "https://x.com/1", "low.com"),
            item("b", "Knesset rejects the state budget", "https://y.com/2", "low.com"),
        ];
        assert_eq!(dedup().deduplicate(&items, &sources(), 30).len(), 2);
    }

    #[test]
    fn representative_prefers_earliest_then_smallest_id() {
        let mut a = item("b-id", "Same story", "https://x.com/1", "low.com");
        let mut b = item("a-id", "Same story", "https://x.com/1", "low.com");
        a.published_at = at(6);
        b.published_at = at(7);
        let items = vec![a.clone(), b.clone()];
        let clusters = dedup().deduplicate(&items, &sources(), 30);
        assert_eq!(items[clusters[0].representative].id, "b-id");

        b.published_at = at(6);
        let items = vec![a, b];
        let clusters = dedup().deduplicate(&items, &sources(), 30);
        assert_eq!(items[clusters[0].representative].id, "a-id");
    }

    #[test]
    fn unknown_sources_use_default_trust_for_representative() {
        let a = item("a", "Same story", "https://x.com/1", "mystery.net");
        let b = item("b", "Same story", "https://x.com/1", "low.com");
        let items = vec![a, b];
        // default 30 beats low.com's 20
        let clusters = dedup().deduplicate(&items, &sources(), 30);
        assert_eq!(items[clusters[0].representative].id, "a");
    }

    #[test]
    fn result_does_not_depend_on_input_order() {
        let items = vec![
            item("a", "Knesset approves the state budget", "https://x.com/1", "low.com"),
            item("b", "Storm expected on the coast", "https://z.com/3", "low.com"),
            item("c", "Knesset approves the state budget today", "https://y.com/2", "high.com"),
            item("d", "Knesset approves the state budget", "https://w.com/4", "high.com"),
        ];
        let mut reversed = items.clone();
        reversed.reverse();
        let forward = dedup().deduplicate(&items, &sources(), 30);
        let backward = dedup().deduplicate(&reversed, &sources(), 30);
        assert_eq!(member_ids(&items, &forward), member_ids(&reversed, &backward));
    }

    #[test]
    fn blocking_never_changes_membership() {
        let titles = [
            "Knesset approves the state budget",
            "Knesset approves state budget",
            "Knesset approves the state budget now",
            "Storm expected on the coast",
            "Storm expected on the coast tonight",
            "Shekel strengthens against dollar",
        ];
        let items: Vec<NewsItem> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| item(&format!("id{i}"), t, &format!("https://s.com/{i}"), "low.com"))
            .collect();
        for threshold in [0.5, 0.7, 0.85] {
            let blocked = Deduplicator::new(Box::new(TokenJaccard), threshold)
                .deduplicate(&items, &sources(), 30);
            let exhaustive =
                Deduplicator::new(Box::new(Exhaustive), threshold).deduplicate(&items, &sources(), 30);
            assert_eq!(member_ids(&items, &blocked), member_ids(&items, &exhaustive));
        }
    }

    #[test]
    fn deduplicating_representatives_is_stable() {
        let items = vec![
            item("a", "Knesset approves the state budget", "https://x.com/1", "low.com"),
            item("b", "Knesset approves the state budget", "https://x.com/1", "high.com"),
            item("c", "Knesset approves the state budget!", "https://y.com/2", "high.com"),
            item("d", "Storm expected on the coast", "https://z.com/3", "low.com"),
        ];
        let first = dedup().deduplicate(&items, &sources(), 30);
        let reps: Vec<NewsItem> = first
            .iter()
            .map(|c| items[c.representative].clone())
            .collect();
        let second = dedup().deduplicate(&reps, &sources(), 30);
        assert_eq!(second.len(), reps.len());
        assert!(second.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn representative_that_bridges_clusters_settles_into_one() {
        let words: Vec<String> = (1..=20).map(|i| format!("w{i}")).collect();
        let a = item("a", &format!("{} x", words.join(" ")), "https://a.com/1", "low.com");
        let b = item("b", &format!("{} y", words[..18].join(" ")), "https://a.com/2", "low.com");
        let mut c = item("c", &words.join(" "), "https://a.com/3", "low.com");
        c.has_image = true;
        let items = vec![a, b, c];

        let first = dedup().deduplicate(&items, &sources(), 30);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].members, vec![0, 1, 2]);
        assert_eq!(items[first[0].representative].id, "c");

        let reps: Vec<NewsItem> = first
            .iter()
            .map(|c| items[c.representative].clone())
            .collect();
        let second = dedup().deduplicate(&reps, &sources(), 30);
        assert_eq!(second.len(), reps.len());

        let exhaustive =
            Deduplicator::new(Box::new(Exhaustive), 0.85).deduplicate(&items, &sources(), 30);
        assert_eq!(member_ids(&items, &first), member_ids(&items, &exhaustive));
    }

    #[rstest]
    #[case::bridge_first(&["w1 w2 w3 w4 w5 w6 w7 w8 w9 w10 x", "w1 w2 w3 w4 w5 w6 w7 w8 w9 w10", "w1 w2 w3 w4 w5 w6 w7 w8 w9 y"])]
    #[case::bridge_last(&["w1 w2 w3 w4 w5 w6 w7 w8 w9 y", "w1 w2 w3 w4 w5 w6 w7 w8 w9 w10 x", "w1 w2 w3 w4 w5 w6 w7 w8 w9 w10"])]
    fn second_pass_over_representatives_is_singletons(#[case] titles: &[&str]) {
        let items: Vec<NewsItem> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let mut it = item(&format!("id{i}"), t, &format!("https://s.com/{i}"), "low.com");
                it.has_image = i % 2 == 1;
                it
            })
            .collect();
        for threshold in [0.8, 0.85, 0.9] {
            let dedup = Deduplicator::new(Box::new(TokenJaccard), threshold);
            let first = dedup.deduplicate(&items, &sources(), 30);
            let reps: Vec<NewsItem> = first
                .iter()
                .map(|c| items[c.representative].clone())
                .collect();
            let second = dedup.deduplicate(&reps, &sources(), 30);
            assert!(second.iter().all(|c| c.len() == 1), "threshold {threshold}");
        }
    }

    #[test]
    fn empty_titles_never_merge() {
        let items = vec![
            item("a", "!!!", "https://x.com/1", "low.com"),
            item("b", "???", "https://y.com/2", "low.com"),
        ];
        assert_eq!(dedup().deduplicate(&items, &sources(), 30).len(), 2);
    }
}
