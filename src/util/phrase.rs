//! Whole-word, case-insensitive phrase matching over many patterns at once.
use std::collections::BTreeSet;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

/// One searchable phrase and the owner (topic, entity, ...) it belongs to.
#[derive(Debug, Clone)]
pub struct PhraseEntry {
    pub phrase: String,
    pub owner: usize,
    /// Match as a word prefix (`econom*` matches "economy", "economic").
    pub prefix: bool,
}

impl PhraseEntry {
    /// Parse a keyword, treating a trailing `*` as a prefix marker.
    #[must_use]
    pub fn parse(keyword: &str, owner: usize) -> Option<Self> {
        let keyword = keyword.trim();
        let (phrase, prefix) = match keyword.strip_suffix('*') {
            Some(stem) => (stem.trim_end(), true),
            None => (keyword, false),
        };
        let phrase = phrase.to_lowercase();
        if phrase.is_empty() {
            return None;
        }
        Some(Self {
            phrase,
            owner,
            prefix,
        })
    }
}

/// Aho-Corasick automaton over lower-cased phrases with word-boundary checks.
#[derive(Debug, Clone, Default)]
pub struct PhraseMatcher {
    ac: Option<AhoCorasick>,
    entries: Vec<PhraseEntry>,
}

impl PhraseMatcher {
    /// # Errors
    /// Returns the automaton build error, which only happens for pathological
    /// pattern sets.
    pub fn new(entries: Vec<PhraseEntry>) -> Result<Self, aho_corasick::BuildError> {
        if entries.is_empty() {
            return Ok(Self { ac: None, entries });
        }
        let patterns: Vec<&str> = entries.iter().map(|entry| entry.phrase.as_str()).collect();
        let ac = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .build(&patterns)?;
        Ok(Self {
            ac: Some(ac),
            entries,
        })
    }

    /// Owners with at least one phrase present in `text`.
    #[must_use]
    pub fn find_owners(&self, text: &str) -> BTreeSet<usize> {
        let Some(ac) = &self.ac else {
            return BTreeSet::new();
        };
        let lowered = text.to_lowercase();
        let mut owners = BTreeSet::new();
        for mat in ac.find_overlapping_iter(&lowered) {
            let entry = &self.entries[mat.pattern().as_usize()];
            if owners.contains(&entry.owner) {
                continue;
            }
            let starts_word = lowered[..mat.start()]
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_alphanumeric());
            let ends_word = entry.prefix
                || lowered[mat.end()..]
                    .chars()
                    .next()
                    .is_none_or(|c| !c.is_alphanumeric());
            if starts_word && ends_word {
                owners.insert(entry.owner);
            }
        }
        owners
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(keywords: &[(&str, usize)]) -> PhraseMatcher {
        let entries = keywords
            .iter()
            .filter_map(|(k, owner)| PhraseEntry::parse(k, *owner))
            .collect();
        PhraseMatcher::new(entries).expect("matcher builds")
    }

    #[test]
    fn matches_whole_words_case_insensitively() {
        let m = matcher(&[("Iran", 0), ("election", 1)]);
        let owners = m.find_owners("IRAN warns ahead of the Election");
        assert_eq!(owners, BTreeSet::from([0, 1]));
    }

    #[test]
    fn rejects_partial_words() {
        let m = matcher(&[("art", 0)]);
        assert!(m.find_owners("Smartphones are everywhere").is_empty());
        assert!(m.find_owners("Modern art fair").contains(&0));
    }

    #[test]
    fn prefix_keywords_match_stems() {
        let m = matcher(&[("econom*", 0)]);
        assert!(m.find_owners("The economic outlook").contains(&0));
        assert!(m.find_owners("Economy shrinks").contains(&0));
        assert!(m.find_owners("Noneconomic factors").is_empty());
    }

    #[test]
    fn overlapping_phrases_all_count() {
        let m = matcher(&[("prime minister", 0), ("minister", 1)]);
        assert_eq!(
            m.find_owners("The prime minister spoke"),
            BTreeSet::from([0, 1])
        );
    }

    #[test]
    fn hebrew_phrases_match() {
        let m = matcher(&[("נתניהו", 7)]);
        assert!(m.find_owners("ראש הממשלה נתניהו הודיע").contains(&7));
    }

    #[test]
    fn empty_matcher_finds_nothing() {
        let m = matcher(&[]);
        assert!(m.is_empty());
        assert!(m.find_owners("anything").is_empty());
    }
}
