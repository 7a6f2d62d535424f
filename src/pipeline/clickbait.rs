//! Sensationalist headline detection on display titles.

use std::collections::BTreeMap;

use regex::RegexSet;

use crate::config::RankerConfig;

use super::types::ClickbaitHeuristic;

#[derive(Debug, Clone)]
pub struct ClickbaitDetector {
    penalties: BTreeMap<ClickbaitHeuristic, f64>,
    punctuation_run: usize,
    caps_run_letters: usize,
    phrases: RegexSet,
}

/// Heuristics that fired for one title and their summed penalty (positive).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClickbaitVerdict {
    pub triggered: Vec<ClickbaitHeuristic>,
    pub penalty: f64,
}

impl ClickbaitDetector {
    #[must_use]
    pub fn new(config: &RankerConfig) -> Self {
        let settings = config.settings();
        Self {
            penalties: settings.clickbait_penalty_table.clone(),
            punctuation_run: settings.punctuation_run,
            caps_run_letters: settings.caps_run_letters,
            phrases: config.bait_patterns().clone(),
        }
    }

    /// Each heuristic counts at most once; heuristics without a configured
    /// penalty are skipped.
    #[must_use]
    pub fn assess(&self, title: &str) -> ClickbaitVerdict {
        let mut verdict = ClickbaitVerdict::default();
        for (&heuristic, &penalty) in &self.penalties {
            let fired = match heuristic {
                ClickbaitHeuristic::ExcessivePunctuation => self.excessive_punctuation(title),
                ClickbaitHeuristic::AllCaps => self.all_caps_run(title),
                ClickbaitHeuristic::BaitPhrase => self.phrases.is_match(title),
            };
            if fired {
                verdict.triggered.push(heuristic);
                verdict.penalty += penalty;
            }
        }
        verdict
    }

    fn excessive_punctuation(&self, title: &str) -> bool {
        let mut run = 0usize;
        for c in title.chars() {
            if matches!(c, '!' | '?' | '！' | '？' | '‼' | '⁉') {
                run += 1;
                if run >= self.punctuation_run {
                    return true;
                }
            } else {
                run = 0;
            }
        }
        false
    }

    /// Consecutive upper-case words whose letters add up to the threshold.
    /// Words without letters ("2025", "-") neither extend nor break a run, and
    /// caseless scripts never count as shouting.
    fn all_caps_run(&self, title: &str) -> bool {
        let mut run = 0usize;
        for word in title.split_whitespace() {
            let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
            if letters.is_empty() {
                continue;
            }
            if letters.iter().all(|c| c.is_uppercase()) {
                run += letters.len();
                if run >= self.caps_run_letters {
                    return true;
                }
            } else {
                run = 0;
            }
        }
        false
    }
}
