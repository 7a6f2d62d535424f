use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use regex::{RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pipeline::types::ClickbaitHeuristic;

/// Tracking parameters stripped from links unless configured otherwise.
const DEFAULT_TRACKING_PARAMS: &[&str] = &[
    "utm_*", "gclid", "fbclid", "igshid", "mc_cid", "mc_eid", "ref",
];

const DEFAULT_CLICKBAIT_PHRASES: &[&str] = &[
    r"what happened next",
    r"will (shock|surprise|amaze) you",
    r"blow your mind",
    r"doctors hate",
    r"this one (weird )?trick",
    r"you need to see",
];

/// Shape of the freshness decay curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayKind {
    #[default]
    Exponential,
    Linear,
}

/// Title similarity metric used by the deduplicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityKind {
    #[default]
    Jaccard,
    Bigram,
}

/// Loosely typed ranker options as they appear in YAML or the environment.
///
/// Nothing reads these directly during a run: [`RankerSettings::validate`]
/// turns them into a [`RankerConfig`] first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankerSettings {
    /// Title similarity at or above which two stories merge (0..1].
    pub dedup_threshold: f64,
    pub similarity: SimilarityKind,
    pub freshness_half_life_hours: f64,
    /// Age assumed for items without a usable publish time.
    pub freshness_worst_case_age_hours: f64,
    pub freshness_max_points: f64,
    pub decay: DecayKind,
    pub max_items: usize,
    pub max_items_per_source: Option<usize>,
    pub trust_floor: Option<u8>,
    /// Rank stories whose URL key is already in the published history.
    pub allow_republish: bool,
    /// Titles shorter than this many characters are dropped as malformed.
    pub min_title_len: usize,
    /// Query parameter names stripped during link canonicalization.
    /// A trailing `*` matches by prefix.
    pub tracking_params: Vec<String>,
    pub source_default_trust: u8,
    pub source_default_reach: u8,
    pub trust_weight: f64,
    pub reach_weight: f64,
    /// Additive source points per bias tag. Empty means bias is ignored.
    pub bias_adjustments: BTreeMap<String, f64>,
    pub topic_points_per_weight: f64,
    pub topic_baseline: f64,
    pub topic_cap: Option<f64>,
    /// Inclusive body length band, in characters, that earns `band_bonus`.
    pub engagement_bonus_band: (usize, usize),
    pub image_bonus: f64,
    pub band_bonus: f64,
    pub out_of_band_penalty: f64,
    /// Penalty per triggered heuristic. Heuristics missing here never fire.
    pub clickbait_penalty_table: BTreeMap<ClickbaitHeuristic, f64>,
    pub punctuation_run: usize,
    pub caps_run_letters: usize,
    pub clickbait_phrases: Vec<String>,
}

impl Default for RankerSettings {
    fn default() -> Self {
        Self {
            dedup_threshold: 0.85,
            similarity: SimilarityKind::Jaccard,
            freshness_half_life_hours: 24.0,
            freshness_worst_case_age_hours: 72.0,
            freshness_max_points: 30.0,
            decay: DecayKind::Exponential,
            max_items: 10,
            max_items_per_source: None,
            trust_floor: None,
            allow_republish: false,
            min_title_len: 0,
            tracking_params: DEFAULT_TRACKING_PARAMS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            source_default_trust: 30,
            source_default_reach: 30,
            trust_weight: 0.3,
            reach_weight: 0.1,
            bias_adjustments: BTreeMap::new(),
            topic_points_per_weight: 10.0,
            topic_baseline: 5.0,
            topic_cap: None,
            engagement_bonus_band: (80, 600),
            image_bonus: 5.0,
            band_bonus: 5.0,
            out_of_band_penalty: 1.0,
            clickbait_penalty_table: BTreeMap::from([
                (ClickbaitHeuristic::ExcessivePunctuation, 5.0),
                (ClickbaitHeuristic::AllCaps, 5.0),
                (ClickbaitHeuristic::BaitPhrase, 8.0),
            ]),
            punctuation_run: 2,
            caps_run_letters: 8,
            clickbait_phrases: DEFAULT_CLICKBAIT_PHRASES
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }
}

impl RankerSettings {
    /// Load settings from `RANKER_CONFIG` (if set) and apply `RANKER_*` overrides.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the YAML file cannot be read or parsed, or an
    /// override does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load settings from `path`, falling back to `RANKER_CONFIG` and then the
    /// defaults, and apply `RANKER_*` overrides on top.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the YAML file cannot be read or parsed, or an
    /// override does not parse.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_yaml_path(path)?,
            None => match env::var("RANKER_CONFIG") {
                Ok(raw) if !raw.trim().is_empty() => Self::from_yaml_path(&PathBuf::from(raw))?,
                _ => Self::default(),
            },
        };
        settings.apply_env_overrides()?;
        Ok(settings)
    }

    /// # Errors
    /// Returns [`ConfigError::Io`] or [`ConfigError::Deserialize`].
    pub fn from_yaml_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Deserialize {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(max_items) = parse_env("RANKER_MAX_ITEMS")? {
            self.max_items = max_items;
        }
        if let Some(threshold) = parse_env("RANKER_DEDUP_THRESHOLD")? {
            self.dedup_threshold = threshold;
        }
        if let Some(floor) = parse_env("RANKER_TRUST_FLOOR")? {
            self.trust_floor = Some(floor);
        }
        if let Some(cap) = parse_env("RANKER_MAX_ITEMS_PER_SOURCE")? {
            self.max_items_per_source = Some(cap);
        }
        if let Some(hours) = parse_env("RANKER_FRESHNESS_HALF_LIFE_HOURS")? {
            self.freshness_half_life_hours = hours;
        }
        Ok(())
    }

    /// Check every option and build the strongly typed configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError`] describing the first invalid option.
    pub fn validate(self) -> Result<RankerConfig, ConfigError> {
        if !(self.dedup_threshold.is_finite()
            && self.dedup_threshold > 0.0
            && self.dedup_threshold <= 1.0)
        {
            return Err(ConfigError::invalid(
                "dedup_threshold",
                format!("{} is outside (0, 1]", self.dedup_threshold),
            ));
        }
        if !(self.freshness_half_life_hours.is_finite() && self.freshness_half_life_hours > 0.0) {
            return Err(ConfigError::invalid(
                "freshness_half_life_hours",
                format!("{} must be positive", self.freshness_half_life_hours),
            ));
        }
        non_negative(
            "freshness_worst_case_age_hours",
            self.freshness_worst_case_age_hours,
        )?;
        non_negative("freshness_max_points", self.freshness_max_points)?;
        non_negative("trust_weight", self.trust_weight)?;
        non_negative("reach_weight", self.reach_weight)?;
        non_negative("topic_points_per_weight", self.topic_points_per_weight)?;
        non_negative("topic_baseline", self.topic_baseline)?;
        non_negative("image_bonus", self.image_bonus)?;
        non_negative("band_bonus", self.band_bonus)?;
        non_negative("out_of_band_penalty", self.out_of_band_penalty)?;
        if let Some(cap) = self.topic_cap {
            non_negative("topic_cap", cap)?;
        }
        if let Some((tag, value)) = self.bias_adjustments.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::invalid(
                "bias_adjustments",
                format!("{tag} has non-finite adjustment {value}"),
            ));
        }
        for penalty in self.clickbait_penalty_table.values() {
            non_negative("clickbait_penalty_table", *penalty)?;
        }

        if self.max_items == 0 {
            return Err(ConfigError::invalid("max_items", "must be at least 1"));
        }
        if self.max_items_per_source == Some(0) {
            return Err(ConfigError::invalid(
                "max_items_per_source",
                "must be at least 1 when set",
            ));
        }
        percentage("source_default_trust", self.source_default_trust)?;
        percentage("source_default_reach", self.source_default_reach)?;
        if let Some(floor) = self.trust_floor {
            percentage("trust_floor", floor)?;
        }

        let (min_len, max_len) = self.engagement_bonus_band;
        if min_len > max_len {
            return Err(ConfigError::invalid(
                "engagement_bonus_band",
                format!("min {min_len} exceeds max {max_len}"),
            ));
        }
        if self.punctuation_run < 2 {
            return Err(ConfigError::invalid(
                "punctuation_run",
                "must be at least 2",
            ));
        }
        if self.caps_run_letters == 0 {
            return Err(ConfigError::invalid("caps_run_letters", "must be positive"));
        }
        if self.tracking_params.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::invalid(
                "tracking_params",
                "entries must not be empty",
            ));
        }

        let bait_patterns = RegexSetBuilder::new(&self.clickbait_phrases)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::Pattern { source })?;

        let freshness_half_life =
            hours_to_duration("freshness_half_life_hours", self.freshness_half_life_hours)?;
        let freshness_worst_case_age = hours_to_duration(
            "freshness_worst_case_age_hours",
            self.freshness_worst_case_age_hours,
        )?;

        Ok(RankerConfig {
            settings: self,
            freshness_half_life,
            freshness_worst_case_age,
            bait_patterns,
        })
    }
}

fn hours_to_duration(name: &'static str, hours: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(hours * 3600.0)
        .map_err(|err| ConfigError::invalid(name, format!("{hours} hours: {err}")))
}

/// Validated ranker configuration, fixed for the duration of a run.
#[derive(Debug, Clone)]
pub struct RankerConfig {
    settings: RankerSettings,
    freshness_half_life: Duration,
    freshness_worst_case_age: Duration,
    bait_patterns: RegexSet,
}

impl RankerConfig {
    /// Load, override and validate in one step.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if loading or validation fails.
    pub fn from_env() -> Result<Self, ConfigError> {
        RankerSettings::from_env()?.validate()
    }

    #[must_use]
    pub fn settings(&self) -> &RankerSettings {
        &self.settings
    }

    #[must_use]
    pub fn freshness_half_life(&self) -> Duration {
        self.freshness_half_life
    }

    #[must_use]
    pub fn freshness_worst_case_age(&self) -> Duration {
        self.freshness_worst_case_age
    }

    #[must_use]
    pub fn bait_patterns(&self) -> &RegexSet {
        &self.bait_patterns
    }

    /// Penalty for a heuristic, or `None` when it is disabled.
    #[must_use]
    pub fn clickbait_penalty(&self, heuristic: ClickbaitHeuristic) -> Option<f64> {
        self.settings.clickbait_penalty_table.get(&heuristic).copied()
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            name,
            format!("{value} must be a finite, non-negative number"),
        ))
    }
}

fn percentage(name: &'static str, value: u8) -> Result<(), ConfigError> {
    if value <= 100 {
        Ok(())
    } else {
        Err(ConfigError::invalid(name, format!("{value} exceeds 100")))
    }
}

fn parse_env<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { name, value: raw }),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn default_settings_validate() {
        let config = RankerSettings::default().validate().expect("defaults are valid");
        assert_eq!(config.settings().max_items, 10);
        assert_eq!(config.freshness_half_life(), Duration::from_secs(24 * 3600));
        assert_eq!(
            config.clickbait_penalty(ClickbaitHeuristic::AllCaps),
            Some(5.0)
        );
    }

    #[rstest]
    #[case::zero_threshold(RankerSettings { dedup_threshold: 0.0, ..RankerSettings::default() }, "dedup_threshold")]
    #[case::threshold_above_one(RankerSettings { dedup_threshold: 1.5, ..RankerSettings::default() }, "dedup_threshold")]
    #[case::negative_weight(RankerSettings { trust_weight: -0.1, ..RankerSettings::default() }, "trust_weight")]
    #[case::nan_weight(RankerSettings { reach_weight: f64::NAN, ..RankerSettings::default() }, "reach_weight")]
    #[case::zero_half_life(RankerSettings { freshness_half_life_hours: 0.0, ..RankerSettings::default() }, "freshness_half_life_hours")]
    #[case::huge_half_life(RankerSettings { freshness_half_life_hours: 1e300, ..RankerSettings::default() }, "freshness_half_life_hours")]
    #[case::huge_worst_case_age(RankerSettings { freshness_worst_case_age_hours: 1e300, ..RankerSettings::default() }, "freshness_worst_case_age_hours")]
    #[case::zero_max_items(RankerSettings { max_items: 0, ..RankerSettings::default() }, "max_items")]
    #[case::zero_source_cap(RankerSettings { max_items_per_source: Some(0), ..RankerSettings::default() }, "max_items_per_source")]
    #[case::trust_floor_over_100(RankerSettings { trust_floor: Some(101), ..RankerSettings::default() }, "trust_floor")]
    #[case::inverted_band(RankerSettings { engagement_bonus_band: (500, 100), ..RankerSettings::default() }, "engagement_bonus_band")]
    #[case::single_punctuation(RankerSettings { punctuation_run: 1, ..RankerSettings::default() }, "punctuation_run")]
    fn invalid_settings_are_rejected(#[case] settings: RankerSettings, #[case] field: &str) {
        match settings.validate() {
            Err(ConfigError::Invalid { name, .. }) => assert_eq!(name, field),
            other => panic!("expected invalid {field}, got {other:?}"),
        }
    }

    #[test]
    fn negative_penalty_is_rejected() {
        let mut settings = RankerSettings::default();
        settings
            .clickbait_penalty_table
            .insert(ClickbaitHeuristic::BaitPhrase, -3.0);
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid {
                name: "clickbait_penalty_table",
                ..
            })
        ));
    }

    #[test]
    fn broken_bait_pattern_is_rejected() {
        let settings = RankerSettings {
            clickbait_phrases: vec!["(unclosed".to_string()],
            ..RankerSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Pattern { .. })
        ));
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "max_items: 5\nmax_items_per_source: 2\nengagement_bonus_band: [40, 400]\nclickbait_penalty_table:\n  all_caps: 2.5\n"
        )
        .expect("write yaml");

        let settings = RankerSettings::from_yaml_path(file.path()).expect("yaml parses");
        assert_eq!(settings.max_items, 5);
        assert_eq!(settings.max_items_per_source, Some(2));
        assert_eq!(settings.engagement_bonus_band, (40, 400));
        assert!((settings.dedup_threshold - 0.85).abs() < f64::EPSILON);
        assert_eq!(settings.clickbait_penalty_table.len(), 1);
    }

    #[test]
    fn yaml_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "max_itemz: 5").expect("write yaml");
        assert!(matches!(
            RankerSettings::from_yaml_path(file.path()),
            Err(ConfigError::Deserialize { .. })
        ));
    }

    #[test]
    fn missing_yaml_reports_path() {
        let err = RankerSettings::from_yaml_path(Path::new("/nonexistent/ranker.yaml"))
            .expect_err("missing file");
        match err {
            ConfigError::Io { path, .. } => assert!(path.ends_with("ranker.yaml")),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn env_overrides_apply() {
        temp_env::with_vars(
            [
                ("RANKER_CONFIG", None),
                ("RANKER_MAX_ITEMS", Some("3")),
                ("RANKER_TRUST_FLOOR", Some("40")),
                ("RANKER_DEDUP_THRESHOLD", Some("0.7")),
            ],
            || {
                let config = RankerConfig::from_env().expect("config loads");
                assert_eq!(config.settings().max_items, 3);
                assert_eq!(config.settings().trust_floor, Some(40));
                assert!((config.settings().dedup_threshold - 0.7).abs() < f64::EPSILON);
            },
        );
    }

    #[test]
    fn malformed_env_override_is_an_error() {
        temp_env::with_vars(
            [("RANKER_CONFIG", None), ("RANKER_MAX_ITEMS", Some("many"))],
            || {
                assert!(matches!(
                    RankerSettings::from_env(),
                    Err(ConfigError::Env {
                        name: "RANKER_MAX_ITEMS",
                        ..
                    })
                ));
            },
        );
    }
}
