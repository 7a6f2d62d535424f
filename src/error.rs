//! Fatal, start-of-run error classes.
//!
//! Only configuration and registry problems abort a run. Everything that can go
//! wrong with a single item degrades to a default plus an audit note instead.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read ranker config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse ranker config at {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("invalid environment override {name}={value}")]
    Env { name: &'static str, value: String },
    #[error("invalid clickbait pattern: {source}")]
    Pattern {
        #[source]
        source: regex::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse registry at {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("duplicate {kind} id: {id}")]
    Duplicate { kind: &'static str, id: String },
    #[error("empty {kind} id")]
    EmptyId { kind: &'static str },
    #[error("{field} for source {source_id} out of range: {value}")]
    OutOfRange {
        source_id: String,
        field: &'static str,
        value: f64,
    },
    #[error("topic {topic_id} has invalid weight {weight}")]
    TopicWeight { topic_id: String, weight: f64 },
    #[error("failed to build phrase matcher: {0}")]
    Matcher(#[from] aho_corasick::BuildError),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read published history at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse published history at {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
