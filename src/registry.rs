//! Source, topic and entity registries.
//!
//! Registries are loaded once per run, validated up front and then only read.
//! Any inconsistency (duplicate ids, out-of-range values) is fatal before a
//! single item is scored.
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::RegistryError;
use crate::util::phrase::{PhraseEntry, PhraseMatcher};

/// Per-publisher trust metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub source_id: String,
    /// 0..=100
    pub trust: u8,
    /// 0..=100
    pub reach: u8,
    /// -20..=20, added to the source factor.
    #[serde(default)]
    pub boost: i8,
    #[serde(default)]
    pub bias_tag: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    entries: FxHashMap<String, SourceEntry>,
}

#[derive(Deserialize)]
struct SourceFile {
    sources: Vec<SourceEntry>,
}

impl SourceRegistry {
    /// # Errors
    /// Returns [`RegistryError`] for empty or duplicate ids and out-of-range values.
    pub fn from_entries(entries: Vec<SourceEntry>) -> Result<Self, RegistryError> {
        let mut map = FxHashMap::default();
        for mut entry in entries {
            entry.source_id = normalize_id(&entry.source_id);
            if entry.source_id.is_empty() {
                return Err(RegistryError::EmptyId { kind: "source" });
            }
            check_range(&entry.source_id, "trust", f64::from(entry.trust), 0.0, 100.0)?;
            check_range(&entry.source_id, "reach", f64::from(entry.reach), 0.0, 100.0)?;
            check_range(&entry.source_id, "boost", f64::from(entry.boost), -20.0, 20.0)?;
            if map.contains_key(&entry.source_id) {
                return Err(RegistryError::Duplicate {
                    kind: "source",
                    id: entry.source_id,
                });
            }
            map.insert(entry.source_id.clone(), entry);
        }
        Ok(Self { entries: map })
    }

    /// # Errors
    /// Returns [`RegistryError`] when the file is unreadable, malformed or inconsistent.
    pub fn from_yaml_path(path: &Path) -> Result<Self, RegistryError> {
        let file: SourceFile = read_yaml(path)?;
        Self::from_entries(file.sources)
    }

    /// Look a source up by id, falling back to the id without a `www.` prefix.
    #[must_use]
    pub fn get(&self, source_id: &str) -> Option<&SourceEntry> {
        let id = normalize_id(source_id);
        self.entries.get(&id).or_else(|| {
            id.strip_prefix("www.")
                .and_then(|bare| self.entries.get(bare))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Weighted keyword set for a subject area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicEntry {
    pub topic_id: String,
    pub weight: f64,
    /// Case-insensitive; a trailing `*` marks a stem.
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TopicRegistry {
    topics: Vec<TopicEntry>,
    matcher: PhraseMatcher,
}

#[derive(Deserialize)]
struct TopicFile {
    topics: Vec<TopicEntry>,
}

impl TopicRegistry {
    /// # Errors
    /// Returns [`RegistryError`] for duplicate ids or negative/non-finite weights.
    pub fn from_entries(topics: Vec<TopicEntry>) -> Result<Self, RegistryError> {
        let mut seen = FxHashSet::default();
        let mut phrases = Vec::new();
        for (index, topic) in topics.iter().enumerate() {
            if topic.topic_id.trim().is_empty() {
                return Err(RegistryError::EmptyId { kind: "topic" });
            }
            if !seen.insert(topic.topic_id.clone()) {
                return Err(RegistryError::Duplicate {
                    kind: "topic",
                    id: topic.topic_id.clone(),
                });
            }
            if !(topic.weight.is_finite() && topic.weight >= 0.0) {
                return Err(RegistryError::TopicWeight {
                    topic_id: topic.topic_id.clone(),
                    weight: topic.weight,
                });
            }
            phrases.extend(
                topic
                    .keywords
                    .iter()
                    .filter_map(|keyword| PhraseEntry::parse(keyword, index)),
            );
        }
        let matcher = PhraseMatcher::new(phrases)?;
        Ok(Self { topics, matcher })
    }

    /// # Errors
    /// Returns [`RegistryError`] when the file is unreadable, malformed or inconsistent.
    pub fn from_yaml_path(path: &Path) -> Result<Self, RegistryError> {
        let file: TopicFile = read_yaml(path)?;
        Self::from_entries(file.topics)
    }

    /// Topics with at least one keyword in `text`, in registry order.
    #[must_use]
    pub fn matching(&self, text: &str) -> Vec<&TopicEntry> {
        self.matcher
            .find_owners(text)
            .into_iter()
            .map(|index| &self.topics[index])
            .collect()
    }

    #[must_use]
    pub fn topics(&self) -> &[TopicEntry] {
        &self.topics
    }
}

/// A person or organisation tracked by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EntityList {
    entities: Vec<Entity>,
    matcher: PhraseMatcher,
}

#[derive(Deserialize)]
struct EntityFile {
    entities: Vec<Entity>,
}

impl EntityList {
    /// # Errors
    /// Returns [`RegistryError`] for empty or duplicate entity ids.
    pub fn from_entries(entities: Vec<Entity>) -> Result<Self, RegistryError> {
        let mut seen = FxHashSet::default();
        let mut phrases = Vec::new();
        for (index, entity) in entities.iter().enumerate() {
            if entity.id.trim().is_empty() {
                return Err(RegistryError::EmptyId { kind: "entity" });
            }
            if !seen.insert(entity.id.clone()) {
                return Err(RegistryError::Duplicate {
                    kind: "entity",
                    id: entity.id.clone(),
                });
            }
            phrases.extend(
                std::iter::once(&entity.name)
                    .chain(entity.aliases.iter())
                    .filter_map(|name| {
                        // Names are literal; a trailing `*` is not a stem here.
                        PhraseEntry::parse(name.trim_end_matches('*'), index)
                    }),
            );
        }
        let matcher = PhraseMatcher::new(phrases)?;
        Ok(Self { entities, matcher })
    }

    /// # Errors
    /// Returns [`RegistryError`] when the file is unreadable, malformed or inconsistent.
    pub fn from_yaml_path(path: &Path) -> Result<Self, RegistryError> {
        let file: EntityFile = read_yaml(path)?;
        Self::from_entries(file.entities)
    }

    /// Ids of entities whose name or an alias appears in `text`.
    #[must_use]
    pub fn detect(&self, text: &str) -> BTreeSet<String> {
        self.matcher
            .find_owners(text)
            .into_iter()
            .map(|index| self.entities[index].id.clone())
            .collect()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// All read-only tables a run needs, passed explicitly into the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub sources: SourceRegistry,
    pub topics: TopicRegistry,
    pub entities: EntityList,
}

impl Registries {
    /// # Errors
    /// Returns the first [`RegistryError`] hit while loading any of the files.
    pub fn load(
        sources: &Path,
        topics: &Path,
        entities: Option<&Path>,
    ) -> Result<Self, RegistryError> {
        let sources = SourceRegistry::from_yaml_path(sources)?;
        let topics = TopicRegistry::from_yaml_path(topics)?;
        let entities = match entities {
            Some(path) => EntityList::from_yaml_path(path)?,
            None => EntityList::default(),
        };
        tracing::info!(
            sources = sources.len(),
            topics = topics.topics().len(),
            "registries loaded"
        );
        Ok(Self {
            sources,
            topics,
            entities,
        })
    }
}

fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

fn check_range(
    source_id: &str,
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), RegistryError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(RegistryError::OutOfRange {
            source_id: source_id.to_string(),
            field,
            value,
        })
    }
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, RegistryError> {
    let contents = fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| RegistryError::Deserialize {
        path: path.to_path_buf(),
        source,
    })
}
