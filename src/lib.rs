#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod util;

pub use config::{RankerConfig, RankerSettings};
pub use error::{ConfigError, HistoryError, RegistryError};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineReport};
pub use registry::{Registries, SourceRegistry, TopicRegistry, EntityList};
