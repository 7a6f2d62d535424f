use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;

use news_ranker::{
    Pipeline, RankerSettings, Registries,
    observability::init_tracing,
    pipeline::{
        entity_index::EntityIndexRow, normalize::RawItem, rank::PublishedHistory,
        rank::RankTrace, types::ScoredItem,
    },
};

/// Score, deduplicate and rank a batch of feed items.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// JSON array of raw feed items
    #[arg(long)]
    items: PathBuf,

    /// Source registry YAML
    #[arg(long)]
    sources: PathBuf,

    /// Topic registry YAML
    #[arg(long)]
    topics: PathBuf,

    /// Entity list YAML
    #[arg(long)]
    entities: Option<PathBuf>,

    /// Ranker configuration YAML
    #[arg(long, env = "RANKER_CONFIG")]
    config: Option<PathBuf>,

    /// Published-history JSON
    #[arg(long)]
    history: Option<PathBuf>,

    /// Reference time (RFC 3339); defaults to the current time
    #[arg(long, value_parser = parse_now)]
    now: Option<DateTime<Utc>>,

    /// Include the entity index in the output
    #[arg(long)]
    index: bool,
}

#[derive(Serialize)]
struct Output<'a> {
    ranked: &'a [ScoredItem],
    dropped_malformed: usize,
    clusters: usize,
    rank: RankTrace,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_index: Option<&'a [EntityIndexRow]>,
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing()?;

    let config = RankerSettings::load(args.config.as_deref())
        .and_then(RankerSettings::validate)
        .context("invalid ranker configuration")?;
    let registries = Registries::load(&args.sources, &args.topics, args.entities.as_deref())
        .context("failed to load registries")?;
    let history = match &args.history {
        Some(path) => {
            PublishedHistory::from_json_path(path).context("failed to load published history")?
        }
        None => PublishedHistory::default(),
    };

    let raw = fs::read_to_string(&args.items)
        .with_context(|| format!("failed to read items from {}", args.items.display()))?;
    let items: Vec<RawItem> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse items in {}", args.items.display()))?;

    let now = args.now.unwrap_or_else(Utc::now);
    let report = Pipeline::new(config).run(&items, &registries, &history, now);

    let output = Output {
        ranked: &report.ranked,
        dropped_malformed: report.dropped_malformed.len(),
        clusters: report.clusters,
        rank: report.rank,
        entity_index: args.index.then_some(report.entity_index.as_slice()),
    };
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, &output).context("failed to write ranked output")?;
    writeln!(out).context("failed to write ranked output")?;
    Ok(())
}

fn parse_now(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|parsed| parsed.with_timezone(&Utc))
}
