//! Thin operator subcommands wrapping the query engine and the store
//! directly, without the HTTP server or background tasks (spec.md §3's
//! "CLI surface on the binary"), grounded on `sk-cli`'s one-module-per-
//! subcommand `Args`/`cmd` shape (`sk-cli::snapshot`).

use std::sync::Arc;

use spectre_core::errors::EmptyResult;
use spectre_extractors::{default_extractors, Pipeline};
use spectre_graph::GraphClient;
use spectre_store::{QueryFilter, Storage};
use spectre_types::{TimelineFilters, TimelineQuery};

use crate::config::SpectreConfig;
use crate::ingest::{ingest_event, SequenceCounters};
use crate::query_engine::QueryEngine;

#[derive(clap::Args)]
pub struct QueryArgs {
    #[arg(short, long)]
    pub config_file: String,

    #[arg(long, default_value_t = 0)]
    pub start_sec: i64,

    #[arg(long)]
    pub end_sec: i64,

    #[arg(long)]
    pub kind: Option<String>,

    #[arg(long)]
    pub namespace: Option<String>,

    #[arg(long)]
    pub api_group: Option<String>,
}

#[derive(clap::Args)]
pub struct StoreArgs {
    #[arg(short, long)]
    pub config_file: String,
}

/// Rebuilds an in-memory graph from everything on disk, then runs one
/// timeline query against it and prints the result. One-shot: there is no
/// lifecycle manager, background closer, or retention task here.
pub async fn query_timeline(args: &QueryArgs) -> EmptyResult {
    let config = SpectreConfig::load(&args.config_file)?;
    let storage = Storage::new(config.store.clone())?;
    let graph = Arc::new(GraphClient::new(config.graph.clone()));
    let pipeline = Pipeline::new(default_extractors());
    let sequences = SequenceCounters::new();

    let filter = QueryFilter { kind: args.kind.as_deref(), namespace: args.namespace.as_deref(), api_group: args.api_group.as_deref() };
    let events = storage.query_events(args.start_sec * spectre_core::time::NANOS_PER_SEC, args.end_sec * spectre_core::time::NANOS_PER_SEC, filter).await?;
    for event in &events {
        ingest_event(&graph, &pipeline, &sequences, event).await?;
    }

    let engine = QueryEngine::new(graph, config.query_timeout());
    let query = TimelineQuery {
        start_sec: args.start_sec,
        end_sec: args.end_sec,
        filters: TimelineFilters { kind: args.kind.clone(), namespace: args.namespace.clone(), api_group: args.api_group.clone() },
    };
    let result = engine.timeline(&query).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Prints on-disk summary stats without touching the graph at all.
pub async fn store_stats(args: &StoreArgs) -> EmptyResult {
    let config = SpectreConfig::load(&args.config_file)?;
    let storage = Storage::new(config.store.clone())?;
    let stats = storage.stats().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
