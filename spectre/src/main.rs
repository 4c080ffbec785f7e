mod commands;
mod config;
mod errors;
mod ingest;
mod lifecycle;
mod query_engine;
mod routes;

use clap::{Parser, Subcommand};
use spectre_core::errors::EmptyResult;
use spectre_core::logging;
use tracing::instrument;

use crate::config::SpectreConfig;
use crate::lifecycle::Lifecycle;

#[derive(Parser, Debug)]
struct Options {
    #[command(subcommand)]
    command: Option<Command>,

    #[arg(short, long, default_value = "info")]
    verbosity: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (timeline/topology/root-cause/blast-radius routes).
    Serve(ServeArgs),

    /// Query helpers that bypass the HTTP server.
    #[command(subcommand)]
    Query(QuerySubcommand),

    /// Store inspection helpers that bypass the HTTP server.
    #[command(subcommand)]
    Store(StoreSubcommand),
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    #[arg(short, long)]
    config_file: String,

    #[arg(long)]
    server_port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum QuerySubcommand {
    /// Rebuild the graph from everything on disk and run one timeline query.
    Timeline(commands::QueryArgs),
}

#[derive(Subcommand, Debug)]
enum StoreSubcommand {
    /// Print on-disk file/event/byte counts.
    Stats(commands::StoreArgs),
}

#[instrument(ret, err)]
async fn serve(args: ServeArgs) -> EmptyResult {
    let mut config = SpectreConfig::load(&args.config_file)?;
    if let Some(port) = args.server_port {
        config.server_port = port;
    }

    let lifecycle = Lifecycle::start(config.clone()).await?;
    let engine = lifecycle.query_engine.clone();

    let rkt_config = rocket::Config { port: config.server_port, ..Default::default() };
    let server = rocket::custom(&rkt_config)
        .mount("/", rocket::routes![routes::timeline, routes::topology, routes::root_cause, routes::blast_radius])
        .manage(engine);

    let result = server.launch().await;
    lifecycle.shutdown().await;
    result.map(|_| ()).map_err(|e| e.into())
}

#[tokio::main]
async fn main() -> EmptyResult {
    let args = Options::parse();
    logging::setup(&args.verbosity);
    match args.command {
        None => Err(anyhow::anyhow!("no subcommand given; try `spectre serve --config-file <path>`")),
        Some(Command::Serve(args)) => serve(args).await,
        Some(Command::Query(QuerySubcommand::Timeline(args))) => commands::query_timeline(&args).await,
        Some(Command::Store(StoreSubcommand::Stats(args))) => commands::store_stats(&args).await,
    }
}
