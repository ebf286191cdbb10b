use anyhow::Context;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};

use crate::config;
use crate::feed::ProjectedTrack;
use crate::http::server::HttpServer;
use crate::service::StatsService;
use crate::storage::{self, catalog::JsonCatalog, operations::StatsStore};

#[derive(Parser)]
#[command(name = "trackstats")]
#[command(version = "0.1")]
#[command(about = "Track plays, likes and saves with live updates")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the http server with the realtime channel
    Serve,
    /// Show the counters of one track
    Stats { track_id: String },
    /// List tracks, newest first
    Feed {
        /// Maximum number of tracks, 0 for all
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },
    /// List tracks by trending score
    Trending {
        /// Maximum number of tracks to print, 0 for all
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },
    /// List the newest tracks
    Recent {
        /// Number of tracks, defaults to the configured recent limit
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Like a track on behalf of a user
    Like { track_id: String, user_id: String },
    /// Count one play of a track
    Play { track_id: String },
    /// Load the stats, repair malformed records and write them back
    Repair,
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::Config::load(&cli.config)?;

    let store = StatsStore::open(storage::open_backend(&cfg.database)?)
        .context("Failed to initialize stats store")?;
    let catalog = JsonCatalog::new(&cfg.catalog.path);
    let service = Arc::new(StatsService::new(
        store,
        Box::new(catalog),
        cfg.feed.recent_limit,
    ));

    match cli.command {
        Commands::Serve => {
            println!("Starting HTTP server...");

            let http_server = HttpServer::new(Arc::clone(&service), cfg.http, cfg.public_endpoint);

            println!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
        }

        Commands::Stats { track_id } => {
            let counts = service.lookup(&track_id)?;
            println!("Track: {track_id}");
            println!("  plays: {}", counts.plays);
            println!("  likes: {}", counts.likes);
            println!("  saves: {}", counts.saves);
        }

        Commands::Feed { limit } => print_items(&service.feed(limit)?),

        Commands::Trending { limit } => {
            let mut items = service.trending()?;
            if limit > 0 {
                items.truncate(limit);
            }
            print_items(&items);
        }

        Commands::Recent { limit } => print_items(&service.recent(limit)?),

        Commands::Like { track_id, user_id } => {
            let outcome = service.like(&track_id, &user_id)?;
            if outcome.already_liked {
                println!("{user_id} already liked {track_id}");
            }
            println!("Track {track_id} now has {} likes", outcome.counts.likes);
        }

        Commands::Play { track_id } => {
            let counts = service.report_play(&track_id)?;
            println!("Track {track_id} now has {} plays", counts.plays);
        }

        Commands::Repair => {
            let report = service.repair()?;
            println!(
                "Stats of {} tracks checked, {} repaired",
                report.records, report.repaired
            );
        }
    }

    service.shutdown()?;
    Ok(())
}

fn print_items(items: &[ProjectedTrack]) {
    for (rank, item) in items.iter().enumerate() {
        let created = item
            .track
            .created_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>3}. {} \"{}\" ({created})",
            rank + 1,
            item.track.id,
            item.track.title
        );
        println!(
            "     plays: {}, likes: {}, saves: {}, score: {}",
            item.counts.plays,
            item.counts.likes,
            item.counts.saves,
            item.counts.score()
        );
    }
}
