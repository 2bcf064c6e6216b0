//! medley-sync - inspect and maintain persisted sync state
//!
//! Provider clients are linked in by the host application; this binary works
//! on the cache database alone: listing sync checkpoints and library counts,
//! forgetting one provider's checkpoint, or purging the cache.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use medley_common::config::{self, ROOT_FOLDER_ENV};
use medley_common::db::sync_resume_key;
use medley_common::MediaDatabase;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for medley-sync
#[derive(Parser, Debug)]
#[command(name = "medley-sync")]
#[command(about = "Maintenance tool for the Medley library cache")]
#[command(version)]
struct Args {
    /// Root folder holding the cache database
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Bootstrap TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List sync checkpoints and saved item counts
    State,
    /// Forget a provider's sync checkpoint so its next sync starts over
    ResetCheckpoint {
        /// Provider name
        provider: String,
    },
    /// Drop and recreate every cache table
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = config::load_config(args.config.as_deref()).context("Failed to load config")?;

    // RUST_LOG overrides the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    info!("Root folder: {}", root_folder.display());

    let db = MediaDatabase::initialize(&root_folder, &toml_config.sync)
        .await
        .context("Failed to open cache database")?;

    match args.command {
        Command::State => print_state(&db).await?,
        Command::ResetCheckpoint { provider } => {
            if db.delete_state(&sync_resume_key(&provider)).await? {
                println!("Checkpoint for {} removed", provider);
            } else {
                println!("No checkpoint stored for {}", provider);
            }
        }
        Command::Purge => {
            db.reset().await?;
            println!("Cache purged");
        }
    }

    Ok(())
}

async fn print_state(db: &MediaDatabase) -> Result<()> {
    let checkpoints = db.list_sync_checkpoints().await?;
    if checkpoints.is_empty() {
        println!("No sync checkpoints");
    }
    for (provider, token) in &checkpoints {
        println!("{}: {}", provider, token.as_deref().unwrap_or("(none)"));
        println!(
            "  saved tracks: {}, albums: {}, playlists: {}",
            db.get_saved_tracks_count(Some(provider)).await?,
            db.get_saved_albums_count(Some(provider)).await?,
            db.get_saved_playlists_count(Some(provider)).await?
        );
    }
    println!(
        "Total saved tracks: {}, albums: {}, playlists: {}",
        db.get_saved_tracks_count(None).await?,
        db.get_saved_albums_count(None).await?,
        db.get_saved_playlists_count(None).await?
    );
    Ok(())
}
