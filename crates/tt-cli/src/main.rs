use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use tt_cli::commands::export::ArchiveFile;
use tt_cli::commands::{clear, export, list, session, status, total};
use tt_cli::{Cli, Commands, Config};
use tt_core::{EntryStore, SessionManager, SystemClock};

/// Load config and open database, ensuring the parent directory exists.
async fn open_database(config_path: Option<&Path>) -> Result<(tt_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = tt_db::Database::new(&config.database_path);
    db.initialize()
        .await
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Some(Commands::Session) => {
            let (db, _config) = open_database(cli.config.as_deref()).await?;
            let mut manager = SessionManager::new(db);
            let input = BufReader::new(tokio::io::stdin());
            session::run(&mut manager, input, &mut stdout).await?;
        }
        Some(Commands::List { json }) => {
            let (db, _config) = open_database(cli.config.as_deref()).await?;
            list::run(&mut stdout, &db, json).await?;
        }
        Some(Commands::Total { project }) => {
            let (db, _config) = open_database(cli.config.as_deref()).await?;
            total::run(&mut stdout, &db, &project).await?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref()).await?;
            status::run(&mut stdout, &db, &config.database_path).await?;
        }
        Some(Commands::Export { output, clear }) => {
            let (db, config) = open_database(cli.config.as_deref()).await?;
            let sink = output.map_or_else(
                || ArchiveFile::dated(&config.export_dir, Utc::now().date_naive()),
                ArchiveFile::new,
            );
            export::run(&mut stdout, db, Arc::new(SystemClock), &sink, clear).await?;
        }
        Some(Commands::Clear { yes }) => {
            let (db, _config) = open_database(cli.config.as_deref()).await?;
            let mut manager = SessionManager::new(db);
            clear::run(&mut stdout, &mut manager, yes).await?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
