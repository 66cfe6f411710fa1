//! Taskplan server
//!
//! HTTP API for team task planning with role-scoped task identifiers and
//! super-task grouping.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use taskplan::api::{AppState, start_server};
use taskplan::cli::{Cli, Command};
use taskplan::config::Config;
use taskplan::db::Database;
use taskplan::identifier::parse_identifier;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };
    if let Some(db) = &cli.database {
        config.server.db_path = PathBuf::from(db);
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::ParseId { id }) = &cli.command {
        let parsed = parse_identifier(id)?;
        println!("{}", serde_json::to_string_pretty(&parsed)?);
        return Ok(());
    }

    init_logging(&cli)?;

    let config = load_config(&cli)?;
    config.ensure_db_dir()?;

    let db = Database::open(&config.server.db_path)
        .with_context(|| format!("opening {}", config.server.db_path.display()))?
        .with_utc_offset(config.utc_offset()?);
    info!(
        db = %config.server.db_path.display(),
        utc_offset_minutes = config.ids.utc_offset_minutes,
        "Database ready"
    );

    let host: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid host {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);

    let state = AppState::new(Arc::new(db));
    let (shutdown_tx, _bound, server) = start_server(state, addr).await?;

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    let _ = shutdown_tx.send(());
    server.await.context("server task failed")?;
    info!("Server stopped");

    Ok(())
}
