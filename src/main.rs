mod api;
mod config;
mod error;
mod export;
mod ingest;
mod logging;
mod models;
mod query;
mod store;
#[cfg(test)]
mod testing;

use anyhow::Context;
use api::AppState;
use clap::Parser;
use config::{Cli, Command, ServeArgs};
use rusqlite::Connection;
use std::path::Path;
use store::SqliteStore;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init()?;

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(&cli.database, &cli.serve).await,
        Some(Command::Refresh { dir }) => {
            let mut conn = open_writable(&cli.database)?;
            ingest::refresh_database(&mut conn, &dir)?;
            Ok(())
        }
        Some(Command::Ingest { file }) => {
            let mut conn = open_writable(&cli.database)?;
            ingest::process_file(&mut conn, &file)?;
            Ok(())
        }
    }
}

async fn serve(database: &Path, args: &ServeArgs) -> anyhow::Result<()> {
    info!("🏠 Housing API");
    info!("Database: {}", database.display());

    let store = SqliteStore::new(database, args.query_timeout());
    let app = api::router(AppState::new(store));

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.addr))?;
    info!("Listening on http://{}", args.addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn open_writable(database: &Path) -> anyhow::Result<Connection> {
    Connection::open(database).with_context(|| format!("Failed to open {}", database.display()))
}
