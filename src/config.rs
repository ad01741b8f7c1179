use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Read-only export API over scraped housing listings
#[derive(Parser, Debug)]
#[command(name = "housing-api", version, about)]
pub struct Cli {
    /// SQLite database holding the `listings` table
    #[arg(
        long,
        global = true,
        env = "HOUSING_API_DATABASE",
        default_value = "listings.db"
    )]
    pub database: PathBuf,

    #[command(flatten)]
    pub serve: ServeArgs,

    /// Defaults to `serve`
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve the export routes
    Serve,
    /// Load every scrape file in a directory into the database
    Refresh {
        /// Directory of scraper JSON output
        dir: PathBuf,
    },
    /// Load a single scrape file into the database
    Ingest {
        /// Scraper JSON output file
        file: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(
        long,
        global = true,
        env = "HOUSING_API_ADDR",
        default_value = "127.0.0.1:5000"
    )]
    pub addr: SocketAddr,

    /// Seconds a single query may run before it is interrupted
    #[arg(
        long,
        global = true,
        env = "HOUSING_API_QUERY_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub query_timeout_secs: u64,
}

impl ServeArgs {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}
