//! CLI command implementations

pub mod auth;
pub mod error;
pub mod iocs;
pub mod streams;

pub use auth::SetupAuthArgs;
pub use error::CliError;
pub use iocs::ExportIocsArgs;
pub use streams::{ListStreamsArgs, StreamEntriesArgs};

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::session::config::{DEFAULT_API_HOST, DEFAULT_CLIENT_NAME, DEFAULT_MAX_ATTEMPTS};
use crate::session::{default_token_dir, Auth, FeedlySession, SharedSession};

/// Feedly API client CLI
#[derive(Parser, Debug)]
#[command(name = "feedly-client")]
#[command(about = "Browse streams and export indicators of compromise from Feedly", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding access.token and refresh.token (default: ~/.config/feedly)
    #[arg(long, global = true)]
    pub token_dir: Option<PathBuf>,

    /// API host
    #[arg(long, global = true, default_value = DEFAULT_API_HOST)]
    pub api_host: String,

    /// Attempts per request, including the first (range: 1-10)
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: u32,

    /// Application name sent with every request
    #[arg(long, global = true, default_value = DEFAULT_CLIENT_NAME)]
    pub client_name: String,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store an access token in the token directory
    SetupAuth(SetupAuthArgs),

    /// List personal and team feeds and boards
    ListStreams(ListStreamsArgs),

    /// Print the latest entries of a feed or board
    StreamEntries(StreamEntriesArgs),

    /// Export indicators of compromise
    ExportIocs(ExportIocsArgs),
}

impl Cli {
    /// Token directory from the flag, or the default one
    pub fn token_dir(&self) -> PathBuf {
        self.token_dir.clone().unwrap_or_else(default_token_dir)
    }

    /// Session authenticated from the token directory
    pub fn session(&self) -> Result<SharedSession, CliError> {
        let auth = Auth::from_dir(self.token_dir())?;
        let session = FeedlySession::new(auth)
            .with_api_host(&self.api_host)
            .with_client_name(&self.client_name)?
            .with_max_attempts(self.max_attempts);
        Ok(session.into_shared())
    }
}
