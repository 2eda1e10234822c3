//! `setup-auth` command

use clap::Args;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::info;

use super::{Cli, CliError};
use crate::session::setup_auth;

/// Store an access token
#[derive(Debug, Args)]
pub struct SetupAuthArgs {
    /// Access token; read from stdin when omitted
    #[arg(long)]
    pub token: Option<String>,

    /// Replace an existing access.token
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}

impl SetupAuthArgs {
    /// Execute the setup-auth command
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let token = match &self.token {
            Some(token) => token.clone(),
            None => prompt_token(io::stdin().lock())?,
        };
        store_token(&cli.token_dir(), &token, self.overwrite)
    }
}

fn prompt_token(mut input: impl BufRead) -> Result<String, CliError> {
    eprint!("Enter your token: ");
    io::stderr().flush().ok();

    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|e| CliError::InvalidArgument(format!("cannot read token: {e}")))?;
    Ok(line.trim().to_string())
}

fn store_token(dir: &Path, token: &str, overwrite: bool) -> Result<(), CliError> {
    if setup_auth(dir, token, overwrite)? {
        info!(dir = %dir.display(), "Access token stored");
        println!("Token saved to {}", dir.display());
    } else {
        println!(
            "A token already exists in {}, use --overwrite to replace it",
            dir.display()
        );
    }
    Ok(())
}
