//! CLI parser.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sage")]
#[command(about = "Download a Gmail mailbox and ask questions about it", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download messages from every label into the records directory.
    Download {
        /// Maximum number of emails to download ("no limit" or "infinity" for all)
        #[arg(long, default_value = "no limit")]
        max: String,

        /// Log every downloaded email
        #[arg(long)]
        show_download_log: bool,

        /// Serve POST /download-emails on this port instead of downloading once
        #[arg(long)]
        server: Option<u16>,
    },
    /// Authorize Gmail access and show the authenticated address.
    Login,
    /// Delete the stored Gmail token.
    Logout,
    /// Ask questions about the downloaded emails interactively.
    Ask,
    /// Run the JSON API server (GET /models, POST /ask, POST /cleanup).
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Parse a download limit; `None` means download everything
pub fn parse_limit(value: &str) -> Result<Option<usize>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("no limit") || value.eq_ignore_ascii_case("infinity") {
        return Ok(None);
    }

    let limit: usize = value
        .parse()
        .with_context(|| format!("Invalid --max value: {}", value))?;
    Ok((limit > 0).then_some(limit))
}
