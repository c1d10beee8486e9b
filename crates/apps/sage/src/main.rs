//! Sage - Gmail downloader and email question answering
//!
//! This is the main entry point for the sage command-line tool.

use std::io;
use std::net::TcpListener;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{error, info, warn};
use mail::agent::API_KEY_VAR;
use mail::shell::serve;
use mail::{
    ApiServer, FetchOptions, FileRecordStore, GeminiClient, GmailAuth, GmailClient,
    GmailCredentials, InteractiveShell, MailApi, ModelCatalog, QueryAgent, Settings, fetch,
    gmail_download_server, obtain_client,
};

mod cli;

use cli::{Cli, Commands, parse_limit};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let settings = Settings::load().context("Failed to load settings")?;

    match cli.command {
        Commands::Download {
            max,
            show_download_log,
            server,
        } => match server {
            Some(port) => run_download_server(settings, port),
            None => download_once(&settings, parse_limit(&max)?, show_download_log),
        },
        Commands::Login => login(&settings),
        Commands::Logout => logout(),
        Commands::Ask => ask(&settings),
        Commands::Serve { port } => run_api_server(&settings, port.unwrap_or(settings.api_port)),
    }
}

fn bind(port: u16) -> Result<TcpListener> {
    TcpListener::bind(("0.0.0.0", port)).with_context(|| format!("Failed to bind port {}", port))
}

fn records_store(settings: &Settings) -> FileRecordStore {
    FileRecordStore::new(&settings.records_dir, settings.record_naming)
}

fn download_once(settings: &Settings, limit: Option<usize>, show_log: bool) -> Result<()> {
    let client = obtain_client(settings)?;

    let labels = client.list_labels().context("Failed to list labels")?;
    println!("Labels:");
    for label in &labels {
        println!("{}", label.name);
    }

    let store = records_store(settings);
    let options = FetchOptions::new(limit, show_log).with_duplicate_policy(settings.duplicate_policy);

    let mut failed = false;
    for progress in fetch(&client, &store, options) {
        failed |= progress.is_error();
        println!("{}", progress);
    }

    if failed {
        bail!("Download stopped early");
    }
    info!("Emails saved to {}", store.root().display());
    Ok(())
}

fn run_download_server(settings: Settings, port: u16) -> Result<()> {
    let listener = bind(port)?;
    println!("Starting server on port {}...", port);
    serve(listener, gmail_download_server(settings).router())
}

/// Load OAuth client credentials, explaining where to put them on failure
fn load_credentials() -> Result<GmailCredentials> {
    GmailCredentials::load().inspect_err(|e| {
        warn!("Gmail credentials not found: {}", e);
        if let Some(path) = GmailCredentials::default_credentials_path() {
            warn!(
                "To configure Gmail access, either:\n\
                 1. Place your Google OAuth credentials at: {}\n\
                 2. Or set environment variables: GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET",
                path.display()
            );
        }
    })
}

fn login(settings: &Settings) -> Result<()> {
    let auth = GmailAuth::new(load_credentials()?)?;
    if auth.is_authenticated() {
        info!("Using stored Gmail token");
    } else {
        info!("Starting Gmail authorization");
    }

    // Fetching the profile runs the consent flow when no usable token exists
    let client = GmailClient::new(auth).with_base_url(&settings.gmail_base_url);
    let profile = client.get_profile()?;
    println!("Authenticated as {}", profile.email_address);
    Ok(())
}

fn logout() -> Result<()> {
    let client = GmailClient::new(GmailAuth::new(load_credentials()?)?);
    client.logout()?;
    println!("Logged out");
    Ok(())
}

fn gemini_agent(settings: &Settings) -> QueryAgent<GeminiClient> {
    if std::env::var_os(API_KEY_VAR).is_none() {
        warn!("{} is not set; questions will fail", API_KEY_VAR);
    }
    QueryAgent::new(GeminiClient::from_env().with_base_url(&settings.gemini_base_url))
}

fn ask(settings: &Settings) -> Result<()> {
    let agent = gemini_agent(settings);
    let store = records_store(settings);
    let catalog = ModelCatalog::load()?;

    let shell = InteractiveShell::new(&agent, &store, &catalog);
    shell.run(&mut io::stdin().lock(), &mut io::stdout().lock())?;
    Ok(())
}

fn run_api_server(settings: &Settings, port: u16) -> Result<()> {
    let server = ApiServer::new(
        gemini_agent(settings),
        records_store(settings),
        ModelCatalog::load()?,
    );

    let listener = bind(port)?;
    info!("Serving JSON API on port {}", port);
    serve(listener, server.router())
}
