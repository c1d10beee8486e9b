//! Configuration loading for mailsage
//!
//! Gmail OAuth client secrets are resolved from, in order:
//! 1. secrets baked in at build time (`GOOGLE_CLIENT_ID`/`GOOGLE_CLIENT_SECRET`)
//! 2. `credentials.json` in the config directory, as downloaded from the
//!    Google Cloud Console
//! 3. `GMAIL_CLIENT_ID`/`GMAIL_CLIENT_SECRET` in the environment
//!
//! Application settings come from `settings.json` when present.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Credentials filename in the mailsage config directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Settings filename in the mailsage config directory
const SETTINGS_FILE: &str = "settings.json";

const CLIENT_ID_VAR: &str = "GMAIL_CLIENT_ID";
const CLIENT_SECRET_VAR: &str = "GMAIL_CLIENT_SECRET";

/// OAuth client secrets for Gmail API access
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Client secret file layout: desktop clients nest the secrets under
/// `installed`, web clients under `web`
#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum ClientSecretFile {
    Installed(GmailCredentials),
    Web(GmailCredentials),
}

impl GmailCredentials {
    /// Resolve credentials from the first source that provides them
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::embedded() {
            return Ok(creds);
        }

        match Self::default_credentials_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Self::from_env(),
        }
    }

    /// Secrets baked into release builds, if any
    fn embedded() -> Option<Self> {
        let client_id = option_env!("GOOGLE_CLIENT_ID").filter(|v| !v.is_empty())?;
        let client_secret = option_env!("GOOGLE_CLIENT_SECRET").filter(|v| !v.is_empty())?;
        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Read a client secret file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid credentials in {}", path.display()))
    }

    /// Parse the contents of a client secret file
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(json)
            .context("Expected an 'installed' or 'web' client secret section")?;
        Ok(match file {
            ClientSecretFile::Installed(creds) | ClientSecretFile::Web(creds) => creds,
        })
    }

    /// Read credentials from `GMAIL_CLIENT_ID`/`GMAIL_CLIENT_SECRET`
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).with_context(|| format!("{} environment variable not set", name))
        };
        Ok(Self {
            client_id: var(CLIENT_ID_VAR)?,
            client_secret: var(CLIENT_SECRET_VAR)?,
        })
    }

    /// Where `credentials.json` is looked for
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

/// How record files are named inside the records directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordNaming {
    /// `{message_id}.json`; re-fetching a message overwrites its own file
    #[default]
    MessageId,
    /// `email_{n}.json`, numbered in download order
    Ordinal,
}

/// What to do with a message ID that shows up under more than one label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fetch the message once per label it appears under
    #[default]
    EveryOccurrence,
    /// Fetch each message ID once
    FirstOccurrence,
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding one JSON file per downloaded message
    pub records_dir: PathBuf,
    pub record_naming: RecordNaming,
    pub duplicate_policy: DuplicatePolicy,
    /// Gmail API base URL
    pub gmail_base_url: String,
    /// Generative language API base URL
    pub gemini_base_url: String,
    /// Default port for the JSON API server
    pub api_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            records_dir: config::config_path("records").unwrap_or_else(|| PathBuf::from("temp")),
            record_naming: RecordNaming::default(),
            duplicate_policy: DuplicatePolicy::default(),
            gmail_base_url: crate::gmail::GmailClient::DEFAULT_BASE_URL.to_string(),
            gemini_base_url: crate::agent::GeminiClient::DEFAULT_BASE_URL.to_string(),
            api_port: 5000,
        }
    }
}

impl Settings {
    /// Load settings from ~/.config/mailsage/settings.json, or defaults if the
    /// file doesn't exist
    pub fn load() -> Result<Self> {
        if config::config_exists(SETTINGS_FILE) {
            return config::load_json(SETTINGS_FILE);
        }
        Ok(Self::default())
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }
}
