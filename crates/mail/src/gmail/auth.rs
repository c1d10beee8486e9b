//! Gmail OAuth2 authentication
//!
//! Implements OAuth2 authorization code flow for Gmail API authentication.
//! Uses a local HTTP server to receive the OAuth callback.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use crate::config::GmailCredentials;

/// Token filename in the mailsage config directory
const TOKEN_FILE: &str = "token.json";

/// Seconds of remaining validity below which a token is refreshed
const EXPIRY_BUFFER_SECS: i64 = 300;

/// OAuth2 configuration and token management for Gmail
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
}

/// Stored token data
///
/// Also reads the layout written by Google's client libraries (`token`,
/// `expiry`), so an existing token file keeps working.
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    #[serde(alias = "token")]
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default, skip_serializing)]
    expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    fn expires_at(&self) -> Option<i64> {
        self.expires_at.or_else(|| self.expiry.map(|e| e.timestamp()))
    }

    fn is_fresh(&self) -> bool {
        self.expires_at()
            .is_some_and(|expires_at| expires_at > Utc::now().timestamp() + EXPIRY_BUFFER_SECS)
    }
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    #[allow(dead_code)]
    token_type: String,
}

impl GmailAuth {
    /// Gmail API OAuth2 endpoints
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Required scope for Gmail access (modify allows read + label changes)
    const GMAIL_MODIFY_SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.modify";

    /// Port range to try for local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    /// Create a new GmailAuth storing its token in the config directory
    pub fn new(credentials: GmailCredentials) -> Result<Self> {
        let token_path = Self::default_token_path()?;
        Ok(Self::with_token_path(credentials, token_path))
    }

    /// Create a GmailAuth that persists its token at a specific path
    pub fn with_token_path(credentials: GmailCredentials, token_path: impl AsRef<Path>) -> Self {
        Self {
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            token_path: token_path.as_ref().to_path_buf(),
        }
    }

    /// Get the default token storage path (~/.config/mailsage/token.json)
    fn default_token_path() -> Result<PathBuf> {
        config::config_path(TOKEN_FILE).context("Could not determine config directory")
    }

    /// Get a valid access token, refreshing or re-authenticating as needed
    pub fn get_access_token(&self) -> Result<String> {
        match self.load_token() {
            Ok(token) => {
                if token.is_fresh() {
                    return Ok(token.access_token);
                }

                if let Some(refresh_token) = token.refresh_token {
                    match self.refresh_access_token(&refresh_token) {
                        Ok(new_token) => {
                            debug!("Refreshed Gmail access token");
                            self.save_token_response(&new_token)?;
                            return Ok(new_token.access_token);
                        }
                        Err(e) => warn!("Token refresh failed, re-authenticating: {:#}", e),
                    }
                }
            }
            Err(e) => debug!("No usable stored token: {:#}", e),
        }

        let token = self.authorization_code_auth()?;
        self.save_token_response(&token)?;
        Ok(token.access_token)
    }

    /// Perform authorization code flow authentication
    fn authorization_code_auth(&self) -> Result<TokenResponse> {
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);

        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(Self::GMAIL_MODIFY_SCOPE),
        );

        println!("Authorize Gmail access in your browser.");
        println!("If no browser window appears, open this URL:\n{}", auth_url);
        if let Err(e) = open::that(&auth_url) {
            warn!("Could not launch a browser: {}", e);
        }

        info!("Waiting for the OAuth callback on port {}", port);
        let code = wait_for_callback(&listener)?;

        let token = Self::request_token(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ])
        .context("Failed to exchange authorization code")?;

        info!("Gmail authorization complete");
        Ok(token)
    }

    /// Bind the first free loopback port in the callback range
    fn start_local_server(&self) -> Result<(TcpListener, u16)> {
        (Self::PORT_RANGE_START..=Self::PORT_RANGE_END)
            .find_map(|port| TcpListener::bind(("127.0.0.1", port)).ok().map(|l| (l, port)))
            .with_context(|| {
                format!(
                    "No free callback port between {} and {}",
                    Self::PORT_RANGE_START,
                    Self::PORT_RANGE_END
                )
            })
    }

    /// Trade a refresh token for a new access token
    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut token = Self::request_token(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .context("Failed to refresh access token")?;

        // Google omits the refresh token on refresh responses
        token.refresh_token.get_or_insert_with(|| refresh_token.to_string());
        Ok(token)
    }

    /// POST a form to the token endpoint
    fn request_token(form: &[(&str, &str)]) -> Result<TokenResponse> {
        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form(form.iter().copied())
            .context("Token request failed")?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")
    }

    /// Load stored token from disk
    fn load_token(&self) -> Result<StoredToken> {
        config::load_json_file(&self.token_path)
    }

    /// Save token response to disk
    fn save_token_response(&self, token: &TokenResponse) -> Result<()> {
        let stored = StoredToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|d| Utc::now().timestamp() + d as i64),
            expiry: None,
        };

        config::save_json_file(&self.token_path, &stored)
    }

    /// Check for a stored token that is fresh or can be refreshed
    ///
    /// Reads the token file only; refreshing happens in [`Self::get_access_token`].
    pub fn is_authenticated(&self) -> bool {
        self.load_token()
            .is_ok_and(|token| token.is_fresh() || token.refresh_token.is_some())
    }

    /// Clear stored tokens (logout)
    pub fn logout(&self) -> Result<()> {
        if self.token_path.exists() {
            fs::remove_file(&self.token_path)
                .with_context(|| format!("Failed to remove {}", self.token_path.display()))?;
        }
        Ok(())
    }
}

/// Accept the browser's redirect and pull the authorization code out of it
fn wait_for_callback(listener: &TcpListener) -> Result<String> {
    let (mut stream, _) = listener.accept().context("Failed to accept OAuth callback")?;

    let mut request_line = String::new();
    BufReader::new(&stream)
        .read_line(&mut request_line)
        .context("Failed to read OAuth callback")?;

    let code = parse_callback(&request_line);
    let message = if code.is_ok() {
        "mailsage is authorized. You can close this tab."
    } else {
        "Authorization failed. Check the terminal for details."
    };
    let page = format!("<!doctype html><p>{}</p>", message);
    let reply = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        if code.is_ok() { "200 OK" } else { "400 Bad Request" },
        page.len(),
        page
    );
    if let Err(e) = stream.write_all(reply.as_bytes()) {
        debug!("Failed to answer OAuth callback: {}", e);
    }

    code
}

/// Extract the authorization code from an OAuth callback request line
///
/// Format: `GET /?code=AUTH_CODE&scope=... HTTP/1.1`
fn parse_callback(request_line: &str) -> Result<String> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .context("Malformed callback request")?;

    let url = url::Url::parse("http://localhost")
        .and_then(|base| base.join(target))
        .context("Malformed callback URL")?;

    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => anyhow::bail!("OAuth error: {}", value),
            "code" => code = Some(value.into_owned()),
            _ => {}
        }
    }

    code.context("No authorization code received")
}
