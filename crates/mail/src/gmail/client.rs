//! Gmail API HTTP client
//!
//! Provides methods for listing labels and messages and fetching full messages.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use log::debug;

use super::GmailAuth;
use super::api::{GmailMessage, ListLabelsResponse, ListMessagesResponse, ProfileResponse};
use crate::config::{GmailCredentials, Settings};
use crate::error::AuthError;
use crate::models::Label;

/// Largest page size the messages.list endpoint accepts
pub const MAX_PAGE_SIZE: usize = 500;

/// Mailbox operations the fetcher depends on
pub trait MailApi {
    /// List all labels (folders) in the mailbox
    fn list_labels(&self) -> Result<Vec<Label>>;

    /// List one page of message IDs under a label
    fn list_messages(
        &self,
        label_id: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse>;

    /// Get full message details by ID
    fn get_message(&self, id: &str) -> Result<GmailMessage>;
}

/// Gmail API client for fetching messages
pub struct GmailClient {
    auth: GmailAuth,
    base_url: String,
}

/// Authenticate with stored credentials and return a ready client
///
/// Loads the OAuth client secrets, then obtains an access token (refreshing or
/// running the consent flow as needed), persisting it before returning.
pub fn obtain_client(settings: &Settings) -> Result<GmailClient, AuthError> {
    let credentials = GmailCredentials::load()?;
    let auth = GmailAuth::new(credentials)?;
    auth.get_access_token()?;
    Ok(GmailClient::new(auth).with_base_url(&settings.gmail_base_url))
}

impl GmailClient {
    /// Gmail API base URL
    pub const DEFAULT_BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Create a new Gmail client
    pub fn new(auth: GmailAuth) -> Self {
        Self {
            auth,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Send an authorized GET and parse the JSON response
    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let access_token = self.auth.get_access_token()?;
        debug!("GET {}", url);

        let mut response = ureq::get(url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .with_context(|| format!("Failed to send {} request", what))?;

        response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse {} response", what))
    }

    /// Get the authenticated user's profile
    pub fn get_profile(&self) -> Result<ProfileResponse> {
        let url = format!("{}/users/me/profile", self.base_url);
        self.get_json(&url, "profile")
    }

    /// Clear the stored token
    pub fn logout(&self) -> Result<()> {
        self.auth.logout()
    }
}

impl MailApi for GmailClient {
    fn list_labels(&self) -> Result<Vec<Label>> {
        let url = format!("{}/users/me/labels", self.base_url);
        let response: ListLabelsResponse = self.get_json(&url, "list labels")?;

        Ok(response
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|l| Label::new(l.id, l.name))
            .collect())
    }

    /// # Arguments
    /// * `label_id` - Only list messages carrying this label
    /// * `max_results` - Maximum number of messages to return per page (1-500)
    /// * `page_token` - Optional page token for pagination
    fn list_messages(
        &self,
        label_id: &str,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse> {
        let mut url = format!(
            "{}/users/me/messages?maxResults={}&labelIds={}",
            self.base_url,
            max_results.clamp(1, MAX_PAGE_SIZE),
            urlencoding::encode(label_id)
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }

        self.get_json(&url, "list messages")
    }

    fn get_message(&self, id: &str) -> Result<GmailMessage> {
        let url = format!(
            "{}/users/me/messages/{}?format=full",
            self.base_url,
            urlencoding::encode(id)
        );
        self.get_json(&url, "get message")
    }
}
