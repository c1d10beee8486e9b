//! Gemini generateContent client
//!
//! Uses synchronous HTTP (ureq), matching the Gmail client.

use anyhow::anyhow;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Environment variable holding the generative API key
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Something that turns a prompt into text
pub trait Generator {
    fn generate(&self, model_id: &str, prompt: &str) -> Result<String, ModelError>;
}

/// Gemini API client
pub struct GeminiClient {
    api_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate
    fn text(self) -> Option<String> {
        let parts = self
            .candidates?
            .into_iter()
            .next()?
            .content?
            .parts?;

        let text: String = parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

impl GeminiClient {
    /// Generative language API base URL
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create a client using the key from `GEMINI_API_KEY`
    ///
    /// A missing key is only reported when a request is made, so front ends
    /// that merely list models keep working.
    pub fn from_env() -> Self {
        Self::new(std::env::var(API_KEY_VAR).ok().filter(|k| !k.is_empty()))
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

impl Generator for GeminiClient {
    fn generate(&self, model_id: &str, prompt: &str) -> Result<String, ModelError> {
        let api_key = self.api_key.as_deref().ok_or(ModelError::MissingApiKey)?;

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            urlencoding::encode(model_id)
        );
        debug!("POST {} ({} prompt bytes)", url, prompt.len());

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let mut response = ureq::post(&url)
            .header("x-goog-api-key", api_key)
            .send_json(&request)
            .map_err(|e| ModelError::Request(anyhow!(e).context("Failed to send generate request")))?;

        let body: GenerateContentResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| ModelError::Request(anyhow!(e).context("Failed to parse generate response")))?;

        let text = body.text().unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}
