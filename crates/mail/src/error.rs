//! Error types surfaced at component boundaries
//!
//! Internals use `anyhow` with context; these types mark which stage failed so
//! front ends can decide what is fatal.

/// Credential acquisition or refresh failed; the run cannot continue
#[derive(Debug, thiserror::Error)]
#[error("Authentication failed: {0:#}")]
pub struct AuthError(pub anyhow::Error);

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

/// Enumeration, retrieval or persistence failed partway through a fetch
#[derive(Debug, thiserror::Error)]
#[error("{0:#}")]
pub struct FetchError(pub anyhow::Error);

impl From<anyhow::Error> for FetchError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

/// Generative model call failed or produced nothing usable
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("GEMINI_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("Model request failed: {0:#}")]
    Request(anyhow::Error),

    #[error("Model returned no text")]
    EmptyResponse,
}
