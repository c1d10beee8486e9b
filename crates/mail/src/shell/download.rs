//! Chunked-HTTP download server
//!
//! `POST /download-emails` with an optional JSON body
//! `{"max": int, "showdownloadlog": bool}` runs a fetch and streams every
//! progress line back as its own chunk.

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::post;
use log::{info, warn};
use serde::Deserialize;

use super::http::{Turnstile, parse_json, run_blocking, stream_lines, text};
use crate::config::{DuplicatePolicy, Settings};
use crate::error::AuthError;
use crate::fetch::{FetchOptions, fetch};
use crate::gmail::{GmailClient, MailApi, obtain_client};
use crate::storage::{FileRecordStore, RecordStore};

#[derive(Debug, Default, Deserialize)]
struct DownloadRequest {
    #[serde(default)]
    max: Option<i64>,
    #[serde(default)]
    showdownloadlog: Option<bool>,
}

impl DownloadRequest {
    /// Zero or negative counts mean "no limit"
    fn limit(&self) -> Option<usize> {
        self.max.filter(|&max| max > 0).map(|max| max as usize)
    }

    fn show_log(&self) -> bool {
        self.showdownloadlog.unwrap_or(false)
    }
}

/// Handler state for the download endpoint
///
/// `connect` is called once per request to obtain an authenticated mailbox.
pub struct DownloadServer<F, S> {
    connect: F,
    store: S,
    duplicate_policy: DuplicatePolicy,
    turnstile: Turnstile,
}

/// Download server backed by Gmail and the configured records directory
pub fn gmail_download_server(
    settings: Settings,
) -> DownloadServer<impl Fn() -> Result<GmailClient, AuthError>, FileRecordStore> {
    let store = FileRecordStore::new(&settings.records_dir, settings.record_naming);
    let duplicate_policy = settings.duplicate_policy;
    DownloadServer::new(move || obtain_client(&settings), store)
        .with_duplicate_policy(duplicate_policy)
}

impl<F, S> DownloadServer<F, S> {
    pub fn new(connect: F, store: S) -> Self {
        Self {
            connect,
            store,
            duplicate_policy: DuplicatePolicy::default(),
            turnstile: Turnstile::default(),
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

impl<F, A, S> DownloadServer<F, S>
where
    F: Fn() -> Result<A, AuthError> + Send + Sync + 'static,
    A: MailApi + Send + 'static,
    S: RecordStore + 'static,
{
    /// Routes for the download endpoint; anything else is a 404
    pub fn router(self) -> Router {
        Router::new()
            .route(
                "/download-emails",
                post(download::<F, A, S>).fallback(not_found),
            )
            .fallback(not_found)
            .with_state(Arc::new(self))
    }
}

async fn not_found() -> Response {
    text(StatusCode::NOT_FOUND, "Not Found\n")
}

async fn download<F, A, S>(
    State(server): State<Arc<DownloadServer<F, S>>>,
    body: Bytes,
) -> Response
where
    F: Fn() -> Result<A, AuthError> + Send + Sync + 'static,
    A: MailApi + Send + 'static,
    S: RecordStore + 'static,
{
    let params: DownloadRequest = match parse_json(&body) {
        Ok(params) => params,
        Err(e) => {
            warn!("Bad download request: {:#}", e);
            return text(StatusCode::BAD_REQUEST, format!("Error: {:#}\n", e));
        }
    };

    let turn = server.turnstile.enter().await;

    let connecting = Arc::clone(&server);
    let connected = run_blocking(move || (connecting.connect)())
        .await
        .map_err(AuthError)
        .and_then(|connected| connected);
    let api = match connected {
        Ok(api) => api,
        Err(e) => {
            warn!("{}", e);
            return stream_lines(StatusCode::INTERNAL_SERVER_ERROR, move |lines| {
                let _turn = turn;
                lines.send(format!("Error: {}\n", e));
            });
        }
    };

    let options = FetchOptions::new(params.limit(), params.show_log())
        .with_duplicate_policy(server.duplicate_policy);
    info!("Starting download (limit: {:?})", options.limit);

    stream_lines(StatusCode::OK, move |lines| {
        let _turn = turn;
        for progress in fetch(&api, &server.store, options) {
            if !lines.send(format!("{}\n", progress)) {
                warn!("Client disconnected, stopping download");
                break;
            }
        }
    })
}
