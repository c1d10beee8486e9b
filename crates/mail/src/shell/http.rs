//! Shared plumbing for the HTTP front ends
//!
//! Both servers are axum routers driven by a single-threaded tokio runtime.
//! Gmail and model calls are blocking, so handlers run them on the blocking
//! pool while holding the server's [`Turnstile`]. Every response closes its
//! connection.

use std::convert::Infallible;
use std::net::TcpListener;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use log::{info, warn};
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

/// Largest request body accepted
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub(crate) const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Lines buffered between a blocking producer and the response body
const LINE_BUFFER: usize = 16;

/// Parse a request body as JSON; an empty body parses as `{}`
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let body = String::from_utf8_lossy(body);
    let body = body.trim();
    let body = if body.is_empty() { "{}" } else { body };
    serde_json::from_str(body).context("Invalid JSON body")
}

/// Admits one request at a time
#[derive(Debug, Clone, Default)]
pub struct Turnstile(Arc<Mutex<()>>);

impl Turnstile {
    /// Wait for the previous request to finish; the turn lasts until the
    /// guard is dropped
    pub async fn enter(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.0).lock_owned().await
    }
}

/// Run blocking work off the runtime thread
pub async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .context("Blocking worker failed")
}

/// Sending half of a streamed response body
pub struct LineSender(mpsc::Sender<String>);

impl LineSender {
    /// Queue one chunk; returns `false` once the client has gone away
    pub fn send(&self, line: String) -> bool {
        self.0.blocking_send(line).is_ok()
    }
}

/// Plain-text response whose body is produced chunk by chunk on the blocking
/// pool
///
/// The body ends, with its closing chunk, when `produce` returns.
pub fn stream_lines<F>(status: StatusCode, produce: F) -> Response
where
    F: FnOnce(LineSender) + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    tokio::task::spawn_blocking(move || produce(LineSender(tx)));

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
}

/// Complete plain-text response
pub fn text(status: StatusCode, body: impl Into<String>) -> Response {
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], body.into()).into_response()
}

async fn close_connection(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

/// Serve `router` on `listener` until the process exits
pub fn serve(listener: TcpListener, router: Router) -> Result<()> {
    listener
        .set_nonblocking(true)
        .context("Failed to configure listener")?;
    let addr = listener.local_addr().context("Listener has no address")?;

    let app = router
        .layer(map_response(close_connection))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    runtime.block_on(async move {
        let listener =
            tokio::net::TcpListener::from_std(listener).context("Failed to adopt listener")?;
        info!("Listening on {}", addr);
        axum::serve(listener, app)
            .await
            .inspect_err(|e| warn!("Server stopped: {}", e))?;
        Ok::<(), anyhow::Error>(())
    })
}
