//! JSON API server
//!
//! Routes:
//! - `GET /models` lists the model catalog
//! - `POST /ask` with `{"model_id", "query"}` answers a question over the
//!   stored records
//! - `POST /cleanup` deletes the records directory

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use log::{info, warn};
use serde::Deserialize;
use serde_json::{Value, json};

use super::http::{Turnstile, parse_json, run_blocking};
use crate::agent::{Generator, QueryAgent};
use crate::models::ModelCatalog;
use crate::storage::RecordStore;

#[derive(Debug, Default, Deserialize)]
struct AskRequest {
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    query: Option<String>,
}

type Reply = (StatusCode, Json<Value>);

fn error(status: StatusCode, message: impl Into<String>) -> Reply {
    (status, Json(json!({ "error": message.into() })))
}

/// Handler state for the JSON API
pub struct ApiServer<G, S> {
    agent: QueryAgent<G>,
    store: S,
    catalog: ModelCatalog,
    turnstile: Turnstile,
}

impl<G: Generator, S: RecordStore> ApiServer<G, S> {
    pub fn new(agent: QueryAgent<G>, store: S, catalog: ModelCatalog) -> Self {
        Self {
            agent,
            store,
            catalog,
            turnstile: Turnstile::default(),
        }
    }

    fn models(&self) -> Reply {
        match self.catalog.models_json() {
            Ok(models) => (StatusCode::OK, Json(models)),
            Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)),
        }
    }

    fn ask(&self, body: &[u8]) -> Reply {
        let params: AskRequest = match parse_json(body) {
            Ok(params) => params,
            Err(e) => return error(StatusCode::BAD_REQUEST, format!("{:#}", e)),
        };

        let model_id = params.model_id.unwrap_or_default();
        let query = params.query.unwrap_or_default();
        if model_id.trim().is_empty() || query.trim().is_empty() {
            return error(StatusCode::BAD_REQUEST, "model_id and query are required");
        }

        let records = match self.store.load_all() {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to load records: {:#}", e);
                return error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e));
            }
        };
        if records.is_empty() {
            return error(StatusCode::BAD_REQUEST, "No emails loaded");
        }

        info!("Answering question with {} over {} emails", model_id, records.len());
        match self.agent.ask(&model_id, &records, &query) {
            Ok(answer) => (StatusCode::OK, Json(json!({ "response": answer }))),
            Err(e) => {
                warn!("{}", e);
                error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }

    fn cleanup(&self) -> Reply {
        match self.store.clear() {
            Ok(()) => {
                info!("Records deleted");
                (StatusCode::OK, Json(json!({ "message": "Records folder deleted" })))
            }
            Err(e) => error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)),
        }
    }
}

impl<G, S> ApiServer<G, S>
where
    G: Generator + Send + Sync + 'static,
    S: RecordStore + 'static,
{
    /// Routes for the API; unknown paths and methods get a JSON 404
    pub fn router(self) -> Router {
        Router::new()
            .route("/models", get(models::<G, S>).fallback(not_found))
            .route("/ask", post(ask::<G, S>).fallback(not_found))
            .route("/cleanup", post(cleanup::<G, S>).fallback(not_found))
            .fallback(not_found)
            .with_state(Arc::new(self))
    }
}

type Shared<G, S> = State<Arc<ApiServer<G, S>>>;

async fn not_found() -> Reply {
    error(StatusCode::NOT_FOUND, "Not found")
}

async fn models<G, S>(State(server): Shared<G, S>) -> Reply
where
    G: Generator + Send + Sync + 'static,
    S: RecordStore + 'static,
{
    server.models()
}

async fn ask<G, S>(State(server): Shared<G, S>, body: Bytes) -> Response
where
    G: Generator + Send + Sync + 'static,
    S: RecordStore + 'static,
{
    let _turn = server.turnstile.enter().await;
    let worker = Arc::clone(&server);
    blocking_reply(run_blocking(move || worker.ask(&body)).await)
}

async fn cleanup<G, S>(State(server): Shared<G, S>) -> Response
where
    G: Generator + Send + Sync + 'static,
    S: RecordStore + 'static,
{
    let _turn = server.turnstile.enter().await;
    let worker = Arc::clone(&server);
    blocking_reply(run_blocking(move || worker.cleanup()).await)
}

fn blocking_reply(reply: anyhow::Result<Reply>) -> Response {
    reply
        .unwrap_or_else(|e| error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e)))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::models::MessageRecord;
    use crate::shell::http::testing::{request, send, spawn};
    use crate::storage::InMemoryRecordStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct CountingGenerator {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl CountingGenerator {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Generator for CountingGenerator {
        fn generate(&self, _model_id: &str, _prompt: &str) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ModelError::MissingApiKey);
            }
            Ok(" You have one email. ".to_string())
        }
    }

    type TestServer = ApiServer<CountingGenerator, Arc<InMemoryRecordStore>>;

    fn server(generator: &CountingGenerator, store: &Arc<InMemoryRecordStore>) -> TestServer {
        ApiServer::new(
            QueryAgent::new(generator.clone()),
            Arc::clone(store),
            ModelCatalog::builtin(),
        )
    }

    fn with_records(records: Vec<MessageRecord>) -> Arc<InMemoryRecordStore> {
        Arc::new(InMemoryRecordStore::with_records(records))
    }

    #[test]
    fn test_models_lists_catalog() {
        let server = server(&CountingGenerator::default(), &with_records(Vec::new()));
        let (status, Json(body)) = server.models();

        assert_eq!(status, StatusCode::OK);
        let models = body.as_array().unwrap();
        assert_eq!(models.len(), ModelCatalog::builtin().len());
        assert!(models[0]["id"].is_string());
        assert!(models[0]["limits"].is_object());
    }

    #[test]
    fn test_ask_answers() {
        let generator = CountingGenerator::default();
        let server = server(&generator, &with_records(vec![MessageRecord::new("m1")]));

        let (status, Json(body)) =
            server.ask(br#"{"model_id": "gemini-1.5-flash", "query": "How many?"}"#);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "You have one email.");
        assert_eq!(generator.calls(), 1);
    }

    #[test]
    fn test_ask_missing_query_never_calls_model() {
        let generator = CountingGenerator::default();
        let server = server(&generator, &with_records(vec![MessageRecord::new("m1")]));

        let (status, Json(body)) = server.ask(br#"{"model_id": "gemini-1.5-flash"}"#);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "model_id and query are required");

        let (status, _) = server.ask(br#"{"model_id": "gemini-1.5-flash", "query": "  "}"#);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(generator.calls(), 0);
    }

    #[test]
    fn test_ask_without_records_is_400() {
        let generator = CountingGenerator::default();
        let server = server(&generator, &with_records(Vec::new()));

        let (status, Json(body)) =
            server.ask(br#"{"model_id": "gemini-1.5-flash", "query": "Hi"}"#);

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No emails loaded");
        assert_eq!(generator.calls(), 0);
    }

    #[test]
    fn test_ask_model_failure_is_500() {
        let generator = CountingGenerator {
            fail: true,
            ..Default::default()
        };
        let server = server(&generator, &with_records(vec![MessageRecord::new("m1")]));

        let (status, Json(body)) =
            server.ask(br#"{"model_id": "gemini-1.5-flash", "query": "Hi"}"#);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "GEMINI_API_KEY environment variable not set");
    }

    #[test]
    fn test_malformed_json_is_400() {
        let generator = CountingGenerator::default();
        let server = server(&generator, &with_records(vec![MessageRecord::new("m1")]));

        let (status, Json(body)) = server.ask(b"{model_id");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert_eq!(generator.calls(), 0);
    }

    #[test]
    fn test_cleanup_clears_store() {
        let store = with_records(vec![MessageRecord::new("m1")]);
        let server = server(&CountingGenerator::default(), &store);

        let (status, Json(body)) = server.cleanup();

        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].is_string());
        assert!(store.is_empty());
    }

    #[test]
    fn test_routes_over_http() {
        let generator = CountingGenerator::default();
        let store = with_records(vec![MessageRecord::new("m1")]);
        let addr = spawn(server(&generator, &store).router());

        let response = send(addr, &request("GET", "/models", ""));
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("content-type: application/json\r\n"));

        let response = send(addr, &request("GET", "/nowhere", ""));
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.ends_with(r#"{"error":"Not found"}"#));

        // Known path, wrong method
        let response = send(addr, &request("GET", "/ask", ""));
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));

        let response = send(addr, &request("POST", "/ask", "{model_id"));
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert_eq!(generator.calls(), 0);
        assert_eq!(store.len(), 1);
    }
}
