//! Mail crate - Gmail download and question answering
//!
//! This crate provides:
//! - Gmail API client and OAuth authentication
//! - A lazy fetcher that saves every message as a flat JSON record
//! - Record storage trait abstractions
//! - A query agent that answers questions about stored records
//! - Interactive and HTTP front ends for both
//!
//! Mail and model calls are synchronous; the HTTP front ends drive them from
//! a single-threaded tokio runtime.

pub mod agent;
pub mod config;
pub mod error;
pub mod fetch;
pub mod gmail;
pub mod models;
pub mod shell;
pub mod storage;

pub use agent::{GeminiClient, Generator, QueryAgent, Turn};
pub use config::{DuplicatePolicy, GmailCredentials, RecordNaming, Settings};
pub use error::{AuthError, FetchError, ModelError};
pub use fetch::{FetchOptions, FetchProgress, FetchRun, fetch};
pub use gmail::{GmailAuth, GmailClient, MailApi, api::ProfileResponse, decode_body, obtain_client};
pub use models::{Label, MessageRecord, ModelCatalog, ModelDescriptor};
pub use shell::{ApiServer, Conversation, DownloadServer, InteractiveShell, gmail_download_server};
pub use storage::{FileRecordStore, InMemoryRecordStore, RecordStore};
