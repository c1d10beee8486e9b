//! Delivery front ends for the fetcher and the query agent
//!
//! - [`InteractiveShell`]: terminal question loop
//! - [`DownloadServer`]: chunked-HTTP streaming of a fetch run
//! - [`ApiServer`]: JSON API for models, questions and cleanup
//!
//! Both servers are axum routers served by [`serve`] one request at a time.

mod api;
mod download;
pub mod http;
mod interactive;

pub use api::ApiServer;
pub use download::{DownloadServer, gmail_download_server};
pub use http::serve;
pub use interactive::{Conversation, InteractiveShell};
