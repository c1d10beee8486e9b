//! Progress items produced by a download run

use std::fmt;

use crate::config::DuplicatePolicy;
use crate::error::FetchError;

/// One line of download progress
#[derive(Debug)]
pub enum FetchProgress {
    /// Listing of a label's messages has begun
    LabelStarted { name: String },
    /// Number of message IDs listed under a label
    LabelTotal { name: String, count: usize },
    /// Message IDs seen under more than one label
    Duplicates { count: usize, policy: DuplicatePolicy },
    /// Number of message IDs listed across all labels
    GrandTotal { count: usize, limit: Option<usize> },
    /// A message was retrieved and saved
    Downloaded {
        ordinal: usize,
        subject: String,
        from: String,
        to: String,
    },
    /// The run stopped early
    Failed(FetchError),
}

impl FetchProgress {
    pub fn is_error(&self) -> bool {
        matches!(self, FetchProgress::Failed(_))
    }
}

impl fmt::Display for FetchProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchProgress::LabelStarted { name } => {
                write!(f, "Fetching emails for label: {}", name)
            }
            FetchProgress::LabelTotal { name, count } => {
                write!(f, "Total emails for label {}: {}", name, count)
            }
            FetchProgress::Duplicates { count, policy } => {
                let action = match policy {
                    DuplicatePolicy::EveryOccurrence => "fetching every occurrence",
                    DuplicatePolicy::FirstOccurrence => "fetching each once",
                };
                write!(
                    f,
                    "Found {} message IDs listed under more than one label ({})",
                    count, action
                )
            }
            FetchProgress::GrandTotal { count, limit } => match limit {
                Some(limit) => write!(f, "Grand total emails fetched: {}/{}", count, limit),
                None => write!(f, "Grand total emails fetched: {}", count),
            },
            FetchProgress::Downloaded {
                ordinal,
                subject,
                from,
                to,
            } => write!(
                f,
                "Downloaded email {}: {} from {} to {}",
                ordinal, subject, from, to
            ),
            FetchProgress::Failed(e) => write!(f, "An error occurred: {}", e),
        }
    }
}
