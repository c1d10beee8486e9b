//! Label model representing a Gmail label/folder

use serde::{Deserialize, Serialize};

/// A mail label (folder) that messages are enumerated under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label ID (e.g., "INBOX", "SENT", "Label_123")
    pub id: String,
    /// Display name
    pub name: String,
}

impl Label {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
