//! Message record persisted for every downloaded email

use serde::{Deserialize, Serialize};

/// Header fallbacks used when a message omits the header entirely
pub const NO_SUBJECT: &str = "No Subject";
pub const UNKNOWN_SENDER: &str = "Unknown Sender";
pub const UNKNOWN_RECIPIENT: &str = "Unknown Recipient";
pub const UNKNOWN_DATE: &str = "Unknown Date";

/// Flat projection of a Gmail message, one JSON file per record
///
/// Header values are kept verbatim (no address parsing) since the record is
/// only ever fed back to a language model as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Gmail message ID
    pub id: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    pub date: String,
    /// Gmail's short preview of the message
    #[serde(default)]
    pub snippet: String,
    /// Decoded body text (plain text preferred, HTML otherwise)
    #[serde(default)]
    pub body: String,
}

impl MessageRecord {
    /// Create a record with header fallbacks and empty content
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: NO_SUBJECT.to_string(),
            from: UNKNOWN_SENDER.to_string(),
            to: UNKNOWN_RECIPIENT.to_string(),
            date: UNKNOWN_DATE.to_string(),
            snippet: String::new(),
            body: String::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = to.into();
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_header_fallbacks() {
        let record = MessageRecord::new("m1");
        assert_eq!(record.subject, "No Subject");
        assert_eq!(record.from, "Unknown Sender");
        assert_eq!(record.to, "Unknown Recipient");
        assert_eq!(record.date, "Unknown Date");
        assert!(record.body.is_empty());
    }

    #[test]
    fn test_json_field_names() {
        let record = MessageRecord::new("m1")
            .with_subject("Hello")
            .with_from("alice@example.com");
        let value = serde_json::to_value(&record).unwrap();

        for field in ["id", "subject", "from", "to", "date", "snippet", "body"] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(value["from"], "alice@example.com");
    }

    #[test]
    fn test_missing_snippet_and_body_default_to_empty() {
        let json = r#"{"id":"m1","subject":"s","from":"f","to":"t","date":"d"}"#;
        let record: MessageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.snippet, "");
        assert_eq!(record.body, "");
    }
}
