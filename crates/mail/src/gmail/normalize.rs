//! Gmail API response normalization
//!
//! Converts Gmail API messages into message records. Body decoding is
//! best-effort: anything that cannot be decoded becomes an empty string.

use base64::prelude::*;

use super::api::{GmailMessage, MessagePart, MessagePayload};
use crate::models::{MessageRecord, NO_SUBJECT, UNKNOWN_DATE, UNKNOWN_RECIPIENT, UNKNOWN_SENDER};

/// Normalize a Gmail API message to a message record
pub fn normalize_message(gmail_msg: GmailMessage) -> MessageRecord {
    let payload = gmail_msg.payload.unwrap_or_default();

    let header = |name: &str, fallback: &str| {
        extract_header(&payload, name).unwrap_or_else(|| fallback.to_string())
    };

    MessageRecord {
        subject: header("Subject", NO_SUBJECT),
        from: header("From", UNKNOWN_SENDER),
        to: header("To", UNKNOWN_RECIPIENT),
        date: header("Date", UNKNOWN_DATE),
        snippet: gmail_msg.snippet,
        body: decode_body(&payload),
        id: gmail_msg.id,
    }
}

/// Extract a header value by name
fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Extract a readable body from a message payload
///
/// A direct body blob wins regardless of its declared type. Otherwise the
/// parts are searched in order for text/plain, then for text/html. Never
/// fails: returns an empty string when nothing decodable is found.
pub fn decode_body(payload: &MessagePayload) -> String {
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
    {
        return decode_base64_body(data).unwrap_or_default();
    }

    if let Some(parts) = &payload.parts {
        if let Some(text) = find_part_text(parts, "text/plain") {
            return text;
        }
        if let Some(html) = find_part_text(parts, "text/html") {
            return html;
        }
    }

    String::new()
}

/// Recursively search message parts for the first decodable part of a type
fn find_part_text(parts: &[MessagePart], mime_prefix: &str) -> Option<String> {
    for part in parts {
        if part
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with(mime_prefix))
            && let Some(body) = &part.body
            && let Some(data) = &body.data
            && let Some(text) = decode_base64_body(data)
        {
            return Some(text);
        }

        // multipart/alternative is often nested inside multipart/mixed
        if let Some(nested) = &part.parts
            && let Some(text) = find_part_text(nested, mime_prefix)
        {
            return Some(text);
        }
    }

    None
}

/// Decode base64-encoded body data
///
/// Gmail uses URL-safe base64 but padding varies, so padding is stripped and
/// both alphabets are tried. Invalid UTF-8 sequences are replaced rather than
/// rejected.
fn decode_base64_body(data: &str) -> Option<String> {
    let trimmed = data.trim().trim_end_matches('=');

    let decoders: &[&base64::engine::GeneralPurpose] = &[&BASE64_URL_SAFE_NO_PAD, &BASE64_STANDARD_NO_PAD];

    decoders
        .iter()
        .find_map(|decoder| decoder.decode(trimmed).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}
