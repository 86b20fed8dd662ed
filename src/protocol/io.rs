//! Graceful parsing of tagged messages
//!
//! Frames share one message channel with whatever else the page posts, so
//! anything that isn't ours must be classified and dropped, never treated
//! as an error.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::message::{BridgeMessage, ExtensionMessage};

/// Maximum length for raw JSON in logs
const MAX_RAW_LOG_PREVIEW: usize = 200;

/// A serde enum tagged by a `type` field
pub trait TaggedMessage: DeserializeOwned {
    /// Every `type` value the enum accepts
    const TYPES: &'static [&'static str];
}

impl TaggedMessage for BridgeMessage {
    const TYPES: &'static [&'static str] = &["request-data", "data-update", "iframe-ready"];
}

impl TaggedMessage for ExtensionMessage {
    const TYPES: &'static [&'static str] =
        &["EXT_STATE", "TEXT_REPLACEMENT_TOGGLE", "TEXT_REPLACEMENT_UPDATE"];
}

/// Truncated preview of raw JSON for logging (char-safe)
pub fn log_preview(raw: &str) -> &str {
    match raw.char_indices().nth(MAX_RAW_LOG_PREVIEW) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

#[derive(Debug)]
pub enum ParseResult<M> {
    Ok(M),
    /// Not an object, or no string `type` field
    MissingType { raw: String },
    /// A `type` we don't handle (someone else's message)
    UnknownType { message_type: String, raw: String },
    /// One of our types with a malformed payload
    InvalidPayload {
        message_type: String,
        error: String,
        raw: String,
    },
    /// Not JSON at all
    ParseError(serde_json::Error),
}

impl<M> ParseResult<M> {
    pub fn ok(self) -> Option<M> {
        match self {
            ParseResult::Ok(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Classify an already-decoded value
pub fn parse_value<M: TaggedMessage>(value: Value) -> ParseResult<M> {
    let raw = log_preview(&value.to_string()).to_string();
    let message_type = match value.get("type").and_then(Value::as_str) {
        Some(t) => t.to_string(),
        None => return ParseResult::MissingType { raw },
    };
    if !M::TYPES.contains(&message_type.as_str()) {
        return ParseResult::UnknownType { message_type, raw };
    }
    match serde_json::from_value::<M>(value) {
        Ok(msg) => ParseResult::Ok(msg),
        Err(e) => ParseResult::InvalidPayload {
            message_type,
            error: e.to_string(),
            raw,
        },
    }
}

/// Classify a JSON string
pub fn parse_str<M: TaggedMessage>(line: &str) -> ParseResult<M> {
    match serde_json::from_str::<Value>(line) {
        Ok(value) => parse_value(value),
        Err(e) => ParseResult::ParseError(e),
    }
}

/// Parse a bridge message, logging (at debug) and dropping anything else
pub fn parse_bridge_message(value: Value) -> Option<BridgeMessage> {
    match parse_value::<BridgeMessage>(value) {
        ParseResult::Ok(msg) if msg.has_expected_source() => Some(msg),
        ParseResult::Ok(msg) => {
            debug!(source = ?msg.source(), "Ignoring bridge message with unexpected source");
            None
        }
        ParseResult::InvalidPayload {
            message_type,
            error,
            raw,
        } => {
            debug!(%message_type, %error, %raw, "Ignoring malformed bridge message");
            None
        }
        other => {
            debug!(result = ?other, "Ignoring foreign message");
            None
        }
    }
}

pub fn to_value<M: Serialize>(msg: &M) -> Result<Value, serde_json::Error> {
    serde_json::to_value(msg)
}
