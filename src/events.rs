//! Payload decoding and event identity derivation
//!
//! Messages carry schema-less JSON objects. Decoding distinguishes three
//! cases structurally: an absent/empty value (an empty map, not an error),
//! a well-formed object with optional fields, and a malformed payload
//! (a typed `DecodeError` the worker skips without committing).

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// A message payload failed to decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("payload is not a JSON object (got {0})")]
    NotAnObject(&'static str),
}

/// Decoded message payload with typed optional-field accessors.
///
/// Field absence is answered by the accessors returning `None`/`false`;
/// only malformed encodings surface as `DecodeError`.
#[derive(Debug, Clone, Default)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Decode a raw message value.
    ///
    /// A missing or empty value decodes to an empty map.
    pub fn decode(raw: Option<&[u8]>) -> Result<Self, DecodeError> {
        let bytes = match raw {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Ok(Self(Map::new())),
        };
        let text = std::str::from_utf8(bytes)?;
        match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Ok(Self(map)),
            Value::Array(_) => Err(DecodeError::NotAnObject("array")),
            Value::String(_) => Err(DecodeError::NotAnObject("string")),
            Value::Number(_) => Err(DecodeError::NotAnObject("number")),
            Value::Bool(_) => Err(DecodeError::NotAnObject("bool")),
            Value::Null => Err(DecodeError::NotAnObject("null")),
        }
    }

    /// The `order_id` field, stringified if present as a non-string scalar.
    pub fn order_id(&self) -> Option<String> {
        match self.0.get("order_id")? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Whether the `status` field case-insensitively equals `"failure"`.
    pub fn status_is_failure(&self) -> bool {
        self.0
            .get("status")
            .and_then(Value::as_str)
            .map(|status| status.eq_ignore_ascii_case("failure"))
            .unwrap_or(false)
    }

    /// SHA-256 over the canonical serialization of the payload, hex-encoded.
    ///
    /// `serde_json::Map` is BTreeMap-backed, so serialization is key-sorted
    /// and the digest is independent of the key order on the wire.
    pub fn canonical_digest(&self) -> String {
        let canonical = serde_json::to_string(&self.0).unwrap_or_default();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

/// Resolve the order identifier for an order-topic event.
///
/// The payload `order_id` field wins; otherwise the transport key decoded
/// as lossy UTF-8 is used; an absent or empty key resolves to `None`.
pub fn resolve_order_id(key: Option<&[u8]>, payload: &Payload) -> Option<String> {
    if let Some(order_id) = payload.order_id() {
        return Some(order_id);
    }
    let text = String::from_utf8_lossy(key?);
    if text.is_empty() {
        None
    } else {
        Some(text.into_owned())
    }
}

/// Derive the dedup identity for a delivered message.
///
/// Composed of topic, business key (transport key as fallback), and the
/// payload content digest, so identical redeliveries always map to the same
/// identity. Two genuinely distinct business events that serialize to
/// identical content collide by construction; that approximation is
/// accepted for analytics and must not be strengthened silently, since it
/// would change the observed duplicate rate.
pub fn event_identity(topic: &str, key: Option<&[u8]>, payload: &Payload) -> String {
    let identifier = payload
        .order_id()
        .or_else(|| key.map(|k| String::from_utf8_lossy(k).into_owned()))
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| "na".to_string());
    format!("{}:{}:{}", topic, identifier, payload.canonical_digest())
}
