//! Common message envelope — build and parse.
//!
//! Every message on the bus, inbound or outbound, is a JSON object with
//! the same wrapper fields:
//!
//! ```text
//! {
//!   "version":    "1.0",
//!   "timestamp":  "2026-08-25T14:03:07.412Z",
//!   "device_id":  "reader-001",
//!   "event_type": "auth_start",
//!   "request_id": "a4f0…",
//!   "payload":    { … }
//! }
//! ```
//!
//! The codec is a pure transform apart from timestamp stamping, which
//! uses the instant handed in by the caller (the clock port lives at the
//! app layer). Timestamps rendered by one codec instance are clamped to
//! be monotonically non-decreasing even if the wall clock steps back.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::error::{DecodeError, EncodeError};

/// Protocol version carried in every envelope this device produces.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Maximum serialised message size the transport accepts. Oversized
/// envelopes are rejected before transmission, never truncated.
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// `YYYY-MM-DDTHH:MM:SS.mmmZ`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Render an instant in the protocol's ISO-8601 millisecond format.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A decoded message envelope. Created per message, discarded after
/// handling — nothing here persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub version: String,
    pub timestamp: String,
    pub device_id: String,
    pub event_type: String,
    pub request_id: String,
    pub payload: Value,
}

impl Envelope {
    /// Parse raw bytes into an envelope.
    ///
    /// `event_type` and `request_id` are required; the remaining wrapper
    /// fields default to empty so a lenient controller implementation
    /// cannot knock the device over.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|_| DecodeError::InvalidJson)?;
        let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;

        let required = |field: &'static str| -> Result<String, DecodeError> {
            obj.get(field)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or(DecodeError::MissingField(field))
        };
        let optional = |field: &str| -> String {
            obj.get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };

        Ok(Self {
            version: optional("version"),
            timestamp: optional("timestamp"),
            device_id: optional("device_id"),
            event_type: required("event_type")?,
            request_id: required("request_id")?,
            payload: obj.get("payload").cloned().unwrap_or(Value::Null),
        })
    }
}

// ---------------------------------------------------------------------------
// Codec (outbound)
// ---------------------------------------------------------------------------

/// Builds outbound envelopes for one device.
///
/// Owns the last stamped instant so that sequential publishes from this
/// device carry non-decreasing timestamps.
#[derive(Debug)]
pub struct EnvelopeCodec {
    device_id: String,
    last_stamp: Option<DateTime<Utc>>,
}

impl EnvelopeCodec {
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_owned(),
            last_stamp: None,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Build and serialise an envelope around `payload`.
    ///
    /// Fails with [`EncodeError::MessageTooLarge`] when the serialised
    /// message exceeds [`MAX_MESSAGE_SIZE`].
    pub fn encode(
        &mut self,
        now: DateTime<Utc>,
        event_type: &str,
        request_id: &str,
        payload: Value,
    ) -> Result<Vec<u8>, EncodeError> {
        let stamp = match self.last_stamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_stamp = Some(stamp);

        let envelope = json!({
            "version": PROTOCOL_VERSION,
            "timestamp": format_timestamp(stamp),
            "device_id": self.device_id,
            "event_type": event_type,
            "request_id": request_id,
            "payload": payload,
        });

        let bytes = serde_json::to_vec(&envelope).map_err(|_| EncodeError::Serialize)?;
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(EncodeError::MessageTooLarge {
                size: bytes.len(),
                limit: MAX_MESSAGE_SIZE,
            });
        }
        Ok(bytes)
    }
}
