//! Inbound command parsing and validation.
//!
//! Commands arrive as envelopes on the device's topic namespace. The
//! router dispatches on this tagged union rather than on raw event-type
//! strings, so a missing handler is a compile error, not a silent drop.
//!
//! Unknown event types (including the device's own published events,
//! which it receives back through the wildcard subscription) are not
//! commands and parse to `Ok(None)`.

use serde_json::Value;

use crate::error::ValidationError;

use super::envelope::Envelope;

/// Tag UIDs are short hex strings (up to 10-byte NFC UIDs).
pub type TagUid = heapless::String<32>;

/// Maximum number of blocks a single `read_start` may request.
pub const MAX_READ_BLOCKS: usize = 16;

/// Block list for `read_start`.
pub type ReadBlocks = heapless::Vec<u32, MAX_READ_BLOCKS>;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A parsed, validated inbound command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Enter auth mode and poll for a tag.
    AuthStart { timeout_seconds: u32 },
    /// Verify a detected tag against the supplied key.
    AuthVerify {
        tag_uid: TagUid,
        key: String,
        user_data: Value,
    },
    /// Abort the auth operation.
    AuthCancel,
    /// Enter register mode and write a key to the tag.
    RegisterStart {
        tag_uid: TagUid,
        key: String,
        timeout_seconds: u32,
    },
    /// Abort the register operation.
    RegisterCancel,
    /// Enter read mode and fetch the listed blocks.
    ReadStart {
        read_blocks: ReadBlocks,
        timeout_seconds: u32,
    },
    /// Abort the read operation.
    ReadCancel,
    /// Return to idle from any mode.
    Reset,
}

impl Command {
    /// Wire name of the command, for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AuthStart { .. } => "auth_start",
            Self::AuthVerify { .. } => "auth_verify",
            Self::AuthCancel => "auth_cancel",
            Self::RegisterStart { .. } => "register_start",
            Self::RegisterCancel => "register_cancel",
            Self::ReadStart { .. } => "read_start",
            Self::ReadCancel => "read_cancel",
            Self::Reset => "reset",
        }
    }

    /// Parse an envelope into a command.
    ///
    /// Returns `Ok(None)` for event types that are not commands (dropped
    /// by the router without an error event) and `Err` when a known
    /// command is missing a required payload field.
    pub fn parse(envelope: &Envelope) -> Result<Option<Self>, ValidationError> {
        let payload = &envelope.payload;

        let cmd = match envelope.event_type.as_str() {
            "auth_start" => Self::AuthStart {
                timeout_seconds: require_u32(payload, "timeout_seconds")?,
            },
            "auth_verify" => Self::AuthVerify {
                tag_uid: require_tag_uid(payload)?,
                key: require_str(payload, "key")?.to_owned(),
                user_data: require_field(payload, "user_data")?.clone(),
            },
            "auth_cancel" => Self::AuthCancel,
            "register_start" => Self::RegisterStart {
                tag_uid: require_tag_uid(payload)?,
                key: require_str(payload, "key")?.to_owned(),
                timeout_seconds: require_u32(payload, "timeout_seconds")?,
            },
            "register_cancel" => Self::RegisterCancel,
            "read_start" => Self::ReadStart {
                read_blocks: require_blocks(payload)?,
                timeout_seconds: require_u32(payload, "timeout_seconds")?,
            },
            "read_cancel" => Self::ReadCancel,
            "reset" => Self::Reset,
            _ => return Ok(None),
        };
        Ok(Some(cmd))
    }
}

// ---------------------------------------------------------------------------
// Field extraction
// ---------------------------------------------------------------------------

fn require_field<'a>(
    payload: &'a Value,
    field: &'static str,
) -> Result<&'a Value, ValidationError> {
    payload.get(field).ok_or(ValidationError::MissingField(field))
}

fn require_str<'a>(payload: &'a Value, field: &'static str) -> Result<&'a str, ValidationError> {
    require_field(payload, field)?
        .as_str()
        .ok_or(ValidationError::WrongType {
            field,
            expected: "a string",
        })
}

fn require_u32(payload: &Value, field: &'static str) -> Result<u32, ValidationError> {
    let n = require_field(payload, field)?
        .as_u64()
        .ok_or(ValidationError::WrongType {
            field,
            expected: "a non-negative integer",
        })?;
    u32::try_from(n).map_err(|_| ValidationError::WrongType {
        field,
        expected: "a 32-bit integer",
    })
}

fn require_tag_uid(payload: &Value) -> Result<TagUid, ValidationError> {
    let raw = require_str(payload, "tag_uid")?;
    TagUid::try_from(raw).map_err(|()| ValidationError::FieldTooLong {
        field: "tag_uid",
        max: 32,
    })
}

fn require_blocks(payload: &Value) -> Result<ReadBlocks, ValidationError> {
    let field = "read_blocks";
    let raw = require_field(payload, field)?
        .as_array()
        .ok_or(ValidationError::WrongType {
            field,
            expected: "an array of block numbers",
        })?;

    let mut blocks = ReadBlocks::new();
    for entry in raw {
        let n = entry.as_u64().and_then(|n| u32::try_from(n).ok()).ok_or(
            ValidationError::WrongType {
                field,
                expected: "an array of 32-bit block numbers",
            },
        )?;
        blocks
            .push(n)
            .map_err(|_| ValidationError::FieldTooLong {
                field,
                max: MAX_READ_BLOCKS,
            })?;
    }
    Ok(blocks)
}
