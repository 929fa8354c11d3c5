//! Unified error types for the TapReader protocol core.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the service loop's error handling uniform. No error here is fatal:
//! the device always returns to a responsive idle state, and nothing in
//! this layer retries automatically — `retry_possible` on outbound error
//! events is advisory information for the controller.

use core::fmt;

use crate::app::ports::BusError;

// ---------------------------------------------------------------------------
// Top-level protocol error
// ---------------------------------------------------------------------------

/// Every fallible operation in the protocol core funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An inbound message could not be decoded (dropped, no response).
    Decode(DecodeError),
    /// An outbound envelope could not be encoded (internal fault,
    /// never sent over the bus).
    Encode(EncodeError),
    /// A known command carried a missing or malformed payload field.
    Validation(ValidationError),
    /// The bus transport rejected an operation.
    Bus(BusError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Encode(e) => write!(f, "encode: {e}"),
            Self::Validation(e) => write!(f, "validation: {e}"),
            Self::Bus(e) => write!(f, "bus: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding errors (inbound)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The bytes are not valid JSON.
    InvalidJson,
    /// The top-level JSON value is not an object.
    NotAnObject,
    /// A required envelope field is absent or not a string.
    MissingField(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "message is not valid JSON"),
            Self::NotAnObject => write!(f, "message is not a JSON object"),
            Self::MissingField(field) => write!(f, "missing envelope field '{field}'"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Encoding errors (outbound)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The serialised envelope exceeds the transport's maximum message
    /// size. Oversized messages are rejected whole, never truncated.
    MessageTooLarge { size: usize, limit: usize },
    /// The payload could not be serialised.
    Serialize,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageTooLarge { size, limit } => {
                write!(f, "message of {size} bytes exceeds {limit}-byte limit")
            }
            Self::Serialize => write!(f, "payload serialisation failed"),
        }
    }
}

impl From<EncodeError> for Error {
    fn from(e: EncodeError) -> Self {
        Self::Encode(e)
    }
}

// ---------------------------------------------------------------------------
// Validation errors (known command, bad payload)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// A required payload field is absent.
    MissingField(&'static str),
    /// A payload field has the wrong JSON type.
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    /// A payload field exceeds its fixed capacity.
    FieldTooLong { field: &'static str, max: usize },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing payload field '{field}'"),
            Self::WrongType { field, expected } => {
                write!(f, "payload field '{field}' must be {expected}")
            }
            Self::FieldTooLong { field, max } => {
                write!(f, "payload field '{field}' exceeds {max} entries/bytes")
            }
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
