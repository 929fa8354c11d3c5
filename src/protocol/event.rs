//! Typed outbound events and their delivery policy.
//!
//! Each event owns its payload shape, topic suffix, retained flag, and
//! reliability class — the policy table from the protocol contract:
//!
//! | event              | topic suffix        | retained | delivery      |
//! |--------------------|---------------------|----------|---------------|
//! | `mode_change`      | `mode`              | yes      | at-least-once |
//! | `status_change`    | `status`            | yes      | at-least-once |
//! | `auth_tag_detected`| `auth/tag_detected` | no       | at-least-once |
//! | `auth_success`     | `auth/success`      | no       | at-least-once |
//! | `auth_failed`      | `auth/failed`       | no       | at-least-once |
//! | `error`            | `error`             | no       | at-least-once |
//! | `heartbeat`        | `heartbeat`         | no       | at-most-once  |
//!
//! `mode_change` and `status_change` are retained so a controller that
//! subscribes late still observes the device's last known state.

use serde_json::{Value, json};

use crate::mode::Mode;

use super::command::TagUid;

/// Message text sent with `auth_tag_detected`.
pub const TAG_DETECTED_MESSAGE: &str = "Tag detected. Awaiting user data.";

/// Message text sent with `auth_success`.
pub const AUTH_SUCCESS_MESSAGE: &str = "Authentication successful";

// ---------------------------------------------------------------------------
// Delivery policy
// ---------------------------------------------------------------------------

/// Reliability class the transport should apply to a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Must reach the controller (QoS 1 on MQTT).
    AtLeastOnce,
    /// Best-effort; loss is acceptable (QoS 0 on MQTT).
    AtMostOnce,
}

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Machine-readable code carried in `error` event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// A start command arrived while an operation was already in flight.
    Busy,
    /// A trigger arrived in a mode where it is not legal.
    InvalidState,
    /// A known command carried a missing or malformed payload field.
    InvalidPayload,
    /// The in-flight operation exceeded its `timeout_seconds`.
    Timeout,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Busy => "busy",
            Self::InvalidState => "invalid_state",
            Self::InvalidPayload => "invalid_payload",
            Self::Timeout => "timeout",
        }
    }
}

// ---------------------------------------------------------------------------
// Device status
// ---------------------------------------------------------------------------

/// Online/offline status carried in `status_change`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Online,
    Offline,
}

impl Status {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

// ---------------------------------------------------------------------------
// OutboundEvent
// ---------------------------------------------------------------------------

/// A typed outbound event, composed by the router or the service and
/// published by the event publisher.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    ModeChange {
        mode: Mode,
        /// `None` only for the startup announcement, rendered as `""`.
        previous_mode: Option<Mode>,
    },
    StatusChange {
        status: Status,
        firmware_version: String,
        ip_address: String,
    },
    AuthTagDetected {
        tag_uid: TagUid,
    },
    AuthSuccess {
        tag_uid: TagUid,
        user_data: Value,
    },
    AuthFailed {
        tag_uid: TagUid,
        reason: String,
    },
    Error {
        error: String,
        error_code: ErrorCode,
        retry_possible: bool,
        component: &'static str,
    },
    Heartbeat {
        uptime_seconds: u64,
        memory_usage_percent: f32,
        operations_completed: u32,
    },
}

impl OutboundEvent {
    /// Wire `event_type` string.
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::ModeChange { .. } => "mode_change",
            Self::StatusChange { .. } => "status_change",
            Self::AuthTagDetected { .. } => "auth_tag_detected",
            Self::AuthSuccess { .. } => "auth_success",
            Self::AuthFailed { .. } => "auth_failed",
            Self::Error { .. } => "error",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }

    /// Topic suffix under `devices/{id}/`.
    pub const fn topic_suffix(&self) -> &'static str {
        match self {
            Self::ModeChange { .. } => "mode",
            Self::StatusChange { .. } => "status",
            Self::AuthTagDetected { .. } => "auth/tag_detected",
            Self::AuthSuccess { .. } => "auth/success",
            Self::AuthFailed { .. } => "auth/failed",
            Self::Error { .. } => "error",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }

    /// Whether the bus should retain the message for late subscribers.
    pub const fn retained(&self) -> bool {
        matches!(self, Self::ModeChange { .. } | Self::StatusChange { .. })
    }

    /// Reliability class for this event.
    pub const fn delivery(&self) -> Delivery {
        match self {
            Self::Heartbeat { .. } => Delivery::AtMostOnce,
            _ => Delivery::AtLeastOnce,
        }
    }

    /// Build the event-specific payload object.
    pub fn payload(&self) -> Value {
        match self {
            Self::ModeChange {
                mode,
                previous_mode,
            } => json!({
                "mode": mode.as_str(),
                "previous_mode": previous_mode.map_or("", Mode::as_str),
            }),
            Self::StatusChange {
                status,
                firmware_version,
                ip_address,
            } => json!({
                "status": status.as_str(),
                "firmware_version": firmware_version,
                "ip_address": ip_address,
            }),
            Self::AuthTagDetected { tag_uid } => json!({
                "tag_uid": tag_uid.as_str(),
                "message": TAG_DETECTED_MESSAGE,
            }),
            Self::AuthSuccess { tag_uid, user_data } => json!({
                "tag_uid": tag_uid.as_str(),
                "authenticated": true,
                "message": AUTH_SUCCESS_MESSAGE,
                "user_data": user_data,
            }),
            Self::AuthFailed { tag_uid, reason } => json!({
                "tag_uid": tag_uid.as_str(),
                "authenticated": false,
                "reason": reason,
            }),
            Self::Error {
                error,
                error_code,
                retry_possible,
                component,
            } => json!({
                "error": error,
                "error_code": error_code.as_str(),
                "retry_possible": retry_possible,
                "component": component,
            }),
            Self::Heartbeat {
                uptime_seconds,
                memory_usage_percent,
                operations_completed,
            } => json!({
                "uptime_seconds": uptime_seconds,
                "memory_usage_percent": memory_usage_percent,
                "operations_completed": operations_completed,
            }),
        }
    }
}
