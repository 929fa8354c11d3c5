//! Port traits — the boundary between the protocol core and the world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ReaderService (protocol core)
//! ```
//!
//! Concrete adapters (an MQTT client, the PN532 driver, the system
//! clock) live outside this crate or under [`crate::adapters`]; the
//! core depends only on these traits.

use chrono::{DateTime, Utc};

use crate::protocol::event::Delivery;

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock source for envelope timestamps and operation deadlines.
pub trait ClockPort {
    /// The current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}

// ───────────────────────────────────────────────────────────────
// Tag hardware port
// ───────────────────────────────────────────────────────────────

/// The physical tag reader front-end.
///
/// All operations are begin/poll style — none may block, because the
/// routing loop must stay responsive to `auth_cancel` and `reset`.
/// Tag discovery during auth polling is delivered back to the service
/// as [`Input::TagDetected`](super::service::Input).
pub trait TagReaderPort {
    /// Verify a detected tag against the supplied key.
    fn verify(&mut self, tag_uid: &str, key: &str) -> bool;

    /// Start writing a key to the tag (completion is controller-driven).
    fn begin_register(&mut self, tag_uid: &str, key: &str);

    /// Start reading the listed blocks; returns whatever data is
    /// already buffered.
    fn begin_read(&mut self, blocks: &[u32]) -> Vec<u8>;

    /// Abort the in-flight hardware operation.
    fn cancel(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Bus port
// ───────────────────────────────────────────────────────────────

/// Publish/subscribe transport (MQTT or equivalent).
///
/// Connection management lives in the adapter; the service only sees a
/// connected session via
/// [`ReaderService::on_connect`](super::service::ReaderService::on_connect).
pub trait BusPort {
    /// Publish `payload` to `topic` with the given retention and
    /// reliability class.
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retained: bool,
        delivery: Delivery,
    ) -> Result<(), BusError>;

    /// Subscribe to a topic filter (supports trailing wildcards).
    fn subscribe(&mut self, topic_filter: &str) -> Result<(), BusError>;

    /// Register the presence (last-will) message the transport delivers
    /// on our behalf if this device disconnects uncleanly.
    fn set_presence(
        &mut self,
        topic: &str,
        payload: &[u8],
        retained: bool,
    ) -> Result<(), BusError>;
}

// ───────────────────────────────────────────────────────────────
// System monitor port
// ───────────────────────────────────────────────────────────────

/// Runtime health figures reported in heartbeats.
pub trait SystemMonitorPort {
    /// Heap usage as a percentage of the total.
    fn memory_usage_percent(&self) -> f32;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`BusPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The session is not connected.
    NotConnected,
    /// The broker refused or the send buffer is exhausted.
    PublishFailed,
    /// The subscription was refused.
    SubscribeFailed,
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
        }
    }
}
