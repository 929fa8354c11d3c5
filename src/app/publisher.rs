//! Event publisher — wraps typed events in envelopes and hands them to
//! the bus with the right topic, retention, and reliability class.
//!
//! An envelope that fails to encode (oversized) is an internal fault:
//! it is surfaced to the caller and never sent, truncated, or dropped
//! silently.

use chrono::{DateTime, Utc};

use crate::config::DeviceConfig;
use crate::error::Error;
use crate::protocol::envelope::EnvelopeCodec;
use crate::protocol::event::{OutboundEvent, Status};

use super::ports::BusPort;

/// Composes and publishes outbound events for one device.
#[derive(Debug)]
pub struct EventPublisher {
    codec: EnvelopeCodec,
    topic_root: String,
}

impl EventPublisher {
    pub fn new(device_id: &str) -> Self {
        Self {
            codec: EnvelopeCodec::new(device_id),
            topic_root: format!("devices/{device_id}"),
        }
    }

    /// Topic for a given event.
    pub fn topic_for(&self, event: &OutboundEvent) -> String {
        format!("{}/{}", self.topic_root, event.topic_suffix())
    }

    /// The wildcard filter covering every topic under this device.
    pub fn subscription_filter(&self) -> String {
        format!("{}/#", self.topic_root)
    }

    /// Topic carrying `status_change` (also the presence topic).
    pub fn status_topic(&self) -> String {
        format!("{}/status", self.topic_root)
    }

    /// Encode and publish one event, stamped with `request_id`.
    pub fn publish(
        &mut self,
        bus: &mut impl BusPort,
        now: DateTime<Utc>,
        event: &OutboundEvent,
        request_id: &str,
    ) -> Result<(), Error> {
        let bytes = self
            .codec
            .encode(now, event.event_type(), request_id, event.payload())?;
        bus.publish(
            &self.topic_for(event),
            &bytes,
            event.retained(),
            event.delivery(),
        )?;
        Ok(())
    }

    /// Build the presence (last-will) message: a full envelope whose
    /// payload is schema-identical to a normal `status_change` with
    /// `status: "offline"`.
    pub fn presence_message(
        &mut self,
        now: DateTime<Utc>,
        config: &DeviceConfig,
    ) -> Result<Vec<u8>, Error> {
        let offline = OutboundEvent::StatusChange {
            status: Status::Offline,
            firmware_version: config.firmware_version.clone(),
            ip_address: config.ip_address.clone(),
        };
        let bytes = self
            .codec
            .encode(now, offline.event_type(), "", offline.payload())?;
        Ok(bytes)
    }
}
