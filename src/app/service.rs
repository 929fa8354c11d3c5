//! Reader service — connection supervision and the single dispatch
//! point of the device.
//!
//! ```text
//!  bytes / tag / tick ──▶ ┌──────────────────────────┐ ──▶ BusPort
//!                         │      ReaderService        │
//!  TagReaderPort ◀────────│  Router · Mode · Context  │
//!                         └──────────────────────────┘
//! ```
//!
//! Processing is single-threaded and cooperative: every [`Input`] is
//! handled to completion before the next is accepted, and suspension
//! points exist only between inputs — never inside a handler.

use log::{info, warn};

use crate::config::DeviceConfig;
use crate::error::Error;
use crate::mode::Mode;
use crate::protocol::command::TagUid;
use crate::protocol::envelope::Envelope;
use crate::protocol::event::{OutboundEvent, Status};
use crate::protocol::router::{CommandRouter, Routed};

use super::ports::{BusPort, ClockPort, SystemMonitorPort, TagReaderPort};
use super::publisher::EventPublisher;

// ───────────────────────────────────────────────────────────────
// Input
// ───────────────────────────────────────────────────────────────

/// One unit of work for the dispatch loop.
#[derive(Debug, Clone)]
pub enum Input {
    /// Raw bytes received on a subscribed topic.
    Message(Vec<u8>),
    /// The hardware discovered a tag while polling in auth mode.
    TagDetected(TagUid),
    /// Periodic timer tick — drives deadlines and heartbeats.
    Tick,
}

// ───────────────────────────────────────────────────────────────
// ReaderService
// ───────────────────────────────────────────────────────────────

/// Owns the router, the publisher, and the presence contract.
pub struct ReaderService {
    config: DeviceConfig,
    router: CommandRouter,
    publisher: EventPublisher,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    last_heartbeat: Option<chrono::DateTime<chrono::Utc>>,
    operations_completed: u32,
}

impl ReaderService {
    pub fn new(config: DeviceConfig) -> Self {
        let publisher = EventPublisher::new(&config.device_id);
        Self {
            config,
            router: CommandRouter::new(),
            publisher,
            started_at: None,
            last_heartbeat: None,
            operations_completed: 0,
        }
    }

    // ── Connection supervision ────────────────────────────────

    /// Run the startup sequence on a freshly connected session:
    ///
    /// 1. register the presence (offline) message with the transport;
    /// 2. subscribe to everything under this device's namespace;
    /// 3. announce `status_change(online)` — strictly before —
    /// 4. announce `mode_change(idle, "")`.
    ///
    /// A controller must never observe a mode event before the
    /// corresponding online status.
    pub fn on_connect(
        &mut self,
        bus: &mut impl BusPort,
        clock: &impl ClockPort,
    ) -> Result<(), Error> {
        let now = clock.now();

        let lwt = self.publisher.presence_message(now, &self.config)?;
        bus.set_presence(&self.publisher.status_topic(), &lwt, true)?;

        bus.subscribe(&self.publisher.subscription_filter())?;

        let online = OutboundEvent::StatusChange {
            status: Status::Online,
            firmware_version: self.config.firmware_version.clone(),
            ip_address: self.config.ip_address.clone(),
        };
        self.publisher.publish(bus, clock.now(), &online, "")?;

        let announce = OutboundEvent::ModeChange {
            mode: Mode::Idle,
            previous_mode: None,
        };
        self.publisher.publish(bus, clock.now(), &announce, "")?;

        self.started_at = Some(now);
        self.last_heartbeat = Some(now);
        info!(
            "{} online (fw {}), subscribed to {}",
            self.config.device_id,
            self.config.firmware_version,
            self.publisher.subscription_filter()
        );
        Ok(())
    }

    // ── Dispatch loop ─────────────────────────────────────────

    /// Handle one input to completion.
    pub fn step(
        &mut self,
        input: Input,
        bus: &mut impl BusPort,
        reader: &mut impl TagReaderPort,
        clock: &impl ClockPort,
        monitor: &impl SystemMonitorPort,
    ) {
        match input {
            Input::Message(bytes) => self.handle_message(&bytes, bus, reader, clock),
            Input::TagDetected(tag_uid) => {
                if let Some(routed) = self.router.tag_detected(tag_uid) {
                    self.emit(bus, clock, &routed);
                }
            }
            Input::Tick => {
                if let Some(routed) = self.router.check_timeout(clock.now(), reader) {
                    self.emit(bus, clock, &routed);
                }
                self.heartbeat_if_due(bus, clock, monitor);
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current operating mode.
    pub fn mode(&self) -> Mode {
        self.router.mode()
    }

    /// Commands accepted and acted upon since startup.
    pub fn operations_completed(&self) -> u32 {
        self.operations_completed
    }

    // ── Internal ──────────────────────────────────────────────

    fn handle_message(
        &mut self,
        bytes: &[u8],
        bus: &mut impl BusPort,
        reader: &mut impl TagReaderPort,
        clock: &impl ClockPort,
    ) {
        // Malformed inbound messages are dropped without a response.
        let envelope = match Envelope::decode(bytes) {
            Ok(env) => env,
            Err(e) => {
                warn!("dropping undecodable message: {e}");
                return;
            }
        };

        let routed = self.router.route(&envelope, reader, clock.now());
        if routed.accepted {
            self.operations_completed = self.operations_completed.wrapping_add(1);
        }
        self.emit(bus, clock, &routed);
    }

    fn emit(&mut self, bus: &mut impl BusPort, clock: &impl ClockPort, routed: &Routed) {
        for event in &routed.events {
            if let Err(e) = self
                .publisher
                .publish(bus, clock.now(), event, &routed.request_id)
            {
                // Never fatal: log and keep the device responsive.
                warn!("publish of {} failed: {e}", event.event_type());
            }
        }
    }

    fn heartbeat_if_due(
        &mut self,
        bus: &mut impl BusPort,
        clock: &impl ClockPort,
        monitor: &impl SystemMonitorPort,
    ) {
        let (Some(started), Some(last)) = (self.started_at, self.last_heartbeat) else {
            return; // Not connected yet.
        };
        let now = clock.now();
        let interval = i64::from(self.config.heartbeat_interval_secs);
        if (now - last).num_seconds() < interval {
            return;
        }

        let uptime = (now - started).num_seconds().max(0);
        #[allow(clippy::cast_sign_loss)]
        let heartbeat = OutboundEvent::Heartbeat {
            uptime_seconds: uptime as u64,
            memory_usage_percent: monitor.memory_usage_percent(),
            operations_completed: self.operations_completed,
        };

        if let Err(e) = self
            .publisher
            .publish(bus, now, &heartbeat, self.router.request_id())
        {
            warn!("heartbeat publish failed: {e}");
        }
        self.last_heartbeat = Some(now);
    }
}
