//! Command router — validates inbound commands and drives the mode
//! machine and tag hardware.
//!
//! The router owns the only two pieces of mutable protocol state: the
//! [`ModeMachine`] and the in-flight [`RequestContext`]. Everything it
//! produces is returned as a [`Routed`] batch of outbound events; the
//! service publishes them, stamped with the batch's correlation id.
//!
//! Rejection policy, stated explicitly because each case is observable
//! on the wire:
//! - unknown event types are dropped, log-only;
//! - a malformed payload on a known command is rejected with
//!   `error{error_code: "invalid_payload"}`;
//! - a start command while an operation is in flight is rejected with
//!   `error{error_code: "busy"}` — the in-flight context is **not**
//!   silently overwritten;
//! - a verify/cancel in the wrong mode is rejected with
//!   `error{error_code: "invalid_state"}`.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use crate::app::ports::TagReaderPort;
use crate::mode::{InvalidTransition, Mode, ModeMachine, Transition, Trigger};

use super::command::{Command, TagUid};
use super::envelope::Envelope;
use super::event::{ErrorCode, OutboundEvent};

/// Human-readable reason sent with `auth_failed` when verification
/// returns false.
pub const AUTH_FAILED_REASON: &str = "Invalid decryption key";

// ---------------------------------------------------------------------------
// RequestContext
// ---------------------------------------------------------------------------

/// Correlates an accepted command with its outbound events and bounds
/// how long a non-idle mode may persist.
///
/// Owned exclusively by the router; replaced wholesale on each accepted
/// command and cleared when the mode returns to `idle`.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub timeout_seconds: u32,
    deadline: Option<DateTime<Utc>>,
}

impl RequestContext {
    fn new(request_id: &str, timeout_seconds: u32, now: DateTime<Utc>) -> Self {
        // timeout_seconds == 0 disables the deadline.
        let deadline = (timeout_seconds > 0)
            .then(|| now + Duration::seconds(i64::from(timeout_seconds)));
        Self {
            request_id: request_id.to_owned(),
            timeout_seconds,
            deadline,
        }
    }
}

// ---------------------------------------------------------------------------
// Routed batch
// ---------------------------------------------------------------------------

/// The outcome of handling one inbound message or timer expiry.
#[derive(Debug)]
pub struct Routed {
    /// Correlation id to stamp on every event in the batch.
    pub request_id: String,
    /// True when a command was accepted and acted upon (counts toward
    /// `operations_completed`).
    pub accepted: bool,
    pub events: Vec<OutboundEvent>,
}

impl Routed {
    fn empty(request_id: String) -> Self {
        Self {
            request_id,
            accepted: false,
            events: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandRouter
// ---------------------------------------------------------------------------

/// Routes decoded envelopes to handlers; owns mode and request context.
#[derive(Debug, Default)]
pub struct CommandRouter {
    machine: ModeMachine,
    ctx: Option<RequestContext>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current operating mode.
    pub fn mode(&self) -> Mode {
        self.machine.current()
    }

    /// Correlation id of the command currently in flight, or `""`.
    pub fn request_id(&self) -> &str {
        self.ctx.as_ref().map_or("", |c| c.request_id.as_str())
    }

    /// Route one decoded envelope.
    pub fn route(
        &mut self,
        envelope: &Envelope,
        reader: &mut impl TagReaderPort,
        now: DateTime<Utc>,
    ) -> Routed {
        let request_id = envelope.request_id.clone();

        let cmd = match Command::parse(envelope) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => {
                debug!("dropping non-command event type '{}'", envelope.event_type);
                return Routed::empty(request_id);
            }
            Err(e) => {
                warn!("rejecting '{}': {}", envelope.event_type, e);
                return Routed {
                    request_id,
                    accepted: false,
                    events: vec![OutboundEvent::Error {
                        error: e.to_string(),
                        error_code: ErrorCode::InvalidPayload,
                        retry_possible: true,
                        component: "router",
                    }],
                };
            }
        };

        self.dispatch(cmd, request_id, reader, now)
    }

    /// The hardware found a tag while polling. Only meaningful in auth
    /// mode; ignored otherwise.
    pub fn tag_detected(&self, tag_uid: TagUid) -> Option<Routed> {
        if self.machine.current() != Mode::Auth {
            debug!(
                "tag {} detected outside auth mode ({}), ignoring",
                tag_uid,
                self.machine.current()
            );
            return None;
        }
        Some(Routed {
            request_id: self.request_id().to_owned(),
            accepted: false,
            events: vec![OutboundEvent::AuthTagDetected { tag_uid }],
        })
    }

    /// Expire the in-flight operation if its deadline has passed:
    /// cancel the hardware, force `idle`, and report a retryable error.
    pub fn check_timeout(
        &mut self,
        now: DateTime<Utc>,
        reader: &mut impl TagReaderPort,
    ) -> Option<Routed> {
        let ctx = self.ctx.as_ref()?;
        let deadline = ctx.deadline?;
        if now < deadline || self.machine.current() == Mode::Idle {
            return None;
        }

        let request_id = ctx.request_id.clone();
        let timeout_seconds = ctx.timeout_seconds;

        reader.cancel();
        let transition = self.machine.force_idle();
        self.ctx = None;

        warn!(
            "{} operation timed out after {}s, returning to idle",
            transition.from, timeout_seconds
        );
        Some(Routed {
            request_id,
            accepted: false,
            events: vec![
                OutboundEvent::Error {
                    error: format!(
                        "{} operation exceeded {timeout_seconds}s timeout",
                        transition.from
                    ),
                    error_code: ErrorCode::Timeout,
                    retry_possible: true,
                    component: transition.from.as_str(),
                },
                mode_change(transition),
            ],
        })
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn dispatch(
        &mut self,
        cmd: Command,
        request_id: String,
        reader: &mut impl TagReaderPort,
        now: DateTime<Utc>,
    ) -> Routed {
        let events = match cmd {
            Command::AuthStart { timeout_seconds } => {
                match self.machine.apply(Trigger::AuthStart) {
                    Ok(t) => {
                        self.ctx = Some(RequestContext::new(&request_id, timeout_seconds, now));
                        vec![mode_change(t)]
                    }
                    Err(inv) => return self.reject(request_id, &inv, ErrorCode::Busy),
                }
            }

            Command::AuthVerify {
                tag_uid,
                key,
                user_data,
            } => match self.machine.apply(Trigger::AuthVerify) {
                Ok(t) => {
                    self.ctx = Some(RequestContext::new(&request_id, 0, now));
                    let result = if reader.verify(tag_uid.as_str(), &key) {
                        OutboundEvent::AuthSuccess { tag_uid, user_data }
                    } else {
                        OutboundEvent::AuthFailed {
                            tag_uid,
                            reason: AUTH_FAILED_REASON.to_owned(),
                        }
                    };
                    vec![result, mode_change(t)]
                }
                Err(inv) => return self.reject(request_id, &inv, ErrorCode::InvalidState),
            },

            Command::AuthCancel => match self.machine.apply(Trigger::AuthCancel) {
                Ok(t) => {
                    reader.cancel();
                    vec![mode_change(t)]
                }
                Err(inv) => return self.reject(request_id, &inv, ErrorCode::InvalidState),
            },

            Command::RegisterStart {
                tag_uid,
                key,
                timeout_seconds,
            } => match self.machine.apply(Trigger::RegisterStart) {
                Ok(t) => {
                    self.ctx = Some(RequestContext::new(&request_id, timeout_seconds, now));
                    reader.begin_register(tag_uid.as_str(), &key);
                    vec![mode_change(t)]
                }
                Err(inv) => return self.reject(request_id, &inv, ErrorCode::Busy),
            },

            Command::RegisterCancel => match self.machine.apply(Trigger::RegisterCancel) {
                Ok(t) => {
                    reader.cancel();
                    vec![mode_change(t)]
                }
                Err(inv) => return self.reject(request_id, &inv, ErrorCode::InvalidState),
            },

            Command::ReadStart {
                read_blocks,
                timeout_seconds,
            } => match self.machine.apply(Trigger::ReadStart) {
                Ok(t) => {
                    self.ctx = Some(RequestContext::new(&request_id, timeout_seconds, now));
                    let data = reader.begin_read(&read_blocks);
                    debug!(
                        "read of {} blocks begun, {} bytes buffered",
                        read_blocks.len(),
                        data.len()
                    );
                    vec![mode_change(t)]
                }
                Err(inv) => return self.reject(request_id, &inv, ErrorCode::Busy),
            },

            Command::ReadCancel => match self.machine.apply(Trigger::ReadCancel) {
                Ok(t) => {
                    reader.cancel();
                    vec![mode_change(t)]
                }
                Err(inv) => return self.reject(request_id, &inv, ErrorCode::InvalidState),
            },

            Command::Reset => {
                reader.cancel();
                let t = self.machine.force_idle();
                vec![mode_change(t)]
            }
        };

        // RequestContext lives until the mode returns to idle; events in
        // this batch were composed while it was still in force.
        if self.machine.current() == Mode::Idle {
            self.ctx = None;
        }

        Routed {
            request_id,
            accepted: true,
            events,
        }
    }

    fn reject(
        &self,
        request_id: String,
        inv: &InvalidTransition,
        error_code: ErrorCode,
    ) -> Routed {
        warn!("protocol violation: {inv} ({})", error_code.as_str());
        Routed {
            request_id,
            accepted: false,
            events: vec![OutboundEvent::Error {
                error: inv.to_string(),
                error_code,
                retry_possible: true,
                component: "router",
            }],
        }
    }
}

fn mode_change(t: Transition) -> OutboundEvent {
    OutboundEvent::ModeChange {
        mode: t.to,
        previous_mode: Some(t.from),
    }
}
