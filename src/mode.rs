//! Operating-mode state machine.
//!
//! The device is in exactly one of four modes at any time:
//!
//! ```text
//!            auth_start                 auth_verify / auth_cancel
//!   idle ───────────────▶ auth ──────────────────────────────▶ idle
//!   idle ───────────────▶ register ───────────────────────────▶ idle
//!            register_start             register_cancel / reset
//!   idle ───────────────▶ read ───────────────────────────────▶ idle
//!            read_start                 read_cancel / reset
//! ```
//!
//! Transitions are synchronous and immediate — there are no intermediate
//! states. `reset` (and an operation timeout) forces `idle` from any mode.
//! The machine itself has no side effects; the command router emits the
//! `mode_change` event from the [`Transition`] each method returns, after
//! the mode variable has already been updated.

use core::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// The device's operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Idle,
    Auth,
    Register,
    Read,
}

impl Mode {
    /// Wire name of the mode, as carried in `mode_change` payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Auth => "auth",
            Self::Register => "register",
            Self::Read => "read",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Triggers and transitions
// ---------------------------------------------------------------------------

/// A command-driven trigger evaluated against the current mode.
///
/// `reset` is deliberately absent: it is always legal and handled by
/// [`ModeMachine::force_idle`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    AuthStart,
    AuthVerify,
    AuthCancel,
    RegisterStart,
    RegisterCancel,
    ReadStart,
    ReadCancel,
}

/// A completed mode transition. `from` and `to` may be equal only for
/// the forced reset-while-idle case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Mode,
    pub to: Mode,
}

/// A trigger arrived while the machine was not in its required mode.
/// This is a protocol violation; the router rejects it and reports an
/// `error` event to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub mode: Mode,
    pub trigger: Trigger,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} not legal in mode '{}'", self.trigger, self.mode)
    }
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// Owns the current mode and the legal-transition table.
///
/// Lives for the process lifetime, initialised to `idle` at startup.
/// Mutated only by the command router in response to a routed command,
/// a cancel, a reset, or an operation timeout.
#[derive(Debug)]
pub struct ModeMachine {
    current: Mode,
}

impl Default for ModeMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeMachine {
    pub fn new() -> Self {
        Self { current: Mode::Idle }
    }

    /// The currently active mode.
    pub fn current(&self) -> Mode {
        self.current
    }

    /// Apply a trigger. On success the mode is updated **before** the
    /// transition is returned; on failure the mode is untouched.
    pub fn apply(&mut self, trigger: Trigger) -> Result<Transition, InvalidTransition> {
        let next = match (self.current, trigger) {
            (Mode::Idle, Trigger::AuthStart) => Mode::Auth,
            (Mode::Auth, Trigger::AuthVerify | Trigger::AuthCancel) => Mode::Idle,
            (Mode::Idle, Trigger::RegisterStart) => Mode::Register,
            (Mode::Register, Trigger::RegisterCancel) => Mode::Idle,
            (Mode::Idle, Trigger::ReadStart) => Mode::Read,
            (Mode::Read, Trigger::ReadCancel) => Mode::Idle,
            (mode, trigger) => return Err(InvalidTransition { mode, trigger }),
        };

        let from = self.current;
        self.current = next;
        Ok(Transition { from, to: next })
    }

    /// Force an immediate return to `idle` (reset command or operation
    /// timeout). Always succeeds, even when already idle — the caller
    /// still emits exactly one `mode_change`.
    pub fn force_idle(&mut self) -> Transition {
        let from = self.current;
        self.current = Mode::Idle;
        Transition { from, to: Mode::Idle }
    }
}
