//! Wall-clock adapter backed by the system clock.

use chrono::{DateTime, Utc};

use crate::app::ports::ClockPort;

/// [`ClockPort`] implementation reading the OS clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
