//! Concrete adapters for the port traits in [`crate::app::ports`].
//!
//! Only host-side adapters live in this crate; the MQTT session and the
//! NFC front-end are wired up by the firmware binary that embeds this
//! library.

pub mod clock;
