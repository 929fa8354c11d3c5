//! TapReader protocol core library.
//!
//! The protocol layer of a contactless-tag reader device that talks to a
//! remote controller over an MQTT-style publish/subscribe bus. Everything
//! here is pure logic — transport, tag hardware, and the wall clock are
//! consumed through the port traits in [`app::ports`], so the full
//! command-dispatch chain can be exercised on the host with mock adapters.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod mode;
pub mod protocol;
