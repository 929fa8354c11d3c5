//! Application layer — ports, event publishing, and the service loop.
//!
//! The protocol core never touches a socket, a clock, or the NFC
//! front-end directly. Driven adapters (bus client, tag hardware, wall
//! clock, system monitor) implement the **port traits** in [`ports`];
//! [`service::ReaderService`] consumes them via generics, so the whole
//! device can be exercised on the host with deterministic test doubles.

pub mod ports;
pub mod publisher;
pub mod service;
