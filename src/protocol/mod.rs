//! Wire protocol — envelope codec, command parsing, event shapes, routing.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Protocol stack                           │
//! │                                                              │
//! │  ┌──────────┐   ┌───────────┐   ┌─────────────────────────┐ │
//! │  │ Envelope │──▶│  Command  │──▶│  Router (dispatcher)    │ │
//! │  │ (codec)  │   │ (parse)   │   │  → ModeMachine          │ │
//! │  └──────────┘   └───────────┘   │  → TagReaderPort        │ │
//! │       ▲                         └───────────┬─────────────┘ │
//! │       │                                     ▼               │
//! │  ┌──────────┐                     ┌──────────────────┐      │
//! │  │ Envelope │◀────────────────────│  OutboundEvent   │      │
//! │  │ (encode) │                     │  (typed shapes)  │      │
//! │  └──────────┘                     └──────────────────┘      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod command;
pub mod envelope;
pub mod event;
pub mod router;
