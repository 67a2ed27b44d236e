//! Shared helpers for flagsync benchmarks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use flagsync_protocol::{IntentCode, ProtocolEvent};
use flagsync_testkit::{payload_transferred, put_flag, server_intent};
use serde_json::json;

/// Builds a full transfer carrying `count` flags.
pub fn full_transfer_events(count: usize) -> Vec<ProtocolEvent> {
    let mut events = Vec::with_capacity(count + 2);
    events.push(server_intent(IntentCode::TransferFull, "bench", 1));
    events.extend((0..count).map(|i| {
        put_flag(
            &format!("flag-{i}"),
            1,
            json!({"key": format!("flag-{i}"), "on": i % 2 == 0, "variations": [true, false]}),
        )
    }));
    events.push(payload_transferred("(p:bench:1)", 1));
    events
}

/// Builds the wire form of a full transfer carrying `count` flags.
pub fn full_transfer_wire(count: usize) -> Vec<(String, String)> {
    full_transfer_events(count)
        .iter()
        .map(flagsync_testkit::to_wire)
        .collect()
}
