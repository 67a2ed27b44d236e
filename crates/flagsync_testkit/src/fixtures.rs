//! Fixtures for building protocol events.
//!
//! Each builder has a structured form and, where transports are simulated,
//! a wire form returning `(event name, JSON text)`.

use flagsync_protocol::{
    DeleteObject, Goodbye, IntentCode, PayloadIntent, PayloadTransferred, ProtocolEvent, PutObject,
    ServerError, ServerIntentData,
};
use serde_json::{json, Value};

/// Builds a `server-intent` with a single intent.
pub fn server_intent(code: IntentCode, id: &str, target: u64) -> ProtocolEvent {
    ProtocolEvent::ServerIntent(ServerIntentData::single(PayloadIntent::new(
        code, id, target, "test",
    )))
}

/// Builds a `put-object` for a flag.
pub fn put_flag(key: &str, version: u64, object: Value) -> ProtocolEvent {
    put_object("flag", key, version, object)
}

/// Builds a `put-object` for a segment.
pub fn put_segment(key: &str, version: u64, object: Value) -> ProtocolEvent {
    put_object("segment", key, version, object)
}

/// Builds a `put-object` for any kind.
pub fn put_object(kind: &str, key: &str, version: u64, object: Value) -> ProtocolEvent {
    ProtocolEvent::PutObject(PutObject::new(kind, key, version, object))
}

/// Builds a `delete-object`.
pub fn delete_object(kind: &str, key: &str, version: u64) -> ProtocolEvent {
    ProtocolEvent::DeleteObject(DeleteObject::new(kind, key, version))
}

/// Builds a `payload-transferred`.
pub fn payload_transferred(state: &str, version: u64) -> ProtocolEvent {
    ProtocolEvent::PayloadTransferred(PayloadTransferred::new(state, version))
}

/// Builds a server `error`.
pub fn server_error(payload_id: &str, reason: &str) -> ProtocolEvent {
    ProtocolEvent::Error(ServerError {
        reason: Some(reason.to_string()),
        payload_id: Some(payload_id.to_string()),
    })
}

/// Builds a `goodbye`.
pub fn goodbye(reason: &str) -> ProtocolEvent {
    ProtocolEvent::Goodbye(Goodbye {
        reason: Some(reason.to_string()),
    })
}

/// Builds a complete full transfer around the given objects.
pub fn full_transfer(
    id: &str,
    version: u64,
    objects: Vec<ProtocolEvent>,
    state: &str,
) -> Vec<ProtocolEvent> {
    let mut events = vec![server_intent(IntentCode::TransferFull, id, version)];
    events.extend(objects);
    events.push(payload_transferred(state, version));
    events
}

/// Builds a complete incremental transfer around the given objects.
pub fn changes_transfer(
    id: &str,
    version: u64,
    objects: Vec<ProtocolEvent>,
    state: &str,
) -> Vec<ProtocolEvent> {
    let mut events = vec![server_intent(IntentCode::TransferChanges, id, version)];
    events.extend(objects);
    events.push(payload_transferred(state, version));
    events
}

/// Encodes a structured event as `(event name, JSON text)` as a transport would carry it.
pub fn to_wire(event: &ProtocolEvent) -> (String, String) {
    let data = event.data_to_value().unwrap_or_else(|_| json!({}));
    (event.name().to_string(), data.to_string())
}

/// Builds an FDv1 `{flags, segments}` document with versioned objects.
pub fn fdv1_document(flags: &[(&str, u64)], segments: &[(&str, u64)]) -> Value {
    fn objects(items: &[(&str, u64)]) -> Value {
        items
            .iter()
            .map(|(key, version)| (key.to_string(), json!({"key": key, "version": version})))
            .collect::<serde_json::Map<String, Value>>()
            .into()
    }
    json!({"flags": objects(flags), "segments": objects(segments)})
}
