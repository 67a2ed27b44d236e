//! FDv2 protocol state machine.

use crate::processors::ObjectProcessors;
use flagsync_protocol::{
    DeleteObject, Goodbye, IntentCode, Payload, PayloadTransferred, PayloadType, ProtocolEvent,
    PutObject, ServerError, ServerIntentData, Update,
};
use std::fmt;
use tracing::{info, warn};

/// The phase of the protocol for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    /// No intent has been established.
    Inactive,
    /// Accumulating changes, or waiting for the next intent after a transfer.
    Changes,
    /// Accumulating a full snapshot.
    Full,
}

impl ProtocolState {
    /// Returns the name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolState::Inactive => "inactive",
            ProtocolState::Changes => "changes",
            ProtocolState::Full => "full",
        }
    }

    /// Returns true if an intent has been established.
    pub fn is_active(&self) -> bool {
        !matches!(self, ProtocolState::Inactive)
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// A `server-intent` carried no payload intents.
    MissingPayload,
    /// An event arrived that the current state cannot accept.
    ProtocolError,
    /// The event name is not part of the protocol.
    UnknownEvent,
}

impl ProtocolErrorKind {
    /// Returns the canonical name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolErrorKind::MissingPayload => "MISSING_PAYLOAD",
            ProtocolErrorKind::ProtocolError => "PROTOCOL_ERROR",
            ProtocolErrorKind::UnknownEvent => "UNKNOWN_EVENT",
        }
    }
}

impl fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of processing a single event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolAction {
    /// Nothing for the caller to do.
    None,
    /// A transfer completed.
    Payload(Payload),
    /// The event violated the protocol.
    Error {
        /// Violation category.
        kind: ProtocolErrorKind,
        /// Description of the violation.
        message: String,
    },
    /// The server is closing the connection.
    Goodbye {
        /// Reason given by the server.
        reason: Option<String>,
    },
    /// The server reported an application error.
    ServerError {
        /// Payload the error relates to.
        id: Option<String>,
        /// Reason given by the server.
        reason: Option<String>,
    },
}

impl ProtocolAction {
    fn error(kind: ProtocolErrorKind, message: impl Into<String>) -> Self {
        ProtocolAction::Error {
            kind,
            message: message.into(),
        }
    }
}

/// The FDv2 protocol state machine for one stream.
///
/// Consumes one structured event at a time and reports what happened as a
/// [`ProtocolAction`]. It performs no I/O and never fails: malformed input
/// is either ignored or reported as an action, and the machine stays usable.
#[derive(Debug)]
pub struct ProtocolHandler {
    processors: ObjectProcessors,
    state: ProtocolState,
    pending_id: Option<String>,
    pending_type: PayloadType,
    updates: Vec<Update>,
}

impl ProtocolHandler {
    /// Creates a state machine using the given object processors.
    pub fn new(processors: ObjectProcessors) -> Self {
        Self {
            processors,
            state: ProtocolState::Inactive,
            pending_id: None,
            pending_type: PayloadType::Partial,
            updates: Vec::new(),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Returns the id of the transfer in progress.
    pub fn pending_id(&self) -> Option<&str> {
        self.pending_id.as_deref()
    }

    /// Returns the updates accumulated for the transfer in progress.
    pub fn pending_updates(&self) -> &[Update] {
        &self.updates
    }

    /// Discards all accumulated state and returns to [`ProtocolState::Inactive`].
    ///
    /// Call this when the underlying connection is replaced.
    pub fn reset(&mut self) {
        self.state = ProtocolState::Inactive;
        self.pending_id = None;
        self.pending_type = PayloadType::Partial;
        self.updates.clear();
    }

    /// Processes a single event.
    pub fn process_event(&mut self, event: &ProtocolEvent) -> ProtocolAction {
        match event {
            ProtocolEvent::ServerIntent(data) => self.on_server_intent(data),
            ProtocolEvent::PutObject(data) => self.on_put_object(data),
            ProtocolEvent::DeleteObject(data) => self.on_delete_object(data),
            ProtocolEvent::PayloadTransferred(data) => self.on_payload_transferred(data),
            ProtocolEvent::Goodbye(data) => self.on_goodbye(data),
            ProtocolEvent::Error(data) => self.on_server_error(data),
            ProtocolEvent::HeartBeat => ProtocolAction::None,
            ProtocolEvent::Unknown { name } => ProtocolAction::error(
                ProtocolErrorKind::UnknownEvent,
                format!("Received an unknown event of type '{name}'"),
            ),
        }
    }

    fn on_server_intent(&mut self, data: &ServerIntentData) -> ProtocolAction {
        let Some(intent) = data.first() else {
            return ProtocolAction::error(
                ProtocolErrorKind::MissingPayload,
                "No payload present in server-intent",
            );
        };

        self.updates.clear();
        self.pending_id = intent.id.clone();

        match intent.code() {
            Some(IntentCode::TransferFull) => {
                self.state = ProtocolState::Full;
                self.pending_type = PayloadType::Full;
                ProtocolAction::None
            }
            Some(IntentCode::TransferChanges) => {
                self.state = ProtocolState::Changes;
                self.pending_type = PayloadType::Partial;
                ProtocolAction::None
            }
            Some(IntentCode::None) => {
                self.state = ProtocolState::Changes;
                self.pending_type = PayloadType::Partial;
                match (&intent.id, intent.target) {
                    (Some(id), Some(target)) => ProtocolAction::Payload(Payload::none(id, target)),
                    _ => ProtocolAction::None,
                }
            }
            None => {
                warn!(intent_code = ?intent.intent_code, "Unable to process intent code");
                ProtocolAction::None
            }
        }
    }

    fn accepting_objects(&self) -> bool {
        self.state.is_active() && self.pending_id.is_some()
    }

    fn on_put_object(&mut self, data: &PutObject) -> ProtocolAction {
        if !self.accepting_objects() {
            return ProtocolAction::None;
        }
        let (Some(kind), Some(key), Some(version), Some(object)) =
            (&data.kind, &data.key, data.version, &data.object)
        else {
            return ProtocolAction::None;
        };

        match self.processors.process(kind, object) {
            Some(processed) => {
                self.updates.push(Update::put(kind, key, version, processed));
            }
            None => {
                warn!(%kind, %key, "Unable to process object for kind");
            }
        }
        ProtocolAction::None
    }

    fn on_delete_object(&mut self, data: &DeleteObject) -> ProtocolAction {
        if !self.accepting_objects() {
            return ProtocolAction::None;
        }
        let (Some(kind), Some(key), Some(version)) = (&data.kind, &data.key, data.version) else {
            return ProtocolAction::None;
        };

        self.updates.push(Update::delete(kind, key, version));
        ProtocolAction::None
    }

    fn on_payload_transferred(&mut self, data: &PayloadTransferred) -> ProtocolAction {
        if !self.state.is_active() {
            return ProtocolAction::error(
                ProtocolErrorKind::ProtocolError,
                "A payload transferred has been received without an intent having been established.",
            );
        }

        let (Some(id), Some(state), Some(version)) =
            (self.pending_id.clone(), data.state.clone(), data.version)
        else {
            // The transfer cannot be trusted; wait for a fresh intent.
            self.reset();
            return ProtocolAction::None;
        };

        let payload = Payload {
            id,
            version,
            state: Some(state),
            payload_type: self.pending_type,
            updates: std::mem::take(&mut self.updates),
        };

        self.state = ProtocolState::Changes;
        self.pending_type = PayloadType::Partial;
        ProtocolAction::Payload(payload)
    }

    fn on_goodbye(&mut self, data: &Goodbye) -> ProtocolAction {
        info!(reason = ?data.reason, "Goodbye was received from the server");
        ProtocolAction::Goodbye {
            reason: data.reason.clone(),
        }
    }

    fn on_server_error(&mut self, data: &ServerError) -> ProtocolAction {
        info!(
            payload_id = ?self.pending_id,
            reason = ?data.reason,
            "An issue was encountered receiving updates for payload"
        );
        self.updates.clear();
        ProtocolAction::ServerError {
            id: data.payload_id.clone(),
            reason: data.reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flagsync_protocol::PayloadIntent;
    use serde_json::{json, Value};

    fn handler() -> ProtocolHandler {
        ProtocolHandler::new(ObjectProcessors::passthrough(["flag", "segment"]))
    }

    fn intent(code: &str, id: &str, target: u64) -> ProtocolEvent {
        ProtocolEvent::ServerIntent(ServerIntentData::single(PayloadIntent {
            id: Some(id.into()),
            target: Some(target),
            intent_code: Some(code.into()),
            reason: Some("test".into()),
        }))
    }

    fn put(kind: &str, key: &str, version: u64, object: Value) -> ProtocolEvent {
        ProtocolEvent::PutObject(PutObject::new(kind, key, version, object))
    }

    fn delete(kind: &str, key: &str, version: u64) -> ProtocolEvent {
        ProtocolEvent::DeleteObject(DeleteObject::new(kind, key, version))
    }

    fn transferred(state: &str, version: u64) -> ProtocolEvent {
        ProtocolEvent::PayloadTransferred(PayloadTransferred::new(state, version))
    }

    fn expect_payload(action: ProtocolAction) -> Payload {
        match action {
            ProtocolAction::Payload(payload) => payload,
            other => panic!("expected payload, got {other:?}"),
        }
    }

    #[test]
    fn starts_inactive() {
        let handler = handler();
        assert_eq!(handler.state(), ProtocolState::Inactive);
        assert!(handler.pending_id().is_none());
    }

    #[test]
    fn objects_before_intent_are_ignored() {
        let mut handler = handler();

        assert_eq!(
            handler.process_event(&put("flag", "f1", 1, json!({}))),
            ProtocolAction::None
        );
        assert_eq!(
            handler.process_event(&delete("flag", "f1", 2)),
            ProtocolAction::None
        );
        assert_eq!(handler.process_event(&ProtocolEvent::HeartBeat), ProtocolAction::None);
        assert_eq!(handler.state(), ProtocolState::Inactive);
        assert!(handler.pending_updates().is_empty());
    }

    #[test]
    fn empty_full_transfer() {
        let mut handler = handler();

        assert_eq!(
            handler.process_event(&intent("xfer-full", "p1", 4)),
            ProtocolAction::None
        );
        assert_eq!(handler.state(), ProtocolState::Full);

        let payload = expect_payload(handler.process_event(&transferred("(p:p1:4)", 4)));
        assert_eq!(payload.payload_type, PayloadType::Full);
        assert_eq!(payload.state.as_deref(), Some("(p:p1:4)"));
        assert_eq!(payload.version, 4);
        assert!(payload.updates.is_empty());
        assert_eq!(handler.state(), ProtocolState::Changes);
    }

    #[test]
    fn full_transfer_with_objects() {
        let mut handler = handler();

        handler.process_event(&intent("xfer-full", "p1", 52));
        handler.process_event(&put("flag", "f1", 1, json!({"on": true})));
        handler.process_event(&put("flag", "f2", 2, json!({"on": false})));
        let payload = expect_payload(handler.process_event(&transferred("(p:p1:52)", 52)));

        assert_eq!(
            payload,
            Payload {
                id: "p1".into(),
                version: 52,
                state: Some("(p:p1:52)".into()),
                payload_type: PayloadType::Full,
                updates: vec![
                    Update::put("flag", "f1", 1, json!({"on": true})),
                    Update::put("flag", "f2", 2, json!({"on": false})),
                ],
            }
        );
    }

    #[test]
    fn changes_transfer_is_partial() {
        let mut handler = handler();

        handler.process_event(&intent("xfer-changes", "p1", 3));
        assert_eq!(handler.state(), ProtocolState::Changes);
        handler.process_event(&put("segment", "s1", 3, json!({"included": []})));
        handler.process_event(&delete("flag", "f1", 3));
        let payload = expect_payload(handler.process_event(&transferred("(p:p1:3)", 3)));

        assert_eq!(payload.payload_type, PayloadType::Partial);
        assert_eq!(
            payload.updates,
            vec![
                Update::put("segment", "s1", 3, json!({"included": []})),
                Update::delete("flag", "f1", 3),
            ]
        );
    }

    #[test]
    fn intent_none_short_circuits() {
        let mut handler = handler();

        let payload = expect_payload(handler.process_event(&intent("none", "p1", 1)));
        assert_eq!(payload, Payload::none("p1", 1));
        assert!(payload.state.is_none());
        assert_eq!(handler.state(), ProtocolState::Changes);
    }

    #[test]
    fn intent_none_without_target_emits_nothing() {
        let mut handler = handler();
        let event = ProtocolEvent::ServerIntent(ServerIntentData::single(PayloadIntent {
            id: Some("p1".into()),
            target: None,
            intent_code: Some("none".into()),
            reason: None,
        }));

        assert_eq!(handler.process_event(&event), ProtocolAction::None);
        assert_eq!(handler.state(), ProtocolState::Changes);
    }

    #[test]
    fn empty_intent_list_is_missing_payload() {
        let mut handler = handler();
        let action = handler.process_event(&ProtocolEvent::ServerIntent(ServerIntentData::default()));

        assert!(matches!(
            action,
            ProtocolAction::Error {
                kind: ProtocolErrorKind::MissingPayload,
                ..
            }
        ));
        assert_eq!(handler.state(), ProtocolState::Inactive);
    }

    #[test]
    fn only_first_intent_is_honored() {
        let mut handler = handler();
        let event = ProtocolEvent::ServerIntent(ServerIntentData {
            payloads: vec![
                PayloadIntent::new(IntentCode::TransferChanges, "first", 2, "stale"),
                PayloadIntent::new(IntentCode::TransferFull, "second", 9, "missing"),
            ],
        });

        handler.process_event(&event);
        assert_eq!(handler.state(), ProtocolState::Changes);
        assert_eq!(handler.pending_id(), Some("first"));
    }

    #[test]
    fn unrecognized_intent_code_keeps_state() {
        let mut handler = handler();
        handler.process_event(&intent("xfer-full", "p1", 1));

        assert_eq!(
            handler.process_event(&intent("xfer-sideways", "p2", 2)),
            ProtocolAction::None
        );
        assert_eq!(handler.state(), ProtocolState::Full);
    }

    #[test]
    fn missing_intent_code_clears_buffer_and_keeps_state() {
        let mut handler = handler();
        handler.process_event(&intent("xfer-changes", "p1", 1));
        handler.process_event(&put("flag", "f1", 1, json!({})));

        let event = ProtocolEvent::ServerIntent(ServerIntentData::single(PayloadIntent {
            id: Some("p2".into()),
            target: Some(2),
            intent_code: None,
            reason: None,
        }));
        assert_eq!(handler.process_event(&event), ProtocolAction::None);
        assert_eq!(handler.state(), ProtocolState::Changes);
        assert_eq!(handler.pending_id(), Some("p2"));
        assert!(handler.pending_updates().is_empty());
    }

    #[test]
    fn new_intent_discards_buffer() {
        let mut handler = handler();
        handler.process_event(&intent("xfer-full", "p1", 1));
        handler.process_event(&put("flag", "f1", 1, json!({})));
        handler.process_event(&intent("xfer-full", "p2", 2));
        handler.process_event(&put("flag", "f2", 2, json!({})));

        let payload = expect_payload(handler.process_event(&transferred("s", 2)));
        assert_eq!(payload.id, "p2");
        assert_eq!(payload.updates.len(), 1);
        assert_eq!(payload.updates[0].key, "f2");
    }

    #[test]
    fn transferred_without_intent_is_protocol_error() {
        let mut handler = handler();
        match handler.process_event(&transferred("s", 1)) {
            ProtocolAction::Error { kind, message } => {
                assert_eq!(kind, ProtocolErrorKind::ProtocolError);
                assert!(message.contains("without an intent"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn transferred_without_state_resets() {
        let mut handler = handler();
        handler.process_event(&intent("xfer-full", "p1", 1));
        handler.process_event(&put("flag", "f1", 1, json!({})));

        let event = ProtocolEvent::PayloadTransferred(PayloadTransferred {
            state: None,
            version: Some(1),
            id: None,
        });
        assert_eq!(handler.process_event(&event), ProtocolAction::None);
        assert_eq!(handler.state(), ProtocolState::Inactive);
        assert!(handler.pending_updates().is_empty());
    }

    #[test]
    fn transferred_without_version_resets() {
        let mut handler = handler();
        handler.process_event(&intent("xfer-changes", "p1", 1));

        let event = ProtocolEvent::PayloadTransferred(PayloadTransferred {
            state: Some("s".into()),
            version: None,
            id: None,
        });
        assert_eq!(handler.process_event(&event), ProtocolAction::None);
        assert_eq!(handler.state(), ProtocolState::Inactive);
    }

    #[test]
    fn transferred_without_pending_id_resets() {
        let mut handler = handler();
        let event = ProtocolEvent::ServerIntent(ServerIntentData::single(PayloadIntent {
            id: None,
            target: Some(1),
            intent_code: Some("xfer-full".into()),
            reason: None,
        }));
        handler.process_event(&event);
        assert_eq!(handler.state(), ProtocolState::Full);

        assert_eq!(handler.process_event(&transferred("s", 1)), ProtocolAction::None);
        assert_eq!(handler.state(), ProtocolState::Inactive);
    }

    #[test]
    fn incomplete_objects_are_dropped() {
        let mut handler = handler();
        handler.process_event(&intent("xfer-full", "p1", 1));

        handler.process_event(&ProtocolEvent::PutObject(PutObject {
            kind: Some("flag".into()),
            key: Some("f1".into()),
            version: Some(1),
            object: None,
        }));
        handler.process_event(&ProtocolEvent::DeleteObject(DeleteObject {
            kind: Some("flag".into()),
            key: None,
            version: Some(1),
        }));

        assert!(handler.pending_updates().is_empty());
    }

    #[test]
    fn rejected_objects_are_dropped() {
        let mut handler = ProtocolHandler::new(
            ObjectProcessors::new().with("flag", |object: &Value| {
                object.get("valid").is_some().then(|| object.clone())
            }),
        );
        handler.process_event(&intent("xfer-full", "p1", 1));
        handler.process_event(&put("flag", "bad", 1, json!({"on": true})));
        handler.process_event(&put("flag", "good", 1, json!({"valid": true})));
        handler.process_event(&put("segment", "unregistered", 1, json!({"valid": true})));

        let payload = expect_payload(handler.process_event(&transferred("", 1)));
        assert_eq!(payload.updates.len(), 1);
        assert_eq!(payload.updates[0].key, "good");
    }

    #[test]
    fn server_error_discards_buffer_but_keeps_phase() {
        let mut handler = handler();
        handler.process_event(&intent("xfer-full", "p1", 5));
        handler.process_event(&put("flag", "before", 1, json!({})));

        let action = handler.process_event(&ProtocolEvent::Error(ServerError {
            reason: Some("db hiccup".into()),
            payload_id: Some("p1".into()),
        }));
        assert_eq!(
            action,
            ProtocolAction::ServerError {
                id: Some("p1".into()),
                reason: Some("db hiccup".into()),
            }
        );
        assert_eq!(handler.state(), ProtocolState::Full);
        assert_eq!(handler.pending_id(), Some("p1"));

        handler.process_event(&put("flag", "after", 2, json!({})));
        let payload = expect_payload(handler.process_event(&transferred("(p:p1:5)", 5)));

        assert_eq!(payload.payload_type, PayloadType::Full);
        assert_eq!(payload.updates.len(), 1);
        assert_eq!(payload.updates[0].key, "after");
    }

    #[test]
    fn goodbye_keeps_state() {
        let mut handler = handler();
        handler.process_event(&intent("xfer-full", "p1", 1));

        let action = handler.process_event(&ProtocolEvent::Goodbye(Goodbye {
            reason: Some("shutdown".into()),
        }));
        assert_eq!(
            action,
            ProtocolAction::Goodbye {
                reason: Some("shutdown".into())
            }
        );
        assert_eq!(handler.state(), ProtocolState::Full);
    }

    #[test]
    fn unknown_event_is_reported() {
        let mut handler = handler();
        match handler.process_event(&ProtocolEvent::Unknown {
            name: "flag-patch".into(),
        }) {
            ProtocolAction::Error { kind, message } => {
                assert_eq!(kind, ProtocolErrorKind::UnknownEvent);
                assert!(message.contains("flag-patch"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn changes_after_transfer_accumulate_under_same_id() {
        let mut handler = handler();
        handler.process_event(&intent("xfer-full", "p1", 1));
        expect_payload(handler.process_event(&transferred("a", 1)));

        handler.process_event(&put("flag", "f1", 2, json!({})));
        let payload = expect_payload(handler.process_event(&transferred("b", 2)));

        assert_eq!(payload.id, "p1");
        assert_eq!(payload.payload_type, PayloadType::Partial);
        assert_eq!(payload.updates.len(), 1);
    }

    #[test]
    fn reset_returns_to_inactive() {
        let fresh = vec![];
        let mid_full = vec![intent("xfer-full", "p1", 1)];
        let mid_changes = vec![
            intent("xfer-changes", "p1", 1),
            put("flag", "f1", 1, json!({})),
        ];

        for setup in [fresh, mid_full, mid_changes] {
            let mut handler = handler();
            for event in &setup {
                handler.process_event(event);
            }

            handler.reset();
            assert_eq!(handler.state(), ProtocolState::Inactive);
            assert!(handler.pending_updates().is_empty());
            assert!(matches!(
                handler.process_event(&transferred("s", 1)),
                ProtocolAction::Error {
                    kind: ProtocolErrorKind::ProtocolError,
                    ..
                }
            ));
        }
    }
}
