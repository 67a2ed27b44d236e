//! Named protocol events and their data shapes.

use crate::error::{DecodeError, DecodeResult};
use crate::intent::ServerIntentData;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The kinds of events an FDv2 stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Announces the transfer that follows.
    ServerIntent,
    /// Adds or replaces an object.
    PutObject,
    /// Removes an object.
    DeleteObject,
    /// Completes the current transfer.
    PayloadTransferred,
    /// The server is about to close the connection.
    Goodbye,
    /// The server hit an application-level error.
    Error,
    /// Keeps the connection alive.
    HeartBeat,
}

impl EventKind {
    /// Every event kind, in wire order.
    pub const ALL: [EventKind; 7] = [
        EventKind::ServerIntent,
        EventKind::PutObject,
        EventKind::DeleteObject,
        EventKind::PayloadTransferred,
        EventKind::Goodbye,
        EventKind::Error,
        EventKind::HeartBeat,
    ];

    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ServerIntent => "server-intent",
            EventKind::PutObject => "put-object",
            EventKind::DeleteObject => "delete-object",
            EventKind::PayloadTransferred => "payload-transferred",
            EventKind::Goodbye => "goodbye",
            EventKind::Error => "error",
            EventKind::HeartBeat => "heart-beat",
        }
    }

    /// Looks up a kind by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data of a `put-object` event.
///
/// Every field is optional on the wire; the state machine drops events that
/// lack any of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PutObject {
    /// Object kind, e.g. `flag` or `segment`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Object key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Object version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// The object itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
}

impl PutObject {
    /// Creates a fully-populated put.
    pub fn new(kind: impl Into<String>, key: impl Into<String>, version: u64, object: Value) -> Self {
        Self {
            kind: Some(kind.into()),
            key: Some(key.into()),
            version: Some(version),
            object: Some(object),
        }
    }
}

/// Data of a `delete-object` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteObject {
    /// Object kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Object key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Version of the deletion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl DeleteObject {
    /// Creates a fully-populated delete.
    pub fn new(kind: impl Into<String>, key: impl Into<String>, version: u64) -> Self {
        Self {
            kind: Some(kind.into()),
            key: Some(key.into()),
            version: Some(version),
        }
    }
}

/// Data of a `payload-transferred` event.
///
/// An empty `state` is a valid selector; an absent one is not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadTransferred {
    /// Selector for resuming from this point.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Version of the completed payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Identifier of the completed payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl PayloadTransferred {
    /// Creates a transferred marker.
    pub fn new(state: impl Into<String>, version: u64) -> Self {
        Self {
            state: Some(state.into()),
            version: Some(version),
            id: None,
        }
    }

    /// Sets the payload id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Data of a `goodbye` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Goodbye {
    /// Why the server is closing the connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Data of an `error` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerError {
    /// Description of the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Payload the failure relates to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_id: Option<String>,
}

/// A structured protocol event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// `server-intent`
    ServerIntent(ServerIntentData),
    /// `put-object`
    PutObject(PutObject),
    /// `delete-object`
    DeleteObject(DeleteObject),
    /// `payload-transferred`
    PayloadTransferred(PayloadTransferred),
    /// `goodbye`
    Goodbye(Goodbye),
    /// `error`
    Error(ServerError),
    /// `heart-beat`
    HeartBeat,
    /// An event name outside the FDv2 set.
    Unknown {
        /// The wire name as received.
        name: String,
    },
}

impl ProtocolEvent {
    /// Returns the event kind, or `None` for unknown events.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            ProtocolEvent::ServerIntent(_) => Some(EventKind::ServerIntent),
            ProtocolEvent::PutObject(_) => Some(EventKind::PutObject),
            ProtocolEvent::DeleteObject(_) => Some(EventKind::DeleteObject),
            ProtocolEvent::PayloadTransferred(_) => Some(EventKind::PayloadTransferred),
            ProtocolEvent::Goodbye(_) => Some(EventKind::Goodbye),
            ProtocolEvent::Error(_) => Some(EventKind::Error),
            ProtocolEvent::HeartBeat => Some(EventKind::HeartBeat),
            ProtocolEvent::Unknown { .. } => None,
        }
    }

    /// Returns the wire name of the event.
    pub fn name(&self) -> &str {
        match self {
            ProtocolEvent::Unknown { name } => name,
            other => other.kind().map(|kind| kind.as_str()).unwrap_or_default(),
        }
    }

    /// Decodes an event from its wire name and JSON text.
    pub fn decode(name: &str, data: &str) -> DecodeResult<Self> {
        let value: Value = serde_json::from_str(data)?;
        Self::from_value(name, value)
    }

    /// Builds an event from its wire name and already-parsed JSON data.
    ///
    /// Names outside the FDv2 set become [`ProtocolEvent::Unknown`]; their
    /// data is not inspected.
    pub fn from_value(name: &str, data: Value) -> DecodeResult<Self> {
        let Some(kind) = EventKind::from_name(name) else {
            return Ok(ProtocolEvent::Unknown {
                name: name.to_string(),
            });
        };

        // `null` data reads as an empty object so the missing fields are
        // judged by the state machine rather than rejected here.
        let data = match data {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        let event = match kind {
            EventKind::ServerIntent => ProtocolEvent::ServerIntent(shaped(kind, data)?),
            EventKind::PutObject => ProtocolEvent::PutObject(shaped(kind, data)?),
            EventKind::DeleteObject => ProtocolEvent::DeleteObject(shaped(kind, data)?),
            EventKind::PayloadTransferred => {
                ProtocolEvent::PayloadTransferred(shaped(kind, data)?)
            }
            EventKind::Goodbye => ProtocolEvent::Goodbye(shaped(kind, data)?),
            EventKind::Error => ProtocolEvent::Error(shaped(kind, data)?),
            EventKind::HeartBeat => ProtocolEvent::HeartBeat,
        };
        Ok(event)
    }

    /// Encodes the event data as JSON.
    pub fn data_to_value(&self) -> serde_json::Result<Value> {
        match self {
            ProtocolEvent::ServerIntent(data) => serde_json::to_value(data),
            ProtocolEvent::PutObject(data) => serde_json::to_value(data),
            ProtocolEvent::DeleteObject(data) => serde_json::to_value(data),
            ProtocolEvent::PayloadTransferred(data) => serde_json::to_value(data),
            ProtocolEvent::Goodbye(data) => serde_json::to_value(data),
            ProtocolEvent::Error(data) => serde_json::to_value(data),
            ProtocolEvent::HeartBeat | ProtocolEvent::Unknown { .. } => {
                Ok(Value::Object(Map::new()))
            }
        }
    }
}

fn shaped<T: DeserializeOwned>(kind: EventKind, data: Value) -> DecodeResult<T> {
    serde_json::from_value(data).map_err(|source| DecodeError::Shape {
        event: kind.as_str().to_string(),
        source,
    })
}
