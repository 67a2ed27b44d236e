//! Assembled payloads and the updates they carry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a payload should be applied by a data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadType {
    /// Replace the whole data set.
    Full,
    /// Upsert and delete individual objects.
    Partial,
    /// Nothing changed.
    None,
}

/// A processed change to a single object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Object kind.
    pub kind: String,
    /// Object key.
    pub key: String,
    /// Object version.
    pub version: u64,
    /// The processed object; absent for deletions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
    /// Whether the object was deleted.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl Update {
    /// Creates an upsert.
    pub fn put(kind: impl Into<String>, key: impl Into<String>, version: u64, object: Value) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
            version,
            object: Some(object),
            deleted: false,
        }
    }

    /// Creates a deletion.
    pub fn delete(kind: impl Into<String>, key: impl Into<String>, version: u64) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
            version,
            object: None,
            deleted: true,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A completed transfer, ready for a data store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Payload identifier from the server intent.
    pub id: String,
    /// Payload version.
    pub version: u64,
    /// Selector to resume from; absent for `none` payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// How to apply the payload.
    #[serde(rename = "type")]
    pub payload_type: PayloadType,
    /// Updates in arrival order.
    pub updates: Vec<Update>,
}

impl Payload {
    /// Creates an acknowledgement that nothing changed.
    pub fn none(id: impl Into<String>, version: u64) -> Self {
        Self {
            id: id.into(),
            version,
            state: None,
            payload_type: PayloadType::None,
            updates: Vec::new(),
        }
    }

    /// Returns true if this payload replaces the whole data set.
    pub fn is_basis(&self) -> bool {
        self.payload_type == PayloadType::Full
    }
}
