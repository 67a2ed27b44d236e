//! In-memory store that applies payloads.

use flagsync_protocol::{Payload, PayloadType, Update};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// A stored object version, or a tombstone left by a deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    /// Version of the object or deletion.
    pub version: u64,
    /// The object; `None` for a tombstone.
    pub object: Option<Value>,
}

impl StoredItem {
    /// Returns true if this item records a deletion.
    pub fn is_deleted(&self) -> bool {
        self.object.is_none()
    }
}

impl From<&Update> for StoredItem {
    fn from(update: &Update) -> Self {
        Self {
            version: update.version,
            object: if update.deleted {
                None
            } else {
                update.object.clone()
            },
        }
    }
}

/// An in-memory store for payloads.
///
/// - `full` payloads replace the whole data set
/// - `partial` payloads upsert or delete objects whose version is newer
///   than the stored one
/// - `none` payloads change nothing
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    kinds: BTreeMap<String, BTreeMap<String, StoredItem>>,
    selector: Option<String>,
    initialized: bool,
}

impl MemoryStore {
    /// Creates an empty, uninitialized store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a payload. Returns the number of items that changed.
    pub fn apply(&mut self, payload: &Payload) -> usize {
        let changed = match payload.payload_type {
            PayloadType::Full => {
                self.kinds.clear();
                for update in &payload.updates {
                    self.kinds
                        .entry(update.kind.clone())
                        .or_default()
                        .insert(update.key.clone(), StoredItem::from(update));
                }
                self.initialized = true;
                payload.updates.len()
            }
            PayloadType::Partial => payload
                .updates
                .iter()
                .filter(|update| self.upsert(update))
                .count(),
            PayloadType::None => 0,
        };

        if payload.state.is_some() {
            self.selector = payload.state.clone();
        }
        debug!(
            payload_id = %payload.id,
            payload_type = ?payload.payload_type,
            changed,
            "Applied payload"
        );
        changed
    }

    fn upsert(&mut self, update: &Update) -> bool {
        let items = self.kinds.entry(update.kind.clone()).or_default();
        match items.get(&update.key) {
            Some(existing) if existing.version >= update.version => false,
            _ => {
                items.insert(update.key.clone(), StoredItem::from(update));
                true
            }
        }
    }

    /// Gets a live object.
    pub fn get(&self, kind: &str, key: &str) -> Option<&Value> {
        self.item(kind, key)?.object.as_ref()
    }

    /// Gets a stored item, including tombstones.
    pub fn item(&self, kind: &str, key: &str) -> Option<&StoredItem> {
        self.kinds.get(kind)?.get(key)
    }

    /// Returns the live objects of a kind, ordered by key.
    pub fn all(&self, kind: &str) -> Vec<(&str, &Value)> {
        self.kinds
            .get(kind)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|(key, item)| Some((key.as_str(), item.object.as_ref()?)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of live objects across all kinds.
    pub fn len(&self) -> usize {
        self.kinds
            .values()
            .flat_map(|items| items.values())
            .filter(|item| !item.is_deleted())
            .count()
    }

    /// Returns true if no live objects are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the selector of the last payload that carried one.
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    /// Returns true once a full payload has been applied.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Renders the live objects as `{kind: {key: object}}`.
    pub fn to_json(&self) -> Value {
        let kinds: Map<String, Value> = self
            .kinds
            .keys()
            .map(|kind| {
                let items: Map<String, Value> = self
                    .all(kind)
                    .into_iter()
                    .map(|(key, object)| (key.to_string(), object.clone()))
                    .collect();
                (kind.clone(), Value::Object(items))
            })
            .collect();
        Value::Object(kinds)
    }
}
