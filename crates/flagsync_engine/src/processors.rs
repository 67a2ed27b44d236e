//! Per-kind object processors.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Sanitizes or validates a raw object of one kind.
///
/// Returning `None` rejects the object; the event carrying it is ignored.
pub trait ObjectProcessor: Send + Sync {
    /// Processes a raw object.
    fn process(&self, object: &Value) -> Option<Value>;
}

impl<F> ObjectProcessor for F
where
    F: Fn(&Value) -> Option<Value> + Send + Sync,
{
    fn process(&self, object: &Value) -> Option<Value> {
        self(object)
    }
}

/// A table of object processors keyed by object kind.
///
/// The table is opaque to the state machine: it does not know which kinds
/// exist, and objects of unregistered kinds are rejected.
#[derive(Clone, Default)]
pub struct ObjectProcessors {
    table: HashMap<String, Arc<dyn ObjectProcessor>>,
}

impl ObjectProcessors {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table that accepts the given kinds unchanged.
    pub fn passthrough<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        kinds.into_iter().fold(Self::new(), |table, kind| {
            table.with(kind, |object: &Value| Some(object.clone()))
        })
    }

    /// Registers a processor, replacing any previous one for the kind.
    pub fn with(mut self, kind: impl Into<String>, processor: impl ObjectProcessor + 'static) -> Self {
        self.insert(kind, processor);
        self
    }

    /// Registers a processor in place.
    pub fn insert(&mut self, kind: impl Into<String>, processor: impl ObjectProcessor + 'static) {
        self.table.insert(kind.into(), Arc::new(processor));
    }

    /// Returns true if a processor is registered for the kind.
    pub fn contains(&self, kind: &str) -> bool {
        self.table.contains_key(kind)
    }

    /// Runs the kind's processor over an object.
    pub fn process(&self, kind: &str, object: &Value) -> Option<Value> {
        self.table.get(kind)?.process(object)
    }
}

impl fmt::Debug for ObjectProcessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.table.keys().collect();
        kinds.sort();
        f.debug_struct("ObjectProcessors")
            .field("kinds", &kinds)
            .finish()
    }
}
