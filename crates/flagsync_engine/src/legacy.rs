//! Adaptors that re-express non-FDv2 data as FDv2 event sequences.
//!
//! Polling responses, bootstrap data and local files arrive as a complete
//! `{flags, segments}` map. Rather than giving them their own code path, they
//! are turned into the same `server-intent` → `put-object`* →
//! `payload-transferred` sequence a streaming connection would send, and fed
//! to a [`crate::PayloadProcessor`].

use crate::config::{ChangeSetConfig, FallbackConfig};
use crate::error::{EngineError, EngineResult};
use crate::processor::EventSink;
use flagsync_protocol::{
    DecodeError, DeleteObject, IntentCode, PayloadIntent, PayloadTransferred, ProtocolEvent,
    PutObject, ServerIntentData,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Object kind used for flags in FDv1 data.
pub const FLAG_KIND: &str = "flag";

/// Object kind used for segments in FDv1 data.
pub const SEGMENT_KIND: &str = "segment";

/// A complete FDv1 data set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fdv1Payload {
    /// Flags by key.
    pub flags: Map<String, Value>,
    /// Segments by key.
    pub segments: Map<String, Value>,
}

impl Fdv1Payload {
    /// Parses an FDv1 data set from JSON text.
    pub fn from_json(text: &str) -> EngineResult<Self> {
        serde_json::from_str(text).map_err(|err| EngineError::Decode(DecodeError::from(err)))
    }

    /// Returns the total number of objects.
    pub fn len(&self) -> usize {
        self.flags.len() + self.segments.len()
    }

    /// Returns true if the data set holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds a full FDv2 transfer out of FDv1 data.
#[derive(Debug, Clone, Default)]
pub struct Fdv1PayloadAdaptor {
    config: FallbackConfig,
}

impl Fdv1PayloadAdaptor {
    /// Creates an adaptor with the default fallback configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an adaptor with the given configuration.
    pub fn with_config(config: FallbackConfig) -> Self {
        Self { config }
    }

    /// Reports `selector` as the transferred state instead of the empty string.
    ///
    /// Only use this when the selector comes from a source that tracks a real
    /// server cursor.
    pub fn use_selector(mut self, selector: impl Into<String>) -> Self {
        self.config.selector = Some(selector.into());
        self
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// Produces the synthetic event sequence for a data set.
    ///
    /// Flags come before segments. Objects without a numeric `version`
    /// field are given version 1.
    pub fn to_events(&self, data: &Fdv1Payload) -> Vec<ProtocolEvent> {
        let objects = [(FLAG_KIND, &data.flags), (SEGMENT_KIND, &data.segments)]
            .into_iter()
            .flat_map(|(kind, objects)| {
                objects.iter().map(move |(key, object)| {
                    let version = object.get("version").and_then(Value::as_u64).unwrap_or(1);
                    ProtocolEvent::PutObject(PutObject::new(kind, key, version, object.clone()))
                })
            })
            .collect();

        assemble(
            &ChangeSetConfig::from(&self.config),
            IntentCode::TransferFull,
            objects,
        )
    }

    /// Feeds the synthetic transfer for a data set into a sink.
    pub fn process_full_transfer<S>(&self, data: &Fdv1Payload, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        sink.process_events(&self.to_events(data));
    }
}

/// Builds an FDv2 change set outside of any live transfer.
///
/// # Example
///
/// ```rust,ignore
/// let mut builder = ChangeSetBuilder::new();
/// builder.start(IntentCode::TransferFull);
/// builder.put_object(PutObject::new("flag", "f1", 1, json!({"on": true})));
/// processor.process_events(&builder.finish()?);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChangeSetBuilder {
    config: ChangeSetConfig,
    intent: Option<IntentCode>,
    events: Vec<ProtocolEvent>,
}

impl ChangeSetBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder with the given configuration.
    pub fn with_config(config: ChangeSetConfig) -> Self {
        Self {
            config,
            intent: None,
            events: Vec::new(),
        }
    }

    /// Starts a change set, discarding anything queued and not yet finished.
    pub fn start(&mut self, intent: IntentCode) -> &mut Self {
        self.intent = Some(intent);
        self.events.clear();
        self
    }

    /// Queues an object upsert.
    pub fn put_object(&mut self, object: PutObject) -> &mut Self {
        self.events.push(ProtocolEvent::PutObject(object));
        self
    }

    /// Queues an object deletion.
    pub fn delete_object(&mut self, object: DeleteObject) -> &mut Self {
        self.events.push(ProtocolEvent::DeleteObject(object));
        self
    }

    /// Returns true if `start` has been called.
    pub fn is_started(&self) -> bool {
        self.intent.is_some()
    }

    /// Returns the complete event sequence for the change set.
    pub fn finish(&self) -> EngineResult<Vec<ProtocolEvent>> {
        let intent = self.intent.ok_or(EngineError::ChangeSetNotStarted)?;
        Ok(assemble(&self.config, intent, self.events.clone()))
    }
}

fn assemble(
    config: &ChangeSetConfig,
    intent: IntentCode,
    objects: Vec<ProtocolEvent>,
) -> Vec<ProtocolEvent> {
    let mut events = Vec::with_capacity(objects.len() + 2);
    events.push(ProtocolEvent::ServerIntent(ServerIntentData::single(
        PayloadIntent::new(intent, &config.intent_id, config.target, &config.reason),
    )));
    events.extend(objects);
    events.push(ProtocolEvent::PayloadTransferred(
        PayloadTransferred::new(&config.selector, config.version).with_id(&config.intent_id),
    ));
    events
}
