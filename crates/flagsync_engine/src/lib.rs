//! # flagsync Engine
//!
//! FDv2 protocol state machine and payload assembly for flagsync.
//!
//! This crate provides:
//! - Protocol state machine (inactive → full/changes → changes)
//! - Payload processor that broadcasts completed payloads to listeners
//! - Stream reader that adapts named raw events from a transport
//! - Legacy adaptors that re-express FDv1 data as FDv2 event sequences
//! - An in-memory store that applies payloads
//!
//! ## Architecture
//!
//! Every data source funnels through one state machine:
//! 1. A transport delivers named events carrying JSON text
//! 2. The stream reader decodes them into [`ProtocolEvent`]s
//! 3. The state machine assembles them into [`Payload`]s
//! 4. The processor hands each payload to its listeners
//!
//! Polling and file sources skip steps 1-2 and feed the synthetic event
//! sequence produced by [`Fdv1PayloadAdaptor`] or [`ChangeSetBuilder`].
//!
//! ## Key Invariants
//!
//! - Only the first intent of a `server-intent` is honored
//! - Objects arriving before any intent are ignored
//! - A server `error` discards buffered updates but keeps the phase
//! - The state machine reports failures as data and never panics

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod legacy;
mod processor;
mod processors;
mod protocol;
mod reader;
mod store;

pub use config::{ChangeSetConfig, FallbackConfig};
pub use error::{DataSourceError, DataSourceErrorKind, EngineError, EngineResult, ErrorHandler};
pub use legacy::{ChangeSetBuilder, Fdv1Payload, Fdv1PayloadAdaptor};
pub use processor::{EventSink, ListenerId, PayloadListener, PayloadProcessor, ProcessorStats};
pub use processors::{ObjectProcessor, ObjectProcessors};
pub use protocol::{ProtocolAction, ProtocolErrorKind, ProtocolHandler, ProtocolState};
pub use reader::{EventHandler, EventSource, MockEventSource, PayloadStreamReader, RawEvent};
pub use store::{MemoryStore, StoredItem};

pub use flagsync_protocol::{Payload, PayloadType, ProtocolEvent, Update};
