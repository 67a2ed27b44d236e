//! # flagsync Protocol
//!
//! FDv2 wire types and JSON decoding for flagsync.
//!
//! This crate provides:
//! - `EventKind` and `ProtocolEvent` for the named events of an FDv2 stream
//! - Event data shapes (`ServerIntentData`, `PutObject`, `DeleteObject`, ...)
//! - `Payload` and `Update`, the assembled output handed to a data store
//! - JSON decoding of raw event text into structured events
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
mod intent;
mod payload;

pub use error::{DecodeError, DecodeResult};
pub use event::{
    DeleteObject, EventKind, Goodbye, PayloadTransferred, ProtocolEvent, PutObject, ServerError,
};
pub use intent::{IntentCode, PayloadIntent, ServerIntentData};
pub use payload::{Payload, PayloadType, Update};
