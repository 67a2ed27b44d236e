//! # flagsync Testkit
//!
//! Test utilities for flagsync.
//!
//! This crate provides:
//! - Fixtures for building protocol events and raw wire text
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use flagsync_testkit::prelude::*;
//!
//! #[test]
//! fn full_transfer() {
//!     let events = full_transfer("p1", 3, vec![put_flag("f1", 1, json!({"on": true}))], "sel");
//!     // ... feed events to a processor
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
