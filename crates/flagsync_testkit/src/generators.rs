//! Property-based test generators using proptest.
//!
//! Provides strategies for generating protocol data that maintains the
//! invariants the state machine expects.

use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Strategy for generating object keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,15}").expect("Invalid regex")
}

/// Strategy for generating flag-like objects, with or without a version field.
pub fn object_strategy() -> impl Strategy<Value = Value> {
    (any::<bool>(), prop::option::of(1u64..1_000)).prop_map(|(on, version)| {
        let mut object = json!({ "on": on });
        if let (Some(version), Some(map)) = (version, object.as_object_mut()) {
            map.insert("version".into(), json!(version));
        }
        object
    })
}

/// Strategy for generating a keyed object map.
pub fn object_map_strategy(max_len: usize) -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(key_strategy(), object_strategy(), 0..max_len)
        .prop_map(|objects| objects.into_iter().collect())
}

/// Strategy for generating FDv1 `{flags, segments}` documents.
pub fn fdv1_document_strategy() -> impl Strategy<Value = Value> {
    (object_map_strategy(16), object_map_strategy(8)).prop_map(|(flags, segments)| {
        json!({ "flags": Value::Object(flags), "segments": Value::Object(segments) })
    })
}

/// Strategy for generating selector strings, including the empty selector.
pub fn selector_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        prop::string::string_regex(r"\(p:[a-z0-9]{1,8}:[0-9]{1,4}\)").expect("Invalid regex"),
    ]
}
