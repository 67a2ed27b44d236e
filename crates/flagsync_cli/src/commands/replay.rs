//! Replay command implementation.

use crate::sse::TranscriptSource;
use flagsync_engine::{
    DataSourceError, ErrorHandler, MemoryStore, ObjectProcessors, Payload, PayloadStreamReader,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Result of replaying a transcript.
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    /// Frames delivered to the reader.
    pub frames: usize,
    /// Frames with event names the reader does not listen for.
    pub unhandled: usize,
    /// Payloads assembled, in order.
    pub payloads: Vec<Payload>,
    /// Errors reported by the reader.
    pub errors: Vec<String>,
    /// Protocol state after the last frame.
    pub state: String,
    /// Selector held by the store after the last payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Live objects in the store.
    pub store: Value,
}

/// Replays transcript text through a stream reader into a memory store.
pub fn replay(text: &str, kinds: &[String]) -> ReplayReport {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let error_sink = Arc::clone(&errors);
    let error_handler: ErrorHandler =
        Arc::new(move |err: DataSourceError| error_sink.lock().push(err.to_string()));

    let mut source = TranscriptSource::new(text);
    let reader = PayloadStreamReader::new(
        &mut source,
        ObjectProcessors::passthrough(kinds.iter().cloned()),
        Some(error_handler),
    );

    let payloads = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::new(Mutex::new(MemoryStore::new()));
    {
        let payloads = Arc::clone(&payloads);
        let store = Arc::clone(&store);
        reader.add_payload_listener(move |payload: &Payload| {
            store.lock().apply(payload);
            payloads.lock().push(payload.clone());
        });
    }

    let stats = source.play();
    let store = store.lock();
    let report = ReplayReport {
        frames: stats.delivered,
        unhandled: stats.unhandled,
        payloads: std::mem::take(&mut *payloads.lock()),
        errors: std::mem::take(&mut *errors.lock()),
        state: reader.state().to_string(),
        selector: store.selector().map(str::to_string),
        store: store.to_json(),
    };
    report
}

/// Runs the replay command.
pub fn run(path: &Path, kinds: &[String], format: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!("Replaying transcript {:?}", path);
    let text = std::fs::read_to_string(path)?;
    let report = replay(&text, kinds);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!("Frames delivered: {}", report.frames);
            if report.unhandled > 0 {
                println!("Frames ignored:   {}", report.unhandled);
            }
            for payload in &report.payloads {
                println!(
                    "Payload {} v{} ({:?}): {} update(s), state={:?}",
                    payload.id,
                    payload.version,
                    payload.payload_type,
                    payload.updates.len(),
                    payload.state
                );
            }
            for error in &report.errors {
                println!("Error: {}", error);
            }
            println!("Final state: {}", report.state);
            println!("Store: {}", report.store);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const TRANSCRIPT: &str = r#"event: server-intent
data: {"payloads":[{"intentCode":"xfer-full","id":"p1","target":2,"reason":"payload-missing"}]}

event: put-object
data: {"kind":"flag","key":"f1","version":2,"object":{"on":true}}

event: put-object
data: {"kind":"metric","key":"m1","version":2,"object":{}}

event: heart-beat
data: {}

event: payload-transferred
data: {"state":"(p:p1:2)","version":2}

event: put-object
data: {"kind":"flag","key":"f1","version":3,"object":{"on":false}}

event: payload-transferred
data: {"state":"(p:p1:3)","version":3}

event: put-object
data: not json

event: goodbye
data: {"reason":"shutting down"}

event: flag-patch
data: {}
"#;

    fn kinds() -> Vec<String> {
        vec!["flag".to_string(), "segment".to_string()]
    }

    #[test]
    fn replay_assembles_payloads_and_store() {
        let report = replay(TRANSCRIPT, &kinds());

        assert_eq!(report.frames, 9);
        assert_eq!(report.unhandled, 1);
        assert_eq!(report.payloads.len(), 2);
        assert_eq!(report.payloads[0].updates.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("INVALID_DATA"));
        assert_eq!(report.state, "changes");
        assert_eq!(report.selector.as_deref(), Some("(p:p1:3)"));
        assert_eq!(report.store, json!({"flag": {"f1": {"on": false}}}));
    }

    #[test]
    fn run_reads_transcript_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TRANSCRIPT.as_bytes()).unwrap();

        run(file.path(), &kinds(), "json").unwrap();
    }

    #[test]
    fn run_fails_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&dir.path().join("absent.sse"), &kinds(), "text").is_err());
    }
}
