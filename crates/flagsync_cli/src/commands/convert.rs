//! Convert command implementation.

use flagsync_engine::{
    Fdv1Payload, Fdv1PayloadAdaptor, ObjectProcessors, Payload, PayloadProcessor,
};
use flagsync_protocol::ProtocolEvent;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A synthetic event in printable form.
#[derive(Debug, Serialize)]
pub struct EventInfo {
    /// Event name.
    pub event: String,
    /// Event data.
    pub data: Value,
}

/// Produces the synthetic event sequence for an FDv1 document.
pub fn to_events(
    data: &Fdv1Payload,
    selector: Option<&str>,
) -> Result<Vec<EventInfo>, Box<dyn std::error::Error>> {
    adaptor(selector)
        .to_events(data)
        .iter()
        .map(|event: &ProtocolEvent| -> Result<EventInfo, Box<dyn std::error::Error>> {
            Ok(EventInfo {
                event: event.name().to_string(),
                data: event.data_to_value()?,
            })
        })
        .collect()
}

/// Runs an FDv1 document through the FDv2 pipeline and returns the payloads.
pub fn to_payloads(data: &Fdv1Payload, selector: Option<&str>) -> Vec<Payload> {
    let kinds = ["flag", "segment"];
    let mut processor = PayloadProcessor::new(ObjectProcessors::passthrough(kinds), None);
    let payloads = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&payloads);
    processor.add_payload_listener(move |payload: &Payload| sink.lock().push(payload.clone()));

    adaptor(selector).process_full_transfer(data, &mut processor);

    let payloads = std::mem::take(&mut *payloads.lock());
    payloads
}

fn adaptor(selector: Option<&str>) -> Fdv1PayloadAdaptor {
    match selector {
        Some(selector) => Fdv1PayloadAdaptor::new().use_selector(selector),
        None => Fdv1PayloadAdaptor::new(),
    }
}

/// Runs the convert command.
pub fn run(
    path: &Path,
    selector: Option<&str>,
    events: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Converting FDv1 document {:?}", path);
    let text = std::fs::read_to_string(path)?;
    let data = Fdv1Payload::from_json(&text)?;

    if events {
        println!("{}", serde_json::to_string_pretty(&to_events(&data, selector)?)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&to_payloads(&data, selector))?);
    }

    Ok(())
}
