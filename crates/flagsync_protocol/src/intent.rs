//! Server intents: what kind of transfer the server is about to send.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of transfer a server intent announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentCode {
    /// A full snapshot follows (`xfer-full`).
    TransferFull,
    /// An incremental change set follows (`xfer-changes`).
    TransferChanges,
    /// The client is already up to date (`none`).
    None,
}

impl IntentCode {
    /// Returns the wire representation of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentCode::TransferFull => "xfer-full",
            IntentCode::TransferChanges => "xfer-changes",
            IntentCode::None => "none",
        }
    }

    /// Parses a wire intent code. Returns `None` for codes this client does not know.
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "xfer-full" => Some(IntentCode::TransferFull),
            "xfer-changes" => Some(IntentCode::TransferChanges),
            "none" => Some(IntentCode::None),
            _ => None,
        }
    }
}

impl fmt::Display for IntentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single intent inside a `server-intent` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadIntent {
    /// Identifier of the payload the transfer will produce.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Version the payload will have once transferred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u64>,
    /// Raw intent code as sent by the server.
    #[serde(rename = "intentCode", skip_serializing_if = "Option::is_none")]
    pub intent_code: Option<String>,
    /// Human-readable reason for the intent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PayloadIntent {
    /// Creates a new payload intent.
    pub fn new(
        code: IntentCode,
        id: impl Into<String>,
        target: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            target: Some(target),
            intent_code: Some(code.as_str().to_string()),
            reason: Some(reason.into()),
        }
    }

    /// Returns the parsed intent code, if present and recognized.
    pub fn code(&self) -> Option<IntentCode> {
        self.intent_code.as_deref().and_then(IntentCode::parse)
    }
}

/// Data of a `server-intent` event.
///
/// Only the first intent is ever acted on; the list must be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerIntentData {
    /// Announced payload intents.
    pub payloads: Vec<PayloadIntent>,
}

impl ServerIntentData {
    /// Creates intent data with a single intent.
    pub fn single(intent: PayloadIntent) -> Self {
        Self {
            payloads: vec![intent],
        }
    }

    /// Returns the intent that governs the transfer.
    pub fn first(&self) -> Option<&PayloadIntent> {
        self.payloads.first()
    }
}
