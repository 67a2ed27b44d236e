//! Configuration for the legacy adaptors.

/// Intent id used when FDv1 data is replayed through the FDv2 pipeline.
pub const FDV1_FALLBACK_ID: &str = "FDv1Fallback";

/// Intent id used by change sets built outside of a live transfer.
pub const CHANGE_SET_ID: &str = "dummy-id";

/// Configuration for the synthetic transfer produced from FDv1 data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackConfig {
    /// Intent id for the synthetic transfer.
    pub intent_id: String,
    /// Target version announced by the intent.
    pub target: u64,
    /// Reason announced by the intent.
    pub reason: String,
    /// Version of the closing `payload-transferred`.
    pub version: u64,
    /// Selector for the closing `payload-transferred`.
    ///
    /// Left unset, the selector is empty so a later streaming connection does
    /// not try to resume from a cursor the server never issued.
    pub selector: Option<String>,
}

impl FallbackConfig {
    /// Creates the default fallback configuration.
    pub fn new() -> Self {
        Self {
            intent_id: FDV1_FALLBACK_ID.to_string(),
            target: 1,
            reason: "payload-missing".to_string(),
            version: 1,
            selector: None,
        }
    }

    /// Sets the intent id.
    pub fn with_intent_id(mut self, id: impl Into<String>) -> Self {
        self.intent_id = id.into();
        self
    }

    /// Sets the target and transferred version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.target = version;
        self.version = version;
        self
    }

    /// Sets the selector reported with the transfer.
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Returns the selector to report, empty unless overridden.
    pub fn selector(&self) -> &str {
        self.selector.as_deref().unwrap_or("")
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for change sets built by [`crate::ChangeSetBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetConfig {
    /// Intent id and payload id.
    pub intent_id: String,
    /// Target version announced by the intent.
    pub target: u64,
    /// Reason announced by the intent.
    pub reason: String,
    /// Version of the closing `payload-transferred`.
    pub version: u64,
    /// Selector of the closing `payload-transferred`.
    pub selector: String,
}

impl ChangeSetConfig {
    /// Creates the default change set configuration.
    pub fn new() -> Self {
        Self {
            intent_id: CHANGE_SET_ID.to_string(),
            target: 1,
            reason: "changeset".to_string(),
            version: 1,
            selector: String::new(),
        }
    }

    /// Sets the intent id.
    pub fn with_intent_id(mut self, id: impl Into<String>) -> Self {
        self.intent_id = id.into();
        self
    }

    /// Sets the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

impl Default for ChangeSetConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&FallbackConfig> for ChangeSetConfig {
    fn from(config: &FallbackConfig) -> Self {
        Self {
            intent_id: config.intent_id.clone(),
            target: config.target,
            reason: config.reason.clone(),
            version: config.version,
            selector: config.selector().to_string(),
        }
    }
}
