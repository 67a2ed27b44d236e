//! Error types for the engine.

use flagsync_protocol::DecodeError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors returned by engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// `finish` was called on a change set that was never started.
    #[error("changeset: cannot complete without a server-intent")]
    ChangeSetNotStarted,

    /// Raw event data could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Category of a data source error reported to the error handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSourceErrorKind {
    /// The cause could not be classified.
    Unknown,
    /// The received data was malformed or violated the protocol.
    InvalidData,
}

impl fmt::Display for DataSourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceErrorKind::Unknown => f.write_str("UNKNOWN"),
            DataSourceErrorKind::InvalidData => f.write_str("INVALID_DATA"),
        }
    }
}

/// An error reported by a data source to its error handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct DataSourceError {
    /// Error category.
    pub kind: DataSourceErrorKind,
    /// Description of the failure.
    pub message: String,
}

impl DataSourceError {
    /// Creates a new data source error.
    pub fn new(kind: DataSourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates an invalid-data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::new(DataSourceErrorKind::InvalidData, message)
    }

    /// Creates an unknown error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(DataSourceErrorKind::Unknown, message)
    }
}

impl From<&DecodeError> for DataSourceError {
    fn from(err: &DecodeError) -> Self {
        if err.is_invalid_data() {
            Self::invalid_data(err.to_string())
        } else {
            Self::unknown(err.to_string())
        }
    }
}

/// Callback receiving errors from a processor or stream reader.
pub type ErrorHandler = Arc<dyn Fn(DataSourceError) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_source_error_display() {
        let err = DataSourceError::invalid_data("bad json");
        assert_eq!(err.to_string(), "INVALID_DATA: bad json");

        let err = DataSourceError::unknown("missing data");
        assert_eq!(err.to_string(), "UNKNOWN: missing data");
    }

    #[test]
    fn decode_errors_map_to_kinds() {
        let missing = DecodeError::missing_data("goodbye");
        assert_eq!(
            DataSourceError::from(&missing).kind,
            DataSourceErrorKind::Unknown
        );

        let json = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        let malformed = DecodeError::from(json);
        assert_eq!(
            DataSourceError::from(&malformed).kind,
            DataSourceErrorKind::InvalidData
        );
    }

    #[test]
    fn change_set_error_display() {
        assert_eq!(
            EngineError::ChangeSetNotStarted.to_string(),
            "changeset: cannot complete without a server-intent"
        );
    }
}
