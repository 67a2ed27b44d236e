//! Error types for decoding protocol events.

use thiserror::Error;

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors that can occur while turning raw event text into a structured event.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The raw event carried no data.
    #[error("event '{event}' is missing data")]
    MissingData {
        /// Wire name of the event.
        event: String,
    },

    /// The event data is not valid JSON.
    #[error("malformed JSON data: {0}")]
    Json(#[from] serde_json::Error),

    /// The event data is JSON but does not fit the event's shape.
    #[error("invalid data for event '{event}': {source}")]
    Shape {
        /// Wire name of the event.
        event: String,
        /// Underlying deserialization failure.
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Creates a missing-data error for the named event.
    pub fn missing_data(event: impl Into<String>) -> Self {
        Self::MissingData {
            event: event.into(),
        }
    }

    /// Returns true if the data was present but could not be understood.
    pub fn is_invalid_data(&self) -> bool {
        matches!(self, DecodeError::Json(_) | DecodeError::Shape { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_is_not_invalid_data() {
        let err = DecodeError::missing_data("put-object");
        assert!(!err.is_invalid_data());
        assert_eq!(err.to_string(), "event 'put-object' is missing data");
    }

    #[test]
    fn json_error_is_invalid_data() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = DecodeError::from(source);
        assert!(err.is_invalid_data());
        assert!(err.to_string().starts_with("malformed JSON data"));
    }
}
