//! Error types for Tidemark operations

use thiserror::Error;

/// Session token wire decoding errors.
///
/// A decode error means the whole header is dropped; the store keeps whatever
/// it had cached for the collection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenDecodeError {
    #[error("Session token segment is empty")]
    Empty,

    #[error("Invalid number in session token segment '{segment}': {reason}")]
    InvalidNumber { segment: String, reason: String },

    #[error("Missing partition id in session token segment '{segment}'")]
    MissingPartitionId { segment: String },

    #[error("Malformed vector session token '{value}': {reason}")]
    MalformedVector { value: String, reason: String },

    #[error("Malformed region progress pair '{pair}'")]
    MalformedRegion { pair: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Tidemark errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TidemarkError {
    #[error("Decode error: {0}")]
    Decode(#[from] TokenDecodeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Tidemark operations.
pub type TidemarkResult<T> = Result<T, TidemarkError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display_invalid_number() {
        let err = TokenDecodeError::InvalidNumber {
            segment: "P1:abc".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid number"));
        assert!(msg.contains("P1:abc"));
    }

    #[test]
    fn test_decode_error_display_missing_partition() {
        let err = TokenDecodeError::MissingPartitionId {
            segment: ":5".to_string(),
        };
        assert!(format!("{}", err).contains("Missing partition id"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "host".to_string(),
            value: "".to_string(),
            reason: "must not be empty".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("host"));
        assert!(msg.contains("must not be empty"));
    }

    #[test]
    fn test_tidemark_error_from_decode() {
        let err = TidemarkError::from(TokenDecodeError::Empty);
        assert!(matches!(err, TidemarkError::Decode(TokenDecodeError::Empty)));
        assert!(format!("{}", err).starts_with("Decode error"));
    }

    #[test]
    fn test_tidemark_error_from_config() {
        let err = TidemarkError::from(ConfigError::MissingRequired {
            field: "host".to_string(),
        });
        assert!(matches!(err, TidemarkError::Config(_)));
    }
}
