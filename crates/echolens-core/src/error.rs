//! Error types for `EchoLens`

use std::{error::Error as StdError, fmt};

/// Main error type for `EchoLens`
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Configuration error
    Configuration {
        /// Error message
        message: String,
    },

    /// Validation error
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// Database error
    Database(String),

    /// Not found error
    NotFound {
        /// Resource that was not found
        resource: String,
    },

    /// Downloaded payload was not usable audio
    InvalidAudio {
        /// Why the payload was rejected
        reason: String,
    },

    /// Blob store failure (missing object, access denied, transport)
    Storage(String),

    /// Transcription provider failure, terminal for the attempt
    Transcription(String),

    /// Analysis provider failure, terminal for the attempt
    Analysis(String),

    /// Analysis response could not be parsed or validated
    AnalysisFormat(String),

    /// Record store write failure
    Persistence(String),

    /// Serialization error
    Serialization(serde_json::Error),

    /// Other error
    Other(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Configuration { message } => write!(f, "Configuration error: {message}"),
            Self::Validation { field, message } => {
                write!(f, "Validation error: {field} - {message}")
            }
            Self::Database(msg) => write!(f, "Database error: {msg}"),
            Self::NotFound { resource } => write!(f, "Resource not found: {resource}"),
            Self::InvalidAudio { reason } => write!(f, "Invalid audio payload: {reason}"),
            Self::Storage(msg) => write!(f, "Storage error: {msg}"),
            Self::Transcription(msg) => write!(f, "Transcription error: {msg}"),
            Self::Analysis(msg) => write!(f, "Analysis error: {msg}"),
            Self::AnalysisFormat(msg) => write!(f, "Analysis format error: {msg}"),
            Self::Persistence(msg) => write!(f, "Persistence error: {msg}"),
            Self::Serialization(err) => write!(f, "Serialization error: {err}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// From implementations for automatic conversions
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err)
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::uninlined_format_args)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::error::Error as StdError;
    use std::io;

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let app_error = Error::from(io_error);

        match app_error {
            Error::Io(_) => {}
            _ => panic!("Expected Io error variant"),
        }

        assert!(format!("{}", app_error).contains("I/O error"));
    }

    #[test]
    fn test_configuration_error() {
        let error = Error::Configuration {
            message: "Invalid database URL".to_string(),
        };

        assert_eq!(
            format!("{}", error),
            "Configuration error: Invalid database URL"
        );
    }

    #[test]
    fn test_not_found_error() {
        let error = Error::NotFound {
            resource: "Call 123".to_string(),
        };

        assert_eq!(format!("{}", error), "Resource not found: Call 123");
    }

    #[test]
    fn test_invalid_audio_error() {
        let error = Error::InvalidAudio {
            reason: "payload is HTML, not audio".to_string(),
        };

        assert_eq!(
            format!("{}", error),
            "Invalid audio payload: payload is HTML, not audio"
        );
    }

    #[test]
    fn test_pipeline_error_variants() {
        let cases = vec![
            (
                Error::Storage("object missing".to_string()),
                "Storage error: object missing",
            ),
            (
                Error::Transcription("provider returned 500".to_string()),
                "Transcription error: provider returned 500",
            ),
            (
                Error::Analysis("timeout".to_string()),
                "Analysis error: timeout",
            ),
            (
                Error::AnalysisFormat("summary too long".to_string()),
                "Analysis format error: summary too long",
            ),
            (
                Error::Persistence("upsert failed".to_string()),
                "Persistence error: upsert failed",
            ),
            (
                Error::Database("connection refused".to_string()),
                "Database error: connection refused",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(format!("{}", error), expected);
        }
    }

    #[test]
    fn test_validation_error() {
        let error = Error::Validation {
            field: "summary".to_string(),
            message: "exceeds 240 characters".to_string(),
        };

        assert_eq!(
            format!("{}", error),
            "Validation error: summary - exceeds 240 characters"
        );
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_str = r#"{"invalid": json}"#;
        let json_error = serde_json::from_str::<serde_json::Value>(json_str).unwrap_err();
        let app_error = Error::from(json_error);

        match app_error {
            Error::Serialization(_) => {}
            _ => panic!("Expected Serialization error variant"),
        }

        assert!(app_error.source().is_some());
    }

    #[test]
    fn test_error_source_for_plain_variants() {
        let error = Error::Database("test".to_string());
        assert!(error.source().is_none());

        let error = Error::Storage("test".to_string());
        assert!(error.source().is_none());
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<String> {
            Ok("success".to_string())
        }

        fn returns_error() -> Result<String> {
            Err(Error::Other("test error".to_string()))
        }

        assert!(returns_result().is_ok());
        assert!(returns_error().is_err());
    }
}
