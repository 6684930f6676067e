//! Error types for provider clients

use serde::Deserialize;
use thiserror::Error;

/// Result type alias for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur when calling transcription or analysis providers
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Provider rejected the audio container for this model
    #[error("Model {model} does not support the submitted audio format")]
    UnsupportedFormat {
        /// Model that rejected the upload
        model: String,
    },

    /// Provider returned an API-level error
    #[error("Provider returned {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Machine-readable error code, when the provider sent one
        code: Option<String>,
        /// Human-readable message
        message: String,
    },

    /// Transcription succeeded but produced no text
    #[error("Transcription produced an empty transcript")]
    EmptyTranscript,

    /// Response body could not be turned into the expected structure
    #[error("Invalid provider response: {reason}")]
    InvalidResponse {
        /// What went wrong
        reason: String,
    },

    /// Analysis retries exhausted without a valid result
    #[error("Analysis failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        /// Total attempts made
        attempts: u32,
        /// Last failure
        reason: String,
    },

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire shape of an OpenAI-style error response body
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    code: Option<String>,
}

impl ProviderError {
    /// Create an invalid response error
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Classify a non-success provider response body
    ///
    /// Parses the structured error envelope and keys off the machine-readable
    /// `code` field. A code of `unsupported_format` becomes
    /// [`Self::UnsupportedFormat`] so callers can switch models; anything else
    /// is surfaced as an API error with the code preserved.
    #[must_use]
    pub fn from_api_response(status: u16, body: &str, model: &str) -> Self {
        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(parsed) => {
                if parsed.error.code.as_deref() == Some("unsupported_format") {
                    Self::UnsupportedFormat {
                        model: model.to_string(),
                    }
                } else {
                    Self::Api {
                        status,
                        code: parsed.error.code,
                        message: parsed.error.message,
                    }
                }
            }
            Err(_) => Self::Api {
                status,
                code: None,
                message: body.chars().take(200).collect(),
            },
        }
    }

    /// Check if error is retryable against the same model
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Api { status: 429 | 500..=599, .. } | Self::InvalidResponse { .. }
        )
    }
}

impl From<ProviderError> for echolens_core::Error {
    fn from(err: ProviderError) -> Self {
        match &err {
            ProviderError::UnsupportedFormat { .. } | ProviderError::EmptyTranscript => {
                Self::Transcription(err.to_string())
            }
            ProviderError::InvalidResponse { .. } | ProviderError::RetriesExhausted { .. } => {
                Self::AnalysisFormat(err.to_string())
            }
            _ => Self::Analysis(err.to_string()),
        }
    }
}
