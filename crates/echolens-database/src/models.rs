//! Database models for `EchoLens`

use chrono::{DateTime, Utc};
use echolens_core::types::CompletedCall;
use echolens_core::{Call, CallStatus, Error, Result, Sentiment, Topic};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Database row for a call
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CallDb {
    /// Unique identifier
    pub id: Uuid,

    /// Lifecycle status, stored as text
    pub status: String,

    /// Blob store key of the recording
    pub audio_key: String,

    /// Duration in seconds
    pub duration_sec: Option<f64>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl CallDb {
    /// Convert to the domain type, validating the stored status
    ///
    /// # Errors
    ///
    /// Returns a validation error if the stored status text is not a known
    /// lifecycle state.
    pub fn into_call(self) -> Result<Call> {
        Ok(Call {
            id: self.id,
            status: CallStatus::from_str(&self.status)?,
            audio_key: self.audio_key,
            duration_sec: self.duration_sec,
            created_at: self.created_at,
        })
    }
}

/// Database row for a transcript
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TranscriptDb {
    /// Parent call id (1:1)
    pub call_id: Uuid,

    /// Transcribed text
    pub text: String,

    /// Model that produced the transcript
    pub model: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Database row for an analysis
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisDb {
    /// Parent call id (1:1)
    pub call_id: Uuid,

    /// Sentiment, stored as text
    pub sentiment: String,

    /// Topic, stored as text
    pub topic: String,

    /// Whether the problem was resolved
    pub problem_resolved: bool,

    /// Summary text
    pub summary: String,

    /// Model confidence
    pub confidence: Option<f64>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Joined analysis + call row used by the analytics engine
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompletedCallDb {
    /// Parent call id
    pub call_id: Uuid,

    /// Topic, stored as text
    pub topic: String,

    /// Sentiment, stored as text
    pub sentiment: String,

    /// Whether the problem was resolved
    pub problem_resolved: bool,

    /// Model confidence
    pub confidence: Option<f64>,

    /// When the parent call was created
    pub created_at: DateTime<Utc>,
}

impl CompletedCallDb {
    /// Convert to the typed analytics row
    ///
    /// # Errors
    ///
    /// Returns a validation error if stored topic or sentiment text is not a
    /// known enum value.
    pub fn into_completed(self) -> Result<CompletedCall> {
        Ok(CompletedCall {
            call_id: self.call_id,
            topic: Topic::from_str(&self.topic)?,
            sentiment: Sentiment::from_str(&self.sentiment)?,
            problem_resolved: self.problem_resolved,
            confidence: self.confidence,
            created_at: self.created_at,
        })
    }
}

impl TryFrom<CompletedCallDb> for CompletedCall {
    type Error = Error;

    fn try_from(row: CompletedCallDb) -> Result<Self> {
        row.into_completed()
    }
}
