//! Core data types for `EchoLens`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Maximum length of an analysis summary, in characters
pub const MAX_SUMMARY_CHARS: usize = 240;

/// Processing lifecycle of a call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    /// Created, waiting for a worker
    Pending,
    /// A worker claimed the call and is running the pipeline
    Processing,
    /// Transcript and analysis are persisted
    Done,
    /// The attempt failed after the call was loaded
    Failed,
}

impl Default for CallStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Processing => write!(f, "PROCESSING"),
            Self::Done => write!(f, "DONE"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for CallStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            other => Err(crate::Error::Validation {
                field: "status".to_string(),
                message: format!("unknown call status: {other}"),
            }),
        }
    }
}

/// Customer sentiment extracted from a transcript
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    /// Customer left satisfied
    Positive,
    /// No strong emotion either way
    Neutral,
    /// Customer was dissatisfied
    Negative,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Neutral => write!(f, "neutral"),
            Self::Negative => write!(f, "negative"),
        }
    }
}

impl std::str::FromStr for Sentiment {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            other => Err(crate::Error::Validation {
                field: "sentiment".to_string(),
                message: format!("unknown sentiment: {other}"),
            }),
        }
    }
}

/// Primary issue category of a call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Charges, refunds, invoices
    BillingIssue,
    /// Product or service malfunctions
    TechSupport,
    /// Account or subscription cancellation
    Cancellation,
    /// Delivery and shipment issues
    Shipping,
    /// Anything else
    Other,
}

impl Topic {
    /// Canonical snake_case name, as stored in the database
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BillingIssue => "billing_issue",
            Self::TechSupport => "tech_support",
            Self::Cancellation => "cancellation",
            Self::Shipping => "shipping",
            Self::Other => "other",
        }
    }

    /// Human-readable label for narrative summaries ("Billing Issue")
    #[must_use]
    pub fn display_name(&self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().collect::<String>() + chars.as_str()
                })
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Topic {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "billing_issue" => Ok(Self::BillingIssue),
            "tech_support" => Ok(Self::TechSupport),
            "cancellation" => Ok(Self::Cancellation),
            "shipping" => Ok(Self::Shipping),
            "other" => Ok(Self::Other),
            other => Err(crate::Error::Validation {
                field: "topic".to_string(),
                message: format!("unknown topic: {other}"),
            }),
        }
    }
}

/// One audio recording and its processing lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    /// Unique identifier for the call
    pub id: Uuid,

    /// Current pipeline status
    pub status: CallStatus,

    /// Key of the audio object in the blob store
    pub audio_key: String,

    /// Duration of audio in seconds, when known
    pub duration_sec: Option<f64>,

    /// When the call was created in our system
    pub created_at: DateTime<Utc>,
}

impl Call {
    /// Create a new pending call for an uploaded audio object
    #[must_use]
    pub fn new(audio_key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: CallStatus::Pending,
            audio_key: audio_key.into(),
            duration_sec: None,
            created_at: Utc::now(),
        }
    }
}

/// Analysis joined to its parent call, restricted to DONE calls
///
/// This is the only shape the analytics engine reads: everything it computes
/// derives from these rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletedCall {
    /// Parent call id
    pub call_id: Uuid,

    /// Issue category from the analysis
    pub topic: Topic,

    /// Customer sentiment from the analysis
    pub sentiment: Sentiment,

    /// Whether the problem was resolved
    pub problem_resolved: bool,

    /// Model confidence, when reported
    pub confidence: Option<f64>,

    /// When the parent call was created
    pub created_at: DateTime<Utc>,
}

/// Structured insight extracted from one transcript
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct AnalysisOutcome {
    /// Overall customer emotion
    #[serde(rename = "customer_sentiment")]
    pub sentiment: Sentiment,

    /// Primary issue category
    pub topic: Topic,

    /// Was the customer's problem solved in this call?
    pub problem_resolved: bool,

    /// Concise summary of the call
    #[validate(length(max = 240))]
    pub summary: String,

    /// Model confidence in this analysis
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: Option<f64>,
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn test_call_status_roundtrip() {
        for status in [
            CallStatus::Pending,
            CallStatus::Processing,
            CallStatus::Done,
            CallStatus::Failed,
        ] {
            let text = status.to_string();
            assert_eq!(CallStatus::from_str(&text).unwrap(), status);
        }
    }

    #[test]
    fn test_call_status_unknown() {
        assert!(CallStatus::from_str("RUNNING").is_err());
    }

    #[test]
    fn test_sentiment_parse() {
        assert_eq!(Sentiment::from_str("negative").unwrap(), Sentiment::Negative);
        assert!(Sentiment::from_str("angry").is_err());
    }

    #[test]
    fn test_topic_parse_and_display() {
        let topic = Topic::from_str("billing_issue").unwrap();
        assert_eq!(topic, Topic::BillingIssue);
        assert_eq!(topic.to_string(), "billing_issue");
        assert_eq!(topic.display_name(), "Billing Issue");
        assert_eq!(Topic::TechSupport.display_name(), "Tech Support");
    }

    #[test]
    fn test_topic_sorts_alphabetically_by_name() {
        let mut topics = vec![Topic::TechSupport, Topic::Other, Topic::BillingIssue];
        topics.sort_by_key(Topic::as_str);
        assert_eq!(
            topics,
            vec![Topic::BillingIssue, Topic::Other, Topic::TechSupport]
        );
    }

    #[test]
    fn test_new_call_is_pending() {
        let call = Call::new("uploads/abc.wav");
        assert_eq!(call.status, CallStatus::Pending);
        assert_eq!(call.audio_key, "uploads/abc.wav");
        assert!(call.duration_sec.is_none());
    }

    #[test]
    fn test_analysis_outcome_validation() {
        let outcome = AnalysisOutcome {
            sentiment: Sentiment::Neutral,
            topic: Topic::Shipping,
            problem_resolved: true,
            summary: "Package delayed, reshipped with tracking.".to_string(),
            confidence: Some(0.92),
        };
        assert!(outcome.validate().is_ok());

        let too_long = AnalysisOutcome {
            summary: "x".repeat(241),
            ..outcome.clone()
        };
        assert!(too_long.validate().is_err());

        let out_of_range = AnalysisOutcome {
            confidence: Some(1.5),
            ..outcome
        };
        assert!(out_of_range.validate().is_err());
    }

    #[test]
    fn test_analysis_outcome_deserializes_provider_field_names() {
        let json = r#"{
            "customer_sentiment": "negative",
            "topic": "tech_support",
            "problem_resolved": false,
            "summary": "Router keeps rebooting, escalated to tier 2.",
            "confidence": 0.8
        }"#;

        let outcome: AnalysisOutcome = serde_json::from_str(json).unwrap();
        assert_eq!(outcome.sentiment, Sentiment::Negative);
        assert_eq!(outcome.topic, Topic::TechSupport);
        assert!(!outcome.problem_resolved);
    }

    #[test]
    fn test_analysis_outcome_rejects_unknown_enum_values() {
        let json = r#"{
            "customer_sentiment": "furious",
            "topic": "tech_support",
            "problem_resolved": false,
            "summary": "s",
            "confidence": 0.8
        }"#;

        assert!(serde_json::from_str::<AnalysisOutcome>(json).is_err());
    }
}
