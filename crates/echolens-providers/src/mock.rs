//! Mock provider implementations for testing

use crate::analyze::CallAnalyzer;
use crate::error::{ProviderError, ProviderResult};
use crate::summarize::SummaryModel;
use crate::transcribe::{SpeechToText, Transcript};
use async_trait::async_trait;
use echolens_core::{AnalysisOutcome, Sentiment, Topic};
use parking_lot::Mutex;

/// Scripted speech-to-text mock
///
/// Returns a fixed transcript, optionally failing the first N calls. Tracks
/// call counts so tests can assert on retry behavior.
#[derive(Debug)]
pub struct MockTranscriber {
    text: String,
    fail_first: Mutex<u32>,
    calls: Mutex<u32>,
}

impl MockTranscriber {
    /// Create a mock that always succeeds with the given text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fail_first: Mutex::new(0),
            calls: Mutex::new(0),
        }
    }

    /// Fail the first `n` calls with an empty transcript error
    #[must_use]
    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = Mutex::new(n);
        self
    }

    /// Number of transcribe calls made so far
    pub fn call_count(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl SpeechToText for MockTranscriber {
    async fn transcribe(&self, _audio: &[u8], _key: &str) -> ProviderResult<Transcript> {
        *self.calls.lock() += 1;

        let mut remaining = self.fail_first.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(ProviderError::EmptyTranscript);
        }

        Ok(Transcript {
            text: self.text.clone(),
            model: "mock-transcriber".to_string(),
        })
    }
}

/// Scripted analysis mock
#[derive(Debug)]
pub struct MockAnalyzer {
    outcome: AnalysisOutcome,
    fail_always: bool,
    calls: Mutex<u32>,
}

impl MockAnalyzer {
    /// Create a mock that returns the given outcome
    #[must_use]
    pub fn new(outcome: AnalysisOutcome) -> Self {
        Self {
            outcome,
            fail_always: false,
            calls: Mutex::new(0),
        }
    }

    /// Create a mock with a plausible default outcome
    #[must_use]
    pub fn resolved_billing() -> Self {
        Self::new(AnalysisOutcome {
            sentiment: Sentiment::Neutral,
            topic: Topic::BillingIssue,
            problem_resolved: true,
            summary: "Customer asked about a charge and it was explained.".to_string(),
            confidence: Some(0.9),
        })
    }

    /// Create a mock that always fails
    #[must_use]
    pub fn always_failing() -> Self {
        Self {
            outcome: AnalysisOutcome {
                sentiment: Sentiment::Neutral,
                topic: Topic::Other,
                problem_resolved: false,
                summary: String::new(),
                confidence: None,
            },
            fail_always: true,
            calls: Mutex::new(0),
        }
    }

    /// Number of analyze calls made so far
    pub fn call_count(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl CallAnalyzer for MockAnalyzer {
    async fn analyze(&self, _transcript: &str) -> ProviderResult<AnalysisOutcome> {
        *self.calls.lock() += 1;

        if self.fail_always {
            return Err(ProviderError::RetriesExhausted {
                attempts: 3,
                reason: "mock failure".to_string(),
            });
        }

        Ok(self.outcome.clone())
    }
}

/// Scripted summary mock
#[derive(Debug)]
pub struct MockSummarizer {
    narrative: Option<String>,
}

impl MockSummarizer {
    /// Create a mock that returns the given narrative
    pub fn new(narrative: impl Into<String>) -> Self {
        Self {
            narrative: Some(narrative.into()),
        }
    }

    /// Create a mock that always fails
    #[must_use]
    pub const fn always_failing() -> Self {
        Self { narrative: None }
    }
}

#[async_trait]
impl SummaryModel for MockSummarizer {
    async fn narrative(&self, _digest: &str) -> ProviderResult<String> {
        self.narrative
            .clone()
            .ok_or_else(|| ProviderError::invalid_response("mock failure"))
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transcriber_fails_then_succeeds() {
        let mock = MockTranscriber::new("hello").failing_first(1);

        assert!(mock.transcribe(b"bytes", "k").await.is_err());
        let transcript = mock.transcribe(b"bytes", "k").await.unwrap();
        assert_eq!(transcript.text, "hello");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_analyzer_returns_outcome() {
        let mock = MockAnalyzer::resolved_billing();
        let outcome = mock.analyze("transcript").await.unwrap();
        assert_eq!(outcome.topic, Topic::BillingIssue);
        assert!(outcome.problem_resolved);
    }

    #[tokio::test]
    async fn test_mock_summarizer_failure() {
        let mock = MockSummarizer::always_failing();
        assert!(mock.narrative("digest").await.is_err());
    }
}
