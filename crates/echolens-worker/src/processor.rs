//! Call processing pipeline
//!
//! Drives one call through download, transcription, analysis and
//! persistence. The PROCESSING transition is committed before any external
//! call so a crash mid-stage leaves observable state for the sweeper.

use crate::store::CallStore;
use echolens_core::{Call, CallStatus, Error, Result};
use echolens_providers::{CallAnalyzer, SpeechToText};
use echolens_storage::BlobStore;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Processes calls end to end
pub struct CallProcessor {
    store: Arc<dyn CallStore>,
    blobs: Arc<dyn BlobStore>,
    transcriber: Arc<dyn SpeechToText>,
    analyzer: Arc<dyn CallAnalyzer>,
}

impl std::fmt::Debug for CallProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallProcessor").finish_non_exhaustive()
    }
}

impl CallProcessor {
    /// Create a processor over its collaborators
    pub fn new(
        store: Arc<dyn CallStore>,
        blobs: Arc<dyn BlobStore>,
        transcriber: Arc<dyn SpeechToText>,
        analyzer: Arc<dyn CallAnalyzer>,
    ) -> Self {
        Self {
            store,
            blobs,
            transcriber,
            analyzer,
        }
    }

    /// Process a single call
    ///
    /// An unknown call id fails fast without touching state. Once the call
    /// is loaded, any failure, including one committing the DONE status,
    /// transitions it to FAILED before the error is returned to the queue
    /// layer.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any stage.
    #[instrument(skip(self), fields(call_id = %call_id))]
    pub async fn process(&self, call_id: Uuid) -> Result<()> {
        let call = self.store.find_call(call_id).await?;

        let completed = match self.attempt(&call).await {
            Ok(()) => self.store.update_status(call_id, CallStatus::Done).await,
            Err(e) => Err(e),
        };

        match completed {
            Ok(()) => {
                info!("Call processed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Call processing failed");
                if let Err(persist_err) =
                    self.store.update_status(call_id, CallStatus::Failed).await
                {
                    error!(error = %persist_err, "Could not persist FAILED status");
                }
                Err(e)
            }
        }
    }

    async fn attempt(&self, call: &Call) -> Result<()> {
        self.store
            .update_status(call.id, CallStatus::Processing)
            .await?;

        let audio = self
            .blobs
            .fetch_recording(&call.audio_key)
            .await
            .map_err(Error::from)?;
        info!(call_id = %call.id, bytes = audio.len(), "Audio downloaded");

        // Any provider error raised here is a transcription failure
        let transcript = self
            .transcriber
            .transcribe(&audio, &call.audio_key)
            .await
            .map_err(|e| Error::Transcription(e.to_string()))?;
        info!(
            call_id = %call.id,
            model = %transcript.model,
            chars = transcript.text.len(),
            "Transcription complete"
        );

        let outcome = self
            .analyzer
            .analyze(&transcript.text)
            .await
            .map_err(Error::from)?;
        info!(
            call_id = %call.id,
            topic = %outcome.topic,
            sentiment = %outcome.sentiment,
            resolved = outcome.problem_resolved,
            "Analysis complete"
        );

        self.store
            .upsert_transcript(call.id, &transcript.text, &transcript.model)
            .await?;
        self.store.upsert_analysis(call.id, &outcome).await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::store::MemoryCallStore;
    use echolens_providers::mock::{MockAnalyzer, MockTranscriber};
    use echolens_storage::MemoryBlobStore;

    fn wav_bytes() -> Vec<u8> {
        let mut bytes = vec![0u8; 2048];
        bytes[..4].copy_from_slice(b"RIFF");
        bytes[8..12].copy_from_slice(b"WAVE");
        bytes
    }

    struct Fixture {
        store: Arc<MemoryCallStore>,
        blobs: Arc<MemoryBlobStore>,
        processor: CallProcessor,
    }

    fn fixture_with(analyzer: MockAnalyzer) -> Fixture {
        let store = Arc::new(MemoryCallStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let processor = CallProcessor::new(
            Arc::clone(&store) as Arc<dyn CallStore>,
            Arc::clone(&blobs) as Arc<dyn BlobStore>,
            Arc::new(MockTranscriber::new("I need help with my bill.")),
            Arc::new(analyzer),
        );
        Fixture {
            store,
            blobs,
            processor,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockAnalyzer::resolved_billing())
    }

    #[tokio::test]
    async fn test_successful_run_reaches_done_with_both_rows() {
        let f = fixture();
        let call = Call::new("uploads/a.wav");
        f.store.insert_call(&call).await.unwrap();
        f.blobs.put("uploads/a.wav", wav_bytes());

        f.processor.process(call.id).await.unwrap();

        assert_eq!(f.store.status_of(call.id), Some(CallStatus::Done));
        let (text, model) = f.store.transcript_of(call.id).unwrap();
        assert_eq!(text, "I need help with my bill.");
        assert_eq!(model, "mock-transcriber");
        assert!(f.store.analysis_of(call.id).is_some());
    }

    #[tokio::test]
    async fn test_unknown_call_fails_fast() {
        let f = fixture();
        let result = f.processor.process(Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_missing_audio_marks_failed() {
        let f = fixture();
        let call = Call::new("uploads/missing.wav");
        f.store.insert_call(&call).await.unwrap();

        let result = f.processor.process(call.id).await;
        assert!(result.is_err());
        assert_eq!(f.store.status_of(call.id), Some(CallStatus::Failed));
        assert!(f.store.transcript_of(call.id).is_none());
    }

    #[tokio::test]
    async fn test_tiny_audio_marks_failed() {
        let f = fixture();
        let call = Call::new("uploads/tiny.wav");
        f.store.insert_call(&call).await.unwrap();
        f.blobs.put("uploads/tiny.wav", vec![0u8; 64]);

        let result = f.processor.process(call.id).await;
        assert!(matches!(result, Err(Error::InvalidAudio { .. })));
        assert_eq!(f.store.status_of(call.id), Some(CallStatus::Failed));
    }

    #[tokio::test]
    async fn test_empty_transcript_marks_failed() {
        let store = Arc::new(MemoryCallStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let processor = CallProcessor::new(
            Arc::clone(&store) as Arc<dyn CallStore>,
            Arc::clone(&blobs) as Arc<dyn BlobStore>,
            Arc::new(MockTranscriber::new("ignored").failing_first(1)),
            Arc::new(MockAnalyzer::resolved_billing()),
        );

        let call = Call::new("uploads/a.wav");
        store.insert_call(&call).await.unwrap();
        blobs.put("uploads/a.wav", wav_bytes());

        let result = processor.process(call.id).await;
        assert!(result.is_err());
        assert_eq!(store.status_of(call.id), Some(CallStatus::Failed));
    }

    #[tokio::test]
    async fn test_analysis_failure_marks_failed_without_rows() {
        let f = fixture_with(MockAnalyzer::always_failing());
        let call = Call::new("uploads/a.wav");
        f.store.insert_call(&call).await.unwrap();
        f.blobs.put("uploads/a.wav", wav_bytes());

        let result = f.processor.process(call.id).await;
        assert!(result.is_err());
        assert_eq!(f.store.status_of(call.id), Some(CallStatus::Failed));
        assert!(f.store.transcript_of(call.id).is_none());
        assert!(f.store.analysis_of(call.id).is_none());
    }

    #[tokio::test]
    async fn test_done_commit_failure_marks_failed() {
        let f = fixture();
        let call = Call::new("uploads/a.wav");
        f.store.insert_call(&call).await.unwrap();
        f.blobs.put("uploads/a.wav", wav_bytes());
        f.store.set_fail_status(Some(CallStatus::Done));

        let result = f.processor.process(call.id).await;
        assert!(matches!(result, Err(Error::Persistence(_))));
        // The attempt itself succeeded, but the call must not be left in
        // PROCESSING for the sweeper to re-run
        assert_eq!(f.store.status_of(call.id), Some(CallStatus::Failed));
    }

    #[tokio::test]
    async fn test_repeat_processing_converges_to_one_analysis() {
        let f = fixture();
        let call = Call::new("uploads/a.wav");
        f.store.insert_call(&call).await.unwrap();
        f.blobs.put("uploads/a.wav", wav_bytes());

        f.processor.process(call.id).await.unwrap();
        let first = f.store.analysis_of(call.id).unwrap();

        f.processor.process(call.id).await.unwrap();
        let second = f.store.analysis_of(call.id).unwrap();

        assert_eq!(first.topic, second.topic);
        assert_eq!(f.store.status_of(call.id), Some(CallStatus::Done));
    }
}
