//! Speech-to-text provider client

use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use echolens_core::audio::AudioFormat;
use echolens_core::config::TranscriptionConfig;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A finished transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Transcribed text
    pub text: String,
    /// Model that produced it
    pub model: String,
}

/// Interface for speech-to-text backends
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe a recording's raw bytes
    async fn transcribe(&self, audio: &[u8], key: &str) -> ProviderResult<Transcript>;
}

/// Wire shape of a transcription response
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// OpenAI-compatible transcription client
///
/// Submits audio as multipart uploads. The container format is detected from
/// the payload's magic bytes, never from the object key, so a WAV stored
/// under a `.mp3` key is still sent as WAV; the mismatch is logged and
/// processing continues. When the primary model rejects
/// the container outright, the upload is retried once against the fallback
/// model.
#[derive(Debug, Clone)]
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    fallback_model: String,
}

impl OpenAiTranscriber {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &TranscriptionConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            fallback_model: config.fallback_model.clone(),
        })
    }

    async fn attempt(
        &self,
        audio: &[u8],
        format: AudioFormat,
        model: &str,
    ) -> ProviderResult<String> {
        let filename = format!("audio.{}", format.extension().unwrap_or("mp3"));
        let part = Part::bytes(audio.to_vec())
            .file_name(filename)
            .mime_str(format.content_type())
            .map_err(ProviderError::Http)?;

        let form = Form::new()
            .part("file", part)
            .text("model", model.to_string());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_api_response(status.as_u16(), &body, model));
        }

        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text)
    }
}

#[async_trait]
impl SpeechToText for OpenAiTranscriber {
    async fn transcribe(&self, audio: &[u8], key: &str) -> ProviderResult<Transcript> {
        let format = AudioFormat::detect(audio);
        if let Some(declared) = extension_mismatch(key, format) {
            warn!(
                key,
                declared,
                detected = %format,
                "Object extension does not match detected container"
            );
        }
        debug!(key, ?format, model = %self.model, "Submitting audio for transcription");

        let (text, model) = match self.attempt(audio, format, &self.model).await {
            Ok(text) => (text, self.model.clone()),
            Err(ProviderError::UnsupportedFormat { .. })
                if self.fallback_model != self.model =>
            {
                info!(
                    key,
                    rejected = %self.model,
                    fallback = %self.fallback_model,
                    "Primary model rejected container, retrying with fallback"
                );
                let text = self.attempt(audio, format, &self.fallback_model).await?;
                (text, self.fallback_model.clone())
            }
            Err(e) => return Err(e),
        };

        if text.trim().is_empty() {
            warn!(key, "Transcription returned no text");
            return Err(ProviderError::EmptyTranscript);
        }

        Ok(Transcript { text, model })
    }
}

/// Extension the object key declares, when it contradicts the detected
/// container
///
/// Unknown containers and extensionless keys never count as a mismatch.
fn extension_mismatch(key: &str, format: AudioFormat) -> Option<&str> {
    let declared = std::path::Path::new(key).extension()?.to_str()?;
    let detected = format.extension()?;
    (!declared.eq_ignore_ascii_case(detected)).then_some(declared)
}
