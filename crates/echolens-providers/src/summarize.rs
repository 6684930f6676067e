//! Narrative summary provider client

use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use echolens_core::config::AnalysisConfig;
use serde::Deserialize;
use std::time::Duration;

/// System prompt for executive summary generation
const SYSTEM_PROMPT: &str = "You are writing a weekly executive briefing for \
a customer support organization. Given aggregate call metrics, respond with \
a single JSON object containing exactly one field, \"summary\": a narrative \
of 4 to 6 sentences covering call volume, dominant topics, resolution \
performance, and anything that needs attention. Use only the supplied \
metrics. No bullet points, no headings.";

/// Interface for narrative summary backends
#[async_trait]
pub trait SummaryModel: Send + Sync {
    /// Produce a prose summary from a metrics digest
    async fn narrative(&self, digest: &str) -> ProviderResult<String>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Wire shape the model is instructed to return
#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    summary: String,
}

/// Chat-completions summary client
///
/// Requests JSON-mode output holding a single `summary` field and unwraps it.
#[derive(Debug, Clone)]
pub struct ChatSummarizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatSummarizer {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &AnalysisConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl SummaryModel for ChatSummarizer {
    async fn narrative(&self, digest: &str) -> ProviderResult<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": digest},
            ],
            "temperature": 0.3,
            "max_tokens": 500,
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_api_response(
                status.as_u16(),
                &text,
                &self.model,
            ));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ProviderError::invalid_response("response had no choices"))?;

        let envelope: SummaryEnvelope = serde_json::from_str(content.trim())
            .map_err(|e| ProviderError::invalid_response(format!("malformed summary JSON: {e}")))?;

        let summary = envelope.summary.trim().to_string();
        if summary.is_empty() {
            return Err(ProviderError::invalid_response("summary was empty"));
        }

        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> AnalysisConfig {
        AnalysisConfig {
            api_key: "gsk-test".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            base_url: base_url.to_string(),
            max_retries: 2,
            timeout_seconds: 5,
        }
    }

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn test_narrative_unwraps_summary_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "response_format": {"type": "json_object"},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(
                r#"{"summary": "Call volume held steady this week."}"#,
            )))
            .mount(&server)
            .await;

        let client = ChatSummarizer::new(&test_config(&server.uri())).unwrap();
        let summary = client.narrative("digest").await.unwrap();
        assert_eq!(summary, "Call volume held steady this week.");
    }

    #[tokio::test]
    async fn test_narrative_rejects_missing_summary_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_body(r#"{"text": "wrong shape"}"#)),
            )
            .mount(&server)
            .await;

        let client = ChatSummarizer::new(&test_config(&server.uri())).unwrap();
        let result = client.narrative("digest").await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_narrative_rejects_empty_summary() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_body(r#"{"summary": "  "}"#)),
            )
            .mount(&server)
            .await;

        let client = ChatSummarizer::new(&test_config(&server.uri())).unwrap();
        let result = client.narrative("digest").await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_narrative_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"message": "overloaded", "code": "service_unavailable"}
            })))
            .mount(&server)
            .await;

        let client = ChatSummarizer::new(&test_config(&server.uri())).unwrap();
        let result = client.narrative("digest").await;
        assert!(matches!(result, Err(ProviderError::Api { status: 503, .. })));
    }
}
