//! Transcript analysis provider client

use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use echolens_core::AnalysisOutcome;
use echolens_core::config::AnalysisConfig;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use validator::Validate;

/// System prompt steering the model toward the structured output contract
const SYSTEM_PROMPT: &str = "You are an analyst for customer support calls. \
Given a call transcript, respond with a single JSON object containing exactly \
these fields: \"customer_sentiment\" (one of \"positive\", \"neutral\", \
\"negative\"), \"topic\" (one of \"billing_issue\", \"tech_support\", \
\"cancellation\", \"shipping\", \"other\"), \"problem_resolved\" (boolean), \
\"summary\" (at most 240 characters), and \"confidence\" (number between 0 \
and 1, or null). Respond with the JSON object only.";

/// Interface for transcript analysis backends
#[async_trait]
pub trait CallAnalyzer: Send + Sync {
    /// Extract structured insights from a transcript
    async fn analyze(&self, transcript: &str) -> ProviderResult<AnalysisOutcome>;
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

/// Chat-completions analysis client
///
/// Requests JSON-mode output at low temperature, then still treats the reply
/// as untrusted: the content is defensively unwrapped from code fences,
/// cut down to the first balanced JSON object, parsed, and validated. A reply
/// that fails any of those steps costs one attempt, and the request is
/// retried unchanged until the attempt budget runs out.
#[derive(Debug, Clone)]
pub struct ChatAnalyzer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl ChatAnalyzer {
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
            max_retries: config.max_retries,
        })
    }

    async fn attempt(&self, transcript: &str) -> ProviderResult<AnalysisOutcome> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": transcript},
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

        parse_outcome(content)
    }
}

#[async_trait]
impl CallAnalyzer for ChatAnalyzer {
    async fn analyze(&self, transcript: &str) -> ProviderResult<AnalysisOutcome> {
        let attempts = self.max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(transcript).await {
                Ok(outcome) => {
                    debug!(attempt, "Analysis succeeded");
                    return Ok(outcome);
                }
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(attempt, error = %e, "Analysis attempt failed, retrying");
                }
                // Only a budget spent on malformed replies is a format
                // failure; transport and API errors propagate raw
                Err(e @ ProviderError::InvalidResponse { .. }) => {
                    return Err(ProviderError::RetriesExhausted {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Turn raw model output into a validated [`AnalysisOutcome`]
///
/// # Errors
///
/// Returns an invalid response error when no JSON object can be located, the
/// object does not match the expected shape, or field constraints fail.
pub fn parse_outcome(content: &str) -> ProviderResult<AnalysisOutcome> {
    let stripped = strip_code_fences(content);
    let object = extract_json_object(stripped)
        .ok_or_else(|| ProviderError::invalid_response("no JSON object in response"))?;

    let outcome: AnalysisOutcome = serde_json::from_str(object)
        .map_err(|e| ProviderError::invalid_response(format!("malformed analysis JSON: {e}")))?;

    outcome
        .validate()
        .map_err(|e| ProviderError::invalid_response(format!("analysis failed validation: {e}")))?;

    Ok(outcome)
}

/// Remove a Markdown code fence wrapper, with or without a language tag
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Extract the first balanced `{...}` object, ignoring braces inside strings
fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in content[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return content.get(start..=start + offset);
                }
            }
            _ => {}
        }
    }

    None
}
