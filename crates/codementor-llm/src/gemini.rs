//! Google Gemini client for CodeMentor.
//!
//! This module provides [`GeminiClient`], a [`CompletionBackend`] that calls
//! the `generateContent` endpoint of the Generative Language API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::{CompletionBackend, LlmError, LlmErrorKind, Result};

/// Default API root for the Generative Language API.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Options for creating a [`GeminiClient`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use codementor_llm::GeminiOptions;
///
/// let options = GeminiOptions::new("my-key", "gemini-1.5-flash")
///     .with_temperature(0.2)
///     .with_timeout(Duration::from_secs(30));
/// assert_eq!(options.model, "gemini-1.5-flash");
/// ```
#[derive(Debug, Clone)]
pub struct GeminiOptions {
    /// API key sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// Model name, e.g. `gemini-1.5-flash`.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// HTTP timeout applied to every request.
    pub timeout: Duration,
    /// API root, overridable for proxies and tests.
    pub base_url: String,
}

impl GeminiOptions {
    /// Creates options with the given key and model and default tuning.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            timeout: Duration::from_secs(60),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the HTTP timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the API root URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Full URL of the `generateContent` endpoint for the configured model.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// A Gemini-backed completion client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    options: GeminiOptions,
}

impl GeminiClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ClientBuild`] if the underlying HTTP client cannot
    /// be constructed (for example, TLS initialisation failure).
    pub fn new(options: GeminiOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| LlmError::ClientBuild(e.to_string()))?;
        Ok(Self { client, options })
    }

    /// Returns the options this client was created with.
    #[must_use]
    pub const fn options(&self) -> &GeminiOptions {
        &self.options
    }

    fn classify_transport_error(&self, err: &reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout {
                timeout_secs: self.options.timeout.as_secs(),
            }
        } else if err.is_connect() || err.is_request() {
            LlmError::api(LlmErrorKind::Network, None, err.to_string())
        } else {
            LlmError::api(LlmErrorKind::Other, None, err.to_string())
        }
    }
}

#[async_trait]
impl CompletionBackend for GeminiClient {
    #[instrument(skip(self, prompt), fields(model = %self.options.model, prompt_len = prompt.len()))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = GenerateContentRequest::from_prompt(prompt, self.options.temperature);

        let response = self
            .client
            .post(self.options.endpoint())
            .header("x-goog-api-key", &self.options.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Generation request rejected");
            return Err(LlmError::api(
                LlmErrorKind::from_status(status.as_u16()),
                Some(status.as_u16()),
                message,
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.classify_transport_error(&e))?;
        let completion = extract_completion_text(&text)?;
        debug!(completion_len = completion.len(), "Generation request completed");
        Ok(completion)
    }

    fn model(&self) -> &str {
        &self.options.model
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_prompt(prompt: &'a str, temperature: f32) -> Self {
        Self {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig { temperature },
        }
    }
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Pulls the concatenated text of the first candidate out of a response body.
fn extract_completion_text(body: &str) -> Result<String> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| LlmError::malformed(e.to_string()))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().map(|part| part.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::malformed("response has no candidate text"));
    }
    Ok(text)
}
