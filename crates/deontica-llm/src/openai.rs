//! OpenAI Provider Implementation
//!
//! Chat completions and embeddings over the OpenAI REST API, or any
//! endpoint that speaks the same protocol (set a custom base URL).
//!
//! # Features
//!
//! - Blocking HTTP client (each pipeline stage is one sequential call)
//! - JSON mode (`response_format = json_object`) for structured stages
//! - Configurable model names, temperature, and timeout
//!
//! # Examples
//!
//! ```no_run
//! use deontica_llm::OpenAiProvider;
//! use deontica_domain::traits::LlmProvider;
//!
//! let provider = OpenAiProvider::new("sk-...", "gpt-4o-mini", "text-embedding-3-large").unwrap();
//! let reply = provider.generate_json("Return {\"ok\": true}").unwrap();
//! ```

use crate::LlmError;
use deontica_domain::traits::{EmbeddingProvider, LlmProvider};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default OpenAI API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default timeout for LLM requests (60 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default sampling temperature; low so extraction stays repeatable
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// OpenAI API provider for chat completions and embeddings
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
    timeout: Duration,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    /// Create a new provider against the public OpenAI endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            temperature: DEFAULT_TEMPERATURE,
            timeout,
            client: build_client(timeout)?,
        })
    }

    /// Use a custom base URL (proxies, Azure, local gateways)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = build_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Base URL in use
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Embedding model in use
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Send one user message and return the reply text
    fn chat(&self, prompt: &str, json_mode: bool) -> Result<String, LlmError> {
        let start = Instant::now();
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            response_format: json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| {
                warn!(error = %e, "Chat completion request failed");
                LlmError::Communication(format!("Request failed: {}", e))
            })?;

        let response = check_status(response, &self.chat_model)?;
        let body: ChatResponse = response
            .json()
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        debug!(
            model = %self.chat_model,
            json_mode,
            duration_ms = start.elapsed().as_millis() as u64,
            "Chat completion"
        );

        Ok(content)
    }
}

fn build_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Other(format!("Failed to build HTTP client: {}", e)))
}

fn check_status(
    response: reqwest::blocking::Response,
    model: &str,
) -> Result<reqwest::blocking::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(LlmError::RateLimitExceeded),
        StatusCode::NOT_FOUND => Err(LlmError::ModelNotAvailable(model.to_string())),
        _ => {
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(status = %status, error = %error_text, "OpenAI API error");
            Err(LlmError::Communication(format!("HTTP {}: {}", status, error_text)))
        }
    }
}

impl LlmProvider for OpenAiProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        self.chat(prompt, false)
    }

    fn generate_json(&self, prompt: &str) -> Result<String, Self::Error> {
        self.chat(prompt, true)
    }

    fn model_name(&self) -> &str {
        &self.chat_model
    }
}

impl EmbeddingProvider for OpenAiProvider {
    type Error = LlmError;

    fn embed(&self, text: &str) -> Result<Vec<f32>, Self::Error> {
        if text.trim().is_empty() {
            return Err(LlmError::InvalidInput(
                "Empty text cannot be embedded".to_string(),
            ));
        }

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| {
                warn!(error = %e, "Embedding request failed");
                LlmError::Communication(format!("Request failed: {}", e))
            })?;

        let response = check_status(response, &self.embedding_model)?;
        let body: EmbeddingResponse = response
            .json()
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse embedding: {}", e)))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::InvalidResponse("No embedding in response".to_string()))
    }
}
