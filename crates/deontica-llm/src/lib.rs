//! Deontica LLM Provider Layer
//!
//! Implementations of the `LlmProvider` and `EmbeddingProvider` traits from
//! `deontica-domain`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `OpenAiProvider`: OpenAI-compatible chat completions and embeddings
//! - `MockEmbedder`: Hash-based deterministic embeddings
//!
//! # Examples
//!
//! ```
//! use deontica_llm::MockProvider;
//! use deontica_domain::traits::LlmProvider;
//!
//! let provider = MockProvider::new(r#"{"answer": "Providers must keep logs."}"#);
//! let result = provider.generate_json("any prompt").unwrap();
//! assert!(result.contains("keep logs"));
//! ```

#![warn(missing_docs)]

pub mod embedding;
pub mod openai;

use deontica_domain::traits::LlmProvider as LlmProviderTrait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub use embedding::MockEmbedder;
pub use openai::OpenAiProvider;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Invalid input (e.g. empty text to embed)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

const MOCK_ERROR: &str = "ERROR";

/// Mock LLM provider for deterministic testing
///
/// Responses are chosen in this order:
/// 1. an exact-prompt response registered with [`MockProvider::add_response`]
/// 2. the first rule whose marker occurs in the prompt
///    ([`MockProvider::add_rule`]); a rule with several responses hands them
///    out in order and keeps repeating the last one
/// 3. the default response
///
/// # Examples
///
/// ```
/// use deontica_llm::MockProvider;
/// use deontica_domain::traits::LlmProvider;
///
/// let mut provider = MockProvider::default();
/// provider.add_rule("Validate", [r#"{"pass": false}"#, r#"{"pass": true}"#]);
/// assert_eq!(provider.generate("Validate this").unwrap(), r#"{"pass": false}"#);
/// assert_eq!(provider.generate("Validate again").unwrap(), r#"{"pass": true}"#);
/// assert_eq!(provider.generate("Validate once more").unwrap(), r#"{"pass": true}"#);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    responses: Arc<Mutex<HashMap<String, String>>>,
    rules: Arc<Mutex<Vec<(String, VecDeque<String>)>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            responses: Arc::new(Mutex::new(HashMap::new())),
            rules: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a specific response for an exact prompt
    pub fn add_response(&mut self, prompt: impl Into<String>, response: impl Into<String>) {
        lock(&self.responses).insert(prompt.into(), response.into());
    }

    /// Answer every prompt containing `marker` with the given responses
    pub fn add_rule<I, S>(&mut self, marker: impl Into<String>, responses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue: VecDeque<String> = responses.into_iter().map(Into::into).collect();
        if queue.is_empty() {
            return;
        }
        lock(&self.rules).push((marker.into(), queue));
    }

    /// Configure to return an error for prompts containing `marker`
    pub fn add_error(&mut self, marker: impl Into<String>) {
        self.add_rule(marker, [MOCK_ERROR]);
    }

    /// Get the number of times the provider was called
    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }

    /// Number of received prompts that contain `marker`
    pub fn calls_containing(&self, marker: &str) -> usize {
        lock(&self.prompts).iter().filter(|p| p.contains(marker)).count()
    }

    /// All prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// Reset the call log
    pub fn reset_call_count(&self) {
        lock(&self.prompts).clear();
    }

    fn respond(&self, prompt: &str) -> Result<String, LlmError> {
        lock(&self.prompts).push(prompt.to_string());

        let response = lock(&self.responses).get(prompt).cloned().or_else(|| {
            let mut rules = lock(&self.rules);
            rules
                .iter_mut()
                .find(|(marker, _)| prompt.contains(marker.as_str()))
                .and_then(|(_, queue)| {
                    if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    }
                })
        });

        match response {
            Some(r) if r == MOCK_ERROR => Err(LlmError::Other("Mock error".to_string())),
            Some(r) => Ok(r),
            None => Ok(self.default_response.clone()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("{}")
    }
}

impl LlmProviderTrait for MockProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        self.respond(prompt)
    }

    fn generate_json(&self, prompt: &str) -> Result<String, Self::Error> {
        self.respond(prompt)
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_default() {
        let provider = MockProvider::new("Test response");
        let result = provider.generate("any prompt");
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), "Test response");
    }

    #[test]
    fn test_mock_provider_specific_responses() {
        let mut provider = MockProvider::default();
        provider.add_response("hello", "world");
        provider.add_response("foo", "bar");

        assert_eq!(provider.generate("hello").unwrap(), "world");
        assert_eq!(provider.generate("foo").unwrap(), "bar");
        assert_eq!(provider.generate("unknown").unwrap(), "{}");
    }

    #[test]
    fn test_mock_provider_rules_match_substring() {
        let mut provider = MockProvider::default();
        provider.add_rule("classify", [r#"{"modality": "OBLIGATION"}"#]);

        let reply = provider.generate_json("please classify this clause").unwrap();
        assert!(reply.contains("OBLIGATION"));
        assert_eq!(provider.generate_json("something else").unwrap(), "{}");
    }

    #[test]
    fn test_mock_provider_rule_sequence_repeats_last() {
        let mut provider = MockProvider::default();
        provider.add_rule("x", ["1", "2"]);

        assert_eq!(provider.generate("x").unwrap(), "1");
        assert_eq!(provider.generate("x").unwrap(), "2");
        assert_eq!(provider.generate("x").unwrap(), "2");
    }

    #[test]
    fn test_mock_provider_call_count() {
        let provider = MockProvider::new("test");

        assert_eq!(provider.call_count(), 0);

        provider.generate("prompt1").unwrap();
        assert_eq!(provider.call_count(), 1);

        provider.generate_json("prompt2").unwrap();
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.calls_containing("prompt2"), 1);

        provider.reset_call_count();
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_mock_provider_error() {
        let mut provider = MockProvider::default();
        provider.add_error("bad prompt");

        let result = provider.generate("a bad prompt");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), LlmError::Other(_)));
    }

    #[test]
    fn test_mock_provider_clone_shares_log() {
        let provider1 = MockProvider::new("test");
        let provider2 = provider1.clone();

        provider1.generate("test").unwrap();

        // Both should share the same call log due to Arc
        assert_eq!(provider1.call_count(), 1);
        assert_eq!(provider2.call_count(), 1);
    }
}
