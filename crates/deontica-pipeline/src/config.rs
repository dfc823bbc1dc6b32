//! Configuration for the Pipeline

use deontica_gatekeeper::{ValidationConfig, MAX_REFINES};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a pipeline run and for ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Snippets fetched from the vector index per question
    pub top_k: usize,

    /// Best snippets handed to the segmenter
    pub segment_contexts: usize,

    /// Best snippets handed to the definitions stage
    pub definition_contexts: usize,

    /// Attempts at retrieval before the run fails
    pub retrieval_attempts: u32,

    /// First retry delay (milliseconds); doubles per attempt
    pub retrieval_backoff_min_ms: u64,

    /// Upper bound on the retry delay (milliseconds)
    pub retrieval_backoff_max_ms: u64,

    /// Refinements allowed per run (capped at the gatekeeper maximum)
    pub max_refines: u32,

    /// Chunk length for ingestion (characters)
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,

    /// Records per index upsert call
    pub upsert_batch_size: usize,

    /// Local completeness checks
    pub validation: ValidationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            segment_contexts: 2,
            definition_contexts: 3,
            retrieval_attempts: 3,
            retrieval_backoff_min_ms: 1_000,
            retrieval_backoff_max_ms: 8_000,
            max_refines: MAX_REFINES,
            chunk_size: 1_200,
            chunk_overlap: 200,
            upsert_batch_size: 100,
            validation: ValidationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Aggressive preset: fewer snippets, one refinement, short retries
    pub fn aggressive() -> Self {
        Self {
            top_k: 4,
            segment_contexts: 1,
            definition_contexts: 2,
            retrieval_attempts: 2,
            retrieval_backoff_min_ms: 250,
            retrieval_backoff_max_ms: 2_000,
            max_refines: 1,
            ..Self::default()
        }
    }

    /// Lenient preset: more snippets, more retrieval attempts, permissive checks
    pub fn lenient() -> Self {
        Self {
            top_k: 10,
            segment_contexts: 3,
            definition_contexts: 5,
            retrieval_attempts: 5,
            validation: ValidationConfig::permissive(),
            ..Self::default()
        }
    }

    /// Delay before retrying after the given failed attempt (1-based)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .retrieval_backoff_min_ms
            .saturating_mul(1u64 << exponent)
            .min(self.retrieval_backoff_max_ms);
        Duration::from_millis(delay)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.top_k == 0 {
            return Err("top_k must be greater than 0".to_string());
        }
        if self.segment_contexts == 0 {
            return Err("segment_contexts must be greater than 0".to_string());
        }
        if self.retrieval_attempts == 0 {
            return Err("retrieval_attempts must be greater than 0".to_string());
        }
        if self.retrieval_backoff_min_ms > self.retrieval_backoff_max_ms {
            return Err(
                "retrieval_backoff_min_ms cannot exceed retrieval_backoff_max_ms".to_string()
            );
        }
        if self.max_refines > MAX_REFINES {
            return Err(format!("max_refines cannot exceed {}", MAX_REFINES));
        }
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err("chunk_overlap must be smaller than chunk_size".to_string());
        }
        if self.upsert_batch_size == 0 {
            return Err("upsert_batch_size must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
