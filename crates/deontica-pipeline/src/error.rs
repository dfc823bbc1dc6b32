//! Error types for the Pipeline

use thiserror::Error;

/// Errors that end a pipeline run or an ingestion
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The question was empty
    #[error("Question must not be empty")]
    EmptyQuestion,

    /// Retrieval kept failing after every attempt
    #[error("Retrieval failed after {attempts} attempts: {message}")]
    Retrieval {
        /// Attempts made
        attempts: u32,
        /// Last error seen
        message: String,
    },

    /// Embedding provider error
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector index error
    #[error("Index error: {0}")]
    Index(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
