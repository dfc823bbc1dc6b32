//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the pipeline and its
//! infrastructure. Every call is blocking: a pipeline run is one sequential
//! chain of external calls.

use crate::{ChatTurn, Clause, ClauseId, Modality, RetrievedContext};
use serde_json::{Map, Value};

/// Trait for language model providers
///
/// Implemented by the infrastructure layer (deontica-llm)
pub trait LlmProvider {
    /// Error type for LLM operations
    type Error;

    /// Generate a free-text completion
    fn generate(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Generate a completion constrained to a single JSON object (if supported)
    fn generate_json(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Name of the model behind this provider, for provenance
    fn model_name(&self) -> &str;
}

/// Trait for text embedding providers
///
/// Implemented by the infrastructure layer (deontica-llm)
pub trait EmbeddingProvider {
    /// Error type for embedding operations
    type Error;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, Self::Error>;
}

/// A vector with the metadata stored next to it in the index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    /// Record identifier (`<doc_id>:<chunk number>`)
    pub id: String,

    /// Identifier of the source document
    pub doc_id: String,

    /// Embedding vector
    pub values: Vec<f32>,

    /// Snippet text and source metadata
    pub context: RetrievedContext,
}

/// Trait for vector similarity search
///
/// Implemented by the infrastructure layer (deontica-store)
pub trait VectorIndex {
    /// Error type for index operations
    type Error;

    /// Return the `top_k` nearest snippets with metadata and scores
    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedContext>, Self::Error>;

    /// Insert or replace records; returns how many were written
    fn upsert(&self, records: &[IndexRecord]) -> Result<usize, Self::Error>;
}

/// Filter criteria for listing clauses
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClauseFilter {
    /// Filter by modality
    pub modality: Option<Modality>,

    /// Filter by exact article reference
    pub article_id: Option<String>,

    /// Filter by worded actor
    pub actor: Option<String>,

    /// Filter by canonical actor
    pub actor_canonical: Option<String>,

    /// Case-insensitive substring search on the clause text (Unicode case folding)
    pub search: Option<String>,

    /// Maximum results to return
    pub limit: Option<usize>,
}

/// Trait for persisting clause documents
///
/// Implemented by the infrastructure layer (deontica-store)
pub trait ClauseStore {
    /// Error type for store operations
    type Error;

    /// Insert or update a clause keyed by (text, article_id)
    ///
    /// Returns the id under which the clause is stored, which is the id of
    /// the existing document when the key already existed.
    fn upsert_clause(&mut self, clause: &Clause) -> Result<ClauseId, Self::Error>;

    /// Get a clause by id
    fn get_clause(&self, id: ClauseId) -> Result<Option<Clause>, Self::Error>;

    /// List clauses matching a filter, most recently updated first
    fn query_clauses(&self, filter: &ClauseFilter) -> Result<Vec<Clause>, Self::Error>;

    /// Apply a field patch to a stored clause; returns false if it does not exist
    ///
    /// Fails without writing when the patched text and article belong to
    /// another stored clause.
    fn patch_clause(
        &mut self,
        id: ClauseId,
        patch: &Map<String, Value>,
    ) -> Result<bool, Self::Error>;
}

/// Trait for the conversation log
///
/// Implemented by the infrastructure layer (deontica-store)
pub trait ChatLog {
    /// Error type for log operations
    type Error;

    /// Append a turn to its thread
    fn append_turn(&mut self, turn: &ChatTurn) -> Result<(), Self::Error>;

    /// All turns of a thread, oldest first
    fn thread(&self, thread_id: &str) -> Result<Vec<ChatTurn>, Self::Error>;
}
