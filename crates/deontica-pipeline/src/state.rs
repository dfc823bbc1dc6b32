//! Run state and outcome
//!
//! `RunState` is the mutable record one pipeline run threads through its
//! stages. Only `PipelineOutcome` leaves the run.

use deontica_domain::{Clause, RetrievedContext, Route};
use deontica_gatekeeper::RefineBudget;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transient state of one pipeline run
#[derive(Debug, Clone)]
pub struct RunState {
    /// The user's question
    pub query: String,

    /// Conversation thread the run belongs to
    pub thread_id: String,

    /// Snippets returned by retrieval, best first
    pub contexts: Vec<RetrievedContext>,

    /// The clause being extracted
    pub clause: Clause,

    /// Refinements left for this run
    pub budget: RefineBudget,

    /// Current route
    pub route: Route,

    /// Errors of the most recent validation
    pub errors: Vec<Value>,

    /// Reason given by the ambiguity router, if consulted
    pub ambiguity_reason: Option<String>,

    /// Composed answer
    pub answer: String,

    /// Article ids backing the answer
    pub citations: Vec<String>,
}

impl RunState {
    /// Start a run for a question
    pub fn new(
        query: impl Into<String>,
        thread_id: impl Into<String>,
        budget: RefineBudget,
    ) -> Self {
        Self {
            query: query.into(),
            thread_id: thread_id.into(),
            contexts: Vec::new(),
            clause: Clause::default(),
            budget,
            route: Route::default(),
            errors: Vec::new(),
            ambiguity_reason: None,
            answer: String::new(),
            citations: Vec::new(),
        }
    }

    /// Finish the run
    pub fn into_outcome(self) -> PipelineOutcome {
        PipelineOutcome {
            refines: self.budget.used(),
            answer: self.answer,
            citations: self.citations,
            route: self.route,
            clause: self.clause,
            contexts: self.contexts,
            ambiguity_reason: self.ambiguity_reason,
            thread_id: self.thread_id,
        }
    }
}

/// Result of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Answer text, never empty
    pub answer: String,

    /// Article ids backing the answer, first seen first
    pub citations: Vec<String>,

    /// Final route
    pub route: Route,

    /// The extracted clause
    pub clause: Clause,

    /// Snippets the answer was grounded on
    pub contexts: Vec<RetrievedContext>,

    /// Reason given by the ambiguity router, if consulted
    pub ambiguity_reason: Option<String>,

    /// Conversation thread
    pub thread_id: String,

    /// Refinements used
    pub refines: u32,
}
