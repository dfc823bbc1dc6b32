//! Core Pipeline implementation

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::ingest::{ingest_text, IngestReport};
use crate::stages;
use crate::state::{PipelineOutcome, RunState};
use deontica_domain::traits::{ChatLog, ClauseStore, EmbeddingProvider, LlmProvider, VectorIndex};
use deontica_domain::{ChatRole, ChatTurn, Route};
use deontica_gatekeeper::{Gatekeeper, RefineBudget};
use serde_json::json;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Answers questions by extracting, formalizing and validating a clause
///
/// A run is one sequential chain of blocking calls. Callers on an async
/// runtime should run it on a blocking thread.
pub struct Pipeline<L, E, V, S> {
    llm: L,
    embedder: E,
    index: V,
    store: Arc<Mutex<S>>,
    gatekeeper: Gatekeeper,
    config: PipelineConfig,
}

impl<L, E, V, S> Pipeline<L, E, V, S>
where
    L: LlmProvider,
    L::Error: Display,
    E: EmbeddingProvider,
    E::Error: Display,
    V: VectorIndex,
    V::Error: Display,
    S: ClauseStore + ChatLog,
    <S as ClauseStore>::Error: Display,
    <S as ChatLog>::Error: Display,
{
    /// Create a new Pipeline
    ///
    /// Fails if the configuration does not validate.
    pub fn new(
        llm: L,
        embedder: E,
        index: V,
        store: S,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Config)?;

        Ok(Self {
            llm,
            embedder,
            index,
            store: Arc::new(Mutex::new(store)),
            gatekeeper: Gatekeeper::new(config.validation.clone()),
            config,
        })
    }

    /// Shared handle to the clause store and chat log
    pub fn store(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.store)
    }

    /// The configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The vector index queried by retrieval
    pub fn index(&self) -> &V {
        &self.index
    }

    /// Name of the chat model, as recorded in clause provenance
    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Answer a question within a conversation thread
    ///
    /// Only an empty question or a retrieval failure is an error. Model
    /// failures degrade the clause, and persistence failures are logged.
    pub fn run(&self, query: &str, thread_id: &str) -> Result<PipelineOutcome, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }

        let started = Instant::now();
        info!(thread_id, query_chars = query.len(), "Pipeline run started");

        let mut state = RunState::new(query, thread_id, RefineBudget::new(self.config.max_refines));

        stages::retrieve(&self.embedder, &self.index, &mut state, &self.config)?;
        stages::segment(&self.llm, &mut state, &self.config);
        stages::classify(&self.llm, &mut state);
        stages::define(&self.llm, &mut state, &self.config);
        stages::cross_reference(&self.llm, &mut state);
        self.formalize_until_settled(&mut state);
        stages::compose_answer(&self.llm, &mut state);

        state
            .clause
            .record_provenance("model", json!(self.llm.model_name()));
        self.persist(&mut state);

        info!(
            thread_id,
            route = %state.route,
            refines = state.budget.used(),
            citations = state.citations.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Pipeline run finished"
        );
        Ok(state.into_outcome())
    }

    /// Chunk, embed and index a source document
    pub fn ingest(
        &self,
        text: &str,
        source_uri: &str,
        source_version: &str,
    ) -> Result<IngestReport, PipelineError> {
        ingest_text(
            &self.embedder,
            &self.index,
            text,
            source_uri,
            source_version,
            &self.config,
        )
    }

    /// Formalize and validate until the route is terminal
    ///
    /// The ambiguity router is consulted once, the first time validation
    /// routes to `REVIEW`. Its `REFINE` shares the budget with the
    /// validator's.
    fn formalize_until_settled(&self, state: &mut RunState) {
        let mut consulted = false;

        loop {
            stages::formalize(&self.llm, state);
            stages::validate(&self.llm, &self.gatekeeper, state);
            debug!(route = %state.route, refines = state.budget.used(), "Validated clause");

            match state.route {
                Route::Refine => continue,
                Route::Review if !consulted => {
                    consulted = true;
                    stages::route_ambiguity(&self.llm, state);
                    if state.route != Route::Refine {
                        break;
                    }
                    if !state.budget.try_consume() {
                        debug!("Refine budget exhausted; routing to review");
                        state.route = Route::Review;
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    /// Record both chat turns and the clause; failures are logged only
    fn persist(&self, state: &mut RunState) {
        let mut store = match self.store.lock() {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "Store lock error; run not persisted");
                return;
            }
        };

        let user_turn = ChatTurn::new(&state.thread_id, ChatRole::User, &state.query)
            .with_retrieval_log(json!({ "doc_hits": stages::doc_hits(&state.contexts) }));
        if let Err(e) = store.append_turn(&user_turn) {
            warn!(thread_id = %state.thread_id, error = %e, "Failed to log user turn");
        }

        let assistant_turn = ChatTurn::new(&state.thread_id, ChatRole::Assistant, &state.answer)
            .with_retrieval_log(json!({ "citations": state.citations }));
        if let Err(e) = store.append_turn(&assistant_turn) {
            warn!(thread_id = %state.thread_id, error = %e, "Failed to log assistant turn");
        }

        if state.clause.text.trim().is_empty() {
            return;
        }
        match store.upsert_clause(&state.clause) {
            Ok(id) => state.clause.clause_id = id,
            Err(e) => warn!(error = %e, "Failed to store clause"),
        }
    }
}
