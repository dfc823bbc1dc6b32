//! HTTP request handlers.
//!
//! Pipeline runs and store access are blocking, so every handler hands its
//! work to a blocking thread.

use crate::graph::{build_graph, Graph};
use deontica_domain::traits::{
    ChatLog, ClauseFilter, ClauseStore, EmbeddingProvider, LlmProvider, VectorIndex,
};
use deontica_domain::{Clause, ClauseId, Modality, RetrievedContext, Route};
use deontica_pipeline::{Pipeline, PipelineError, PipelineOutcome};
use deontica_store::{SqliteStore, StoreError};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

const DEFAULT_LIST_LIMIT: usize = 30;
const EXPORT_LIMIT: usize = 500;
const DEFAULT_GRAPH_LIMIT: usize = 100;

/// A pipeline behind a blocking, thread-safe interface
pub trait Assistant: Send + Sync {
    /// Run the pipeline for one question
    fn ask(&self, question: &str, thread_id: &str) -> Result<PipelineOutcome, PipelineError>;

    /// Chat model in use
    fn model_name(&self) -> &str;
}

impl<L, E, V> Assistant for Pipeline<L, E, V, SqliteStore>
where
    L: LlmProvider + Send + Sync,
    L::Error: Display,
    E: EmbeddingProvider + Send + Sync,
    E::Error: Display,
    V: VectorIndex + Send + Sync,
    V::Error: Display,
{
    fn ask(&self, question: &str, thread_id: &str) -> Result<PipelineOutcome, PipelineError> {
        self.run(question, thread_id)
    }

    fn model_name(&self) -> &str {
        Pipeline::model_name(self)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Pipeline answering chat requests
    pub assistant: Arc<dyn Assistant>,
    /// Clause store and chat log, shared with the pipeline
    pub store: Arc<Mutex<SqliteStore>>,
    /// Configured vector backend name
    pub vector_backend: String,
}

impl AppState {
    /// Create the state for a pipeline, sharing its store
    pub fn new<L, E, V>(
        pipeline: Pipeline<L, E, V, SqliteStore>,
        vector_backend: impl Into<String>,
    ) -> Self
    where
        Pipeline<L, E, V, SqliteStore>: Assistant + 'static,
        L: LlmProvider,
        L::Error: Display,
        E: EmbeddingProvider,
        E::Error: Display,
        V: VectorIndex,
        V::Error: Display,
    {
        let store = pipeline.store();
        Self {
            assistant: Arc::new(pipeline),
            store,
            vector_backend: vector_backend.into(),
        }
    }
}

/// Chat request
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The question
    #[serde(default)]
    pub question: Option<String>,
    /// Conversation thread (defaults to "default")
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Chat response
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Answer text
    pub answer: String,
    /// Article ids backing the answer
    pub citations: Vec<String>,
    /// Final route
    pub route: Route,
    /// The extracted clause
    pub clause: Value,
    /// Retrieved snippets
    pub contexts: Vec<RetrievedContext>,
    /// Ambiguity router's reason, empty when not consulted
    pub ambiguity_reason: String,
    /// Conversation thread
    pub thread_id: String,
}

impl From<PipelineOutcome> for ChatResponse {
    fn from(outcome: PipelineOutcome) -> Self {
        Self {
            clause: clause_json(&outcome.clause),
            answer: outcome.answer,
            citations: outcome.citations,
            route: outcome.route,
            contexts: outcome.contexts,
            ambiguity_reason: outcome.ambiguity_reason.unwrap_or_default(),
            thread_id: outcome.thread_id,
        }
    }
}

/// Component status
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Database answers queries
    pub store: bool,
    /// Vector index configured
    pub vector_index: bool,
    /// Chat model configured
    pub llm: bool,
    /// Vector backend name
    pub vector_backend: String,
    /// Chat model name
    pub model: String,
}

/// Clause listing filters
#[derive(Debug, Default, Deserialize)]
pub struct ClauseQuery {
    /// Modality name, or `all`
    pub modality: Option<String>,
    /// Exact article id
    pub article: Option<String>,
    /// Worded actor (canonical actor for the graph)
    pub actor: Option<String>,
    /// Substring of the clause text
    pub search: Option<String>,
    /// Maximum results
    pub limit: Option<usize>,
}

impl ClauseQuery {
    fn filter(&self, default_limit: usize) -> Result<ClauseFilter, AppError> {
        let modality = match self.modality.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(m) if m.eq_ignore_ascii_case("all") => None,
            Some(m) => Some(
                Modality::parse(m)
                    .ok_or_else(|| AppError::BadRequest(format!("Unknown modality: {}", m)))?,
            ),
        };

        Ok(ClauseFilter {
            modality,
            article_id: non_blank(&self.article),
            actor: non_blank(&self.actor),
            actor_canonical: None,
            search: non_blank(&self.search),
            limit: Some(self.limit.unwrap_or(default_limit)),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Malformed request
    BadRequest(String),
    /// Unknown resource
    NotFound(String),
    /// Pipeline failure
    Pipeline(PipelineError),
    /// Store failure
    Store(StoreError),
    /// Internal server error
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Pipeline(e @ PipelineError::EmptyQuestion) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            AppError::Pipeline(e @ PipelineError::Retrieval { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            AppError::Pipeline(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Store(e @ StoreError::Conflict(_)) => (StatusCode::CONFLICT, e.to_string()),
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            error!(status = %status, error = %message, "Request failed");
        }
        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        AppError::Pipeline(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Store(e)
    }
}

/// Clause as served by the API, with its id also under `id`
pub fn clause_json(clause: &Clause) -> Value {
    let mut value = clause.to_value();
    if let Value::Object(obj) = &mut value {
        obj.insert("id".to_string(), json!(clause.clause_id.to_string()));
    }
    value
}

/// Run a closure against the store on a blocking thread
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&mut SqliteStore) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || {
        let mut guard = store
            .lock()
            .map_err(|e| AppError::InternalError(format!("Store lock error: {}", e)))?;
        f(&mut guard)
    })
    .await
    .map_err(|e| AppError::InternalError(format!("Worker failed: {}", e)))?
}

/// POST /api/chat - Answer a question
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let question = request.question.unwrap_or_default();
    if question.trim().is_empty() {
        return Err(AppError::BadRequest("question is required".to_string()));
    }
    let thread_id = request
        .thread_id
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "default".to_string());

    let assistant = Arc::clone(&state.assistant);
    let outcome = tokio::task::spawn_blocking(move || assistant.ask(&question, &thread_id))
        .await
        .map_err(|e| AppError::InternalError(format!("Pipeline worker failed: {}", e)))??;

    Ok(Json(outcome.into()))
}

/// GET /api/status - Component status
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let store_ok = with_store(&state, |store| Ok(store.ping().is_ok()))
        .await
        .unwrap_or(false);

    Json(StatusResponse {
        store: store_ok,
        vector_index: true,
        llm: true,
        vector_backend: state.vector_backend.clone(),
        model: state.assistant.model_name().to_string(),
    })
}

/// GET /api/clauses - List clauses, newest first
async fn list_clauses(
    State(state): State<AppState>,
    Query(query): Query<ClauseQuery>,
) -> Result<Json<Vec<Value>>, AppError> {
    let filter = query.filter(DEFAULT_LIST_LIMIT)?;
    let clauses = with_store(&state, move |store| Ok(store.query_clauses(&filter)?)).await?;
    Ok(Json(clauses.iter().map(clause_json).collect()))
}

/// GET /api/clauses/export - Bulk export
async fn export_clauses(
    State(state): State<AppState>,
    Query(query): Query<ClauseQuery>,
) -> Result<Json<Value>, AppError> {
    let filter = ClauseFilter {
        actor: None,
        search: None,
        limit: Some(EXPORT_LIMIT),
        ..query.filter(EXPORT_LIMIT)?
    };
    let clauses = with_store(&state, move |store| Ok(store.query_clauses(&filter)?)).await?;
    let data: Vec<Value> = clauses.iter().map(clause_json).collect();
    Ok(Json(json!({ "data": data })))
}

/// GET /api/clause/:id - One clause, or `{}` when unknown
async fn get_clause(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let Ok(id) = ClauseId::from_string(&id) else {
        return Ok(Json(json!({})));
    };
    let clause = with_store(&state, move |store| Ok(store.get_clause(id)?)).await?;
    Ok(Json(clause.as_ref().map(clause_json).unwrap_or_else(|| json!({}))))
}

/// PUT /api/clause/:id - Patch clause fields
///
/// A patch that would give the clause the text and article of another
/// stored clause is rejected with 409.
async fn update_clause(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<Value>, AppError> {
    let clause_id = ClauseId::from_string(&id).map_err(AppError::NotFound)?;
    let found =
        with_store(&state, move |store| Ok(store.patch_clause(clause_id, &patch)?)).await?;
    if !found {
        return Err(AppError::NotFound(format!("Clause not found: {}", id)));
    }
    Ok(Json(json!({ "ok": true })))
}

/// GET /api/graph - Clause dependency graph
async fn graph(
    State(state): State<AppState>,
    Query(query): Query<ClauseQuery>,
) -> Result<Json<Graph>, AppError> {
    let filter = ClauseFilter {
        actor: None,
        actor_canonical: non_blank(&query.actor),
        search: None,
        ..query.filter(DEFAULT_GRAPH_LIMIT)?
    };
    let clauses = with_store(&state, move |store| Ok(store.query_clauses(&filter)?)).await?;
    Ok(Json(build_graph(&clauses)))
}

/// GET /api/thread/:id - Chat turns of a thread, oldest first
async fn thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let turns = with_store(&state, move |store| Ok(store.thread(&thread_id)?)).await?;
    Ok(Json(json!({ "turns": turns })))
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/api/chat", post(chat))
        .route("/api/status", get(status))
        .route("/api/clauses", get(list_clauses))
        .route("/api/clauses/export", get(export_clauses))
        .route("/api/clause/:id", get(get_clause).put(update_clause))
        .route("/api/graph", get(graph))
        .route("/api/thread/:id", get(thread))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modality_all_means_no_filter() {
        let query = ClauseQuery {
            modality: Some("all".to_string()),
            ..Default::default()
        };
        let filter = query.filter(DEFAULT_LIST_LIMIT).unwrap();
        assert_eq!(filter.modality, None);
        assert_eq!(filter.limit, Some(30));
    }

    #[test]
    fn test_filter_fields() {
        let query = ClauseQuery {
            modality: Some("prohibition".to_string()),
            article: Some(" Art 5 ".to_string()),
            search: Some("".to_string()),
            limit: Some(5),
            ..Default::default()
        };
        let filter = query.filter(DEFAULT_LIST_LIMIT).unwrap();
        assert_eq!(filter.modality, Some(Modality::Prohibition));
        assert_eq!(filter.article_id.as_deref(), Some("Art 5"));
        assert_eq!(filter.search, None);
        assert_eq!(filter.limit, Some(5));
    }

    #[test]
    fn test_unknown_modality_is_rejected() {
        let query = ClauseQuery {
            modality: Some("SUGGESTION".to_string()),
            ..Default::default()
        };
        assert!(matches!(query.filter(DEFAULT_LIST_LIMIT), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_clause_json_carries_id() {
        let clause = Clause::new("Providers shall keep logs.");
        let value = clause_json(&clause);
        assert_eq!(value["id"], clause.clause_id.to_string());
        assert_eq!(value["text"], "Providers shall keep logs.");
    }
}
