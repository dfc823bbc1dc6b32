//! Pipeline stages
//!
//! Each stage reads the run state, makes at most one model call, and writes
//! what it learned back. Model output is applied field by field; anything
//! missing or malformed leaves the field as it was. A failed model call is
//! logged and treated as an empty reply.

use crate::answer::{collect_citations, fallback_answer};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::parser::parse_reply;
use crate::prompt::{PromptBuilder, Stage};
use crate::state::RunState;
use deontica_domain::traits::{EmbeddingProvider, LlmProvider, VectorIndex};
use deontica_domain::{coerce, Clause, RetrievedContext, Route};
use deontica_gatekeeper::{Gatekeeper, RemoteReport};
use serde_json::{json, Map, Value};
use std::fmt::Display;
use tracing::{debug, warn};

/// Fields the classifier is allowed to set
const CLASSIFIED_FIELDS: [&str; 8] = [
    "modality",
    "actor",
    "action_verb",
    "object",
    "condition",
    "exceptions",
    "scope",
    "ambiguity",
];

/// Send one stage prompt and parse the reply
pub fn call_json<L>(llm: &L, stage: Stage, payload: &Value) -> Value
where
    L: LlmProvider,
    L::Error: Display,
{
    let prompt = PromptBuilder::new(stage, payload).build();
    debug!(stage = stage.name(), prompt_chars = prompt.len(), "Calling model");

    match llm.generate_json(&prompt) {
        Ok(reply) => parse_reply(&reply),
        Err(e) => {
            warn!(stage = stage.name(), error = %e, "Model call failed; stage output skipped");
            Value::Object(Map::new())
        }
    }
}

/// Embed the question and fetch the nearest snippets, retrying with backoff
pub fn retrieve<E, V>(
    embedder: &E,
    index: &V,
    state: &mut RunState,
    config: &PipelineConfig,
) -> Result<(), PipelineError>
where
    E: EmbeddingProvider,
    E::Error: Display,
    V: VectorIndex,
    V::Error: Display,
{
    let mut last_error = String::new();

    for attempt in 1..=config.retrieval_attempts {
        let result = embedder
            .embed(&state.query)
            .map_err(|e| format!("embedding failed: {}", e))
            .and_then(|vector| {
                index
                    .query(&vector, config.top_k)
                    .map_err(|e| format!("index query failed: {}", e))
            });

        match result {
            Ok(contexts) => {
                debug!(attempt, hits = contexts.len(), "Retrieved contexts");
                state.contexts = contexts;
                return Ok(());
            }
            Err(message) => {
                warn!(attempt, error = %message, "Retrieval attempt failed");
                last_error = message;
                if attempt < config.retrieval_attempts {
                    std::thread::sleep(config.retry_delay(attempt));
                }
            }
        }
    }

    Err(PipelineError::Retrieval {
        attempts: config.retrieval_attempts,
        message: last_error,
    })
}

/// Pick the working clause out of the best snippets
pub fn segment<L>(llm: &L, state: &mut RunState, config: &PipelineConfig)
where
    L: LlmProvider,
    L::Error: Display,
{
    let Some(top) = state.contexts.first() else {
        debug!("No contexts; starting from an empty clause");
        state.clause = Clause::default();
        return;
    };

    let text = state
        .contexts
        .iter()
        .take(config.segment_contexts)
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let reply = call_json(llm, Stage::Segment, &json!({ "text": text }));
    let items = match &reply {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => obj
            .get("clauses")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };

    state.clause = match items.iter().find_map(segmented_clause) {
        Some((text, article)) => {
            Clause::new(text).with_article(article.or_else(|| top.article_id.clone()))
        }
        None => {
            debug!("Segmenter returned no clause; using the top context");
            Clause::new(top.text.clone()).with_article(top.article_id.clone())
        }
    };
}

fn segmented_clause(item: &Value) -> Option<(String, Option<String>)> {
    match item {
        Value::String(text) if !text.trim().is_empty() => Some((text.trim().to_string(), None)),
        Value::Object(obj) => {
            let text = obj.get("text").and_then(Value::as_str)?.trim();
            if text.is_empty() {
                return None;
            }
            let article = obj
                .get("article_id")
                .and_then(coerce::optional_text)
                .flatten();
            Some((text.to_string(), article))
        }
        _ => None,
    }
}

/// Extract modality, actor, action and conditions
pub fn classify<L>(llm: &L, state: &mut RunState)
where
    L: LlmProvider,
    L::Error: Display,
{
    let reply = call_json(llm, Stage::Classify, &json!({ "text": state.clause.text }));
    let Some(obj) = reply.as_object() else {
        return;
    };

    let patch: Map<String, Value> = CLASSIFIED_FIELDS
        .iter()
        .filter_map(|&key| obj.get(key).map(|v| (key.to_string(), v.clone())))
        .collect();
    let applied = state.clause.apply_patch(&patch);

    if let Some(confidence) = obj.get("confidence").and_then(coerce::confidence) {
        state.clause.set_confidence(Stage::Classify.name(), confidence);
    }
    debug!(fields = ?applied, modality = ?state.clause.modality, "Classified clause");
}

/// Normalize the actor against the defined terms in the best snippets
pub fn define<L>(llm: &L, state: &mut RunState, config: &PipelineConfig)
where
    L: LlmProvider,
    L::Error: Display,
{
    let definitions_context = state
        .contexts
        .iter()
        .take(config.definition_contexts)
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let reply = call_json(
        llm,
        Stage::Definitions,
        &json!({
            "clause": state.clause.to_value(),
            "definitions_context": definitions_context,
        }),
    );

    if let Some(canonical) = reply
        .get("actor_canonical")
        .and_then(coerce::optional_text)
        .flatten()
    {
        state.clause.actor_canonical = Some(canonical);
    }

    let hits = reply
        .get("definition_hits")
        .and_then(coerce::value_list)
        .unwrap_or_default();
    state.clause.record_provenance("definition_hits", Value::Array(hits));
}

/// Record cross-references and import the conditions they bring in
pub fn cross_reference<L>(llm: &L, state: &mut RunState)
where
    L: LlmProvider,
    L::Error: Display,
{
    let payload = json!({ "clause": state.clause.to_value() });
    let reply = call_json(llm, Stage::CrossReference, &payload);

    let links = reply
        .get("xref_links")
        .and_then(coerce::value_list)
        .unwrap_or_default();
    state.clause.record_provenance("xref_links", Value::Array(links));

    let imported = reply
        .get("imported_conditions")
        .and_then(coerce::text_list)
        .unwrap_or_default();
    state.clause.append_conditions(&imported);
}

/// Produce the SDL formula and apply the model's field corrections
pub fn formalize<L>(llm: &L, state: &mut RunState)
where
    L: LlmProvider,
    L::Error: Display,
{
    let reply = call_json(llm, Stage::Formalize, &json!({ "json": state.clause.to_value() }));

    let formula = reply
        .get("formula")
        .and_then(coerce::optional_text)
        .flatten();
    state.clause.set_deontic_formula(formula);

    if let Some(confidence) = reply.get("confidence").and_then(coerce::confidence) {
        state.clause.set_confidence(Stage::Formalize.name(), confidence);
    }

    if let Some(Value::Object(updated)) = reply.get("json_updated") {
        let mut patch = updated.clone();
        patch.remove("confidence");
        let applied = state.clause.apply_patch(&patch);
        debug!(fields = ?applied, "Applied formalizer corrections");
    }
}

/// Merge local checks with the model's verdict and route the clause
pub fn validate<L>(llm: &L, gatekeeper: &Gatekeeper, state: &mut RunState)
where
    L: LlmProvider,
    L::Error: Display,
{
    let reply = call_json(llm, Stage::Validate, &state.clause.to_value());
    let remote = RemoteReport::from_value(&reply);

    if let Some(confidence) = remote.confidence {
        state.clause.set_confidence(Stage::Validate.name(), confidence);
    }

    let result = gatekeeper.evaluate(&state.clause, &remote, &mut state.budget);
    state.errors = result.errors;
    state.route = result.route;
}

/// Ask the model how to handle a clause that failed validation
///
/// Any answer other than `REFINE` or `ACCEPT_LOW_CONF` means `REVIEW`.
pub fn route_ambiguity<L>(llm: &L, state: &mut RunState)
where
    L: LlmProvider,
    L::Error: Display,
{
    let formalize_confidence = state
        .clause
        .confidence
        .get(Stage::Formalize.name())
        .copied()
        .unwrap_or(0.0);

    let reply = call_json(
        llm,
        Stage::Ambiguity,
        &json!({
            "clause": state.clause.to_value(),
            "validator": {
                "errors": state.errors,
                "confidence": formalize_confidence,
            },
        }),
    );

    let route = match reply.get("route").and_then(Value::as_str).and_then(Route::parse) {
        Some(route @ (Route::Refine | Route::AcceptLowConfidence)) => route,
        _ => Route::Review,
    };
    let reason = reply
        .get("reason")
        .and_then(coerce::optional_text)
        .flatten()
        .unwrap_or_default();

    state.clause.record_provenance("ambiguity_route", json!(route.as_str()));
    state.clause.record_provenance("ambiguity_reason", json!(reason));
    state.route = route;
    state.ambiguity_reason = Some(reason);
}

/// Write the answer and collect citations
pub fn compose_answer<L>(llm: &L, state: &mut RunState)
where
    L: LlmProvider,
    L::Error: Display,
{
    let reply = call_json(
        llm,
        Stage::Answer,
        &json!({
            "question": state.query,
            "clause": state.clause.to_value(),
            "contexts": state.contexts,
        }),
    );

    state.answer = match reply.get("answer").and_then(Value::as_str) {
        Some(answer) if !answer.trim().is_empty() => answer.to_string(),
        _ => fallback_answer(&state.clause),
    };
    state.citations = collect_citations(&state.clause, &state.contexts);
}

/// Source URIs of the retrieved snippets, for the chat log
pub fn doc_hits(contexts: &[RetrievedContext]) -> Vec<String> {
    contexts
        .iter()
        .map(|c| c.source_uri.clone().unwrap_or_default())
        .collect()
}
