//! Answer fallbacks and citations

use deontica_domain::{Clause, RetrievedContext};

/// Answer used when neither the model nor the clause yields one
pub const FALLBACK_ANSWER: &str =
    "I found relevant provisions (see citations), but couldn't format a summary.";

/// Build a one-line summary from the extracted clause
///
/// Needs a modality, an actor, and an object or action verb.
pub fn summarize_clause(clause: &Clause) -> Option<String> {
    let modality = clause.modality?;
    let who = clause.display_actor()?;
    let what = non_blank(&clause.object).or_else(|| non_blank(&clause.action_verb))?;

    let mut line = format!("• **{}** for **{}**: {}", modality, who, what);
    if let Some(condition) = non_blank(&clause.condition) {
        line.push_str(&format!(" (condition: {})", condition));
    }
    Some(line)
}

/// The answer to show when the model gave none
pub fn fallback_answer(clause: &Clause) -> String {
    summarize_clause(clause).unwrap_or_else(|| FALLBACK_ANSWER.to_string())
}

/// Distinct non-empty article ids of the clause and the contexts, first seen first
pub fn collect_citations(clause: &Clause, contexts: &[RetrievedContext]) -> Vec<String> {
    let mut citations: Vec<String> = Vec::new();
    let candidates = std::iter::once(clause.article_id.as_deref())
        .chain(contexts.iter().map(|c| c.article_id.as_deref()));

    for article in candidates.flatten() {
        let article = article.trim();
        if !article.is_empty() && !citations.iter().any(|c| c == article) {
            citations.push(article.to_string());
        }
    }
    citations
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
