//! Retrieved context - a scored snippet returned by the vector index

use serde::{Deserialize, Serialize};

/// A text snippet retrieved for a query, with its source metadata
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievedContext {
    /// Snippet text
    pub text: String,

    /// Article reference detected at ingestion time
    pub article_id: Option<String>,

    /// Source document URI (e.g. "eurlex:eu_ai_act_official_journal")
    pub source_uri: Option<String>,

    /// Source document version (e.g. "OJ-2024-07-12")
    pub source_version: Option<String>,

    /// Similarity score reported by the index
    pub score: Option<f32>,
}

impl RetrievedContext {
    /// Create a context with only text set
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Set the article reference (blank references are dropped)
    pub fn with_article(mut self, article_id: impl Into<String>) -> Self {
        let article_id = article_id.into();
        self.article_id = (!article_id.trim().is_empty()).then_some(article_id);
        self
    }

    /// Set the source URI
    pub fn with_source(mut self, uri: impl Into<String>, version: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self.source_version = Some(version.into());
        self
    }

    /// Set the similarity score
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}
