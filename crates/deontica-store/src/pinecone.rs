//! Pinecone REST client
//!
//! Talks to the data plane of a single Pinecone index (`/query` and
//! `/vectors/upsert`). Snippet text and source metadata travel in each
//! vector's metadata, under the same keys ingestion writes.

use crate::vector_index::IndexError;
use deontica_domain::traits::{IndexRecord, VectorIndex};
use deontica_domain::RetrievedContext;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Default request timeout for index calls
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Pinecone implementation of [`VectorIndex`]
#[derive(Debug, Clone)]
pub struct PineconeIndex {
    host: String,
    api_key: String,
    namespace: Option<String>,
    client: Client,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Deserialize)]
struct Match {
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct UpsertResponse {
    #[serde(rename = "upsertedCount", default)]
    upserted_count: Option<usize>,
}

impl PineconeIndex {
    /// Create a client for the index served at `host`
    ///
    /// A host without a scheme is reached over HTTPS.
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Result<Self, IndexError> {
        let host = host.into();
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| IndexError::Communication(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            namespace: None,
            client,
        })
    }

    /// Scope queries and upserts to a namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        self.namespace = (!namespace.is_empty()).then_some(namespace);
        self
    }

    /// Index host URL in use
    pub fn host(&self) -> &str {
        &self.host
    }

    fn post<T: Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::blocking::Response, IndexError> {
        let response = self
            .client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .map_err(|e| {
                warn!(error = %e, path, "Pinecone request failed");
                IndexError::Communication(format!("Request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(IndexError::InvalidResponse(format!("HTTP {}: {}", status, error_text)));
        }
        Ok(response)
    }
}

/// Build a retrieved context from stored vector metadata
pub fn context_from_metadata(
    metadata: &Map<String, Value>,
    score: Option<f32>,
) -> RetrievedContext {
    let text_of = |key: &str| {
        metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    RetrievedContext {
        text: text_of("text").unwrap_or_default(),
        article_id: text_of("article_id"),
        source_uri: text_of("source_uri"),
        source_version: text_of("source_version"),
        score,
    }
}

/// Vector metadata for an index record
pub fn metadata_for(record: &IndexRecord) -> Value {
    let context = &record.context;
    json!({
        "text": context.text,
        "article_id": context.article_id.clone().unwrap_or_default(),
        "source_uri": context.source_uri.clone().unwrap_or_default(),
        "source_version": context.source_version.clone().unwrap_or_default(),
        "doc_id": record.doc_id,
        "chunk_id": record.id,
    })
}

impl VectorIndex for PineconeIndex {
    type Error = IndexError;

    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedContext>, Self::Error> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: self.namespace.as_deref(),
        };

        let body: QueryResponse = self
            .post("/query", &request)?
            .json()
            .map_err(|e| {
                IndexError::InvalidResponse(format!("Failed to parse query response: {}", e))
            })?;

        debug!(matches = body.matches.len(), top_k, "Pinecone query");
        Ok(body
            .matches
            .iter()
            .map(|m| context_from_metadata(&m.metadata, m.score))
            .collect())
    }

    fn upsert(&self, records: &[IndexRecord]) -> Result<usize, Self::Error> {
        if records.is_empty() {
            return Ok(0);
        }

        let vectors = records
            .iter()
            .map(|r| json!({"id": r.id, "values": r.values, "metadata": metadata_for(r)}))
            .collect();
        let request = UpsertRequest {
            vectors,
            namespace: self.namespace.as_deref(),
        };

        let body: UpsertResponse = self
            .post("/vectors/upsert", &request)?
            .json()
            .map_err(|e| {
                IndexError::InvalidResponse(format!("Failed to parse upsert response: {}", e))
            })?;

        Ok(body.upserted_count.unwrap_or(records.len()))
    }
}
