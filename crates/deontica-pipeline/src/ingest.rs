//! Ingestion of source documents into the vector index

use crate::chunking::{document_id, extract_article_id, LegalTextSplitter};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use deontica_domain::traits::{EmbeddingProvider, IndexRecord, VectorIndex};
use deontica_domain::RetrievedContext;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::{debug, info};

/// Summary of one ingested document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Stable id derived from the source URI and version
    pub doc_id: String,

    /// Chunks produced by the splitter
    pub chunks: usize,

    /// Records written to the index
    pub upserted: usize,
}

/// Chunk a document, embed every chunk, and upsert the vectors in batches
///
/// Record ids are `<doc_id>:<chunk number>`, so ingesting the same source
/// version again replaces its records.
pub fn ingest_text<E, V>(
    embedder: &E,
    index: &V,
    text: &str,
    source_uri: &str,
    source_version: &str,
    config: &PipelineConfig,
) -> Result<IngestReport, PipelineError>
where
    E: EmbeddingProvider,
    E::Error: Display,
    V: VectorIndex,
    V::Error: Display,
{
    let doc_id = document_id(source_uri, source_version);
    let chunks = LegalTextSplitter::new(config.chunk_size, config.chunk_overlap).split(text);
    info!(%doc_id, source_uri, chunks = chunks.len(), "Ingesting document");

    let batch_size = config.upsert_batch_size.max(1);
    let mut upserted = 0;

    for (batch_number, batch) in chunks.chunks(batch_size).enumerate() {
        let offset = batch_number * batch_size;
        let mut records = Vec::with_capacity(batch.len());

        for (i, chunk) in batch.iter().enumerate() {
            let values = embedder
                .embed(chunk)
                .map_err(|e| PipelineError::Embedding(e.to_string()))?;

            let mut context =
                RetrievedContext::new(chunk.clone()).with_source(source_uri, source_version);
            context.article_id = extract_article_id(chunk);

            records.push(IndexRecord {
                id: format!("{}:{}", doc_id, offset + i),
                doc_id: doc_id.clone(),
                values,
                context,
            });
        }

        upserted += index
            .upsert(&records)
            .map_err(|e| PipelineError::Index(e.to_string()))?;
        debug!(batch = batch_number, records = records.len(), "Upserted batch");
    }

    info!(%doc_id, upserted, "Document ingested");
    Ok(IngestReport {
        doc_id,
        chunks: chunks.len(),
        upserted,
    })
}
