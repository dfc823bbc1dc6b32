//! Wiring of configured clients into a pipeline

use crate::config::{ServerConfig, VectorBackendKind};
use crate::ServerError;
use deontica_domain::traits::{IndexRecord, VectorIndex};
use deontica_domain::RetrievedContext;
use deontica_llm::OpenAiProvider;
use deontica_pipeline::Pipeline;
use deontica_store::{IndexError, LocalIndex, PineconeIndex, SqliteStore};
use tracing::info;

/// The vector index selected by configuration
pub enum VectorBackend {
    /// In-process HNSW index
    Local(LocalIndex),
    /// Pinecone REST index
    Pinecone(PineconeIndex),
}

impl VectorBackend {
    /// Backend name for status reports
    pub fn kind(&self) -> VectorBackendKind {
        match self {
            VectorBackend::Local(_) => VectorBackendKind::Local,
            VectorBackend::Pinecone(_) => VectorBackendKind::Pinecone,
        }
    }
}

impl VectorIndex for VectorBackend {
    type Error = IndexError;

    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedContext>, Self::Error> {
        match self {
            VectorBackend::Local(index) => index.query(vector, top_k),
            VectorBackend::Pinecone(index) => index.query(vector, top_k),
        }
    }

    fn upsert(&self, records: &[IndexRecord]) -> Result<usize, Self::Error> {
        match self {
            VectorBackend::Local(index) => index.upsert(records),
            VectorBackend::Pinecone(index) => index.upsert(records),
        }
    }
}

/// The pipeline as deployed: OpenAI for chat and embeddings, SQLite for storage
pub type ServicePipeline = Pipeline<OpenAiProvider, OpenAiProvider, VectorBackend, SqliteStore>;

/// Build the deployed pipeline from configuration
///
/// Creates blocking HTTP clients; call it outside of an async runtime.
pub fn build_pipeline(config: &ServerConfig) -> Result<ServicePipeline, ServerError> {
    let mut chat = OpenAiProvider::new(
        &config.openai_api_key,
        &config.chat_model,
        &config.embeddings_model,
    )?;
    if let Some(url) = &config.openai_base_url {
        chat = chat.with_base_url(url);
    }
    let embedder = chat.clone();

    let index = match config.vector_backend {
        VectorBackendKind::Local => VectorBackend::Local(LocalIndex::open(&config.database_path)?),
        VectorBackendKind::Pinecone => {
            let host = config.pinecone_index_host.clone().unwrap_or_default();
            let key = config.pinecone_api_key.clone().unwrap_or_default();
            let mut index = PineconeIndex::new(host, key)?;
            if let Some(namespace) = &config.pinecone_namespace {
                index = index.with_namespace(namespace);
            }
            VectorBackend::Pinecone(index)
        }
    };

    let store = SqliteStore::new(&config.database_path)?;
    info!(
        database = %config.database_path,
        vector_backend = %config.vector_backend,
        chat_model = %config.chat_model,
        "Pipeline configured"
    );

    Ok(Pipeline::new(chat, embedder, index, store, config.pipeline.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config(path: &str) -> ServerConfig {
        let toml = format!(
            r#"
            openai_api_key = "sk-test"
            chat_model = "gpt-4o-mini"
            embeddings_model = "text-embedding-3-small"
            database_path = "{}"
            vector_backend = "local"
            "#,
            path.replace('\\', "/")
        );
        ServerConfig::from_toml_with_env(&toml, |_| None).unwrap()
    }

    #[test]
    fn test_build_local_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deontica.db");
        let config = local_config(path.to_str().unwrap());

        let pipeline = build_pipeline(&config).unwrap();

        assert_eq!(pipeline.index().kind(), VectorBackendKind::Local);
        assert_eq!(pipeline.model_name(), "gpt-4o-mini");
        assert!(path.exists());
    }

    #[test]
    fn test_build_pinecone_pipeline() {
        let toml = r#"
            openai_api_key = "sk-test"
            chat_model = "gpt-4o-mini"
            embeddings_model = "text-embedding-3-small"
            database_path = ":memory:"
            pinecone_api_key = "pc-test"
            pinecone_index_host = "https://ai-act.svc.pinecone.io"
            pinecone_namespace = "eu"
        "#;
        let config = ServerConfig::from_toml_with_env(toml, |_| None).unwrap();

        let pipeline = build_pipeline(&config).unwrap();

        assert_eq!(pipeline.index().kind(), VectorBackendKind::Pinecone);
    }
}
