//! Configuration for the server and the command line tools.
//!
//! Settings come from an optional TOML file, overridden by environment
//! variables. Every missing required setting is reported at once.

use deontica_pipeline::PipelineConfig;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required fields, comma separated
    #[error("Missing required configuration: {0}")]
    MissingField(String),

    /// A value is present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which vector index answers retrieval queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorBackendKind {
    /// Pinecone serverless index over REST
    #[default]
    Pinecone,
    /// In-process HNSW index persisted in the database file
    Local,
}

impl VectorBackendKind {
    /// Backend name as configured
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorBackendKind::Pinecone => "pinecone",
            VectorBackendKind::Local => "local",
        }
    }
}

impl FromStr for VectorBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pinecone" => Ok(VectorBackendKind::Pinecone),
            "local" => Ok(VectorBackendKind::Local),
            other => Err(ConfigError::Invalid(format!(
                "VECTOR_BACKEND must be 'pinecone' or 'local', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for VectorBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings as written in the TOML file; everything optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    openai_api_key: Option<String>,
    openai_base_url: Option<String>,
    chat_model: Option<String>,
    embeddings_model: Option<String>,
    database_path: Option<String>,
    vector_backend: Option<String>,
    pinecone_api_key: Option<String>,
    pinecone_index_host: Option<String>,
    pinecone_namespace: Option<String>,
    bind_address: Option<String>,
    bind_port: Option<u16>,
    pipeline: PipelineConfig,
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// OpenAI API key
    pub openai_api_key: String,

    /// Override for the OpenAI-compatible API base URL
    pub openai_base_url: Option<String>,

    /// Chat completion model
    pub chat_model: String,

    /// Embedding model
    pub embeddings_model: String,

    /// SQLite database file for clauses, chats and local chunks
    pub database_path: String,

    /// Vector index backend
    pub vector_backend: VectorBackendKind,

    /// Pinecone API key (pinecone backend only)
    pub pinecone_api_key: Option<String>,

    /// Pinecone index host (pinecone backend only)
    pub pinecone_index_host: Option<String>,

    /// Pinecone namespace, if any
    pub pinecone_namespace: Option<String>,

    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8000)
    pub bind_port: u16,

    /// Pipeline tuning
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    /// Load configuration from an optional TOML file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => FileConfig::default(),
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Parse a TOML document and overlay values from `env`
    pub fn from_toml_with_env<F>(toml_str: &str, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::resolve(toml::from_str(toml_str)?, env)
    }

    fn resolve<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset, so a blank variable does not hide the file.
        let present = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let pick = |key: &str, from_file: Option<String>| {
            present(env(key)).or_else(|| present(from_file))
        };

        let openai_api_key = pick("OPENAI_API_KEY", file.openai_api_key);
        let chat_model = pick("CHAT_MODEL", file.chat_model);
        let embeddings_model = pick("EMBEDDINGS_MODEL", file.embeddings_model);
        let database_path = pick("DATABASE_PATH", file.database_path);
        let pinecone_api_key = pick("PINECONE_API_KEY", file.pinecone_api_key);
        let pinecone_index_host = pick("PINECONE_INDEX_HOST", file.pinecone_index_host);

        let vector_backend = match pick("VECTOR_BACKEND", file.vector_backend) {
            Some(name) => name.parse()?,
            None => VectorBackendKind::default(),
        };

        let bind_port = match present(env("BIND_PORT")) {
            Some(port) => port
                .parse::<u16>()
                .map_err(|e| ConfigError::Invalid(format!("BIND_PORT '{}': {}", port, e)))?,
            None => file.bind_port.unwrap_or(8000),
        };

        let mut missing = Vec::new();
        for (key, value) in [
            ("OPENAI_API_KEY", &openai_api_key),
            ("CHAT_MODEL", &chat_model),
            ("EMBEDDINGS_MODEL", &embeddings_model),
            ("DATABASE_PATH", &database_path),
        ] {
            if value.is_none() {
                missing.push(key);
            }
        }
        if vector_backend == VectorBackendKind::Pinecone {
            if pinecone_api_key.is_none() {
                missing.push("PINECONE_API_KEY");
            }
            if pinecone_index_host.is_none() {
                missing.push("PINECONE_INDEX_HOST");
            }
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingField(missing.join(", ")));
        }

        file.pipeline
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("[pipeline] {}", e)))?;

        Ok(Self {
            openai_api_key: openai_api_key.unwrap_or_default(),
            openai_base_url: pick("OPENAI_BASE_URL", file.openai_base_url),
            chat_model: chat_model.unwrap_or_default(),
            embeddings_model: embeddings_model.unwrap_or_default(),
            database_path: database_path.unwrap_or_default(),
            vector_backend,
            pinecone_api_key,
            pinecone_index_host,
            pinecone_namespace: pick("PINECONE_NAMESPACE", file.pinecone_namespace),
            bind_address: pick("BIND_ADDRESS", file.bind_address)
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            bind_port,
            pipeline: file.pipeline,
        })
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}
