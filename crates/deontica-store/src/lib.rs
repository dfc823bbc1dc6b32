//! Deontica Storage Layer
//!
//! Implements the `ClauseStore` and `ChatLog` traits on SQLite, and the
//! `VectorIndex` trait on two backends.
//!
//! # Architecture
//!
//! - SQLite for clause documents, chat turns and ingested chunks
//! - Clause documents are stored whole as JSON, with the filterable fields
//!   copied into columns
//! - [`LocalIndex`]: in-process HNSW index, rebuilt from the chunks table
//! - [`PineconeIndex`]: Pinecone REST data plane
//!
//! # Examples
//!
//! ```no_run
//! use deontica_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! assert!(store.ping().is_ok());
//! ```

#![warn(missing_docs)]

pub mod pinecone;
pub mod vector_index;

use deontica_domain::traits::{ChatLog, ClauseFilter, ClauseStore, IndexRecord};
use deontica_domain::{ChatRole, ChatTurn, Clause, ClauseId, RetrievedContext};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

pub use pinecone::PineconeIndex;
pub use vector_index::{IndexError, LocalIndex};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored document could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Another clause already has this text and article
    #[error("Clause conflict: {0}")]
    Conflict(String),
}

/// SQLite-backed document store
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Share a store behind a mutex, or
/// open one store per thread.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a store at the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    /// Check that the database answers queries
    pub fn ping(&self) -> Result<(), StoreError> {
        self.conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// Number of stored clause documents
    pub fn clause_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM clauses", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Insert or replace ingested chunks; returns how many were written
    pub fn save_chunks(&mut self, records: &[IndexRecord]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks
                 (id, doc_id, text, article_id, source_uri, source_version, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                 doc_id = excluded.doc_id, text = excluded.text, article_id = excluded.article_id,
                 source_uri = excluded.source_uri, source_version = excluded.source_version,
                 embedding = excluded.embedding",
            )?;
            for record in records {
                stmt.execute(params![
                    &record.id,
                    &record.doc_id,
                    &record.context.text,
                    &record.context.article_id,
                    &record.context.source_uri,
                    &record.context.source_version,
                    encode_vector(&record.values),
                ])?;
            }
        }
        tx.commit()?;
        debug!(count = records.len(), "Saved chunks");
        Ok(records.len())
    }

    /// Load every stored chunk, in insertion order
    pub fn load_chunks(&self) -> Result<Vec<IndexRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, doc_id, text, article_id, source_uri, source_version, embedding
             FROM chunks ORDER BY rowid",
        )?;

        let rows = stmt.query_map([], |row| {
            let blob: Vec<u8> = row.get(6)?;
            Ok((
                IndexRecord {
                    id: row.get(0)?,
                    doc_id: row.get(1)?,
                    values: Vec::new(),
                    context: RetrievedContext {
                        text: row.get(2)?,
                        article_id: row.get(3)?,
                        source_uri: row.get(4)?,
                        source_version: row.get(5)?,
                        score: None,
                    },
                },
                blob,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (mut record, blob) = row?;
            record.values = decode_vector(&blob)?;
            records.push(record);
        }
        Ok(records)
    }

    fn load_clause(id: &str, document: &str) -> Result<Clause, StoreError> {
        let mut clause: Clause = serde_json::from_str(document)?;
        clause.clause_id = ClauseId::from_string(id).map_err(StoreError::InvalidData)?;
        Ok(clause)
    }

    /// Id of the clause stored under this text and article, other than `id`
    fn clashing_clause(&self, id: &str, clause: &Clause) -> Result<Option<String>, StoreError> {
        let other = self
            .conn
            .query_row(
                "SELECT id FROM clauses WHERE text = ?1 AND article_key = ?2 AND id != ?3",
                params![&clause.text, article_key(clause), id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(other)
    }

    fn write_document(&mut self, id: &str, clause: &Clause) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE clauses SET text = ?2, article_key = ?3, modality = ?4, actor = ?5,
             actor_canonical = ?6, document = ?7, updated_at = ?8 WHERE id = ?1",
            params![
                id,
                &clause.text,
                article_key(clause),
                clause.modality.map(|m| m.as_str()),
                &clause.actor,
                &clause.actor_canonical,
                serde_json::to_string(clause)?,
                now_millis(),
            ],
        )?;
        Ok(())
    }
}

fn article_key(clause: &Clause) -> &str {
    clause.article_id.as_deref().unwrap_or("")
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn encode_vector(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, StoreError> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::InvalidData(format!(
            "Embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

impl ClauseStore for SqliteStore {
    type Error = StoreError;

    fn upsert_clause(&mut self, clause: &Clause) -> Result<ClauseId, Self::Error> {
        let document = serde_json::to_string(clause)?;

        self.conn.execute(
            "INSERT INTO clauses
             (id, text, article_key, modality, actor, actor_canonical, document, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(text, article_key) DO UPDATE SET
             modality = excluded.modality, actor = excluded.actor,
             actor_canonical = excluded.actor_canonical, document = excluded.document,
             updated_at = excluded.updated_at",
            params![
                clause.clause_id.to_string(),
                &clause.text,
                article_key(clause),
                clause.modality.map(|m| m.as_str()),
                &clause.actor,
                &clause.actor_canonical,
                &document,
                now_millis(),
            ],
        )?;

        let id: String = self.conn.query_row(
            "SELECT id FROM clauses WHERE text = ?1 AND article_key = ?2",
            params![&clause.text, article_key(clause)],
            |row| row.get(0),
        )?;

        debug!(clause_id = %id, "Upserted clause");
        ClauseId::from_string(&id).map_err(StoreError::InvalidData)
    }

    fn get_clause(&self, id: ClauseId) -> Result<Option<Clause>, Self::Error> {
        let id = id.to_string();
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM clauses WHERE id = ?1",
                params![&id],
                |row| row.get(0),
            )
            .optional()?;

        document
            .map(|doc| Self::load_clause(&id, &doc))
            .transpose()
    }

    fn query_clauses(&self, filter: &ClauseFilter) -> Result<Vec<Clause>, Self::Error> {
        let mut sql = String::from("SELECT id, document FROM clauses WHERE 1=1");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(modality) = filter.modality {
            sql.push_str(" AND modality = ?");
            params.push(Box::new(modality.as_str()));
        }

        if let Some(article) = &filter.article_id {
            sql.push_str(" AND article_key = ?");
            params.push(Box::new(article.clone()));
        }

        if let Some(actor) = &filter.actor {
            sql.push_str(" AND actor = ?");
            params.push(Box::new(actor.clone()));
        }

        if let Some(actor) = &filter.actor_canonical {
            sql.push_str(" AND actor_canonical = ?");
            params.push(Box::new(actor.clone()));
        }

        sql.push_str(" ORDER BY updated_at DESC, rowid DESC");

        // SQLite's lower() folds ASCII only, so text search and its limit run here.
        let search = filter.search.as_deref().map(str::to_lowercase);
        if let (Some(limit), None) = (filter.limit, &search) {
            sql.push_str(" LIMIT ?");
            params.push(Box::new(limit as i64));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(&param_refs[..], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut clauses = Vec::new();
        for (id, doc) in &rows {
            if filter.limit.is_some_and(|limit| clauses.len() >= limit) {
                break;
            }
            let clause = Self::load_clause(id, doc)?;
            if search
                .as_deref()
                .is_some_and(|needle| !clause.text.to_lowercase().contains(needle))
            {
                continue;
            }
            clauses.push(clause);
        }
        Ok(clauses)
    }

    fn patch_clause(
        &mut self,
        id: ClauseId,
        patch: &Map<String, Value>,
    ) -> Result<bool, Self::Error> {
        let Some(mut clause) = self.get_clause(id)? else {
            return Ok(false);
        };

        let applied = clause.apply_patch(patch);
        let id = id.to_string();
        if let Some(other) = self.clashing_clause(&id, &clause)? {
            return Err(StoreError::Conflict(format!(
                "clause {} already has this text and article",
                other
            )));
        }

        debug!(clause_id = %id, fields = ?applied, "Patched clause");
        self.write_document(&id, &clause)?;
        Ok(true)
    }
}

impl ChatLog for SqliteStore {
    type Error = StoreError;

    fn append_turn(&mut self, turn: &ChatTurn) -> Result<(), Self::Error> {
        let created_at = if turn.created_at == 0 {
            now_secs()
        } else {
            turn.created_at
        };

        self.conn.execute(
            "INSERT INTO chats (thread_id, role, content, retrieval_log, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &turn.thread_id,
                turn.role.as_str(),
                &turn.content,
                serde_json::to_string(&turn.retrieval_log)?,
                created_at as i64,
            ],
        )?;
        Ok(())
    }

    fn thread(&self, thread_id: &str) -> Result<Vec<ChatTurn>, Self::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT thread_id, role, content, retrieval_log, created_at
             FROM chats WHERE thread_id = ?1 ORDER BY seq",
        )?;

        let rows = stmt
            .query_map(params![thread_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(thread_id, role, content, log, created_at)| {
                let role = ChatRole::parse(&role)
                    .ok_or_else(|| {
                        StoreError::InvalidData(format!("Unknown chat role: {}", role))
                    })?;
                Ok(ChatTurn {
                    thread_id,
                    role,
                    content,
                    retrieval_log: serde_json::from_str(&log)?,
                    created_at: created_at as u64,
                })
            })
            .collect()
    }
}
