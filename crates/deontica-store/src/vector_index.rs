//! Local HNSW vector index
//!
//! An in-process nearest-neighbour index over ingested chunks, used when no
//! hosted vector database is configured.
//!
//! # Architecture
//!
//! - The HNSW graph lives in memory only
//! - When opened on a database file, every upsert is also written to the
//!   `chunks` table and the graph is rebuilt from it on open
//! - The dimension is fixed by the first vector inserted
//!
//! # HNSW Parameters
//!
//! - **M**: bi-directional links per node (16)
//! - **efConstruction**: candidate list size while building (200)
//! - **efSearch**: candidate list size while querying (at least 64)

use crate::{SqliteStore, StoreError};
use deontica_domain::traits::{IndexRecord, VectorIndex};
use deontica_domain::RetrievedContext;
use hnsw_rs::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_M: usize = 16;
const DEFAULT_EF_CONSTRUCTION: usize = 200;
const DEFAULT_EF_SEARCH: usize = 64;
const DEFAULT_MAX_ELEMENTS: usize = 1_000_000;

/// Errors that can occur during vector index operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// Vector does not match the index dimension
    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension provided
        actual: usize,
    },

    /// Backing chunk store failed
    #[error("Chunk store error: {0}")]
    Store(#[from] StoreError),

    /// Remote index could not be reached
    #[error("Communication error: {0}")]
    Communication(String),

    /// Remote index answered with an error or an unreadable body
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

struct Graph {
    dimension: Option<usize>,
    hnsw: Hnsw<'static, f32, DistCosine>,
    entries: HashMap<usize, RetrievedContext>,
    by_record: HashMap<String, usize>,
    next_id: usize,
}

impl Graph {
    fn new() -> Self {
        let nb_layer = 16.min((DEFAULT_MAX_ELEMENTS as f32).ln().trunc() as usize);
        let hnsw = Hnsw::<'static, f32, DistCosine>::new(
            DEFAULT_M,
            DEFAULT_MAX_ELEMENTS,
            nb_layer,
            DEFAULT_EF_CONSTRUCTION,
            DistCosine {},
        );
        Self {
            dimension: None,
            hnsw,
            entries: HashMap::new(),
            by_record: HashMap::new(),
            next_id: 0,
        }
    }

    fn check_dimension(&self, actual: usize) -> Result<(), IndexError> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(IndexError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    /// Insert a record; a record id seen before replaces the earlier entry
    fn insert(&mut self, record: &IndexRecord) -> Result<(), IndexError> {
        self.check_dimension(record.values.len())?;
        self.dimension.get_or_insert(record.values.len());

        let internal_id = self.next_id;
        self.next_id += 1;

        // HNSW has no delete; the old node stays in the graph but no longer maps to anything.
        if let Some(stale) = self.by_record.insert(record.id.clone(), internal_id) {
            self.entries.remove(&stale);
        }
        self.entries.insert(internal_id, record.context.clone());
        self.hnsw.insert((record.values.as_slice(), internal_id));
        Ok(())
    }

    fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedContext>, IndexError> {
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        self.check_dimension(vector.len())?;

        let stale = self.next_id - self.entries.len();
        let knbn = top_k + stale;
        let neighbours = self.hnsw.search(vector, knbn, DEFAULT_EF_SEARCH.max(knbn));

        let mut results: Vec<RetrievedContext> = neighbours
            .into_iter()
            .filter_map(|neighbour| {
                self.entries.get(&neighbour.d_id).map(|context| {
                    // cosine distance -> cosine similarity
                    context.clone().with_score(1.0 - neighbour.distance)
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .partial_cmp(&a.score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        Ok(results)
    }
}

/// In-process HNSW implementation of [`VectorIndex`]
///
/// # Examples
///
/// ```
/// use deontica_store::LocalIndex;
/// use deontica_domain::traits::{IndexRecord, VectorIndex};
/// use deontica_domain::RetrievedContext;
///
/// let index = LocalIndex::new();
/// index.upsert(&[IndexRecord {
///     id: "doc:0".to_string(),
///     doc_id: "doc".to_string(),
///     values: vec![1.0, 0.0, 0.0],
///     context: RetrievedContext::new("Providers shall keep logs."),
/// }]).unwrap();
///
/// let hits = index.query(&[1.0, 0.0, 0.0], 3).unwrap();
/// assert_eq!(hits[0].text, "Providers shall keep logs.");
/// ```
pub struct LocalIndex {
    graph: Mutex<Graph>,
    chunks: Option<Mutex<SqliteStore>>,
}

impl LocalIndex {
    /// Create an empty, memory-only index
    pub fn new() -> Self {
        Self {
            graph: Mutex::new(Graph::new()),
            chunks: None,
        }
    }

    /// Open an index backed by the `chunks` table of a database file
    ///
    /// Stored chunks are loaded into the graph; later upserts are written
    /// through to the table.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let store = SqliteStore::new(path)?;
        let records = store.load_chunks()?;

        let mut graph = Graph::new();
        for record in &records {
            graph.insert(record)?;
        }
        info!(chunks = records.len(), "Rebuilt local vector index");

        Ok(Self {
            graph: Mutex::new(graph),
            chunks: Some(Mutex::new(store)),
        })
    }

    /// Number of live records in the index
    pub fn len(&self) -> usize {
        lock(&self.graph).entries.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension fixed by the first inserted vector
    pub fn dimension(&self) -> Option<usize> {
        lock(&self.graph).dimension
    }
}

impl Default for LocalIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl VectorIndex for LocalIndex {
    type Error = IndexError;

    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedContext>, Self::Error> {
        lock(&self.graph).search(vector, top_k)
    }

    fn upsert(&self, records: &[IndexRecord]) -> Result<usize, Self::Error> {
        let mut graph = lock(&self.graph);

        // Validate the whole batch before touching the graph or the table.
        let mut expected = graph.dimension;
        for record in records {
            let actual = record.values.len();
            match expected {
                Some(dim) if dim != actual => {
                    return Err(IndexError::DimensionMismatch { expected: dim, actual })
                }
                _ => expected = Some(actual),
            }
        }

        if let Some(chunks) = &self.chunks {
            lock(chunks).save_chunks(records)?;
        }
        for record in records {
            graph.insert(record)?;
        }

        debug!(count = records.len(), total = graph.entries.len(), "Upserted into local index");
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, values: Vec<f32>, text: &str) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            doc_id: "doc".to_string(),
            values,
            context: RetrievedContext::new(text),
        }
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = LocalIndex::new();
        assert!(index.is_empty());
        assert!(index.dimension().is_none());
        assert!(index.query(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_cosine_ordering() {
        let index = LocalIndex::new();
        index
            .upsert(&[
                record("a", vec![1.0, 0.0, 0.0], "x axis"),
                record("b", vec![0.0, 1.0, 0.0], "y axis"),
                record("c", vec![0.7071, 0.7071, 0.0], "diagonal"),
            ])
            .unwrap();

        let results = index.query(&[1.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].text, "x axis");
        assert!(results[0].score.unwrap() > 0.99);
        assert_eq!(results[1].text, "diagonal");
        assert!(results[1].score.unwrap() > 0.5);
        assert_eq!(results[2].text, "y axis");
        assert!(results[2].score.unwrap() < 0.1);
    }

    #[test]
    fn test_dimension_fixed_by_first_vector() {
        let index = LocalIndex::new();
        index.upsert(&[record("a", vec![1.0, 0.0, 0.0], "a")]).unwrap();
        assert_eq!(index.dimension(), Some(3));

        let result = index.upsert(&[record("b", vec![1.0, 0.0], "b")]);
        assert!(matches!(
            result,
            Err(IndexError::DimensionMismatch { expected: 3, actual: 2 })
        ));
        assert_eq!(index.len(), 1);

        let result = index.query(&[1.0], 1);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_mixed_batch_is_rejected_whole() {
        let index = LocalIndex::new();
        let result = index.upsert(&[
            record("a", vec![1.0, 0.0], "a"),
            record("b", vec![1.0, 0.0, 0.0], "b"),
        ]);
        assert!(result.is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_upsert_replaces_same_id() {
        let index = LocalIndex::new();
        index.upsert(&[record("a", vec![1.0, 0.0], "old text")]).unwrap();
        index.upsert(&[record("a", vec![1.0, 0.0], "new text")]).unwrap();

        assert_eq!(index.len(), 1);
        let results = index.query(&[1.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "new text");
    }
}
