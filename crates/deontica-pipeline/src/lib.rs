//! Deontica Pipeline
//!
//! Answers questions about a regulation by extracting one normative clause
//! from retrieved text, formalizing it in Standard Deontic Logic, and
//! validating it before composing a grounded answer.
//!
//! # Architecture
//!
//! ```text
//! question → retrieve → segment → classify → definitions → xref
//!          → formalize ⇄ validate (≤ 2 refines, one ambiguity consult)
//!          → answer → chat log + clause store
//! ```
//!
//! Every model call goes through the same path: a stage prompt, a JSON-mode
//! completion, and a lenient parse. A stage whose call fails leaves the
//! clause as it was; only retrieval can fail a run.
//!
//! # Example Usage
//!
//! ```no_run
//! use deontica_llm::{MockEmbedder, MockProvider};
//! use deontica_pipeline::{Pipeline, PipelineConfig};
//! use deontica_store::{LocalIndex, SqliteStore};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(
//!     MockProvider::default(),
//!     MockEmbedder::new(8),
//!     LocalIndex::new(),
//!     SqliteStore::new(":memory:")?,
//!     PipelineConfig::default(),
//! )?;
//!
//! pipeline.ingest("Article 12\nProviders shall keep logs.", "eurlex:ai_act", "2024")?;
//! let outcome = pipeline.run("Who must keep logs?", "thread-1")?;
//! println!("{} ({})", outcome.answer, outcome.route);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod answer;
mod chunking;
mod config;
mod error;
mod ingest;
mod parser;
mod pipeline;
mod prompt;
mod stages;
mod state;

pub use answer::{collect_citations, fallback_answer, summarize_clause, FALLBACK_ANSWER};
pub use chunking::{document_id, extract_article_id, LegalTextSplitter, LEGAL_SEPARATORS};
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use ingest::{ingest_text, IngestReport};
pub use parser::{is_raw, parse_reply, RAW_MARKER};
pub use pipeline::Pipeline;
pub use prompt::{PromptBuilder, Stage, JSON_ONLY};
pub use state::{PipelineOutcome, RunState};
