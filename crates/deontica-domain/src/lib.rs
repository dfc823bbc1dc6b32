//! Deontica Domain Layer
//!
//! Core data model shared by every stage of the clause pipeline. It defines
//! the record that is threaded through retrieval, classification,
//! formalization and validation, plus the trait interfaces that the
//! infrastructure crates implement.
//!
//! ## Key Concepts
//!
//! - **Clause**: a single normative provision and everything the pipeline
//!   has learned about it so far
//! - **Modality**: the normative force of a clause (obligation, prohibition, ...)
//! - **Route**: the outcome of validation (`OK`, `REFINE`, `REVIEW`)
//! - **Retrieved context**: a scored text snippet returned by the vector index
//! - **Chat turn**: one persisted message of a conversation thread
//!
//! ## Architecture
//!
//! - Pure data and coercion logic only
//! - No I/O; stores, indexes and model providers live in other crates
//! - Trait definitions for all external interactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chat;
pub mod clause;
pub mod coerce;
pub mod context;
pub mod modality;
pub mod route;
pub mod traits;

// Re-exports for convenience
pub use chat::{ChatRole, ChatTurn};
pub use clause::{Clause, ClauseId, DEONTIC_FORMULA};
pub use context::RetrievedContext;
pub use modality::Modality;
pub use route::Route;
