//! Deontica Gatekeeper
//!
//! Decides whether a formalized clause is good enough to answer from.
//!
//! The Gatekeeper provides:
//! - Local completeness checks (modality, actor, formula)
//! - Lenient parsing of the model's validation report
//! - The refine budget shared by validation and ambiguity routing
//! - The routing decision (`OK`, `REFINE`, `REVIEW`)
//!
//! # Examples
//!
//! ```
//! use deontica_gatekeeper::{Gatekeeper, RefineBudget, RemoteReport, ValidationConfig};
//! use deontica_domain::{Clause, Route};
//! use serde_json::json;
//!
//! let gatekeeper = Gatekeeper::new(ValidationConfig::default());
//! let mut budget = RefineBudget::default();
//!
//! let clause = Clause::new("Providers shall keep logs.");
//! let remote = RemoteReport::from_value(&json!({"pass": true}));
//! let result = gatekeeper.evaluate(&clause, &remote, &mut budget);
//!
//! // Nothing extracted yet: local checks fail, first failure asks for a refinement
//! assert_eq!(result.route, Route::Refine);
//! assert_eq!(budget.used(), 1);
//! ```

#![warn(missing_docs)]

mod budget;
mod config;
mod validator;

pub use budget::{RefineBudget, MAX_REFINES};
pub use config::ValidationConfig;
pub use validator::{decide, Gatekeeper, LocalIssue, LocalReport, RemoteReport, ValidationResult};
