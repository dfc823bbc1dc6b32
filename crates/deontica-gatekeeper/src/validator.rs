//! Clause validation logic

use crate::{RefineBudget, ValidationConfig};
use deontica_domain::{coerce, Clause, Route};
use serde_json::{json, Value};
use tracing::debug;

/// A completeness problem found without asking the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalIssue {
    /// No modality extracted
    MissingModality,
    /// Neither an actor nor a canonical actor extracted
    MissingActor,
    /// No deontic formula present
    MissingFormula,
    /// Neither an action verb nor an object extracted
    MissingAction,
}

impl LocalIssue {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            LocalIssue::MissingModality => "missing_modality",
            LocalIssue::MissingActor => "missing_actor",
            LocalIssue::MissingFormula => "missing_formula",
            LocalIssue::MissingAction => "missing_action",
        }
    }

    /// Human-readable message
    pub fn message(&self) -> &'static str {
        match self {
            LocalIssue::MissingModality => "No modality extracted.",
            LocalIssue::MissingActor => "No actor extracted.",
            LocalIssue::MissingFormula => "No SDL formula present.",
            LocalIssue::MissingAction => "No action or object extracted.",
        }
    }

    /// Error object in the same shape the model reports errors
    pub fn to_value(&self) -> Value {
        json!({"code": self.code(), "msg": self.message()})
    }
}

/// Outcome of the local checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalReport {
    /// Issues found, in check order
    pub issues: Vec<LocalIssue>,
}

impl LocalReport {
    /// Whether every enabled check passed
    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }

    /// Error codes of the issues found
    pub fn codes(&self) -> Vec<&'static str> {
        self.issues.iter().map(LocalIssue::code).collect()
    }
}

/// The model's validation report, normalized
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteReport {
    /// Whether the model judged the clause valid (absent → false)
    pub pass: bool,

    /// Whether another formalization attempt could help (absent → true)
    pub retriable: bool,

    /// Reported errors
    pub errors: Vec<Value>,

    /// Reported confidence, if it could be read as a number
    pub confidence: Option<f64>,
}

impl Default for RemoteReport {
    fn default() -> Self {
        Self {
            pass: false,
            retriable: true,
            errors: Vec::new(),
            confidence: None,
        }
    }
}

impl RemoteReport {
    /// Normalize a model reply
    ///
    /// A non-object reply yields the defaults. An `errors` value that is not
    /// a list is wrapped as a single `validator_nonlist_errors` error.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let errors = match obj.get("errors") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => {
                let msg = match other {
                    Value::String(s) => s.clone(),
                    v => v.to_string(),
                };
                vec![json!({"code": "validator_nonlist_errors", "msg": msg})]
            }
        };

        Self {
            pass: coerce::flag(obj.get("pass"), false),
            retriable: coerce::flag(obj.get("retriable"), true),
            errors,
            confidence: obj.get("confidence").and_then(coerce::confidence),
        }
    }
}

/// Merged validation outcome
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    /// Local pass and remote pass
    pub passed: bool,

    /// Local errors followed by the model's errors
    pub errors: Vec<Value>,

    /// Route chosen for the clause
    pub route: Route,
}

/// Route a validation outcome
///
/// Passed → `OK`. Otherwise, if the failure is retriable and the budget
/// still has room, one unit is consumed and the route is `REFINE`;
/// anything else is `REVIEW`.
pub fn decide(passed: bool, retriable: bool, budget: &mut RefineBudget) -> Route {
    if passed {
        Route::Ok
    } else if retriable && budget.try_consume() {
        Route::Refine
    } else {
        Route::Review
    }
}

/// The Gatekeeper checks clauses before an answer is built on them
#[derive(Debug, Clone, Default)]
pub struct Gatekeeper {
    config: ValidationConfig,
}

impl Gatekeeper {
    /// Create a new Gatekeeper with the given configuration
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Run the enabled local checks
    pub fn check(&self, clause: &Clause) -> LocalReport {
        let mut issues = Vec::new();

        if self.config.require_modality && clause.modality.is_none() {
            issues.push(LocalIssue::MissingModality);
        }

        if self.config.require_actor && !clause.has_actor() {
            issues.push(LocalIssue::MissingActor);
        }

        if self.config.require_formula && clause.deontic_formula().is_none() {
            issues.push(LocalIssue::MissingFormula);
        }

        if self.config.require_action
            && !has_text(&clause.action_verb)
            && !has_text(&clause.object)
        {
            issues.push(LocalIssue::MissingAction);
        }

        LocalReport { issues }
    }

    /// Merge local checks with the model's report and pick a route
    pub fn evaluate(
        &self,
        clause: &Clause,
        remote: &RemoteReport,
        budget: &mut RefineBudget,
    ) -> ValidationResult {
        let local = self.check(clause);
        let passed = local.passed() && remote.pass;

        let mut errors: Vec<Value> = local.issues.iter().map(LocalIssue::to_value).collect();
        errors.extend(remote.errors.iter().cloned());

        let route = decide(passed, remote.retriable, budget);

        debug!(
            local = ?local.codes(),
            remote_pass = remote.pass,
            retriable = remote.retriable,
            refines_used = budget.used(),
            route = %route,
            "Validated clause"
        );

        ValidationResult {
            passed,
            errors,
            route,
        }
    }
}

fn has_text(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deontica_domain::Modality;

    fn complete_clause() -> Clause {
        let mut c = Clause::new("Providers shall keep logs.");
        c.modality = Some(Modality::Obligation);
        c.actor = Some("provider".to_string());
        c.action_verb = Some("keep".to_string());
        c.set_deontic_formula(Some("O(provider -> keep_logs)".to_string()));
        c
    }

    #[test]
    fn test_empty_clause_fails_all_default_checks() {
        let report = Gatekeeper::default().check(&Clause::new("x"));
        assert_eq!(
            report.codes(),
            vec!["missing_modality", "missing_actor", "missing_formula"]
        );
    }

    #[test]
    fn test_canonical_actor_is_enough() {
        let mut c = complete_clause();
        c.actor = None;
        c.actor_canonical = Some("AI_Act.Provider".to_string());
        assert!(Gatekeeper::default().check(&c).passed());
    }

    #[test]
    fn test_blank_canonical_actor_keeps_worded_actor() {
        let mut c = complete_clause();
        c.actor_canonical = Some(String::new());
        assert!(Gatekeeper::default().check(&c).passed());
    }

    #[test]
    fn test_strict_requires_action() {
        let mut c = complete_clause();
        c.action_verb = None;
        assert!(Gatekeeper::default().check(&c).passed());
        let report = Gatekeeper::new(ValidationConfig::strict()).check(&c);
        assert_eq!(report.issues, vec![LocalIssue::MissingAction]);
    }

    #[test]
    fn test_disabled_checks_are_skipped() {
        let report = Gatekeeper::new(ValidationConfig::permissive()).check(&Clause::new("x"));
        assert_eq!(report.issues, vec![LocalIssue::MissingModality]);
    }

    #[test]
    fn test_remote_defaults() {
        let report = RemoteReport::from_value(&json!({}));
        assert!(!report.pass);
        assert!(report.retriable);
        assert!(report.errors.is_empty());
        assert!(report.confidence.is_none());

        let report = RemoteReport::from_value(&json!("not an object"));
        assert_eq!(report, RemoteReport::default());
    }

    #[test]
    fn test_remote_nonlist_errors_wrapped() {
        let report = RemoteReport::from_value(&json!({"errors": "formula does not match text"}));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0]["code"], "validator_nonlist_errors");
        assert_eq!(report.errors[0]["msg"], "formula does not match text");
    }

    #[test]
    fn test_remote_confidence_is_lenient() {
        assert_eq!(
            RemoteReport::from_value(&json!({"confidence": "0.75"})).confidence,
            Some(0.75)
        );
        assert_eq!(
            RemoteReport::from_value(&json!({"confidence": "high"})).confidence,
            None
        );
    }

    #[test]
    fn test_evaluate_ok() {
        let mut budget = RefineBudget::default();
        let remote = RemoteReport::from_value(&json!({"pass": true, "errors": []}));
        let result = Gatekeeper::default().evaluate(&complete_clause(), &remote, &mut budget);
        assert!(result.passed);
        assert_eq!(result.route, Route::Ok);
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn test_evaluate_merges_errors_local_first() {
        let mut budget = RefineBudget::default();
        let remote = RemoteReport::from_value(&json!({
            "pass": false,
            "errors": [{"code": "actor_mismatch", "msg": "actor differs from text"}]
        }));
        let result = Gatekeeper::default().evaluate(&Clause::new("x"), &remote, &mut budget);
        assert_eq!(result.errors.len(), 4);
        assert_eq!(result.errors[0]["code"], "missing_modality");
        assert_eq!(result.errors[3]["code"], "actor_mismatch");
    }

    #[test]
    fn test_non_retriable_goes_to_review() {
        let mut budget = RefineBudget::default();
        let remote = RemoteReport::from_value(&json!({"pass": false, "retriable": false}));
        let result = Gatekeeper::default().evaluate(&complete_clause(), &remote, &mut budget);
        assert_eq!(result.route, Route::Review);
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn test_refine_until_budget_exhausted() {
        let mut budget = RefineBudget::default();
        assert_eq!(decide(false, true, &mut budget), Route::Refine);
        assert_eq!(decide(false, true, &mut budget), Route::Refine);
        assert_eq!(decide(false, true, &mut budget), Route::Review);
        assert_eq!(budget.used(), 2);
    }
}
