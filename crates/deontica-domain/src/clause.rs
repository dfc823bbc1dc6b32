//! Clause module - the record threaded through the pipeline

use crate::coerce;
use crate::modality::Modality;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Key under which the SDL formula of a clause is stored in `formulas`
pub const DEONTIC_FORMULA: &str = "deontic";

/// Unique identifier for a clause (UUIDv7, so ids sort by creation time)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClauseId(uuid::Uuid);

impl ClauseId {
    /// Generate a new ClauseId
    ///
    /// # Examples
    ///
    /// ```
    /// use deontica_domain::ClauseId;
    ///
    /// let a = ClauseId::new();
    /// let b = ClauseId::new();
    /// assert_ne!(a, b);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Parse a ClauseId from its string form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| format!("Invalid clause id: {}", e))
    }
}

impl Default for ClauseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClauseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A legal clause and everything the pipeline has extracted about it
///
/// Every field except `clause_id` and `text` is filled opportunistically by
/// model calls and may stay unset for the whole run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Clause {
    /// Unique identifier
    pub clause_id: ClauseId,

    /// Source article reference (e.g. "Art 10(2)")
    pub article_id: Option<String>,

    /// Raw clause text, original wording
    pub text: String,

    /// Normative force
    pub modality: Option<Modality>,

    /// Actor as worded in the text
    pub actor: Option<String>,

    /// Actor normalized against the regulation's definitions
    pub actor_canonical: Option<String>,

    /// Main verb of the regulated action
    pub action_verb: Option<String>,

    /// Object of the action
    pub object: Option<String>,

    /// Condition under which the clause applies
    pub condition: Option<String>,

    /// Exceptions carved out of the clause
    pub exceptions: Vec<String>,

    /// Free-form scoping information
    pub scope: Option<Value>,

    /// Named dates (entry into force, application, ...)
    pub timeline: Option<BTreeMap<String, Option<String>>>,

    /// Logical renderings keyed by notation name
    pub formulas: BTreeMap<String, String>,

    /// Confidence scores keyed by stage name
    pub confidence: BTreeMap<String, f64>,

    /// Ambiguity annotations
    pub ambiguity: Vec<Value>,

    /// Trace metadata accumulated by each stage
    pub provenance: Map<String, Value>,
}

impl Clause {
    /// Create a clause with only its text set
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Set the article reference
    pub fn with_article(mut self, article_id: Option<String>) -> Self {
        self.article_id = article_id.filter(|a| !a.trim().is_empty());
        self
    }

    /// The actor to display: canonical form first, then the worded one
    pub fn display_actor(&self) -> Option<&str> {
        fn present(actor: &Option<String>) -> Option<&str> {
            actor.as_deref().filter(|a| !a.trim().is_empty())
        }
        present(&self.actor_canonical).or_else(|| present(&self.actor))
    }

    /// Whether any actor (worded or canonical) has been extracted
    pub fn has_actor(&self) -> bool {
        self.display_actor().is_some()
    }

    /// The SDL formula, if one has been produced
    pub fn deontic_formula(&self) -> Option<&str> {
        self.formulas
            .get(DEONTIC_FORMULA)
            .map(String::as_str)
            .filter(|f| !f.trim().is_empty())
    }

    /// Replace the SDL formula; `None` or a blank formula removes it
    pub fn set_deontic_formula(&mut self, formula: Option<String>) {
        match formula.filter(|f| !f.trim().is_empty()) {
            Some(f) => {
                self.formulas.insert(DEONTIC_FORMULA.to_string(), f.trim().to_string());
            }
            None => {
                self.formulas.remove(DEONTIC_FORMULA);
            }
        }
    }

    /// Record the confidence reported by a stage
    pub fn set_confidence(&mut self, stage: &str, value: f64) {
        self.confidence.insert(stage.to_string(), value);
    }

    /// Record a provenance entry, replacing any previous value under `key`
    pub fn record_provenance(&mut self, key: &str, value: Value) {
        self.provenance.insert(key.to_string(), value);
    }

    /// Append imported conditions to the clause condition, joined with ` AND `
    pub fn append_conditions(&mut self, conditions: &[String]) {
        let imported: Vec<&str> = conditions
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if imported.is_empty() {
            return;
        }
        let joined = imported.join(" AND ");
        self.condition = Some(match self.condition.take() {
            Some(existing) if !existing.trim().is_empty() => format!("{} AND {}", existing, joined),
            _ => joined,
        });
    }

    /// Serialize to a JSON value (used for prompts, storage and the API)
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Apply a JSON patch of field values
    ///
    /// Known fields are coerced leniently; unknown keys, `clause_id`, and
    /// values of the wrong shape are skipped. Returns the names of the fields
    /// that were applied.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Vec<String> {
        let mut applied = Vec::new();

        for (key, value) in patch {
            let ok = match key.as_str() {
                "text" => match coerce::optional_text(value) {
                    Some(Some(text)) => {
                        self.text = text;
                        true
                    }
                    _ => false,
                },
                "article_id" => set_text(&mut self.article_id, value),
                "actor" => set_text(&mut self.actor, value),
                "actor_canonical" => set_text(&mut self.actor_canonical, value),
                "action_verb" => set_text(&mut self.action_verb, value),
                "object" => set_text(&mut self.object, value),
                "condition" => set_text(&mut self.condition, value),
                "modality" => match value {
                    Value::Null => {
                        self.modality = None;
                        true
                    }
                    Value::String(s) => match Modality::parse(s) {
                        Some(m) => {
                            self.modality = Some(m);
                            true
                        }
                        None => false,
                    },
                    _ => false,
                },
                "exceptions" => match coerce::text_list(value) {
                    Some(list) => {
                        self.exceptions = list;
                        true
                    }
                    None => false,
                },
                "scope" => {
                    self.scope = match value {
                        Value::Null => None,
                        other => Some(other.clone()),
                    };
                    true
                }
                "timeline" => match value {
                    Value::Null => {
                        self.timeline = None;
                        true
                    }
                    Value::Object(map) => {
                        let timeline = map
                            .iter()
                            .filter_map(|(k, v)| coerce::optional_text(v).map(|t| (k.clone(), t)))
                            .collect();
                        self.timeline = Some(timeline);
                        true
                    }
                    _ => false,
                },
                "formulas" => match value {
                    Value::Object(map) => {
                        for (name, formula) in map {
                            if let Some(Some(text)) = coerce::optional_text(formula) {
                                self.formulas.insert(name.clone(), text);
                            }
                        }
                        true
                    }
                    _ => false,
                },
                "confidence" => match value {
                    Value::Object(map) => {
                        for (stage, score) in map {
                            if let Some(score) = coerce::confidence(score) {
                                self.confidence.insert(stage.clone(), score);
                            }
                        }
                        true
                    }
                    _ => false,
                },
                "ambiguity" => match coerce::value_list(value) {
                    Some(list) => {
                        self.ambiguity = list;
                        true
                    }
                    None => false,
                },
                "provenance" => match value {
                    Value::Object(map) => {
                        for (k, v) in map {
                            self.provenance.insert(k.clone(), v.clone());
                        }
                        true
                    }
                    _ => false,
                },
                _ => false,
            };

            if ok {
                applied.push(key.clone());
            }
        }

        applied
    }
}

fn set_text(field: &mut Option<String>, value: &Value) -> bool {
    match coerce::optional_text(value) {
        Some(text) => {
            *field = text;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_new_clause_is_mostly_empty() {
        let c = Clause::new("Providers shall keep logs.");
        assert_eq!(c.text, "Providers shall keep logs.");
        assert!(c.modality.is_none());
        assert!(!c.has_actor());
        assert!(c.deontic_formula().is_none());
        assert!(c.provenance.is_empty());
    }

    #[test]
    fn test_with_article_drops_blank() {
        let c = Clause::new("x").with_article(Some("  ".to_string()));
        assert!(c.article_id.is_none());
        let c = Clause::new("x").with_article(Some("Art 12".to_string()));
        assert_eq!(c.article_id.as_deref(), Some("Art 12"));
    }

    #[test]
    fn test_display_actor_prefers_canonical() {
        let mut c = Clause::new("x");
        c.actor = Some("the provider".to_string());
        assert_eq!(c.display_actor(), Some("the provider"));
        c.actor_canonical = Some("AI_Act.Provider".to_string());
        assert_eq!(c.display_actor(), Some("AI_Act.Provider"));
    }

    #[test]
    fn test_blank_canonical_actor_falls_back_to_worded() {
        let mut c = Clause::new("x");
        c.actor = Some("the deployer".to_string());
        c.actor_canonical = Some(String::new());
        assert_eq!(c.display_actor(), Some("the deployer"));
        assert!(c.has_actor());

        c.actor = Some("  ".to_string());
        assert_eq!(c.display_actor(), None);
    }

    #[test]
    fn test_set_deontic_formula() {
        let mut c = Clause::new("x");
        c.set_deontic_formula(Some("O(Provider -> keep_logs)".to_string()));
        assert_eq!(c.deontic_formula(), Some("O(Provider -> keep_logs)"));
        c.set_deontic_formula(Some("   ".to_string()));
        assert!(c.deontic_formula().is_none());
        assert!(!c.formulas.contains_key(DEONTIC_FORMULA));
    }

    #[test]
    fn test_append_conditions() {
        let mut c = Clause::new("x");
        c.append_conditions(&["the system is high-risk".to_string()]);
        assert_eq!(c.condition.as_deref(), Some("the system is high-risk"));
        c.append_conditions(&["placed on the market".to_string(), " ".to_string()]);
        assert_eq!(
            c.condition.as_deref(),
            Some("the system is high-risk AND placed on the market")
        );
        c.append_conditions(&[]);
        assert_eq!(
            c.condition.as_deref(),
            Some("the system is high-risk AND placed on the market")
        );
    }

    #[test]
    fn test_apply_patch_known_fields() {
        let mut c = Clause::new("x");
        let applied = c.apply_patch(&patch(json!({
            "modality": "obligation",
            "actor": "provider",
            "action_verb": "ensure",
            "object": "logging",
            "exceptions": "research purposes",
            "scope": {"systems": "high-risk"},
            "ambiguity": {"type": "vague_term", "severity": "low"},
            "formulas": {"deontic": "O(provider -> ensure_logging)"},
            "unknown": 42
        })));

        assert_eq!(c.modality, Some(Modality::Obligation));
        assert_eq!(c.actor.as_deref(), Some("provider"));
        assert_eq!(c.exceptions, vec!["research purposes".to_string()]);
        assert_eq!(c.ambiguity.len(), 1);
        assert_eq!(c.deontic_formula(), Some("O(provider -> ensure_logging)"));
        assert!(!applied.contains(&"unknown".to_string()));
        assert_eq!(applied.len(), 8);
    }

    #[test]
    fn test_apply_patch_ignores_clause_id_and_bad_shapes() {
        let mut c = Clause::new("original");
        let id = c.clause_id;
        let applied = c.apply_patch(&patch(json!({
            "clause_id": "00000000-0000-0000-0000-000000000000",
            "text": null,
            "modality": "SOMETIMES",
            "actor": ["not", "a", "string"]
        })));

        assert!(applied.is_empty());
        assert_eq!(c.clause_id, id);
        assert_eq!(c.text, "original");
        assert!(c.modality.is_none());
        assert!(c.actor.is_none());
    }

    #[test]
    fn test_apply_patch_null_clears() {
        let mut c = Clause::new("x");
        c.condition = Some("if deployed".to_string());
        c.apply_patch(&patch(json!({"condition": null})));
        assert!(c.condition.is_none());
    }

    #[test]
    fn test_apply_patch_confidence_is_lenient() {
        let mut c = Clause::new("x");
        c.apply_patch(&patch(json!({"confidence": {"classify": "0.7", "bad": "n/a"}})));
        assert_eq!(c.confidence.get("classify"), Some(&0.7));
        assert!(!c.confidence.contains_key("bad"));
    }

    #[test]
    fn test_deserialize_partial_document() {
        let c: Clause = serde_json::from_value(json!({
            "text": "Deployers shall monitor.",
            "modality": "OBLIGATION"
        }))
        .unwrap();
        assert_eq!(c.modality, Some(Modality::Obligation));
        assert!(c.formulas.is_empty());
    }

    #[test]
    fn test_clause_id_parse() {
        let id = ClauseId::new();
        assert_eq!(ClauseId::from_string(&id.to_string()).unwrap(), id);
        assert!(ClauseId::from_string("nope").is_err());
    }
}
