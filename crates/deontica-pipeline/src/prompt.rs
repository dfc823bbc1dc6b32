//! Stage prompts
//!
//! Every model call is one user message: the stage instructions, a fixed
//! JSON-only reminder, and the stage payload serialized as JSON.

use serde_json::Value;

/// Reminder appended to every stage prompt
pub const JSON_ONLY: &str = "Return ONLY a single JSON object.";

/// A pipeline stage that consults the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Split retrieved text into atomic clauses
    Segment,
    /// Extract modality, actor, action and conditions
    Classify,
    /// Normalize the actor against defined terms
    Definitions,
    /// Find references to other articles and annexes
    CrossReference,
    /// Render the clause in Standard Deontic Logic
    Formalize,
    /// Judge completeness and consistency
    Validate,
    /// Pick a route for a clause that failed validation
    Ambiguity,
    /// Write the user-facing answer
    Answer,
}

impl Stage {
    /// Stage name used in logs and provenance
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Segment => "segment",
            Stage::Classify => "classify",
            Stage::Definitions => "definitions",
            Stage::CrossReference => "xref",
            Stage::Formalize => "formalize",
            Stage::Validate => "validate",
            Stage::Ambiguity => "ambiguity",
            Stage::Answer => "answer",
        }
    }

    /// Instructions sent to the model for this stage
    pub fn instructions(&self) -> &'static str {
        match self {
            Stage::Segment => SEGMENT_INSTRUCTIONS,
            Stage::Classify => CLASSIFY_INSTRUCTIONS,
            Stage::Definitions => DEFINITIONS_INSTRUCTIONS,
            Stage::CrossReference => XREF_INSTRUCTIONS,
            Stage::Formalize => FORMALIZE_INSTRUCTIONS,
            Stage::Validate => VALIDATE_INSTRUCTIONS,
            Stage::Ambiguity => AMBIGUITY_INSTRUCTIONS,
            Stage::Answer => ANSWER_INSTRUCTIONS,
        }
    }
}

/// Builds the message sent to the model for one stage
pub struct PromptBuilder<'a> {
    stage: Stage,
    payload: &'a Value,
}

impl<'a> PromptBuilder<'a> {
    /// Create a prompt for `stage` carrying `payload`
    pub fn new(stage: Stage, payload: &'a Value) -> Self {
        Self { stage, payload }
    }

    /// Build the complete prompt
    pub fn build(&self) -> String {
        let payload = serde_json::to_string(self.payload).unwrap_or_else(|_| "{}".to_string());
        format!(
            "{}\n\n{}\n\nINPUT:\n{}",
            self.stage.instructions(),
            JSON_ONLY,
            payload
        )
    }
}

const SEGMENT_INSTRUCTIONS: &str = r#"Split the legal text into atomic normative clauses.
Reply with a JSON list such as [{"text": "...", "article_id": "Art 10(2)"}], or {"clauses": [...]}.
Rules:
- Quote the original wording; never paraphrase.
- Start a new clause at each change of normative force ("shall", "must", "is prohibited", "may").
- Keep scope and conditions with the clause they restrict."#;

const CLASSIFY_INSTRUCTIONS: &str = r#"Classify the clause and extract its structure as JSON:
{
  "modality": "OBLIGATION|PROHIBITION|PERMISSION|EXEMPTION|RECOMMENDATION",
  "actor": "...", "action_verb": "...", "object": "...",
  "condition": null or "...", "exceptions": [], "scope": {},
  "confidence": 0..1
}
When unsure, leave a field null and describe the doubt in
"ambiguity": [{"type": "...", "severity": "low|medium|high", "notes": "..."}]."#;

const DEFINITIONS_INSTRUCTIONS: &str = r#"Normalize the clause actor against the defined terms in the supplied context.
Return:
{
  "actor_canonical": "AI_Act.Provider" or null,
  "definition_hits": [{"term": "provider", "article": "Art 3(3)"}],
  "notes": "..."
}"#;

const XREF_INSTRUCTIONS: &str = r#"List the cross-references in the clause text, for example "subject to Article 6(2)" or "as listed in Annex III".
Return:
{
  "xref_links": [{"target": "Art 6(2)", "type": "subject_to"}],
  "imported_conditions": ["..."],
  "notes": "..."
}"#;

const FORMALIZE_INSTRUCTIONS: &str = r#"Formalize the clause JSON in Standard Deontic Logic.
Return:
{
  "json_updated": {optional patch of clause fields},
  "formula": "O(Actor -> Action [& Condition]) | F(Actor -> Action) | P(Action)",
  "confidence": 0..1
}
Use short Actor and Action tokens and only the O, F and P operators."#;

const VALIDATE_INSTRUCTIONS: &str = r#"Check the clause JSON and its formula for completeness and consistency.
Return:
{"pass": bool, "retriable": bool, "errors": [{"code": "...", "msg": "..."}], "confidence": 0..1}
Fail when a required field is missing or the formula is malformed."#;

const AMBIGUITY_INSTRUCTIONS: &str = r#"The clause below failed validation. Choose how to proceed:
{"route": "REFINE" | "REVIEW" | "ACCEPT_LOW_CONF", "reason": "..."}
REFINE when the problem is formatting or structure that another attempt can fix.
REVIEW when meaning is missing or a definition is unresolved.
ACCEPT_LOW_CONF when the problem is minor and confidence is at least 0.7."#;

const ANSWER_INSTRUCTIONS: &str = r#"Answer the question from the clause and contexts only; cite article ids.
Return:
{"answer": "<short grounded summary as bullets, with article ids>"}"#;
