//! Parse model replies into JSON
//!
//! Replies are parsed leniently: markdown fences are stripped, JSON wrapped in
//! prose is dug out, and anything that still is not a JSON object or list is
//! kept as a raw answer so the user never gets a blank reply.

use serde_json::{json, Value};
use tracing::debug;

/// Key marking a reply that could not be parsed as JSON
pub const RAW_MARKER: &str = "_raw";

/// Parse a model reply
///
/// Returns the parsed object or list. A reply with prose around its JSON
/// yields the first embedded object (or list of objects). Any other reply
/// becomes `{"answer": <trimmed reply>, "_raw": true}`; a bare JSON string
/// is unwrapped first.
pub fn parse_reply(response: &str) -> Value {
    let body = extract_json(response);

    match serde_json::from_str::<Value>(body) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        Ok(Value::String(text)) => raw_answer(&text),
        Ok(_) => raw_answer(response),
        Err(e) => match embedded_json(body) {
            Some(value) => {
                debug!("Reply wraps JSON in prose; using the embedded value");
                value
            }
            None => {
                debug!(error = %e, "Reply is not JSON; keeping it as raw text");
                raw_answer(response)
            }
        },
    }
}

/// Whether a parsed reply is the raw-text fallback
pub fn is_raw(value: &Value) -> bool {
    value.get(RAW_MARKER).and_then(Value::as_bool).unwrap_or(false)
}

fn raw_answer(text: &str) -> Value {
    json!({"answer": text.trim(), RAW_MARKER: true})
}

/// Extract JSON from a reply, handling markdown code blocks
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the language tag line (```json) and the closing fence.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// First balanced JSON object, or list of objects, inside free text
///
/// Lists of scalars are skipped so bracketed references like `[1]` in an
/// answer stay text.
fn embedded_json(text: &str) -> Option<Value> {
    text.char_indices()
        .filter(|(_, c)| matches!(c, '{' | '['))
        .find_map(|(start, _)| {
            let mut values =
                serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
            match values.next()? {
                Ok(value @ Value::Object(_)) => Some(value),
                Ok(Value::Array(items))
                    if !items.is_empty() && items.iter().all(Value::is_object) =>
                {
                    Some(Value::Array(items))
                }
                _ => None,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        let value = parse_reply(r#"{"modality": "OBLIGATION"}"#);
        assert_eq!(value["modality"], "OBLIGATION");
        assert!(!is_raw(&value));
    }

    #[test]
    fn test_parse_list() {
        let value = parse_reply(r#"[{"text": "a"}, {"text": "b"}]"#);
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_markdown_wrapped() {
        let response = "```json\n{\"pass\": true}\n```";
        assert_eq!(parse_reply(response)["pass"], true);
    }

    #[test]
    fn test_parse_markdown_without_language() {
        let response = "```\n{\"route\": \"REVIEW\"}\n```";
        assert_eq!(parse_reply(response)["route"], "REVIEW");
    }

    #[test]
    fn test_plain_text_becomes_raw_answer() {
        let value = parse_reply("  Providers must keep logs (Art 12).\n");
        assert!(is_raw(&value));
        assert_eq!(value["answer"], "Providers must keep logs (Art 12).");
    }

    #[test]
    fn test_json_string_is_unwrapped() {
        let value = parse_reply(r#""Deployers shall monitor""#);
        assert!(is_raw(&value));
        assert_eq!(value["answer"], "Deployers shall monitor");
    }

    #[test]
    fn test_scalar_becomes_raw_answer() {
        let value = parse_reply("42");
        assert!(is_raw(&value));
        assert_eq!(value["answer"], "42");
    }

    #[test]
    fn test_empty_reply() {
        let value = parse_reply("");
        assert!(is_raw(&value));
        assert_eq!(value["answer"], "");
    }

    #[test]
    fn test_json_inside_prose() {
        let reply = r#"Here you go: {"pass": false, "errors": ["no actor"]} Hope it helps."#;
        let value = parse_reply(reply);
        assert!(!is_raw(&value));
        assert_eq!(value["pass"], false);

        let value = parse_reply(r#"Clauses: [{"text": "a"}] done"#);
        assert_eq!(value[0]["text"], "a");
    }

    #[test]
    fn test_braces_inside_strings_stay_balanced() {
        let value = parse_reply(r#"Result -> {"answer": "use {braces} freely", "n": 1} end"#);
        assert_eq!(value["answer"], "use {braces} freely");
        assert_eq!(value["n"], 1);
    }

    #[test]
    fn test_bracketed_references_stay_text() {
        let value = parse_reply("Providers must keep logs [1] and report [2].");
        assert!(is_raw(&value));
        assert_eq!(value["answer"], "Providers must keep logs [1] and report [2].");
    }

    #[test]
    fn test_extract_json_from_plain_json() {
        let json = r#"{"key": "value"}"#;
        assert_eq!(extract_json(json), json);
    }
}
