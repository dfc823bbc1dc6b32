//! Routing codes produced by validation and ambiguity handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a clause goes after validation
///
/// `Ok`, `Review` and `AcceptLowConfidence` are terminal. `Refine` loops back
/// to the formalizer and is bounded by the refine budget of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Route {
    /// Validation passed
    #[default]
    #[serde(rename = "OK")]
    Ok,

    /// Recoverable failure, formalize again
    #[serde(rename = "REFINE")]
    Refine,

    /// Escalate to a human reviewer
    #[serde(rename = "REVIEW")]
    Review,

    /// Minor issues, accepted with low confidence
    #[serde(rename = "ACCEPT_LOW_CONF")]
    AcceptLowConfidence,
}

impl Route {
    /// Get the routing code as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Ok => "OK",
            Route::Refine => "REFINE",
            Route::Review => "REVIEW",
            Route::AcceptLowConfidence => "ACCEPT_LOW_CONF",
        }
    }

    /// Parse a routing code leniently
    ///
    /// Models sometimes shorten `ACCEPT_LOW_CONF` to `ACCEPT`; both are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "OK" => Some(Route::Ok),
            "REFINE" => Some(Route::Refine),
            "REVIEW" => Some(Route::Review),
            "ACCEPT_LOW_CONF" | "ACCEPT" => Some(Route::AcceptLowConfidence),
            _ => None,
        }
    }

    /// Whether this route ends the pipeline
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Route::Refine)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route() {
        assert_eq!(Route::parse("ok"), Some(Route::Ok));
        assert_eq!(Route::parse("REFINE"), Some(Route::Refine));
        assert_eq!(Route::parse("review"), Some(Route::Review));
        assert_eq!(Route::parse("ACCEPT"), Some(Route::AcceptLowConfidence));
        assert_eq!(Route::parse("ACCEPT_LOW_CONF"), Some(Route::AcceptLowConfidence));
        assert_eq!(Route::parse("escalate"), None);
    }

    #[test]
    fn test_only_refine_loops() {
        assert!(Route::Ok.is_terminal());
        assert!(Route::Review.is_terminal());
        assert!(Route::AcceptLowConfidence.is_terminal());
        assert!(!Route::Refine.is_terminal());
    }

    #[test]
    fn test_serde_codes() {
        assert_eq!(serde_json::to_string(&Route::Ok).unwrap(), "\"OK\"");
        assert_eq!(
            serde_json::to_string(&Route::AcceptLowConfidence).unwrap(),
            "\"ACCEPT_LOW_CONF\""
        );
    }
}
