//! Modality - the normative force of a clause

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normative force of a legal clause
///
/// Serialized in upper case (`"OBLIGATION"`, `"PROHIBITION"`, ...), which is
/// also the vocabulary the classifier prompt asks the model to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    /// Something an actor must do ("shall", "must")
    Obligation,

    /// Something an actor must not do ("shall not", "is prohibited")
    Prohibition,

    /// Something an actor may do
    Permission,

    /// Carve-out from another clause ("shall not apply to")
    Exemption,

    /// Non-binding guidance ("should", "is encouraged to")
    Recommendation,
}

impl Modality {
    /// All modalities, in canonical order
    pub const ALL: [Modality; 5] = [
        Modality::Obligation,
        Modality::Prohibition,
        Modality::Permission,
        Modality::Exemption,
        Modality::Recommendation,
    ];

    /// Get the modality name as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Obligation => "OBLIGATION",
            Modality::Prohibition => "PROHIBITION",
            Modality::Permission => "PERMISSION",
            Modality::Exemption => "EXEMPTION",
            Modality::Recommendation => "RECOMMENDATION",
        }
    }

    /// Parse a modality leniently (case-insensitive, surrounding whitespace ignored)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "OBLIGATION" => Some(Modality::Obligation),
            "PROHIBITION" => Some(Modality::Prohibition),
            "PERMISSION" => Some(Modality::Permission),
            "EXEMPTION" => Some(Modality::Exemption),
            "RECOMMENDATION" => Some(Modality::Recommendation),
            _ => None,
        }
    }

    /// The SDL operator that formalizes this modality, if any
    ///
    /// Exemptions and recommendations have no operator of their own in
    /// standard deontic logic.
    pub fn sdl_operator(&self) -> Option<char> {
        match self {
            Modality::Obligation => Some('O'),
            Modality::Prohibition => Some('F'),
            Modality::Permission => Some('P'),
            Modality::Exemption | Modality::Recommendation => None,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid modality: {}", s))
    }
}
