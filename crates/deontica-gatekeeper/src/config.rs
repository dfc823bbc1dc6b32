//! Gatekeeper configuration

use serde::{Deserialize, Serialize};

/// Configuration for the local completeness checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Fail clauses without a modality (`missing_modality`)
    pub require_modality: bool,

    /// Fail clauses with neither an actor nor a canonical actor (`missing_actor`)
    pub require_actor: bool,

    /// Fail clauses without a deontic formula (`missing_formula`)
    pub require_formula: bool,

    /// Fail clauses with neither an action verb nor an object (`missing_action`)
    pub require_action: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            require_modality: true,
            require_actor: true,
            require_formula: true,
            require_action: false,
        }
    }
}

impl ValidationConfig {
    /// Create a permissive configuration (only the modality is required)
    pub fn permissive() -> Self {
        Self {
            require_modality: true,
            require_actor: false,
            require_formula: false,
            require_action: false,
        }
    }

    /// Create a strict configuration (all checks enabled)
    pub fn strict() -> Self {
        Self {
            require_modality: true,
            require_actor: true,
            require_formula: true,
            require_action: true,
        }
    }
}
