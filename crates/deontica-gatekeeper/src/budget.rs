//! Refine budget

/// Maximum number of refinements in one pipeline run
pub const MAX_REFINES: u32 = 2;

/// Counter bounding the formalize/validate loop
///
/// Shared by the validator and the ambiguity router; lives only as long as
/// one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefineBudget {
    used: u32,
    max: u32,
}

impl RefineBudget {
    /// Create a budget allowing `max` refinements, capped at [`MAX_REFINES`]
    pub fn new(max: u32) -> Self {
        Self {
            used: 0,
            max: max.min(MAX_REFINES),
        }
    }

    /// Consume one refinement if any remain
    pub fn try_consume(&mut self) -> bool {
        if self.used < self.max {
            self.used += 1;
            true
        } else {
            false
        }
    }

    /// Refinements consumed so far
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Refinements still available
    pub fn remaining(&self) -> u32 {
        self.max - self.used
    }

    /// Whether no refinement remains
    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }
}

impl Default for RefineBudget {
    fn default() -> Self {
        Self::new(MAX_REFINES)
    }
}
