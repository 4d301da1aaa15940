//! Constraints over variables.
//!
//! A small closed set of constraint kinds: equality, disequality,
//! precedence, a fail-when-bound diagnostic, and the guard marker that
//! pins rule-condition variables as decidable.

use serde::{Deserialize, Serialize};

use super::token::TokId;
use super::variable::VarId;

/// Arena index of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintId(pub(crate) u32);

impl ConstraintId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Propagation semantics of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// All scope variables take the same value.
    Eq,
    /// Two scope variables take different values.
    Neq,
    /// `scope[0] <= scope[1]` over interval domains.
    Precedes,
    /// Inconsistent as soon as every scope variable is singleton.
    /// Used to express irreconcilable subgoals in tests and rules.
    Conflict,
    /// No propagation; marks its scope as rule guards. The open-decision
    /// tracker reference-counts guard membership from these.
    Guard,
}

/// Where a constraint came from; controls who removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSource {
    /// Posted by the model builder.
    Explicit,
    /// Equality bridge posted when a token merged.
    Merge(TokId),
    /// Posted by a rule instance on the given master token.
    Rule(TokId),
    /// Timeline adjacency precedence for the given token.
    Ordering(TokId),
}

/// A posted constraint.
#[derive(Debug, Clone)]
pub struct Constraint {
    /// Global allocation key.
    pub key: u32,
    pub kind: ConstraintKind,
    pub scope: Vec<VarId>,
    pub source: ConstraintSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serde_round_trip() {
        let json = serde_json::to_string(&ConstraintKind::Precedes).unwrap();
        let back: ConstraintKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ConstraintKind::Precedes);
    }
}
