//! Constrained variables.
//!
//! Every token field (start, end, duration, parameters, object, state)
//! and every global is a constrained variable held in the database
//! arena. Cross-references are arena indices; a stale index is a
//! lookup miss, never a dangling pointer.

use serde::{Deserialize, Serialize};

use super::domain::{Domain, Value};
use super::token::TokId;

/// Arena index of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What role a variable plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Start,
    End,
    Duration,
    Parameter,
    /// The token's timeline assignment.
    Object,
    /// The token's activation state; resolved by token decisions, never
    /// branched on directly.
    State,
    /// A variable with no owning token.
    Global,
}

impl VarKind {
    /// Start, end and duration are resolved through temporal
    /// propagation and get filtered by conditions rather than excluded
    /// outright.
    pub fn is_temporal(self) -> bool {
        matches!(self, VarKind::Start | VarKind::End | VarKind::Duration)
    }

    /// Whether a variable of this kind may ever become a decision.
    pub fn is_decidable(self) -> bool {
        !matches!(self, VarKind::Object | VarKind::State)
    }
}

/// A constrained variable.
#[derive(Debug, Clone)]
pub struct Variable {
    /// Global allocation key; the deterministic tie-break order.
    pub key: u32,
    pub name: String,
    pub kind: VarKind,
    /// Owning token, if any.
    pub parent: Option<TokId>,
    /// The domain as declared; relaxation restores this.
    pub base: Domain,
    /// The propagated domain.
    pub domain: Domain,
    /// A value committed by a search decision, if any.
    pub specified: Option<Value>,
}

impl Variable {
    pub(crate) fn new(
        key: u32,
        name: impl Into<String>,
        kind: VarKind,
        parent: Option<TokId>,
        base: Domain,
    ) -> Self {
        Self {
            key,
            name: name.into(),
            kind,
            parent,
            domain: base.clone(),
            base,
            specified: None,
        }
    }

    pub fn is_specified(&self) -> bool {
        self.specified.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_predicates() {
        assert!(VarKind::Start.is_temporal());
        assert!(VarKind::Duration.is_temporal());
        assert!(!VarKind::Parameter.is_temporal());

        assert!(VarKind::Parameter.is_decidable());
        assert!(VarKind::Global.is_decidable());
        assert!(!VarKind::Object.is_decidable());
        assert!(!VarKind::State.is_decidable());
    }

    #[test]
    fn test_new_variable_copies_base() {
        let v = Variable::new(7, "x", VarKind::Global, None, Domain::interval(1, 5));
        assert_eq!(v.domain, v.base);
        assert!(!v.is_specified());
    }
}
