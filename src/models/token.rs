//! Temporal tokens.
//!
//! A token is an interval of activity: a predicate over a start, end
//! and duration variable plus any number of parameters. Tokens move
//! through a small state machine — inactive until the search commits to
//! activating, merging or rejecting them.
//!
//! # Reference
//! Muscettola (1994), "HSTS: Integrating Planning and Scheduling"

use serde::{Deserialize, Serialize};

use super::domain::Domain;
use super::object::ObjId;
use super::variable::VarId;

/// Arena index of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokId(pub(crate) u32);

impl TokId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Activation state of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenState {
    /// Not yet decided; the token is an open condition.
    Inactive,
    /// Committed into the plan.
    Active,
    /// Unified with an active token.
    Merged,
    /// Excluded from the plan.
    Rejected,
}

/// A temporal token.
#[derive(Debug, Clone)]
pub struct Token {
    /// Global allocation key.
    pub key: u32,
    pub predicate: String,
    /// Mandatory tokens cannot be rejected.
    pub mandatory: bool,
    pub state: TokenState,
    /// The token this one is a subgoal of, if any.
    pub master: Option<TokId>,
    /// Subgoals spawned by rules firing on this token.
    pub slaves: Vec<TokId>,
    pub start: VarId,
    pub end: VarId,
    pub duration: VarId,
    pub parameters: Vec<VarId>,
    /// Timeline assignment variable.
    pub object_var: VarId,
    /// Set while merged.
    pub merged_onto: Option<TokId>,
    /// Timeline this token has been ordered onto, if any.
    pub inserted_on: Option<ObjId>,
}

impl Token {
    pub fn is_inactive(&self) -> bool {
        self.state == TokenState::Inactive
    }

    pub fn is_active(&self) -> bool {
        self.state == TokenState::Active
    }

    /// All variables of this token, in declaration order.
    pub fn variables(&self) -> Vec<VarId> {
        let mut vars = vec![self.start, self.end, self.duration, self.object_var];
        vars.extend(&self.parameters);
        vars
    }

    pub fn can_be_rejected(&self) -> bool {
        !self.mandatory
    }
}

/// Builder for token creation.
///
/// # Example
/// ```
/// use plansearch::models::{Domain, TokenSpec, Value};
///
/// let spec = TokenSpec::new("P1")
///     .with_start(0, 10)
///     .with_end(0, 200)
///     .with_duration(1, 1000)
///     .with_parameter(Domain::enumerated(vec![Value::symbol("L1")]));
/// ```
#[derive(Debug, Clone)]
pub struct TokenSpec {
    pub predicate: String,
    pub start: (i64, i64),
    pub end: (i64, i64),
    pub duration: (i64, i64),
    pub parameters: Vec<Domain>,
    pub mandatory: bool,
    /// Restrict the timeline assignment; `None` = any object.
    pub object: Option<ObjId>,
    pub master: Option<TokId>,
}

impl TokenSpec {
    /// Creates a mandatory token spec with unconstrained temporal bounds.
    pub fn new(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            start: (super::domain::MINUS_INFINITY, super::domain::PLUS_INFINITY),
            end: (super::domain::MINUS_INFINITY, super::domain::PLUS_INFINITY),
            duration: (0, super::domain::PLUS_INFINITY),
            parameters: Vec::new(),
            mandatory: true,
            object: None,
            master: None,
        }
    }

    pub fn with_start(mut self, lb: i64, ub: i64) -> Self {
        self.start = (lb, ub);
        self
    }

    pub fn with_end(mut self, lb: i64, ub: i64) -> Self {
        self.end = (lb, ub);
        self
    }

    pub fn with_duration(mut self, lb: i64, ub: i64) -> Self {
        self.duration = (lb, ub);
        self
    }

    pub fn with_parameter(mut self, domain: Domain) -> Self {
        self.parameters.push(domain);
        self
    }

    /// Allows the planner to reject this token.
    pub fn rejectable(mut self) -> Self {
        self.mandatory = false;
        self
    }

    /// Pins the token to a single timeline.
    pub fn on_object(mut self, object: ObjId) -> Self {
        self.object = Some(object);
        self
    }
}
