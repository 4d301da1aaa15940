//! Subgoal rules.
//!
//! A rule watches for the activation of tokens with a matching
//! predicate and, once its guard (if any) is bound, spawns a mandatory
//! subgoal token related to the master by a fixed temporal relation.
//! Deactivating the master unwinds the firing completely.

use serde::{Deserialize, Serialize};

use super::constraint::ConstraintId;
use super::domain::Value;
use super::token::TokId;

/// How a spawned subgoal relates to its master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubgoalRelation {
    /// Subgoal starts together with the master (`eq` on starts).
    StartsWithMaster,
    /// Subgoal starts where the master ends (`eq` on master end /
    /// subgoal start).
    MeetsMaster,
    /// Subgoal starts with the master yet may not begin until it ends.
    /// Unsatisfiable whenever the master has positive duration.
    ConflictsWithMaster,
}

/// A subgoal-introduction rule.
///
/// Fires at most once per masterless token of the matching predicate,
/// so subgoal chains terminate.
#[derive(Debug, Clone)]
pub struct SubgoalRule {
    pub predicate: String,
    /// Predicate of the spawned subgoal token.
    pub subgoal: String,
    /// Fire only once the parameter at this index is bound to the given
    /// value. While pending, a guard constraint pins the parameter.
    pub guard: Option<(usize, Value)>,
    pub relation: SubgoalRelation,
}

impl SubgoalRule {
    /// A rule whose subgoal shares the trigger predicate.
    pub fn new(predicate: impl Into<String>, relation: SubgoalRelation) -> Self {
        let predicate = predicate.into();
        Self {
            subgoal: predicate.clone(),
            predicate,
            guard: None,
            relation,
        }
    }

    /// Overrides the subgoal predicate.
    pub fn with_subgoal(mut self, subgoal: impl Into<String>) -> Self {
        self.subgoal = subgoal.into();
        self
    }

    /// Makes the rule conditional on a parameter binding.
    pub fn with_guard(mut self, parameter: usize, value: Value) -> Self {
        self.guard = Some((parameter, value));
        self
    }
}

/// A rule applied to one activated token.
#[derive(Debug, Clone)]
pub(crate) struct RuleInstance {
    /// Index into the database rule registry.
    pub rule: usize,
    pub token: TokId,
    pub fired: bool,
    /// Guard marker constraint while the firing is pending.
    pub guard_constraint: Option<ConstraintId>,
    pub slave: Option<TokId>,
    /// Constraints posted when the rule fired.
    pub posted: Vec<ConstraintId>,
}
