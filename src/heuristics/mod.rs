//! Search heuristics.
//!
//! An [`Evaluator`] scores open decisions and orders their choices.
//! The tracker picks the flaw with the best (lowest) priority, breaking
//! ties on choice count and allocation key, then asks the evaluator to
//! order the choices before branching.
//!
//! # References
//! - Muscettola, N. (1994). "HSTS: Integrating Planning and Scheduling"

use crate::models::{Entity, OrderingChoice, PlanDatabase, TokId, Value, VarId};
use crate::search::decision::TokenChoice;

/// Best (lowest) priority an evaluator can report.
pub const BEST_PRIORITY: f64 = 0.0;

/// Worst priority; a flaw at this priority is picked only alone.
pub const WORST_PRIORITY: f64 = f64::MAX;

/// Priorities closer than this are considered equal.
pub const EPSILON: f64 = 1e-6;

/// Pluggable decision-ordering heuristic.
///
/// Every method has a neutral default, so an evaluator only overrides
/// what it cares about.
pub trait Evaluator {
    /// Priority of a flaw; lower is chosen first.
    fn priority(&self, _db: &PlanDatabase, _entity: Entity) -> f64 {
        BEST_PRIORITY
    }

    /// Upper estimate of the branching factor of a flaw. Flaws with a
    /// single choice are taken as zero-commitment and handled first.
    fn count_choices(&self, db: &PlanDatabase, entity: Entity) -> u32 {
        match entity {
            Entity::Variable(var) => {
                let domain = &db.variable(var).domain;
                if domain.is_finite() {
                    domain.size().min(u32::MAX as usize) as u32
                } else {
                    u32::MAX
                }
            }
            Entity::Token(tok) => {
                let token = db.token(tok);
                if token.is_active() {
                    // Two is enough to rule out zero commitment.
                    db.count_ordering_choices(tok, 2)
                } else {
                    let mut n = db.compatible_tokens(tok).len() as u32;
                    if db.has_ordering_choice(tok) {
                        n += 1;
                    }
                    if token.can_be_rejected() {
                        n += 1;
                    }
                    n
                }
            }
            Entity::Object(_) => 0,
        }
    }

    /// When true, key ties are broken towards later allocations.
    fn prefer_higher_keys(&self) -> bool {
        false
    }

    /// Orders the candidate values of a variable decision.
    fn order_value_choices(
        &self,
        _db: &PlanDatabase,
        _var: VarId,
        choices: Vec<Value>,
    ) -> Vec<Value> {
        choices
    }

    /// Orders the candidate resolutions of a token decision.
    fn order_token_choices(
        &self,
        _db: &PlanDatabase,
        _token: TokId,
        choices: Vec<TokenChoice>,
    ) -> Vec<TokenChoice> {
        choices
    }

    /// Orders the insertion points of an ordering decision.
    fn order_ordering_choices(
        &self,
        _db: &PlanDatabase,
        _token: TokId,
        choices: Vec<OrderingChoice>,
    ) -> Vec<OrderingChoice> {
        choices
    }
}

/// The neutral evaluator: uniform priorities, choices in natural order.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEvaluator;

impl Evaluator for DefaultEvaluator {}
