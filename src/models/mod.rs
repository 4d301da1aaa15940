//! Planning domain models.
//!
//! Provides the core data types for representing partial plans:
//! typed variables over finite domains, temporally extended tokens,
//! timeline objects, constraints, and subgoal rules, all owned by the
//! [`PlanDatabase`]. Domain-agnostic within planning — applicable to
//! spacecraft operations, rover activity plans, and batch workflows.
//!
//! # Domain Mappings
//!
//! | plansearch | Spacecraft Ops | Rover | Workflow |
//! |------------|----------------|-------|----------|
//! | Token | Observation Window | Traverse Leg | Job Step |
//! | PlanObject | Instrument Timeline | Locomotion Timeline | Worker Lane |
//! | SubgoalRule | Warm-up Requirement | Localize-then-move | Dependent Step |
//! | PlanDatabase | Mission Plan | Sol Plan | Run |

mod constraint;
mod database;
mod domain;
mod object;
mod rule;
mod token;
mod variable;

pub use constraint::{Constraint, ConstraintId, ConstraintKind, ConstraintSource};
pub use database::{DbEvent, Entity, PlanDatabase};
pub use domain::{Domain, DomainChange, Value, MAX_FINITE_TIME, MINUS_INFINITY, PLUS_INFINITY};
pub use object::{ObjId, OrderingChoice, PlanObject};
pub use rule::{SubgoalRelation, SubgoalRule};
pub use token::{TokId, Token, TokenSpec, TokenState};
pub use variable::{VarId, VarKind, Variable};
