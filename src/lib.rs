//! Constraint-directed planning search.
//!
//! Provides a plan database of temporally extended tokens plus a
//! decision-directed, chronologically backtracking search over it: the
//! planner repeatedly picks an open decision (an inactive token, a
//! decidable variable, or an unordered active token), applies a
//! choice, and propagates, retracting down the decision stack when a
//! choice fails to stick.
//!
//! # Modules
//!
//! - **`models`**: Partial-plan types — `PlanDatabase`, `Token`,
//!   `Variable`, `Domain`, `PlanObject`, `Constraint`, `SubgoalRule`
//! - **`search`**: The search layer — `CbPlanner`, `DecisionManager`,
//!   `OpenDecisionTracker`, agenda filter `Condition`s, `Horizon`
//! - **`heuristics`**: The pluggable `Evaluator` decision-ordering trait
//!
//! # Example
//!
//! ```
//! use plansearch::models::{PlanDatabase, TokenSpec};
//! use plansearch::search::{CbPlanner, Status};
//!
//! let mut db = PlanDatabase::new();
//! db.add_object("camera");
//! db.new_token(TokenSpec::new("TakeImage").with_start(0, 10).with_end(0, 100));
//! db.close();
//!
//! let mut planner = CbPlanner::new(db);
//! planner.set_horizon(0, 100);
//! assert_eq!(planner.run(50), Status::PlanFound);
//! ```
//!
//! # References
//!
//! - Jónsson et al. (2000), "Planning in Interplanetary Space: Theory and Practice"
//! - Muscettola et al. (1998), "Remote Agent: To Boldly Go Where No AI System Has Gone Before"
//! - Frank & Jónsson (2003), "Constraint-Based Attribute and Interval Planning"

pub mod heuristics;
pub mod models;
pub mod search;
