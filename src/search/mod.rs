//! The decision-directed search layer.
//!
//! Built from a planning [`Horizon`](horizon::Horizon), agenda filter
//! [conditions](condition), [decision points](decision), the
//! incremental [open-decision tracker](open_decisions), the
//! backtracking [decision manager](manager), and the top-level
//! [planner](planner).

pub mod condition;
pub mod decision;
pub mod horizon;
pub mod manager;
pub mod open_decisions;
pub mod planner;

pub use condition::{
    Condition, ConditionCtx, ConditionId, DynamicInfiniteRealFilter, HorizonCondition,
    HorizonMode, NoBranchSpec, TemporalVariableFilter,
};
pub use decision::{ChoiceView, DecisionPoint, TokenChoice};
pub use horizon::Horizon;
pub use manager::DecisionManager;
pub use open_decisions::OpenDecisionTracker;
pub use planner::{CbPlanner, SearchListener, SearchStats, Status};
