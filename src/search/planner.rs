//! Chronological-backtracking planner.
//!
//! Each step makes one forward move: pick the next open decision,
//! apply a choice, propagate. An inconsistent result triggers
//! chronological retraction back to the deepest decision with an
//! untried choice. The search budget is counted in moves, not wall
//! time, so runs are reproducible.
//!
//! # References
//! - Jónsson et al. (2000), "Planning in Interplanetary Space: Theory and Practice"
//! - Muscettola et al. (1998), "Remote Agent: To Boldly Go Where No AI System Has Gone Before"

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::heuristics::{DefaultEvaluator, Evaluator};
use crate::models::PlanDatabase;
use crate::search::condition::{
    Condition, ConditionId, DynamicInfiniteRealFilter, HorizonCondition, TemporalVariableFilter,
};
use crate::search::decision::DecisionPoint;
use crate::search::manager::DecisionManager;

/// Outcome of a search step or run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Open decisions remain and the budget is not spent.
    InProgress,
    /// The agenda is clear; the database holds a complete plan.
    PlanFound,
    /// Every alternative was tried; no plan exists under the filters.
    SearchExhausted,
    /// The move budget ran out.
    TimeoutReached,
    /// The model was inconsistent before any decision was made.
    InitiallyInconsistent,
}

/// Search counters handed to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Moves spent, successful or retracted.
    pub time: u64,
    /// Steps taken this run.
    pub steps: u64,
    /// Closed decision stack depth.
    pub depth: usize,
    /// Decisions exhausted during backtracking.
    pub retractions: u64,
}

/// Observes the search. Every method has a no-op default, so a
/// listener only overrides the events it cares about.
pub trait SearchListener {
    /// A decision closed onto the stack.
    fn assignment_succeeded(&mut self, _stats: &SearchStats) {}
    /// A choice did not stick; backtracking begins.
    fn assignment_failed(&mut self, _stats: &SearchStats) {}
    /// Backtracking found a decision with an untried choice.
    fn retract_succeeded(&mut self, _stats: &SearchStats) {}
    /// The move budget ran out.
    fn timeout_reached(&mut self, _stats: &SearchStats) {}
    /// The run reached a terminal status.
    fn search_finished(&mut self, _status: Status, _stats: &SearchStats) {}
}

/// The planner: owns the database, the decision manager, and the
/// default agenda filters.
pub struct CbPlanner {
    db: PlanDatabase,
    dm: DecisionManager,
    status: Status,
    time: u64,
    steps: u64,
    timeout: u64,
    listeners: Vec<Box<dyn SearchListener>>,
    horizon_filter: ConditionId,
    temporal_filter: ConditionId,
    dynamic_filter: ConditionId,
}

impl CbPlanner {
    pub fn new(db: PlanDatabase) -> Self {
        Self::with_evaluator(db, Box::new(DefaultEvaluator))
    }

    pub fn with_evaluator(db: PlanDatabase, evaluator: Box<dyn Evaluator>) -> Self {
        let mut dm = DecisionManager::new(evaluator);
        let horizon_filter = dm
            .tracker_mut()
            .attach_condition(Condition::Horizon(HorizonCondition::default()));
        let temporal_filter = dm
            .tracker_mut()
            .attach_condition(Condition::TemporalVariables(TemporalVariableFilter::default()));
        let dynamic_filter = dm
            .tracker_mut()
            .attach_condition(Condition::DynamicDomains(DynamicInfiniteRealFilter::default()));
        Self {
            db,
            dm,
            status: Status::InProgress,
            time: 0,
            steps: 0,
            timeout: 0,
            listeners: Vec::new(),
            horizon_filter,
            temporal_filter,
            dynamic_filter,
        }
    }

    // ---- accessors ----------------------------------------------------

    pub fn database(&self) -> &PlanDatabase {
        &self.db
    }

    pub fn database_mut(&mut self) -> &mut PlanDatabase {
        &mut self.db
    }

    pub fn decision_manager(&self) -> &DecisionManager {
        &self.dm
    }

    pub fn decision_manager_mut(&mut self) -> &mut DecisionManager {
        &mut self.dm
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Moves spent this run.
    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Depth of the closed decision stack.
    pub fn depth(&self) -> usize {
        self.dm.closed_decisions()
    }

    /// The closed decision stack, deepest first.
    pub fn closed_decisions(&self) -> &[DecisionPoint] {
        self.dm.decision_stack()
    }

    pub fn retractions(&self) -> u64 {
        self.dm.retractions()
    }

    pub fn stats(&self) -> SearchStats {
        SearchStats {
            time: self.time,
            steps: self.steps,
            depth: self.dm.closed_decisions(),
            retractions: self.dm.retractions(),
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn SearchListener>) {
        self.listeners.push(listener);
    }

    // ---- configuration ------------------------------------------------

    pub fn set_horizon(&mut self, start: i64, end: i64) {
        self.dm.horizon_mut().set(start, end);
    }

    /// The horizon membership filter, for mode changes.
    pub fn horizon_filter_mut(&mut self) -> &mut HorizonCondition {
        match self.dm.tracker_mut().condition_mut(self.horizon_filter) {
            Some(Condition::Horizon(c)) => c,
            _ => unreachable!("horizon filter attached at construction"),
        }
    }

    /// The temporal-variable filter, for ignore-flag changes.
    pub fn temporal_filter_mut(&mut self) -> &mut TemporalVariableFilter {
        match self.dm.tracker_mut().condition_mut(self.temporal_filter) {
            Some(Condition::TemporalVariables(f)) => f,
            _ => unreachable!("temporal filter attached at construction"),
        }
    }

    /// The open/infinite-domain filter.
    pub fn dynamic_filter_mut(&mut self) -> &mut DynamicInfiniteRealFilter {
        match self.dm.tracker_mut().condition_mut(self.dynamic_filter) {
            Some(Condition::DynamicDomains(f)) => f,
            _ => unreachable!("dynamic filter attached at construction"),
        }
    }

    /// Attaches an extra agenda filter.
    pub fn attach_condition(&mut self, condition: Condition) -> ConditionId {
        self.dm.tracker_mut().attach_condition(condition)
    }

    /// Switches the horizon filter between its two modes.
    pub fn set_necessarily_outside_horizon(&mut self, on: bool) {
        let filter = self.horizon_filter_mut();
        if on {
            filter.set_necessarily_outside();
        } else {
            filter.set_possibly_outside();
        }
    }

    /// Lets the search branch on open and infinite domains.
    pub fn disable_dynamic_exclusion(&mut self) {
        self.dynamic_filter_mut().disable();
    }

    // ---- search -------------------------------------------------------

    /// Starts a run with the given move budget. Bookkeeping resets;
    /// applied decisions from a previous run stay in the database until
    /// [`CbPlanner::retract`] withdraws them.
    pub fn init_run(&mut self, timeout: u64) -> Status {
        if !self.db.is_closed() {
            warn!("planning against an unclosed database");
        }
        self.timeout = timeout;
        self.time = 0;
        self.steps = 0;
        self.dm.reset();
        if !self.db.propagate() {
            info!("model is inconsistent before search");
            self.status = Status::InitiallyInconsistent;
            self.notify_finished();
        } else {
            self.status = Status::InProgress;
        }
        self.status
    }

    /// Clears all search bookkeeping without touching the database.
    pub fn reset(&mut self) {
        self.time = 0;
        self.steps = 0;
        self.status = Status::InProgress;
        self.dm.reset();
    }

    /// Makes one search step.
    pub fn write_step(&mut self) -> Status {
        if self.time >= self.timeout {
            self.status = Status::TimeoutReached;
            info!(time = self.time, "move budget exhausted");
            let stats = self.stats();
            for l in &mut self.listeners {
                l.timeout_reached(&stats);
            }
            self.notify_finished();
            return self.status;
        }
        self.steps += 1;
        assert!(
            !self.dm.is_retracting(),
            "a step never begins mid-retraction"
        );
        let consistent = self.db.propagate();
        assert!(consistent, "a step never begins from an inconsistency");

        let moved = self.dm.assign_decision(&mut self.db);
        if moved || self.dm.is_retracting() {
            self.time += 1;
        }
        if moved {
            let stats = self.stats();
            for l in &mut self.listeners {
                l.assignment_succeeded(&stats);
            }
        } else if self.dm.is_retracting() {
            let stats = self.stats();
            for l in &mut self.listeners {
                l.assignment_failed(&stats);
            }
            while self.dm.is_retracting() && self.dm.has_decision_to_retract() {
                self.dm.retract_decision(&mut self.db);
            }
            if self.dm.is_retracting() {
                info!(time = self.time, "search space exhausted");
                self.status = Status::SearchExhausted;
                self.notify_finished();
                return self.status;
            }
            debug!(depth = self.dm.closed_decisions(), "backtracked");
            let stats = self.stats();
            for l in &mut self.listeners {
                l.retract_succeeded(&stats);
            }
        } else {
            info!(depth = self.dm.closed_decisions(), time = self.time, "plan found");
            self.status = Status::PlanFound;
            self.notify_finished();
            return self.status;
        }
        self.status = Status::InProgress;
        self.status
    }

    /// Steps at most `n` times or until a terminal status.
    pub fn write_next(&mut self, n: u64) -> Status {
        for _ in 0..n {
            if self.write_step() != Status::InProgress {
                break;
            }
        }
        self.status
    }

    /// Steps until a terminal status.
    pub fn complete_run(&mut self) -> Status {
        while self.write_step() == Status::InProgress {}
        self.status
    }

    /// Runs the search to completion under a move budget.
    pub fn run(&mut self, timeout: u64) -> Status {
        if self.init_run(timeout) != Status::InProgress {
            return self.status;
        }
        self.complete_run()
    }

    /// Withdraws every applied decision, restoring the database to its
    /// pre-search state.
    pub fn retract(&mut self) {
        self.dm.retract_all(&mut self.db);
    }

    fn notify_finished(&mut self) {
        let status = self.status;
        let stats = self.stats();
        for listener in &mut self.listeners {
            listener.search_finished(status, &stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ConstraintKind, Domain, SubgoalRelation, SubgoalRule, TokenSpec, TokenState, Value,
    };
    use crate::search::condition::HorizonMode;
    use std::sync::{Arc, Mutex};

    fn symmetric_pair() -> PlanDatabase {
        let mut db = PlanDatabase::new();
        db.add_object("t1");
        db.new_token(TokenSpec::new("P1").with_start(0, 10).with_end(0, 200));
        db.new_token(TokenSpec::new("P1").with_start(0, 10).with_end(0, 200));
        db.close();
        db
    }

    #[test]
    fn test_two_symmetric_tokens_find_a_plan() {
        let mut planner = CbPlanner::new(symmetric_pair());
        planner.set_horizon(0, 200);
        assert_eq!(planner.run(100), Status::PlanFound);
        // Activate and order each token, nothing retried.
        assert_eq!(planner.depth(), 4);
        assert_eq!(planner.time(), 4);
        assert_eq!(planner.retractions(), 0);

        let db = planner.database();
        for t in db.token_ids() {
            assert!(db.token(t).is_active());
            assert!(db.token(t).inserted_on.is_some());
        }
    }

    #[test]
    fn test_unsatisfiable_bindings_exhaust_the_search() {
        let mut db = PlanDatabase::new();
        let a = db.new_global_variable(
            "a",
            Domain::enumerated(vec![Value::symbol("x"), Value::symbol("y")]),
        );
        let b = db.new_global_variable("b", Domain::interval(1, 2));
        db.add_constraint(ConstraintKind::Conflict, vec![a, b]);
        db.close();

        let mut planner = CbPlanner::new(db);
        assert_eq!(planner.run(100), Status::SearchExhausted);
        assert_eq!(planner.depth(), 0);
        // Two values of a, each failing both values of b.
        assert_eq!(planner.time(), 6);
        assert_eq!(planner.retractions(), 3);
        assert!(!planner.database().variable(a).is_specified());
        assert!(!planner.database().variable(b).is_specified());
    }

    #[test]
    fn test_unsatisfiable_subgoal_exhausts_without_closing() {
        let mut db = PlanDatabase::new();
        db.add_object("t1");
        db.add_rule(SubgoalRule::new("P1", SubgoalRelation::ConflictsWithMaster));
        db.new_token(
            TokenSpec::new("P1")
                .with_start(0, 10)
                .with_end(0, 200)
                .with_duration(1, 1000),
        );
        db.close();

        let mut planner = CbPlanner::new(db);
        planner.set_horizon(0, 200);
        assert_eq!(planner.run(100), Status::SearchExhausted);
        // The forced activation immediately trips the subgoal, so no
        // decision ever closes.
        assert_eq!(planner.depth(), 0);
        assert!(planner.database().token_ids().len() == 1);
    }

    #[test]
    fn test_retracted_activation_falls_through_to_merge() {
        let mut db = PlanDatabase::new();
        db.add_object("t1");
        let a = db.new_token(TokenSpec::new("P1").with_start(0, 0).with_duration(10, 10));
        // Identical to a, so neither insertion point next to a fits and
        // only the merge survives.
        let b = db.new_token(TokenSpec::new("P1").with_start(0, 0).with_duration(10, 10));
        db.close();

        let mut planner = CbPlanner::new(db);
        planner.set_horizon(0, 200);
        assert_eq!(planner.run(100), Status::PlanFound);
        // Both orderings of b fail, the activation is retracted, and
        // the merge onto a sticks.
        assert_eq!(planner.database().token(b).state, TokenState::Merged);
        assert_eq!(planner.database().token(b).merged_onto, Some(a));
        assert_eq!(planner.depth(), 3);
        assert_eq!(planner.time(), 6);
        assert_eq!(planner.retractions(), 1);
    }

    #[test]
    fn test_variable_added_mid_run_is_decided() {
        let mut planner = CbPlanner::new(symmetric_pair());
        planner.set_horizon(0, 200);
        assert_eq!(planner.init_run(100), Status::InProgress);
        assert_eq!(planner.write_step(), Status::InProgress);

        let v = planner.database_mut().new_global_variable(
            "mode",
            Domain::enumerated(vec![Value::Int(1), Value::Int(2)]),
        );
        assert_eq!(planner.complete_run(), Status::PlanFound);
        assert!(planner.database().variable(v).is_specified());
        assert_eq!(planner.depth(), 5);
    }

    #[test]
    fn test_budget_cuts_the_run_short() {
        let mut db = PlanDatabase::new();
        db.add_object("t1");
        for i in 0..6 {
            db.new_token(
                TokenSpec::new(format!("P{i}"))
                    .with_start(0, 100)
                    .with_end(0, 200)
                    .with_duration(1, 10),
            );
        }
        db.close();

        let mut planner = CbPlanner::new(db);
        planner.set_horizon(0, 200);
        // Twelve easy moves needed, ten allowed.
        assert_eq!(planner.run(10), Status::TimeoutReached);
        assert_eq!(planner.time(), 10);
        assert_eq!(planner.closed_decisions().len(), 10);
        assert!(planner.closed_decisions().iter().all(|d| d.is_applied()));
        assert_eq!(planner.steps(), 10);
    }

    #[test]
    fn test_horizon_widening_readmits_filtered_flaws() {
        let mut db = PlanDatabase::new();
        db.add_object("t1");
        let t = db.new_token(
            TokenSpec::new("P1")
                .with_start(50, 60)
                .with_end(50, 200)
                .with_duration(1, 150),
        );
        db.close();

        let mut planner = CbPlanner::new(db);
        planner.horizon_filter_mut().mode = HorizonMode::NecessarilyOutside;
        planner.set_horizon(0, 40);
        // The token cannot fit before 40, so the agenda is clear.
        assert_eq!(planner.run(100), Status::PlanFound);
        assert_eq!(planner.depth(), 0);
        assert!(planner.database().token(t).is_inactive());

        planner.set_horizon(0, 200);
        assert_eq!(planner.run(100), Status::PlanFound);
        assert_eq!(planner.depth(), 2);
        assert!(planner.database().token(t).is_active());
    }

    #[test]
    fn test_status_and_stats_serialize() {
        let json = serde_json::to_string(&Status::PlanFound).unwrap();
        assert_eq!(serde_json::from_str::<Status>(&json).unwrap(), Status::PlanFound);

        let mut planner = CbPlanner::new(symmetric_pair());
        planner.set_horizon(0, 200);
        planner.run(100);
        let stats: SearchStats = serde_json::from_str(
            &serde_json::to_string(&planner.stats()).unwrap(),
        )
        .unwrap();
        assert_eq!(stats.depth, 4);
        assert_eq!(stats.retractions, 0);
    }

    #[test]
    fn test_runs_are_deterministic() {
        let run = || {
            let mut planner = CbPlanner::new(symmetric_pair());
            planner.set_horizon(0, 200);
            let status = planner.run(100);
            (status, planner.time(), planner.depth(), planner.retractions())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_initially_inconsistent_model() {
        let mut db = PlanDatabase::new();
        let a = db.new_global_variable("a", Domain::enumerated(vec![Value::Int(1)]));
        let b = db.new_global_variable("b", Domain::enumerated(vec![Value::Int(2)]));
        db.add_constraint(ConstraintKind::Eq, vec![a, b]);
        db.close();

        let mut planner = CbPlanner::new(db);
        assert_eq!(planner.run(100), Status::InitiallyInconsistent);
    }

    #[test]
    fn test_stepping_api_matches_run() {
        let mut planner = CbPlanner::new(symmetric_pair());
        planner.set_horizon(0, 200);
        assert_eq!(planner.init_run(100), Status::InProgress);
        assert_eq!(planner.write_next(3), Status::InProgress);
        assert_eq!(planner.complete_run(), Status::PlanFound);
        assert_eq!(planner.depth(), 4);
    }

    #[test]
    fn test_retract_restores_the_database() {
        let mut planner = CbPlanner::new(symmetric_pair());
        planner.set_horizon(0, 200);
        assert_eq!(planner.run(100), Status::PlanFound);

        planner.retract();
        assert_eq!(planner.depth(), 0);
        let db = planner.database();
        for t in db.token_ids() {
            assert!(db.token(t).is_inactive());
        }
    }

    #[derive(Default)]
    struct Recorded {
        assigned: u64,
        finished: Vec<(Status, u64)>,
    }

    struct Recorder(Arc<Mutex<Recorded>>);

    impl SearchListener for Recorder {
        fn assignment_succeeded(&mut self, _stats: &SearchStats) {
            self.0.lock().unwrap().assigned += 1;
        }

        fn search_finished(&mut self, status: Status, stats: &SearchStats) {
            self.0.lock().unwrap().finished.push((status, stats.time));
        }
    }

    #[test]
    fn test_listener_sees_assignments_and_the_terminal_status() {
        let seen = Arc::new(Mutex::new(Recorded::default()));
        let mut planner = CbPlanner::new(symmetric_pair());
        planner.set_horizon(0, 200);
        planner.add_listener(Box::new(Recorder(seen.clone())));
        planner.run(100);
        let recorded = seen.lock().unwrap();
        assert_eq!(recorded.assigned, 4);
        assert_eq!(recorded.finished, vec![(Status::PlanFound, 4)]);
    }
}
