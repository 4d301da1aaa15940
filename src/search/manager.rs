//! Decision management.
//!
//! The manager drives one search move at a time: pick up the current
//! (or next) open decision, apply its choice under the cursor, and
//! propagate. A failed propagation flips the manager into retracting
//! mode; retraction undoes decisions until one with an untried choice
//! resurfaces, or the closed stack runs dry.
//!
//! Invariant: every decision below the top of the closed stack has its
//! applied choice in the database; onto the stack on success, off on
//! retraction, nothing in between.

use tracing::{debug, trace};

use crate::heuristics::Evaluator;
use crate::models::PlanDatabase;
use crate::search::decision::DecisionPoint;
use crate::search::horizon::Horizon;
use crate::search::open_decisions::OpenDecisionTracker;

#[derive(Debug)]
pub struct DecisionManager {
    tracker: OpenDecisionTracker,
    horizon: Horizon,
    current: Option<DecisionPoint>,
    closed: Vec<DecisionPoint>,
    retracting: bool,
    retractions: u64,
}

impl DecisionManager {
    pub fn new(evaluator: Box<dyn Evaluator>) -> Self {
        Self {
            tracker: OpenDecisionTracker::new(evaluator),
            horizon: Horizon::default(),
            current: None,
            closed: Vec::new(),
            retracting: false,
            retractions: 0,
        }
    }

    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    pub fn horizon_mut(&mut self) -> &mut Horizon {
        &mut self.horizon
    }

    pub fn tracker(&self) -> &OpenDecisionTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut OpenDecisionTracker {
        &mut self.tracker
    }

    /// Depth of the closed decision stack.
    pub fn closed_decisions(&self) -> usize {
        self.closed.len()
    }

    pub fn decision_stack(&self) -> &[DecisionPoint] {
        &self.closed
    }

    pub fn current_decision(&self) -> Option<&DecisionPoint> {
        self.current.as_ref()
    }

    pub fn is_retracting(&self) -> bool {
        self.retracting
    }

    /// Number of decisions fully exhausted during backtracking.
    pub fn retractions(&self) -> u64 {
        self.retractions
    }

    pub fn has_decision_to_retract(&self) -> bool {
        self.current.is_some() || !self.closed.is_empty()
    }

    /// Forgets all bookkeeping without touching the database.
    pub fn reset(&mut self) {
        self.current = None;
        self.closed.clear();
        self.retracting = false;
        self.retractions = 0;
    }

    /// Undoes every applied decision, deepest last.
    pub fn retract_all(&mut self, db: &mut PlanDatabase) {
        if let Some(mut d) = self.current.take() {
            if d.is_applied() {
                d.retract(db);
            }
        }
        while let Some(mut d) = self.closed.pop() {
            d.retract(db);
        }
        self.retracting = false;
        db.propagate();
    }

    fn initialize_if_needed(&mut self, db: &mut PlanDatabase) {
        if !self.tracker.is_initialized() {
            self.tracker.initialize(db, &self.horizon);
            // The bootstrap scan covers everything queued so far.
            db.drain_events();
        }
    }

    /// Makes one forward move. Returns false when there is nothing to
    /// decide (plan found) or the applied choice did not stick; in the
    /// latter case the manager is left retracting.
    pub fn assign_decision(&mut self, db: &mut PlanDatabase) -> bool {
        assert!(!self.retracting, "cannot assign while retracting");
        self.initialize_if_needed(db);
        self.tracker.sync(db, &self.horizon);

        let mut decision = match self.current.take() {
            Some(d) => d,
            None => match self.tracker.get_next_decision(db, &self.horizon) {
                Some(d) => d,
                None => return false,
            },
        };

        self.retracting = true;
        if !decision.has_remaining_choices() {
            // Dead end: no way to resolve the flaw. Discard and let the
            // caller backtrack.
            debug!(?decision, "flaw with no choices, backtracking");
            return false;
        }
        decision.assign(db);
        if db.propagate() {
            trace!(depth = self.closed.len() + 1, "decision closed");
            self.closed.push(decision);
            self.retracting = false;
            true
        } else {
            // Keep it current so retraction can undo the choice.
            self.current = Some(decision);
            false
        }
    }

    /// Undoes one decision. Clears retracting mode if the decision
    /// still has untried choices; otherwise it is discarded and the
    /// next call digs deeper into the stack.
    pub fn retract_decision(&mut self, db: &mut PlanDatabase) {
        debug_assert!(self.retracting, "retract only while retracting");
        let mut decision = match self.current.take() {
            Some(d) => d,
            None => match self.closed.pop() {
                Some(d) => d,
                None => return,
            },
        };
        if decision.is_applied() {
            decision.retract(db);
            db.propagate();
            self.tracker.sync(db, &self.horizon);
        }
        if decision.has_remaining_choices() {
            self.current = Some(decision);
            self.retracting = false;
        } else {
            self.retractions += 1;
            debug!(depth = self.closed.len(), "decision exhausted");
        }
    }
}
