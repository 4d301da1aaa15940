//! Open-decision tracking.
//!
//! The tracker keeps incremental buffers of flaws (inactive tokens,
//! decidable variables split into unit and non-unit) maintained from
//! drained database events, and selects the next decision: forced
//! single-choice flaws first, then the best-priority flaw with ties
//! broken on branching factor and allocation key. Threat flaws (active
//! unordered tokens) are queried live rather than buffered.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::heuristics::{Evaluator, EPSILON};
use crate::models::{
    ConstraintKind, DbEvent, DomainChange, Entity, PlanDatabase, TokId, Value, VarId,
};
use crate::search::condition::{Condition, ConditionCtx, ConditionId};
use crate::search::decision::{DecisionPoint, TokenChoice};
use crate::search::horizon::Horizon;

/// Interval domains wider than this branch on their bounds only.
const MAX_ENUMERATED_INTERVAL: usize = 50;

pub struct OpenDecisionTracker {
    conditions: Vec<(ConditionId, Condition)>,
    next_condition: u32,
    initialized: bool,
    /// Set when the condition registry changes; the buffers are rebuilt
    /// at the next sync so static exclusions track the registry.
    needs_refilter: bool,
    token_flaws: BTreeSet<TokId>,
    unit_vars: BTreeSet<VarId>,
    nonunit_vars: BTreeSet<VarId>,
    guards: BTreeMap<VarId, u32>,
    evaluator: Box<dyn Evaluator>,
}

impl OpenDecisionTracker {
    pub fn new(evaluator: Box<dyn Evaluator>) -> Self {
        Self {
            conditions: Vec::new(),
            next_condition: 0,
            initialized: false,
            needs_refilter: false,
            token_flaws: BTreeSet::new(),
            unit_vars: BTreeSet::new(),
            nonunit_vars: BTreeSet::new(),
            guards: BTreeMap::new(),
            evaluator,
        }
    }

    // ---- conditions ---------------------------------------------------

    /// Attaches an agenda filter. Dynamic conditions are re-evaluated at
    /// every query; static ones gate what enters the flaw buffers, so
    /// the buffers are refiltered at the next sync.
    pub fn attach_condition(&mut self, condition: Condition) -> ConditionId {
        let id = ConditionId(self.next_condition);
        self.next_condition += 1;
        self.conditions.push((id, condition));
        self.needs_refilter = true;
        id
    }

    pub fn condition_mut(&mut self, id: ConditionId) -> Option<&mut Condition> {
        self.needs_refilter = true;
        self.conditions
            .iter_mut()
            .find(|(cid, _)| *cid == id)
            .map(|(_, c)| c)
    }

    pub fn detach_condition(&mut self, id: ConditionId) {
        self.conditions.retain(|(cid, _)| *cid != id);
        self.needs_refilter = true;
    }

    fn passes(&self, ctx: &ConditionCtx, entity: Entity) -> bool {
        self.conditions.iter().all(|(_, c)| c.test(ctx, entity))
    }

    fn passes_static(&self, ctx: &ConditionCtx, entity: Entity) -> bool {
        self.conditions
            .iter()
            .filter(|(_, c)| !c.is_dynamic())
            .all(|(_, c)| c.test(ctx, entity))
    }

    // ---- buffer maintenance -------------------------------------------

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Bootstrap scan of the database; later maintenance is
    /// event-driven.
    pub fn initialize(&mut self, db: &PlanDatabase, horizon: &Horizon) {
        self.rebuild(db, horizon);
        self.initialized = true;
    }

    /// Full rescan. Guard counts come first; the static filters may
    /// consult them.
    fn rebuild(&mut self, db: &PlanDatabase, horizon: &Horizon) {
        self.token_flaws.clear();
        self.unit_vars.clear();
        self.nonunit_vars.clear();
        self.guards.clear();
        for c in db.constraint_ids() {
            let constraint = db.constraint(c);
            if constraint.kind == ConstraintKind::Guard {
                for &v in &constraint.scope {
                    self.add_guard(v);
                }
            }
        }
        for tok in db.token_ids() {
            if db.token(tok).is_inactive() {
                self.buffer_token_flaw(db, horizon, tok);
            }
        }
        for var in db.variable_ids() {
            self.update_variable_flaw(db, horizon, var);
        }
        self.needs_refilter = false;
    }

    fn is_decidable(&self, db: &PlanDatabase, var: VarId) -> bool {
        let v = match db.try_variable(var) {
            Some(v) => v,
            None => return false,
        };
        if !v.kind.is_decidable() || v.is_specified() {
            return false;
        }
        match v.parent {
            Some(tok) => db.token(tok).is_active(),
            None => true,
        }
    }

    fn update_variable_flaw(&mut self, db: &PlanDatabase, horizon: &Horizon, var: VarId) {
        self.unit_vars.remove(&var);
        self.nonunit_vars.remove(&var);
        if !self.is_decidable(db, var) {
            return;
        }
        let ctx = ConditionCtx {
            db,
            horizon,
            guards: &self.guards,
        };
        if !self.passes_static(&ctx, Entity::Variable(var)) {
            return;
        }
        if db.variable(var).domain.is_singleton() {
            self.unit_vars.insert(var);
        } else {
            self.nonunit_vars.insert(var);
        }
    }

    fn buffer_token_flaw(&mut self, db: &PlanDatabase, horizon: &Horizon, tok: TokId) {
        let ctx = ConditionCtx {
            db,
            horizon,
            guards: &self.guards,
        };
        if self.passes_static(&ctx, Entity::Token(tok)) {
            self.token_flaws.insert(tok);
        }
    }

    fn add_guard(&mut self, var: VarId) {
        *self.guards.entry(var).or_insert(0) += 1;
    }

    fn remove_guard(&mut self, var: VarId) {
        if let Some(n) = self.guards.get_mut(&var) {
            *n -= 1;
            if *n == 0 {
                self.guards.remove(&var);
            }
        }
    }

    /// Drains database events into the flaw buffers, then refilters the
    /// buffers if the condition registry changed since the last sync.
    pub fn sync(&mut self, db: &mut PlanDatabase, horizon: &Horizon) {
        debug_assert!(self.initialized, "initialize before syncing");
        for event in db.drain_events() {
            match event {
                DbEvent::TokenAdded(t) => {
                    if db.try_token(t).map(|tok| tok.is_inactive()).unwrap_or(false) {
                        self.buffer_token_flaw(db, horizon, t);
                    }
                }
                DbEvent::TokenRemoved(t) => {
                    self.token_flaws.remove(&t);
                }
                DbEvent::TokenActivated(t) => {
                    self.token_flaws.remove(&t);
                    if let Some(tok) = db.try_token(t) {
                        for var in tok.variables() {
                            self.update_variable_flaw(db, horizon, var);
                        }
                    }
                }
                DbEvent::TokenDeactivated(t) => {
                    self.buffer_token_flaw(db, horizon, t);
                    if let Some(tok) = db.try_token(t) {
                        for var in tok.variables() {
                            self.unit_vars.remove(&var);
                            self.nonunit_vars.remove(&var);
                        }
                    }
                }
                DbEvent::TokenMerged(t) | DbEvent::TokenRejected(t) => {
                    self.token_flaws.remove(&t);
                }
                DbEvent::TokenSplit(t) | DbEvent::TokenReinstated(t) => {
                    self.buffer_token_flaw(db, horizon, t);
                }
                DbEvent::VariableAdded(v) => {
                    self.update_variable_flaw(db, horizon, v);
                }
                DbEvent::VariableRemoved(v) => {
                    self.unit_vars.remove(&v);
                    self.nonunit_vars.remove(&v);
                    self.guards.remove(&v);
                }
                DbEvent::DomainChanged(v, change) => match change {
                    DomainChange::SetToSingleton => {
                        self.unit_vars.remove(&v);
                        self.nonunit_vars.remove(&v);
                    }
                    DomainChange::RestrictToSingleton
                    | DomainChange::Relaxed
                    | DomainChange::Reset
                    | DomainChange::Closed => {
                        self.update_variable_flaw(db, horizon, v);
                    }
                    DomainChange::Restricted | DomainChange::Emptied => {}
                },
                DbEvent::ConstraintAdded(c) => {
                    if let Some(constraint) = db.try_constraint(c) {
                        if constraint.kind == ConstraintKind::Guard {
                            for v in constraint.scope.clone() {
                                self.add_guard(v);
                            }
                        }
                    }
                }
                DbEvent::ConstraintRemoved { kind, scope } => {
                    if kind == ConstraintKind::Guard {
                        for v in scope {
                            self.remove_guard(v);
                        }
                    }
                }
            }
        }
        if self.needs_refilter {
            self.rebuild(db, horizon);
        }
    }

    // ---- inspection ---------------------------------------------------

    pub fn token_flaws(&self) -> &BTreeSet<TokId> {
        &self.token_flaws
    }

    pub fn unit_variable_flaws(&self) -> &BTreeSet<VarId> {
        &self.unit_vars
    }

    pub fn nonunit_variable_flaws(&self) -> &BTreeSet<VarId> {
        &self.nonunit_vars
    }

    pub fn guard_counts(&self) -> &BTreeMap<VarId, u32> {
        &self.guards
    }

    /// Whether the variable is an open (non-unit) decision right now.
    pub fn is_variable_decision(&self, db: &PlanDatabase, horizon: &Horizon, var: VarId) -> bool {
        let ctx = ConditionCtx {
            db,
            horizon,
            guards: &self.guards,
        };
        self.nonunit_vars.contains(&var) && self.passes(&ctx, Entity::Variable(var))
    }

    /// Whether the variable is a forced unit decision right now.
    pub fn is_unit_decision(&self, db: &PlanDatabase, horizon: &Horizon, var: VarId) -> bool {
        let ctx = ConditionCtx {
            db,
            horizon,
            guards: &self.guards,
        };
        self.unit_vars.contains(&var) && self.passes(&ctx, Entity::Variable(var))
    }

    /// Whether the token is an open state decision right now.
    pub fn is_token_decision(&self, db: &PlanDatabase, horizon: &Horizon, tok: TokId) -> bool {
        let ctx = ConditionCtx {
            db,
            horizon,
            guards: &self.guards,
        };
        self.token_flaws.contains(&tok) && self.passes(&ctx, Entity::Token(tok))
    }

    /// Whether the token is an open ordering decision (threat) right now.
    pub fn is_ordering_decision(&self, db: &PlanDatabase, horizon: &Horizon, tok: TokId) -> bool {
        let ctx = ConditionCtx {
            db,
            horizon,
            guards: &self.guards,
        };
        db.tokens_to_order().contains(&tok) && self.passes(&ctx, Entity::Token(tok))
    }

    /// Open decisions surviving the filters. Diagnostic; requires a
    /// propagated, consistent database.
    pub fn open_decision_count(&self, db: &PlanDatabase, horizon: &Horizon) -> usize {
        let ctx = ConditionCtx {
            db,
            horizon,
            guards: &self.guards,
        };
        let tokens = self
            .token_flaws
            .iter()
            .filter(|&&t| self.passes(&ctx, Entity::Token(t)))
            .count();
        let vars = self
            .unit_vars
            .iter()
            .chain(&self.nonunit_vars)
            .filter(|&&v| self.passes(&ctx, Entity::Variable(v)))
            .count();
        let orderings = db
            .tokens_to_order()
            .into_iter()
            .filter(|&t| self.passes(&ctx, Entity::Token(t)))
            .count();
        tokens + vars + orderings
    }

    // ---- selection ----------------------------------------------------

    /// Picks the next open decision, or None when the agenda is clear.
    pub fn get_next_decision(&self, db: &PlanDatabase, horizon: &Horizon) -> Option<DecisionPoint> {
        let ctx = ConditionCtx {
            db,
            horizon,
            guards: &self.guards,
        };

        // Forced moves first: unit variables, then single-choice token
        // and threat flaws, each in allocation order.
        for &var in &self.unit_vars {
            if self.passes(&ctx, Entity::Variable(var)) {
                trace!(var = var.index(), "unit variable decision");
                return Some(self.make_variable_decision(db, var));
            }
        }
        for &tok in &self.token_flaws {
            if self.passes(&ctx, Entity::Token(tok))
                && self.evaluator.count_choices(db, Entity::Token(tok)) == 1
            {
                return Some(self.make_token_decision(db, tok));
            }
        }
        for tok in db.tokens_to_order() {
            if self.passes(&ctx, Entity::Token(tok)) && db.count_ordering_choices(tok, 2) == 1 {
                return Some(self.make_ordering_decision(db, tok));
            }
        }

        #[derive(Clone, Copy)]
        enum Pick {
            Ordering(TokId),
            Token(TokId),
            Variable(VarId),
        }
        // (pick, category, priority, choice count, allocation key)
        let mut best: Option<(Pick, u8, f64, u32, u32)> = None;
        let prefer_higher = self.evaluator.prefer_higher_keys();

        // A later category only displaces the pick with a strictly
        // better priority; within a category ties fall to the smaller
        // branching factor, then the allocation key.
        let mut consider =
            |best: &mut Option<(Pick, u8, f64, u32, u32)>, pick: Pick, category: u8, entity: Entity| {
                let priority = self.evaluator.priority(db, entity);
                let count = self.evaluator.count_choices(db, entity);
                let key = db.entity_key(entity);
                let better = match best {
                    None => true,
                    Some((_, bcat, bp, bc, bk)) => {
                        if category == *bcat {
                            priority < *bp - EPSILON
                                || ((priority - *bp).abs() <= EPSILON
                                    && (count < *bc
                                        || (count == *bc
                                            && if prefer_higher { key > *bk } else { key < *bk })))
                        } else {
                            priority < *bp - EPSILON
                        }
                    }
                };
                if better {
                    *best = Some((pick, category, priority, count, key));
                }
            };

        for tok in db.tokens_to_order() {
            if self.passes(&ctx, Entity::Token(tok)) {
                consider(&mut best, Pick::Ordering(tok), 0, Entity::Token(tok));
            }
        }
        for &tok in &self.token_flaws {
            if self.passes(&ctx, Entity::Token(tok)) {
                consider(&mut best, Pick::Token(tok), 1, Entity::Token(tok));
            }
        }
        for pass in 0..2u8 {
            for &var in &self.nonunit_vars {
                let guarded = self.guards.contains_key(&var);
                if (pass == 0) != guarded {
                    continue;
                }
                if self.passes(&ctx, Entity::Variable(var)) {
                    consider(&mut best, Pick::Variable(var), 2 + pass, Entity::Variable(var));
                }
            }
        }

        match best.map(|(pick, ..)| pick) {
            Some(Pick::Ordering(tok)) => Some(self.make_ordering_decision(db, tok)),
            Some(Pick::Token(tok)) => Some(self.make_token_decision(db, tok)),
            Some(Pick::Variable(var)) => Some(self.make_variable_decision(db, var)),
            None => None,
        }
    }

    fn make_variable_decision(&self, db: &PlanDatabase, var: VarId) -> DecisionPoint {
        let domain = &db.variable(var).domain;
        let choices = if domain.is_finite() && domain.size() <= MAX_ENUMERATED_INTERVAL {
            domain.values()
        } else if domain.is_singleton() {
            domain.values()
        } else {
            vec![
                Value::Int(domain.lower_bound()),
                Value::Int(domain.upper_bound()),
            ]
        };
        let choices = self.evaluator.order_value_choices(db, var, choices);
        DecisionPoint::variable(var, choices)
    }

    fn make_token_decision(&self, db: &PlanDatabase, tok: TokId) -> DecisionPoint {
        let mut choices = Vec::new();
        if db.has_ordering_choice(tok) {
            choices.push(TokenChoice::Activate);
        }
        for m in db.compatible_tokens(tok) {
            choices.push(TokenChoice::MergeWith(m));
        }
        if db.token(tok).can_be_rejected() {
            choices.push(TokenChoice::Reject);
        }
        let choices = self.evaluator.order_token_choices(db, tok, choices);
        DecisionPoint::token(tok, choices)
    }

    fn make_ordering_decision(&self, db: &PlanDatabase, tok: TokId) -> DecisionPoint {
        let choices = db.ordering_choices(tok);
        let choices = self.evaluator.order_ordering_choices(db, tok, choices);
        DecisionPoint::ordering(tok, choices)
    }
}

impl std::fmt::Debug for OpenDecisionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenDecisionTracker")
            .field("initialized", &self.initialized)
            .field("token_flaws", &self.token_flaws)
            .field("unit_vars", &self.unit_vars)
            .field("nonunit_vars", &self.nonunit_vars)
            .field("guards", &self.guards)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::DefaultEvaluator;
    use crate::models::{Domain, SubgoalRelation, SubgoalRule, TokenSpec};

    fn tracker() -> OpenDecisionTracker {
        OpenDecisionTracker::new(Box::new(DefaultEvaluator))
    }

    #[test]
    fn test_bootstrap_and_activation_moves_flaws() {
        let mut db = PlanDatabase::new();
        db.add_object("t1");
        let t = db.new_token(
            TokenSpec::new("P1")
                .with_parameter(Domain::enumerated(vec![Value::Int(1), Value::Int(2)])),
        );
        db.propagate();

        let mut odm = tracker();
        odm.initialize(&db, &Horizon::default());
        db.drain_events();
        assert!(odm.token_flaws().contains(&t));
        assert!(odm.nonunit_variable_flaws().is_empty());

        db.activate(t);
        db.propagate();
        odm.sync(&mut db, &Horizon::default());
        assert!(!odm.token_flaws().contains(&t));
        // The parameter becomes decidable once its token is active.
        let param = db.token(t).parameters[0];
        assert!(odm.nonunit_variable_flaws().contains(&param));

        db.deactivate(t);
        db.propagate();
        odm.sync(&mut db, &Horizon::default());
        assert!(odm.token_flaws().contains(&t));
        assert!(!odm.nonunit_variable_flaws().contains(&param));
    }

    #[test]
    fn test_specify_and_reset_move_variable_flaws() {
        let mut db = PlanDatabase::new();
        let v = db.new_global_variable(
            "v",
            Domain::enumerated(vec![Value::Int(1), Value::Int(2)]),
        );
        db.propagate();
        let mut odm = tracker();
        odm.initialize(&db, &Horizon::default());
        db.drain_events();
        assert!(odm.nonunit_variable_flaws().contains(&v));

        db.specify(v, Value::Int(1));
        db.propagate();
        odm.sync(&mut db, &Horizon::default());
        assert!(!odm.nonunit_variable_flaws().contains(&v));
        assert!(!odm.unit_variable_flaws().contains(&v));

        db.reset_specified(v);
        db.propagate();
        odm.sync(&mut db, &Horizon::default());
        assert!(odm.nonunit_variable_flaws().contains(&v));
    }

    #[test]
    fn test_propagation_narrowing_makes_unit_flaw() {
        let mut db = PlanDatabase::new();
        let a = db.new_global_variable(
            "a",
            Domain::enumerated(vec![Value::Int(1), Value::Int(2)]),
        );
        let b = db.new_global_variable("b", Domain::enumerated(vec![Value::Int(2)]));
        db.propagate();
        let mut odm = tracker();
        odm.initialize(&db, &Horizon::default());
        db.drain_events();
        assert!(odm.nonunit_variable_flaws().contains(&a));

        db.add_constraint(ConstraintKind::Eq, vec![a, b]);
        assert!(db.propagate());
        odm.sync(&mut db, &Horizon::default());
        assert!(odm.unit_variable_flaws().contains(&a));
        assert!(!odm.nonunit_variable_flaws().contains(&a));
    }

    #[test]
    fn test_guard_refcounts_follow_constraints() {
        let mut db = PlanDatabase::new();
        db.add_rule(
            SubgoalRule::new("P1", SubgoalRelation::MeetsMaster)
                .with_guard(0, Value::symbol("go")),
        );
        let t = db.new_token(
            TokenSpec::new("P1")
                .with_start(0, 10)
                .with_end(0, 200)
                .with_parameter(Domain::enumerated(vec![
                    Value::symbol("go"),
                    Value::symbol("stop"),
                ])),
        );
        db.propagate();
        let mut odm = tracker();
        odm.initialize(&db, &Horizon::default());
        db.drain_events();
        assert!(odm.guard_counts().is_empty());

        db.activate(t);
        db.propagate();
        odm.sync(&mut db, &Horizon::default());
        let param = db.token(t).parameters[0];
        assert_eq!(odm.guard_counts().get(&param), Some(&1));

        db.deactivate(t);
        db.propagate();
        odm.sync(&mut db, &Horizon::default());
        assert!(odm.guard_counts().is_empty());
    }

    #[test]
    fn test_single_choice_token_flaw_goes_first() {
        let mut db = PlanDatabase::new();
        db.add_object("t1");
        // v branches three ways; the token has only activation.
        let v = db.new_global_variable(
            "v",
            Domain::enumerated(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        );
        let t = db.new_token(TokenSpec::new("P1"));
        db.propagate();
        let mut odm = tracker();
        odm.initialize(&db, &Horizon::default());
        db.drain_events();

        let horizon = Horizon::default();
        let dp = odm.get_next_decision(&db, &horizon).unwrap();
        assert_eq!(dp.entity(), Entity::Token(t));
        match dp {
            DecisionPoint::Token { choices, .. } => {
                assert_eq!(choices, vec![TokenChoice::Activate]);
            }
            other => panic!("expected token decision, got {other:?}"),
        }
        let _ = v;
    }

    #[test]
    fn test_threat_keeps_precedence_over_token_flaws() {
        use crate::search::condition::{DynamicInfiniteRealFilter, TemporalVariableFilter};

        let mut db = PlanDatabase::new();
        db.add_object("t1");
        let anchor = db.new_token(TokenSpec::new("Q").with_start(0, 10).with_end(0, 200));
        let t1 = db.new_token(
            TokenSpec::new("P1").with_start(0, 10).with_end(0, 200).rejectable(),
        );
        let t2 = db.new_token(
            TokenSpec::new("P2").with_start(0, 10).with_end(0, 200).rejectable(),
        );
        let threat = db.new_token(TokenSpec::new("Q2").with_start(0, 10).with_end(0, 200));
        db.activate(anchor);
        db.propagate();
        db.order(anchor, &db.ordering_choices(anchor)[0]);
        db.activate(threat);
        db.propagate();

        let mut odm = tracker();
        odm.attach_condition(Condition::TemporalVariables(TemporalVariableFilter::default()));
        odm.attach_condition(Condition::DynamicDomains(DynamicInfiniteRealFilter::default()));
        odm.initialize(&db, &Horizon::default());
        db.drain_events();

        // Two insertion points for the threat, two choices for each
        // rejectable token; the lower-keyed token flaws must not
        // displace the threat at equal priority.
        let dp = odm.get_next_decision(&db, &Horizon::default()).unwrap();
        assert_eq!(dp.entity(), Entity::Token(threat));
        assert!(matches!(dp, DecisionPoint::Ordering { .. }));
        let _ = (t1, t2);
    }

    #[test]
    fn test_variable_added_after_bootstrap_enters_the_agenda() {
        let mut db = PlanDatabase::new();
        db.propagate();
        let mut odm = tracker();
        odm.initialize(&db, &Horizon::default());
        db.drain_events();
        assert!(odm.nonunit_variable_flaws().is_empty());

        let v = db.new_global_variable(
            "mode",
            Domain::enumerated(vec![Value::Int(1), Value::Int(2)]),
        );
        db.propagate();
        odm.sync(&mut db, &Horizon::default());
        assert!(odm.nonunit_variable_flaws().contains(&v));
    }

    #[test]
    fn test_flaw_queries_and_open_count() {
        use crate::search::condition::{
            DynamicInfiniteRealFilter, NoBranchSpec, TemporalVariableFilter,
        };

        let mut db = PlanDatabase::new();
        db.add_object("t1");
        let t = db.new_token(TokenSpec::new("P1"));
        let v = db.new_global_variable(
            "v",
            Domain::enumerated(vec![Value::Int(1), Value::Int(2)]),
        );
        db.propagate();

        let mut odm = tracker();
        odm.attach_condition(Condition::TemporalVariables(TemporalVariableFilter::default()));
        odm.attach_condition(Condition::DynamicDomains(DynamicInfiniteRealFilter::default()));
        odm.initialize(&db, &Horizon::default());
        db.drain_events();
        let horizon = Horizon::default();

        assert!(odm.is_token_decision(&db, &horizon, t));
        assert!(odm.is_variable_decision(&db, &horizon, v));
        assert!(!odm.is_ordering_decision(&db, &horizon, t));
        assert_eq!(odm.open_decision_count(&db, &horizon), 2);

        db.activate(t);
        db.propagate();
        odm.sync(&mut db, &Horizon::default());
        assert!(!odm.is_token_decision(&db, &horizon, t));
        assert!(odm.is_ordering_decision(&db, &horizon, t));
        assert_eq!(odm.open_decision_count(&db, &horizon), 2);

        // A deny-list takes v off the agenda until detached.
        let no_branch = odm.attach_condition(Condition::NoBranch(NoBranchSpec::new().deny("v")));
        assert!(!odm.is_variable_decision(&db, &horizon, v));
        assert_eq!(odm.open_decision_count(&db, &horizon), 1);
        odm.detach_condition(no_branch);
        assert!(odm.is_variable_decision(&db, &horizon, v));
    }

    #[test]
    fn test_wide_interval_branches_on_bounds() {
        let mut db = PlanDatabase::new();
        let v = db.new_global_variable("v", Domain::interval(0, 1000));
        db.propagate();
        let mut odm = tracker();
        odm.initialize(&db, &Horizon::default());
        db.drain_events();

        let horizon = Horizon::default();
        let dp = odm.get_next_decision(&db, &horizon).unwrap();
        match dp {
            DecisionPoint::Variable { var, choices, .. } => {
                assert_eq!(var, v);
                assert_eq!(choices, vec![Value::Int(0), Value::Int(1000)]);
            }
            other => panic!("expected variable decision, got {other:?}"),
        }
    }
}
