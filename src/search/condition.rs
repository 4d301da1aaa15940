//! Agenda filter conditions.
//!
//! A condition decides whether an entity may carry an open decision.
//! Static conditions are consulted when a flaw enters the agenda and
//! whenever it is queried; dynamic conditions depend on state that
//! moves during the search (the horizon, domain openness, master
//! insertion) and are always re-evaluated at query time.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::{Entity, PlanDatabase, TokId, VarId, VarKind};
use crate::search::horizon::Horizon;

/// Handle to an attached condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConditionId(pub(crate) u32);

/// Evaluation context handed to conditions.
pub struct ConditionCtx<'a> {
    pub db: &'a PlanDatabase,
    pub horizon: &'a Horizon,
    /// Reference counts of variables currently guarding a pending rule.
    pub guards: &'a BTreeMap<VarId, u32>,
}

/// How the horizon condition treats partially overlapping tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorizonMode {
    /// Filter tokens that might lie outside the horizon.
    PossiblyOutside,
    /// Filter only tokens that cannot lie inside the horizon.
    NecessarilyOutside,
}

/// Filters tokens (and their variables) by horizon membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HorizonCondition {
    pub mode: HorizonMode,
}

impl Default for HorizonCondition {
    fn default() -> Self {
        Self {
            mode: HorizonMode::PossiblyOutside,
        }
    }
}

impl HorizonCondition {
    pub fn set_possibly_outside(&mut self) {
        self.mode = HorizonMode::PossiblyOutside;
    }

    pub fn set_necessarily_outside(&mut self) {
        self.mode = HorizonMode::NecessarilyOutside;
    }

    fn test_token(&self, ctx: &ConditionCtx, tok: TokId) -> bool {
        let start_lb = ctx.db.earliest_start(tok);
        let end_ub = ctx.db.latest_end(tok);
        match self.mode {
            HorizonMode::PossiblyOutside => {
                start_lb >= ctx.horizon.start() && end_ub <= ctx.horizon.end()
            }
            HorizonMode::NecessarilyOutside => {
                !(start_lb > ctx.horizon.end() || end_ub < ctx.horizon.start())
            }
        }
    }
}

/// Keeps temporal variables off the agenda; the planner places tokens,
/// it does not ground their timepoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalVariableFilter {
    pub ignore_start: bool,
    pub ignore_end: bool,
    pub ignore_duration: bool,
    /// When set, a start or end variable whose domain still reaches the
    /// horizon end stays decidable.
    pub allow_horizon_overlap: bool,
}

impl Default for TemporalVariableFilter {
    fn default() -> Self {
        Self {
            ignore_start: true,
            ignore_end: true,
            ignore_duration: true,
            allow_horizon_overlap: false,
        }
    }
}

/// Filters variables whose domains are open or infinite; they cannot
/// be branched on until they settle. Guard variables are exempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicInfiniteRealFilter {
    pub enabled: bool,
}

impl Default for DynamicInfiniteRealFilter {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl DynamicInfiniteRealFilter {
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }
}

/// Deny-list of qualified variable names the search must never branch
/// on. Parameters match either by name or by `"<predicate>.<index>"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoBranchSpec {
    names: BTreeSet<String>,
}

impl NoBranchSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    fn excludes(&self, ctx: &ConditionCtx, var: VarId) -> bool {
        if self.names.contains(&ctx.db.qualified_name(var)) {
            return true;
        }
        match (ctx.db.variable(var).parent, ctx.db.parameter_index(var)) {
            (Some(tok), Some(idx)) => {
                let by_index = format!("{}.{}", ctx.db.token(tok).predicate, idx);
                self.names.contains(&by_index)
            }
            _ => false,
        }
    }
}

/// An agenda filter. Returns true from [`Condition::test`] when the
/// entity may carry a decision.
#[derive(Debug, Clone)]
pub enum Condition {
    Horizon(HorizonCondition),
    TemporalVariables(TemporalVariableFilter),
    DynamicDomains(DynamicInfiniteRealFilter),
    /// Slave tokens wait until their master is active and ordered.
    MasterMustBeInserted,
    NoBranch(NoBranchSpec),
}

impl Condition {
    /// Dynamic conditions depend on state that moves during the search
    /// and must be re-evaluated at every query. Static conditions are
    /// also applied when a flaw enters the agenda buffers.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Condition::Horizon(_) => true,
            // Only the horizon-overlap escape reads search-time state.
            Condition::TemporalVariables(f) => f.allow_horizon_overlap,
            Condition::DynamicDomains(_) => true,
            Condition::MasterMustBeInserted => true,
            Condition::NoBranch(_) => false,
        }
    }

    pub fn test(&self, ctx: &ConditionCtx, entity: Entity) -> bool {
        match self {
            Condition::Horizon(cond) => match entity {
                Entity::Token(tok) => cond.test_token(ctx, tok),
                Entity::Variable(var) => match ctx.db.variable(var).parent {
                    Some(tok) => cond.test_token(ctx, tok),
                    None => true,
                },
                Entity::Object(_) => true,
            },
            Condition::TemporalVariables(f) => match entity {
                Entity::Variable(var) => {
                    let v = ctx.db.variable(var);
                    let ignored = match v.kind {
                        VarKind::Start => f.ignore_start,
                        VarKind::End => f.ignore_end,
                        VarKind::Duration => f.ignore_duration,
                        _ => return true,
                    };
                    if !ignored {
                        return true;
                    }
                    if f.allow_horizon_overlap && v.kind != VarKind::Duration {
                        let lb = v.domain.lower_bound();
                        let ub = v.domain.upper_bound();
                        return lb <= ctx.horizon.end() && ctx.horizon.end() <= ub;
                    }
                    false
                }
                _ => true,
            },
            Condition::DynamicDomains(f) => match entity {
                Entity::Variable(var) if f.enabled => {
                    if ctx.guards.contains_key(&var) {
                        return true;
                    }
                    let d = &ctx.db.variable(var).domain;
                    !d.is_open() && d.is_finite()
                }
                _ => true,
            },
            Condition::MasterMustBeInserted => {
                let tok = match entity {
                    Entity::Token(tok) => tok,
                    Entity::Variable(var) => match ctx.db.variable(var).parent {
                        Some(tok) => tok,
                        None => return true,
                    },
                    Entity::Object(_) => return true,
                };
                match ctx.db.token(tok).master {
                    Some(master) => {
                        let m = ctx.db.token(master);
                        m.is_active() && m.inserted_on.is_some()
                    }
                    None => true,
                }
            }
            Condition::NoBranch(spec) => match entity {
                Entity::Variable(var) => !spec.excludes(ctx, var),
                _ => true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Domain, TokenSpec, Value};

    fn ctx<'a>(
        db: &'a PlanDatabase,
        horizon: &'a Horizon,
        guards: &'a BTreeMap<VarId, u32>,
    ) -> ConditionCtx<'a> {
        ConditionCtx { db, horizon, guards }
    }

    #[test]
    fn test_horizon_possibly_outside() {
        let mut db = PlanDatabase::new();
        let t = db.new_token(TokenSpec::new("P1").with_start(0, 10).with_end(0, 200));
        db.propagate();
        let guards = BTreeMap::new();
        let cond = Condition::Horizon(HorizonCondition::default());

        let wide = Horizon::new(0, 1000);
        assert!(cond.test(&ctx(&db, &wide, &guards), Entity::Token(t)));

        // end may land beyond 100, so the token might be outside.
        let tight = Horizon::new(0, 100);
        assert!(!cond.test(&ctx(&db, &tight, &guards), Entity::Token(t)));
    }

    #[test]
    fn test_horizon_necessarily_outside_readmits_on_widening() {
        let mut db = PlanDatabase::new();
        let t = db.new_token(TokenSpec::new("P1").with_start(50, 60).with_end(50, 200));
        db.propagate();
        let guards = BTreeMap::new();
        let cond = Condition::Horizon(HorizonCondition {
            mode: HorizonMode::NecessarilyOutside,
        });

        // start.lb beyond the horizon end: the token cannot fit.
        let early = Horizon::new(0, 40);
        assert!(!cond.test(&ctx(&db, &early, &guards), Entity::Token(t)));

        let widened = Horizon::new(0, 100);
        assert!(cond.test(&ctx(&db, &widened, &guards), Entity::Token(t)));
    }

    #[test]
    fn test_token_variables_inherit_horizon_result() {
        let mut db = PlanDatabase::new();
        let t = db.new_token(TokenSpec::new("P1").with_start(50, 60).with_end(50, 200));
        db.propagate();
        let guards = BTreeMap::new();
        let cond = Condition::Horizon(HorizonCondition {
            mode: HorizonMode::NecessarilyOutside,
        });
        let early = Horizon::new(0, 40);
        let start = db.token(t).start;
        assert!(!cond.test(&ctx(&db, &early, &guards), Entity::Variable(start)));
    }

    #[test]
    fn test_temporal_filter_flags_and_overlap() {
        let mut db = PlanDatabase::new();
        let t = db.new_token(TokenSpec::new("P1").with_start(0, 10).with_end(0, 200));
        db.propagate();
        let guards = BTreeMap::new();
        let horizon = Horizon::new(0, 100);
        let start = db.token(t).start;
        let end = db.token(t).end;

        let default = Condition::TemporalVariables(TemporalVariableFilter::default());
        assert!(!default.test(&ctx(&db, &horizon, &guards), Entity::Variable(start)));
        assert!(!default.test(&ctx(&db, &horizon, &guards), Entity::Variable(end)));

        let keep_start = Condition::TemporalVariables(TemporalVariableFilter {
            ignore_start: false,
            ..TemporalVariableFilter::default()
        });
        assert!(keep_start.test(&ctx(&db, &horizon, &guards), Entity::Variable(start)));
        assert!(!keep_start.test(&ctx(&db, &horizon, &guards), Entity::Variable(end)));

        // With overlap allowed the end variable still reaches the
        // horizon end, so it stays decidable.
        let overlap = Condition::TemporalVariables(TemporalVariableFilter {
            allow_horizon_overlap: true,
            ..TemporalVariableFilter::default()
        });
        assert!(overlap.test(&ctx(&db, &horizon, &guards), Entity::Variable(end)));
        let late = Horizon::new(0, 300);
        assert!(!overlap.test(&ctx(&db, &late, &guards), Entity::Variable(end)));
    }

    #[test]
    fn test_dynamic_domain_filter_exempts_guards() {
        let mut db = PlanDatabase::new();
        let open = db.new_global_variable(
            "modes",
            Domain::open_enumerated(vec![Value::symbol("L1")]),
        );
        db.propagate();
        let horizon = Horizon::default();
        let cond = Condition::DynamicDomains(DynamicInfiniteRealFilter::default());

        let none = BTreeMap::new();
        assert!(!cond.test(&ctx(&db, &horizon, &none), Entity::Variable(open)));

        let mut guards = BTreeMap::new();
        guards.insert(open, 1u32);
        assert!(cond.test(&ctx(&db, &horizon, &guards), Entity::Variable(open)));

        let disabled = Condition::DynamicDomains(DynamicInfiniteRealFilter { enabled: false });
        assert!(disabled.test(&ctx(&db, &horizon, &none), Entity::Variable(open)));

        db.close_variable_domain(open);
        assert!(cond.test(&ctx(&db, &horizon, &none), Entity::Variable(open)));
    }

    #[test]
    fn test_master_must_be_inserted() {
        let mut db = PlanDatabase::new();
        db.add_object("t1");
        let master = db.new_token(TokenSpec::new("P1"));
        let mut spec = TokenSpec::new("P2");
        spec.master = Some(master);
        let slave = db.new_token(spec);
        db.propagate();
        let guards = BTreeMap::new();
        let horizon = Horizon::default();
        let cond = Condition::MasterMustBeInserted;

        assert!(cond.test(&ctx(&db, &horizon, &guards), Entity::Token(master)));
        assert!(!cond.test(&ctx(&db, &horizon, &guards), Entity::Token(slave)));

        db.activate(master);
        db.propagate();
        assert!(!cond.test(&ctx(&db, &horizon, &guards), Entity::Token(slave)));

        let choice = db.ordering_choices(master)[0];
        db.order(master, &choice);
        db.propagate();
        assert!(cond.test(&ctx(&db, &horizon, &guards), Entity::Token(slave)));
    }

    #[test]
    fn test_no_branch_spec_deserializes() {
        let spec: NoBranchSpec =
            serde_json::from_str(r#"{"names": ["P1.param0", "mode"]}"#).unwrap();
        assert_eq!(spec, NoBranchSpec::new().deny("P1.param0").deny("mode"));
    }

    #[test]
    fn test_no_branch_by_name_and_index() {
        let mut db = PlanDatabase::new();
        let t = db.new_token(
            TokenSpec::new("P1")
                .with_parameter(Domain::enumerated(vec![Value::Int(1), Value::Int(2)])),
        );
        let g = db.new_global_variable("mode", Domain::enumerated(vec![Value::Int(0)]));
        db.propagate();
        let guards = BTreeMap::new();
        let horizon = Horizon::default();
        let param = db.token(t).parameters[0];

        let by_name = Condition::NoBranch(NoBranchSpec::new().deny("P1.param0"));
        assert!(!by_name.test(&ctx(&db, &horizon, &guards), Entity::Variable(param)));
        assert!(by_name.test(&ctx(&db, &horizon, &guards), Entity::Variable(g)));

        let by_index = Condition::NoBranch(NoBranchSpec::new().deny("P1.0"));
        assert!(!by_index.test(&ctx(&db, &horizon, &guards), Entity::Variable(param)));

        let global = Condition::NoBranch(NoBranchSpec::new().deny("mode"));
        assert!(!global.test(&ctx(&db, &horizon, &guards), Entity::Variable(g)));
    }
}
