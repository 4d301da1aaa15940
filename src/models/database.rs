//! The in-memory plan database.
//!
//! Owns the arenas for variables, tokens, timelines and constraints,
//! the subgoal-rule registry, and the event queue the search layer
//! drains at its synchronization points. Propagation recomputes current
//! domains from base domains plus specifications and runs a constraint
//! fixpoint, so undoing a search choice is always exact: withdraw the
//! mutation and repropagate.
//!
//! # Reference
//! Jónsson et al. (2000), "Planning in Interplanetary Space: Theory and Practice"

use tracing::{debug, trace};

use super::constraint::{Constraint, ConstraintId, ConstraintKind, ConstraintSource};
use super::domain::{Domain, DomainChange, Value, MINUS_INFINITY, PLUS_INFINITY};
use super::object::{ObjId, OrderingChoice, PlanObject};
use super::rule::{RuleInstance, SubgoalRelation, SubgoalRule};
use super::token::{TokId, Token, TokenSpec, TokenState};
use super::variable::{VarId, VarKind, Variable};

/// Any entity the search can hold a decision against or filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Variable(VarId),
    Token(TokId),
    Object(ObjId),
}

/// Database change notifications, drained by the open-decision tracker.
#[derive(Debug, Clone)]
pub enum DbEvent {
    TokenAdded(TokId),
    TokenRemoved(TokId),
    TokenActivated(TokId),
    TokenDeactivated(TokId),
    TokenMerged(TokId),
    TokenSplit(TokId),
    TokenRejected(TokId),
    TokenReinstated(TokId),
    VariableAdded(VarId),
    VariableRemoved(VarId),
    DomainChanged(VarId, DomainChange),
    ConstraintAdded(ConstraintId),
    /// Carries the payload because the constraint is already gone.
    ConstraintRemoved {
        kind: ConstraintKind,
        scope: Vec<VarId>,
    },
}

/// The plan database: typed objects, tokens and constrained variables.
#[derive(Debug, Default)]
pub struct PlanDatabase {
    variables: Vec<Option<Variable>>,
    tokens: Vec<Option<Token>>,
    objects: Vec<PlanObject>,
    constraints: Vec<Option<Constraint>>,
    rules: Vec<SubgoalRule>,
    instances: Vec<RuleInstance>,
    next_key: u32,
    events: Vec<DbEvent>,
    closed: bool,
    consistent: bool,
}

impl PlanDatabase {
    pub fn new() -> Self {
        Self {
            consistent: true,
            ..Default::default()
        }
    }

    fn next_key(&mut self) -> u32 {
        let key = self.next_key;
        self.next_key += 1;
        key
    }

    // ---- construction -------------------------------------------------

    /// Adds a timeline.
    pub fn add_object(&mut self, name: impl Into<String>) -> ObjId {
        let key = self.next_key();
        let id = ObjId(self.objects.len() as u32);
        self.objects.push(PlanObject::new(key, name));
        id
    }

    /// Creates a token from a spec and announces it.
    pub fn new_token(&mut self, spec: TokenSpec) -> TokId {
        let id = self.create_token(spec);
        self.events.push(DbEvent::TokenAdded(id));
        id
    }

    fn create_token(&mut self, spec: TokenSpec) -> TokId {
        let id = TokId(self.tokens.len() as u32);
        let pred = spec.predicate.clone();
        let start = self.new_variable("start", VarKind::Start, Some(id), {
            let (lb, ub) = spec.start;
            Domain::interval(lb, ub)
        });
        let end = self.new_variable("end", VarKind::End, Some(id), {
            let (lb, ub) = spec.end;
            Domain::interval(lb, ub)
        });
        let duration = self.new_variable("duration", VarKind::Duration, Some(id), {
            let (lb, ub) = spec.duration;
            Domain::interval(lb, ub)
        });
        let object_domain = match spec.object {
            Some(obj) => Domain::enumerated(vec![Value::Object(obj)]),
            None => Domain::enumerated(
                (0..self.objects.len() as u32).map(|o| Value::Object(ObjId(o))).collect(),
            ),
        };
        let object_var = self.new_variable("object", VarKind::Object, Some(id), object_domain);
        let parameters: Vec<VarId> = spec
            .parameters
            .iter()
            .enumerate()
            .map(|(i, d)| self.new_variable(format!("param{i}"), VarKind::Parameter, Some(id), d.clone()))
            .collect();
        let key = self.next_key();
        self.tokens.push(Some(Token {
            key,
            predicate: pred,
            mandatory: spec.mandatory,
            state: TokenState::Inactive,
            master: spec.master,
            slaves: Vec::new(),
            start,
            end,
            duration,
            parameters,
            object_var,
            merged_onto: None,
            inserted_on: None,
        }));
        id
    }

    fn new_variable(
        &mut self,
        name: impl Into<String>,
        kind: VarKind,
        parent: Option<TokId>,
        base: Domain,
    ) -> VarId {
        let key = self.next_key();
        let id = VarId(self.variables.len() as u32);
        self.variables.push(Some(Variable::new(key, name, kind, parent, base)));
        self.events.push(DbEvent::VariableAdded(id));
        id
    }

    /// Adds a variable with no owning token.
    pub fn new_global_variable(&mut self, name: impl Into<String>, base: Domain) -> VarId {
        self.new_variable(name, VarKind::Global, None, base)
    }

    /// Posts a constraint.
    pub fn add_constraint(&mut self, kind: ConstraintKind, scope: Vec<VarId>) -> ConstraintId {
        self.post_constraint(kind, scope, ConstraintSource::Explicit)
    }

    fn post_constraint(
        &mut self,
        kind: ConstraintKind,
        scope: Vec<VarId>,
        source: ConstraintSource,
    ) -> ConstraintId {
        let key = self.next_key();
        let id = ConstraintId(self.constraints.len() as u32);
        self.constraints.push(Some(Constraint {
            key,
            kind,
            scope,
            source,
        }));
        self.events.push(DbEvent::ConstraintAdded(id));
        id
    }

    /// Withdraws a constraint.
    pub fn remove_constraint(&mut self, id: ConstraintId) {
        if let Some(c) = self.constraints[id.index()].take() {
            self.events.push(DbEvent::ConstraintRemoved {
                kind: c.kind,
                scope: c.scope,
            });
        }
    }

    /// Registers a subgoal rule. Applies to tokens activated afterwards.
    pub fn add_rule(&mut self, rule: SubgoalRule) {
        self.rules.push(rule);
    }

    /// Declares the model complete.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ---- accessors ----------------------------------------------------

    pub fn variable(&self, id: VarId) -> &Variable {
        self.variables[id.index()].as_ref().expect("stale variable reference")
    }

    pub fn try_variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id.index()).and_then(|v| v.as_ref())
    }

    pub fn token(&self, id: TokId) -> &Token {
        self.tokens[id.index()].as_ref().expect("stale token reference")
    }

    pub fn try_token(&self, id: TokId) -> Option<&Token> {
        self.tokens.get(id.index()).and_then(|t| t.as_ref())
    }

    pub fn object(&self, id: ObjId) -> &PlanObject {
        &self.objects[id.index()]
    }

    pub fn constraint(&self, id: ConstraintId) -> &Constraint {
        self.constraints[id.index()].as_ref().expect("stale constraint reference")
    }

    pub fn try_constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(id.index()).and_then(|c| c.as_ref())
    }

    /// Live variable ids in allocation order.
    pub fn variable_ids(&self) -> Vec<VarId> {
        (0..self.variables.len() as u32)
            .map(VarId)
            .filter(|&v| self.variables[v.index()].is_some())
            .collect()
    }

    /// Live token ids in allocation order.
    pub fn token_ids(&self) -> Vec<TokId> {
        (0..self.tokens.len() as u32)
            .map(TokId)
            .filter(|&t| self.tokens[t.index()].is_some())
            .collect()
    }

    pub fn object_ids(&self) -> Vec<ObjId> {
        (0..self.objects.len() as u32).map(ObjId).collect()
    }

    /// Live constraint ids in allocation order.
    pub fn constraint_ids(&self) -> Vec<ConstraintId> {
        (0..self.constraints.len() as u32)
            .map(ConstraintId)
            .filter(|&c| self.constraints[c.index()].is_some())
            .collect()
    }

    /// Allocation key of any entity; the deterministic tie-break order.
    pub fn entity_key(&self, entity: Entity) -> u32 {
        match entity {
            Entity::Variable(v) => self.variable(v).key,
            Entity::Token(t) => self.token(t).key,
            Entity::Object(o) => self.object(o).key,
        }
    }

    /// `"<predicate>.<name>"` for token variables, the bare name for globals.
    pub fn qualified_name(&self, id: VarId) -> String {
        let var = self.variable(id);
        match var.parent {
            Some(tok) => format!("{}.{}", self.token(tok).predicate, var.name),
            None => var.name.clone(),
        }
    }

    /// Position of a parameter variable within its token.
    pub fn parameter_index(&self, id: VarId) -> Option<usize> {
        let var = self.variable(id);
        let tok = self.token(var.parent?);
        tok.parameters.iter().position(|&p| p == id)
    }

    // ---- search mutations ---------------------------------------------

    /// Commits a variable to a single value.
    pub fn specify(&mut self, id: VarId, value: Value) {
        let var = self.variables[id.index()].as_mut().expect("stale variable reference");
        assert!(var.specified.is_none(), "variable already specified");
        debug_assert!(var.domain.contains(&value), "specified value outside domain");
        var.specified = Some(value.clone());
        var.domain = Domain::singleton(value);
        self.events.push(DbEvent::DomainChanged(id, DomainChange::SetToSingleton));
    }

    /// Withdraws a specification; the domain relaxes to its base on the
    /// next propagation.
    pub fn reset_specified(&mut self, id: VarId) {
        let var = self.variables[id.index()].as_mut().expect("stale variable reference");
        assert!(var.specified.is_some(), "variable not specified");
        var.specified = None;
        var.domain = var.base.clone();
        self.events.push(DbEvent::DomainChanged(id, DomainChange::Reset));
    }

    /// Closes an open enumerated domain, both base and current.
    pub fn close_variable_domain(&mut self, id: VarId) {
        let var = self.variables[id.index()].as_mut().expect("stale variable reference");
        let changed = var.base.close();
        var.domain.close();
        if changed {
            self.events.push(DbEvent::DomainChanged(id, DomainChange::Closed));
        }
    }

    /// Activates an inactive token and applies matching subgoal rules.
    pub fn activate(&mut self, id: TokId) {
        {
            let tok = self.tokens[id.index()].as_mut().expect("stale token reference");
            assert!(tok.is_inactive(), "can only activate an inactive token");
            tok.state = TokenState::Active;
        }
        self.events.push(DbEvent::TokenActivated(id));
        debug!(token = id.index(), "token activated");

        // Rules apply to masterless tokens only, so subgoal chains terminate.
        if self.token(id).master.is_none() {
            let matching: Vec<usize> = self
                .rules
                .iter()
                .enumerate()
                .filter(|(_, r)| r.predicate == self.token(id).predicate)
                .map(|(i, _)| i)
                .collect();
            for rule_idx in matching {
                let guard_param = self.rules[rule_idx].guard.as_ref().map(|(p, _)| *p);
                let guard_constraint = match guard_param {
                    Some(pidx) => {
                        let pvar = self.token(id).parameters[pidx];
                        Some(self.post_constraint(
                            ConstraintKind::Guard,
                            vec![pvar],
                            ConstraintSource::Rule(id),
                        ))
                    }
                    None => None,
                };
                self.instances.push(RuleInstance {
                    rule: rule_idx,
                    token: id,
                    fired: false,
                    guard_constraint,
                    slave: None,
                    posted: Vec::new(),
                });
                let inst = self.instances.len() - 1;
                if self.rules[rule_idx].guard.is_none() {
                    self.fire_instance(inst);
                }
            }
        }
    }

    /// Deactivates a token, unwinding any rule firings it caused.
    pub fn deactivate(&mut self, id: TokId) {
        {
            let tok = self.token(id);
            assert!(tok.is_active(), "can only deactivate an active token");
            assert!(tok.inserted_on.is_none(), "unorder before deactivating");
        }
        let mut doomed = Vec::new();
        self.instances.retain(|inst| {
            if inst.token == id {
                doomed.push(inst.clone());
                false
            } else {
                true
            }
        });
        for inst in doomed {
            if let Some(c) = inst.guard_constraint {
                self.remove_constraint(c);
            }
            for c in inst.posted {
                self.remove_constraint(c);
            }
            if let Some(slave) = inst.slave {
                self.remove_token(slave);
            }
        }
        let tok = self.tokens[id.index()].as_mut().expect("stale token reference");
        tok.state = TokenState::Inactive;
        tok.slaves.clear();
        self.events.push(DbEvent::TokenDeactivated(id));
        debug!(token = id.index(), "token deactivated");
    }

    fn remove_token(&mut self, id: TokId) {
        let tok = self.tokens[id.index()].take().expect("stale token reference");
        for var in tok.variables() {
            self.variables[var.index()] = None;
            self.events.push(DbEvent::VariableRemoved(var));
        }
        self.events.push(DbEvent::TokenRemoved(id));
    }

    /// Merges an inactive token onto a compatible active one, bridging
    /// their variables with equality constraints.
    pub fn merge(&mut self, id: TokId, onto: TokId) {
        {
            let tok = self.token(id);
            let target = self.token(onto);
            assert!(tok.is_inactive(), "can only merge an inactive token");
            assert!(target.is_active(), "merge target must be active");
            assert_eq!(tok.predicate, target.predicate, "merge requires one predicate");
            assert_eq!(tok.parameters.len(), target.parameters.len());
        }
        let pairs: Vec<(VarId, VarId)> = {
            let tok = self.token(id);
            let target = self.token(onto);
            let mut p = vec![
                (tok.start, target.start),
                (tok.end, target.end),
                (tok.duration, target.duration),
            ];
            p.extend(tok.parameters.iter().copied().zip(target.parameters.iter().copied()));
            p
        };
        for (a, b) in pairs {
            self.post_constraint(ConstraintKind::Eq, vec![a, b], ConstraintSource::Merge(id));
        }
        let tok = self.tokens[id.index()].as_mut().expect("stale token reference");
        tok.state = TokenState::Merged;
        tok.merged_onto = Some(onto);
        self.events.push(DbEvent::TokenMerged(id));
        debug!(token = id.index(), onto = onto.index(), "token merged");
    }

    /// Splits a merged token back to inactive.
    pub fn split(&mut self, id: TokId) {
        assert_eq!(self.token(id).state, TokenState::Merged);
        let bridges: Vec<ConstraintId> = self
            .constraint_ids()
            .into_iter()
            .filter(|&c| self.constraint(c).source == ConstraintSource::Merge(id))
            .collect();
        for c in bridges {
            self.remove_constraint(c);
        }
        let tok = self.tokens[id.index()].as_mut().expect("stale token reference");
        tok.state = TokenState::Inactive;
        tok.merged_onto = None;
        self.events.push(DbEvent::TokenSplit(id));
    }

    /// Rejects a non-mandatory inactive token.
    pub fn reject(&mut self, id: TokId) {
        let tok = self.tokens[id.index()].as_mut().expect("stale token reference");
        assert!(tok.is_inactive() && tok.can_be_rejected());
        tok.state = TokenState::Rejected;
        self.events.push(DbEvent::TokenRejected(id));
    }

    /// Reinstates a rejected token.
    pub fn reinstate(&mut self, id: TokId) {
        let tok = self.tokens[id.index()].as_mut().expect("stale token reference");
        assert_eq!(tok.state, TokenState::Rejected);
        tok.state = TokenState::Inactive;
        self.events.push(DbEvent::TokenReinstated(id));
    }

    /// Orders an active token onto a timeline at the chosen insertion
    /// point, posting adjacency precedences.
    pub fn order(&mut self, id: TokId, choice: &OrderingChoice) {
        {
            let tok = self.token(id);
            assert!(tok.is_active(), "can only order an active token");
            assert!(tok.inserted_on.is_none(), "token already ordered");
        }
        self.objects[choice.object.index()].insert(id, choice);
        self.tokens[id.index()].as_mut().unwrap().inserted_on = Some(choice.object);

        let (before, after) = self.objects[choice.object.index()].neighbors(id);
        if let Some(prev) = before {
            let scope = vec![self.token(prev).end, self.token(id).start];
            self.post_constraint(ConstraintKind::Precedes, scope, ConstraintSource::Ordering(id));
        }
        if let Some(next) = after {
            let scope = vec![self.token(id).end, self.token(next).start];
            self.post_constraint(ConstraintKind::Precedes, scope, ConstraintSource::Ordering(id));
        }
        trace!(token = id.index(), object = choice.object.index(), "token ordered");
    }

    /// Removes a token from its timeline and withdraws its adjacency
    /// precedences.
    pub fn unorder(&mut self, id: TokId) {
        let obj = self.token(id).inserted_on.expect("token not ordered");
        let links: Vec<ConstraintId> = self
            .constraint_ids()
            .into_iter()
            .filter(|&c| self.constraint(c).source == ConstraintSource::Ordering(id))
            .collect();
        for c in links {
            self.remove_constraint(c);
        }
        self.objects[obj.index()].remove(id);
        self.tokens[id.index()].as_mut().unwrap().inserted_on = None;
    }

    // ---- rule machinery -----------------------------------------------

    fn fire_instance(&mut self, inst_idx: usize) {
        let (rule_idx, master) = {
            let inst = &self.instances[inst_idx];
            (inst.rule, inst.token)
        };
        let relation = self.rules[rule_idx].relation;
        let subgoal = self.rules[rule_idx].subgoal.clone();

        let mut spec = TokenSpec::new(subgoal);
        spec.master = Some(master);
        let slave = self.create_token(spec);
        self.events.push(DbEvent::TokenAdded(slave));
        self.tokens[master.index()].as_mut().unwrap().slaves.push(slave);

        let (m_start, m_end) = {
            let m = self.token(master);
            (m.start, m.end)
        };
        let s_start = self.token(slave).start;
        let posted = match relation {
            SubgoalRelation::StartsWithMaster => {
                vec![self.post_constraint(
                    ConstraintKind::Eq,
                    vec![m_start, s_start],
                    ConstraintSource::Rule(master),
                )]
            }
            SubgoalRelation::MeetsMaster => {
                vec![self.post_constraint(
                    ConstraintKind::Eq,
                    vec![m_end, s_start],
                    ConstraintSource::Rule(master),
                )]
            }
            // Starts with the master yet may not begin until it ends;
            // unsatisfiable whenever the master has positive duration.
            SubgoalRelation::ConflictsWithMaster => vec![
                self.post_constraint(
                    ConstraintKind::Eq,
                    vec![m_start, s_start],
                    ConstraintSource::Rule(master),
                ),
                self.post_constraint(
                    ConstraintKind::Precedes,
                    vec![m_end, s_start],
                    ConstraintSource::Rule(master),
                ),
            ],
        };
        let inst = &mut self.instances[inst_idx];
        inst.fired = true;
        inst.slave = Some(slave);
        inst.posted = posted;
        debug!(master = master.index(), slave = slave.index(), "subgoal rule fired");
    }

    // ---- propagation --------------------------------------------------

    /// Propagates the constraint network to a fixpoint, firing any
    /// guarded rules whose guard became bound. Returns the resulting
    /// consistency; domain-change events are queued for the tracker.
    pub fn propagate(&mut self) -> bool {
        let entry: Vec<Option<Domain>> = self
            .variables
            .iter()
            .map(|v| v.as_ref().map(|v| v.domain.clone()))
            .collect();
        let ok = self.propagate_inner();
        self.emit_domain_events(&entry);
        self.consistent = ok;
        if !ok {
            debug!("propagation found an inconsistency");
        }
        ok
    }

    pub fn is_consistent(&self) -> bool {
        self.consistent
    }

    fn propagate_inner(&mut self) -> bool {
        loop {
            // Current domains are rebuilt from scratch each cycle so
            // that withdrawn specifications relax exactly.
            for slot in self.variables.iter_mut() {
                if let Some(var) = slot {
                    var.domain = var.base.clone();
                    if let Some(value) = var.specified.clone() {
                        if !var.domain.intersect(&Domain::singleton(value)) {
                            return false;
                        }
                    }
                }
            }
            if !self.fixpoint() {
                return false;
            }
            if !self.fire_ready_rules() {
                return true;
            }
        }
    }

    /// Fires pending guarded instances whose guard variable settled on
    /// the guard value. Returns true if anything fired.
    fn fire_ready_rules(&mut self) -> bool {
        let mut fired = false;
        for idx in 0..self.instances.len() {
            let inst = &self.instances[idx];
            if inst.fired {
                continue;
            }
            let (pidx, value) = self.rules[inst.rule]
                .guard
                .clone()
                .expect("unguarded instances fire at activation");
            let pvar = self.token(inst.token).parameters[pidx];
            let domain = &self.variable(pvar).domain;
            if domain.is_singleton() && domain.singleton_value() == Some(value) {
                self.fire_instance(idx);
                fired = true;
            }
        }
        fired
    }

    fn fixpoint(&mut self) -> bool {
        loop {
            let mut changed = false;
            for id in self.token_ids() {
                let tok = self.token(id);
                if tok.state == TokenState::Rejected {
                    continue;
                }
                match self.apply_temporal_triangle(id) {
                    Some(c) => changed |= c,
                    None => return false,
                }
            }
            for id in self.constraint_ids() {
                let c = self.constraint(id);
                if c.scope.iter().any(|&v| self.try_variable(v).is_none()) {
                    continue;
                }
                if c.scope.iter().any(|&v| self.variable_of_rejected_token(v)) {
                    continue;
                }
                let applied = match c.kind {
                    ConstraintKind::Eq => self.apply_eq(id),
                    ConstraintKind::Neq => self.apply_neq(id),
                    ConstraintKind::Precedes => self.apply_precedes(id),
                    ConstraintKind::Conflict => self.apply_conflict(id),
                    ConstraintKind::Guard => Some(false),
                };
                match applied {
                    Some(c) => changed |= c,
                    None => return false,
                }
            }
            if !changed {
                return true;
            }
        }
    }

    fn variable_of_rejected_token(&self, id: VarId) -> bool {
        match self.variable(id).parent {
            Some(tok) => self.token(tok).state == TokenState::Rejected,
            None => false,
        }
    }

    /// `start + duration = end`, band arithmetic on interval bounds.
    fn apply_temporal_triangle(&mut self, id: TokId) -> Option<bool> {
        let (sv, ev, dv) = {
            let tok = self.token(id);
            (tok.start, tok.end, tok.duration)
        };
        let mut s = self.variable(sv).domain.clone();
        let mut e = self.variable(ev).domain.clone();
        let mut d = self.variable(dv).domain.clone();

        let mut changed = false;
        changed |= e.set_lower_bound(clamp_add(s.lower_bound(), d.lower_bound()));
        changed |= e.set_upper_bound(clamp_add(s.upper_bound(), d.upper_bound()));
        changed |= s.set_lower_bound(clamp_sub(e.lower_bound(), d.upper_bound()));
        changed |= s.set_upper_bound(clamp_sub(e.upper_bound(), d.lower_bound()));
        changed |= d.set_lower_bound(clamp_sub(e.lower_bound(), s.upper_bound()));
        changed |= d.set_upper_bound(clamp_sub(e.upper_bound(), s.lower_bound()));

        if s.is_empty() || e.is_empty() || d.is_empty() {
            return None;
        }
        self.store_domain(sv, s);
        self.store_domain(ev, e);
        self.store_domain(dv, d);
        Some(changed)
    }

    fn apply_eq(&mut self, id: ConstraintId) -> Option<bool> {
        let (a, b) = self.binary_scope(id);
        let mut da = self.variable(a).domain.clone();
        let db = self.variable(b).domain.clone();
        let before = (da.clone(), db.clone());
        if !da.intersect(&db) {
            return None;
        }
        let mut dbn = db;
        if !dbn.intersect(&da) {
            return None;
        }
        let changed = before != (da.clone(), dbn.clone());
        self.store_domain(a, da);
        self.store_domain(b, dbn);
        Some(changed)
    }

    fn apply_neq(&mut self, id: ConstraintId) -> Option<bool> {
        let (a, b) = self.binary_scope(id);
        let da = self.variable(a).domain.clone();
        let db = self.variable(b).domain.clone();
        let mut changed = false;
        let mut da2 = da.clone();
        let mut db2 = db.clone();
        if let Some(v) = da.singleton_value() {
            changed |= db2.remove(&v);
        }
        if let Some(v) = db.singleton_value() {
            changed |= da2.remove(&v);
        }
        if da2.is_empty() || db2.is_empty() {
            return None;
        }
        self.store_domain(a, da2);
        self.store_domain(b, db2);
        Some(changed)
    }

    fn apply_precedes(&mut self, id: ConstraintId) -> Option<bool> {
        let (a, b) = self.binary_scope(id);
        let mut da = self.variable(a).domain.clone();
        let mut db = self.variable(b).domain.clone();
        // Precedence needs numeric bounds; a symbolic scope is left
        // untouched.
        let (alb, _) = match da.numeric_bounds() {
            Some(bounds) => bounds,
            None => return Some(false),
        };
        let (_, bub) = match db.numeric_bounds() {
            Some(bounds) => bounds,
            None => return Some(false),
        };
        let mut changed = false;
        changed |= db.set_lower_bound(alb);
        changed |= da.set_upper_bound(bub);
        if da.is_empty() || db.is_empty() {
            return None;
        }
        self.store_domain(a, da);
        self.store_domain(b, db);
        Some(changed)
    }

    fn apply_conflict(&mut self, id: ConstraintId) -> Option<bool> {
        let all_bound = self
            .constraint(id)
            .scope
            .iter()
            .all(|&v| self.variable(v).domain.is_singleton());
        if all_bound {
            None
        } else {
            Some(false)
        }
    }

    fn binary_scope(&self, id: ConstraintId) -> (VarId, VarId) {
        let scope = &self.constraint(id).scope;
        debug_assert_eq!(scope.len(), 2);
        (scope[0], scope[1])
    }

    fn store_domain(&mut self, id: VarId, domain: Domain) {
        self.variables[id.index()].as_mut().unwrap().domain = domain;
    }

    fn emit_domain_events(&mut self, entry: &[Option<Domain>]) {
        for id in self.variable_ids() {
            let old = match entry.get(id.index()).and_then(|d| d.as_ref()) {
                Some(d) => d,
                // Created during this propagation; its token event covers it.
                None => continue,
            };
            let new = &self.variable(id).domain;
            if new == old {
                continue;
            }
            let change = if new.is_empty() {
                DomainChange::Emptied
            } else if new.is_singleton() && !old.is_singleton() {
                DomainChange::RestrictToSingleton
            } else if old.is_singleton() && !new.is_singleton() {
                DomainChange::Relaxed
            } else if new.size() <= old.size() {
                DomainChange::Restricted
            } else {
                DomainChange::Relaxed
            };
            self.events.push(DbEvent::DomainChanged(id, change));
        }
    }

    // ---- search queries -----------------------------------------------

    /// Drains the queued change notifications.
    pub fn drain_events(&mut self) -> Vec<DbEvent> {
        std::mem::take(&mut self.events)
    }

    /// Active tokens this one could merge onto: same predicate and
    /// shape, pairwise-intersecting domains, closed parameters.
    pub fn compatible_tokens(&self, id: TokId) -> Vec<TokId> {
        let tok = self.token(id);
        self.token_ids()
            .into_iter()
            .filter(|&other| other != id)
            .filter(|&other| {
                let t = self.token(other);
                t.is_active()
                    && t.predicate == tok.predicate
                    && t.parameters.len() == tok.parameters.len()
                    && self.unifiable(tok, t)
            })
            .collect()
    }

    fn unifiable(&self, a: &Token, b: &Token) -> bool {
        let pairs = [(a.start, b.start), (a.end, b.end), (a.duration, b.duration)];
        for (x, y) in pairs {
            let mut d = self.variable(x).domain.clone();
            if !d.intersect(&self.variable(y).domain) {
                return false;
            }
        }
        for (&x, &y) in a.parameters.iter().zip(&b.parameters) {
            let dx = &self.variable(x).domain;
            let dy = &self.variable(y).domain;
            if dx.is_open() || dy.is_open() {
                return false;
            }
            let mut d = dx.clone();
            if !d.intersect(dy) {
                return false;
            }
        }
        true
    }

    pub fn has_compatible_tokens(&self, id: TokId) -> bool {
        !self.compatible_tokens(id).is_empty()
    }

    /// Active tokens not yet ordered onto a timeline.
    pub fn tokens_to_order(&self) -> Vec<TokId> {
        self.token_ids()
            .into_iter()
            .filter(|&t| {
                let tok = self.token(t);
                tok.is_active() && tok.inserted_on.is_none()
            })
            .collect()
    }

    /// Insertion points for an active token, objects in key order.
    pub fn ordering_choices(&self, id: TokId) -> Vec<OrderingChoice> {
        let tok = self.token(id);
        if tok.inserted_on.is_some() {
            return Vec::new();
        }
        let mut choices = Vec::new();
        for value in self.variable(tok.object_var).domain.values() {
            if let Value::Object(obj) = value {
                choices.extend(self.object(obj).ordering_choices(obj, id));
            }
        }
        choices
    }

    /// Whether the token has (or would have, once active) at least one
    /// insertion point.
    pub fn has_ordering_choice(&self, id: TokId) -> bool {
        let tok = self.token(id);
        if tok.is_active() {
            !self.ordering_choices(id).is_empty()
        } else {
            !self.variable(tok.object_var).domain.is_empty()
        }
    }

    /// Counts insertion points up to `limit`.
    pub fn count_ordering_choices(&self, id: TokId, limit: u32) -> u32 {
        (self.ordering_choices(id).len() as u32).min(limit)
    }

    pub fn earliest_start(&self, id: TokId) -> i64 {
        self.variable(self.token(id).start).domain.lower_bound()
    }

    pub fn latest_start(&self, id: TokId) -> i64 {
        self.variable(self.token(id).start).domain.upper_bound()
    }

    pub fn earliest_end(&self, id: TokId) -> i64 {
        self.variable(self.token(id).end).domain.lower_bound()
    }

    pub fn latest_end(&self, id: TokId) -> i64 {
        self.variable(self.token(id).end).domain.upper_bound()
    }
}

fn clamp_add(a: i64, b: i64) -> i64 {
    a.saturating_add(b).clamp(MINUS_INFINITY, PLUS_INFINITY)
}

fn clamp_sub(a: i64, b: i64) -> i64 {
    a.saturating_sub(b).clamp(MINUS_INFINITY, PLUS_INFINITY)
}
