//! Value domains for constrained variables.
//!
//! A domain is either a (possibly unbounded) integer interval or an
//! enumerated value set that may still be open (membership not yet
//! finalized). The search layer only asks capability questions —
//! finite? singleton? open? — and enumerates values when branching.
//!
//! # Reference
//! Frank & Jónsson (2003), "Constraint-Based Attribute and Interval Planning"

use serde::{Deserialize, Serialize};

use super::object::ObjId;

/// Largest magnitude a temporal bound may take. Horizon bounds and
/// interval domains are clamped to `[-MAX_FINITE_TIME, MAX_FINITE_TIME]`.
pub const MAX_FINITE_TIME: i64 = 268_435_455;

/// Sentinel for an unbounded interval end. Anything at or beyond this
/// magnitude is treated as infinite.
pub const PLUS_INFINITY: i64 = i64::MAX / 4;

/// Negative counterpart of [`PLUS_INFINITY`].
pub const MINUS_INFINITY: i64 = -PLUS_INFINITY;

/// A single domain value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    /// Integer (also used for time points and durations).
    Int(i64),
    /// Symbolic label.
    Symbol(String),
    /// Reference to a plan object (timeline).
    Object(ObjId),
}

impl Value {
    /// Convenience constructor for symbolic values.
    pub fn symbol(s: impl Into<String>) -> Self {
        Value::Symbol(s.into())
    }
}

/// How a variable's current domain changed during a propagation cycle.
///
/// The open-decision tracker keys its incremental updates off these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainChange {
    /// Domain shrank but holds more than one value.
    Restricted,
    /// Propagation narrowed the domain to a single value.
    RestrictToSingleton,
    /// The variable was directly specified to a single value.
    SetToSingleton,
    /// Domain grew back (a specification or constraint was withdrawn).
    Relaxed,
    /// A specification was reset.
    Reset,
    /// An open enumeration was closed.
    Closed,
    /// Domain became empty (inconsistency).
    Emptied,
}

/// A variable's value domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Domain {
    /// Integer interval `[lb, ub]`; empty when `lb > ub`.
    Interval { lb: i64, ub: i64 },
    /// Explicit value set. While `closed` is false the membership is
    /// still dynamic and the domain cannot be branched on.
    Enumerated { values: Vec<Value>, closed: bool },
}

impl Domain {
    /// An interval domain, bounds clamped to the representable range.
    pub fn interval(lb: i64, ub: i64) -> Self {
        Domain::Interval {
            lb: lb.max(MINUS_INFINITY),
            ub: ub.min(PLUS_INFINITY),
        }
    }

    /// The unbounded interval.
    pub fn unbounded() -> Self {
        Domain::Interval {
            lb: MINUS_INFINITY,
            ub: PLUS_INFINITY,
        }
    }

    /// A closed enumerated domain.
    pub fn enumerated(values: Vec<Value>) -> Self {
        Domain::Enumerated {
            values,
            closed: true,
        }
    }

    /// An open enumerated domain (membership not finalized).
    pub fn open_enumerated(values: Vec<Value>) -> Self {
        Domain::Enumerated {
            values,
            closed: false,
        }
    }

    /// A domain holding exactly one value.
    pub fn singleton(value: Value) -> Self {
        match value {
            Value::Int(v) => Domain::Interval { lb: v, ub: v },
            other => Domain::Enumerated {
                values: vec![other],
                closed: true,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Domain::Interval { lb, ub } => lb > ub,
            Domain::Enumerated { values, .. } => values.is_empty(),
        }
    }

    /// True when the domain holds exactly one value and is closed.
    pub fn is_singleton(&self) -> bool {
        match self {
            Domain::Interval { lb, ub } => lb == ub,
            Domain::Enumerated { values, closed } => *closed && values.len() == 1,
        }
    }

    /// True when the domain can be exhaustively enumerated.
    pub fn is_finite(&self) -> bool {
        match self {
            Domain::Interval { lb, ub } => *lb > MINUS_INFINITY && *ub < PLUS_INFINITY,
            Domain::Enumerated { .. } => true,
        }
    }

    /// True for unclosed enumerations and unbounded intervals; open
    /// domains are not branchable until they settle.
    pub fn is_open(&self) -> bool {
        match self {
            Domain::Interval { .. } => !self.is_finite(),
            Domain::Enumerated { closed, .. } => !closed,
        }
    }

    /// Number of values; `usize::MAX` for non-finite domains.
    pub fn size(&self) -> usize {
        match self {
            Domain::Interval { lb, ub } => {
                if self.is_empty() {
                    0
                } else if !self.is_finite() {
                    usize::MAX
                } else {
                    (ub - lb + 1) as usize
                }
            }
            Domain::Enumerated { values, .. } => values.len(),
        }
    }

    /// The single value of a singleton domain.
    pub fn singleton_value(&self) -> Option<Value> {
        if !self.is_singleton() {
            return None;
        }
        match self {
            Domain::Interval { lb, .. } => Some(Value::Int(*lb)),
            Domain::Enumerated { values, .. } => values.first().cloned(),
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        match (self, value) {
            (Domain::Interval { lb, ub }, Value::Int(v)) => lb <= v && v <= ub,
            (Domain::Enumerated { values, .. }, v) => values.contains(v),
            _ => false,
        }
    }

    /// Lower bound of an interval or integer-enumerated domain.
    pub fn lower_bound(&self) -> i64 {
        self.numeric_bounds()
            .expect("lower_bound on a non-numeric domain")
            .0
    }

    /// Upper bound of an interval or integer-enumerated domain.
    pub fn upper_bound(&self) -> i64 {
        self.numeric_bounds()
            .expect("upper_bound on a non-numeric domain")
            .1
    }

    /// `(min, max)` when every value is an integer; None for symbolic
    /// or empty enumerations.
    pub fn numeric_bounds(&self) -> Option<(i64, i64)> {
        match self {
            Domain::Interval { lb, ub } => Some((*lb, *ub)),
            Domain::Enumerated { values, .. } => {
                let mut bounds: Option<(i64, i64)> = None;
                for v in values {
                    match v {
                        Value::Int(i) => {
                            let (lo, hi) = bounds.get_or_insert((*i, *i));
                            *lo = (*lo).min(*i);
                            *hi = (*hi).max(*i);
                        }
                        _ => return None,
                    }
                }
                bounds
            }
        }
    }

    /// All values in order. Must be finite.
    pub fn values(&self) -> Vec<Value> {
        debug_assert!(self.is_finite(), "cannot enumerate a non-finite domain");
        match self {
            Domain::Interval { lb, ub } => (*lb..=*ub).map(Value::Int).collect(),
            Domain::Enumerated { values, .. } => values.clone(),
        }
    }

    /// Intersects `self` with `other` in place. Returns false when the
    /// result is empty.
    pub fn intersect(&mut self, other: &Domain) -> bool {
        if let (Domain::Interval { lb, ub }, Domain::Enumerated { values, closed }) =
            (&*self, other)
        {
            // Keep the enumerated values inside the interval; the
            // result is an enumeration.
            let (lo, hi) = (*lb, *ub);
            let kept: Vec<Value> = values
                .iter()
                .filter(|v| matches!(v, Value::Int(i) if lo <= *i && *i <= hi))
                .cloned()
                .collect();
            *self = Domain::Enumerated {
                values: kept,
                closed: *closed,
            };
            return !self.is_empty();
        }
        match (&mut *self, other) {
            (Domain::Interval { lb, ub }, Domain::Interval { lb: olb, ub: oub }) => {
                *lb = (*lb).max(*olb);
                *ub = (*ub).min(*oub);
            }
            (Domain::Enumerated { values, closed }, Domain::Enumerated { values: ov, closed: oc }) => {
                values.retain(|v| ov.contains(v));
                *closed = *closed || *oc;
            }
            (Domain::Enumerated { values, .. }, Domain::Interval { .. }) => {
                values.retain(|v| other.contains(v));
            }
            (Domain::Interval { .. }, Domain::Enumerated { .. }) => unreachable!(),
        }
        !self.is_empty()
    }

    /// Raises the lower bound; drops enumerated integers below it.
    /// Returns true on change.
    pub fn set_lower_bound(&mut self, bound: i64) -> bool {
        match self {
            Domain::Interval { lb, .. } if *lb < bound => {
                *lb = bound;
                true
            }
            Domain::Enumerated { values, .. } => {
                let before = values.len();
                values.retain(|v| !matches!(v, Value::Int(i) if *i < bound));
                values.len() != before
            }
            _ => false,
        }
    }

    /// Lowers the upper bound; drops enumerated integers above it.
    /// Returns true on change.
    pub fn set_upper_bound(&mut self, bound: i64) -> bool {
        match self {
            Domain::Interval { ub, .. } if *ub > bound => {
                *ub = bound;
                true
            }
            Domain::Enumerated { values, .. } => {
                let before = values.len();
                values.retain(|v| !matches!(v, Value::Int(i) if *i > bound));
                values.len() != before
            }
            _ => false,
        }
    }

    /// Removes one value from an enumerated domain. Returns true on change.
    pub fn remove(&mut self, value: &Value) -> bool {
        match self {
            Domain::Enumerated { values, .. } => {
                let before = values.len();
                values.retain(|v| v != value);
                values.len() != before
            }
            Domain::Interval { lb, ub } => match value {
                Value::Int(v) if v == lb && lb == ub => {
                    *lb = *ub + 1;
                    true
                }
                Value::Int(v) if v == lb => {
                    *lb += 1;
                    true
                }
                Value::Int(v) if v == ub => {
                    *ub -= 1;
                    true
                }
                _ => false,
            },
        }
    }

    /// Closes an open enumeration. Returns true on change.
    pub fn close(&mut self) -> bool {
        match self {
            Domain::Enumerated { closed, .. } if !*closed => {
                *closed = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_capabilities() {
        let d = Domain::interval(1, 20);
        assert!(d.is_finite());
        assert!(!d.is_open());
        assert!(!d.is_singleton());
        assert_eq!(d.size(), 20);

        let u = Domain::unbounded();
        assert!(!u.is_finite());
        assert!(u.is_open());
        assert_eq!(u.size(), usize::MAX);
    }

    #[test]
    fn test_enumerated_open_vs_closed() {
        let open = Domain::open_enumerated(vec![Value::symbol("L1")]);
        assert!(open.is_open());
        assert!(!open.is_singleton());

        let closed = Domain::enumerated(vec![Value::symbol("L1")]);
        assert!(!closed.is_open());
        assert!(closed.is_singleton());
        assert_eq!(closed.singleton_value(), Some(Value::symbol("L1")));
    }

    #[test]
    fn test_intersect_intervals() {
        let mut a = Domain::interval(0, 10);
        assert!(a.intersect(&Domain::interval(5, 20)));
        assert_eq!(a, Domain::interval(5, 10));

        let mut b = Domain::interval(0, 4);
        assert!(!b.intersect(&Domain::interval(5, 20)));
        assert!(b.is_empty());
    }

    #[test]
    fn test_intersect_enumerated_with_interval() {
        let mut d = Domain::enumerated(vec![Value::Int(1), Value::Int(7), Value::Int(30)]);
        assert!(d.intersect(&Domain::interval(0, 10)));
        assert_eq!(d.values(), vec![Value::Int(1), Value::Int(7)]);
    }

    #[test]
    fn test_intersect_interval_with_enumeration() {
        let mut d = Domain::interval(0, 10);
        assert!(d.intersect(&Domain::enumerated(vec![Value::Int(5), Value::Int(20)])));
        assert_eq!(d, Domain::enumerated(vec![Value::Int(5)]));

        let mut d = Domain::interval(0, 10);
        assert!(!d.intersect(&Domain::enumerated(vec![Value::symbol("s")])));
        assert!(d.is_empty());
    }

    #[test]
    fn test_bounds_on_integer_enumerations() {
        let mut d = Domain::enumerated(vec![Value::Int(3), Value::Int(8), Value::Int(12)]);
        assert_eq!(d.numeric_bounds(), Some((3, 12)));
        assert_eq!(d.lower_bound(), 3);
        assert_eq!(d.upper_bound(), 12);
        assert!(d.set_lower_bound(4));
        assert!(d.set_upper_bound(8));
        assert_eq!(d, Domain::enumerated(vec![Value::Int(8)]));

        let s = Domain::enumerated(vec![Value::symbol("s")]);
        assert_eq!(s.numeric_bounds(), None);
    }

    #[test]
    fn test_remove_and_bounds() {
        let mut d = Domain::interval(1, 3);
        assert!(d.remove(&Value::Int(1)));
        assert_eq!(d.lower_bound(), 2);
        assert!(d.set_upper_bound(2));
        assert!(d.is_singleton());
    }

    #[test]
    fn test_values_enumeration() {
        let d = Domain::interval(2, 4);
        assert_eq!(
            d.values(),
            vec![Value::Int(2), Value::Int(3), Value::Int(4)]
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let d = Domain::enumerated(vec![Value::symbol("A"), Value::Int(3)]);
        let json = serde_json::to_string(&d).unwrap();
        let back: Domain = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
