//! The planning horizon.

use serde::{Deserialize, Serialize};

use crate::models::MAX_FINITE_TIME;

/// The time window the search plans within. Entities falling outside
/// it are filtered from the decision agenda by the horizon condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horizon {
    start: i64,
    end: i64,
}

impl Horizon {
    /// Bounds are clamped to the representable time range.
    pub fn new(start: i64, end: i64) -> Self {
        assert!(start <= end, "horizon start must not exceed its end");
        Self {
            start: start.max(-MAX_FINITE_TIME),
            end: end.min(MAX_FINITE_TIME),
        }
    }

    /// Moves the window. Takes effect at the next decision query.
    pub fn set(&mut self, start: i64, end: i64) {
        *self = Self::new(start, end);
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn contains(&self, t: i64) -> bool {
        self.start <= t && t <= self.end
    }
}

impl Default for Horizon {
    fn default() -> Self {
        Self {
            start: 0,
            end: MAX_FINITE_TIME,
        }
    }
}
