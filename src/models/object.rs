//! Plan objects (timelines).
//!
//! A timeline requires a total order over the tokens placed on it. The
//! ordering decision for a token enumerates every insertion point in
//! the current sequence as a (predecessor, successor) pair.

use super::token::TokId;

/// Arena index of a plan object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ObjId(pub(crate) u32);

impl ObjId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One way to place a token onto a timeline.
///
/// Either `predecessor` or `successor` is the token being placed; on an
/// empty timeline both are (the self-pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderingChoice {
    pub object: ObjId,
    pub predecessor: TokId,
    pub successor: TokId,
}

/// A timeline: a named object with a totally ordered token sequence.
#[derive(Debug, Clone)]
pub struct PlanObject {
    /// Global allocation key.
    pub key: u32,
    pub name: String,
    /// Tokens ordered onto this timeline, in temporal order.
    pub sequence: Vec<TokId>,
}

impl PlanObject {
    pub(crate) fn new(key: u32, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            sequence: Vec::new(),
        }
    }

    /// Enumerates the insertion points for `token`.
    ///
    /// A sequence of n tokens yields n + 1 choices: before the first
    /// token, or directly after each existing token. The empty sequence
    /// yields the self-pair.
    pub fn ordering_choices(&self, id: ObjId, token: TokId) -> Vec<OrderingChoice> {
        debug_assert!(!self.sequence.contains(&token), "token already ordered");
        if self.sequence.is_empty() {
            return vec![OrderingChoice {
                object: id,
                predecessor: token,
                successor: token,
            }];
        }
        let mut choices = Vec::with_capacity(self.sequence.len() + 1);
        choices.push(OrderingChoice {
            object: id,
            predecessor: token,
            successor: self.sequence[0],
        });
        for &existing in &self.sequence {
            choices.push(OrderingChoice {
                object: id,
                predecessor: existing,
                successor: token,
            });
        }
        choices
    }

    /// Inserts `token` according to `choice`.
    pub(crate) fn insert(&mut self, token: TokId, choice: &OrderingChoice) {
        if choice.predecessor == token && choice.successor == token {
            debug_assert!(self.sequence.is_empty());
            self.sequence.push(token);
        } else if choice.predecessor == token {
            let pos = self.position_of(choice.successor);
            self.sequence.insert(pos, token);
        } else {
            let pos = self.position_of(choice.predecessor);
            self.sequence.insert(pos + 1, token);
        }
    }

    pub(crate) fn remove(&mut self, token: TokId) {
        self.sequence.retain(|&t| t != token);
    }

    /// Neighbors of `token` in the sequence.
    pub(crate) fn neighbors(&self, token: TokId) -> (Option<TokId>, Option<TokId>) {
        let pos = self.position_of(token);
        let before = pos.checked_sub(1).map(|p| self.sequence[p]);
        let after = self.sequence.get(pos + 1).copied();
        (before, after)
    }

    fn position_of(&self, token: TokId) -> usize {
        self.sequence
            .iter()
            .position(|&t| t == token)
            .expect("token not on timeline")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(n: u32) -> TokId {
        TokId(n)
    }

    #[test]
    fn test_ordering_choices_empty_timeline() {
        let t = PlanObject::new(0, "t1");
        let choices = t.ordering_choices(ObjId(0), tok(5));
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].predecessor, tok(5));
        assert_eq!(choices[0].successor, tok(5));
    }

    #[test]
    fn test_ordering_choices_enumerate_insertions() {
        let mut t = PlanObject::new(0, "t1");
        t.sequence = vec![tok(1), tok(2)];
        let choices = t.ordering_choices(ObjId(0), tok(9));
        assert_eq!(choices.len(), 3);
        // Before the head, after each existing token.
        assert_eq!((choices[0].predecessor, choices[0].successor), (tok(9), tok(1)));
        assert_eq!((choices[1].predecessor, choices[1].successor), (tok(1), tok(9)));
        assert_eq!((choices[2].predecessor, choices[2].successor), (tok(2), tok(9)));
    }

    #[test]
    fn test_insert_and_remove_round_trip() {
        let mut t = PlanObject::new(0, "t1");
        t.sequence = vec![tok(1), tok(2)];
        let choices = t.ordering_choices(ObjId(0), tok(9));
        t.insert(tok(9), &choices[1]);
        assert_eq!(t.sequence, vec![tok(1), tok(9), tok(2)]);
        assert_eq!(t.neighbors(tok(9)), (Some(tok(1)), Some(tok(2))));
        t.remove(tok(9));
        assert_eq!(t.sequence, vec![tok(1), tok(2)]);
    }
}
