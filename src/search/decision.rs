//! Decision points.
//!
//! A decision point binds one flaw to an ordered list of choices and a
//! cursor. Assigning applies the choice under the cursor and advances
//! it; retracting withdraws the applied choice exactly, leaving the
//! cursor on the next untried alternative.

use crate::models::{Entity, OrderingChoice, PlanDatabase, TokId, Value, VarId};

/// One way to resolve an inactive token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenChoice {
    Activate,
    MergeWith(TokId),
    Reject,
}

/// Borrowed view of the choice a decision point would try next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChoiceView<'a> {
    Value(&'a Value),
    Token(TokenChoice),
    Ordering(OrderingChoice),
}

/// An open decision bound to its enumerated choices.
#[derive(Debug, Clone)]
pub enum DecisionPoint {
    /// Bind a variable to one of its values.
    Variable {
        var: VarId,
        choices: Vec<Value>,
        cursor: usize,
        applied: Option<Value>,
    },
    /// Resolve an inactive token.
    Token {
        token: TokId,
        choices: Vec<TokenChoice>,
        cursor: usize,
        applied: Option<TokenChoice>,
    },
    /// Place an active token onto a timeline.
    Ordering {
        token: TokId,
        choices: Vec<OrderingChoice>,
        cursor: usize,
        applied: Option<OrderingChoice>,
    },
}

impl DecisionPoint {
    pub fn variable(var: VarId, choices: Vec<Value>) -> Self {
        DecisionPoint::Variable {
            var,
            choices,
            cursor: 0,
            applied: None,
        }
    }

    pub fn token(token: TokId, choices: Vec<TokenChoice>) -> Self {
        DecisionPoint::Token {
            token,
            choices,
            cursor: 0,
            applied: None,
        }
    }

    pub fn ordering(token: TokId, choices: Vec<OrderingChoice>) -> Self {
        DecisionPoint::Ordering {
            token,
            choices,
            cursor: 0,
            applied: None,
        }
    }

    pub fn entity(&self) -> Entity {
        match self {
            DecisionPoint::Variable { var, .. } => Entity::Variable(*var),
            DecisionPoint::Token { token, .. } => Entity::Token(*token),
            DecisionPoint::Ordering { token, .. } => Entity::Token(*token),
        }
    }

    /// True while untried choices remain under the cursor.
    pub fn has_remaining_choices(&self) -> bool {
        match self {
            DecisionPoint::Variable { choices, cursor, .. } => *cursor < choices.len(),
            DecisionPoint::Token { choices, cursor, .. } => *cursor < choices.len(),
            DecisionPoint::Ordering { choices, cursor, .. } => *cursor < choices.len(),
        }
    }

    /// The choice under the cursor, if any remains.
    pub fn current_choice(&self) -> Option<ChoiceView<'_>> {
        match self {
            DecisionPoint::Variable { choices, cursor, .. } => {
                choices.get(*cursor).map(ChoiceView::Value)
            }
            DecisionPoint::Token { choices, cursor, .. } => {
                choices.get(*cursor).copied().map(ChoiceView::Token)
            }
            DecisionPoint::Ordering { choices, cursor, .. } => {
                choices.get(*cursor).copied().map(ChoiceView::Ordering)
            }
        }
    }

    /// True while a choice is applied to the database.
    pub fn is_applied(&self) -> bool {
        match self {
            DecisionPoint::Variable { applied, .. } => applied.is_some(),
            DecisionPoint::Token { applied, .. } => applied.is_some(),
            DecisionPoint::Ordering { applied, .. } => applied.is_some(),
        }
    }

    /// Applies the choice under the cursor and advances it.
    pub fn assign(&mut self, db: &mut PlanDatabase) {
        assert!(self.has_remaining_choices(), "no choice left to assign");
        assert!(!self.is_applied(), "retract before reassigning");
        match self {
            DecisionPoint::Variable {
                var,
                choices,
                cursor,
                applied,
            } => {
                let value = choices[*cursor].clone();
                db.specify(*var, value.clone());
                *applied = Some(value);
                *cursor += 1;
            }
            DecisionPoint::Token {
                token,
                choices,
                cursor,
                applied,
            } => {
                let choice = choices[*cursor];
                match choice {
                    TokenChoice::Activate => db.activate(*token),
                    TokenChoice::MergeWith(onto) => db.merge(*token, onto),
                    TokenChoice::Reject => db.reject(*token),
                }
                *applied = Some(choice);
                *cursor += 1;
            }
            DecisionPoint::Ordering {
                token,
                choices,
                cursor,
                applied,
            } => {
                let choice = choices[*cursor];
                db.order(*token, &choice);
                *applied = Some(choice);
                *cursor += 1;
            }
        }
    }

    /// Withdraws the applied choice.
    pub fn retract(&mut self, db: &mut PlanDatabase) {
        assert!(self.is_applied(), "nothing applied to retract");
        match self {
            DecisionPoint::Variable { var, applied, .. } => {
                db.reset_specified(*var);
                *applied = None;
            }
            DecisionPoint::Token { token, applied, .. } => {
                match applied.take().unwrap() {
                    TokenChoice::Activate => db.deactivate(*token),
                    TokenChoice::MergeWith(_) => db.split(*token),
                    TokenChoice::Reject => db.reinstate(*token),
                }
            }
            DecisionPoint::Ordering { token, applied, .. } => {
                db.unorder(*token);
                *applied = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Domain, TokenSpec, TokenState};

    #[test]
    fn test_variable_decision_walks_its_choices() {
        let mut db = PlanDatabase::new();
        let v = db.new_global_variable(
            "v",
            Domain::enumerated(vec![Value::Int(1), Value::Int(2)]),
        );
        db.propagate();

        let mut dp = DecisionPoint::variable(v, vec![Value::Int(1), Value::Int(2)]);
        dp.assign(&mut db);
        assert!(db.variable(v).is_specified());

        dp.retract(&mut db);
        assert!(!db.variable(v).is_specified());
        assert!(dp.has_remaining_choices());

        dp.assign(&mut db);
        dp.retract(&mut db);
        assert!(!dp.has_remaining_choices());
    }

    #[test]
    fn test_token_decision_round_trips_each_choice() {
        let mut db = PlanDatabase::new();
        let a = db.new_token(TokenSpec::new("P1"));
        let b = db.new_token(TokenSpec::new("P1").rejectable());
        db.activate(a);
        db.propagate();

        let mut dp = DecisionPoint::token(
            b,
            vec![
                TokenChoice::Activate,
                TokenChoice::MergeWith(a),
                TokenChoice::Reject,
            ],
        );
        dp.assign(&mut db);
        assert!(db.token(b).is_active());
        dp.retract(&mut db);
        assert!(db.token(b).is_inactive());

        dp.assign(&mut db);
        assert_eq!(db.token(b).state, TokenState::Merged);
        dp.retract(&mut db);

        dp.assign(&mut db);
        assert_eq!(db.token(b).state, TokenState::Rejected);
        dp.retract(&mut db);
        assert!(db.token(b).is_inactive());
        assert!(!dp.has_remaining_choices());
    }

    #[test]
    fn test_ordering_decision_is_exactly_undone() {
        let mut db = PlanDatabase::new();
        db.add_object("t1");
        let a = db.new_token(TokenSpec::new("P1"));
        db.activate(a);
        db.propagate();

        let choices = db.ordering_choices(a);
        let mut dp = DecisionPoint::ordering(a, choices);
        dp.assign(&mut db);
        assert!(db.token(a).inserted_on.is_some());
        dp.retract(&mut db);
        assert!(db.token(a).inserted_on.is_none());
    }
}
