//! Edges between ATN states.

use super::interval_set::IntervalSet;
use super::state::StateId;
use std::fmt;

/// A labelled edge to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub target: StateId,
    pub kind: TransitionKind,
}

/// What an edge matches, or what happens when it is crossed without input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionKind {
    /// Crossed without consuming input. Follow links out of a rule-stop
    /// state remember the precedence rule they return from when the
    /// invocation was at precedence 0.
    Epsilon { outermost_precedence_return: Option<usize> },
    Atom(i32),
    Range { start: i32, stop: i32 },
    Set(IntervalSet),
    NotSet(IntervalSet),
    Wildcard,
    /// Invocation of `rule_index`; `target` is its start state.
    Rule {
        rule_index: usize,
        precedence: i32,
        follow_state: StateId,
        /// Only epsilon paths lead from `follow_state` to the invoking rule's end.
        tail_call: bool,
    },
    Predicate {
        rule_index: usize,
        pred_index: usize,
        is_ctx_dependent: bool,
    },
    Precedence { precedence: i32 },
    Action {
        rule_index: usize,
        action_index: Option<usize>,
        is_ctx_dependent: bool,
    },
}

impl Transition {
    #[must_use]
    pub fn new(target: StateId, kind: TransitionKind) -> Self {
        Self { target, kind }
    }

    #[must_use]
    pub fn epsilon(target: StateId) -> Self {
        Self::new(target, TransitionKind::Epsilon { outermost_precedence_return: None })
    }

    #[must_use]
    pub fn atom(target: StateId, symbol: i32) -> Self {
        Self::new(target, TransitionKind::Atom(symbol))
    }

    /// Epsilon-class transitions are crossed during closure.
    #[must_use]
    pub fn is_epsilon(&self) -> bool {
        matches!(
            self.kind,
            TransitionKind::Epsilon { .. }
                | TransitionKind::Rule { .. }
                | TransitionKind::Predicate { .. }
                | TransitionKind::Precedence { .. }
                | TransitionKind::Action { .. }
        )
    }

    /// Whether this edge consumes `symbol`, given the vocabulary bounds used
    /// by wildcard and negated sets.
    #[must_use]
    pub fn matches(&self, symbol: i32, min_vocabulary: i32, max_vocabulary: i32) -> bool {
        match &self.kind {
            TransitionKind::Atom(label) => *label == symbol,
            TransitionKind::Range { start, stop } => *start <= symbol && symbol <= *stop,
            TransitionKind::Set(set) => set.contains(symbol),
            TransitionKind::NotSet(set) => {
                symbol >= min_vocabulary && symbol <= max_vocabulary && !set.contains(symbol)
            }
            TransitionKind::Wildcard => symbol >= min_vocabulary && symbol <= max_vocabulary,
            _ => false,
        }
    }

    /// The symbols matched by a consuming edge, if it has an explicit label.
    #[must_use]
    pub fn label(&self) -> Option<IntervalSet> {
        match &self.kind {
            TransitionKind::Atom(symbol) => Some(IntervalSet::of(*symbol)),
            TransitionKind::Range { start, stop } => Some(IntervalSet::range(*start, *stop)),
            TransitionKind::Set(set) | TransitionKind::NotSet(set) => Some(set.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TransitionKind::Epsilon { .. } => write!(f, "ε")?,
            TransitionKind::Atom(symbol) => write!(f, "{symbol}")?,
            TransitionKind::Range { start, stop } => write!(f, "{start}..{stop}")?,
            TransitionKind::Set(set) => write!(f, "{set}")?,
            TransitionKind::NotSet(set) => write!(f, "~{set}")?,
            TransitionKind::Wildcard => write!(f, ".")?,
            TransitionKind::Rule { rule_index, precedence, .. } => {
                write!(f, "rule {rule_index}[{precedence}]")?;
            }
            TransitionKind::Predicate { rule_index, pred_index, .. } => {
                write!(f, "pred {rule_index}:{pred_index}")?;
            }
            TransitionKind::Precedence { precedence } => write!(f, "{precedence} >= _p")?,
            TransitionKind::Action { rule_index, action_index, .. } => match action_index {
                Some(index) => write!(f, "action {rule_index}:{index}")?,
                None => write!(f, "action {rule_index}")?,
            },
        }
        write!(f, " -> {}", self.target)
    }
}
