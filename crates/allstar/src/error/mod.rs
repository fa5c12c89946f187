//! # Error Types
//!
//! Errors raised while building a network and while predicting.
//!
//! ## Overview
//!
//! - [`AtnError`]: the builder or the verifier rejected a network. These are
//!   programming errors in the grammar or the generator that produced it.
//! - [`PredictionError`]: no alternative of a decision can match the input.
//!   The parser normally turns this into a syntax error and recovers.
//!
//! ## Diagnostics Support
//!
//! When the `diagnostics` feature is enabled, both enums derive
//! [`miette::Diagnostic`] with stable error codes.

use crate::atn::{IntervalSet, StateId};
use crate::config::AtnConfigSet;
use crate::semantic::SemanticContext;
use std::sync::Arc;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Failure of [`ParserAtnSimulator::adaptive_predict`](crate::ParserAtnSimulator::adaptive_predict).
///
/// The token stream is restored to the decision's start position before the
/// error is returned.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum PredictionError {
    #[error(
        "no viable alternative for decision {decision} at input index {offending_index} (symbol {offending_symbol})"
    )]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(allstar::no_viable_alt),
            help("expected one of {expected}")
        )
    )]
    NoViableAlt {
        decision: usize,
        /// Index of the first token the decision looked at.
        start_index: usize,
        /// Index of the token where every alternative had failed.
        offending_index: usize,
        offending_symbol: i32,
        /// Symbols that could start an alternative of the decision.
        expected: IntervalSet,
        /// Configurations alive just before the offending token.
        dead_end_configs: Arc<AtnConfigSet>,
    },

    #[error("every alternative of decision {decision} was rejected by a semantic predicate")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(allstar::failed_predicate)))]
    FailedPredicate {
        decision: usize,
        start_index: usize,
        /// The predicates that were evaluated, all of which failed.
        predicates: Vec<Arc<SemanticContext>>,
    },
}

impl PredictionError {
    #[must_use]
    pub fn decision(&self) -> usize {
        match self {
            Self::NoViableAlt { decision, .. } | Self::FailedPredicate { decision, .. } => *decision,
        }
    }

    #[must_use]
    pub fn start_index(&self) -> usize {
        match self {
            Self::NoViableAlt { start_index, .. } | Self::FailedPredicate { start_index, .. } => {
                *start_index
            }
        }
    }
}

/// A network that cannot be used for prediction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum AtnError {
    #[error("state {state} does not exist")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(allstar::atn::unknown_state)))]
    UnknownState { state: StateId },

    #[error("rule {rule} does not exist")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(allstar::atn::unknown_rule)))]
    UnknownRule { rule: usize },

    #[error("rule `{name}` already has a body")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(allstar::atn::duplicate_rule_body)))]
    DuplicateRuleBody { name: String },

    #[error("rule `{name}` has no body")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(allstar::atn::empty_rule)))]
    EmptyRule { name: String },

    #[error("state {state} cannot be a decision: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(allstar::atn::invalid_decision)))]
    InvalidDecision { state: StateId, reason: &'static str },

    #[error("decision {decision} does not exist")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(allstar::atn::unknown_decision)))]
    UnknownDecision { decision: usize },

    #[error("lexer action {index} does not exist")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(allstar::atn::unknown_action)))]
    UnknownLexerAction { index: usize },

    #[error("malformed network at state {state}: {reason}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(code(allstar::atn::malformed), help("the network violates a structural invariant"))
    )]
    Malformed { state: StateId, reason: &'static str },

    #[error("rule `{name}` is left-recursive without consuming input")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(allstar::atn::left_recursion),
            help("rewrite the rule as a precedence rule or factor out the recursion")
        )
    )]
    LeftRecursion { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_viable_alt_display() {
        let error = PredictionError::NoViableAlt {
            decision: 3,
            start_index: 4,
            offending_index: 6,
            offending_symbol: crate::EOF,
            expected: IntervalSet::of(1),
            dead_end_configs: Arc::new(AtnConfigSet::new()),
        };

        let error_str = format!("{error}");
        assert!(error_str.contains("decision 3"));
        assert!(error_str.contains("input index 6"));
        assert_eq!(error.decision(), 3);
        assert_eq!(error.start_index(), 4);
    }

    #[test]
    fn test_failed_predicate_display() {
        let error = PredictionError::FailedPredicate {
            decision: 1,
            start_index: 0,
            predicates: vec![SemanticContext::predicate(0, 2, false)],
        };

        assert!(format!("{error}").contains("rejected by a semantic predicate"));
        assert_eq!(error.start_index(), 0);
    }

    #[test]
    fn test_atn_error_display() {
        let error = AtnError::LeftRecursion { name: "expr".to_string() };
        assert_eq!(format!("{error}"), "rule `expr` is left-recursive without consuming input");

        let error = AtnError::Malformed { state: StateId(7), reason: "loop entry without loop back" };
        assert_eq!(format!("{error}"), "malformed network at state 7: loop entry without loop back");
    }
}
