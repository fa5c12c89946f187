//! # Augmented Transition Network
//!
//! The immutable grammar graph that prediction walks.
//!
//! ## Overview
//!
//! An [`Atn`] holds one sub-network per grammar rule. Each rule has a start
//! and a stop state; rule invocations are [`TransitionKind::Rule`] edges that
//! remember the follow state to return to. Every state where the parser must
//! choose among alternatives is a *decision* with a dense decision number and
//! its own [`Dfa`] cache.
//!
//! Networks are assembled with [`AtnBuilder`], which also runs the
//! post-processing passes prediction relies on (rule follow links, tail-call
//! detection and precedence-decision marking) and verifies the result.
//!
//! The structure is read-only after construction. The prediction caches it
//! owns (the decision DFAs, the LL(1) shortcut table and the context interner)
//! use interior locking and can be shared across threads.

mod builder;
mod interval_set;
mod lexer_action;
mod lookahead;
mod state;
mod transition;
mod verify;

pub use builder::{Alternative, AtnBuilder, Element};
pub use interval_set::{Interval, IntervalSet};
pub use lexer_action::LexerAction;
pub use state::{AtnState, BlockKind, StateId, StateKind};
pub use transition::{Transition, TransitionKind};

use crate::context::ContextInterner;
use crate::dfa::Dfa;
use ahash::RandomState;
use hashbrown::HashMap;
use std::sync::{PoisonError, RwLock};

/// Whether the network drives a lexer or a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum GrammarType {
    Lexer,
    Parser,
}

#[derive(Debug, Clone)]
pub(crate) struct RuleInfo {
    pub(crate) name: String,
    pub(crate) start: StateId,
    pub(crate) stop: StateId,
    pub(crate) token_type: Option<i32>,
}

/// The grammar network plus the prediction caches attached to it.
#[derive(Debug)]
pub struct Atn {
    grammar_type: GrammarType,
    max_token_type: i32,
    states: Vec<AtnState>,
    rules: Vec<RuleInfo>,
    decision_to_state: Vec<StateId>,
    lexer_actions: Vec<LexerAction>,
    dfas: Vec<Dfa>,
    ll1_table: RwLock<HashMap<(usize, i32), usize, RandomState>>,
    context_interner: ContextInterner,
}

impl Atn {
    pub(crate) fn from_parts(
        grammar_type: GrammarType,
        max_token_type: i32,
        states: Vec<AtnState>,
        rules: Vec<RuleInfo>,
        decision_to_state: Vec<StateId>,
        lexer_actions: Vec<LexerAction>,
    ) -> Self {
        let dfas = decision_to_state
            .iter()
            .enumerate()
            .map(|(decision, &start)| {
                let state = &states[start.index()];
                let precedence_dfa = matches!(
                    state.kind,
                    StateKind::StarLoopEntry { precedence_rule_decision: true, .. }
                );
                Dfa::new(decision, start, precedence_dfa)
            })
            .collect();
        Self {
            grammar_type,
            max_token_type,
            states,
            rules,
            decision_to_state,
            lexer_actions,
            dfas,
            ll1_table: RwLock::new(HashMap::with_hasher(RandomState::new())),
            context_interner: ContextInterner::new(),
        }
    }

    #[must_use]
    pub fn grammar_type(&self) -> GrammarType {
        self.grammar_type
    }

    /// Largest token type the grammar defines.
    #[must_use]
    pub fn max_token_type(&self) -> i32 {
        self.max_token_type
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this network.
    #[must_use]
    pub fn state(&self, id: StateId) -> &AtnState {
        &self.states[id.index()]
    }

    #[must_use]
    pub fn states(&self) -> &[AtnState] {
        &self.states
    }

    #[must_use]
    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn rule_name(&self, rule: usize) -> Option<&str> {
        self.rules.get(rule).map(|r| r.name.as_str())
    }

    #[must_use]
    pub fn rule_start(&self, rule: usize) -> StateId {
        self.rules[rule].start
    }

    #[must_use]
    pub fn rule_stop(&self, rule: usize) -> StateId {
        self.rules[rule].stop
    }

    /// Token type produced by a lexer rule.
    #[must_use]
    pub fn rule_token_type(&self, rule: usize) -> Option<i32> {
        self.rules.get(rule).and_then(|r| r.token_type)
    }

    #[must_use]
    pub fn num_decisions(&self) -> usize {
        self.decision_to_state.len()
    }

    #[must_use]
    pub fn decision_state(&self, decision: usize) -> &AtnState {
        self.state(self.decision_to_state[decision])
    }

    /// The prediction cache for `decision`.
    #[must_use]
    pub fn dfa(&self, decision: usize) -> &Dfa {
        &self.dfas[decision]
    }

    #[must_use]
    pub fn dfas(&self) -> &[Dfa] {
        &self.dfas
    }

    #[must_use]
    pub fn lexer_actions(&self) -> &[LexerAction] {
        &self.lexer_actions
    }

    /// Decision of the block that directly follows the rule's start state.
    #[must_use]
    pub fn rule_decision(&self, rule: usize) -> Option<usize> {
        let start = self.state(self.rules.get(rule)?.start);
        let first = start.transitions.first()?;
        self.state(first.target).decision
    }

    /// Decisions whose state belongs to `rule`, in decision order.
    pub fn decisions_in_rule(&self, rule: usize) -> impl Iterator<Item = usize> + '_ {
        self.decision_to_state
            .iter()
            .enumerate()
            .filter(move |(_, s)| self.state(**s).rule_index == rule)
            .map(|(d, _)| d)
    }

    /// First state in `caller` whose outgoing rule transition invokes `callee`.
    ///
    /// Useful for building the invoking-state chain of a [`RuleContext`](crate::RuleContext).
    #[must_use]
    pub fn find_invocation(&self, caller: usize, callee: usize) -> Option<StateId> {
        self.states
            .iter()
            .filter(|s| s.rule_index == caller)
            .find(|s| {
                s.transitions.iter().any(
                    |t| matches!(t.kind, TransitionKind::Rule { rule_index, .. } if rule_index == callee),
                )
            })
            .map(|s| s.id)
    }

    /// Follow state of the rule invocation leaving `invoking_state`.
    #[must_use]
    pub fn invocation_follow_state(&self, invoking_state: StateId) -> Option<StateId> {
        match &self.states.get(invoking_state.index())?.transitions.first()?.kind {
            TransitionKind::Rule { follow_state, .. } => Some(*follow_state),
            _ => None,
        }
    }

    /// Whether the invocation leaving `invoking_state` is a tail call.
    #[must_use]
    pub fn is_tail_call(&self, invoking_state: StateId) -> bool {
        self.states
            .get(invoking_state.index())
            .and_then(|s| s.transitions.first())
            .is_some_and(|t| matches!(t.kind, TransitionKind::Rule { tail_call: true, .. }))
    }

    /// Drop every cached prediction: all decision DFAs, the LL(1) table and
    /// the interned contexts. Safe to call between parses; predictions made
    /// afterwards are recomputed and agree with the earlier ones.
    pub fn clear_dfa(&self) {
        for dfa in &self.dfas {
            dfa.clear();
        }
        self.ll1_table.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.context_interner.clear();
    }

    pub(crate) fn ll1_prediction(&self, decision: usize, symbol: i32) -> Option<usize> {
        self.ll1_table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(decision, symbol))
            .copied()
    }

    pub(crate) fn record_ll1_prediction(&self, decision: usize, symbol: i32, alt: usize) {
        self.ll1_table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((decision, symbol), alt);
    }

    /// Number of entries in the LL(1) shortcut table.
    #[must_use]
    pub fn ll1_table_len(&self) -> usize {
        self.ll1_table.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub(crate) fn context_interner(&self) -> &ContextInterner {
        &self.context_interner
    }
}
