//! # Decision Cache
//!
//! One [`Dfa`] per decision memoizes every configuration set prediction has
//! computed for it, with edges labelled by input symbol.
//!
//! ## Overview
//!
//! States are owned by the cache and addressed by [`DfaStateId`]. A state
//! is identified by its configuration set: [`Dfa::install`] is a single
//! get-or-create, so two threads computing the same set end up sharing one
//! state. Edge writes keep the first target recorded for a symbol; since
//! installation is canonical, every writer computes that same target.
//!
//! Each cache guards its whole state table with one `RwLock`. Lookups take
//! the read lock; installation and edge writes take the write lock only
//! for the duration of the insert.
//!
//! A precedence decision (the loop decision of a left-recursive rule) keeps
//! one start state per parser precedence level instead of a single `s0`.

mod state;

pub use state::{DfaState, DfaStateId, PredPrediction};

use crate::atn::StateId;
use crate::config::AtnConfigSet;
use ahash::RandomState;
use hashbrown::HashMap;
use std::fmt::Write;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct DfaStore {
    states: Vec<DfaState>,
    index: HashMap<Arc<AtnConfigSet>, DfaStateId, RandomState>,
    s0: Option<DfaStateId>,
    s0_full: Option<DfaStateId>,
    precedence_s0: HashMap<i32, DfaStateId, RandomState>,
    precedence_s0_full: HashMap<i32, DfaStateId, RandomState>,
}

/// The prediction cache of one decision.
#[derive(Debug)]
pub struct Dfa {
    decision: usize,
    atn_start_state: StateId,
    precedence_dfa: bool,
    store: RwLock<DfaStore>,
}

impl Dfa {
    #[must_use]
    pub fn new(decision: usize, atn_start_state: StateId, precedence_dfa: bool) -> Self {
        Self {
            decision,
            atn_start_state,
            precedence_dfa,
            store: RwLock::new(DfaStore::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, DfaStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DfaStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn decision(&self) -> usize {
        self.decision
    }

    /// The decision state this cache predicts for.
    #[must_use]
    pub fn atn_start_state(&self) -> StateId {
        self.atn_start_state
    }

    #[must_use]
    pub fn is_precedence_dfa(&self) -> bool {
        self.precedence_dfa
    }

    /// True until the first start state has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let store = self.read();
        if self.precedence_dfa {
            store.precedence_s0.is_empty() && store.precedence_s0_full.is_empty()
        } else {
            store.s0.is_none() && store.s0_full.is_none()
        }
    }

    /// True once a full-context start state has been cached.
    #[must_use]
    pub fn is_context_sensitive(&self) -> bool {
        let store = self.read();
        if self.precedence_dfa {
            !store.precedence_s0_full.is_empty()
        } else {
            store.s0_full.is_some()
        }
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.read().states.len()
    }

    /// The start state for local (`full == false`) or full-context prediction.
    #[must_use]
    pub fn start_state(&self, full: bool) -> Option<DfaStateId> {
        let store = self.read();
        if full { store.s0_full } else { store.s0 }
    }

    /// Record a start state unless another thread already did; returns the
    /// one that is in effect.
    pub fn set_start_state_if_absent(&self, full: bool, state: DfaStateId) -> DfaStateId {
        let mut store = self.write();
        let slot = if full { &mut store.s0_full } else { &mut store.s0 };
        *slot.get_or_insert(state)
    }

    #[must_use]
    pub fn precedence_start_state(&self, precedence: i32, full: bool) -> Option<DfaStateId> {
        debug_assert!(self.precedence_dfa, "only precedence decisions have precedence start states");
        let store = self.read();
        let starts = if full { &store.precedence_s0_full } else { &store.precedence_s0 };
        starts.get(&precedence).copied()
    }

    /// Record the start state for `precedence` unless one is already
    /// recorded; returns the one that is in effect.
    pub fn set_precedence_start_state(&self, precedence: i32, full: bool, state: DfaStateId) -> DfaStateId {
        debug_assert!(self.precedence_dfa, "only precedence decisions have precedence start states");
        let mut store = self.write();
        let starts = if full { &mut store.precedence_s0_full } else { &mut store.precedence_s0 };
        *starts.entry(precedence).or_insert(state)
    }

    /// The state already holding `configs`, if any.
    #[must_use]
    pub fn find(&self, configs: &AtnConfigSet) -> Option<DfaStateId> {
        self.read().index.get(configs).copied()
    }

    /// Install `state`, or return the existing state with an equal
    /// configuration set.
    pub fn install(&self, state: DfaState) -> DfaStateId {
        let mut store = self.write();
        if let Some(&existing) = store.index.get(state.configs()) {
            return existing;
        }
        let id = DfaStateId(store.states.len() as u32);
        store.index.insert(Arc::clone(state.configs()), id);
        store.states.push(state);
        tracing::trace!(decision = self.decision, state = %id, "installed dfa state");
        id
    }

    /// Run `f` against a state of this cache.
    pub fn read_state<R>(&self, id: DfaStateId, f: impl FnOnce(&DfaState) -> R) -> Option<R> {
        self.read().states.get(id.index()).map(f)
    }

    pub(crate) fn with_state<R>(&self, id: DfaStateId, f: impl FnOnce(&DfaState) -> R) -> R {
        f(&self.read().states[id.index()])
    }

    fn with_state_mut<R>(&self, id: DfaStateId, f: impl FnOnce(&mut DfaState) -> R) -> R {
        f(&mut self.write().states[id.index()])
    }

    #[must_use]
    pub fn target(&self, from: DfaStateId, symbol: i32) -> Option<DfaStateId> {
        self.with_state(from, |s| s.target(symbol))
    }

    /// Record the edge `from --symbol--> to`. An edge that already exists is
    /// kept; the target in effect is returned.
    pub fn set_target(&self, from: DfaStateId, symbol: i32, to: DfaStateId) -> DfaStateId {
        self.with_state_mut(from, |s| *s.edges.entry(symbol).or_insert(to))
    }

    #[must_use]
    pub fn context_target(&self, from: DfaStateId, return_state: StateId) -> Option<DfaStateId> {
        self.with_state(from, |s| s.context_target(return_state))
    }

    pub fn set_context_target(&self, from: DfaStateId, return_state: StateId, to: DfaStateId) -> DfaStateId {
        self.with_state_mut(from, |s| {
            s.set_context_sensitive();
            *s.context_edges.entry(return_state).or_insert(to)
        })
    }

    pub(crate) fn set_context_sensitive(&self, id: DfaStateId) {
        self.with_state_mut(id, DfaState::set_context_sensitive);
    }

    pub(crate) fn set_context_symbol(&self, id: DfaStateId, symbol: i32) {
        self.with_state_mut(id, |s| s.set_context_symbol(symbol));
    }

    /// Drop every state and start state.
    pub fn clear(&self) {
        *self.write() = DfaStore::default();
    }

    /// A line per edge, in the form `s0-1->:s1=>2`.
    ///
    /// Accepting targets are prefixed with `:` and followed by their
    /// prediction (or their predicates); context edges print as
    /// `s0-ctx:12->s3`. Error edges are omitted.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        let store = self.read();
        let describe = |id: DfaStateId| {
            let state = &store.states[id.index()];
            let mut text = String::new();
            if state.is_accept_state() {
                text.push(':');
            }
            let _ = write!(text, "{id}");
            if state.is_context_sensitive() {
                text.push('^');
            }
            if state.is_accept_state() {
                match state.predicates() {
                    Some(predicates) => {
                        let parts: Vec<String> = predicates.iter().map(ToString::to_string).collect();
                        let _ = write!(text, "=>[{}]", parts.join(", "));
                    }
                    None => {
                        let _ = write!(text, "=>{}", state.prediction());
                    }
                }
            }
            text
        };

        let mut out = String::new();
        for (index, state) in store.states.iter().enumerate() {
            let from = DfaStateId(index as u32);
            let mut edges: Vec<_> = state.edges.iter().filter(|(_, to)| !to.is_error()).collect();
            edges.sort_by_key(|(symbol, _)| **symbol);
            for (symbol, &to) in edges {
                let label = if *symbol == crate::EOF { "EOF".to_string() } else { symbol.to_string() };
                let _ = writeln!(out, "{}-{}->{}", describe(from), label, describe(to));
            }
            let mut context_edges: Vec<_> = state.context_edges.iter().collect();
            context_edges.sort_by_key(|(return_state, _)| **return_state);
            for (return_state, &to) in context_edges {
                let _ = writeln!(out, "{}-ctx:{}->{}", describe(from), return_state.0, describe(to));
            }
        }
        out
    }
}
