use crate::INVALID_ALT;
use crate::atn::StateId;
use crate::config::AtnConfigSet;
use crate::semantic::SemanticContext;
use ahash::RandomState;
use hashbrown::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Index of a state inside one [`Dfa`](super::Dfa).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DfaStateId(pub(crate) u32);

impl DfaStateId {
    /// Edge target meaning "no alternative can match this symbol".
    pub const ERROR: Self = Self(u32::MAX);

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::ERROR
    }
}

impl fmt::Display for DfaStateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() { write!(f, "ERROR") } else { write!(f, "s{}", self.0) }
    }
}

/// An alternative guarded by a predicate, evaluated when an accept state is
/// reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PredPrediction {
    pub pred: Arc<SemanticContext>,
    pub alt: usize,
}

impl fmt::Display for PredPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.pred, self.alt)
    }
}

/// One node of a decision cache.
///
/// A state is identified by its configuration set. Symbol edges lead to
/// the state reached after matching that symbol. Context-sensitive states
/// also carry context edges keyed by the return state of the next caller
/// frame; the symbols that must consult them first are recorded in
/// `context_symbols`.
#[derive(Debug, Clone)]
pub struct DfaState {
    configs: Arc<AtnConfigSet>,
    pub(crate) edges: HashMap<i32, DfaStateId, RandomState>,
    pub(crate) context_edges: HashMap<StateId, DfaStateId, RandomState>,
    pub(crate) context_symbols: Option<HashSet<i32, RandomState>>,
    pub(crate) is_accept_state: bool,
    pub(crate) prediction: usize,
    pub(crate) predicates: Option<Arc<[PredPrediction]>>,
}

impl DfaState {
    #[must_use]
    pub fn new(configs: Arc<AtnConfigSet>) -> Self {
        Self {
            configs,
            edges: HashMap::with_hasher(RandomState::new()),
            context_edges: HashMap::with_hasher(RandomState::new()),
            context_symbols: None,
            is_accept_state: false,
            prediction: INVALID_ALT,
            predicates: None,
        }
    }

    #[must_use]
    pub fn configs(&self) -> &Arc<AtnConfigSet> {
        &self.configs
    }

    #[must_use]
    pub fn is_accept_state(&self) -> bool {
        self.is_accept_state
    }

    /// The predicted alternative, or [`INVALID_ALT`] when the state is not
    /// an accept state or its predicates must be evaluated first.
    #[must_use]
    pub fn prediction(&self) -> usize {
        self.prediction
    }

    #[must_use]
    pub fn predicates(&self) -> Option<&Arc<[PredPrediction]>> {
        self.predicates.as_ref()
    }

    pub(crate) fn set_accept(&mut self, prediction: usize) {
        self.is_accept_state = true;
        self.prediction = prediction;
    }

    #[must_use]
    pub fn target(&self, symbol: i32) -> Option<DfaStateId> {
        self.edges.get(&symbol).copied()
    }

    #[must_use]
    pub fn edges(&self) -> &HashMap<i32, DfaStateId, RandomState> {
        &self.edges
    }

    #[must_use]
    pub fn is_context_sensitive(&self) -> bool {
        self.context_symbols.is_some()
    }

    #[must_use]
    pub fn is_context_symbol(&self, symbol: i32) -> bool {
        self.context_symbols.as_ref().is_some_and(|symbols| symbols.contains(&symbol))
    }

    #[must_use]
    pub fn context_target(&self, return_state: StateId) -> Option<DfaStateId> {
        self.context_edges.get(&return_state).copied()
    }

    pub(crate) fn set_context_sensitive(&mut self) {
        if self.context_symbols.is_none() {
            self.context_symbols = Some(HashSet::with_hasher(RandomState::new()));
        }
    }

    pub(crate) fn set_context_symbol(&mut self, symbol: i32) {
        self.set_context_sensitive();
        if let Some(symbols) = &mut self.context_symbols {
            symbols.insert(symbol);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_not_accepting() {
        let state = DfaState::new(Arc::new(AtnConfigSet::new()));
        assert!(!state.is_accept_state());
        assert_eq!(state.prediction(), INVALID_ALT);
        assert!(!state.is_context_sensitive());
    }

    #[test]
    fn test_context_symbols() {
        let mut state = DfaState::new(Arc::new(AtnConfigSet::new()));
        state.set_context_symbol(4);
        assert!(state.is_context_sensitive());
        assert!(state.is_context_symbol(4));
        assert!(!state.is_context_symbol(5));
    }

    #[test]
    fn test_error_id_display() {
        assert_eq!(DfaStateId::ERROR.to_string(), "ERROR");
        assert_eq!(DfaStateId(3).to_string(), "s3");
    }
}
