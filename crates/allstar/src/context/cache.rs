//! Memoization of context operations.
//!
//! [`PredictionContextCache`] lives for one prediction and remembers the
//! results of `join` and `get_child` by operand identity, so the same merge
//! is never computed twice while a configuration set is being built.
//! [`ContextInterner`] lives as long as the network and canonicalizes the
//! contexts stored in DFA states, so equal stacks share one allocation.

use super::{PredictionContext, StateId};
use hashbrown::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An `Arc` compared and hashed by address.
#[derive(Clone)]
struct ByAddress(Arc<PredictionContext>);

impl PartialEq for ByAddress {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ByAddress {}

impl Hash for ByAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state);
    }
}

/// Per-prediction memo of context operations.
pub struct PredictionContextCache {
    enabled: bool,
    contexts: HashSet<Arc<PredictionContext>>,
    child_contexts: HashMap<(ByAddress, StateId), Arc<PredictionContext>>,
    join_contexts: HashMap<(ByAddress, ByAddress), Arc<PredictionContext>>,
}

impl PredictionContextCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    /// A cache that memoizes nothing.
    #[must_use]
    pub fn uncached() -> Self {
        Self::with_enabled(false)
    }

    fn with_enabled(enabled: bool) -> Self {
        Self {
            enabled,
            contexts: HashSet::new(),
            child_contexts: HashMap::new(),
            join_contexts: HashMap::new(),
        }
    }

    /// Canonical instance of `context` within this cache.
    pub fn get_as_cached(&mut self, context: Arc<PredictionContext>) -> Arc<PredictionContext> {
        if !self.enabled {
            return context;
        }
        Arc::clone(self.contexts.get_or_insert(context))
    }

    pub fn get_child(&mut self, context: &Arc<PredictionContext>, return_state: StateId) -> Arc<PredictionContext> {
        if !self.enabled {
            return context.get_child(return_state);
        }
        let key = (ByAddress(Arc::clone(context)), return_state);
        if let Some(child) = self.child_contexts.get(&key) {
            return Arc::clone(child);
        }
        let child = context.get_child(return_state);
        let child = self.get_as_cached(child);
        self.child_contexts.insert(key, Arc::clone(&child));
        child
    }

    /// Memoized [`PredictionContext::join`]; the operand order does not
    /// affect the key.
    pub fn join(&mut self, x: &Arc<PredictionContext>, y: &Arc<PredictionContext>) -> Arc<PredictionContext> {
        if !self.enabled {
            return PredictionContext::join(x, y, self);
        }
        let (a, b) = if Arc::as_ptr(x) <= Arc::as_ptr(y) { (x, y) } else { (y, x) };
        let key = (ByAddress(Arc::clone(a)), ByAddress(Arc::clone(b)));
        if let Some(joined) = self.join_contexts.get(&key) {
            return Arc::clone(joined);
        }
        let joined = PredictionContext::join(x, y, self);
        let joined = self.get_as_cached(joined);
        self.join_contexts.insert(key, Arc::clone(&joined));
        joined
    }

    /// Number of memoized joins.
    #[must_use]
    pub fn join_count(&self) -> usize {
        self.join_contexts.len()
    }
}

impl Default for PredictionContextCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Network-wide canonical store of contexts referenced by DFA states.
#[derive(Debug, Default)]
pub struct ContextInterner {
    contexts: Mutex<HashSet<Arc<PredictionContext>>>,
}

impl ContextInterner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the store for a batch of [`InternSession::intern`] calls.
    pub fn session(&self) -> InternSession<'_> {
        InternSession {
            contexts: self.contexts.lock().unwrap_or_else(PoisonError::into_inner),
            visited: HashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Exclusive access to a [`ContextInterner`], with a memo of contexts already
/// canonicalized during this session.
pub struct InternSession<'a> {
    contexts: MutexGuard<'a, HashSet<Arc<PredictionContext>>>,
    visited: HashMap<*const PredictionContext, Arc<PredictionContext>>,
}

impl InternSession<'_> {
    /// Canonical instance of `context`, with every parent canonicalized too.
    pub fn intern(&mut self, context: &Arc<PredictionContext>) -> Arc<PredictionContext> {
        if context.is_empty() {
            return Arc::clone(context);
        }
        if let Some(done) = self.visited.get(&Arc::as_ptr(context)) {
            return Arc::clone(done);
        }
        if let Some(existing) = self.contexts.get(context) {
            let existing = Arc::clone(existing);
            self.visited.insert(Arc::as_ptr(context), Arc::clone(&existing));
            return existing;
        }

        let size = context.size();
        let parents: Vec<Arc<PredictionContext>> = (0..size).map(|i| self.intern(context.parent(i))).collect();
        let changed = parents.iter().enumerate().any(|(i, p)| !Arc::ptr_eq(p, context.parent(i)));
        let canonical = if changed {
            let entries = parents
                .into_iter()
                .enumerate()
                .map(|(i, parent)| (context.return_state(i), parent))
                .collect();
            PredictionContext::from_entries(entries)
        } else {
            Arc::clone(context)
        };
        let canonical = Arc::clone(self.contexts.get_or_insert(canonical));
        self.visited.insert(Arc::as_ptr(context), Arc::clone(&canonical));
        canonical
    }
}
