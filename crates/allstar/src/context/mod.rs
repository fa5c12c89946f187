//! # Prediction Contexts
//!
//! Persistent graphs of return states standing in for the parser's call
//! stack during prediction.
//!
//! ## Overview
//!
//! A [`PredictionContext`] is an immutable node shared through `Arc`:
//!
//! - **Empty**: the bottom of a stack. The *local* empty context means "the
//!   caller is unknown, any caller is possible" and is used during SLL
//!   prediction. The *full* empty context means "the stack ends here" and is
//!   used once the real caller stack has been consulted.
//! - **Singleton**: one return state on top of a parent context.
//! - **Array**: two or more `(return state, parent)` pairs sorted by return
//!   state. The full-empty path, when present, is stored as the last entry
//!   under [`EMPTY_FULL_STATE_KEY`].
//!
//! Contexts merge with [`PredictionContext::join`], which shares as much
//! structure as possible with its inputs. Hash codes are computed once at
//! construction and equality is structural.

mod cache;
mod rule_context;

pub use cache::{ContextInterner, PredictionContextCache};
pub use rule_context::RuleContext;
pub(crate) use rule_context::ROOT as ROOT_RULE_CONTEXT;

use crate::atn::{Atn, StateId};
use ahash::AHasher;
use hashbrown::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

/// Return-state key of the full-empty path inside an array context.
pub const EMPTY_FULL_STATE_KEY: StateId = StateId(u32::MAX);

static EMPTY_LOCAL: LazyLock<Arc<PredictionContext>> =
    LazyLock::new(|| Arc::new(PredictionContext::Empty { full: false }));
static EMPTY_FULL: LazyLock<Arc<PredictionContext>> =
    LazyLock::new(|| Arc::new(PredictionContext::Empty { full: true }));

/// A node in a persistent graph of return states.
pub enum PredictionContext {
    Empty {
        full: bool,
    },
    Singleton {
        parent: Arc<PredictionContext>,
        return_state: StateId,
        hash: u64,
    },
    Array {
        parents: Box<[Arc<PredictionContext>]>,
        return_states: Box<[StateId]>,
        hash: u64,
    },
}

impl PredictionContext {
    /// The shared local-empty context.
    #[must_use]
    pub fn empty_local() -> Arc<Self> {
        Arc::clone(&EMPTY_LOCAL)
    }

    /// The shared full-empty context.
    #[must_use]
    pub fn empty_full() -> Arc<Self> {
        Arc::clone(&EMPTY_FULL)
    }

    #[must_use]
    pub fn singleton(parent: Arc<Self>, return_state: StateId) -> Arc<Self> {
        let hash = hash_entries(std::iter::once((&parent, return_state)), 1);
        Arc::new(Self::Singleton { parent, return_state, hash })
    }

    /// Build a context from `(return state, parent)` pairs sorted by return
    /// state. One pair yields a singleton.
    ///
    /// # Panics
    ///
    /// Panics if `entries` is empty.
    #[must_use]
    pub fn from_entries(mut entries: Vec<(StateId, Arc<Self>)>) -> Arc<Self> {
        assert!(!entries.is_empty(), "a context needs at least one entry");
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0), "return states must be sorted");
        if entries.len() == 1
            && let Some((return_state, parent)) = entries.pop()
        {
            return Self::singleton(parent, return_state);
        }
        let hash = hash_entries(entries.iter().map(|(rs, p)| (p, *rs)), entries.len());
        let (return_states, parents): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
        Arc::new(Self::Array {
            parents: parents.into_boxed_slice(),
            return_states: return_states.into_boxed_slice(),
            hash,
        })
    }

    /// Number of `(return state, parent)` entries; 0 for empty contexts.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Empty { .. } => 0,
            Self::Singleton { .. } => 1,
            Self::Array { return_states, .. } => return_states.len(),
        }
    }

    /// # Panics
    ///
    /// Panics if `index >= self.size()`.
    #[must_use]
    pub fn parent(&self, index: usize) -> &Arc<Self> {
        match self {
            Self::Singleton { parent, .. } if index == 0 => parent,
            Self::Array { parents, .. } => &parents[index],
            _ => panic!("context entry {index} out of range"),
        }
    }

    /// # Panics
    ///
    /// Panics if `index >= self.size()`.
    #[must_use]
    pub fn return_state(&self, index: usize) -> StateId {
        match self {
            Self::Singleton { return_state, .. } if index == 0 => *return_state,
            Self::Array { return_states, .. } => return_states[index],
            _ => panic!("context entry {index} out of range"),
        }
    }

    /// Index of the entry with `return_state`, if any.
    #[must_use]
    pub fn find_return_state(&self, return_state: StateId) -> Option<usize> {
        match self {
            Self::Empty { .. } => None,
            Self::Singleton { return_state: rs, .. } => (*rs == return_state).then_some(0),
            Self::Array { return_states, .. } => return_states.binary_search(&return_state).ok(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    #[must_use]
    pub fn is_empty_local(&self) -> bool {
        matches!(self, Self::Empty { full: false })
    }

    #[must_use]
    pub fn is_empty_full(&self) -> bool {
        matches!(self, Self::Empty { full: true })
    }

    /// Whether one of the paths through this context ends the stack.
    #[must_use]
    pub fn has_empty(&self) -> bool {
        match self {
            Self::Empty { .. } => true,
            Self::Singleton { .. } => false,
            Self::Array { return_states, .. } => return_states.last() == Some(&EMPTY_FULL_STATE_KEY),
        }
    }

    #[must_use]
    pub fn cached_hash(&self) -> u64 {
        match self {
            Self::Empty { full: false } => 1,
            Self::Empty { full: true } => 2,
            Self::Singleton { hash, .. } | Self::Array { hash, .. } => *hash,
        }
    }

    /// Push `return_state` on top of this context.
    #[must_use]
    pub fn get_child(self: &Arc<Self>, return_state: StateId) -> Arc<Self> {
        Self::singleton(Arc::clone(self), return_state)
    }

    /// Add the full-empty path to this context.
    #[must_use]
    pub fn add_empty_context(self: &Arc<Self>) -> Arc<Self> {
        if self.has_empty() {
            return Arc::clone(self);
        }
        let mut entries = self.entries();
        entries.push((EMPTY_FULL_STATE_KEY, Self::empty_full()));
        Self::from_entries(entries)
    }

    /// Remove the full-empty path from this context.
    #[must_use]
    pub fn remove_empty_context(self: &Arc<Self>) -> Arc<Self> {
        if !self.has_empty() || self.is_empty() {
            return Arc::clone(self);
        }
        let mut entries = self.entries();
        entries.pop();
        Self::from_entries(entries)
    }

    fn entries(&self) -> Vec<(StateId, Arc<Self>)> {
        (0..self.size()).map(|i| (self.return_state(i), Arc::clone(self.parent(i)))).collect()
    }

    /// Replace every path end of this context by a single caller frame
    /// `return_state` followed by the full-empty context.
    #[must_use]
    pub fn append_context(self: &Arc<Self>, return_state: StateId, cache: &mut PredictionContextCache) -> Arc<Self> {
        let suffix = Self::empty_full().get_child(return_state);
        self.append_context_suffix(&suffix, cache)
    }

    /// Replace every path end of this context by `suffix`.
    #[must_use]
    pub fn append_context_suffix(self: &Arc<Self>, suffix: &Arc<Self>, cache: &mut PredictionContextCache) -> Arc<Self> {
        let mut visited = HashMap::new();
        append(self, suffix, cache, &mut visited)
    }

    /// Merge two contexts into one accepting the paths of both.
    ///
    /// The result shares structure with its inputs; when one input already
    /// accepts every path of the other, that input is returned unchanged.
    /// Joining an empty context with a non-empty one keeps the non-empty
    /// paths and adds the empty path. Two empty contexts join to the local
    /// one if either is local.
    #[must_use]
    pub fn join(left: &Arc<Self>, right: &Arc<Self>, cache: &mut PredictionContextCache) -> Arc<Self> {
        if Arc::ptr_eq(left, right) {
            return Arc::clone(left);
        }
        match (left.is_empty(), right.is_empty()) {
            (true, true) => {
                return if left.is_empty_local() { Arc::clone(left) } else { Arc::clone(right) };
            }
            (true, false) => return right.add_empty_context(),
            (false, true) => return left.add_empty_context(),
            (false, false) => {}
        }

        let (left_size, right_size) = (left.size(), right.size());
        if left_size == 1 && right_size == 1 && left.return_state(0) == right.return_state(0) {
            let merged = cache.join(left.parent(0), right.parent(0));
            if Arc::ptr_eq(&merged, left.parent(0)) {
                return Arc::clone(left);
            }
            if Arc::ptr_eq(&merged, right.parent(0)) {
                return Arc::clone(right);
            }
            return merged.get_child(left.return_state(0));
        }

        let mut entries = Vec::with_capacity(left_size + right_size);
        let (mut i, mut j) = (0, 0);
        let mut can_return_left = true;
        let mut can_return_right = true;
        while i < left_size && j < right_size {
            let (left_state, right_state) = (left.return_state(i), right.return_state(j));
            if left_state == right_state {
                let parent = cache.join(left.parent(i), right.parent(j));
                can_return_left &= Arc::ptr_eq(&parent, left.parent(i));
                can_return_right &= Arc::ptr_eq(&parent, right.parent(j));
                entries.push((left_state, parent));
                i += 1;
                j += 1;
            } else if left_state < right_state {
                entries.push((left_state, Arc::clone(left.parent(i))));
                can_return_right = false;
                i += 1;
            } else {
                entries.push((right_state, Arc::clone(right.parent(j))));
                can_return_left = false;
                j += 1;
            }
        }
        if i < left_size {
            can_return_right = false;
            entries.extend((i..left_size).map(|k| (left.return_state(k), Arc::clone(left.parent(k)))));
        }
        if j < right_size {
            can_return_left = false;
            entries.extend((j..right_size).map(|k| (right.return_state(k), Arc::clone(right.parent(k)))));
        }

        if can_return_left {
            Arc::clone(left)
        } else if can_return_right {
            Arc::clone(right)
        } else {
            Self::from_entries(entries)
        }
    }

    /// Translate a parser's rule-invocation chain into a context.
    #[must_use]
    pub fn from_rule_context(atn: &Atn, outer: &RuleContext, full_context: bool) -> Arc<Self> {
        let empty = if full_context { Self::empty_full() } else { Self::empty_local() };
        let Some(invoking_state) = outer.invoking_state() else {
            return empty;
        };
        let parent = match outer.parent() {
            Some(parent) => Self::from_rule_context(atn, parent, full_context),
            None => empty,
        };
        match atn.invocation_follow_state(invoking_state) {
            Some(follow) => parent.get_child(follow),
            None => {
                debug_assert!(false, "invoking state {invoking_state} has no rule transition");
                parent
            }
        }
    }
}

fn hash_entries<'a>(entries: impl Iterator<Item = (&'a Arc<PredictionContext>, StateId)>, len: usize) -> u64 {
    let mut hasher = AHasher::default();
    hasher.write_usize(len);
    for (parent, return_state) in entries {
        hasher.write_u64(parent.cached_hash());
        hasher.write_u32(return_state.0);
    }
    hasher.finish()
}

fn append(
    context: &Arc<PredictionContext>,
    suffix: &Arc<PredictionContext>,
    cache: &mut PredictionContextCache,
    visited: &mut HashMap<*const PredictionContext, Arc<PredictionContext>>,
) -> Arc<PredictionContext> {
    if suffix.is_empty() {
        if suffix.is_empty_local() && context.has_empty() {
            return PredictionContext::empty_local();
        }
        return Arc::clone(context);
    }
    if let Some(done) = visited.get(&Arc::as_ptr(context)) {
        return Arc::clone(done);
    }

    let result = if context.is_empty() {
        Arc::clone(suffix)
    } else {
        let keep = if context.has_empty() { context.size() - 1 } else { context.size() };
        let entries = (0..keep)
            .map(|i| (context.return_state(i), append(context.parent(i), suffix, cache, visited)))
            .collect();
        let appended = PredictionContext::from_entries(entries);
        if context.has_empty() { PredictionContext::join(&appended, suffix, cache) } else { appended }
    };
    visited.insert(Arc::as_ptr(context), Arc::clone(&result));
    result
}

impl PartialEq for PredictionContext {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.cached_hash() != other.cached_hash() {
            return false;
        }
        match (self, other) {
            (Self::Empty { full: a }, Self::Empty { full: b }) => a == b,
            (
                Self::Singleton { parent: p1, return_state: r1, .. },
                Self::Singleton { parent: p2, return_state: r2, .. },
            ) => r1 == r2 && p1 == p2,
            (
                Self::Array { parents: p1, return_states: r1, .. },
                Self::Array { parents: p2, return_states: r2, .. },
            ) => r1 == r2 && p1 == p2,
            _ => false,
        }
    }
}

impl Eq for PredictionContext {}

impl Hash for PredictionContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.cached_hash());
    }
}

impl fmt::Debug for PredictionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for PredictionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { full: false } => write!(f, "*"),
            Self::Empty { full: true } => write!(f, "$"),
            _ => {
                write!(f, "[")?;
                for i in 0..self.size() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    let return_state = self.return_state(i);
                    if return_state == EMPTY_FULL_STATE_KEY {
                        write!(f, "$")?;
                    } else {
                        write!(f, "{return_state} {}", self.parent(i))?;
                    }
                }
                write!(f, "]")
            }
        }
    }
}
