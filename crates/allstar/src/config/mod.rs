//! # Configurations
//!
//! An [`AtnConfig`] is one thread of the prediction simulation: a network
//! state, the alternative it started from, the call stack that brought it
//! there and the predicates it has crossed. An [`AtnConfigSet`] collects the
//! threads alive at one input position and merges threads that differ only
//! in their call stacks.

mod set;

pub use set::{AtnConfigSet, ConflictInfo};

use crate::atn::StateId;
use crate::context::{PredictionContext, PredictionContextCache};
use crate::semantic::SemanticContext;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A single prediction thread.
#[derive(Debug, Clone)]
pub struct AtnConfig {
    state: StateId,
    alt: usize,
    context: Arc<PredictionContext>,
    semantic_context: Arc<SemanticContext>,
    outer_context_depth: u32,
    precedence_filter_suppressed: bool,
}

impl AtnConfig {
    #[must_use]
    pub fn new(state: StateId, alt: usize, context: Arc<PredictionContext>) -> Self {
        Self::with_semantic_context(state, alt, context, SemanticContext::none())
    }

    #[must_use]
    pub fn with_semantic_context(
        state: StateId,
        alt: usize,
        context: Arc<PredictionContext>,
        semantic_context: Arc<SemanticContext>,
    ) -> Self {
        Self {
            state,
            alt,
            context,
            semantic_context,
            outer_context_depth: 0,
            precedence_filter_suppressed: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> StateId {
        self.state
    }

    #[must_use]
    pub fn alt(&self) -> usize {
        self.alt
    }

    #[must_use]
    pub fn context(&self) -> &Arc<PredictionContext> {
        &self.context
    }

    #[must_use]
    pub fn semantic_context(&self) -> &Arc<SemanticContext> {
        &self.semantic_context
    }

    /// How many rule-stop states this thread has fallen through past the
    /// decision's own rule.
    #[must_use]
    pub fn outer_context_depth(&self) -> u32 {
        self.outer_context_depth
    }

    #[must_use]
    pub fn reaches_into_outer_context(&self) -> bool {
        self.outer_context_depth != 0
    }

    /// Set when the thread left a precedence rule through its outermost
    /// invocation; such threads survive the precedence filter.
    #[must_use]
    pub fn is_precedence_filter_suppressed(&self) -> bool {
        self.precedence_filter_suppressed
    }

    pub(crate) fn set_outer_context_depth(&mut self, depth: u32) {
        self.outer_context_depth = depth;
    }

    pub(crate) fn set_precedence_filter_suppressed(&mut self, suppressed: bool) {
        self.precedence_filter_suppressed = suppressed;
    }

    pub(crate) fn set_context(&mut self, context: Arc<PredictionContext>) {
        self.context = context;
    }

    /// The same thread moved to `target`.
    #[must_use]
    pub fn transform(&self, target: StateId) -> Self {
        Self { state: target, ..self.clone() }
    }

    #[must_use]
    pub fn transform_with_context(&self, target: StateId, context: Arc<PredictionContext>) -> Self {
        Self { state: target, context, ..self.clone() }
    }

    #[must_use]
    pub fn transform_with_semantic_context(&self, target: StateId, semantic_context: Arc<SemanticContext>) -> Self {
        Self { state: target, semantic_context, ..self.clone() }
    }

    /// The same thread with one more caller frame below its current stack.
    #[must_use]
    pub fn append_context(&self, return_state: StateId, cache: &mut PredictionContextCache) -> Self {
        let context = self.context.append_context(return_state, cache);
        Self { context, ..self.clone() }
    }
}

impl PartialEq for AtnConfig {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.alt == other.alt
            && self.reaches_into_outer_context() == other.reaches_into_outer_context()
            && self.precedence_filter_suppressed == other.precedence_filter_suppressed
            && self.context == other.context
            && self.semantic_context == other.semantic_context
    }
}

impl Eq for AtnConfig {}

impl Hash for AtnConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state.hash(state);
        self.alt.hash(state);
        self.reaches_into_outer_context().hash(state);
        self.context.hash(state);
        self.semantic_context.hash(state);
    }
}

impl fmt::Display for AtnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{}", self.state, self.alt, self.context)?;
        if !self.semantic_context.is_none() {
            write!(f, ",{}", self.semantic_context)?;
        }
        if self.reaches_into_outer_context() {
            write!(f, ",up={}", self.outer_context_depth)?;
        }
        write!(f, ")")
    }
}
