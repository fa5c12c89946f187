use super::listener::{DiagnosticListener, TracingListener};
use super::mode::conflicting_alts_or_unique;
use super::{PredictionConfig, PredictionStats};
use crate::atn::{Atn, AtnState, StateId, StateKind, Transition, TransitionKind};
use crate::bitset::BitSet;
use crate::config::{AtnConfig, AtnConfigSet};
use crate::context::{
    EMPTY_FULL_STATE_KEY, PredictionContext, PredictionContextCache, ROOT_RULE_CONTEXT, RuleContext,
};
use crate::dfa::{Dfa, DfaState, DfaStateId, PredPrediction};
use crate::error::PredictionError;
use crate::semantic::{PredicateEvaluator, SemanticContext};
use crate::stream::TokenStream;
use crate::{EOF, INVALID_ALT};
use ahash::RandomState;
use hashbrown::{HashMap, HashSet};
use std::sync::Arc;

/// Adaptive LL(*) prediction over a shared [`Atn`].
///
/// A simulator is cheap and single-threaded; give each parser its own. All
/// simulators built from the same `Arc<Atn>` share its decision caches, so
/// work done by one parser speeds up every other.
pub struct ParserAtnSimulator {
    atn: Arc<Atn>,
    config: PredictionConfig,
    listener: Arc<dyn DiagnosticListener>,
    stats: PredictionStats,
}

impl std::fmt::Debug for ParserAtnSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserAtnSimulator")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl ParserAtnSimulator {
    /// A simulator with the default [`PredictionConfig`].
    #[must_use]
    pub fn new(atn: Arc<Atn>) -> Self {
        Self::with_config(atn, PredictionConfig::default())
    }

    #[must_use]
    pub fn with_config(atn: Arc<Atn>, config: PredictionConfig) -> Self {
        Self {
            atn,
            config,
            listener: Arc::new(TracingListener),
            stats: PredictionStats::new(),
        }
    }

    /// Send diagnostics to `listener` instead of `tracing`.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn DiagnosticListener>) -> Self {
        self.listener = listener;
        self
    }

    #[must_use]
    pub fn atn(&self) -> &Arc<Atn> {
        &self.atn
    }

    #[must_use]
    pub fn config(&self) -> &PredictionConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PredictionConfig {
        &mut self.config
    }

    #[must_use]
    pub fn stats(&self) -> &PredictionStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = PredictionStats::new();
    }

    /// Drop every prediction cached in the shared network.
    pub fn clear_dfa(&self) {
        self.atn.clear_dfa();
    }

    /// Predict which alternative of `decision` the input starting at the
    /// stream's cursor matches.
    ///
    /// `outer_context` is the parser's current invocation stack; without
    /// it prediction cannot fall back to full-context LL and resolves SLL
    /// conflicts to their minimum alternative. The stream is always left
    /// where it was.
    ///
    /// # Errors
    ///
    /// [`PredictionError::NoViableAlt`] when no alternative matches and
    /// [`PredictionError::FailedPredicate`] when every candidate was
    /// rejected by a semantic predicate.
    ///
    /// # Panics
    ///
    /// If `decision` is not a decision of the network.
    pub fn adaptive_predict(
        &mut self,
        input: &mut dyn TokenStream,
        decision: usize,
        outer_context: Option<&RuleContext>,
        evaluator: &dyn PredicateEvaluator,
    ) -> Result<usize, PredictionError> {
        self.stats.invocations += 1;
        let atn: &Atn = &self.atn;
        let dfa = atn.dfa(decision);

        if self.config.optimize_ll1 && !dfa.is_precedence_dfa() && !dfa.is_empty() {
            let symbol = input.la(1);
            if symbol >= 0
                && let Some(alt) = atn.ll1_prediction(decision, symbol)
            {
                self.stats.ll1_hits += 1;
                tracing::trace!(decision, symbol, alt, "ll1 hit");
                return Ok(alt);
            }
        }

        let start_index = input.index();
        tracing::debug!(decision, start_index, symbol = input.la(1), "adaptive predict");

        let mut prediction = Prediction {
            atn,
            config: &self.config,
            listener: self.listener.as_ref(),
            stats: &mut self.stats,
            dfa,
            evaluator,
            outer: outer_context.unwrap_or(&ROOT_RULE_CONTEXT),
            has_outer_context: outer_context.is_some(),
            user_wants_ctx_sensitive: false,
            local: Vec::new(),
        };
        let result = prediction.predict(input, false);
        match &result {
            Ok(alt) => tracing::debug!(decision, start_index, alt, "predicted"),
            Err(error) => {
                self.stats.errors += 1;
                tracing::debug!(decision, start_index, %error, "prediction failed");
            }
        }
        result
    }
}

/// A DFA state either installed in the shared cache or private to one
/// full-context prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateRef {
    Shared(DfaStateId),
    Local(usize),
}

impl StateRef {
    const ERROR: Self = Self::Shared(DfaStateId::ERROR);

    fn is_error(self) -> bool {
        self == Self::ERROR
    }
}

/// Where a simulation step stands: the current DFA state, whether it runs
/// with full context, and the caller frames not yet folded into the
/// configurations' contexts.
#[derive(Debug, Clone, Copy)]
struct SimState<'a> {
    s0: StateRef,
    use_context: bool,
    remaining: Option<&'a RuleContext>,
}

/// Everything one `adaptive_predict` call needs.
struct Prediction<'a> {
    atn: &'a Atn,
    config: &'a PredictionConfig,
    listener: &'a dyn DiagnosticListener,
    stats: &'a mut PredictionStats,
    dfa: &'a Dfa,
    evaluator: &'a dyn PredicateEvaluator,
    outer: &'a RuleContext,
    has_outer_context: bool,
    user_wants_ctx_sensitive: bool,
    /// Full-context states that are not installed in the shared cache.
    local: Vec<DfaState>,
}

type ClosureBusy = HashSet<AtnConfig, RandomState>;

impl<'a> Prediction<'a> {
    fn predict(&mut self, input: &mut dyn TokenStream, use_context: bool) -> Result<usize, PredictionError> {
        let mut use_context = use_context;
        if self.config.force_global_context {
            use_context = true;
        } else if !self.config.always_try_local_context {
            use_context |= self.dfa.is_context_sensitive();
        }
        self.user_wants_ctx_sensitive = use_context
            || (!self.config.mode.is_sll()
                && self.has_outer_context
                && !self.atn.state(self.dfa.atn_start_state()).is_sll());

        let state = if self.dfa.is_empty() { None } else { self.get_start_state(use_context) };

        let marker = input.mark();
        let start_index = input.index();
        let state = match state {
            Some(state) => state,
            None => self.compute_start_state(use_context),
        };
        // the start state may already accept, e.g. when every alternative is empty
        let result = self.exec_dfa(input, start_index, state);
        input.seek(start_index);
        input.release(marker);
        result
    }

    fn with_state<R>(&self, state: StateRef, f: impl FnOnce(&DfaState) -> R) -> R {
        match state {
            StateRef::Shared(id) => self.dfa.with_state(id, f),
            StateRef::Local(index) => f(&self.local[index]),
        }
    }

    fn configs(&self, state: StateRef) -> Arc<AtnConfigSet> {
        self.with_state(state, |s| Arc::clone(s.configs()))
    }

    fn is_accept_state(&self, state: StateRef, use_context: bool) -> bool {
        let exact_only = use_context && self.config.mode.requires_exact_conflicts();
        self.with_state(state, |s| {
            if !s.is_accept_state() {
                return false;
            }
            match s.configs().conflict_info() {
                Some(conflict) if exact_only => conflict.exact,
                _ => true,
            }
        })
    }

    fn existing_target(&self, state: StateRef, symbol: i32) -> Option<StateRef> {
        match state {
            StateRef::Shared(id) => self.dfa.target(id, symbol).map(StateRef::Shared),
            StateRef::Local(_) => None,
        }
    }

    fn context_target(&self, state: StateRef, return_state: StateId) -> Option<StateRef> {
        match state {
            StateRef::Shared(id) => self.dfa.context_target(id, return_state).map(StateRef::Shared),
            StateRef::Local(_) => None,
        }
    }

    fn is_context_symbol(&self, state: StateRef, symbol: i32) -> bool {
        self.with_state(state, |s| s.is_context_symbol(symbol))
    }

    fn set_context_sensitive(&mut self, state: StateRef) {
        match state {
            StateRef::Shared(id) => self.dfa.set_context_sensitive(id),
            StateRef::Local(index) => self.local[index].set_context_sensitive(),
        }
    }

    fn set_context_symbol(&mut self, state: StateRef, symbol: i32) {
        match state {
            StateRef::Shared(id) => self.dfa.set_context_symbol(id, symbol),
            StateRef::Local(index) => self.local[index].set_context_symbol(symbol),
        }
    }

    /// Edges are only recorded between shared states; local states die with
    /// the call.
    fn set_target(&self, from: StateRef, symbol: i32, to: StateRef) {
        if let (StateRef::Shared(from), StateRef::Shared(to)) = (from, to) {
            self.dfa.set_target(from, symbol, to);
        }
    }

    fn set_context_target(&self, from: StateRef, return_state: StateId, to: StateRef) {
        if let (StateRef::Shared(from), StateRef::Shared(to)) = (from, to) {
            self.dfa.set_context_target(from, return_state, to);
        }
    }

    fn get_start_state(&mut self, use_context: bool) -> Option<SimState<'a>> {
        let precedence = self.evaluator.precedence();
        if !use_context {
            let s0 = if self.dfa.is_precedence_dfa() {
                self.dfa.precedence_start_state(precedence, false)?
            } else {
                self.dfa.start_state(false)?
            };
            return Some(SimState { s0: StateRef::Shared(s0), use_context: false, remaining: Some(self.outer) });
        }

        if !self.config.enable_global_context_dfa {
            return None;
        }

        let mut remaining = Some(self.outer);
        let mut s0 = if self.dfa.is_precedence_dfa() {
            self.dfa.precedence_start_state(precedence, true)
        } else {
            self.dfa.start_state(true)
        }
        .map(StateRef::Shared);

        while let Some(context) = remaining
            && let Some(state) = s0
            && self.with_state(state, DfaState::is_context_sensitive)
        {
            let context = self.skip_tail_calls(context);
            s0 = self.context_target(state, self.return_state(context));
            if context.is_empty() {
                remaining = Some(context);
                break;
            }
            remaining = context.parent().map(Arc::as_ref);
        }

        Some(SimState { s0: s0?, use_context: true, remaining })
    }

    fn exec_dfa(
        &mut self,
        input: &mut dyn TokenStream,
        start_index: usize,
        state: SimState<'a>,
    ) -> Result<usize, PredictionError> {
        let mut s = state.s0;
        let mut t = input.la(1);
        let mut remaining = state.remaining;

        loop {
            if state.use_context {
                while self.is_context_symbol(s, t) {
                    let mut next = None;
                    if let Some(context) = remaining {
                        let context = self.skip_tail_calls(context);
                        remaining = Some(context);
                        next = self.context_target(s, self.return_state(context));
                    }
                    let Some(next) = next else {
                        let resume = SimState { s0: s, use_context: state.use_context, remaining };
                        return self.exec_atn(input, start_index, resume);
                    };
                    remaining = remaining.and_then(|c| c.parent().map(Arc::as_ref));
                    s = next;
                }
            }

            if self.is_accept_state(s, state.use_context) {
                break;
            }

            match self.existing_target(s, t) {
                None => {
                    tracing::trace!(decision = self.dfa.decision(), symbol = t, "dfa miss");
                    let resume = SimState { s0: s, use_context: state.use_context, remaining };
                    return self.exec_atn(input, start_index, resume);
                }
                Some(target) if target.is_error() => {
                    let error_state = SimState { s0: s, use_context: state.use_context, remaining };
                    return self.handle_no_viable_alt(input, start_index, error_state);
                }
                Some(target) => {
                    self.stats.dfa_hits += 1;
                    tracing::trace!(decision = self.dfa.decision(), symbol = t, "dfa hit");
                    s = target;
                    if !self.is_accept_state(s, state.use_context) && t != EOF {
                        input.consume();
                        t = input.la(1);
                    }
                }
            }
        }

        let configs = self.configs(s);
        if !state.use_context && configs.conflict_info().is_some() {
            let resolved_locally = !self.user_wants_ctx_sensitive
                || (!configs.dips_into_outer_context() && configs.is_exact_conflict())
                || (self.config.treat_sllk1_conflict_as_ambiguity && input.index() == start_index);
            if !resolved_locally {
                let mut conflicting_alts = None;
                if let Some(predicates) = self.with_state(s, |d| d.predicates().cloned()) {
                    let conflict_index = input.index();
                    if conflict_index != start_index {
                        input.seek(start_index);
                    }
                    let alts = self.eval_semantic_context(&predicates, true);
                    if alts.len() == 1 {
                        return Ok(alts.min().unwrap_or(INVALID_ALT));
                    }
                    if conflict_index != start_index {
                        input.seek(conflict_index);
                    }
                    conflicting_alts = Some(alts);
                }

                if self.config.report_ambiguity {
                    self.listener.report_attempting_full_context(
                        self.dfa.decision(),
                        conflicting_alts.as_ref(),
                        start_index,
                        input.index(),
                        &configs,
                    );
                }
                self.stats.full_context_fallbacks += 1;
                tracing::debug!(decision = self.dfa.decision(), start_index, "retrying with full context");
                input.seek(start_index);
                return self.predict(input, true);
            }
        }

        if let Some(predicates) = self.with_state(s, |d| d.predicates().cloned()) {
            let stop_index = input.index();
            if start_index != stop_index {
                input.seek(start_index);
            }
            let complete = self.config.report_ambiguity && self.config.mode.requires_exact_conflicts();
            let alts = self.eval_semantic_context(&predicates, complete);
            return match alts.len() {
                0 => Err(self.failed_predicate(&predicates, start_index)),
                1 => Ok(alts.min().unwrap_or(INVALID_ALT)),
                _ => {
                    if start_index != stop_index {
                        input.seek(stop_index);
                    }
                    if self.config.report_ambiguity {
                        self.report_ambiguity(start_index, stop_index, configs.is_exact_conflict(), &alts, &configs);
                    }
                    Ok(alts.min().unwrap_or(INVALID_ALT))
                }
            };
        }

        Ok(self.with_state(s, DfaState::prediction))
    }

    fn exec_atn(
        &mut self,
        input: &mut dyn TokenStream,
        start_index: usize,
        initial: SimState<'a>,
    ) -> Result<usize, PredictionError> {
        let use_context = initial.use_context;
        let mut t = input.la(1);
        let mut previous = initial;
        let mut cache = PredictionContextCache::new();

        loop {
            let Some(next_state) = self.compute_reach_set(previous, t, &mut cache) else {
                self.set_target(previous.s0, input.la(1), StateRef::ERROR);
                return self.handle_no_viable_alt(input, start_index, previous);
            };

            let d = next_state.s0;
            if self.is_accept_state(d, use_context) {
                let configs = self.configs(d);
                let mut conflicting_alts = configs.conflicting_alts().cloned();
                if conflicting_alts.is_none() {
                    let predicted = self.with_state(d, DfaState::prediction);
                    if predicted != INVALID_ALT {
                        if self.config.optimize_ll1
                            && input.index() == start_index
                            && !self.dfa.is_precedence_dfa()
                            && next_state.remaining.is_some_and(|r| std::ptr::eq(r, self.outer))
                            && !configs.has_semantic_context()
                            && t >= 0
                        {
                            self.atn.record_ll1_prediction(self.dfa.decision(), t, predicted);
                        }
                        if use_context && self.config.always_try_local_context {
                            self.stats.context_sensitivities += 1;
                            self.listener.report_context_sensitivity(
                                self.dfa.decision(),
                                predicted,
                                start_index,
                                input.index(),
                                &configs,
                            );
                        }
                    }
                }

                let mut predicted = self.with_state(d, DfaState::prediction);
                let attempt_full_context = conflicting_alts.is_some()
                    && self.user_wants_ctx_sensitive
                    && !use_context
                    && (configs.dips_into_outer_context() || !configs.is_exact_conflict())
                    && (!self.config.treat_sllk1_conflict_as_ambiguity || input.index() != start_index);

                if configs.has_semantic_context()
                    && let Some(predicates) = self.with_state(d, |s| s.predicates().cloned())
                {
                    let conflict_index = input.index();
                    if conflict_index != start_index {
                        input.seek(start_index);
                    }
                    let alts = self.eval_semantic_context(
                        &predicates,
                        attempt_full_context || self.config.report_ambiguity,
                    );
                    match alts.len() {
                        0 => return Err(self.failed_predicate(&predicates, start_index)),
                        1 => return Ok(alts.min().unwrap_or(INVALID_ALT)),
                        _ => {}
                    }
                    if conflict_index != start_index {
                        input.seek(conflict_index);
                    }
                    conflicting_alts = Some(alts);
                }

                if !attempt_full_context {
                    if let Some(alts) = &conflicting_alts {
                        if self.config.report_ambiguity && alts.len() > 1 {
                            self.report_ambiguity(start_index, input.index(), configs.is_exact_conflict(), alts, &configs);
                        }
                        predicted = alts.min().unwrap_or(INVALID_ALT);
                    }
                    return Ok(predicted);
                }

                debug_assert!(!use_context);
                let full_context_state = self.compute_start_state(true);
                if self.config.report_ambiguity {
                    self.listener.report_attempting_full_context(
                        self.dfa.decision(),
                        conflicting_alts.as_ref(),
                        start_index,
                        input.index(),
                        &configs,
                    );
                }
                self.stats.full_context_fallbacks += 1;
                tracing::debug!(decision = self.dfa.decision(), start_index, "retrying with full context");
                input.seek(start_index);
                return self.exec_atn(input, start_index, full_context_state);
            }

            previous = next_state;
            if t != EOF {
                input.consume();
                t = input.la(1);
            }
        }
    }

    /// Follow `previous` over `t`, from the cache when possible. `None`
    /// means no configuration survives.
    fn compute_reach_set(
        &mut self,
        previous: SimState<'a>,
        t: i32,
        cache: &mut PredictionContextCache,
    ) -> Option<SimState<'a>> {
        let use_context = previous.use_context;
        let mut remaining = previous.remaining;
        let mut s = previous.s0;

        if use_context {
            while self.is_context_symbol(s, t) {
                let Some(context) = remaining else { break };
                let context = self.skip_tail_calls(context);
                let Some(next) = self.context_target(s, self.return_state(context)) else {
                    remaining = Some(context);
                    break;
                };
                remaining = context.parent().map(Arc::as_ref);
                s = next;
            }
        }

        debug_assert!(!self.is_accept_state(s, use_context));
        if self.is_accept_state(s, use_context) {
            return Some(SimState { s0: s, use_context, remaining });
        }

        let target = match self.existing_target(s, t) {
            Some(target) => {
                self.stats.dfa_hits += 1;
                target
            }
            None => {
                self.stats.atn_transitions += 1;
                let (target, rest) = self.compute_target_state(s, remaining, t, use_context, cache);
                remaining = rest;
                target
            }
        };

        if target.is_error() {
            return None;
        }
        debug_assert!(!use_context || !self.configs(target).dips_into_outer_context());
        Some(SimState { s0: target, use_context, remaining })
    }

    fn compute_target_state(
        &mut self,
        s: StateRef,
        mut remaining: Option<&'a RuleContext>,
        t: i32,
        use_context: bool,
        cache: &mut PredictionContextCache,
    ) -> (StateRef, Option<&'a RuleContext>) {
        tracing::trace!(decision = self.dfa.decision(), symbol = t, use_context, "computing target state");
        let mut closure_configs: Vec<AtnConfig> = self.configs(s).iter().cloned().collect();
        let mut context_elements: Option<Vec<StateId>> = None;
        let mut reach = AtnConfigSet::new();

        loop {
            let has_more_context = !use_context || remaining.is_some();
            if !has_more_context {
                reach.set_outermost_config_set(true);
            }

            let mut reach_intermediate = AtnConfigSet::new();
            let mut skipped_stop_states: Option<Vec<AtnConfig>> = None;
            for config in &closure_configs {
                let state = self.atn.state(config.state());
                if state.is_rule_stop() {
                    debug_assert!(config.context().is_empty());
                    if (use_context && !config.reaches_into_outer_context()) || t == EOF {
                        skipped_stop_states.get_or_insert_with(Vec::new).push(config.clone());
                    }
                    continue;
                }
                for transition in state.transitions() {
                    if transition.matches(t, 0, self.atn.max_token_type()) {
                        reach_intermediate.add(config.transform(transition.target), cache);
                    }
                }
            }

            if self.config.optimize_unique_closure
                && skipped_stop_states.is_none()
                && t != EOF
                && reach_intermediate.unique_alt() != INVALID_ALT
            {
                reach_intermediate.set_outermost_config_set(reach.is_outermost_config_set());
                reach = reach_intermediate;
                break;
            }

            self.closure(reach_intermediate, &mut reach, false, has_more_context, cache, t == EOF);
            let step_into_global = reach.dips_into_outer_context();

            if t == EOF {
                reach = self.remove_all_configs_not_in_rule_stop_state(reach, cache);
            }

            if let Some(skipped) = skipped_stop_states
                && (!use_context || !reach.has_config_in_rule_stop_state(self.atn))
            {
                for config in skipped {
                    reach.add(config, cache);
                }
            }

            if !(use_context && step_into_global) {
                break;
            }

            reach.clear();
            let Some(context) = remaining else { break };
            let context = self.skip_tail_calls(context);
            let next_context_element = self.return_state(context);
            remaining = if context.is_empty() { None } else { context.parent().map(Arc::as_ref) };
            context_elements.get_or_insert_with(Vec::new).push(next_context_element);
            if next_context_element != EMPTY_FULL_STATE_KEY {
                for config in &mut closure_configs {
                    *config = config.append_context(next_context_element, cache);
                }
            }
        }

        if reach.is_empty() {
            self.set_target(s, t, StateRef::ERROR);
            return (StateRef::ERROR, remaining);
        }

        let result = self.add_dfa_edge(s, t, context_elements, reach, cache);
        (result, remaining)
    }

    fn remove_all_configs_not_in_rule_stop_state(
        &self,
        configs: AtnConfigSet,
        cache: &mut PredictionContextCache,
    ) -> AtnConfigSet {
        if configs.all_configs_in_rule_stop_states(self.atn) {
            return configs;
        }
        let mut result = AtnConfigSet::new();
        result.set_outermost_config_set(configs.is_outermost_config_set());
        for config in configs.iter().filter(|c| self.atn.state(c.state()).is_rule_stop()) {
            result.add(config.clone(), cache);
        }
        result
    }

    fn compute_start_state(&mut self, use_context: bool) -> SimState<'a> {
        let precedence = self.evaluator.precedence();
        let mut s0 = if self.dfa.is_precedence_dfa() {
            self.dfa.precedence_start_state(precedence, use_context)
        } else {
            self.dfa.start_state(use_context)
        }
        .map(StateRef::Shared);

        if let Some(state) = s0 {
            if !use_context {
                return SimState { s0: state, use_context, remaining: Some(self.outer) };
            }
            self.set_context_sensitive(state);
        }

        let decision_state = self.atn.state(self.dfa.atn_start_state());
        let mut previous_context = EMPTY_FULL_STATE_KEY;
        let mut remaining = Some(self.outer);
        let mut initial_context =
            if use_context { PredictionContext::empty_full() } else { PredictionContext::empty_local() };
        let mut cache = PredictionContextCache::new();

        if use_context {
            if !self.config.enable_global_context_dfa {
                while let Some(context) = remaining {
                    if context.is_empty() {
                        previous_context = EMPTY_FULL_STATE_KEY;
                        remaining = None;
                    } else {
                        previous_context = self.return_state(context);
                        initial_context = initial_context.append_context(previous_context, &mut cache);
                        remaining = context.parent().map(Arc::as_ref);
                    }
                }
            }

            while let Some(state) = s0
                && self.with_state(state, DfaState::is_context_sensitive)
                && let Some(context) = remaining
            {
                let context = self.skip_tail_calls(context);
                let next = if context.is_empty() {
                    previous_context = EMPTY_FULL_STATE_KEY;
                    remaining = None;
                    self.context_target(state, EMPTY_FULL_STATE_KEY)
                } else {
                    previous_context = self.return_state(context);
                    initial_context = initial_context.append_context(previous_context, &mut cache);
                    remaining = context.parent().map(Arc::as_ref);
                    self.context_target(state, previous_context)
                };
                let Some(next) = next else { break };
                s0 = Some(next);
            }
        }

        if let Some(state) = s0
            && !self.with_state(state, DfaState::is_context_sensitive)
        {
            return SimState { s0: state, use_context, remaining };
        }

        loop {
            let mut reach_intermediate = AtnConfigSet::new();
            for (index, transition) in decision_state.transitions().iter().enumerate() {
                reach_intermediate.add(
                    AtnConfig::new(transition.target, index + 1, Arc::clone(&initial_context)),
                    &mut cache,
                );
            }

            let has_more_context = remaining.is_some();
            let mut configs = AtnConfigSet::new();
            if !has_more_context {
                configs.set_outermost_config_set(true);
            }
            self.closure(reach_intermediate, &mut configs, true, has_more_context, &mut cache, false);
            let step_into_global = configs.dips_into_outer_context();

            if self.dfa.is_precedence_dfa() {
                configs = self.apply_precedence_filter(configs, &mut cache);
            }

            let next = if use_context && !self.config.enable_global_context_dfa {
                s0 = Some(self.add_dfa_state(configs, &mut cache));
                break;
            } else if let Some(state) = s0 {
                let next = self.add_dfa_state(configs, &mut cache);
                self.set_context_target(state, previous_context, next);
                next
            } else if self.dfa.is_precedence_dfa() {
                match self.add_dfa_state(configs, &mut cache) {
                    StateRef::Shared(id) => {
                        StateRef::Shared(self.dfa.set_precedence_start_state(precedence, use_context, id))
                    }
                    local => local,
                }
            } else {
                match self.add_dfa_state(configs, &mut cache) {
                    StateRef::Shared(id) => StateRef::Shared(self.dfa.set_start_state_if_absent(use_context, id)),
                    local => local,
                }
            };

            s0 = Some(next);
            if !use_context || !step_into_global {
                break;
            }

            self.set_context_sensitive(next);
            let Some(context) = remaining else { break };
            let context = self.skip_tail_calls(context);
            let next_context_element = self.return_state(context);
            remaining = if context.is_empty() { None } else { context.parent().map(Arc::as_ref) };
            if next_context_element != EMPTY_FULL_STATE_KEY {
                initial_context = initial_context.append_context(next_context_element, &mut cache);
            }
            previous_context = next_context_element;
        }

        let s0 = s0.unwrap_or(StateRef::ERROR);
        SimState { s0, use_context, remaining }
    }

    /// Narrow a precedence decision's start set to the current precedence
    /// level.
    ///
    /// Precedence predicates on alternative 1 (entering the loop) are
    /// resolved against the parser's precedence. A configuration of any
    /// other alternative (leaving the loop) is dropped when alternative 1
    /// reaches the same state with the same context, unless it left the
    /// rule through its outermost invocation.
    fn apply_precedence_filter(&self, configs: AtnConfigSet, cache: &mut PredictionContextCache) -> AtnConfigSet {
        let mut states_from_alt1: HashMap<StateId, Arc<PredictionContext>, RandomState> =
            HashMap::with_hasher(RandomState::new());
        let mut filtered = AtnConfigSet::new();
        filtered.set_outermost_config_set(configs.is_outermost_config_set());

        for config in configs.iter().filter(|c| c.alt() == 1) {
            let Some(updated) = config.semantic_context().eval_precedence(self.evaluator, self.outer) else {
                continue;
            };
            states_from_alt1.insert(config.state(), Arc::clone(config.context()));
            if Arc::ptr_eq(&updated, config.semantic_context()) {
                filtered.add(config.clone(), cache);
            } else {
                filtered.add(config.transform_with_semantic_context(config.state(), updated), cache);
            }
        }

        for config in configs.iter().filter(|c| c.alt() != 1) {
            if !config.is_precedence_filter_suppressed()
                && let Some(context) = states_from_alt1.get(&config.state())
                && **context == **config.context()
            {
                continue;
            }
            filtered.add(config.clone(), cache);
        }
        filtered
    }

    /// Add to `configs` everything reachable from `source` without
    /// consuming input.
    ///
    /// Rule invocations found while not collecting predicates are expanded
    /// in a later round rather than recursively. `busy` spans all rounds,
    /// so no configuration is expanded twice.
    fn closure(
        &self,
        source: AtnConfigSet,
        configs: &mut AtnConfigSet,
        collect_predicates: bool,
        has_more_context: bool,
        cache: &mut PredictionContextCache,
        treat_eof_as_epsilon: bool,
    ) {
        let mut current = source;
        let mut busy = ClosureBusy::with_hasher(RandomState::new());
        while !current.is_empty() {
            let mut intermediate = AtnConfigSet::new();
            for config in current.iter() {
                self.closure_config(
                    config.clone(),
                    configs,
                    &mut intermediate,
                    &mut busy,
                    collect_predicates,
                    has_more_context,
                    cache,
                    0,
                    treat_eof_as_epsilon,
                );
            }
            current = intermediate;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn closure_config(
        &self,
        mut config: AtnConfig,
        configs: &mut AtnConfigSet,
        intermediate: &mut AtnConfigSet,
        busy: &mut ClosureBusy,
        collect_predicates: bool,
        has_more_context: bool,
        cache: &mut PredictionContextCache,
        depth: i32,
        treat_eof_as_epsilon: bool,
    ) {
        let state = self.atn.state(config.state());
        if state.is_rule_stop() {
            let context = Arc::clone(config.context());
            if !context.is_empty() {
                let has_empty = context.has_empty();
                let non_empty = context.size() - usize::from(has_empty);
                for i in 0..non_empty {
                    let mut returned = AtnConfig::with_semantic_context(
                        context.return_state(i),
                        config.alt(),
                        Arc::clone(context.parent(i)),
                        Arc::clone(config.semantic_context()),
                    );
                    returned.set_outer_context_depth(config.outer_context_depth());
                    returned.set_precedence_filter_suppressed(config.is_precedence_filter_suppressed());
                    self.closure_config(
                        returned,
                        configs,
                        intermediate,
                        busy,
                        collect_predicates,
                        has_more_context,
                        cache,
                        depth - 1,
                        treat_eof_as_epsilon,
                    );
                }
                if !has_empty || !has_more_context {
                    return;
                }
                config.set_context(PredictionContext::empty_local());
            } else if !has_more_context {
                configs.add(config, cache);
                return;
            } else if context.is_empty_full() {
                config.set_context(PredictionContext::empty_local());
            } else if !config.reaches_into_outer_context() && context.is_empty_local() {
                // first time the decision rule is left
                configs.add(config.clone(), cache);
            }
        }

        if !state.only_has_epsilon_transitions() {
            configs.add(config.clone(), cache);
        }

        for (index, transition) in state.transitions().iter().enumerate() {
            if index == 0 && suppresses_first_edge(state, config.context()) {
                continue;
            }

            let continue_collecting = collect_predicates && !matches!(transition.kind, TransitionKind::Action { .. });
            let Some(mut next) =
                self.epsilon_target(&config, transition, continue_collecting, depth == 0, cache, treat_eof_as_epsilon)
            else {
                continue;
            };

            let mut new_depth = depth;
            if state.is_rule_stop() {
                if self.dfa.is_precedence_dfa()
                    && let TransitionKind::Epsilon { outermost_precedence_return: Some(rule) } = transition.kind
                    && rule == self.atn.state(self.dfa.atn_start_state()).rule_index()
                {
                    next.set_precedence_filter_suppressed(true);
                }
                next.set_outer_context_depth(next.outer_context_depth() + 1);
                new_depth -= 1;
            } else if matches!(transition.kind, TransitionKind::Rule { .. }) && new_depth >= 0 {
                new_depth += 1;
            }

            if !busy.insert(next.clone()) {
                continue;
            }

            if matches!(transition.kind, TransitionKind::Rule { .. }) && !collect_predicates {
                intermediate.add(next, cache);
                continue;
            }

            self.closure_config(
                next,
                configs,
                intermediate,
                busy,
                continue_collecting,
                has_more_context,
                cache,
                new_depth,
                treat_eof_as_epsilon,
            );
        }
    }

    fn epsilon_target(
        &self,
        config: &AtnConfig,
        transition: &Transition,
        collect_predicates: bool,
        in_context: bool,
        cache: &mut PredictionContextCache,
        treat_eof_as_epsilon: bool,
    ) -> Option<AtnConfig> {
        let target = transition.target;
        match &transition.kind {
            TransitionKind::Rule { follow_state, tail_call, .. } => {
                // an elided frame would let a pop land at depth 0 in the caller
                let context = if self.config.optimize_tail_calls
                    && *tail_call
                    && !collect_predicates
                    && (!self.config.tail_call_preserves_sll || !config.context().is_empty_local())
                {
                    Arc::clone(config.context())
                } else {
                    cache.get_child(config.context(), *follow_state)
                };
                Some(config.transform_with_context(target, context))
            }
            TransitionKind::Precedence { precedence } => {
                if collect_predicates && in_context {
                    let semantic =
                        SemanticContext::and(config.semantic_context(), &SemanticContext::precedence(*precedence));
                    Some(config.transform_with_semantic_context(target, semantic))
                } else {
                    Some(config.transform(target))
                }
            }
            TransitionKind::Predicate { rule_index, pred_index, is_ctx_dependent } => {
                if collect_predicates && (!is_ctx_dependent || in_context) {
                    let predicate = SemanticContext::predicate(*rule_index, *pred_index, *is_ctx_dependent);
                    let semantic = SemanticContext::and(config.semantic_context(), &predicate);
                    Some(config.transform_with_semantic_context(target, semantic))
                } else {
                    Some(config.transform(target))
                }
            }
            TransitionKind::Action { .. } | TransitionKind::Epsilon { .. } => Some(config.transform(target)),
            TransitionKind::Atom(_) | TransitionKind::Range { .. } | TransitionKind::Set(_) => {
                (treat_eof_as_epsilon && transition.matches(EOF, 0, 1)).then(|| config.transform(target))
            }
            TransitionKind::NotSet(_) | TransitionKind::Wildcard => None,
        }
    }

    fn add_dfa_edge(
        &mut self,
        from: StateRef,
        t: i32,
        context_elements: Option<Vec<StateId>>,
        to_configs: AtnConfigSet,
        cache: &mut PredictionContextCache,
    ) -> StateRef {
        let to = self.add_dfa_state(to_configs, cache);
        let mut from = from;
        for context in context_elements.into_iter().flatten() {
            if context == EMPTY_FULL_STATE_KEY && self.configs(from).is_outermost_config_set() {
                continue;
            }
            self.set_context_sensitive(from);
            self.set_context_symbol(from, t);
            if let Some(next) = self.context_target(from, context) {
                from = next;
                continue;
            }
            let from_configs = self.configs(from);
            let next = self.add_dfa_context_state(&from_configs, context, cache);
            self.set_context_target(from, context, next);
            from = next;
        }
        self.set_target(from, t, to);
        to
    }

    fn add_dfa_context_state(
        &mut self,
        configs: &AtnConfigSet,
        return_context: StateId,
        cache: &mut PredictionContextCache,
    ) -> StateRef {
        if return_context == EMPTY_FULL_STATE_KEY {
            let mut outermost = configs.clone();
            outermost.set_outermost_config_set(true);
            return self.add_dfa_state(outermost, cache);
        }
        let mut context_configs = AtnConfigSet::new();
        for config in configs {
            context_configs.add(config.append_context(return_context, cache), cache);
        }
        self.add_dfa_state(context_configs, cache)
    }

    /// Freeze `configs` into a DFA state, reusing an equal installed state.
    ///
    /// Full-context sets with no caller frames left are kept local unless
    /// `enable_global_context_dfa` is set.
    fn add_dfa_state(&mut self, mut configs: AtnConfigSet, cache: &mut PredictionContextCache) -> StateRef {
        let enable_dfa = self.config.enable_global_context_dfa || !configs.is_outermost_config_set();
        if configs.conflict_info().is_none() {
            let conflict = configs.compute_conflict_info(self.atn, cache);
            configs.set_conflict_info(conflict);
        }
        if enable_dfa {
            configs.optimize_configs(self.atn.context_interner());
            if let Some(existing) = self.dfa.find(&configs) {
                return StateRef::Shared(existing);
            }
        }

        let state = self.create_dfa_state(configs);
        if enable_dfa {
            StateRef::Shared(self.dfa.install(state))
        } else {
            self.local.push(state);
            StateRef::Local(self.local.len() - 1)
        }
    }

    fn create_dfa_state(&self, configs: AtnConfigSet) -> DfaState {
        let unique_alt = configs.unique_alt();
        let conflict_min = configs.conflicting_alts().and_then(BitSet::min);
        let has_semantic_context = configs.has_semantic_context();
        let mut state = DfaState::new(Arc::new(configs));

        if unique_alt != INVALID_ALT {
            state.set_accept(unique_alt);
        } else if let Some(min) = conflict_min {
            state.set_accept(min);
        }

        if state.is_accept_state() && has_semantic_context {
            let alt_count = self.atn.state(self.dfa.atn_start_state()).num_transitions();
            let ambig_alts = conflicting_alts_or_unique(state.configs());
            match preds_for_ambig_alts(&ambig_alts, state.configs(), alt_count) {
                Some(alt_to_pred) => {
                    state.predicates = predicate_predictions(&ambig_alts, &alt_to_pred);
                    state.prediction = INVALID_ALT;
                }
                None => state.prediction = ambig_alts.min().unwrap_or(INVALID_ALT),
            }
        }
        state
    }

    /// Evaluate `predicates` in alternative order. Unless `complete`, stop at
    /// the first that holds.
    fn eval_semantic_context(&self, predicates: &[PredPrediction], complete: bool) -> BitSet {
        let mut alts = BitSet::new();
        for pair in predicates {
            if pair.pred.is_none() || pair.pred.eval(self.evaluator, self.outer) {
                alts.insert(pair.alt);
                if !complete {
                    break;
                }
            }
        }
        alts
    }

    /// Pick an alternative when no configuration can match the next
    /// symbol, if some alternative already finished the decision rule.
    fn handle_no_viable_alt(
        &mut self,
        input: &mut dyn TokenStream,
        start_index: usize,
        previous: SimState<'a>,
    ) -> Result<usize, PredictionError> {
        let configs = self.configs(previous.s0);
        let finished = |c: &&AtnConfig| c.reaches_into_outer_context() || self.atn.state(c.state()).is_rule_stop();

        let alts: BitSet = configs.iter().filter(finished).map(AtnConfig::alt).collect();
        match alts.len() {
            0 => {}
            1 => return Ok(alts.min().unwrap_or(INVALID_ALT)),
            _ => {
                let fallback = alts.min().unwrap_or(INVALID_ALT);
                if !configs.has_semantic_context() {
                    return Ok(fallback);
                }

                let mut cache = PredictionContextCache::new();
                let mut filtered = AtnConfigSet::new();
                for config in configs.iter().filter(finished) {
                    filtered.add(config.clone(), &mut cache);
                }
                let max_alt = alts.iter().max().unwrap_or(INVALID_ALT);
                if let Some(alt_to_pred) = preds_for_ambig_alts(&alts, &filtered, max_alt)
                    && let Some(predicates) = predicate_predictions(&alts, &alt_to_pred)
                {
                    let stop_index = input.index();
                    input.seek(start_index);
                    let surviving = self.eval_semantic_context(&predicates, false);
                    input.seek(stop_index);
                    if let Some(alt) = surviving.min() {
                        return Ok(alt);
                    }
                }
                return Ok(fallback);
            }
        }

        Err(PredictionError::NoViableAlt {
            decision: self.dfa.decision(),
            start_index,
            offending_index: input.index(),
            offending_symbol: input.la(1),
            expected: self.atn.next_tokens(self.dfa.atn_start_state()),
            dead_end_configs: configs,
        })
    }

    fn failed_predicate(&self, predicates: &[PredPrediction], start_index: usize) -> PredictionError {
        PredictionError::FailedPredicate {
            decision: self.dfa.decision(),
            start_index,
            predicates: predicates.iter().filter(|p| !p.pred.is_none()).map(|p| Arc::clone(&p.pred)).collect(),
        }
    }

    fn report_ambiguity(
        &mut self,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        alts: &BitSet,
        configs: &AtnConfigSet,
    ) {
        self.stats.ambiguities += 1;
        self.listener.report_ambiguity(self.dfa.decision(), start_index, stop_index, exact, alts, configs);
    }

    /// The state the frame `context` returns to, or the full-empty key for
    /// the root frame.
    fn return_state(&self, context: &RuleContext) -> StateId {
        let Some(invoking_state) = context.invoking_state() else {
            return EMPTY_FULL_STATE_KEY;
        };
        match self.atn.invocation_follow_state(invoking_state) {
            Some(follow) => follow,
            None => {
                debug_assert!(false, "invoking state {invoking_state} has no rule transition");
                EMPTY_FULL_STATE_KEY
            }
        }
    }

    /// Skip frames entered through tail calls; returning from them lands
    /// directly at their caller's return state.
    fn skip_tail_calls(&self, context: &'a RuleContext) -> &'a RuleContext {
        if !self.config.optimize_tail_calls {
            return context;
        }
        let mut context = context;
        while let Some(invoking_state) = context.invoking_state()
            && self.atn.is_tail_call(invoking_state)
            && let Some(parent) = context.parent()
        {
            context = Arc::as_ref(parent);
        }
        context
    }
}

/// The first edge of a precedence loop entry is redundant when every
/// return state of `context` is a loop-back state of that loop: the
/// recursive call already finished one pass through the loop.
fn suppresses_first_edge(state: &AtnState, context: &PredictionContext) -> bool {
    let StateKind::StarLoopEntry { precedence_rule_decision: true, precedence_loopback_states, .. } = state.kind()
    else {
        return false;
    };
    if context.has_empty() {
        return false;
    }
    (0..context.size()).all(|i| precedence_loopback_states.contains(context.return_state(i).index()))
}

/// Per alternative in `ambig_alts`, the disjunction of its configurations'
/// predicates. `None` when no alternative carries a predicate.
fn preds_for_ambig_alts(
    ambig_alts: &BitSet,
    configs: &AtnConfigSet,
    alt_count: usize,
) -> Option<Vec<Arc<SemanticContext>>> {
    let mut alt_to_pred: Vec<Option<Arc<SemanticContext>>> = vec![None; alt_count + 1];
    for config in configs {
        let alt = config.alt();
        if !ambig_alts.contains(alt) {
            continue;
        }
        let Some(slot) = alt_to_pred.get_mut(alt) else { continue };
        *slot = Some(match slot.take() {
            Some(existing) => SemanticContext::or(&existing, config.semantic_context()),
            None => Arc::clone(config.semantic_context()),
        });
    }

    let alt_to_pred: Vec<Arc<SemanticContext>> =
        alt_to_pred.into_iter().map(|p| p.unwrap_or_else(SemanticContext::none)).collect();
    alt_to_pred.iter().any(|p| !p.is_none()).then_some(alt_to_pred)
}

/// Predicate/alternative pairs in alternative order. Unpredicated
/// ambiguous alternatives act as defaults.
fn predicate_predictions(ambig_alts: &BitSet, alt_to_pred: &[Arc<SemanticContext>]) -> Option<Arc<[PredPrediction]>> {
    let mut pairs = Vec::new();
    let mut contains_predicate = false;
    for (alt, pred) in alt_to_pred.iter().enumerate().skip(1) {
        if pred.is_none() {
            if ambig_alts.contains(alt) {
                pairs.push(PredPrediction { pred: Arc::clone(pred), alt });
            }
        } else {
            contains_predicate = true;
            pairs.push(PredPrediction { pred: Arc::clone(pred), alt });
        }
    }
    contains_predicate.then(|| pairs.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::{AtnBuilder, Element};
    use crate::semantic::NoopEvaluator;
    use crate::stream::VecTokenStream;

    const INT: i32 = 1;
    const STAR: i32 = 2;
    const PLUS: i32 = 3;

    /// `e : INT ( {2}? '*' e[3] | {1}? '+' e[2] )* ;`
    fn expression_atn() -> (Atn, usize) {
        let mut builder = AtnBuilder::parser(3);
        let e = builder.define_precedence_rule("e");
        builder
            .rule(
                e,
                vec![vec![
                    Element::token(INT),
                    Element::star(vec![
                        vec![Element::Precedence(2), Element::token(STAR), Element::rule_with_precedence(e, 3)],
                        vec![Element::Precedence(1), Element::token(PLUS), Element::rule_with_precedence(e, 2)],
                    ]),
                ]],
            )
            .unwrap();
        (builder.build().unwrap(), e)
    }

    fn loop_entry(atn: &Atn) -> &AtnState {
        atn.states()
            .iter()
            .find(|s| matches!(s.kind(), StateKind::StarLoopEntry { precedence_rule_decision: true, .. }))
            .unwrap()
    }

    fn loopback_states(state: &AtnState) -> Vec<StateId> {
        match state.kind() {
            StateKind::StarLoopEntry { precedence_loopback_states, .. } => {
                precedence_loopback_states.iter().map(|i| StateId(i as u32)).collect()
            }
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_first_edge_suppressed_only_inside_recursive_call() {
        let (atn, _) = expression_atn();
        let entry = loop_entry(&atn);
        let loopbacks = loopback_states(entry);
        assert_eq!(loopbacks.len(), 2);

        let inside = PredictionContext::empty_local().get_child(loopbacks[0]);
        assert!(suppresses_first_edge(entry, &inside));

        let mixed = PredictionContext::from_entries(vec![
            (StateId(0), PredictionContext::empty_local()),
            (loopbacks[0], PredictionContext::empty_local()),
        ]);
        assert!(!suppresses_first_edge(entry, &mixed));
        assert!(!suppresses_first_edge(entry, &PredictionContext::empty_local()));
        assert!(!suppresses_first_edge(atn.state(StateId(0)), &inside));
    }

    #[test]
    fn test_closure_drops_loop_edge_after_recursive_call() {
        let (atn, _) = expression_atn();
        let entry = loop_entry(&atn);
        let decision = entry.decision().unwrap();
        let loopback = loopback_states(entry)[0];
        let config = PredictionConfig::default();
        let mut stats = PredictionStats::new();
        let prediction = Prediction {
            atn: &atn,
            config: &config,
            listener: &TracingListener,
            stats: &mut stats,
            dfa: atn.dfa(decision),
            evaluator: &NoopEvaluator,
            outer: &ROOT_RULE_CONTEXT,
            has_outer_context: false,
            user_wants_ctx_sensitive: false,
            local: Vec::new(),
        };

        // (operator, context) for every configuration parked before '*' or '+'
        let operator_configs = |context: Arc<PredictionContext>| {
            let mut cache = PredictionContextCache::new();
            let mut seed = AtnConfigSet::new();
            seed.add(AtnConfig::new(entry.id(), 1, context), &mut cache);
            let mut reach = AtnConfigSet::new();
            prediction.closure(seed, &mut reach, false, true, &mut cache, false);
            reach
                .iter()
                .filter(|c| !atn.state(c.state()).is_rule_stop())
                .filter_map(|c| match atn.state(c.state()).transition(0).kind {
                    TransitionKind::Atom(symbol) if symbol == STAR || symbol == PLUS => {
                        Some((symbol, Arc::clone(c.context())))
                    }
                    _ => None,
                })
                .collect::<Vec<_>>()
        };

        let at_top = operator_configs(PredictionContext::empty_local());
        assert!(at_top.iter().any(|(symbol, _)| *symbol == STAR));
        assert!(at_top.iter().any(|(symbol, _)| *symbol == PLUS));

        // only the enclosing loop, reached after returning, may see an operator
        let inside = operator_configs(PredictionContext::empty_local().get_child(loopback));
        assert!(!inside.is_empty());
        assert!(inside.iter().all(|(_, context)| context.is_empty()));
    }

    #[test]
    fn test_precedence_decision_follows_precedence_level() {
        struct Level(i32);
        impl PredicateEvaluator for Level {
            fn sempred(&self, _: Option<&RuleContext>, _: usize, _: usize) -> bool {
                true
            }
            fn precedence(&self) -> i32 {
                self.0
            }
        }

        let (atn, _) = expression_atn();
        let atn = Arc::new(atn);
        let decision = loop_entry(&atn).decision().unwrap();
        let mut simulator = ParserAtnSimulator::new(Arc::clone(&atn));

        // INT '*' INT, looking at '*'
        let mut input = VecTokenStream::new(vec![STAR, INT]);
        let enter = simulator.adaptive_predict(&mut input, decision, None, &Level(0)).unwrap();
        assert_eq!(enter, 1);

        // inside e[3], '+' must end the loop
        let mut input = VecTokenStream::new(vec![PLUS, INT]);
        let exit = simulator.adaptive_predict(&mut input, decision, None, &Level(3)).unwrap();
        assert_eq!(exit, 2);

        // at level 0, '+' continues it
        let mut input = VecTokenStream::new(vec![PLUS, INT]);
        let again = simulator.adaptive_predict(&mut input, decision, None, &Level(0)).unwrap();
        assert_eq!(again, 1);
        assert!(atn.dfa(decision).is_precedence_dfa());
    }

    #[test]
    fn test_preds_for_ambig_alts() {
        let mut cache = PredictionContextCache::new();
        let mut configs = AtnConfigSet::new();
        let pred = SemanticContext::predicate(0, 0, false);
        configs.add(AtnConfig::with_semantic_context(StateId(1), 1, PredictionContext::empty_local(), Arc::clone(&pred)), &mut cache);
        configs.add(AtnConfig::new(StateId(1), 2, PredictionContext::empty_local()), &mut cache);
        let ambig: BitSet = [1, 2].into_iter().collect();

        let alt_to_pred = preds_for_ambig_alts(&ambig, &configs, 2).unwrap();
        assert_eq!(alt_to_pred[1], pred);
        assert!(alt_to_pred[2].is_none());

        let pairs = predicate_predictions(&ambig, &alt_to_pred).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].alt, 1);
        assert!(pairs[1].pred.is_none());
    }

    #[test]
    fn test_no_predicates_means_no_pairs() {
        let mut cache = PredictionContextCache::new();
        let mut configs = AtnConfigSet::new();
        configs.add(AtnConfig::new(StateId(1), 1, PredictionContext::empty_local()), &mut cache);
        let ambig = BitSet::singleton(1);
        assert!(preds_for_ambig_alts(&ambig, &configs, 1).is_none());
    }
}
