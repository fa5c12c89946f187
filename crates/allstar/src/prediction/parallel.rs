//! # Batch Prediction
//!
//! Runs many independent predictions against one network.
//!
//! ## Overview
//!
//! Each request owns its token sequence. With the `parallel` feature the
//! batch is spread over rayon's pool, one simulator per worker; every worker
//! fills the same decision caches, so later requests in the batch mostly hit
//! cached edges. Without the feature the batch runs on the calling thread.

use super::{ParserAtnSimulator, PredictionConfig, PredictionStats};
use crate::atn::Atn;
use crate::context::RuleContext;
use crate::error::PredictionError;
use crate::semantic::PredicateEvaluator;
use crate::stream::VecTokenStream;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One prediction to run: a decision, the symbols following the decision
/// point, and the caller stack at that point.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub decision: usize,
    pub symbols: Vec<i32>,
    pub outer_context: Option<Arc<RuleContext>>,
}

impl PredictionRequest {
    #[must_use]
    pub fn new(decision: usize, symbols: Vec<i32>) -> Self {
        Self { decision, symbols, outer_context: None }
    }

    #[must_use]
    pub fn with_outer_context(mut self, outer_context: Arc<RuleContext>) -> Self {
        self.outer_context = Some(outer_context);
        self
    }
}

/// Predicts batches of requests against a shared network.
#[derive(Debug, Clone)]
pub struct BatchPredictor {
    atn: Arc<Atn>,
    config: PredictionConfig,
}

impl BatchPredictor {
    #[must_use]
    pub fn new(atn: Arc<Atn>) -> Self {
        Self::with_config(atn, PredictionConfig::default())
    }

    #[must_use]
    pub fn with_config(atn: Arc<Atn>, config: PredictionConfig) -> Self {
        Self { atn, config }
    }

    #[must_use]
    pub fn atn(&self) -> &Arc<Atn> {
        &self.atn
    }

    /// Predict every request, in order. The returned stats are the sum over
    /// all workers.
    #[cfg(feature = "parallel")]
    pub fn predict_all<E>(
        &self,
        requests: &[PredictionRequest],
        evaluator: &E,
    ) -> (Vec<Result<usize, PredictionError>>, PredictionStats)
    where
        E: PredicateEvaluator + Sync,
    {
        let (results, stats): (Vec<_>, Vec<_>) = requests
            .par_iter()
            .map_init(
                || ParserAtnSimulator::with_config(Arc::clone(&self.atn), self.config.clone()),
                |simulator, request| {
                    let before = *simulator.stats();
                    let result = predict_one(simulator, request, evaluator);
                    (result, delta(simulator.stats(), &before))
                },
            )
            .unzip();

        let mut total = PredictionStats::new();
        for part in &stats {
            total.merge(part);
        }
        tracing::debug!(requests = requests.len(), invocations = total.invocations, "batch predicted");
        (results, total)
    }

    /// Sequential fallback when the `parallel` feature is disabled.
    #[cfg(not(feature = "parallel"))]
    pub fn predict_all<E>(
        &self,
        requests: &[PredictionRequest],
        evaluator: &E,
    ) -> (Vec<Result<usize, PredictionError>>, PredictionStats)
    where
        E: PredicateEvaluator + Sync,
    {
        let mut simulator = ParserAtnSimulator::with_config(Arc::clone(&self.atn), self.config.clone());
        let results = requests.iter().map(|request| predict_one(&mut simulator, request, evaluator)).collect();
        tracing::debug!(requests = requests.len(), invocations = simulator.stats().invocations, "batch predicted");
        (results, *simulator.stats())
    }
}

fn predict_one<E: PredicateEvaluator>(
    simulator: &mut ParserAtnSimulator,
    request: &PredictionRequest,
    evaluator: &E,
) -> Result<usize, PredictionError> {
    let mut input = VecTokenStream::new(request.symbols.clone());
    simulator.adaptive_predict(&mut input, request.decision, request.outer_context.as_deref(), evaluator)
}

#[cfg(feature = "parallel")]
fn delta(after: &PredictionStats, before: &PredictionStats) -> PredictionStats {
    PredictionStats {
        invocations: after.invocations - before.invocations,
        ll1_hits: after.ll1_hits - before.ll1_hits,
        dfa_hits: after.dfa_hits - before.dfa_hits,
        atn_transitions: after.atn_transitions - before.atn_transitions,
        full_context_fallbacks: after.full_context_fallbacks - before.full_context_fallbacks,
        ambiguities: after.ambiguities - before.ambiguities,
        context_sensitivities: after.context_sensitivities - before.context_sensitivities,
        errors: after.errors - before.errors,
    }
}
