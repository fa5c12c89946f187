/// Counters collected by one simulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PredictionStats {
    /// Calls to `adaptive_predict`.
    pub invocations: usize,
    /// Predictions answered by the single-token lookahead table.
    pub ll1_hits: usize,
    /// Symbol edges found in a decision cache.
    pub dfa_hits: usize,
    /// Symbol edges computed by simulating the network.
    pub atn_transitions: usize,
    /// SLL conflicts retried with full context.
    pub full_context_fallbacks: usize,
    pub ambiguities: usize,
    pub context_sensitivities: usize,
    /// Predictions that failed with an error.
    pub errors: usize,
}

impl PredictionStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            invocations: 0,
            ll1_hits: 0,
            dfa_hits: 0,
            atn_transitions: 0,
            full_context_fallbacks: 0,
            ambiguities: 0,
            context_sensitivities: 0,
            errors: 0,
        }
    }

    /// Merge stats from another simulator
    pub fn merge(&mut self, other: &Self) {
        self.invocations += other.invocations;
        self.ll1_hits += other.ll1_hits;
        self.dfa_hits += other.dfa_hits;
        self.atn_transitions += other.atn_transitions;
        self.full_context_fallbacks += other.full_context_fallbacks;
        self.ambiguities += other.ambiguities;
        self.context_sensitivities += other.context_sensitivities;
        self.errors += other.errors;
    }

    /// Share of edge lookups answered from a cache.
    #[must_use]
    pub fn dfa_hit_rate(&self) -> f64 {
        let total = self.dfa_hits + self.atn_transitions;
        if total == 0 {
            return 0.0;
        }
        self.dfa_hits as f64 / total as f64
    }
}
