use super::PredictionMode;

/// Options of a [`ParserAtnSimulator`](super::ParserAtnSimulator).
///
/// The defaults favour correct LL prediction with every cache enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct PredictionConfig {
    pub mode: PredictionMode,
    /// Report ambiguities and full-context attempts to the listener. Also
    /// makes predicate evaluation exhaustive so reports are complete.
    pub report_ambiguity: bool,
    /// Skip SLL and always predict with the full caller stack.
    pub force_global_context: bool,
    /// Try SLL first even for decisions already known to need full context.
    pub always_try_local_context: bool,
    /// Maintain and consult the single-token lookahead table.
    pub optimize_ll1: bool,
    /// Stop a reach step early once every configuration agrees on one
    /// alternative.
    pub optimize_unique_closure: bool,
    /// Reuse the caller's context for rule calls in tail position.
    pub optimize_tail_calls: bool,
    /// Never apply the tail-call optimization to local-empty contexts.
    pub tail_call_preserves_sll: bool,
    /// Treat a conflict on the very first symbol as a real ambiguity
    /// instead of retrying with full context.
    pub treat_sllk1_conflict_as_ambiguity: bool,
    /// Cache full-context states in the decision DFA as well.
    pub enable_global_context_dfa: bool,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            mode: PredictionMode::Ll,
            report_ambiguity: false,
            force_global_context: false,
            always_try_local_context: true,
            optimize_ll1: true,
            optimize_unique_closure: true,
            optimize_tail_calls: true,
            tail_call_preserves_sll: true,
            treat_sllk1_conflict_as_ambiguity: false,
            enable_global_context_dfa: false,
        }
    }
}

impl PredictionConfig {
    /// Defaults with a different prediction mode.
    #[must_use]
    pub fn with_mode(mode: PredictionMode) -> Self {
        Self { mode, ..Self::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PredictionConfig::default();
        assert_eq!(config.mode, PredictionMode::Ll);
        assert!(config.optimize_ll1);
        assert!(config.always_try_local_context);
        assert!(!config.enable_global_context_dfa);
        assert!(!config.report_ambiguity);
    }

    #[test]
    fn test_with_mode() {
        let config = PredictionConfig::with_mode(PredictionMode::Sll);
        assert_eq!(config.mode, PredictionMode::Sll);
        assert!(config.optimize_tail_calls);
    }
}
