//! Observers for the non-fatal findings of prediction.
//!
//! Nothing a listener does can change the predicted alternative.

use crate::bitset::BitSet;
use crate::config::AtnConfigSet;
use std::sync::{Mutex, PoisonError};

/// Receives ambiguity and context-sensitivity reports.
pub trait DiagnosticListener: Send + Sync {
    /// Input `start_index..=stop_index` matches every alternative in
    /// `ambig_alts`. `exact` is false when the ambiguity is only known to
    /// hold for the current caller stack.
    fn report_ambiguity(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        ambig_alts: &BitSet,
        configs: &AtnConfigSet,
    );

    /// SLL prediction conflicted and full-context prediction starts.
    fn report_attempting_full_context(
        &self,
        decision: usize,
        conflicting_alts: Option<&BitSet>,
        start_index: usize,
        stop_index: usize,
        configs: &AtnConfigSet,
    );

    /// Full-context prediction found a unique alternative where SLL had
    /// conflicted.
    fn report_context_sensitivity(
        &self,
        decision: usize,
        prediction: usize,
        start_index: usize,
        stop_index: usize,
        configs: &AtnConfigSet,
    );
}

/// Emits each report as a `tracing` event at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl DiagnosticListener for TracingListener {
    fn report_ambiguity(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        ambig_alts: &BitSet,
        configs: &AtnConfigSet,
    ) {
        tracing::info!(decision, start_index, stop_index, exact, alts = %ambig_alts, configs = configs.len(), "ambiguity");
    }

    fn report_attempting_full_context(
        &self,
        decision: usize,
        conflicting_alts: Option<&BitSet>,
        start_index: usize,
        stop_index: usize,
        configs: &AtnConfigSet,
    ) {
        let alts = conflicting_alts.map_or_else(String::new, ToString::to_string);
        tracing::info!(decision, start_index, stop_index, alts, configs = configs.len(), "attempting full context");
    }

    fn report_context_sensitivity(
        &self,
        decision: usize,
        prediction: usize,
        start_index: usize,
        stop_index: usize,
        configs: &AtnConfigSet,
    ) {
        tracing::info!(decision, prediction, start_index, stop_index, configs = configs.len(), "context sensitivity");
    }
}

/// A report captured by [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    Ambiguity {
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        alts: BitSet,
    },
    AttemptingFullContext {
        decision: usize,
        conflicting_alts: Option<BitSet>,
        start_index: usize,
        stop_index: usize,
    },
    ContextSensitivity {
        decision: usize,
        prediction: usize,
        start_index: usize,
        stop_index: usize,
    },
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the reports received so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn push(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

impl DiagnosticListener for RecordingListener {
    fn report_ambiguity(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        ambig_alts: &BitSet,
        _configs: &AtnConfigSet,
    ) {
        self.push(DiagnosticEvent::Ambiguity {
            decision,
            start_index,
            stop_index,
            exact,
            alts: ambig_alts.clone(),
        });
    }

    fn report_attempting_full_context(
        &self,
        decision: usize,
        conflicting_alts: Option<&BitSet>,
        start_index: usize,
        stop_index: usize,
        _configs: &AtnConfigSet,
    ) {
        self.push(DiagnosticEvent::AttemptingFullContext {
            decision,
            conflicting_alts: conflicting_alts.cloned(),
            start_index,
            stop_index,
        });
    }

    fn report_context_sensitivity(
        &self,
        decision: usize,
        prediction: usize,
        start_index: usize,
        stop_index: usize,
        _configs: &AtnConfigSet,
    ) {
        self.push(DiagnosticEvent::ContextSensitivity {
            decision,
            prediction,
            start_index,
            stop_index,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_listener_keeps_order() {
        let listener = RecordingListener::new();
        let configs = AtnConfigSet::new();
        let alts: BitSet = [1, 2].into_iter().collect();
        listener.report_attempting_full_context(0, Some(&alts), 0, 1, &configs);
        listener.report_context_sensitivity(0, 2, 0, 1, &configs);
        let events = listener.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], DiagnosticEvent::AttemptingFullContext { .. }));
        assert_eq!(
            events[1],
            DiagnosticEvent::ContextSensitivity { decision: 0, prediction: 2, start_index: 0, stop_index: 1 }
        );
        listener.clear();
        assert!(listener.events().is_empty());
    }
}
