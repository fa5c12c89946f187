//! # Prediction
//!
//! The adaptive LL(*) simulator and everything that configures or observes
//! it.
//!
//! ## Overview
//!
//! [`ParserAtnSimulator::adaptive_predict`] answers "which alternative?" for
//! one decision:
//!
//! 1. The single-token table and the decision's [`Dfa`](crate::dfa::Dfa) are
//!    consulted first.
//! 2. On a cache miss the network is simulated one symbol at a time,
//!    ignoring the caller stack (SLL), and the result is cached.
//! 3. When SLL stops at a conflict the real caller stack could resolve,
//!    the simulation restarts with full context (LL).
//! 4. Semantic predicates on the surviving alternatives are evaluated last.
//!
//! [`PredictionMode`] selects how far that escalation goes, and
//! [`PredictionConfig`] holds the remaining switches. Ambiguities and
//! context sensitivities are reported to a [`DiagnosticListener`].

mod config;
mod listener;
mod mode;
pub mod parallel;
mod simulator;
mod stats;

pub use config::PredictionConfig;
pub use listener::{DiagnosticEvent, DiagnosticListener, RecordingListener, TracingListener};
pub use mode::PredictionMode;
pub use parallel::{BatchPredictor, PredictionRequest};
pub use simulator::ParserAtnSimulator;
pub use stats::PredictionStats;
