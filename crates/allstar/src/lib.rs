//! # Allstar
//!
//! Adaptive LL(*) prediction for parsers driven by an augmented transition
//! network (ATN).
//!
//! ## Overview
//!
//! A generated parser reaches a decision point, hands the token stream to the
//! [`ParserAtnSimulator`], and receives the number of the alternative to take.
//! Prediction runs in two stages:
//!
//! - **SLL**: a fast simulation that ignores the caller stack and merges all
//!   possible return sites. Most decisions resolve here.
//! - **LL**: when SLL reports a conflict that the real caller stack could
//!   resolve, prediction restarts with the full stack.
//!
//! Every simulation result is memoized in a per-decision [`Dfa`], so repeated
//! predictions on similar input become table lookups. The caches live in the
//! [`Atn`] and are shared by every simulator (and thread) using that network.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use allstar::atn::{AtnBuilder, Element};
//! use allstar::prediction::ParserAtnSimulator;
//! use allstar::semantic::NoopEvaluator;
//! use allstar::stream::VecTokenStream;
//!
//! const A: i32 = 1;
//! const B: i32 = 2;
//!
//! // stat : A | B ;
//! let mut builder = AtnBuilder::parser(2);
//! let stat = builder.define_rule("stat");
//! builder
//!     .rule(stat, vec![vec![Element::token(A)], vec![Element::token(B)]])
//!     .expect("rule body");
//! let atn = Arc::new(builder.build().expect("valid network"));
//!
//! let decision = atn.rule_decision(stat).expect("stat has a decision");
//! let mut simulator = ParserAtnSimulator::new(Arc::clone(&atn));
//! let mut input = VecTokenStream::new(vec![B]);
//! let alt = simulator
//!     .adaptive_predict(&mut input, decision, None, &NoopEvaluator)
//!     .expect("viable");
//! assert_eq!(alt, 2);
//! ```
//!
//! ## Modules
//!
//! - [`atn`] - The network, its states and transitions, and the builder
//! - [`context`] - Persistent prediction-context graphs
//! - [`semantic`] - Predicate trees and the evaluation hook
//! - [`config`] - ATN configurations and configuration sets
//! - [`dfa`] - The per-decision prediction cache
//! - [`prediction`] - The simulator, its configuration and diagnostics
//! - [`stream`] - The token-stream abstraction prediction reads from
//! - [`error`] - Error types

pub mod atn;
pub mod bitset;
pub mod config;
pub mod context;
pub mod dfa;
pub mod error;
pub mod prediction;
pub mod semantic;
pub mod stream;

pub use atn::{Atn, AtnBuilder, AtnState, Element, StateId, StateKind, Transition, TransitionKind};
pub use bitset::BitSet;
pub use config::{AtnConfig, AtnConfigSet, ConflictInfo};
pub use context::{PredictionContext, PredictionContextCache, RuleContext};
pub use dfa::{Dfa, DfaState, DfaStateId, PredPrediction};
pub use error::{AtnError, PredictionError};
pub use prediction::{
    BatchPredictor, DiagnosticEvent, DiagnosticListener, ParserAtnSimulator, PredictionConfig, PredictionMode,
    PredictionRequest, PredictionStats, RecordingListener, TracingListener,
};
pub use semantic::{NoopEvaluator, PredicateEvaluator, SemanticContext};
pub use stream::{TokenStream, VecTokenStream};

/// Token type of the end-of-file symbol.
pub const EOF: i32 = -1;

/// Pseudo token type marking "rule end reached" in lookahead sets.
pub const EPSILON: i32 = -2;

/// Token type 0 is never produced by a lexer.
pub const INVALID_TOKEN_TYPE: i32 = 0;

/// Smallest token type a grammar may define.
pub const MIN_USER_TOKEN_TYPE: i32 = 1;

/// Alternative numbers start at 1; 0 means "no alternative".
pub const INVALID_ALT: usize = 0;
