//! Property-based tests for contexts and prediction.

mod common;

use allstar::atn::{Atn, AtnBuilder, Element};
use allstar::context::{PredictionContext, PredictionContextCache};
use allstar::prediction::{ParserAtnSimulator, PredictionConfig};
use allstar::semantic::NoopEvaluator;
use allstar::stream::VecTokenStream;
use allstar::StateId;
use proptest::prelude::*;
use std::sync::Arc;

/// A full context holding exactly the given stacks (top of stack first).
fn context_of(stacks: &[Vec<u32>]) -> Arc<PredictionContext> {
    let mut cache = PredictionContextCache::new();
    let mut result: Option<Arc<PredictionContext>> = None;
    for stack in stacks {
        let mut context = PredictionContext::empty_full();
        for &return_state in stack.iter().rev() {
            context = context.get_child(StateId(return_state));
        }
        result = Some(match result {
            Some(existing) => PredictionContext::join(&existing, &context, &mut cache),
            None => context,
        });
    }
    result.unwrap_or_else(PredictionContext::empty_full)
}

fn stacks() -> impl Strategy<Value = Vec<Vec<u32>>> {
    prop::collection::vec(prop::collection::vec(1u32..6, 0..4), 1..4)
}

/// Stacks, or `None` for the local-empty context.
fn operand() -> impl Strategy<Value = Option<Vec<Vec<u32>>>> {
    prop::option::weighted(0.8, stacks())
}

fn operand_context(operand: &Option<Vec<Vec<u32>>>) -> Arc<PredictionContext> {
    match operand {
        Some(stacks) => context_of(stacks),
        None => PredictionContext::empty_local(),
    }
}

proptest! {
    #[test]
    fn join_is_idempotent(a in operand()) {
        let mut cache = PredictionContextCache::new();
        let a = operand_context(&a);
        prop_assert_eq!(PredictionContext::join(&a, &a, &mut cache), a);
    }

    #[test]
    fn join_is_commutative(a in operand(), b in operand()) {
        let mut cache = PredictionContextCache::new();
        let (a, b) = (operand_context(&a), operand_context(&b));
        let ab = PredictionContext::join(&a, &b, &mut cache);
        let ba = PredictionContext::join(&b, &a, &mut cache);
        prop_assert_eq!(ab, ba);
    }

    #[test]
    fn join_is_associative(a in operand(), b in operand(), c in operand()) {
        let mut cache = PredictionContextCache::new();
        let (a, b, c) = (operand_context(&a), operand_context(&b), operand_context(&c));
        let ab = PredictionContext::join(&a, &b, &mut cache);
        let left = PredictionContext::join(&ab, &c, &mut cache);
        let bc = PredictionContext::join(&b, &c, &mut cache);
        let right = PredictionContext::join(&a, &bc, &mut cache);
        prop_assert_eq!(left, right);
    }

    #[test]
    fn join_absorbs_its_inputs(a in operand(), b in operand()) {
        let mut cache = PredictionContextCache::new();
        let (a, b) = (operand_context(&a), operand_context(&b));
        let ab = PredictionContext::join(&a, &b, &mut cache);
        prop_assert_eq!(PredictionContext::join(&ab, &a, &mut cache), ab.clone());
        prop_assert_eq!(PredictionContext::join(&ab, &b, &mut cache), ab);
    }

    #[test]
    fn join_matches_union_of_stacks(a in stacks(), b in stacks()) {
        let mut cache = PredictionContextCache::new();
        let joined = PredictionContext::join(&context_of(&a), &context_of(&b), &mut cache);
        let union: Vec<Vec<u32>> = a.iter().chain(&b).cloned().collect();
        prop_assert_eq!(joined, context_of(&union));
    }

    #[test]
    fn local_empty_join_adds_the_empty_path(a in stacks()) {
        prop_assume!(a.iter().any(|stack| !stack.is_empty()));
        let mut cache = PredictionContextCache::new();
        let joined = PredictionContext::join(&PredictionContext::empty_local(), &context_of(&a), &mut cache);
        let with_empty: Vec<Vec<u32>> = a.iter().cloned().chain([Vec::new()]).collect();
        prop_assert_eq!(joined, context_of(&with_empty));
    }
}

const P: i32 = 1;
const Q: i32 = 2;
const X: i32 = 3;
const Y: i32 = 4;
const Z: i32 = 5;

/// ```text
/// s : a X | a Y | b ;
/// a : (P Q)* ;
/// b : P+ Z ;
/// ```
fn loop_grammar() -> (Arc<Atn>, Vec<usize>) {
    let mut builder = AtnBuilder::parser(5);
    let s = builder.define_rule("s");
    let a = builder.define_rule("a");
    let b = builder.define_rule("b");
    builder
        .rule(
            s,
            vec![
                vec![Element::rule(a), Element::token(X)],
                vec![Element::rule(a), Element::token(Y)],
                vec![Element::rule(b)],
            ],
        )
        .unwrap();
    builder.rule(a, vec![vec![Element::star(vec![vec![Element::token(P), Element::token(Q)]])]]).unwrap();
    builder.rule(b, vec![vec![Element::plus(vec![vec![Element::token(P)]]), Element::token(Z)]]).unwrap();
    let atn = builder.build().unwrap();
    let decisions = (0..atn.num_decisions()).collect();
    (Arc::new(atn), decisions)
}

fn predict_all(simulator: &mut ParserAtnSimulator, decisions: &[usize], symbols: &[i32]) -> Vec<Option<usize>> {
    decisions
        .iter()
        .map(|&decision| {
            let mut input = VecTokenStream::new(symbols.to_vec());
            simulator.adaptive_predict(&mut input, decision, None, &NoopEvaluator).ok()
        })
        .collect()
}

fn symbols() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(prop::sample::select(vec![P, Q, X, Y, Z]), 0..8)
}

proptest! {
    #[test]
    fn warm_cache_agrees_with_cold(inputs in prop::collection::vec(symbols(), 1..12)) {
        let (warm_atn, decisions) = loop_grammar();
        let mut warm = ParserAtnSimulator::new(warm_atn);
        for symbols in &inputs {
            let warm_result = predict_all(&mut warm, &decisions, symbols);
            let (cold_atn, _) = loop_grammar();
            let cold_result = predict_all(&mut ParserAtnSimulator::new(cold_atn), &decisions, symbols);
            prop_assert_eq!(warm_result, cold_result, "input {:?}", symbols);
        }
    }

    #[test]
    fn tail_calls_do_not_change_predictions(symbols in prop::collection::vec(prop::sample::select(vec![common::A, common::B]), 0..5)) {
        let with_tail_calls = common::context_grammar();
        let without_tail_calls = common::context_grammar();
        let mut optimized = ParserAtnSimulator::new(Arc::clone(&with_tail_calls.atn));
        let config = PredictionConfig { optimize_tail_calls: false, ..PredictionConfig::default() };
        let mut plain = ParserAtnSimulator::with_config(Arc::clone(&without_tail_calls.atn), config);

        let pairs = [
            (&with_tail_calls.from_b, &without_tail_calls.from_b),
            (&with_tail_calls.from_c, &without_tail_calls.from_c),
        ];
        for (optimized_outer, plain_outer) in pairs {
            let mut input = VecTokenStream::new(symbols.clone());
            let expected = plain
                .adaptive_predict(&mut input, without_tail_calls.decision, Some(plain_outer), &NoopEvaluator)
                .ok();
            let mut input = VecTokenStream::new(symbols.clone());
            let actual = optimized
                .adaptive_predict(&mut input, with_tail_calls.decision, Some(optimized_outer), &NoopEvaluator)
                .ok();
            prop_assert_eq!(actual, expected, "input {:?}", symbols);
        }
    }

    #[test]
    fn tail_calls_do_not_change_caller_predicates(
        symbols in prop::collection::vec(prop::sample::select(vec![common::A, common::B]), 0..4),
        p0 in any::<bool>(),
    ) {
        let with_tail_calls = common::tail_call_grammar();
        let without_tail_calls = common::tail_call_grammar();
        let evaluator = common::TableEvaluator::predicates(&[p0]);
        let root = allstar::context::RuleContext::root();
        let mut optimized = ParserAtnSimulator::new(Arc::clone(&with_tail_calls.atn));
        let config = PredictionConfig { optimize_tail_calls: false, ..PredictionConfig::default() };
        let mut plain = ParserAtnSimulator::with_config(Arc::clone(&without_tail_calls.atn), config);

        let outers = [
            (Some(&with_tail_calls.outer), Some(&without_tail_calls.outer)),
            (Some(&root), Some(&root)),
            (None, None),
        ];
        for (optimized_outer, plain_outer) in outers {
            let mut input = VecTokenStream::new(symbols.clone());
            let expected = plain.adaptive_predict(&mut input, without_tail_calls.decision, plain_outer.map(|v| &**v), &evaluator).ok();
            let mut input = VecTokenStream::new(symbols.clone());
            let actual =
                optimized.adaptive_predict(&mut input, with_tail_calls.decision, optimized_outer.map(|v| &**v), &evaluator).ok();
            prop_assert_eq!(actual, expected, "input {:?} p0 {}", symbols, p0);
        }
    }
}
