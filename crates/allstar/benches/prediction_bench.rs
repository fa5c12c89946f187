use allstar::atn::{Atn, AtnBuilder, Element};
use allstar::context::RuleContext;
use allstar::prediction::{BatchPredictor, ParserAtnSimulator, PredictionConfig, PredictionRequest};
use allstar::semantic::{NoopEvaluator, PredicateEvaluator};
use allstar::stream::VecTokenStream;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

const A: i32 = 1;
const B: i32 = 2;
const C: i32 = 3;
const D: i32 = 4;

const INT: i32 = 1;
const PLUS: i32 = 2;
const STAR: i32 = 3;

/// `stat : A+ B | A+ C | D ;` so the decision needs unbounded lookahead.
fn setup_choice_grammar() -> (Arc<Atn>, usize) {
    let mut builder = AtnBuilder::parser(4);
    let stat = builder.define_rule("stat");
    builder
        .rule(
            stat,
            vec![
                vec![Element::plus(vec![vec![Element::token(A)]]), Element::token(B)],
                vec![Element::plus(vec![vec![Element::token(A)]]), Element::token(C)],
                vec![Element::token(D)],
            ],
        )
        .unwrap();
    let atn = builder.build().unwrap();
    let decision = atn.rule_decision(stat).unwrap();
    (Arc::new(atn), decision)
}

struct ContextSetup {
    atn: Arc<Atn>,
    decision: usize,
    from_b: Arc<RuleContext>,
    from_c: Arc<RuleContext>,
}

/// `s : C b | D c ; b : a A ; c : a B A ; a : B | ;`
fn setup_context_grammar() -> ContextSetup {
    let mut builder = AtnBuilder::parser(4);
    let s = builder.define_rule("s");
    let b = builder.define_rule("b");
    let c = builder.define_rule("c");
    let a = builder.define_rule("a");
    builder
        .rule(s, vec![vec![Element::token(C), Element::rule(b)], vec![Element::token(D), Element::rule(c)]])
        .unwrap();
    builder.rule(b, vec![vec![Element::rule(a), Element::token(A)]]).unwrap();
    builder.rule(c, vec![vec![Element::rule(a), Element::token(B), Element::token(A)]]).unwrap();
    builder.rule(a, vec![vec![Element::token(B)], vec![]]).unwrap();
    let atn = builder.build().unwrap();
    let decision = atn.rule_decision(a).unwrap();

    let root = RuleContext::root();
    let in_b = RuleContext::new(&root, atn.find_invocation(s, b).unwrap());
    let in_c = RuleContext::new(&root, atn.find_invocation(s, c).unwrap());
    let from_b = RuleContext::new(&in_b, atn.find_invocation(b, a).unwrap());
    let from_c = RuleContext::new(&in_c, atn.find_invocation(c, a).unwrap());
    ContextSetup { atn: Arc::new(atn), decision, from_b, from_c }
}

/// `s : e EOF ; e : INT ( {precpred 2}? STAR e[3] | {precpred 1}? PLUS e[2] )* ;`
fn setup_expression_grammar() -> (Arc<Atn>, usize, Arc<RuleContext>) {
    let mut builder = AtnBuilder::parser(3);
    let s = builder.define_rule("s");
    let e = builder.define_precedence_rule("e");
    builder.rule(s, vec![vec![Element::rule(e), Element::token(allstar::EOF)]]).unwrap();
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
    let atn = builder.build().unwrap();
    let decision = atn.decisions_in_rule(e).find(|&d| atn.dfa(d).is_precedence_dfa()).unwrap();
    let outer = RuleContext::new(&RuleContext::root(), atn.find_invocation(s, e).unwrap());
    (Arc::new(atn), decision, outer)
}

struct PrecedenceLevel(i32);

impl PredicateEvaluator for PrecedenceLevel {
    fn sempred(&self, _ctx: Option<&RuleContext>, _rule_index: usize, _pred_index: usize) -> bool {
        true
    }

    fn precedence(&self) -> i32 {
        self.0
    }
}

fn long_lookahead(len: usize, last: i32) -> Vec<i32> {
    let mut symbols = vec![A; len];
    symbols.push(last);
    symbols
}

fn bench_cold_prediction(c: &mut Criterion) {
    let (atn, decision) = setup_choice_grammar();
    let symbols = long_lookahead(32, C);

    c.bench_function("cold_prediction_lookahead_32", |b| {
        let mut simulator = ParserAtnSimulator::new(Arc::clone(&atn));
        b.iter(|| {
            simulator.clear_dfa();
            let mut input = VecTokenStream::new(symbols.clone());
            black_box(simulator.adaptive_predict(&mut input, decision, None, &NoopEvaluator).ok());
        });
    });
}

fn bench_warm_prediction(c: &mut Criterion) {
    let (atn, decision) = setup_choice_grammar();
    let symbols = long_lookahead(32, C);
    let mut simulator = ParserAtnSimulator::new(Arc::clone(&atn));
    let mut warmup = VecTokenStream::new(symbols.clone());
    let _ = simulator.adaptive_predict(&mut warmup, decision, None, &NoopEvaluator);

    c.bench_function("warm_prediction_lookahead_32", |b| {
        b.iter(|| {
            let mut input = VecTokenStream::new(symbols.clone());
            black_box(simulator.adaptive_predict(&mut input, decision, None, &NoopEvaluator).ok());
        });
    });
}

fn bench_full_context(c: &mut Criterion) {
    let setup = setup_context_grammar();
    let mut simulator = ParserAtnSimulator::new(Arc::clone(&setup.atn));

    c.bench_function("full_context_retry", |b| {
        b.iter(|| {
            for outer in [&setup.from_b, &setup.from_c] {
                let mut input = VecTokenStream::new(vec![B, A]);
                black_box(simulator.adaptive_predict(&mut input, setup.decision, Some(outer), &NoopEvaluator).ok());
            }
        });
    });

    let config = PredictionConfig { enable_global_context_dfa: true, ..PredictionConfig::default() };
    let mut simulator = ParserAtnSimulator::with_config(Arc::clone(&setup.atn), config);
    c.bench_function("full_context_retry_global_dfa", |b| {
        b.iter(|| {
            for outer in [&setup.from_b, &setup.from_c] {
                let mut input = VecTokenStream::new(vec![B, A]);
                black_box(simulator.adaptive_predict(&mut input, setup.decision, Some(outer), &NoopEvaluator).ok());
            }
        });
    });
}

fn bench_precedence_decision(c: &mut Criterion) {
    let (atn, decision, outer) = setup_expression_grammar();
    let mut simulator = ParserAtnSimulator::new(Arc::clone(&atn));

    c.bench_function("precedence_loop_levels", |b| {
        b.iter(|| {
            for level in 0..4 {
                for operator in [STAR, PLUS] {
                    let mut input = VecTokenStream::new(vec![operator, INT, allstar::EOF]);
                    black_box(
                        simulator
                            .adaptive_predict(&mut input, decision, Some(&outer), &PrecedenceLevel(level))
                            .ok(),
                    );
                }
            }
        });
    });
}

fn bench_batch_prediction(c: &mut Criterion) {
    let (atn, decision) = setup_choice_grammar();
    let requests: Vec<_> = (0..256)
        .map(|i| {
            let last = if i % 2 == 0 { B } else { C };
            PredictionRequest::new(decision, long_lookahead(1 + i % 16, last))
        })
        .collect();
    let predictor = BatchPredictor::new(Arc::clone(&atn));

    c.bench_function("batch_prediction_256", |b| {
        b.iter(|| {
            black_box(predictor.predict_all(black_box(&requests), &NoopEvaluator));
        });
    });
}

criterion_group!(
    benches,
    bench_cold_prediction,
    bench_warm_prediction,
    bench_full_context,
    bench_precedence_decision,
    bench_batch_prediction
);
criterion_main!(benches);
