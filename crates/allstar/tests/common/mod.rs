//! Grammars shared by the integration tests.

#![allow(dead_code)]

use allstar::atn::{Atn, AtnBuilder, Element};
use allstar::context::RuleContext;
use allstar::semantic::PredicateEvaluator;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Route the crate's tracing output to the test harness. Set `RUST_LOG`
/// (for example `allstar=trace`) to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_test_writer().try_init();
}

pub const A: i32 = 1;
pub const B: i32 = 2;
pub const C: i32 = 3;
pub const D: i32 = 4;

/// `stat : A B | A C | D ;`
pub fn choice_grammar() -> (Arc<Atn>, usize) {
    let mut builder = AtnBuilder::parser(4);
    let stat = builder.define_rule("stat");
    builder
        .rule(
            stat,
            vec![
                vec![Element::token(A), Element::token(B)],
                vec![Element::token(A), Element::token(C)],
                vec![Element::token(D)],
            ],
        )
        .expect("stat");
    let atn = builder.build().expect("choice grammar");
    let decision = atn.rule_decision(stat).expect("stat decides");
    (Arc::new(atn), decision)
}

/// `s : r | ; r : ;` where no alternative consumes input.
pub fn nullable_grammar() -> (Arc<Atn>, usize) {
    let mut builder = AtnBuilder::parser(1);
    let s = builder.define_rule("s");
    let r = builder.define_rule("r");
    builder.rule(s, vec![vec![Element::rule(r)], vec![]]).expect("s");
    builder.rule(r, vec![vec![]]).expect("r");
    let atn = builder.build().expect("nullable grammar");
    let decision = atn.rule_decision(s).expect("s decides");
    (Arc::new(atn), decision)
}

/// `s : {p0}? A | {p1}? A | A ;` where `present` selects which alternatives
/// carry their predicate.
pub fn predicated_grammar(present: [bool; 3]) -> (Arc<Atn>, usize) {
    let mut builder = AtnBuilder::parser(1);
    let s = builder.define_rule("s");
    let alternatives = present
        .iter()
        .enumerate()
        .map(|(index, &guarded)| {
            if guarded { vec![Element::predicate(index), Element::token(A)] } else { vec![Element::token(A)] }
        })
        .collect();
    builder.rule(s, alternatives).expect("s");
    let atn = builder.build().expect("predicated grammar");
    let decision = atn.rule_decision(s).expect("s decides");
    (Arc::new(atn), decision)
}

/// The decision in `a` conflicts in SLL, and only the caller stack tells
/// which alternative is right.
///
/// ```text
/// s : C b | D c ;
/// b : a A ;
/// c : a B A ;
/// a : B | ;
/// ```
pub struct ContextGrammar {
    pub atn: Arc<Atn>,
    pub decision: usize,
    /// Caller stack inside `a` when `a` was called from `b`.
    pub from_b: Arc<RuleContext>,
    /// Caller stack inside `a` when `a` was called from `c`.
    pub from_c: Arc<RuleContext>,
}

pub fn context_grammar() -> ContextGrammar {
    let mut builder = AtnBuilder::parser(4);
    let s = builder.define_rule("s");
    let b = builder.define_rule("b");
    let c = builder.define_rule("c");
    let a = builder.define_rule("a");
    builder
        .rule(s, vec![vec![Element::token(C), Element::rule(b)], vec![Element::token(D), Element::rule(c)]])
        .expect("s");
    builder.rule(b, vec![vec![Element::rule(a), Element::token(A)]]).expect("b");
    builder.rule(c, vec![vec![Element::rule(a), Element::token(B), Element::token(A)]]).expect("c");
    builder.rule(a, vec![vec![Element::token(B)], vec![]]).expect("a");
    let atn = builder.build().expect("context grammar");
    let decision = atn.rule_decision(a).expect("a decides");

    let root = RuleContext::root();
    let in_b = RuleContext::new(&root, atn.find_invocation(s, b).expect("s calls b"));
    let in_c = RuleContext::new(&root, atn.find_invocation(s, c).expect("s calls c"));
    let from_b = RuleContext::new(&in_b, atn.find_invocation(b, a).expect("b calls a"));
    let from_c = RuleContext::new(&in_c, atn.find_invocation(c, a).expect("c calls a"));
    ContextGrammar { atn: Arc::new(atn), decision, from_b, from_c }
}

/// `r` is a nullable tail call of `s`, and `top` guards its first
/// alternative with a context-dependent predicate right after `s` returns.
///
/// ```text
/// top : s {p0}?@ A | s A ;
/// s : r | ;
/// r : ;
/// ```
pub struct TailCallGrammar {
    pub atn: Arc<Atn>,
    /// The decision in `s`.
    pub decision: usize,
    /// Caller stack inside `s` when `top` called it from the guarded
    /// alternative.
    pub outer: Arc<RuleContext>,
}

pub fn tail_call_grammar() -> TailCallGrammar {
    let mut builder = AtnBuilder::parser(1);
    let top = builder.define_rule("top");
    let s = builder.define_rule("s");
    let r = builder.define_rule("r");
    builder
        .rule(
            top,
            vec![
                vec![
                    Element::rule(s),
                    Element::Predicate { pred_index: 0, is_ctx_dependent: true },
                    Element::token(A),
                ],
                vec![Element::rule(s), Element::token(A)],
            ],
        )
        .expect("top");
    builder.rule(s, vec![vec![Element::rule(r)], vec![]]).expect("s");
    builder.rule(r, vec![vec![]]).expect("r");
    let atn = builder.build().expect("tail call grammar");
    let decision = atn.rule_decision(s).expect("s decides");
    let outer = RuleContext::new(&RuleContext::root(), atn.find_invocation(top, s).expect("top calls s"));
    TailCallGrammar { atn: Arc::new(atn), decision, outer }
}

pub const INT: i32 = 1;
pub const PLUS: i32 = 2;
pub const STAR: i32 = 3;

/// ```text
/// s : e EOF ;
/// e : INT ( {precpred 2}? STAR e[3] | {precpred 1}? PLUS e[2] )* ;
/// ```
///
/// Returns the network, `e`'s loop decision and the caller stack inside
/// the outermost `e`.
pub fn expression_grammar() -> (Arc<Atn>, usize, Arc<RuleContext>) {
    let mut builder = AtnBuilder::parser(3);
    let s = builder.define_rule("s");
    let e = builder.define_precedence_rule("e");
    builder.rule(s, vec![vec![Element::rule(e), Element::token(allstar::EOF)]]).expect("s");
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
        .expect("e");
    let atn = builder.build().expect("expression grammar");
    let decision = atn
        .decisions_in_rule(e)
        .find(|&d| atn.dfa(d).is_precedence_dfa())
        .expect("e has a precedence loop");
    let outer = RuleContext::new(&RuleContext::root(), atn.find_invocation(s, e).expect("s calls e"));
    (Arc::new(atn), decision, outer)
}

/// Answers user predicates from a fixed table and reports a fixed
/// precedence level.
#[derive(Debug, Clone, Default)]
pub struct TableEvaluator {
    pub predicates: Vec<bool>,
    pub precedence: i32,
}

impl TableEvaluator {
    pub fn predicates(predicates: &[bool]) -> Self {
        Self { predicates: predicates.to_vec(), precedence: -1 }
    }

    pub fn at_precedence(precedence: i32) -> Self {
        Self { predicates: Vec::new(), precedence }
    }
}

impl PredicateEvaluator for TableEvaluator {
    fn sempred(&self, _ctx: Option<&RuleContext>, _rule_index: usize, pred_index: usize) -> bool {
        self.predicates.get(pred_index).copied().unwrap_or(true)
    }

    fn precedence(&self) -> i32 {
        self.precedence
    }
}
