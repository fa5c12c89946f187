#![no_main]
use allstar::atn::{Atn, AtnBuilder, Element};
use allstar::context::RuleContext;
use allstar::prediction::ParserAtnSimulator;
use allstar::semantic::NoopEvaluator;
use allstar::stream::VecTokenStream;
use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, OnceLock};

const A: i32 = 1;
const B: i32 = 2;
const C: i32 = 3;
const D: i32 = 4;

struct FuzzGrammar {
    atn: Arc<Atn>,
    callers: Vec<Arc<RuleContext>>,
}

/// ```text
/// s : C b | D c | (A B)* C ;
/// b : a A ;
/// c : a B A ;
/// a : B | ;
/// ```
fn grammar() -> Option<&'static FuzzGrammar> {
    static GRAMMAR: OnceLock<Option<FuzzGrammar>> = OnceLock::new();
    GRAMMAR
        .get_or_init(|| {
            let mut builder = AtnBuilder::parser(4);
            let s = builder.define_rule("s");
            let b = builder.define_rule("b");
            let c = builder.define_rule("c");
            let a = builder.define_rule("a");
            builder
                .rule(
                    s,
                    vec![
                        vec![Element::token(C), Element::rule(b)],
                        vec![Element::token(D), Element::rule(c)],
                        vec![Element::star(vec![vec![Element::token(A), Element::token(B)]]), Element::token(C)],
                    ],
                )
                .ok()?;
            builder.rule(b, vec![vec![Element::rule(a), Element::token(A)]]).ok()?;
            builder.rule(c, vec![vec![Element::rule(a), Element::token(B), Element::token(A)]]).ok()?;
            builder.rule(a, vec![vec![Element::token(B)], vec![]]).ok()?;
            let atn = builder.build().ok()?;

            let root = RuleContext::root();
            let in_b = RuleContext::new(&root, atn.find_invocation(s, b)?);
            let in_c = RuleContext::new(&root, atn.find_invocation(s, c)?);
            let callers = vec![
                RuleContext::new(&in_b, atn.find_invocation(b, a)?),
                RuleContext::new(&in_c, atn.find_invocation(c, a)?),
            ];
            Some(FuzzGrammar { atn: Arc::new(atn), callers })
        })
        .as_ref()
}

fuzz_target!(|data: &[u8]| {
    let Some(grammar) = grammar() else {
        return;
    };
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };

    let decisions = grammar.atn.num_decisions();
    if decisions == 0 {
        return;
    }
    let decision = usize::from(selector) % decisions;
    let outer = grammar.callers.get(usize::from(selector >> 4) % (grammar.callers.len() + 1));
    let symbols: Vec<i32> = rest
        .iter()
        .map(|&byte| match byte % 5 {
            0 => allstar::EOF,
            symbol => i32::from(symbol),
        })
        .collect();

    // A cold prediction and a warm one must agree, and neither may panic.
    let mut simulator = ParserAtnSimulator::new(Arc::clone(&grammar.atn));
    let mut input = VecTokenStream::new(symbols.clone());
    let cold = simulator.adaptive_predict(&mut input, decision, outer.map(Arc::as_ref), &NoopEvaluator).ok();
    let mut input = VecTokenStream::new(symbols);
    let warm = simulator.adaptive_predict(&mut input, decision, outer.map(Arc::as_ref), &NoopEvaluator).ok();
    assert_eq!(cold, warm);
});
