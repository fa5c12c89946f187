//! # Semantic Contexts
//!
//! Boolean trees of semantic predicates attached to configurations.
//!
//! ## Overview
//!
//! When closure crosses a predicate transition at the decision's own rule
//! level, the predicate is conjoined onto the configuration's
//! [`SemanticContext`]. Prediction evaluates these trees only when input
//! alone cannot pick an alternative. Evaluation is delegated to the host
//! parser through [`PredicateEvaluator`].
//!
//! Precedence predicates (`{n >= _p}?`) are special: within one conjunction
//! only the lowest threshold matters, within one disjunction only the
//! highest, and they can be resolved against the parser's current
//! precedence level before the rest of the tree ([`SemanticContext::eval_precedence`]).

use crate::context::RuleContext;
use std::fmt;
use std::sync::{Arc, LazyLock};

static NONE: LazyLock<Arc<SemanticContext>> = LazyLock::new(|| Arc::new(SemanticContext::None));

/// Host hook that decides user predicates.
///
/// Implementations are called with the rule context the predicate should
/// observe. Context-independent predicates receive `None`.
pub trait PredicateEvaluator {
    /// Evaluate predicate `pred_index` of rule `rule_index`.
    fn sempred(&self, ctx: Option<&RuleContext>, rule_index: usize, pred_index: usize) -> bool;

    /// Evaluate a precedence predicate. The default compares against
    /// [`precedence`](Self::precedence).
    fn precpred(&self, ctx: &RuleContext, precedence: i32) -> bool {
        let _ = ctx;
        precedence >= self.precedence()
    }

    /// Precedence level of the innermost precedence rule being parsed, or
    /// -1 outside of one.
    fn precedence(&self) -> i32 {
        -1
    }
}

/// Evaluator for grammars without semantic predicates. Every predicate
/// holds, and the parser is never inside a precedence rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvaluator;

impl PredicateEvaluator for NoopEvaluator {
    fn sempred(&self, _ctx: Option<&RuleContext>, _rule_index: usize, _pred_index: usize) -> bool {
        true
    }
}

impl<T: PredicateEvaluator + ?Sized> PredicateEvaluator for &T {
    fn sempred(&self, ctx: Option<&RuleContext>, rule_index: usize, pred_index: usize) -> bool {
        (**self).sempred(ctx, rule_index, pred_index)
    }

    fn precpred(&self, ctx: &RuleContext, precedence: i32) -> bool {
        (**self).precpred(ctx, precedence)
    }

    fn precedence(&self) -> i32 {
        (**self).precedence()
    }
}

/// A predicate tree. Operand lists are flattened, sorted and free of
/// duplicates, so equal trees compare equal regardless of how they were
/// combined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SemanticContext {
    /// The predicate that always holds.
    None,
    Predicate {
        rule_index: usize,
        pred_index: usize,
        is_ctx_dependent: bool,
    },
    Precedence(i32),
    And(Box<[Arc<SemanticContext>]>),
    Or(Box<[Arc<SemanticContext>]>),
}

impl SemanticContext {
    /// The shared always-true context.
    #[must_use]
    pub fn none() -> Arc<Self> {
        Arc::clone(&NONE)
    }

    #[must_use]
    pub fn predicate(rule_index: usize, pred_index: usize, is_ctx_dependent: bool) -> Arc<Self> {
        Arc::new(Self::Predicate { rule_index, pred_index, is_ctx_dependent })
    }

    #[must_use]
    pub fn precedence(precedence: i32) -> Arc<Self> {
        Arc::new(Self::Precedence(precedence))
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Conjunction. `None` is the identity.
    #[must_use]
    pub fn and(a: &Arc<Self>, b: &Arc<Self>) -> Arc<Self> {
        if a.is_none() {
            return Arc::clone(b);
        }
        if b.is_none() {
            return Arc::clone(a);
        }
        Self::combine([a, b], true)
    }

    /// Disjunction. `None` absorbs.
    #[must_use]
    pub fn or(a: &Arc<Self>, b: &Arc<Self>) -> Arc<Self> {
        if a.is_none() || b.is_none() {
            return Self::none();
        }
        Self::combine([a, b], false)
    }

    fn combine(contexts: [&Arc<Self>; 2], conjunction: bool) -> Arc<Self> {
        let mut operands: Vec<Arc<Self>> = Vec::new();
        for context in contexts {
            match (&**context, conjunction) {
                (Self::And(nested), true) | (Self::Or(nested), false) => operands.extend(nested.iter().cloned()),
                _ => operands.push(Arc::clone(context)),
            }
        }

        let thresholds = operands.iter().filter_map(|o| match **o {
            Self::Precedence(p) => Some(p),
            _ => None,
        });
        let reduced = if conjunction { thresholds.min() } else { thresholds.max() };
        if let Some(precedence) = reduced {
            operands.retain(|o| !matches!(**o, Self::Precedence(_)));
            operands.push(Self::precedence(precedence));
        }

        operands.sort();
        operands.dedup();
        if operands.len() == 1 {
            return operands.swap_remove(0);
        }
        let operands = operands.into_boxed_slice();
        Arc::new(if conjunction { Self::And(operands) } else { Self::Or(operands) })
    }

    /// Evaluate the full tree in `ctx`.
    pub fn eval(&self, evaluator: &dyn PredicateEvaluator, ctx: &RuleContext) -> bool {
        match self {
            Self::None => true,
            Self::Predicate { rule_index, pred_index, is_ctx_dependent } => {
                let local = is_ctx_dependent.then_some(ctx);
                evaluator.sempred(local, *rule_index, *pred_index)
            }
            Self::Precedence(precedence) => evaluator.precpred(ctx, *precedence),
            Self::And(operands) => operands.iter().all(|o| o.eval(evaluator, ctx)),
            Self::Or(operands) => operands.iter().any(|o| o.eval(evaluator, ctx)),
        }
    }

    /// Resolve the precedence predicates in this tree against the parser's
    /// current precedence. Returns `None` if the tree became false, the
    /// always-true context if it became true, and otherwise the remaining
    /// tree. Trees without precedence predicates are returned as they are.
    #[must_use]
    pub fn eval_precedence(self: &Arc<Self>, evaluator: &dyn PredicateEvaluator, ctx: &RuleContext) -> Option<Arc<Self>> {
        match &**self {
            Self::None | Self::Predicate { .. } => Some(Arc::clone(self)),
            Self::Precedence(precedence) => evaluator.precpred(ctx, *precedence).then(Self::none),
            Self::And(operands) => {
                let mut differs = false;
                let mut remaining = Vec::new();
                for operand in operands.iter() {
                    let evaluated = operand.eval_precedence(evaluator, ctx)?;
                    differs |= !Arc::ptr_eq(&evaluated, operand);
                    if !evaluated.is_none() {
                        remaining.push(evaluated);
                    }
                }
                if !differs {
                    return Some(Arc::clone(self));
                }
                Some(remaining.iter().fold(Self::none(), |acc, o| Self::and(&acc, o)))
            }
            Self::Or(operands) => {
                let mut differs = false;
                let mut remaining = Vec::new();
                for operand in operands.iter() {
                    match operand.eval_precedence(evaluator, ctx) {
                        Some(evaluated) if evaluated.is_none() => return Some(evaluated),
                        Some(evaluated) => {
                            differs |= !Arc::ptr_eq(&evaluated, operand);
                            remaining.push(evaluated);
                        }
                        None => differs = true,
                    }
                }
                if !differs {
                    return Some(Arc::clone(self));
                }
                let mut remaining = remaining.into_iter();
                let first = remaining.next()?;
                Some(remaining.fold(first, |acc, o| Self::or(&acc, &o)))
            }
        }
    }
}

impl fmt::Display for SemanticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, operands: &[Arc<SemanticContext>], sep: &str) -> fmt::Result {
            for (i, operand) in operands.iter().enumerate() {
                if i > 0 {
                    write!(f, "{sep}")?;
                }
                write!(f, "{operand}")?;
            }
            Ok(())
        }
        match self {
            Self::None => write!(f, "true"),
            Self::Predicate { rule_index, pred_index, is_ctx_dependent } => {
                write!(f, "{{{rule_index}:{pred_index}}}?")?;
                if *is_ctx_dependent { write!(f, "@") } else { Ok(()) }
            }
            Self::Precedence(precedence) => write!(f, "{{{precedence}>=prec}}?"),
            Self::And(operands) => join(f, operands, "&&"),
            Self::Or(operands) => join(f, operands, "||"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recording {
        precedence: i32,
        calls: RefCell<Vec<(usize, usize, bool)>>,
        falsy: Vec<usize>,
    }

    impl PredicateEvaluator for Recording {
        fn sempred(&self, ctx: Option<&RuleContext>, rule_index: usize, pred_index: usize) -> bool {
            self.calls.borrow_mut().push((rule_index, pred_index, ctx.is_some()));
            !self.falsy.contains(&pred_index)
        }

        fn precedence(&self) -> i32 {
            self.precedence
        }
    }

    fn p(index: usize) -> Arc<SemanticContext> {
        SemanticContext::predicate(0, index, false)
    }

    #[test]
    fn test_and_or_identities() {
        let none = SemanticContext::none();
        assert_eq!(SemanticContext::and(&none, &p(1)), p(1));
        assert!(SemanticContext::or(&none, &p(1)).is_none());
        assert_eq!(SemanticContext::and(&p(1), &p(1)), p(1));
    }

    #[test]
    fn test_operands_flatten_and_sort() {
        let left = SemanticContext::and(&p(2), &p(1));
        let right = SemanticContext::and(&p(3), &p(1));
        let all = SemanticContext::and(&left, &right);
        let SemanticContext::And(operands) = &*all else { panic!("expected a conjunction") };
        assert_eq!(&operands[..], &[p(1), p(2), p(3)]);
        assert_eq!(SemanticContext::and(&p(1), &p(2)), SemanticContext::and(&p(2), &p(1)));
    }

    #[test]
    fn test_precedence_reduction() {
        let and = SemanticContext::and(&SemanticContext::precedence(3), &SemanticContext::precedence(5));
        assert_eq!(*and, SemanticContext::Precedence(3));
        let or = SemanticContext::or(&SemanticContext::precedence(3), &SemanticContext::precedence(5));
        assert_eq!(*or, SemanticContext::Precedence(5));
    }

    #[test]
    fn test_eval_passes_context_only_when_dependent() {
        let evaluator = Recording { falsy: vec![2], ..Recording::default() };
        let ctx = RuleContext::root();
        assert!(SemanticContext::predicate(4, 1, true).eval(&evaluator, &ctx));
        assert!(!p(2).eval(&evaluator, &ctx));
        assert_eq!(*evaluator.calls.borrow(), vec![(4, 1, true), (0, 2, false)]);
        assert!(!SemanticContext::and(&p(1), &p(2)).eval(&evaluator, &ctx));
        assert!(SemanticContext::or(&p(1), &p(2)).eval(&evaluator, &ctx));
    }

    #[test]
    fn test_eval_precedence() {
        let evaluator = Recording { precedence: 2, ..Recording::default() };
        let ctx = RuleContext::root();
        assert!(SemanticContext::precedence(3).eval_precedence(&evaluator, &ctx).unwrap().is_none());
        assert!(SemanticContext::precedence(1).eval_precedence(&evaluator, &ctx).is_none());

        let mixed = SemanticContext::and(&SemanticContext::precedence(2), &p(7));
        assert_eq!(mixed.eval_precedence(&evaluator, &ctx), Some(p(7)));

        let dead = SemanticContext::and(&SemanticContext::precedence(1), &p(7));
        assert_eq!(dead.eval_precedence(&evaluator, &ctx), None);

        let either = SemanticContext::or(&SemanticContext::precedence(1), &p(7));
        assert_eq!(either.eval_precedence(&evaluator, &ctx), Some(p(7)));

        let plain = p(7);
        assert!(Arc::ptr_eq(&plain.eval_precedence(&evaluator, &ctx).unwrap(), &plain));
        assert!(evaluator.calls.borrow().is_empty());
    }

    #[test]
    fn test_display() {
        let ctx = SemanticContext::and(&p(1), &SemanticContext::precedence(2));
        assert_eq!(ctx.to_string(), "{0:1}?&&{2>=prec}?");
    }
}
