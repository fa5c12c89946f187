//! Structural checks run once when a network is built.

use super::state::{BlockKind, StateKind};
use super::transition::TransitionKind;
use super::{Atn, GrammarType, StateId};
use crate::bitset::BitSet;
use crate::error::AtnError;

pub(crate) fn verify_atn(atn: &Atn) -> Result<(), AtnError> {
    for state in atn.states() {
        let id = state.id();
        let malformed = |reason| Err(AtnError::Malformed { state: id, reason });

        if !state.only_has_epsilon_transitions() && state.num_transitions() > 1 {
            return malformed("consuming state with more than one transition");
        }
        if state.kind().is_decision_kind() {
            if state.num_transitions() > 1 && state.decision().is_none() {
                return malformed("branching decision state without a decision number");
            }
        } else if state.num_transitions() > 1 && !state.is_rule_stop() {
            return malformed("branching state that is not a decision");
        }

        for transition in state.transitions() {
            match &transition.kind {
                TransitionKind::Rule { rule_index, .. } => {
                    if transition.target != atn.rule_start(*rule_index) {
                        return malformed("rule transition does not target the rule's start state");
                    }
                }
                TransitionKind::Action { action_index: Some(index), .. }
                    if atn.grammar_type() == GrammarType::Lexer && *index >= atn.lexer_actions().len() =>
                {
                    return Err(AtnError::UnknownLexerAction { index: *index });
                }
                _ => {}
            }
        }

        let kind_of = |other: StateId| atn.state(other).kind();
        match state.kind() {
            StateKind::RuleStart { stop_state, .. } => {
                if *stop_state != atn.rule_stop(state.rule_index()) || !atn.state(*stop_state).is_rule_stop() {
                    return malformed("rule start is not paired with its rule's stop state");
                }
            }
            StateKind::BlockStart { block, end_state } => {
                if !matches!(kind_of(*end_state), StateKind::BlockEnd { start_state } if *start_state == id) {
                    return malformed("block start is not paired with a block end");
                }
                if let BlockKind::Plus { loop_back } = block
                    && !matches!(kind_of(*loop_back), StateKind::PlusLoopBack)
                {
                    return malformed("plus block without a plus loop-back state");
                }
            }
            StateKind::BlockEnd { start_state } => {
                if !matches!(kind_of(*start_state), StateKind::BlockStart { .. }) {
                    return malformed("block end is not paired with a block start");
                }
            }
            StateKind::StarLoopEntry { loop_back, .. } => {
                if !matches!(kind_of(*loop_back), StateKind::StarLoopBack) {
                    return malformed("star loop entry without a star loop-back state");
                }
                if state.num_transitions() != 2 {
                    return malformed("star loop entry must have exactly two transitions");
                }
                let first = kind_of(state.transition(0).target);
                let second = kind_of(state.transition(1).target);
                let star_block = |k: &StateKind| matches!(k, StateKind::BlockStart { block: BlockKind::Star, .. });
                let loop_end = |k: &StateKind| matches!(k, StateKind::LoopEnd { .. });
                let well_formed = if star_block(first) {
                    loop_end(second) && !state.is_non_greedy()
                } else if loop_end(first) {
                    star_block(second) && state.is_non_greedy()
                } else {
                    false
                };
                if !well_formed {
                    return malformed("star loop entry edges do not match its greediness");
                }
            }
            StateKind::StarLoopBack => {
                if state.num_transitions() != 1
                    || !matches!(kind_of(state.transition(0).target), StateKind::StarLoopEntry { .. })
                {
                    return malformed("star loop-back must lead only to its loop entry");
                }
            }
            StateKind::LoopEnd { loop_back } => {
                if !matches!(kind_of(*loop_back), StateKind::StarLoopBack | StateKind::PlusLoopBack) {
                    return malformed("loop end without a loop-back state");
                }
            }
            StateKind::Basic | StateKind::RuleStop | StateKind::PlusLoopBack | StateKind::TokenStart => {}
        }
    }

    for decision in 0..atn.num_decisions() {
        let state = atn.decision_state(decision);
        if state.decision() != Some(decision) {
            return Err(AtnError::Malformed { state: state.id(), reason: "decision table out of sync" });
        }
    }

    check_left_recursion(atn)
}

/// Reject rules that can reach an invocation of themselves without
/// consuming a symbol. Closure would never terminate on them.
fn check_left_recursion(atn: &Atn) -> Result<(), AtnError> {
    let num_rules = atn.num_rules();

    let mut nullable = BitSet::new();
    loop {
        let mut changed = false;
        for rule in 0..num_rules {
            if nullable.contains(rule) {
                continue;
            }
            let (_, reaches_stop) = left_edge(atn, rule, &nullable);
            if reaches_stop {
                nullable.insert(rule);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let left_calls: Vec<BitSet> = (0..num_rules).map(|rule| left_edge(atn, rule, &nullable).0).collect();

    // depth-first search for a cycle in the left-call graph
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }
    let mut marks = vec![Mark::New; num_rules];
    for root in 0..num_rules {
        if marks[root] != Mark::New {
            continue;
        }
        let mut stack: Vec<(usize, Vec<usize>)> = vec![(root, left_calls[root].iter().collect())];
        marks[root] = Mark::Active;
        while let Some((rule, pending)) = stack.last_mut() {
            let rule = *rule;
            match pending.pop() {
                Some(callee) => match marks[callee] {
                    Mark::Active => {
                        let name = atn.rule_name(callee).unwrap_or_default().to_string();
                        return Err(AtnError::LeftRecursion { name });
                    }
                    Mark::New => {
                        marks[callee] = Mark::Active;
                        stack.push((callee, left_calls[callee].iter().collect()));
                    }
                    Mark::Done => {}
                },
                None => {
                    marks[rule] = Mark::Done;
                    stack.pop();
                }
            }
        }
    }
    Ok(())
}

/// Rules invoked before the first consumed symbol of `rule`, and whether
/// its stop state is reachable without consuming.
fn left_edge(atn: &Atn, rule: usize, nullable: &BitSet) -> (BitSet, bool) {
    let mut calls = BitSet::new();
    let mut reaches_stop = false;
    let mut visited = BitSet::new();
    let mut worklist = vec![atn.rule_start(rule)];
    while let Some(id) = worklist.pop() {
        if !visited.insert(id.index()) {
            continue;
        }
        let state = atn.state(id);
        if state.is_rule_stop() {
            reaches_stop = true;
            continue;
        }
        for transition in state.transitions() {
            match &transition.kind {
                TransitionKind::Rule { rule_index, follow_state, .. } => {
                    calls.insert(*rule_index);
                    if nullable.contains(*rule_index) {
                        worklist.push(*follow_state);
                    }
                }
                _ if transition.is_epsilon() => worklist.push(transition.target),
                _ => {}
            }
        }
    }
    (calls, reaches_stop)
}
