//! Context-free lookahead sets.

use super::interval_set::IntervalSet;
use super::transition::TransitionKind;
use super::{Atn, StateId};
use crate::bitset::BitSet;
use hashbrown::HashSet;

impl Atn {
    /// Symbols that can follow `state` within its rule, without knowledge of
    /// the caller. If the end of the rule is reachable, the set contains
    /// [`EPSILON`](crate::EPSILON).
    #[must_use]
    pub fn next_tokens(&self, state: StateId) -> IntervalSet {
        let mut look = IntervalSet::new();
        let mut visited = HashSet::new();
        let mut called_rules = BitSet::new();
        self.look(state, &mut Vec::new(), &mut look, &mut visited, &mut called_rules);
        look
    }

    fn look(
        &self,
        id: StateId,
        return_stack: &mut Vec<StateId>,
        look: &mut IntervalSet,
        visited: &mut HashSet<(StateId, Vec<StateId>)>,
        called_rules: &mut BitSet,
    ) {
        if !visited.insert((id, return_stack.clone())) {
            return;
        }
        let state = self.state(id);
        if state.is_rule_stop() {
            match return_stack.pop() {
                None => look.add(crate::EPSILON),
                Some(follow) => {
                    let removed = called_rules.remove(self.state(follow).rule_index());
                    self.look(follow, return_stack, look, visited, called_rules);
                    if removed {
                        called_rules.insert(self.state(follow).rule_index());
                    }
                    return_stack.push(follow);
                }
            }
            return;
        }

        for transition in state.transitions() {
            match &transition.kind {
                TransitionKind::Rule { rule_index, follow_state, .. } => {
                    if called_rules.contains(*rule_index) {
                        continue;
                    }
                    called_rules.insert(*rule_index);
                    return_stack.push(*follow_state);
                    self.look(transition.target, return_stack, look, visited, called_rules);
                    return_stack.pop();
                    called_rules.remove(*rule_index);
                }
                TransitionKind::Wildcard => look.add_range(crate::MIN_USER_TOKEN_TYPE, self.max_token_type()),
                TransitionKind::NotSet(set) => {
                    look.add_all(&set.complement(crate::MIN_USER_TOKEN_TYPE, self.max_token_type()));
                }
                _ if transition.is_epsilon() => {
                    self.look(transition.target, return_stack, look, visited, called_rules);
                }
                _ => {
                    if let Some(label) = transition.label() {
                        look.add_all(&label);
                    }
                }
            }
        }
    }
}
