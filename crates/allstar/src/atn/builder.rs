//! Construction of networks, from raw states and edges or from grammar shapes.

use super::interval_set::IntervalSet;
use super::lexer_action::LexerAction;
use super::state::{AtnState, BlockKind, StateId, StateKind};
use super::transition::{Transition, TransitionKind};
use super::{Atn, GrammarType, RuleInfo, verify};
use crate::bitset::BitSet;
use crate::error::AtnError;

/// One alternative of a block: a sequence of elements.
pub type Alternative = Vec<Element>;

/// A grammar element, expanded into states by [`AtnBuilder::rule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Token(i32),
    Range(i32, i32),
    Set(IntervalSet),
    NotSet(IntervalSet),
    Wildcard,
    /// Invocation of another rule, with the precedence argument of a
    /// precedence rule (0 elsewhere).
    Rule { rule: usize, precedence: i32 },
    Predicate { pred_index: usize, is_ctx_dependent: bool },
    /// `{precpred(_ctx, n)}?` inside a precedence rule.
    Precedence(i32),
    Action { action_index: Option<usize>, is_ctx_dependent: bool },
    /// `( a | b )`
    Block(Vec<Alternative>),
    /// `( a | b )?`
    Optional { alternatives: Vec<Alternative>, greedy: bool },
    /// `( a | b )*`
    Star { alternatives: Vec<Alternative>, greedy: bool },
    /// `( a | b )+`
    Plus { alternatives: Vec<Alternative>, greedy: bool },
}

impl Element {
    #[must_use]
    pub fn token(symbol: i32) -> Self {
        Self::Token(symbol)
    }

    #[must_use]
    pub fn rule(rule: usize) -> Self {
        Self::Rule { rule, precedence: 0 }
    }

    #[must_use]
    pub fn rule_with_precedence(rule: usize, precedence: i32) -> Self {
        Self::Rule { rule, precedence }
    }

    #[must_use]
    pub fn predicate(pred_index: usize) -> Self {
        Self::Predicate { pred_index, is_ctx_dependent: false }
    }

    #[must_use]
    pub fn action(action_index: usize) -> Self {
        Self::Action { action_index: Some(action_index), is_ctx_dependent: false }
    }

    #[must_use]
    pub fn block(alternatives: Vec<Alternative>) -> Self {
        Self::Block(alternatives)
    }

    #[must_use]
    pub fn optional(alternatives: Vec<Alternative>) -> Self {
        Self::Optional { alternatives, greedy: true }
    }

    #[must_use]
    pub fn star(alternatives: Vec<Alternative>) -> Self {
        Self::Star { alternatives, greedy: true }
    }

    #[must_use]
    pub fn plus(alternatives: Vec<Alternative>) -> Self {
        Self::Plus { alternatives, greedy: true }
    }

    /// Turn a greedy subrule into its non-greedy form. Other elements are
    /// returned unchanged.
    #[must_use]
    pub fn non_greedy(self) -> Self {
        match self {
            Self::Optional { alternatives, .. } => Self::Optional { alternatives, greedy: false },
            Self::Star { alternatives, .. } => Self::Star { alternatives, greedy: false },
            Self::Plus { alternatives, .. } => Self::Plus { alternatives, greedy: false },
            other => other,
        }
    }
}

/// Entry and exit state of a sub-network.
#[derive(Debug, Clone, Copy)]
struct Handle {
    left: StateId,
    right: StateId,
}

/// Builder for [`Atn`].
///
/// ## Examples
///
/// ```rust
/// use allstar::atn::{AtnBuilder, Element};
///
/// const ID: i32 = 1;
/// const COMMA: i32 = 2;
///
/// // list : ID (COMMA ID)* ;
/// let mut builder = AtnBuilder::parser(2);
/// let list = builder.define_rule("list");
/// builder
///     .rule(list, vec![vec![
///         Element::token(ID),
///         Element::star(vec![vec![Element::token(COMMA), Element::token(ID)]]),
///     ]])
///     .unwrap();
/// let atn = builder.build().unwrap();
/// assert_eq!(atn.num_decisions(), 1);
/// ```
#[derive(Debug)]
pub struct AtnBuilder {
    grammar_type: GrammarType,
    max_token_type: i32,
    states: Vec<AtnState>,
    rules: Vec<RuleInfo>,
    has_body: Vec<bool>,
    decisions: Vec<StateId>,
    lexer_actions: Vec<LexerAction>,
}

impl AtnBuilder {
    /// Start a parser network whose tokens are `1..=max_token_type`.
    #[must_use]
    pub fn parser(max_token_type: i32) -> Self {
        Self::new(GrammarType::Parser, max_token_type)
    }

    /// Start a lexer network over code points `0..=max_char`.
    #[must_use]
    pub fn lexer(max_char: i32) -> Self {
        Self::new(GrammarType::Lexer, max_char)
    }

    fn new(grammar_type: GrammarType, max_token_type: i32) -> Self {
        Self {
            grammar_type,
            max_token_type,
            states: Vec::new(),
            rules: Vec::new(),
            has_body: Vec::new(),
            decisions: Vec::new(),
            lexer_actions: Vec::new(),
        }
    }

    // ---- low-level construction ----

    /// Append a state and return its id.
    pub fn add_state(&mut self, kind: StateKind, rule_index: usize) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(AtnState::new(id, rule_index, kind));
        id
    }

    /// Replace the kind of an existing state, e.g. to fill in the paired
    /// states of a block once they exist.
    pub fn set_state_kind(&mut self, state: StateId, kind: StateKind) -> Result<(), AtnError> {
        self.state_mut(state)?.kind = kind;
        Ok(())
    }

    pub fn add_transition(&mut self, from: StateId, transition: Transition) -> Result<(), AtnError> {
        self.check_state(transition.target)?;
        if let TransitionKind::Rule { follow_state, rule_index, .. } = &transition.kind {
            self.check_state(*follow_state)?;
            self.check_rule(*rule_index)?;
        }
        self.state_mut(from)?.transitions.push(transition);
        Ok(())
    }

    /// Assign the next decision number to `state`.
    pub fn define_decision(&mut self, state: StateId) -> Result<usize, AtnError> {
        let decision = self.decisions.len();
        let s = self.state_mut(state)?;
        if !s.kind.is_decision_kind() {
            return Err(AtnError::InvalidDecision { state, reason: "state kind cannot decide" });
        }
        if s.decision.is_some() {
            return Err(AtnError::InvalidDecision { state, reason: "already a decision" });
        }
        s.decision = Some(decision);
        self.decisions.push(state);
        Ok(decision)
    }

    /// Force SLL-only prediction for `decision`.
    pub fn mark_sll(&mut self, decision: usize) -> Result<(), AtnError> {
        let state = *self.decisions.get(decision).ok_or(AtnError::UnknownDecision { decision })?;
        self.state_mut(state)?.sll = true;
        Ok(())
    }

    pub fn add_lexer_action(&mut self, action: LexerAction) -> usize {
        self.lexer_actions.push(action);
        self.lexer_actions.len() - 1
    }

    /// Declare a rule and create its start and stop states. The body is
    /// supplied later, so rules may reference each other in any order.
    pub fn define_rule(&mut self, name: &str) -> usize {
        self.define_rule_impl(name, false, None)
    }

    /// Declare a rule produced by left-recursion elimination. Its loop
    /// decision is marked as a precedence decision during [`build`](Self::build).
    pub fn define_precedence_rule(&mut self, name: &str) -> usize {
        self.define_rule_impl(name, true, None)
    }

    /// Declare a lexer rule producing `token_type`.
    pub fn define_lexer_rule(&mut self, name: &str, token_type: i32) -> usize {
        self.define_rule_impl(name, false, Some(token_type))
    }

    fn define_rule_impl(&mut self, name: &str, is_precedence_rule: bool, token_type: Option<i32>) -> usize {
        let rule = self.rules.len();
        let stop = self.add_state(StateKind::RuleStop, rule);
        let start = self.add_state(StateKind::RuleStart { stop_state: stop, is_precedence_rule }, rule);
        self.rules.push(RuleInfo { name: name.to_string(), start, stop, token_type });
        self.has_body.push(false);
        rule
    }

    /// Start state of a declared rule.
    ///
    /// # Panics
    ///
    /// Panics if `rule` was not declared by this builder.
    #[must_use]
    pub fn rule_start(&self, rule: usize) -> StateId {
        self.rules[rule].start
    }

    /// Stop state of a declared rule.
    ///
    /// # Panics
    ///
    /// Panics if `rule` was not declared by this builder.
    #[must_use]
    pub fn rule_stop(&self, rule: usize) -> StateId {
        self.rules[rule].stop
    }

    /// Entry state of a lexer network choosing among `rules`. Returns its
    /// decision number.
    pub fn define_token_start(&mut self, rules: &[usize]) -> Result<usize, AtnError> {
        let start = self.add_state(StateKind::TokenStart, 0);
        for &rule in rules {
            self.check_rule(rule)?;
            let target = self.rules[rule].start;
            self.add_transition(start, Transition::epsilon(target))?;
        }
        self.define_decision(start)
    }

    // ---- grammar shapes ----

    /// Build the body of `rule` from its alternatives.
    pub fn rule(&mut self, rule: usize, alternatives: Vec<Alternative>) -> Result<(), AtnError> {
        self.check_rule(rule)?;
        if self.has_body[rule] {
            return Err(AtnError::DuplicateRuleBody { name: self.rules[rule].name.clone() });
        }
        if alternatives.is_empty() {
            return Err(AtnError::EmptyRule { name: self.rules[rule].name.clone() });
        }
        let body = self.block(rule, &alternatives)?;
        let RuleInfo { start, stop, .. } = self.rules[rule];
        self.epsilon(start, body.left)?;
        self.epsilon(body.right, stop)?;
        self.has_body[rule] = true;
        Ok(())
    }

    fn element(&mut self, rule: usize, element: &Element) -> Result<Handle, AtnError> {
        let kind = match element {
            Element::Token(symbol) => TransitionKind::Atom(*symbol),
            Element::Range(start, stop) => TransitionKind::Range { start: *start, stop: *stop },
            Element::Set(set) => TransitionKind::Set(set.clone()),
            Element::NotSet(set) => TransitionKind::NotSet(set.clone()),
            Element::Wildcard => TransitionKind::Wildcard,
            Element::Rule { rule: callee, precedence } => {
                return self.rule_ref(rule, *callee, *precedence);
            }
            Element::Predicate { pred_index, is_ctx_dependent } => TransitionKind::Predicate {
                rule_index: rule,
                pred_index: *pred_index,
                is_ctx_dependent: *is_ctx_dependent,
            },
            Element::Precedence(precedence) => TransitionKind::Precedence { precedence: *precedence },
            Element::Action { action_index, is_ctx_dependent } => {
                if self.grammar_type == GrammarType::Lexer
                    && let Some(index) = action_index
                    && *index >= self.lexer_actions.len()
                {
                    return Err(AtnError::UnknownLexerAction { index: *index });
                }
                TransitionKind::Action {
                    rule_index: rule,
                    action_index: *action_index,
                    is_ctx_dependent: *is_ctx_dependent,
                }
            }
            Element::Block(alternatives) => return self.block(rule, alternatives),
            Element::Optional { alternatives, greedy } => return self.optional(rule, alternatives, *greedy),
            Element::Star { alternatives, greedy } => return self.star(rule, alternatives, *greedy),
            Element::Plus { alternatives, greedy } => return self.plus(rule, alternatives, *greedy),
        };
        let left = self.add_state(StateKind::Basic, rule);
        let right = self.add_state(StateKind::Basic, rule);
        self.add_transition(left, Transition::new(right, kind))?;
        Ok(Handle { left, right })
    }

    fn rule_ref(&mut self, rule: usize, callee: usize, precedence: i32) -> Result<Handle, AtnError> {
        self.check_rule(callee)?;
        let left = self.add_state(StateKind::Basic, rule);
        let right = self.add_state(StateKind::Basic, rule);
        let target = self.rules[callee].start;
        let call = TransitionKind::Rule { rule_index: callee, precedence, follow_state: right, tail_call: false };
        self.add_transition(left, Transition::new(target, call))?;
        Ok(Handle { left, right })
    }

    fn sequence(&mut self, rule: usize, elements: &[Element]) -> Result<Handle, AtnError> {
        if elements.is_empty() {
            let left = self.add_state(StateKind::Basic, rule);
            let right = self.add_state(StateKind::Basic, rule);
            self.epsilon(left, right)?;
            return Ok(Handle { left, right });
        }
        let mut handles = Vec::with_capacity(elements.len());
        for element in elements {
            handles.push(self.element(rule, element)?);
        }
        for pair in handles.windows(2) {
            self.epsilon(pair[0].right, pair[1].left)?;
        }
        Ok(Handle { left: handles[0].left, right: handles[handles.len() - 1].right })
    }

    fn alternatives_into(
        &mut self,
        rule: usize,
        alternatives: &[Alternative],
        start: StateId,
        end: StateId,
    ) -> Result<(), AtnError> {
        for alternative in alternatives {
            let alt = self.sequence(rule, alternative)?;
            self.epsilon(start, alt.left)?;
            self.epsilon(alt.right, end)?;
        }
        Ok(())
    }

    /// A plain block. A single alternative needs no decision and is inlined.
    fn block(&mut self, rule: usize, alternatives: &[Alternative]) -> Result<Handle, AtnError> {
        if alternatives.len() == 1 {
            return self.sequence(rule, &alternatives[0]);
        }
        let (start, end) = self.block_pair(rule, BlockKind::Basic);
        self.alternatives_into(rule, alternatives, start, end)?;
        self.define_decision(start)?;
        Ok(Handle { left: start, right: end })
    }

    fn optional(&mut self, rule: usize, alternatives: &[Alternative], greedy: bool) -> Result<Handle, AtnError> {
        let (start, end) = self.block_pair(rule, BlockKind::Basic);
        if !greedy {
            self.epsilon(start, end)?;
        }
        self.alternatives_into(rule, alternatives, start, end)?;
        if greedy {
            self.epsilon(start, end)?;
        }
        self.state_mut(start)?.non_greedy = !greedy;
        self.define_decision(start)?;
        Ok(Handle { left: start, right: end })
    }

    fn star(&mut self, rule: usize, alternatives: &[Alternative], greedy: bool) -> Result<Handle, AtnError> {
        let (block_start, block_end) = self.block_pair(rule, BlockKind::Star);
        self.alternatives_into(rule, alternatives, block_start, block_end)?;
        if alternatives.len() > 1 {
            self.define_decision(block_start)?;
        }

        let loop_back = self.add_state(StateKind::StarLoopBack, rule);
        let entry = self.add_state(
            StateKind::StarLoopEntry {
                loop_back,
                precedence_rule_decision: false,
                precedence_loopback_states: BitSet::new(),
            },
            rule,
        );
        let loop_end = self.add_state(StateKind::LoopEnd { loop_back }, rule);
        self.state_mut(entry)?.non_greedy = !greedy;
        self.define_decision(entry)?;

        if greedy {
            self.epsilon(entry, block_start)?;
            self.epsilon(entry, loop_end)?;
        } else {
            self.epsilon(entry, loop_end)?;
            self.epsilon(entry, block_start)?;
        }
        self.epsilon(block_end, loop_back)?;
        self.epsilon(loop_back, entry)?;
        Ok(Handle { left: entry, right: loop_end })
    }

    fn plus(&mut self, rule: usize, alternatives: &[Alternative], greedy: bool) -> Result<Handle, AtnError> {
        let loop_back = self.add_state(StateKind::PlusLoopBack, rule);
        let (block_start, block_end) = self.block_pair(rule, BlockKind::Plus { loop_back });
        self.alternatives_into(rule, alternatives, block_start, block_end)?;
        if alternatives.len() > 1 {
            self.define_decision(block_start)?;
        }

        let loop_end = self.add_state(StateKind::LoopEnd { loop_back }, rule);
        self.state_mut(loop_back)?.non_greedy = !greedy;
        self.define_decision(loop_back)?;

        self.epsilon(block_end, loop_back)?;
        if greedy {
            self.epsilon(loop_back, block_start)?;
            self.epsilon(loop_back, loop_end)?;
        } else {
            self.epsilon(loop_back, loop_end)?;
            self.epsilon(loop_back, block_start)?;
        }
        Ok(Handle { left: block_start, right: loop_end })
    }

    fn block_pair(&mut self, rule: usize, block: BlockKind) -> (StateId, StateId) {
        let start = self.add_state(StateKind::Basic, rule);
        let end = self.add_state(StateKind::BlockEnd { start_state: start }, rule);
        self.states[start.index()].kind = StateKind::BlockStart { block, end_state: end };
        (start, end)
    }

    fn epsilon(&mut self, from: StateId, to: StateId) -> Result<(), AtnError> {
        self.add_transition(from, Transition::epsilon(to))
    }

    fn check_state(&self, state: StateId) -> Result<(), AtnError> {
        if state.index() < self.states.len() { Ok(()) } else { Err(AtnError::UnknownState { state }) }
    }

    fn check_rule(&self, rule: usize) -> Result<(), AtnError> {
        if rule < self.rules.len() { Ok(()) } else { Err(AtnError::UnknownRule { rule }) }
    }

    fn state_mut(&mut self, state: StateId) -> Result<&mut AtnState, AtnError> {
        self.states.get_mut(state.index()).ok_or(AtnError::UnknownState { state })
    }

    // ---- finishing ----

    /// Run the post-processing passes, verify the network and attach empty
    /// prediction caches.
    pub fn build(mut self) -> Result<Atn, AtnError> {
        for (rule, info) in self.rules.iter().enumerate() {
            if self.states[info.start.index()].transitions.is_empty() {
                return Err(AtnError::EmptyRule { name: self.rules[rule].name.clone() });
            }
        }
        self.link_rule_stop_states();
        self.compute_epsilon_flags();
        self.mark_tail_calls();
        self.mark_precedence_decisions();

        let atn = Atn::from_parts(
            self.grammar_type,
            self.max_token_type,
            self.states,
            self.rules,
            self.decisions,
            self.lexer_actions,
        );
        verify::verify_atn(&atn)?;
        tracing::debug!(
            states = atn.states().len(),
            rules = atn.num_rules(),
            decisions = atn.num_decisions(),
            "built network"
        );
        Ok(atn)
    }

    /// Each rule-stop state gets an epsilon edge to the follow state of every
    /// invocation of its rule.
    fn link_rule_stop_states(&mut self) {
        let mut links = Vec::new();
        for state in &self.states {
            for transition in &state.transitions {
                if let TransitionKind::Rule { rule_index, precedence, follow_state, .. } = transition.kind {
                    let is_precedence_rule = matches!(
                        self.states[self.rules[rule_index].start.index()].kind,
                        StateKind::RuleStart { is_precedence_rule: true, .. }
                    );
                    let outermost = (is_precedence_rule && precedence == 0).then_some(rule_index);
                    links.push((self.rules[rule_index].stop, follow_state, outermost));
                }
            }
        }
        for (stop, follow, outermost_precedence_return) in links {
            self.states[stop.index()].transitions.push(Transition::new(
                follow,
                TransitionKind::Epsilon { outermost_precedence_return },
            ));
        }
    }

    fn compute_epsilon_flags(&mut self) {
        for state in &mut self.states {
            state.epsilon_only =
                !state.transitions.is_empty() && state.transitions.iter().all(Transition::is_epsilon);
        }
    }

    fn mark_tail_calls(&mut self) {
        let mut tail_calls = Vec::new();
        for state in &self.states {
            for (index, transition) in state.transitions.iter().enumerate() {
                if let TransitionKind::Rule { follow_state, .. } = transition.kind
                    && self.only_epsilon_to_rule_end(follow_state)
                {
                    tail_calls.push((state.id, index));
                }
            }
        }
        for (state, index) in tail_calls {
            if let TransitionKind::Rule { tail_call, .. } = &mut self.states[state.index()].transitions[index].kind {
                *tail_call = true;
            }
        }
    }

    fn only_epsilon_to_rule_end(&self, follow_state: StateId) -> bool {
        let mut visited = BitSet::new();
        let mut worklist = vec![follow_state];
        while let Some(id) = worklist.pop() {
            if !visited.insert(id.index()) {
                continue;
            }
            let state = &self.states[id.index()];
            if state.is_rule_stop() {
                continue;
            }
            if !state.epsilon_only {
                return false;
            }
            for transition in &state.transitions {
                if !matches!(transition.kind, TransitionKind::Epsilon { .. }) {
                    return false;
                }
                worklist.push(transition.target);
            }
        }
        true
    }

    fn mark_precedence_decisions(&mut self) {
        let mut marks = Vec::new();
        for state in &self.states {
            if !matches!(state.kind, StateKind::StarLoopEntry { .. }) {
                continue;
            }
            let rule = &self.rules[state.rule_index];
            let is_precedence_rule = matches!(
                self.states[rule.start.index()].kind,
                StateKind::RuleStart { is_precedence_rule: true, .. }
            );
            if !is_precedence_rule {
                continue;
            }
            let Some(exit) = state.transitions.last() else { continue };
            let loop_end = &self.states[exit.target.index()];
            let exits_rule = matches!(loop_end.kind, StateKind::LoopEnd { .. })
                && loop_end.epsilon_only
                && self.states[loop_end.transitions[0].target.index()].is_rule_stop();
            if !exits_rule {
                continue;
            }
            let loopback_states: BitSet = self.states[rule.stop.index()]
                .transitions
                .iter()
                .filter(|t| matches!(t.kind, TransitionKind::Epsilon { outermost_precedence_return: None }))
                .map(|t| t.target.index())
                .collect();
            marks.push((state.id, loopback_states));
        }
        for (state, loopback_states) in marks {
            if let StateKind::StarLoopEntry { precedence_rule_decision, precedence_loopback_states, .. } =
                &mut self.states[state.index()].kind
            {
                *precedence_rule_decision = true;
                *precedence_loopback_states = loopback_states;
            }
        }
    }
}
