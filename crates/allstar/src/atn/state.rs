//! ATN states.

use super::transition::Transition;
use crate::bitset::BitSet;
use std::fmt;

/// Index of a state in its network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StateId(pub u32);

impl StateId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flavor of a block-start state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// `( a | b )` or `( a | b )?`
    Basic,
    /// The block inside `( ... )*`.
    Star,
    /// The block inside `( ... )+`, with the loop-back state deciding repetition.
    Plus { loop_back: StateId },
}

/// The structural role of a state, with the states it is paired with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateKind {
    Basic,
    RuleStart {
        stop_state: StateId,
        is_precedence_rule: bool,
    },
    RuleStop,
    BlockStart {
        block: BlockKind,
        end_state: StateId,
    },
    BlockEnd {
        start_state: StateId,
    },
    StarLoopEntry {
        loop_back: StateId,
        /// Set on the loop entry of a left-recursion-eliminated rule.
        precedence_rule_decision: bool,
        /// Follow states of the recursive invocations inside the loop.
        precedence_loopback_states: BitSet,
    },
    StarLoopBack,
    PlusLoopBack,
    LoopEnd {
        loop_back: StateId,
    },
    /// Entry state of a lexer ATN; decides between token rules.
    TokenStart,
}

impl StateKind {
    /// Short name used in DFA and state dumps.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic => "BASIC",
            Self::RuleStart { .. } => "RULE_START",
            Self::RuleStop => "RULE_STOP",
            Self::BlockStart { block: BlockKind::Basic, .. } => "BLOCK_START",
            Self::BlockStart { block: BlockKind::Star, .. } => "STAR_BLOCK_START",
            Self::BlockStart { block: BlockKind::Plus { .. }, .. } => "PLUS_BLOCK_START",
            Self::BlockEnd { .. } => "BLOCK_END",
            Self::StarLoopEntry { .. } => "STAR_LOOP_ENTRY",
            Self::StarLoopBack => "STAR_LOOP_BACK",
            Self::PlusLoopBack => "PLUS_LOOP_BACK",
            Self::LoopEnd { .. } => "LOOP_END",
            Self::TokenStart => "TOKEN_START",
        }
    }

    /// Kinds that may carry a decision number.
    #[must_use]
    pub fn is_decision_kind(&self) -> bool {
        matches!(
            self,
            Self::BlockStart { .. } | Self::StarLoopEntry { .. } | Self::PlusLoopBack | Self::TokenStart
        )
    }
}

/// A node of the network.
#[derive(Debug, Clone)]
pub struct AtnState {
    pub(crate) id: StateId,
    pub(crate) rule_index: usize,
    pub(crate) kind: StateKind,
    pub(crate) decision: Option<usize>,
    pub(crate) non_greedy: bool,
    pub(crate) sll: bool,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) epsilon_only: bool,
}

impl AtnState {
    pub(crate) fn new(id: StateId, rule_index: usize, kind: StateKind) -> Self {
        Self {
            id,
            rule_index,
            kind,
            decision: None,
            non_greedy: false,
            sll: false,
            transitions: Vec::new(),
            epsilon_only: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> StateId {
        self.id
    }

    #[must_use]
    pub fn rule_index(&self) -> usize {
        self.rule_index
    }

    #[must_use]
    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    /// Decision number, for decision states.
    #[must_use]
    pub fn decision(&self) -> Option<usize> {
        self.decision
    }

    #[must_use]
    pub fn is_non_greedy(&self) -> bool {
        self.non_greedy
    }

    /// Whether the decision was marked to always use SLL prediction.
    #[must_use]
    pub fn is_sll(&self) -> bool {
        self.sll
    }

    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    #[must_use]
    pub fn transition(&self, index: usize) -> &Transition {
        &self.transitions[index]
    }

    #[must_use]
    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    /// True when every outgoing transition is an epsilon-class transition.
    #[must_use]
    pub fn only_has_epsilon_transitions(&self) -> bool {
        self.epsilon_only
    }

    #[must_use]
    pub fn is_rule_stop(&self) -> bool {
        matches!(self.kind, StateKind::RuleStop)
    }

    /// State number used for conflict ordering; rule-stop states sort first.
    #[must_use]
    pub fn non_stop_state_number(&self) -> i64 {
        if self.is_rule_stop() { -1 } else { i64::from(self.id.0) }
    }
}

impl fmt::Display for AtnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
