//! Lexer commands referenced by action transitions in lexer networks.

use std::fmt;

/// A command executed when a lexer rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LexerAction {
    Channel(i32),
    /// A user action, dispatched by rule and action index.
    Custom { rule_index: usize, action_index: usize },
    Mode(i32),
    More,
    PopMode,
    PushMode(i32),
    Skip,
    Type(i32),
}

impl LexerAction {
    /// Custom actions may observe the input position, so they cannot be
    /// hoisted to the end of the token.
    #[must_use]
    pub fn is_position_dependent(&self) -> bool {
        matches!(self, Self::Custom { .. })
    }
}

impl fmt::Display for LexerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(channel) => write!(f, "channel({channel})"),
            Self::Custom { rule_index, action_index } => write!(f, "custom({rule_index}, {action_index})"),
            Self::Mode(mode) => write!(f, "mode({mode})"),
            Self::More => write!(f, "more"),
            Self::PopMode => write!(f, "popMode"),
            Self::PushMode(mode) => write!(f, "pushMode({mode})"),
            Self::Skip => write!(f, "skip"),
            Self::Type(ty) => write!(f, "type({ty})"),
        }
    }
}
