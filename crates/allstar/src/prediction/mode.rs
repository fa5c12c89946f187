use crate::INVALID_ALT;
use crate::bitset::BitSet;
use crate::config::AtnConfigSet;
use std::fmt;

/// How hard prediction works to resolve a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PredictionMode {
    /// Local-context prediction only. A conflict resolves to its minimum
    /// alternative without consulting the caller stack. Fastest, but may
    /// choose wrongly for grammars that are not SLL.
    Sll,
    /// SLL first, then full-context prediction when SLL conflicts in a way
    /// the caller stack could resolve.
    #[default]
    Ll,
    /// Like [`Ll`](Self::Ll), but full-context prediction keeps going until
    /// a conflict is exact, so every reported ambiguity is a real one.
    LlExactAmbigDetection,
}

impl PredictionMode {
    #[must_use]
    pub fn is_sll(self) -> bool {
        self == Self::Sll
    }

    #[must_use]
    pub fn requires_exact_conflicts(self) -> bool {
        self == Self::LlExactAmbigDetection
    }
}

impl fmt::Display for PredictionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sll => "SLL",
            Self::Ll => "LL",
            Self::LlExactAmbigDetection => "LL_EXACT_AMBIG_DETECTION",
        };
        f.write_str(name)
    }
}

/// The alternatives an accept state chooses between: its conflicting
/// alternatives, or its unique alternative.
pub(crate) fn conflicting_alts_or_unique(configs: &AtnConfigSet) -> BitSet {
    if let Some(alts) = configs.conflicting_alts() {
        return alts.clone();
    }
    if configs.unique_alt() != INVALID_ALT {
        return BitSet::singleton(configs.unique_alt());
    }
    BitSet::new()
}
