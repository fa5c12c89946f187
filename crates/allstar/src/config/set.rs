use super::AtnConfig;
use crate::INVALID_ALT;
use crate::atn::{Atn, StateId};
use crate::bitset::BitSet;
use crate::context::{ContextInterner, PredictionContextCache};
use crate::semantic::SemanticContext;
use ahash::RandomState;
use hashbrown::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Alternatives that cannot be told apart by the input seen so far.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConflictInfo {
    pub conflicted_alts: BitSet,
    /// The conflict holds in every parser context, not just the ones this
    /// set happens to cover.
    pub exact: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MergeKey {
    state: StateId,
    alt: usize,
    semantic_context: Arc<SemanticContext>,
}

/// The threads alive at one input position.
///
/// Adding a configuration whose state, alternative and semantic context
/// match an existing one joins the two call stacks instead of storing a
/// second entry. Insertion order is preserved otherwise.
///
/// Sets become immutable once wrapped in the `Arc` of a DFA state.
#[derive(Debug, Clone, Default)]
pub struct AtnConfigSet {
    configs: Vec<AtnConfig>,
    index: HashMap<MergeKey, usize, RandomState>,
    unique_alt: usize,
    conflict_info: Option<ConflictInfo>,
    has_semantic_context: bool,
    dips_into_outer_context: bool,
    outermost_config_set: bool,
}

impl AtnConfigSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `config`, merging it into an existing entry when possible.
    /// Returns `true` if the set changed.
    pub fn add(&mut self, config: AtnConfig, cache: &mut PredictionContextCache) -> bool {
        debug_assert!(
            !self.outermost_config_set || !config.reaches_into_outer_context(),
            "outermost sets cannot reach into the outer context"
        );
        let key = MergeKey {
            state: config.state,
            alt: config.alt,
            semantic_context: Arc::clone(&config.semantic_context),
        };
        if let Some(&position) = self.index.get(&key) {
            let existing = &mut self.configs[position];
            existing.outer_context_depth = existing.outer_context_depth.max(config.outer_context_depth);
            if config.precedence_filter_suppressed {
                existing.precedence_filter_suppressed = true;
            }
            self.dips_into_outer_context |= config.reaches_into_outer_context();
            let joined = cache.join(&existing.context, &config.context);
            if Arc::ptr_eq(&joined, &existing.context) {
                return false;
            }
            existing.context = joined;
            return true;
        }

        self.index.insert(key, self.configs.len());
        if self.configs.is_empty() {
            self.unique_alt = config.alt;
        } else if self.unique_alt != config.alt {
            self.unique_alt = INVALID_ALT;
        }
        self.has_semantic_context |= !config.semantic_context.is_none();
        self.dips_into_outer_context |= config.reaches_into_outer_context();
        self.configs.push(config);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtnConfig> {
        self.configs.iter()
    }

    #[must_use]
    pub fn configs(&self) -> &[AtnConfig] {
        &self.configs
    }

    /// The single alternative every configuration predicts, or
    /// [`INVALID_ALT`] if there is none.
    #[must_use]
    pub fn unique_alt(&self) -> usize {
        self.unique_alt
    }

    /// Every alternative with at least one configuration.
    #[must_use]
    pub fn represented_alts(&self) -> BitSet {
        self.configs.iter().map(|c| c.alt).collect()
    }

    #[must_use]
    pub fn has_semantic_context(&self) -> bool {
        self.has_semantic_context
    }

    #[must_use]
    pub fn dips_into_outer_context(&self) -> bool {
        self.dips_into_outer_context
    }

    /// Full-context sets that no longer have any caller frames left to consult.
    #[must_use]
    pub fn is_outermost_config_set(&self) -> bool {
        self.outermost_config_set
    }

    pub fn set_outermost_config_set(&mut self, outermost: bool) {
        debug_assert!(!outermost || !self.dips_into_outer_context);
        self.outermost_config_set = outermost;
    }

    #[must_use]
    pub fn conflict_info(&self) -> Option<&ConflictInfo> {
        self.conflict_info.as_ref()
    }

    pub fn set_conflict_info(&mut self, conflict_info: Option<ConflictInfo>) {
        self.conflict_info = conflict_info;
    }

    #[must_use]
    pub fn conflicting_alts(&self) -> Option<&BitSet> {
        self.conflict_info.as_ref().map(|c| &c.conflicted_alts)
    }

    #[must_use]
    pub fn is_exact_conflict(&self) -> bool {
        self.conflict_info.as_ref().is_some_and(|c| c.exact)
    }

    /// Remove every configuration, keeping the outermost flag.
    pub fn clear(&mut self) {
        self.configs.clear();
        self.index.clear();
        self.unique_alt = INVALID_ALT;
        self.conflict_info = None;
        self.has_semantic_context = false;
        self.dips_into_outer_context = false;
    }

    #[must_use]
    pub fn has_config_in_rule_stop_state(&self, atn: &Atn) -> bool {
        self.configs.iter().any(|c| atn.state(c.state).is_rule_stop())
    }

    #[must_use]
    pub fn all_configs_in_rule_stop_states(&self, atn: &Atn) -> bool {
        self.configs.iter().all(|c| atn.state(c.state).is_rule_stop())
    }

    /// Replace every context by its canonical instance in `interner`.
    pub fn optimize_configs(&mut self, interner: &ContextInterner) {
        if self.configs.is_empty() {
            return;
        }
        let mut session = interner.session();
        for config in &mut self.configs {
            let canonical = session.intern(&config.context);
            config.context = canonical;
        }
    }

    /// Decide whether the set has reached a point where the remaining
    /// alternatives can never be separated by more input.
    ///
    /// Configurations are grouped by state (rule-stop states together, as
    /// one group). A conflict requires every group to contain the minimum
    /// alternative, and the joined stacks of each other alternative to be
    /// covered by the joined stacks of that minimum alternative. The
    /// conflict is exact when the stacks are identical rather than merely
    /// covered, no configuration reached into the outer context, and every
    /// group holds the same set of alternatives.
    #[must_use]
    pub fn compute_conflict_info(&self, atn: &Atn, cache: &mut PredictionContextCache) -> Option<ConflictInfo> {
        if self.unique_alt != INVALID_ALT || self.configs.len() <= 1 {
            return None;
        }
        let state_number = |c: &AtnConfig| atn.state(c.state).non_stop_state_number();
        let mut configs: Vec<&AtnConfig> = self.configs.iter().collect();
        configs.sort_by_key(|c| (state_number(c), c.alt));

        let mut exact = !self.dips_into_outer_context;
        let min_alt = configs[0].alt;
        let mut alts = BitSet::singleton(min_alt);

        // every state group must start with the minimum alternative
        let mut current_state = state_number(configs[0]);
        for config in &configs {
            let number = state_number(config);
            if number != current_state {
                if config.alt != min_alt {
                    return None;
                }
                current_state = number;
            }
        }

        if exact {
            let first_state = state_number(configs[0]);
            let mut represented = BitSet::new();
            let mut max_alt = min_alt;
            for config in configs.iter().take_while(|c| state_number(c) == first_state) {
                represented.insert(config.alt);
                max_alt = config.alt;
            }

            // every group must hold exactly the alternatives of the first
            let mut current_state = first_state;
            let mut current_alt = min_alt;
            for config in &configs {
                let number = state_number(config);
                if number != current_state {
                    if current_alt != max_alt {
                        exact = false;
                        break;
                    }
                    current_state = number;
                    current_alt = min_alt;
                } else if config.alt != current_alt {
                    if Some(config.alt) != represented.next_set_bit(current_alt + 1) {
                        exact = false;
                        break;
                    }
                    current_alt = config.alt;
                }
            }
            // the last group is not followed by a state change
            if current_alt != max_alt {
                exact = false;
            }
        }

        let mut current_state = state_number(configs[0]);
        let mut last_min_alt_index = 0;
        let mut joined_min = Arc::clone(&configs[0].context);
        for (i, config) in configs.iter().enumerate().skip(1) {
            if config.alt != min_alt || state_number(config) != current_state {
                break;
            }
            last_min_alt_index = i;
            joined_min = cache.join(&joined_min, &config.context);
        }

        let mut i = last_min_alt_index + 1;
        while i < configs.len() {
            let config = configs[i];
            alts.insert(config.alt);
            let number = state_number(config);
            if number != current_state {
                current_state = number;
                last_min_alt_index = i;
                joined_min = Arc::clone(&config.context);
                for (j, next) in configs.iter().enumerate().skip(i + 1) {
                    if next.alt != min_alt || state_number(next) != current_state {
                        break;
                    }
                    last_min_alt_index = j;
                    joined_min = cache.join(&joined_min, &next.context);
                }
                i = last_min_alt_index + 1;
                continue;
            }

            let current_alt = config.alt;
            let mut joined_alt = Arc::clone(&config.context);
            let mut last_alt_index = i;
            for (j, next) in configs.iter().enumerate().skip(i + 1) {
                if next.alt != current_alt || state_number(next) != current_state {
                    break;
                }
                last_alt_index = j;
                joined_alt = cache.join(&joined_alt, &next.context);
            }
            i = last_alt_index + 1;

            let check = cache.join(&joined_min, &joined_alt);
            if *joined_min != *check {
                return None;
            }
            exact = exact && *joined_min == *joined_alt;
        }

        Some(ConflictInfo { conflicted_alts: alts, exact })
    }
}

impl PartialEq for AtnConfigSet {
    fn eq(&self, other: &Self) -> bool {
        self.outermost_config_set == other.outermost_config_set
            && self.conflict_info == other.conflict_info
            && self.configs == other.configs
    }
}

impl Eq for AtnConfigSet {}

impl Hash for AtnConfigSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.outermost_config_set.hash(state);
        self.configs.hash(state);
    }
}

impl<'a> IntoIterator for &'a AtnConfigSet {
    type Item = &'a AtnConfig;
    type IntoIter = std::slice::Iter<'a, AtnConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.configs.iter()
    }
}

impl fmt::Display for AtnConfigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, config) in self.configs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{config}")?;
        }
        write!(f, "]")?;
        if let Some(conflict) = &self.conflict_info {
            write!(f, ",conflictingAlts={}", conflict.conflicted_alts)?;
            if conflict.exact {
                write!(f, ",exact")?;
            }
        }
        if self.dips_into_outer_context {
            write!(f, ",dipsIntoOuterContext")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::{AtnBuilder, Element};
    use crate::context::PredictionContext;

    fn ctx(return_state: u32) -> Arc<PredictionContext> {
        PredictionContext::empty_full().get_child(StateId(return_state))
    }

    /// A network with enough states for the tests to reference.
    fn atn() -> Atn {
        let mut builder = AtnBuilder::parser(3);
        let r = builder.define_rule("r");
        builder
            .rule(r, vec![vec![Element::token(1), Element::token(2), Element::token(3)]])
            .unwrap();
        builder.build().unwrap()
    }

    fn basic_states(atn: &Atn) -> Vec<StateId> {
        atn.states().iter().filter(|s| !s.is_rule_stop()).map(|s| s.id()).collect()
    }

    #[test]
    fn test_add_merges_contexts() {
        let mut cache = PredictionContextCache::new();
        let mut set = AtnConfigSet::new();
        assert!(set.add(AtnConfig::new(StateId(2), 1, ctx(10)), &mut cache));
        assert!(set.add(AtnConfig::new(StateId(2), 1, ctx(11)), &mut cache));
        assert!(!set.add(AtnConfig::new(StateId(2), 1, ctx(11)), &mut cache));
        assert_eq!(set.len(), 1);
        assert_eq!(set.configs()[0].context().size(), 2);
        assert_eq!(set.unique_alt(), 1);
    }

    #[test]
    fn test_semantic_context_prevents_merge() {
        let mut cache = PredictionContextCache::new();
        let mut set = AtnConfigSet::new();
        set.add(AtnConfig::new(StateId(2), 1, ctx(10)), &mut cache);
        set.add(
            AtnConfig::with_semantic_context(StateId(2), 1, ctx(10), SemanticContext::predicate(0, 0, false)),
            &mut cache,
        );
        assert_eq!(set.len(), 2);
        assert!(set.has_semantic_context());
    }

    #[test]
    fn test_unique_alt_and_dips() {
        let mut cache = PredictionContextCache::new();
        let mut set = AtnConfigSet::new();
        set.add(AtnConfig::new(StateId(1), 1, ctx(10)), &mut cache);
        let mut outer = AtnConfig::new(StateId(2), 2, ctx(10));
        outer.set_outer_context_depth(1);
        set.add(outer, &mut cache);
        assert_eq!(set.unique_alt(), INVALID_ALT);
        assert!(set.dips_into_outer_context());
        assert_eq!(set.represented_alts(), [1, 2].into_iter().collect());
        set.clear();
        assert!(set.is_empty() && !set.dips_into_outer_context());
    }

    #[test]
    fn test_exact_conflict() {
        let atn = atn();
        let states = basic_states(&atn);
        let mut cache = PredictionContextCache::new();
        let mut set = AtnConfigSet::new();
        for &state in &states[..2] {
            set.add(AtnConfig::new(state, 1, ctx(10)), &mut cache);
            set.add(AtnConfig::new(state, 2, ctx(10)), &mut cache);
        }
        let info = set.compute_conflict_info(&atn, &mut cache).unwrap();
        assert_eq!(info.conflicted_alts, [1, 2].into_iter().collect());
        assert!(info.exact);
    }

    #[test]
    fn test_exact_conflict_three_alts() {
        let atn = atn();
        let states = basic_states(&atn);
        let mut cache = PredictionContextCache::new();
        let mut set = AtnConfigSet::new();
        for &state in &states[..2] {
            for alt in 1..=3 {
                set.add(AtnConfig::new(state, alt, ctx(10)), &mut cache);
            }
        }
        let info = set.compute_conflict_info(&atn, &mut cache).unwrap();
        assert_eq!(info.conflicted_alts, [1, 2, 3].into_iter().collect());
        assert!(info.exact);
    }

    #[test]
    fn test_short_last_group_is_inexact_conflict() {
        let atn = atn();
        let states = basic_states(&atn);
        let mut cache = PredictionContextCache::new();
        let mut set = AtnConfigSet::new();
        for alt in 1..=3 {
            set.add(AtnConfig::new(states[0], alt, ctx(10)), &mut cache);
        }
        set.add(AtnConfig::new(states[1], 1, ctx(10)), &mut cache);
        set.add(AtnConfig::new(states[1], 2, ctx(10)), &mut cache);
        let info = set.compute_conflict_info(&atn, &mut cache).unwrap();
        assert_eq!(info.conflicted_alts, [1, 2, 3].into_iter().collect());
        assert!(!info.exact);
    }

    #[test]
    fn test_state_without_minimum_alt_is_not_a_conflict() {
        let atn = atn();
        let states = basic_states(&atn);
        let mut cache = PredictionContextCache::new();
        let mut set = AtnConfigSet::new();
        set.add(AtnConfig::new(states[0], 1, ctx(10)), &mut cache);
        set.add(AtnConfig::new(states[0], 2, ctx(10)), &mut cache);
        set.add(AtnConfig::new(states[1], 2, ctx(10)), &mut cache);
        assert_eq!(set.compute_conflict_info(&atn, &mut cache), None);
    }

    #[test]
    fn test_uncovered_stack_is_not_a_conflict() {
        let atn = atn();
        let states = basic_states(&atn);
        let mut cache = PredictionContextCache::new();
        let mut set = AtnConfigSet::new();
        set.add(AtnConfig::new(states[0], 1, ctx(10)), &mut cache);
        set.add(AtnConfig::new(states[0], 2, ctx(11)), &mut cache);
        assert_eq!(set.compute_conflict_info(&atn, &mut cache), None);
    }

    #[test]
    fn test_covered_stack_is_inexact_conflict() {
        let atn = atn();
        let states = basic_states(&atn);
        let mut cache = PredictionContextCache::new();
        let mut set = AtnConfigSet::new();
        set.add(AtnConfig::new(states[0], 1, ctx(10)), &mut cache);
        set.add(AtnConfig::new(states[0], 1, ctx(11)), &mut cache);
        set.add(AtnConfig::new(states[0], 2, ctx(11)), &mut cache);
        let info = set.compute_conflict_info(&atn, &mut cache).unwrap();
        assert_eq!(info.conflicted_alts, [1, 2].into_iter().collect());
        assert!(!info.exact);
    }

    #[test]
    fn test_rule_stop_states_group_together() {
        let atn = atn();
        let stop = atn.rule_stop(0);
        let mut cache = PredictionContextCache::new();
        let mut set = AtnConfigSet::new();
        set.add(AtnConfig::new(stop, 1, PredictionContext::empty_local()), &mut cache);
        set.add(AtnConfig::new(stop, 3, PredictionContext::empty_local()), &mut cache);
        let info = set.compute_conflict_info(&atn, &mut cache).unwrap();
        assert_eq!(info.conflicted_alts, [1, 3].into_iter().collect());
        assert!(set.all_configs_in_rule_stop_states(&atn));
    }
}
