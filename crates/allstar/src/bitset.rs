//! Growable bit set for alternative numbers and other small dense indices.

use fixedbitset::FixedBitSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A set of non-negative integers over a [`FixedBitSet`] that grows on
/// insert.
///
/// Two sets compare equal when they contain the same members, regardless of
/// how many bits either one has allocated.
#[derive(Clone, Default)]
pub struct BitSet(FixedBitSet);

impl BitSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding exactly `bit`.
    #[must_use]
    pub fn singleton(bit: usize) -> Self {
        let mut set = Self(FixedBitSet::with_capacity(bit + 1));
        set.0.insert(bit);
        set
    }

    /// Insert `bit`, returning `true` if it was not already present.
    pub fn insert(&mut self, bit: usize) -> bool {
        if bit >= self.0.len() {
            self.0.grow(bit + 1);
        }
        !self.0.put(bit)
    }

    /// Remove `bit`, returning `true` if it was present.
    pub fn remove(&mut self, bit: usize) -> bool {
        if !self.0.contains(bit) {
            return false;
        }
        self.0.set(bit, false);
        true
    }

    #[must_use]
    pub fn contains(&self, bit: usize) -> bool {
        self.0.contains(bit)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.count_ones(..)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.ones().next().is_none()
    }

    /// Smallest member, if any.
    #[must_use]
    pub fn min(&self) -> Option<usize> {
        self.0.ones().next()
    }

    /// Smallest member greater than or equal to `from`.
    #[must_use]
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        self.0.ones().find(|&bit| bit >= from)
    }

    /// Add every member of `other` to this set.
    pub fn union_with(&mut self, other: &BitSet) {
        self.0.union_with(&other.0);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.ones()
    }
}

impl PartialEq for BitSet {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for BitSet {}

impl Hash for BitSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for bit in self.iter() {
            bit.hash(state);
        }
        self.len().hash(state);
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::new();
        for bit in iter {
            set.insert(bit);
        }
        set
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, bit) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{bit}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(set: &BitSet) -> u64 {
        let mut hasher = DefaultHasher::new();
        set.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_insert_and_contains() {
        let mut set = BitSet::new();
        assert!(set.insert(3));
        assert!(!set.insert(3));
        assert!(set.insert(130));
        assert!(set.contains(3));
        assert!(set.contains(130));
        assert!(!set.contains(4));
        assert!(!set.contains(10_000));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_min_and_iteration_order() {
        let set: BitSet = [70, 2, 65, 9].into_iter().collect();
        assert_eq!(set.min(), Some(2));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![2, 9, 65, 70]);
        assert_eq!(set.next_set_bit(10), Some(65));
        assert_eq!(set.next_set_bit(71), None);
        assert_eq!(BitSet::new().min(), None);
    }

    #[test]
    fn test_equality_ignores_capacity() {
        let mut a = BitSet::singleton(1);
        a.insert(200);
        assert!(a.remove(200));
        assert!(!a.remove(200));
        assert_eq!(a, BitSet::singleton(1));
        assert_eq!(hash_of(&a), hash_of(&BitSet::singleton(1)));

        let mut cleared = BitSet::singleton(500);
        cleared.clear();
        assert!(cleared.is_empty());
        assert_eq!(cleared, BitSet::new());
    }

    #[test]
    fn test_union_grows() {
        let mut set = BitSet::singleton(1);
        set.union_with(&[3, 300].into_iter().collect());
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 3, 300]);
    }

    #[test]
    fn test_display() {
        let set: BitSet = [1, 2].into_iter().collect();
        assert_eq!(set.to_string(), "{1, 2}");
        assert_eq!(BitSet::new().to_string(), "{}");
    }
}
