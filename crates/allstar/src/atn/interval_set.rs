//! Sorted, non-overlapping sets of token-type intervals.

use smallvec::SmallVec;
use std::fmt;

/// A closed interval `start..=stop` of token types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval {
    pub start: i32,
    pub stop: i32,
}

impl Interval {
    #[must_use]
    pub const fn new(start: i32, stop: i32) -> Self {
        Self { start, stop }
    }

    #[must_use]
    pub const fn contains(&self, value: i32) -> bool {
        self.start <= value && value <= self.stop
    }
}

/// A set of token types stored as sorted, disjoint, non-adjacent intervals.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct IntervalSet {
    intervals: SmallVec<[Interval; 4]>,
}

impl IntervalSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn of(value: i32) -> Self {
        Self::range(value, value)
    }

    #[must_use]
    pub fn range(start: i32, stop: i32) -> Self {
        let mut set = Self::new();
        set.add_range(start, stop);
        set
    }

    pub fn add(&mut self, value: i32) {
        self.add_range(value, value);
    }

    /// Add `start..=stop`, merging with any overlapping or adjacent interval.
    pub fn add_range(&mut self, start: i32, stop: i32) {
        if stop < start {
            return;
        }
        let mut merged = Interval::new(start, stop);
        let mut result: SmallVec<[Interval; 4]> = SmallVec::new();
        let mut placed = false;
        for &existing in &self.intervals {
            if existing.stop.saturating_add(1) < merged.start {
                result.push(existing);
            } else if merged.stop.saturating_add(1) < existing.start {
                if !placed {
                    result.push(merged);
                    placed = true;
                }
                result.push(existing);
            } else {
                merged = Interval::new(merged.start.min(existing.start), merged.stop.max(existing.stop));
            }
        }
        if !placed {
            result.push(merged);
        }
        self.intervals = result;
    }

    pub fn add_all(&mut self, other: &IntervalSet) {
        for interval in &other.intervals {
            self.add_range(interval.start, interval.stop);
        }
    }

    #[must_use]
    pub fn contains(&self, value: i32) -> bool {
        self.intervals
            .binary_search_by(|interval| {
                if interval.stop < value {
                    std::cmp::Ordering::Less
                } else if interval.start > value {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Members of `min..=max` that are not in this set.
    #[must_use]
    pub fn complement(&self, min: i32, max: i32) -> IntervalSet {
        let mut result = IntervalSet::new();
        let mut next = min;
        for interval in &self.intervals {
            if interval.stop < min {
                continue;
            }
            if interval.start > max {
                break;
            }
            if interval.start > next {
                result.add_range(next, interval.start - 1);
            }
            next = next.max(interval.stop.saturating_add(1));
        }
        if next <= max {
            result.add_range(next, max);
        }
        result
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of member values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals
            .iter()
            .map(|i| (i64::from(i.stop) - i64::from(i.start) + 1) as usize)
            .sum()
    }

    #[must_use]
    pub fn min(&self) -> Option<i32> {
        self.intervals.first().map(|i| i.start)
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Every member value in ascending order.
    pub fn values(&self) -> impl Iterator<Item = i32> + '_ {
        self.intervals.iter().flat_map(|i| i.start..=i.stop)
    }
}

impl fmt::Debug for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let single = self.len() == 1;
        if !single {
            write!(f, "{{")?;
        }
        for (i, interval) in self.intervals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let show = |value: i32| match value {
                crate::EOF => "<EOF>".to_string(),
                crate::EPSILON => "<EPSILON>".to_string(),
                other => other.to_string(),
            };
            if interval.start == interval.stop {
                write!(f, "{}", show(interval.start))?;
            } else {
                write!(f, "{}..{}", show(interval.start), show(interval.stop))?;
            }
        }
        if !single {
            write!(f, "}}")?;
        }
        Ok(())
    }
}

impl FromIterator<i32> for IntervalSet {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.add(value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_ranges_merge() {
        let mut set = IntervalSet::range(1, 3);
        set.add_range(4, 6);
        set.add(10);
        assert_eq!(set.intervals(), &[Interval::new(1, 6), Interval::new(10, 10)]);
        assert_eq!(set.len(), 7);
    }

    #[test]
    fn test_contains() {
        let set: IntervalSet = [5, 1, 3].into_iter().collect();
        assert!(set.contains(1));
        assert!(set.contains(5));
        assert!(!set.contains(2));
        assert!(!set.contains(6));
    }

    #[test]
    fn test_complement() {
        let set: IntervalSet = [2, 3, 7].into_iter().collect();
        let complement = set.complement(1, 8);
        assert_eq!(complement.values().collect::<Vec<_>>(), vec![1, 4, 5, 6, 8]);
    }

    #[test]
    fn test_display() {
        assert_eq!(IntervalSet::of(crate::EOF).to_string(), "<EOF>");
        let set: IntervalSet = [1, 2, 3, 9].into_iter().collect();
        assert_eq!(set.to_string(), "{1..3, 9}");
    }
}
