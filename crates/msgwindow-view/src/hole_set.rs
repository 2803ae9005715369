//! Sparse set of missing sequence ids for one partition.
//!
//! Stored as disjoint closed ranges keyed by their start; overlapping or
//! adjacent ranges always coalesce, so each id is covered by at most one
//! range and no two ranges touch.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HoleSet {
    ranges: BTreeMap<u32, u32>,
}

impl HoleSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_ranges(ranges: impl IntoIterator<Item = RangeInclusive<u32>>) -> Self {
        let mut set = Self::new();
        for range in ranges {
            set.insert(range);
        }
        set
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of disjoint ranges.
    #[must_use]
    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    /// Number of missing ids.
    #[must_use]
    pub fn missing_count(&self) -> u64 {
        self.ranges
            .iter()
            .map(|(start, end)| u64::from(*end) - u64::from(*start) + 1)
            .sum()
    }

    pub fn ranges(&self) -> impl Iterator<Item = RangeInclusive<u32>> + '_ {
        self.ranges.iter().map(|(start, end)| *start..=*end)
    }

    /// Mark every id in `range` missing. Returns whether the set changed.
    pub fn insert(&mut self, range: RangeInclusive<u32>) -> bool {
        let (mut start, mut end) = range.into_inner();
        if start > end || self.covers(start, end) {
            return false;
        }

        // Every range overlapping or adjacent to [start, end] starts at or
        // before end + 1 and ends at or after start - 1.
        let reach = end.saturating_add(1);
        let absorbed: Vec<(u32, u32)> = self
            .ranges
            .range(..=reach)
            .rev()
            .take_while(|(_, existing_end)| u64::from(**existing_end) + 1 >= u64::from(start))
            .map(|(existing_start, existing_end)| (*existing_start, *existing_end))
            .collect();
        for (existing_start, existing_end) in absorbed {
            self.ranges.remove(&existing_start);
            start = start.min(existing_start);
            end = end.max(existing_end);
        }
        self.ranges.insert(start, end);
        true
    }

    /// Mark every id in `range` present. Returns whether the set changed.
    pub fn remove(&mut self, range: RangeInclusive<u32>) -> bool {
        let (start, end) = range.into_inner();
        if start > end {
            return false;
        }
        let overlapping: Vec<(u32, u32)> = self
            .ranges
            .range(..=end)
            .rev()
            .take_while(|(_, existing_end)| **existing_end >= start)
            .map(|(existing_start, existing_end)| (*existing_start, *existing_end))
            .collect();
        if overlapping.is_empty() {
            return false;
        }
        for (existing_start, existing_end) in overlapping {
            self.ranges.remove(&existing_start);
            if existing_start < start {
                self.ranges.insert(existing_start, start - 1);
            }
            if existing_end > end {
                self.ranges.insert(end + 1, existing_end);
            }
        }
        true
    }

    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.containing(id).is_some()
    }

    /// Whether any id of `range` is missing.
    #[must_use]
    pub fn intersects(&self, range: RangeInclusive<u32>) -> bool {
        let (start, end) = range.into_inner();
        if start > end {
            return false;
        }
        self.ranges
            .range(..=end)
            .next_back()
            .is_some_and(|(_, existing_end)| *existing_end >= start)
    }

    /// Greatest missing id that is `<= id`.
    #[must_use]
    pub fn max_at_or_below(&self, id: u32) -> Option<u32> {
        self.ranges
            .range(..=id)
            .next_back()
            .map(|(_, existing_end)| (*existing_end).min(id))
    }

    /// Least missing id that is `>= id`.
    #[must_use]
    pub fn min_at_or_above(&self, id: u32) -> Option<u32> {
        if self.contains(id) {
            return Some(id);
        }
        self.ranges.range(id..).next().map(|(start, _)| *start)
    }

    fn containing(&self, id: u32) -> Option<(u32, u32)> {
        self.ranges
            .range(..=id)
            .next_back()
            .filter(|(_, existing_end)| **existing_end >= id)
            .map(|(start, end)| (*start, *end))
    }

    fn covers(&self, start: u32, end: u32) -> bool {
        self.containing(start)
            .is_some_and(|(_, existing_end)| existing_end >= end)
    }
}
