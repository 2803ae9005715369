//! Per-partition two-sided bounded window.
//!
//! Both sides are kept ascending by [`MessageIndex`]:
//! - `lower_or_at_anchor`: the last element is the one closest to the anchor
//! - `higher_than_anchor`: the first element is the one closest to the anchor
//!
//! Each side holds at most `half_limit` entries. When an insert overflows a
//! side the entry farthest from the anchor is evicted (first of the lower
//! side, last of the higher side); the anchor-adjacent end is never touched.

use msgwindow_error::{Result, ViewError};
use msgwindow_types::{Anchor, MessageIndex, PartitionKey, WindowSide};

use crate::entry::Entry;

/// Result of [`OrderedEntries::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    /// Inserted; the farthest entry of the side was evicted to make room.
    InsertedWithEviction { evicted: MessageIndex },
    /// The entry would land beyond the outermost entry of a side that is
    /// full or not known to be complete.
    OutsideWindow,
}

impl AddOutcome {
    #[must_use]
    pub const fn changed_window(self) -> bool {
        !matches!(self, Self::OutsideWindow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedEntries {
    partition: PartitionKey,
    anchor: Anchor,
    half_limit: usize,
    lower_or_at_anchor: Vec<Entry>,
    higher_than_anchor: Vec<Entry>,
    /// The store holds nothing beyond the outermost lower entry.
    lower_exhausted: bool,
    /// The store holds nothing beyond the outermost higher entry.
    higher_exhausted: bool,
}

impl OrderedEntries {
    /// Empty window. A side that no index can fall on (the lower side of a
    /// `LowerBound` anchor, the higher side of an `UpperBound` anchor) starts
    /// out exhausted.
    #[must_use]
    pub fn new(partition: PartitionKey, anchor: Anchor, half_limit: usize) -> Self {
        let half_limit = half_limit.max(1);
        Self {
            partition,
            anchor,
            half_limit,
            lower_or_at_anchor: Vec::with_capacity(half_limit),
            higher_than_anchor: Vec::with_capacity(half_limit),
            lower_exhausted: matches!(anchor, Anchor::LowerBound),
            higher_exhausted: matches!(anchor, Anchor::UpperBound),
        }
    }

    #[must_use]
    pub const fn partition(&self) -> PartitionKey {
        self.partition
    }

    #[must_use]
    pub const fn anchor(&self) -> Anchor {
        self.anchor
    }

    #[must_use]
    pub const fn half_limit(&self) -> usize {
        self.half_limit
    }

    #[must_use]
    pub fn lower_or_at_anchor(&self) -> &[Entry] {
        &self.lower_or_at_anchor
    }

    #[must_use]
    pub fn higher_than_anchor(&self) -> &[Entry] {
        &self.higher_than_anchor
    }

    #[must_use]
    pub fn side(&self, side: WindowSide) -> &[Entry] {
        match side {
            WindowSide::LowerOrAtAnchor => &self.lower_or_at_anchor,
            WindowSide::HigherThanAnchor => &self.higher_than_anchor,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lower_or_at_anchor.len() + self.higher_than_anchor.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lower_or_at_anchor.is_empty() && self.higher_than_anchor.is_empty()
    }

    /// Whether the store is known to hold nothing beyond the outermost entry
    /// of `side`.
    #[must_use]
    pub const fn is_exhausted(&self, side: WindowSide) -> bool {
        match side {
            WindowSide::LowerOrAtAnchor => self.lower_exhausted,
            WindowSide::HigherThanAnchor => self.higher_exhausted,
        }
    }

    /// Whether `side` has room and the store may still have entries for it.
    #[must_use]
    pub fn needs_top_up(&self, side: WindowSide) -> bool {
        self.side(side).len() < self.half_limit && !self.is_exhausted(side)
    }

    /// Side an index belongs to under this window's anchor.
    #[must_use]
    pub fn side_of(&self, index: &MessageIndex) -> WindowSide {
        if self.anchor.is_equal_or_greater(index) {
            WindowSide::LowerOrAtAnchor
        } else {
            WindowSide::HigherThanAnchor
        }
    }

    /// Insert `entry`, evicting the farthest entry if the side overflows.
    pub fn add(&mut self, entry: Entry) -> Result<AddOutcome> {
        let index = entry.index();
        let side = self.side_of(&index);
        let half_limit = self.half_limit;
        let exhausted = self.is_exhausted(side);
        let entries = self.side_mut(side);
        let position = match entries.binary_search_by(|probe| probe.index().cmp(&index)) {
            Ok(_) => {
                return Err(ViewError::DuplicateIndex {
                    partition: self.partition,
                    index,
                });
            }
            Err(position) => position,
        };

        let full = entries.len() >= half_limit;
        let farthest = match side {
            WindowSide::LowerOrAtAnchor => position == 0,
            WindowSide::HigherThanAnchor => position == entries.len(),
        };
        // Past the outermost entry of an incomplete side there may be
        // unloaded entries in between; a refill picks this one up in order.
        let incomplete = !exhausted && !entries.is_empty();
        if farthest && (full || incomplete) {
            self.set_exhausted(side, false);
            return Ok(AddOutcome::OutsideWindow);
        }

        entries.insert(position, entry);
        if entries.len() <= half_limit {
            return Ok(AddOutcome::Inserted);
        }
        let evicted = match side {
            WindowSide::LowerOrAtAnchor => entries.remove(0),
            WindowSide::HigherThanAnchor => entries.remove(entries.len() - 1),
        };
        self.set_exhausted(side, false);
        Ok(AddOutcome::InsertedWithEviction {
            evicted: evicted.index(),
        })
    }

    /// Remove the entry at `index`; absent indices are a no-op.
    pub fn remove(&mut self, index: &MessageIndex) -> Option<Entry> {
        let side = self.side_of(index);
        let entries = self.side_mut(side);
        let position = entries
            .binary_search_by(|probe| probe.index().cmp(index))
            .ok()?;
        Some(entries.remove(position))
    }

    #[must_use]
    pub fn find(&self, index: &MessageIndex) -> Option<&Entry> {
        let entries = self.side(self.side_of(index));
        entries
            .binary_search_by(|probe| probe.index().cmp(index))
            .ok()
            .map(|position| &entries[position])
    }

    /// Mutate the entry at `index`; `f` reports whether it changed anything.
    /// An entry whose index moved is re-inserted on its new side. If the new
    /// index is already taken the entry is left untouched at `index` and the
    /// collision is returned.
    pub fn update(
        &mut self,
        index: &MessageIndex,
        f: impl FnOnce(&mut Entry) -> bool,
    ) -> Result<bool> {
        let side = self.side_of(index);
        let entries = self.side_mut(side);
        let Ok(position) = entries.binary_search_by(|probe| probe.index().cmp(index)) else {
            return Ok(false);
        };
        let mut updated = entries[position].clone();
        let changed = f(&mut updated);
        if updated.index() == *index {
            entries[position] = updated;
            return Ok(changed);
        }
        let original = entries.remove(position);
        if let Err(err) = self.add(updated) {
            self.side_mut(side).insert(position, original);
            return Err(err);
        }
        Ok(changed)
    }

    /// Apply `f` to every entry; returns whether any call reported a change.
    /// `f` must not change entry indices.
    pub fn update_all(&mut self, mut f: impl FnMut(&mut Entry) -> bool) -> bool {
        let mut changed = false;
        for entry in self
            .lower_or_at_anchor
            .iter_mut()
            .chain(self.higher_than_anchor.iter_mut())
        {
            changed |= f(entry);
        }
        changed
    }

    /// Append entries beyond the outermost entry of `side`, in outward order
    /// (descending for the lower side, ascending for the higher side).
    ///
    /// Entries that belong to the other side or do not extend the side
    /// outward are skipped. Returns the number of entries appended.
    pub fn extend_outward(
        &mut self,
        side: WindowSide,
        outward: impl IntoIterator<Item = Entry>,
        exhausted: bool,
    ) -> usize {
        let half_limit = self.half_limit;
        let anchor = self.anchor;
        let mut appended = 0;
        let mut overflowed = false;
        match side {
            WindowSide::LowerOrAtAnchor => {
                let mut staged: Vec<Entry> = Vec::new();
                let mut boundary = self.lower_or_at_anchor.first().map(Entry::index);
                for entry in outward {
                    let index = entry.index();
                    let extends = boundary.is_none_or(|boundary| index < boundary);
                    if !anchor.is_equal_or_greater(&index) || !extends {
                        continue;
                    }
                    if self.lower_or_at_anchor.len() + staged.len() >= half_limit {
                        overflowed = true;
                        break;
                    }
                    boundary = Some(index);
                    staged.push(entry);
                    appended += 1;
                }
                staged.reverse();
                staged.append(&mut self.lower_or_at_anchor);
                self.lower_or_at_anchor = staged;
            }
            WindowSide::HigherThanAnchor => {
                let mut boundary = self.higher_than_anchor.last().map(Entry::index);
                for entry in outward {
                    let index = entry.index();
                    let extends = boundary.is_none_or(|boundary| index > boundary);
                    if anchor.is_equal_or_greater(&index) || !extends {
                        continue;
                    }
                    if self.higher_than_anchor.len() >= half_limit {
                        overflowed = true;
                        break;
                    }
                    boundary = Some(index);
                    self.higher_than_anchor.push(entry);
                    appended += 1;
                }
            }
        }
        self.set_exhausted(side, exhausted && !overflowed);
        appended
    }

    /// Report the first ordering violation, if any.
    pub fn check_monotony(&self) -> Result<()> {
        for side in [WindowSide::LowerOrAtAnchor, WindowSide::HigherThanAnchor] {
            let entries = self.side(side);
            if let Some(position) = entries
                .windows(2)
                .position(|pair| pair[0].index() >= pair[1].index())
            {
                return Err(ViewError::NonMonotonic {
                    partition: self.partition,
                    side,
                    position: position + 1,
                });
            }
        }
        Ok(())
    }

    /// Re-sort both sides, dropping duplicate indices. Returns whether
    /// anything had to change.
    pub fn fix_monotony(&mut self) -> bool {
        let mut changed = false;
        for entries in [&mut self.lower_or_at_anchor, &mut self.higher_than_anchor] {
            if entries
                .windows(2)
                .all(|pair| pair[0].index() < pair[1].index())
            {
                continue;
            }
            entries.sort_by_key(Entry::index);
            entries.dedup_by_key(|entry| entry.index());
            changed = true;
        }
        changed
    }

    pub(crate) fn find_mut(&mut self, index: &MessageIndex) -> Option<&mut Entry> {
        let entries = self.side_mut(self.side_of(index));
        let position = entries
            .binary_search_by(|probe| probe.index().cmp(index))
            .ok()?;
        entries.get_mut(position)
    }

    pub(crate) fn entry_at_mut(&mut self, side: WindowSide, position: usize) -> Option<&mut Entry> {
        self.side_mut(side).get_mut(position)
    }

    fn side_mut(&mut self, side: WindowSide) -> &mut Vec<Entry> {
        match side {
            WindowSide::LowerOrAtAnchor => &mut self.lower_or_at_anchor,
            WindowSide::HigherThanAnchor => &mut self.higher_than_anchor,
        }
    }

    fn set_exhausted(&mut self, side: WindowSide, exhausted: bool) {
        match side {
            WindowSide::LowerOrAtAnchor => self.lower_exhausted = exhausted,
            WindowSide::HigherThanAnchor => self.higher_exhausted = exhausted,
        }
    }
}
