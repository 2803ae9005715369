//! Materialized window state.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{debug, error, trace};

use msgwindow_error::Result;
use msgwindow_types::{
    Anchor, ConversationId, MessageId, MessageIndex, NamespaceCapabilities, PartitionKey,
    StatisticsFlags, TagMask, WindowSide,
};

use crate::config::ViewConfig;
use crate::entry::{Entry, RenderedEntry};
use crate::hole_sampler::sample_holes;
use crate::hole_set::HoleSet;
use crate::instrumentation::{self, ViewOpType};
use crate::merge::merge_windows;
use crate::message::{GroupInfo, IntermediateMessage, Media, MediaId};
use crate::ordered_entries::{AddOutcome, OrderedEntries};
use crate::sample::Sample;
use crate::statistics::compute_locations;
use crate::store::HistoryStore;

/// Active window: one [`OrderedEntries`] per partition around a concrete
/// anchor, plus the hole sets of the hole-tracking partitions.
///
/// Partitions of the view's conversations that first appear after the
/// window opened (through an insert or a hole edit) join it on the spot.
#[derive(Debug, Clone)]
pub struct LoadedState {
    anchor: Anchor,
    tag: Option<TagMask>,
    half_limit: usize,
    statistics: StatisticsFlags,
    scopes: SmallVec<[ConversationId; 2]>,
    capabilities: NamespaceCapabilities,
    partitions: SmallVec<[PartitionKey; 4]>,
    windows: BTreeMap<PartitionKey, OrderedEntries>,
    holes: BTreeMap<PartitionKey, HoleSet>,
    needs_refill: BTreeSet<PartitionKey>,
}

impl LoadedState {
    /// Open a window at `anchor` and fill every partition from `store`.
    pub fn new<S: HistoryStore + ?Sized>(
        store: &S,
        anchor: Anchor,
        config: &ViewConfig,
        partitions: &[PartitionKey],
        holes: BTreeMap<PartitionKey, HoleSet>,
    ) -> Self {
        let half_limit = config.half_limit.max(1);
        let windows = partitions
            .iter()
            .map(|partition| (*partition, OrderedEntries::new(*partition, anchor, half_limit)))
            .collect();
        let mut state = Self {
            anchor,
            tag: config.tag,
            half_limit,
            statistics: config.statistics,
            scopes: config.scopes.iter().copied().collect(),
            capabilities: config.capabilities.clone(),
            partitions: partitions.iter().copied().collect(),
            windows,
            holes,
            needs_refill: partitions.iter().copied().collect(),
        };
        state.refill(store);
        debug!(
            anchor = %anchor,
            partitions = state.partitions.len(),
            entries = state.windows.values().map(OrderedEntries::len).sum::<usize>(),
            "history window loaded"
        );
        state
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
    pub fn partitions(&self) -> &[PartitionKey] {
        &self.partitions
    }

    #[must_use]
    pub fn window(&self, partition: PartitionKey) -> Option<&OrderedEntries> {
        self.windows.get(&partition)
    }

    #[must_use]
    pub const fn holes(&self) -> &BTreeMap<PartitionKey, HoleSet> {
        &self.holes
    }

    /// Whether a removal left `partition` waiting for a refill.
    #[must_use]
    pub fn needs_refill(&self, partition: PartitionKey) -> bool {
        self.needs_refill.contains(&partition)
    }

    /// Insert a message the store just gained. Messages outside the view's
    /// partitions or tag filter are ignored.
    pub fn add(&mut self, message: IntermediateMessage) -> Result<bool> {
        let partition = message.index.partition;
        if !message.tags.matches(self.tag) {
            return Ok(false);
        }
        if !self.admit_partition(partition) {
            return Ok(false);
        }
        let Some(window) = self.windows.get_mut(&partition) else {
            return Ok(false);
        };
        instrumentation::record_operation(ViewOpType::Add);
        let outcome = window.add(Entry::intermediate(message)).inspect_err(|_| {
            instrumentation::record_invariant_violation();
        })?;
        if let AddOutcome::InsertedWithEviction { evicted } = outcome {
            trace!(partition = %partition, evicted = %evicted, "window side overflowed");
            instrumentation::record_eviction();
        }
        Ok(outcome.changed_window())
    }

    /// Drop the entry at `index`; the partition is topped up on the next
    /// sample.
    pub fn remove(&mut self, index: &MessageIndex) -> bool {
        let Some(window) = self.windows.get_mut(&index.partition) else {
            return false;
        };
        if window.remove(index).is_none() {
            return false;
        }
        instrumentation::record_operation(ViewOpType::Remove);
        self.needs_refill.insert(index.partition);
        true
    }

    /// Re-key the entry at `index`, moving it to its new place.
    pub fn update_timestamp(&mut self, index: &MessageIndex, timestamp: u32) -> Result<bool> {
        let Some(window) = self.windows.get_mut(&index.partition) else {
            return Ok(false);
        };
        let Some(entry) = window.remove(index) else {
            return Ok(false);
        };
        instrumentation::record_operation(ViewOpType::Update);
        // The side the entry left may now be short.
        self.needs_refill.insert(index.partition);
        let outcome = window
            .add(entry.with_timestamp(timestamp))
            .inspect_err(|_| instrumentation::record_invariant_violation())?;
        if let AddOutcome::InsertedWithEviction { evicted } = outcome {
            trace!(partition = %index.partition, evicted = %evicted, "window side overflowed");
            instrumentation::record_eviction();
        }
        Ok(true)
    }

    pub fn update_group_info(&mut self, updates: &HashMap<MessageId, Option<GroupInfo>>) -> bool {
        let mut changed = false;
        for window in self.windows.values_mut() {
            changed |= window.update_all(|entry| {
                updates
                    .get(&entry.index().message_id())
                    .is_some_and(|info| entry.set_group_info(*info))
            });
        }
        if changed {
            instrumentation::record_operation(ViewOpType::Update);
        }
        changed
    }

    pub fn update_embedded_media(&mut self, index: &MessageIndex, payload: Vec<u8>) -> bool {
        let changed = self
            .windows
            .get_mut(&index.partition)
            .and_then(|window| window.find_mut(index))
            .is_some_and(|entry| entry.set_embedded_media(payload));
        if changed {
            instrumentation::record_operation(ViewOpType::Update);
        }
        changed
    }

    /// Replace (`Some`) or drop (`None`) media on rendered entries.
    pub fn update_media(&mut self, updates: &HashMap<MediaId, Option<Media>>) -> bool {
        let mut changed = false;
        for window in self.windows.values_mut() {
            changed |= window.update_all(|entry| entry.apply_media_updates(updates));
        }
        if changed {
            instrumentation::record_operation(ViewOpType::Update);
        }
        changed
    }

    /// Returns `false` for partitions that do not track holes.
    pub fn insert_hole(&mut self, partition: PartitionKey, range: RangeInclusive<u32>) -> bool {
        let tracked = self.holes.contains_key(&partition)
            || (self.capabilities.tracks_holes(&partition) && self.admit_partition(partition));
        if !tracked {
            return false;
        }
        self.holes
            .get_mut(&partition)
            .is_some_and(|holes| holes.insert(range))
    }

    pub fn remove_hole(&mut self, partition: PartitionKey, range: RangeInclusive<u32>) -> bool {
        self.holes
            .get_mut(&partition)
            .is_some_and(|holes| holes.remove(range))
    }

    /// Produce the current snapshot.
    ///
    /// Tops up partitions flagged by removals, repairs any side found out of
    /// order, merges the partitions, drops entries cut off by holes, and
    /// renders what remains. Rendered forms and statistics are memoized into
    /// the window, so sampling again without mutations yields the same
    /// result.
    pub fn sample<S: HistoryStore + ?Sized>(&mut self, store: &S) -> Sample {
        self.refill(store);
        self.repair_order();

        let merged = merge_windows(&self.windows, self.half_limit);
        let sampling =
            sample_holes(self.anchor, self.tag, self.half_limit, &self.windows, &self.holes);
        let kept: Vec<_> = merged
            .into_iter()
            .filter(|slot| !sampling.is_clipped(&slot.index))
            .collect();
        let indices: Vec<MessageIndex> = kept.iter().map(|slot| slot.index).collect();
        let locations =
            compute_locations(store, &self.partitions, self.tag, self.statistics, &indices);

        let mut entries = Vec::with_capacity(kept.len());
        for (slot, location) in kept.iter().zip(locations) {
            let Some(entry) = self
                .windows
                .get_mut(&slot.partition)
                .and_then(|window| window.entry_at_mut(slot.side, slot.position))
            else {
                continue;
            };
            entry.set_location(location);
            let message = entry
                .render_with(|raw| {
                    instrumentation::record_render();
                    store.render(raw)
                })
                .clone();
            entries.push(RenderedEntry { message, location });
        }

        let sample = Sample {
            anchor: self.anchor,
            entries,
            holes_to_lower: sampling.holes_to_lower(),
            holes_to_higher: sampling.holes_to_higher(),
            hole: sampling.hole,
        };
        instrumentation::record_sample(sample.entries.len(), sample.hole.is_some());
        sample
    }

    /// Make sure `partition` has a window, opening an empty one for a
    /// partition of the view's conversations seen for the first time.
    ///
    /// A new partition had nothing stored when the window opened, so both of
    /// its sides start out complete.
    fn admit_partition(&mut self, partition: PartitionKey) -> bool {
        if self.windows.contains_key(&partition) {
            return true;
        }
        if !self.scopes.contains(&partition.conversation) {
            return false;
        }
        let mut window = OrderedEntries::new(partition, self.anchor, self.half_limit);
        for side in [WindowSide::LowerOrAtAnchor, WindowSide::HigherThanAnchor] {
            window.extend_outward(side, Vec::new(), true);
        }
        self.windows.insert(partition, window);
        let position = self.partitions.partition_point(|known| *known < partition);
        self.partitions.insert(position, partition);
        if self.capabilities.tracks_holes(&partition) {
            self.holes.entry(partition).or_default();
        }
        debug!(partition = %partition, "partition joined window");
        true
    }

    fn refill<S: HistoryStore + ?Sized>(&mut self, store: &S) {
        for partition in std::mem::take(&mut self.needs_refill) {
            for side in [WindowSide::LowerOrAtAnchor, WindowSide::HigherThanAnchor] {
                self.fill_side(store, partition, side);
            }
        }
    }

    fn fill_side<S: HistoryStore + ?Sized>(
        &mut self,
        store: &S,
        partition: PartitionKey,
        side: WindowSide,
    ) {
        let Some(window) = self.windows.get_mut(&partition) else {
            return;
        };
        if !window.needs_top_up(side) {
            return;
        }
        let missing = self.half_limit - window.side(side).len();
        let (from, include_from, to) = match side {
            WindowSide::LowerOrAtAnchor => {
                let start = match window.lower_or_at_anchor().first() {
                    Some(outermost) => Some((outermost.index(), false)),
                    None => match self.anchor {
                        Anchor::At(index) => Some((index, true)),
                        Anchor::UpperBound => Some((MessageIndex::absolute_upper_bound(), true)),
                        Anchor::LowerBound => None,
                    },
                };
                let Some((from, include_from)) = start else {
                    return;
                };
                (from, include_from, MessageIndex::absolute_lower_bound())
            }
            WindowSide::HigherThanAnchor => {
                let start = match window.higher_than_anchor().last() {
                    Some(outermost) => Some((outermost.index(), false)),
                    None => match self.anchor {
                        Anchor::At(index) => Some((index, false)),
                        Anchor::LowerBound => Some((MessageIndex::absolute_lower_bound(), true)),
                        Anchor::UpperBound => None,
                    },
                };
                let Some((from, include_from)) = start else {
                    return;
                };
                (from, include_from, MessageIndex::absolute_upper_bound())
            }
        };

        let fetched = store.fetch(partition, self.tag, from, include_from, to, missing + 1);
        let exhausted = fetched.len() <= missing;
        let appended = window.extend_outward(
            side,
            fetched.into_iter().take(missing).map(Entry::intermediate),
            exhausted,
        );
        instrumentation::record_refill();
        debug!(
            partition = %partition,
            side = %side,
            missing,
            appended,
            exhausted,
            "window side refilled"
        );
    }

    fn repair_order(&mut self) {
        for window in self.windows.values_mut() {
            if let Err(err) = window.check_monotony() {
                error!(error = %err, kind = err.kind(), "window order violated, re-sorting");
                instrumentation::record_invariant_violation();
                window.fix_monotony();
            }
        }
    }
}
