//! Resolution of a requested message id into a concrete anchor.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use tracing::debug;

use msgwindow_types::{Anchor, MessageId, PartitionKey, TagMask};

use crate::hole_set::HoleSet;
use crate::instrumentation;
use crate::sample::HoleRequest;
use crate::store::HistoryStore;

/// Result of [`LoadingState::check_and_sample`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadingOutcome {
    /// The target is missing locally; fetch `HoleRequest` and check again.
    LoadHole(HoleRequest),
    /// The target resolved; open a loaded window at this anchor.
    Ready(Anchor),
}

/// View state while the starting message is being located.
///
/// Message mutations do not affect it; only hole edits can change the
/// outcome of the next check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingState {
    partition: PartitionKey,
    target_id: u32,
    holes: BTreeMap<PartitionKey, HoleSet>,
}

impl LoadingState {
    #[must_use]
    pub const fn new(
        partition: PartitionKey,
        target_id: u32,
        holes: BTreeMap<PartitionKey, HoleSet>,
    ) -> Self {
        Self {
            partition,
            target_id,
            holes,
        }
    }

    #[must_use]
    pub const fn partition(&self) -> PartitionKey {
        self.partition
    }

    #[must_use]
    pub const fn target_id(&self) -> u32 {
        self.target_id
    }

    /// Hole sets of every hole-tracking partition of the view.
    #[must_use]
    pub const fn holes(&self) -> &BTreeMap<PartitionKey, HoleSet> {
        &self.holes
    }

    /// Locate the target, moving it forward past ids that do not exist.
    ///
    /// A target that is missing locally (or a skipped-over range that is)
    /// yields a hole request centered on it. Otherwise the target resolves
    /// to its index, or to the upper bound when nothing at or above it
    /// exists in its partition.
    pub fn check_and_sample<S: HistoryStore + ?Sized>(
        &mut self,
        store: &S,
        tag: Option<TagMask>,
    ) -> LoadingOutcome {
        let holes = self.holes.get(&self.partition);
        loop {
            if let Some(hole_set) = holes.filter(|holes| holes.contains(self.target_id)) {
                debug!(
                    partition = %self.partition,
                    target_id = self.target_id,
                    "loading target inside hole"
                );
                instrumentation::record_hole_request();
                return LoadingOutcome::LoadHole(HoleRequest {
                    partition: self.partition,
                    tag,
                    id_ranges: hole_set.clone(),
                    start_id: self.target_id,
                    end_id: None,
                });
            }

            let id = MessageId::new(self.partition, self.target_id);
            if let Some(index) = store.index_of(id) {
                debug!(
                    partition = %self.partition,
                    target_id = self.target_id,
                    "loading target found"
                );
                return LoadingOutcome::Ready(Anchor::At(index));
            }

            let next = store
                .index_higher_than(id)
                .filter(|next| next.partition == self.partition && next.id > self.target_id);
            let skipped_hole = holes.and_then(|holes| {
                let first_missing = holes.min_at_or_above(self.target_id.checked_add(1)?)?;
                next.is_none_or(|next| first_missing < next.id)
                    .then_some(first_missing)
            });
            match (skipped_hole, next) {
                (Some(missing), _) => self.target_id = missing,
                (None, Some(next)) => self.target_id = next.id,
                (None, None) => {
                    debug!(partition = %self.partition, "loading target past newest message");
                    return LoadingOutcome::Ready(Anchor::UpperBound);
                }
            }
        }
    }

    pub fn insert_hole(&mut self, partition: PartitionKey, range: RangeInclusive<u32>) -> bool {
        self.holes.entry(partition).or_default().insert(range)
    }

    pub fn remove_hole(&mut self, partition: PartitionKey, range: RangeInclusive<u32>) -> bool {
        self.holes
            .get_mut(&partition)
            .is_some_and(|holes| holes.remove(range))
    }
}
