//! Position statistics attached to sampled entries.

use msgwindow_types::{MessageIndex, MonthIndex, PartitionKey, StatisticsFlags, TagMask};

use crate::entry::{CombinedLocation, LocationStats, MonthLocation};
use crate::store::HistoryStore;

/// Location statistics for `indices`, which must be ascending and contiguous
/// among the tag-filtered messages of `partitions`.
///
/// Returns one slot per index; a slot is `None` when no statistic applies.
#[must_use]
pub fn compute_locations<S: HistoryStore + ?Sized>(
    store: &S,
    partitions: &[PartitionKey],
    tag: Option<TagMask>,
    flags: StatisticsFlags,
    indices: &[MessageIndex],
) -> Vec<Option<LocationStats>> {
    let mut stats = vec![LocationStats::default(); indices.len()];
    let Some(first) = indices.first().copied() else {
        return Vec::new();
    };
    let count = |range: std::ops::RangeInclusive<MessageIndex>| -> usize {
        partitions
            .iter()
            .map(|partition| store.count_in_range(*partition, tag, range.clone()))
            .sum()
    };

    if flags.contains(StatisticsFlags::COMBINED_LOCATION) {
        let previous = count(MessageIndex::absolute_lower_bound()..=first);
        let next = count(first..=MessageIndex::absolute_upper_bound());
        // `first` is counted on both sides.
        let total = (previous + next).saturating_sub(1);
        let mut position = previous.checked_sub(1);
        for slot in &mut stats {
            if let Some(index) = position.filter(|index| *index < total) {
                slot.combined = Some(CombinedLocation {
                    index,
                    count: total,
                });
            }
            position = Some(position.map_or(0, |index| index + 1));
        }
    }

    if flags.contains(StatisticsFlags::LOCATION_WITHIN_MONTH) {
        let mut month = MonthIndex::from_timestamp(first.timestamp);
        let later = count(first..=MessageIndex::upper_bound_at(month.end_timestamp()));
        let mut remaining = later.checked_sub(1);
        for (slot, index) in stats.iter_mut().zip(indices) {
            let entry_month = MonthIndex::from_timestamp(index.timestamp);
            if entry_month != month {
                month = entry_month;
                let in_month = count(
                    MessageIndex::lower_bound_at(month.start_timestamp())
                        ..=MessageIndex::upper_bound_at(month.end_timestamp()),
                );
                remaining = in_month.checked_sub(1);
            }
            if let Some(index_in_month) = remaining {
                slot.month = Some(MonthLocation { index_in_month });
            }
            remaining = remaining.and_then(|index| index.checked_sub(1));
        }
    }

    stats
        .into_iter()
        .map(|slot| (slot != LocationStats::default()).then_some(slot))
        .collect()
}
