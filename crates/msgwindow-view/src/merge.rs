//! Cross-partition k-way merge of per-partition windows.

use std::collections::BTreeMap;

use msgwindow_types::{MessageIndex, PartitionKey, WindowSide};

use crate::ordered_entries::OrderedEntries;

/// Position of one merged entry inside its partition window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedSlot {
    pub partition: PartitionKey,
    pub side: WindowSide,
    pub position: usize,
    pub index: MessageIndex,
}

/// Merge every partition window into one ascending, anchor-centered list of
/// at most `half_limit` entries per side.
///
/// Below the anchor the partition whose innermost remaining entry is the
/// greatest is taken first; above the anchor the least. Each direction stops
/// at `half_limit` or when every partition runs out on that side.
#[must_use]
pub fn merge_windows(
    windows: &BTreeMap<PartitionKey, OrderedEntries>,
    half_limit: usize,
) -> Vec<MergedSlot> {
    let mut merged = Vec::with_capacity(half_limit);
    let mut lower_cursors: Vec<(PartitionKey, &OrderedEntries, usize)> = windows
        .iter()
        .map(|(partition, window)| (*partition, window, window.lower_or_at_anchor().len()))
        .collect();
    while merged.len() < half_limit {
        let best = lower_cursors
            .iter_mut()
            .filter(|(_, _, remaining)| *remaining > 0)
            .max_by_key(|(_, window, remaining)| {
                window.lower_or_at_anchor()[*remaining - 1].index()
            });
        let Some((partition, window, remaining)) = best else {
            break;
        };
        *remaining -= 1;
        merged.push(MergedSlot {
            partition: *partition,
            side: WindowSide::LowerOrAtAnchor,
            position: *remaining,
            index: window.lower_or_at_anchor()[*remaining].index(),
        });
    }
    merged.reverse();

    let mut higher_cursors: Vec<(PartitionKey, &OrderedEntries, usize)> = windows
        .iter()
        .map(|(partition, window)| (*partition, window, 0))
        .collect();
    let mut higher_taken = 0;
    while higher_taken < half_limit {
        let best = higher_cursors
            .iter_mut()
            .filter(|(_, window, next)| *next < window.higher_than_anchor().len())
            .min_by_key(|(_, window, next)| window.higher_than_anchor()[*next].index());
        let Some((partition, window, next)) = best else {
            break;
        };
        merged.push(MergedSlot {
            partition: *partition,
            side: WindowSide::HigherThanAnchor,
            position: *next,
            index: window.higher_than_anchor()[*next].index(),
        });
        *next += 1;
        higher_taken += 1;
    }
    merged
}
