//! Nearest-hole discovery.
//!
//! Each partition window is scanned outward from the anchor, one loaded
//! entry per step. A step covers the id range between the previous boundary
//! and the next loaded entry; once the loaded entries of a side run out and
//! the side is known to end there (or it is short of `half_limit`), the last
//! step reaches the edge of the id space. The first step whose range
//! intersects the partition's holes is that side's candidate, and its step
//! count is the candidate's distance from the anchor.
//!
//! Every candidate also clips the sample: nothing beyond the last entry
//! known to be contiguous with the anchor can be shown. Of all candidates
//! only the nearest becomes the [`HoleRequest`].

use std::collections::BTreeMap;

use tracing::{trace, warn};

use msgwindow_types::{
    Anchor, MessageIndex, PartitionKey, SEQUENCE_ID_MAX, SEQUENCE_ID_MIN, TagMask, WindowSide,
};

use crate::entry::Entry;
use crate::hole_set::HoleSet;
use crate::ordered_entries::OrderedEntries;
use crate::sample::HoleRequest;

/// Index region excluded from a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipRange {
    All,
    /// Every index strictly below the bound.
    Below(MessageIndex),
    /// Every index strictly above the bound.
    Above(MessageIndex),
}

impl ClipRange {
    #[must_use]
    pub fn contains(&self, index: &MessageIndex) -> bool {
        match self {
            Self::All => true,
            Self::Below(bound) => index < bound,
            Self::Above(bound) => index > bound,
        }
    }

    const fn clips_lower(&self) -> bool {
        matches!(self, Self::All | Self::Below(_))
    }

    const fn clips_higher(&self) -> bool {
        matches!(self, Self::All | Self::Above(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HoleSampling {
    pub clip_ranges: Vec<ClipRange>,
    pub hole: Option<HoleRequest>,
}

impl HoleSampling {
    #[must_use]
    pub fn holes_to_lower(&self) -> bool {
        self.clip_ranges.iter().any(ClipRange::clips_lower)
    }

    #[must_use]
    pub fn holes_to_higher(&self) -> bool {
        self.clip_ranges.iter().any(ClipRange::clips_higher)
    }

    #[must_use]
    pub fn is_clipped(&self, index: &MessageIndex) -> bool {
        self.clip_ranges.iter().any(|clip| clip.contains(index))
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    side: WindowSide,
    distance: usize,
    start_id: u32,
    end_id: u32,
    clip: ClipRange,
}

/// Find the clip ranges and the single nearest hole across all partitions.
///
/// `holes` only lists partitions that track holes; partitions without an
/// entry (or with an empty set) are treated as fully loaded.
#[must_use]
pub fn sample_holes(
    anchor: Anchor,
    tag: Option<TagMask>,
    half_limit: usize,
    windows: &BTreeMap<PartitionKey, OrderedEntries>,
    holes: &BTreeMap<PartitionKey, HoleSet>,
) -> HoleSampling {
    let mut sampling = HoleSampling::default();
    let mut nearest: Option<(PartitionKey, Candidate)> = None;

    for (partition, hole_set) in holes {
        if hole_set.is_empty() {
            continue;
        }

        if let Some(at) = anchor.index().filter(|at| at.partition == *partition) {
            if hole_set.contains(at.id) {
                trace!(partition = %partition, anchor_id = at.id, "anchor inside hole");
                return HoleSampling {
                    clip_ranges: vec![ClipRange::All],
                    hole: Some(HoleRequest {
                        partition: *partition,
                        tag,
                        id_ranges: hole_set.clone(),
                        start_id: at.id,
                        end_id: None,
                    }),
                };
            }
        }

        let Some(window) = windows.get(partition) else {
            continue;
        };
        let lower = scan_lower(anchor, half_limit, window, hole_set);
        let higher = scan_higher(anchor, half_limit, window, hole_set);
        sampling
            .clip_ranges
            .extend(lower.iter().chain(higher.iter()).map(|candidate| candidate.clip));

        let Some(chosen) = choose_side(anchor, window, lower, higher) else {
            continue;
        };
        trace!(
            partition = %partition,
            side = %chosen.side,
            distance = chosen.distance,
            start_id = chosen.start_id,
            hole_ranges = hole_set.range_count(),
            missing = hole_set.missing_count(),
            "hole candidate"
        );
        let closer = nearest
            .as_ref()
            .is_none_or(|(_, best)| chosen.distance < best.distance);
        if closer {
            nearest = Some((*partition, chosen));
        }
    }

    sampling.hole = nearest.and_then(|(partition, candidate)| {
        holes.get(&partition).map(|hole_set| HoleRequest {
            partition,
            tag,
            id_ranges: hole_set.clone(),
            start_id: candidate.start_id,
            end_id: Some(candidate.end_id),
        })
    });
    sampling
}

/// Split the id gap that straddles the anchor cut between the two scans.
///
/// Returns `(lower_top, higher_bottom)`: the lower scan's first step ends at
/// `lower_top` and the higher scan's first step starts at `higher_bottom`, so
/// a missing id in the gap is attributed to one side only. In a partition
/// other than the anchor's the cut is estimated from the anchor timestamp
/// between the two loaded neighbours; with a single neighbour the gap goes to
/// the side that has none.
fn straddle_split(anchor: Anchor, window: &OrderedEntries) -> (u32, u32) {
    let at = match anchor {
        Anchor::LowerBound => return (SEQUENCE_ID_MIN, SEQUENCE_ID_MIN),
        Anchor::UpperBound => return (SEQUENCE_ID_MAX, SEQUENCE_ID_MAX),
        Anchor::At(at) => at,
    };
    if at.partition == window.partition() {
        return (at.id, at.id);
    }
    let below = window.lower_or_at_anchor().last().map(Entry::index);
    let above = window.higher_than_anchor().first().map(Entry::index);
    match (below, above) {
        (Some(below), Some(above)) => {
            let cut = interpolate_cut(below, above, at.timestamp);
            (cut, cut.saturating_add(1))
        }
        (Some(below), None) => (below.id, below.id),
        (None, Some(above)) => (above.id, above.id),
        (None, None) => (SEQUENCE_ID_MAX, SEQUENCE_ID_MIN),
    }
}

/// Last id expected at or before `timestamp`, assuming ids advance evenly in
/// time between `below` and `above`.
fn interpolate_cut(below: MessageIndex, above: MessageIndex, timestamp: u32) -> u32 {
    if above.id <= below.id.saturating_add(1) {
        return below.id;
    }
    let span_time = u64::from(above.timestamp.saturating_sub(below.timestamp));
    if span_time == 0 {
        return below.id;
    }
    let elapsed = u64::from(timestamp.saturating_sub(below.timestamp)).min(span_time);
    let offset = u64::from(above.id - below.id) * elapsed / span_time;
    let last = above.id - 1;
    u32::try_from(u64::from(below.id) + offset).map_or(last, |cut| cut.min(last))
}

/// Order a step's bounds, logging bounds that arrive reversed.
fn step_range(partition: PartitionKey, side: WindowSide, inner: u32, outer: u32) -> (u32, u32) {
    let (low, high) = match side {
        WindowSide::LowerOrAtAnchor => (outer, inner),
        WindowSide::HigherThanAnchor => (inner, outer),
    };
    if low > high {
        warn!(
            partition = %partition,
            side = %side,
            low,
            high,
            "sequence ids out of order with message indices"
        );
        return (high, low);
    }
    (low, high)
}

fn scan_lower(
    anchor: Anchor,
    half_limit: usize,
    window: &OrderedEntries,
    hole_set: &HoleSet,
) -> Option<Candidate> {
    if matches!(anchor, Anchor::LowerBound) {
        return None;
    }
    let partition = window.partition();
    let lower = window.lower_or_at_anchor();
    let loaded = lower.len();
    let (lower_top, _) = straddle_split(anchor, window);
    // The anchor's own entry closes no gap; counting starts below it.
    let skip = usize::from(matches!(
        (anchor.index(), lower.last()),
        (Some(at), Some(entry)) if entry.index() == at
    ));

    for step in skip..=loaded {
        let inner_id = if step == 0 {
            lower_top
        } else {
            lower[loaded - step].index().id
        };
        let outer_id = if step < loaded {
            lower[loaded - step - 1].index().id
        } else if loaded < half_limit || window.is_exhausted(WindowSide::LowerOrAtAnchor) {
            SEQUENCE_ID_MIN
        } else {
            break;
        };

        let (low, high) = step_range(partition, WindowSide::LowerOrAtAnchor, inner_id, outer_id);
        if !hole_set.intersects(low..=high) {
            continue;
        }
        let start_id = hole_set.max_at_or_below(high)?;
        let clip = if step == 0 {
            anchor.index().map_or(ClipRange::All, ClipRange::Below)
        } else {
            ClipRange::Below(lower[loaded - step].index())
        };
        return Some(Candidate {
            side: WindowSide::LowerOrAtAnchor,
            distance: step + 1 - skip,
            start_id,
            end_id: SEQUENCE_ID_MIN,
            clip,
        });
    }
    None
}

fn scan_higher(
    anchor: Anchor,
    half_limit: usize,
    window: &OrderedEntries,
    hole_set: &HoleSet,
) -> Option<Candidate> {
    if matches!(anchor, Anchor::UpperBound) {
        return None;
    }
    let partition = window.partition();
    let higher = window.higher_than_anchor();
    let loaded = higher.len();
    let (_, higher_bottom) = straddle_split(anchor, window);

    for step in 0..=loaded {
        let inner_id = if step == 0 {
            higher_bottom
        } else {
            higher[step - 1].index().id
        };
        let outer_id = if step < loaded {
            higher[step].index().id
        } else if loaded < half_limit || window.is_exhausted(WindowSide::HigherThanAnchor) {
            SEQUENCE_ID_MAX
        } else {
            break;
        };

        let (low, high) = step_range(partition, WindowSide::HigherThanAnchor, inner_id, outer_id);
        if !hole_set.intersects(low..=high) {
            continue;
        }
        let start_id = hole_set.min_at_or_above(low)?;
        let clip = if step == 0 {
            anchor.index().map_or(ClipRange::All, ClipRange::Above)
        } else {
            ClipRange::Above(higher[step - 1].index())
        };
        return Some(Candidate {
            side: WindowSide::HigherThanAnchor,
            distance: step + 1,
            start_id,
            end_id: SEQUENCE_ID_MAX,
            clip,
        });
    }
    None
}

/// Pick one side's candidate for a partition: the side that has loaded
/// entries when only one does, else the nearer one. Equal distances go to
/// the lower side, or to the higher side under a `LowerBound` anchor.
fn choose_side(
    anchor: Anchor,
    window: &OrderedEntries,
    lower: Option<Candidate>,
    higher: Option<Candidate>,
) -> Option<Candidate> {
    let (lower, higher) = match (lower, higher) {
        (Some(lower), Some(higher)) => (lower, higher),
        (lower, higher) => return lower.or(higher),
    };
    let lower_loaded = !window.lower_or_at_anchor().is_empty();
    let higher_loaded = !window.higher_than_anchor().is_empty();
    if lower_loaded != higher_loaded {
        return Some(if lower_loaded { lower } else { higher });
    }
    Some(match lower.distance.cmp(&higher.distance) {
        std::cmp::Ordering::Less => lower,
        std::cmp::Ordering::Greater => higher,
        std::cmp::Ordering::Equal if matches!(anchor, Anchor::LowerBound) => higher,
        std::cmp::Ordering::Equal => lower,
    })
}

#[cfg(test)]
mod tests {
    use msgwindow_types::{ConversationId, MessageId, Namespace};

    use super::*;
    use crate::message::IntermediateMessage;

    fn partition(namespace: u32) -> PartitionKey {
        PartitionKey::new(ConversationId(1), Namespace(namespace))
    }

    fn index_in(partition: PartitionKey, id: u32) -> MessageIndex {
        MessageIndex::new(MessageId::new(partition, id), id)
    }

    fn window(
        partition: PartitionKey,
        anchor: Anchor,
        half_limit: usize,
        ids: &[u32],
        exhausted: bool,
    ) -> OrderedEntries {
        let mut window = OrderedEntries::new(partition, anchor, half_limit);
        let (lower, higher): (Vec<u32>, Vec<u32>) = ids
            .iter()
            .partition(|id| anchor.is_equal_or_greater(&index_in(partition, **id)));
        let entry =
            |id: &u32| Entry::intermediate(IntermediateMessage::new(index_in(partition, *id), ""));
        window.extend_outward(
            WindowSide::LowerOrAtAnchor,
            lower.iter().rev().map(entry),
            exhausted,
        );
        window.extend_outward(WindowSide::HigherThanAnchor, higher.iter().map(entry), exhausted);
        window
    }

    fn single(
        anchor: Anchor,
        half_limit: usize,
        ids: &[u32],
        exhausted: bool,
        holes: HoleSet,
    ) -> HoleSampling {
        let p = partition(0);
        let windows = BTreeMap::from([(p, window(p, anchor, half_limit, ids, exhausted))]);
        let holes = BTreeMap::from([(p, holes)]);
        sample_holes(anchor, None, half_limit, &windows, &holes)
    }

    #[test]
    fn no_holes_no_request() {
        let anchor = Anchor::At(index_in(partition(0), 30));
        let sampling = single(anchor, 2, &[20, 30, 40, 50], false, HoleSet::new());
        assert!(sampling.hole.is_none(), "case=no_holes");
        assert!(sampling.clip_ranges.is_empty());
        assert!(!sampling.holes_to_lower() && !sampling.holes_to_higher());
    }

    #[test]
    fn hole_below_exhausted_side_is_requested_and_clipped() {
        let anchor = Anchor::At(index_in(partition(0), 30));
        let sampling = single(
            anchor,
            2,
            &[20, 30, 40, 50],
            true,
            HoleSet::from_ranges([1..=19]),
        );
        let hole = sampling.hole.clone().expect("hole below 20");
        assert_eq!(hole.start_id, 19, "case=nearest_missing_id");
        assert_eq!(hole.end_id, Some(SEQUENCE_ID_MIN));
        assert_eq!(sampling.clip_ranges, vec![ClipRange::Below(index_in(partition(0), 20))]);
        assert!(sampling.holes_to_lower());
        assert!(!sampling.holes_to_higher());
        assert!(!sampling.is_clipped(&index_in(partition(0), 20)), "case=boundary_kept");
        assert!(sampling.is_clipped(&index_in(partition(0), 19)));
    }

    #[test]
    fn full_side_does_not_scan_past_loaded_entries() {
        let anchor = Anchor::At(index_in(partition(0), 30));
        let sampling = single(anchor, 2, &[20, 30, 40, 50], false, HoleSet::from_ranges([1..=19]));
        assert!(sampling.hole.is_none(), "case=unknown_beyond_full_side");
        assert!(sampling.clip_ranges.is_empty());
    }

    #[test]
    fn anchor_inside_hole_short_circuits() {
        let anchor = Anchor::At(index_in(partition(0), 25));
        let sampling = single(anchor, 2, &[10, 40], false, HoleSet::from_ranges([20..=29]));
        assert_eq!(sampling.clip_ranges, vec![ClipRange::All]);
        let hole = sampling.hole.expect("anchor hole");
        assert_eq!(hole.start_id, 25, "case=fetch_from_anchor");
        assert_eq!(hole.end_id, None);
    }

    #[test]
    fn hole_between_loaded_entries_is_found_at_its_step() {
        let anchor = Anchor::At(index_in(partition(0), 30));
        let sampling = single(anchor, 3, &[30, 40, 70, 80], false, HoleSet::from_ranges([50..=60]));
        let hole = sampling.hole.clone().expect("hole above");
        assert_eq!(hole.start_id, 50);
        assert_eq!(hole.end_id, Some(SEQUENCE_ID_MAX));
        assert_eq!(sampling.clip_ranges, vec![ClipRange::Above(index_in(partition(0), 40))]);
        assert!(sampling.holes_to_higher() && !sampling.holes_to_lower());
    }

    #[test]
    fn nearer_side_wins_and_both_sides_clip() {
        let anchor = Anchor::At(index_in(partition(0), 30));
        let holes = HoleSet::from_ranges([5..=5, 35..=35]);
        let sampling = single(anchor, 3, &[10, 20, 30, 40, 50], true, holes);
        let hole = sampling.hole.clone().expect("hole");
        assert_eq!(hole.start_id, 35, "case=higher_is_nearer");
        assert_eq!(sampling.clip_ranges.len(), 2);
        assert!(sampling.holes_to_lower() && sampling.holes_to_higher());
    }

    #[test]
    fn equal_distance_prefers_lower_except_at_lower_bound() {
        let anchor = Anchor::At(index_in(partition(0), 30));
        let holes = HoleSet::from_ranges([25..=25, 35..=35]);
        let sampling = single(anchor, 3, &[20, 30, 40], false, holes.clone());
        assert_eq!(sampling.hole.map(|h| h.start_id), Some(25), "case=tie_goes_lower");

        let p = partition(0);
        let empty = window(p, Anchor::LowerBound, 3, &[], true);
        let lower = Candidate {
            side: WindowSide::LowerOrAtAnchor,
            distance: 1,
            start_id: 25,
            end_id: SEQUENCE_ID_MIN,
            clip: ClipRange::All,
        };
        let higher = Candidate {
            side: WindowSide::HigherThanAnchor,
            end_id: SEQUENCE_ID_MAX,
            ..lower
        };
        let choice = choose_side(Anchor::LowerBound, &empty, Some(lower), Some(higher));
        assert_eq!(
            choice.map(|c| c.side),
            Some(WindowSide::HigherThanAnchor),
            "case=lower_bound_prefers_higher"
        );
    }

    #[test]
    fn loaded_side_beats_nearer_empty_side() {
        let anchor = Anchor::At(index_in(partition(9), 25));
        let p = partition(0);
        let only_lower = window(p, anchor, 3, &[10, 20], true);
        let lower = Candidate {
            side: WindowSide::LowerOrAtAnchor,
            distance: 3,
            start_id: 5,
            end_id: SEQUENCE_ID_MIN,
            clip: ClipRange::Below(index_in(p, 10)),
        };
        let higher = Candidate {
            side: WindowSide::HigherThanAnchor,
            distance: 1,
            start_id: 100,
            end_id: SEQUENCE_ID_MAX,
            clip: ClipRange::Above(index_in(p, 20)),
        };
        let choice = choose_side(anchor, &only_lower, Some(lower), Some(higher));
        assert_eq!(choice.map(|c| c.start_id), Some(5), "case=prefer_loaded_side");
    }

    #[test]
    fn upper_bound_gap_above_latest_clips_everything() {
        let holes = HoleSet::from_ranges([5..=5, 100..=100]);
        let sampling = single(Anchor::UpperBound, 3, &[10, 20], true, holes);
        assert_eq!(sampling.clip_ranges, vec![ClipRange::All]);
        let hole = sampling.hole.expect("hole");
        assert_eq!(hole.start_id, 100, "case=gap_after_latest_is_adjacent");
        assert_eq!(hole.end_id, Some(SEQUENCE_ID_MIN));
    }

    #[test]
    fn nearest_partition_wins_across_partitions() {
        let anchor = Anchor::UpperBound;
        let near = partition(1);
        let far = partition(2);
        let windows = BTreeMap::from([
            (near, window(near, anchor, 3, &[10, 20, 30], false)),
            (far, window(far, anchor, 3, &[10, 20, 30], false)),
        ]);
        let holes = BTreeMap::from([
            (near, HoleSet::from_ranges([25..=25])),
            (far, HoleSet::from_ranges([15..=15])),
        ]);
        let sampling = sample_holes(anchor, Some(TagMask::PHOTO), 3, &windows, &holes);
        let hole = sampling.hole.clone().expect("hole");
        assert_eq!(hole.partition, near, "case=smallest_distance");
        assert_eq!(hole.tag, Some(TagMask::PHOTO));
        assert_eq!(sampling.clip_ranges.len(), 2, "case=every_partition_clips");
    }

    #[test]
    fn straddling_gap_in_other_partition_goes_to_one_side() {
        let home = partition(0);
        let other = partition(1);
        let anchor = Anchor::At(index_in(home, 30));
        let windows = BTreeMap::from([
            (home, window(home, anchor, 2, &[20, 30, 40, 50], true)),
            (other, window(other, anchor, 2, &[10, 50], true)),
        ]);
        let holes = BTreeMap::from([(other, HoleSet::from_ranges([40..=45]))]);
        let sampling = sample_holes(anchor, None, 2, &windows, &holes);

        assert_eq!(
            sampling.clip_ranges,
            vec![ClipRange::Above(index_in(home, 30))],
            "case=single_side_clip"
        );
        assert!(!sampling.is_clipped(&index_in(home, 30)), "case=anchor_kept");
        assert!(!sampling.is_clipped(&index_in(home, 20)));
        let hole = sampling.hole.expect("hole above the cut");
        assert_eq!(hole.partition, other);
        assert_eq!(hole.start_id, 40);
        assert_eq!(hole.end_id, Some(SEQUENCE_ID_MAX), "case=points_up");
    }

    #[test]
    fn straddling_gap_below_cut_is_lower() {
        let home = partition(0);
        let other = partition(1);
        let anchor = Anchor::At(index_in(home, 30));
        let windows = BTreeMap::from([(other, window(other, anchor, 2, &[10, 50], true))]);
        let holes = BTreeMap::from([(other, HoleSet::from_ranges([15..=20]))]);
        let sampling = sample_holes(anchor, None, 2, &windows, &holes);
        assert_eq!(sampling.clip_ranges, vec![ClipRange::Below(index_in(home, 30))]);
        let hole = sampling.hole.expect("hole below the cut");
        assert_eq!(hole.start_id, 20, "case=nearest_below_cut");
        assert_eq!(hole.end_id, Some(SEQUENCE_ID_MIN));
    }

    #[test]
    fn cut_interpolates_anchor_time_between_neighbours() {
        let p = partition(1);
        let below = MessageIndex::new(MessageId::new(p, 100), 1_000);
        let above = MessageIndex::new(MessageId::new(p, 200), 2_000);
        assert_eq!(interpolate_cut(below, above, 1_500), 150);
        assert_eq!(interpolate_cut(below, above, 1_000), 100);
        assert_eq!(interpolate_cut(below, above, 2_000), 199, "case=cut_below_above");
        let adjacent = MessageIndex::new(MessageId::new(p, 101), 2_000);
        assert_eq!(interpolate_cut(below, adjacent, 1_500), 100);
    }
}
