//! Externally visible snapshot types.

use serde::{Deserialize, Serialize};

use msgwindow_types::{Anchor, PartitionKey, TagMask};

use crate::entry::RenderedEntry;
use crate::hole_set::HoleSet;

/// The single gap the fetch scheduler should fill next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoleRequest {
    pub partition: PartitionKey,
    pub tag: Option<TagMask>,
    /// Every range currently missing in `partition`.
    pub id_ranges: HoleSet,
    /// Id the fetch should start from.
    pub start_id: u32,
    /// Id the fetch should move towards; `None` when the fetch must be
    /// centered on `start_id` because the anchor itself is missing.
    pub end_id: Option<u32>,
}

/// Bounded, rendered snapshot of a loaded window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub anchor: Anchor,
    /// Ascending by message index.
    pub entries: Vec<RenderedEntry>,
    pub holes_to_lower: bool,
    pub holes_to_higher: bool,
    pub hole: Option<HoleRequest>,
}

impl Sample {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.hole.is_none() && !self.holes_to_lower && !self.holes_to_higher
    }
}

/// What a view hands its consumer for one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ViewSnapshot {
    /// The starting point is still being resolved and is blocked on `hole`.
    Loading { hole: HoleRequest },
    Loaded(Sample),
}

impl ViewSnapshot {
    #[must_use]
    pub const fn sample(&self) -> Option<&Sample> {
        match self {
            Self::Loaded(sample) => Some(sample),
            Self::Loading { .. } => None,
        }
    }

    /// The hole the caller should fetch, whichever state the view is in.
    #[must_use]
    pub const fn hole(&self) -> Option<&HoleRequest> {
        match self {
            Self::Loading { hole } => Some(hole),
            Self::Loaded(sample) => sample.hole.as_ref(),
        }
    }
}
