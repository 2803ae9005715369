//! Bit-flag types carried by messages and view configurations.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Category tags attached to a stored message.
    ///
    /// A view with a tag filter only shows messages carrying every bit of
    /// the filter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct TagMask: u32 {
        const PHOTO = 1 << 0;
        const VIDEO = 1 << 1;
        const FILE = 1 << 2;
        const MUSIC = 1 << 3;
        const WEB_PAGE = 1 << 4;
        const VOICE_OR_ROUND = 1 << 5;
        const UNSEEN_MENTION = 1 << 6;
        const PINNED = 1 << 7;
        const PHOTO_OR_VIDEO = Self::PHOTO.bits() | Self::VIDEO.bits();
    }
}

impl TagMask {
    /// Whether a message tagged with `self` passes the optional `filter`.
    #[inline]
    #[must_use]
    pub fn matches(self, filter: Option<Self>) -> bool {
        filter.is_none_or(|filter| self.contains(filter))
    }
}

bitflags! {
    /// Position statistics a view attaches to sampled entries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct StatisticsFlags: u8 {
        /// Absolute position of each entry among all matching messages.
        const COMBINED_LOCATION = 1 << 0;
        /// Position of each entry within its calendar month.
        const LOCATION_WITHIN_MONTH = 1 << 1;
    }
}
