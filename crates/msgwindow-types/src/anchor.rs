//! Window anchors: the cut point a view is centered on.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::MessageIndex;

/// Cut point of a window.
///
/// `LowerBound` compares below every index and `UpperBound` above every
/// index, including the absolute bounds of [`MessageIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    LowerBound,
    UpperBound,
    At(MessageIndex),
}

impl Anchor {
    /// Order of the anchor relative to `index`.
    #[must_use]
    pub fn cmp_index(&self, index: &MessageIndex) -> Ordering {
        match self {
            Self::LowerBound => Ordering::Less,
            Self::UpperBound => Ordering::Greater,
            Self::At(at) => at.cmp(index),
        }
    }

    /// `anchor < index`
    #[inline]
    #[must_use]
    pub fn is_lower(&self, index: &MessageIndex) -> bool {
        self.cmp_index(index) == Ordering::Less
    }

    /// `anchor > index`
    #[inline]
    #[must_use]
    pub fn is_greater(&self, index: &MessageIndex) -> bool {
        self.cmp_index(index) == Ordering::Greater
    }

    /// `anchor <= index`
    #[inline]
    #[must_use]
    pub fn is_equal_or_lower(&self, index: &MessageIndex) -> bool {
        self.cmp_index(index) != Ordering::Greater
    }

    /// `anchor >= index`; such an index belongs to the lower side of a window.
    #[inline]
    #[must_use]
    pub fn is_equal_or_greater(&self, index: &MessageIndex) -> bool {
        self.cmp_index(index) != Ordering::Less
    }

    #[must_use]
    pub const fn index(&self) -> Option<MessageIndex> {
        match self {
            Self::At(index) => Some(*index),
            Self::LowerBound | Self::UpperBound => None,
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowerBound => f.write_str("lower_bound"),
            Self::UpperBound => f.write_str("upper_bound"),
            Self::At(index) => write!(f, "at({index})"),
        }
    }
}
