//! Error type shared by the msgwindow crates.
//!
//! Normal window operation never fails. The variants here either describe a
//! structural invariant the upstream change feed broke (a duplicate insert,
//! a side found out of order) or a configuration the view refuses to open.

use msgwindow_types::{MessageIndex, PartitionKey, WindowSide};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// An entry with this index is already present in the window.
    #[error("duplicate entry {index} in partition {partition}")]
    DuplicateIndex {
        partition: PartitionKey,
        index: MessageIndex,
    },

    /// A window side is not sorted by message index.
    #[error("{side} of partition {partition} is out of order at position {position}")]
    NonMonotonic {
        partition: PartitionKey,
        side: WindowSide,
        position: usize,
    },

    /// The view configuration cannot be opened.
    #[error("invalid view configuration: {detail}")]
    InvalidConfig { detail: String },
}

impl ViewError {
    pub fn invalid_config(detail: impl Into<String>) -> Self {
        Self::InvalidConfig {
            detail: detail.into(),
        }
    }

    /// Whether the error reports broken upstream data rather than bad input.
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::DuplicateIndex { .. } | Self::NonMonotonic { .. })
    }

    /// Stable label used in logs and metrics dimensions.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateIndex { .. } => "duplicate_index",
            Self::NonMonotonic { .. } => "non_monotonic",
            Self::InvalidConfig { .. } => "invalid_config",
        }
    }
}
