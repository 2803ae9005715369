//! Windowed message-history view engine.
//!
//! A [`HistoryView`] keeps a bounded, anchor-centered slice of one or more
//! message partitions, tracks which id ranges are missing locally, and turns
//! both into a [`Sample`] after every committed change:
//!
//! - [`OrderedEntries`] holds each partition's two-sided window
//! - [`merge_windows`] interleaves the partitions around the anchor
//! - [`sample_holes`] picks the nearest hole to fetch and what it cuts off
//! - [`LoadingState`] / [`LoadedState`] resolve the anchor and own the window

pub mod config;
pub mod entry;
pub mod hole_sampler;
pub mod hole_set;
pub mod instrumentation;
pub mod loaded;
pub mod loading;
pub mod merge;
pub mod message;
pub mod ordered_entries;
pub mod sample;
pub mod statistics;
pub mod store;
pub mod view;

pub use config::{
    AnchorRequest, DEFAULT_HALF_LIMIT, MAX_SCOPES, RECOMMENDED_MIN_HALF_LIMIT, ViewConfig,
};
pub use entry::{CombinedLocation, Entry, LocationStats, MonthLocation, RenderedEntry};
pub use hole_sampler::{ClipRange, HoleSampling, sample_holes};
pub use hole_set::HoleSet;
pub use instrumentation::{
    ViewMetricsSnapshot, ViewOpType, ViewOperationTotals, reset_view_metrics,
    view_metrics_snapshot,
};
pub use loaded::LoadedState;
pub use loading::{LoadingOutcome, LoadingState};
pub use merge::{MergedSlot, merge_windows};
pub use message::{GroupInfo, IntermediateMessage, Media, MediaId, Message, Peer, PeerId};
pub use msgwindow_error::{Result, ViewError};
pub use ordered_entries::{AddOutcome, OrderedEntries};
pub use sample::{HoleRequest, Sample, ViewSnapshot};
pub use statistics::compute_locations;
pub use store::{HistoryStore, MemoryHistoryStore, ReadState};
pub use view::HistoryView;
