//! History-view observability counters.
//!
//! Process-local counters shared by every view in the process, updated with
//! relaxed atomics and read back through [`view_metrics_snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Window mutation types counted by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewOpType {
    Add,
    Remove,
    Update,
}

impl ViewOpType {
    /// Stable label used in logs and metrics dimensions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Update => "update",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewOperationTotals {
    pub add: u64,
    pub remove: u64,
    pub update: u64,
}

/// Snapshot of history-view observability metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewMetricsSnapshot {
    /// Counter by mutation type.
    pub msgwindow_operations_total: ViewOperationTotals,
    /// Entries evicted to keep a side within its half limit.
    pub msgwindow_evictions_total: u64,
    /// Partition sides re-read from the store.
    pub msgwindow_refills_total: u64,
    /// Samples produced by loaded views.
    pub msgwindow_samples_total: u64,
    /// Samples (or loading checks) that asked for a hole fetch.
    pub msgwindow_hole_requests_total: u64,
    /// Duplicate inserts and ordering violations observed.
    pub msgwindow_invariant_violations_total: u64,
    /// Entries rendered from their intermediate form.
    pub msgwindow_renders_total: u64,
}

static VIEW_OP_ADD_TOTAL: AtomicU64 = AtomicU64::new(0);
static VIEW_OP_REMOVE_TOTAL: AtomicU64 = AtomicU64::new(0);
static VIEW_OP_UPDATE_TOTAL: AtomicU64 = AtomicU64::new(0);
static VIEW_EVICTIONS_TOTAL: AtomicU64 = AtomicU64::new(0);
static VIEW_REFILLS_TOTAL: AtomicU64 = AtomicU64::new(0);
static VIEW_SAMPLES_TOTAL: AtomicU64 = AtomicU64::new(0);
static VIEW_HOLE_REQUESTS_TOTAL: AtomicU64 = AtomicU64::new(0);
static VIEW_INVARIANT_VIOLATIONS_TOTAL: AtomicU64 = AtomicU64::new(0);
static VIEW_RENDERS_TOTAL: AtomicU64 = AtomicU64::new(0);

pub(crate) fn record_operation(op_type: ViewOpType) {
    let counter = match op_type {
        ViewOpType::Add => &VIEW_OP_ADD_TOTAL,
        ViewOpType::Remove => &VIEW_OP_REMOVE_TOTAL,
        ViewOpType::Update => &VIEW_OP_UPDATE_TOTAL,
    };
    counter.fetch_add(1, Ordering::Relaxed);
    tracing::trace!(op = op_type.as_str(), "window operation");
}

pub(crate) fn record_eviction() {
    VIEW_EVICTIONS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_refill() {
    VIEW_REFILLS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

/// Record a produced sample and emit a trace span describing it.
pub(crate) fn record_sample(entries: usize, hole_requested: bool) {
    VIEW_SAMPLES_TOTAL.fetch_add(1, Ordering::Relaxed);
    if hole_requested {
        VIEW_HOLE_REQUESTS_TOTAL.fetch_add(1, Ordering::Relaxed);
    }
    let _span = tracing::trace_span!("view_sample", entries, hole_requested).entered();
}

pub(crate) fn record_hole_request() {
    VIEW_HOLE_REQUESTS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_invariant_violation() {
    VIEW_INVARIANT_VIOLATIONS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_render() {
    VIEW_RENDERS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

/// Return a snapshot of history-view observability counters.
#[must_use]
pub fn view_metrics_snapshot() -> ViewMetricsSnapshot {
    ViewMetricsSnapshot {
        msgwindow_operations_total: ViewOperationTotals {
            add: VIEW_OP_ADD_TOTAL.load(Ordering::Relaxed),
            remove: VIEW_OP_REMOVE_TOTAL.load(Ordering::Relaxed),
            update: VIEW_OP_UPDATE_TOTAL.load(Ordering::Relaxed),
        },
        msgwindow_evictions_total: VIEW_EVICTIONS_TOTAL.load(Ordering::Relaxed),
        msgwindow_refills_total: VIEW_REFILLS_TOTAL.load(Ordering::Relaxed),
        msgwindow_samples_total: VIEW_SAMPLES_TOTAL.load(Ordering::Relaxed),
        msgwindow_hole_requests_total: VIEW_HOLE_REQUESTS_TOTAL.load(Ordering::Relaxed),
        msgwindow_invariant_violations_total: VIEW_INVARIANT_VIOLATIONS_TOTAL
            .load(Ordering::Relaxed),
        msgwindow_renders_total: VIEW_RENDERS_TOTAL.load(Ordering::Relaxed),
    }
}

/// Reset all history-view observability counters.
pub fn reset_view_metrics() {
    for counter in [
        &VIEW_OP_ADD_TOTAL,
        &VIEW_OP_REMOVE_TOTAL,
        &VIEW_OP_UPDATE_TOTAL,
        &VIEW_EVICTIONS_TOTAL,
        &VIEW_REFILLS_TOTAL,
        &VIEW_SAMPLES_TOTAL,
        &VIEW_HOLE_REQUESTS_TOTAL,
        &VIEW_INVARIANT_VIOLATIONS_TOTAL,
        &VIEW_RENDERS_TOTAL,
    ] {
        counter.store(0, Ordering::Relaxed);
    }
}
