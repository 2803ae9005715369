//! Per-subscription history view: the Loading/Loaded state machine behind
//! one consumer.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{debug, error};

use msgwindow_error::Result;
use msgwindow_types::{Anchor, MessageId, MessageIndex, PartitionKey, SEQUENCE_ID_MAX};

use crate::config::{AnchorRequest, ViewConfig};
use crate::hole_set::HoleSet;
use crate::loaded::LoadedState;
use crate::loading::{LoadingOutcome, LoadingState};
use crate::message::{GroupInfo, IntermediateMessage, Media, MediaId};
use crate::sample::ViewSnapshot;
use crate::store::HistoryStore;

#[derive(Debug, Clone)]
enum ViewState {
    Loading(LoadingState),
    Loaded(LoadedState),
}

/// A windowed view over the history of one or two conversations.
///
/// The view owns all of its state; callers feed it the store's change
/// events through the mutators and call [`HistoryView::sample`] after each
/// committed batch. It does no locking of its own.
#[derive(Debug, Clone)]
pub struct HistoryView {
    config: ViewConfig,
    partitions: SmallVec<[PartitionKey; 4]>,
    state: ViewState,
}

impl HistoryView {
    /// Validate `config` and resolve its anchor request against `store`.
    pub fn open<S: HistoryStore + ?Sized>(store: &S, config: ViewConfig) -> Result<Self> {
        config.validate()?;
        let mut partitions: SmallVec<[PartitionKey; 4]> = config
            .scopes
            .iter()
            .flat_map(|scope| {
                store
                    .namespaces(*scope)
                    .into_iter()
                    .map(move |namespace| PartitionKey::new(*scope, namespace))
            })
            .collect();

        let target = resolve_target(store, &config);
        if let Some((partition, _)) = target {
            partitions.push(partition);
        }
        partitions.sort_unstable();
        partitions.dedup();

        let holes = tracked_holes(store, &config, &partitions);
        let state = match target {
            Some((partition, target_id)) => {
                ViewState::Loading(LoadingState::new(partition, target_id, holes))
            }
            None => {
                let anchor = match config.anchor {
                    AnchorRequest::LowerBound => Anchor::LowerBound,
                    _ => Anchor::UpperBound,
                };
                ViewState::Loaded(load(store, &config, anchor, &partitions, holes))
            }
        };
        debug!(
            anchor = ?config.anchor,
            partitions = partitions.len(),
            loading = matches!(state, ViewState::Loading(_)),
            "history view opened"
        );
        Ok(Self {
            config,
            partitions,
            state,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Partitions currently windowed, including ones that joined after
    /// the view opened.
    #[must_use]
    pub fn partitions(&self) -> &[PartitionKey] {
        match &self.state {
            ViewState::Loaded(loaded) => loaded.partitions(),
            ViewState::Loading(_) => &self.partitions,
        }
    }

    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self.state, ViewState::Loaded(_))
    }

    /// The concrete anchor, once resolved.
    #[must_use]
    pub const fn anchor(&self) -> Option<Anchor> {
        match &self.state {
            ViewState::Loaded(loaded) => Some(loaded.anchor()),
            ViewState::Loading(_) => None,
        }
    }

    #[must_use]
    pub const fn loaded(&self) -> Option<&LoadedState> {
        match &self.state {
            ViewState::Loaded(loaded) => Some(loaded),
            ViewState::Loading(_) => None,
        }
    }

    /// Snapshot for the consumer, resolving a pending anchor first.
    pub fn sample<S: HistoryStore + ?Sized>(&mut self, store: &S) -> ViewSnapshot {
        let (anchor, holes) = match &mut self.state {
            ViewState::Loaded(loaded) => return ViewSnapshot::Loaded(loaded.sample(store)),
            ViewState::Loading(loading) => match loading.check_and_sample(store, self.config.tag) {
                LoadingOutcome::LoadHole(hole) => return ViewSnapshot::Loading { hole },
                LoadingOutcome::Ready(anchor) => (anchor, loading.holes().clone()),
            },
        };
        debug!(anchor = %anchor, "history view anchor resolved");
        let mut loaded = load(store, &self.config, anchor, &self.partitions, holes);
        let sample = loaded.sample(store);
        self.state = ViewState::Loaded(loaded);
        ViewSnapshot::Loaded(sample)
    }

    /// Replace the window with one opened at `anchor`.
    pub fn jump_to<S: HistoryStore + ?Sized>(
        &mut self,
        store: &S,
        anchor: AnchorRequest,
    ) -> Result<()> {
        let mut config = self.config.clone();
        config.anchor = anchor;
        *self = Self::open(store, config)?;
        Ok(())
    }

    /// Feed a message the store just gained.
    pub fn add(&mut self, message: IntermediateMessage) -> bool {
        let ViewState::Loaded(loaded) = &mut self.state else {
            return false;
        };
        let id = message.id();
        loaded.add(message).unwrap_or_else(|err| {
            error!(error = %err, kind = err.kind(), message = %id, "dropping duplicate insert");
            false
        })
    }

    pub fn remove(&mut self, index: &MessageIndex) -> bool {
        match &mut self.state {
            ViewState::Loaded(loaded) => loaded.remove(index),
            ViewState::Loading(_) => false,
        }
    }

    pub fn update_timestamp(&mut self, index: &MessageIndex, timestamp: u32) -> bool {
        let ViewState::Loaded(loaded) = &mut self.state else {
            return false;
        };
        loaded.update_timestamp(index, timestamp).unwrap_or_else(|err| {
            error!(error = %err, kind = err.kind(), "dropping re-keyed duplicate");
            false
        })
    }

    pub fn update_group_info(&mut self, updates: &HashMap<MessageId, Option<GroupInfo>>) -> bool {
        match &mut self.state {
            ViewState::Loaded(loaded) => loaded.update_group_info(updates),
            ViewState::Loading(_) => false,
        }
    }

    pub fn update_embedded_media(&mut self, index: &MessageIndex, payload: Vec<u8>) -> bool {
        match &mut self.state {
            ViewState::Loaded(loaded) => loaded.update_embedded_media(index, payload),
            ViewState::Loading(_) => false,
        }
    }

    pub fn update_media(&mut self, updates: &HashMap<MediaId, Option<Media>>) -> bool {
        match &mut self.state {
            ViewState::Loaded(loaded) => loaded.update_media(updates),
            ViewState::Loading(_) => false,
        }
    }

    /// Mark ids of `partition` missing. Ignored for conversations outside
    /// the view or namespaces that do not track holes.
    pub fn insert_hole(&mut self, partition: PartitionKey, range: RangeInclusive<u32>) -> bool {
        if !self.tracks_holes(partition) {
            debug!(partition = %partition, "ignoring hole edit for untracked partition");
            return false;
        }
        match &mut self.state {
            ViewState::Loaded(loaded) => loaded.insert_hole(partition, range),
            ViewState::Loading(loading) => {
                if let Err(position) = self.partitions.binary_search(&partition) {
                    self.partitions.insert(position, partition);
                }
                loading.insert_hole(partition, range)
            }
        }
    }

    pub fn remove_hole(&mut self, partition: PartitionKey, range: RangeInclusive<u32>) -> bool {
        if !self.tracks_holes(partition) {
            return false;
        }
        match &mut self.state {
            ViewState::Loaded(loaded) => loaded.remove_hole(partition, range),
            ViewState::Loading(loading) => loading.remove_hole(partition, range),
        }
    }

    fn tracks_holes(&self, partition: PartitionKey) -> bool {
        self.config.scopes.contains(&partition.conversation)
            && self.config.capabilities.tracks_holes(&partition)
    }
}

/// Partition and id a message-targeted anchor request starts from, or
/// `None` when the request resolves to a bound directly.
fn resolve_target<S: HistoryStore + ?Sized>(
    store: &S,
    config: &ViewConfig,
) -> Option<(PartitionKey, u32)> {
    match config.anchor {
        AnchorRequest::Message { id } => Some((id.partition, id.id)),
        AnchorRequest::LowerBound | AnchorRequest::UpperBound => None,
        AnchorRequest::FirstUnread => {
            let conversation = *config.scopes.first()?;
            let read_state = store.read_state(conversation)?;
            if read_state.unread_count == 0 {
                return None;
            }
            let partition = PartitionKey::new(conversation, read_state.namespace);
            Some((partition, read_state.max_read_id.saturating_add(1).min(SEQUENCE_ID_MAX)))
        }
    }
}

fn tracked_holes<S: HistoryStore + ?Sized>(
    store: &S,
    config: &ViewConfig,
    partitions: &[PartitionKey],
) -> BTreeMap<PartitionKey, HoleSet> {
    partitions
        .iter()
        .filter(|partition| config.capabilities.tracks_holes(partition))
        .map(|partition| (*partition, store.holes(*partition)))
        .collect()
}

fn load<S: HistoryStore + ?Sized>(
    store: &S,
    config: &ViewConfig,
    anchor: Anchor,
    partitions: &[PartitionKey],
    holes: BTreeMap<PartitionKey, HoleSet>,
) -> LoadedState {
    LoadedState::new(store, anchor, config, partitions, holes)
}
