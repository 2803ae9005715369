//! Backing-store contract consumed by the view engine, plus an in-memory
//! implementation.
//!
//! Every call is synchronous; the caller is expected to hold whatever
//! transaction or snapshot context the store needs for the duration of a
//! view operation.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Bound, RangeInclusive};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use msgwindow_types::{ConversationId, MessageId, MessageIndex, Namespace, PartitionKey, TagMask};

use crate::hole_set::HoleSet;
use crate::message::{IntermediateMessage, Media, MediaId, Message, Peer, PeerId};

/// Read position of a conversation, used to resolve "first unread".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadState {
    pub namespace: Namespace,
    pub max_read_id: u32,
    pub unread_count: u32,
}

/// Read-side queries a history view issues against its store.
pub trait HistoryStore {
    /// Messages of `partition` passing `tag`, walking from `from` towards `to`
    /// (ascending when `to >= from`, descending otherwise). `from` itself is
    /// only returned when `include_from` is set; `to` is inclusive.
    fn fetch(
        &self,
        partition: PartitionKey,
        tag: Option<TagMask>,
        from: MessageIndex,
        include_from: bool,
        to: MessageIndex,
        limit: usize,
    ) -> Vec<IntermediateMessage>;

    /// Current index of a stored message.
    fn index_of(&self, id: MessageId) -> Option<MessageIndex>;

    /// Index of the stored message with the smallest id greater than
    /// `id.id` in the same partition.
    fn index_higher_than(&self, id: MessageId) -> Option<MessageIndex>;

    /// Namespaces a conversation has messages or holes in.
    fn namespaces(&self, conversation: ConversationId) -> Vec<Namespace>;

    /// Number of messages of `partition` passing `tag` inside `range`.
    fn count_in_range(
        &self,
        partition: PartitionKey,
        tag: Option<TagMask>,
        range: RangeInclusive<MessageIndex>,
    ) -> usize;

    fn holes(&self, partition: PartitionKey) -> HoleSet;

    fn read_state(&self, conversation: ConversationId) -> Option<ReadState>;

    /// Attach author and media metadata to a stored message.
    fn render(&self, message: &IntermediateMessage) -> Message;
}

/// `BTreeMap`-backed store.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryStore {
    messages: BTreeMap<PartitionKey, BTreeMap<MessageIndex, IntermediateMessage>>,
    indices: BTreeMap<MessageId, MessageIndex>,
    holes: BTreeMap<PartitionKey, HoleSet>,
    peers: HashMap<PeerId, Peer>,
    media: HashMap<MediaId, Media>,
    read_states: BTreeMap<ConversationId, ReadState>,
}

impl MemoryHistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a message; returns the replaced one.
    pub fn insert_message(&mut self, message: IntermediateMessage) -> Option<IntermediateMessage> {
        let id = message.id();
        let previous = self.remove_message(id);
        self.indices.insert(id, message.index);
        self.messages
            .entry(id.partition)
            .or_default()
            .insert(message.index, message);
        previous
    }

    pub fn remove_message(&mut self, id: MessageId) -> Option<IntermediateMessage> {
        let index = self.indices.remove(&id)?;
        self.messages
            .get_mut(&id.partition)
            .and_then(|partition| partition.remove(&index))
    }

    /// Move a message to a new timestamp; returns its old and new index.
    pub fn update_timestamp(
        &mut self,
        id: MessageId,
        timestamp: u32,
    ) -> Option<(MessageIndex, MessageIndex)> {
        let mut message = self.remove_message(id)?;
        let old = message.index;
        message.index = old.with_timestamp(timestamp);
        let new = message.index;
        self.insert_message(message);
        Some((old, new))
    }

    pub fn message(&self, id: MessageId) -> Option<&IntermediateMessage> {
        let index = self.indices.get(&id)?;
        self.messages.get(&id.partition)?.get(index)
    }

    pub fn message_mut(&mut self, id: MessageId) -> Option<&mut IntermediateMessage> {
        let index = self.indices.get(&id)?;
        self.messages.get_mut(&id.partition)?.get_mut(index)
    }

    pub fn insert_hole(&mut self, partition: PartitionKey, range: RangeInclusive<u32>) -> bool {
        self.holes.entry(partition).or_default().insert(range)
    }

    pub fn remove_hole(&mut self, partition: PartitionKey, range: RangeInclusive<u32>) -> bool {
        self.holes
            .get_mut(&partition)
            .is_some_and(|holes| holes.remove(range))
    }

    pub fn set_peer(&mut self, peer: Peer) {
        self.peers.insert(peer.id, peer);
    }

    /// Store a media item; `media.id` must be set.
    pub fn set_media(&mut self, media: Media) {
        if let Some(id) = media.id {
            self.media.insert(id, media);
        } else {
            debug!("ignoring media without id");
        }
    }

    pub fn remove_media(&mut self, id: MediaId) -> Option<Media> {
        self.media.remove(&id)
    }

    pub fn set_read_state(&mut self, conversation: ConversationId, state: ReadState) {
        self.read_states.insert(conversation, state);
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.indices.len()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn fetch(
        &self,
        partition: PartitionKey,
        tag: Option<TagMask>,
        from: MessageIndex,
        include_from: bool,
        to: MessageIndex,
        limit: usize,
    ) -> Vec<IntermediateMessage> {
        let Some(messages) = self.messages.get(&partition) else {
            return Vec::new();
        };
        let from_bound = if include_from {
            Bound::Included(from)
        } else {
            Bound::Excluded(from)
        };
        let matching = |message: &&IntermediateMessage| message.tags.matches(tag);
        if to >= from {
            messages
                .range((from_bound, Bound::Included(to)))
                .map(|(_, message)| message)
                .filter(matching)
                .take(limit)
                .cloned()
                .collect()
        } else {
            messages
                .range((Bound::Included(to), from_bound))
                .rev()
                .map(|(_, message)| message)
                .filter(matching)
                .take(limit)
                .cloned()
                .collect()
        }
    }

    fn index_of(&self, id: MessageId) -> Option<MessageIndex> {
        self.indices.get(&id).copied()
    }

    fn index_higher_than(&self, id: MessageId) -> Option<MessageIndex> {
        let next = MessageId::new(id.partition, id.id.checked_add(1)?);
        self.indices
            .range(next..=MessageId::new(id.partition, u32::MAX))
            .next()
            .map(|(_, index)| *index)
    }

    fn namespaces(&self, conversation: ConversationId) -> Vec<Namespace> {
        let with_messages = self
            .messages
            .iter()
            .filter(|(_, messages)| !messages.is_empty())
            .map(|(partition, _)| partition);
        let with_holes = self
            .holes
            .iter()
            .filter(|(_, holes)| !holes.is_empty())
            .map(|(partition, _)| partition);
        with_messages
            .chain(with_holes)
            .filter(|partition| partition.conversation == conversation)
            .map(|partition| partition.namespace)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn count_in_range(
        &self,
        partition: PartitionKey,
        tag: Option<TagMask>,
        range: RangeInclusive<MessageIndex>,
    ) -> usize {
        if range.start() > range.end() {
            return 0;
        }
        self.messages.get(&partition).map_or(0, |messages| {
            messages
                .range(range)
                .filter(|(_, message)| message.tags.matches(tag))
                .count()
        })
    }

    fn holes(&self, partition: PartitionKey) -> HoleSet {
        self.holes.get(&partition).cloned().unwrap_or_default()
    }

    fn read_state(&self, conversation: ConversationId) -> Option<ReadState> {
        self.read_states.get(&conversation).copied()
    }

    fn render(&self, message: &IntermediateMessage) -> Message {
        Message {
            index: message.index,
            tags: message.tags,
            group_info: message.group_info,
            author: message
                .author_id
                .and_then(|author| self.peers.get(&author).cloned()),
            text: message.text.clone(),
            embedded_media: message.embedded_media.clone().map(Media::embedded),
            media: message
                .referenced_media
                .iter()
                .filter_map(|id| self.media.get(id).cloned())
                .collect(),
            referenced_media: message.referenced_media.clone(),
            reply_to: message.reply_to,
        }
    }
}
