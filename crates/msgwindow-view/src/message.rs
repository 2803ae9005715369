//! Message payloads as stored (`IntermediateMessage`) and as rendered for a
//! consumer (`Message`).
//!
//! Cross-message references (reply targets) and shared resources (authors,
//! media) are carried as ids and resolved through the store at render time.

use serde::{Deserialize, Serialize};

use msgwindow_types::{MessageId, MessageIndex, TagMask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub u64);

/// Album/grouping marker shared by messages sent together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupInfo {
    pub stable_id: u32,
}

/// Author or contact metadata attached at render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub display_name: String,
}

/// A media attachment; embedded media has no id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub id: Option<MediaId>,
    pub payload: Vec<u8>,
}

impl Media {
    #[must_use]
    pub fn embedded(payload: Vec<u8>) -> Self {
        Self { id: None, payload }
    }
}

/// Message as the store hands it out: references are unresolved ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntermediateMessage {
    pub index: MessageIndex,
    pub tags: TagMask,
    pub group_info: Option<GroupInfo>,
    pub author_id: Option<PeerId>,
    pub text: String,
    pub embedded_media: Option<Vec<u8>>,
    pub referenced_media: Vec<MediaId>,
    pub reply_to: Option<MessageId>,
}

impl IntermediateMessage {
    /// Bare message with no metadata; the store and tests fill in the rest.
    #[must_use]
    pub fn new(index: MessageIndex, text: impl Into<String>) -> Self {
        Self {
            index,
            tags: TagMask::empty(),
            group_info: None,
            author_id: None,
            text: text.into(),
            embedded_media: None,
            referenced_media: Vec::new(),
            reply_to: None,
        }
    }

    #[must_use]
    pub fn with_tags(mut self, tags: TagMask) -> Self {
        self.tags = tags;
        self
    }

    #[must_use]
    pub fn with_author(mut self, author: PeerId) -> Self {
        self.author_id = Some(author);
        self
    }

    #[must_use]
    pub fn with_media(mut self, media: impl IntoIterator<Item = MediaId>) -> Self {
        self.referenced_media = media.into_iter().collect();
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.index.message_id()
    }
}

/// Message with author and media metadata attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub index: MessageIndex,
    pub tags: TagMask,
    pub group_info: Option<GroupInfo>,
    pub author: Option<Peer>,
    pub text: String,
    pub embedded_media: Option<Media>,
    /// Resolved referenced media, in `referenced_media` order.
    pub media: Vec<Media>,
    pub referenced_media: Vec<MediaId>,
    pub reply_to: Option<MessageId>,
}

impl Message {
    #[inline]
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.index.message_id()
    }

    /// Replace or drop referenced media. Returns whether anything changed.
    pub(crate) fn apply_media_update(&mut self, id: MediaId, update: Option<&Media>) -> bool {
        if !self.referenced_media.contains(&id) {
            return false;
        }
        let before = self.media.len();
        let previous = self
            .media
            .iter()
            .position(|media| media.id == Some(id))
            .map(|position| self.media.remove(position));
        match update {
            Some(media) => {
                let replacement = Media {
                    id: Some(id),
                    payload: media.payload.clone(),
                };
                let changed = previous.as_ref() != Some(&replacement);
                self.media.push(replacement);
                let order = &self.referenced_media;
                self.media.sort_by_key(|media| {
                    media
                        .id
                        .and_then(|id| order.iter().position(|candidate| *candidate == id))
                });
                changed
            }
            None => self.media.len() != before,
        }
    }
}
