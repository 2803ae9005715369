//! Message identity and the total order shared by every window.
//!
//! A [`MessageIndex`] orders primarily by timestamp, then by the owning
//! [`PartitionKey`] (conversation, then namespace), then by sequence id. The
//! derived `Ord` relies on field declaration order, so the field order of
//! [`MessageIndex`] and [`PartitionKey`] is part of the contract.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Smallest sequence id a stored message can carry.
pub const SEQUENCE_ID_MIN: u32 = 1;
/// Largest sequence id a stored message can carry.
pub const SEQUENCE_ID_MAX: u32 = u32::MAX - 1;

/// Conversation scope (a chat, channel or thread root).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub u64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Category namespace inside a conversation (cloud, local, scheduled...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(pub u32);

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns{}", self.0)
    }
}

/// Independently windowed sub-sequence: one namespace of one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub conversation: ConversationId,
    pub namespace: Namespace,
}

impl PartitionKey {
    pub const MIN: Self = Self::new(ConversationId(0), Namespace(0));
    pub const MAX: Self = Self::new(ConversationId(u64::MAX), Namespace(u32::MAX));

    #[inline]
    #[must_use]
    pub const fn new(conversation: ConversationId, namespace: Namespace) -> Self {
        Self {
            conversation,
            namespace,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.conversation, self.namespace)
    }
}

/// Stable identity of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId {
    pub partition: PartitionKey,
    pub id: u32,
}

impl MessageId {
    #[inline]
    #[must_use]
    pub const fn new(partition: PartitionKey, id: u32) -> Self {
        Self { partition, id }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.partition, self.id)
    }
}

/// Total-order sort key of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageIndex {
    pub timestamp: u32,
    pub partition: PartitionKey,
    pub id: u32,
}

impl MessageIndex {
    #[inline]
    #[must_use]
    pub const fn new(id: MessageId, timestamp: u32) -> Self {
        Self {
            timestamp,
            partition: id.partition,
            id: id.id,
        }
    }

    #[inline]
    #[must_use]
    pub const fn message_id(&self) -> MessageId {
        MessageId::new(self.partition, self.id)
    }

    /// Smallest value of the order; no stored message compares below it.
    #[must_use]
    pub const fn absolute_lower_bound() -> Self {
        Self {
            timestamp: 0,
            partition: PartitionKey::MIN,
            id: 0,
        }
    }

    /// Largest value of the order; no stored message compares above it.
    #[must_use]
    pub const fn absolute_upper_bound() -> Self {
        Self {
            timestamp: u32::MAX,
            partition: PartitionKey::MAX,
            id: u32::MAX,
        }
    }

    /// Smallest index carrying `timestamp`.
    #[must_use]
    pub const fn lower_bound_at(timestamp: u32) -> Self {
        Self {
            timestamp,
            partition: PartitionKey::MIN,
            id: 0,
        }
    }

    /// Largest index carrying `timestamp`.
    #[must_use]
    pub const fn upper_bound_at(timestamp: u32) -> Self {
        Self {
            timestamp,
            partition: PartitionKey::MAX,
            id: u32::MAX,
        }
    }

    #[must_use]
    pub const fn with_timestamp(self, timestamp: u32) -> Self {
        Self { timestamp, ..self }
    }
}

impl fmt::Display for MessageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.partition, self.id, self.timestamp)
    }
}

/// Side of a window relative to its anchor cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSide {
    /// Entries comparing at or below the anchor.
    LowerOrAtAnchor,
    /// Entries comparing strictly above the anchor.
    HigherThanAnchor,
}

impl WindowSide {
    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowerOrAtAnchor => "lower_or_at_anchor",
            Self::HigherThanAnchor => "higher_than_anchor",
        }
    }
}

impl fmt::Display for WindowSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
