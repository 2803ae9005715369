//! Core value types for the msgwindow history view engine.

pub mod anchor;
pub mod capabilities;
pub mod flags;
pub mod index;
pub mod month;

pub use anchor::Anchor;
pub use capabilities::NamespaceCapabilities;
pub use flags::{StatisticsFlags, TagMask};
pub use index::{
    ConversationId, MessageId, MessageIndex, Namespace, PartitionKey, SEQUENCE_ID_MAX,
    SEQUENCE_ID_MIN, WindowSide,
};
pub use month::MonthIndex;
