//! Window entries and their one-way render transition.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use msgwindow_types::{MessageIndex, TagMask};

use crate::message::{GroupInfo, IntermediateMessage, Media, MediaId, Message};

/// Absolute position of an entry among all matching messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombinedLocation {
    pub index: usize,
    pub count: usize,
}

/// Position of an entry counted back from the newest message of its month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthLocation {
    pub index_in_month: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LocationStats {
    pub combined: Option<CombinedLocation>,
    pub month: Option<MonthLocation>,
}

/// One message held by a window.
///
/// Entries are ordered only by [`Entry::index`]. `Intermediate` becomes
/// `Rendered` through [`Entry::render_with`]; nothing turns a rendered entry
/// back into an intermediate one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Intermediate(IntermediateMessage, Option<LocationStats>),
    Rendered(Message, Option<LocationStats>),
}

impl Entry {
    #[must_use]
    pub fn intermediate(message: IntermediateMessage) -> Self {
        Self::Intermediate(message, None)
    }

    #[inline]
    #[must_use]
    pub fn index(&self) -> MessageIndex {
        match self {
            Self::Intermediate(message, _) => message.index,
            Self::Rendered(message, _) => message.index,
        }
    }

    #[must_use]
    pub fn tags(&self) -> TagMask {
        match self {
            Self::Intermediate(message, _) => message.tags,
            Self::Rendered(message, _) => message.tags,
        }
    }

    #[must_use]
    pub const fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered(..))
    }

    #[must_use]
    pub const fn location(&self) -> Option<&LocationStats> {
        match self {
            Self::Intermediate(_, location) | Self::Rendered(_, location) => location.as_ref(),
        }
    }

    pub fn set_location(&mut self, stats: Option<LocationStats>) {
        match self {
            Self::Intermediate(_, location) | Self::Rendered(_, location) => *location = stats,
        }
    }

    /// Render once and memoize the result in place.
    ///
    /// `render` only runs for intermediate entries; its output keeps the
    /// entry's index so window ordering is unaffected.
    pub fn render_with(
        &mut self,
        render: impl FnOnce(&IntermediateMessage) -> Message,
    ) -> &Message {
        if let Self::Intermediate(raw, location) = self {
            let mut message = render(raw);
            message.index = raw.index;
            let location = *location;
            *self = Self::Rendered(message, location);
        }
        match self {
            Self::Rendered(message, _) => message,
            Self::Intermediate(..) => unreachable!("entry rendered above"),
        }
    }

    /// Same entry re-keyed to a new timestamp.
    #[must_use]
    pub fn with_timestamp(self, timestamp: u32) -> Self {
        match self {
            Self::Intermediate(mut message, location) => {
                message.index = message.index.with_timestamp(timestamp);
                Self::Intermediate(message, location)
            }
            Self::Rendered(mut message, location) => {
                message.index = message.index.with_timestamp(timestamp);
                Self::Rendered(message, location)
            }
        }
    }

    pub fn set_group_info(&mut self, info: Option<GroupInfo>) -> bool {
        let slot = match self {
            Self::Intermediate(message, _) => &mut message.group_info,
            Self::Rendered(message, _) => &mut message.group_info,
        };
        if *slot == info {
            return false;
        }
        *slot = info;
        true
    }

    pub fn set_embedded_media(&mut self, payload: Vec<u8>) -> bool {
        match self {
            Self::Intermediate(message, _) => {
                if message.embedded_media.as_ref() == Some(&payload) {
                    return false;
                }
                message.embedded_media = Some(payload);
            }
            Self::Rendered(message, _) => {
                let media = Media::embedded(payload);
                if message.embedded_media.as_ref() == Some(&media) {
                    return false;
                }
                message.embedded_media = Some(media);
            }
        }
        true
    }

    /// Apply media replacements (`None` = deleted) to a rendered entry.
    ///
    /// Intermediate entries hold only media ids and resolve them at render
    /// time, so they never change here.
    pub fn apply_media_updates(&mut self, updates: &HashMap<MediaId, Option<Media>>) -> bool {
        let Self::Rendered(message, _) = self else {
            return false;
        };
        let mut changed = false;
        for (id, update) in updates {
            changed |= message.apply_media_update(*id, update.as_ref());
        }
        changed
    }
}

/// Rendered entry as handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedEntry {
    pub message: Message,
    pub location: Option<LocationStats>,
}
