//! View configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

use msgwindow_error::{Result, ViewError};
use msgwindow_types::{ConversationId, MessageId, NamespaceCapabilities, StatisticsFlags, TagMask};

/// Half-window size used when a configuration does not name one.
pub const DEFAULT_HALF_LIMIT: usize = 50;

/// Below this the window shows too little context around the anchor to
/// be useful, though it still behaves correctly.
pub const RECOMMENDED_MIN_HALF_LIMIT: usize = 3;

/// Maximum number of conversations one view can span.
pub const MAX_SCOPES: usize = 2;

/// Starting point a view is opened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnchorRequest {
    Message { id: MessageId },
    LowerBound,
    UpperBound,
    /// First unread message of the first scope, or the upper bound when
    /// everything is read.
    FirstUnread,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub anchor: AnchorRequest,

    /// Only messages carrying every bit of the filter are shown.
    #[serde(default)]
    pub tag: Option<TagMask>,

    /// Entries kept on each side of the anchor, per partition.
    #[serde(default = "default_half_limit")]
    pub half_limit: usize,

    /// Conversations whose partitions are merged into the view.
    pub scopes: Vec<ConversationId>,

    #[serde(default)]
    pub statistics: StatisticsFlags,

    #[serde(default)]
    pub capabilities: NamespaceCapabilities,
}

const fn default_half_limit() -> usize {
    DEFAULT_HALF_LIMIT
}

impl ViewConfig {
    #[must_use]
    pub fn new(anchor: AnchorRequest, scopes: impl IntoIterator<Item = ConversationId>) -> Self {
        Self {
            anchor,
            tag: None,
            half_limit: DEFAULT_HALF_LIMIT,
            scopes: scopes.into_iter().collect(),
            statistics: StatisticsFlags::empty(),
            capabilities: NamespaceCapabilities::default(),
        }
    }

    #[must_use]
    pub const fn with_tag(mut self, tag: TagMask) -> Self {
        self.tag = Some(tag);
        self
    }

    #[must_use]
    pub const fn with_half_limit(mut self, half_limit: usize) -> Self {
        self.half_limit = half_limit;
        self
    }

    #[must_use]
    pub const fn with_statistics(mut self, statistics: StatisticsFlags) -> Self {
        self.statistics = statistics;
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: NamespaceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// All consistency problems with this configuration.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.half_limit == 0 {
            problems.push("half_limit must be > 0".to_owned());
        }
        if self.scopes.is_empty() {
            problems.push("at least one scope is required".to_owned());
        }
        if self.scopes.len() > MAX_SCOPES {
            problems.push(format!(
                "at most {MAX_SCOPES} scopes are supported, got {}",
                self.scopes.len()
            ));
        }
        for (position, scope) in self.scopes.iter().enumerate() {
            if self.scopes[..position].contains(scope) {
                problems.push(format!("scope {scope} is listed twice"));
            }
        }
        if let AnchorRequest::Message { id } = self.anchor {
            if !self.scopes.contains(&id.partition.conversation) {
                problems.push(format!("anchor message {id} is outside the view scopes"));
            }
        }
        problems
    }

    /// Reject unusable configurations; warn about degenerate ones.
    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if !problems.is_empty() {
            return Err(ViewError::invalid_config(problems.join("; ")));
        }
        if self.half_limit < RECOMMENDED_MIN_HALF_LIMIT {
            warn!(
                half_limit = self.half_limit,
                recommended = RECOMMENDED_MIN_HALF_LIMIT,
                "half_limit below recommended minimum"
            );
        }
        Ok(())
    }
}
