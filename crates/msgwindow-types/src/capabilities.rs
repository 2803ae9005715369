//! Namespace capability descriptor supplied by the owning store.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Namespace, PartitionKey};

/// Which namespaces can contain holes.
///
/// Partitions in other namespaces are treated as fully loaded: hole edits
/// targeting them are ignored and they never produce a hole request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamespaceCapabilities {
    #[serde(default)]
    pub holeable: BTreeSet<Namespace>,
}

impl NamespaceCapabilities {
    #[must_use]
    pub fn with_holeable(namespaces: impl IntoIterator<Item = Namespace>) -> Self {
        Self {
            holeable: namespaces.into_iter().collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_holeable(&self, namespace: Namespace) -> bool {
        self.holeable.contains(&namespace)
    }

    #[inline]
    #[must_use]
    pub fn tracks_holes(&self, partition: &PartitionKey) -> bool {
        self.is_holeable(partition.namespace)
    }
}
