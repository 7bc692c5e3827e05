//! Change notifications for collaborators (editors, domain packages).

use std::fmt;
use std::sync::Arc;

use acrl_types::{ElementId, Version};

/// Kind of a journaled change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Creation,
    Modification,
    Deletion,
    /// Delimits one user-visible undo step. Never notified.
    Marker,
}

impl ChangeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::Modification => "modification",
            Self::Deletion => "deletion",
            Self::Marker => "marker",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What applied a change: a live mutation, or the undo/redo machinery
/// reversing or replaying one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOrigin {
    Mutation,
    Undo,
    Redo,
}

/// One node affected by one change.
///
/// `version` is the node's version after the change was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotice {
    pub kind: ChangeKind,
    pub origin: ChangeOrigin,
    pub id: ElementId,
    pub version: Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) const fn new(value: u64) -> Self {
        Self(value)
    }
}

pub(crate) type Listener = Arc<dyn Fn(&ChangeNotice) + Send + Sync>;
