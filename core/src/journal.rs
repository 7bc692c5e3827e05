//! Undo/redo journal.
//!
//! Every public mutating call runs inside one [`Operation`]. The operation
//! collects a [`ChangeEntry`] per affected node and publishes them when it
//! is dropped (after every node lock taken during the call has been
//! released): entries go to the undo stack if recording is on, and notices
//! go to subscribed listeners either way.
//!
//! Entries carry full before/after node snapshots, so reversing and replaying
//! never re-run mutation logic; they restore state verbatim.
//!
//! Each entry is stamped while the node it describes is still locked. An
//! operation that publishes late is merged into the undo stack by stamp, so
//! changes to one node always replay in the order they happened.

use std::mem::take;
use std::sync::Arc;

use tracing::warn;

use crate::node::{LockSet, NodeCell, NodeState};
use crate::notify::{ChangeKind, ChangeNotice, ChangeOrigin};
use crate::universe::Universe;

#[derive(Debug)]
pub(crate) enum Change {
    Creation {
        cell: Arc<NodeCell>,
        state: NodeState,
    },
    Modification {
        cell: Arc<NodeCell>,
        before: NodeState,
        after: NodeState,
    },
    Deletion {
        cell: Arc<NodeCell>,
        state: NodeState,
    },
    Marker,
}

#[derive(Debug)]
pub(crate) struct ChangeEntry {
    /// Sequence number of the public operation that produced the entry.
    pub(crate) operation: u64,
    /// Universe-wide order in which the change was made.
    pub(crate) stamp: u64,
    pub(crate) change: Change,
}

impl ChangeEntry {
    pub(crate) fn marker(operation: u64, stamp: u64) -> Self {
        Self {
            operation,
            stamp,
            change: Change::Marker,
        }
    }

    pub(crate) fn is_marker(&self) -> bool {
        matches!(self.change, Change::Marker)
    }

    pub(crate) fn kind(&self) -> ChangeKind {
        match self.change {
            Change::Creation { .. } => ChangeKind::Creation,
            Change::Modification { .. } => ChangeKind::Modification,
            Change::Deletion { .. } => ChangeKind::Deletion,
            Change::Marker => ChangeKind::Marker,
        }
    }

    /// Notice describing the node after this entry was applied in the given
    /// direction.
    pub(crate) fn notice(&self, origin: ChangeOrigin) -> Option<ChangeNotice> {
        let (cell, state) = match (&self.change, origin) {
            (Change::Creation { cell, state } | Change::Deletion { cell, state }, _) => {
                (cell, state)
            }
            (Change::Modification { cell, before, .. }, ChangeOrigin::Undo) => (cell, before),
            (Change::Modification { cell, after, .. }, _) => (cell, after),
            (Change::Marker, _) => return None,
        };
        Some(ChangeNotice {
            kind: self.kind(),
            origin,
            id: cell.id(),
            version: state.version,
        })
    }
}

#[derive(Debug)]
pub(crate) struct Journal {
    recording: bool,
    limit: Option<usize>,
    undo: Vec<ChangeEntry>,
    redo: Vec<ChangeEntry>,
}

impl Journal {
    pub(crate) fn new(recording: bool, limit: Option<usize>) -> Self {
        Self {
            recording,
            limit,
            undo: Vec::new(),
            redo: Vec::new(),
        }
    }

    pub(crate) fn recording(&self) -> bool {
        self.recording
    }

    pub(crate) fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    /// Journal the entries of one finished operation. New history
    /// invalidates whatever was undone before it.
    pub(crate) fn append(&mut self, entries: Vec<ChangeEntry>) {
        if !self.recording || entries.is_empty() {
            return;
        }
        self.redo.clear();
        for entry in entries {
            let at = self
                .undo
                .iter()
                .rposition(|existing| existing.stamp <= entry.stamp)
                .map_or(0, |index| index + 1);
            self.undo.insert(at, entry);
        }
        self.enforce_limit();
    }

    pub(crate) fn mark(&mut self, operation: u64, stamp: u64) {
        if !self.recording || self.undo.last().is_some_and(ChangeEntry::is_marker) {
            return;
        }
        self.undo.push(ChangeEntry::marker(operation, stamp));
    }

    /// Pop the most recent undo unit, most recent entry first.
    ///
    /// With markers on the stack a unit runs down to and including the
    /// marker that opened it; markers with nothing after them are absorbed
    /// into the unit below. Without any marker, a unit is one operation.
    pub(crate) fn take_undo_unit(&mut self) -> Vec<ChangeEntry> {
        let marker_delimited = self.undo.iter().any(ChangeEntry::is_marker);
        let mut unit: Vec<ChangeEntry> = Vec::new();
        while let Some(entry) = self.undo.pop() {
            let is_marker = entry.is_marker();
            let operation = entry.operation;
            unit.push(entry);
            if marker_delimited {
                if is_marker && unit.iter().any(|entry| !entry.is_marker()) {
                    break;
                }
            } else if self
                .undo
                .last()
                .is_none_or(|next| next.operation != operation)
            {
                break;
            }
        }
        unit
    }

    /// Pop the next redo unit, in original (forward) order.
    pub(crate) fn take_redo_unit(&mut self) -> Vec<ChangeEntry> {
        let mut unit: Vec<ChangeEntry> = Vec::new();
        while self.redo.last().is_some_and(ChangeEntry::is_marker) {
            unit.extend(self.redo.pop());
        }
        let marker_delimited = !unit.is_empty();
        while let Some(next) = self.redo.last() {
            if next.is_marker() {
                break;
            }
            if !marker_delimited
                && unit
                    .last()
                    .is_some_and(|previous| previous.operation != next.operation)
            {
                break;
            }
            unit.extend(self.redo.pop());
        }
        unit
    }

    pub(crate) fn finish_undo(&mut self, unit: Vec<ChangeEntry>) {
        self.redo.extend(unit);
    }

    pub(crate) fn finish_redo(&mut self, unit: Vec<ChangeEntry>) {
        self.undo.extend(unit);
    }

    pub(crate) fn can_undo(&self) -> bool {
        self.undo.iter().any(|entry| !entry.is_marker())
    }

    pub(crate) fn can_redo(&self) -> bool {
        self.redo.iter().any(|entry| !entry.is_marker())
    }

    pub(crate) fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Drop the oldest entries beyond the limit, never splitting an operation.
    fn enforce_limit(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        if self.undo.len() <= limit {
            return;
        }
        let mut cut = self.undo.len() - limit;
        while cut < self.undo.len() && self.undo[cut].operation == self.undo[cut - 1].operation {
            cut += 1;
        }
        self.undo.drain(..cut);
    }

    #[cfg(test)]
    pub(crate) fn undo_len(&self) -> usize {
        self.undo.len()
    }

    #[cfg(test)]
    pub(crate) fn redo_len(&self) -> usize {
        self.redo.len()
    }
}

/// Scope of one public mutating call.
pub(crate) struct Operation<'u> {
    universe: &'u Universe,
    sequence: u64,
    entries: Vec<ChangeEntry>,
}

impl<'u> Operation<'u> {
    pub(crate) fn new(universe: &'u Universe, sequence: u64) -> Self {
        Self {
            universe,
            sequence,
            entries: Vec::new(),
        }
    }

    pub(crate) fn universe(&self) -> &'u Universe {
        self.universe
    }

    /// Must not be called while `cell` is locked.
    pub(crate) fn record_creation(&mut self, cell: &Arc<NodeCell>) {
        let state = cell.snapshot();
        self.push(Change::Creation {
            cell: Arc::clone(cell),
            state,
        });
    }

    /// Must not be called while `cell` is locked.
    pub(crate) fn record_deletion(&mut self, cell: &Arc<NodeCell>) {
        let state = cell.snapshot();
        self.push(Change::Deletion {
            cell: Arc::clone(cell),
            state,
        });
    }

    /// Journal every held node whose state moved away from `before`.
    pub(crate) fn record_changes(&mut self, locks: &LockSet<'_>, before: Vec<NodeState>) {
        for (cell, before, after) in locks.changes_since(before) {
            self.push(Change::Modification {
                cell,
                before,
                after,
            });
        }
    }

    fn push(&mut self, change: Change) {
        self.entries.push(ChangeEntry {
            operation: self.sequence,
            stamp: self.universe.next_stamp(),
            change,
        });
    }
}

impl Drop for Operation<'_> {
    fn drop(&mut self) {
        let entries = take(&mut self.entries);
        if !entries.is_empty() {
            self.universe.publish(entries);
        }
    }
}

/// Undo the effect of one entry.
pub(crate) fn reverse(universe: &Universe, change: &Change) {
    match change {
        Change::Creation { cell, .. } => {
            universe.unregister(cell);
        }
        Change::Modification { cell, before, .. } => restore(cell, before),
        Change::Deletion { cell, .. } => reinstate(universe, cell),
        Change::Marker => {}
    }
}

/// Re-apply the forward effect of one entry.
pub(crate) fn replay(universe: &Universe, change: &Change) {
    match change {
        Change::Creation { cell, .. } => reinstate(universe, cell),
        Change::Modification { cell, after, .. } => restore(cell, after),
        Change::Deletion { cell, .. } => {
            universe.unregister(cell);
        }
        Change::Marker => {}
    }
}

fn restore(cell: &NodeCell, state: &NodeState) {
    *cell.lock() = state.clone();
}

fn reinstate(universe: &Universe, cell: &Arc<NodeCell>) {
    if let Err(err) = universe.register(cell) {
        warn!(id = %cell.id(), %err, "could not re-register node during undo/redo");
    }
}
