//! Node storage and the lock-ordering protocol.
//!
//! Every node lives in a [`NodeCell`]: immutable identity (id, kind, owning
//! Universe) plus a mutex-guarded [`NodeState`]. Cross-node relationships
//! (owner, owned children, pointer targets) are stored as ids only; the
//! Universe index is the arena that maps them back to cells. A cell holds no
//! reference to any other cell or to its Universe.
//!
//! # Locking
//!
//! Mutations that touch more than one node acquire every participant through
//! [`LockSet::acquire`], which sorts by [`ElementId`] and locks in ascending
//! order. That is the only multi-lock path in the crate, so the order is
//! global. Helpers that mutate node state take the `LockSet` itself as proof
//! that the locks are held.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use acrl_types::{
    ElementId, ElementPointerRole, LiteralPointerRole, NodeKind, UodError, UodResult, Version,
};
use tracing::trace;

use crate::universe::UniverseId;

/// Role tag carried by a pointer node.
///
/// Pointer-to-pointer kinds are single purpose and carry no role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PointerRole {
    Element(ElementPointerRole),
    Literal(LiteralPointerRole),
}

/// Cached `(id, version)` of a pointer's target at the time it was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TargetRef {
    pub(crate) id: ElementId,
    pub(crate) version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeBody {
    Element {
        owned: BTreeSet<ElementId>,
    },
    Literal {
        value: String,
    },
    Pointer {
        role: Option<PointerRole>,
        target: Option<TargetRef>,
    },
}

/// Everything about a node that undo/redo must reproduce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NodeState {
    pub(crate) version: Version,
    pub(crate) owner: Option<ElementId>,
    pub(crate) body: NodeBody,
}

impl NodeState {
    pub(crate) fn new(body: NodeBody) -> Self {
        Self {
            version: Version::INITIAL,
            owner: None,
            body,
        }
    }

    pub(crate) fn element() -> Self {
        Self::new(NodeBody::Element {
            owned: BTreeSet::new(),
        })
    }

    pub(crate) fn pointer(role: Option<PointerRole>) -> Self {
        Self::new(NodeBody::Pointer { role, target: None })
    }

    pub(crate) fn owned(&self) -> Option<&BTreeSet<ElementId>> {
        match &self.body {
            NodeBody::Element { owned } => Some(owned),
            _ => None,
        }
    }

    fn owned_mut(&mut self) -> Option<&mut BTreeSet<ElementId>> {
        match &mut self.body {
            NodeBody::Element { owned } => Some(owned),
            _ => None,
        }
    }

    pub(crate) fn literal_value(&self) -> Option<&str> {
        match &self.body {
            NodeBody::Literal { value } => Some(value),
            _ => None,
        }
    }

    pub(crate) fn role(&self) -> Option<PointerRole> {
        match &self.body {
            NodeBody::Pointer { role, .. } => *role,
            _ => None,
        }
    }

    pub(crate) fn target(&self) -> Option<TargetRef> {
        match &self.body {
            NodeBody::Pointer { target, .. } => *target,
            _ => None,
        }
    }

    pub(crate) fn is_owning_pointer(&self) -> bool {
        self.role() == Some(PointerRole::Element(ElementPointerRole::OwningElement))
    }
}

pub(crate) struct NodeCell {
    id: ElementId,
    kind: NodeKind,
    universe: OnceLock<UniverseId>,
    registered: AtomicBool,
    state: Mutex<NodeState>,
}

impl NodeCell {
    pub(crate) fn new(id: ElementId, kind: NodeKind, state: NodeState) -> Self {
        Self {
            id,
            kind,
            universe: OnceLock::new(),
            registered: AtomicBool::new(false),
            state: Mutex::new(state),
        }
    }

    pub(crate) fn id(&self) -> ElementId {
        self.id
    }

    pub(crate) fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Lock this node alone.
    ///
    /// A poisoned lock is recovered: state is only ever replaced wholesale
    /// under the guard, so a panicking holder cannot leave it half-written.
    pub(crate) fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> NodeState {
        self.lock().clone()
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub(crate) fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::Release);
    }

    /// Bind the cell to `universe`. A cell belongs to exactly one Universe
    /// for its whole lifetime; rebinding to the same one is a no-op.
    pub(crate) fn bind_universe(&self, universe: UniverseId) -> UodResult<()> {
        if *self.universe.get_or_init(|| universe) == universe {
            Ok(())
        } else {
            Err(UodError::invalid(format!(
                "node {} already belongs to another universe",
                self.id
            )))
        }
    }

    pub(crate) fn belongs_to(&self, universe: UniverseId) -> bool {
        self.universe.get() == Some(&universe)
    }
}

impl fmt::Debug for NodeCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCell")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("registered", &self.is_registered())
            .finish_non_exhaustive()
    }
}

/// Locks held on a set of nodes for the duration of one mutation.
///
/// Guards are kept sorted by id; they are released together on drop.
pub(crate) struct LockSet<'a> {
    held: Vec<(&'a Arc<NodeCell>, MutexGuard<'a, NodeState>)>,
}

impl<'a> LockSet<'a> {
    /// Lock every distinct cell in ascending id order.
    pub(crate) fn acquire(cells: &'a [Arc<NodeCell>]) -> Self {
        let mut ordered: Vec<&'a Arc<NodeCell>> = cells.iter().collect();
        ordered.sort_by_key(|cell| cell.id());
        ordered.dedup_by_key(|cell| cell.id());

        let held = ordered
            .into_iter()
            .map(|cell| {
                trace!(id = %cell.id(), "acquiring node lock");
                (cell, cell.lock())
            })
            .collect();
        Self { held }
    }

    fn position(&self, id: ElementId) -> Option<usize> {
        self.held
            .binary_search_by_key(&id, |(cell, _)| cell.id())
            .ok()
    }

    pub(crate) fn contains(&self, id: ElementId) -> bool {
        self.position(id).is_some()
    }

    pub(crate) fn state(&self, id: ElementId) -> UodResult<&NodeState> {
        let index = self.position(id).ok_or_else(|| not_held(id))?;
        Ok(&self.held[index].1)
    }

    pub(crate) fn state_mut(&mut self, id: ElementId) -> UodResult<&mut NodeState> {
        let index = self.position(id).ok_or_else(|| not_held(id))?;
        Ok(&mut *self.held[index].1)
    }

    /// Snapshot every held state, in lock order.
    pub(crate) fn snapshot(&self) -> Vec<NodeState> {
        self.held
            .iter()
            .map(|(_, guard)| NodeState::clone(guard))
            .collect()
    }

    /// Pair each held node whose state differs from `before` with its
    /// before/after states. `before` must come from [`LockSet::snapshot`] on
    /// this same set.
    pub(crate) fn changes_since(
        &self,
        before: Vec<NodeState>,
    ) -> Vec<(Arc<NodeCell>, NodeState, NodeState)> {
        self.held
            .iter()
            .zip(before)
            .filter(|((_, guard), before)| **guard != *before)
            .map(|((cell, guard), before)| (Arc::clone(cell), before, NodeState::clone(guard)))
            .collect()
    }

    /// Move `child` from `old` owner to `new` owner, keeping both sides of
    /// the ownership relation in agreement. Every node whose state changes
    /// has its version bumped. An `old` owner that is not held (no longer
    /// registered) is skipped.
    pub(crate) fn reparent(
        &mut self,
        child: ElementId,
        old: Option<ElementId>,
        new: Option<ElementId>,
    ) -> UodResult<()> {
        if let Some(new) = new {
            let state = self.state_mut(new)?;
            if state.owned().is_none() {
                return Err(UodError::invalid(format!("node {new} cannot own children")));
            }
        }

        if let Some(old) = old
            && self.contains(old)
        {
            let state = self.state_mut(old)?;
            if state.owned_mut().is_some_and(|owned| owned.remove(&child)) {
                state.version.bump();
            }
        }

        let state = self.state_mut(child)?;
        state.owner = new;
        state.version.bump();

        if let Some(new) = new {
            let state = self.state_mut(new)?;
            if state.owned_mut().is_some_and(|owned| owned.insert(child)) {
                state.version.bump();
            }
        }
        Ok(())
    }
}

fn not_held(id: ElementId) -> UodError {
    UodError::invalid(format!("node {id} is not locked by this operation"))
}
