//! Pointer layer: typed, role-tagged references to another node by id.
//!
//! A pointer stores its target's `(id, version)` as of the last assignment
//! and resolves the live node lazily through the Universe index. Only
//! registered nodes resolve.
//!
//! An element pointer with role [`ElementPointerRole::OwningElement`] is the
//! mechanism by which an Element changes owner: assigning it moves the
//! pointer's own owner out of the old target's child set and into the new
//! target's. The lock set for that case is
//! {pointer, new target, moved element, moved element's current owner}; every
//! other assignment locks {pointer, new target}. Owner moves also hold the
//! Universe tree lock, so no other Element can change owner between the
//! cycle check and the move.

use std::sync::Arc;

use acrl_types::{
    ElementId, ElementPointerRole, LiteralPointerRole, NodeKind, UodError, UodResult, Version,
};
use tracing::trace;

use crate::element::{Element, is_within};
use crate::handle::{NodeRef, node_handle};
use crate::journal::Operation;
use crate::node::{LockSet, NodeBody, PointerRole, TargetRef};
use crate::value::{Literal, value_ops};

/// Resolve the pointer's target through the Universe index.
pub(crate) fn resolve(pointer: &NodeRef) -> Option<NodeRef> {
    let target = pointer.state().target()?;
    let cell = pointer.universe.cell(target.id);
    trace!(
        pointer = %pointer.id(),
        target = %target.id,
        found = cell.is_some(),
        "resolved pointer target"
    );
    cell.map(|cell| pointer.sibling(cell))
}

/// Whether the cached target version no longer matches the live target.
/// A target that cannot be resolved counts as stale; an unset pointer does not.
pub(crate) fn is_stale(pointer: &NodeRef) -> bool {
    let Some(cached) = pointer.state().target() else {
        return false;
    };
    resolve(pointer).is_none_or(|live| live.version() != cached.version)
}

pub(crate) fn set_target(
    op: &mut Operation<'_>,
    pointer: &NodeRef,
    target: Option<&NodeRef>,
) -> UodResult<()> {
    let universe = op.universe();
    let _tree = pointer
        .state()
        .is_owning_pointer()
        .then(|| universe.tree_guard());
    assign_target(op, pointer, target)
}

/// Assign without taking the tree lock. For an OWNING_ELEMENT pointer the
/// caller must already hold it, which keeps the cycle check valid until the
/// move is applied.
pub(crate) fn assign_target(
    op: &mut Operation<'_>,
    pointer: &NodeRef,
    target: Option<&NodeRef>,
) -> UodResult<()> {
    let Some(expected) = pointer.kind().target_kind() else {
        return Err(UodError::invalid(format!(
            "{} {} is not a pointer",
            pointer.kind(),
            pointer.id()
        )));
    };
    if let Some(target) = target {
        pointer.ensure_same_universe(target)?;
        if !expected.accepts(target.kind()) {
            return Err(UodError::invalid(format!(
                "{} {} cannot target {} {}",
                pointer.kind(),
                pointer.id(),
                target.kind(),
                target.id()
            )));
        }
    }
    let universe = op.universe();
    let new_id = target.map(NodeRef::id);

    loop {
        let observed = pointer.state();
        if observed.target().map(|current| current.id) == new_id {
            return Ok(());
        }

        // Element whose owner this assignment moves, with its current owner.
        let moved = observed
            .is_owning_pointer()
            .then_some(observed.owner)
            .flatten()
            .and_then(|id| universe.cell(id));
        let moved_owner = moved.as_ref().and_then(|cell| cell.snapshot().owner);

        if let (Some(moved), Some(new_id)) = (&moved, new_id)
            && is_within(universe, new_id, moved.id())
        {
            return Err(UodError::invalid(format!(
                "making {new_id} the owner of {} would create an ownership cycle",
                moved.id()
            )));
        }

        let mut cells = vec![Arc::clone(&pointer.cell)];
        cells.extend(target.map(|target| Arc::clone(&target.cell)));
        cells.extend(moved.iter().cloned());
        cells.extend(moved_owner.and_then(|id| universe.cell(id)));
        let mut locks = LockSet::acquire(&cells);

        let current = locks.state(pointer.id())?;
        let moved_unchanged = match &moved {
            Some(cell) => locks.state(cell.id())?.owner == moved_owner,
            None => true,
        };
        if current.target() != observed.target() || current.owner != observed.owner || !moved_unchanged
        {
            trace!(pointer = %pointer.id(), "pointer participants changed while locking; retrying");
            continue;
        }

        let before = locks.snapshot();
        if let Some(moved) = &moved {
            locks.reparent(moved.id(), moved_owner, new_id)?;
        }

        let new_target = match target {
            Some(target) => Some(TargetRef {
                id: target.id(),
                version: locks.state(target.id())?.version,
            }),
            None => None,
        };
        let state = locks.state_mut(pointer.id())?;
        if let NodeBody::Pointer { target: stored, .. } = &mut state.body {
            *stored = new_target;
        }
        state.version.bump();

        op.record_changes(&locks, before);
        return Ok(());
    }
}

fn target_id(node: &NodeRef) -> Option<ElementId> {
    node.state().target().map(|target| target.id)
}

fn target_version(node: &NodeRef) -> Option<Version> {
    node.state().target().map(|target| target.version)
}

node_handle!(
    /// Pointer to an Element, tagged with an [`ElementPointerRole`].
    ElementPointer
);

value_ops!(ElementPointer);

impl ElementPointer {
    #[must_use]
    pub fn role(&self) -> Option<ElementPointerRole> {
        match self.node.state().role() {
            Some(PointerRole::Element(role)) => Some(role),
            _ => None,
        }
    }

    #[must_use]
    pub fn element(&self) -> Option<Element> {
        resolve(&self.node)
            .filter(|node| node.kind().is_element())
            .map(Element::from_node)
    }

    #[must_use]
    pub fn element_id(&self) -> Option<ElementId> {
        target_id(&self.node)
    }

    #[must_use]
    pub fn element_version(&self) -> Option<Version> {
        target_version(&self.node)
    }

    /// Assign the target. `None` clears it and always succeeds.
    pub fn set_element(&self, element: Option<&Element>) -> UodResult<()> {
        let mut op = self.universe().begin();
        set_target(&mut op, &self.node, element.map(|element| &element.node))
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        is_stale(&self.node)
    }
}

node_handle!(
    /// Pointer to a Literal, tagged with a [`LiteralPointerRole`].
    LiteralPointer
);

value_ops!(LiteralPointer);

impl LiteralPointer {
    #[must_use]
    pub fn role(&self) -> Option<LiteralPointerRole> {
        match self.node.state().role() {
            Some(PointerRole::Literal(role)) => Some(role),
            _ => None,
        }
    }

    #[must_use]
    pub fn literal(&self) -> Option<Literal> {
        resolve(&self.node)
            .filter(|node| node.kind() == NodeKind::Literal)
            .map(Literal::from_node)
    }

    #[must_use]
    pub fn literal_id(&self) -> Option<ElementId> {
        target_id(&self.node)
    }

    #[must_use]
    pub fn literal_version(&self) -> Option<Version> {
        target_version(&self.node)
    }

    pub fn set_literal(&self, literal: Option<&Literal>) -> UodResult<()> {
        let mut op = self.universe().begin();
        set_target(&mut op, &self.node, literal.map(|literal| &literal.node))
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        is_stale(&self.node)
    }
}

node_handle!(
    /// Pointer to an [`ElementPointer`].
    ElementPointerPointer
);

value_ops!(ElementPointerPointer);

impl ElementPointerPointer {
    #[must_use]
    pub fn element_pointer(&self) -> Option<ElementPointer> {
        resolve(&self.node)
            .filter(|node| node.kind() == NodeKind::ElementPointer)
            .map(ElementPointer::from_node)
    }

    #[must_use]
    pub fn element_pointer_id(&self) -> Option<ElementId> {
        target_id(&self.node)
    }

    #[must_use]
    pub fn element_pointer_version(&self) -> Option<Version> {
        target_version(&self.node)
    }

    pub fn set_element_pointer(&self, pointer: Option<&ElementPointer>) -> UodResult<()> {
        let mut op = self.universe().begin();
        set_target(&mut op, &self.node, pointer.map(|pointer| &pointer.node))
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        is_stale(&self.node)
    }
}

node_handle!(
    /// Pointer to a [`LiteralPointer`].
    LiteralPointerPointer
);

value_ops!(LiteralPointerPointer);

impl LiteralPointerPointer {
    #[must_use]
    pub fn literal_pointer(&self) -> Option<LiteralPointer> {
        resolve(&self.node)
            .filter(|node| node.kind() == NodeKind::LiteralPointer)
            .map(LiteralPointer::from_node)
    }

    #[must_use]
    pub fn literal_pointer_id(&self) -> Option<ElementId> {
        target_id(&self.node)
    }

    #[must_use]
    pub fn literal_pointer_version(&self) -> Option<Version> {
        target_version(&self.node)
    }

    pub fn set_literal_pointer(&self, pointer: Option<&LiteralPointer>) -> UodResult<()> {
        let mut op = self.universe().begin();
        set_target(&mut op, &self.node, pointer.map(|pointer| &pointer.node))
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        is_stale(&self.node)
    }
}
