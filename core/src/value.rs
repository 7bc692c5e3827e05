//! Value layer: leaf nodes with a weak owner back-reference.
//!
//! Literals and every pointer kind are Values. Their owner is a plain id on
//! the node, kept in agreement with the owner's child set by
//! [`set_direct_owner`].

use std::sync::Arc;

use acrl_types::{UodError, UodResult};
use tracing::trace;

use crate::handle::{NodeRef, node_handle};
use crate::journal::Operation;
use crate::node::{LockSet, NodeBody};

/// Move `child` under `new_owner` (or detach it), updating the child's
/// back-reference and both owners' child sets under one lock set:
/// {child, old owner, new owner}.
pub(crate) fn set_direct_owner(
    op: &mut Operation<'_>,
    child: &NodeRef,
    new_owner: Option<&NodeRef>,
) -> UodResult<()> {
    if let Some(owner) = new_owner {
        child.ensure_same_universe(owner)?;
        if !owner.kind().is_element() {
            return Err(UodError::invalid(format!(
                "{} {} cannot own children",
                owner.kind(),
                owner.id()
            )));
        }
    }
    let new_id = new_owner.map(NodeRef::id);
    let universe = op.universe();

    loop {
        let old_id = child.owner_id();
        if old_id == new_id {
            return Ok(());
        }

        let mut cells = vec![Arc::clone(&child.cell)];
        cells.extend(new_owner.map(|owner| Arc::clone(&owner.cell)));
        cells.extend(old_id.and_then(|id| universe.cell(id)));
        let mut locks = LockSet::acquire(&cells);

        if locks.state(child.id())?.owner != old_id {
            trace!(id = %child.id(), "owner changed while locking; retrying");
            continue;
        }

        let before = locks.snapshot();
        locks.reparent(child.id(), old_id, new_id)?;
        op.record_changes(&locks, before);
        return Ok(());
    }
}

/// Adds the Value owner accessors to a handle type.
macro_rules! value_ops {
    ($name:ident) => {
        impl $name {
            #[must_use]
            pub fn owner_id(&self) -> Option<acrl_types::ElementId> {
                self.node.owner_id()
            }

            /// The owning Element, if any and still registered.
            #[must_use]
            pub fn owner(&self) -> Option<$crate::element::Element> {
                self.owner_id()
                    .and_then(|id| self.universe().lookup_element(id))
            }

            pub fn set_owner(
                &self,
                owner: Option<&$crate::element::Element>,
            ) -> acrl_types::UodResult<()> {
                let mut op = self.universe().begin();
                $crate::value::set_direct_owner(&mut op, &self.node, owner.map(|o| &o.node))
            }
        }
    };
}

pub(crate) use value_ops;

node_handle!(
    /// Scalar string payload.
    Literal
);

value_ops!(Literal);

impl Literal {
    #[must_use]
    pub fn value(&self) -> String {
        self.node
            .cell
            .lock()
            .literal_value()
            .map(ToOwned::to_owned)
            .unwrap_or_default()
    }

    pub fn set_value(&self, value: &str) -> UodResult<()> {
        let mut op = self.universe().begin();
        set_literal_value(&mut op, &self.node, value)
    }
}

pub(crate) fn set_literal_value(
    op: &mut Operation<'_>,
    literal: &NodeRef,
    value: &str,
) -> UodResult<()> {
    let cells = [Arc::clone(&literal.cell)];
    let mut locks = LockSet::acquire(&cells);
    let before = locks.snapshot();
    let state = locks.state_mut(literal.id())?;
    match &mut state.body {
        NodeBody::Literal { value: current } if *current == value => return Ok(()),
        NodeBody::Literal { value: current } => {
            value.clone_into(current);
            state.version.bump();
        }
        _ => {
            return Err(UodError::invalid(format!(
                "{} {} is not a literal",
                literal.kind(),
                literal.id()
            )));
        }
    }
    op.record_changes(&locks, before);
    Ok(())
}
