//! Element layer: ownership-tree nodes and their convenience slots.
//!
//! An Element's owner is changed through its OWNING_ELEMENT pointer, which is
//! created on first use. Name, definition and URI are owned
//! LiteralPointer/Literal pairs, also created on first non-empty write.

use std::collections::HashSet;
use std::sync::Arc;

use acrl_types::{ElementId, ElementPointerRole, LiteralPointerRole, NodeKind, UodError, UodResult};

use crate::handle::{BaseElement, NodeRef, node_handle};
use crate::journal::Operation;
use crate::node::{NodeBody, NodeCell, NodeState, PointerRole};
use crate::pointer::{self, ElementPointer, LiteralPointer};
use crate::universe::Universe;
use crate::value::{Literal, set_direct_owner, set_literal_value};

/// Whether `candidate` is `ancestor` or lies below it in the ownership tree.
pub(crate) fn is_within(universe: &Universe, candidate: ElementId, ancestor: ElementId) -> bool {
    let mut seen = HashSet::new();
    let mut current = Some(candidate);
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        if !seen.insert(id) {
            return false;
        }
        current = universe.cell(id).and_then(|cell| cell.snapshot().owner);
    }
    false
}

/// First registered child of `owner` with the given kind and role, in id order.
pub(crate) fn find_owned_pointer(
    owner: &NodeRef,
    kind: NodeKind,
    role: Option<PointerRole>,
) -> Option<Arc<NodeCell>> {
    let owned = owner.state().owned().cloned().unwrap_or_default();
    owned
        .into_iter()
        .filter_map(|id| owner.universe.cell(id))
        .find(|cell| cell.kind() == kind && cell.snapshot().role() == role)
}

/// Find the owned pointer with `role`, creating and owning it if absent.
pub(crate) fn ensure_owned_pointer(
    op: &mut Operation<'_>,
    owner: &NodeRef,
    kind: NodeKind,
    role: Option<PointerRole>,
) -> UodResult<NodeRef> {
    if let Some(cell) = find_owned_pointer(owner, kind, role) {
        return Ok(owner.sibling(cell));
    }
    let universe = op.universe();
    let _slots = universe.slot_guard();
    if let Some(cell) = find_owned_pointer(owner, kind, role) {
        return Ok(owner.sibling(cell));
    }
    let pointer = universe.create(op, kind, NodeState::pointer(role))?;
    set_direct_owner(op, &pointer, Some(owner))?;
    Ok(pointer)
}

const OWNING: Option<PointerRole> = Some(PointerRole::Element(ElementPointerRole::OwningElement));

pub(crate) fn set_element_owner(
    op: &mut Operation<'_>,
    element: &NodeRef,
    new_owner: Option<&NodeRef>,
) -> UodResult<()> {
    let universe = op.universe();
    let _tree = universe.tree_guard();
    move_element(op, element, new_owner)
}

/// Re-parent `element` while the caller holds the Universe tree lock.
pub(crate) fn move_element(
    op: &mut Operation<'_>,
    element: &NodeRef,
    new_owner: Option<&NodeRef>,
) -> UodResult<()> {
    let new_id = new_owner.map(NodeRef::id);
    if let Some(owner) = new_owner {
        element.ensure_same_universe(owner)?;
        if !owner.kind().is_element() {
            return Err(UodError::invalid(format!(
                "{} {} cannot own children",
                owner.kind(),
                owner.id()
            )));
        }
        if is_within(op.universe(), owner.id(), element.id()) {
            return Err(UodError::invalid(format!(
                "making {} the owner of {} would create an ownership cycle",
                owner.id(),
                element.id()
            )));
        }
    }
    if element.owner_id() == new_id {
        return Ok(());
    }

    let pointer = match find_owned_pointer(element, NodeKind::ElementPointer, OWNING) {
        Some(cell) => element.sibling(cell),
        None if new_owner.is_none() => return set_direct_owner(op, element, None),
        None => ensure_owned_pointer(op, element, NodeKind::ElementPointer, OWNING)?,
    };
    pointer::assign_target(op, &pointer, new_owner)?;

    // A pointer already aimed at the new owner leaves the tree untouched.
    if element.owner_id() != new_id {
        set_direct_owner(op, element, new_owner)?;
    }
    Ok(())
}

fn slot_role(role: LiteralPointerRole) -> Option<PointerRole> {
    Some(PointerRole::Literal(role))
}

fn slot_pointer(element: &NodeRef, role: LiteralPointerRole) -> Option<LiteralPointer> {
    find_owned_pointer(element, NodeKind::LiteralPointer, slot_role(role))
        .map(|cell| LiteralPointer::from_node(element.sibling(cell)))
}

fn slot_value(element: &NodeRef, role: LiteralPointerRole) -> String {
    slot_pointer(element, role)
        .and_then(|pointer| pointer.literal())
        .map(|literal| literal.value())
        .unwrap_or_default()
}

/// Write a name/definition/URI slot. Clearing a slot that was never set
/// creates nothing.
pub(crate) fn set_literal_slot(
    op: &mut Operation<'_>,
    element: &NodeRef,
    role: LiteralPointerRole,
    value: &str,
) -> UodResult<()> {
    if value.is_empty() && slot_pointer(element, role).is_none() {
        return Ok(());
    }
    let pointer = ensure_owned_pointer(op, element, NodeKind::LiteralPointer, slot_role(role))?;
    let existing = pointer::resolve(&pointer).filter(|node| node.kind() == NodeKind::Literal);
    match existing {
        Some(literal) => set_literal_value(op, &literal, value),
        None => {
            let universe = op.universe();
            let _slots = universe.slot_guard();
            if let Some(literal) =
                pointer::resolve(&pointer).filter(|node| node.kind() == NodeKind::Literal)
            {
                return set_literal_value(op, &literal, value);
            }
            let literal = universe.create(
                op,
                NodeKind::Literal,
                NodeState::new(NodeBody::Literal {
                    value: value.to_owned(),
                }),
            )?;
            set_direct_owner(op, &literal, Some(element))?;
            pointer::set_target(op, &pointer, Some(&literal))
        }
    }
}

node_handle!(
    /// Ownership-tree node. Also the handle type for References and
    /// Refinements, which are Elements with extra behavior.
    Element
);

impl Element {
    /// Ids of the owned children, ascending.
    #[must_use]
    pub fn owned_children(&self) -> Vec<ElementId> {
        self.node
            .state()
            .owned()
            .map(|owned| owned.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Registered owned children, in id order.
    #[must_use]
    pub fn owned_base_elements(&self) -> Vec<BaseElement> {
        self.owned_children()
            .into_iter()
            .filter_map(|id| self.node.universe.cell(id))
            .map(|cell| BaseElement::from_node(self.node.sibling(cell)))
            .collect()
    }

    #[must_use]
    pub fn is_owner_of(&self, id: ElementId) -> bool {
        self.node
            .cell
            .lock()
            .owned()
            .is_some_and(|owned| owned.contains(&id))
    }

    #[must_use]
    pub fn owner_id(&self) -> Option<ElementId> {
        self.node.owner_id()
    }

    #[must_use]
    pub fn owner(&self) -> Option<Element> {
        self.owner_id()
            .and_then(|id| self.universe().lookup_element(id))
    }

    /// Move this Element under `owner`, or detach it with `None`.
    ///
    /// # Errors
    /// `InvalidOperation` if `owner` belongs to another Universe or lies in
    /// this Element's own subtree.
    pub fn set_owner(&self, owner: Option<&Element>) -> UodResult<()> {
        let mut op = self.universe().begin();
        set_element_owner(&mut op, &self.node, owner.map(|owner| &owner.node))
    }

    #[must_use]
    pub fn owning_element_pointer(&self) -> Option<ElementPointer> {
        find_owned_pointer(&self.node, NodeKind::ElementPointer, OWNING)
            .map(|cell| ElementPointer::from_node(self.node.sibling(cell)))
    }

    #[must_use]
    pub fn name(&self) -> String {
        slot_value(&self.node, LiteralPointerRole::Name)
    }

    pub fn set_name(&self, name: &str) -> UodResult<()> {
        let mut op = self.universe().begin();
        set_literal_slot(&mut op, &self.node, LiteralPointerRole::Name, name)
    }

    #[must_use]
    pub fn name_literal_pointer(&self) -> Option<LiteralPointer> {
        slot_pointer(&self.node, LiteralPointerRole::Name)
    }

    #[must_use]
    pub fn name_literal(&self) -> Option<Literal> {
        self.name_literal_pointer()
            .and_then(|pointer| pointer.literal())
    }

    #[must_use]
    pub fn definition(&self) -> String {
        slot_value(&self.node, LiteralPointerRole::Definition)
    }

    pub fn set_definition(&self, definition: &str) -> UodResult<()> {
        let mut op = self.universe().begin();
        set_literal_slot(&mut op, &self.node, LiteralPointerRole::Definition, definition)
    }

    #[must_use]
    pub fn definition_literal_pointer(&self) -> Option<LiteralPointer> {
        slot_pointer(&self.node, LiteralPointerRole::Definition)
    }

    #[must_use]
    pub fn definition_literal(&self) -> Option<Literal> {
        self.definition_literal_pointer()
            .and_then(|pointer| pointer.literal())
    }

    #[must_use]
    pub fn uri(&self) -> String {
        slot_value(&self.node, LiteralPointerRole::Uri)
    }

    pub fn set_uri(&self, uri: &str) -> UodResult<()> {
        let mut op = self.universe().begin();
        set_literal_slot(&mut op, &self.node, LiteralPointerRole::Uri, uri)
    }

    #[must_use]
    pub fn uri_literal_pointer(&self) -> Option<LiteralPointer> {
        slot_pointer(&self.node, LiteralPointerRole::Uri)
    }

    #[must_use]
    pub fn uri_literal(&self) -> Option<Literal> {
        self.uri_literal_pointer()
            .and_then(|pointer| pointer.literal())
    }

    #[must_use]
    pub fn first_owned_element_with_name(&self, name: &str) -> Option<Element> {
        self.owned_base_elements()
            .into_iter()
            .filter_map(BaseElement::into_element)
            .find(|child| child.name() == name)
    }

    /// Whether `ancestor` strictly contains this Element in the ownership tree.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &Element) -> bool {
        self.id() != ancestor.id()
            && self.node.universe.ptr_eq(&ancestor.node.universe)
            && is_within(self.universe(), self.id(), ancestor.id())
    }
}
