//! The Universe of Discourse: node registry, undo journal and listeners.
//!
//! The index maps ids to node cells and is the only way a pointer finds its
//! target. It does not own the model: ownership lives in the Element tree.
//!
//! Lock hierarchy: the tree lock, then the slot-creation lock, then node
//! locks, then the index, then the journal. None of them is held while
//! calling out to listeners.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use acrl_types::{
    ElementId, ElementPointerRole, LiteralPointerRole, NodeKind, UodError, UodResult,
};
use tracing::{debug, trace};

use crate::codec;
use crate::config::UniverseConfig;
use crate::element::{Element, move_element};
use crate::handle::{BaseElement, NodeRef};
use crate::journal::{ChangeEntry, Journal, Operation, replay, reverse};
use crate::node::{NodeBody, NodeCell, NodeState, PointerRole};
use crate::notify::{ChangeNotice, ChangeOrigin, Listener, SubscriptionId};
use crate::pointer::{ElementPointer, ElementPointerPointer, LiteralPointer, LiteralPointerPointer};
use crate::reference::{
    ElementPointerReference, ElementReference, LiteralPointerReference, LiteralReference,
};
use crate::refinement::Refinement;
use crate::value::{Literal, set_direct_owner};

/// Process-unique identity of a Universe, recorded on every cell it registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UniverseId(u64);

static NEXT_UNIVERSE: AtomicU64 = AtomicU64::new(1);

pub(crate) struct UniverseShared {
    id: UniverseId,
    index: RwLock<HashMap<ElementId, Arc<NodeCell>>>,
    journal: Mutex<Journal>,
    /// Serializes every change of an Element's owner.
    tree: Mutex<()>,
    /// Serializes lazy creation of owned pointer and literal slots.
    slots: Mutex<()>,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
    next_operation: AtomicU64,
    next_stamp: AtomicU64,
    next_subscription: AtomicU64,
}

/// Handle to one Universe. Clones share the same registry.
#[derive(Clone)]
pub struct Universe {
    shared: Arc<UniverseShared>,
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Universe")
            .field("nodes", &self.len())
            .field("recording_undo", &self.is_recording_undo())
            .finish_non_exhaustive()
    }
}

impl Universe {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&UniverseConfig::default())
    }

    #[must_use]
    pub fn with_config(config: &UniverseConfig) -> Self {
        Self {
            shared: Arc::new(UniverseShared {
                id: UniverseId(NEXT_UNIVERSE.fetch_add(1, Ordering::Relaxed)),
                index: RwLock::new(HashMap::new()),
                journal: Mutex::new(Journal::new(config.record_undo, config.undo_limit)),
                tree: Mutex::new(()),
                slots: Mutex::new(()),
                listeners: RwLock::new(Vec::new()),
                next_operation: AtomicU64::new(1),
                next_stamp: AtomicU64::new(1),
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    /// Whether both handles refer to the same Universe.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // ── Internal plumbing ──

    fn read_index(&self) -> RwLockReadGuard<'_, HashMap<ElementId, Arc<NodeCell>>> {
        self.shared
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, HashMap<ElementId, Arc<NodeCell>>> {
        self.shared
            .index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.shared
            .journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Held from an Element move's cycle check until the move is applied, so
    /// two opposing moves cannot both pass the check.
    pub(crate) fn tree_guard(&self) -> MutexGuard<'_, ()> {
        self.shared
            .tree
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Held while checking for and creating a lazily built slot, so two
    /// threads cannot both create it. Never taken with a node lock held.
    pub(crate) fn slot_guard(&self) -> MutexGuard<'_, ()> {
        self.shared
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_sequence(&self) -> u64 {
        self.shared.next_operation.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn next_stamp(&self) -> u64 {
        self.shared.next_stamp.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn begin(&self) -> Operation<'_> {
        Operation::new(self, self.next_sequence())
    }

    pub(crate) fn cell(&self, id: ElementId) -> Option<Arc<NodeCell>> {
        self.read_index().get(&id).cloned()
    }

    fn node(&self, cell: Arc<NodeCell>) -> NodeRef {
        NodeRef::new(cell, self.clone())
    }

    pub(crate) fn register(&self, cell: &Arc<NodeCell>) -> UodResult<()> {
        cell.bind_universe(self.shared.id)?;
        match self.write_index().entry(cell.id()) {
            Entry::Occupied(existing) if Arc::ptr_eq(existing.get(), cell) => return Ok(()),
            Entry::Occupied(_) => return Err(UodError::IdentityCollision { id: cell.id() }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(cell));
            }
        }
        cell.set_registered(true);
        trace!(id = %cell.id(), kind = %cell.kind(), "registered node");
        Ok(())
    }

    /// Register every cell or none of them.
    pub(crate) fn register_all(&self, cells: &[Arc<NodeCell>]) -> UodResult<()> {
        for cell in cells {
            if !cell.belongs_to(self.shared.id) {
                cell.bind_universe(self.shared.id)?;
            }
        }
        let mut index = self.write_index();
        if let Some(cell) = cells.iter().find(|cell| index.contains_key(&cell.id())) {
            return Err(UodError::IdentityCollision { id: cell.id() });
        }
        for cell in cells {
            index.insert(cell.id(), Arc::clone(cell));
            cell.set_registered(true);
        }
        debug!(count = cells.len(), "registered recovered subtree");
        Ok(())
    }

    pub(crate) fn unregister(&self, cell: &Arc<NodeCell>) -> bool {
        let mut index = self.write_index();
        let removed = match index.entry(cell.id()) {
            Entry::Occupied(existing) if Arc::ptr_eq(existing.get(), cell) => {
                existing.remove();
                true
            }
            _ => false,
        };
        drop(index);
        cell.set_registered(false);
        if removed {
            trace!(id = %cell.id(), "unregistered node");
        }
        removed
    }

    /// Create and register a node with a fresh id, journaling its creation.
    pub(crate) fn create(
        &self,
        op: &mut Operation<'_>,
        kind: NodeKind,
        state: NodeState,
    ) -> UodResult<NodeRef> {
        let cell = Arc::new(NodeCell::new(ElementId::new(), kind, state));
        self.register(&cell)?;
        op.record_creation(&cell);
        debug!(id = %cell.id(), %kind, "created node");
        Ok(self.node(cell))
    }

    fn create_node(&self, kind: NodeKind, state: NodeState) -> UodResult<NodeRef> {
        let mut op = self.begin();
        self.create(&mut op, kind, state)
    }

    /// Journal a finished operation and tell listeners about it.
    pub(crate) fn publish(&self, entries: Vec<ChangeEntry>) {
        let notices: Vec<ChangeNotice> = entries
            .iter()
            .filter_map(|entry| entry.notice(ChangeOrigin::Mutation))
            .collect();
        self.journal().append(entries);
        self.notify(&notices);
    }

    fn notify(&self, notices: &[ChangeNotice]) {
        if notices.is_empty() {
            return;
        }
        let listeners: Vec<Listener> = self
            .shared
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for notice in notices {
            for listener in &listeners {
                listener(notice);
            }
        }
    }

    // ── Factories ──

    pub fn new_element(&self) -> UodResult<Element> {
        self.create_node(NodeKind::Element, NodeState::element())
            .map(Element::from_node)
    }

    pub fn new_literal(&self) -> UodResult<Literal> {
        self.create_node(
            NodeKind::Literal,
            NodeState::new(NodeBody::Literal {
                value: String::new(),
            }),
        )
        .map(Literal::from_node)
    }

    pub fn new_element_pointer(&self, role: ElementPointerRole) -> UodResult<ElementPointer> {
        self.create_node(
            NodeKind::ElementPointer,
            NodeState::pointer(Some(PointerRole::Element(role))),
        )
        .map(ElementPointer::from_node)
    }

    pub fn new_literal_pointer(&self, role: LiteralPointerRole) -> UodResult<LiteralPointer> {
        self.create_node(
            NodeKind::LiteralPointer,
            NodeState::pointer(Some(PointerRole::Literal(role))),
        )
        .map(LiteralPointer::from_node)
    }

    pub fn new_element_pointer_pointer(&self) -> UodResult<ElementPointerPointer> {
        self.create_node(NodeKind::ElementPointerPointer, NodeState::pointer(None))
            .map(ElementPointerPointer::from_node)
    }

    pub fn new_literal_pointer_pointer(&self) -> UodResult<LiteralPointerPointer> {
        self.create_node(NodeKind::LiteralPointerPointer, NodeState::pointer(None))
            .map(LiteralPointerPointer::from_node)
    }

    fn new_element_of<T>(&self, kind: NodeKind) -> UodResult<T>
    where
        T: TryFrom<Element, Error = UodError>,
    {
        self.create_node(kind, NodeState::element())
            .map(Element::from_node)
            .and_then(T::try_from)
    }

    pub fn new_element_reference(&self) -> UodResult<ElementReference> {
        self.new_element_of(NodeKind::ElementReference)
    }

    pub fn new_element_pointer_reference(&self) -> UodResult<ElementPointerReference> {
        self.new_element_of(NodeKind::ElementPointerReference)
    }

    pub fn new_literal_pointer_reference(&self) -> UodResult<LiteralPointerReference> {
        self.new_element_of(NodeKind::LiteralPointerReference)
    }

    pub fn new_literal_reference(&self) -> UodResult<LiteralReference> {
        self.new_element_of(NodeKind::LiteralReference)
    }

    pub fn new_refinement(&self) -> UodResult<Refinement> {
        self.new_element_of(NodeKind::Refinement)
    }

    // ── Lookup ──

    #[must_use]
    pub fn lookup(&self, id: ElementId) -> Option<BaseElement> {
        self.cell(id)
            .map(|cell| BaseElement::from_node(self.node(cell)))
    }

    fn lookup_kind(&self, id: ElementId, kind: NodeKind) -> Option<NodeRef> {
        self.cell(id)
            .filter(|cell| cell.kind() == kind)
            .map(|cell| self.node(cell))
    }

    /// Look up `id` as `kind`, treating absence and kind mismatch alike.
    ///
    /// # Errors
    /// `NotFound` naming the requested kind.
    pub fn require(&self, id: ElementId, kind: NodeKind) -> UodResult<BaseElement> {
        self.lookup_kind(id, kind)
            .map(BaseElement::from_node)
            .ok_or(UodError::NotFound { id, expected: kind })
    }

    /// Any element kind, including References and Refinements.
    #[must_use]
    pub fn lookup_element(&self, id: ElementId) -> Option<Element> {
        self.cell(id)
            .filter(|cell| cell.kind().is_element())
            .map(|cell| Element::from_node(self.node(cell)))
    }

    #[must_use]
    pub fn lookup_literal(&self, id: ElementId) -> Option<Literal> {
        self.lookup_kind(id, NodeKind::Literal)
            .map(Literal::from_node)
    }

    #[must_use]
    pub fn lookup_element_pointer(&self, id: ElementId) -> Option<ElementPointer> {
        self.lookup_kind(id, NodeKind::ElementPointer)
            .map(ElementPointer::from_node)
    }

    #[must_use]
    pub fn lookup_literal_pointer(&self, id: ElementId) -> Option<LiteralPointer> {
        self.lookup_kind(id, NodeKind::LiteralPointer)
            .map(LiteralPointer::from_node)
    }

    #[must_use]
    pub fn lookup_element_pointer_pointer(&self, id: ElementId) -> Option<ElementPointerPointer> {
        self.lookup_kind(id, NodeKind::ElementPointerPointer)
            .map(ElementPointerPointer::from_node)
    }

    #[must_use]
    pub fn lookup_literal_pointer_pointer(&self, id: ElementId) -> Option<LiteralPointerPointer> {
        self.lookup_kind(id, NodeKind::LiteralPointerPointer)
            .map(LiteralPointerPointer::from_node)
    }

    fn lookup_wrapper<T>(&self, id: ElementId) -> Option<T>
    where
        T: TryFrom<Element, Error = UodError>,
    {
        self.lookup_element(id)
            .and_then(|element| T::try_from(element).ok())
    }

    #[must_use]
    pub fn lookup_element_reference(&self, id: ElementId) -> Option<ElementReference> {
        self.lookup_wrapper(id)
    }

    #[must_use]
    pub fn lookup_element_pointer_reference(
        &self,
        id: ElementId,
    ) -> Option<ElementPointerReference> {
        self.lookup_wrapper(id)
    }

    #[must_use]
    pub fn lookup_literal_pointer_reference(
        &self,
        id: ElementId,
    ) -> Option<LiteralPointerReference> {
        self.lookup_wrapper(id)
    }

    #[must_use]
    pub fn lookup_literal_reference(&self, id: ElementId) -> Option<LiteralReference> {
        self.lookup_wrapper(id)
    }

    #[must_use]
    pub fn lookup_refinement(&self, id: ElementId) -> Option<Refinement> {
        self.lookup_wrapper(id)
    }

    #[must_use]
    pub fn contains(&self, id: ElementId) -> bool {
        self.read_index().contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read_index().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_index().is_empty()
    }

    /// Every registered id, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<ElementId> {
        let mut ids: Vec<ElementId> = self.read_index().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    // ── Deletion ──

    /// Remove `node` and, for Elements, its whole owned subtree from the
    /// index, after detaching it from its owner. The detach is journaled like
    /// `set_owner(None)`, so the deleted root reports no owner and an
    /// Element's OWNING_ELEMENT pointer is cleared.
    ///
    /// Deleted nodes otherwise keep their state, so undo can re-register them
    /// as they were. Pointers elsewhere keep their cached target and stop resolving.
    ///
    /// # Errors
    /// `InvalidOperation` for a node of another Universe, `NotFound` if the
    /// node is not registered.
    pub fn delete(&self, node: &BaseElement) -> UodResult<()> {
        let root = node.node();
        if !root.universe.ptr_eq(self) {
            return Err(UodError::invalid(format!(
                "{} {} belongs to another universe",
                root.kind(),
                root.id()
            )));
        }
        if !root.cell.is_registered() {
            return Err(UodError::NotFound {
                id: root.id(),
                expected: root.kind(),
            });
        }

        let mut op = self.begin();
        let _tree = self.tree_guard();
        match node {
            BaseElement::Element(element) => move_element(&mut op, &element.node, None)?,
            _ => set_direct_owner(&mut op, root, None)?,
        }

        let mut pending = vec![Arc::clone(&root.cell)];
        let mut removed = 0_usize;
        while let Some(cell) = pending.pop() {
            if let Some(owned) = cell.snapshot().owned() {
                pending.extend(owned.iter().filter_map(|id| self.cell(*id)));
            }
            op.record_deletion(&cell);
            if self.unregister(&cell) {
                removed += 1;
            }
        }
        debug!(id = %root.id(), removed, "deleted subtree");
        Ok(())
    }

    // ── Serialization ──

    /// Encode `root` and its owned subtree as JSON.
    pub fn marshal(&self, root: &Element) -> UodResult<Vec<u8>> {
        if !root.universe().ptr_eq(self) {
            return Err(UodError::invalid(format!(
                "{} {} belongs to another universe",
                root.kind(),
                root.id()
            )));
        }
        codec::marshal(root)
    }

    /// Decode a document produced by [`Universe::marshal`] and register the
    /// whole tree. On error the Universe is left unmodified.
    ///
    /// A root whose recorded owner is registered here is added back to that
    /// owner's children.
    pub fn recover(&self, bytes: &[u8]) -> UodResult<Element> {
        let mut op = self.begin();
        let _tree = self.tree_guard();
        codec::recover(&mut op, bytes)
    }

    // ── Undo / redo ──

    pub fn set_recording_undo(&self, recording: bool) {
        self.journal().set_recording(recording);
        debug!(recording, "undo recording toggled");
    }

    #[must_use]
    pub fn is_recording_undo(&self) -> bool {
        self.journal().recording()
    }

    /// Close the current undo unit. Consecutive marks collapse into one.
    pub fn mark_undo_point(&self) {
        let sequence = self.next_sequence();
        let stamp = self.next_stamp();
        self.journal().mark(sequence, stamp);
    }

    /// Reverse the most recent undo unit. Returns whether anything changed.
    pub fn undo(&self) -> bool {
        let tree = self.tree_guard();
        let unit = self.journal().take_undo_unit();
        for entry in &unit {
            reverse(self, &entry.change);
        }
        drop(tree);
        let notices: Vec<ChangeNotice> = unit
            .iter()
            .filter_map(|entry| entry.notice(ChangeOrigin::Undo))
            .collect();
        debug!(entries = unit.len(), "undo");
        self.journal().finish_undo(unit);
        self.notify(&notices);
        !notices.is_empty()
    }

    /// Replay the most recently undone unit. Returns whether anything changed.
    pub fn redo(&self) -> bool {
        let tree = self.tree_guard();
        let unit = self.journal().take_redo_unit();
        for entry in &unit {
            replay(self, &entry.change);
        }
        drop(tree);
        let notices: Vec<ChangeNotice> = unit
            .iter()
            .filter_map(|entry| entry.notice(ChangeOrigin::Redo))
            .collect();
        debug!(entries = unit.len(), "redo");
        self.journal().finish_redo(unit);
        self.notify(&notices);
        !notices.is_empty()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.journal().can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.journal().can_redo()
    }

    pub fn clear_undo_history(&self) {
        self.journal().clear();
    }

    // ── Listeners ──

    /// Register a listener for change notices. It runs on the mutating
    /// thread after every node lock of the change has been released.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ChangeNotice) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new(
            self.shared
                .next_subscription
                .fetch_add(1, Ordering::Relaxed),
        );
        self.shared
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self
            .shared
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}
