//! Typed handles onto nodes.
//!
//! A handle is a cheap clone of the node cell plus the Universe it was
//! obtained from. Handles never own a node's lifetime in the model sense:
//! that is the job of the ownership tree and the Universe index.

use std::fmt;
use std::sync::Arc;

use acrl_types::{ElementId, NodeKind, UodError, UodResult, Version};

use crate::element::Element;
use crate::node::{NodeCell, NodeState};
use crate::pointer::{ElementPointer, ElementPointerPointer, LiteralPointer, LiteralPointerPointer};
use crate::universe::Universe;
use crate::value::Literal;

#[derive(Clone)]
pub(crate) struct NodeRef {
    pub(crate) cell: Arc<NodeCell>,
    pub(crate) universe: Universe,
}

impl NodeRef {
    pub(crate) fn new(cell: Arc<NodeCell>, universe: Universe) -> Self {
        Self { cell, universe }
    }

    pub(crate) fn id(&self) -> ElementId {
        self.cell.id()
    }

    pub(crate) fn kind(&self) -> NodeKind {
        self.cell.kind()
    }

    pub(crate) fn state(&self) -> NodeState {
        self.cell.snapshot()
    }

    pub(crate) fn version(&self) -> Version {
        self.cell.lock().version
    }

    pub(crate) fn owner_id(&self) -> Option<ElementId> {
        self.cell.lock().owner
    }

    /// Resolve another cell in this node's Universe.
    pub(crate) fn sibling(&self, cell: Arc<NodeCell>) -> Self {
        Self::new(cell, self.universe.clone())
    }

    pub(crate) fn ensure_same_universe(&self, other: &NodeRef) -> UodResult<()> {
        if self.universe.ptr_eq(&other.universe) {
            Ok(())
        } else {
            Err(UodError::invalid(format!(
                "{} {} and {} {} belong to different universes",
                self.kind(),
                self.id(),
                other.kind(),
                other.id()
            )))
        }
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}@{})", self.kind(), self.id(), self.version())
    }
}

/// Declares a handle type wrapping a [`NodeRef`] with the identity accessors
/// every node kind shares. Equality is node identity, not content.
macro_rules! node_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name {
            pub(crate) node: $crate::handle::NodeRef,
        }

        impl $name {
            pub(crate) fn from_node(node: $crate::handle::NodeRef) -> Self {
                Self { node }
            }

            #[must_use]
            pub fn id(&self) -> acrl_types::ElementId {
                self.node.id()
            }

            #[must_use]
            pub fn version(&self) -> acrl_types::Version {
                self.node.version()
            }

            #[must_use]
            pub fn kind(&self) -> acrl_types::NodeKind {
                self.node.kind()
            }

            #[must_use]
            pub fn universe(&self) -> &$crate::universe::Universe {
                &self.node.universe
            }

            /// Whether the node is currently present in its Universe's index.
            #[must_use]
            pub fn is_registered(&self) -> bool {
                self.node.cell.is_registered()
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Debug::fmt(&self.node, f)
            }
        }

        impl From<$name> for $crate::handle::BaseElement {
            fn from(handle: $name) -> Self {
                Self::from_node(handle.node)
            }
        }
    };
}

pub(crate) use node_handle;

/// Any node, dispatched on its concrete kind.
///
/// References and Refinements appear as [`BaseElement::Element`]; use
/// [`Element::kind`] and the `TryFrom<Element>` conversions to narrow them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseElement {
    Element(Element),
    Literal(Literal),
    ElementPointer(ElementPointer),
    LiteralPointer(LiteralPointer),
    ElementPointerPointer(ElementPointerPointer),
    LiteralPointerPointer(LiteralPointerPointer),
}

impl BaseElement {
    pub(crate) fn from_node(node: NodeRef) -> Self {
        match node.kind() {
            NodeKind::Element
            | NodeKind::ElementReference
            | NodeKind::ElementPointerReference
            | NodeKind::LiteralPointerReference
            | NodeKind::LiteralReference
            | NodeKind::Refinement => Self::Element(Element::from_node(node)),
            NodeKind::Literal => Self::Literal(Literal::from_node(node)),
            NodeKind::ElementPointer => Self::ElementPointer(ElementPointer::from_node(node)),
            NodeKind::LiteralPointer => Self::LiteralPointer(LiteralPointer::from_node(node)),
            NodeKind::ElementPointerPointer => {
                Self::ElementPointerPointer(ElementPointerPointer::from_node(node))
            }
            NodeKind::LiteralPointerPointer => {
                Self::LiteralPointerPointer(LiteralPointerPointer::from_node(node))
            }
        }
    }

    pub(crate) fn node(&self) -> &NodeRef {
        match self {
            Self::Element(handle) => &handle.node,
            Self::Literal(handle) => &handle.node,
            Self::ElementPointer(handle) => &handle.node,
            Self::LiteralPointer(handle) => &handle.node,
            Self::ElementPointerPointer(handle) => &handle.node,
            Self::LiteralPointerPointer(handle) => &handle.node,
        }
    }

    #[must_use]
    pub fn id(&self) -> ElementId {
        self.node().id()
    }

    #[must_use]
    pub fn version(&self) -> Version {
        self.node().version()
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.node().kind()
    }

    #[must_use]
    pub fn universe(&self) -> &Universe {
        &self.node().universe
    }

    #[must_use]
    pub fn owner_id(&self) -> Option<ElementId> {
        self.node().owner_id()
    }

    /// The Element that owns this node, if it is registered.
    #[must_use]
    pub fn owner(&self) -> Option<Element> {
        self.owner_id()
            .and_then(|id| self.universe().lookup_element(id))
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.node().cell.is_registered()
    }

    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_element(self) -> Option<Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(literal) => Some(literal),
            _ => None,
        }
    }
}
