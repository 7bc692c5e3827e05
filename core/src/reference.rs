//! References: Elements that own one pointer child and expose its target.
//!
//! The pointer child is created on the first non-nil set. Reading through a
//! Reference whose pointer was never created yields `None`.

use acrl_types::{ElementId, ElementPointerRole, LiteralPointerRole, NodeKind, UodResult};

use crate::element::{Element, ensure_owned_pointer, find_owned_pointer};
use crate::handle::NodeRef;
use crate::node::PointerRole;
use crate::pointer::{
    self, ElementPointer, ElementPointerPointer, LiteralPointer, LiteralPointerPointer,
};
use crate::value::Literal;

pub(crate) fn owned_pointer(
    element: &Element,
    kind: NodeKind,
    role: Option<PointerRole>,
) -> Option<NodeRef> {
    find_owned_pointer(&element.node, kind, role).map(|cell| element.node.sibling(cell))
}

/// Point the owned `(kind, role)` pointer of `element` at `target`, creating
/// the pointer first if needed. Clearing a missing pointer creates nothing.
pub(crate) fn set_owned_pointer_target(
    element: &Element,
    kind: NodeKind,
    role: Option<PointerRole>,
    target: Option<&NodeRef>,
) -> UodResult<()> {
    if let Some(target) = target {
        element.node.ensure_same_universe(target)?;
    }
    let mut op = element.universe().begin();
    let pointer = match owned_pointer(element, kind, role) {
        Some(pointer) => pointer,
        None if target.is_none() => return Ok(()),
        None => ensure_owned_pointer(&mut op, &element.node, kind, role)?,
    };
    pointer::set_target(&mut op, &pointer, target)
}

/// Declares a typed wrapper over an [`Element`] of one concrete kind.
macro_rules! element_wrapper {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            element: $crate::element::Element,
        }

        impl $name {
            #[must_use]
            pub fn id(&self) -> acrl_types::ElementId {
                self.element.id()
            }

            #[must_use]
            pub fn version(&self) -> acrl_types::Version {
                self.element.version()
            }

            #[must_use]
            pub fn as_element(&self) -> &$crate::element::Element {
                &self.element
            }

            #[must_use]
            pub fn into_element(self) -> $crate::element::Element {
                self.element
            }
        }

        impl TryFrom<$crate::element::Element> for $name {
            type Error = acrl_types::UodError;

            fn try_from(element: $crate::element::Element) -> Result<Self, Self::Error> {
                if element.kind() == $kind {
                    Ok(Self { element })
                } else {
                    Err(acrl_types::UodError::NotFound {
                        id: element.id(),
                        expected: $kind,
                    })
                }
            }
        }

        impl From<$name> for $crate::element::Element {
            fn from(wrapper: $name) -> Self {
                wrapper.element
            }
        }

        impl From<$name> for $crate::handle::BaseElement {
            fn from(wrapper: $name) -> Self {
                Self::Element(wrapper.element)
            }
        }
    };
}

pub(crate) use element_wrapper;

const REFERENCED_ELEMENT: Option<PointerRole> =
    Some(PointerRole::Element(ElementPointerRole::ReferencedElement));
const REFERENCED_VALUE: Option<PointerRole> = Some(PointerRole::Literal(LiteralPointerRole::Value));

element_wrapper!(
    /// Reference to an Element through a REFERENCED_ELEMENT pointer.
    ElementReference,
    NodeKind::ElementReference
);

impl ElementReference {
    #[must_use]
    pub fn referenced_element(&self) -> Option<Element> {
        self.referenced_element_pointer()
            .and_then(|pointer| pointer.element())
    }

    pub fn set_referenced_element(&self, element: Option<&Element>) -> UodResult<()> {
        set_owned_pointer_target(
            &self.element,
            NodeKind::ElementPointer,
            REFERENCED_ELEMENT,
            element.map(|element| &element.node),
        )
    }

    /// The internal pointer child, if it has been created.
    #[must_use]
    pub fn referenced_element_pointer(&self) -> Option<ElementPointer> {
        owned_pointer(&self.element, NodeKind::ElementPointer, REFERENCED_ELEMENT)
            .map(ElementPointer::from_node)
    }

    #[must_use]
    pub fn referenced_element_id(&self) -> Option<ElementId> {
        self.referenced_element_pointer()
            .and_then(|pointer| pointer.element_id())
    }
}

element_wrapper!(
    /// Reference to an ElementPointer.
    ElementPointerReference,
    NodeKind::ElementPointerReference
);

impl ElementPointerReference {
    #[must_use]
    pub fn referenced_element_pointer(&self) -> Option<ElementPointer> {
        self.element_pointer_pointer()
            .and_then(|pointer| pointer.element_pointer())
    }

    pub fn set_referenced_element_pointer(&self, pointer: Option<&ElementPointer>) -> UodResult<()> {
        set_owned_pointer_target(
            &self.element,
            NodeKind::ElementPointerPointer,
            None,
            pointer.map(|pointer| &pointer.node),
        )
    }

    #[must_use]
    pub fn element_pointer_pointer(&self) -> Option<ElementPointerPointer> {
        owned_pointer(&self.element, NodeKind::ElementPointerPointer, None)
            .map(ElementPointerPointer::from_node)
    }
}

element_wrapper!(
    /// Reference to a LiteralPointer.
    LiteralPointerReference,
    NodeKind::LiteralPointerReference
);

impl LiteralPointerReference {
    #[must_use]
    pub fn referenced_literal_pointer(&self) -> Option<LiteralPointer> {
        self.literal_pointer_pointer()
            .and_then(|pointer| pointer.literal_pointer())
    }

    pub fn set_referenced_literal_pointer(&self, pointer: Option<&LiteralPointer>) -> UodResult<()> {
        set_owned_pointer_target(
            &self.element,
            NodeKind::LiteralPointerPointer,
            None,
            pointer.map(|pointer| &pointer.node),
        )
    }

    #[must_use]
    pub fn literal_pointer_pointer(&self) -> Option<LiteralPointerPointer> {
        owned_pointer(&self.element, NodeKind::LiteralPointerPointer, None)
            .map(LiteralPointerPointer::from_node)
    }
}

element_wrapper!(
    /// Reference to a Literal through a VALUE pointer.
    LiteralReference,
    NodeKind::LiteralReference
);

impl LiteralReference {
    #[must_use]
    pub fn referenced_literal(&self) -> Option<Literal> {
        self.referenced_literal_pointer()
            .and_then(|pointer| pointer.literal())
    }

    pub fn set_referenced_literal(&self, literal: Option<&Literal>) -> UodResult<()> {
        set_owned_pointer_target(
            &self.element,
            NodeKind::LiteralPointer,
            REFERENCED_VALUE,
            literal.map(|literal| &literal.node),
        )
    }

    #[must_use]
    pub fn referenced_literal_pointer(&self) -> Option<LiteralPointer> {
        owned_pointer(&self.element, NodeKind::LiteralPointer, REFERENCED_VALUE)
            .map(LiteralPointer::from_node)
    }
}
