//! Refinement: a directed "is a specialization of" edge between two Elements.

use acrl_types::{ElementPointerRole, NodeKind, UodResult};

use crate::element::Element;
use crate::node::PointerRole;
use crate::pointer::ElementPointer;
use crate::reference::{element_wrapper, owned_pointer, set_owned_pointer_target};

const ABSTRACT: Option<PointerRole> = Some(PointerRole::Element(ElementPointerRole::AbstractElement));
const REFINED: Option<PointerRole> = Some(PointerRole::Element(ElementPointerRole::RefinedElement));

element_wrapper!(
    /// Owns an ABSTRACT_ELEMENT and a REFINED_ELEMENT pointer, each created
    /// on first set.
    Refinement,
    NodeKind::Refinement
);

impl Refinement {
    #[must_use]
    pub fn abstract_element(&self) -> Option<Element> {
        self.abstract_element_pointer()
            .and_then(|pointer| pointer.element())
    }

    pub fn set_abstract_element(&self, element: Option<&Element>) -> UodResult<()> {
        set_owned_pointer_target(
            &self.element,
            NodeKind::ElementPointer,
            ABSTRACT,
            element.map(|element| &element.node),
        )
    }

    #[must_use]
    pub fn abstract_element_pointer(&self) -> Option<ElementPointer> {
        owned_pointer(&self.element, NodeKind::ElementPointer, ABSTRACT).map(ElementPointer::from_node)
    }

    #[must_use]
    pub fn refined_element(&self) -> Option<Element> {
        self.refined_element_pointer()
            .and_then(|pointer| pointer.element())
    }

    pub fn set_refined_element(&self, element: Option<&Element>) -> UodResult<()> {
        set_owned_pointer_target(
            &self.element,
            NodeKind::ElementPointer,
            REFINED,
            element.map(|element| &element.node),
        )
    }

    #[must_use]
    pub fn refined_element_pointer(&self) -> Option<ElementPointer> {
        owned_pointer(&self.element, NodeKind::ElementPointer, REFINED).map(ElementPointer::from_node)
    }
}
