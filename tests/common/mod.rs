//! Shared test utilities and fixtures

#![allow(dead_code)]

use acrl_core::{
    BaseElement, Element, ElementPointerRole, LiteralPointerRole, Universe, UniverseConfig,
    check_equivalence,
};

pub fn recording_universe() -> Universe {
    Universe::with_config(&UniverseConfig {
        record_undo: true,
        undo_limit: None,
    })
}

/// Copy `root`'s subtree into a fresh Universe through the wire format.
pub fn snapshot(root: &Element) -> Element {
    let bytes = root.universe().marshal(root).unwrap();
    Universe::new().recover(&bytes).unwrap()
}

pub fn assert_equivalent(a: &Element, b: &Element) {
    if let Err(mismatch) = check_equivalence(
        &BaseElement::from(a.clone()),
        &BaseElement::from(b.clone()),
    ) {
        panic!("trees differ at {}: {}", mismatch.path, mismatch.reason);
    }
}

/// A root with a named child, a reference, a refinement and loose values,
/// exercising every node kind.
pub fn sample_tree(universe: &Universe) -> Element {
    let root = universe.new_element().unwrap();
    root.set_name("Root").unwrap();
    root.set_definition("the top of the sample").unwrap();

    let child = universe.new_element().unwrap();
    child.set_owner(Some(&root)).unwrap();
    child.set_name("Child").unwrap();
    child.set_uri("urn:sample:child").unwrap();

    let reference = universe.new_element_reference().unwrap();
    reference.as_element().set_owner(Some(&root)).unwrap();
    reference.set_referenced_element(Some(&child)).unwrap();

    let refinement = universe.new_refinement().unwrap();
    refinement.as_element().set_owner(Some(&root)).unwrap();
    refinement.set_abstract_element(Some(&root)).unwrap();
    refinement.set_refined_element(Some(&child)).unwrap();

    let literal_reference = universe.new_literal_reference().unwrap();
    literal_reference.as_element().set_owner(Some(&child)).unwrap();
    let value = universe.new_literal().unwrap();
    value.set_value("forty-two").unwrap();
    value.set_owner(Some(&child)).unwrap();
    literal_reference.set_referenced_literal(Some(&value)).unwrap();

    let pointer = universe
        .new_element_pointer(ElementPointerRole::ReferencedElement)
        .unwrap();
    pointer.set_owner(Some(&root)).unwrap();
    let pointer_reference = universe.new_element_pointer_reference().unwrap();
    pointer_reference.as_element().set_owner(Some(&root)).unwrap();
    pointer_reference
        .set_referenced_element_pointer(Some(&pointer))
        .unwrap();

    let value_pointer = universe.new_literal_pointer(LiteralPointerRole::Value).unwrap();
    value_pointer.set_owner(Some(&child)).unwrap();
    let literal_pointer_reference = universe.new_literal_pointer_reference().unwrap();
    literal_pointer_reference
        .as_element()
        .set_owner(Some(&child))
        .unwrap();
    literal_pointer_reference
        .set_referenced_literal_pointer(Some(&value_pointer))
        .unwrap();

    root
}

/// Every owned child points back at its owner and every owner lists its
/// children, across the whole Universe.
pub fn assert_ownership_duality(universe: &Universe) {
    for id in universe.ids() {
        let node = universe.lookup(id).unwrap();
        if let Some(element) = node.as_element() {
            for child in element.owned_base_elements() {
                assert_eq!(
                    child.owner_id(),
                    Some(id),
                    "{} is owned by {id} but points elsewhere",
                    child.id()
                );
            }
        }
        if let Some(owner) = node.owner_id().and_then(|owner| universe.lookup_element(owner)) {
            assert!(
                owner.is_owner_of(id),
                "{id} names {} as owner but is not among its children",
                owner.id()
            );
        }
    }
}
