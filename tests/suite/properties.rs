//! Invariants that must hold for any graph, checked over the sample tree.

use std::collections::HashSet;

use acrl_core::{
    BaseElement, ElementPointerRole, LiteralPointerRole, NodeKind, Universe, equivalent,
};

use crate::common::{assert_equivalent, assert_ownership_duality, sample_tree, snapshot};

#[test]
fn ids_are_unique_within_a_universe() {
    let universe = Universe::new();
    sample_tree(&universe);
    let ids = universe.ids();
    let distinct: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(distinct.len(), ids.len());
    assert!(ids.len() > 20);
}

#[test]
fn every_kind_appears_in_the_sample() {
    let universe = Universe::new();
    sample_tree(&universe);
    let kinds: HashSet<NodeKind> = universe
        .ids()
        .into_iter()
        .filter_map(|id| universe.lookup(id))
        .map(|node| node.kind())
        .collect();
    for kind in NodeKind::ALL {
        assert!(kinds.contains(&kind), "sample is missing {kind}");
    }
}

#[test]
fn versions_strictly_increase_on_mutation() {
    let universe = Universe::new();
    let element = universe.new_element().unwrap();
    let other = universe.new_element().unwrap();
    let literal = universe.new_literal().unwrap();
    let pointer = universe.new_literal_pointer(LiteralPointerRole::Value).unwrap();

    let before = literal.version();
    literal.set_value("a").unwrap();
    assert!(literal.version() > before);

    let before = pointer.version();
    pointer.set_literal(Some(&literal)).unwrap();
    assert!(pointer.version() > before);

    let before = (element.version(), literal.version());
    literal.set_owner(Some(&element)).unwrap();
    assert!(element.version() > before.0);
    assert!(literal.version() > before.1);

    let before = (element.version(), other.version());
    literal.set_owner(Some(&other)).unwrap();
    assert!(element.version() > before.0);
    assert!(other.version() > before.1);
}

#[test]
fn ownership_duality_holds_after_moves() {
    let universe = Universe::new();
    let root = sample_tree(&universe);
    assert_ownership_duality(&universe);

    let child = root.first_owned_element_with_name("Child").unwrap();
    let elsewhere = universe.new_element().unwrap();
    child.set_owner(Some(&elsewhere)).unwrap();
    assert_ownership_duality(&universe);
    assert!(!root.is_owner_of(child.id()));

    child.set_owner(None).unwrap();
    assert_ownership_duality(&universe);
    assert_eq!(child.owner(), None);
}

#[test]
fn sample_tree_survives_a_round_trip() {
    let universe = Universe::new();
    let root = sample_tree(&universe);
    let copy = snapshot(&root);
    assert_equivalent(&root, &copy);
    assert_ownership_duality(copy.universe());
    assert_eq!(copy.universe().len(), universe.len());
}

#[test]
fn clearing_any_pointer_kind_succeeds() {
    let universe = Universe::new();
    let element = universe.new_element().unwrap();
    let literal = universe.new_literal().unwrap();
    let element_pointer = universe
        .new_element_pointer(ElementPointerRole::AbstractElement)
        .unwrap();
    let literal_pointer = universe.new_literal_pointer(LiteralPointerRole::Uri).unwrap();
    let epp = universe.new_element_pointer_pointer().unwrap();
    let lpp = universe.new_literal_pointer_pointer().unwrap();

    element_pointer.set_element(Some(&element)).unwrap();
    literal_pointer.set_literal(Some(&literal)).unwrap();
    epp.set_element_pointer(Some(&element_pointer)).unwrap();
    lpp.set_literal_pointer(Some(&literal_pointer)).unwrap();

    element_pointer.set_element(None).unwrap();
    literal_pointer.set_literal(None).unwrap();
    epp.set_element_pointer(None).unwrap();
    lpp.set_literal_pointer(None).unwrap();

    assert_eq!(element_pointer.element(), None);
    assert_eq!(literal_pointer.literal(), None);
    assert_eq!(epp.element_pointer(), None);
    assert_eq!(lpp.literal_pointer(), None);
}

#[test]
fn separate_universes_do_not_share_nodes() {
    let first = Universe::new();
    let second = Universe::new();
    let root = sample_tree(&first);
    let copy = second.recover(&first.marshal(&root).unwrap()).unwrap();

    copy.set_name("Renamed").unwrap();
    assert_eq!(root.name(), "Root");
    assert!(!equivalent(
        &BaseElement::from(root),
        &BaseElement::from(copy)
    ));
}
