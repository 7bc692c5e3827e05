//! Deleting nodes and subtrees.

use acrl_core::{BaseElement, LiteralPointerRole, Universe, UodError};

use crate::common::{
    assert_equivalent, assert_ownership_duality, recording_universe, sample_tree, snapshot,
};

#[test]
fn deleting_a_child_removes_its_whole_subtree() {
    let universe = Universe::new();
    let root = sample_tree(&universe);
    let child = root.first_owned_element_with_name("Child").unwrap();
    let name = child.name_literal().unwrap();
    let before = universe.len();

    universe.delete(&BaseElement::from(child.clone())).unwrap();

    assert!(!child.is_registered());
    assert!(!name.is_registered());
    assert!(!root.is_owner_of(child.id()));
    assert!(universe.len() < before);
    assert!(universe.ids().iter().all(|id| *id != child.id()));
    assert_ownership_duality(&universe);
}

#[test]
fn pointers_to_a_deleted_node_stop_resolving() {
    let universe = Universe::new();
    let root = sample_tree(&universe);
    let child = root.first_owned_element_with_name("Child").unwrap();
    let reference = universe.new_element_reference().unwrap();
    reference.set_referenced_element(Some(&child)).unwrap();
    assert_eq!(reference.referenced_element(), Some(child.clone()));

    universe.delete(&BaseElement::from(child.clone())).unwrap();

    assert_eq!(reference.referenced_element(), None);
    assert_eq!(reference.referenced_element_id(), Some(child.id()));
    assert!(reference.referenced_element_pointer().unwrap().is_stale());
}

#[test]
fn deleting_a_literal_detaches_it_from_its_slot() {
    let universe = Universe::new();
    let element = universe.new_element().unwrap();
    element.set_uri("urn:doomed").unwrap();
    let literal = element.uri_literal().unwrap();

    universe.delete(&BaseElement::from(literal)).unwrap();

    assert_eq!(element.uri(), "");
    let pointer = element.uri_literal_pointer().unwrap();
    assert_eq!(pointer.role(), Some(LiteralPointerRole::Uri));
    assert!(pointer.literal_id().is_some());
    assert!(pointer.literal().is_none());
}

#[test]
fn deleted_root_no_longer_names_its_owner() {
    let universe = recording_universe();
    let root = sample_tree(&universe);
    let child = root.first_owned_element_with_name("Child").unwrap();
    let owning = child.owning_element_pointer().unwrap();
    universe.mark_undo_point();

    universe.delete(&BaseElement::from(child.clone())).unwrap();
    assert_eq!(child.owner_id(), None);
    assert_eq!(BaseElement::from(child.clone()).owner_id(), None);
    assert_eq!(owning.element_id(), None);

    universe.mark_undo_point();
    assert!(universe.undo());
    assert_eq!(child.owner(), Some(root.clone()));
    assert_eq!(owning.element_id(), Some(root.id()));
    assert_ownership_duality(&universe);
}

#[test]
fn undo_restores_a_deleted_subtree_exactly() {
    let universe = recording_universe();
    let root = sample_tree(&universe);
    universe.mark_undo_point();
    let before = snapshot(&root);
    let count = universe.len();

    let child = root.first_owned_element_with_name("Child").unwrap();
    universe.delete(&BaseElement::from(child.clone())).unwrap();
    universe.mark_undo_point();
    let after = snapshot(&root);

    assert!(universe.undo());
    assert_eq!(universe.len(), count);
    assert!(child.is_registered());
    assert_equivalent(&root, &before);
    assert_eq!(child.name(), "Child");
    assert_ownership_duality(&universe);

    assert!(universe.redo());
    assert!(!child.is_registered());
    assert_equivalent(&root, &after);
}

#[test]
fn deleting_an_unregistered_node_is_not_found() {
    let universe = Universe::new();
    let element = universe.new_element().unwrap();
    let node = BaseElement::from(element.clone());
    universe.delete(&node).unwrap();

    let err = universe.delete(&node).unwrap_err();
    assert!(matches!(err, UodError::NotFound { id, .. } if id == element.id()));
}

#[test]
fn deleting_a_foreign_node_is_rejected() {
    let first = Universe::new();
    let second = Universe::new();
    let element = first.new_element().unwrap();

    let err = second
        .delete(&BaseElement::from(element.clone()))
        .unwrap_err();
    assert!(matches!(err, UodError::InvalidOperation { .. }));
    assert!(element.is_registered());
}
