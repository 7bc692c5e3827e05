//! End-to-end walkthroughs of the core collaborator workflows.

use acrl_core::Universe;

use crate::common::{assert_equivalent, recording_universe};

#[test]
fn owning_a_child_links_both_directions() {
    let universe = Universe::new();
    let parent = universe.new_element().unwrap();
    let child = universe.new_element().unwrap();

    child.set_owner(Some(&parent)).unwrap();

    assert!(parent.owned_children().contains(&child.id()));
    let pointer = child.owning_element_pointer().unwrap();
    assert_eq!(pointer.element(), Some(parent));
}

#[test]
fn element_reference_follows_its_target() {
    let universe = Universe::new();
    let reference = universe.new_element_reference().unwrap();
    assert_eq!(reference.referenced_element(), None);

    let target = universe.new_element().unwrap();
    reference.set_referenced_element(Some(&target)).unwrap();
    assert_eq!(reference.referenced_element(), Some(target));

    reference.set_referenced_element(None).unwrap();
    assert_eq!(reference.referenced_element(), None);
}

#[test]
fn round_trip_restores_child_owner() {
    let universe = Universe::new();
    let parent = universe.new_element().unwrap();
    let child = universe.new_element().unwrap();
    child.set_owner(Some(&parent)).unwrap();
    let bytes = universe.marshal(&parent).unwrap();

    let fresh = Universe::new();
    let recovered = fresh.recover(&bytes).unwrap();
    assert_equivalent(&parent, &recovered);

    let recovered_child = fresh.lookup_element(child.id()).unwrap();
    assert_eq!(recovered_child.owner(), Some(recovered));
}

#[test]
fn undoing_set_name_removes_the_slot_nodes() {
    let universe = recording_universe();
    let element = universe.new_element().unwrap();
    universe.mark_undo_point();
    element.set_name("x").unwrap();
    let pointer_id = element.name_literal_pointer().unwrap().id();
    let literal_id = element.name_literal().unwrap().id();

    assert!(universe.undo());
    assert_eq!(element.name(), "");
    assert!(!universe.contains(pointer_id));
    assert!(!universe.contains(literal_id));
    assert!(universe.contains(element.id()));

    assert!(universe.redo());
    assert_eq!(element.name(), "x");
    assert_eq!(element.name_literal_pointer().unwrap().id(), pointer_id);
    assert_eq!(element.name_literal().unwrap().id(), literal_id);
}
