//! Wire-format behavior through the public marshal/recover API.

use std::collections::BTreeSet;

use acrl_core::{BaseElement, NodeKind, Universe, UodError};
use serde_json::{Map, Value};

use crate::common::{
    assert_equivalent, assert_ownership_duality, recording_universe, sample_tree,
};

fn to_value(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

fn collect_types(value: &Value, types: &mut BTreeSet<String>) {
    let Some(object) = value.as_object() else {
        return;
    };
    if let Some(kind) = object.get("Type").and_then(Value::as_str) {
        types.insert(kind.to_owned());
    }
    if let Some(children) = object.get("OwnedBaseElements").and_then(Value::as_object) {
        for child in children.values() {
            collect_types(child, types);
        }
    }
}

/// Apply `edit` to the first node of type `kind`, depth first.
fn edit_first(
    value: &mut Value,
    kind: &str,
    edit: &mut dyn FnMut(&mut Map<String, Value>),
) -> bool {
    let Value::Object(object) = value else {
        return false;
    };
    if object.get("Type").and_then(Value::as_str) == Some(kind) {
        edit(object);
        return true;
    }
    if let Some(Value::Object(children)) = object.get_mut("OwnedBaseElements") {
        for child in children.values_mut() {
            if edit_first(child, kind, edit) {
                return true;
            }
        }
    }
    false
}

#[test]
fn sample_document_names_every_kind() {
    let universe = Universe::new();
    let root = sample_tree(&universe);
    let document = to_value(&universe.marshal(&root).unwrap());

    let mut types = BTreeSet::new();
    collect_types(&document, &mut types);
    let expected: BTreeSet<String> = NodeKind::ALL
        .iter()
        .map(|kind| kind.to_string())
        .collect();
    assert_eq!(types, expected);
}

#[test]
fn marshal_is_stable_across_a_round_trip() {
    let universe = Universe::new();
    let root = sample_tree(&universe);
    let first = universe.marshal(&root).unwrap();
    assert_eq!(universe.marshal(&root).unwrap(), first);

    let copy = Universe::new();
    let recovered = copy.recover(&first).unwrap();
    assert_eq!(copy.marshal(&recovered).unwrap(), first);
}

#[test]
fn recovered_pointers_resolve_inside_the_destination() {
    let universe = Universe::new();
    let root = sample_tree(&universe);
    let child = root.first_owned_element_with_name("Child").unwrap();

    let copy = Universe::new();
    let recovered = copy.recover(&universe.marshal(&root).unwrap()).unwrap();
    assert_equivalent(&root, &recovered);
    assert_ownership_duality(&copy);

    let recovered_child = recovered.first_owned_element_with_name("Child").unwrap();
    assert_eq!(recovered_child.id(), child.id());
    assert!(recovered_child.universe().ptr_eq(&copy));
    let refinement = recovered
        .owned_children()
        .into_iter()
        .find_map(|id| copy.lookup_refinement(id))
        .unwrap();
    assert_eq!(refinement.refined_element(), Some(recovered_child));
    assert_eq!(refinement.abstract_element(), Some(recovered));
}

#[test]
fn subtree_keeps_its_external_owner_id() {
    let universe = Universe::new();
    let root = sample_tree(&universe);
    let child = root.first_owned_element_with_name("Child").unwrap();

    let copy = Universe::new();
    let recovered = copy.recover(&universe.marshal(&child).unwrap()).unwrap();

    assert_eq!(recovered.owner_id(), Some(root.id()));
    assert_eq!(recovered.owner(), None);
    assert_eq!(recovered.name(), "Child");
    assert_eq!(recovered.uri(), "urn:sample:child");
}

#[test]
fn deep_chain_survives_a_round_trip() {
    let universe = Universe::new();
    let root = universe.new_element().unwrap();
    let mut tip = root.clone();
    for depth in 0..150 {
        let next = universe.new_element().unwrap();
        next.set_owner(Some(&tip)).unwrap();
        next.set_name(&format!("level {depth}")).unwrap();
        tip = next;
    }

    let copy = Universe::new();
    let recovered = copy.recover(&universe.marshal(&root).unwrap()).unwrap();
    assert_equivalent(&root, &recovered);
    assert_ownership_duality(&copy);
    assert_eq!(copy.lookup_element(tip.id()).unwrap().name(), "level 149");
}

#[test]
fn recovering_next_to_a_registered_owner_reattaches_it() {
    let universe = recording_universe();
    let root = sample_tree(&universe);
    let child = root.first_owned_element_with_name("Child").unwrap();
    let bytes = universe.marshal(&child).unwrap();
    let child_version = child.version();
    universe.delete(&BaseElement::from(child.clone())).unwrap();
    universe.mark_undo_point();
    let root_version = root.version();

    let recovered = universe.recover(&bytes).unwrap();
    assert_eq!(recovered.owner(), Some(root.clone()));
    assert!(root.is_owner_of(recovered.id()));
    assert!(root.version() > root_version);
    assert_eq!(recovered.version(), child_version);
    assert_ownership_duality(&universe);

    universe.mark_undo_point();
    assert!(universe.undo());
    assert!(!root.is_owner_of(child.id()));
    assert_eq!(root.version(), root_version);
    assert_ownership_duality(&universe);
}

#[test]
fn pointer_leaving_the_subtree_keeps_its_target_id() {
    let universe = Universe::new();
    let holder = universe.new_element().unwrap();
    let outside = universe.new_element().unwrap();
    let reference = universe.new_element_reference().unwrap();
    reference.as_element().set_owner(Some(&holder)).unwrap();
    reference.set_referenced_element(Some(&outside)).unwrap();

    let copy = Universe::new();
    copy.recover(&universe.marshal(&holder).unwrap()).unwrap();
    let recovered = copy.lookup_element_reference(reference.id()).unwrap();

    assert_eq!(recovered.referenced_element_id(), Some(outside.id()));
    assert_eq!(recovered.referenced_element(), None);
}

#[test]
fn recovering_the_same_document_twice_collides() {
    let universe = Universe::new();
    let root = sample_tree(&universe);
    let bytes = universe.marshal(&root).unwrap();

    let copy = Universe::new();
    copy.recover(&bytes).unwrap();
    let count = copy.len();

    let err = copy.recover(&bytes).unwrap_err();
    assert!(matches!(err, UodError::IdentityCollision { .. }));
    assert_eq!(copy.len(), count);
}

#[test]
fn unknown_pointer_role_is_a_malformed_field() {
    let universe = Universe::new();
    let root = sample_tree(&universe);
    let mut document = to_value(&universe.marshal(&root).unwrap());
    assert!(edit_first(&mut document, "LiteralPointer", &mut |node| {
        node.insert("PointerRole".into(), Value::from("SIDEWAYS"));
    }));

    let copy = Universe::new();
    let err = copy
        .recover(&serde_json::to_vec(&document).unwrap())
        .unwrap_err();
    assert!(matches!(
        err,
        UodError::MalformedField { ref field, .. } if field == "PointerRole"
    ));
    assert!(copy.is_empty());
}

#[test]
fn missing_pointer_target_field_is_a_malformed_field() {
    let universe = Universe::new();
    let root = sample_tree(&universe);
    let mut document = to_value(&universe.marshal(&root).unwrap());
    assert!(edit_first(&mut document, "ElementPointerPointer", &mut |node| {
        node.remove("ElementPointerId");
    }));

    let err = Universe::new()
        .recover(&serde_json::to_vec(&document).unwrap())
        .unwrap_err();
    assert!(matches!(
        err,
        UodError::MalformedField { ref field, .. } if field == "ElementPointerId"
    ));
}

#[test]
fn node_repeated_inside_one_document_is_a_collision() {
    let universe = Universe::new();
    let root = universe.new_element().unwrap();
    let first = universe.new_element().unwrap();
    let second = universe.new_element().unwrap();
    first.set_owner(Some(&root)).unwrap();
    second.set_owner(Some(&root)).unwrap();
    let literal = universe.new_literal().unwrap();
    literal.set_owner(Some(&first)).unwrap();

    let mut document = to_value(&universe.marshal(&root).unwrap());
    let key = literal.id().to_string();
    let mut copied = None;
    edit_first(&mut document, "Literal", &mut |node| {
        copied = Some(Value::Object(node.clone()));
    });
    let second_key = second.id().to_string();
    let children = document["OwnedBaseElements"][second_key.as_str()]["OwnedBaseElements"]
        .as_object_mut()
        .unwrap();
    children.insert(key, copied.unwrap());

    let copy = Universe::new();
    let err = copy
        .recover(&serde_json::to_vec(&document).unwrap())
        .unwrap_err();
    assert_eq!(err, UodError::IdentityCollision { id: literal.id() });
    assert!(copy.is_empty());
}

#[test]
fn marshaling_a_foreign_element_is_rejected() {
    let first = Universe::new();
    let second = Universe::new();
    let element = first.new_element().unwrap();
    assert!(matches!(
        second.marshal(&element),
        Err(UodError::InvalidOperation { .. })
    ));
}
