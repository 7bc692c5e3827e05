//! Change notices delivered to subscribed listeners.

use std::sync::{Arc, Mutex};

use acrl_core::{BaseElement, ChangeKind, ChangeNotice, ChangeOrigin, Universe};

use crate::common::recording_universe;

fn collect(universe: &Universe) -> Arc<Mutex<Vec<ChangeNotice>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    universe.subscribe(move |notice| sink.lock().unwrap().push(*notice));
    seen
}

fn drain(seen: &Mutex<Vec<ChangeNotice>>) -> Vec<ChangeNotice> {
    std::mem::take(&mut *seen.lock().unwrap())
}

#[test]
fn first_name_reports_new_slot_nodes_and_the_owner() {
    let universe = Universe::new();
    let element = universe.new_element().unwrap();
    let seen = collect(&universe);

    element.set_name("fresh").unwrap();
    let notices = drain(&seen);

    let pointer = element.name_literal_pointer().unwrap();
    let literal = element.name_literal().unwrap();
    let created: Vec<_> = notices
        .iter()
        .filter(|notice| notice.kind == ChangeKind::Creation)
        .map(|notice| notice.id)
        .collect();
    assert_eq!(created, vec![pointer.id(), literal.id()]);
    assert!(notices.iter().any(|notice| {
        notice.kind == ChangeKind::Modification && notice.id == element.id()
    }));
    assert!(notices.iter().all(|notice| notice.origin == ChangeOrigin::Mutation));
}

#[test]
fn notices_carry_the_version_after_the_change() {
    let universe = Universe::new();
    let literal = universe.new_literal().unwrap();
    let seen = collect(&universe);

    literal.set_value("v").unwrap();
    let notices = drain(&seen);

    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].id, literal.id());
    assert_eq!(notices[0].version, literal.version());
}

#[test]
fn listeners_hear_mutations_even_without_undo_recording() {
    let universe = Universe::new();
    let seen = collect(&universe);
    let element = universe.new_element().unwrap();
    universe.delete(&BaseElement::from(element.clone())).unwrap();

    let kinds: Vec<_> = drain(&seen).iter().map(|notice| notice.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::Creation, ChangeKind::Deletion]);
}

#[test]
fn undo_and_redo_are_reported_with_their_origin() {
    let universe = recording_universe();
    let literal = universe.new_literal().unwrap();
    universe.mark_undo_point();
    let before = literal.version();
    literal.set_value("after").unwrap();
    let after = literal.version();
    let seen = collect(&universe);

    assert!(universe.undo());
    assert!(universe.redo());
    let notices = drain(&seen);

    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].origin, ChangeOrigin::Undo);
    assert_eq!(notices[0].version, before);
    assert_eq!(notices[1].origin, ChangeOrigin::Redo);
    assert_eq!(notices[1].version, after);
}

#[test]
fn markers_and_no_op_writes_are_silent() {
    let universe = recording_universe();
    let element = universe.new_element().unwrap();
    let seen = collect(&universe);

    universe.mark_undo_point();
    element.set_uri("").unwrap();
    element.set_owner(None).unwrap();
    assert!(drain(&seen).is_empty());
}

#[test]
fn listener_may_read_back_into_the_universe() {
    let universe = Universe::new();
    let element = universe.new_element().unwrap();
    let observer = universe.clone();
    let names = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&names);
    universe.subscribe(move |notice| {
        if let Some(element) = observer.lookup_element(notice.id) {
            sink.lock().unwrap().push(element.name());
        }
    });

    element.set_name("visible").unwrap();
    assert_eq!(names.lock().unwrap().last().map(String::as_str), Some("visible"));
}

#[test]
fn unsubscribed_listeners_stop_hearing() {
    let universe = Universe::new();
    let seen = Arc::new(Mutex::new(0_usize));
    let sink = Arc::clone(&seen);
    let subscription = universe.subscribe(move |_| *sink.lock().unwrap() += 1);

    universe.new_element().unwrap();
    assert!(universe.unsubscribe(subscription));
    assert!(!universe.unsubscribe(subscription));
    universe.new_element().unwrap();
    assert_eq!(*seen.lock().unwrap(), 1);
}
