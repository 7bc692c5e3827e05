//! Plain-text rendering of an ownership tree.

use std::fmt::Write as _;

use acrl_core::{BaseElement, Element, ElementId, Version};

/// One line per node, children indented two spaces under their owner.
pub fn render_tree(root: &Element) -> String {
    let mut out = String::new();
    render_node(&BaseElement::from(root.clone()), 0, &mut out);
    out
}

fn render_node(node: &BaseElement, depth: usize, out: &mut String) {
    let _ = writeln!(
        out,
        "{:indent$}{} {}@{}{}",
        "",
        node.kind(),
        node.id(),
        node.version(),
        describe(node),
        indent = depth * 2
    );
    if let Some(element) = node.as_element() {
        for child in element.owned_base_elements() {
            render_node(&child, depth + 1, out);
        }
    }
}

fn describe(node: &BaseElement) -> String {
    match node {
        BaseElement::Element(element) => {
            let name = element.name();
            if name.is_empty() {
                String::new()
            } else {
                format!(" name={name:?}")
            }
        }
        BaseElement::Literal(literal) => format!(" value={:?}", literal.value()),
        BaseElement::ElementPointer(pointer) => {
            let role = pointer
                .role()
                .map(|role| role.as_wire_str())
                .unwrap_or("?");
            format!(" {role} -> {}", target(pointer.element_id(), pointer.element_version()))
        }
        BaseElement::LiteralPointer(pointer) => {
            let role = pointer
                .role()
                .map(|role| role.as_wire_str())
                .unwrap_or("?");
            format!(" {role} -> {}", target(pointer.literal_id(), pointer.literal_version()))
        }
        BaseElement::ElementPointerPointer(pointer) => format!(
            " -> {}",
            target(pointer.element_pointer_id(), pointer.element_pointer_version())
        ),
        BaseElement::LiteralPointerPointer(pointer) => format!(
            " -> {}",
            target(pointer.literal_pointer_id(), pointer.literal_pointer_version())
        ),
    }
}

fn target(id: Option<ElementId>, version: Option<Version>) -> String {
    match (id, version) {
        (Some(id), Some(version)) => format!("{id}@{version}"),
        _ => "(unset)".to_owned(),
    }
}
