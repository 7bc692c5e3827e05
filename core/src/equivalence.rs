//! Structural equivalence of two node trees, possibly in different Universes.
//!
//! Two nodes are equivalent when they have the same kind, id and version and
//! their kind-specific fields agree. Elements compare their owned subtrees
//! recursively; owners are compared by id only.

use thiserror::Error;
use tracing::debug;

use crate::handle::{BaseElement, NodeRef};
use crate::node::{NodeBody, NodeState};

/// First divergence found between two trees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {reason}")]
pub struct EquivalenceMismatch {
    /// Slash-separated ids from the compared root down to the divergent node.
    pub path: String,
    pub reason: String,
}

impl EquivalenceMismatch {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_owned(),
            reason: reason.into(),
        }
    }
}

#[must_use]
pub fn equivalent(a: &BaseElement, b: &BaseElement) -> bool {
    match check_equivalence(a, b) {
        Ok(()) => true,
        Err(mismatch) => {
            debug!(path = %mismatch.path, reason = %mismatch.reason, "trees differ");
            false
        }
    }
}

pub fn check_equivalence(a: &BaseElement, b: &BaseElement) -> Result<(), EquivalenceMismatch> {
    let path = a.id().to_string();
    check_node(a.node(), b.node(), &path)
}

fn check_node(a: &NodeRef, b: &NodeRef, path: &str) -> Result<(), EquivalenceMismatch> {
    if a.kind() != b.kind() {
        return Err(EquivalenceMismatch::new(
            path,
            format!("kind {} != {}", a.kind(), b.kind()),
        ));
    }
    if a.id() != b.id() {
        return Err(EquivalenceMismatch::new(
            path,
            format!("id {} != {}", a.id(), b.id()),
        ));
    }
    let left = a.state();
    let right = b.state();
    if left.version != right.version {
        return Err(EquivalenceMismatch::new(
            path,
            format!("version {} != {}", left.version, right.version),
        ));
    }
    if left.owner != right.owner {
        return Err(EquivalenceMismatch::new(
            path,
            format!("owner {:?} != {:?}", left.owner, right.owner),
        ));
    }

    match (&left.body, &right.body) {
        (NodeBody::Element { owned: left_owned }, NodeBody::Element { owned: right_owned }) => {
            if left_owned != right_owned {
                let missing: Vec<String> = left_owned
                    .symmetric_difference(right_owned)
                    .map(ToString::to_string)
                    .collect();
                return Err(EquivalenceMismatch::new(
                    path,
                    format!("owned children differ: {}", missing.join(", ")),
                ));
            }
            for id in left_owned {
                let child_path = format!("{path}/{id}");
                let (Some(left_child), Some(right_child)) =
                    (a.universe.cell(*id), b.universe.cell(*id))
                else {
                    return Err(EquivalenceMismatch::new(
                        &child_path,
                        "owned child is not registered on both sides",
                    ));
                };
                check_node(&a.sibling(left_child), &b.sibling(right_child), &child_path)?;
            }
            Ok(())
        }
        (NodeBody::Literal { value: left_value }, NodeBody::Literal { value: right_value }) => {
            if left_value == right_value {
                Ok(())
            } else {
                Err(EquivalenceMismatch::new(
                    path,
                    format!("value {left_value:?} != {right_value:?}"),
                ))
            }
        }
        (NodeBody::Pointer { .. }, NodeBody::Pointer { .. }) => check_pointer(&left, &right, path),
        _ => Err(EquivalenceMismatch::new(path, "node bodies differ in shape")),
    }
}

fn check_pointer(left: &NodeState, right: &NodeState, path: &str) -> Result<(), EquivalenceMismatch> {
    if left.role() != right.role() {
        return Err(EquivalenceMismatch::new(
            path,
            format!("role {:?} != {:?}", left.role(), right.role()),
        ));
    }
    let (left_target, right_target) = (left.target(), right.target());
    if left_target.map(|target| target.id) != right_target.map(|target| target.id) {
        return Err(EquivalenceMismatch::new(
            path,
            format!(
                "target {:?} != {:?}",
                left_target.map(|target| target.id),
                right_target.map(|target| target.id)
            ),
        ));
    }
    if left_target.map(|target| target.version) != right_target.map(|target| target.version) {
        return Err(EquivalenceMismatch::new(path, "cached target version differs"));
    }
    Ok(())
}
