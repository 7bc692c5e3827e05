//! JSON wire codec.
//!
//! Every node is an object with a `"Type"` discriminator plus `"Id"` and
//! `"Version"` strings. Element kinds nest their children under
//! `"OwnedBaseElements"`, keyed by child id. Pointers carry only their
//! target's id and cached version, never the target itself.
//!
//! Decoding builds the whole tree off to the side, repairs owner
//! back-references, and only then registers it, so a rejected document
//! leaves the destination Universe untouched. Neither direction recurses per
//! tree level, and documents are parsed without a nesting limit, so any tree
//! that marshals also recovers.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::mem::take;
use std::sync::Arc;

use acrl_types::{
    ElementId, ElementPointerRole, LiteralPointerRole, NodeKind, UodError, UodResult, Version,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::element::Element;
use crate::journal::Operation;
use crate::node::{LockSet, NodeBody, NodeCell, NodeState, PointerRole, TargetRef};
use crate::universe::Universe;

const TYPE: &str = "Type";
const ID: &str = "Id";
const VERSION: &str = "Version";
const OWNED: &str = "OwnedBaseElements";
const LITERAL_VALUE: &str = "LiteralValue";
const POINTER_ROLE: &str = "PointerRole";

#[derive(Debug, Serialize)]
struct WireNode {
    #[serde(rename = "Type")]
    kind: &'static str,
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Version")]
    version: String,
    #[serde(flatten)]
    fields: WireFields,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireFields {
    Element {
        #[serde(rename = "OwnedBaseElements")]
        owned: BTreeMap<String, WireNode>,
    },
    Literal {
        #[serde(rename = "LiteralValue")]
        value: String,
    },
    ElementPointer {
        #[serde(rename = "ElementId")]
        id: String,
        #[serde(rename = "ElementVersion")]
        version: String,
        #[serde(rename = "PointerRole")]
        role: &'static str,
    },
    LiteralPointer {
        #[serde(rename = "LiteralId")]
        id: String,
        #[serde(rename = "LiteralVersion")]
        version: String,
        #[serde(rename = "PointerRole")]
        role: &'static str,
    },
    ElementPointerPointer {
        #[serde(rename = "ElementPointerId")]
        id: String,
        #[serde(rename = "ElementPointerVersion")]
        version: String,
    },
    LiteralPointerPointer {
        #[serde(rename = "LiteralPointerId")]
        id: String,
        #[serde(rename = "LiteralPointerVersion")]
        version: String,
    },
}

/// Field names of a pointer kind's target id and version.
fn target_fields(kind: NodeKind) -> Option<(&'static str, &'static str)> {
    match kind {
        NodeKind::ElementPointer => Some(("ElementId", "ElementVersion")),
        NodeKind::LiteralPointer => Some(("LiteralId", "LiteralVersion")),
        NodeKind::ElementPointerPointer => Some(("ElementPointerId", "ElementPointerVersion")),
        NodeKind::LiteralPointerPointer => Some(("LiteralPointerId", "LiteralPointerVersion")),
        _ => None,
    }
}

// ── Encoding ──

pub(crate) fn marshal(root: &Element) -> UodResult<Vec<u8>> {
    let (wire, nodes) = encode_tree(root.universe(), &root.node.cell)?;
    let bytes = serde_json::to_vec_pretty(&wire).map_err(|err| UodError::encoding(err.to_string()))?;
    debug!(root = %root.id(), nodes, bytes = bytes.len(), "marshaled subtree");
    Ok(bytes)
}

/// Encode a subtree without recursing: nodes are visited pre-order, then
/// folded into their parents from the last visited up. Returns the root and
/// the node count.
fn encode_tree(universe: &Universe, root: &Arc<NodeCell>) -> UodResult<(WireNode, usize)> {
    let mut visited = HashSet::new();
    let mut encoded: Vec<(Option<usize>, WireNode)> = Vec::new();
    let mut pending = vec![(Arc::clone(root), None)];
    while let Some((cell, parent)) = pending.pop() {
        let index = encoded.len();
        let (node, children) = encode_node(universe, &cell, &mut visited)?;
        pending.extend(children.into_iter().rev().map(|child| (child, Some(index))));
        encoded.push((parent, node));
    }

    let nodes = encoded.len();
    let mut root = None;
    while let Some((parent, node)) = encoded.pop() {
        match parent.and_then(|parent| encoded.get_mut(parent)) {
            Some((
                _,
                WireNode {
                    fields: WireFields::Element { owned },
                    ..
                },
            )) => {
                owned.insert(node.id.clone(), node);
            }
            _ => root = Some(node),
        }
    }
    root.map(|root| (root, nodes))
        .ok_or_else(|| UodError::encoding("nothing to encode"))
}

/// One node with an empty child map, plus the cells of its children.
fn encode_node(
    universe: &Universe,
    cell: &Arc<NodeCell>,
    visited: &mut HashSet<ElementId>,
) -> UodResult<(WireNode, Vec<Arc<NodeCell>>)> {
    let id = cell.id();
    let kind = cell.kind();
    if !visited.insert(id) {
        return Err(UodError::encoding(format!("{kind} {id} is reachable twice")));
    }
    let state = cell.snapshot();

    let mut children = Vec::new();
    let fields = match &state.body {
        NodeBody::Element { owned } => {
            for child_id in owned {
                children.push(universe.cell(*child_id).ok_or_else(|| {
                    UodError::encoding(format!("{kind} {id} owns unregistered node {child_id}"))
                })?);
            }
            WireFields::Element {
                owned: BTreeMap::new(),
            }
        }
        NodeBody::Literal { value } => WireFields::Literal {
            value: value.clone(),
        },
        NodeBody::Pointer { role, target } => {
            let (target_id, target_version) = match target {
                Some(target) => (target.id.to_string(), target.version.to_string()),
                None => (String::new(), Version::INITIAL.to_string()),
            };
            encode_pointer(kind, id, *role, target_id, target_version)?
        }
    };

    let node = WireNode {
        kind: kind.as_type_name(),
        id: id.to_string(),
        version: state.version.to_string(),
        fields,
    };
    Ok((node, children))
}

fn encode_pointer(
    kind: NodeKind,
    id: ElementId,
    role: Option<PointerRole>,
    target_id: String,
    target_version: String,
) -> UodResult<WireFields> {
    let fields = match (kind, role) {
        (NodeKind::ElementPointer, Some(PointerRole::Element(role))) => WireFields::ElementPointer {
            id: target_id,
            version: target_version,
            role: role.as_wire_str(),
        },
        (NodeKind::LiteralPointer, Some(PointerRole::Literal(role))) => WireFields::LiteralPointer {
            id: target_id,
            version: target_version,
            role: role.as_wire_str(),
        },
        (NodeKind::ElementPointerPointer, None) => WireFields::ElementPointerPointer {
            id: target_id,
            version: target_version,
        },
        (NodeKind::LiteralPointerPointer, None) => WireFields::LiteralPointerPointer {
            id: target_id,
            version: target_version,
        },
        _ => {
            return Err(UodError::encoding(format!(
                "{kind} {id} carries an incompatible pointer role {role:?}"
            )));
        }
    };
    Ok(fields)
}

// ── Decoding ──

/// A decoded node not yet registered anywhere.
struct Staged {
    id: ElementId,
    kind: NodeKind,
    state: NodeState,
}

/// A document node waiting to be decoded, with the owner and id its parent
/// recorded for it. Whatever is left of the value is dropped iteratively.
struct Frame {
    value: Value,
    parent: Option<(ElementId, ElementId)>,
}

impl Drop for Frame {
    fn drop(&mut self) {
        discard(vec![take(&mut self.value)]);
    }
}

pub(crate) fn recover(op: &mut Operation<'_>, bytes: &[u8]) -> UodResult<Element> {
    let universe = op.universe();
    let cells = stage(bytes)
        .and_then(|cells| universe.register_all(&cells).map(|()| cells))
        .inspect_err(|err| warn!(%err, "rejected document"))?;
    let root = cells
        .first()
        .ok_or_else(|| UodError::malformed("document", TYPE, "empty document"))?;

    if let Err(err) = attach_to_owner(op, root) {
        for cell in &cells {
            universe.unregister(cell);
        }
        warn!(%err, "rejected document");
        return Err(err);
    }
    for cell in &cells {
        op.record_creation(cell);
    }

    debug!(root = %root.id(), nodes = cells.len(), "recovered subtree");
    universe
        .lookup_element(root.id())
        .ok_or(UodError::NotFound {
            id: root.id(),
            expected: root.kind(),
        })
}

/// Add a freshly registered root to the children of its recorded owner when
/// that owner is an Element of this Universe. Any other owner stays a bare id.
fn attach_to_owner(op: &mut Operation<'_>, root: &Arc<NodeCell>) -> UodResult<()> {
    let Some(owner) = root
        .snapshot()
        .owner
        .and_then(|id| op.universe().cell(id))
        .filter(|cell| cell.kind().is_element())
    else {
        return Ok(());
    };

    let owner_id = owner.id();
    let cells = [owner, Arc::clone(root)];
    let mut locks = LockSet::acquire(&cells);
    let before = locks.snapshot();
    let state = locks.state_mut(owner_id)?;
    if let NodeBody::Element { owned } = &mut state.body
        && owned.insert(root.id())
    {
        state.version.bump();
    }
    op.record_changes(&locks, before);
    debug!(root = %root.id(), owner = %owner_id, "attached recovered root to its owner");
    Ok(())
}

fn parse_document(bytes: &[u8]) -> UodResult<Value> {
    let malformed = |err: serde_json::Error| UodError::malformed("document", "", err.to_string());
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    deserializer.disable_recursion_limit();
    let document = Value::deserialize(serde_stacker::Deserializer::new(&mut deserializer))
        .map_err(malformed)?;
    if let Err(err) = deserializer.end() {
        discard(vec![document]);
        return Err(malformed(err));
    }
    Ok(document)
}

/// Decode and validate a document into unregistered cells, root first.
fn stage(bytes: &[u8]) -> UodResult<Vec<Arc<NodeCell>>> {
    let mut pending = vec![Frame {
        value: parse_document(bytes)?,
        parent: None,
    }];
    let mut staged = Vec::new();
    let mut seen = HashSet::new();
    while let Some(frame) = pending.pop() {
        decode_node(frame, &mut pending, &mut staged, &mut seen)?;
    }

    if let Some(owner) = owner_from_owning_pointer(&staged)
        && let Some(root) = staged.first_mut()
    {
        root.state.owner = Some(owner);
    }
    Ok(staged
        .into_iter()
        .map(|node| Arc::new(NodeCell::new(node.id, node.kind, node.state)))
        .collect())
}

/// Decode one node, queueing its children. The node's owner is its parent in
/// the document.
fn decode_node(
    mut frame: Frame,
    pending: &mut Vec<Frame>,
    staged: &mut Vec<Staged>,
    seen: &mut HashSet<ElementId>,
) -> UodResult<()> {
    let parent = frame.parent;
    let Value::Object(object) = &mut frame.value else {
        return Err(UodError::malformed("node", TYPE, "expected a JSON object"));
    };
    let type_name = string_field(object, "node", TYPE)?;
    let kind = NodeKind::from_type_name(type_name).ok_or_else(|| UodError::UnknownType {
        type_name: type_name.to_owned(),
    })?;
    let id = id_field(object, kind, ID)?
        .ok_or_else(|| UodError::malformed(kind, ID, "must not be empty"))?;
    let version = version_field(object, kind, VERSION)?;

    if let Some((owner, expected)) = parent
        && expected != id
    {
        return Err(UodError::malformed(
            kind,
            ID,
            format!("does not match its key {expected} under {owner}"),
        ));
    }
    if parent.is_none() && !kind.is_element() {
        return Err(UodError::invalid(format!(
            "document root is a {kind}, expected an element kind"
        )));
    }
    if !seen.insert(id) {
        return Err(UodError::IdentityCollision { id });
    }

    let body = if kind.is_element() {
        let children = match object.get_mut(OWNED).map(take) {
            Some(Value::Object(children)) => children,
            other => {
                discard(other.into_iter().collect());
                return Err(UodError::malformed(kind, OWNED, "missing or not an object"));
            }
        };
        let keys: Result<Vec<ElementId>, String> = children
            .keys()
            .map(|key| ElementId::parse(key).map_err(|err| format!("key {key}: {err}")))
            .collect();
        let keys = match keys {
            Ok(keys) => keys,
            Err(reason) => {
                discard(vec![Value::Object(children)]);
                return Err(UodError::malformed(kind, OWNED, reason));
            }
        };
        let owned: BTreeSet<ElementId> = keys.iter().copied().collect();
        let frames: Vec<Frame> = keys
            .into_iter()
            .zip(children)
            .map(|(child, (_, value))| Frame {
                value,
                parent: Some((id, child)),
            })
            .collect();
        pending.extend(frames.into_iter().rev());
        NodeBody::Element { owned }
    } else if kind == NodeKind::Literal {
        NodeBody::Literal {
            value: string_field(object, kind, LITERAL_VALUE)?.to_owned(),
        }
    } else {
        decode_pointer(object, kind)?
    };

    staged.push(Staged {
        id,
        kind,
        state: NodeState {
            version,
            owner: parent.map(|(owner, _)| owner),
            body,
        },
    });
    Ok(())
}

/// Drop parsed JSON one level at a time, so a deeply nested document cannot
/// exhaust the stack on the way out.
fn discard(mut values: Vec<Value>) {
    while let Some(value) = values.pop() {
        match value {
            Value::Object(object) => values.extend(object.into_iter().map(|(_, value)| value)),
            Value::Array(items) => values.extend(items),
            _ => {}
        }
    }
}

fn decode_pointer(object: &Map<String, Value>, kind: NodeKind) -> UodResult<NodeBody> {
    let Some((id_name, version_name)) = target_fields(kind) else {
        return Err(UodError::malformed(kind, TYPE, "not a pointer kind"));
    };
    let role = match kind {
        NodeKind::ElementPointer => {
            let raw = string_field(object, kind, POINTER_ROLE)?;
            let role = ElementPointerRole::parse(raw).ok_or_else(|| {
                UodError::malformed(kind, POINTER_ROLE, format!("unknown role {raw:?}"))
            })?;
            Some(PointerRole::Element(role))
        }
        NodeKind::LiteralPointer => {
            let raw = string_field(object, kind, POINTER_ROLE)?;
            let role = LiteralPointerRole::parse(raw).ok_or_else(|| {
                UodError::malformed(kind, POINTER_ROLE, format!("unknown role {raw:?}"))
            })?;
            Some(PointerRole::Literal(role))
        }
        _ => None,
    };
    let version = version_field(object, kind, version_name)?;
    let target = id_field(object, kind, id_name)?.map(|id| TargetRef { id, version });
    Ok(NodeBody::Pointer { role, target })
}

fn field<'a>(
    object: &'a Map<String, Value>,
    kind: impl fmt::Display,
    name: &str,
) -> UodResult<&'a Value> {
    object
        .get(name)
        .ok_or_else(|| UodError::malformed(kind, name, "missing"))
}

fn string_field<'a>(
    object: &'a Map<String, Value>,
    kind: impl fmt::Display + Copy,
    name: &str,
) -> UodResult<&'a str> {
    field(object, kind, name)?
        .as_str()
        .ok_or_else(|| UodError::malformed(kind, name, "expected a string"))
}

/// An id string; empty means "no target".
fn id_field(
    object: &Map<String, Value>,
    kind: NodeKind,
    name: &str,
) -> UodResult<Option<ElementId>> {
    let raw = string_field(object, kind, name)?;
    if raw.is_empty() {
        return Ok(None);
    }
    ElementId::parse(raw)
        .map(Some)
        .map_err(|err| UodError::malformed(kind, name, err.to_string()))
}

fn version_field(object: &Map<String, Value>, kind: NodeKind, name: &str) -> UodResult<Version> {
    let raw = string_field(object, kind, name)?;
    Version::parse(raw).map_err(|err| UodError::malformed(kind, name, err.to_string()))
}

/// The root's owner lives outside the document; its OWNING_ELEMENT pointer
/// is the only record of it.
fn owner_from_owning_pointer(staged: &[Staged]) -> Option<ElementId> {
    let root = staged.first()?.id;
    staged
        .iter()
        .find(|node| {
            node.state.owner == Some(root)
                && node.kind == NodeKind::ElementPointer
                && node.state.is_owning_pointer()
        })
        .and_then(|pointer| pointer.state.target())
        .map(|target| target.id)
}
