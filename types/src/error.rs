use std::fmt;

use thiserror::Error;

use crate::{ElementId, NodeKind};

/// Errors surfaced by Universe operations.
///
/// All variants are programmer or data errors: the store is local and
/// in-memory, so nothing here is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UodError {
    /// The id is already registered in the destination Universe (or appears
    /// twice in one recovered document).
    #[error("identity collision: {id} is already registered")]
    IdentityCollision { id: ElementId },
    #[error("no {expected} registered with id {id}")]
    NotFound { id: ElementId, expected: NodeKind },
    #[error("unknown node type {type_name:?}")]
    UnknownType { type_name: String },
    #[error("malformed field {field:?} on {kind}: {reason}")]
    MalformedField {
        kind: String,
        field: String,
        reason: String,
    },
    #[error("encoding failed: {reason}")]
    Encoding { reason: String },
    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },
}

pub type UodResult<T> = Result<T, UodError>;

impl UodError {
    pub fn malformed(kind: impl fmt::Display, field: &str, reason: impl Into<String>) -> Self {
        Self::MalformedField {
            kind: kind.to_string(),
            field: field.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn encoding(reason: impl Into<String>) -> Self {
        Self::Encoding {
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }
}
