//! Core domain types for acrl.
//!
//! Identifiers, versions, node kinds and the error taxonomy shared by every
//! layer of the Universe of Discourse. No IO, no locking, no async.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod error;
mod ids;
mod kind;

pub use error::{UodError, UodResult};
pub use ids::{ElementId, ElementIdError, Version, VersionError};
pub use kind::{ElementPointerRole, LiteralPointerRole, NodeKind};
