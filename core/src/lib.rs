//! Universe of Discourse persistence kernel.
//!
//! A [`Universe`] holds a graph of versioned nodes. Elements own children in
//! a strict tree; Values (Literals and pointers) are leaves. Pointers refer
//! to other nodes by id and resolve lazily through the Universe index.
//! Every mutation bumps the versions of the nodes it touches, can be
//! journaled for undo/redo, and is reported to subscribed listeners.
//!
//! Trees are persisted as JSON with [`Universe::marshal`] and
//! [`Universe::recover`], and compared structurally with [`equivalent`].

mod codec;
pub mod config;
mod element;
mod equivalence;
mod handle;
mod journal;
mod node;
mod notify;
mod pointer;
mod reference;
mod refinement;
mod universe;
mod value;

pub use acrl_types::{
    ElementId, ElementPointerRole, LiteralPointerRole, NodeKind, UodError, UodResult, Version,
};
pub use config::{AcrlConfig, ConfigError, UniverseConfig};
pub use element::Element;
pub use equivalence::{EquivalenceMismatch, check_equivalence, equivalent};
pub use handle::BaseElement;
pub use notify::{ChangeKind, ChangeNotice, ChangeOrigin, SubscriptionId};
pub use pointer::{ElementPointer, ElementPointerPointer, LiteralPointer, LiteralPointerPointer};
pub use reference::{
    ElementPointerReference, ElementReference, LiteralPointerReference, LiteralReference,
};
pub use refinement::Refinement;
pub use universe::Universe;
pub use value::Literal;
