//! Node kinds and pointer roles.
//!
//! [`NodeKind`] doubles as the `"Type"` discriminator of the JSON wire format,
//! so its string forms are stable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Concrete kind of a node in a Universe of Discourse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Element,
    ElementReference,
    ElementPointerReference,
    LiteralPointerReference,
    LiteralReference,
    Refinement,
    Literal,
    ElementPointer,
    LiteralPointer,
    ElementPointerPointer,
    LiteralPointerPointer,
}

impl NodeKind {
    pub const ALL: [Self; 11] = [
        Self::Element,
        Self::ElementReference,
        Self::ElementPointerReference,
        Self::LiteralPointerReference,
        Self::LiteralReference,
        Self::Refinement,
        Self::Literal,
        Self::ElementPointer,
        Self::LiteralPointer,
        Self::ElementPointerPointer,
        Self::LiteralPointerPointer,
    ];

    #[must_use]
    pub const fn as_type_name(self) -> &'static str {
        match self {
            Self::Element => "Element",
            Self::ElementReference => "ElementReference",
            Self::ElementPointerReference => "ElementPointerReference",
            Self::LiteralPointerReference => "LiteralPointerReference",
            Self::LiteralReference => "LiteralReference",
            Self::Refinement => "Refinement",
            Self::Literal => "Literal",
            Self::ElementPointer => "ElementPointer",
            Self::LiteralPointer => "LiteralPointer",
            Self::ElementPointerPointer => "ElementPointerPointer",
            Self::LiteralPointerPointer => "LiteralPointerPointer",
        }
    }

    /// Parse a wire discriminator. Matching is exact.
    #[must_use]
    pub fn from_type_name(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_type_name() == raw)
    }

    /// Nodes that own children: plain Elements, References and Refinements.
    #[must_use]
    pub const fn is_element(self) -> bool {
        matches!(
            self,
            Self::Element
                | Self::ElementReference
                | Self::ElementPointerReference
                | Self::LiteralPointerReference
                | Self::LiteralReference
                | Self::Refinement
        )
    }

    /// Leaf nodes carrying a weak owner back-reference.
    #[must_use]
    pub const fn is_value(self) -> bool {
        !self.is_element()
    }

    #[must_use]
    pub const fn is_pointer(self) -> bool {
        matches!(
            self,
            Self::ElementPointer
                | Self::LiteralPointer
                | Self::ElementPointerPointer
                | Self::LiteralPointerPointer
        )
    }

    #[must_use]
    pub const fn is_reference(self) -> bool {
        matches!(
            self,
            Self::ElementReference
                | Self::ElementPointerReference
                | Self::LiteralPointerReference
                | Self::LiteralReference
        )
    }

    /// Kind a pointer of this kind may target, or `None` for non-pointers.
    ///
    /// Element pointers accept any element kind; this returns the base
    /// [`NodeKind::Element`] for them.
    #[must_use]
    pub const fn target_kind(self) -> Option<Self> {
        match self {
            Self::ElementPointer => Some(Self::Element),
            Self::LiteralPointer => Some(Self::Literal),
            Self::ElementPointerPointer => Some(Self::ElementPointer),
            Self::LiteralPointerPointer => Some(Self::LiteralPointer),
            _ => None,
        }
    }

    /// Whether a node of kind `other` satisfies a request for `self`.
    ///
    /// `Element` accepts every element kind; every other kind matches only itself.
    #[must_use]
    pub const fn accepts(self, other: Self) -> bool {
        match self {
            Self::Element => other.is_element(),
            _ => self as u8 == other as u8,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_type_name())
    }
}

/// Semantic purpose of an element pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementPointerRole {
    AbstractElement,
    RefinedElement,
    /// Setting a pointer with this role moves its owning Element in the
    /// ownership tree.
    OwningElement,
    ReferencedElement,
}

impl ElementPointerRole {
    #[must_use]
    pub const fn as_wire_str(self) -> &'static str {
        match self {
            Self::AbstractElement => "ABSTRACT_ELEMENT",
            Self::RefinedElement => "REFINED_ELEMENT",
            Self::OwningElement => "OWNING_ELEMENT",
            Self::ReferencedElement => "REFERENCED_ELEMENT",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ABSTRACT_ELEMENT" => Some(Self::AbstractElement),
            "REFINED_ELEMENT" => Some(Self::RefinedElement),
            "OWNING_ELEMENT" => Some(Self::OwningElement),
            "REFERENCED_ELEMENT" => Some(Self::ReferencedElement),
            _ => None,
        }
    }
}

impl fmt::Display for ElementPointerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

/// Semantic purpose of a literal pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiteralPointerRole {
    Name,
    Definition,
    Uri,
    Value,
}

impl LiteralPointerRole {
    #[must_use]
    pub const fn as_wire_str(self) -> &'static str {
        match self {
            Self::Name => "NAME",
            Self::Definition => "DEFINITION",
            Self::Uri => "URI",
            Self::Value => "VALUE",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "NAME" => Some(Self::Name),
            "DEFINITION" => Some(Self::Definition),
            "URI" => Some(Self::Uri),
            "VALUE" => Some(Self::Value),
            _ => None,
        }
    }
}

impl fmt::Display for LiteralPointerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire_str())
    }
}
