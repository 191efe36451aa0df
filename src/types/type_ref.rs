//! Resolved type descriptors carried by every semantic node.

use serde::{Deserialize, Serialize};

use super::PrimitiveKind;

/// Stable index of a schema type inside a catalog arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Returns the arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The shape of a resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Enum(TypeId),
    Complex(TypeId),
    Entity(TypeId),
    Collection(Box<TypeRef>),
    /// No static type: open properties, `null`, and parameter aliases.
    Untyped,
}

/// A type descriptor: kind plus nullability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub kind: TypeKind,
    pub nullable: bool,
}

impl Default for TypeRef {
    fn default() -> Self {
        TypeRef::untyped()
    }
}

impl TypeRef {
    /// A primitive type reference.
    #[must_use]
    pub fn primitive(kind: PrimitiveKind, nullable: bool) -> Self {
        TypeRef {
            kind: TypeKind::Primitive(kind),
            nullable,
        }
    }

    /// An entity type reference.
    #[must_use]
    pub fn entity(id: TypeId, nullable: bool) -> Self {
        TypeRef {
            kind: TypeKind::Entity(id),
            nullable,
        }
    }

    /// A complex type reference.
    #[must_use]
    pub fn complex(id: TypeId, nullable: bool) -> Self {
        TypeRef {
            kind: TypeKind::Complex(id),
            nullable,
        }
    }

    /// An enum type reference.
    #[must_use]
    pub fn enumeration(id: TypeId, nullable: bool) -> Self {
        TypeRef {
            kind: TypeKind::Enum(id),
            nullable,
        }
    }

    /// A collection of `element`. Collections themselves are never null.
    #[must_use]
    pub fn collection(element: TypeRef) -> Self {
        TypeRef {
            kind: TypeKind::Collection(Box::new(element)),
            nullable: false,
        }
    }

    /// The untyped, nullable reference.
    #[must_use]
    pub fn untyped() -> Self {
        TypeRef {
            kind: TypeKind::Untyped,
            nullable: true,
        }
    }

    /// Returns a copy with the given nullability.
    #[must_use]
    pub fn with_nullable(&self, nullable: bool) -> Self {
        TypeRef {
            kind: self.kind.clone(),
            nullable,
        }
    }

    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, TypeKind::Collection(_))
    }

    #[must_use]
    pub fn is_untyped(&self) -> bool {
        matches!(self.kind, TypeKind::Untyped)
    }

    /// Element type if this is a collection.
    #[must_use]
    pub fn element_type(&self) -> Option<&TypeRef> {
        match &self.kind {
            TypeKind::Collection(element) => Some(element),
            _ => None,
        }
    }

    /// Primitive kind, if this is a single primitive.
    #[must_use]
    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self.kind {
            TypeKind::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    /// Structured (entity or complex) type id, if single-valued.
    #[must_use]
    pub fn structured_id(&self) -> Option<TypeId> {
        match self.kind {
            TypeKind::Entity(id) | TypeKind::Complex(id) => Some(id),
            _ => None,
        }
    }

    /// Enum type id, if single-valued.
    #[must_use]
    pub fn enum_id(&self) -> Option<TypeId> {
        match self.kind {
            TypeKind::Enum(id) => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_entity(&self) -> bool {
        matches!(self.kind, TypeKind::Entity(_))
    }

    /// True for `Edm.Boolean` and for untyped values.
    #[must_use]
    pub fn is_boolean_compatible(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Primitive(PrimitiveKind::Boolean) | TypeKind::Untyped
        )
    }

    /// True for single-valued primitives, enums, and untyped values.
    #[must_use]
    pub fn is_single_scalar(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Primitive(_) | TypeKind::Enum(_) | TypeKind::Untyped
        )
    }
}
