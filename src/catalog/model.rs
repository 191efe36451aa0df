//! Read-only metadata lookup used by the binder.

use crate::types::{TypeId, TypeKind, TypeRef};

use super::schema::{
    Catalog, EntitySet, EnumType, NavigationProperty, Operation, Property, SchemaType, Singleton,
    StructuredKind, StructuredType,
};

/// Lookup interface over an immutable metadata model.
///
/// Implementors provide the arena accessors and name lookups; inheritance,
/// openness and promotion queries have default implementations in terms of
/// those. The binder never mutates the model, so one model can serve
/// concurrent parses.
pub trait MetadataModel {
    /// Finds a structured or enum type by qualified name.
    fn find_schema_type(&self, qualified_name: &str) -> Option<&SchemaType>;

    fn structured_type(&self, id: TypeId) -> Option<&StructuredType>;

    fn enum_type(&self, id: TypeId) -> Option<&EnumType>;

    /// Operations named `name` (qualified, or simple when `name` has no
    /// namespace) whose binding parameter accepts `binding`; unbound
    /// operations when `binding` is `None`.
    fn find_operations(&self, name: &str, binding: Option<&TypeRef>) -> Vec<&Operation>;

    fn find_entity_set(&self, name: &str) -> Option<&EntitySet>;

    fn find_singleton(&self, name: &str) -> Option<&Singleton>;

    fn find_structured_type(&self, qualified_name: &str) -> Option<&StructuredType> {
        match self.find_schema_type(qualified_name)? {
            SchemaType::Structured(ty) => Some(ty),
            SchemaType::Enum(_) => None,
        }
    }

    fn find_entity_type(&self, qualified_name: &str) -> Option<&StructuredType> {
        self.find_structured_type(qualified_name)
            .filter(|ty| ty.kind == StructuredKind::Entity)
    }

    fn find_enum_type(&self, qualified_name: &str) -> Option<&EnumType> {
        match self.find_schema_type(qualified_name)? {
            SchemaType::Enum(ty) => Some(ty),
            SchemaType::Structured(_) => None,
        }
    }

    /// Finds a structural property declared on `type_id` or a base type.
    fn find_property(&self, type_id: TypeId, name: &str) -> Option<&Property> {
        let mut current = self.structured_type(type_id);
        while let Some(ty) = current {
            if let Some(property) = ty.declared_property(name) {
                return Some(property);
            }
            current = ty.base_type.and_then(|base| self.structured_type(base));
        }
        None
    }

    /// Finds a navigation property declared on `type_id` or a base type.
    fn find_navigation_property(&self, type_id: TypeId, name: &str) -> Option<&NavigationProperty> {
        let mut current = self.structured_type(type_id);
        while let Some(ty) = current {
            if let Some(navigation) = ty.declared_navigation(name) {
                return Some(navigation);
            }
            current = ty.base_type.and_then(|base| self.structured_type(base));
        }
        None
    }

    /// All navigation properties of `type_id`, base types first.
    fn navigation_properties(&self, type_id: TypeId) -> Vec<&NavigationProperty> {
        let mut chain = Vec::new();
        let mut current = self.structured_type(type_id);
        while let Some(ty) = current {
            chain.push(ty);
            current = ty.base_type.and_then(|base| self.structured_type(base));
        }
        chain
            .into_iter()
            .rev()
            .flat_map(|ty| ty.navigation_properties.iter())
            .collect()
    }

    /// A type is open if it or any base type is declared open.
    fn is_open_type(&self, type_id: TypeId) -> bool {
        let mut current = self.structured_type(type_id);
        while let Some(ty) = current {
            if ty.is_open {
                return true;
            }
            current = ty.base_type.and_then(|base| self.structured_type(base));
        }
        false
    }

    /// True if `derived` has `base` as a proper ancestor.
    fn is_derived_from(&self, derived: TypeId, base: TypeId) -> bool {
        let mut current = self
            .structured_type(derived)
            .and_then(|ty| ty.base_type);
        while let Some(id) = current {
            if id == base {
                return true;
            }
            current = self.structured_type(id).and_then(|ty| ty.base_type);
        }
        false
    }

    /// Implicit conversion from `from` to `to`: the primitive lattice,
    /// identity for enums, and derived-to-base for structured types.
    /// Untyped values convert both ways.
    fn can_promote(&self, from: &TypeRef, to: &TypeRef) -> bool {
        match (&from.kind, &to.kind) {
            (TypeKind::Untyped, _) | (_, TypeKind::Untyped) => true,
            (TypeKind::Primitive(a), TypeKind::Primitive(b)) => a.can_promote_to(*b),
            (TypeKind::Enum(a), TypeKind::Enum(b)) => a == b,
            (
                TypeKind::Entity(a) | TypeKind::Complex(a),
                TypeKind::Entity(b) | TypeKind::Complex(b),
            ) => a == b || self.is_derived_from(*a, *b),
            (TypeKind::Collection(a), TypeKind::Collection(b)) => self.can_promote(a, b),
            _ => false,
        }
    }

    /// Display name of a type reference, e.g. `Collection(NS.Order)`.
    fn type_name(&self, type_ref: &TypeRef) -> String {
        match &type_ref.kind {
            TypeKind::Primitive(kind) => kind.edm_name().to_string(),
            TypeKind::Enum(id) => self
                .enum_type(*id)
                .map_or_else(|| format!("<enum {}>", id.0), EnumType::full_name),
            TypeKind::Entity(id) | TypeKind::Complex(id) => self
                .structured_type(*id)
                .map_or_else(|| format!("<type {}>", id.0), StructuredType::full_name),
            TypeKind::Collection(element) => format!("Collection({})", self.type_name(element)),
            TypeKind::Untyped => "Edm.Untyped".to_string(),
        }
    }
}

impl MetadataModel for Catalog {
    fn find_schema_type(&self, qualified_name: &str) -> Option<&SchemaType> {
        self.type_id_by_name(qualified_name)
            .and_then(|id| self.types().get(id.index()))
    }

    fn structured_type(&self, id: TypeId) -> Option<&StructuredType> {
        match self.types().get(id.index())? {
            SchemaType::Structured(ty) => Some(ty),
            SchemaType::Enum(_) => None,
        }
    }

    fn enum_type(&self, id: TypeId) -> Option<&EnumType> {
        match self.types().get(id.index())? {
            SchemaType::Enum(ty) => Some(ty),
            SchemaType::Structured(_) => None,
        }
    }

    fn find_operations(&self, name: &str, binding: Option<&TypeRef>) -> Vec<&Operation> {
        let qualified = name.contains('.');
        self.operations()
            .iter()
            .filter(|op| {
                if qualified {
                    op.full_name() == name
                } else {
                    op.name == name
                }
            })
            .filter(|op| match (binding, op.binding_type()) {
                (None, None) => true,
                (Some(actual), Some(expected)) => self.can_promote(actual, expected),
                _ => false,
            })
            .collect()
    }

    fn find_entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets().iter().find(|set| set.name == name)
    }

    fn find_singleton(&self, name: &str) -> Option<&Singleton> {
        self.singletons().iter().find(|s| s.name == name)
    }
}
