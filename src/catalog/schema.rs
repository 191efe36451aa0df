//! Schema definitions: structured, enum and operation metadata.
//!
//! All schema types live in one arena inside [`Catalog`] and refer to each
//! other by [`TypeId`]. Properties point back at their declaring type by
//! index, so the logical cycle carries no ownership cycle.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::types::{PrimitiveKind, TypeId, TypeRef};

/// Central registry of every type, operation and container element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Type arena indexed by `TypeId`.
    types: Vec<SchemaType>,
    /// Qualified name -> arena index.
    type_names: HashMap<String, TypeId>,
    operations: Vec<Operation>,
    entity_sets: Vec<EntitySet>,
    #[serde(default)]
    singletons: Vec<Singleton>,
}

impl Catalog {
    /// Creates a new empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Catalog::default()
    }

    fn register(&mut self, qualified_name: String, build: impl FnOnce(TypeId) -> SchemaType) -> Result<TypeId> {
        if self.type_names.contains_key(&qualified_name) {
            return Err(QueryError::Schema(format!(
                "Type '{qualified_name}' already exists"
            )));
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(build(id));
        self.type_names.insert(qualified_name, id);
        Ok(id)
    }

    fn add_structured(
        &mut self,
        namespace: &str,
        name: &str,
        kind: StructuredKind,
        base_type: Option<TypeId>,
    ) -> Result<TypeId> {
        if let Some(base) = base_type {
            match self.structured_mut(base) {
                Ok(base) if base.kind == kind => {}
                Ok(base) => {
                    return Err(QueryError::Schema(format!(
                        "Type '{name}' cannot derive from '{}' of a different kind",
                        base.full_name()
                    )))
                }
                Err(err) => return Err(err),
            }
        }
        self.register(format!("{namespace}.{name}"), |id| {
            SchemaType::Structured(StructuredType {
                id,
                namespace: namespace.to_string(),
                name: name.to_string(),
                kind,
                base_type,
                is_open: false,
                is_abstract: false,
                key: Vec::new(),
                properties: Vec::new(),
                navigation_properties: Vec::new(),
            })
        })
    }

    /// Registers an entity type, optionally deriving from `base_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the qualified name is taken or the base type is
    /// not an entity type.
    pub fn add_entity_type(&mut self, namespace: &str, name: &str, base_type: Option<TypeId>) -> Result<TypeId> {
        self.add_structured(namespace, name, StructuredKind::Entity, base_type)
    }

    /// Registers a complex type, optionally deriving from `base_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the qualified name is taken or the base type is
    /// not a complex type.
    pub fn add_complex_type(&mut self, namespace: &str, name: &str, base_type: Option<TypeId>) -> Result<TypeId> {
        self.add_structured(namespace, name, StructuredKind::Complex, base_type)
    }

    /// Registers an enum type with `(member, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if the qualified name is taken or a member repeats.
    pub fn add_enum_type(
        &mut self,
        namespace: &str,
        name: &str,
        members: &[(&str, i64)],
        is_flags: bool,
    ) -> Result<TypeId> {
        let mut seen = std::collections::HashSet::new();
        for (member, _) in members {
            if !seen.insert(*member) {
                return Err(QueryError::Schema(format!(
                    "Duplicate member '{member}' in enum type '{name}'"
                )));
            }
        }
        self.register(format!("{namespace}.{name}"), |id| {
            SchemaType::Enum(EnumType {
                id,
                namespace: namespace.to_string(),
                name: name.to_string(),
                underlying: PrimitiveKind::Int32,
                is_flags,
                members: members
                    .iter()
                    .map(|(name, value)| EnumMember {
                        name: (*name).to_string(),
                        value: *value,
                    })
                    .collect(),
            })
        })
    }

    fn structured_mut(&mut self, id: TypeId) -> Result<&mut StructuredType> {
        match self.types.get_mut(id.index()) {
            Some(SchemaType::Structured(ty)) => Ok(ty),
            _ => Err(QueryError::Schema(format!(
                "Type id {} is not a structured type",
                id.0
            ))),
        }
    }

    /// Marks a structured type as open.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a structured type.
    pub fn set_open(&mut self, id: TypeId, is_open: bool) -> Result<()> {
        self.structured_mut(id)?.is_open = is_open;
        Ok(())
    }

    /// Marks a structured type as abstract.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a structured type.
    pub fn set_abstract(&mut self, id: TypeId, is_abstract: bool) -> Result<()> {
        self.structured_mut(id)?.is_abstract = is_abstract;
        Ok(())
    }

    fn check_member_free(ty: &StructuredType, name: &str) -> Result<()> {
        if ty.declared_property(name).is_some() || ty.declared_navigation(name).is_some() {
            return Err(QueryError::Schema(format!(
                "Member '{name}' already exists on type '{}'",
                ty.full_name()
            )));
        }
        Ok(())
    }

    /// Adds a structural property.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a structured type or the name is taken.
    pub fn add_property(&mut self, id: TypeId, name: &str, type_ref: TypeRef) -> Result<()> {
        let ty = self.structured_mut(id)?;
        Self::check_member_free(ty, name)?;
        ty.properties.push(Property {
            name: name.to_string(),
            type_ref,
            declaring_type: id,
            is_key: false,
        });
        Ok(())
    }

    /// Adds a non-nullable primitive key property.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not an entity type or the name is taken.
    pub fn add_key_property(&mut self, id: TypeId, name: &str, kind: PrimitiveKind) -> Result<()> {
        let ty = self.structured_mut(id)?;
        if ty.kind != StructuredKind::Entity {
            return Err(QueryError::Schema(format!(
                "Key property '{name}' declared on non-entity type '{}'",
                ty.full_name()
            )));
        }
        Self::check_member_free(ty, name)?;
        ty.properties.push(Property {
            name: name.to_string(),
            type_ref: TypeRef::primitive(kind, false),
            declaring_type: id,
            is_key: true,
        });
        ty.key.push(name.to_string());
        Ok(())
    }

    /// Adds a navigation property to `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source or target is not an entity type or the
    /// name is taken.
    pub fn add_navigation_property(&mut self, id: TypeId, mut navigation: NavigationProperty) -> Result<()> {
        match self.types.get(navigation.target.index()) {
            Some(SchemaType::Structured(target)) if target.kind == StructuredKind::Entity => {}
            _ => {
                return Err(QueryError::Schema(format!(
                    "Navigation property '{}' must target an entity type",
                    navigation.name
                )))
            }
        }
        let ty = self.structured_mut(id)?;
        Self::check_member_free(ty, &navigation.name)?;
        navigation.declaring_type = id;
        ty.navigation_properties.push(navigation);
        Ok(())
    }

    /// Registers an operation.
    ///
    /// # Errors
    ///
    /// Returns an error if an operation with the same name and the same
    /// parameter types already exists.
    pub fn add_operation(&mut self, operation: Operation) -> Result<()> {
        let duplicate = self.operations.iter().any(|existing| {
            existing.full_name() == operation.full_name()
                && existing.is_bound == operation.is_bound
                && existing.parameters.len() == operation.parameters.len()
                && existing
                    .parameters
                    .iter()
                    .zip(&operation.parameters)
                    .all(|(a, b)| a.type_ref.kind == b.type_ref.kind)
        });
        if duplicate {
            return Err(QueryError::Schema(format!(
                "Operation '{}' with the same signature already exists",
                operation.full_name()
            )));
        }
        self.operations.push(operation);
        Ok(())
    }

    fn check_container_name_free(&self, name: &str) -> Result<()> {
        if self.entity_sets.iter().any(|s| s.name == name)
            || self.singletons.iter().any(|s| s.name == name)
        {
            return Err(QueryError::Schema(format!(
                "Container element '{name}' already exists"
            )));
        }
        Ok(())
    }

    fn check_entity_type(&self, entity_type: TypeId) -> Result<()> {
        match self.types.get(entity_type.index()) {
            Some(SchemaType::Structured(ty)) if ty.kind == StructuredKind::Entity => Ok(()),
            _ => Err(QueryError::Schema(format!(
                "Type id {} is not an entity type",
                entity_type.0
            ))),
        }
    }

    /// Registers an entity set of `entity_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the type is not an entity type.
    pub fn add_entity_set(&mut self, name: &str, entity_type: TypeId) -> Result<()> {
        self.check_container_name_free(name)?;
        self.check_entity_type(entity_type)?;
        self.entity_sets.push(EntitySet {
            name: name.to_string(),
            entity_type,
        });
        Ok(())
    }

    /// Registers a singleton of `entity_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the type is not an entity type.
    pub fn add_singleton(&mut self, name: &str, entity_type: TypeId) -> Result<()> {
        self.check_container_name_free(name)?;
        self.check_entity_type(entity_type)?;
        self.singletons.push(Singleton {
            name: name.to_string(),
            entity_type,
        });
        Ok(())
    }

    pub(crate) fn types(&self) -> &[SchemaType] {
        &self.types
    }

    pub(crate) fn type_id_by_name(&self, qualified_name: &str) -> Option<TypeId> {
        self.type_names.get(qualified_name).copied()
    }

    pub(crate) fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub(crate) fn entity_sets(&self) -> &[EntitySet] {
        &self.entity_sets
    }

    pub(crate) fn singletons(&self) -> &[Singleton] {
        &self.singletons
    }

    /// Returns all qualified type names.
    #[must_use]
    pub fn type_names(&self) -> Vec<&str> {
        self.type_names.keys().map(String::as_str).collect()
    }

    /// Serializes the catalog to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| QueryError::Schema(format!("Failed to serialize catalog: {e}")))
    }

    /// Deserializes a catalog from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| QueryError::Schema(format!("Failed to deserialize catalog: {e}")))
    }
}

/// Entry in the type arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SchemaType {
    Structured(StructuredType),
    Enum(EnumType),
}

impl SchemaType {
    #[must_use]
    pub fn full_name(&self) -> String {
        match self {
            SchemaType::Structured(ty) => ty.full_name(),
            SchemaType::Enum(ty) => ty.full_name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructuredKind {
    Entity,
    Complex,
}

/// Entity or complex type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredType {
    pub id: TypeId,
    pub namespace: String,
    pub name: String,
    pub kind: StructuredKind,
    pub base_type: Option<TypeId>,
    pub is_open: bool,
    pub is_abstract: bool,
    /// Key property names, in declaration order.
    pub key: Vec<String>,
    /// Declared (not inherited) structural properties.
    pub properties: Vec<Property>,
    /// Declared (not inherited) navigation properties.
    pub navigation_properties: Vec<NavigationProperty>,
}

impl StructuredType {
    /// Namespace-qualified name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Reference to a single instance of this type.
    #[must_use]
    pub fn type_ref(&self, nullable: bool) -> TypeRef {
        match self.kind {
            StructuredKind::Entity => TypeRef::entity(self.id, nullable),
            StructuredKind::Complex => TypeRef::complex(self.id, nullable),
        }
    }

    #[must_use]
    pub fn declared_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn declared_navigation(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation_properties.iter().find(|p| p.name == name)
    }
}

/// Structural property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub type_ref: TypeRef,
    /// Back-reference to the declaring type, by arena index.
    pub declaring_type: TypeId,
    pub is_key: bool,
}

/// Navigation property between entity types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationProperty {
    pub name: String,
    pub target: TypeId,
    pub is_collection: bool,
    pub nullable: bool,
    /// Containment navigations own their targets; only these may recurse
    /// with `$levels`.
    pub contains_target: bool,
    pub declaring_type: TypeId,
    pub partner: Option<String>,
}

impl NavigationProperty {
    /// A nullable single-valued navigation.
    #[must_use]
    pub fn single(name: &str, target: TypeId) -> Self {
        NavigationProperty {
            name: name.to_string(),
            target,
            is_collection: false,
            nullable: true,
            contains_target: false,
            declaring_type: target,
            partner: None,
        }
    }

    /// A collection-valued navigation.
    #[must_use]
    pub fn collection(name: &str, target: TypeId) -> Self {
        NavigationProperty {
            is_collection: true,
            nullable: false,
            ..NavigationProperty::single(name, target)
        }
    }

    #[must_use]
    pub fn contained(mut self) -> Self {
        self.contains_target = true;
        self
    }

    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    #[must_use]
    pub fn with_partner(mut self, partner: &str) -> Self {
        self.partner = Some(partner.to_string());
        self
    }

    /// Type of the value reached by this navigation.
    #[must_use]
    pub fn type_ref(&self) -> TypeRef {
        let element = TypeRef::entity(self.target, self.nullable);
        if self.is_collection {
            TypeRef::collection(element.with_nullable(false))
        } else {
            element
        }
    }

    /// True if the target derives from (or is) the declaring type.
    #[must_use]
    pub fn is_recursive_in(&self, model: &dyn super::MetadataModel) -> bool {
        self.target == self.declaring_type || model.is_derived_from(self.target, self.declaring_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
}

/// Enum type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumType {
    pub id: TypeId,
    pub namespace: String,
    pub name: String,
    pub underlying: PrimitiveKind,
    pub is_flags: bool,
    pub members: Vec<EnumMember>,
}

impl EnumType {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Returns true if `text` names a member, a member value, or (for flags
    /// enums) a comma-separated member list.
    #[must_use]
    pub fn accepts(&self, text: &str) -> bool {
        let single = |part: &str| {
            let part = part.trim();
            self.members.iter().any(|m| m.name == part)
                || part
                    .parse::<i64>()
                    .is_ok_and(|v| self.members.iter().any(|m| m.value == v))
        };
        if self.is_flags {
            !text.is_empty() && text.split(',').all(single)
        } else {
            single(text)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Function,
    Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationParameter {
    pub name: String,
    pub type_ref: TypeRef,
}

/// Function or action signature. For bound operations the first parameter
/// is the binding parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub namespace: String,
    pub name: String,
    pub kind: OperationKind,
    pub is_bound: bool,
    pub parameters: Vec<OperationParameter>,
    pub return_type: Option<TypeRef>,
    pub is_composable: bool,
}

impl Operation {
    fn new(namespace: &str, name: &str, kind: OperationKind) -> Self {
        Operation {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind,
            is_bound: false,
            parameters: Vec::new(),
            return_type: None,
            is_composable: false,
        }
    }

    /// An unbound function with no parameters.
    #[must_use]
    pub fn function(namespace: &str, name: &str) -> Self {
        Operation::new(namespace, name, OperationKind::Function)
    }

    /// An unbound action with no parameters.
    #[must_use]
    pub fn action(namespace: &str, name: &str) -> Self {
        Operation::new(namespace, name, OperationKind::Action)
    }

    /// Binds the operation to `binding_type`, inserted as the first parameter.
    #[must_use]
    pub fn bound_to(mut self, binding_type: TypeRef) -> Self {
        if !self.is_bound {
            self.is_bound = true;
            self.parameters.insert(
                0,
                OperationParameter {
                    name: "bindingParameter".to_string(),
                    type_ref: binding_type,
                },
            );
        }
        self
    }

    #[must_use]
    pub fn parameter(mut self, name: &str, type_ref: TypeRef) -> Self {
        self.parameters.push(OperationParameter {
            name: name.to_string(),
            type_ref,
        });
        self
    }

    #[must_use]
    pub fn returns(mut self, type_ref: TypeRef) -> Self {
        self.return_type = Some(type_ref);
        self
    }

    #[must_use]
    pub fn composable(mut self) -> Self {
        self.is_composable = true;
        self
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Type of the binding parameter, for bound operations.
    #[must_use]
    pub fn binding_type(&self) -> Option<&TypeRef> {
        if self.is_bound {
            self.parameters.first().map(|p| &p.type_ref)
        } else {
            None
        }
    }

    /// Parameters supplied in the call's parentheses.
    #[must_use]
    pub fn call_parameters(&self) -> &[OperationParameter] {
        if self.is_bound {
            self.parameters.get(1..).unwrap_or_default()
        } else {
            &self.parameters
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet {
    pub name: String,
    pub entity_type: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Singleton {
    pub name: String,
    pub entity_type: TypeId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_type_rejected() {
        let mut catalog = Catalog::new();
        catalog.add_entity_type("NS", "Customer", None).unwrap();
        let err = catalog.add_entity_type("NS", "Customer", None).unwrap_err();
        assert!(matches!(err, QueryError::Schema(_)));
        assert!(catalog.add_entity_type("Other", "Customer", None).is_ok());
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let mut catalog = Catalog::new();
        let id = catalog.add_entity_type("NS", "Customer", None).unwrap();
        catalog.add_key_property(id, "ID", PrimitiveKind::Int32).unwrap();
        assert!(catalog
            .add_property(id, "ID", TypeRef::primitive(PrimitiveKind::String, true))
            .is_err());
    }

    #[test]
    fn test_key_property_on_complex_rejected() {
        let mut catalog = Catalog::new();
        let id = catalog.add_complex_type("NS", "Address", None).unwrap();
        assert!(catalog.add_key_property(id, "ID", PrimitiveKind::Int32).is_err());
    }

    #[test]
    fn test_navigation_target_must_be_entity() {
        let mut catalog = Catalog::new();
        let customer = catalog.add_entity_type("NS", "Customer", None).unwrap();
        let address = catalog.add_complex_type("NS", "Address", None).unwrap();
        let err = catalog
            .add_navigation_property(customer, NavigationProperty::single("Home", address))
            .unwrap_err();
        assert!(err.to_string().contains("entity type"));
    }

    #[test]
    fn test_base_type_kind_must_match() {
        let mut catalog = Catalog::new();
        let address = catalog.add_complex_type("NS", "Address", None).unwrap();
        assert!(catalog.add_entity_type("NS", "Bad", Some(address)).is_err());
    }

    #[test]
    fn test_flags_enum_accepts_member_lists() {
        let mut catalog = Catalog::new();
        let id = catalog
            .add_enum_type("NS", "Access", &[("Read", 1), ("Write", 2)], true)
            .unwrap();
        let SchemaType::Enum(access) = &catalog.types()[id.index()] else {
            panic!("expected enum");
        };
        assert!(access.accepts("Read,Write"));
        assert!(access.accepts("2"));
        assert!(!access.accepts("Read,Delete"));
    }

    #[test]
    fn test_bound_operation_parameters() {
        let op = Operation::function("NS", "Total")
            .bound_to(TypeRef::entity(TypeId(0), false))
            .parameter("rate", TypeRef::primitive(PrimitiveKind::Double, false))
            .returns(TypeRef::primitive(PrimitiveKind::Decimal, false));
        assert!(op.binding_type().is_some());
        assert_eq!(op.call_parameters().len(), 1);
        assert_eq!(op.full_name(), "NS.Total");
    }

    #[test]
    fn test_catalog_snapshot_round_trip() {
        let mut catalog = Catalog::new();
        let id = catalog.add_entity_type("NS", "Customer", None).unwrap();
        catalog.add_key_property(id, "ID", PrimitiveKind::Int32).unwrap();
        catalog.add_entity_set("Customers", id).unwrap();
        let bytes = catalog.serialize().unwrap();
        let restored = Catalog::deserialize(&bytes).unwrap();
        assert_eq!(restored.type_id_by_name("NS.Customer"), Some(id));
        assert_eq!(restored.entity_sets().len(), 1);
    }
}
