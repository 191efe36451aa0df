//! Resource path binding: `Customers('A')/Orders(1)/Items/$count`.

use crate::catalog::MetadataModel;
use crate::error::Result;
use crate::parser::{NamedValue, PathSegment, QueryToken};
use crate::types::{PrimitiveKind, TypeId, TypeRef};

use super::expression::{mismatch, unknown_property, Binder};
use super::semantic::{NamedArgument, ODataPath, ODataSegment, ODataSegmentKind, SemanticNode};

impl Binder<'_> {
    pub(crate) fn bind_path(&mut self, path: &PathSegment) -> Result<ODataPath> {
        let mut segments: Vec<ODataSegment> = Vec::new();
        for segment in path.iter() {
            let bound = match segment {
                PathSegment::System { identifier } => {
                    let previous = segments.last().map(|s| &s.type_ref);
                    vec![self.bind_system_path_segment(identifier, previous, path)?]
                }
                PathSegment::NonSystem {
                    identifier,
                    named_values,
                    ..
                } => match segments.last() {
                    None => self.bind_root_segment(identifier, named_values, path)?,
                    Some(previous) => {
                        let previous = previous.type_ref.clone();
                        self.bind_member_segment(&previous, identifier, named_values, path)?
                    }
                },
            };
            segments.extend(bound);
        }
        tracing::trace!(segments = segments.len(), "bound resource path");
        Ok(ODataPath { segments })
    }

    /// Entity set, singleton, or unbound function.
    fn bind_root_segment(
        &mut self,
        identifier: &str,
        named_values: &[NamedValue],
        path: &PathSegment,
    ) -> Result<Vec<ODataSegment>> {
        if let Some(set) = self.model.find_entity_set(identifier) {
            let element = TypeRef::entity(set.entity_type, false);
            let mut segments = vec![ODataSegment {
                kind: ODataSegmentKind::EntitySet(set.name.clone()),
                type_ref: TypeRef::collection(element.clone()),
            }];
            if !named_values.is_empty() {
                segments.push(self.bind_key(&element, named_values, path)?);
            }
            return Ok(segments);
        }
        if let Some(singleton) = self.model.find_singleton(identifier) {
            if !named_values.is_empty() {
                return Err(mismatch(path, format!("singleton '{identifier}' takes no key")));
            }
            return Ok(vec![ODataSegment {
                kind: ODataSegmentKind::Singleton(singleton.name.clone()),
                type_ref: TypeRef::entity(singleton.entity_type, false),
            }]);
        }
        if self.model.find_operations(identifier, None).is_empty() {
            return Err(unknown_property(
                path,
                format!("'{identifier}' is not an entity set, singleton or function"),
            ));
        }
        Ok(vec![self.bind_operation_segment(identifier, None, named_values, path)?])
    }

    /// A segment following another: type cast, bound operation, property or
    /// navigation, optionally with a key.
    fn bind_member_segment(
        &mut self,
        previous: &TypeRef,
        identifier: &str,
        named_values: &[NamedValue],
        path: &PathSegment,
    ) -> Result<Vec<ODataSegment>> {
        if identifier.contains('.') {
            if let Some(target) = self.model.find_structured_type(identifier) {
                let (element, is_collection) = match previous.element_type() {
                    Some(element) => (element, true),
                    None => (previous, false),
                };
                let related = element
                    .structured_id()
                    .is_some_and(|id| id == target.id || self.model.is_derived_from(target.id, id));
                if !related {
                    return Err(mismatch(
                        path,
                        format!("'{identifier}' is not derived from {}", self.model.type_name(element)),
                    ));
                }
                let cast = target.type_ref(element.nullable);
                let type_ref = if is_collection {
                    TypeRef::collection(cast.clone())
                } else {
                    cast.clone()
                };
                let mut segments = vec![ODataSegment {
                    kind: ODataSegmentKind::TypeCast(target.full_name()),
                    type_ref,
                }];
                if !named_values.is_empty() {
                    if !is_collection {
                        return Err(mismatch(path, format!("'{identifier}' is single-valued and takes no key")));
                    }
                    segments.push(self.bind_key(&cast, named_values, path)?);
                }
                return Ok(segments);
            }
            if !self.model.find_operations(identifier, Some(previous)).is_empty() {
                return Ok(vec![self.bind_operation_segment(identifier, Some(previous), named_values, path)?]);
            }
        }

        if previous.is_collection() {
            return Err(mismatch(
                path,
                format!("'{identifier}' needs a key on the preceding collection first"),
            ));
        }
        let Some(type_id) = previous.structured_id() else {
            return Err(unknown_property(
                path,
                format!("{} has no member '{identifier}'", self.model.type_name(previous)),
            ));
        };

        if let Some(property) = self.model.find_property(type_id, identifier) {
            if !named_values.is_empty() {
                return Err(mismatch(path, format!("property '{identifier}' takes no key")));
            }
            return Ok(vec![ODataSegment {
                kind: ODataSegmentKind::Property(property.name.clone()),
                type_ref: property.type_ref.clone(),
            }]);
        }
        if let Some(navigation) = self.model.find_navigation_property(type_id, identifier) {
            let mut segments = vec![ODataSegment {
                kind: ODataSegmentKind::Navigation(navigation.name.clone()),
                type_ref: navigation.type_ref(),
            }];
            if !named_values.is_empty() {
                if !navigation.is_collection {
                    return Err(mismatch(
                        path,
                        format!("navigation '{identifier}' is single-valued and takes no key"),
                    ));
                }
                let element = TypeRef::entity(navigation.target, false);
                segments.push(self.bind_key(&element, named_values, path)?);
            }
            return Ok(segments);
        }
        if self.model.is_open_type(type_id) {
            return Ok(vec![ODataSegment {
                kind: ODataSegmentKind::OpenProperty(identifier.to_string()),
                type_ref: self.config.open_property_type.clone(),
            }]);
        }
        Err(unknown_property(
            path,
            format!("{} has no member '{identifier}'", self.model.type_name(previous)),
        ))
    }

    fn bind_system_path_segment(
        &self,
        identifier: &str,
        previous: Option<&TypeRef>,
        path: &PathSegment,
    ) -> Result<ODataSegment> {
        let Some(previous) = previous else {
            return Err(unknown_property(path, format!("'{identifier}' cannot start a path")));
        };
        let (kind, type_ref) = match identifier {
            "$count" if previous.is_collection() => (
                ODataSegmentKind::Count,
                TypeRef::primitive(PrimitiveKind::Int64, false),
            ),
            "$value" if previous.is_single_scalar() || previous.is_entity() => {
                (ODataSegmentKind::Value, previous.clone())
            }
            "$ref" if previous.is_entity() || previous.element_type().is_some_and(TypeRef::is_entity) => {
                (ODataSegmentKind::Ref, previous.clone())
            }
            _ => {
                return Err(mismatch(
                    path,
                    format!("'{identifier}' cannot follow {}", self.model.type_name(previous)),
                ))
            }
        };
        Ok(ODataSegment { kind, type_ref })
    }

    /// Key predicate on a collection of entities of type `element`. A single
    /// unnamed value addresses a single-property key.
    fn bind_key(&mut self, element: &TypeRef, named_values: &[NamedValue], path: &PathSegment) -> Result<ODataSegment> {
        let entity = element
            .structured_id()
            .and_then(|id| self.model.structured_type(id))
            .ok_or_else(|| mismatch(path, "keys address entities only"))?;
        let key = key_properties(self.model, entity.id);
        if key.len() != named_values.len() {
            return Err(mismatch(
                path,
                format!(
                    "{} has {} key properties, {} values given",
                    entity.full_name(),
                    key.len(),
                    named_values.len()
                ),
            ));
        }
        let mut values = Vec::with_capacity(key.len());
        for (index, (name, key_type)) in key.iter().enumerate() {
            let value = match named_values {
                [single] if single.name.is_none() => &single.value,
                _ => named_values
                    .iter()
                    .find(|nv| nv.name.as_deref() == Some(name.as_str()))
                    .map(|nv| &nv.value)
                    .ok_or_else(|| {
                        unknown_property(
                            path,
                            format!("key property '{name}' of {} has no value", entity.full_name()),
                        )
                    })?,
            };
            let bound = self.bind_key_value(value)?;
            values.push(NamedArgument {
                name: name.clone(),
                value: self.coerce_to(bound, key_type, value)?,
            });
            tracing::trace!(index, key = %name, "bound key value");
        }
        Ok(ODataSegment {
            kind: ODataSegmentKind::Key(values),
            type_ref: element.clone(),
        })
    }

    fn bind_key_value(&mut self, value: &QueryToken) -> Result<SemanticNode> {
        match value {
            QueryToken::Literal(_) | QueryToken::ParameterAlias(_) | QueryToken::UnaryOperator { .. } => {
                self.bind_expression(value)
            }
            _ => Err(mismatch(value, "key values must be literals or parameter aliases")),
        }
    }

    fn bind_operation_segment(
        &mut self,
        identifier: &str,
        binding: Option<&TypeRef>,
        named_values: &[NamedValue],
        path: &PathSegment,
    ) -> Result<ODataSegment> {
        let arguments = named_values
            .iter()
            .map(|nv| Ok((nv.name.clone(), self.bind_expression(&nv.value)?)))
            .collect::<Result<Vec<_>>>()?;
        let (name, arguments, type_ref) = self.resolve_operation(identifier, binding, arguments, true, path)?;
        Ok(ODataSegment {
            kind: ODataSegmentKind::Operation { name, arguments },
            type_ref,
        })
    }
}

/// Key property names and types of an entity type, inherited keys included.
fn key_properties(model: &dyn MetadataModel, type_id: TypeId) -> Vec<(String, TypeRef)> {
    let mut current = model.structured_type(type_id);
    while let Some(ty) = current {
        if !ty.key.is_empty() {
            return ty
                .key
                .iter()
                .filter_map(|name| {
                    model
                        .find_property(type_id, name)
                        .map(|property| (name.clone(), property.type_ref.clone()))
                })
                .collect();
        }
        current = ty.base_type.and_then(|base| model.structured_type(base));
    }
    Vec::new()
}
