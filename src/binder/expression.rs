//! Expression binding: literals, member paths, range variables and lambdas.

use std::collections::BTreeSet;
use std::fmt;

use crate::catalog::MetadataModel;
use crate::error::{BindingError, BindingErrorKind, Result};
use crate::parser::{FunctionCallToken, LambdaKind, LambdaToken, LiteralToken, QueryToken, UnaryOperatorKind};
use crate::scope::{ScopeEntry, ScopeStack, IMPLICIT_RANGE_VARIABLE};
use crate::types::{LiteralConverter, LiteralValue, PrimitiveKind, PrimitiveValue, TypeRef};
use crate::ParserConfig;

use super::semantic::{LambdaNode, RangeVariable, SemanticNode};
use super::BindingContext;

/// Binder state for one bind call.
pub(crate) struct Binder<'a> {
    pub(super) model: &'a dyn MetadataModel,
    pub(super) config: &'a ParserConfig,
    aliases: &'a BTreeSet<String>,
    scope: ScopeStack,
    converter: LiteralConverter,
}

impl<'a> Binder<'a> {
    pub(crate) fn new(model: &'a dyn MetadataModel, config: &'a ParserConfig, context: &'a BindingContext) -> Self {
        Binder {
            model,
            config,
            aliases: &context.aliases,
            scope: ScopeStack::with_implicit(context.element_type.clone()),
            converter: LiteralConverter::new(config.protocol_version),
        }
    }

    /// Binds an expression that must produce a boolean, such as `$filter`.
    pub(crate) fn bind_predicate(&mut self, token: &QueryToken) -> Result<SemanticNode> {
        let node = self.bind_expression(token)?;
        if node.type_ref().is_boolean_compatible() {
            Ok(node)
        } else {
            Err(mismatch(
                token,
                format!("expected a boolean expression, found {}", self.model.type_name(node.type_ref())),
            ))
        }
    }

    pub(crate) fn bind_expression(&mut self, token: &QueryToken) -> Result<SemanticNode> {
        match token {
            QueryToken::Literal(literal) => self.bind_literal(literal, token),
            QueryToken::ParameterAlias(name) => self.bind_alias(name, token),
            QueryToken::UnaryOperator { op, operand } => {
                let operand = self.bind_expression(operand)?;
                self.bind_unary(*op, operand, token)
            }
            QueryToken::BinaryOperator { op, left, right } => {
                let left = self.bind_expression(left)?;
                let right = self.bind_expression(right)?;
                self.bind_binary(*op, left, right, token)
            }
            QueryToken::In { operand, items } => self.bind_in(operand, items, token),
            QueryToken::FunctionCall(call) => self.bind_call(call, token),
            QueryToken::PropertyAccess { identifier, parent } => {
                let source = match parent {
                    Some(parent) => self.bind_expression(parent)?,
                    None => self.implicit_range_variable(token)?,
                };
                self.bind_member(source, identifier, token)
            }
            QueryToken::SystemSegment { identifier, parent } => {
                let source = match parent {
                    Some(parent) => self.bind_expression(parent)?,
                    None => self.implicit_range_variable(token)?,
                };
                self.bind_count(source, identifier, token)
            }
            QueryToken::RangeVariable(name) => self.bind_range_variable(name, token),
            QueryToken::Lambda(lambda) => self.bind_lambda(lambda, token),
            QueryToken::Star => Err(mismatch(token, "'*' is not a value")),
        }
    }

    fn bind_literal(&self, literal: &LiteralToken, token: &QueryToken) -> Result<SemanticNode> {
        if let LiteralValue::Enum { type_name, member } = &literal.value {
            let enum_type = self
                .model
                .find_enum_type(type_name)
                .ok_or_else(|| invalid_literal(token, format!("unknown enum type '{type_name}'")))?;
            if !enum_type.accepts(member) {
                return Err(invalid_literal(
                    token,
                    format!("'{member}' is not a member of '{}'", enum_type.full_name()),
                ));
            }
            return Ok(SemanticNode::Constant {
                value: PrimitiveValue::Enum {
                    type_name: enum_type.full_name(),
                    member: member.clone(),
                },
                literal_text: literal.original_text.clone(),
                type_ref: TypeRef::enumeration(enum_type.id, false),
            });
        }
        let value = self
            .converter
            .to_primitive(&literal.value)
            .map_err(|message| invalid_literal(token, message))?;
        let type_ref = value
            .kind()
            .map_or_else(TypeRef::untyped, |kind| TypeRef::primitive(kind, false));
        Ok(SemanticNode::Constant {
            value,
            literal_text: literal.original_text.clone(),
            type_ref,
        })
    }

    fn bind_alias(&self, name: &str, token: &QueryToken) -> Result<SemanticNode> {
        if !self.aliases.contains(name) {
            return Err(BindingError::new(
                BindingErrorKind::UnboundAlias,
                token,
                format!("parameter alias '@{name}' is not declared in the request"),
            )
            .into());
        }
        Ok(SemanticNode::ParameterAlias {
            name: name.to_string(),
            type_ref: TypeRef::untyped(),
        })
    }

    fn bind_unary(&self, op: UnaryOperatorKind, operand: SemanticNode, token: &QueryToken) -> Result<SemanticNode> {
        let operand_type = operand.type_ref().clone();
        let type_ref = match op {
            UnaryOperatorKind::Not if operand_type.is_boolean_compatible() => {
                TypeRef::primitive(PrimitiveKind::Boolean, operand_type.nullable)
            }
            UnaryOperatorKind::Negate
                if operand_type.is_untyped()
                    || operand_type
                        .as_primitive()
                        .is_some_and(|kind| kind.is_numeric() || kind == PrimitiveKind::Duration) =>
            {
                operand_type
            }
            _ => {
                return Err(mismatch(
                    token,
                    format!("operator '{}' cannot be applied to {}", op.to_string().trim(), self.model.type_name(&operand_type)),
                ))
            }
        };
        Ok(SemanticNode::UnaryOperator {
            op,
            operand: Box::new(operand),
            type_ref,
        })
    }

    fn bind_in(&mut self, operand: &QueryToken, items: &[QueryToken], token: &QueryToken) -> Result<SemanticNode> {
        let operand = self.bind_expression(operand)?;
        if !operand.type_ref().is_single_scalar() {
            return Err(mismatch(
                token,
                format!("'in' needs a single value, found {}", self.model.type_name(operand.type_ref())),
            ));
        }
        let target = operand.type_ref().clone();
        let items = items
            .iter()
            .map(|item| {
                let bound = self.bind_expression(item)?;
                self.coerce_to(bound, &target, item)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SemanticNode::In {
            type_ref: TypeRef::primitive(PrimitiveKind::Boolean, target.nullable),
            operand: Box::new(operand),
            items,
        })
    }

    fn bind_call(&mut self, call: &FunctionCallToken, token: &QueryToken) -> Result<SemanticNode> {
        match &call.source {
            Some(source) => {
                let source = self.bind_expression(source)?;
                self.bind_operation_call(call, Some(source), token)
            }
            None if !call.name.contains('.') && self.is_builtin(&call.name) => self.bind_builtin(call, token),
            None => self.bind_operation_call(call, None, token),
        }
    }

    /// Resolves `identifier` on the value produced by `source`.
    ///
    /// Qualified names are tried as a type cast first. Otherwise lookup goes
    /// structural property, navigation property, then open property.
    pub(super) fn bind_member(
        &self,
        source: SemanticNode,
        identifier: &str,
        token: &dyn fmt::Display,
    ) -> Result<SemanticNode> {
        if identifier.contains('.') && self.model.find_structured_type(identifier).is_some() {
            return self.bind_type_cast(source, identifier, token);
        }
        let source_type = source.type_ref().clone();
        if source_type.is_untyped() {
            return Ok(SemanticNode::OpenProperty {
                source: Box::new(source),
                name: identifier.to_string(),
                type_ref: self.config.open_property_type.clone(),
            });
        }
        if source_type.is_collection() {
            return Err(mismatch(
                token,
                format!(
                    "cannot access '{identifier}' on a collection of {}",
                    self.model.type_name(&source_type)
                ),
            ));
        }
        let Some(type_id) = source_type.structured_id() else {
            return Err(unknown_property(
                token,
                format!("{} has no property '{identifier}'", self.model.type_name(&source_type)),
            ));
        };
        if let Some(property) = self.model.find_property(type_id, identifier) {
            let type_ref = property.type_ref.clone();
            let property = property.name.clone();
            let source = Box::new(source);
            return Ok(if type_ref.is_collection() {
                SemanticNode::CollectionProperty {
                    source,
                    property,
                    type_ref,
                }
            } else {
                SemanticNode::SingleValueProperty {
                    source,
                    property,
                    type_ref,
                }
            });
        }
        if let Some(navigation) = self.model.find_navigation_property(type_id, identifier) {
            let source = Box::new(source);
            return Ok(if navigation.is_collection {
                SemanticNode::CollectionNavigation {
                    source,
                    navigation: navigation.name.clone(),
                    target: navigation.target,
                    type_ref: navigation.type_ref(),
                }
            } else {
                SemanticNode::SingleNavigation {
                    source,
                    navigation: navigation.name.clone(),
                    target: navigation.target,
                    type_ref: navigation.type_ref(),
                }
            });
        }
        if self.model.is_open_type(type_id) {
            return Ok(SemanticNode::OpenProperty {
                source: Box::new(source),
                name: identifier.to_string(),
                type_ref: self.config.open_property_type.clone(),
            });
        }
        Err(unknown_property(
            token,
            format!("{} has no property '{identifier}'", self.model.type_name(&source_type)),
        ))
    }

    /// Casts a single structured value or a collection of them to the derived
    /// type named `type_name`.
    fn bind_type_cast(&self, source: SemanticNode, type_name: &str, token: &dyn fmt::Display) -> Result<SemanticNode> {
        let Some(target) = self.model.find_structured_type(type_name) else {
            return Err(unknown_property(token, format!("unknown type '{type_name}'")));
        };
        let source_type = source.type_ref();
        let (element, is_collection) = match source_type.element_type() {
            Some(element) => (element, true),
            None => (source_type, false),
        };
        let related = element.is_untyped()
            || element
                .structured_id()
                .is_some_and(|id| id == target.id || self.model.is_derived_from(target.id, id));
        if !related {
            return Err(mismatch(
                token,
                format!(
                    "'{type_name}' is not derived from {}",
                    self.model.type_name(element)
                ),
            ));
        }
        let cast = target.type_ref(element.nullable);
        let type_ref = if is_collection {
            TypeRef::collection(cast)
        } else {
            cast
        };
        Ok(SemanticNode::TypeCast {
            source: Box::new(source),
            type_ref,
        })
    }

    fn bind_count(&self, source: SemanticNode, identifier: &str, token: &QueryToken) -> Result<SemanticNode> {
        if identifier != "$count" {
            return Err(unknown_property(token, format!("'{identifier}' is not valid in an expression")));
        }
        if !source.type_ref().is_collection() {
            return Err(mismatch(
                token,
                format!("$count needs a collection, found {}", self.model.type_name(source.type_ref())),
            ));
        }
        Ok(SemanticNode::Count {
            source: Box::new(source),
            type_ref: TypeRef::primitive(PrimitiveKind::Int64, false),
        })
    }

    fn bind_range_variable(&self, name: &str, token: &dyn fmt::Display) -> Result<SemanticNode> {
        let entry = self
            .scope
            .resolve(name)
            .ok_or_else(|| unknown_property(token, format!("'{name}' is not an active range variable")))?;
        let type_ref = entry
            .element_type
            .clone()
            .ok_or_else(|| unknown_property(token, format!("the type of '{name}' is unknown")))?;
        Ok(SemanticNode::RangeVariableRef(RangeVariable {
            name: name.to_string(),
            type_ref,
        }))
    }

    /// `$it`, the source of unqualified member names.
    pub(super) fn implicit_range_variable(&self, token: &dyn fmt::Display) -> Result<SemanticNode> {
        self.bind_range_variable(IMPLICIT_RANGE_VARIABLE, token)
    }

    fn bind_lambda(&mut self, lambda: &LambdaToken, token: &QueryToken) -> Result<SemanticNode> {
        let source = self.bind_expression(&lambda.source)?;
        let Some(element) = source.type_ref().element_type().cloned() else {
            return Err(BindingError::new(
                BindingErrorKind::LambdaOnNonCollection,
                token,
                format!(
                    "'{}' needs a collection, found {}",
                    lambda.kind,
                    self.model.type_name(source.type_ref())
                ),
            )
            .into());
        };
        let (range_variable, body) = match (&lambda.parameter, &lambda.predicate) {
            (Some(parameter), Some(predicate)) => {
                let body = self.scoped(ScopeEntry::typed(parameter.as_str(), element.clone()), |binder| {
                    binder.bind_predicate(predicate)
                })?;
                let variable = RangeVariable {
                    name: parameter.clone(),
                    type_ref: element,
                };
                (Some(variable), Some(Box::new(body)))
            }
            _ => (None, None),
        };
        let node = LambdaNode {
            source: Box::new(source),
            range_variable,
            body,
            type_ref: TypeRef::primitive(PrimitiveKind::Boolean, false),
        };
        Ok(match lambda.kind {
            LambdaKind::Any => SemanticNode::Any(node),
            LambdaKind::All => SemanticNode::All(node),
        })
    }

    /// Runs `f` with `entry` pushed; the entry is popped on every path.
    fn scoped<T>(&mut self, entry: ScopeEntry, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.scope.push(entry);
        let result = f(self);
        self.scope.pop();
        result
    }

    /// Runs `f` with a fresh scope whose `$it` is `element_type`, as for
    /// nested expand options.
    pub(super) fn with_implicit<T>(&mut self, element_type: TypeRef, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let outer = std::mem::replace(&mut self.scope, ScopeStack::with_implicit(Some(element_type)));
        let result = f(self);
        self.scope = outer;
        result
    }
}

pub(super) fn mismatch(token: &dyn fmt::Display, message: impl Into<String>) -> crate::error::QueryError {
    BindingError::new(BindingErrorKind::TypeMismatch, token, message).into()
}

pub(super) fn unknown_property(token: &dyn fmt::Display, message: impl Into<String>) -> crate::error::QueryError {
    BindingError::new(BindingErrorKind::UnknownProperty, token, message).into()
}

pub(super) fn invalid_literal(token: &dyn fmt::Display, message: impl Into<String>) -> crate::error::QueryError {
    BindingError::new(BindingErrorKind::InvalidLiteral, token, message).into()
}
