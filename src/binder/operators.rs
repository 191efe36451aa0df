//! Operator typing and implicit promotion.
//!
//! Comparison and arithmetic operands are brought to a common type. A
//! constant is converted in place when its value fits the other operand's
//! type; any other operand is wrapped in a `Convert` node following the
//! primitive promotion lattice.

use std::fmt;

use crate::error::Result;
use crate::parser::{BinaryOperatorKind, QueryToken};
use crate::types::{PrimitiveKind, PrimitiveValue, TypeKind, TypeRef};

use super::expression::{invalid_literal, mismatch, Binder};
use super::semantic::SemanticNode;

impl Binder<'_> {
    pub(super) fn bind_binary(
        &self,
        op: BinaryOperatorKind,
        left: SemanticNode,
        right: SemanticNode,
        token: &QueryToken,
    ) -> Result<SemanticNode> {
        let nullable = left.type_ref().nullable || right.type_ref().nullable;
        let (left, right, type_ref) = if op.is_logical() {
            self.check_logical(&left, &right, op, token)?;
            (left, right, TypeRef::primitive(PrimitiveKind::Boolean, nullable))
        } else if op == BinaryOperatorKind::Has {
            let right = self.bind_has(&left, right, token)?;
            (left, right, TypeRef::primitive(PrimitiveKind::Boolean, nullable))
        } else if op.is_comparison() {
            let (left, right) = self.unify_comparison(op, left, right, token)?;
            (left, right, TypeRef::primitive(PrimitiveKind::Boolean, nullable))
        } else {
            let (left, right, result) = self.unify_arithmetic(op, left, right, token)?;
            (left, right, result.with_nullable(nullable))
        };
        Ok(SemanticNode::BinaryOperator {
            op,
            left: Box::new(left),
            right: Box::new(right),
            type_ref,
        })
    }

    fn check_logical(
        &self,
        left: &SemanticNode,
        right: &SemanticNode,
        op: BinaryOperatorKind,
        token: &QueryToken,
    ) -> Result<()> {
        for operand in [left, right] {
            if !operand.type_ref().is_boolean_compatible() {
                return Err(mismatch(
                    token,
                    format!(
                        "'{op}' needs boolean operands, found {}",
                        self.model.type_name(operand.type_ref())
                    ),
                ));
            }
        }
        Ok(())
    }

    /// `has` takes an enum value on the left and a member of the same enum
    /// on the right.
    fn bind_has(&self, left: &SemanticNode, right: SemanticNode, token: &QueryToken) -> Result<SemanticNode> {
        let left_type = left.type_ref();
        if left_type.is_untyped() {
            return Ok(right);
        }
        if left_type.enum_id().is_none() {
            return Err(mismatch(
                token,
                format!("'has' needs an enum value, found {}", self.model.type_name(left_type)),
            ));
        }
        self.coerce_to(right, left_type, token)
    }

    fn unify_comparison(
        &self,
        op: BinaryOperatorKind,
        left: SemanticNode,
        right: SemanticNode,
        token: &QueryToken,
    ) -> Result<(SemanticNode, SemanticNode)> {
        let ordering = !matches!(op, BinaryOperatorKind::Eq | BinaryOperatorKind::Ne);
        for operand in [&left, &right] {
            let type_ref = operand.type_ref();
            let comparable = match &type_ref.kind {
                TypeKind::Primitive(kind) => !ordering || kind.is_orderable(),
                TypeKind::Enum(_) | TypeKind::Untyped => true,
                // Structured values may only be tested for equality, e.g. against null.
                TypeKind::Entity(_) | TypeKind::Complex(_) => !ordering,
                TypeKind::Collection(_) => false,
            };
            if !comparable {
                return Err(mismatch(
                    token,
                    format!("'{op}' cannot compare {}", self.model.type_name(type_ref)),
                ));
            }
        }
        self.unify(left, right, token)
    }

    /// Brings two operands to a common type.
    fn unify(&self, left: SemanticNode, right: SemanticNode, token: &QueryToken) -> Result<(SemanticNode, SemanticNode)> {
        let (left_type, right_type) = (left.type_ref().clone(), right.type_ref().clone());
        if left_type.is_untyped() || right_type.is_untyped() || left_type.kind == right_type.kind {
            return Ok((adopt_type(left, &right_type), adopt_type(right, &left_type)));
        }
        match (&left_type.kind, &right_type.kind) {
            (TypeKind::Enum(_), _) => {
                let right = self.coerce_to(right, &left_type, token)?;
                Ok((left, right))
            }
            (_, TypeKind::Enum(_)) => {
                let left = self.coerce_to(left, &right_type, token)?;
                Ok((left, right))
            }
            (TypeKind::Primitive(a), TypeKind::Primitive(b)) => {
                if let Some(right) = convert_constant(&right, *a) {
                    return Ok((left, right));
                }
                if let Some(left) = convert_constant(&left, *b) {
                    return Ok((left, right));
                }
                match a.common_type(*b) {
                    Some(common) => Ok((promote(left, common), promote(right, common))),
                    None => Err(self.incompatible(&left_type, &right_type, token)),
                }
            }
            _ if self.model.can_promote(&left_type, &right_type) || self.model.can_promote(&right_type, &left_type) => {
                Ok((left, right))
            }
            _ => Err(self.incompatible(&left_type, &right_type, token)),
        }
    }

    /// Numeric arithmetic plus the date/time combinations.
    fn unify_arithmetic(
        &self,
        op: BinaryOperatorKind,
        left: SemanticNode,
        right: SemanticNode,
        token: &QueryToken,
    ) -> Result<(SemanticNode, SemanticNode, TypeRef)> {
        use PrimitiveKind as P;
        let (left_type, right_type) = (left.type_ref().clone(), right.type_ref().clone());
        match (left_type.is_untyped(), right_type.is_untyped()) {
            (true, true) => return Ok((left, right, TypeRef::untyped())),
            (true, false) => return Ok((adopt_numeric_type(left, &right_type), right, right_type)),
            (false, true) => return Ok((left, adopt_numeric_type(right, &left_type), left_type)),
            (false, false) => {}
        }
        let (Some(a), Some(b)) = (left_type.as_primitive(), right_type.as_primitive()) else {
            return Err(self.incompatible(&left_type, &right_type, token));
        };
        let additive = matches!(op, BinaryOperatorKind::Add | BinaryOperatorKind::Sub);
        let temporal = match (a, b) {
            (P::DateTimeOffset | P::Date | P::DateTime | P::Duration, P::Duration) if additive => Some(a),
            (P::DateTimeOffset, P::DateTimeOffset) | (P::Date, P::Date) if op == BinaryOperatorKind::Sub => {
                Some(P::Duration)
            }
            _ => None,
        };
        if let Some(result) = temporal {
            return Ok((left, right, TypeRef::primitive(result, false)));
        }
        if !a.is_numeric() || !b.is_numeric() {
            return Err(mismatch(
                token,
                format!(
                    "'{op}' cannot be applied to {} and {}",
                    self.model.type_name(&left_type),
                    self.model.type_name(&right_type)
                ),
            ));
        }
        let (left, right) = self.unify(left, right, token)?;
        let common = left
            .primitive_kind()
            .or_else(|| right.primitive_kind())
            .unwrap_or(a);
        let result = match op {
            BinaryOperatorKind::DivBy if matches!(common, P::Single | P::Double) => P::Double,
            BinaryOperatorKind::DivBy => P::Decimal,
            _ => common,
        };
        Ok((left, right, TypeRef::primitive(result, false)))
    }

    /// Converts `node` to `target`, for function arguments, `in` lists and
    /// enum comparisons.
    pub(super) fn coerce_to(&self, node: SemanticNode, target: &TypeRef, token: &dyn fmt::Display) -> Result<SemanticNode> {
        let source = node.type_ref();
        if source.is_untyped() || target.is_untyped() || source.kind == target.kind {
            return Ok(adopt_type(node, target));
        }
        if let Some(enum_id) = target.enum_id() {
            let Some(PrimitiveValue::String(member)) = node.as_constant() else {
                return Err(self.incompatible(source, target, token));
            };
            let enum_type = self
                .model
                .enum_type(enum_id)
                .ok_or_else(|| mismatch(token, "enum type is missing from the model"))?;
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
                literal_text: None,
                type_ref: target.with_nullable(false),
            });
        }
        if let (Some(from), Some(to)) = (source.as_primitive(), target.as_primitive()) {
            if let Some(converted) = convert_constant(&node, to) {
                return Ok(converted);
            }
            if from.can_promote_to(to) {
                return Ok(promote(node, to));
            }
            return Err(self.incompatible(source, target, token));
        }
        if self.model.can_promote(source, target) {
            Ok(node)
        } else {
            Err(self.incompatible(source, target, token))
        }
    }

    fn incompatible(&self, left: &TypeRef, right: &TypeRef, token: &dyn fmt::Display) -> crate::error::QueryError {
        mismatch(
            token,
            format!(
                "{} and {} have no common type",
                self.model.type_name(left),
                self.model.type_name(right)
            ),
        )
    }
}

/// A constant whose value converts to `target`, rewritten to that type.
fn convert_constant(node: &SemanticNode, target: PrimitiveKind) -> Option<SemanticNode> {
    let SemanticNode::Constant {
        value, literal_text, ..
    } = node
    else {
        return None;
    };
    let converted = value.convert_to(target)?;
    Some(SemanticNode::Constant {
        value: converted,
        literal_text: literal_text.clone(),
        type_ref: TypeRef::primitive(target, false),
    })
}

/// Wraps `node` in a `Convert` to `target` unless it already has that type.
fn promote(node: SemanticNode, target: PrimitiveKind) -> SemanticNode {
    if node.primitive_kind() == Some(target) {
        return node;
    }
    let nullable = node.type_ref().nullable;
    SemanticNode::Convert {
        source: Box::new(node),
        type_ref: TypeRef::primitive(target, nullable),
    }
}

/// Types an untyped `@alias` as the primitive or enum value it is used as,
/// so alias resolution converts the supplied literal to that type.
fn adopt_type(node: SemanticNode, target: &TypeRef) -> SemanticNode {
    match node {
        SemanticNode::ParameterAlias { name, type_ref }
            if type_ref.is_untyped() && (target.as_primitive().is_some() || target.enum_id().is_some()) =>
        {
            SemanticNode::ParameterAlias {
                name,
                type_ref: target.with_nullable(true),
            }
        }
        other => other,
    }
}

/// As [`adopt_type`], for arithmetic: a temporal operand says nothing about
/// the type of the other one.
fn adopt_numeric_type(node: SemanticNode, target: &TypeRef) -> SemanticNode {
    if target.as_primitive().is_some_and(|kind| kind.is_numeric()) {
        adopt_type(node, target)
    } else {
        node
    }
}
