//! Function binding: the canonical built-in table and model operations.

use std::fmt;

use crate::catalog::{Operation, OperationKind, OperationParameter};
use crate::error::{BindingError, BindingErrorKind, Result};
use crate::parser::{FunctionCallToken, QueryToken};
use crate::types::{PrimitiveKind, TypeRef};

use super::expression::{mismatch, Binder};
use super::semantic::{NamedArgument, SemanticNode};

use PrimitiveKind as P;

/// One overload of a built-in function.
struct Signature {
    name: &'static str,
    parameters: &'static [PrimitiveKind],
    returns: PrimitiveKind,
}

const fn sig(name: &'static str, parameters: &'static [PrimitiveKind], returns: PrimitiveKind) -> Signature {
    Signature {
        name,
        parameters,
        returns,
    }
}

/// Canonical functions. Overloads of a name are listed narrowest first;
/// ties left by untyped arguments go to the first listed.
const BUILTINS: &[Signature] = &[
    // String
    sig("contains", &[P::String, P::String], P::Boolean),
    sig("startswith", &[P::String, P::String], P::Boolean),
    sig("endswith", &[P::String, P::String], P::Boolean),
    sig("length", &[P::String], P::Int32),
    sig("indexof", &[P::String, P::String], P::Int32),
    sig("substring", &[P::String, P::Int32], P::String),
    sig("substring", &[P::String, P::Int32, P::Int32], P::String),
    sig("tolower", &[P::String], P::String),
    sig("toupper", &[P::String], P::String),
    sig("trim", &[P::String], P::String),
    sig("concat", &[P::String, P::String], P::String),
    sig("matchesPattern", &[P::String, P::String], P::Boolean),
    // Date and time
    sig("year", &[P::DateTimeOffset], P::Int32),
    sig("year", &[P::Date], P::Int32),
    sig("month", &[P::DateTimeOffset], P::Int32),
    sig("month", &[P::Date], P::Int32),
    sig("day", &[P::DateTimeOffset], P::Int32),
    sig("day", &[P::Date], P::Int32),
    sig("hour", &[P::DateTimeOffset], P::Int32),
    sig("hour", &[P::TimeOfDay], P::Int32),
    sig("minute", &[P::DateTimeOffset], P::Int32),
    sig("minute", &[P::TimeOfDay], P::Int32),
    sig("second", &[P::DateTimeOffset], P::Int32),
    sig("second", &[P::TimeOfDay], P::Int32),
    sig("fractionalseconds", &[P::DateTimeOffset], P::Decimal),
    sig("fractionalseconds", &[P::TimeOfDay], P::Decimal),
    sig("date", &[P::DateTimeOffset], P::Date),
    sig("time", &[P::DateTimeOffset], P::TimeOfDay),
    sig("totaloffsetminutes", &[P::DateTimeOffset], P::Int32),
    sig("totalseconds", &[P::Duration], P::Decimal),
    sig("now", &[], P::DateTimeOffset),
    sig("maxdatetime", &[], P::DateTimeOffset),
    sig("mindatetime", &[], P::DateTimeOffset),
    // Math
    sig("round", &[P::Decimal], P::Decimal),
    sig("round", &[P::Double], P::Double),
    sig("floor", &[P::Decimal], P::Decimal),
    sig("floor", &[P::Double], P::Double),
    sig("ceiling", &[P::Decimal], P::Decimal),
    sig("ceiling", &[P::Double], P::Double),
];

/// Type functions taking a type name as their last argument.
const TYPE_FUNCTIONS: [&str; 2] = ["cast", "isof"];

impl Binder<'_> {
    /// Canonical name of a built-in, honouring case-insensitive builtins.
    fn builtin_name(&self, name: &str) -> Option<&'static str> {
        BUILTINS
            .iter()
            .map(|signature| signature.name)
            .chain(TYPE_FUNCTIONS)
            .find(|candidate| {
                if self.config.case_insensitive_builtins {
                    candidate.eq_ignore_ascii_case(name)
                } else {
                    *candidate == name
                }
            })
    }

    pub(super) fn is_builtin(&self, name: &str) -> bool {
        self.builtin_name(name).is_some()
    }

    pub(super) fn bind_builtin(&mut self, call: &FunctionCallToken, token: &QueryToken) -> Result<SemanticNode> {
        let Some(name) = self.builtin_name(&call.name) else {
            return Err(unknown_operation(token, format!("unknown function '{}'", call.name)));
        };
        if call.parameters.iter().any(|parameter| parameter.name.is_some()) {
            return Err(mismatch(token, format!("'{name}' does not take named parameters")));
        }
        if TYPE_FUNCTIONS.contains(&name) {
            return self.bind_type_function(name, call, token);
        }
        let arguments = call
            .parameters
            .iter()
            .map(|parameter| self.bind_expression(&parameter.value))
            .collect::<Result<Vec<_>>>()?;

        let mut best: Vec<(&Signature, usize)> = Vec::new();
        for signature in BUILTINS.iter().filter(|s| s.name == name) {
            let Some(distance) = signature_distance(signature, &arguments) else {
                continue;
            };
            match best.first() {
                Some((_, current)) if distance > *current => {}
                Some((_, current)) if distance == *current => best.push((signature, distance)),
                _ => best = vec![(signature, distance)],
            }
        }
        let untyped_arguments = arguments.iter().any(|a| a.type_ref().is_untyped());
        let signature = match best.as_slice() {
            [] => {
                return Err(unknown_operation(
                    token,
                    format!("no overload of '{name}' accepts {}", self.describe_arguments(&arguments)),
                ))
            }
            [(signature, _)] => *signature,
            [(signature, _), ..] if untyped_arguments => *signature,
            _ => {
                return Err(BindingError::new(
                    BindingErrorKind::AmbiguousOperation,
                    token,
                    format!("several overloads of '{name}' accept {}", self.describe_arguments(&arguments)),
                )
                .into())
            }
        };

        let nullable = arguments.iter().any(|a| a.type_ref().nullable);
        let arguments = arguments
            .into_iter()
            .zip(signature.parameters)
            .map(|(argument, kind)| self.coerce_to(argument, &TypeRef::primitive(*kind, true), token))
            .collect::<Result<Vec<_>>>()?;
        tracing::trace!(function = name, arity = arguments.len(), "resolved built-in");
        Ok(SemanticNode::FunctionCall {
            name: name.to_string(),
            arguments,
            type_ref: TypeRef::primitive(signature.returns, nullable),
        })
    }

    /// `cast(expr, Type)`, `cast(Type)`, `isof(expr, Type)`, `isof(Type)`.
    fn bind_type_function(&mut self, name: &str, call: &FunctionCallToken, token: &QueryToken) -> Result<SemanticNode> {
        let (operand, type_token) = match call.parameters.as_slice() {
            [type_token] => (self.implicit_range_variable(token)?, &type_token.value),
            [operand, type_token] => (self.bind_expression(&operand.value)?, &type_token.value),
            _ => {
                return Err(unknown_operation(
                    token,
                    format!("'{name}' takes one or two arguments"),
                ))
            }
        };
        let (type_name, target) = self.resolve_type_name(type_token)?;
        let type_ref = if name == "isof" {
            TypeRef::primitive(P::Boolean, false)
        } else {
            target.with_nullable(true)
        };
        Ok(SemanticNode::FunctionCall {
            name: name.to_string(),
            arguments: vec![
                operand,
                SemanticNode::TypeName {
                    name: type_name,
                    type_ref: target,
                },
            ],
            type_ref,
        })
    }

    /// A bare qualified name naming an EDM primitive or a model type.
    fn resolve_type_name(&self, token: &QueryToken) -> Result<(String, TypeRef)> {
        let QueryToken::PropertyAccess {
            identifier,
            parent: None,
        } = token
        else {
            return Err(mismatch(token, "expected a type name"));
        };
        if let Some(kind) = PrimitiveKind::from_edm_name(identifier) {
            return Ok((identifier.clone(), TypeRef::primitive(kind, true)));
        }
        if let Some(structured) = self.model.find_structured_type(identifier) {
            return Ok((identifier.clone(), structured.type_ref(true)));
        }
        if let Some(enum_type) = self.model.find_enum_type(identifier) {
            return Ok((identifier.clone(), TypeRef::enumeration(enum_type.id, true)));
        }
        Err(mismatch(token, format!("'{identifier}' is not a known type")))
    }

    /// Binds a model function call, bound to `source` when present.
    pub(super) fn bind_operation_call(
        &mut self,
        call: &FunctionCallToken,
        source: Option<SemanticNode>,
        token: &QueryToken,
    ) -> Result<SemanticNode> {
        let arguments = call
            .parameters
            .iter()
            .map(|parameter| Ok((parameter.name.clone(), self.bind_expression(&parameter.value)?)))
            .collect::<Result<Vec<_>>>()?;
        let (operation, arguments, type_ref) =
            self.resolve_operation(&call.name, source.as_ref().map(SemanticNode::type_ref), arguments, false, token)?;
        Ok(SemanticNode::OperationCall {
            operation,
            source: source.map(Box::new),
            arguments,
            type_ref,
        })
    }

    /// Picks the single model operation named `name` that accepts the
    /// arguments. Actions are only candidates when `allow_actions` is set,
    /// as for the last segment of a resource path.
    pub(super) fn resolve_operation(
        &self,
        name: &str,
        binding: Option<&TypeRef>,
        arguments: Vec<(Option<String>, SemanticNode)>,
        allow_actions: bool,
        token: &dyn fmt::Display,
    ) -> Result<(String, Vec<NamedArgument>, TypeRef)> {
        let mut matches: Vec<(&Operation, Vec<usize>)> = self
            .model
            .find_operations(name, binding)
            .into_iter()
            .filter(|operation| allow_actions || operation.kind == OperationKind::Function)
            .filter_map(|operation| {
                let order = argument_order(operation.call_parameters(), &arguments)?;
                let accepts = operation
                    .call_parameters()
                    .iter()
                    .zip(&order)
                    .all(|(parameter, &index)| self.accepts_argument(&arguments[index].1, &parameter.type_ref));
                accepts.then_some((operation, order))
            })
            .collect();

        if matches.len() > 1 {
            return Err(BindingError::new(
                BindingErrorKind::AmbiguousOperation,
                token,
                format!("{} functions named '{name}' accept these arguments", matches.len()),
            )
            .into());
        }
        let Some((operation, order)) = matches.pop() else {
            let message = match binding {
                Some(binding) => format!(
                    "no function '{name}' bound to {} accepts these arguments",
                    self.model.type_name(binding)
                ),
                None => format!("no function '{name}' accepts these arguments"),
            };
            return Err(unknown_operation(token, message));
        };

        let mut values: Vec<Option<SemanticNode>> = arguments.into_iter().map(|(_, value)| Some(value)).collect();
        let mut bound = Vec::with_capacity(values.len());
        for (parameter, index) in operation.call_parameters().iter().zip(order) {
            let value = values
                .get_mut(index)
                .and_then(Option::take)
                .ok_or_else(|| mismatch(token, format!("argument for '{}' given twice", parameter.name)))?;
            bound.push(NamedArgument {
                name: parameter.name.clone(),
                value: self.coerce_to(value, &parameter.type_ref, token)?,
            });
        }
        tracing::trace!(operation = %operation.full_name(), bound = binding.is_some(), "resolved operation");
        Ok((
            operation.full_name(),
            bound,
            operation.return_type.clone().unwrap_or_else(TypeRef::untyped),
        ))
    }

    fn accepts_argument(&self, argument: &SemanticNode, parameter: &TypeRef) -> bool {
        let argument_type = argument.type_ref();
        if self.model.can_promote(argument_type, parameter) {
            return true;
        }
        // Constants that fit, e.g. `10` for an Edm.Byte parameter.
        match (argument.as_constant(), parameter.as_primitive()) {
            (Some(value), Some(kind)) => value.convert_to(kind).is_some(),
            _ => parameter.enum_id().is_some() && argument.as_constant().and_then(|v| v.as_str()).is_some(),
        }
    }

    fn describe_arguments(&self, arguments: &[SemanticNode]) -> String {
        let names: Vec<_> = arguments
            .iter()
            .map(|argument| self.model.type_name(argument.type_ref()))
            .collect();
        format!("({})", names.join(", "))
    }
}

/// Sum of promotion steps from the arguments to the parameters, or `None`
/// if some argument does not convert.
fn signature_distance(signature: &Signature, arguments: &[SemanticNode]) -> Option<usize> {
    if signature.parameters.len() != arguments.len() {
        return None;
    }
    signature
        .parameters
        .iter()
        .zip(arguments)
        .map(|(parameter, argument)| {
            if argument.type_ref().is_untyped() {
                return Some(0);
            }
            let kind = argument.primitive_kind()?;
            kind.promotion_distance(*parameter).or_else(|| {
                argument
                    .as_constant()
                    .and_then(|value| value.convert_to(*parameter))
                    .map(|_| 1)
            })
        })
        .sum()
}

/// Index of the argument supplying each parameter: by name when every
/// argument is named, else by position.
fn argument_order(parameters: &[OperationParameter], arguments: &[(Option<String>, SemanticNode)]) -> Option<Vec<usize>> {
    if parameters.len() != arguments.len() {
        return None;
    }
    if arguments.iter().all(|(name, _)| name.is_none()) {
        return Some((0..arguments.len()).collect());
    }
    parameters
        .iter()
        .map(|parameter| {
            arguments
                .iter()
                .position(|(name, _)| name.as_deref() == Some(parameter.name.as_str()))
        })
        .collect()
}

fn unknown_operation(token: &dyn fmt::Display, message: impl Into<String>) -> crate::error::QueryError {
    BindingError::new(BindingErrorKind::UnknownOperation, token, message).into()
}
