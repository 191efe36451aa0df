//! Parameter alias substitution, run after binding.
//!
//! `$filter=Price gt @p&@p=10` binds `@p` as an untyped alias; callers
//! resolve it against the `@name=value` declarations before executing.

use std::collections::{BTreeMap, BTreeSet};

use crate::binder::SemanticNode;
use crate::error::{QueryError, Result};
use crate::parser::{self, QueryToken, StartRule, SyntacticTree};
use crate::types::{LiteralConverter, PrimitiveValue, ProtocolVersion, TypeRef};
use crate::ParserConfig;

/// Raw alias text by name, without the leading `@`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasValues {
    values: BTreeMap<String, String>,
}

impl AliasValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.values.insert(name.into(), text.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn names(&self) -> BTreeSet<String> {
        self.values.keys().cloned().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl<N: Into<String>, T: Into<String>> FromIterator<(N, T)> for AliasValues {
    fn from_iter<I: IntoIterator<Item = (N, T)>>(iter: I) -> Self {
        AliasValues {
            values: iter
                .into_iter()
                .map(|(name, text)| (name.into(), text.into()))
                .collect(),
        }
    }
}

/// Replaces every `ParameterAlias` in `node` with a constant.
///
/// An alias may name another alias (`@a=@b`). When the alias node carries a
/// primitive type the value is converted to it.
///
/// # Errors
///
/// Returns `QueryError::Alias` when an alias has no value, when its value is
/// not a literal, or when aliases refer to each other in a cycle.
pub fn resolve_aliases(node: SemanticNode, values: &AliasValues, version: ProtocolVersion) -> Result<SemanticNode> {
    let converter = LiteralConverter::new(version);
    node.transform(&mut |node| match node {
        SemanticNode::ParameterAlias { name, type_ref } => {
            let value = resolve_value(&name, values, &converter, &mut BTreeSet::new())?;
            tracing::trace!(alias = %name, "resolved parameter alias");
            typed_constant(&name, value, &type_ref)
        }
        other => Ok(other),
    })
}

fn resolve_value(
    name: &str,
    values: &AliasValues,
    converter: &LiteralConverter,
    visited: &mut BTreeSet<String>,
) -> Result<PrimitiveValue> {
    if !visited.insert(name.to_string()) {
        return Err(alias_error(name, "aliases refer to each other in a cycle"));
    }
    let text = values
        .get(name)
        .ok_or_else(|| alias_error(name, "no value supplied"))?;
    let config = ParserConfig::default().with_protocol_version(converter.version());
    let tree = parser::parse_text(text, StartRule::Filter, &config)
        .map_err(|err| alias_error(name, format!("'{text}' does not parse: {err}")))?;
    let SyntacticTree::Filter(token) = tree else {
        return Err(alias_error(name, format!("'{text}' is not a literal")));
    };
    match token {
        QueryToken::ParameterAlias(next) => resolve_value(&next, values, converter, visited),
        QueryToken::Literal(literal) => converter
            .to_primitive(&literal.value)
            .map_err(|message| alias_error(name, message)),
        _ => Err(alias_error(name, format!("'{text}' is not a literal"))),
    }
}

fn typed_constant(name: &str, value: PrimitiveValue, type_ref: &TypeRef) -> Result<SemanticNode> {
    let Some(target) = type_ref.as_primitive() else {
        return Ok(SemanticNode::constant(value));
    };
    if matches!(value, PrimitiveValue::Null) {
        return Ok(SemanticNode::Constant {
            value,
            literal_text: None,
            type_ref: type_ref.with_nullable(true),
        });
    }
    let converted = value
        .convert_to(target)
        .ok_or_else(|| alias_error(name, format!("value does not convert to Edm.{}", target.edm_name())))?;
    Ok(SemanticNode::Constant {
        value: converted,
        literal_text: None,
        type_ref: type_ref.with_nullable(false),
    })
}

fn alias_error(name: &str, message: impl Into<String>) -> QueryError {
    QueryError::Alias {
        name: name.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveKind;

    fn alias(name: &str) -> SemanticNode {
        SemanticNode::ParameterAlias {
            name: name.into(),
            type_ref: TypeRef::untyped(),
        }
    }

    #[test]
    fn test_resolves_literal() {
        let values: AliasValues = [("p", "42")].into_iter().collect();
        let node = resolve_aliases(alias("p"), &values, ProtocolVersion::V4).unwrap();
        assert_eq!(node.as_constant(), Some(&PrimitiveValue::Int32(42)));
    }

    #[test]
    fn test_resolves_chained_alias() {
        let values: AliasValues = [("a", "@b"), ("b", "'x'")].into_iter().collect();
        let node = resolve_aliases(alias("a"), &values, ProtocolVersion::V4).unwrap();
        assert_eq!(node.as_constant(), Some(&PrimitiveValue::String("x".into())));
    }

    #[test]
    fn test_cycle_is_error() {
        let values: AliasValues = [("a", "@b"), ("b", "@a")].into_iter().collect();
        let err = resolve_aliases(alias("a"), &values, ProtocolVersion::V4).unwrap_err();
        assert!(matches!(err, QueryError::Alias { .. }));
    }

    #[test]
    fn test_missing_value_is_error() {
        let err = resolve_aliases(alias("q"), &AliasValues::new(), ProtocolVersion::V4).unwrap_err();
        assert!(matches!(err, QueryError::Alias { ref name, .. } if name == "q"));
    }

    #[test]
    fn test_converts_to_alias_type() {
        let values: AliasValues = [("p", "5")].into_iter().collect();
        let node = SemanticNode::ParameterAlias {
            name: "p".into(),
            type_ref: TypeRef::primitive(PrimitiveKind::Int64, true),
        };
        let node = resolve_aliases(node, &values, ProtocolVersion::V4).unwrap();
        assert_eq!(node.as_constant(), Some(&PrimitiveValue::Int64(5)));
    }

    #[test]
    fn test_expression_value_is_rejected() {
        let values: AliasValues = [("p", "Price add 1")].into_iter().collect();
        assert!(resolve_aliases(alias("p"), &values, ProtocolVersion::V4).is_err());
    }
}
