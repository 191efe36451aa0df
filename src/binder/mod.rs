//! Semantic stage: binds syntactic trees against a [`MetadataModel`].
//!
//! The binder resolves every identifier to a property, navigation, type or
//! operation of the model and attaches a type to every node. Implicit
//! promotions surface as `Convert` nodes. Lambda bodies bind against a
//! typed scope stack whose bottom entry is the implicit `$it`.

mod expression;
mod functions;
mod operators;
mod options;
mod path;
mod semantic;

use std::collections::BTreeSet;

use crate::catalog::MetadataModel;
use crate::error::Result;
use crate::parser::{ExpandToken, OrderByToken, PathSegment, QueryToken, SelectItemToken, SyntacticTree};
use crate::types::TypeRef;
use crate::ParserConfig;

use expression::Binder;

pub use semantic::{
    ExpandedItem, LambdaNode, NamedArgument, ODataPath, ODataSegment, ODataSegmentKind, OrderByClause,
    RangeVariable, SelectExpandClause, SelectItem, SelectSegment, SemanticNode, SemanticTree,
};

/// What a query option binds against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingContext {
    /// Element type of the resource the options apply to; `$it` has this type.
    pub element_type: Option<TypeRef>,
    /// Entity set or singleton the resource comes from, when known.
    pub navigation_source: Option<String>,
    /// Parameter aliases supplied with the request. Any other alias fails
    /// to bind.
    pub aliases: BTreeSet<String>,
}

impl BindingContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for options applied to instances of `element_type`.
    #[must_use]
    pub fn for_type(element_type: TypeRef) -> Self {
        BindingContext {
            element_type: Some(element_type),
            ..Self::default()
        }
    }

    /// Context for options applied to the entity set `name`. Unknown sets
    /// leave the element type empty so that any member access fails.
    #[must_use]
    pub fn for_entity_set(model: &dyn MetadataModel, name: &str) -> Self {
        let set = model.find_entity_set(name);
        BindingContext {
            element_type: set.map(|set| TypeRef::entity(set.entity_type, false)),
            navigation_source: set.map(|set| set.name.clone()),
            aliases: BTreeSet::new(),
        }
    }

    /// Context for options applied to the target of a bound resource path.
    #[must_use]
    pub fn for_path(path: &ODataPath) -> Self {
        BindingContext {
            element_type: path.implicit_type().cloned(),
            navigation_source: path.navigation_source().map(str::to_string),
            aliases: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_alias(mut self, name: impl Into<String>) -> Self {
        self.aliases.insert(name.into());
        self
    }

    #[must_use]
    pub fn with_aliases<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(names.into_iter().map(Into::into));
        self
    }
}

/// Binds `tree` against `model`.
///
/// # Errors
///
/// Returns a `BindingError` naming the offending token when an identifier
/// does not resolve, when types are incompatible, or when a limit of
/// `config` is exceeded.
pub fn bind(
    tree: &SyntacticTree,
    model: &dyn MetadataModel,
    context: &BindingContext,
    config: &ParserConfig,
) -> Result<SemanticTree> {
    let bound = match tree {
        SyntacticTree::Filter(token) => SemanticTree::Filter(bind_filter(token, model, context, config)?),
        SyntacticTree::OrderBy(items) => SemanticTree::OrderBy(bind_order_by(items, model, context, config)?),
        SyntacticTree::Select(items) => {
            SemanticTree::SelectExpand(bind_select_expand(Some(items.as_slice()), None, model, context, config)?)
        }
        SyntacticTree::Expand(expand) => {
            SemanticTree::SelectExpand(bind_select_expand(None, Some(expand), model, context, config)?)
        }
        SyntacticTree::Search(search) => SemanticTree::Search(search.clone()),
        SyntacticTree::ResourcePath(path) => SemanticTree::Path(bind_path(path, model, context, config)?),
    };
    Ok(bound)
}

/// Binds a `$filter` expression; the result is boolean.
///
/// # Errors
///
/// Returns a `BindingError`, `TypeMismatch` when the expression is not boolean.
pub fn bind_filter(
    token: &QueryToken,
    model: &dyn MetadataModel,
    context: &BindingContext,
    config: &ParserConfig,
) -> Result<SemanticNode> {
    tracing::debug!(element_type = ?element_type_name(model, context), "binding filter");
    Binder::new(model, config, context).bind_predicate(token)
}

/// Binds `$orderby` items.
///
/// # Errors
///
/// Returns a `BindingError`; every item must be a single primitive or enum value.
pub fn bind_order_by(
    items: &[OrderByToken],
    model: &dyn MetadataModel,
    context: &BindingContext,
    config: &ParserConfig,
) -> Result<Vec<OrderByClause>> {
    tracing::debug!(element_type = ?element_type_name(model, context), items = items.len(), "binding orderby");
    Binder::new(model, config, context).bind_order_by(items)
}

/// Binds `$select` and `$expand` together into one clause.
///
/// # Errors
///
/// Returns a `BindingError` for unknown members, invalid expand options, or
/// expansion nested deeper than `config.max_expand_depth`.
pub fn bind_select_expand(
    select: Option<&[SelectItemToken]>,
    expand: Option<&ExpandToken>,
    model: &dyn MetadataModel,
    context: &BindingContext,
    config: &ParserConfig,
) -> Result<SelectExpandClause> {
    tracing::debug!(element_type = ?element_type_name(model, context), "binding select/expand");
    let element_type = context.element_type.clone().unwrap_or_else(TypeRef::untyped);
    Binder::new(model, config, context).bind_select_expand(&element_type, select, expand)
}

/// Binds a resource path from the service root.
///
/// # Errors
///
/// Returns a `BindingError` when a segment does not resolve or a key does
/// not match the entity key.
pub fn bind_path(
    path: &PathSegment,
    model: &dyn MetadataModel,
    context: &BindingContext,
    config: &ParserConfig,
) -> Result<ODataPath> {
    tracing::debug!(%path, "binding resource path");
    Binder::new(model, config, context).bind_path(path)
}

fn element_type_name(model: &dyn MetadataModel, context: &BindingContext) -> Option<String> {
    context.element_type.as_ref().map(|ty| model.type_name(ty))
}
