//! odata-query - OData URI query parsing and binding.
//!
//! Query text goes through three stages:
//! - the [`lexer`] splits it into tokens,
//! - the [`parser`] builds a [`SyntacticTree`] without consulting any model,
//! - the [`binder`] resolves it against a [`MetadataModel`] into a typed
//!   [`SemanticTree`].
//!
//! [`UriQueryParser`] runs all three for each query option of a request URI.
//! Parameter aliases survive binding as untyped nodes and are substituted
//! by [`alias::resolve_aliases`].

pub mod alias;
pub mod binder;
pub mod catalog;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod types;

use serde::{Deserialize, Serialize};

pub use alias::{resolve_aliases, AliasValues};
pub use binder::{
    bind, BindingContext, ExpandedItem, ODataPath, ODataSegment, ODataSegmentKind, OrderByClause,
    SelectExpandClause, SelectItem, SelectSegment, SemanticNode, SemanticTree,
};
pub use catalog::{Catalog, MetadataModel};
pub use error::{BindingError, BindingErrorKind, QueryError, Result, SyntaxError, SyntaxErrorKind};
pub use parser::{CustomQueryOption, SearchToken, StartRule, SyntacticTree};
pub use types::{PrimitiveKind, PrimitiveValue, ProtocolVersion, TypeRef};

/// Limits and literal rules for parsing and binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum nesting of parentheses, calls and lambdas (default: 100).
    pub max_nesting_depth: usize,
    /// Maximum nesting of `$expand` levels (default: 10).
    pub max_expand_depth: usize,
    /// Literal formats accepted and produced (default: V4).
    pub protocol_version: ProtocolVersion,
    /// Type given to properties of open types that the model does not
    /// declare (default: untyped).
    pub open_property_type: TypeRef,
    /// Accept `Contains(...)` or `AND` for built-in functions and operators.
    pub case_insensitive_builtins: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 100,
            max_expand_depth: 10,
            protocol_version: ProtocolVersion::V4,
            open_property_type: TypeRef::untyped(),
            case_insensitive_builtins: false,
        }
    }
}

impl ParserConfig {
    #[must_use]
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    #[must_use]
    pub fn with_max_expand_depth(mut self, depth: usize) -> Self {
        self.max_expand_depth = depth;
        self
    }

    #[must_use]
    pub fn with_protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    #[must_use]
    pub fn with_open_property_type(mut self, type_ref: TypeRef) -> Self {
        self.open_property_type = type_ref;
        self
    }

    #[must_use]
    pub fn with_case_insensitive_builtins(mut self, enabled: bool) -> Self {
        self.case_insensitive_builtins = enabled;
        self
    }
}

/// A request URI after parsing and binding every query option.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundQuery {
    pub path: ODataPath,
    pub filter: Option<SemanticNode>,
    pub order_by: Vec<OrderByClause>,
    /// Present when `$select` or `$expand` was given.
    pub select_expand: Option<SelectExpandClause>,
    pub search: Option<SearchToken>,
    pub top: Option<i64>,
    pub skip: Option<i64>,
    pub count: Option<bool>,
    pub skip_token: Option<String>,
    pub delta_token: Option<String>,
    pub format: Option<String>,
    /// `@name=value` declarations, still unresolved.
    pub aliases: AliasValues,
    pub custom: Vec<CustomQueryOption>,
}

impl BoundQuery {
    /// Substitutes the declared alias values everywhere a `ParameterAlias`
    /// can appear: path keys and operation arguments, `$filter`, `$orderby`,
    /// and the options nested in `$expand`.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Alias` for an alias whose value is missing, is
    /// not a literal, or does not convert to the type the alias is used as.
    pub fn resolve_aliases(mut self, version: ProtocolVersion) -> Result<Self> {
        let aliases = std::mem::take(&mut self.aliases);
        let resolve = |node: SemanticNode| resolve_aliases(node, &aliases, version);

        for segment in &mut self.path.segments {
            match &mut segment.kind {
                ODataSegmentKind::Key(arguments) | ODataSegmentKind::Operation { arguments, .. } => {
                    resolve_arguments(arguments, &resolve)?;
                }
                _ => {}
            }
        }
        self.filter = self.filter.take().map(&resolve).transpose()?;
        self.order_by = resolve_order_by(std::mem::take(&mut self.order_by), &resolve)?;
        if let Some(clause) = self.select_expand.take() {
            self.select_expand = Some(resolve_select_expand(clause, &resolve)?);
        }
        self.aliases = aliases;
        Ok(self)
    }
}

type Resolver<'a> = dyn Fn(SemanticNode) -> Result<SemanticNode> + 'a;

fn resolve_arguments(arguments: &mut [binder::NamedArgument], resolve: &Resolver<'_>) -> Result<()> {
    for argument in arguments {
        let value = std::mem::replace(&mut argument.value, SemanticNode::constant(PrimitiveValue::Null));
        argument.value = resolve(value)?;
    }
    Ok(())
}

fn resolve_order_by(clauses: Vec<OrderByClause>, resolve: &Resolver<'_>) -> Result<Vec<OrderByClause>> {
    clauses
        .into_iter()
        .map(|clause| {
            Ok(OrderByClause {
                expression: resolve(clause.expression)?,
                direction: clause.direction,
            })
        })
        .collect()
}

fn resolve_select_expand(clause: SelectExpandClause, resolve: &Resolver<'_>) -> Result<SelectExpandClause> {
    let expand = clause
        .expand
        .into_iter()
        .map(|item| {
            Ok(ExpandedItem {
                filter: item.filter.map(resolve).transpose()?,
                order_by: resolve_order_by(item.order_by, resolve)?,
                select_expand: resolve_select_expand(item.select_expand, resolve)?,
                ..item
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SelectExpandClause {
        select: clause.select,
        expand,
    })
}

/// Parses and binds query options against one metadata model.
///
/// The parser holds no state between calls; one instance may serve
/// concurrent requests.
///
/// # Example
///
/// ```ignore
/// let parser = UriQueryParser::new(&catalog);
/// let context = BindingContext::for_entity_set(&catalog, "Products");
/// let filter = parser.parse_filter("Price gt 10", &context)?;
/// ```
#[derive(Clone, Copy)]
pub struct UriQueryParser<'m> {
    model: &'m dyn MetadataModel,
    config: &'m ParserConfig,
}

static DEFAULT_CONFIG: std::sync::OnceLock<ParserConfig> = std::sync::OnceLock::new();

impl<'m> UriQueryParser<'m> {
    /// Creates a parser with the default configuration.
    #[must_use]
    pub fn new(model: &'m dyn MetadataModel) -> Self {
        Self {
            model,
            config: DEFAULT_CONFIG.get_or_init(ParserConfig::default),
        }
    }

    #[must_use]
    pub fn with_config(model: &'m dyn MetadataModel, config: &'m ParserConfig) -> Self {
        Self { model, config }
    }

    #[must_use]
    pub fn config(&self) -> &ParserConfig {
        self.config
    }

    /// Parses and binds a `$filter` value.
    ///
    /// # Errors
    ///
    /// Returns a `SyntaxError` or a `BindingError`.
    pub fn parse_filter(&self, text: &str, context: &BindingContext) -> Result<SemanticNode> {
        let SyntacticTree::Filter(token) = parser::parse_text(text, StartRule::Filter, self.config)? else {
            return Err(unexpected_tree(StartRule::Filter));
        };
        binder::bind_filter(&token, self.model, context, self.config)
    }

    /// Parses and binds an `$orderby` value.
    ///
    /// # Errors
    ///
    /// Returns a `SyntaxError` or a `BindingError`.
    pub fn parse_orderby(&self, text: &str, context: &BindingContext) -> Result<Vec<OrderByClause>> {
        let SyntacticTree::OrderBy(items) = parser::parse_text(text, StartRule::OrderBy, self.config)? else {
            return Err(unexpected_tree(StartRule::OrderBy));
        };
        binder::bind_order_by(&items, self.model, context, self.config)
    }

    /// Parses and binds `$select` and `$expand` values together.
    ///
    /// # Errors
    ///
    /// Returns a `SyntaxError` or a `BindingError`.
    pub fn parse_select_and_expand(
        &self,
        select: Option<&str>,
        expand: Option<&str>,
        context: &BindingContext,
    ) -> Result<SelectExpandClause> {
        let select = select
            .map(|text| match parser::parse_text(text, StartRule::Select, self.config)? {
                SyntacticTree::Select(items) => Ok(items),
                _ => Err(unexpected_tree(StartRule::Select)),
            })
            .transpose()?;
        let expand = expand
            .map(|text| match parser::parse_text(text, StartRule::Expand, self.config)? {
                SyntacticTree::Expand(expand) => Ok(expand),
                _ => Err(unexpected_tree(StartRule::Expand)),
            })
            .transpose()?;
        binder::bind_select_expand(select.as_deref(), expand.as_ref(), self.model, context, self.config)
    }

    /// Parses a `$search` value. Search terms never reference the model.
    ///
    /// # Errors
    ///
    /// Returns a `SyntaxError`.
    pub fn parse_search(&self, text: &str) -> Result<SearchToken> {
        match parser::parse_text(text, StartRule::Search, self.config)? {
            SyntacticTree::Search(search) => Ok(search),
            _ => Err(unexpected_tree(StartRule::Search)),
        }
    }

    /// Parses and binds a resource path relative to the service root.
    ///
    /// # Errors
    ///
    /// Returns a `SyntaxError` or a `BindingError`.
    pub fn parse_path(&self, text: &str) -> Result<ODataPath> {
        self.bind_path_text(text, &BindingContext::new())
    }

    fn bind_path_text(&self, text: &str, context: &BindingContext) -> Result<ODataPath> {
        let SyntacticTree::ResourcePath(path) = parser::parse_text(text, StartRule::ResourcePath, self.config)?
        else {
            return Err(unexpected_tree(StartRule::ResourcePath));
        };
        binder::bind_path(&path, self.model, context, self.config)
    }

    /// Parses and binds a relative request URI: resource path, then query
    /// string. Query options bind against the path's target type, and the
    /// aliases declared in the query string are the only bindable ones.
    ///
    /// The text must already be percent-decoded.
    ///
    /// # Errors
    ///
    /// Returns the first `SyntaxError` or `BindingError` found. Error
    /// positions inside an option refer to the query string.
    pub fn parse_uri(&self, uri: &str) -> Result<BoundQuery> {
        let (path_text, query) = uri.split_once('?').unwrap_or((uri, ""));
        tracing::debug!(path = path_text, query_length = query.len(), "parsing request uri");

        let options = parser::parse_query_options(query, self.config)?;
        let aliases: AliasValues = options.aliases.iter().cloned().collect();
        let path = if path_text.trim_matches('/').is_empty() {
            ODataPath::default()
        } else {
            self.bind_path_text(path_text, &BindingContext::new().with_aliases(aliases.names()))?
        };
        let context = BindingContext::for_path(&path).with_aliases(aliases.names());

        let filter = options
            .filter
            .as_ref()
            .map(|token| binder::bind_filter(token, self.model, &context, self.config))
            .transpose()?;
        let order_by = match &options.order_by {
            Some(items) => binder::bind_order_by(items, self.model, &context, self.config)?,
            None => Vec::new(),
        };
        let select_expand = if options.select.is_some() || options.expand.is_some() {
            Some(binder::bind_select_expand(
                options.select.as_deref(),
                options.expand.as_ref(),
                self.model,
                &context,
                self.config,
            )?)
        } else {
            None
        };

        Ok(BoundQuery {
            path,
            filter,
            order_by,
            select_expand,
            search: options.search,
            top: options.top,
            skip: options.skip,
            count: options.count,
            skip_token: options.skip_token,
            delta_token: options.delta_token,
            format: options.format,
            aliases,
            custom: options.custom,
        })
    }
}

impl std::fmt::Debug for UriQueryParser<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UriQueryParser")
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}

fn unexpected_tree(rule: StartRule) -> QueryError {
    SyntaxError::new(SyntaxErrorKind::UnexpectedToken, 0)
        .with_expected(format!("{rule:?} expression"))
        .into()
}
