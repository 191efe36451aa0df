//! Semantic tree definitions.
//!
//! Every node carries the [`TypeRef`] the binder resolved for it. The tree
//! mirrors the syntactic shape, with property access split by cardinality
//! and implicit conversions made explicit as [`SemanticNode::Convert`].

use crate::error::Result;
use crate::parser::{BinaryOperatorKind, LevelsToken, OrderDirection, SearchToken, UnaryOperatorKind};
use crate::types::{PrimitiveKind, PrimitiveValue, TypeId, TypeRef};

/// Bound expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticNode {
    /// Typed constant. `literal_text` is the literal exactly as written.
    Constant {
        value: PrimitiveValue,
        literal_text: Option<String>,
        type_ref: TypeRef,
    },

    /// `@name`, resolved later from the request's alias values.
    ParameterAlias { name: String, type_ref: TypeRef },

    /// Implicit promotion of `source` to `type_ref`.
    Convert {
        source: Box<SemanticNode>,
        type_ref: TypeRef,
    },

    UnaryOperator {
        op: UnaryOperatorKind,
        operand: Box<SemanticNode>,
        type_ref: TypeRef,
    },

    BinaryOperator {
        op: BinaryOperatorKind,
        left: Box<SemanticNode>,
        right: Box<SemanticNode>,
        type_ref: TypeRef,
    },

    In {
        operand: Box<SemanticNode>,
        items: Vec<SemanticNode>,
        type_ref: TypeRef,
    },

    /// Reference to a lambda parameter or `$it`.
    RangeVariableRef(RangeVariable),

    /// Single-valued structural property (primitive, enum or complex).
    SingleValueProperty {
        source: Box<SemanticNode>,
        property: String,
        type_ref: TypeRef,
    },

    /// Collection-valued structural property.
    CollectionProperty {
        source: Box<SemanticNode>,
        property: String,
        type_ref: TypeRef,
    },

    SingleNavigation {
        source: Box<SemanticNode>,
        navigation: String,
        target: TypeId,
        type_ref: TypeRef,
    },

    CollectionNavigation {
        source: Box<SemanticNode>,
        navigation: String,
        target: TypeId,
        type_ref: TypeRef,
    },

    /// A property not declared on an open type.
    OpenProperty {
        source: Box<SemanticNode>,
        name: String,
        type_ref: TypeRef,
    },

    /// Down-cast to a derived structured type.
    TypeCast {
        source: Box<SemanticNode>,
        type_ref: TypeRef,
    },

    /// `source/$count`
    Count {
        source: Box<SemanticNode>,
        type_ref: TypeRef,
    },

    /// A type name argument of `cast` or `isof`.
    TypeName { name: String, type_ref: TypeRef },

    /// Built-in function after overload resolution.
    FunctionCall {
        name: String,
        arguments: Vec<SemanticNode>,
        type_ref: TypeRef,
    },

    /// Model function; bound when `source` is present.
    OperationCall {
        operation: String,
        source: Option<Box<SemanticNode>>,
        arguments: Vec<NamedArgument>,
        type_ref: TypeRef,
    },

    Any(LambdaNode),

    All(LambdaNode),
}

impl SemanticNode {
    /// Returns the resolved type of this node.
    #[must_use]
    pub fn type_ref(&self) -> &TypeRef {
        match self {
            SemanticNode::RangeVariableRef(variable) => &variable.type_ref,
            SemanticNode::Any(lambda) | SemanticNode::All(lambda) => &lambda.type_ref,
            SemanticNode::Constant { type_ref, .. }
            | SemanticNode::ParameterAlias { type_ref, .. }
            | SemanticNode::Convert { type_ref, .. }
            | SemanticNode::UnaryOperator { type_ref, .. }
            | SemanticNode::BinaryOperator { type_ref, .. }
            | SemanticNode::In { type_ref, .. }
            | SemanticNode::SingleValueProperty { type_ref, .. }
            | SemanticNode::CollectionProperty { type_ref, .. }
            | SemanticNode::SingleNavigation { type_ref, .. }
            | SemanticNode::CollectionNavigation { type_ref, .. }
            | SemanticNode::OpenProperty { type_ref, .. }
            | SemanticNode::TypeCast { type_ref, .. }
            | SemanticNode::Count { type_ref, .. }
            | SemanticNode::TypeName { type_ref, .. }
            | SemanticNode::FunctionCall { type_ref, .. }
            | SemanticNode::OperationCall { type_ref, .. } => type_ref,
        }
    }

    /// Creates a constant of a primitive value.
    #[must_use]
    pub fn constant(value: PrimitiveValue) -> Self {
        let type_ref = match value.kind() {
            Some(kind) => TypeRef::primitive(kind, false),
            None => TypeRef::untyped(),
        };
        SemanticNode::Constant {
            value,
            literal_text: None,
            type_ref,
        }
    }

    /// Returns the constant value, if this is a constant.
    #[must_use]
    pub fn as_constant(&self) -> Option<&PrimitiveValue> {
        match self {
            SemanticNode::Constant { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The null literal.
    #[must_use]
    pub fn is_null_constant(&self) -> bool {
        self.as_constant().is_some_and(PrimitiveValue::is_null)
    }

    /// Primitive kind of the node's type, if it is a single primitive.
    #[must_use]
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        self.type_ref().as_primitive()
    }

    /// Rebuilds the tree bottom-up, passing every node through `f` after
    /// its children have been rebuilt.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn transform(self, f: &mut dyn FnMut(SemanticNode) -> Result<SemanticNode>) -> Result<SemanticNode> {
        let node = match self {
            SemanticNode::Convert { source, type_ref } => SemanticNode::Convert {
                source: boxed(source, f)?,
                type_ref,
            },
            SemanticNode::UnaryOperator { op, operand, type_ref } => SemanticNode::UnaryOperator {
                op,
                operand: boxed(operand, f)?,
                type_ref,
            },
            SemanticNode::BinaryOperator {
                op,
                left,
                right,
                type_ref,
            } => SemanticNode::BinaryOperator {
                op,
                left: boxed(left, f)?,
                right: boxed(right, f)?,
                type_ref,
            },
            SemanticNode::In {
                operand,
                items,
                type_ref,
            } => SemanticNode::In {
                operand: boxed(operand, f)?,
                items: items
                    .into_iter()
                    .map(|item| item.transform(f))
                    .collect::<Result<_>>()?,
                type_ref,
            },
            SemanticNode::SingleValueProperty {
                source,
                property,
                type_ref,
            } => SemanticNode::SingleValueProperty {
                source: boxed(source, f)?,
                property,
                type_ref,
            },
            SemanticNode::CollectionProperty {
                source,
                property,
                type_ref,
            } => SemanticNode::CollectionProperty {
                source: boxed(source, f)?,
                property,
                type_ref,
            },
            SemanticNode::SingleNavigation {
                source,
                navigation,
                target,
                type_ref,
            } => SemanticNode::SingleNavigation {
                source: boxed(source, f)?,
                navigation,
                target,
                type_ref,
            },
            SemanticNode::CollectionNavigation {
                source,
                navigation,
                target,
                type_ref,
            } => SemanticNode::CollectionNavigation {
                source: boxed(source, f)?,
                navigation,
                target,
                type_ref,
            },
            SemanticNode::OpenProperty { source, name, type_ref } => SemanticNode::OpenProperty {
                source: boxed(source, f)?,
                name,
                type_ref,
            },
            SemanticNode::TypeCast { source, type_ref } => SemanticNode::TypeCast {
                source: boxed(source, f)?,
                type_ref,
            },
            SemanticNode::Count { source, type_ref } => SemanticNode::Count {
                source: boxed(source, f)?,
                type_ref,
            },
            SemanticNode::FunctionCall {
                name,
                arguments,
                type_ref,
            } => SemanticNode::FunctionCall {
                name,
                arguments: arguments
                    .into_iter()
                    .map(|argument| argument.transform(f))
                    .collect::<Result<_>>()?,
                type_ref,
            },
            SemanticNode::OperationCall {
                operation,
                source,
                arguments,
                type_ref,
            } => SemanticNode::OperationCall {
                operation,
                source: source.map(|s| boxed(s, f)).transpose()?,
                arguments: arguments
                    .into_iter()
                    .map(|argument| {
                        Ok(NamedArgument {
                            name: argument.name,
                            value: argument.value.transform(f)?,
                        })
                    })
                    .collect::<Result<_>>()?,
                type_ref,
            },
            SemanticNode::Any(lambda) => SemanticNode::Any(lambda.transform(f)?),
            SemanticNode::All(lambda) => SemanticNode::All(lambda.transform(f)?),
            leaf @ (SemanticNode::Constant { .. }
            | SemanticNode::ParameterAlias { .. }
            | SemanticNode::RangeVariableRef(_)
            | SemanticNode::TypeName { .. }) => leaf,
        };
        f(node)
    }
}

fn boxed(node: Box<SemanticNode>, f: &mut dyn FnMut(SemanticNode) -> Result<SemanticNode>) -> Result<Box<SemanticNode>> {
    node.transform(f).map(Box::new)
}

/// A named range variable and the element type it ranges over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeVariable {
    pub name: String,
    pub type_ref: TypeRef,
}

/// Bound `any`/`all`.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaNode {
    pub source: Box<SemanticNode>,
    /// `None` for the parameterless `any()`.
    pub range_variable: Option<RangeVariable>,
    pub body: Option<Box<SemanticNode>>,
    pub type_ref: TypeRef,
}

impl LambdaNode {
    fn transform(self, f: &mut dyn FnMut(SemanticNode) -> Result<SemanticNode>) -> Result<Self> {
        Ok(LambdaNode {
            source: boxed(self.source, f)?,
            range_variable: self.range_variable,
            body: self
                .body
                .map(|body| boxed(body, f))
                .transpose()?,
            type_ref: self.type_ref,
        })
    }
}

/// An operation argument, named after the declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArgument {
    pub name: String,
    pub value: SemanticNode,
}

/// Bound `$orderby` item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub expression: SemanticNode,
    pub direction: OrderDirection,
}

/// One step of a `$select` or `$expand` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectSegment {
    Property { name: String, type_ref: TypeRef },
    Navigation { name: String, type_ref: TypeRef },
    TypeCast { name: String, type_ref: TypeRef },
    Operation { name: String },
    OpenProperty { name: String },
}

impl SelectSegment {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            SelectSegment::Property { name, .. }
            | SelectSegment::Navigation { name, .. }
            | SelectSegment::TypeCast { name, .. }
            | SelectSegment::Operation { name }
            | SelectSegment::OpenProperty { name } => name,
        }
    }
}

/// Bound `$select` item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectItem {
    All,
    NamespaceWildcard(String),
    Path(Vec<SelectSegment>),
}

/// Bound `$expand` item with its nested options.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedItem {
    /// Segments leading to and including the navigation property, plus an
    /// optional trailing type cast.
    pub path: Vec<SelectSegment>,
    pub navigation: String,
    /// Type of the expanded navigation: an entity or a collection of them.
    pub type_ref: TypeRef,
    /// `$ref`: only entity references are expanded.
    pub is_ref: bool,
    pub filter: Option<SemanticNode>,
    pub order_by: Vec<OrderByClause>,
    pub top: Option<i64>,
    pub skip: Option<i64>,
    pub count: Option<bool>,
    pub levels: Option<LevelsToken>,
    pub search: Option<SearchToken>,
    pub select_expand: SelectExpandClause,
}

/// Bound `$select` and `$expand` of one level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectExpandClause {
    pub select: Vec<SelectItem>,
    pub expand: Vec<ExpandedItem>,
}

impl SelectExpandClause {
    /// No explicit selection means every structural property.
    #[must_use]
    pub fn all_selected(&self) -> bool {
        self.select.is_empty() || self.select.contains(&SelectItem::All)
    }
}

/// Kind of a bound resource path segment.
#[derive(Debug, Clone, PartialEq)]
pub enum ODataSegmentKind {
    EntitySet(String),
    Singleton(String),
    /// Key values by key property name, in declaration order.
    Key(Vec<NamedArgument>),
    Navigation(String),
    Property(String),
    OpenProperty(String),
    TypeCast(String),
    Operation {
        name: String,
        arguments: Vec<NamedArgument>,
    },
    Count,
    Value,
    Ref,
}

/// A bound resource path segment and the type it yields.
#[derive(Debug, Clone, PartialEq)]
pub struct ODataSegment {
    pub kind: ODataSegmentKind,
    pub type_ref: TypeRef,
}

/// Bound resource path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ODataPath {
    pub segments: Vec<ODataSegment>,
}

impl ODataPath {
    /// Type produced by the last segment.
    #[must_use]
    pub fn target_type(&self) -> Option<&TypeRef> {
        self.segments.last().map(|segment| &segment.type_ref)
    }

    /// Type of `$it` for query options applied to this path: the element
    /// type for collections.
    #[must_use]
    pub fn implicit_type(&self) -> Option<&TypeRef> {
        self.target_type()
            .map(|target| target.element_type().unwrap_or(target))
    }

    /// Name of the entity set or singleton the path starts from.
    #[must_use]
    pub fn navigation_source(&self) -> Option<&str> {
        self.segments.first().and_then(|segment| match &segment.kind {
            ODataSegmentKind::EntitySet(name) | ODataSegmentKind::Singleton(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Result of binding one syntactic tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticTree {
    Filter(SemanticNode),
    OrderBy(Vec<OrderByClause>),
    SelectExpand(SelectExpandClause),
    /// `$search` has no model references and passes through unchanged.
    Search(SearchToken),
    Path(ODataPath),
}
