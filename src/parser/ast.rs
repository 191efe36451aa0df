//! Syntactic tree definitions for URI query text.
//!
//! Nodes describe the shape of the text only; nothing here is resolved
//! against a model. Every node owns its children. `Display` renders a node
//! back to URI text, parenthesizing only where precedence requires it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::LiteralValue;

/// Binary operators, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperatorKind {
    Or,
    And,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Has,
    Add,
    Sub,
    Mul,
    Div,
    DivBy,
    Mod,
}

impl BinaryOperatorKind {
    /// Parses an operator keyword such as `eq`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "or" => Some(BinaryOperatorKind::Or),
            "and" => Some(BinaryOperatorKind::And),
            "eq" => Some(BinaryOperatorKind::Eq),
            "ne" => Some(BinaryOperatorKind::Ne),
            "gt" => Some(BinaryOperatorKind::Gt),
            "ge" => Some(BinaryOperatorKind::Ge),
            "lt" => Some(BinaryOperatorKind::Lt),
            "le" => Some(BinaryOperatorKind::Le),
            "has" => Some(BinaryOperatorKind::Has),
            "add" => Some(BinaryOperatorKind::Add),
            "sub" => Some(BinaryOperatorKind::Sub),
            "mul" => Some(BinaryOperatorKind::Mul),
            "div" => Some(BinaryOperatorKind::Div),
            "divby" => Some(BinaryOperatorKind::DivBy),
            "mod" => Some(BinaryOperatorKind::Mod),
            _ => None,
        }
    }

    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            BinaryOperatorKind::Or => "or",
            BinaryOperatorKind::And => "and",
            BinaryOperatorKind::Eq => "eq",
            BinaryOperatorKind::Ne => "ne",
            BinaryOperatorKind::Gt => "gt",
            BinaryOperatorKind::Ge => "ge",
            BinaryOperatorKind::Lt => "lt",
            BinaryOperatorKind::Le => "le",
            BinaryOperatorKind::Has => "has",
            BinaryOperatorKind::Add => "add",
            BinaryOperatorKind::Sub => "sub",
            BinaryOperatorKind::Mul => "mul",
            BinaryOperatorKind::Div => "div",
            BinaryOperatorKind::DivBy => "divby",
            BinaryOperatorKind::Mod => "mod",
        }
    }

    /// Binding strength: or=1, and=2, comparison=3, additive=4, multiplicative=5.
    #[must_use]
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperatorKind::Or => 1,
            BinaryOperatorKind::And => 2,
            BinaryOperatorKind::Eq
            | BinaryOperatorKind::Ne
            | BinaryOperatorKind::Gt
            | BinaryOperatorKind::Ge
            | BinaryOperatorKind::Lt
            | BinaryOperatorKind::Le
            | BinaryOperatorKind::Has => 3,
            BinaryOperatorKind::Add | BinaryOperatorKind::Sub => 4,
            BinaryOperatorKind::Mul
            | BinaryOperatorKind::Div
            | BinaryOperatorKind::DivBy
            | BinaryOperatorKind::Mod => 5,
        }
    }

    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperatorKind::Or | BinaryOperatorKind::And)
    }

    #[must_use]
    pub fn is_comparison(self) -> bool {
        self.precedence() == 3 && self != BinaryOperatorKind::Has
    }

    #[must_use]
    pub fn is_arithmetic(self) -> bool {
        self.precedence() >= 4
    }
}

impl fmt::Display for BinaryOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperatorKind {
    Not,
    Negate,
}

impl fmt::Display for UnaryOperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperatorKind::Not => f.write_str("not "),
            UnaryOperatorKind::Negate => f.write_str("-"),
        }
    }
}

/// Precedence of unary operators and primaries, above every binary operator.
const UNARY_PRECEDENCE: u8 = 6;

/// A literal as written, plus its lexical classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LiteralToken {
    pub value: LiteralValue,
    /// Exact source text. Kept verbatim, never re-derived from `value`.
    pub original_text: Option<String>,
}

impl LiteralToken {
    #[must_use]
    pub fn new(value: LiteralValue, original_text: impl Into<String>) -> Self {
        LiteralToken {
            value,
            original_text: Some(original_text.into()),
        }
    }
}

impl fmt::Display for LiteralToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.original_text {
            Some(text) => f.write_str(text),
            None => self.value.fmt(f),
        }
    }
}

/// A node of a filter or orderby expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryToken {
    Literal(LiteralToken),
    /// `@name`
    ParameterAlias(String),
    UnaryOperator {
        op: UnaryOperatorKind,
        operand: Box<QueryToken>,
    },
    BinaryOperator {
        op: BinaryOperatorKind,
        left: Box<QueryToken>,
        right: Box<QueryToken>,
    },
    /// `operand in (item, ...)`
    In {
        operand: Box<QueryToken>,
        items: Vec<QueryToken>,
    },
    FunctionCall(FunctionCallToken),
    /// A member name, optionally reached through `parent/`.
    PropertyAccess {
        identifier: String,
        parent: Option<Box<QueryToken>>,
    },
    /// A `$`-prefixed path segment such as `$count`.
    SystemSegment {
        identifier: String,
        parent: Option<Box<QueryToken>>,
    },
    /// A lambda parameter or `$it`.
    RangeVariable(String),
    Lambda(LambdaToken),
    Star,
}

impl QueryToken {
    #[must_use]
    pub fn literal(value: LiteralValue, original_text: impl Into<String>) -> Self {
        QueryToken::Literal(LiteralToken::new(value, original_text))
    }

    #[must_use]
    pub fn binary(op: BinaryOperatorKind, left: QueryToken, right: QueryToken) -> Self {
        QueryToken::BinaryOperator {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn unary(op: UnaryOperatorKind, operand: QueryToken) -> Self {
        QueryToken::UnaryOperator {
            op,
            operand: Box::new(operand),
        }
    }

    #[must_use]
    pub fn property(identifier: impl Into<String>, parent: Option<QueryToken>) -> Self {
        QueryToken::PropertyAccess {
            identifier: identifier.into(),
            parent: parent.map(Box::new),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            QueryToken::BinaryOperator { op, .. } => op.precedence(),
            QueryToken::In { .. } => 3,
            _ => UNARY_PRECEDENCE,
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, token: &QueryToken, parenthesize: bool) -> fmt::Result {
    if parenthesize {
        write!(f, "({token})")
    } else {
        write!(f, "{token}")
    }
}

fn write_parent(f: &mut fmt::Formatter<'_>, parent: Option<&QueryToken>) -> fmt::Result {
    match parent {
        Some(parent) => write!(f, "{parent}/"),
        None => Ok(()),
    }
}

impl fmt::Display for QueryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryToken::Literal(literal) => literal.fmt(f),
            QueryToken::ParameterAlias(name) => write!(f, "@{name}"),
            QueryToken::UnaryOperator { op, operand } => {
                write!(f, "{op}")?;
                write_operand(f, operand, operand.precedence() < UNARY_PRECEDENCE)
            }
            QueryToken::BinaryOperator { op, left, right } => {
                // Left associative: equal precedence only needs parens on the right.
                write_operand(f, left, left.precedence() < op.precedence())?;
                write!(f, " {op} ")?;
                write_operand(f, right, right.precedence() <= op.precedence())
            }
            QueryToken::In { operand, items } => {
                write_operand(f, operand, operand.precedence() <= 3)?;
                f.write_str(" in (")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            QueryToken::FunctionCall(call) => call.fmt(f),
            QueryToken::PropertyAccess { identifier, parent }
            | QueryToken::SystemSegment { identifier, parent } => {
                write_parent(f, parent.as_deref())?;
                f.write_str(identifier)
            }
            QueryToken::RangeVariable(name) => f.write_str(name),
            QueryToken::Lambda(lambda) => lambda.fmt(f),
            QueryToken::Star => f.write_str("*"),
        }
    }
}

/// A function parameter; `name` is set for `name=value` arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionParameterToken {
    pub name: Option<String>,
    pub value: QueryToken,
}

/// A function call; `source` is the preceding path for bound calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionCallToken {
    pub name: String,
    /// In source order.
    pub parameters: Vec<FunctionParameterToken>,
    pub source: Option<Box<QueryToken>>,
}

impl fmt::Display for FunctionCallToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_parent(f, self.source.as_deref())?;
        write!(f, "{}(", self.name)?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if let Some(name) = &parameter.name {
                write!(f, "{name}=")?;
            }
            write!(f, "{}", parameter.value)?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LambdaKind {
    Any,
    All,
}

impl fmt::Display for LambdaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LambdaKind::Any => f.write_str("any"),
            LambdaKind::All => f.write_str("all"),
        }
    }
}

/// `source/any(parameter: predicate)`. `any()` has no parameter or predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LambdaToken {
    pub kind: LambdaKind,
    pub parameter: Option<String>,
    pub predicate: Option<Box<QueryToken>>,
    pub source: Box<QueryToken>,
}

impl fmt::Display for LambdaToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_parent(f, Some(&self.source))?;
        match (&self.parameter, &self.predicate) {
            (Some(parameter), Some(predicate)) => {
                write!(f, "{}({parameter}:{predicate})", self.kind)
            }
            _ => write!(f, "{}()", self.kind),
        }
    }
}

/// `name=value` or a bare positional value inside a path segment's parentheses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedValue {
    pub name: Option<String>,
    pub value: QueryToken,
}

/// One segment of a navigation or resource path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Reserved segments such as `$ref`, `$count`, `$value`.
    System { identifier: String },
    NonSystem {
        identifier: String,
        named_values: Vec<NamedValue>,
        next: Option<Box<PathSegment>>,
    },
}

impl PathSegment {
    /// A plain member segment without key values.
    #[must_use]
    pub fn member(identifier: impl Into<String>, next: Option<PathSegment>) -> Self {
        PathSegment::NonSystem {
            identifier: identifier.into(),
            named_values: Vec::new(),
            next: next.map(Box::new),
        }
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            PathSegment::System { identifier } | PathSegment::NonSystem { identifier, .. } => {
                identifier
            }
        }
    }

    #[must_use]
    pub fn next(&self) -> Option<&PathSegment> {
        match self {
            PathSegment::System { .. } => None,
            PathSegment::NonSystem { next, .. } => next.as_deref(),
        }
    }

    /// Namespace- or container-qualified: the identifier contains a `.`.
    #[must_use]
    pub fn is_qualified(&self) -> bool {
        matches!(self, PathSegment::NonSystem { identifier, .. } if identifier.contains('.'))
    }

    /// Iterates this segment and every following one.
    pub fn iter(&self) -> impl Iterator<Item = &PathSegment> {
        std::iter::successors(Some(self), |segment| segment.next())
    }

    #[must_use]
    pub fn last(&self) -> &PathSegment {
        self.iter().last().unwrap_or(self)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::System { identifier } => f.write_str(identifier),
            PathSegment::NonSystem {
                identifier,
                named_values,
                next,
            } => {
                f.write_str(identifier)?;
                if !named_values.is_empty() {
                    f.write_str("(")?;
                    for (i, nv) in named_values.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        if let Some(name) = &nv.name {
                            write!(f, "{name}=")?;
                        }
                        write!(f, "{}", nv.value)?;
                    }
                    f.write_str(")")?;
                }
                if let Some(next) = next {
                    write!(f, "/{next}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderDirection {
    #[default]
    Ascending,
    Descending,
}

/// One `$orderby` item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderByToken {
    pub expression: QueryToken,
    pub direction: OrderDirection,
}

impl fmt::Display for OrderByToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            OrderDirection::Ascending => write!(f, "{}", self.expression),
            OrderDirection::Descending => write!(f, "{} desc", self.expression),
        }
    }
}

/// One `$select` item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectItemToken {
    Star,
    /// `Namespace.*`: every operation in the namespace.
    NamespaceWildcard(String),
    Path(PathSegment),
}

impl fmt::Display for SelectItemToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectItemToken::Star => f.write_str("*"),
            SelectItemToken::NamespaceWildcard(namespace) => write!(f, "{namespace}.*"),
            SelectItemToken::Path(path) => path.fmt(f),
        }
    }
}

/// `$levels` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LevelsToken {
    Finite(u32),
    Max,
}

/// `$search` expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SearchToken {
    Term(String),
    Phrase(String),
    Not(Box<SearchToken>),
    And(Box<SearchToken>, Box<SearchToken>),
    Or(Box<SearchToken>, Box<SearchToken>),
}

impl SearchToken {
    fn precedence(&self) -> u8 {
        match self {
            SearchToken::Or(..) => 1,
            SearchToken::And(..) => 2,
            _ => 3,
        }
    }

    fn write_child(&self, f: &mut fmt::Formatter<'_>, child: &SearchToken, right: bool) -> fmt::Result {
        let parenthesize = if right {
            child.precedence() <= self.precedence()
        } else {
            child.precedence() < self.precedence()
        };
        if parenthesize {
            write!(f, "({child})")
        } else {
            write!(f, "{child}")
        }
    }
}

impl fmt::Display for SearchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchToken::Term(term) => f.write_str(term),
            SearchToken::Phrase(phrase) => {
                write!(f, "\"{}\"", phrase.replace('\\', "\\\\").replace('"', "\\\""))
            }
            SearchToken::Not(inner) => {
                f.write_str("NOT ")?;
                self.write_child(f, inner, true)
            }
            SearchToken::And(left, right) => {
                self.write_child(f, left, false)?;
                f.write_str(" AND ")?;
                self.write_child(f, right, true)
            }
            SearchToken::Or(left, right) => {
                self.write_child(f, left, false)?;
                f.write_str(" OR ")?;
                self.write_child(f, right, true)
            }
        }
    }
}

/// One `$expand` item with its nested options; a small sub-query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandTermToken {
    /// Navigation path; may end with the `$ref` system segment. `*` is a
    /// `NonSystem` segment named `*`.
    pub path: PathSegment,
    pub filter: Option<QueryToken>,
    pub order_by: Vec<OrderByToken>,
    pub top: Option<i64>,
    pub skip: Option<i64>,
    pub count: Option<bool>,
    pub levels: Option<LevelsToken>,
    pub search: Option<SearchToken>,
    pub select: Option<Vec<SelectItemToken>>,
    pub expand: Option<ExpandToken>,
}

impl ExpandTermToken {
    /// A term with no nested options.
    #[must_use]
    pub fn new(path: PathSegment) -> Self {
        ExpandTermToken {
            path,
            filter: None,
            order_by: Vec::new(),
            top: None,
            skip: None,
            count: None,
            levels: None,
            search: None,
            select: None,
            expand: None,
        }
    }

    #[must_use]
    pub fn has_options(&self) -> bool {
        self.filter.is_some()
            || !self.order_by.is_empty()
            || self.top.is_some()
            || self.skip.is_some()
            || self.count.is_some()
            || self.levels.is_some()
            || self.search.is_some()
            || self.select.is_some()
            || self.expand.is_some()
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for ExpandTermToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        if !self.has_options() {
            return Ok(());
        }
        let mut options: Vec<String> = Vec::new();
        if let Some(filter) = &self.filter {
            options.push(format!("$filter={filter}"));
        }
        if !self.order_by.is_empty() {
            let items: Vec<String> = self.order_by.iter().map(ToString::to_string).collect();
            options.push(format!("$orderby={}", items.join(",")));
        }
        if let Some(top) = self.top {
            options.push(format!("$top={top}"));
        }
        if let Some(skip) = self.skip {
            options.push(format!("$skip={skip}"));
        }
        if let Some(count) = self.count {
            options.push(format!("$count={count}"));
        }
        match self.levels {
            Some(LevelsToken::Finite(n)) => options.push(format!("$levels={n}")),
            Some(LevelsToken::Max) => options.push("$levels=max".to_string()),
            None => {}
        }
        if let Some(search) = &self.search {
            options.push(format!("$search={search}"));
        }
        if let Some(select) = &self.select {
            let items: Vec<String> = select.iter().map(ToString::to_string).collect();
            options.push(format!("$select={}", items.join(",")));
        }
        if let Some(expand) = &self.expand {
            options.push(format!("$expand={expand}"));
        }
        write!(f, "({})", options.join(";"))
    }
}

/// A `$expand` option value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ExpandToken {
    pub terms: Vec<ExpandTermToken>,
}

impl fmt::Display for ExpandToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, &self.terms)
    }
}

/// A query option the grammar does not interpret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomQueryOption {
    pub name: String,
    pub value: Option<String>,
}

/// Production to start parsing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartRule {
    Filter,
    OrderBy,
    Select,
    Expand,
    Search,
    /// A resource path such as `Customers(1)/Orders`.
    ResourcePath,
}

/// Result of parsing one start rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyntacticTree {
    Filter(QueryToken),
    OrderBy(Vec<OrderByToken>),
    Select(Vec<SelectItemToken>),
    Expand(ExpandToken),
    Search(SearchToken),
    ResourcePath(PathSegment),
}

impl fmt::Display for SyntacticTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntacticTree::Filter(token) => token.fmt(f),
            SyntacticTree::OrderBy(items) => write_list(f, items),
            SyntacticTree::Select(items) => write_list(f, items),
            SyntacticTree::Expand(expand) => expand.fmt(f),
            SyntacticTree::Search(search) => search.fmt(f),
            SyntacticTree::ResourcePath(path) => path.fmt(f),
        }
    }
}

/// Every option of a parsed query string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryOptionsToken {
    pub filter: Option<QueryToken>,
    pub order_by: Option<Vec<OrderByToken>>,
    pub select: Option<Vec<SelectItemToken>>,
    pub expand: Option<ExpandToken>,
    pub top: Option<i64>,
    pub skip: Option<i64>,
    pub count: Option<bool>,
    pub search: Option<SearchToken>,
    pub skip_token: Option<String>,
    pub delta_token: Option<String>,
    pub format: Option<String>,
    /// `@name=value` declarations, value kept as raw text.
    pub aliases: Vec<(String, String)>,
    pub custom: Vec<CustomQueryOption>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(name: &str) -> QueryToken {
        QueryToken::property(name, None)
    }

    fn int(n: i32) -> QueryToken {
        QueryToken::literal(LiteralValue::Number(n.to_string()), n.to_string())
    }

    #[test]
    fn test_operator_keywords_round_trip() {
        for kw in ["or", "and", "eq", "ne", "gt", "ge", "lt", "le", "has", "add", "sub", "mul", "div", "divby", "mod"] {
            assert_eq!(BinaryOperatorKind::parse(kw).map(BinaryOperatorKind::keyword), Some(kw));
        }
        assert!(BinaryOperatorKind::parse("EQ").is_none());
    }

    #[test]
    fn test_display_minimal_parentheses() {
        let and = QueryToken::binary(
            BinaryOperatorKind::And,
            QueryToken::binary(BinaryOperatorKind::Eq, prop("B"), int(2)),
            QueryToken::binary(BinaryOperatorKind::Eq, prop("C"), int(3)),
        );
        let or = QueryToken::binary(
            BinaryOperatorKind::Or,
            QueryToken::binary(BinaryOperatorKind::Eq, prop("A"), int(1)),
            and.clone(),
        );
        assert_eq!(or.to_string(), "A eq 1 or B eq 2 and C eq 3");

        let grouped = QueryToken::binary(
            BinaryOperatorKind::And,
            QueryToken::binary(
                BinaryOperatorKind::Or,
                prop("A"),
                prop("B"),
            ),
            prop("C"),
        );
        assert_eq!(grouped.to_string(), "(A or B) and C");

        let right_nested = QueryToken::binary(
            BinaryOperatorKind::Sub,
            prop("A"),
            QueryToken::binary(BinaryOperatorKind::Sub, prop("B"), prop("C")),
        );
        assert_eq!(right_nested.to_string(), "A sub (B sub C)");
    }

    #[test]
    fn test_path_segment_helpers() {
        let path = PathSegment::member(
            "NS.VipCustomer",
            Some(PathSegment::member("Orders", None)),
        );
        assert!(path.is_qualified());
        assert_eq!(path.iter().count(), 2);
        assert_eq!(path.last().identifier(), "Orders");
        assert_eq!(path.to_string(), "NS.VipCustomer/Orders");
    }

    #[test]
    fn test_expand_term_display() {
        let mut term = ExpandTermToken::new(PathSegment::member("Orders", None));
        term.top = Some(2);
        term.filter = Some(QueryToken::binary(BinaryOperatorKind::Gt, prop("Amount"), int(5)));
        assert_eq!(term.to_string(), "Orders($filter=Amount gt 5;$top=2)");
    }

    #[test]
    fn test_search_display() {
        let search = SearchToken::And(
            Box::new(SearchToken::Or(
                Box::new(SearchToken::Term("blue".into())),
                Box::new(SearchToken::Term("green".into())),
            )),
            Box::new(SearchToken::Not(Box::new(SearchToken::Phrase("dark red".into())))),
        );
        assert_eq!(search.to_string(), "(blue OR green) AND NOT \"dark red\"");
    }
}
