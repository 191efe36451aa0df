//! Syntactic stage: recursive-descent parser over lexer tokens.
//!
//! The parser builds a [`SyntacticTree`] for one start rule without
//! consulting any model. Keywords are recognized contextually from plain
//! identifiers. A [`ScopeStack`] of lambda parameters decides whether a bare
//! identifier is a range variable or a property.

pub mod ast;
mod expression;
mod options;
mod path;
mod stream;

use crate::error::{Result, SyntaxError, SyntaxErrorKind};
use crate::lexer::{tokenize, Token};
use crate::scope::{ScopeEntry, ScopeStack};
use crate::ParserConfig;

pub use ast::{
    BinaryOperatorKind, CustomQueryOption, ExpandTermToken, ExpandToken, FunctionCallToken,
    FunctionParameterToken, LambdaKind, LambdaToken, LevelsToken, LiteralToken, NamedValue,
    OrderByToken, OrderDirection, PathSegment, QueryOptionsToken, QueryToken, SearchToken,
    SelectItemToken, StartRule, SyntacticTree, UnaryOperatorKind,
};
pub use options::parse_query_options;
pub use stream::TokenStream;

/// Parses `tokens` from `start_rule`.
///
/// # Errors
///
/// Returns a `SyntaxError` if the tokens do not form the production, if
/// tokens remain after it, or if nesting exceeds the configured depth.
pub fn parse(tokens: Vec<Token>, start_rule: StartRule, config: &ParserConfig) -> Result<SyntacticTree> {
    tracing::debug!(?start_rule, tokens = tokens.len(), "parsing");
    let mut parser = Parser::new(tokens, config);
    let tree = parser.parse_start(start_rule)?;
    parser.expect_end()?;
    Ok(tree)
}

/// Tokenizes and parses `text` from `start_rule`.
///
/// # Errors
///
/// Returns a `SyntaxError` for lexical or grammatical problems.
pub fn parse_text(text: &str, start_rule: StartRule, config: &ParserConfig) -> Result<SyntacticTree> {
    let tokens = tokenize(text)?;
    parse(tokens, start_rule, config)
}

/// Recursive-descent parser state for one call.
pub(crate) struct Parser<'c> {
    stream: TokenStream,
    scope: ScopeStack,
    config: &'c ParserConfig,
    depth: usize,
}

impl<'c> Parser<'c> {
    pub(crate) fn new(tokens: Vec<Token>, config: &'c ParserConfig) -> Self {
        Parser {
            stream: TokenStream::new(tokens),
            scope: ScopeStack::with_implicit(None),
            config,
            depth: 0,
        }
    }

    fn parse_start(&mut self, start_rule: StartRule) -> Result<SyntacticTree> {
        let tree = match start_rule {
            StartRule::Filter => SyntacticTree::Filter(self.parse_expression()?),
            StartRule::OrderBy => SyntacticTree::OrderBy(self.parse_order_by()?),
            StartRule::Select => SyntacticTree::Select(self.parse_select()?),
            StartRule::Expand => SyntacticTree::Expand(self.parse_expand()?),
            StartRule::Search => SyntacticTree::Search(self.parse_search()?),
            StartRule::ResourcePath => SyntacticTree::ResourcePath(self.parse_resource_path()?),
        };
        Ok(tree)
    }

    pub(crate) fn expect_end(&self) -> Result<()> {
        if self.stream.is_end() {
            Ok(())
        } else {
            Err(self.stream.unexpected("end of input").into())
        }
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.chained(|p| {
            p.deepen()?;
            f(p)
        })
    }

    /// Runs `f`, which may call [`Parser::deepen`] once per link of a
    /// left-leaning chain (`a or b or c`, `A/B/C`), then releases those levels.
    fn chained<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let base = self.depth;
        let result = f(self);
        self.depth = base;
        result
    }

    /// Charges one nesting level against `max_nesting_depth`.
    fn deepen(&mut self) -> Result<()> {
        if self.depth >= self.config.max_nesting_depth {
            let position = self.stream.peek().span.start;
            return Err(SyntaxError::new(SyntaxErrorKind::MaxNestingDepthExceeded, position)
                .with_expected(format!("at most {} nested levels", self.config.max_nesting_depth))
                .into());
        }
        self.depth += 1;
        Ok(())
    }

    /// Runs `f` with `name` declared as a range variable. The scope is
    /// popped whether `f` succeeds or fails.
    fn scoped<T>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.scope.push(ScopeEntry::untyped(name));
        let result = f(self);
        self.scope.pop();
        result
    }

    /// Matches an identifier keyword, honouring case-insensitive builtins.
    fn is_keyword(&self, text: &str, keyword: &str) -> bool {
        if self.config.case_insensitive_builtins {
            text.eq_ignore_ascii_case(keyword)
        } else {
            text == keyword
        }
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        self.stream
            .peek()
            .kind
            .as_identifier()
            .is_some_and(|text| self.is_keyword(text, keyword))
    }
}
