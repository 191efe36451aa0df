//! Error types for query parsing and binding.
//!
//! Syntax errors (lexer and parser) and binding errors (semantic binder) are
//! kept in disjoint taxonomies so callers can report them differently.

use std::fmt;

use thiserror::Error;

/// Result type alias using [`QueryError`].
pub type Result<T> = std::result::Result<T, QueryError>;

/// Top-level error for every public entry point of the crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// The query text does not follow the grammar.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The query text is well formed but does not bind against the model.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// Metadata catalog construction failed (duplicate names, dangling types).
    #[error("Schema error: {0}")]
    Schema(String),

    /// A parameter alias had no value, or its value did not convert.
    #[error("Alias error: parameter alias '@{name}': {message}")]
    Alias { name: String, message: String },
}

impl QueryError {
    /// Returns the syntax error, if this is one.
    #[must_use]
    pub fn as_syntax(&self) -> Option<&SyntaxError> {
        match self {
            QueryError::Syntax(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the binding error, if this is one.
    #[must_use]
    pub fn as_binding(&self) -> Option<&BindingError> {
        match self {
            QueryError::Binding(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the binding error kind, if this is a binding error.
    #[must_use]
    pub fn binding_kind(&self) -> Option<BindingErrorKind> {
        self.as_binding().map(|err| err.kind)
    }

    /// Returns the syntax error kind, if this is a syntax error.
    #[must_use]
    pub fn syntax_kind(&self) -> Option<SyntaxErrorKind> {
        self.as_syntax().map(|err| err.kind)
    }
}

// ==================== Syntax Errors ====================

/// Kinds of syntax errors raised by the lexer and parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxErrorKind {
    /// A token appeared where the grammar does not allow it.
    UnexpectedToken,
    /// A quoted literal was opened but never closed.
    UnterminatedLiteral,
    /// The input ended while a production was incomplete.
    UnexpectedEndOfInput,
    /// Nesting exceeded the configured parser depth.
    MaxNestingDepthExceeded,
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyntaxErrorKind::UnexpectedToken => "unexpected token",
            SyntaxErrorKind::UnterminatedLiteral => "unterminated literal",
            SyntaxErrorKind::UnexpectedEndOfInput => "unexpected end of input",
            SyntaxErrorKind::MaxNestingDepthExceeded => "maximum nesting depth exceeded",
        };
        f.write_str(name)
    }
}

/// Syntax error with location information.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Syntax error at position {position}: {kind}{}", describe(.expected, .found))]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    /// Byte offset into the text that was being parsed.
    pub position: usize,
    /// What the grammar expected at `position`.
    pub expected: Option<String>,
    /// The text actually found at `position`.
    pub found: Option<String>,
}

fn describe(expected: &Option<String>, found: &Option<String>) -> String {
    match (expected, found) {
        (Some(e), Some(f)) => format!(" (expected {e}, found '{f}')"),
        (Some(e), None) => format!(" (expected {e})"),
        (None, Some(f)) => format!(" (found '{f}')"),
        (None, None) => String::new(),
    }
}

impl SyntaxError {
    /// Creates a syntax error of the given kind at `position`.
    #[must_use]
    pub fn new(kind: SyntaxErrorKind, position: usize) -> Self {
        SyntaxError {
            kind,
            position,
            expected: None,
            found: None,
        }
    }

    /// An unexpected token error.
    #[must_use]
    pub fn unexpected(position: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        SyntaxError {
            kind: SyntaxErrorKind::UnexpectedToken,
            position,
            expected: Some(expected.into()),
            found: Some(found.into()),
        }
    }

    /// An end-of-input error.
    #[must_use]
    pub fn end_of_input(position: usize, expected: impl Into<String>) -> Self {
        SyntaxError {
            kind: SyntaxErrorKind::UnexpectedEndOfInput,
            position,
            expected: Some(expected.into()),
            found: None,
        }
    }

    /// Sets the expected description.
    #[must_use]
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Shifts the position by `offset`, for errors raised on a sub-string.
    #[must_use]
    pub fn offset_by(mut self, offset: usize) -> Self {
        self.position += offset;
        self
    }
}

/// Lexer failure: the character at `position` starts no token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Lex error at position {position}: unexpected character {unexpected_char:?}")]
pub struct LexError {
    pub position: usize,
    /// `None` when the input ended inside a token.
    pub unexpected_char: Option<char>,
    pub unterminated: bool,
}

impl From<LexError> for SyntaxError {
    fn from(err: LexError) -> Self {
        let kind = if err.unterminated {
            SyntaxErrorKind::UnterminatedLiteral
        } else if err.unexpected_char.is_none() {
            SyntaxErrorKind::UnexpectedEndOfInput
        } else {
            SyntaxErrorKind::UnexpectedToken
        };
        SyntaxError {
            kind,
            position: err.position,
            expected: None,
            found: err.unexpected_char.map(String::from),
        }
    }
}

impl From<LexError> for QueryError {
    fn from(err: LexError) -> Self {
        QueryError::Syntax(err.into())
    }
}

// ==================== Binding Errors ====================

/// Kinds of binding errors raised by the semantic binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingErrorKind {
    UnknownProperty,
    UnknownOperation,
    AmbiguousOperation,
    TypeMismatch,
    InvalidLiteral,
    LambdaOnNonCollection,
    InvalidExpandOption,
    UnboundAlias,
    MaxExpandDepthExceeded,
}

impl fmt::Display for BindingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingErrorKind::UnknownProperty => "unknown property",
            BindingErrorKind::UnknownOperation => "unknown operation",
            BindingErrorKind::AmbiguousOperation => "ambiguous operation",
            BindingErrorKind::TypeMismatch => "type mismatch",
            BindingErrorKind::InvalidLiteral => "invalid literal",
            BindingErrorKind::LambdaOnNonCollection => "lambda on non-collection",
            BindingErrorKind::InvalidExpandOption => "invalid expand option",
            BindingErrorKind::UnboundAlias => "unbound alias",
            BindingErrorKind::MaxExpandDepthExceeded => "maximum expand depth exceeded",
        };
        f.write_str(name)
    }
}

/// Binding error carrying the offending syntactic node, rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Bind error ({kind}) at '{token}': {message}")]
pub struct BindingError {
    pub kind: BindingErrorKind,
    pub token: String,
    pub message: String,
}

impl BindingError {
    /// Creates a binding error for `token`.
    #[must_use]
    pub fn new(kind: BindingErrorKind, token: impl fmt::Display, message: impl Into<String>) -> Self {
        BindingError {
            kind,
            token: token.to_string(),
            message: message.into(),
        }
    }
}
