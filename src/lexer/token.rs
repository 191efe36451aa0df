//! Lexical tokens.

use std::fmt;

/// Byte range in the lexed text, `[start, end)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// An empty span at `offset`.
    #[must_use]
    pub const fn point(offset: usize) -> Self {
        Span {
            start: offset,
            end: offset,
        }
    }

    /// Returns the covered text, clamped to `source`.
    #[must_use]
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        let end = self.end.min(source.len());
        let start = self.start.min(end);
        &source[start..end]
    }
}

/// Token classification. Literal payloads hold the raw token text, except
/// strings and phrases, which hold their unescaped content.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier(String),
    /// `'...'` with `''` unescaped to `'`.
    StringLiteral(String),
    /// `prefix'...'`, e.g. `duration'P1D'` or `NS.Color'Red'`.
    QuotedLiteral { prefix: String, body: String },
    /// `"..."`, used by `$search`.
    Phrase(String),
    Number(String),
    Guid(String),
    Date(String),
    DateTimeOffset(String),
    TimeOfDay(String),
    OpenParen,
    CloseParen,
    Comma,
    Semicolon,
    Slash,
    At,
    Star,
    Equals,
    Colon,
    Minus,
    End,
}

impl TokenKind {
    /// Identifier text, if this is an identifier.
    #[must_use]
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            TokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(s)
            | TokenKind::Number(s)
            | TokenKind::Guid(s)
            | TokenKind::Date(s)
            | TokenKind::DateTimeOffset(s)
            | TokenKind::TimeOfDay(s) => f.write_str(s),
            TokenKind::StringLiteral(s) => write!(f, "'{}'", s.replace('\'', "''")),
            TokenKind::QuotedLiteral { prefix, body } => {
                write!(f, "{prefix}'{}'", body.replace('\'', "''"))
            }
            TokenKind::Phrase(s) => write!(f, "\"{s}\""),
            TokenKind::OpenParen => f.write_str("("),
            TokenKind::CloseParen => f.write_str(")"),
            TokenKind::Comma => f.write_str(","),
            TokenKind::Semicolon => f.write_str(";"),
            TokenKind::Slash => f.write_str("/"),
            TokenKind::At => f.write_str("@"),
            TokenKind::Star => f.write_str("*"),
            TokenKind::Equals => f.write_str("="),
            TokenKind::Colon => f.write_str(":"),
            TokenKind::Minus => f.write_str("-"),
            TokenKind::End => f.write_str("end of input"),
        }
    }
}

/// A token with its source span.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }

    #[must_use]
    pub fn is_end(&self) -> bool {
        self.kind == TokenKind::End
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}
