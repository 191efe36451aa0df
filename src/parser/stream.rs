//! Token stream for parsing.
//!
//! Wraps the lexer output with lookahead, backtracking positions and
//! helpers that turn a mismatch into a [`SyntaxError`].

use crate::error::SyntaxError;
use crate::lexer::{Span, Token, TokenKind};

/// A stream of tokens for parsing. Always ends with [`TokenKind::End`].
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
    end: Token,
}

impl TokenStream {
    /// Creates a stream; an `End` token is appended if missing.
    #[must_use]
    pub fn new(mut tokens: Vec<Token>) -> Self {
        let end_offset = tokens.last().map_or(0, |t| t.span.end);
        if !tokens.last().is_some_and(Token::is_end) {
            tokens.push(Token::new(TokenKind::End, Span::point(end_offset)));
        }
        let end = tokens
            .last()
            .cloned()
            .unwrap_or_else(|| Token::new(TokenKind::End, Span::point(end_offset)));
        TokenStream { tokens, pos: 0, end }
    }

    /// Current position, for backtracking.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Restores a position taken with [`TokenStream::position`].
    pub fn restore(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[must_use]
    pub fn is_end(&self) -> bool {
        self.peek().is_end()
    }

    /// Peeks at the current token without consuming it.
    #[must_use]
    pub fn peek(&self) -> &Token {
        self.peek_n(0)
    }

    /// Peeks `n` tokens ahead (0 = current).
    #[must_use]
    pub fn peek_n(&self, n: usize) -> &Token {
        self.tokens.get(self.pos + n).unwrap_or(&self.end)
    }

    /// Consumes the current token and returns it. `End` is never consumed.
    pub fn consume(&mut self) -> Token {
        let token = self.peek().clone();
        if !token.is_end() {
            self.pos += 1;
        }
        token
    }

    #[must_use]
    pub fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    /// True if the current token is the identifier `keyword`.
    #[must_use]
    pub fn check_identifier(&self, keyword: &str) -> bool {
        self.peek().kind.as_identifier() == Some(keyword)
    }

    /// Consumes the current token if it is `kind`.
    pub fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.consume();
            true
        } else {
            false
        }
    }

    /// Consumes a token of `kind` or fails describing `expected`.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedToken`, or `UnexpectedEndOfInput` at the end.
    pub fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.consume())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Consumes an identifier and returns its text.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedToken`, or `UnexpectedEndOfInput` at the end.
    pub fn expect_identifier(&mut self, expected: &str) -> Result<(String, Span), SyntaxError> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let span = self.consume().span;
                Ok((name, span))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    /// Error for the current token not matching `expected`.
    #[must_use]
    pub fn unexpected(&self, expected: &str) -> SyntaxError {
        let token = self.peek();
        if token.is_end() {
            SyntaxError::end_of_input(token.span.start, expected)
        } else {
            SyntaxError::unexpected(token.span.start, expected, token.kind.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyntaxErrorKind;
    use crate::lexer::tokenize;

    #[test]
    fn test_peek_and_consume() {
        let mut stream = TokenStream::new(tokenize("a eq 1").unwrap());
        assert!(stream.check_identifier("a"));
        assert!(stream.peek_n(1).kind.as_identifier() == Some("eq"));
        stream.consume();
        stream.consume();
        assert_eq!(stream.consume().kind, TokenKind::Number("1".into()));
        assert!(stream.is_end());
        assert!(stream.consume().is_end());
        assert!(stream.is_end());
    }

    #[test]
    fn test_restore() {
        let mut stream = TokenStream::new(tokenize("a b").unwrap());
        let mark = stream.position();
        stream.consume();
        stream.restore(mark);
        assert!(stream.check_identifier("a"));
    }

    #[test]
    fn test_expect_reports_end_of_input() {
        let mut stream = TokenStream::new(tokenize("(").unwrap());
        stream.consume();
        let err = stream.expect(&TokenKind::CloseParen, "')'").unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnexpectedEndOfInput);
        assert_eq!(err.position, 1);
    }

    #[test]
    fn test_stream_without_end_token() {
        let stream = TokenStream::new(Vec::new());
        assert!(stream.is_end());
    }
}
