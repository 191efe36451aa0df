//! Lexer for URI query text.
//!
//! The pest grammar in `query.pest` decides token boundaries; [`Lexer`]
//! walks the resulting pairs lazily and yields [`Token`]s, finishing with a
//! single [`TokenKind::End`]. Lexing the same text twice yields the same
//! stream, and a `Lexer` can be cloned to restart from its current point.

mod token;

use pest::error::InputLocation;
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

use crate::error::LexError;

pub use token::{Span, Token, TokenKind};

#[derive(Parser)]
#[grammar = "lexer/query.pest"]
struct QueryLexer;

/// Lazy token iterator over one query text.
#[derive(Clone, Debug)]
pub struct Lexer<'i> {
    pairs: Pairs<'i, Rule>,
    end: usize,
    finished: bool,
}

impl<'i> Lexer<'i> {
    /// Scans `text`.
    ///
    /// # Errors
    ///
    /// Returns a `LexError` at the first character that starts no token,
    /// or at the opening quote of an unterminated literal.
    pub fn new(text: &'i str) -> Result<Self, LexError> {
        let mut pairs =
            QueryLexer::parse(Rule::query_text, text).map_err(|err| lex_error(text, &err))?;
        let inner = pairs
            .next()
            .map(Pair::into_inner)
            .ok_or_else(|| LexError {
                position: 0,
                unexpected_char: text.chars().next(),
                unterminated: false,
            })?;
        Ok(Lexer {
            pairs: inner,
            end: text.len(),
            finished: false,
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        match self.pairs.next() {
            Some(pair) => {
                let span = Span::new(pair.as_span().start(), pair.as_span().end());
                let kind = token_kind(pair);
                if kind == TokenKind::End {
                    self.finished = true;
                }
                Some(Token::new(kind, span))
            }
            None => {
                self.finished = true;
                Some(Token::new(TokenKind::End, Span::point(self.end)))
            }
        }
    }
}

/// Tokenizes `text` eagerly. The last token is always [`TokenKind::End`].
///
/// # Errors
///
/// Returns a `LexError` if the text contains a character that starts no
/// token or an unterminated quoted literal.
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexError> {
    let tokens: Vec<Token> = Lexer::new(text)?.collect();
    tracing::trace!(count = tokens.len(), "tokenized query text");
    Ok(tokens)
}

fn token_kind(pair: Pair<'_, Rule>) -> TokenKind {
    let text = pair.as_str();
    match pair.as_rule() {
        Rule::quoted_literal => {
            let mut prefix = String::new();
            let mut body = String::new();
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::literal_prefix => prefix = inner.as_str().to_string(),
                    Rule::string_body => body = inner.as_str().replace("''", "'"),
                    _ => {}
                }
            }
            TokenKind::QuotedLiteral { prefix, body }
        }
        Rule::string_literal => TokenKind::StringLiteral(inner_text(pair).replace("''", "'")),
        Rule::phrase => TokenKind::Phrase(
            inner_text(pair)
                .replace("\\\"", "\"")
                .replace("\\\\", "\\"),
        ),
        Rule::date_time_offset => TokenKind::DateTimeOffset(text.to_string()),
        Rule::guid => TokenKind::Guid(text.to_string()),
        Rule::date => TokenKind::Date(text.to_string()),
        Rule::time_of_day => TokenKind::TimeOfDay(text.to_string()),
        Rule::number => TokenKind::Number(text.to_string()),
        Rule::identifier => TokenKind::Identifier(text.to_string()),
        Rule::open_paren => TokenKind::OpenParen,
        Rule::close_paren => TokenKind::CloseParen,
        Rule::comma => TokenKind::Comma,
        Rule::semicolon => TokenKind::Semicolon,
        Rule::slash => TokenKind::Slash,
        Rule::at => TokenKind::At,
        Rule::star => TokenKind::Star,
        Rule::equals => TokenKind::Equals,
        Rule::colon => TokenKind::Colon,
        Rule::minus => TokenKind::Minus,
        _ => TokenKind::End,
    }
}

fn inner_text(pair: Pair<'_, Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|inner| inner.as_str().to_string())
        .unwrap_or_default()
}

fn lex_error(text: &str, err: &pest::error::Error<Rule>) -> LexError {
    let position = match err.location {
        InputLocation::Pos(pos) | InputLocation::Span((pos, _)) => pos,
    };
    let rest = text.get(position..).unwrap_or_default();
    // A failed `prefix'...` attempt is reported at the prefix, not the quote.
    let after_prefix =
        rest.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_' || c == '.');
    let unterminated = after_prefix.starts_with('\'') || rest.starts_with('"');
    LexError {
        position,
        unexpected_char: rest.chars().next(),
        unterminated,
    }
}
