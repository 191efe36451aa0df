//! Resource path rule: `/Customers('A')/Orders(1)/Items/$count`.

use crate::error::{Result, SyntaxError};
use crate::lexer::TokenKind;

use super::ast::{NamedValue, PathSegment};
use super::Parser;

/// Reserved segments allowed at the end of a resource path.
const SYSTEM_SEGMENTS: [&str; 3] = ["$count", "$value", "$ref"];

impl Parser<'_> {
    /// path := ['/'] segment ('/' segment)*
    /// segment := identifier ['(' [named (',' named)*] ')'] | '$count' | '$value' | '$ref'
    pub(crate) fn parse_resource_path(&mut self) -> Result<PathSegment> {
        self.stream.match_token(&TokenKind::Slash);
        self.chained(|p| {
            let head = p.parse_path_segment()?;
            let mut rest = Vec::new();
            let mut last_is_system = matches!(head, PathSegment::System { .. });
            // $count, $value and $ref close the path; a trailing slash is tolerated.
            while !last_is_system && p.stream.match_token(&TokenKind::Slash) && !p.stream.is_end() {
                p.deepen()?;
                let segment = p.parse_path_segment()?;
                last_is_system = matches!(segment, PathSegment::System { .. });
                rest.push(segment);
            }
            Ok(link(head, rest))
        })
    }

    fn parse_path_segment(&mut self) -> Result<PathSegment> {
        let (identifier, span) = self.stream.expect_identifier("path segment")?;
        if identifier.starts_with('$') {
            return if SYSTEM_SEGMENTS.contains(&identifier.as_str()) {
                Ok(PathSegment::System { identifier })
            } else {
                Err(SyntaxError::unexpected(span.start, "'$count', '$value' or '$ref'", identifier).into())
            };
        }
        let named_values = if self.stream.match_token(&TokenKind::OpenParen) {
            self.nested(Self::parse_named_values)?
        } else {
            Vec::new()
        };
        Ok(PathSegment::NonSystem {
            identifier,
            named_values,
            next: None,
        })
    }

    /// Key predicates and function arguments, after the opening paren.
    fn parse_named_values(&mut self) -> Result<Vec<NamedValue>> {
        let mut values = Vec::new();
        if self.stream.match_token(&TokenKind::CloseParen) {
            return Ok(values);
        }
        loop {
            let named = self.stream.peek().kind.as_identifier().is_some()
                && self.stream.peek_n(1).kind == TokenKind::Equals;
            let name = if named {
                let (name, _) = self.stream.expect_identifier("parameter name")?;
                self.stream.consume();
                Some(name)
            } else {
                None
            };
            let value = self.parse_expression()?;
            values.push(NamedValue { name, value });
            if !self.stream.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.stream.expect(&TokenKind::CloseParen, "',' or ')'")?;
        Ok(values)
    }
}

/// Threads `head` and the following segments into a linked path.
fn link(head: PathSegment, rest: Vec<PathSegment>) -> PathSegment {
    let tail = rest.into_iter().rev().fold(None, |next, segment| Some(attach(segment, next)));
    attach(head, tail)
}

fn attach(segment: PathSegment, next: Option<PathSegment>) -> PathSegment {
    match segment {
        PathSegment::NonSystem {
            identifier,
            named_values,
            ..
        } => PathSegment::NonSystem {
            identifier,
            named_values,
            next: next.map(Box::new),
        },
        system @ PathSegment::System { .. } => system,
    }
}

#[cfg(test)]
mod tests {
    use crate::error::SyntaxErrorKind;
    use crate::parser::{parse_text, QueryToken, StartRule, SyntacticTree};
    use crate::types::LiteralValue;
    use crate::ParserConfig;

    use super::*;

    fn path(text: &str) -> PathSegment {
        match parse_text(text, StartRule::ResourcePath, &ParserConfig::default()).unwrap() {
            SyntacticTree::ResourcePath(segment) => segment,
            other => panic!("expected path, got {other:?}"),
        }
    }

    #[test]
    fn test_entity_set_with_key_and_navigation() {
        let segment = path("/Customers('ALFKI')/Orders");
        let ids: Vec<&str> = segment.iter().map(PathSegment::identifier).collect();
        assert_eq!(ids, ["Customers", "Orders"]);
        let PathSegment::NonSystem { named_values, .. } = &segment else {
            panic!("expected member segment");
        };
        assert_eq!(named_values.len(), 1);
        assert!(named_values[0].name.is_none());
        assert!(matches!(
            &named_values[0].value,
            QueryToken::Literal(lit) if lit.value == LiteralValue::String("ALFKI".into())
        ));
    }

    #[test]
    fn test_composite_key() {
        let segment = path("OrderLines(OrderId=1,Line=2)");
        let PathSegment::NonSystem { named_values, .. } = &segment else {
            panic!("expected member segment");
        };
        let names: Vec<_> = named_values.iter().map(|nv| nv.name.as_deref()).collect();
        assert_eq!(names, [Some("OrderId"), Some("Line")]);
    }

    #[test]
    fn test_system_segment_ends_path() {
        let segment = path("Customers/$count");
        assert_eq!(segment.last().identifier(), "$count");
        let err = parse_text("Customers/$count/Name", StartRule::ResourcePath, &ParserConfig::default())
            .unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::UnexpectedToken));
    }

    #[test]
    fn test_unknown_system_segment() {
        let err = parse_text("Customers/$batch", StartRule::ResourcePath, &ParserConfig::default())
            .unwrap_err();
        assert_eq!(err.as_syntax().unwrap().position, 10);
    }

    #[test]
    fn test_function_call_with_alias() {
        let segment = path("Customers/Sales.TopOrders(count=@n)");
        let last = segment.last();
        assert!(last.is_qualified());
        assert_eq!(segment.to_string(), "Customers/Sales.TopOrders(count=@n)");
    }

    #[test]
    fn test_empty_parens_and_trailing_slash() {
        assert_eq!(path("Sales.Latest()/").identifier(), "Sales.Latest");
    }

    #[test]
    fn test_unclosed_key() {
        let err = parse_text("Customers(1", StartRule::ResourcePath, &ParserConfig::default())
            .unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::UnexpectedEndOfInput));
    }
}
