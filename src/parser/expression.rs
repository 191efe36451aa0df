//! Expression rules: precedence climbing from `or` down to primaries,
//! member paths, function calls and lambdas.

use crate::error::{Result, SyntaxError};
use crate::lexer::TokenKind;
use crate::types::{LiteralValue, PrimitiveKind};

use super::ast::{
    BinaryOperatorKind, FunctionCallToken, FunctionParameterToken, LambdaKind, LambdaToken,
    QueryToken, UnaryOperatorKind,
};
use super::Parser;

const COMPARISON_OPERATORS: &[BinaryOperatorKind] = &[
    BinaryOperatorKind::Eq,
    BinaryOperatorKind::Ne,
    BinaryOperatorKind::Gt,
    BinaryOperatorKind::Ge,
    BinaryOperatorKind::Lt,
    BinaryOperatorKind::Le,
    BinaryOperatorKind::Has,
];
const ADDITIVE_OPERATORS: &[BinaryOperatorKind] = &[BinaryOperatorKind::Add, BinaryOperatorKind::Sub];
const MULTIPLICATIVE_OPERATORS: &[BinaryOperatorKind] = &[
    BinaryOperatorKind::Mul,
    BinaryOperatorKind::Div,
    BinaryOperatorKind::DivBy,
    BinaryOperatorKind::Mod,
];

impl Parser<'_> {
    /// expression := or-expression
    pub(crate) fn parse_expression(&mut self) -> Result<QueryToken> {
        self.nested(Self::parse_or)
    }

    fn parse_or(&mut self) -> Result<QueryToken> {
        self.chained(|p| {
            let mut left = p.parse_and()?;
            while p.check_keyword("or") {
                p.stream.consume();
                p.deepen()?;
                let right = p.parse_and()?;
                left = QueryToken::binary(BinaryOperatorKind::Or, left, right);
            }
            Ok(left)
        })
    }

    fn parse_and(&mut self) -> Result<QueryToken> {
        self.chained(|p| {
            let mut left = p.parse_comparison()?;
            while p.check_keyword("and") {
                p.stream.consume();
                p.deepen()?;
                let right = p.parse_comparison()?;
                left = QueryToken::binary(BinaryOperatorKind::And, left, right);
            }
            Ok(left)
        })
    }

    fn parse_comparison(&mut self) -> Result<QueryToken> {
        self.chained(|p| {
            let mut left = p.parse_additive()?;
            loop {
                if let Some(op) = p.peek_operator(COMPARISON_OPERATORS) {
                    p.stream.consume();
                    p.deepen()?;
                    let right = p.parse_additive()?;
                    left = QueryToken::binary(op, left, right);
                } else if p.check_keyword("in") {
                    p.stream.consume();
                    p.deepen()?;
                    let items = p.parse_in_list()?;
                    left = QueryToken::In {
                        operand: Box::new(left),
                        items,
                    };
                } else {
                    return Ok(left);
                }
            }
        })
    }

    fn parse_additive(&mut self) -> Result<QueryToken> {
        self.chained(|p| {
            let mut left = p.parse_multiplicative()?;
            while let Some(op) = p.peek_operator(ADDITIVE_OPERATORS) {
                p.stream.consume();
                p.deepen()?;
                let right = p.parse_multiplicative()?;
                left = QueryToken::binary(op, left, right);
            }
            Ok(left)
        })
    }

    fn parse_multiplicative(&mut self) -> Result<QueryToken> {
        self.chained(|p| {
            let mut left = p.parse_unary()?;
            while let Some(op) = p.peek_operator(MULTIPLICATIVE_OPERATORS) {
                p.stream.consume();
                p.deepen()?;
                let right = p.parse_unary()?;
                left = QueryToken::binary(op, left, right);
            }
            Ok(left)
        })
    }

    fn peek_operator(&self, candidates: &[BinaryOperatorKind]) -> Option<BinaryOperatorKind> {
        let text = self.stream.peek().kind.as_identifier()?;
        candidates
            .iter()
            .copied()
            .find(|op| self.is_keyword(text, op.keyword()))
    }

    /// unary := 'not' unary | '-' unary | primary
    fn parse_unary(&mut self) -> Result<QueryToken> {
        if self.check_keyword("not") {
            self.stream.consume();
            let operand = self.nested(Self::parse_unary)?;
            return Ok(QueryToken::unary(UnaryOperatorKind::Not, operand));
        }
        if self.stream.check(&TokenKind::Minus) {
            self.stream.consume();
            if self.stream.check_identifier("INF") {
                self.stream.consume();
                return Ok(QueryToken::literal(LiteralValue::Number("-INF".into()), "-INF"));
            }
            let operand = self.nested(Self::parse_unary)?;
            return Ok(QueryToken::unary(UnaryOperatorKind::Negate, operand));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<QueryToken> {
        let token = self.stream.peek().clone();
        let literal = |value: LiteralValue| QueryToken::literal(value, token.kind.to_string());
        let primary = match &token.kind {
            TokenKind::OpenParen => {
                self.stream.consume();
                let inner = self.parse_expression()?;
                self.stream.expect(&TokenKind::CloseParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::StringLiteral(s) => literal(LiteralValue::String(s.clone())),
            TokenKind::Number(text) => literal(LiteralValue::Number(text.clone())),
            TokenKind::Guid(text) => literal(typed(PrimitiveKind::Guid, text)),
            TokenKind::Date(text) => literal(typed(PrimitiveKind::Date, text)),
            TokenKind::DateTimeOffset(text) => literal(typed(PrimitiveKind::DateTimeOffset, text)),
            TokenKind::TimeOfDay(text) => literal(typed(PrimitiveKind::TimeOfDay, text)),
            TokenKind::QuotedLiteral { prefix, body } => {
                let value = classify_quoted(prefix, body).ok_or_else(|| {
                    SyntaxError::unexpected(
                        token.span.start,
                        "a known literal prefix",
                        token.kind.to_string(),
                    )
                })?;
                literal(value)
            }
            TokenKind::At => {
                self.stream.consume();
                let (name, _) = self.stream.expect_identifier("parameter alias name")?;
                return Ok(QueryToken::ParameterAlias(name));
            }
            TokenKind::Identifier(name) => match name.as_str() {
                "true" => literal(LiteralValue::Boolean(true)),
                "false" => literal(LiteralValue::Boolean(false)),
                "null" => literal(LiteralValue::Null),
                "INF" | "NaN" => literal(LiteralValue::Number(name.clone())),
                _ => return self.parse_member_path(None),
            },
            _ => return Err(self.stream.unexpected("expression").into()),
        };
        self.stream.consume();
        Ok(primary)
    }

    /// in-list := '(' expression (',' expression)* ')'
    fn parse_in_list(&mut self) -> Result<Vec<QueryToken>> {
        self.stream.expect(&TokenKind::OpenParen, "'(' after 'in'")?;
        let mut items = vec![self.parse_expression()?];
        while self.stream.match_token(&TokenKind::Comma) {
            items.push(self.parse_expression()?);
        }
        self.stream.expect(&TokenKind::CloseParen, "')'")?;
        Ok(items)
    }

    /// member-path := segment ('/' segment)*
    ///
    /// Each segment is a range variable (first segment only), `$count`,
    /// a lambda, a function call or a property access.
    pub(crate) fn parse_member_path(&mut self, parent: Option<QueryToken>) -> Result<QueryToken> {
        self.chained(|p| p.parse_member_segments(parent))
    }

    fn parse_member_segments(&mut self, parent: Option<QueryToken>) -> Result<QueryToken> {
        let mut current = parent;
        loop {
            let token = self.stream.peek().clone();
            let Some(name) = token.kind.as_identifier().map(str::to_string) else {
                return Err(self.stream.unexpected("member name").into());
            };
            self.stream.consume();

            let segment = if let Some(system) = name.strip_prefix('$') {
                match (system, current.is_none()) {
                    ("it", true) => QueryToken::RangeVariable(name),
                    ("count", false) => QueryToken::SystemSegment {
                        identifier: name,
                        parent: current.take().map(Box::new),
                    },
                    _ => {
                        return Err(SyntaxError::unexpected(token.span.start, "member name", name).into())
                    }
                }
            } else if current.is_none() && self.scope.contains(&name) {
                QueryToken::RangeVariable(name)
            } else if self.stream.check(&TokenKind::OpenParen) {
                let lambda = if self.is_keyword(&name, "any") {
                    Some(LambdaKind::Any)
                } else if self.is_keyword(&name, "all") {
                    Some(LambdaKind::All)
                } else {
                    None
                };
                match (lambda, current.take()) {
                    (Some(kind), Some(source)) => self.parse_lambda(kind, source)?,
                    (_, source) => self.parse_function_call(name, source)?,
                }
            } else {
                QueryToken::PropertyAccess {
                    identifier: name,
                    parent: current.take().map(Box::new),
                }
            };

            if self.stream.match_token(&TokenKind::Slash) {
                self.deepen()?;
                current = Some(segment);
            } else {
                return Ok(segment);
            }
        }
    }

    /// lambda := ('any' | 'all') '(' [ name ':' expression ] ')'
    fn parse_lambda(&mut self, kind: LambdaKind, source: QueryToken) -> Result<QueryToken> {
        self.stream.expect(&TokenKind::OpenParen, "'('")?;
        if kind == LambdaKind::Any && self.stream.match_token(&TokenKind::CloseParen) {
            return Ok(QueryToken::Lambda(LambdaToken {
                kind,
                parameter: None,
                predicate: None,
                source: Box::new(source),
            }));
        }
        let (parameter, _) = self.stream.expect_identifier("lambda parameter name")?;
        self.stream.expect(&TokenKind::Colon, "':'")?;
        let predicate = self.scoped(&parameter, Self::parse_expression)?;
        self.stream.expect(&TokenKind::CloseParen, "')'")?;
        Ok(QueryToken::Lambda(LambdaToken {
            kind,
            parameter: Some(parameter),
            predicate: Some(Box::new(predicate)),
            source: Box::new(source),
        }))
    }

    /// call := name '(' [ parameter (',' parameter)* ] ')'
    /// parameter := [ name '=' ] expression
    fn parse_function_call(&mut self, name: String, source: Option<QueryToken>) -> Result<QueryToken> {
        self.stream.expect(&TokenKind::OpenParen, "'('")?;
        let mut parameters = Vec::new();
        if !self.stream.match_token(&TokenKind::CloseParen) {
            loop {
                let named = matches!(self.stream.peek().kind, TokenKind::Identifier(_))
                    && self.stream.peek_n(1).kind == TokenKind::Equals;
                let parameter_name = if named {
                    let (parameter_name, _) = self.stream.expect_identifier("parameter name")?;
                    self.stream.consume();
                    Some(parameter_name)
                } else {
                    None
                };
                let value = self.parse_expression()?;
                parameters.push(FunctionParameterToken {
                    name: parameter_name,
                    value,
                });
                if !self.stream.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.stream.expect(&TokenKind::CloseParen, "',' or ')'")?;
        }
        Ok(QueryToken::FunctionCall(FunctionCallToken {
            name,
            parameters,
            source: source.map(Box::new),
        }))
    }
}

fn typed(kind: PrimitiveKind, text: &str) -> LiteralValue {
    LiteralValue::Typed {
        kind,
        text: text.to_string(),
        prefix: None,
    }
}

/// Classifies `prefix'body'`. A dotted prefix is an enum type name.
pub(crate) fn classify_quoted(prefix: &str, body: &str) -> Option<LiteralValue> {
    let kind = match prefix.to_ascii_lowercase().as_str() {
        "guid" => PrimitiveKind::Guid,
        "datetime" => PrimitiveKind::DateTime,
        "datetimeoffset" => PrimitiveKind::DateTimeOffset,
        "time" | "duration" => PrimitiveKind::Duration,
        "binary" | "x" => PrimitiveKind::Binary,
        _ if prefix.contains('.') => {
            return Some(LiteralValue::Enum {
                type_name: prefix.to_string(),
                member: body.to_string(),
            })
        }
        _ => return None,
    };
    Some(LiteralValue::Typed {
        kind,
        text: body.to_string(),
        prefix: Some(prefix.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::{ParserConfig, SyntaxErrorKind};

    fn parse(text: &str) -> Result<QueryToken> {
        let config = ParserConfig::default();
        let mut parser = Parser::new(tokenize(text)?, &config);
        let token = parser.parse_expression()?;
        parser.expect_end()?;
        Ok(token)
    }

    fn prop(name: &str) -> QueryToken {
        QueryToken::property(name, None)
    }

    fn number(n: &str) -> QueryToken {
        QueryToken::literal(LiteralValue::Number(n.into()), n)
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expected = QueryToken::binary(
            BinaryOperatorKind::Or,
            QueryToken::binary(BinaryOperatorKind::Eq, prop("A"), number("1")),
            QueryToken::binary(
                BinaryOperatorKind::And,
                QueryToken::binary(BinaryOperatorKind::Eq, prop("B"), number("2")),
                QueryToken::binary(BinaryOperatorKind::Eq, prop("C"), number("3")),
            ),
        );
        assert_eq!(parse("A eq 1 or B eq 2 and C eq 3").unwrap(), expected);
    }

    #[test]
    fn test_arithmetic_precedence_and_associativity() {
        let token = parse("A add B mul C sub D").unwrap();
        let expected = QueryToken::binary(
            BinaryOperatorKind::Sub,
            QueryToken::binary(
                BinaryOperatorKind::Add,
                prop("A"),
                QueryToken::binary(BinaryOperatorKind::Mul, prop("B"), prop("C")),
            ),
            prop("D"),
        );
        assert_eq!(token, expected);
    }

    #[test]
    fn test_unary_binds_tightest() {
        let token = parse("not A eq B").unwrap();
        assert!(matches!(
            token,
            QueryToken::BinaryOperator {
                op: BinaryOperatorKind::Eq,
                ..
            }
        ));
        let token = parse("-A add 1").unwrap();
        let QueryToken::BinaryOperator { left, .. } = token else {
            panic!("expected binary operator");
        };
        assert_eq!(*left, QueryToken::unary(UnaryOperatorKind::Negate, prop("A")));
    }

    #[test]
    fn test_lambda_parameter_becomes_range_variable() {
        let token = parse("Orders/any(o: o/Amount gt 10)").unwrap();
        let QueryToken::Lambda(lambda) = token else {
            panic!("expected lambda");
        };
        assert_eq!(lambda.kind, LambdaKind::Any);
        assert_eq!(*lambda.source, prop("Orders"));
        let predicate = lambda.predicate.unwrap();
        let QueryToken::BinaryOperator { left, .. } = *predicate else {
            panic!("expected comparison");
        };
        assert_eq!(
            *left,
            QueryToken::property("Amount", Some(QueryToken::RangeVariable("o".into())))
        );
    }

    #[test]
    fn test_range_variable_does_not_leak() {
        let token = parse("Orders/any(o: o/Amount gt 1) and o/Amount gt 2").unwrap();
        let QueryToken::BinaryOperator { right, .. } = token else {
            panic!("expected and");
        };
        let QueryToken::BinaryOperator { left, .. } = *right else {
            panic!("expected comparison");
        };
        assert_eq!(*left, QueryToken::property("Amount", Some(prop("o"))));
    }

    #[test]
    fn test_empty_any() {
        let token = parse("Orders/any()").unwrap();
        assert!(matches!(token, QueryToken::Lambda(LambdaToken { predicate: None, .. })));
        assert!(parse("Orders/all()").is_err());
    }

    #[test]
    fn test_function_call_parameters_keep_order() {
        let token = parse("NS.Discount(rate=0.5,code='x')").unwrap();
        let QueryToken::FunctionCall(call) = token else {
            panic!("expected call");
        };
        let names: Vec<_> = call.parameters.iter().map(|p| p.name.as_deref()).collect();
        assert_eq!(names, vec![Some("rate"), Some("code")]);
        assert!(call.source.is_none());
    }

    #[test]
    fn test_bound_call_and_count_segment() {
        let token = parse("Orders/$count gt 2").unwrap();
        let QueryToken::BinaryOperator { left, .. } = token else {
            panic!("expected comparison");
        };
        assert_eq!(
            *left,
            QueryToken::SystemSegment {
                identifier: "$count".into(),
                parent: Some(Box::new(prop("Orders")))
            }
        );
        let token = parse("Customer/NS.Rank()").unwrap();
        assert!(matches!(token, QueryToken::FunctionCall(FunctionCallToken { source: Some(_), .. })));
    }

    #[test]
    fn test_literals_keep_original_text() {
        for text in ["'it''s'", "5L", "-INF", "2020-01-01", "duration'PT1H'", "NS.Color'Red'", "null"] {
            let QueryToken::Literal(literal) = parse(text).unwrap() else {
                panic!("expected literal for {text}");
            };
            assert_eq!(literal.original_text.as_deref(), Some(text));
        }
    }

    #[test]
    fn test_in_list() {
        let token = parse("Name in ('a','b')").unwrap();
        let QueryToken::In { items, .. } = token else {
            panic!("expected in");
        };
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_alias() {
        assert_eq!(
            parse("Price gt @p").unwrap(),
            QueryToken::binary(
                BinaryOperatorKind::Gt,
                prop("Price"),
                QueryToken::ParameterAlias("p".into())
            )
        );
    }

    #[test]
    fn test_errors() {
        let err = parse("A eq").unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::UnexpectedEndOfInput));
        let err = parse("(A eq 1").unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::UnexpectedEndOfInput));
        let err = parse("A eq 'abc").unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::UnterminatedLiteral));
        let err = parse("A eq foo'x'").unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::UnexpectedToken));
        let err = parse("A/$value").unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::UnexpectedToken));
    }
}
