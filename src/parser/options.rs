//! Query option rules: `$orderby`, `$select`, `$expand`, `$search`, and
//! splitting a whole query string into options.

use crate::error::{QueryError, Result, SyntaxError};
use crate::lexer::{tokenize, TokenKind};
use crate::ParserConfig;

use super::ast::{
    CustomQueryOption, ExpandTermToken, ExpandToken, LevelsToken, OrderByToken, OrderDirection,
    PathSegment, QueryOptionsToken, SearchToken, SelectItemToken,
};
use super::Parser;

impl Parser<'_> {
    /// orderby := expression ['asc' | 'desc'] (',' ...)*
    pub(crate) fn parse_order_by(&mut self) -> Result<Vec<OrderByToken>> {
        let mut items = Vec::new();
        loop {
            let expression = self.parse_expression()?;
            let direction = if self.check_keyword("desc") {
                self.stream.consume();
                OrderDirection::Descending
            } else {
                if self.check_keyword("asc") {
                    self.stream.consume();
                }
                OrderDirection::Ascending
            };
            items.push(OrderByToken {
                expression,
                direction,
            });
            if !self.stream.match_token(&TokenKind::Comma) {
                return Ok(items);
            }
        }
    }

    /// select := item (',' item)*
    /// item := '*' | namespace '.*' | identifier ('/' identifier)*
    pub(crate) fn parse_select(&mut self) -> Result<Vec<SelectItemToken>> {
        let mut items = Vec::new();
        loop {
            items.push(self.parse_select_item()?);
            if !self.stream.match_token(&TokenKind::Comma) {
                return Ok(items);
            }
        }
    }

    fn parse_select_item(&mut self) -> Result<SelectItemToken> {
        if self.stream.match_token(&TokenKind::Star) {
            return Ok(SelectItemToken::Star);
        }
        let head = self.select_segment()?;
        if let Some(namespace) = head.strip_suffix('.') {
            self.stream.expect(&TokenKind::Star, "'*' after namespace")?;
            return Ok(SelectItemToken::NamespaceWildcard(namespace.to_string()));
        }
        let rest = self.chained(|p| {
            let mut rest = Vec::new();
            while p.stream.match_token(&TokenKind::Slash) {
                p.deepen()?;
                let name = p.select_segment()?;
                if name.ends_with('.') {
                    return Err(p.stream.unexpected("property name").into());
                }
                rest.push(name);
            }
            Ok(rest)
        })?;
        Ok(SelectItemToken::Path(chain(head, rest, None)))
    }

    fn select_segment(&mut self) -> Result<String> {
        let (name, span) = self.stream.expect_identifier("property name or '*'")?;
        if name.starts_with('$') {
            return Err(SyntaxError::unexpected(span.start, "property name", name).into());
        }
        Ok(name)
    }

    /// expand := term (',' term)*
    pub(crate) fn parse_expand(&mut self) -> Result<ExpandToken> {
        let mut terms = Vec::new();
        loop {
            terms.push(self.parse_expand_term()?);
            if !self.stream.match_token(&TokenKind::Comma) {
                return Ok(ExpandToken { terms });
            }
        }
    }

    /// term := path ['/$ref'] ['(' option (';' option)* ')']
    fn parse_expand_term(&mut self) -> Result<ExpandTermToken> {
        let path = if self.stream.match_token(&TokenKind::Star) {
            let tail = if self.stream.match_token(&TokenKind::Slash) {
                Some(self.parse_ref_segment()?)
            } else {
                None
            };
            PathSegment::member("*", tail)
        } else {
            self.chained(|p| {
                let head = p.expand_segment()?;
                let mut rest = Vec::new();
                let mut tail = None;
                while p.stream.match_token(&TokenKind::Slash) {
                    p.deepen()?;
                    if p.stream.peek().kind.as_identifier().is_some_and(|n| n.starts_with('$')) {
                        tail = Some(p.parse_ref_segment()?);
                        break;
                    }
                    rest.push(p.expand_segment()?);
                }
                Ok(chain(head, rest, tail))
            })?
        };
        let mut term = ExpandTermToken::new(path);
        if self.stream.match_token(&TokenKind::OpenParen) {
            self.nested(|p| p.parse_expand_options(&mut term))?;
            self.stream.expect(&TokenKind::CloseParen, "';' or ')'")?;
        }
        Ok(term)
    }

    fn expand_segment(&mut self) -> Result<String> {
        let (name, span) = self.stream.expect_identifier("navigation property or '*'")?;
        if name.starts_with('$') {
            return Err(SyntaxError::unexpected(span.start, "navigation property", name).into());
        }
        Ok(name)
    }

    fn parse_ref_segment(&mut self) -> Result<PathSegment> {
        let (name, span) = self.stream.expect_identifier("'$ref'")?;
        if name == "$ref" {
            Ok(PathSegment::System { identifier: name })
        } else {
            Err(SyntaxError::unexpected(span.start, "'$ref'", name).into())
        }
    }

    fn parse_expand_options(&mut self, term: &mut ExpandTermToken) -> Result<()> {
        let mut seen: Vec<String> = Vec::new();
        loop {
            let (name, span) = self.stream.expect_identifier("expand option")?;
            let option = self.option_name(&name);
            if seen.contains(&option) {
                return Err(SyntaxError::unexpected(span.start, "each expand option at most once", name).into());
            }
            self.stream.expect(&TokenKind::Equals, "'='")?;
            match option.as_str() {
                "$filter" => term.filter = Some(self.parse_expression()?),
                "$orderby" => term.order_by = self.parse_order_by()?,
                "$top" => term.top = Some(self.parse_integer()?),
                "$skip" => term.skip = Some(self.parse_integer()?),
                "$count" => term.count = Some(self.parse_boolean()?),
                "$levels" => term.levels = Some(self.parse_levels()?),
                "$search" => term.search = Some(self.parse_search()?),
                "$select" => term.select = Some(self.parse_select()?),
                "$expand" => term.expand = Some(self.parse_expand()?),
                _ => return Err(SyntaxError::unexpected(span.start, "expand option", name).into()),
            }
            seen.push(option);
            if !self.stream.match_token(&TokenKind::Semicolon) {
                return Ok(());
            }
        }
    }

    fn option_name(&self, name: &str) -> String {
        if self.config.case_insensitive_builtins {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }

    fn parse_integer(&mut self) -> Result<i64> {
        let token = self.stream.peek().clone();
        match &token.kind {
            TokenKind::Number(text) => {
                let value = text
                    .parse::<i64>()
                    .ok()
                    .filter(|v| *v >= 0)
                    .ok_or_else(|| SyntaxError::unexpected(token.span.start, "non-negative integer", text.clone()))?;
                self.stream.consume();
                Ok(value)
            }
            _ => Err(self.stream.unexpected("non-negative integer").into()),
        }
    }

    fn parse_boolean(&mut self) -> Result<bool> {
        if self.stream.check_identifier("true") {
            self.stream.consume();
            Ok(true)
        } else if self.stream.check_identifier("false") {
            self.stream.consume();
            Ok(false)
        } else {
            Err(self.stream.unexpected("'true' or 'false'").into())
        }
    }

    fn parse_levels(&mut self) -> Result<LevelsToken> {
        if self.check_keyword("max") {
            self.stream.consume();
            return Ok(LevelsToken::Max);
        }
        let position = self.stream.peek().span.start;
        let levels = self.parse_integer()?;
        u32::try_from(levels)
            .ok()
            .filter(|n| *n > 0)
            .map(LevelsToken::Finite)
            .ok_or_else(|| SyntaxError::unexpected(position, "positive integer or 'max'", levels.to_string()).into())
    }

    /// search := and-term ('OR' and-term)*
    pub(crate) fn parse_search(&mut self) -> Result<SearchToken> {
        self.nested(|p| {
            let mut left = p.parse_search_and()?;
            while p.stream.check_identifier("OR") {
                p.stream.consume();
                p.deepen()?;
                let right = p.parse_search_and()?;
                left = SearchToken::Or(Box::new(left), Box::new(right));
            }
            Ok(left)
        })
    }

    /// and-term := not-term (['AND'] not-term)*
    fn parse_search_and(&mut self) -> Result<SearchToken> {
        self.chained(|p| {
            let mut left = p.parse_search_not()?;
            loop {
                if p.stream.check_identifier("AND") {
                    p.stream.consume();
                } else if !p.starts_search_term() {
                    return Ok(left);
                }
                p.deepen()?;
                let right = p.parse_search_not()?;
                left = SearchToken::And(Box::new(left), Box::new(right));
            }
        })
    }

    fn starts_search_term(&self) -> bool {
        match &self.stream.peek().kind {
            TokenKind::Identifier(word) => word != "OR",
            TokenKind::Phrase(_) | TokenKind::Number(_) | TokenKind::OpenParen => true,
            _ => false,
        }
    }

    fn parse_search_not(&mut self) -> Result<SearchToken> {
        if self.stream.check_identifier("NOT") {
            self.stream.consume();
            let inner = self.nested(Self::parse_search_not)?;
            return Ok(SearchToken::Not(Box::new(inner)));
        }
        let token = self.stream.peek().clone();
        let primary = match token.kind {
            TokenKind::OpenParen => {
                self.stream.consume();
                let inner = self.parse_search()?;
                self.stream.expect(&TokenKind::CloseParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::Phrase(phrase) => SearchToken::Phrase(phrase),
            TokenKind::Identifier(word) if word != "AND" && word != "OR" => SearchToken::Term(word),
            TokenKind::Number(word) => SearchToken::Term(word),
            _ => return Err(self.stream.unexpected("search term").into()),
        };
        self.stream.consume();
        Ok(primary)
    }
}

/// Links `head/rest...` into a `NonSystem` chain ending in `tail`.
fn chain(head: String, rest: Vec<String>, tail: Option<PathSegment>) -> PathSegment {
    let next = rest
        .into_iter()
        .rev()
        .fold(tail, |next, name| Some(PathSegment::member(name, next)));
    PathSegment::member(head, next)
}

/// System query options kept as raw text.
const RAW_OPTIONS: &[&str] = &["$skiptoken", "$deltatoken", "$format"];

/// Splits a query string (without the leading `?`) into options and parses
/// each system option. Error positions refer to the whole query string.
///
/// # Errors
///
/// Returns a `SyntaxError` for an unknown or repeated `$` option or for an
/// option value that does not parse.
pub fn parse_query_options(query: &str, config: &ParserConfig) -> Result<QueryOptionsToken> {
    tracing::debug!(length = query.len(), "parsing query options");
    let mut options = QueryOptionsToken::default();
    let mut seen: Vec<String> = Vec::new();
    let mut offset = 0;

    for part in query.split('&') {
        let part_offset = offset;
        offset += part.len() + 1;
        if part.is_empty() {
            continue;
        }
        let (raw_name, value) = match part.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (part, None),
        };
        let value_offset = part_offset + raw_name.len() + 1;

        if let Some(alias) = raw_name.strip_prefix('@') {
            options
                .aliases
                .push((alias.to_string(), value.unwrap_or_default().to_string()));
            continue;
        }
        if !raw_name.starts_with('$') {
            options.custom.push(CustomQueryOption {
                name: raw_name.to_string(),
                value: value.map(str::to_string),
            });
            continue;
        }

        let name = if config.case_insensitive_builtins {
            raw_name.to_ascii_lowercase()
        } else {
            raw_name.to_string()
        };
        if seen.contains(&name) {
            return Err(SyntaxError::unexpected(part_offset, "each system query option at most once", raw_name).into());
        }
        let value = value.unwrap_or_default();
        let at_value = |err: QueryError| match err {
            QueryError::Syntax(err) => QueryError::Syntax(err.offset_by(value_offset)),
            other => other,
        };

        match name.as_str() {
            "$filter" => {
                options.filter = Some(parse_value(value, config, Parser::parse_expression).map_err(at_value)?);
            }
            "$orderby" => {
                options.order_by = Some(parse_value(value, config, Parser::parse_order_by).map_err(at_value)?);
            }
            "$select" => {
                options.select = Some(parse_value(value, config, Parser::parse_select).map_err(at_value)?);
            }
            "$expand" => {
                options.expand = Some(parse_value(value, config, Parser::parse_expand).map_err(at_value)?);
            }
            "$search" => {
                options.search = Some(parse_value(value, config, Parser::parse_search).map_err(at_value)?);
            }
            "$top" => options.top = Some(parse_value(value, config, Parser::parse_integer).map_err(at_value)?),
            "$skip" => options.skip = Some(parse_value(value, config, Parser::parse_integer).map_err(at_value)?),
            "$count" => options.count = Some(parse_value(value, config, Parser::parse_boolean).map_err(at_value)?),
            raw if RAW_OPTIONS.contains(&raw) => {
                let value = Some(value.to_string());
                match raw {
                    "$skiptoken" => options.skip_token = value,
                    "$deltatoken" => options.delta_token = value,
                    _ => options.format = value,
                }
            }
            _ => {
                return Err(SyntaxError::unexpected(part_offset, "system query option", raw_name).into());
            }
        }
        seen.push(name);
    }
    Ok(options)
}

fn parse_value<'c, T>(
    value: &str,
    config: &'c ParserConfig,
    rule: impl FnOnce(&mut Parser<'c>) -> Result<T>,
) -> Result<T> {
    let mut parser = Parser::new(tokenize(value)?, config);
    let parsed = rule(&mut parser)?;
    parser.expect_end()?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyntaxErrorKind;
    use crate::parser::ast::QueryToken;

    fn config() -> ParserConfig {
        ParserConfig::default()
    }

    fn expand(text: &str) -> Result<ExpandToken> {
        parse_value(text, &config(), Parser::parse_expand)
    }

    #[test]
    fn test_order_by_directions() {
        let items = parse_value("Name desc,Price asc,ID", &config(), Parser::parse_order_by).unwrap();
        let directions: Vec<_> = items.iter().map(|i| i.direction).collect();
        assert_eq!(
            directions,
            vec![
                OrderDirection::Descending,
                OrderDirection::Ascending,
                OrderDirection::Ascending
            ]
        );
    }

    #[test]
    fn test_select_items() {
        let items = parse_value("*,NS.*,Address/City", &config(), Parser::parse_select).unwrap();
        assert_eq!(items[0], SelectItemToken::Star);
        assert_eq!(items[1], SelectItemToken::NamespaceWildcard("NS".into()));
        assert_eq!(items[2].to_string(), "Address/City");
    }

    #[test]
    fn test_expand_nested_options() {
        let token = expand("Orders($filter=Amount gt 5;$top=2;$expand=Items($select=Price)),Customer/$ref").unwrap();
        assert_eq!(token.terms.len(), 2);
        let orders = &token.terms[0];
        assert_eq!(orders.top, Some(2));
        assert!(orders.filter.is_some());
        let items = &orders.expand.as_ref().unwrap().terms[0];
        assert_eq!(items.path.identifier(), "Items");
        assert_eq!(items.select.as_ref().unwrap().len(), 1);
        assert_eq!(token.terms[1].path.last(), &PathSegment::System { identifier: "$ref".into() });
    }

    #[test]
    fn test_expand_star_and_levels() {
        let token = expand("*/$ref,Reports($levels=max),Parts($levels=2)").unwrap();
        assert_eq!(token.terms[0].path.identifier(), "*");
        assert_eq!(token.terms[1].levels, Some(LevelsToken::Max));
        assert_eq!(token.terms[2].levels, Some(LevelsToken::Finite(2)));
        assert!(expand("Parts($levels=0)").is_err());
    }

    #[test]
    fn test_expand_option_errors() {
        let err = expand("Orders($top=1;$top=2)").unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::UnexpectedToken));
        let err = expand("Orders($bogus=1)").unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::UnexpectedToken));
        let err = expand("Orders($top=1").unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::UnexpectedEndOfInput));
    }

    #[test]
    fn test_expand_nesting_bounded() {
        let config = ParserConfig::default().with_max_nesting_depth(4);
        let mut text = String::from("A");
        for _ in 0..10 {
            text = format!("A($expand={text})");
        }
        let err = parse_value(&text, &config, Parser::parse_expand).unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::MaxNestingDepthExceeded));
    }

    #[test]
    fn test_search_grammar() {
        let search = parse_value("blue green OR NOT \"dark red\"", &config(), Parser::parse_search).unwrap();
        assert_eq!(
            search,
            SearchToken::Or(
                Box::new(SearchToken::And(
                    Box::new(SearchToken::Term("blue".into())),
                    Box::new(SearchToken::Term("green".into())),
                )),
                Box::new(SearchToken::Not(Box::new(SearchToken::Phrase("dark red".into())))),
            )
        );
    }

    #[test]
    fn test_query_string_splitting() {
        let options = parse_query_options(
            "$filter=Price gt 5&$top=10&@p=1&debug=true&$format=json&flag",
            &config(),
        )
        .unwrap();
        assert!(matches!(options.filter, Some(QueryToken::BinaryOperator { .. })));
        assert_eq!(options.top, Some(10));
        assert_eq!(options.aliases, vec![("p".to_string(), "1".to_string())]);
        assert_eq!(options.format.as_deref(), Some("json"));
        assert_eq!(options.custom.len(), 2);
        assert_eq!(options.custom[1].value, None);
    }

    #[test]
    fn test_query_string_errors_are_positioned() {
        let err = parse_query_options("$top=1&$filter=Price gt", &config()).unwrap_err();
        let syntax = err.as_syntax().unwrap();
        assert_eq!(syntax.kind, SyntaxErrorKind::UnexpectedEndOfInput);
        assert_eq!(syntax.position, 23);

        let err = parse_query_options("$top=1&$top=2", &config()).unwrap_err();
        assert_eq!(err.as_syntax().unwrap().position, 7);

        let err = parse_query_options("$unknown=1", &config()).unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::UnexpectedToken));

        let err = parse_query_options("$top=-1", &config()).unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxErrorKind::UnexpectedToken));
    }
}
