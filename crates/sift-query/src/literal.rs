//! Literal syntax for query text.
//!
//! Query strings arriving from a CLI or a config file are resolved into richer
//! values when they spell a literal: `42`, `-1.5`, `'name'`, `None`, `[1, 2]`,
//! `("a", "b")`, `{"k": 1}`. Top-level items separated by commas form a tuple
//! without parentheses, so `'test_*', 1` is `('test_*', 1)`. Anything else
//! stays text. Parsing never executes code.

use crate::query::Query;
use std::collections::BTreeMap;

/// Why a piece of text is not a literal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("not a literal at offset {offset}: {message}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: &'static str,
}

impl Query {
    /// Parse query text as a literal value.
    pub fn parse_literal(text: &str) -> Result<Query, LiteralError> {
        let mut parser = Parser {
            src: text.as_bytes(),
            text,
            pos: 0,
        };
        let value = parser.top_level()?;
        parser.skip_ws();
        if parser.pos != parser.src.len() {
            return Err(parser.error("trailing input"));
        }
        Ok(value)
    }
}

const MAX_DEPTH: usize = 64;

struct Parser<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: &'static str) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// A value, or a bare comma separated tuple of values.
    fn top_level(&mut self) -> Result<Query, LiteralError> {
        let first = self.value(0)?;
        if !self.eat(b',') {
            return Ok(first);
        }
        let mut items = vec![first];
        loop {
            self.skip_ws();
            if self.pos == self.src.len() {
                break;
            }
            items.push(self.value(1)?);
            if !self.eat(b',') {
                break;
            }
        }
        Ok(Query::Tuple(items))
    }

    fn value(&mut self, depth: usize) -> Result<Query, LiteralError> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.skip_ws();
        match self.peek() {
            Some(b'\'' | b'"') => self.string().map(Query::Str),
            Some(b'[') => {
                self.pos += 1;
                let (items, _) = self.sequence(b']', depth)?;
                Ok(Query::List(items))
            }
            Some(b'(') => {
                self.pos += 1;
                let (mut items, trailing_comma) = self.sequence(b')', depth)?;
                // `(x)` is grouping, `(x,)` is a tuple
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Query::Tuple(items))
                }
            }
            Some(b'{') => {
                self.pos += 1;
                self.map(depth)
            }
            Some(b'-' | b'+' | b'0'..=b'9' | b'.') => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.keyword(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("empty input")),
        }
    }

    /// Comma separated values up to `close`. Reports whether a comma preceded
    /// the closing delimiter.
    fn sequence(&mut self, close: u8, depth: usize) -> Result<(Vec<Query>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            if self.eat(close) {
                return Ok((items, trailing_comma));
            }
            items.push(self.value(depth + 1)?);
            trailing_comma = self.eat(b',');
            if !trailing_comma {
                if self.eat(close) {
                    return Ok((items, false));
                }
                return Err(self.error("expected ',' or closing delimiter"));
            }
        }
    }

    fn map(&mut self, depth: usize) -> Result<Query, LiteralError> {
        let mut map = BTreeMap::new();
        loop {
            if self.eat(b'}') {
                return Ok(Query::Map(map));
            }
            self.skip_ws();
            let key = match self.peek() {
                Some(b'\'' | b'"') => self.string()?,
                _ => return Err(self.error("map keys must be strings")),
            };
            if !self.eat(b':') {
                return Err(self.error("expected ':'"));
            }
            let value = self.value(depth + 1)?;
            map.insert(key, value);
            if !self.eat(b',') {
                if self.eat(b'}') {
                    return Ok(Query::Map(map));
                }
                return Err(self.error("expected ',' or '}'"));
            }
        }
    }

    fn keyword(&mut self) -> Result<Query, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        match &self.text[start..self.pos] {
            "None" | "null" => Ok(Query::None),
            "True" | "true" => Ok(Query::Bool(true)),
            "False" | "false" => Ok(Query::Bool(false)),
            _ => {
                self.pos = start;
                Err(self.error("unknown identifier"))
            }
        }
    }

    fn number(&mut self) -> Result<Query, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        let mut is_float = false;
        let mut digits = 0;
        while let Some(c) = self.peek() {
            match c {
                b'0'..=b'9' => digits += 1,
                b'.' if !is_float => is_float = true,
                b'e' | b'E' if digits > 0 => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some(b'-' | b'+')) {
                        self.pos += 1;
                    }
                    continue;
                }
                _ => break,
            }
            self.pos += 1;
        }
        if digits == 0 {
            return Err(self.error("expected digits"));
        }
        let raw = &self.text[start..self.pos];
        if is_float {
            raw.parse::<f64>()
                .map(Query::Float)
                .map_err(|_| self.error("invalid float"))
        } else {
            raw.parse::<i64>()
                .map(Query::Int)
                .map_err(|_| self.error("integer out of range"))
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let quote = self.src[self.pos];
        self.pos += 1;
        let text = self.text;
        let mut out = String::new();
        let mut chars = text[self.pos..].char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                c if c as u32 == quote as u32 => {
                    self.pos += offset + 1;
                    return Ok(out);
                }
                '\\' => {
                    let Some((_, escaped)) = chars.next() else {
                        break;
                    };
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        '\\' | '\'' | '"' => out.push(escaped),
                        'u' => out.push(unicode_escape(&mut chars).ok_or(LiteralError {
                            offset: self.pos + offset,
                            message: "invalid unicode escape",
                        })?),
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                c => out.push(c),
            }
        }
        self.pos = self.src.len();
        Err(self.error("unterminated string"))
    }
}

/// `\u{1F600}` or `\u00e9`.
fn unicode_escape(chars: &mut std::str::CharIndices<'_>) -> Option<char> {
    let mut hex = String::new();
    let (_, first) = chars.next()?;
    if first == '{' {
        for (_, c) in chars.by_ref() {
            if c == '}' {
                break;
            }
            hex.push(c);
        }
    } else {
        hex.push(first);
        for _ in 0..3 {
            hex.push(chars.next()?.1);
        }
    }
    u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Query {
        Query::parse_literal(text).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(parse("42"), Query::Int(42));
        assert_eq!(parse(" -7 "), Query::Int(-7));
        assert_eq!(parse("1.5"), Query::Float(1.5));
        assert_eq!(parse("2e3"), Query::Float(2000.0));
        assert_eq!(parse("None"), Query::None);
        assert_eq!(parse("True"), Query::Bool(true));
        assert_eq!(parse("false"), Query::Bool(false));
        assert_eq!(parse("'abc'"), Query::from("abc"));
        assert_eq!(parse(r#""a\"b""#), Query::from("a\"b"));
        assert_eq!(parse(r#""café""#), Query::from("café"));
    }

    #[test]
    fn test_unicode_escapes() {
        assert_eq!(parse(r#""caf\u00e9""#), Query::from("café"));
        assert_eq!(parse(r#"'\u{1F600}!'"#), Query::from("\u{1F600}!"));
        assert!(Query::parse_literal(r#""\u12""#).is_err());
        assert!(Query::parse_literal(r#""\u{110000}""#).is_err());
    }

    #[test]
    fn test_collections() {
        assert_eq!(
            parse("[1, 2]"),
            Query::list([Query::Int(1), Query::Int(2)])
        );
        assert_eq!(
            parse("('a', 2,)"),
            Query::tuple([Query::from("a"), Query::Int(2)])
        );
        assert_eq!(parse("(1,)"), Query::tuple([Query::Int(1)]));
        assert_eq!(parse("(1)"), Query::Int(1));
        assert_eq!(parse("()"), Query::Tuple(vec![]));
        assert_eq!(parse("{}"), Query::Map(BTreeMap::new()));

        let Query::Map(map) = parse(r#"{"id": [1, (2, 3)]}"#) else {
            panic!("expected map");
        };
        assert_eq!(
            map["id"],
            Query::list([
                Query::Int(1),
                Query::tuple([Query::Int(2), Query::Int(3)])
            ])
        );
    }

    #[test]
    fn test_bare_tuple() {
        assert_eq!(
            parse("'test_*', 1"),
            Query::tuple([Query::from("test_*"), Query::Int(1)])
        );
        assert_eq!(parse("1,2"), Query::tuple([Query::Int(1), Query::Int(2)]));
        assert_eq!(parse("1,"), Query::tuple([Query::Int(1)]));
        assert_eq!(
            parse("[1], (2, 3)"),
            Query::tuple([
                Query::list([Query::Int(1)]),
                Query::tuple([Query::Int(2), Query::Int(3)])
            ])
        );
        assert!(Query::parse_literal("1,,2").is_err());
        assert!(Query::parse_literal("1, test_*").is_err());
    }

    #[test]
    fn test_non_literals_fail() {
        for text in [
            "test_item",
            "test_*",
            r#"?x["name"].startswith("test")"#,
            "[1, 2",
            "'open",
            "1 2",
            "",
            "{1: 2}",
            "99999999999999999999999",
        ] {
            assert!(Query::parse_literal(text).is_err(), "{text} should not parse");
        }
    }

    #[test]
    fn test_display_round_trips() {
        let q = Query::tuple([
            Query::from("?x[\"name\"]"),
            Query::list([Query::Int(2), Query::None]),
        ]);
        assert_eq!(parse(&q.to_string()), q);
    }
}
