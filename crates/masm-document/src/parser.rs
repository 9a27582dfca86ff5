//! Recursive-descent parser from tokens to an ordered JSON value tree.
//!
//! The dialect is JSON with relaxations: bare identifiers as keys, single or
//! double quoted strings, `//` and `/* */` comments, trailing commas, and
//! hexadecimal integer literals. Mapping key order is preserved.

use serde_json::{Map, Number, Value};

use crate::error::{DocumentError, Result};
use crate::lexer::{lex, line_column, Spanned, Token};

/// Deepest nesting of mappings and sequences a document may use.
pub const MAX_DEPTH: usize = 128;

/// Parse source text into a single value.
pub fn parse_value(source: &str) -> Result<Value> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    if let Some(extra) = parser.peek() {
        return Err(parser.syntax_at(
            extra.span.start,
            format!("unexpected {} after end of document", extra.token.describe()),
        ));
    }
    Ok(value)
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Spanned<Token<'src>>>,
    pos: usize,
    depth: usize,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<&Spanned<Token<'src>>> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Spanned<Token<'src>>> {
        match self.tokens.get(self.pos) {
            Some(tok) => {
                self.pos += 1;
                Ok(tok.clone())
            }
            None => Err(self.syntax_at(self.source.len(), "unexpected end of input".into())),
        }
    }

    fn syntax_at(&self, offset: usize, message: String) -> DocumentError {
        let (line, column) = line_column(self.source, offset);
        DocumentError::Syntax {
            line,
            column,
            message,
        }
    }

    fn line_of(&self, offset: usize) -> usize {
        line_column(self.source, offset).0
    }

    fn value(&mut self) -> Result<Value> {
        let tok = self.next()?;
        match tok.token {
            Token::BraceOpen => self.nested(tok.span.start, Self::mapping),
            Token::BracketOpen => self.nested(tok.span.start, Self::sequence),
            Token::String(s) => Ok(Value::String(unescape(s))),
            Token::True => Ok(Value::Bool(true)),
            Token::False => Ok(Value::Bool(false)),
            Token::Null => Ok(Value::Null),
            Token::Integer(s) => {
                let n: i64 = s.parse().map_err(|_| DocumentError::InvalidNumber {
                    line: self.line_of(tok.span.start),
                    literal: s.to_string(),
                })?;
                Ok(Value::Number(n.into()))
            }
            Token::HexInteger(s) => {
                let n = u64::from_str_radix(&s[2..], 16).map_err(|_| {
                    DocumentError::InvalidNumber {
                        line: self.line_of(tok.span.start),
                        literal: s.to_string(),
                    }
                })?;
                Ok(Value::Number(n.into()))
            }
            Token::Float(s) => s
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| DocumentError::InvalidNumber {
                    line: self.line_of(tok.span.start),
                    literal: s.to_string(),
                }),
            other => Err(self.syntax_at(
                tok.span.start,
                format!("expected a value, found {}", other.describe()),
            )),
        }
    }

    /// Run a mapping or sequence body one nesting level down.
    fn nested(&mut self, offset: usize, body: fn(&mut Self) -> Result<Value>) -> Result<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(self.syntax_at(
                offset,
                format!("nesting deeper than {MAX_DEPTH} levels"),
            ));
        }
        self.depth += 1;
        let value = body(self);
        self.depth -= 1;
        value
    }

    /// Parse a mapping body; the opening brace is already consumed.
    fn mapping(&mut self) -> Result<Value> {
        let mut map = Map::new();
        loop {
            let tok = self.next()?;
            let key = match tok.token {
                Token::BraceClose => break,
                Token::Ident(s) => s.to_string(),
                Token::String(s) => unescape(s),
                other => {
                    return Err(self.syntax_at(
                        tok.span.start,
                        format!("expected a key or '}}', found {}", other.describe()),
                    ))
                }
            };

            let colon = self.next()?;
            if colon.token != Token::Colon {
                return Err(self.syntax_at(
                    colon.span.start,
                    format!("expected ':' after key '{key}', found {}", colon.token.describe()),
                ));
            }

            let value = self.value()?;
            if map.contains_key(&key) {
                return Err(DocumentError::DuplicateKey {
                    line: self.line_of(tok.span.start),
                    key,
                });
            }
            map.insert(key, value);

            let sep = self.next()?;
            match sep.token {
                Token::Comma => continue,
                Token::BraceClose => break,
                other => {
                    return Err(self.syntax_at(
                        sep.span.start,
                        format!("expected ',' or '}}', found {}", other.describe()),
                    ))
                }
            }
        }
        Ok(Value::Object(map))
    }

    /// Parse a sequence body; the opening bracket is already consumed.
    fn sequence(&mut self) -> Result<Value> {
        let mut items = Vec::new();
        loop {
            if matches!(self.peek().map(|t| &t.token), Some(Token::BracketClose)) {
                self.pos += 1;
                break;
            }
            items.push(self.value()?);

            let sep = self.next()?;
            match sep.token {
                Token::Comma => continue,
                Token::BracketClose => break,
                other => {
                    return Err(self.syntax_at(
                        sep.span.start,
                        format!("expected ',' or ']', found {}", other.describe()),
                    ))
                }
            }
        }
        Ok(Value::Array(items))
    }
}

/// Resolve backslash escapes in a quoted string body.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_relaxed_mapping() {
        let value = parse_value(
            r#"{
                // architecture
                opcode_size: 7,
                'name': "cpu",
                mask: 0x1F,
                flags: ['zero', 'negative',],
            }"#,
        )
        .unwrap();
        assert_eq!(value["opcode_size"], 7);
        assert_eq!(value["name"], "cpu");
        assert_eq!(value["mask"], 31);
        assert_eq!(value["flags"][1], "negative");
        assert_eq!(value["flags"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn key_order_is_preserved() {
        let value = parse_value("{ ZETA: 1, ALPHA: 2, MID: 3 }").unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["ZETA", "ALPHA", "MID"]);
    }

    #[test]
    fn empty_containers() {
        assert_eq!(parse_value("{}").unwrap(), Value::Object(Map::new()));
        assert_eq!(parse_value("[ ]").unwrap(), Value::Array(Vec::new()));
    }

    #[test]
    fn escapes_in_strings() {
        let value = parse_value(r#"{ a: 'it\'s', b: "x\ty" }"#).unwrap();
        assert_eq!(value["a"], "it's");
        assert_eq!(value["b"], "x\ty");
    }

    #[test]
    fn duplicate_key_rejected() {
        let err = parse_value("{\n a: 1,\n a: 2 }").unwrap_err();
        assert_eq!(err.to_string(), "line 3: duplicate key 'a'");
    }

    #[test]
    fn missing_colon_rejected() {
        let err = parse_value("{ a 1 }").unwrap_err();
        assert!(err.to_string().contains("expected ':' after key 'a'"));
    }

    #[test]
    fn bare_identifier_value_rejected() {
        let err = parse_value("{ next: FETCH }").unwrap_err();
        assert!(err
            .to_string()
            .contains("expected a value, found identifier 'FETCH'"));
    }

    #[test]
    fn unterminated_input_rejected() {
        let err = parse_value("{ a: [1, 2").unwrap_err();
        assert!(err.to_string().contains("unexpected end of input"));
    }

    #[test]
    fn trailing_tokens_rejected() {
        let err = parse_value("{} }").unwrap_err();
        assert!(err.to_string().contains("after end of document"));
    }

    #[test]
    fn hex_overflow_rejected() {
        let err = parse_value("{ a: 0x1FFFFFFFFFFFFFFFF }").unwrap_err();
        assert!(matches!(err, DocumentError::InvalidNumber { .. }));
    }

    #[test]
    fn nesting_within_limit() {
        let source = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse_value(&source).is_ok());
    }

    #[test]
    fn deep_nesting_rejected() {
        let err = parse_value(&"[".repeat(100_000)).unwrap_err();
        assert!(matches!(err, DocumentError::Syntax { line: 1, column: 129, .. }));
        assert!(err.to_string().contains("nesting deeper than 128 levels"));

        let source = format!("{}{}", "{ a: ".repeat(MAX_DEPTH + 1), "}".repeat(MAX_DEPTH + 1));
        assert!(parse_value(&source).is_err());
    }
}
