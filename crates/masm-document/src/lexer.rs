//! Lexer for microassembly descriptions.
//!
//! Uses Logos for tokenization. Comments are dropped here so the parser only
//! ever sees structural tokens.

use logos::{Logos, Span};

use crate::error::DocumentError;

/// Token type for the microassembly dialect
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token<'src> {
    // === Comments ===
    #[regex(r"//[^\n]*", logos::skip)]
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/", logos::skip)]
    Comment,

    // === Keywords ===
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // === Literals ===
    /// Hexadecimal integer literal (`0x1F`)
    #[regex(r"0[xX][0-9a-fA-F]+", |lex| lex.slice())]
    HexInteger(&'src str),

    /// Decimal integer literal (may have sign)
    #[regex(r"-?[0-9]+", |lex| lex.slice())]
    Integer(&'src str),

    /// Float literal
    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice())]
    Float(&'src str),

    /// Quoted string, single or double quotes, without the quotes
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        &s[1..s.len()-1]
    })]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| {
        let s = lex.slice();
        &s[1..s.len()-1]
    })]
    String(&'src str),

    /// Bare identifier, accepted as a mapping key
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice())]
    Ident(&'src str),

    // === Punctuation ===
    #[token("{")]
    BraceOpen,
    #[token("}")]
    BraceClose,
    #[token("[")]
    BracketOpen,
    #[token("]")]
    BracketClose,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
}

impl Token<'_> {
    /// Short human-readable description used in syntax errors.
    pub fn describe(&self) -> String {
        match self {
            Token::Comment => "comment".into(),
            Token::True => "'true'".into(),
            Token::False => "'false'".into(),
            Token::Null => "'null'".into(),
            Token::HexInteger(s) | Token::Integer(s) | Token::Float(s) => format!("number {s}"),
            Token::String(s) => format!("string '{s}'"),
            Token::Ident(s) => format!("identifier '{s}'"),
            Token::BraceOpen => "'{'".into(),
            Token::BraceClose => "'}'".into(),
            Token::BracketOpen => "'['".into(),
            Token::BracketClose => "']'".into(),
            Token::Colon => "':'".into(),
            Token::Comma => "','".into(),
        }
    }
}

/// A token with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(token: T, span: Span) -> Self {
        Self { token, span }
    }
}

/// Tokenize source text into a vector of spanned tokens
pub fn lex(source: &str) -> Result<Vec<Spanned<Token<'_>>>, DocumentError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(Token::Comment) => {}
            Ok(token) => tokens.push(Spanned::new(token, lexer.span())),
            Err(()) => {
                let (line, column) = line_column(source, lexer.span().start);
                return Err(DocumentError::Lex {
                    line,
                    column,
                    slice: lexer.slice().to_string(),
                });
            }
        }
    }

    Ok(tokens)
}

/// 1-based line and column of a byte offset.
pub fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(nl) => offset - nl,
        None => offset + 1,
    };
    (line, column)
}
