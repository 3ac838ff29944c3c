//! Token types

use std::fmt;

use crate::util::span::Span;

/// Token kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    Int(i64),
    Str(String),
    /// Identifier or keyword; keywords are resolved by the parser
    Word(String),
    /// End of a statement: a newline or `;`
    Newline,
}

impl fmt::Display for TokenKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Int(n) => write!(f, "integer {}", n),
            TokenKind::Str(s) => write!(f, "string {:?}", s),
            TokenKind::Word(w) => write!(f, "'{}'", w),
            TokenKind::Newline => write!(f, "end of statement"),
        }
    }
}

/// Token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        span: Span,
    ) -> Self {
        Self { kind, span }
    }
}
