//! Frontend pipeline
//!
//! This module contains the lexer and parser for the bundled command
//! language. Both report problems as diagnostics rather than stopping at the
//! first one.

use tracing::debug;

use crate::util::diagnostic::LogEntry;

pub mod lexer;
pub mod parser;

pub use lexer::{LexError, Token, TokenKind};
pub use parser::{Expr, ExprKind, ParseError, Statement, MAX_NESTING};

/// Tokenize, converting errors to diagnostics
pub fn tokenize(source: &str) -> Result<Vec<Token>, Vec<LogEntry>> {
    let tokens = lexer::tokenize(source)
        .map_err(|errors| errors.into_iter().map(LogEntry::from).collect::<Vec<_>>())?;
    debug!("Tokenized into {} tokens", tokens.len());
    Ok(tokens)
}

/// Parse, converting errors to diagnostics
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Statement>, Vec<LogEntry>> {
    let statements = parser::parse(tokens)
        .map_err(|errors| errors.into_iter().map(LogEntry::from).collect::<Vec<_>>())?;
    debug!("Parsed {} statements", statements.len());
    Ok(statements)
}
