//! Parser module
//!
//! A statement is a run of expressions on one line. Parenthesised groups may
//! span lines; newlines inside them are ignored.

pub mod ast;

pub use ast::{Expr, ExprKind, Statement};

use crate::frontend::lexer::{Token, TokenKind};
use crate::util::diagnostic::LogEntry;
use crate::util::span::Span;

/// Deepest parenthesis nesting accepted
pub const MAX_NESTING: usize = 128;

/// Parse error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unclosed '('")]
    UnclosedParen { open: Span },
    #[error("unexpected ')'")]
    UnexpectedCloseParen { span: Span },
    #[error("parentheses nested deeper than {}", MAX_NESTING)]
    NestingTooDeep { open: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnclosedParen { open } | ParseError::NestingTooDeep { open } => *open,
            ParseError::UnexpectedCloseParen { span } => *span,
        }
    }
}

impl From<ParseError> for LogEntry {
    fn from(err: ParseError) -> Self {
        LogEntry::error(err.to_string(), Some(err.span()))
    }
}

/// Parse a token stream into statements.
///
/// Stray `)` are reported and skipped so later errors still surface; an
/// unclosed `(` ends parsing. A group nested past [`MAX_NESTING`] is reported
/// once and the statement's outermost group is skipped.
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Statement>, Vec<ParseError>> {
    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
        errors: Vec::new(),
        depth: 0,
    };
    let statements = parser.program();
    if parser.errors.is_empty() {
        Ok(statements)
    } else {
        Err(parser.errors)
    }
}

struct Parser {
    tokens: std::iter::Peekable<std::vec::IntoIter<Token>>,
    errors: Vec<ParseError>,
    /// Groups currently open
    depth: usize,
}

impl Parser {
    fn program(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            while self.eat_newline() {}
            if self.tokens.peek().is_none() {
                return statements;
            }
            if let Some(statement) = self.statement() {
                statements.push(statement);
            }
        }
    }

    fn eat_newline(&mut self) -> bool {
        self.tokens
            .next_if(|token| token.kind == TokenKind::Newline)
            .is_some()
    }

    fn statement(&mut self) -> Option<Statement> {
        let mut items = Vec::new();
        while let Some(token) = self.tokens.peek() {
            if token.kind == TokenKind::Newline {
                break;
            }
            match self.expr(false) {
                Some(expr) => items.push(expr),
                None if self.tokens.peek().is_none() => break,
                None => {}
            }
        }

        match items.len() {
            0 => None,
            1 => items.pop().map(|expr| Statement { expr }),
            _ => {
                let span = items[0].span.merge(&items[items.len() - 1].span);
                Some(Statement {
                    expr: Expr::new(ExprKind::List(items), span),
                })
            }
        }
    }

    /// One expression; `None` after an error or at a group's `)`.
    fn expr(
        &mut self,
        in_group: bool,
    ) -> Option<Expr> {
        let token = self.tokens.next()?;
        let kind = match token.kind {
            TokenKind::Int(n) => ExprKind::Int(n),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::Word(w) => match w.as_str() {
                "true" => ExprKind::Bool(true),
                "false" => ExprKind::Bool(false),
                "nil" => ExprKind::Nil,
                _ => ExprKind::Word(w),
            },
            TokenKind::LParen => return self.group(token.span),
            TokenKind::RParen => {
                if !in_group {
                    self.errors
                        .push(ParseError::UnexpectedCloseParen { span: token.span });
                }
                return None;
            }
            // Only reachable inside a group
            TokenKind::Newline => return None,
        };
        Some(Expr::new(kind, token.span))
    }

    fn group(
        &mut self,
        open: Span,
    ) -> Option<Expr> {
        if self.depth >= MAX_NESTING {
            self.errors.push(ParseError::NestingTooDeep { open });
            self.skip_open_groups(self.depth + 1);
            return None;
        }
        self.depth += 1;
        let group = self.group_items(open);
        self.depth -= 1;
        group
    }

    /// Consume tokens until `open` groups have been closed
    fn skip_open_groups(
        &mut self,
        mut open: usize,
    ) {
        while open > 0 {
            match self.tokens.next().map(|token| token.kind) {
                Some(TokenKind::LParen) => open += 1,
                Some(TokenKind::RParen) => open -= 1,
                Some(_) => {}
                None => return,
            }
        }
    }

    fn group_items(
        &mut self,
        open: Span,
    ) -> Option<Expr> {
        let mut items = Vec::new();
        loop {
            while self.eat_newline() {}
            let Some(next) = self.tokens.peek() else {
                self.errors.push(ParseError::UnclosedParen { open });
                return None;
            };
            if next.kind == TokenKind::RParen {
                let close = next.span;
                self.tokens.next();
                let span = open.merge(&close);
                let kind = if items.is_empty() {
                    ExprKind::Nil
                } else {
                    ExprKind::List(items)
                };
                return Some(Expr::new(kind, span));
            }
            match self.expr(true) {
                Some(expr) => items.push(expr),
                // Nested group left unclosed
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;

    fn parse_str(source: &str) -> Result<Vec<Statement>, Vec<ParseError>> {
        parse(tokenize(source).unwrap())
    }

    #[test]
    fn test_statement_is_application() {
        let statements = parse_str("set x 10").unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].expr.to_string(), "(set x 10)");
        assert_eq!(statements[0].span().to_string(), "1:1:1:8");
    }

    #[test]
    fn test_bare_word_and_literals() {
        let statements = parse_str("x\ntrue; nil").unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0].bare_word(), Some("x"));
        assert_eq!(statements[1].expr.kind, ExprKind::Bool(true));
        assert_eq!(statements[2].expr.kind, ExprKind::Nil);
    }

    #[test]
    fn test_groups_span_lines() {
        let statements = parse_str("set f (fun n\n  (mul n 2))\nf 3").unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].expr.to_string(), "(set f (fun n (mul n 2)))");
        assert_eq!(statements[1].expr.to_string(), "(f 3)");
    }

    #[test]
    fn test_unclosed_paren() {
        let errors = parse_str("set fib (fun n").unwrap_err();
        assert_eq!(errors, vec![ParseError::UnclosedParen {
            open: tokenize("set fib (").unwrap()[2].span,
        }]);
        assert_eq!(errors[0].span().to_string(), "1:9");
    }

    #[test]
    fn test_stray_close_paren_reported() {
        let errors = parse_str("add 1 2)\n)").unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ParseError::UnexpectedCloseParen { .. }));
    }

    #[test]
    fn test_nesting_limit_reported_once() {
        let depth = MAX_NESTING + 1;
        let source = format!("{}1{}\nadd 1 2", "(".repeat(depth), ")".repeat(depth));
        let errors = parse_str(&source).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ParseError::NestingTooDeep { .. }));
        assert_eq!(errors[0].span().to_string(), format!("1:{}", MAX_NESTING + 1));

        let limit = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(parse_str(&limit).is_ok());
    }

    #[test]
    fn test_empty_group_is_nil() {
        let statements = parse_str("()").unwrap();
        assert_eq!(statements[0].expr.kind, ExprKind::Nil);
    }
}
