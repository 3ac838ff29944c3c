//! Abstract syntax tree

use std::fmt;

use crate::util::span::Span;

/// Expression kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Int(i64),
    Str(String),
    Bool(bool),
    Nil,
    Word(String),
    /// `(head arg...)`, or a top-level statement with several items
    List(Vec<Expr>),
}

/// Expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(
        kind: ExprKind,
        span: Span,
    ) -> Self {
        Self { kind, span }
    }

    pub fn as_word(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Word(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.kind {
            ExprKind::Int(n) => write!(f, "{}", n),
            ExprKind::Str(s) => write!(f, "{:?}", s),
            ExprKind::Bool(b) => write!(f, "{}", b),
            ExprKind::Nil => write!(f, "nil"),
            ExprKind::Word(w) => write!(f, "{}", w),
            ExprKind::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// One top-level statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub expr: Expr,
}

impl Statement {
    pub fn span(&self) -> Span {
        self.expr.span
    }

    /// A lone word, which is invoked if it names a procedure
    pub fn bare_word(&self) -> Option<&str> {
        self.expr.as_word()
    }
}
