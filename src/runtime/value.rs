//! Runtime values

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::frontend::Expr;
use crate::runtime::builtins::Builtin;

/// A user-defined procedure
#[derive(Debug)]
pub struct Closure {
    /// Name it was first bound to, for display
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Expr,
}

/// Evaluated arguments of one application
pub type Args = SmallVec<[Value; 4]>;

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Str(String),
    Bool(bool),
    Nil,
    Func(Arc<Closure>),
    Builtin(Builtin),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Nil => "nil",
            Value::Func(_) => "function",
            Value::Builtin(_) => "builtin",
        }
    }

    /// Only `false` and `nil` are false
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Nil)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Func(_) | Value::Builtin(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl PartialEq for Value {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Func(a), Value::Func(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::Func(closure) => match &closure.name {
                Some(name) => write!(f, "<fun {}/{}>", name, closure.params.len()),
                None => write!(f, "<fun/{}>", closure.params.len()),
            },
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name()),
        }
    }
}
