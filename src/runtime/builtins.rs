//! Builtin procedures
//!
//! Builtins are not stored in the environment; a name that is not bound
//! falls back to the builtin of the same name.

use std::time::Duration;

use crate::backends::dev::repl::backend_trait::{EvalContext, EvalError};
use crate::backends::dev::repl::engine::ConsoleLevel;
use crate::runtime::interpreter::Control;
use crate::runtime::value::{Args, Value};

/// Builtin procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Lt,
    Gt,
    Not,
    Concat,
    Str,
    Len,
    Print,
    Log,
    Info,
    Warn,
    Error,
    Readline,
    Sleep,
    Fail,
    Exit,
}

const ALL: [Builtin; 21] = [
    Builtin::Add,
    Builtin::Sub,
    Builtin::Mul,
    Builtin::Div,
    Builtin::Mod,
    Builtin::Eq,
    Builtin::Lt,
    Builtin::Gt,
    Builtin::Not,
    Builtin::Concat,
    Builtin::Str,
    Builtin::Len,
    Builtin::Print,
    Builtin::Log,
    Builtin::Info,
    Builtin::Warn,
    Builtin::Error,
    Builtin::Readline,
    Builtin::Sleep,
    Builtin::Fail,
    Builtin::Exit,
];

impl Builtin {
    pub fn all() -> impl Iterator<Item = Builtin> {
        ALL.into_iter()
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::all().find(|builtin| builtin.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Add => "add",
            Builtin::Sub => "sub",
            Builtin::Mul => "mul",
            Builtin::Div => "div",
            Builtin::Mod => "mod",
            Builtin::Eq => "eq",
            Builtin::Lt => "lt",
            Builtin::Gt => "gt",
            Builtin::Not => "not",
            Builtin::Concat => "concat",
            Builtin::Str => "str",
            Builtin::Len => "len",
            Builtin::Print => "print",
            Builtin::Log => "log",
            Builtin::Info => "info",
            Builtin::Warn => "warn",
            Builtin::Error => "error",
            Builtin::Readline => "readline",
            Builtin::Sleep => "sleep",
            Builtin::Fail => "fail",
            Builtin::Exit => "exit",
        }
    }

    pub(crate) async fn call(
        self,
        args: Args,
        context: &mut EvalContext,
    ) -> Result<Value, Control> {
        match self {
            Builtin::Add => {
                let sum = self.fold_ints(&args, 0, i64::checked_add)?;
                Ok(Value::Int(sum))
            }
            Builtin::Mul => {
                let product = self.fold_ints(&args, 1, i64::checked_mul)?;
                Ok(Value::Int(product))
            }
            Builtin::Sub => {
                self.arity(&args, 1, None)?;
                let first = self.int(&args[0])?;
                if args.len() == 1 {
                    return first
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| self.overflow().into());
                }
                let rest = self.fold_ints(&args[1..], first, i64::checked_sub)?;
                Ok(Value::Int(rest))
            }
            Builtin::Div | Builtin::Mod => {
                self.arity(&args, 2, Some(2))?;
                let (a, b) = (self.int(&args[0])?, self.int(&args[1])?);
                if b == 0 {
                    return Err(EvalError::script("division by zero").into());
                }
                let result = if self == Builtin::Div {
                    a.checked_div(b)
                } else {
                    a.checked_rem(b)
                };
                result.map(Value::Int).ok_or_else(|| self.overflow().into())
            }
            Builtin::Eq => {
                self.arity(&args, 2, Some(2))?;
                Ok(Value::Bool(args[0] == args[1]))
            }
            Builtin::Lt | Builtin::Gt => {
                self.arity(&args, 2, Some(2))?;
                let ordering = match (&args[0], &args[1]) {
                    (Value::Int(a), Value::Int(b)) => a.cmp(b),
                    (Value::Str(a), Value::Str(b)) => a.cmp(b),
                    (a, b) => {
                        return Err(EvalError::script(format!(
                            "{}: cannot compare {} with {}",
                            self.name(),
                            a.type_name(),
                            b.type_name()
                        ))
                        .into())
                    }
                };
                Ok(Value::Bool(if self == Builtin::Lt {
                    ordering.is_lt()
                } else {
                    ordering.is_gt()
                }))
            }
            Builtin::Not => {
                self.arity(&args, 1, Some(1))?;
                Ok(Value::Bool(!args[0].is_truthy()))
            }
            Builtin::Concat => Ok(Value::Str(args.iter().map(Value::to_string).collect())),
            Builtin::Str => {
                self.arity(&args, 1, Some(1))?;
                Ok(Value::Str(args[0].to_string()))
            }
            Builtin::Len => {
                self.arity(&args, 1, Some(1))?;
                match &args[0] {
                    Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                    other => Err(self.type_error("string", other).into()),
                }
            }
            Builtin::Print | Builtin::Log => self.emit(ConsoleLevel::Log, &args, context),
            Builtin::Info => self.emit(ConsoleLevel::Info, &args, context),
            Builtin::Warn => self.emit(ConsoleLevel::Warn, &args, context),
            Builtin::Error => self.emit(ConsoleLevel::Error, &args, context),
            Builtin::Readline => {
                self.arity(&args, 0, Some(1))?;
                let prompt = args.first().map(Value::to_string).unwrap_or_default();
                let line = context.readline(prompt).await?;
                Ok(Value::Str(line))
            }
            Builtin::Sleep => {
                self.arity(&args, 1, Some(1))?;
                let millis = u64::try_from(self.int(&args[0])?).map_err(|_| {
                    EvalError::script("sleep: duration must not be negative")
                })?;
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(millis)) => Ok(Value::Nil),
                    _ = context.token().cancelled() => Err(EvalError::Cancelled.into()),
                }
            }
            Builtin::Fail => {
                self.arity(&args, 0, Some(1))?;
                let message = args
                    .first()
                    .map(Value::to_string)
                    .unwrap_or_else(|| "failed".to_string());
                Err(EvalError::script(message).into())
            }
            Builtin::Exit => {
                self.arity(&args, 0, Some(0))?;
                Err(Control::Exit)
            }
        }
    }

    fn emit(
        self,
        level: ConsoleLevel,
        args: &[Value],
        context: &EvalContext,
    ) -> Result<Value, Control> {
        let text = args
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        context.emit(level, text);
        Ok(Value::Nil)
    }

    fn arity(
        self,
        args: &[Value],
        min: usize,
        max: Option<usize>,
    ) -> Result<(), EvalError> {
        let count = args.len();
        let expected = match max {
            Some(max) if min == max => min.to_string(),
            Some(max) => format!("{} to {}", min, max),
            None => format!("at least {}", min),
        };
        if count < min || max.is_some_and(|max| count > max) {
            return Err(EvalError::script(format!(
                "{}: expected {} argument(s), got {}",
                self.name(),
                expected,
                count
            )));
        }
        Ok(())
    }

    fn int(
        self,
        value: &Value,
    ) -> Result<i64, EvalError> {
        match value {
            Value::Int(n) => Ok(*n),
            other => Err(self.type_error("int", other)),
        }
    }

    fn fold_ints(
        self,
        args: &[Value],
        init: i64,
        op: fn(i64, i64) -> Option<i64>,
    ) -> Result<i64, EvalError> {
        let mut acc = init;
        for arg in args {
            acc = op(acc, self.int(arg)?).ok_or_else(|| self.overflow())?;
        }
        Ok(acc)
    }

    fn type_error(
        self,
        expected: &str,
        got: &Value,
    ) -> EvalError {
        EvalError::script(format!(
            "{}: expected {}, got {}",
            self.name(),
            expected,
            got.type_name()
        ))
    }

    fn overflow(self) -> EvalError {
        EvalError::script(format!("{}: integer overflow", self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for builtin in Builtin::all() {
            assert_eq!(Builtin::from_name(builtin.name()), Some(builtin));
        }
        assert_eq!(Builtin::from_name("set"), None);
    }
}
