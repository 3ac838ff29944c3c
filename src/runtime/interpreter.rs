//! Tree-walking interpreter for the bundled command language
//!
//! Procedures see their own parameters and the globals; there are no
//! captured environments. Cancellation is checked before every application.

use std::sync::Arc;

use futures::future::{FutureExt, LocalBoxFuture};
use indexmap::IndexMap;
use tracing::trace;

use crate::backends::dev::repl::backend_trait::{
    Binding, EvalContext, EvalError, Reduced, ScriptBackend,
};
use crate::frontend::{self, Expr, ExprKind, Statement, Token};
use crate::runtime::builtins::Builtin;
use crate::runtime::value::{Args, Closure, Value};
use crate::util::diagnostic::LogEntry;
use crate::util::span::Span;

/// Maximum nesting of procedure calls
pub const MAX_CALL_DEPTH: usize = 128;

/// Maximum nesting of expressions under evaluation, across calls
pub const MAX_EVAL_DEPTH: usize = 256;

const SPECIAL_FORMS: [&str; 4] = ["set", "fun", "if", "do"];

/// Non-local exits while evaluating
#[derive(Debug)]
pub(crate) enum Control {
    /// `exit` was called
    Exit,
    Error(EvalError),
}

impl From<EvalError> for Control {
    fn from(err: EvalError) -> Self {
        Control::Error(err)
    }
}

impl Control {
    /// Give a range to errors that have none
    fn at(
        self,
        span: Span,
    ) -> Self {
        match self {
            Control::Error(err) => Control::Error(err.or_at(span)),
            exit => exit,
        }
    }
}

/// Global bindings plus the active call frames
#[derive(Debug, Default)]
pub struct Environment {
    globals: IndexMap<String, Value>,
    frames: Vec<IndexMap<String, Value>>,
    /// Expressions currently being evaluated
    nesting: usize,
}

impl Environment {
    pub fn lookup(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.frames
            .last()
            .and_then(|frame| frame.get(name))
            .or_else(|| self.globals.get(name))
    }

    /// Bind in the innermost frame, or globally at top level
    pub fn define(
        &mut self,
        name: impl Into<String>,
        value: Value,
    ) {
        match self.frames.last_mut() {
            Some(frame) => frame.insert(name.into(), value),
            None => self.globals.insert(name.into(), value),
        };
    }

    /// Globals in definition order
    pub fn globals(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.globals.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Reference backend
#[derive(Debug, Clone)]
pub struct Runtime {
    default_prompt: String,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_prompt("> ")
    }

    /// Prompt used unless a `prompt` string is bound
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            default_prompt: prompt.into(),
        }
    }

    fn eval<'a>(
        &'a self,
        env: &'a mut Environment,
        expr: &'a Expr,
        ctx: &'a mut EvalContext,
    ) -> LocalBoxFuture<'a, Result<Value, Control>> {
        async move {
            if env.nesting >= MAX_EVAL_DEPTH {
                return Err(EvalError::script_at(
                    format!("maximum evaluation depth ({}) exceeded", MAX_EVAL_DEPTH),
                    expr.span,
                )
                .into());
            }
            env.nesting += 1;
            let value = self.eval_expr(env, expr, ctx).await;
            env.nesting -= 1;
            value
        }
        .boxed_local()
    }

    async fn eval_expr(
        &self,
        env: &mut Environment,
        expr: &Expr,
        ctx: &mut EvalContext,
    ) -> Result<Value, Control> {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Nil => Ok(Value::Nil),
            ExprKind::Word(name) => self.resolve(env, name, expr.span),
            ExprKind::List(items) => {
                let head = &items[0];
                if let Some(form) = head.as_word().filter(|w| SPECIAL_FORMS.contains(w)) {
                    return self
                        .special(env, form, items, ctx)
                        .await
                        .map_err(|c| c.at(expr.span));
                }

                ctx.check_cancelled()?;
                let callee = self.eval(env, head, ctx).await?;
                let mut args = Args::with_capacity(items.len() - 1);
                for item in &items[1..] {
                    args.push(self.eval(env, item, ctx).await?);
                }
                self.apply(env, callee, args, expr.span, ctx).await
            }
        }
    }

    fn resolve(
        &self,
        env: &Environment,
        name: &str,
        span: Span,
    ) -> Result<Value, Control> {
        if let Some(value) = env.lookup(name) {
            return Ok(value.clone());
        }
        if let Some(builtin) = Builtin::from_name(name) {
            return Ok(Value::Builtin(builtin));
        }
        let message = if SPECIAL_FORMS.contains(&name) {
            format!("'{}' is a special form and cannot be used as a value", name)
        } else {
            format!("unbound name '{}'", name)
        };
        Err(EvalError::script_at(message, span).into())
    }

    fn apply<'a>(
        &'a self,
        env: &'a mut Environment,
        callee: Value,
        args: Args,
        span: Span,
        ctx: &'a mut EvalContext,
    ) -> LocalBoxFuture<'a, Result<Value, Control>> {
        async move {
            ctx.check_cancelled()?;
            match callee {
                Value::Builtin(builtin) => {
                    trace!(builtin = builtin.name(), args = args.len(), "apply");
                    builtin.call(args, ctx).await.map_err(|c| c.at(span))
                }
                Value::Func(closure) => {
                    let name = closure.name.as_deref().unwrap_or("function");
                    if args.len() != closure.params.len() {
                        return Err(EvalError::script_at(
                            format!(
                                "{}: expected {} argument(s), got {}",
                                name,
                                closure.params.len(),
                                args.len()
                            ),
                            span,
                        )
                        .into());
                    }
                    if env.depth() >= MAX_CALL_DEPTH {
                        return Err(EvalError::script_at(
                            format!("maximum call depth ({}) exceeded", MAX_CALL_DEPTH),
                            span,
                        )
                        .into());
                    }

                    let frame = closure.params.iter().cloned().zip(args).collect();
                    env.frames.push(frame);
                    let result = self.eval(env, &closure.body, ctx).await;
                    env.frames.pop();
                    result
                }
                other => Err(EvalError::script_at(
                    format!("cannot call a value of type {}", other.type_name()),
                    span,
                )
                .into()),
            }
        }
        .boxed_local()
    }

    async fn special(
        &self,
        env: &mut Environment,
        form: &str,
        items: &[Expr],
        ctx: &mut EvalContext,
    ) -> Result<Value, Control> {
        let args = &items[1..];
        match form {
            "set" => {
                let [target, value] = args else {
                    return Err(EvalError::script("set: expected a name and a value").into());
                };
                let Some(name) = target.as_word() else {
                    return Err(EvalError::script_at("set: expected a name", target.span).into());
                };
                if SPECIAL_FORMS.contains(&name) {
                    return Err(EvalError::script_at(
                        format!("set: '{}' is a special form", name),
                        target.span,
                    )
                    .into());
                }
                if env.depth() == 0 && Builtin::from_name(name).is_some() {
                    ctx.warn(format!("shadowing builtin '{}'", name), Some(target.span));
                }

                let value = match function_literal(value) {
                    Some(params_and_body) => self.closure(Some(name), params_and_body)?,
                    None => self.eval(env, value, ctx).await?,
                };
                env.define(name, value);
                Ok(Value::Nil)
            }
            "fun" => self.closure(None, args).map_err(Control::from),
            "if" => {
                let (cond, then, otherwise) = match args {
                    [c, t] => (c, t, None),
                    [c, t, e] => (c, t, Some(e)),
                    _ => {
                        return Err(EvalError::script(
                            "if: expected a condition, a branch and an optional else branch",
                        )
                        .into())
                    }
                };
                if self.eval(env, cond, ctx).await?.is_truthy() {
                    self.eval(env, then, ctx).await
                } else if let Some(otherwise) = otherwise {
                    self.eval(env, otherwise, ctx).await
                } else {
                    Ok(Value::Nil)
                }
            }
            "do" => {
                let mut last = Value::Nil;
                for expr in args {
                    last = self.eval(env, expr, ctx).await?;
                }
                Ok(last)
            }
            _ => Err(EvalError::Internal(anyhow::anyhow!("unknown special form '{}'", form)).into()),
        }
    }

    /// `params... body`
    fn closure(
        &self,
        name: Option<&str>,
        args: &[Expr],
    ) -> Result<Value, EvalError> {
        let Some((body, params)) = args.split_last() else {
            return Err(EvalError::script("fun: expected parameters and a body"));
        };
        let mut names: Vec<String> = Vec::with_capacity(params.len());
        for param in params {
            let Some(param_name) = param.as_word() else {
                return Err(EvalError::script_at("fun: parameters must be names", param.span));
            };
            if names.iter().any(|existing| existing == param_name) {
                return Err(EvalError::script_at(
                    format!("fun: duplicate parameter '{}'", param_name),
                    param.span,
                ));
            }
            names.push(param_name.to_string());
        }
        Ok(Value::Func(Arc::new(Closure {
            name: name.map(str::to_string),
            params: names,
            body: body.clone(),
        })))
    }
}

/// The `params... body` of a `(fun ...)` literal
fn function_literal(expr: &Expr) -> Option<&[Expr]> {
    match &expr.kind {
        ExprKind::List(items) if items[0].as_word() == Some("fun") => Some(&items[1..]),
        _ => None,
    }
}

impl ScriptBackend for Runtime {
    type Token = Token;
    type Statement = Statement;
    type Value = Value;
    type Environment = Environment;

    fn create_environment(&self) -> Environment {
        Environment::default()
    }

    fn tokenize(
        &self,
        text: &str,
    ) -> Result<Vec<Token>, Vec<LogEntry>> {
        frontend::tokenize(text)
    }

    fn parse(
        &self,
        tokens: Vec<Token>,
    ) -> Result<Vec<Statement>, Vec<LogEntry>> {
        frontend::parse(tokens)
    }

    fn reduce<'a>(
        &'a self,
        environment: &'a mut Environment,
        statement: &'a Statement,
        context: &'a mut EvalContext,
    ) -> LocalBoxFuture<'a, Result<Reduced<Value>, EvalError>> {
        async move {
            // State left behind by a dropped evaluation
            environment.frames.clear();
            environment.nesting = 0;

            let callee = match statement.bare_word() {
                Some(name) => self
                    .resolve(environment, name, statement.span())
                    .ok()
                    .filter(Value::is_callable),
                None => None,
            };
            let result = match callee {
                Some(callee) => {
                    self.apply(environment, callee, Args::new(), statement.span(), context)
                        .await
                }
                None => self.eval(environment, &statement.expr, context).await,
            };

            match result {
                Ok(Value::Nil) => Ok(Reduced::Unit),
                Ok(value) => Ok(Reduced::Value(value)),
                Err(Control::Exit) => Ok(Reduced::ExitRequested),
                Err(Control::Error(err)) => Err(err.or_at(statement.span())),
            }
        }
        .boxed_local()
    }

    fn format_value(
        &self,
        value: &Value,
    ) -> String {
        value.to_string()
    }

    fn prompt(
        &self,
        environment: &Environment,
    ) -> String {
        match environment.lookup("prompt") {
            Some(Value::Str(prompt)) => prompt.clone(),
            _ => self.default_prompt.clone(),
        }
    }

    fn bindings(
        &self,
        environment: &Environment,
    ) -> Vec<Binding> {
        environment
            .globals()
            .map(|(name, value)| Binding {
                name: name.to_string(),
                summary: match value {
                    Value::Str(s) => format!("{:?}", s),
                    other => other.to_string(),
                },
            })
            .collect()
    }
}
