//! Script Backend Trait
//!
//! Defines the evaluator contract the session controller drives. A backend
//! owns tokenizing, parsing and reduction; the controller owns everything
//! around it (assembly, cancellation, readline brokering, output).

use futures::future::LocalBoxFuture;
use thiserror::Error;

use crate::backends::dev::repl::engine::broker::{ReadlineBroker, ReadlineError};
use crate::backends::dev::repl::engine::cancel::CancellationToken;
use crate::backends::dev::repl::engine::output::{Console, ConsoleLevel};
use crate::util::diagnostic::LogEntry;
use crate::util::span::Span;

/// What reducing one statement produced
#[derive(Debug, Clone, PartialEq)]
pub enum Reduced<V> {
    /// A value worth showing
    Value(V),
    /// Nothing to show
    Unit,
    /// The script asked to end the session
    ExitRequested,
}

/// Why reducing a statement did not produce a value
#[derive(Debug, Error)]
pub enum EvalError {
    /// A user-facing error with an optional source range
    #[error("{message}")]
    Script {
        message: String,
        range: Option<Span>,
    },
    /// The evaluation token was aborted
    #[error("evaluation cancelled")]
    Cancelled,
    /// Anything else; ends the evaluation
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EvalError {
    pub fn script(message: impl Into<String>) -> Self {
        EvalError::Script {
            message: message.into(),
            range: None,
        }
    }

    pub fn script_at(
        message: impl Into<String>,
        range: Span,
    ) -> Self {
        EvalError::Script {
            message: message.into(),
            range: Some(range),
        }
    }

    /// Attach a range if the error has none yet.
    pub fn or_at(
        self,
        range: Span,
    ) -> Self {
        match self {
            EvalError::Script {
                message,
                range: None,
            } => EvalError::Script {
                message,
                range: Some(range),
            },
            other => other,
        }
    }
}

impl From<ReadlineError> for EvalError {
    fn from(err: ReadlineError) -> Self {
        match err {
            ReadlineError::Cancelled => EvalError::Cancelled,
            ReadlineError::Closed => EvalError::Internal(anyhow::Error::new(err)),
        }
    }
}

/// A binding listed by `:bindings`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub summary: String,
}

/// Everything a reduction step may reach besides the environment.
///
/// Built once per logical statement. The token is the one that was current
/// when the statement started.
#[derive(Debug)]
pub struct EvalContext {
    token: CancellationToken,
    broker: ReadlineBroker,
    console: Console,
    warnings: Vec<LogEntry>,
}

impl EvalContext {
    pub fn new(
        token: CancellationToken,
        broker: ReadlineBroker,
        console: Console,
    ) -> Self {
        Self {
            token,
            broker,
            console,
            warnings: Vec::new(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_aborted()
    }

    /// `Err(Cancelled)` once the token is aborted.
    pub fn check_cancelled(&self) -> Result<(), EvalError> {
        if self.token.is_aborted() {
            Err(EvalError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Ask the user for a line through the broker.
    pub async fn readline(
        &self,
        prompt: impl Into<String>,
    ) -> Result<String, EvalError> {
        Ok(self.broker.request(prompt, &self.token).await?)
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn emit(
        &self,
        level: ConsoleLevel,
        text: impl Into<String>,
    ) {
        self.console.emit(level, text);
    }

    /// Record a non-fatal diagnostic for this statement.
    pub fn warn(
        &mut self,
        message: impl Into<String>,
        range: Option<Span>,
    ) {
        self.warnings.push(LogEntry::warning(message, range));
    }

    pub(crate) fn take_warnings(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.warnings)
    }
}

/// Script Backend Trait
///
/// Tokenize and parse are synchronous and report problems as diagnostics.
/// Reduction is asynchronous so it can wait on readline answers or timers,
/// and must check the context's token between steps.
pub trait ScriptBackend {
    type Token;
    type Statement;
    type Value;
    type Environment;

    /// Fresh top-level environment
    fn create_environment(&self) -> Self::Environment;

    fn tokenize(
        &self,
        text: &str,
    ) -> Result<Vec<Self::Token>, Vec<LogEntry>>;

    fn parse(
        &self,
        tokens: Vec<Self::Token>,
    ) -> Result<Vec<Self::Statement>, Vec<LogEntry>>;

    /// Reduce one statement against `environment`
    fn reduce<'a>(
        &'a self,
        environment: &'a mut Self::Environment,
        statement: &'a Self::Statement,
        context: &'a mut EvalContext,
    ) -> LocalBoxFuture<'a, Result<Reduced<Self::Value>, EvalError>>;

    fn format_value(
        &self,
        value: &Self::Value,
    ) -> String;

    /// Primary prompt for the current environment
    fn prompt(
        &self,
        environment: &Self::Environment,
    ) -> String;

    /// Bindings visible at top level
    fn bindings(
        &self,
        _environment: &Self::Environment,
    ) -> Vec<Binding> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::span::Position;

    #[test]
    fn test_readline_cancel_maps_to_cancelled() {
        assert!(matches!(
            EvalError::from(ReadlineError::Cancelled),
            EvalError::Cancelled
        ));
        assert!(matches!(
            EvalError::from(ReadlineError::Closed),
            EvalError::Internal(_)
        ));
    }

    #[test]
    fn test_or_at_keeps_existing_range() {
        let first = Span::point(Position::new(1, 2));
        let second = Span::point(Position::new(3, 4));

        let err = EvalError::script_at("boom", first).or_at(second);
        match err {
            EvalError::Script { range, .. } => assert_eq!(range, Some(first)),
            other => panic!("unexpected {:?}", other),
        }

        let err = EvalError::script("boom").or_at(second);
        match err {
            EvalError::Script { range, .. } => assert_eq!(range, Some(second)),
            other => panic!("unexpected {:?}", other),
        }
    }
}
