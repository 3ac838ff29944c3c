//! Session Controller
//!
//! Drives a [`ScriptBackend`] one logical statement at a time: tokenize,
//! parse, then reduce each statement under the cancellation token that was
//! current when the statement started, collecting results and console
//! output along the way.

use std::time::Instant;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use super::broker::{ActiveRequest, BrokerError, ReadlineBroker};
use super::cancel::{CancellationManager, CancellationToken};
use super::context::{EvaluationSession, SessionStats};
use super::input::{InputAssembler, LogicalStatement, Submission};
use super::output::{Console, OutputCollector, OutputFragment};
use crate::backends::dev::repl::backend_trait::{
    Binding, EvalContext, EvalError, Reduced, ScriptBackend,
};
use crate::util::diagnostic::{has_errors, LogEntry};

/// Result of evaluating one logical statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Merged transcript text, `None` when the statement failed or was
    /// cancelled
    pub output: Option<String>,
    /// Diagnostics for this statement
    pub logs: Vec<LogEntry>,
    /// A statement asked to end the session
    pub should_exit: bool,
    /// The evaluation was interrupted
    pub cancelled: bool,
    /// Every fragment in arrival order
    pub fragments: Vec<OutputFragment>,
}

impl Evaluation {
    fn rejected(logs: Vec<LogEntry>) -> Self {
        Self {
            logs,
            ..Self::default()
        }
    }

    /// Produced output without errors
    pub fn is_success(&self) -> bool {
        self.output.is_some() && !has_errors(&self.logs)
    }

    pub fn has_errors(&self) -> bool {
        has_errors(&self.logs)
    }
}

/// Outcome of feeding one physical line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// The line was continued; show the continuation prompt
    Continuation,
    Evaluated(Evaluation),
}

/// Errors that end an evaluation instead of being reported as diagnostics
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("evaluator failed: {0:#}")]
    Evaluator(anyhow::Error),
    #[error("session has exited")]
    Terminated,
}

/// Session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// A continued statement is being assembled
    Buffering,
    Evaluating,
    /// Terminal; every further statement is refused
    Exited,
}

/// Cloneable handle for the parts of the controller a UI needs while an
/// evaluation holds the controller itself.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    cancellation: CancellationManager,
    broker: ReadlineBroker,
}

impl ControlHandle {
    /// Retire the current token. Returns the retired token.
    pub fn interrupt(&self) -> CancellationToken {
        self.cancellation.interrupt()
    }

    /// Answer the active readline request
    pub fn submit_readline_answer(
        &self,
        text: impl Into<String>,
    ) -> Result<(), BrokerError> {
        self.broker.answer(text)
    }

    pub fn active_request(&self) -> Option<ActiveRequest> {
        self.broker.active()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ActiveRequest>> {
        self.broker.subscribe()
    }
}

/// Session Controller
///
/// Owns the backend, the session state and the shared cancellation and
/// readline machinery.
pub struct SessionController<B: ScriptBackend> {
    backend: B,
    session: EvaluationSession<B::Environment>,
    assembler: InputAssembler,
    cancellation: CancellationManager,
    broker: ReadlineBroker,
    console: Console,
    state: SessionState,
    continuation_prompt: String,
}

impl<B: ScriptBackend> std::fmt::Debug for SessionController<B> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("stats", &self.session.stats())
            .field("broker", &self.broker)
            .finish()
    }
}

impl<B: ScriptBackend> SessionController<B> {
    pub fn new(backend: B) -> Self {
        let environment = backend.create_environment();
        Self {
            backend,
            session: EvaluationSession::new(environment),
            assembler: InputAssembler::new(),
            cancellation: CancellationManager::new(),
            broker: ReadlineBroker::new(),
            console: Console::new(),
            state: SessionState::Idle,
            continuation_prompt: "..".to_string(),
        }
    }

    /// Prompt shown while a continued statement is assembled
    pub fn with_continuation_prompt(
        mut self,
        prompt: impl Into<String>,
    ) -> Self {
        self.continuation_prompt = prompt.into();
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.backend.bindings(self.session.environment())
    }

    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            cancellation: self.cancellation.clone(),
            broker: self.broker.clone(),
        }
    }

    /// Console routed into each statement's output
    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Primary prompt, computed by the backend
    pub fn prompt(&self) -> String {
        self.backend.prompt(self.session.environment())
    }

    pub fn continuation_prompt(&self) -> &str {
        &self.continuation_prompt
    }

    /// Prompt for the next physical line
    pub fn current_prompt(&self) -> String {
        if self.assembler.is_buffering() {
            self.continuation_prompt.clone()
        } else {
            self.prompt()
        }
    }

    /// Retire the current token and drop any half-assembled statement.
    pub fn interrupt(&mut self) -> CancellationToken {
        self.assembler.reset();
        if self.state == SessionState::Buffering {
            self.state = SessionState::Idle;
        }
        self.cancellation.interrupt()
    }

    pub fn submit_readline_answer(
        &self,
        text: impl Into<String>,
    ) -> Result<(), BrokerError> {
        self.broker.answer(text)
    }

    /// Start over with a fresh environment.
    pub fn reset_environment(&mut self) {
        let environment = self.backend.create_environment();
        self.session.reset(environment);
        self.assembler.reset();
        if self.state != SessionState::Exited {
            self.state = SessionState::Idle;
        }
    }

    /// Tokenize and parse only.
    pub fn check(
        &self,
        text: &str,
    ) -> Vec<LogEntry> {
        match self.backend.tokenize(text).and_then(|tokens| self.backend.parse(tokens)) {
            Ok(_) => Vec::new(),
            Err(entries) => entries,
        }
    }

    /// Feed one physical line to the assembler without evaluating.
    ///
    /// Returns the logical statement once a line without the continuation
    /// marker arrives.
    pub fn assemble(
        &mut self,
        line: &str,
    ) -> Result<Option<LogicalStatement>, SessionError> {
        if self.state == SessionState::Exited {
            return Err(SessionError::Terminated);
        }
        match self.assembler.submit(line) {
            Submission::Pending => {
                self.state = SessionState::Buffering;
                Ok(None)
            }
            Submission::Ready(statement) => {
                self.state = SessionState::Idle;
                Ok(Some(statement))
            }
        }
    }

    /// Feed one physical line; evaluates once the statement is complete.
    pub async fn submit_line(
        &mut self,
        line: &str,
    ) -> Result<LineOutcome, SessionError> {
        match self.assemble(line)? {
            None => Ok(LineOutcome::Continuation),
            Some(statement) => {
                let evaluation = self.evaluate_line(statement.text()).await?;
                Ok(LineOutcome::Evaluated(evaluation))
            }
        }
    }

    /// Evaluate a logical statement, buffering its output.
    pub async fn evaluate_line(
        &mut self,
        text: &str,
    ) -> Result<Evaluation, SessionError> {
        self.evaluate(text, OutputCollector::buffered()).await
    }

    /// Evaluate a logical statement, sending each fragment to `tx` as soon
    /// as it is produced.
    pub async fn evaluate_streaming(
        &mut self,
        text: &str,
        tx: mpsc::UnboundedSender<OutputFragment>,
    ) -> Result<Evaluation, SessionError> {
        self.evaluate(text, OutputCollector::streaming(tx)).await
    }

    async fn evaluate(
        &mut self,
        text: &str,
        mut collector: OutputCollector,
    ) -> Result<Evaluation, SessionError> {
        if self.state == SessionState::Exited {
            return Err(SessionError::Terminated);
        }

        let started = Instant::now();
        self.session.sink_mut().clear();

        let parsed = self
            .backend
            .tokenize(text)
            .and_then(|tokens| self.backend.parse(tokens));
        let statements = match parsed {
            Ok(statements) => statements,
            Err(entries) => {
                debug!(count = entries.len(), "statement rejected before reduction");
                self.session.sink_mut().extend(entries);
                self.session.record(started.elapsed());
                return Ok(Evaluation::rejected(self.session.sink_mut().take()));
            }
        };

        let token = self.cancellation.current_token();
        trace!(token = token.id(), statements = statements.len(), "evaluating");
        let mut running = Running::start(&mut self.session, &mut self.state, started);

        let console = self.console.clone();
        let mut context = EvalContext::new(token.clone(), self.broker.clone(), console.clone());
        let mut should_exit = false;
        let mut cancelled = false;
        let mut failed = false;
        let mut internal = None;

        {
            let _scope = collector.capture(&console);
            let (environment, sink) = running.session.parts_mut();
            for statement in &statements {
                if token.is_aborted() {
                    cancelled = true;
                    break;
                }
                let reduced = self.backend.reduce(environment, statement, &mut context).await;
                match reduced {
                    Ok(Reduced::Value(value)) => {
                        collector.push_result(self.backend.format_value(&value));
                    }
                    Ok(Reduced::Unit) => {}
                    Ok(Reduced::ExitRequested) => {
                        should_exit = true;
                        break;
                    }
                    Err(EvalError::Script { message, range }) => {
                        sink.push(LogEntry::error(message, range));
                        failed = true;
                        break;
                    }
                    Err(EvalError::Cancelled) => {
                        cancelled = true;
                        break;
                    }
                    Err(EvalError::Internal(err)) => {
                        internal = Some(err);
                        break;
                    }
                }
            }
        }

        running.finish(if should_exit {
            SessionState::Exited
        } else {
            SessionState::Idle
        });
        let collected = collector.finish();

        if let Some(err) = internal {
            warn!(error = %err, "evaluator failed");
            self.session.sink_mut().clear();
            return Err(SessionError::Evaluator(err));
        }

        if cancelled {
            debug!(token = token.id(), "evaluation cancelled");
            self.session.sink_mut().clear();
            return Ok(Evaluation {
                cancelled: true,
                should_exit,
                fragments: collected.fragments,
                ..Evaluation::default()
            });
        }

        self.session.sink_mut().extend(context.take_warnings());
        let logs = self.session.sink_mut().take();
        let output = if failed {
            None
        } else {
            Some(collected.output)
        };
        Ok(Evaluation {
            output,
            logs,
            should_exit,
            cancelled: false,
            fragments: collected.fragments,
        })
    }
}

/// Holds the controller in `Evaluating` for the length of one evaluation.
///
/// If the evaluation future is dropped before it finishes, the controller
/// goes back to `Idle` and the time spent is still recorded.
struct Running<'a, E> {
    session: &'a mut EvaluationSession<E>,
    state: &'a mut SessionState,
    started: Instant,
    finished: bool,
}

impl<'a, E> Running<'a, E> {
    fn start(
        session: &'a mut EvaluationSession<E>,
        state: &'a mut SessionState,
        started: Instant,
    ) -> Self {
        *state = SessionState::Evaluating;
        Self {
            session,
            state,
            started,
            finished: false,
        }
    }

    fn finish(
        mut self,
        next: SessionState,
    ) {
        self.finished = true;
        self.session.record(self.started.elapsed());
        *self.state = next;
    }
}

impl<E> Drop for Running<'_, E> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        debug!("evaluation dropped before it finished");
        self.session.record(self.started.elapsed());
        self.session.sink_mut().clear();
        *self.state = SessionState::Idle;
    }
}
