//! Line-based REPL with rustyline
//!
//! Each statement is evaluated in streaming mode while the loop keeps
//! watching Ctrl-C and the broker's active readline request, so scripts can
//! ask for input on the same editor and long evaluations can be interrupted.

use std::future::Future;
use std::io::{self, IsTerminal, Write};

use futures::future::{FutureExt, LocalBoxFuture, OptionFuture};
use tokio::sync::mpsc;
use tracing::debug;

use crate::backends::dev::repl::backend_trait::ScriptBackend;
use crate::backends::dev::repl::commands::{is_command, CommandHandler, CommandResult};
use crate::backends::dev::repl::engine::{
    BrokerError, Evaluation, OutputFragment, SessionController, SessionError,
};
use crate::util::config::ReplConfig;
use crate::util::diagnostic::{EmitterConfig, LogEntry, TextEmitter};

mod editor;
pub use editor::{EditorEvent, EditorHandle, LineEditor};

/// Source name used in REPL diagnostics
const SOURCE_NAME: &str = "repl";

/// Line REPL
///
/// A line-based REPL with rustyline support for editing and history.
pub struct LineRepl<B: ScriptBackend> {
    controller: SessionController<B>,
    editor: LineEditor,
    emitter: TextEmitter,
}

impl<B: ScriptBackend> LineRepl<B> {
    /// Create a line REPL around `controller`
    pub fn new(
        controller: SessionController<B>,
        config: &ReplConfig,
    ) -> anyhow::Result<Self> {
        let editor = LineEditor::spawn(config)?;
        let emitter = TextEmitter::with_config(EmitterConfig {
            use_colors: config.colors && io::stderr().is_terminal(),
        });
        Ok(Self {
            controller,
            editor,
            emitter,
        })
    }

    /// Run the REPL until `:quit`, Ctrl-D or an `exit` in a script
    pub async fn run(mut self) -> anyhow::Result<()> {
        println!("Quill {} - Type :help for assistance", crate::VERSION);
        println!("Press Ctrl+D or :quit to exit\n");

        let editor = self.editor.handle();
        loop {
            let prompt = self.controller.current_prompt();
            let line = match editor.read_line(prompt).await? {
                EditorEvent::Line(line) => line,
                EditorEvent::Eof => break,
                EditorEvent::Interrupted => {
                    self.controller.interrupt();
                    println!("(Interrupted)");
                    continue;
                }
            };

            if is_command(&self.controller, &line) {
                match CommandHandler::new(&mut self.controller).handle(&line) {
                    CommandResult::Exit => break,
                    CommandResult::Continue => {}
                    CommandResult::Output(text) => println!("{}", text),
                }
                continue;
            }

            let statement = match self.controller.assemble(&line) {
                Ok(Some(statement)) => statement,
                Ok(None) => continue,
                Err(SessionError::Terminated) => break,
                Err(err) => return Err(err.into()),
            };

            if self.run_statement(statement.text(), &editor).await? {
                break;
            }
        }

        drop(editor);
        self.editor.shutdown();
        Ok(())
    }

    /// Evaluate one statement. Returns `true` when the session should end.
    async fn run_statement(
        &mut self,
        text: &str,
        editor: &EditorHandle,
    ) -> anyhow::Result<bool> {
        let result = drive_statement(
            &mut self.controller,
            text,
            editor,
            ctrl_c,
            &mut io::stdout(),
        )
        .await?;

        match result {
            Ok(evaluation) => {
                self.print_logs(&evaluation.logs);
                if evaluation.cancelled {
                    println!("(Interrupted)");
                }
                Ok(evaluation.should_exit)
            }
            Err(SessionError::Terminated) => Ok(true),
            Err(err @ SessionError::Evaluator(_)) => {
                eprintln!("{}", err);
                Ok(false)
            }
        }
    }

    fn print_logs(
        &self,
        logs: &[LogEntry],
    ) {
        let stderr = io::stderr();
        let mut stderr = stderr.lock();
        for line in self.emitter.render_all(SOURCE_NAME, logs) {
            let _ = writeln!(stderr, "{}", line);
        }
    }
}

/// Where readline answers come from while a statement runs
pub trait LineSource {
    fn read_line(
        &self,
        prompt: String,
    ) -> LocalBoxFuture<'static, anyhow::Result<EditorEvent>>;
}

impl LineSource for EditorHandle {
    fn read_line(
        &self,
        prompt: String,
    ) -> LocalBoxFuture<'static, anyhow::Result<EditorEvent>> {
        EditorHandle::read_line(self, prompt).boxed_local()
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        debug!(error = %err, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}

/// Stream one statement to `out`, answering readline requests from `source`
/// and interrupting whenever `interrupt` resolves.
///
/// The outer error is an I/O or editor failure; the inner result is the
/// evaluation itself.
pub async fn drive_statement<B, S, I, F>(
    controller: &mut SessionController<B>,
    text: &str,
    source: &S,
    mut interrupt: I,
    out: &mut impl Write,
) -> anyhow::Result<Result<Evaluation, SessionError>>
where
    B: ScriptBackend,
    S: LineSource + ?Sized,
    I: FnMut() -> F,
    F: Future<Output = ()>,
{
    let handle = controller.handle();
    let mut active = handle.subscribe();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut pending_read: Option<LocalBoxFuture<'static, anyhow::Result<EditorEvent>>> = None;

    let result = {
        let eval = controller.evaluate_streaming(text, tx);
        tokio::pin!(eval);

        loop {
            tokio::select! {
                biased;
                Some(fragment) = rx.recv() => write_fragment(out, &fragment)?,
                result = &mut eval => break result,
                _ = interrupt() => {
                    debug!("interrupt requested");
                    handle.interrupt();
                }
                changed = active.changed(), if pending_read.is_none() => {
                    if changed.is_err() {
                        continue;
                    }
                    let request = active.borrow_and_update().clone();
                    if let Some(request) = request {
                        pending_read = Some(source.read_line(request.prompt));
                    }
                }
                Some(event) = OptionFuture::from(pending_read.as_mut()), if pending_read.is_some() => {
                    pending_read = None;
                    match event? {
                        EditorEvent::Line(answer) => match handle.submit_readline_answer(answer) {
                            Ok(()) => {}
                            Err(BrokerError::NoActiveRequest) => debug!("answer arrived after request ended"),
                        },
                        EditorEvent::Interrupted | EditorEvent::Eof => {
                            handle.interrupt();
                        }
                    }
                }
            }
        }
    };
    while let Ok(fragment) = rx.try_recv() {
        write_fragment(out, &fragment)?;
    }
    if pending_read.is_some() {
        debug!("evaluation finished with a read still open");
    }
    Ok(result)
}

fn write_fragment(
    out: &mut impl Write,
    fragment: &OutputFragment,
) -> io::Result<()> {
    writeln!(out, "{}", fragment.text)?;
    out.flush()
}
