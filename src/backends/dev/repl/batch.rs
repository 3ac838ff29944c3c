//! Batch execution (`run`, `eval`, `check`)
//!
//! A whole script is one logical statement evaluated in streaming mode:
//! fragments go to stdout as they are produced, diagnostics go to stderr
//! once the evaluation ends.

use std::io::Write;

use anyhow::Context;
use futures::future::OptionFuture;
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::mpsc;
use tracing::debug;

use crate::backends::dev::repl::backend_trait::ScriptBackend;
use crate::backends::dev::repl::engine::{Evaluation, SessionController};
use crate::util::config::DiagnosticFormat;
use crate::util::diagnostic::{has_errors, EmitterConfig, JsonEmitter, LogEntry, TextEmitter};

/// Exit status for a clean run
pub const EXIT_OK: i32 = 0;
/// Exit status when any error-kind diagnostic was reported
pub const EXIT_FAILURE: i32 = 1;
/// Exit status after an interrupt
pub const EXIT_CANCELLED: i32 = 130;

/// How a batch run reports
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Name diagnostics are attributed to
    pub source_name: String,
    pub diagnostics: DiagnosticFormat,
    pub colors: bool,
    /// Interrupt on Ctrl-C
    pub handle_interrupts: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            source_name: "<script>".to_string(),
            diagnostics: DiagnosticFormat::Text,
            colors: false,
            handle_interrupts: false,
        }
    }
}

/// Exit code for a finished evaluation
pub fn exit_code(evaluation: &Evaluation) -> i32 {
    if evaluation.cancelled {
        EXIT_CANCELLED
    } else if evaluation.has_errors() {
        EXIT_FAILURE
    } else {
        EXIT_OK
    }
}

/// Evaluate `text`, answering readline requests from `answers`.
///
/// With no answer source, or once it reaches end of input, a readline
/// request interrupts the evaluation.
pub async fn run<B, R, O, E>(
    controller: &mut SessionController<B>,
    text: &str,
    options: &BatchOptions,
    mut answers: Option<Lines<R>>,
    stdout: &mut O,
    stderr: &mut E,
) -> anyhow::Result<i32>
where
    B: ScriptBackend,
    R: AsyncBufRead + Unpin,
    O: Write,
    E: Write,
{
    let handle = controller.handle();
    let mut active = handle.subscribe();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let eval = controller.evaluate_streaming(text, tx);
    tokio::pin!(eval);

    let result = loop {
        tokio::select! {
            biased;
            Some(fragment) = rx.recv() => {
                writeln!(stdout, "{}", fragment.text)?;
                stdout.flush()?;
            }
            result = &mut eval => break result,
            _ = tokio::signal::ctrl_c(), if options.handle_interrupts => {
                debug!("interrupt requested");
                handle.interrupt();
            }
            changed = active.changed() => {
                if changed.is_err() {
                    continue;
                }
                let request = active.borrow_and_update().clone();
                let Some(request) = request else {
                    continue;
                };
                let answer = tokio::select! {
                    line = OptionFuture::from(answers.as_mut().map(|lines| lines.next_line())) => {
                        line.transpose().context("failed to read readline answer")?.flatten()
                    }
                    _ = tokio::signal::ctrl_c(), if options.handle_interrupts => None,
                };
                match answer {
                    Some(line) => {
                        let _ = handle.submit_readline_answer(line);
                    }
                    None => {
                        debug!(prompt = %request.prompt, "no readline answer available");
                        handle.interrupt();
                    }
                }
            }
        }
    };
    while let Ok(fragment) = rx.try_recv() {
        writeln!(stdout, "{}", fragment.text)?;
    }
    stdout.flush()?;

    let evaluation = result?;
    emit_diagnostics(&evaluation.logs, options, stderr)?;
    Ok(exit_code(&evaluation))
}

/// Tokenize and parse only; report diagnostics.
pub fn check<B, E>(
    controller: &SessionController<B>,
    text: &str,
    options: &BatchOptions,
    stderr: &mut E,
) -> anyhow::Result<i32>
where
    B: ScriptBackend,
    E: Write,
{
    let logs = controller.check(text);
    emit_diagnostics(&logs, options, stderr)?;
    Ok(if has_errors(&logs) {
        EXIT_FAILURE
    } else {
        EXIT_OK
    })
}

/// Write diagnostics in the configured format, one per line.
pub fn emit_diagnostics<E: Write>(
    logs: &[LogEntry],
    options: &BatchOptions,
    stderr: &mut E,
) -> anyhow::Result<()> {
    let lines = match options.diagnostics {
        DiagnosticFormat::Text => TextEmitter::with_config(EmitterConfig {
            use_colors: options.colors,
        })
        .render_all(&options.source_name, logs),
        DiagnosticFormat::Json => JsonEmitter::new()
            .render_all(&options.source_name, logs)
            .context("failed to serialize diagnostics")?,
    };
    for line in lines {
        writeln!(stderr, "{}", line)?;
    }
    stderr.flush()?;
    Ok(())
}
