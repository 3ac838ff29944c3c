//! REPL Command Handler
//!
//! Handles meta commands starting with ':'. Commands are only recognised
//! at the start of a statement, never while a continued statement is being
//! assembled.

use crate::backends::dev::repl::backend_trait::ScriptBackend;
use crate::backends::dev::repl::engine::{SessionController, SessionState};

/// Command result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Exit the REPL
    Exit,
    /// Continue to next input
    Continue,
    /// Show a message
    Output(String),
}

/// Whether `line` should be routed to the command handler
pub fn is_command<B: ScriptBackend>(
    controller: &SessionController<B>,
    line: &str,
) -> bool {
    controller.state() != SessionState::Buffering && line.trim_start().starts_with(':')
}

/// Command handler for REPL
pub struct CommandHandler<'a, B: ScriptBackend> {
    controller: &'a mut SessionController<B>,
}

impl<'a, B: ScriptBackend> CommandHandler<'a, B> {
    /// Create a new command handler
    pub fn new(controller: &'a mut SessionController<B>) -> Self {
        Self { controller }
    }

    /// Handle a command
    pub fn handle(
        &mut self,
        line: &str,
    ) -> CommandResult {
        let cmd = line.trim().trim_start_matches(':').trim();
        let name = cmd.split_whitespace().next().unwrap_or("");

        match name {
            "quit" | "q" => CommandResult::Exit,
            "help" | "h" => CommandResult::Output(help_text()),
            "reset" | "clear" => {
                self.controller.reset_environment();
                CommandResult::Output("Environment reset".to_string())
            }
            "bindings" | "b" => {
                let bindings = self.controller.bindings();
                if bindings.is_empty() {
                    return CommandResult::Output("No bindings".to_string());
                }
                let lines: Vec<String> = bindings
                    .iter()
                    .map(|binding| format!("{}: {}", binding.name, binding.summary))
                    .collect();
                CommandResult::Output(lines.join("\n"))
            }
            "stats" => {
                let stats = self.controller.stats();
                CommandResult::Output(format!(
                    "Eval count: {}\nTotal time: {:?}\nAverage: {:?}",
                    stats.eval_count,
                    stats.total_time,
                    stats.average()
                ))
            }
            "" => CommandResult::Continue,
            _ => CommandResult::Output(format!("Unknown command: {}", line.trim())),
        }
    }
}

fn help_text() -> String {
    [
        "Available commands:",
        "  :quit, :q       - Exit the REPL",
        "  :help, :h       - Show this help",
        "  :reset          - Start over with a fresh environment",
        "  :bindings, :b   - List top-level bindings",
        "  :stats          - Show evaluation statistics",
        "End a line with \\ to continue the statement on the next line.",
    ]
    .join("\n")
}
