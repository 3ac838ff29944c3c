//! REPL Module
//!
//! Interactive evaluation for Quill.
//!
//! This module contains:
//! - [`backend_trait::ScriptBackend`] - Evaluator contract driven by the session
//! - [`engine::SessionController`] - Assembly, cancellation, readline brokering, output
//! - [`line::LineRepl`] - Terminal REPL with rustyline
//! - [`commands::CommandHandler`] - `:` meta commands
//! - [`batch`] - Non-interactive `run`, `eval` and `check`

pub mod backend_trait;
pub mod batch;
pub mod commands;
pub mod engine;
pub mod line;

pub use backend_trait::{Binding, EvalContext, EvalError, Reduced, ScriptBackend};
pub use batch::BatchOptions;
pub use commands::{CommandHandler, CommandResult};
pub use engine::{ControlHandle, Evaluation, SessionController, SessionError};
pub use line::LineRepl;
