//! Development tools for Quill
//!
//! This module provides the interactive surfaces:
//! - REPL: line editing, batch runs and the session controller
//! - Playground: ratatui editor with a run/abort action

pub mod repl;
pub mod tui_repl;

pub use repl::{LineRepl, SessionController};
pub use tui_repl::Playground;
