//! Quill
//!
//! An interactive session controller for script evaluators: a terminal REPL,
//! a batch runner and a TUI playground, all driving one evaluation contract.
//!
//! # Example
//!
//! ```no_run
//! use quill::{run, Result};
//!
//! fn main() -> Result<()> {
//!     let evaluation = run("set x 10; add x 5")?;
//!     assert_eq!(evaluation.output.as_deref(), Some("15"));
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

// Public modules
pub mod backends;
pub mod frontend;
pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use backends::dev::repl::{
    Binding, EvalContext, EvalError, Evaluation, Reduced, ScriptBackend, SessionController,
    SessionError,
};
pub use runtime::Runtime;
pub use thiserror::Error;

use tracing::debug;

use crate::util::config::ReplConfig;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Display name
pub const NAME: &str = "Quill";

/// A session over the reference runtime, prompts taken from `config`
pub fn session(config: &ReplConfig) -> SessionController<Runtime> {
    SessionController::new(Runtime::with_prompt(config.prompt.clone()))
        .with_continuation_prompt(config.continuation_prompt.clone())
}

/// Evaluate `source` in a fresh session on a current-thread runtime
///
/// Readline requests issued by the script are cancelled, since nothing can
/// answer them.
pub fn run(source: &str) -> Result<Evaluation> {
    debug!("run called");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(async {
        let mut controller = session(&ReplConfig::default());
        let handle = controller.handle();
        let mut active = handle.subscribe();
        let eval = controller.evaluate_line(source);
        tokio::pin!(eval);
        loop {
            tokio::select! {
                result = &mut eval => return result.map_err(anyhow::Error::from),
                changed = active.changed() => {
                    if changed.is_ok() && active.borrow_and_update().is_some() {
                        debug!("no reader for readline request");
                        handle.interrupt();
                    }
                }
            }
        }
    })
}
