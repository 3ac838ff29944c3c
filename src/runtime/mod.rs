//! Runtime system
//!
//! Values, builtins and the interpreter that backs the bundled command
//! language.

pub mod builtins;
pub mod interpreter;
pub mod value;

pub use builtins::Builtin;
pub use interpreter::{Environment, Runtime, MAX_CALL_DEPTH, MAX_EVAL_DEPTH};
pub use value::{Args, Closure, Value};
