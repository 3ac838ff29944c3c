//! Interactive surfaces for Quill
//!
//! Everything that puts a script evaluator in front of a user lives here.
//! The evaluator itself is reached through
//! [`dev::repl::ScriptBackend`]; the reference implementation is
//! [`crate::runtime::Runtime`].
//!
//! # Architecture
//!
//! ```text
//!   quill repl      quill run/eval/check      quill playground
//!        |                  |                        |
//!    LineRepl          repl::batch              Playground
//!        |                  |                        |
//!        +--------+---------+------------+-----------+
//!                 |                      |
//!          SessionController       ControlHandle
//!                 |                (interrupt, answers)
//!                 v
//!           ScriptBackend
//! ```

pub mod dev;
