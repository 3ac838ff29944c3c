//! REPL Engine Module
//!
//! Core evaluation engine for interactive sessions.

pub mod broker;
pub mod cancel;
pub mod context;
pub mod evaluator;
pub mod input;
pub mod output;

pub use broker::{ActiveRequest, BrokerError, ReadlineBroker, ReadlineError, RequestId};
pub use cancel::{CancellationManager, CancellationToken};
pub use context::{EvaluationSession, SessionStats};
pub use evaluator::{
    ControlHandle, Evaluation, LineOutcome, SessionController, SessionError, SessionState,
};
pub use input::{InputAssembler, LogicalStatement, Submission};
pub use output::{Console, ConsoleLevel, FragmentOrigin, OutputCollector, OutputFragment};
