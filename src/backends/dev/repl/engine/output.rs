//! Output collection.
//!
//! A statement produces two kinds of text: the values its sub-statements
//! reduce to, and console messages the evaluator emits along the way. The
//! [`Console`] is handed to the evaluator explicitly; an
//! [`OutputCollector`] installs itself on the console for the duration of a
//! statement through a scope guard, so the previous sink comes back on every
//! exit path.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Console severity, as emitted by scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl fmt::Display for ConsoleLevel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// Where a fragment of transcript came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentOrigin {
    Result,
    Console(ConsoleLevel),
}

/// An ordered unit of transcript text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFragment {
    pub origin: FragmentOrigin,
    pub text: String,
}

impl OutputFragment {
    pub fn result(text: impl Into<String>) -> Self {
        Self {
            origin: FragmentOrigin::Result,
            text: text.into(),
        }
    }

    pub fn console(
        level: ConsoleLevel,
        text: impl Into<String>,
    ) -> Self {
        Self {
            origin: FragmentOrigin::Console(level),
            text: text.into(),
        }
    }

    pub fn is_result(&self) -> bool {
        self.origin == FragmentOrigin::Result
    }
}

/// A place console messages can be routed to: always recorded, and also
/// forwarded when streaming.
#[derive(Debug, Clone)]
struct ConsoleSink {
    buffer: Arc<Mutex<Vec<OutputFragment>>>,
    stream: Option<mpsc::UnboundedSender<OutputFragment>>,
}

impl ConsoleSink {
    fn deliver(
        &self,
        fragment: OutputFragment,
    ) {
        if let Some(tx) = &self.stream {
            // Receiver gone means the surface stopped listening
            let _ = tx.send(fragment.clone());
        }
        self.buffer.lock().push(fragment);
    }
}

/// Console surface handed to the evaluator.
///
/// Messages go to the innermost installed sink. With no sink installed they
/// fall through to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct Console {
    sinks: Arc<Mutex<Vec<ConsoleSink>>>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(
        &self,
        level: ConsoleLevel,
        text: impl Into<String>,
    ) {
        let fragment = OutputFragment::console(level, text);
        let sink = self.sinks.lock().last().cloned();
        match sink {
            Some(sink) => sink.deliver(fragment),
            None => match level {
                ConsoleLevel::Warn | ConsoleLevel::Error => {
                    warn!(target: "quill::console", level = %level, "{}", fragment.text)
                }
                ConsoleLevel::Debug => {
                    debug!(target: "quill::console", "{}", fragment.text)
                }
                _ => info!(target: "quill::console", level = %level, "{}", fragment.text),
            },
        }
    }

    pub fn log(
        &self,
        text: impl Into<String>,
    ) {
        self.emit(ConsoleLevel::Log, text);
    }

    /// Number of sinks currently stacked.
    pub fn depth(&self) -> usize {
        self.sinks.lock().len()
    }

    fn install(
        &self,
        sink: ConsoleSink,
    ) -> ConsoleScope<'_> {
        let mut sinks = self.sinks.lock();
        sinks.push(sink);
        ConsoleScope {
            console: self,
            depth: sinks.len(),
        }
    }
}

/// Restores the previous console sink when dropped.
#[must_use = "the console sink is removed as soon as the scope is dropped"]
pub struct ConsoleScope<'a> {
    console: &'a Console,
    depth: usize,
}

impl Drop for ConsoleScope<'_> {
    fn drop(&mut self) {
        let mut sinks = self.console.sinks.lock();
        // Also unwinds any inner scope leaked with mem::forget
        sinks.truncate(self.depth.saturating_sub(1));
    }
}

/// Result of a collected statement in buffered mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    /// Merged transcript text
    pub output: String,
    /// Every fragment, in arrival order
    pub fragments: Vec<OutputFragment>,
}

/// Gathers the output of one statement.
pub struct OutputCollector {
    sink: ConsoleSink,
    results: usize,
}

impl OutputCollector {
    /// Keep everything until [`OutputCollector::finish`].
    pub fn buffered() -> Self {
        Self {
            sink: ConsoleSink {
                buffer: Arc::new(Mutex::new(Vec::new())),
                stream: None,
            },
            results: 0,
        }
    }

    /// Also forward each fragment to `tx` as soon as it is produced.
    pub fn streaming(tx: mpsc::UnboundedSender<OutputFragment>) -> Self {
        Self {
            sink: ConsoleSink {
                buffer: Arc::new(Mutex::new(Vec::new())),
                stream: Some(tx),
            },
            results: 0,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.sink.stream.is_some()
    }

    /// Route console messages to this collector until the scope is dropped.
    pub fn capture<'c>(
        &self,
        console: &'c Console,
    ) -> ConsoleScope<'c> {
        console.install(self.sink.clone())
    }

    /// Record a formatted result value.
    pub fn push_result(
        &mut self,
        text: String,
    ) {
        self.results += 1;
        self.sink.deliver(OutputFragment::result(text));
    }

    /// Number of result values recorded so far.
    pub fn result_count(&self) -> usize {
        self.results
    }

    /// Merge into the final transcript: result text first, then console
    /// text, separated by a newline when both are present.
    pub fn finish(self) -> Collected {
        let fragments = std::mem::take(&mut *self.sink.buffer.lock());
        Collected {
            output: merge(&fragments),
            fragments,
        }
    }
}

/// Default merge policy over an ordered fragment list.
pub fn merge(fragments: &[OutputFragment]) -> String {
    let join = |want_result: bool| {
        fragments
            .iter()
            .filter(|f| f.is_result() == want_result)
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    };
    let results = join(true);
    let console = join(false);

    match (results.is_empty(), console.is_empty()) {
        (false, false) => format!("{}\n{}", results, console),
        (false, true) => results,
        (true, _) => console,
    }
}
