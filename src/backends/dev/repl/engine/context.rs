//! Evaluation Session
//!
//! Long-lived state shared by every statement of a session: the backend
//! environment, the reusable diagnostic sink and evaluation statistics.

use std::time::Duration;

use crate::util::diagnostic::DiagnosticSink;

/// Evaluation statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Number of statements evaluated (including failed ones)
    pub eval_count: usize,
    /// Wall time spent evaluating
    pub total_time: Duration,
}

impl SessionStats {
    /// Average time per evaluation
    pub fn average(&self) -> Duration {
        match u32::try_from(self.eval_count) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(count) => self.total_time / count,
        }
    }
}

/// Environment, sink and statistics for one session
#[derive(Debug)]
pub struct EvaluationSession<E> {
    environment: E,
    sink: DiagnosticSink,
    stats: SessionStats,
}

impl<E> EvaluationSession<E> {
    pub fn new(environment: E) -> Self {
        Self {
            environment,
            sink: DiagnosticSink::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn environment(&self) -> &E {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut E {
        &mut self.environment
    }

    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut DiagnosticSink {
        &mut self.sink
    }

    /// Borrow environment and sink together
    pub fn parts_mut(&mut self) -> (&mut E, &mut DiagnosticSink) {
        (&mut self.environment, &mut self.sink)
    }

    /// Count one evaluation
    pub fn record(
        &mut self,
        elapsed: Duration,
    ) {
        self.stats.eval_count += 1;
        self.stats.total_time += elapsed;
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Swap in a fresh environment and clear everything else
    pub fn reset(
        &mut self,
        environment: E,
    ) {
        self.environment = environment;
        self.sink.clear();
        self.stats = SessionStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::diagnostic::LogEntry;

    #[test]
    fn test_record_and_average() {
        let mut session = EvaluationSession::new(());
        assert_eq!(session.stats().average(), Duration::ZERO);

        session.record(Duration::from_millis(10));
        session.record(Duration::from_millis(30));
        let stats = session.stats();
        assert_eq!(stats.eval_count, 2);
        assert_eq!(stats.total_time, Duration::from_millis(40));
        assert_eq!(stats.average(), Duration::from_millis(20));
    }

    #[test]
    fn test_reset_replaces_environment() {
        let mut session = EvaluationSession::new(vec![1, 2]);
        session.sink_mut().push(LogEntry::error("x", None));
        session.record(Duration::from_millis(1));

        session.reset(Vec::new());
        assert!(session.environment().is_empty());
        assert!(session.sink().is_empty());
        assert_eq!(session.stats(), SessionStats::default());
    }
}
