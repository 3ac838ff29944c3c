//! Input assembly
//!
//! Turns physical lines into logical statements. A line ending with the
//! continuation marker `\` keeps the statement open; the next line without
//! the marker closes it.

/// Marks a physical line as continued on the next one.
pub const CONTINUATION_MARKER: char = '\\';

/// A complete statement, possibly spanning several physical lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalStatement {
    text: String,
    lines: usize,
}

impl LogicalStatement {
    /// Raw text, physical lines joined by `\n`, markers kept.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of physical lines that went into this statement.
    pub fn line_count(&self) -> usize {
        self.lines
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Outcome of submitting one physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The line was continued; more input is needed
    Pending,
    /// The statement is complete
    Ready(LogicalStatement),
}

/// Buffers continued lines until a statement is complete.
#[derive(Debug, Default)]
pub struct InputAssembler {
    buffer: String,
    lines: usize,
}

impl InputAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a physical line.
    pub fn submit(
        &mut self,
        line: &str,
    ) -> Submission {
        if self.lines > 0 {
            self.buffer.push('\n');
        }
        self.buffer.push_str(line);
        self.lines += 1;

        if line.ends_with(CONTINUATION_MARKER) {
            return Submission::Pending;
        }

        let text = std::mem::take(&mut self.buffer);
        let lines = std::mem::replace(&mut self.lines, 0);
        Submission::Ready(LogicalStatement { text, lines })
    }

    /// Discard anything buffered.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.lines = 0;
    }

    pub fn is_buffering(&self) -> bool {
        self.lines > 0
    }

    /// Text buffered so far.
    pub fn pending_text(&self) -> &str {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_line_is_ready() {
        let mut assembler = InputAssembler::new();
        match assembler.submit("add 1 2") {
            Submission::Ready(stmt) => {
                assert_eq!(stmt.text(), "add 1 2");
                assert_eq!(stmt.line_count(), 1);
            }
            Submission::Pending => panic!("expected a complete statement"),
        }
        assert!(!assembler.is_buffering());
    }

    #[test]
    fn test_continuation_keeps_marker() {
        let mut assembler = InputAssembler::new();
        assert_eq!(assembler.submit("set x \\"), Submission::Pending);
        assert!(assembler.is_buffering());
        assert_eq!(assembler.pending_text(), "set x \\");

        let Submission::Ready(stmt) = assembler.submit("  10") else {
            panic!("expected a complete statement");
        };
        assert_eq!(stmt.text(), "set x \\\n  10");
        assert_eq!(stmt.line_count(), 2);
        assert!(!assembler.is_buffering());
    }

    #[test]
    fn test_reset_discards_buffer() {
        let mut assembler = InputAssembler::new();
        assembler.submit("print \\");
        assembler.reset();
        assert!(!assembler.is_buffering());

        let Submission::Ready(stmt) = assembler.submit("print 1") else {
            panic!("expected a complete statement");
        };
        assert_eq!(stmt.text(), "print 1");
    }

    #[test]
    fn test_empty_line_closes_statement() {
        let mut assembler = InputAssembler::new();
        assembler.submit("a\\");
        let Submission::Ready(stmt) = assembler.submit("") else {
            panic!("expected a complete statement");
        };
        assert_eq!(stmt.text(), "a\\\n");
    }

    proptest! {
        #[test]
        fn prop_assembled_text_is_newline_join(
            continued in prop::collection::vec("[a-z0-9 ]{0,8}", 0..6),
            last in "[a-z0-9 ]{0,8}",
        ) {
            let mut assembler = InputAssembler::new();
            let mut physical = Vec::new();
            for part in &continued {
                let line = format!("{}\\", part);
                prop_assert_eq!(assembler.submit(&line), Submission::Pending);
                physical.push(line);
            }
            physical.push(last.clone());

            match assembler.submit(&last) {
                Submission::Ready(stmt) => {
                    prop_assert_eq!(stmt.text(), physical.join("\n"));
                    prop_assert_eq!(stmt.line_count(), physical.len());
                }
                Submission::Pending => prop_assert!(false, "last line has no marker"),
            }
            prop_assert!(!assembler.is_buffering());
        }
    }
}
