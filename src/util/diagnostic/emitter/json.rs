//! JSON 诊断渲染器
//!
//! 每条诊断输出为一行 JSON，便于编辑器或脚本消费

use serde::Serialize;

use crate::util::diagnostic::{LogEntry, LogKind};
use crate::util::span::Span;

/// JSON 诊断结构
#[derive(Debug, Serialize)]
struct JsonDiagnostic<'a> {
    source: &'a str,
    kind: LogKind,
    message: &'a str,
    range: Option<&'a Span>,
}

/// JSON 诊断渲染器
#[derive(Debug, Clone, Default)]
pub struct JsonEmitter;

impl JsonEmitter {
    /// 创建新的 JSON 渲染器
    pub fn new() -> Self {
        Self
    }

    /// 渲染单条诊断
    pub fn render(
        &self,
        source_name: &str,
        entry: &LogEntry,
    ) -> serde_json::Result<String> {
        serde_json::to_string(&JsonDiagnostic {
            source: source_name,
            kind: entry.kind,
            message: &entry.message,
            range: entry.range.as_ref(),
        })
    }

    /// 渲染全部诊断
    pub fn render_all(
        &self,
        source_name: &str,
        entries: &[LogEntry],
    ) -> serde_json::Result<Vec<String>> {
        entries
            .iter()
            .map(|entry| self.render(source_name, entry))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::span::Position;

    #[test]
    fn test_json_shape() {
        let entry = LogEntry::error(
            "division by zero",
            Some(Span::new(Position::new(1, 1), Position::new(1, 8))),
        );
        let line = JsonEmitter::new().render("calc.ql", &entry).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["source"], "calc.ql");
        assert_eq!(value["kind"], "error");
        assert_eq!(value["range"]["start"]["line"], 1);
        assert_eq!(value["range"]["end"]["column"], 8);
        assert!(value["range"]["start"].get("offset").is_none());
    }
}
