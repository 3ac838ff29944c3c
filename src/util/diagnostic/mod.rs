//! 统一诊断系统
//!
//! 提供诊断数据结构、诊断收集器和文本/JSON 渲染
//!
//! # 模块结构
//!
//! - [`error`] - 诊断数据结构 (LogEntry, LogKind)
//! - [`sink`] - 会话级诊断收集器
//! - [`emitter`] - 文本与 JSON 渲染器
//!
//! # 示例
//!
//! ```
//! use quill::util::diagnostic::{format, has_errors, LogEntry};
//!
//! let entries = vec![LogEntry::warning("shadowing builtin 'add'", None)];
//! assert_eq!(format("repl", &entries), vec!["repl: warning: shadowing builtin 'add'"]);
//! assert!(!has_errors(&entries));
//! ```

pub mod emitter;
pub mod error;
pub mod sink;

// 重新导出
pub use emitter::{format_range, EmitterConfig, JsonEmitter, TextEmitter};
pub use error::{LogEntry, LogKind};
pub use sink::DiagnosticSink;

/// 将诊断渲染为 `source:range: kind: message` 形式的行
pub fn format(
    source_name: &str,
    entries: &[LogEntry],
) -> Vec<String> {
    TextEmitter::new().render_all(source_name, entries)
}

/// 是否存在错误级别诊断（仅有警告不算失败）
pub fn has_errors(entries: &[LogEntry]) -> bool {
    entries.iter().any(|entry| entry.kind.is_error())
}
