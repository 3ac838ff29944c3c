//! 诊断收集器
//!
//! 每个会话持有一个可复用的 `DiagnosticSink`，
//! 每条语句求值前清空，求值期间由该语句独占。

use super::error::{LogEntry, LogKind};
use crate::util::span::Span;

/// 诊断收集器
#[derive(Debug, Default, Clone)]
pub struct DiagnosticSink {
    entries: Vec<LogEntry>,
}

impl DiagnosticSink {
    /// 创建空收集器
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空（语句开始前调用）
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 追加一条诊断
    pub fn push(
        &mut self,
        entry: LogEntry,
    ) {
        self.entries.push(entry);
    }

    /// 批量追加
    pub fn extend(
        &mut self,
        entries: impl IntoIterator<Item = LogEntry>,
    ) {
        self.entries.extend(entries);
    }

    /// 记录错误
    pub fn error(
        &mut self,
        message: impl Into<String>,
        range: Option<Span>,
    ) {
        self.push(LogEntry::error(message, range));
    }

    /// 记录警告
    pub fn warning(
        &mut self,
        message: impl Into<String>,
        range: Option<Span>,
    ) {
        self.push(LogEntry::warning(message, range));
    }

    /// 是否有任何诊断
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 诊断数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否包含错误级别诊断
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.kind == LogKind::Error)
    }

    /// 当前诊断（只读）
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// 取出全部诊断
    pub fn take(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.entries)
    }
}
