//! 诊断数据结构
//!
//! `LogEntry` 是会话控制器对外暴露的唯一诊断形式：
//! 词法/语法错误、结构化求值错误最终都会被转换成它。

use serde::Serialize;

use crate::util::span::Span;

/// 诊断级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Error,
    Warning,
}

impl LogKind {
    /// 检查是否为错误级别
    pub fn is_error(&self) -> bool {
        matches!(self, LogKind::Error)
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            LogKind::Error => write!(f, "error"),
            LogKind::Warning => write!(f, "warning"),
        }
    }
}

/// 单条诊断
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// 级别
    pub kind: LogKind,
    /// 消息
    pub message: String,
    /// 源码范围（可选）
    pub range: Option<Span>,
}

impl LogEntry {
    /// 创建错误诊断
    pub fn error(
        message: impl Into<String>,
        range: Option<Span>,
    ) -> Self {
        Self {
            kind: LogKind::Error,
            message: message.into(),
            range,
        }
    }

    /// 创建警告诊断
    pub fn warning(
        message: impl Into<String>,
        range: Option<Span>,
    ) -> Self {
        Self {
            kind: LogKind::Warning,
            message: message.into(),
            range,
        }
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}: {}: {}", range, self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}
