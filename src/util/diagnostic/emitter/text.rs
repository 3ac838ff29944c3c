//! 文本诊断渲染器
//!
//! 输出格式：`source:startLine:startColumn[:endLine:endColumn]: kind: message`

use owo_colors::OwoColorize;

use crate::util::diagnostic::{LogEntry, LogKind};
use crate::util::span::Span;

/// 渲染器配置
#[derive(Debug, Clone, Default)]
pub struct EmitterConfig {
    /// 是否启用颜色输出
    pub use_colors: bool,
}

/// 文本诊断渲染器
#[derive(Debug, Clone, Default)]
pub struct TextEmitter {
    config: EmitterConfig,
}

impl TextEmitter {
    /// 创建无颜色渲染器
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义配置创建渲染器
    pub fn with_config(config: EmitterConfig) -> Self {
        Self { config }
    }

    /// 渲染单条诊断
    pub fn render(
        &self,
        source_name: &str,
        entry: &LogEntry,
    ) -> String {
        let kind = self.render_kind(entry.kind);
        match &entry.range {
            Some(range) => format!(
                "{}:{}: {}: {}",
                source_name,
                format_range(range),
                kind,
                entry.message
            ),
            None => format!("{}: {}: {}", source_name, kind, entry.message),
        }
    }

    /// 渲染全部诊断，每条一行
    pub fn render_all(
        &self,
        source_name: &str,
        entries: &[LogEntry],
    ) -> Vec<String> {
        entries
            .iter()
            .map(|entry| self.render(source_name, entry))
            .collect()
    }

    fn render_kind(
        &self,
        kind: LogKind,
    ) -> String {
        if !self.config.use_colors {
            return kind.to_string();
        }

        match kind {
            LogKind::Error => kind.red().bold().to_string(),
            LogKind::Warning => kind.yellow().bold().to_string(),
        }
    }
}

/// 渲染源码范围：起止相同时只输出起点
pub fn format_range(range: &Span) -> String {
    range.to_string()
}
