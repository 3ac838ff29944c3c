/// 输出控制台组件
///
/// 显示运行记录：提交的脚本、结果、控制台消息和诊断，每条带严重级别标记
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};

use crate::backends::dev::repl::engine::{ConsoleLevel, FragmentOrigin, OutputFragment};
use crate::util::diagnostic::{LogEntry, LogKind, TextEmitter};

/// 条目标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// 提交的脚本
    Input,
    /// 求值结果
    Result,
    /// 脚本控制台消息
    Console(ConsoleLevel),
    /// 诊断
    Diagnostic(LogKind),
    /// 会话提示（中断等）
    Notice,
}

impl Marker {
    /// 行首符号，固定两列宽
    pub fn symbol(&self) -> &'static str {
        match self {
            Marker::Input => "» ",
            Marker::Result => "= ",
            Marker::Console(ConsoleLevel::Log) => "  ",
            Marker::Console(ConsoleLevel::Debug) => "· ",
            Marker::Console(ConsoleLevel::Info) => "i ",
            Marker::Console(ConsoleLevel::Warn) | Marker::Diagnostic(LogKind::Warning) => "! ",
            Marker::Console(ConsoleLevel::Error) | Marker::Diagnostic(LogKind::Error) => "x ",
            Marker::Notice => "- ",
        }
    }

    pub fn style(&self) -> Style {
        match self {
            Marker::Input => Style::default().fg(Color::Cyan),
            Marker::Result => Style::default().fg(Color::White),
            Marker::Console(ConsoleLevel::Log) => Style::default().fg(Color::Gray),
            Marker::Console(ConsoleLevel::Debug) => Style::default().fg(Color::DarkGray),
            Marker::Console(ConsoleLevel::Info) => Style::default().fg(Color::Blue),
            Marker::Console(ConsoleLevel::Warn) => Style::default().fg(Color::Yellow),
            Marker::Console(ConsoleLevel::Error) => Style::default().fg(Color::Red),
            Marker::Diagnostic(LogKind::Warning) => Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            Marker::Diagnostic(LogKind::Error) => {
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
            }
            Marker::Notice => Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        }
    }
}

impl From<FragmentOrigin> for Marker {
    fn from(origin: FragmentOrigin) -> Self {
        match origin {
            FragmentOrigin::Result => Marker::Result,
            FragmentOrigin::Console(level) => Marker::Console(level),
        }
    }
}

/// 输出条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEntry {
    pub marker: Marker,
    pub text: String,
}

/// 输出控制台
pub struct OutputConsole {
    /// 输出条目列表
    entries: Vec<OutputEntry>,
    /// 最大条目数
    max_entries: usize,
    /// 距底部的滚动行数，0 表示跟随最新输出
    scroll_back: u16,
    /// 诊断渲染器
    emitter: TextEmitter,
}

impl OutputConsole {
    /// 创建新的输出控制台
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            max_entries: 1000,
            scroll_back: 0,
            emitter: TextEmitter::new(),
        }
    }

    /// 添加条目
    pub fn push(
        &mut self,
        marker: Marker,
        text: impl Into<String>,
    ) {
        self.entries.push(OutputEntry {
            marker,
            text: text.into(),
        });
        self.trim_entries();
        self.scroll_back = 0;
    }

    /// 添加提交的脚本
    pub fn push_input(
        &mut self,
        text: &str,
    ) {
        self.push(Marker::Input, text.trim_end());
    }

    /// 添加流式片段
    pub fn push_fragment(
        &mut self,
        fragment: &OutputFragment,
    ) {
        self.push(fragment.origin.into(), fragment.text.as_str());
    }

    /// 添加诊断
    pub fn push_diagnostics(
        &mut self,
        source_name: &str,
        logs: &[LogEntry],
    ) {
        for entry in logs {
            let text = self.emitter.render(source_name, entry);
            self.push(Marker::Diagnostic(entry.kind), text);
        }
    }

    /// 添加提示
    pub fn push_notice(
        &mut self,
        text: impl Into<String>,
    ) {
        self.push(Marker::Notice, text);
    }

    /// 清空输出
    pub fn clear(&mut self) {
        self.entries.clear();
        self.scroll_back = 0;
    }

    /// 向上滚动
    pub fn scroll_up(
        &mut self,
        lines: u16,
    ) {
        let limit = self.line_count().saturating_sub(1);
        self.scroll_back = self.scroll_back.saturating_add(lines).min(limit);
    }

    /// 向下滚动
    pub fn scroll_down(
        &mut self,
        lines: u16,
    ) {
        self.scroll_back = self.scroll_back.saturating_sub(lines);
    }

    /// 修剪条目
    fn trim_entries(&mut self) {
        if self.entries.len() > self.max_entries {
            self.entries.drain(0..self.entries.len() - self.max_entries);
        }
    }

    fn line_count(&self) -> u16 {
        let count: usize = self
            .entries
            .iter()
            .map(|entry| entry.text.split('\n').count())
            .sum();
        u16::try_from(count).unwrap_or(u16::MAX)
    }

    /// 展开为带标记的显示行；多行条目只有首行带符号
    pub fn lines(&self) -> Vec<Line<'_>> {
        let mut lines = Vec::new();
        for entry in &self.entries {
            let style = entry.marker.style();
            for (i, text) in entry.text.split('\n').enumerate() {
                let symbol = if i == 0 { entry.marker.symbol() } else { "  " };
                lines.push(Line::from(vec![
                    Span::styled(symbol, style),
                    Span::styled(text, style),
                ]));
            }
        }
        lines
    }

    /// 渲染输出控制台
    pub fn render(
        &self,
        f: &mut Frame<'_>,
        area: Rect,
    ) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Plain)
            .title(" Transcript ");
        let inner = block.inner(area);
        f.render_widget(block, area);

        if self.entries.is_empty() {
            return;
        }

        let lines = self.lines();
        let total = u16::try_from(lines.len()).unwrap_or(u16::MAX);
        let top = total
            .saturating_sub(inner.height)
            .saturating_sub(self.scroll_back);

        let paragraph = Paragraph::new(lines).scroll((top, 0));
        f.render_widget(paragraph, inner);
    }

    /// 获取条目
    pub fn entries(&self) -> &[OutputEntry] {
        &self.entries
    }

    /// 获取条目数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 检查是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for OutputConsole {
    fn default() -> Self {
        Self::new()
    }
}
