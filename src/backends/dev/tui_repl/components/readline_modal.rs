/// 输入请求对话框
///
/// 脚本调用 `readline` 时弹出，显示请求的提示符并收集一行回答
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::backends::dev::repl::engine::{ActiveRequest, RequestId};

/// 对话框按键结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalEvent {
    /// 继续编辑
    Editing,
    /// 提交回答
    Submit(String),
    /// 放弃（中断求值）
    Dismiss,
}

/// 输入请求对话框
#[derive(Debug, Clone)]
pub struct ReadlineModal {
    request: RequestId,
    prompt: String,
    input: String,
}

impl ReadlineModal {
    pub fn new(request: &ActiveRequest) -> Self {
        Self {
            request: request.id,
            prompt: request.prompt.clone(),
            input: String::new(),
        }
    }

    /// 对应的请求
    pub fn request(&self) -> RequestId {
        self.request
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// 处理按键
    pub fn handle_key(
        &mut self,
        key: KeyEvent,
    ) -> ModalEvent {
        match key.code {
            KeyCode::Enter => ModalEvent::Submit(std::mem::take(&mut self.input)),
            KeyCode::Esc => ModalEvent::Dismiss,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                ModalEvent::Dismiss
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.input.push(ch);
                ModalEvent::Editing
            }
            KeyCode::Backspace => {
                self.input.pop();
                ModalEvent::Editing
            }
            _ => ModalEvent::Editing,
        }
    }

    /// 渲染对话框（居中覆盖）
    pub fn render(
        &self,
        f: &mut Frame<'_>,
        area: Rect,
    ) {
        let popup = centered(area, 60, 5);
        f.render_widget(Clear, popup);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Input requested ");
        let inner = block.inner(popup);
        f.render_widget(block, popup);

        let lines = vec![
            Line::from(vec![
                Span::styled(
                    self.prompt.as_str(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(self.input.as_str()),
            ]),
            Line::default(),
            Line::from(Span::styled(
                "Enter: submit   Esc: abort",
                Style::default().fg(Color::DarkGray),
            )),
        ];
        f.render_widget(Paragraph::new(lines), inner);

        let typed = self.prompt.chars().count() + self.input.chars().count();
        let typed = u16::try_from(typed).unwrap_or(u16::MAX);
        f.set_cursor_position(Position::new(
            inner.x.saturating_add(typed).min(inner.right().saturating_sub(1)),
            inner.y,
        ));
    }
}

/// 居中矩形：宽度按百分比，高度按行数
fn centered(
    area: Rect,
    percent_x: u16,
    height: u16,
) -> Rect {
    let width = (u32::from(area.width) * u32::from(percent_x) / 100) as u16;
    let width = width.max(20).min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
