/// 输入窗口组件
///
/// 多行脚本编辑区，光标按字符移动
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Position, Rect},
    style::{Color, Style},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};

/// 输入窗口
#[derive(Debug, Default)]
pub struct InputWindow {
    /// 输入缓冲区
    buffer: String,
    /// 光标位置（字节偏移，总在字符边界上）
    cursor: usize,
    /// 首个可见行
    scroll: u16,
}

impl InputWindow {
    /// 创建新的输入窗口
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取输入缓冲区
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// 设置输入缓冲区，光标移到末尾
    pub fn set_text(
        &mut self,
        text: impl Into<String>,
    ) {
        self.buffer = text.into();
        self.cursor = self.buffer.len();
    }

    /// 清空缓冲区
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.scroll = 0;
    }

    pub fn is_blank(&self) -> bool {
        self.buffer.trim().is_empty()
    }

    /// 插入字符
    pub fn insert_char(
        &mut self,
        ch: char,
    ) {
        self.buffer.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    /// 删除字符（光标前）
    pub fn delete_char(&mut self) {
        if let Some(ch) = self.buffer[..self.cursor].chars().next_back() {
            self.cursor -= ch.len_utf8();
            self.buffer.remove(self.cursor);
        }
    }

    /// 删除字符（光标处）
    pub fn delete_forward(&mut self) {
        if self.cursor < self.buffer.len() {
            self.buffer.remove(self.cursor);
        }
    }

    /// 向后移动光标
    pub fn move_left(&mut self) {
        if let Some(ch) = self.buffer[..self.cursor].chars().next_back() {
            self.cursor -= ch.len_utf8();
        }
    }

    /// 向前移动光标
    pub fn move_right(&mut self) {
        if let Some(ch) = self.buffer[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    pub fn move_up(&mut self) {
        let (row, col) = self.cursor_row_col();
        if row > 0 {
            self.cursor = self.offset_of(row - 1, col);
        }
    }

    pub fn move_down(&mut self) {
        let (row, col) = self.cursor_row_col();
        if row + 1 < self.buffer.split('\n').count() {
            self.cursor = self.offset_of(row + 1, col);
        }
    }

    /// 移动到行首
    pub fn move_to_line_start(&mut self) {
        let (row, _) = self.cursor_row_col();
        self.cursor = self.offset_of(row, 0);
    }

    /// 移动到行尾
    pub fn move_to_line_end(&mut self) {
        let (row, _) = self.cursor_row_col();
        self.cursor = self.offset_of(row, usize::MAX);
    }

    /// 光标所在行列（按字符计）
    pub fn cursor_row_col(&self) -> (usize, usize) {
        let before = &self.buffer[..self.cursor];
        let row = before.matches('\n').count();
        let col = before.rsplit('\n').next().map_or(0, |line| line.chars().count());
        (row, col)
    }

    /// 行列对应的字节偏移，列超出行长时落在行尾
    fn offset_of(
        &self,
        row: usize,
        col: usize,
    ) -> usize {
        let mut offset = 0;
        for (i, line) in self.buffer.split('\n').enumerate() {
            if i == row {
                return offset
                    + line
                        .char_indices()
                        .nth(col)
                        .map_or(line.len(), |(at, _)| at);
            }
            offset += line.len() + 1;
        }
        self.buffer.len()
    }

    /// 处理编辑按键，返回是否已消费
    pub fn handle_key(
        &mut self,
        key: KeyEvent,
    ) -> bool {
        match key.code {
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(ch)
            }
            KeyCode::Enter => self.insert_char('\n'),
            KeyCode::Tab => {
                self.insert_char(' ');
                self.insert_char(' ');
            }
            KeyCode::Backspace => self.delete_char(),
            KeyCode::Delete => self.delete_forward(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Up => self.move_up(),
            KeyCode::Down => self.move_down(),
            KeyCode::Home => self.move_to_line_start(),
            KeyCode::End => self.move_to_line_end(),
            _ => return false,
        }
        true
    }

    /// 渲染输入窗口
    pub fn render(
        &mut self,
        f: &mut Frame<'_>,
        area: Rect,
        focused: bool,
    ) {
        let border = if focused { Color::Cyan } else { Color::DarkGray };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Plain)
            .border_style(Style::default().fg(border))
            .title(" Editor ");
        let inner = block.inner(area);
        f.render_widget(block, area);

        // 保持光标行可见
        let (row, col) = self.cursor_row_col();
        let row = u16::try_from(row).unwrap_or(u16::MAX);
        if row < self.scroll {
            self.scroll = row;
        } else if inner.height > 0 && row >= self.scroll + inner.height {
            self.scroll = row - inner.height + 1;
        }

        let paragraph = Paragraph::new(self.buffer.as_str())
            .style(Style::default().fg(Color::White))
            .scroll((self.scroll, 0));
        f.render_widget(paragraph, inner);

        if focused {
            let col = u16::try_from(col).unwrap_or(u16::MAX);
            f.set_cursor_position(Position::new(
                inner.x.saturating_add(col).min(inner.right().saturating_sub(1)),
                inner.y + (row - self.scroll),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(
        window: &mut InputWindow,
        text: &str,
    ) {
        for ch in text.chars() {
            let code = if ch == '\n' { KeyCode::Enter } else { KeyCode::Char(ch) };
            assert!(window.handle_key(key(code)));
        }
    }

    #[test]
    fn test_typing_and_backspace() {
        let mut window = InputWindow::new();
        type_text(&mut window, "print \"héllo\"\nadd 1 2");
        assert_eq!(window.cursor_row_col(), (1, 7));

        window.handle_key(key(KeyCode::Backspace));
        assert_eq!(window.text(), "print \"héllo\"\nadd 1 ");
    }

    #[test]
    fn test_vertical_movement_clamps_column() {
        let mut window = InputWindow::new();
        window.set_text("set name 1\nx\nprint name");
        window.move_up();
        assert_eq!(window.cursor_row_col(), (1, 1));
        window.move_up();
        assert_eq!(window.cursor_row_col(), (0, 1));
        window.move_to_line_end();
        window.move_down();
        window.move_down();
        assert_eq!(window.cursor_row_col(), (2, 1));
        window.move_to_line_end();
        assert_eq!(window.cursor_row_col(), (2, 10));
    }

    #[test]
    fn test_multibyte_cursor_moves_by_char() {
        let mut window = InputWindow::new();
        window.set_text("äö");
        window.move_left();
        window.insert_char('x');
        assert_eq!(window.text(), "äxö");
        window.move_to_line_start();
        window.delete_forward();
        assert_eq!(window.text(), "xö");
    }

    #[test]
    fn test_control_chords_not_consumed() {
        let mut window = InputWindow::new();
        let chord = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL);
        assert!(!window.handle_key(chord));
        assert!(window.is_blank());
    }
}
