//! 应用程序状态管理
//!
//! 管理 Playground 的编辑区、运行记录、输入请求对话框和按键映射。
//! 求值本身由 [`super::tui::Playground`] 驱动，这里只记录界面状态。

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::backends::dev::repl::engine::{ActiveRequest, Evaluation, SessionError, SessionStats};
use crate::backends::dev::tui_repl::components::{
    InputWindow, ModalEvent, OutputConsole, ReadlineModal,
};

/// 诊断来源名
pub const SOURCE_NAME: &str = "playground";

/// 用户动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    /// 运行编辑区内容
    Run(String),
    /// 中断当前求值
    Abort,
    /// 回答当前输入请求
    Answer(String),
}

/// 应用程序状态
#[derive(Default)]
pub struct App {
    /// 编辑区
    pub editor: InputWindow,
    /// 运行记录
    pub transcript: OutputConsole,
    /// 当前输入请求
    modal: Option<ReadlineModal>,
    /// 是否正在求值
    running: bool,
    /// 状态栏信息
    status: String,
}

impl App {
    /// 创建新的应用
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建应用并预载脚本
    pub fn with_source(source: impl Into<String>) -> Self {
        let mut app = Self::new();
        app.editor.set_text(source);
        app
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn modal(&self) -> Option<&ReadlineModal> {
        self.modal.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// 处理终端事件
    pub fn handle_event(
        &mut self,
        event: Event,
    ) -> Action {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key_event(key),
            Event::Mouse(mouse) => {
                match mouse.kind {
                    MouseEventKind::ScrollUp => self.transcript.scroll_up(3),
                    MouseEventKind::ScrollDown => self.transcript.scroll_down(3),
                    _ => {}
                }
                Action::None
            }
            _ => Action::None,
        }
    }

    /// 处理按键事件
    pub fn handle_key_event(
        &mut self,
        key: KeyEvent,
    ) -> Action {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        // 对话框打开时独占键盘（退出与中断除外）
        if let Some(modal) = self.modal.as_mut() {
            if ctrl && key.code == KeyCode::Char('q') {
                return Action::Quit;
            }
            if ctrl && key.code == KeyCode::Char('r') {
                return Action::Abort;
            }
            return match modal.handle_key(key) {
                ModalEvent::Editing => Action::None,
                ModalEvent::Submit(answer) => {
                    self.modal = None;
                    Action::Answer(answer)
                }
                ModalEvent::Dismiss => Action::Abort,
            };
        }

        match key.code {
            KeyCode::Char('q') if ctrl => Action::Quit,
            KeyCode::Char('r') if ctrl => {
                if self.running {
                    Action::Abort
                } else if self.editor.is_blank() {
                    Action::None
                } else {
                    Action::Run(self.editor.text().to_string())
                }
            }
            KeyCode::Char('c') if ctrl && self.running => Action::Abort,
            KeyCode::Esc if self.running => Action::Abort,
            KeyCode::Char('l') if ctrl => {
                self.transcript.clear();
                Action::None
            }
            KeyCode::PageUp => {
                self.transcript.scroll_up(5);
                Action::None
            }
            KeyCode::PageDown => {
                self.transcript.scroll_down(5);
                Action::None
            }
            _ => {
                self.editor.handle_key(key);
                Action::None
            }
        }
    }

    /// 开始求值
    pub fn begin_run(
        &mut self,
        source: &str,
    ) {
        self.running = true;
        self.status = "Running".to_string();
        self.transcript.push_input(source);
    }

    /// 输入请求变化
    pub fn set_request(
        &mut self,
        request: Option<ActiveRequest>,
    ) {
        match request {
            Some(request) => {
                let same = self
                    .modal
                    .as_ref()
                    .is_some_and(|modal| modal.request() == request.id);
                if !same {
                    self.status = "Waiting for input".to_string();
                    self.modal = Some(ReadlineModal::new(&request));
                }
            }
            None => {
                if self.modal.take().is_some() {
                    self.status = "Running".to_string();
                }
            }
        }
    }

    /// 求值结束，返回会话是否应当退出
    pub fn finish_run(
        &mut self,
        result: Result<Evaluation, SessionError>,
        stats: SessionStats,
    ) -> bool {
        self.running = false;
        self.modal = None;
        self.status = format!(
            "{} evaluations, {:.1?} total",
            stats.eval_count, stats.total_time
        );

        match result {
            Ok(evaluation) => {
                self.transcript
                    .push_diagnostics(SOURCE_NAME, &evaluation.logs);
                if evaluation.cancelled {
                    self.transcript.push_notice("(Interrupted)");
                }
                if evaluation.should_exit {
                    self.transcript.push_notice("(Exited)");
                }
                evaluation.should_exit
            }
            Err(SessionError::Terminated) => true,
            Err(err @ SessionError::Evaluator(_)) => {
                self.transcript.push_notice(err.to_string());
                false
            }
        }
    }

    /// 渲染应用
    pub fn render(
        &mut self,
        f: &mut Frame<'_>,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // 标题栏
                Constraint::Min(0),    // 主内容区域
                Constraint::Length(1), // 状态栏
            ])
            .split(f.area());

        self.render_title_bar(f, chunks[0]);

        // 两栏布局：编辑区 | 运行记录
        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);
        self.editor
            .render(f, main_chunks[0], self.modal.is_none());
        self.transcript.render(f, main_chunks[1]);

        self.render_status_bar(f, chunks[2]);

        if let Some(modal) = &self.modal {
            modal.render(f, chunks[1]);
        }
    }

    /// 渲染标题栏
    fn render_title_bar(
        &self,
        f: &mut Frame<'_>,
        area: Rect,
    ) {
        let title = format!("  Quill Playground v{}  ", crate::VERSION);
        let help = if self.running {
            "  Ctrl-R/Esc:Abort | Ctrl-Q:Quit  "
        } else {
            "  Ctrl-R:Run | Ctrl-L:Clear | PgUp/PgDn:Scroll | Ctrl-Q:Quit  "
        };

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(u16::try_from(help.len()).unwrap_or(u16::MAX)),
            ])
            .split(area);

        f.render_widget(
            Paragraph::new(Span::styled(
                title,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ))
            .style(Style::default().bg(Color::Rgb(50, 50, 50)))
            .alignment(Alignment::Left),
            chunks[0],
        );

        f.render_widget(
            Paragraph::new(Span::styled(help, Style::default().fg(Color::Cyan)))
                .style(Style::default().bg(Color::Rgb(50, 50, 50)))
                .alignment(Alignment::Right),
            chunks[1],
        );
    }

    /// 渲染状态栏：运行按钮随状态切换为中断按钮
    fn render_status_bar(
        &self,
        f: &mut Frame<'_>,
        area: Rect,
    ) {
        let button = if self.running {
            Span::styled(
                " ■ Abort ",
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Red)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(
                " ▶ Run ",
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
        };
        let line = Line::from(vec![
            button,
            Span::raw(" "),
            Span::styled(self.status.as_str(), Style::default().fg(Color::Gray)),
        ]);
        f.render_widget(Paragraph::new(line), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::dev::repl::engine::{OutputFragment, SessionController};
    use crate::runtime::Runtime;
    use ratatui::{backend::TestBackend, Terminal};
    use std::future::Future;

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn screen(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 12)).unwrap();
        terminal.draw(|f| app.render(f)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(usize::from(buffer.area.width))
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_run_becomes_abort_while_running() {
        let mut app = App::with_source("print 1");
        assert_eq!(app.handle_key_event(ctrl('r')), Action::Run("print 1".to_string()));

        app.begin_run("print 1");
        assert!(app.is_running());
        assert_eq!(app.handle_key_event(ctrl('r')), Action::Abort);
        assert_eq!(
            app.handle_key_event(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)),
            Action::Abort
        );
    }

    #[test]
    fn test_blank_editor_does_not_run() {
        let mut app = App::new();
        assert_eq!(app.handle_key_event(ctrl('r')), Action::None);
        assert_eq!(app.handle_key_event(ctrl('q')), Action::Quit);
    }

    #[test]
    fn test_typing_goes_to_editor() {
        let mut app = App::new();
        for ch in "add 1 2".chars() {
            app.handle_key_event(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE));
        }
        assert_eq!(app.editor.text(), "add 1 2");
    }

    #[tokio::test]
    async fn test_readline_modal_answers() {
        let mut app = App::new();
        let mut controller = SessionController::new(Runtime::new());
        let handle = controller.handle();
        let mut active = handle.subscribe();
        let source = "concat \"hi \" (readline \"name? \")";

        app.begin_run(source);
        let result = {
            let eval = controller.evaluate_line(source);
            tokio::pin!(eval);
            loop {
                tokio::select! {
                    result = &mut eval => break result,
                    changed = active.changed() => {
                        changed.unwrap();
                        app.set_request(active.borrow_and_update().clone());
                        let Some(modal) = app.modal() else { continue };
                        assert_eq!(modal.prompt(), "name? ");
                        for ch in "ada".chars() {
                            app.handle_key_event(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE));
                        }
                        let action = app.handle_key_event(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
                        assert_eq!(action, Action::Answer("ada".to_string()));
                        if let Action::Answer(answer) = action {
                            handle.submit_readline_answer(answer).unwrap();
                        }
                    }
                }
            }
        };

        let evaluation = result.unwrap();
        assert_eq!(evaluation.output.as_deref(), Some("hi ada"));
        assert!(app.modal().is_none());
        for fragment in &evaluation.fragments {
            app.transcript.push_fragment(fragment);
        }
        let stats = controller.stats();
        assert!(!app.finish_run(Ok(evaluation), stats));
        assert!(!app.is_running());
        assert_eq!(stats.eval_count, 1);
        assert!(app.status().starts_with("1 evaluations"));
    }

    #[test]
    fn test_modal_escape_aborts() {
        let mut app = App::new();
        app.begin_run("readline");
        let broker = crate::backends::dev::repl::engine::ReadlineBroker::new();
        let token = crate::backends::dev::repl::engine::CancellationManager::new().current_token();
        let pending = broker.request("> ", &token);
        futures::pin_mut!(pending);
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);
        assert!(pending.as_mut().poll(&mut cx).is_pending());

        app.set_request(broker.active());
        assert!(app.modal().is_some());
        assert_eq!(
            app.handle_key_event(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)),
            Action::Abort
        );
        app.set_request(None);
        assert!(app.modal().is_none());
    }

    #[test]
    fn test_render_shows_transcript_and_button() {
        let mut app = App::with_source("add 1 2");
        app.transcript
            .push_fragment(&OutputFragment::result("3"));
        let idle = screen(&mut app);
        assert!(idle.contains("Run"));
        assert!(idle.contains("= 3"));
        assert!(idle.contains("add 1 2"));

        app.begin_run("add 1 2");
        let running = screen(&mut app);
        assert!(running.contains("Abort"));
    }

    #[test]
    fn test_cancelled_run_is_marked() {
        let mut app = App::new();
        app.begin_run("sleep 1000");
        let evaluation = Evaluation {
            cancelled: true,
            ..Evaluation::default()
        };
        assert!(!app.finish_run(Ok(evaluation), SessionStats::default()));
        let last = app.transcript.entries().last().unwrap();
        assert_eq!(last.text, "(Interrupted)");
    }
}
