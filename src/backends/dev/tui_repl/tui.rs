//! TUI Playground 主框架
//!
//! 使用 ratatui 实现的脚本编辑与运行界面。终端事件由独立线程读取并送入
//! 通道；求值 future 与事件、输出片段、输入请求一起在 `select!` 中轮询。

use std::io;
use std::time::Duration;

use anyhow::Context;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::backends::dev::repl::backend_trait::ScriptBackend;
use crate::backends::dev::repl::engine::{BrokerError, SessionController};
use crate::backends::dev::tui_repl::app::{Action, App};

type CrosstermTerminal = Terminal<CrosstermBackend<io::Stdout>>;

/// 事件线程轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// TUI Playground 主结构
pub struct Playground<B: ScriptBackend> {
    /// 终端实例
    terminal: CrosstermTerminal,
    /// 应用程序状态
    app: App,
    /// 会话控制器
    controller: SessionController<B>,
    /// 终端事件
    events: mpsc::UnboundedReceiver<Event>,
    restored: bool,
}

impl<B: ScriptBackend> Playground<B> {
    /// 创建 Playground，`source` 预载到编辑区
    pub fn new(
        controller: SessionController<B>,
        source: Option<String>,
    ) -> anyhow::Result<Self> {
        // 设置终端
        enable_raw_mode().context("failed to enable raw mode")?;
        // 此时 Playground 尚未构造，Drop 不会执行
        let (terminal, events) = or_restore(setup_terminal(), leave_terminal)?;

        let app = match source {
            Some(source) => App::with_source(source),
            None => App::new(),
        };

        Ok(Self {
            terminal,
            app,
            controller,
            events,
            restored: false,
        })
    }

    /// 运行直到退出
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            draw(&mut self.terminal, &mut self.app)?;

            let Some(event) = self.events.recv().await else {
                debug!("terminal event reader stopped");
                break;
            };
            match self.app.handle_event(event) {
                Action::Quit => break,
                Action::Run(source) => {
                    if self.run_source(&source).await? {
                        break;
                    }
                }
                Action::Abort | Action::Answer(_) | Action::None => {}
            }
        }
        self.restore()
    }

    /// 运行一段脚本。返回会话是否应当结束。
    async fn run_source(
        &mut self,
        source: &str,
    ) -> anyhow::Result<bool> {
        let handle = self.controller.handle();
        let mut active = handle.subscribe();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut quit_requested = false;

        self.app.begin_run(source);
        let result = {
            let eval = self.controller.evaluate_streaming(source, tx);
            tokio::pin!(eval);

            loop {
                draw(&mut self.terminal, &mut self.app)?;
                tokio::select! {
                    biased;
                    Some(fragment) = rx.recv() => self.app.transcript.push_fragment(&fragment),
                    result = &mut eval => break result,
                    changed = active.changed() => {
                        if changed.is_err() {
                            continue;
                        }
                        let request = active.borrow_and_update().clone();
                        self.app.set_request(request);
                    }
                    Some(event) = self.events.recv() => match self.app.handle_event(event) {
                        Action::Abort => {
                            debug!("abort requested");
                            handle.interrupt();
                        }
                        Action::Quit => {
                            quit_requested = true;
                            handle.interrupt();
                        }
                        Action::Answer(answer) => match handle.submit_readline_answer(answer) {
                            Ok(()) => {}
                            Err(BrokerError::NoActiveRequest) => {
                                debug!("answer arrived after request ended")
                            }
                        },
                        Action::Run(_) | Action::None => {}
                    },
                }
            }
        };
        while let Ok(fragment) = rx.try_recv() {
            self.app.transcript.push_fragment(&fragment);
        }

        let should_exit = self.app.finish_run(result, self.controller.stats());
        Ok(should_exit || quit_requested)
    }

    /// 恢复终端
    fn restore(&mut self) -> anyhow::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl<B: ScriptBackend> Drop for Playground<B> {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            warn!(error = %err, "failed to restore terminal");
        }
    }
}

/// 进入备用屏幕并启动事件线程（raw mode 已开启）
fn setup_terminal() -> anyhow::Result<(CrosstermTerminal, mpsc::UnboundedReceiver<Event>)> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("failed to create terminal")?;
    Ok((terminal, spawn_event_reader()?))
}

/// 退出备用屏幕并关闭 raw mode
fn leave_terminal() -> io::Result<()> {
    let left = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
    disable_raw_mode()?;
    left
}

/// 初始化失败时先恢复终端，再返回原错误
fn or_restore<T>(
    setup: anyhow::Result<T>,
    restore: impl FnOnce() -> io::Result<()>,
) -> anyhow::Result<T> {
    setup.or_else(|err| {
        if let Err(restore_err) = restore() {
            warn!(error = %restore_err, "failed to restore terminal");
        }
        Err(err)
    })
}

fn draw(
    terminal: &mut CrosstermTerminal,
    app: &mut App,
) -> anyhow::Result<()> {
    terminal
        .draw(|f| app.render(f))
        .context("failed to draw playground")?;
    Ok(())
}

/// 在独立线程读取终端事件，接收端关闭后线程退出
fn spawn_event_reader() -> anyhow::Result<mpsc::UnboundedReceiver<Event>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("quill-events".to_string())
        .spawn(move || {
            while !tx.is_closed() {
                match event::poll(POLL_INTERVAL) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(err) => {
                        warn!(error = %err, "terminal event poll failed");
                        break;
                    }
                }
                match event::read() {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "terminal event read failed");
                        break;
                    }
                }
            }
        })
        .context("failed to spawn terminal event thread")?;
    Ok(rx)
}
