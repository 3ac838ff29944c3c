//! Playground 模块
//!
//! 基于 ratatui 的脚本编辑与运行界面，与行式 REPL 共用同一个会话控制器

pub mod app;
pub mod components;
pub mod tui;

// 重新导出 Playground
pub use tui::Playground;

// 重新导出组件
pub use components::{InputWindow, OutputConsole, ReadlineModal};
