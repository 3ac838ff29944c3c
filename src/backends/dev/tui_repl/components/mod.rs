/// UI 组件模块
///
/// 提供 Playground 的各种界面组件
pub mod input_window;
pub mod output_console;
pub mod readline_modal;

pub use input_window::InputWindow;
pub use output_console::{Marker, OutputConsole, OutputEntry};
pub use readline_modal::{ModalEvent, ReadlineModal};
