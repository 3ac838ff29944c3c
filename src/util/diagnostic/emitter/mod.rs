//! 诊断输出模块

pub mod json;
pub mod text;

pub use json::JsonEmitter;
pub use text::{format_range, EmitterConfig, TextEmitter};
