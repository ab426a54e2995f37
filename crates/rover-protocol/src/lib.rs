//! # Rover Protocol
//!
//! 电机控制器串口协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `command`: 运动指令（`w`/`s`/`a`/`d`/`x`/`follow` + 可选速度后缀）
//! - `response`: 外设应答行解析（如 `Distance: 42`）
//! - `labels`: 识别文本到运动指令的映射表
//!
//! ## 线路格式
//!
//! 半双工、以 `\n` 结尾的 ASCII 行：
//!
//! ```text
//! host -> peripheral : "w150\n"
//! peripheral -> host : "Distance: 42\n"   （或者不应答）
//! ```

pub mod command;
pub mod labels;
pub mod response;

// 重新导出常用类型
pub use command::{Command, CommandKind, LINE_TERMINATOR};
pub use labels::{LabelMap, LabelRule};
pub use response::{DISTANCE_REQUEST, parse_distance};

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("Invalid speed suffix {suffix:?} in command {command:?}")]
    InvalidSpeed { command: String, suffix: String },

    #[error("Label rule has no patterns")]
    EmptyPatterns,
}
