//! 运动指令定义
//!
//! 指令集是封闭的：前进 `w`、后退 `s`、左转 `a`、右转 `d`、停止 `x`、跟随 `follow`，
//! 每条指令都可以携带十进制速度后缀（如 `w150`）。

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// 行结束符（外设按行解析）
pub const LINE_TERMINATOR: char = '\n';

/// 指令类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandKind {
    /// 前进（`w`）
    Forward,
    /// 后退（`s`）
    Backward,
    /// 左转（`a`）
    Left,
    /// 右转（`d`）
    Right,
    /// 停止（`x`）
    Stop,
    /// 跟随行人（`follow`）
    Follow,
}

impl CommandKind {
    /// 全部指令类型
    pub const ALL: [CommandKind; 6] = [
        CommandKind::Forward,
        CommandKind::Backward,
        CommandKind::Left,
        CommandKind::Right,
        CommandKind::Stop,
        CommandKind::Follow,
    ];

    /// 线路上的指令字
    pub fn wire(self) -> &'static str {
        match self {
            CommandKind::Forward => "w",
            CommandKind::Backward => "s",
            CommandKind::Left => "a",
            CommandKind::Right => "d",
            CommandKind::Stop => "x",
            CommandKind::Follow => "follow",
        }
    }

    /// 从单个方向字母解析（`w`/`s`/`a`/`d`/`x`，不区分大小写）
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_lowercase() {
            'w' => Some(CommandKind::Forward),
            's' => Some(CommandKind::Backward),
            'a' => Some(CommandKind::Left),
            'd' => Some(CommandKind::Right),
            'x' => Some(CommandKind::Stop),
            _ => None,
        }
    }

    /// 人类可读名称（用于日志）
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Forward => "forward",
            CommandKind::Backward => "backward",
            CommandKind::Left => "left",
            CommandKind::Right => "right",
            CommandKind::Stop => "stop",
            CommandKind::Follow => "follow",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 运动指令
///
/// 由指令类型和可选速度组成。`Copy` 语义，可以随意在仲裁器和控制循环之间传递。
///
/// # Example
///
/// ```
/// use rover_protocol::{Command, CommandKind};
///
/// let cmd: Command = "w150".parse().unwrap();
/// assert_eq!(cmd.kind, CommandKind::Forward);
/// assert_eq!(cmd.speed, Some(150));
/// assert_eq!(cmd.encode(), "w150");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Command {
    /// 指令类型
    pub kind: CommandKind,
    /// 速度后缀（外设自行解释，通常是 PWM 占空比 0-255）
    pub speed: Option<u16>,
}

impl Command {
    /// 创建不带速度的指令
    pub const fn new(kind: CommandKind) -> Self {
        Self { kind, speed: None }
    }

    /// 创建带速度的指令
    pub const fn with_speed(kind: CommandKind, speed: u16) -> Self {
        Self {
            kind,
            speed: Some(speed),
        }
    }

    pub const fn stop() -> Self {
        Self::new(CommandKind::Stop)
    }

    pub const fn follow() -> Self {
        Self::new(CommandKind::Follow)
    }

    /// 是否为停止指令
    pub fn is_stop(&self) -> bool {
        self.kind == CommandKind::Stop
    }

    /// 编码为线路文本（不含行结束符）
    pub fn encode(&self) -> String {
        match self.speed {
            Some(speed) => format!("{}{}", self.kind.wire(), speed),
            None => self.kind.wire().to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.wire())?;
        if let Some(speed) = self.speed {
            write!(f, "{}", speed)?;
        }
        Ok(())
    }
}

impl From<CommandKind> for Command {
    fn from(kind: CommandKind) -> Self {
        Self::new(kind)
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    /// 解析操作员输入（如 `w`、`w150`、`x`、`follow`）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let first = text.chars().next().ok_or(ProtocolError::Empty)?;

        let is_follow = text
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("follow"));
        let (kind, suffix) = if is_follow {
            (CommandKind::Follow, &text[6..])
        } else {
            let kind = CommandKind::from_letter(first)
                .ok_or_else(|| ProtocolError::UnknownCommand(text.to_string()))?;
            (kind, &text[first.len_utf8()..])
        };

        let suffix = suffix.trim();
        if suffix.is_empty() {
            return Ok(Self::new(kind));
        }

        suffix
            .parse::<u16>()
            .map(|speed| Self::with_speed(kind, speed))
            .map_err(|_| ProtocolError::InvalidSpeed {
                command: text.to_string(),
                suffix: suffix.to_string(),
            })
    }
}
