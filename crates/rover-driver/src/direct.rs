//! 直接控制会话
//!
//! 操作员逐行输入指令：
//!
//! | 输入 | 动作 |
//! |------|------|
//! | `q` | 退出 |
//! | `d?` | 查询并显示距离 |
//! | `w`/`s`/`a`/`d`/`x` 开头（可带速度，如 `w150`） | 原样发送 |
//! | 其他 | 提示无效指令 |
//!
//! 开启避障检查时，每次等待输入前先测距，过近则自动停车。

use crate::error::DriverError;
use rover_protocol::{Command, CommandKind};
use rover_serial::LineTransport;
use tracing::{info, warn};

/// 解析后的操作员输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectInput {
    Quit,
    QueryDistance,
    Command(Command),
    /// 无效输入（附带原因）
    Invalid(String),
}

impl DirectInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            return DirectInput::Quit;
        }
        if line.eq_ignore_ascii_case("d?") {
            return DirectInput::QueryDistance;
        }

        let Some(first) = line.chars().next() else {
            return DirectInput::Invalid("empty input".to_string());
        };
        // `follow` 只由跟随模式发出，这里只接受方向字母
        if CommandKind::from_letter(first).is_none() {
            return DirectInput::Invalid(format!("unknown command {:?}", line));
        }
        match line.parse::<Command>() {
            Ok(command) => DirectInput::Command(command),
            Err(e) => DirectInput::Invalid(e.to_string()),
        }
    }
}

/// 单次输入的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectOutcome {
    Quit,
    /// 测距结果（外设未应答时为 `None`）
    Distance(Option<u32>),
    Sent {
        command: Command,
        reply: Option<String>,
    },
    Invalid(String),
}

/// 直接控制会话（独占传输层）
pub struct DirectSession<T: LineTransport> {
    transport: T,
    obstacle_threshold_cm: u32,
    check_obstacles: bool,
    closed: bool,
}

impl<T: LineTransport> DirectSession<T> {
    pub fn new(transport: T, obstacle_threshold_cm: u32, check_obstacles: bool) -> Self {
        Self {
            transport,
            obstacle_threshold_cm,
            check_obstacles,
            closed: false,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 测距并在过近时自动停车
    ///
    /// 返回触发停车的距离；未开启避障检查或距离安全时返回 `None`。
    pub fn check_obstacle(&mut self) -> Result<Option<u32>, DriverError> {
        if !self.check_obstacles {
            return Ok(None);
        }

        match self.transport.query_distance()? {
            Some(distance) if distance < self.obstacle_threshold_cm => {
                warn!("Obstacle at {} cm, auto-stopping", distance);
                self.transport.send_command(&Command::stop())?;
                Ok(Some(distance))
            },
            _ => Ok(None),
        }
    }

    /// 处理一行操作员输入
    pub fn handle(&mut self, line: &str) -> Result<DirectOutcome, DriverError> {
        match DirectInput::parse(line) {
            DirectInput::Quit => Ok(DirectOutcome::Quit),
            DirectInput::QueryDistance => {
                Ok(DirectOutcome::Distance(self.transport.query_distance()?))
            },
            DirectInput::Command(command) => {
                let reply = self.transport.send_command(&command)?;
                info!("Sent {}, reply: {:?}", command, reply);
                Ok(DirectOutcome::Sent { command, reply })
            },
            DirectInput::Invalid(reason) => Ok(DirectOutcome::Invalid(reason)),
        }
    }

    /// 停车并关闭传输层（幂等）
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if self.transport.is_open()
            && let Err(e) = self.transport.send_command(&Command::stop())
        {
            warn!("Failed to send final stop: {}", e);
        }
        if let Err(e) = self.transport.close() {
            warn!("Failed to close transport: {}", e);
        }
    }
}

impl<T: LineTransport> Drop for DirectSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}
