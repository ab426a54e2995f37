//! # Rover Serial Transport
//!
//! 串口传输层：与电机控制器（Arduino 等）之间的半双工、按行请求/应答通信。
//!
//! - 每次 `send` 恰好写一行、最多读一行应答，不做内部重试
//! - 读等待受 `read_timeout` 约束，外设沉默返回 `Ok(None)` 而不是错误
//! - 会话关闭是幂等的，并在 `Drop` 时兜底释放串口

use rover_protocol::{Command, DISTANCE_REQUEST, parse_distance};
use thiserror::Error;

pub mod discovery;
pub mod session;

#[cfg(feature = "mock")]
pub mod mock;

pub use discovery::{PortInfo, discover_port, list_ports};
pub use session::{PortIo, SerialConfig, SerialSession};

#[cfg(feature = "mock")]
pub use mock::MockTransport;

/// 串口传输层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    /// 串口无法打开，或外设未完成复位握手（启动阶段致命）
    #[error("Failed to open serial port {port}: {message}")]
    Connection { port: String, message: String },

    /// 会话中途的读写故障
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 读超时（`send` 内部映射为 `Ok(None)`）
    #[error("Read timeout")]
    Timeout,

    /// 会话已关闭
    #[error("Serial session closed")]
    Closed,
}

impl SerialError {
    /// 是否为致命错误（链路不可再信任）
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SerialError::Timeout)
    }
}

/// 按行传输抽象
///
/// 控制循环只依赖这个 trait，测试时可以替换为 [`MockTransport`]（`mock` feature）。
pub trait LineTransport {
    /// 发送一行并等待最多一行应答
    ///
    /// - `Ok(Some(line))`: 收到应答（已去除首尾空白）
    /// - `Ok(None)`: 在读超时内没有应答
    /// - `Err(_)`: 底层 IO 故障或会话已关闭
    fn send(&mut self, line: &str) -> Result<Option<String>, SerialError>;

    /// 关闭会话（幂等）
    fn close(&mut self) -> Result<(), SerialError>;

    /// 会话是否仍然打开
    fn is_open(&self) -> bool;

    /// 发送运动指令
    fn send_command(&mut self, command: &Command) -> Result<Option<String>, SerialError> {
        self.send(&command.encode())
    }

    /// 向外设查询超声波测距结果（厘米）
    ///
    /// 外设沉默或应答不是测距格式时返回 `Ok(None)`。
    fn query_distance(&mut self) -> Result<Option<u32>, SerialError> {
        Ok(self.send(DISTANCE_REQUEST)?.as_deref().and_then(parse_distance))
    }
}

impl<T: LineTransport + ?Sized> LineTransport for Box<T> {
    fn send(&mut self, line: &str) -> Result<Option<String>, SerialError> {
        (**self).send(line)
    }

    fn close(&mut self) -> Result<(), SerialError> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
