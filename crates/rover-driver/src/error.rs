//! 驱动层错误类型定义

use rover_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口传输错误（会话中途故障，循环终止）
    #[error("Serial transport error: {0}")]
    Serial(#[from] SerialError),

    /// 控制循环配置无效
    #[error("Invalid loop config: {0}")]
    Config(String),
}

/// 传感器适配器错误
///
/// 非致命：该数据源本 tick 不提供输入，仲裁照常进行。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("Adapter unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::Serial(SerialError::Closed);
        let msg = format!("{}", err);
        assert!(msg.contains("Serial session closed"), "{}", msg);

        let err = DriverError::Config("poll_interval must be > 0".to_string());
        assert_eq!(err.to_string(), "Invalid loop config: poll_interval must be > 0");
    }

    #[test]
    fn test_from_serial_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged");
        let err: DriverError = SerialError::Io(io).into();
        assert!(matches!(err, DriverError::Serial(SerialError::Io(_))));
    }

    #[test]
    fn test_adapter_error_display() {
        let err = AdapterError::Unavailable("camera not ready".to_string());
        assert_eq!(err.to_string(), "Adapter unavailable: camera not ready");
    }
}
