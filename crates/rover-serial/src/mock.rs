//! Mock 传输层
//!
//! 用于测试的模拟外设：记录发送的每一行，按脚本返回应答，并可以模拟链路故障。
//! 内部状态放在 `Arc<Mutex<_>>` 中，克隆出的句柄可以在控制循环运行后检查发送记录。

use crate::{LineTransport, SerialError};
use rover_protocol::DISTANCE_REQUEST;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MockState {
    /// 已发送的行（不含 `\n`）
    sent: Vec<String>,
    /// 运动指令的应答脚本（`None` 表示外设沉默）
    replies: VecDeque<Option<String>>,
    /// 测距请求的应答脚本（厘米）
    distances: VecDeque<Option<u32>>,
    /// 第 N 次发送（从 0 开始计数）起返回 IO 错误
    fail_from: Option<usize>,
    open: bool,
    close_calls: usize,
}

/// 模拟外设
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// 创建一个已打开、默认沉默的模拟外设
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                open: true,
                ..MockState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // 测试代码中 panic 后继续使用也无妨
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 追加一条运动指令应答
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.lock().replies.push_back(Some(reply.into()));
    }

    /// 追加一次沉默（读超时）
    pub fn push_silence(&self) {
        self.lock().replies.push_back(None);
    }

    /// 追加一次测距结果
    pub fn push_distance(&self, cm: u32) {
        self.lock().distances.push_back(Some(cm));
    }

    /// 追加多次测距结果
    pub fn push_distances(&self, readings: impl IntoIterator<Item = u32>) {
        let mut state = self.lock();
        state.distances.extend(readings.into_iter().map(Some));
    }

    /// 追加一次测距沉默
    pub fn push_distance_silence(&self) {
        self.lock().distances.push_back(None);
    }

    /// 从第 `n` 次发送起模拟 IO 故障（`n = 0` 表示第一次发送就失败）
    pub fn fail_from(&self, n: usize) {
        self.lock().fail_from = Some(n);
    }

    /// 已发送的所有行
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// 已发送的非测距行（即运动指令）
    pub fn sent_commands(&self) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter(|line| line.as_str() != DISTANCE_REQUEST)
            .cloned()
            .collect()
    }

    /// `close()` 被调用的次数
    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LineTransport for MockTransport {
    fn send(&mut self, line: &str) -> Result<Option<String>, SerialError> {
        let mut state = self.lock();
        if !state.open {
            return Err(SerialError::Closed);
        }

        let attempt = state.sent.len();
        if state.fail_from.is_some_and(|n| attempt >= n) {
            return Err(SerialError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock link failure",
            )));
        }

        state.sent.push(line.to_string());

        if line == DISTANCE_REQUEST {
            let reading = state.distances.pop_front().flatten();
            return Ok(reading.map(|cm| format!("Distance: {}", cm)));
        }

        Ok(state.replies.pop_front().flatten())
    }

    fn close(&mut self) -> Result<(), SerialError> {
        let mut state = self.lock();
        state.close_calls += 1;
        state.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_protocol::Command;

    #[test]
    fn test_records_and_replies() {
        let mock = MockTransport::new();
        mock.push_reply("OK");
        mock.push_silence();

        let mut transport = mock.clone();
        assert_eq!(transport.send("w").unwrap().as_deref(), Some("OK"));
        assert_eq!(transport.send("x").unwrap(), None);
        // 脚本耗尽后默认沉默
        assert_eq!(transport.send("a").unwrap(), None);

        assert_eq!(mock.sent(), vec!["w", "x", "a"]);
    }

    #[test]
    fn test_distance_script() {
        let mock = MockTransport::new();
        mock.push_distances([20, 12]);
        mock.push_reply("ack");

        let mut transport = mock.clone();
        assert_eq!(transport.query_distance().unwrap(), Some(20));
        assert_eq!(transport.send_command(&Command::stop()).unwrap().as_deref(), Some("ack"));
        assert_eq!(transport.query_distance().unwrap(), Some(12));
        assert_eq!(transport.query_distance().unwrap(), None);

        assert_eq!(mock.sent_commands(), vec!["x"]);
    }

    #[test]
    fn test_failure_injection() {
        let mock = MockTransport::new();
        mock.fail_from(1);

        let mut transport = mock.clone();
        assert!(transport.send("w").is_ok());
        assert!(matches!(transport.send("w"), Err(SerialError::Io(_))));
        assert_eq!(mock.sent(), vec!["w"]);
    }

    #[test]
    fn test_closed_transport_rejects_send() {
        let mut transport = MockTransport::new();
        transport.close().unwrap();
        transport.close().unwrap();
        assert!(!transport.is_open());
        assert_eq!(transport.close_calls(), 2);
        assert!(matches!(transport.send("w"), Err(SerialError::Closed)));
    }
}
