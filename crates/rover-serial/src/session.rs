//! 串口会话
//!
//! `SerialSession` 独占串口句柄：启动时打开一次，所有退出路径上关闭一次。
//! 读写逻辑只依赖 [`PortIo`]，因此可以在没有硬件的情况下用内存端口测试超时行为。

use crate::{LineTransport, SerialError};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// 单次 read 调用的缓冲区大小
const READ_CHUNK: usize = 64;

/// 未消费字节的上限（外设持续输出或不发换行时丢弃）
const MAX_PENDING_BYTES: usize = 1024;

/// 串口配置
///
/// # Example
///
/// ```
/// use rover_serial::SerialConfig;
/// use std::time::Duration;
///
/// let config = SerialConfig {
///     port: "/dev/ttyACM0".to_string(),
///     read_timeout: Duration::from_millis(500),
///     ..SerialConfig::default()
/// };
/// assert_eq!(config.baud, 9600);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// 设备路径（如 `/dev/ttyUSB0`、`COM3`）
    pub port: String,
    /// 波特率
    pub baud: u32,
    /// 等待应答行的最长时间
    pub read_timeout: Duration,
    /// 写一行的最长时间
    pub write_timeout: Duration,
    /// 打开后的稳定等待（Arduino 打开串口时会复位）
    pub settle: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: 9600,
            read_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            settle: Duration::from_secs(2),
        }
    }
}

/// 会话使用的底层端口能力
///
/// `Box<dyn SerialPort>` 实现了这个 trait；测试可以提供内存实现。
pub trait PortIo: Read + Write + Send {
    /// 设置后续 read/write 的超时
    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// 丢弃输入缓冲区中的所有字节
    fn discard_input(&mut self) -> io::Result<()>;
}

impl PortIo for Box<dyn SerialPort> {
    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        SerialPort::set_timeout(&mut **self, timeout).map_err(io::Error::from)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        SerialPort::clear(&**self, ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// 串口会话
///
/// # Example
///
/// ```no_run
/// use rover_serial::{LineTransport, SerialConfig, SerialSession};
///
/// let mut session = SerialSession::open(&SerialConfig::default())?;
/// if let Some(reply) = session.send("w150")? {
///     println!("peripheral: {}", reply);
/// }
/// session.close()?;
/// # Ok::<(), rover_serial::SerialError>(())
/// ```
pub struct SerialSession<P: PortIo = Box<dyn SerialPort>> {
    port: Option<P>,
    port_name: String,
    read_timeout: Duration,
    write_timeout: Duration,
    /// 已读入但尚未消费的字节（换行之后的剩余部分）
    pending: Vec<u8>,
}

impl SerialSession {
    /// 打开串口并完成复位握手
    ///
    /// # Errors
    /// - `SerialError::Connection`: 串口无法打开，或握手时清空缓冲区失败
    pub fn open(config: &SerialConfig) -> Result<Self, SerialError> {
        info!(
            "Opening serial port {} at {} baud",
            config.port, config.baud
        );

        let port = serialport::new(&config.port, config.baud)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .timeout(config.write_timeout)
            .open()
            .map_err(|e| SerialError::Connection {
                port: config.port.clone(),
                message: e.to_string(),
            })?;

        Self::from_port(port, config)
    }
}

impl<P: PortIo> SerialSession<P> {
    /// 在已打开的端口上完成握手并创建会话
    ///
    /// 握手：等待 `settle`，然后丢弃外设启动时输出的所有字节。
    pub fn from_port(mut port: P, config: &SerialConfig) -> Result<Self, SerialError> {
        if !config.settle.is_zero() {
            debug!("Waiting {:?} for peripheral reset", config.settle);
            std::thread::sleep(config.settle);
        }

        port.discard_input().map_err(|e| SerialError::Connection {
            port: config.port.clone(),
            message: format!("handshake failed: {}", e),
        })?;

        info!("Connected to peripheral on {}", config.port);

        Ok(Self {
            port: Some(port),
            port_name: config.port.clone(),
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            pending: Vec::new(),
        })
    }

    /// 设备路径
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    fn port_mut(&mut self) -> Result<&mut P, SerialError> {
        self.port.as_mut().ok_or(SerialError::Closed)
    }

    /// 写一行（自动追加 `\n`）
    fn write_line(&mut self, line: &str) -> Result<(), SerialError> {
        let write_timeout = self.write_timeout;
        let port = self.port_mut()?;

        let mut frame = String::with_capacity(line.len() + 1);
        frame.push_str(line);
        frame.push(rover_protocol::LINE_TERMINATOR);

        port.set_io_timeout(write_timeout)?;
        port.write_all(frame.as_bytes())?;
        port.flush()?;
        Ok(())
    }

    /// 从缓冲区取出一整行
    fn take_buffered_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&raw).trim().to_string())
    }

    fn cap_pending(&mut self) {
        if self.pending.len() > MAX_PENDING_BYTES {
            warn!(
                "Discarding {} unterminated bytes from {}",
                self.pending.len(),
                self.port_name
            );
            self.pending.clear();
        }
    }

    /// 读一行应答，最多等待 `read_timeout`
    ///
    /// # Errors
    /// - `SerialError::Timeout`: 截止时间前没有收到完整的一行
    /// - `SerialError::Io`: 底层读故障
    fn read_line(&mut self) -> Result<String, SerialError> {
        let deadline = Instant::now() + self.read_timeout;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(line) = self.take_buffered_line() {
                return Ok(line);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SerialError::Timeout);
            }

            let port = self.port_mut()?;
            port.set_io_timeout(deadline - now)?;

            match port.read(&mut chunk) {
                Ok(0) => {
                    // 部分平台在无数据时返回 0 而不是 TimedOut
                    std::thread::sleep(Duration::from_millis(1));
                },
                Ok(n) => {
                    trace!("Read {} bytes from {}", n, self.port_name);
                    self.pending.extend_from_slice(&chunk[..n]);
                    self.cap_pending();
                },
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) => {},
                Err(e) => return Err(SerialError::Io(e)),
            }
        }
    }
}

impl<P: PortIo> LineTransport for SerialSession<P> {
    fn send(&mut self, line: &str) -> Result<Option<String>, SerialError> {
        self.write_line(line)?;
        debug!("Sent: {}", line);

        match self.read_line() {
            Ok(reply) => {
                debug!("Peripheral: {}", reply);
                Ok(Some(reply))
            },
            Err(SerialError::Timeout) => {
                trace!("No reply to {:?} within {:?}", line, self.read_timeout);
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) -> Result<(), SerialError> {
        let Some(mut port) = self.port.take() else {
            return Ok(());
        };

        self.pending.clear();
        let flushed = port.flush();
        drop(port);
        info!("Serial connection {} closed", self.port_name);
        flushed.map_err(SerialError::from)
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl<P: PortIo> Drop for SerialSession<P> {
    fn drop(&mut self) {
        if self.port.is_some() {
            warn!("Serial session {} dropped without close()", self.port_name);
            if let Err(e) = self.close() {
                warn!("Failed to flush {} on drop: {}", self.port_name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// 内存端口：按脚本返回读数据，超时时真实地阻塞到超时
    #[derive(Clone, Default)]
    struct ScriptedPort {
        inner: Arc<Mutex<ScriptedState>>,
    }

    #[derive(Default)]
    struct ScriptedState {
        reads: VecDeque<Vec<u8>>,
        written: Vec<u8>,
        timeout: Duration,
        discarded: usize,
        fail_reads: bool,
        flushes: usize,
    }

    impl ScriptedPort {
        fn push_read(&self, bytes: &[u8]) {
            self.inner.lock().unwrap().reads.push_back(bytes.to_vec());
        }

        fn written(&self) -> String {
            String::from_utf8(self.inner.lock().unwrap().written.clone()).unwrap()
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let (next, timeout, fail) = {
                let mut state = self.inner.lock().unwrap();
                (state.reads.pop_front(), state.timeout, state.fail_reads)
            };
            if fail {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            match next {
                Some(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                },
                None => {
                    std::thread::sleep(timeout);
                    Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
                },
            }
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.inner.lock().unwrap().written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.lock().unwrap().flushes += 1;
            Ok(())
        }
    }

    impl PortIo for ScriptedPort {
        fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()> {
            self.inner.lock().unwrap().timeout = timeout;
            Ok(())
        }

        fn discard_input(&mut self) -> io::Result<()> {
            let mut state = self.inner.lock().unwrap();
            state.discarded += state.reads.len();
            state.reads.clear();
            Ok(())
        }
    }

    fn test_config(read_timeout_ms: u64) -> SerialConfig {
        SerialConfig {
            port: "mock0".to_string(),
            read_timeout: Duration::from_millis(read_timeout_ms),
            write_timeout: Duration::from_millis(50),
            settle: Duration::ZERO,
            ..SerialConfig::default()
        }
    }

    #[test]
    fn test_handshake_discards_boot_output() {
        let port = ScriptedPort::default();
        port.push_read(b"Arduino ready\n");

        let session = SerialSession::from_port(port.clone(), &test_config(50)).unwrap();
        assert!(session.is_open());
        assert_eq!(port.inner.lock().unwrap().discarded, 1);
    }

    #[test]
    fn test_send_writes_line_and_reads_reply() {
        let port = ScriptedPort::default();
        let mut session = SerialSession::from_port(port.clone(), &test_config(200)).unwrap();

        port.push_read(b"Distance: 42\r\n");
        let reply = session.send("distance").unwrap();

        assert_eq!(reply.as_deref(), Some("Distance: 42"));
        assert_eq!(port.written(), "distance\n");
    }

    #[test]
    fn test_reply_split_across_reads() {
        let port = ScriptedPort::default();
        let mut session = SerialSession::from_port(port.clone(), &test_config(200)).unwrap();

        port.push_read(b"Dist");
        port.push_read(b"ance: 7\nOK\n");

        assert_eq!(session.send("distance").unwrap().as_deref(), Some("Distance: 7"));
        // 换行之后的字节保留给下一次读取
        assert_eq!(session.send("x").unwrap().as_deref(), Some("OK"));
    }

    #[test]
    fn test_chattering_peripheral_does_not_grow_buffer() {
        let port = ScriptedPort::default();
        let mut session = SerialSession::from_port(port.clone(), &test_config(100)).unwrap();

        for _ in 0..40 {
            port.push_read(&[b'#'; READ_CHUNK]);
        }
        assert_eq!(session.send("w").unwrap(), None);
        assert!(session.pending.len() <= MAX_PENDING_BYTES);

        port.push_read(b"OK\n");
        let reply = session.send("x").unwrap().unwrap();
        assert!(reply.ends_with("OK"), "{:?}", reply);
        assert!(session.pending.is_empty());
    }

    #[test]
    fn test_silent_peripheral_returns_none_after_read_timeout() {
        let port = ScriptedPort::default();
        let mut session = SerialSession::from_port(port, &test_config(100)).unwrap();

        let start = Instant::now();
        let reply = session.send("w").unwrap();
        let elapsed = start.elapsed();

        assert_eq!(reply, None);
        assert!(
            elapsed >= Duration::from_millis(100),
            "returned before read_timeout: {:?}",
            elapsed
        );
        assert!(
            elapsed < Duration::from_millis(400),
            "blocked past read_timeout: {:?}",
            elapsed
        );
    }

    #[test]
    fn test_read_fault_is_io_error() {
        let port = ScriptedPort::default();
        let mut session = SerialSession::from_port(port.clone(), &test_config(100)).unwrap();

        port.inner.lock().unwrap().fail_reads = true;
        let err = session.send("w").unwrap_err();
        assert!(matches!(err, SerialError::Io(_)), "{:?}", err);
    }

    #[test]
    fn test_close_is_idempotent() {
        let port = ScriptedPort::default();
        let mut session = SerialSession::from_port(port.clone(), &test_config(50)).unwrap();

        session.close().unwrap();
        session.close().unwrap();
        assert!(!session.is_open());
        assert_eq!(port.inner.lock().unwrap().flushes, 1);

        assert!(matches!(session.send("w"), Err(SerialError::Closed)));
    }

    #[test]
    fn test_drop_closes_open_session() {
        let port = ScriptedPort::default();
        {
            let _session = SerialSession::from_port(port.clone(), &test_config(50)).unwrap();
        }
        assert_eq!(port.inner.lock().unwrap().flushes, 1);
    }

    #[test]
    fn test_open_missing_port_is_connection_error() {
        let config = SerialConfig {
            port: "/dev/does-not-exist-rover".to_string(),
            settle: Duration::ZERO,
            ..SerialConfig::default()
        };
        match SerialSession::open(&config) {
            Err(SerialError::Connection { port, .. }) => {
                assert_eq!(port, "/dev/does-not-exist-rover")
            },
            Err(other) => panic!("Expected Connection error, got {:?}", other),
            Ok(_) => panic!("Expected Connection error"),
        }
    }
}
