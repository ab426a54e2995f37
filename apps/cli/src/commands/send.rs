//! 单条指令命令
//!
//! 内部：连接 -> 发送 -> 读取应答 -> 关闭

use crate::connection::ConnectionArgs;
use anyhow::{Context, Result};
use clap::Args;
use rover_protocol::{Command, DISTANCE_REQUEST};
use rover_serial::LineTransport;
use rover_tools::RoverConfig;

/// 单条指令参数
#[derive(Args, Debug, Clone)]
pub struct SendCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 指令（w、w150、x、follow，或 distance 查询距离）
    pub command: String,
}

/// 解析后的单条请求
#[derive(Debug, Clone, PartialEq, Eq)]
enum Request {
    Distance,
    Motion(Command),
}

impl SendCommand {
    fn request(&self) -> Result<Request> {
        let text = self.command.trim();
        if text.eq_ignore_ascii_case(DISTANCE_REQUEST) {
            return Ok(Request::Distance);
        }
        let command = text
            .parse::<Command>()
            .with_context(|| format!("无效指令: {:?}", text))?;
        Ok(Request::Motion(command))
    }

    pub fn execute(&self, config: &RoverConfig) -> Result<()> {
        // 先校验输入，避免无意义的串口复位等待
        let request = self.request()?;
        let mut session = self.connection.open(config)?;

        let result = match request {
            Request::Distance => session.query_distance().map(|distance| match distance {
                Some(cm) => println!("📏 当前距离: {} cm", cm),
                None => println!("⚠️  读取距离失败"),
            }),
            Request::Motion(command) => session.send_command(&command).map(|reply| match reply {
                Some(reply) => println!("✅ {} -> {}", command, reply),
                None => println!("✅ {}（无应答）", command),
            }),
        };

        session.close().context("关闭串口失败")?;
        result.context("串口通信失败")
    }
}
