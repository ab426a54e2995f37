//! 串口连接参数

use anyhow::{Context, Result};
use clap::Args;
use rover_serial::{SerialConfig, SerialSession, discover_port};
use rover_tools::RoverConfig;

/// 串口参数（覆盖配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// 串口设备（如 /dev/ttyACM0），未指定时自动发现
    #[arg(short, long)]
    pub port: Option<String>,

    /// 波特率
    #[arg(short, long)]
    pub baud: Option<u32>,
}

impl ConnectionArgs {
    /// 合并命令行参数和配置文件，得到串口配置
    ///
    /// 端口优先级：命令行 > 配置文件 > 自动发现
    pub fn resolve(&self, config: &RoverConfig) -> Result<SerialConfig> {
        let port = match self.port.clone().or_else(|| config.serial.port.clone()) {
            Some(port) => port,
            None => discover_port()
                .context("枚举串口失败")?
                .ok_or_else(|| anyhow::anyhow!("未找到 Arduino，请检查连接或使用 --port 指定"))?,
        };

        Ok(SerialConfig {
            port,
            baud: self.baud.unwrap_or(config.serial.baud),
            read_timeout: config.serial.read_timeout(),
            write_timeout: config.serial.write_timeout(),
            settle: config.serial.settle(),
        })
    }

    /// 打开串口会话（包含复位等待）
    pub fn open(&self, config: &RoverConfig) -> Result<SerialSession> {
        let serial = self.resolve(config)?;
        println!("🔌 连接到 {} ({} baud)...", serial.port, serial.baud);

        let session = SerialSession::open(&serial)
            .with_context(|| format!("无法连接串口 {}", serial.port))?;
        println!("✅ 已连接到 {}", serial.port);
        Ok(session)
    }
}
