//! # Rover CLI
//!
//! Command-line interface for perception-driven rover control.
//!
//! ## 自主模式
//!
//! ```bash
//! # 控制循环：标准输入注入感知事件（ocr/person/range），q 退出
//! rover-cli run --port /dev/ttyACM0
//!
//! # 由外设超声波测距驱动避障
//! rover-cli run --query-distance
//! ```
//!
//! ## 直接控制
//!
//! ```bash
//! $ rover-cli drive
//! drive> w150
//! drive> d?
//! drive> q
//! ```
//!
//! ## 其他
//!
//! ```bash
//! rover-cli send x          # 单条指令
//! rover-cli ports           # 列出串口
//! rover-cli config check    # 检查配置
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod connection;
mod input;
mod settings;

use commands::{ConfigCommand, DriveCommand, RunCommand, SendCommand};

/// Rover CLI - 小车控制命令行工具
#[derive(Parser, Debug)]
#[command(name = "rover-cli")]
#[command(about = "Command-line interface for perception-driven rover control", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件（默认 <config_dir>/rover/config.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行自主控制循环
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 直接控制（交互式）
    Drive {
        #[command(flatten)]
        args: DriveCommand,
    },

    /// 发送单条指令
    Send {
        #[command(flatten)]
        args: SendCommand,
    },

    /// 列出串口设备
    Ports,

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rover_cli=info".parse()?)
                .add_directive("rover_driver=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = settings::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { args } => args.execute(&config),

        Commands::Drive { args } => args.execute(&config),

        Commands::Send { args } => args.execute(&config),

        Commands::Ports => commands::ports::execute(),

        Commands::Config(cmd) => cmd.execute(&config),
    }
}
