//! 直接控制命令（交互式）
//!
//! ```text
//! $ rover-cli drive --port /dev/ttyACM0
//! drive> w150
//! drive> d?
//! drive> x
//! drive> q
//! ```

use crate::connection::ConnectionArgs;
use anyhow::{Context, Result};
use clap::Args;
use rover_driver::{DirectOutcome, DirectSession};
use rover_tools::RoverConfig;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;

const HISTORY_FILE: &str = ".rover_history";

/// 直接控制参数
#[derive(Args, Debug, Clone, Default)]
pub struct DriveCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 关闭每条指令前的避障检查
    #[arg(long)]
    pub no_obstacle_check: bool,
}

impl DriveCommand {
    pub fn execute(&self, config: &RoverConfig) -> Result<()> {
        let session = self.connection.open(config)?;
        let check_obstacles = config.direct.check_obstacles && !self.no_obstacle_check;
        let mut session = DirectSession::new(
            session,
            config.arbiter.obstacle_threshold_cm,
            check_obstacles,
        );

        let mut rl = Editor::<(), DefaultHistory>::new()
            .map_err(|e| anyhow::anyhow!("Failed to initialize readline: {}", e))?;
        rl.load_history(HISTORY_FILE).ok(); // 首次运行没有历史

        print_help();

        loop {
            if let Some(distance) = session.check_obstacle().context("测距失败")? {
                println!("🛑 检测到障碍物（{} cm），已自动停车", distance);
            }

            let line = match rl.readline("drive> ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                },
            };
            if line.trim().is_empty() {
                continue;
            }
            let _ = rl.add_history_entry(line.trim());

            match session.handle(&line).context("串口通信失败")? {
                DirectOutcome::Quit => break,
                DirectOutcome::Distance(Some(cm)) => println!("📏 当前距离: {} cm", cm),
                DirectOutcome::Distance(None) => println!("⚠️  读取距离失败"),
                DirectOutcome::Sent { command, reply } => match reply {
                    Some(reply) => println!("✅ {} -> {}", command, reply),
                    None => println!("✅ {}（无应答）", command),
                },
                DirectOutcome::Invalid(reason) => {
                    println!("❌ 无效指令: {}", reason);
                    println!("   使用 w/s/a/d/x + 可选速度（如 w150），d? 查询距离，q 退出");
                },
            }
        }

        rl.save_history(HISTORY_FILE).ok();
        session.close();
        println!("👋 已停车并关闭串口");
        Ok(())
    }
}

fn print_help() {
    println!("直接控制模式:");
    println!("  w/s/a/d   前进/后退/左转/右转，可带速度（如 w150）");
    println!("  x         停止");
    println!("  d?        查询距离");
    println!("  q         退出");
}
