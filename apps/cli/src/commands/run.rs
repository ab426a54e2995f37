//! 自主控制循环命令
//!
//! 打开串口，把标准输入注入的感知事件（或外设测距）交给控制循环，
//! 直到 `q`、Ctrl+C、输入结束或串口故障。

use crate::connection::ConnectionArgs;
use crate::input::{EventSenders, spawn_event_input};
use anyhow::{Context, Result};
use clap::Args;
use rover_driver::{
    ArbiterConfig, ChannelAdapter, ChannelRangeAdapter, ControlLoop, LoopConfig, LoopExit,
    Source,
};
use rover_tools::RoverConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 事件通道容量
const EVENT_QUEUE_CAPACITY: usize = 16;

/// 控制循环参数（覆盖配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct RunCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// tick 间隔（毫秒）
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// 指令冷却时间（毫秒）
    #[arg(long)]
    pub cooldown_ms: Option<u64>,

    /// 避障阈值（厘米）
    #[arg(long)]
    pub obstacle_cm: Option<u32>,

    /// 去抖阈值
    #[arg(long)]
    pub stability_threshold: Option<usize>,

    /// 每个 tick 向外设查询超声波距离
    #[arg(long)]
    pub query_distance: bool,

    /// 运行指定 tick 数后退出
    #[arg(long)]
    pub max_ticks: Option<u64>,
}

impl RunCommand {
    /// 合并配置文件与命令行参数
    pub fn loop_config(&self, config: &RoverConfig) -> LoopConfig {
        LoopConfig {
            poll_interval: self
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.control.poll_interval()),
            stability_threshold: self
                .stability_threshold
                .unwrap_or(config.debounce.stability_threshold),
            query_distance: self.query_distance || config.control.query_distance,
            max_ticks: self.max_ticks,
        }
    }

    pub fn arbiter_config(&self, config: &RoverConfig) -> Result<ArbiterConfig> {
        Ok(ArbiterConfig {
            cooldown: self
                .cooldown_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.arbiter.cooldown()),
            obstacle_threshold_cm: self
                .obstacle_cm
                .unwrap_or(config.arbiter.obstacle_threshold_cm),
            labels: config.label_map().context("识别映射表无效")?,
        })
    }

    pub fn execute(&self, config: &RoverConfig) -> Result<()> {
        let loop_config = self.loop_config(config);
        let arbiter = self.arbiter_config(config)?;
        loop_config.validate()?;

        let session = self.connection.open(config)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        ctrlc::set_handler(move || {
            eprintln!("\n🛑 收到 Ctrl+C，停车并退出...");
            flag.store(true, Ordering::Release);
        })
        .context("设置 Ctrl+C 处理器失败")?;

        let (ocr_tx, ocr) = ChannelAdapter::bounded(Source::Ocr, EVENT_QUEUE_CAPACITY);
        // 注入的人员状态一直有效，直到下一次 `person yes|no`
        let (person_tx, person) =
            ChannelAdapter::bounded(Source::PersonDetector, EVENT_QUEUE_CAPACITY);
        let person = person.holding();
        let (range_tx, range) = ChannelRangeAdapter::bounded(EVENT_QUEUE_CAPACITY);

        let mut control = ControlLoop::new(session, loop_config, arbiter)?
            .with_ocr_adapter(ocr)
            .with_person_adapter(person)
            .with_shutdown_flag(shutdown.clone());
        // 外设测距与注入测距二选一
        if !control.config().query_distance {
            control = control.with_range_adapter(range);
        }
        let metrics = control.metrics();

        println!("🚗 控制循环已启动，输入 'help' 查看可注入的事件，'q' 退出");
        // 输入线程可能仍阻塞在 readline 上，退出时不等待它
        let _input = spawn_event_input(
            EventSenders {
                ocr: ocr_tx,
                person: person_tx,
                range: range_tx,
            },
            shutdown,
        );

        let result = control.run();
        let snap = metrics.snapshot();
        println!(
            "📊 ticks: {}, 指令: {}, 避障: {}, 无应答: {}, 冷却抑制: {}, 适配器故障: {}",
            snap.ticks,
            snap.commands_sent,
            snap.obstacle_overrides,
            snap.silent_acks,
            snap.cooldown_suppressions,
            snap.adapter_failures
        );

        let summary = result.context("控制循环因串口故障终止")?;
        match summary.exit {
            LoopExit::Shutdown => println!("👋 已停车并关闭串口"),
            LoopExit::MaxTicks => println!("✅ 已完成 {} 个 tick", summary.ticks),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let config = RoverConfig::default();
        let cmd = RunCommand {
            poll_interval_ms: Some(500),
            cooldown_ms: Some(250),
            obstacle_cm: Some(30),
            max_ticks: Some(10),
            ..RunCommand::default()
        };

        let loop_config = cmd.loop_config(&config);
        assert_eq!(loop_config.poll_interval, Duration::from_millis(500));
        assert_eq!(loop_config.stability_threshold, 3);
        assert_eq!(loop_config.max_ticks, Some(10));
        assert!(!loop_config.query_distance);

        let arbiter = cmd.arbiter_config(&config).unwrap();
        assert_eq!(arbiter.cooldown, Duration::from_millis(250));
        assert_eq!(arbiter.obstacle_threshold_cm, 30);
    }

    #[test]
    fn test_config_values_used_by_default() {
        let mut config = RoverConfig::default();
        config.control.query_distance = true;
        config.debounce.stability_threshold = 5;

        let cmd = RunCommand::default();
        let loop_config = cmd.loop_config(&config);
        assert!(loop_config.query_distance);
        assert_eq!(loop_config.stability_threshold, 5);
        assert_eq!(
            cmd.arbiter_config(&config).unwrap().cooldown,
            Duration::from_secs(1)
        );
    }
}
