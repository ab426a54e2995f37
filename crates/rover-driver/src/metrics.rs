//! 运行指标
//!
//! 控制循环的原子计数器，可在循环运行时从其他线程读取快照。

use std::sync::atomic::{AtomicU64, Ordering};

/// 控制循环指标
#[derive(Debug, Default)]
pub struct RoverMetrics {
    /// 已执行的 tick 数
    pub ticks: AtomicU64,
    /// 已发送的运动指令数（含避障停车和退出时的停车）
    pub commands_sent: AtomicU64,
    /// 避障停车次数
    pub obstacle_overrides: AtomicU64,
    /// 外设未应答（读超时）的发送次数
    pub silent_acks: AtomicU64,
    /// 适配器不可用次数
    pub adapter_failures: AtomicU64,
    /// 因冷却未发送的文字指令次数
    pub cooldown_suppressions: AtomicU64,
    /// 传输层故障次数
    pub transport_errors: AtomicU64,
}

impl RoverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取一致性不要求严格的快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            obstacle_overrides: self.obstacle_overrides.load(Ordering::Relaxed),
            silent_acks: self.silent_acks.load(Ordering::Relaxed),
            adapter_failures: self.adapter_failures.load(Ordering::Relaxed),
            cooldown_suppressions: self.cooldown_suppressions.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }

    /// 清零全部计数器
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.commands_sent.store(0, Ordering::Relaxed);
        self.obstacle_overrides.store(0, Ordering::Relaxed);
        self.silent_acks.store(0, Ordering::Relaxed);
        self.adapter_failures.store(0, Ordering::Relaxed);
        self.cooldown_suppressions.store(0, Ordering::Relaxed);
        self.transport_errors.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub commands_sent: u64,
    pub obstacle_overrides: u64,
    pub silent_acks: u64,
    pub adapter_failures: u64,
    pub cooldown_suppressions: u64,
    pub transport_errors: u64,
}
