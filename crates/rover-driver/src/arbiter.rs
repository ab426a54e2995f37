//! 指令仲裁器
//!
//! 每个 tick 决定是否发送、发送什么指令。优先级（从高到低）：
//!
//! 1. **避障**：距离小于阈值立即停车，不受冷却限制，`mode = Stopped`
//! 2. **文字指令**：OCR 稳定判定经映射表命中指令，`mode = TextControlled`，
//!    永久退出跟随模式；冷却结束才发送
//! 3. **跟随**：仅在未退出跟随模式时生效；有人且冷却结束发送 `follow`，
//!    确认无人且冷却结束发送停车
//! 4. **空闲**：不发送
//!
//! 仲裁本身不会失败。冷却时钟在决定发送时就更新（至多一次语义），
//! 传输层随后失败也不回滚。

use crate::event::{Source, StabilizedDecision};
use rover_protocol::{Command, LabelMap};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 车辆控制模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// 跟随模式（默认）
    #[default]
    Follow,
    /// 文字指令控制
    TextControlled,
    /// 避障停车
    Stopped,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Follow => "follow",
            Mode::TextControlled => "text",
            Mode::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// 仲裁器的持久状态（每个控制循环恰好一份）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleIntent {
    pub mode: Mode,
    pub last_command: Option<Command>,
    /// 最近一次非避障指令的发送时间（冷却时钟）
    pub last_command_time: Option<Instant>,
    /// 是否已因文字指令永久退出跟随模式
    ///
    /// 与 `mode` 分开记录：避障会把 `mode` 改为 `Stopped`，但不能因此重新进入跟随。
    pub follow_latched_off: bool,
}

/// 仲裁配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbiterConfig {
    /// 两条非避障指令之间的最小间隔
    pub cooldown: Duration,
    /// 避障阈值（厘米）
    pub obstacle_threshold_cm: u32,
    /// 识别文本映射表
    pub labels: LabelMap,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(1),
            obstacle_threshold_cm: 15,
            labels: LabelMap::default(),
        }
    }
}

/// 单个 tick 的仲裁输入
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickInput {
    /// 本 tick 的测距结果（厘米）
    pub distance_cm: Option<u32>,
    /// 本 tick 的 OCR 稳定判定
    pub text: Option<StabilizedDecision>,
    /// 人员检测结果（`None` 表示没有人员检测信号）
    pub person_present: Option<bool>,
}

/// 决策原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    ObstacleOverride,
    TextCommand,
    Follow,
    PersonLost,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecisionReason::ObstacleOverride => "obstacle",
            DecisionReason::TextCommand => "text",
            DecisionReason::Follow => "follow",
            DecisionReason::PersonLost => "person-lost",
        };
        f.write_str(name)
    }
}

/// 仲裁结果：本 tick 要发送的指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub command: Command,
    pub reason: DecisionReason,
}

impl Decision {
    /// 是否绕过冷却（避障停车）
    pub fn bypasses_cooldown(&self) -> bool {
        self.reason == DecisionReason::ObstacleOverride
    }
}

#[derive(Debug, Clone)]
pub struct Arbitrator {
    config: ArbiterConfig,
    intent: VehicleIntent,
    /// 因冷却未发送的文字指令次数
    suppressed: u64,
}

impl Arbitrator {
    pub fn new(config: ArbiterConfig) -> Self {
        Self {
            config,
            intent: VehicleIntent::default(),
            suppressed: 0,
        }
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn intent(&self) -> &VehicleIntent {
        &self.intent
    }

    /// 因冷却被抑制的文字指令累计次数
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed
    }

    /// 距离是否触发避障
    pub fn is_obstacle(&self, distance_cm: u32) -> bool {
        distance_cm < self.config.obstacle_threshold_cm
    }

    /// 冷却是否已结束
    pub fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.intent.last_command_time {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.config.cooldown,
        }
    }

    /// 仲裁一个 tick
    pub fn arbitrate(&mut self, input: &TickInput, now: Instant) -> Option<Decision> {
        // 1. 避障（最高优先级，不受冷却限制）
        if let Some(distance) = input.distance_cm
            && self.is_obstacle(distance)
        {
            warn!(
                "Obstacle at {} cm (< {} cm), stopping",
                distance, self.config.obstacle_threshold_cm
            );
            self.intent.mode = Mode::Stopped;
            self.intent.last_command = Some(Command::stop());
            return Some(Decision {
                command: Command::stop(),
                reason: DecisionReason::ObstacleOverride,
            });
        }

        // 2. 文字指令
        if let Some(text) = &input.text
            && text.source == Source::Ocr
            && let Some(command) = self.config.labels.lookup(&text.label)
        {
            self.intent.mode = Mode::TextControlled;
            if !self.intent.follow_latched_off {
                debug!("Text command {:?} recognized, leaving follow mode", text.label);
                self.intent.follow_latched_off = true;
            }

            if !self.cooldown_elapsed(now) {
                self.suppressed += 1;
                debug!("Text command {} suppressed by cooldown", command);
                return None;
            }
            return Some(self.issue(command, DecisionReason::TextCommand, now));
        }

        // 3. 跟随
        if self.intent.follow_latched_off || !self.cooldown_elapsed(now) {
            return None;
        }
        match input.person_present {
            Some(true) => {
                self.intent.mode = Mode::Follow;
                Some(self.issue(Command::follow(), DecisionReason::Follow, now))
            },
            Some(false) => {
                self.intent.mode = Mode::Follow;
                Some(self.issue(Command::stop(), DecisionReason::PersonLost, now))
            },
            // 4. 空闲
            None => None,
        }
    }

    fn issue(&mut self, command: Command, reason: DecisionReason, now: Instant) -> Decision {
        self.intent.last_command = Some(command);
        self.intent.last_command_time = Some(now);
        Decision { command, reason }
    }
}

impl Default for Arbitrator {
    fn default() -> Self {
        Self::new(ArbiterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_protocol::CommandKind;

    fn text(label: &str) -> Option<StabilizedDecision> {
        Some(StabilizedDecision {
            source: Source::Ocr,
            label: label.to_string(),
            observed_run_length: 3,
        })
    }

    #[test]
    fn test_idle_without_signals() {
        let mut arb = Arbitrator::default();
        assert_eq!(arb.arbitrate(&TickInput::default(), Instant::now()), None);
        assert_eq!(arb.intent().mode, Mode::Follow);
    }

    #[test]
    fn test_obstacle_beats_text() {
        let mut arb = Arbitrator::default();
        let input = TickInput {
            distance_cm: Some(12),
            text: text("FORWARD"),
            person_present: Some(true),
        };
        let decision = arb.arbitrate(&input, Instant::now()).unwrap();
        assert_eq!(decision.command, Command::stop());
        assert!(decision.bypasses_cooldown());
        assert_eq!(arb.intent().mode, Mode::Stopped);
        assert!(!arb.intent().follow_latched_off);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut arb = Arbitrator::default();
        let input = TickInput {
            distance_cm: Some(15),
            ..TickInput::default()
        };
        assert_eq!(arb.arbitrate(&input, Instant::now()), None);
    }

    #[test]
    fn test_obstacle_does_not_consume_cooldown() {
        let mut arb = Arbitrator::default();
        let t0 = Instant::now();
        let obstacle = TickInput {
            distance_cm: Some(5),
            ..TickInput::default()
        };
        assert!(arb.arbitrate(&obstacle, t0).is_some());
        assert!(arb.arbitrate(&obstacle, t0 + Duration::from_millis(10)).is_some());
        assert_eq!(arb.intent().last_command_time, None);

        let forward = TickInput {
            text: text("W"),
            ..TickInput::default()
        };
        let decision = arb.arbitrate(&forward, t0 + Duration::from_millis(20)).unwrap();
        assert_eq!(decision.command.kind, CommandKind::Forward);
    }

    #[test]
    fn test_text_cooldown() {
        let mut arb = Arbitrator::default();
        let t0 = Instant::now();
        let left = TickInput {
            text: text("LEFT"),
            ..TickInput::default()
        };
        assert!(arb.arbitrate(&left, t0).is_some());

        let right = TickInput {
            text: text("RIGHT"),
            ..TickInput::default()
        };
        assert_eq!(arb.arbitrate(&right, t0 + Duration::from_millis(500)), None);
        assert_eq!(arb.suppressed_count(), 1);
        assert_eq!(arb.intent().mode, Mode::TextControlled);

        let decision = arb.arbitrate(&right, t0 + Duration::from_millis(1000)).unwrap();
        assert_eq!(decision.command.kind, CommandKind::Right);
        assert_eq!(decision.reason, DecisionReason::TextCommand);
    }

    #[test]
    fn test_unmapped_text_falls_through_to_follow() {
        let config = ArbiterConfig {
            labels: LabelMap::new(vec![
                rover_protocol::LabelRule::new(["GO"], Command::new(CommandKind::Forward)).unwrap(),
            ]),
            ..ArbiterConfig::default()
        };
        let mut arb = Arbitrator::new(config);
        let input = TickInput {
            text: text("HELLO"),
            person_present: Some(true),
            ..TickInput::default()
        };
        let decision = arb.arbitrate(&input, Instant::now()).unwrap();
        assert_eq!(decision.reason, DecisionReason::Follow);
        assert!(!arb.intent().follow_latched_off);
    }

    #[test]
    fn test_non_ocr_decision_is_not_a_text_command() {
        let mut arb = Arbitrator::default();
        let input = TickInput {
            text: Some(StabilizedDecision {
                source: Source::PersonDetector,
                label: "STOP".to_string(),
                observed_run_length: 3,
            }),
            ..TickInput::default()
        };
        assert_eq!(arb.arbitrate(&input, Instant::now()), None);
        assert_eq!(arb.intent().mode, Mode::Follow);
    }

    #[test]
    fn test_follow_and_person_lost() {
        let mut arb = Arbitrator::default();
        let t0 = Instant::now();

        let present = TickInput {
            person_present: Some(true),
            ..TickInput::default()
        };
        let decision = arb.arbitrate(&present, t0).unwrap();
        assert_eq!(decision.command, Command::follow());

        // 冷却中
        assert_eq!(arb.arbitrate(&present, t0 + Duration::from_millis(100)), None);

        let absent = TickInput {
            person_present: Some(false),
            ..TickInput::default()
        };
        let decision = arb.arbitrate(&absent, t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(decision.command, Command::stop());
        assert_eq!(decision.reason, DecisionReason::PersonLost);
    }

    #[test]
    fn test_text_latches_follow_off_even_when_suppressed() {
        let mut arb = Arbitrator::default();
        let t0 = Instant::now();
        let present = TickInput {
            person_present: Some(true),
            ..TickInput::default()
        };
        assert!(arb.arbitrate(&present, t0).is_some());

        // 冷却中收到文字指令：不发送，但跟随模式已被关闭
        let stop = TickInput {
            text: text("STOP"),
            person_present: Some(true),
            ..TickInput::default()
        };
        assert_eq!(arb.arbitrate(&stop, t0 + Duration::from_millis(200)), None);
        assert!(arb.intent().follow_latched_off);

        for secs in 2..10 {
            assert_eq!(arb.arbitrate(&present, t0 + Duration::from_secs(secs)), None);
        }
    }

    #[test]
    fn test_obstacle_after_text_does_not_restore_follow() {
        let mut arb = Arbitrator::default();
        let t0 = Instant::now();
        arb.arbitrate(&TickInput { text: text("F"), ..Default::default() }, t0);

        let obstacle = TickInput {
            distance_cm: Some(3),
            ..TickInput::default()
        };
        arb.arbitrate(&obstacle, t0 + Duration::from_millis(100));
        assert_eq!(arb.intent().mode, Mode::Stopped);

        let present = TickInput {
            distance_cm: Some(100),
            person_present: Some(true),
            ..TickInput::default()
        };
        assert_eq!(arb.arbitrate(&present, t0 + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_obstacle_without_text_allows_follow_again() {
        let mut arb = Arbitrator::default();
        let t0 = Instant::now();
        let obstacle = TickInput {
            distance_cm: Some(3),
            person_present: Some(true),
            ..TickInput::default()
        };
        arb.arbitrate(&obstacle, t0);
        assert_eq!(arb.intent().mode, Mode::Stopped);

        let clear = TickInput {
            distance_cm: Some(80),
            person_present: Some(true),
            ..TickInput::default()
        };
        let decision = arb.arbitrate(&clear, t0 + Duration::from_millis(100)).unwrap();
        assert_eq!(decision.reason, DecisionReason::Follow);
        assert_eq!(arb.intent().mode, Mode::Follow);
    }
}
