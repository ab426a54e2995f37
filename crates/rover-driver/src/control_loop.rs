//! Control Loop - 顶层控制循环
//!
//! 单线程 tick 循环，是 [`VehicleIntent`] 的唯一写者，也是传输层 `send` 的唯一调用者。
//!
//! # 每个 tick
//!
//! 1. 检查关闭标志（协作式取消，只在 tick 开头生效）
//! 2. 读取测距：外部 [`RangeAdapter`]，或者向外设发送 `distance` 查询
//! 3. 轮询 OCR / 人员检测适配器，送入各自的去抖滤波器；人员信号只取决于本 tick
//!    的轮询结果（没有识别结果视为无人，适配器不可用则不提供信号）
//! 4. 仲裁
//! 5. 把决策发送给外设
//! 6. 记录日志和指标
//!
//! # 退出
//!
//! 关闭标志、达到 `max_ticks`、或传输层故障时退出。任何退出路径都会尽力发送一次
//! 停车指令，然后恰好关闭一次传输层。
//!
//! ```rust,ignore
//! use rover_driver::{ArbiterConfig, ControlLoop, LoopConfig};
//! use rover_serial::{SerialConfig, SerialSession};
//!
//! let session = SerialSession::open(&SerialConfig::default())?;
//! let control = ControlLoop::new(session, LoopConfig::default(), ArbiterConfig::default())?
//!     .with_range_adapter(ultrasonic);
//! let summary = control.run()?;
//! ```

use crate::adapter::{ClassificationAdapter, RangeAdapter};
use crate::arbiter::{
    ArbiterConfig, Arbitrator, Decision, DecisionReason, TickInput, VehicleIntent,
};
use crate::debounce::DebounceFilter;
use crate::error::DriverError;
use crate::event::{Source, StabilizedDecision, person_presence};
use crate::metrics::RoverMetrics;
use rover_protocol::Command;
use rover_serial::{LineTransport, SerialError};
use spin_sleep::SpinSleeper;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 控制循环配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// tick 间隔
    ///
    /// 直接串口控制通常 100ms；由图像感知驱动时受适配器延迟限制，可放宽到 500ms-1s。
    pub poll_interval: Duration,

    /// 去抖阈值（同一标签连续出现次数）
    pub stability_threshold: usize,

    /// 未配置测距适配器时，是否每个 tick 向外设查询距离
    pub query_distance: bool,

    /// 最大 tick 数（None 表示一直运行到关闭）
    pub max_ticks: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            stability_threshold: 3,
            query_distance: false,
            max_ticks: None,
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.poll_interval.is_zero() {
            return Err(DriverError::Config("poll_interval must be > 0".to_string()));
        }
        if self.stability_threshold == 0 {
            return Err(DriverError::Config("stability_threshold must be >= 1".to_string()));
        }
        if self.poll_interval > Duration::from_secs(5) {
            warn!(
                "Very long poll interval: {:?}. Obstacle checks will lag behind.",
                self.poll_interval
            );
        }
        Ok(())
    }
}

/// 循环退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// 收到关闭请求（Ctrl+C、`q`、输入结束）
    Shutdown,
    /// 达到 `max_ticks`
    MaxTicks,
}

/// 运行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub exit: LoopExit,
    pub ticks: u64,
    pub intent: VehicleIntent,
}

/// 单个 tick 的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub distance_cm: Option<u32>,
    pub text: Option<StabilizedDecision>,
    pub person_present: Option<bool>,
    pub decision: Option<Decision>,
    /// 外设应答（仅用于日志，不参与仲裁）
    pub reply: Option<String>,
}

/// 分类适配器单个 tick 的轮询结果
#[derive(Debug)]
enum ClassifierPoll {
    /// 未配置适配器，或适配器不可用
    NoInput,
    /// 适配器正常，但没有识别结果
    Nothing,
    /// 观测到一个标签（以及可能产生的稳定判定）
    Observed(Option<StabilizedDecision>),
}

pub struct ControlLoop<T: LineTransport> {
    transport: T,
    config: LoopConfig,
    arbitrator: Arbitrator,
    ocr_filter: DebounceFilter,
    person_filter: DebounceFilter,
    ocr: Option<Box<dyn ClassificationAdapter + Send>>,
    person: Option<Box<dyn ClassificationAdapter + Send>>,
    range: Option<Box<dyn RangeAdapter + Send>>,
    shutdown: Arc<AtomicBool>,
    metrics: Arc<RoverMetrics>,
    ticks: u64,
    finished: bool,
}

impl<T: LineTransport> ControlLoop<T> {
    /// 创建控制循环（接管传输层的所有权）
    pub fn new(
        transport: T,
        config: LoopConfig,
        arbiter: ArbiterConfig,
    ) -> Result<Self, DriverError> {
        config.validate()?;

        Ok(Self {
            transport,
            ocr_filter: DebounceFilter::new(Source::Ocr, config.stability_threshold),
            person_filter: DebounceFilter::new(Source::PersonDetector, config.stability_threshold),
            config,
            arbitrator: Arbitrator::new(arbiter),
            ocr: None,
            person: None,
            range: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(RoverMetrics::new()),
            ticks: 0,
            finished: false,
        })
    }

    /// 设置 OCR 适配器
    pub fn with_ocr_adapter(
        mut self,
        adapter: impl ClassificationAdapter + Send + 'static,
    ) -> Self {
        self.ocr = Some(Box::new(adapter));
        self
    }

    /// 设置人员检测适配器（标签 `person` / `none`）
    pub fn with_person_adapter(
        mut self,
        adapter: impl ClassificationAdapter + Send + 'static,
    ) -> Self {
        self.person = Some(Box::new(adapter));
        self
    }

    /// 设置测距适配器（优先于外设查询）
    pub fn with_range_adapter(mut self, adapter: impl RangeAdapter + Send + 'static) -> Self {
        self.range = Some(Box::new(adapter));
        self
    }

    /// 使用外部共享的关闭标志（如 Ctrl+C 处理器设置的标志）
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn metrics(&self) -> Arc<RoverMetrics> {
        self.metrics.clone()
    }

    pub fn intent(&self) -> &VehicleIntent {
        self.arbitrator.intent()
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// 执行一个 tick
    ///
    /// 返回 `Err` 表示传输层故障，调用方应调用 [`finish`](Self::finish) 后退出。
    pub fn tick(&mut self, now: Instant) -> Result<TickReport, DriverError> {
        self.ticks += 1;
        self.metrics.ticks.fetch_add(1, Ordering::Relaxed);

        // 1. 测距
        let distance_cm = self.poll_distance()?;

        // 2. 分类适配器 + 去抖
        let ocr_poll = Self::poll_classifier(&mut self.ocr, &mut self.ocr_filter, &self.metrics);
        let text = match ocr_poll {
            ClassifierPoll::Observed(decision) => decision,
            ClassifierPoll::NoInput | ClassifierPoll::Nothing => None,
        };
        let person_poll =
            Self::poll_classifier(&mut self.person, &mut self.person_filter, &self.metrics);
        if let ClassifierPoll::Observed(Some(decision)) = &person_poll {
            debug!("Person detector stabilized on {:?}", decision.label);
        }
        let person_present = self.person_signal(&person_poll);

        // 3. 仲裁
        let input = TickInput {
            distance_cm,
            text,
            person_present,
        };
        let suppressed_before = self.arbitrator.suppressed_count();
        let decision = self.arbitrator.arbitrate(&input, now);
        let suppressed = self.arbitrator.suppressed_count() - suppressed_before;
        if suppressed > 0 {
            self.metrics.cooldown_suppressions.fetch_add(suppressed, Ordering::Relaxed);
        }

        // 4. 发送
        let mut reply = None;
        if let Some(decision) = decision {
            if decision.reason == DecisionReason::ObstacleOverride {
                self.metrics.obstacle_overrides.fetch_add(1, Ordering::Relaxed);
            }
            reply = self.transmit(&decision.command, decision.reason)?;
        }

        debug!(
            "tick {}: distance={:?} text={:?} person={:?} decision={:?} mode={}",
            self.ticks,
            distance_cm,
            input.text.as_ref().map(|d| d.label.as_str()),
            person_present,
            decision.map(|d| d.command),
            self.arbitrator.intent().mode
        );

        Ok(TickReport {
            distance_cm,
            text: input.text,
            person_present,
            decision,
            reply,
        })
    }

    /// 运行直到关闭、达到 `max_ticks` 或传输层故障
    pub fn run(mut self) -> Result<RunSummary, DriverError> {
        let period = self.config.poll_interval;
        let sleeper = SpinSleeper::default();
        info!("Control loop started (poll interval {:?})", period);

        let mut next_tick = Instant::now();
        let exit = loop {
            if self.shutdown.load(Ordering::Acquire) {
                break LoopExit::Shutdown;
            }
            if let Some(max_ticks) = self.config.max_ticks
                && self.ticks >= max_ticks
            {
                break LoopExit::MaxTicks;
            }

            if let Err(e) = self.tick(Instant::now()) {
                error!("Control loop aborted: {}", e);
                self.finish();
                return Err(e);
            }

            // 睡眠到下一个锚点（扣除 tick 本身的耗时）
            next_tick += period;
            let now = Instant::now();
            if next_tick > now {
                sleeper.sleep(next_tick - now);
            } else {
                // 外设沉默时一次 send 就会占满读超时，这里只追赶锚点
                debug!("Tick overrun by {:?}", now - next_tick);
                next_tick = now;
            }
        };

        info!("Control loop stopped after {} ticks ({:?})", self.ticks, exit);
        self.finish();

        Ok(RunSummary {
            exit,
            ticks: self.ticks,
            intent: self.arbitrator.intent().clone(),
        })
    }

    /// 尽力发送停车指令并关闭传输层（只执行一次）
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        if self.transport.is_open() {
            match self.transport.send_command(&Command::stop()) {
                Ok(_) => {
                    self.metrics.commands_sent.fetch_add(1, Ordering::Relaxed);
                    info!("Final stop sent");
                },
                Err(e) => {
                    self.metrics.transport_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("Failed to send final stop: {}", e);
                },
            }
        }

        if let Err(e) = self.transport.close() {
            warn!("Failed to close transport: {}", e);
        }
    }

    fn poll_distance(&mut self) -> Result<Option<u32>, DriverError> {
        if let Some(range) = self.range.as_mut() {
            return match range.poll() {
                Ok(distance) => Ok(distance),
                Err(e) => {
                    self.metrics.adapter_failures.fetch_add(1, Ordering::Relaxed);
                    warn!("Range adapter: {}", e);
                    Ok(None)
                },
            };
        }

        if !self.config.query_distance {
            return Ok(None);
        }
        self.transport
            .query_distance()
            .map_err(|e| self.transport_failure(e))
    }

    fn poll_classifier(
        adapter: &mut Option<Box<dyn ClassificationAdapter + Send>>,
        filter: &mut DebounceFilter,
        metrics: &RoverMetrics,
    ) -> ClassifierPoll {
        let Some(adapter) = adapter.as_mut() else {
            return ClassifierPoll::NoInput;
        };
        match adapter.poll() {
            Ok(Some(event)) if event.label.trim().is_empty() => ClassifierPoll::Nothing,
            Ok(Some(event)) => {
                if event.source != filter.source() {
                    debug!(
                        "Event from {} routed to the {} filter",
                        event.source,
                        filter.source()
                    );
                }
                ClassifierPoll::Observed(filter.observe(&event.label))
            },
            Ok(None) => ClassifierPoll::Nothing,
            Err(e) => {
                metrics.adapter_failures.fetch_add(1, Ordering::Relaxed);
                warn!("{} adapter: {}", filter.source(), e);
                ClassifierPoll::NoInput
            },
        }
    }

    /// 本 tick 的人员检测信号
    ///
    /// - 没有适配器或适配器不可用：`None`（不参与仲裁）
    /// - 没有识别结果或识别到其他标签：`Some(false)`
    /// - `person` 连续段已达到阈值：`Some(true)`
    /// - `person` 连续段尚未达到阈值：`None`
    fn person_signal(&self, poll: &ClassifierPoll) -> Option<bool> {
        match poll {
            ClassifierPoll::NoInput => None,
            ClassifierPoll::Nothing => Some(false),
            ClassifierPoll::Observed(_) => {
                let filter = &self.person_filter;
                match filter.current_label().and_then(person_presence) {
                    Some(true) if filter.is_stable() => Some(true),
                    Some(true) => None,
                    _ => Some(false),
                }
            },
        }
    }

    fn transmit(
        &mut self,
        command: &Command,
        reason: DecisionReason,
    ) -> Result<Option<String>, DriverError> {
        let reply = self
            .transport
            .send_command(command)
            .map_err(|e| self.transport_failure(e))?;
        self.metrics.commands_sent.fetch_add(1, Ordering::Relaxed);

        match &reply {
            Some(line) => info!("Sent {} ({}), reply: {}", command, reason, line),
            None => {
                self.metrics.silent_acks.fetch_add(1, Ordering::Relaxed);
                info!("Sent {} ({}), no reply", command, reason);
            },
        }
        Ok(reply)
    }

    fn transport_failure(&self, e: SerialError) -> DriverError {
        self.metrics.transport_errors.fetch_add(1, Ordering::Relaxed);
        DriverError::Serial(e)
    }
}

impl<T: LineTransport> Drop for ControlLoop<T> {
    fn drop(&mut self) {
        self.finish();
    }
}
