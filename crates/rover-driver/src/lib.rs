//! # Rover Driver
//!
//! 指令仲裁与控制循环：把异步、带噪声的感知信号（地面字母 OCR、人员检测、
//! 超声波测距）转换成一条稳定的运动指令流，通过串口发送给电机控制器。
//!
//! ```text
//! 传感器适配器 → ClassificationEvent → DebounceFilter → StabilizedDecision
//!             → Arbitrator → （每 tick 至多一条）Command → LineTransport → 外设
//! ```
//!
//! - [`DebounceFilter`]: 连续 N 次相同标签才认为稳定
//! - [`Arbitrator`]: 避障 > 文字指令 > 跟随 > 空闲，带冷却
//! - [`ControlLoop`]: 单线程 tick 循环，拥有传输层并保证退出时关闭
//! - [`DirectSession`]: 操作员直接控制模式

pub mod adapter;
pub mod arbiter;
pub mod control_loop;
pub mod debounce;
pub mod direct;
mod error;
pub mod event;
pub mod metrics;

pub use adapter::{ChannelAdapter, ChannelRangeAdapter, ClassificationAdapter, RangeAdapter};
pub use arbiter::{
    ArbiterConfig, Arbitrator, Decision, DecisionReason, Mode, TickInput, VehicleIntent,
};
pub use control_loop::{ControlLoop, LoopConfig, LoopExit, RunSummary, TickReport};
pub use debounce::DebounceFilter;
pub use direct::{DirectInput, DirectOutcome, DirectSession};
pub use error::{AdapterError, DriverError};
pub use event::{
    ClassificationEvent, PERSON_ABSENT, PERSON_PRESENT, Source, StabilizedDecision,
    person_presence,
};
pub use metrics::{MetricsSnapshot, RoverMetrics};
