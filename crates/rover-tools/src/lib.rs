//! # Rover Tools - 共享配置
//!
//! **依赖原则**: 只依赖 `rover-protocol`，不依赖串口和驱动层
//!
//! ## 包含模块
//!
//! - `config` - 部署配置（TOML，只读结构）

pub mod config;

// 重新导出常用类型
pub use config::{
    ArbiterSettings, ConfigError, ControlSettings, DebounceSettings, DirectSettings, LabelEntry,
    RoverConfig, SerialSettings,
};
