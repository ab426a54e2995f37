//! # 部署配置
//!
//! 每台小车的阈值、冷却时间、识别映射表都通过配置文件区分，而不是复制脚本。
//!
//! 配置文件路径（由 CLI 决定）：
//! - `--config <file>`
//! - Linux/macOS: `~/.config/rover/config.toml`
//! - Windows: `%APPDATA%\rover\config.toml`
//!
//! 所有字段都有默认值，配置文件只需写需要覆盖的部分。

use rover_protocol::{Command, LabelMap, LabelRule, ProtocolError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid label rule #{index}: {source}")]
    Label {
        index: usize,
        #[source]
        source: ProtocolError,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    /// 串口设置
    pub serial: SerialSettings,

    /// 去抖设置
    pub debounce: DebounceSettings,

    /// 仲裁设置
    pub arbiter: ArbiterSettings,

    /// 控制循环设置
    pub control: ControlSettings,

    /// 直接控制模式设置
    pub direct: DirectSettings,
}

impl RoverConfig {
    /// 从 TOML 文本解析
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RoverConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 序列化为 TOML 文本
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.baud == 0 {
            return Err(ConfigError::Invalid("serial.baud must be > 0".into()));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid("serial.read_timeout_ms must be > 0".into()));
        }
        if self.serial.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid("serial.write_timeout_ms must be > 0".into()));
        }
        if self.debounce.stability_threshold == 0 {
            return Err(ConfigError::Invalid("debounce.stability_threshold must be >= 1".into()));
        }
        if self.control.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("control.poll_interval_ms must be > 0".into()));
        }
        self.label_map().map(|_| ())
    }

    /// 构建识别映射表
    ///
    /// 未配置 `arbiter.labels` 时使用默认表。
    pub fn label_map(&self) -> Result<LabelMap, ConfigError> {
        if self.arbiter.labels.is_empty() {
            return Ok(LabelMap::default());
        }

        let rules = self
            .arbiter
            .labels
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry
                    .to_rule()
                    .map_err(|source| ConfigError::Label { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LabelMap::new(rules))
    }
}

/// 串口设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// 设备路径；未设置时自动发现
    pub port: Option<String>,
    /// 波特率
    pub baud: u32,
    /// 应答读超时（毫秒）
    pub read_timeout_ms: u64,
    /// 写超时（毫秒）
    pub write_timeout_ms: u64,
    /// 打开后等待外设复位的时间（毫秒）
    pub settle_ms: u64,
}

impl SerialSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud: 9600,
            read_timeout_ms: 1000,
            write_timeout_ms: 1000,
            settle_ms: 2000, // Arduino 打开串口会复位，约 2 秒
        }
    }
}

/// 去抖设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceSettings {
    /// 同一标签连续出现多少次才认为稳定
    pub stability_threshold: usize,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            stability_threshold: 3,
        }
    }
}

/// 仲裁设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterSettings {
    /// 两条非避障指令之间的最小间隔（毫秒）
    pub cooldown_ms: u64,
    /// 避障距离阈值（厘米），小于该值立即停车
    pub obstacle_threshold_cm: u32,
    /// 自定义识别映射表（为空时使用默认表）
    pub labels: Vec<LabelEntry>,
}

impl ArbiterSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for ArbiterSettings {
    fn default() -> Self {
        Self {
            cooldown_ms: 1000,
            obstacle_threshold_cm: 15,
            labels: Vec::new(),
        }
    }
}

/// 映射表条目
///
/// ```toml
/// [[arbiter.labels]]
/// patterns = ["GO", "FORWARD"]
/// command = "w150"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEntry {
    /// 匹配模式（不区分大小写的子串）
    pub patterns: Vec<String>,
    /// 指令文本（与线路格式相同，如 `x`、`w150`、`follow`）
    pub command: String,
}

impl LabelEntry {
    fn to_rule(&self) -> Result<LabelRule, ProtocolError> {
        let command: Command = self.command.parse()?;
        LabelRule::new(&self.patterns, command)
    }
}

/// 控制循环设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// tick 间隔（毫秒）；直接串口控制 100ms，图像感知可放宽到 500-1000ms
    pub poll_interval_ms: u64,
    /// 是否每个 tick 通过外设查询超声波距离
    pub query_distance: bool,
}

impl ControlSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            query_distance: false,
        }
    }
}

/// 直接控制模式设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectSettings {
    /// 每条操作员指令前先测距，过近时自动停车
    pub check_obstacles: bool,
}

impl Default for DirectSettings {
    fn default() -> Self {
        Self {
            check_obstacles: true,
        }
    }
}
