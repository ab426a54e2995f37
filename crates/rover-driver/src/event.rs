//! 感知事件类型

use std::fmt;
use std::time::Instant;

/// 人员检测器：画面中有人
pub const PERSON_PRESENT: &str = "person";

/// 人员检测器：画面中无人
pub const PERSON_ABSENT: &str = "none";

/// 分类事件来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// 地面指令字母的文字识别
    Ocr,
    /// 人员检测
    PersonDetector,
    /// 超声波测距
    Ultrasonic,
}

impl Source {
    pub fn name(self) -> &'static str {
        match self {
            Source::Ocr => "ocr",
            Source::PersonDetector => "person",
            Source::Ultrasonic => "ultrasonic",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 适配器产生的原始分类事件（不可变，由去抖滤波器消费一次）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationEvent {
    pub source: Source,
    pub label: String,
    pub timestamp: Instant,
}

impl ClassificationEvent {
    /// 以当前时间创建事件
    pub fn new(source: Source, label: impl Into<String>) -> Self {
        Self::at(source, label, Instant::now())
    }

    pub fn at(source: Source, label: impl Into<String>, timestamp: Instant) -> Self {
        Self {
            source,
            label: label.into(),
            timestamp,
        }
    }
}

/// 通过去抖的稳定判定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilizedDecision {
    pub source: Source,
    pub label: String,
    /// 发出判定时的连续观测次数（等于稳定阈值）
    pub observed_run_length: usize,
}

/// 人员检测标签 → 是否有人
///
/// 未知标签返回 `None`。
pub fn person_presence(label: &str) -> Option<bool> {
    if label.eq_ignore_ascii_case(PERSON_PRESENT) {
        Some(true)
    } else if label.eq_ignore_ascii_case(PERSON_ABSENT) {
        Some(false)
    } else {
        None
    }
}
