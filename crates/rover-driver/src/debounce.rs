//! 去抖滤波器
//!
//! 每个分类来源一个实例。同一标签连续出现 `stability_threshold` 次时发出一次
//! [`StabilizedDecision`]；连续段继续增长不会重复发出。只有与上一次发出的
//! 稳定标签不同的标签达到阈值时才会发出新的判定，中途的一次误识别不会让
//! 同一标签再次发出。
//!
//! 空标签（识别器本 tick 什么都没识别到）不参与计数，也不打断当前连续段。
//!
//! ```
//! use rover_driver::{DebounceFilter, Source};
//!
//! let mut filter = DebounceFilter::new(Source::Ocr, 3);
//! assert!(filter.observe("F").is_none());
//! assert!(filter.observe("F").is_none());
//! let decision = filter.observe("F").unwrap();
//! assert_eq!(decision.label, "F");
//! assert!(filter.observe("F").is_none());
//! ```

use crate::event::{Source, StabilizedDecision};

#[derive(Debug, Clone)]
pub struct DebounceFilter {
    source: Source,
    threshold: usize,
    last_label: Option<String>,
    run_length: usize,
    /// 最近一次发出的稳定标签
    emitted: Option<String>,
}

impl DebounceFilter {
    /// 创建滤波器
    ///
    /// `stability_threshold` 为 0 时按 1 处理（每个新标签立即稳定）。
    pub fn new(source: Source, stability_threshold: usize) -> Self {
        Self {
            source,
            threshold: stability_threshold.max(1),
            last_label: None,
            run_length: 0,
            emitted: None,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// 当前连续段长度
    pub fn run_length(&self) -> usize {
        self.run_length
    }

    /// 当前连续段的标签
    pub fn current_label(&self) -> Option<&str> {
        self.last_label.as_deref()
    }

    /// 当前连续段是否已达到阈值
    pub fn is_stable(&self) -> bool {
        self.last_label.is_some() && self.run_length >= self.threshold
    }

    /// 最近一次发出的稳定标签
    pub fn stable_label(&self) -> Option<&str> {
        self.emitted.as_deref()
    }

    /// 输入一次观测
    pub fn observe(&mut self, label: &str) -> Option<StabilizedDecision> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }

        if self.last_label.as_deref() == Some(label) {
            self.run_length = self.run_length.saturating_add(1);
        } else {
            self.last_label = Some(label.to_string());
            self.run_length = 1;
        }

        if self.run_length != self.threshold || self.emitted.as_deref() == Some(label) {
            return None;
        }

        self.emitted = Some(label.to_string());
        Some(StabilizedDecision {
            source: self.source,
            label: label.to_string(),
            observed_run_length: self.run_length,
        })
    }

    /// 清空全部状态（包括已发出的稳定标签）
    pub fn reset(&mut self) {
        self.last_label = None;
        self.run_length = 0;
        self.emitted = None;
    }
}
