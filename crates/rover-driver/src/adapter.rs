//! 传感器适配器接口
//!
//! 摄像头采集、文字识别、目标检测都在核心之外，由适配器把结果交给控制循环。
//! 适配器每个 tick 被轮询一次，必须是非阻塞或有界阻塞的。
//!
//! [`ChannelAdapter`] / [`ChannelRangeAdapter`] 基于 `crossbeam-channel`，
//! 适合由其他线程（标准输入、推理线程）推送结果，控制循环在 tick 内合并。

use crate::error::AdapterError;
use crate::event::{ClassificationEvent, Source};
use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};

/// 分类适配器（OCR、人员检测）
pub trait ClassificationAdapter {
    /// 适配器产生的事件来源
    fn source(&self) -> Source;

    /// 轮询一次
    ///
    /// - `Ok(Some(event))`: 本 tick 有分类结果
    /// - `Ok(None)`: 没有可信的分类结果
    /// - `Err(_)`: 适配器不可用（本 tick 不提供输入）
    fn poll(&mut self) -> Result<Option<ClassificationEvent>, AdapterError>;
}

/// 测距适配器（厘米）
pub trait RangeAdapter {
    fn poll(&mut self) -> Result<Option<u32>, AdapterError>;
}

impl<T: ClassificationAdapter + ?Sized> ClassificationAdapter for Box<T> {
    fn source(&self) -> Source {
        (**self).source()
    }

    fn poll(&mut self) -> Result<Option<ClassificationEvent>, AdapterError> {
        (**self).poll()
    }
}

impl<T: RangeAdapter + ?Sized> RangeAdapter for Box<T> {
    fn poll(&mut self) -> Result<Option<u32>, AdapterError> {
        (**self).poll()
    }
}

/// 基于通道的分类适配器
///
/// 每次轮询最多取出一个标签；发送端全部断开后报告 `Unavailable`。
/// [`holding`](Self::holding) 模式下通道为空时重复上一次的标签，
/// 适合只在状态变化时推送的来源（如手动注入的人员检测）。
#[derive(Debug)]
pub struct ChannelAdapter {
    source: Source,
    rx: Receiver<String>,
    hold_last: bool,
    last: Option<String>,
}

impl ChannelAdapter {
    pub fn new(source: Source, rx: Receiver<String>) -> Self {
        Self {
            source,
            rx,
            hold_last: false,
            last: None,
        }
    }

    /// 通道为空时重复上一次收到的标签
    pub fn holding(mut self) -> Self {
        self.hold_last = true;
        self
    }

    /// 创建有界通道及对应的适配器
    pub fn bounded(source: Source, capacity: usize) -> (Sender<String>, Self) {
        let (tx, rx) = bounded(capacity);
        (tx, Self::new(source, rx))
    }
}

impl ClassificationAdapter for ChannelAdapter {
    fn source(&self) -> Source {
        self.source
    }

    fn poll(&mut self) -> Result<Option<ClassificationEvent>, AdapterError> {
        match self.rx.try_recv() {
            Ok(label) => {
                if self.hold_last {
                    self.last = Some(label.clone());
                }
                Ok(Some(ClassificationEvent::new(self.source, label)))
            },
            Err(TryRecvError::Empty) => Ok(self
                .last
                .as_ref()
                .map(|label| ClassificationEvent::new(self.source, label.clone()))),
            Err(TryRecvError::Disconnected) => Err(AdapterError::Unavailable(format!(
                "{} channel disconnected",
                self.source
            ))),
        }
    }
}

/// 基于通道的测距适配器
///
/// 每次轮询取出通道中全部读数，只保留最新一次。
#[derive(Debug)]
pub struct ChannelRangeAdapter {
    rx: Receiver<u32>,
}

impl ChannelRangeAdapter {
    pub fn new(rx: Receiver<u32>) -> Self {
        Self { rx }
    }

    pub fn bounded(capacity: usize) -> (Sender<u32>, Self) {
        let (tx, rx) = bounded(capacity);
        (tx, Self::new(rx))
    }
}

impl RangeAdapter for ChannelRangeAdapter {
    fn poll(&mut self) -> Result<Option<u32>, AdapterError> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(cm) => latest = Some(cm),
                Err(TryRecvError::Empty) => return Ok(latest),
                Err(TryRecvError::Disconnected) => {
                    return match latest {
                        Some(cm) => Ok(Some(cm)),
                        None => Err(AdapterError::Unavailable(
                            "ultrasonic channel disconnected".to_string(),
                        )),
                    };
                },
            }
        }
    }
}
