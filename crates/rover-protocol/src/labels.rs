//! 识别文本到运动指令的映射表
//!
//! OCR 识别出的文本通过有序规则表映射为指令：逐条规则检查，
//! 只要文本（不区分大小写）包含规则中的任一模式即命中，第一条命中的规则生效。
//!
//! 默认规则表：
//!
//! | 顺序 | 模式 | 指令 |
//! |------|------|------|
//! | 1 | `STOP` | `x` |
//! | 2 | `FORWARD` / `F` / `W` | `w` |
//! | 3 | `BACK` / `B` / `S` | `s` |
//! | 4 | `LEFT` / `L` / `A` | `a` |
//! | 5 | `RIGHT` / `R` / `D` | `d` |

use crate::ProtocolError;
use crate::command::{Command, CommandKind};

/// 单条映射规则
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabelRule {
    /// 模式（已转换为大写）
    patterns: Vec<String>,
    /// 命中后发送的指令
    command: Command,
}

impl LabelRule {
    /// 创建规则
    ///
    /// 空模式会被忽略；如果没有任何有效模式则返回 `ProtocolError::EmptyPatterns`。
    pub fn new<I, S>(patterns: I, command: Command) -> Result<Self, ProtocolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_ascii_uppercase())
            .filter(|p| !p.is_empty())
            .collect();

        if patterns.is_empty() {
            return Err(ProtocolError::EmptyPatterns);
        }

        Ok(Self { patterns, command })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn command(&self) -> Command {
        self.command
    }

    /// 文本（已大写）是否包含任一模式
    fn matches_upper(&self, upper: &str) -> bool {
        self.patterns.iter().any(|p| upper.contains(p.as_str()))
    }
}

/// 有序映射表
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabelMap {
    rules: Vec<LabelRule>,
}

impl LabelMap {
    /// 由规则列表创建
    pub fn new(rules: Vec<LabelRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[LabelRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 查找文本对应的指令
    ///
    /// 空文本永远不命中。
    pub fn lookup(&self, text: &str) -> Option<Command> {
        let upper = text.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| rule.matches_upper(&upper))
            .map(|rule| rule.command)
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        let table: [(&[&str], CommandKind); 5] = [
            (&["STOP"], CommandKind::Stop),
            (&["FORWARD", "F", "W"], CommandKind::Forward),
            (&["BACK", "B", "S"], CommandKind::Backward),
            (&["LEFT", "L", "A"], CommandKind::Left),
            (&["RIGHT", "R", "D"], CommandKind::Right),
        ];

        let rules = table
            .iter()
            .map(|(patterns, kind)| LabelRule {
                patterns: patterns.iter().map(|p| p.to_string()).collect(),
                command: Command::new(*kind),
            })
            .collect();

        Self { rules }
    }
}
