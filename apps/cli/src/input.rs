//! 标准输入（专用输入线程）
//!
//! `run` 模式下控制循环必须持续 tick，不能阻塞在 readline 上，
//! 因此在专用线程内创建 Editor，把解析后的事件推入各适配器的通道。
//!
//! 输入格式：
//!
//! ```text
//! ocr <TEXT>        注入一次 OCR 识别结果
//! person yes|no     注入一次人员检测结果
//! range <cm>        注入一次测距结果
//! q                 退出
//! ```

use crossbeam_channel::Sender;
use rover_driver::{PERSON_ABSENT, PERSON_PRESENT};
use rustyline::Editor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// 一行输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    Quit,
    Help,
    Ocr(String),
    Person(bool),
    Range(u32),
    Invalid(String),
}

impl InputLine {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        let parsed = match head.to_ascii_lowercase().as_str() {
            "q" | "quit" | "exit" => InputLine::Quit,
            "help" | "?" => InputLine::Help,
            "ocr" if !rest.is_empty() => InputLine::Ocr(rest.to_string()),
            "person" => match rest.to_ascii_lowercase().as_str() {
                "yes" | "y" | "1" | "true" => InputLine::Person(true),
                "no" | "n" | "0" | "false" => InputLine::Person(false),
                _ => InputLine::Invalid(format!("person 需要 yes 或 no: {:?}", rest)),
            },
            "range" => match rest.parse::<u32>() {
                Ok(cm) => InputLine::Range(cm),
                Err(_) => InputLine::Invalid(format!("无效的距离: {:?}", rest)),
            },
            _ => InputLine::Invalid(format!("未知输入: {:?}", line)),
        };
        Some(parsed)
    }
}

/// 输入线程把事件发往的通道
pub struct EventSenders {
    pub ocr: Sender<String>,
    pub person: Sender<String>,
    pub range: Sender<u32>,
}

impl EventSenders {
    /// 投递一条事件；通道满时丢弃
    fn dispatch(&self, line: InputLine) {
        let delivered = match line {
            InputLine::Ocr(text) => self.ocr.try_send(text).is_ok(),
            InputLine::Person(present) => {
                let label = if present { PERSON_PRESENT } else { PERSON_ABSENT };
                self.person.try_send(label.to_string()).is_ok()
            },
            InputLine::Range(cm) => self.range.try_send(cm).is_ok(),
            _ => true,
        };
        if !delivered {
            eprintln!("⚠️  事件未送达（队列已满或该数据源未启用）");
        }
    }
}

/// 启动专用输入线程
///
/// 输入 `q`、Ctrl+C 或输入结束时设置 `shutdown`。
pub fn spawn_event_input(
    senders: EventSenders,
    shutdown: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        use rustyline::history::DefaultHistory;

        let mut rl = match Editor::<(), DefaultHistory>::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("❌ 无法初始化输入: {}", e);
                shutdown.store(true, Ordering::Release);
                return;
            },
        };

        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            match rl.readline("rover> ") {
                Ok(line) => {
                    let Some(parsed) = InputLine::parse(&line) else {
                        continue;
                    };
                    let _ = rl.add_history_entry(line.trim());

                    match parsed {
                        InputLine::Quit => break,
                        InputLine::Help => print_help(),
                        InputLine::Invalid(reason) => eprintln!("❌ {}", reason),
                        event => senders.dispatch(event),
                    }
                },
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    break;
                },
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                },
            }
        }

        shutdown.store(true, Ordering::Release);
    })
}

fn print_help() {
    println!("可用输入:");
    println!("  ocr <TEXT>      注入 OCR 识别结果（如 ocr FORWARD）");
    println!("  person yes|no   注入人员检测结果");
    println!("  range <cm>      注入测距结果");
    println!("  q               退出");
}
