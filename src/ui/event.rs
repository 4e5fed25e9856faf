//! 事件处理
//!
//! 轮询 crossterm 键盘事件：Ctrl+Q / Ctrl+C 退出，Ctrl+S 查看统计，Ctrl+A 放弃任务；
//! 其余按键交给 run_app 拼 input_buffer，Enter 时经 parse_input 转为 Command。

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

use crate::chat::{Message, TaskPayload};
use crate::core::{Command, TaskType};
use crate::oracle::ImageRef;

/// 应用事件：来自快捷键的 Command 或原始 KeyEvent
#[derive(Debug, Clone)]
pub enum AppEvent {
    Command(Command),
    Key(KeyEvent),
}

/// 输入行解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Command(Command),
    Help,
    Exit,
    /// 无法解析，附带提示
    Invalid(String),
}

pub const HELP_TEXT: &str =
    "/quick 快判任务 │ /collect 采集任务 │ 数字或选项作答 │ /upload <图片路径> │ /abandon 放弃 │ /stats 统计 │ /exit 退出";

/// 最近一条题目的载荷（快判选项或采集目标）
fn latest_prompt(messages: &[Message]) -> Option<&TaskPayload> {
    messages.iter().rev().find_map(|m| match &m.payload {
        Some(p @ TaskPayload::ImageChoice { .. }) | Some(p @ TaskPayload::ImageRequest { .. }) => {
            Some(p)
        }
        _ => None,
    })
}

/// 作答：1 起始的序号映射为最近快判题的选项，其余原样作为选项文本
fn answer_for(raw: &str, messages: &[Message]) -> UserInput {
    let raw = raw.trim();
    if raw.is_empty() {
        return UserInput::Invalid("请在 /answer 后填写选项".to_string());
    }
    if let Ok(n) = raw.parse::<usize>() {
        return match latest_prompt(messages) {
            Some(TaskPayload::ImageChoice { options, .. }) => match options.get(n.wrapping_sub(1)) {
                Some(option) => UserInput::Command(Command::Answer(option.clone())),
                None => UserInput::Invalid(format!("选项序号应在 1-{} 之间", options.len())),
            },
            _ => UserInput::Invalid("当前没有快判题目".to_string()),
        };
    }
    UserInput::Command(Command::Answer(raw.to_string()))
}

/// 将一行输入解析为命令；上传与序号作答依据日志中最近的题目
pub fn parse_input(input: &str, messages: &[Message]) -> UserInput {
    let input = input.trim();
    let (head, rest) = match input.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (input, ""),
    };

    match head.to_lowercase().as_str() {
        "" => UserInput::Invalid(String::new()),
        "/exit" | "/quit" | "exit" | "quit" => UserInput::Exit,
        "/help" | "?" => UserInput::Help,
        "/quick" => UserInput::Command(Command::StartTask(TaskType::QuickJudgment)),
        "/collect" => UserInput::Command(Command::StartTask(TaskType::Collection)),
        "/abandon" => UserInput::Command(Command::Abandon),
        "/stats" => UserInput::Command(Command::ViewStats),
        "/answer" => answer_for(rest, messages),
        "/upload" => {
            if rest.is_empty() {
                return UserInput::Invalid("用法：/upload <图片路径>".to_string());
            }
            match latest_prompt(messages) {
                Some(TaskPayload::ImageRequest { target_label }) => {
                    UserInput::Command(Command::Upload {
                        image: ImageRef::new(rest),
                        target: target_label.clone(),
                    })
                }
                _ => UserInput::Invalid("当前没有采集题目".to_string()),
            }
        }
        cmd if cmd.starts_with('/') => UserInput::Invalid(format!("未知命令 {cmd}，输入 /help 查看帮助")),
        _ => match latest_prompt(messages) {
            Some(TaskPayload::ImageChoice { .. }) => answer_for(input, messages),
            _ => UserInput::Invalid("输入 /help 查看可用命令".to_string()),
        },
    }
}

/// 事件处理器：持有 cmd_tx，poll 时读键盘并返回 AppEvent，send 发送解析后的命令
pub struct EventHandler {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl EventHandler {
    pub fn new(cmd_tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { cmd_tx }
    }

    pub fn poll(&self) -> anyhow::Result<Option<AppEvent>> {
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(Some(self.handle_key(key)));
                }
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: KeyEvent) -> AppEvent {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('c') if ctrl => AppEvent::Command(Command::Quit),
            KeyCode::Char('s') if ctrl => {
                self.send(Command::ViewStats);
                AppEvent::Command(Command::ViewStats)
            }
            KeyCode::Char('a') if ctrl => {
                self.send(Command::Abandon);
                AppEvent::Command(Command::Abandon)
            }
            _ => AppEvent::Key(key),
        }
    }

    pub fn send(&self, cmd: Command) {
        let _ = self.cmd_tx.send(cmd);
    }
}
