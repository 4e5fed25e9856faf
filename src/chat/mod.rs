//! 聊天层：消息、消息日志、报告载荷

pub mod log;
pub mod message;
pub mod report;

pub use log::{LogError, MessageLog};
pub use message::{Message, MessageId, MessageKind, MessagePatch, Sender, TaskPayload};
pub use report::{report_entries, Report, TaskReport};
