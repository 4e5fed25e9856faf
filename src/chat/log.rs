//! 消息日志：只追加、按插入顺序
//!
//! 底层为 watch 通道，append / update 立即对所有订阅者可见（无缓冲）；没有删除操作。

use thiserror::Error;
use tokio::sync::watch;

use crate::chat::message::{Message, MessageId, MessageKind, MessagePatch, Sender, TaskPayload};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LogError {
    #[error("Message not found: {0}")]
    NotFound(MessageId),
}

/// 会话消息日志（由会话控制器独占写入）
#[derive(Debug)]
pub struct MessageLog {
    tx: watch::Sender<Vec<Message>>,
}

impl MessageLog {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self { tx }
    }

    /// 追加一条消息，返回其 ID 供后续更新
    pub fn append(
        &mut self,
        sender: Sender,
        kind: MessageKind,
        content: impl Into<String>,
        payload: Option<TaskPayload>,
        loading: Option<bool>,
    ) -> MessageId {
        let msg = Message::new(sender, kind, content, payload, loading);
        let id = msg.id;
        self.tx.send_modify(|messages| messages.push(msg));
        id
    }

    pub fn user_text(&mut self, content: impl Into<String>) -> MessageId {
        self.append(Sender::User, MessageKind::Text, content, None, None)
    }

    pub fn agent_text(&mut self, content: impl Into<String>) -> MessageId {
        self.append(Sender::Agent, MessageKind::Text, content, None, None)
    }

    /// 系统状态消息；loading=true 时渲染为加载中
    pub fn system(&mut self, content: impl Into<String>, loading: bool) -> MessageId {
        self.append(
            Sender::Agent,
            MessageKind::System,
            content,
            None,
            loading.then_some(true),
        )
    }

    /// 按 ID 合并局部字段；ID 不存在返回 NotFound
    pub fn update(&mut self, id: MessageId, patch: MessagePatch) -> Result<(), LogError> {
        let mut found = false;
        self.tx.send_if_modified(|messages| {
            match messages.iter_mut().find(|m| m.id == id) {
                Some(msg) => {
                    found = true;
                    if let Some(loading) = patch.loading {
                        msg.loading = Some(loading);
                    }
                    true
                }
                None => false,
            }
        });
        if found {
            Ok(())
        } else {
            Err(LogError::NotFound(id))
        }
    }

    /// 有序只读副本
    pub fn snapshot(&self) -> Vec<Message> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}
