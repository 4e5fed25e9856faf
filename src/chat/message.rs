//! 单条聊天消息与任务载荷
//!
//! 载荷按消息用途分为带标签的变体（快判题、采集请求、用户图片、报告），渲染层穷尽匹配。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::report::Report;
use crate::oracle::ImageRef;

/// 消息 ID：UUIDv7（时间有序 + 随机位）
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    /// 快判题（图片 + 选项）
    ImageChoice,
    /// 采集请求（拍摄 / 上传包含目标的照片）
    ImageRequest,
    /// 结构化报告（content 为 JSON）
    Report,
    /// 系统状态（可带加载标记）
    System,
}

/// 任务载荷
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskPayload {
    ImageChoice {
        image_url: String,
        options: Vec<String>,
        correct_option: String,
    },
    ImageRequest {
        target_label: String,
    },
    /// 用户上传的图片引用
    UserImage {
        image: ImageRef,
    },
    Report {
        report: Report,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<TaskPayload>,
}

impl Message {
    pub fn new(
        sender: Sender,
        kind: MessageKind,
        content: impl Into<String>,
        payload: Option<TaskPayload>,
        loading: Option<bool>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            kind,
            content: content.into(),
            timestamp: Utc::now(),
            loading,
            payload,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.unwrap_or(false)
    }
}

/// 局部更新：目前只允许翻转加载标记
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessagePatch {
    pub loading: Option<bool>,
}

impl MessagePatch {
    pub fn loading(loading: bool) -> Self {
        Self {
            loading: Some(loading),
        }
    }
}
