//! 任务会话错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 TaskError 决定 Notify（写入一条解释性消息）/ Discard / Fatal。

use std::time::Duration;

use thiserror::Error;

use crate::chat::{LogError, MessageId};
use crate::core::TaskType;
use crate::oracle::OracleError;

/// 会话控制器与任务引擎可能出现的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error("A task is already active")]
    AlreadyActive,

    #[error("Cannot start a task of type none")]
    InvalidTaskType,

    #[error("Catalog for {0} task is empty")]
    EmptyCatalog(TaskType),

    #[error("Agent '{0}' does not run tasks")]
    AgentHasNoTasks(String),

    #[error("Model load timed out after {0:?}")]
    ModelLoadTimeout(Duration),

    #[error("Model load failed: {0}")]
    ModelLoadFailed(String),

    /// 检测后端报错；适配器正常情况下已吞掉，作为空结果处理
    #[error("Object detection failed: {0}")]
    DetectionFailed(String),

    #[error("No active task")]
    NoActiveTask,

    #[error("Action needs a {expected} task but {actual} is active")]
    WrongTaskType { expected: TaskType, actual: TaskType },

    /// 本回合仍在等待检测结果（防重复提交）
    #[error("Round is still resolving")]
    RoundPending,

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    /// 用户针对过期的题目操作
    #[error("Stale round: expected target '{expected}', got '{got}'")]
    StaleRound { expected: String, got: String },

    /// 已放弃 / 已结束回合的迟到检测结果
    #[error("Stale submission")]
    StaleSubmission,

    #[error("Message not found: {0}")]
    NotFound(MessageId),
}

impl From<LogError> for TaskError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::NotFound(id) => TaskError::NotFound(id),
        }
    }
}

impl From<OracleError> for TaskError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::ModelLoadTimeout(d) => TaskError::ModelLoadTimeout(d),
            OracleError::LoadFailed(msg) => TaskError::ModelLoadFailed(msg),
            OracleError::DetectionFailure(msg) => TaskError::DetectionFailed(msg),
        }
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 写入一条用户可见的说明，状态不变
    Notify(String),
    /// 静默丢弃（迟到的检测结果）
    Discard,
    /// 契约违反：调试构建直接失败
    Fatal(String),
}
