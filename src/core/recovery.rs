//! 错误恢复引擎
//!
//! 根据 TaskError 类型返回 RecoveryAction：可恢复错误一律转为一条解释性消息，不静默丢弃用户操作。

use crate::core::{RecoveryAction, TaskError};

#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &TaskError) -> RecoveryAction {
        match err {
            TaskError::AlreadyActive => {
                RecoveryAction::Notify("当前已有任务正在进行中，请先完成或放弃。".to_string())
            }
            TaskError::InvalidTaskType => {
                RecoveryAction::Notify("请选择有效的任务类型：快判任务或采集任务。".to_string())
            }
            TaskError::EmptyCatalog(task_type) => RecoveryAction::Notify(format!(
                "{}题库为空，无法开始任务。",
                task_type.display_name()
            )),
            TaskError::AgentHasNoTasks(name) => {
                RecoveryAction::Notify(format!("{name}暂不支持任务，请前往任务中心。"))
            }
            TaskError::ModelLoadTimeout(_) | TaskError::ModelLoadFailed(_) => {
                RecoveryAction::Notify("模型加载失败，请检查网络连接。".to_string())
            }
            TaskError::DetectionFailed(_) => {
                RecoveryAction::Notify("图片识别失败，请重新上传。".to_string())
            }
            TaskError::NoActiveTask => {
                RecoveryAction::Notify("当前没有进行中的任务，请先选择任务类型。".to_string())
            }
            TaskError::WrongTaskType { actual, .. } => RecoveryAction::Notify(format!(
                "当前进行的是{}，无法执行该操作。",
                actual.display_name()
            )),
            TaskError::RoundPending => {
                RecoveryAction::Notify("上一张图片仍在审核中，请稍候。".to_string())
            }
            TaskError::UnknownOption(option) => {
                RecoveryAction::Notify(format!("「{option}」不是本题的选项，请重新选择。"))
            }
            TaskError::StaleRound { .. } => {
                RecoveryAction::Notify("该题目已过期，请回答最新的题目。".to_string())
            }
            TaskError::StaleSubmission => RecoveryAction::Discard,
            TaskError::NotFound(id) => {
                RecoveryAction::Fatal(format!("log entry {id} not found"))
            }
        }
    }
}
