//! 状态定义：TaskState（任务进度）与 SessionView（UI 投影）
//!
//! TaskState 字段私有，只能经引擎的状态转换修改，保证 is_active 与 task_type 始终一致。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    None,
    QuickJudgment,
    Collection,
}

impl TaskType {
    /// 中文显示名（报告与提示用）
    pub fn display_name(&self) -> &'static str {
        match self {
            TaskType::None => "无任务",
            TaskType::QuickJudgment => "快判任务",
            TaskType::Collection => "采集任务",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::None => write!(f, "none"),
            TaskType::QuickJudgment => write!(f, "quick_judgment"),
            TaskType::Collection => write!(f, "collection"),
        }
    }
}

/// 单回合结果（审计 / 分析用）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round: u32,
    pub correct: bool,
    pub timestamp: DateTime<Utc>,
}

/// 任务进度
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaskState {
    is_active: bool,
    task_type: TaskType,
    /// 从 1 开始；未激活时为 0
    current_round: u32,
    score: u32,
    total_rounds: u32,
    history: Vec<RoundOutcome>,
}

impl TaskState {
    pub fn idle(total_rounds: u32) -> Self {
        Self {
            is_active: false,
            task_type: TaskType::None,
            current_round: 0,
            score: 0,
            total_rounds,
            history: Vec::new(),
        }
    }

    pub(crate) fn started(task_type: TaskType, total_rounds: u32) -> Self {
        debug_assert!(task_type != TaskType::None);
        Self {
            is_active: true,
            task_type,
            current_round: 1,
            score: 0,
            total_rounds,
            history: Vec::new(),
        }
    }

    /// 记录当前回合结果并推进到下一回合
    pub(crate) fn record_round(&mut self, correct: bool, points: u32) -> RoundOutcome {
        let outcome = RoundOutcome {
            round: self.current_round,
            correct,
            timestamp: Utc::now(),
        };
        if correct {
            self.score = self.score.saturating_add(points);
        }
        self.history.push(outcome.clone());
        self.current_round += 1;
        outcome
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn history(&self) -> &[RoundOutcome] {
        &self.history
    }

    /// 所有回合已结算（current_round == total_rounds + 1）
    pub fn is_finished(&self) -> bool {
        self.is_active && self.current_round > self.total_rounds
    }
}

/// 引擎阶段（Completed / Abandoned 为瞬时状态，不会被观察到）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Idle,
    RoundActive,
    /// 本回合等待检测结果
    Resolving,
}

/// UI 看到的「投影」状态，轻量且易于渲染
#[derive(Clone, Debug, Serialize)]
pub struct SessionView {
    pub agent_id: String,
    pub phase: SessionPhase,
    pub task: TaskState,
    pub model_loading: bool,
}
