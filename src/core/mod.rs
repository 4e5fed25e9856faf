//! 核心层：错误与恢复、任务状态、目标抽取、统计聚合、任务引擎、会话控制器、运行时

pub mod controller;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod picker;
pub mod recovery;
pub mod state;
pub mod stats;

pub use controller::{PendingDetection, SessionController};
pub use engine::{
    AbandonedTask, NextStep, RoundChallenge, RoundPrompt, RoundResolution, SubmissionTicket,
    TaskEngine, TaskSummary,
};
pub use error::{RecoveryAction, TaskError};
pub use orchestrator::{build_controller, spawn_session, Command, SessionHandle};
pub use picker::{RandomPicker, SequencePicker, TargetPicker};
pub use recovery::RecoveryEngine;
pub use state::{RoundOutcome, SessionPhase, SessionView, TaskState, TaskType};
pub use stats::{StatsAggregator, StatsSnapshot, UserStats};
