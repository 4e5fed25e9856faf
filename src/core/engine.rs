//! 任务会话引擎：回合推进、计分、结束判定
//!
//! 状态机：Idle → RoundActive(1) → (Resolving) → RoundActive(r+1) … → Completed → Idle；
//! 任意进行中状态可 abandon → Idle。同一时间至多一个任务。
//!
//! 引擎本身是同步的，不直接调用检测能力：采集回合通过 begin_submission 进入 Resolving 并发放票据，
//! 检测结果带票据回到 resolve_submission；票据过期（已放弃 / 已重开）的结果被拒绝，不改变任何状态。

use std::sync::Arc;

use crate::catalog::{QuickQuestion, TaskCatalog};
use crate::core::picker::{RandomPicker, TargetPicker};
use crate::core::stats::StatsAggregator;
use crate::core::{RoundOutcome, SessionPhase, TaskError, TaskState, TaskType};
use crate::oracle::{Label, LabelSet};

pub const DEFAULT_TOTAL_ROUNDS: u32 = 10;
pub const DEFAULT_POINTS_PER_CORRECT: u32 = 10;
/// 配置允许的上限，超出部分在组装会话时截断
pub const MAX_TOTAL_ROUNDS: u32 = 1_000;
pub const MAX_POINTS_PER_CORRECT: u32 = 1_000;

/// 单回合的题目内容
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundChallenge {
    QuickJudgment(QuickQuestion),
    Collection { target: Label },
}

/// 发给用户的回合提示
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundPrompt {
    pub round: u32,
    pub total_rounds: u32,
    pub challenge: RoundChallenge,
}

/// 采集提交票据：标识发起检测时所在的任务与回合
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmissionTicket {
    epoch: u64,
    round: u32,
}

impl SubmissionTicket {
    pub fn round(&self) -> u32 {
        self.round
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NextStep {
    Round(RoundPrompt),
    Completed(TaskSummary),
}

/// 一个回合的结算结果
#[derive(Clone, Debug, PartialEq)]
pub struct RoundResolution {
    pub task_type: TaskType,
    pub round: u32,
    pub correct: bool,
    /// 结算后的累计得分
    pub score: u32,
    pub challenge: RoundChallenge,
    pub next: NextStep,
}

/// 完成任务的汇总（已计入统计）
#[derive(Clone, Debug, PartialEq)]
pub struct TaskSummary {
    pub task_type: TaskType,
    pub score: u32,
    pub total_rounds: u32,
    pub correct_rounds: u32,
    pub history: Vec<RoundOutcome>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbandonedTask {
    pub task_type: TaskType,
    pub round: u32,
    pub score: u32,
    /// 放弃时本回合是否正在等待检测结果
    pub was_resolving: bool,
}

enum Phase {
    Idle,
    RoundActive(RoundPrompt),
    Resolving {
        prompt: RoundPrompt,
        ticket: SubmissionTicket,
    },
}

pub struct TaskEngine {
    catalog: Arc<TaskCatalog>,
    state: TaskState,
    phase: Phase,
    /// 每次开始任务递增，用于识别过期票据
    epoch: u64,
    total_rounds: u32,
    points_per_correct: u32,
    picker: Box<dyn TargetPicker>,
    stats: StatsAggregator,
}

impl TaskEngine {
    pub fn new(catalog: Arc<TaskCatalog>, stats: StatsAggregator) -> Self {
        Self {
            catalog,
            state: TaskState::idle(DEFAULT_TOTAL_ROUNDS),
            phase: Phase::Idle,
            epoch: 0,
            total_rounds: DEFAULT_TOTAL_ROUNDS,
            points_per_correct: DEFAULT_POINTS_PER_CORRECT,
            picker: Box::new(RandomPicker::from_os_rng()),
            stats,
        }
    }

    pub fn with_total_rounds(mut self, total_rounds: u32) -> Self {
        self.total_rounds = total_rounds.max(1);
        self.state = TaskState::idle(self.total_rounds);
        self
    }

    pub fn with_points_per_correct(mut self, points: u32) -> Self {
        self.points_per_correct = points;
        self
    }

    pub fn with_picker(mut self, picker: impl TargetPicker + 'static) -> Self {
        self.picker = Box::new(picker);
        self
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        match self.phase {
            Phase::Idle => SessionPhase::Idle,
            Phase::RoundActive(_) => SessionPhase::RoundActive,
            Phase::Resolving { .. } => SessionPhase::Resolving,
        }
    }

    pub fn current_prompt(&self) -> Option<&RoundPrompt> {
        match &self.phase {
            Phase::Idle => None,
            Phase::RoundActive(prompt) | Phase::Resolving { prompt, .. } => Some(prompt),
        }
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    pub fn points_per_correct(&self) -> u32 {
        self.points_per_correct
    }

    /// 开始前的全部守卫：已有任务 / 无效类型 / 题库为空；不改变任何状态
    pub fn ensure_can_start(&self, task_type: TaskType) -> Result<(), TaskError> {
        if self.state.is_active() {
            return Err(TaskError::AlreadyActive);
        }
        let catalog_empty = match task_type {
            TaskType::None => return Err(TaskError::InvalidTaskType),
            TaskType::QuickJudgment => self.catalog.questions.is_empty(),
            TaskType::Collection => self.catalog.collection.targets.is_empty(),
        };
        if catalog_empty {
            return Err(TaskError::EmptyCatalog(task_type));
        }
        Ok(())
    }

    /// Idle → RoundActive(1)
    pub fn start(&mut self, task_type: TaskType) -> Result<RoundPrompt, TaskError> {
        self.ensure_can_start(task_type)?;

        self.epoch += 1;
        self.state = TaskState::started(task_type, self.total_rounds);
        let prompt = self.prompt_for(task_type, 1);
        self.phase = Phase::RoundActive(prompt.clone());
        tracing::info!(task_type = %task_type, epoch = self.epoch, "Task started");
        Ok(prompt)
    }

    /// 快判第 r 题取题库第 (r-1) mod N 项；采集目标由 picker 抽取
    fn prompt_for(&mut self, task_type: TaskType, round: u32) -> RoundPrompt {
        let challenge = if task_type == TaskType::Collection {
            let targets = &self.catalog.collection.targets;
            let idx = self.picker.pick(targets.len()).min(targets.len() - 1);
            RoundChallenge::Collection {
                target: targets[idx].clone(),
            }
        } else {
            let questions = &self.catalog.questions;
            let idx = (round as usize - 1) % questions.len();
            RoundChallenge::QuickJudgment(questions[idx].clone())
        };
        RoundPrompt {
            round,
            total_rounds: self.total_rounds,
            challenge,
        }
    }

    /// 当前可作答的回合：无任务 → NoActiveTask；类型不符 → WrongTaskType；等待检测 → RoundPending
    fn answerable_round(&self, expected: TaskType) -> Result<RoundPrompt, TaskError> {
        let actual = self.state.task_type();
        match &self.phase {
            Phase::Idle => Err(TaskError::NoActiveTask),
            _ if actual != expected => Err(TaskError::WrongTaskType { expected, actual }),
            Phase::Resolving { .. } => Err(TaskError::RoundPending),
            Phase::RoundActive(prompt) => Ok(prompt.clone()),
        }
    }

    /// 快判作答：同步结算
    pub fn answer(&mut self, option: &str) -> Result<RoundResolution, TaskError> {
        let prompt = self.answerable_round(TaskType::QuickJudgment)?;
        let correct = match &prompt.challenge {
            RoundChallenge::QuickJudgment(question) => {
                if !question.has_option(option) {
                    return Err(TaskError::UnknownOption(option.to_string()));
                }
                question.correct == option
            }
            RoundChallenge::Collection { .. } => {
                return Err(TaskError::WrongTaskType {
                    expected: TaskType::QuickJudgment,
                    actual: TaskType::Collection,
                })
            }
        };
        Ok(self.resolve_round(prompt, correct))
    }

    /// 采集提交：RoundActive → Resolving，返回票据；target 必须是当前回合的目标
    pub fn begin_submission(&mut self, target: &str) -> Result<SubmissionTicket, TaskError> {
        let prompt = self.answerable_round(TaskType::Collection)?;
        match &prompt.challenge {
            RoundChallenge::Collection { target: expected } if expected != target => {
                return Err(TaskError::StaleRound {
                    expected: expected.clone(),
                    got: target.to_string(),
                })
            }
            RoundChallenge::Collection { .. } => {}
            RoundChallenge::QuickJudgment(_) => {
                return Err(TaskError::WrongTaskType {
                    expected: TaskType::Collection,
                    actual: TaskType::QuickJudgment,
                })
            }
        }

        let ticket = SubmissionTicket {
            epoch: self.epoch,
            round: prompt.round,
        };
        self.phase = Phase::Resolving { prompt, ticket };
        Ok(ticket)
    }

    /// 检测结果回填：标签集合包含目标即判对；票据不匹配时拒绝且不改变状态
    pub fn resolve_submission(
        &mut self,
        ticket: SubmissionTicket,
        labels: &LabelSet,
    ) -> Result<RoundResolution, TaskError> {
        let (prompt, target) = match &self.phase {
            Phase::Resolving {
                prompt,
                ticket: pending,
            } if *pending == ticket => match &prompt.challenge {
                RoundChallenge::Collection { target } => (prompt.clone(), target.clone()),
                RoundChallenge::QuickJudgment(_) => return Err(TaskError::StaleSubmission),
            },
            _ => return Err(TaskError::StaleSubmission),
        };
        let correct = labels.contains(&target);
        Ok(self.resolve_round(prompt, correct))
    }

    fn resolve_round(&mut self, prompt: RoundPrompt, correct: bool) -> RoundResolution {
        let task_type = self.state.task_type();
        self.state.record_round(correct, self.points_per_correct);
        let score = self.state.score();

        let next = if self.state.is_finished() {
            NextStep::Completed(self.complete())
        } else {
            let next_prompt = self.prompt_for(task_type, self.state.current_round());
            self.phase = Phase::RoundActive(next_prompt.clone());
            NextStep::Round(next_prompt)
        };

        RoundResolution {
            task_type,
            round: prompt.round,
            correct,
            score,
            challenge: prompt.challenge,
            next,
        }
    }

    /// Completed：先记入统计，再回到 Idle
    fn complete(&mut self) -> TaskSummary {
        self.stats.record(self.state.task_type(), self.state.score());
        let finished = std::mem::replace(&mut self.state, TaskState::idle(self.total_rounds));
        self.phase = Phase::Idle;

        let summary = TaskSummary {
            task_type: finished.task_type(),
            score: finished.score(),
            total_rounds: finished.total_rounds(),
            correct_rounds: finished.history().iter().filter(|h| h.correct).count() as u32,
            history: finished.history().to_vec(),
        };
        tracing::info!(
            task_type = %summary.task_type,
            score = summary.score,
            correct_rounds = summary.correct_rounds,
            "Task completed"
        );
        summary
    }

    /// Abandoned：不计入统计，直接回到 Idle；等待中的检测结果随之过期
    pub fn abandon(&mut self) -> Result<AbandonedTask, TaskError> {
        if !self.state.is_active() {
            return Err(TaskError::NoActiveTask);
        }
        let abandoned = AbandonedTask {
            task_type: self.state.task_type(),
            round: self.state.current_round(),
            score: self.state.score(),
            was_resolving: matches!(self.phase, Phase::Resolving { .. }),
        };
        self.state = TaskState::idle(self.total_rounds);
        self.phase = Phase::Idle;
        tracing::info!(
            task_type = %abandoned.task_type,
            round = abandoned.round,
            score = abandoned.score,
            "Task abandoned"
        );
        Ok(abandoned)
    }
}
