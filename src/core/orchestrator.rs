//! 会话运行时：主控循环
//!
//! 负责：按配置组装控制器（目录、检测适配器、采集目标抽取器、用户统计），
//! 在后台任务中消费 UI 命令（StartTask/Answer/Upload/Abandon/ViewStats/Quit）。
//! 采集检测在独立任务中运行，结果带票据回到主循环，因此审核期间仍可放弃任务。

use std::sync::Arc;

use anyhow::Context;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::catalog::{find_agent, TaskCatalog};
use crate::chat::Message;
use crate::config::AppConfig;
use crate::core::controller::PendingDetection;
use crate::core::engine::{MAX_POINTS_PER_CORRECT, MAX_TOTAL_ROUNDS};
use crate::core::picker::RandomPicker;
use crate::core::stats::{StatsAggregator, UserStats};
use crate::core::{SessionController, SessionView, TaskEngine, TaskType};
use crate::oracle::{coco_vocabulary, create_oracle_from_config, ImageRef, Label, LabelSet};

/// 从 UI 发往会话运行时的用户命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartTask(TaskType),
    /// 快判作答（选项原文）
    Answer(String),
    /// 采集提交：图片 + 用户看到的目标标签
    Upload { image: ImageRef, target: Label },
    Abandon,
    ViewStats,
    Quit,
}

/// 按配置组装会话控制器
pub fn build_controller(cfg: &AppConfig) -> anyhow::Result<SessionController> {
    let agent = find_agent(&cfg.app.agent)
        .with_context(|| format!("Unknown agent '{}'", cfg.app.agent))?;

    let catalog = match &cfg.catalog.path {
        Some(path) => TaskCatalog::load(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => TaskCatalog::builtin(),
    };
    let catalog = Arc::new(catalog);

    let user_id = cfg
        .app
        .user_id
        .clone()
        .unwrap_or_else(|| format!("user_{}", rand::rng().random_range(0..10000)));
    let stats = StatsAggregator::new(UserStats::new(user_id, cfg.app.username.clone()));

    let picker = match cfg.task.seed {
        Some(seed) => RandomPicker::seeded(seed),
        None => RandomPicker::from_os_rng(),
    };
    let total_rounds =
        clamp_setting("task.total_rounds", cfg.task.total_rounds, 1, MAX_TOTAL_ROUNDS);
    let points = clamp_setting(
        "task.points_per_correct",
        cfg.task.points_per_correct,
        0,
        MAX_POINTS_PER_CORRECT,
    );
    let engine = TaskEngine::new(catalog.clone(), stats)
        .with_total_rounds(total_rounds)
        .with_points_per_correct(points)
        .with_picker(picker);

    let oracle = create_oracle_from_config(
        &cfg.oracle,
        coco_vocabulary(&catalog.collection.targets),
    );
    tracing::info!(
        agent = agent.id,
        backend = oracle.backend_name(),
        "Session created"
    );
    Ok(SessionController::new(agent, engine, Arc::new(oracle)))
}

/// 超出范围的配置值截断到边界
fn clamp_setting(key: &str, value: u32, min: u32, max: u32) -> u32 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::warn!("{} = {} out of range [{}, {}], using {}", key, value, min, max, clamped);
    }
    clamped
}

/// 运行中的会话：命令发送端、消息 / 视图订阅、关闭令牌
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    messages: watch::Receiver<Vec<Message>>,
    view: watch::Receiver<SessionView>,
    shutdown: CancellationToken,
    join: JoinHandle<SessionController>,
}

impl SessionHandle {
    /// 发送命令；运行时已退出时返回 false
    pub fn send(&self, cmd: Command) -> bool {
        self.commands.send(cmd).is_ok()
    }

    pub fn commands(&self) -> mpsc::UnboundedSender<Command> {
        self.commands.clone()
    }

    pub fn messages(&self) -> watch::Receiver<Vec<Message>> {
        self.messages.clone()
    }

    pub fn view(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// 等待运行时自行退出（收到 Quit 或命令通道关闭），取回控制器
    pub async fn join(self) -> anyhow::Result<SessionController> {
        self.join.await.context("Session runtime panicked")
    }

    /// 取消运行时与所有进行中的检测，取回控制器
    pub async fn shutdown(self) -> anyhow::Result<SessionController> {
        self.shutdown.cancel();
        self.join().await
    }
}

/// 启动会话运行时
pub fn spawn_session(controller: SessionController) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
    let messages = controller.subscribe();
    let view = controller.subscribe_view();
    let shutdown = CancellationToken::new();
    let join = tokio::spawn(run_session(controller, cmd_rx, shutdown.clone()));
    SessionHandle {
        commands: cmd_tx,
        messages,
        view,
        shutdown,
        join,
    }
}

async fn run_session(
    mut controller: SessionController,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    shutdown: CancellationToken,
) -> SessionController {
    let (det_tx, mut det_rx) = mpsc::unbounded_channel::<(PendingDetection, LabelSet)>();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some((pending, labels)) = det_rx.recv() => {
                let _ = controller.finish_collection_submission(pending, labels);
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    Command::StartTask(task_type) => {
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = controller.start_task(task_type) => {}
                        }
                    }
                    Command::Answer(option) => {
                        let _ = controller.answer_quick_judgment(&option);
                    }
                    Command::Upload { image, target } => {
                        if let Ok(pending) = controller.begin_collection_submission(image, &target) {
                            spawn_detection(&controller, pending, det_tx.clone(), shutdown.child_token());
                        }
                    }
                    Command::Abandon => {
                        let _ = controller.abandon();
                    }
                    Command::ViewStats => {
                        controller.view_stats();
                    }
                    Command::Quit => break,
                }
            }
        }
    }

    tracing::info!("Session runtime stopped");
    controller
}

fn spawn_detection(
    controller: &SessionController,
    pending: PendingDetection,
    results: mpsc::UnboundedSender<(PendingDetection, LabelSet)>,
    cancel: CancellationToken,
) {
    let oracle = controller.oracle().clone();
    let image = pending.image().clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(round = pending.round(), "Detection cancelled by shutdown");
            }
            labels = oracle.detect_objects(&image) => {
                // 主循环已退出时结果无人接收
                let _ = results.send((pending, labels));
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TASK_CENTER_ID;

    #[test]
    fn test_build_controller_from_defaults() {
        let cfg = AppConfig::default();
        let ctl = build_controller(&cfg).unwrap();
        assert_eq!(ctl.agent().id, TASK_CENTER_ID);
        assert_eq!(ctl.oracle().backend_name(), "filename");
        let snapshot = ctl.engine().stats().snapshot();
        assert!(snapshot.stats.user_id.starts_with("user_"));
        assert_eq!(snapshot.stats.username, "Guest");
    }

    #[test]
    fn test_build_controller_rejects_unknown_agent() {
        let mut cfg = AppConfig::default();
        cfg.app.agent = "nobody".to_string();
        assert!(build_controller(&cfg).is_err());
    }

    #[test]
    fn test_build_controller_applies_task_section() {
        let mut cfg = AppConfig::default();
        cfg.app.user_id = Some("user_42".to_string());
        cfg.task.total_rounds = 3;
        cfg.task.seed = Some(7);
        let ctl = build_controller(&cfg).unwrap();
        assert_eq!(ctl.engine().state().total_rounds(), 3);
        assert_eq!(ctl.engine().stats().snapshot().stats.user_id, "user_42");
    }

    #[test]
    fn test_build_controller_clamps_task_section() {
        let mut cfg = AppConfig::default();
        cfg.task.points_per_correct = u32::MAX;
        cfg.task.total_rounds = u32::MAX;
        let ctl = build_controller(&cfg).unwrap();
        assert_eq!(ctl.engine().points_per_correct(), MAX_POINTS_PER_CORRECT);
        assert_eq!(ctl.engine().state().total_rounds(), MAX_TOTAL_ROUNDS);

        cfg.task.total_rounds = 0;
        let ctl = build_controller(&cfg).unwrap();
        assert_eq!(ctl.engine().state().total_rounds(), 1);
    }

    #[tokio::test]
    async fn test_filename_backend_reports_non_target_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dog_on_sofa.jpg");
        std::fs::write(&path, b"fake").unwrap();

        let mut cfg = AppConfig::default();
        cfg.task.seed = Some(7);
        let mut ctl = build_controller(&cfg).unwrap();
        ctl.start_task(TaskType::Collection).await.unwrap();
        let target = match ctl.engine().current_prompt().map(|p| p.challenge.clone()) {
            Some(crate::core::RoundChallenge::Collection { target }) => target,
            other => panic!("expected collection round, got {other:?}"),
        };
        ctl.submit_collection_image(ImageRef::new(path.to_string_lossy()), &target)
            .await
            .unwrap();

        let feedback = ctl
            .messages()
            .into_iter()
            .find(|m| m.content.starts_with("❌ 审核未通过"))
            .unwrap();
        assert!(feedback.content.contains("AI识别到了: [dog]"), "{}", feedback.content);
    }

    #[tokio::test]
    async fn test_runtime_quit_returns_controller() {
        let session = spawn_session(build_controller(&AppConfig::default()).unwrap());
        assert!(session.send(Command::ViewStats));
        assert!(session.send(Command::Quit));
        let ctl = session.join().await.unwrap();
        // 欢迎语 + 查看统计 + 统计报告
        assert_eq!(ctl.messages().len(), 3);
    }
}
