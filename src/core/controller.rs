//! 会话控制器：UI 唯一调用的组件
//!
//! 把用户动作翻译为引擎状态转换，并按固定顺序写入消息日志：
//! 用户动作条目 → （检测 / 加载）系统条目 → 反馈 → 下一题提示或结算报告。
//! 可恢复错误经 RecoveryEngine 转为一条说明消息，不会静默丢弃用户动作。

use std::sync::Arc;

use chrono::Local;
use tokio::sync::watch;

use crate::catalog::Agent;
use crate::chat::{
    Message, MessageId, MessageKind, MessageLog, MessagePatch, Report, Sender, TaskPayload,
    TaskReport,
};
use crate::core::engine::{NextStep, RoundChallenge, RoundPrompt, SubmissionTicket, TaskSummary};
use crate::core::stats::StatsSnapshot;
use crate::core::{RecoveryAction, RecoveryEngine, SessionView, TaskEngine, TaskError, TaskType};
use crate::oracle::{ImageRef, Label, LabelSet, OracleAdapter};

/// 已提交、等待检测结果的采集图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDetection {
    ticket: SubmissionTicket,
    image: ImageRef,
    target: Label,
    loading_id: MessageId,
}

impl PendingDetection {
    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn round(&self) -> u32 {
        self.ticket.round()
    }
}

pub struct SessionController {
    agent: &'static Agent,
    engine: TaskEngine,
    log: MessageLog,
    oracle: Arc<OracleAdapter>,
    recovery: RecoveryEngine,
    model_loading: bool,
    /// 当前回合「AI正在审核图片...」条目，放弃时需要翻转
    pending_loading: Option<MessageId>,
    view_tx: watch::Sender<SessionView>,
}

impl SessionController {
    /// 创建控制器并写入智能体欢迎语
    pub fn new(agent: &'static Agent, engine: TaskEngine, oracle: Arc<OracleAdapter>) -> Self {
        let mut log = MessageLog::new();
        log.agent_text(agent.welcome());
        let view = SessionView {
            agent_id: agent.id.to_string(),
            phase: engine.phase(),
            task: engine.state().clone(),
            model_loading: false,
        };
        let (view_tx, _) = watch::channel(view);
        Self {
            agent,
            engine,
            log,
            oracle,
            recovery: RecoveryEngine::new(),
            model_loading: false,
            pending_loading: None,
            view_tx,
        }
    }

    pub fn agent(&self) -> &'static Agent {
        self.agent
    }

    pub fn engine(&self) -> &TaskEngine {
        &self.engine
    }

    pub fn oracle(&self) -> &Arc<OracleAdapter> {
        &self.oracle
    }

    pub fn messages(&self) -> Vec<Message> {
        self.log.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.log.subscribe()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            agent_id: self.agent.id.to_string(),
            phase: self.engine.phase(),
            task: self.engine.state().clone(),
            model_loading: self.model_loading,
        }
    }

    pub fn subscribe_view(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    fn publish_view(&self) {
        self.view_tx.send_replace(self.view());
    }

    /// 按恢复动作处理错误，再原样返回给调用方
    fn fail<T>(&mut self, err: TaskError) -> Result<T, TaskError> {
        match self.recovery.handle(&err) {
            RecoveryAction::Notify(text) => {
                tracing::debug!(error = %err, "Recoverable session error");
                self.log.agent_text(text);
            }
            RecoveryAction::Discard => {
                tracing::debug!(error = %err, "Discarding stale detection result");
            }
            RecoveryAction::Fatal(reason) => {
                tracing::error!(error = %err, "Session contract violated: {}", reason);
                debug_assert!(false, "session contract violated: {reason}");
            }
        }
        self.publish_view();
        Err(err)
    }

    fn ensure_task_agent(&mut self) -> Result<(), TaskError> {
        if self.agent.runs_tasks() {
            Ok(())
        } else {
            self.fail(TaskError::AgentHasNoTasks(self.agent.name.to_string()))
        }
    }

    fn finish_loading(&mut self, id: MessageId) -> Result<(), TaskError> {
        match self.log.update(id, MessagePatch::loading(false)) {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e.into()),
        }
    }

    fn set_model_loading(&mut self, loading: bool) {
        self.model_loading = loading;
        self.publish_view();
    }

    /// 开始任务：守卫 → 用户条目 →（采集）加载模型 → 第 1 题
    pub async fn start_task(&mut self, task_type: TaskType) -> Result<(), TaskError> {
        self.ensure_task_agent()?;
        if let Err(e) = self.engine.ensure_can_start(task_type) {
            return self.fail(e);
        }

        self.log.user_text(match task_type {
            TaskType::Collection => "开始采集任务",
            _ => "开始快判任务",
        });

        if task_type == TaskType::Collection {
            self.load_model().await?;
        }

        match self.engine.start(task_type) {
            Ok(prompt) => {
                self.post_prompt(&prompt);
                self.publish_view();
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    async fn load_model(&mut self) -> Result<(), TaskError> {
        self.set_model_loading(true);
        let loading_id = self.log.system("正在加载AI视觉模型，请稍候...", true);
        let result = self.oracle.load_model().await;
        self.set_model_loading(false);
        self.finish_loading(loading_id)?;

        match result {
            Ok(()) => {
                self.log.system("模型加载完成！", false);
                Ok(())
            }
            Err(e) => self.fail(e.into()),
        }
    }

    fn post_prompt(&mut self, prompt: &RoundPrompt) {
        match &prompt.challenge {
            RoundChallenge::QuickJudgment(question) => {
                self.log.append(
                    Sender::Agent,
                    MessageKind::ImageChoice,
                    format!("第 {}/{} 题：请判断图中的内容", prompt.round, prompt.total_rounds),
                    Some(TaskPayload::ImageChoice {
                        image_url: question.image_url.clone(),
                        options: question.options.clone(),
                        correct_option: question.correct.clone(),
                    }),
                    None,
                );
            }
            RoundChallenge::Collection { target } => {
                let name = self.engine.catalog().collection.display(target).to_string();
                self.log.append(
                    Sender::Agent,
                    MessageKind::ImageRequest,
                    format!(
                        "第 {}/{} 题：请拍摄或上传一张包含【{}】的照片",
                        prompt.round, prompt.total_rounds, name
                    ),
                    Some(TaskPayload::ImageRequest {
                        target_label: target.clone(),
                    }),
                    None,
                );
            }
        }
    }

    fn post_report(&mut self, summary: &TaskSummary) {
        let report = Report::Task(TaskReport {
            username: self.engine.stats().username().to_string(),
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            task_type: summary.task_type.display_name().to_string(),
            score: summary.score,
            total_rounds: summary.total_rounds,
        });
        self.log.append(
            Sender::Agent,
            MessageKind::Report,
            report.to_content(),
            Some(TaskPayload::Report { report }),
            None,
        );
    }

    fn advance(&mut self, next: NextStep) {
        match next {
            NextStep::Round(prompt) => self.post_prompt(&prompt),
            NextStep::Completed(summary) => self.post_report(&summary),
        }
        self.publish_view();
    }

    /// 快判作答：用户条目 → 判定 → 反馈 → 下一题或报告
    pub fn answer_quick_judgment(&mut self, option: &str) -> Result<(), TaskError> {
        self.ensure_task_agent()?;
        self.log.user_text(format!("我选择：{option}"));

        let resolution = match self.engine.answer(option) {
            Ok(r) => r,
            Err(e) => return self.fail(e),
        };
        self.log.agent_text(if resolution.correct {
            format!("✅ 回答正确！贡献度 +{}", self.engine.points_per_correct())
        } else {
            "❌ 回答错误。".to_string()
        });
        self.advance(resolution.next);
        Ok(())
    }

    /// 采集提交前半段：上传条目 + 审核中条目，回合进入 Resolving
    pub fn begin_collection_submission(
        &mut self,
        image: ImageRef,
        target: &str,
    ) -> Result<PendingDetection, TaskError> {
        self.ensure_task_agent()?;
        let ticket = match self.engine.begin_submission(target) {
            Ok(t) => t,
            Err(e) => return self.fail(e),
        };

        self.log.append(
            Sender::User,
            MessageKind::Text,
            "已上传图片",
            Some(TaskPayload::UserImage {
                image: image.clone(),
            }),
            None,
        );
        let loading_id = self.log.system("AI正在审核图片...", true);
        self.pending_loading = Some(loading_id);
        self.publish_view();

        Ok(PendingDetection {
            ticket,
            image,
            target: target.to_string(),
            loading_id,
        })
    }

    /// 采集提交后半段：回填检测结果；过期结果直接丢弃
    pub fn finish_collection_submission(
        &mut self,
        pending: PendingDetection,
        labels: LabelSet,
    ) -> Result<(), TaskError> {
        let resolution = match self.engine.resolve_submission(pending.ticket, &labels) {
            Ok(r) => r,
            Err(e) => return self.fail(e),
        };
        self.pending_loading = None;
        self.finish_loading(pending.loading_id)?;

        let points = self.engine.points_per_correct();
        let collection = &self.engine.catalog().collection;
        let target_name = collection.display(&pending.target);
        let feedback = if resolution.correct {
            format!("✅ 审核通过！识别到了 {target_name}。贡献度 +{points}")
        } else {
            let seen: Vec<&str> = labels.iter().map(|l| collection.display(l)).collect();
            format!(
                "❌ 审核未通过。AI识别到了: [{}]，未发现 {}。",
                seen.join(", "),
                target_name
            )
        };
        self.log.agent_text(feedback);
        self.advance(resolution.next);
        Ok(())
    }

    /// 采集提交（同步等待检测）
    pub async fn submit_collection_image(
        &mut self,
        image: ImageRef,
        target: &str,
    ) -> Result<(), TaskError> {
        let pending = self.begin_collection_submission(image, target)?;
        let labels = self.oracle.detect_objects(pending.image()).await;
        self.finish_collection_submission(pending, labels)
    }

    /// 放弃任务：用户条目 → 引擎回到 Idle；不生成报告、不计入统计
    pub fn abandon(&mut self) -> Result<(), TaskError> {
        self.ensure_task_agent()?;
        self.log.user_text("放弃任务");
        if let Err(e) = self.engine.abandon() {
            return self.fail(e);
        }
        if let Some(id) = self.pending_loading.take() {
            self.finish_loading(id)?;
        }
        self.publish_view();
        Ok(())
    }

    /// 查看统计：用户条目 + 统计报告
    pub fn view_stats(&mut self) -> StatsSnapshot {
        self.log.user_text("查看我的统计");
        let snapshot = self.engine.stats().snapshot();
        let report = Report::Stats(snapshot.clone());
        self.log.append(
            Sender::Agent,
            MessageKind::Report,
            report.to_content(),
            Some(TaskPayload::Report { report }),
            None,
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{builtin_collection, find_agent, CollectionCatalog, TaskCatalog, TASK_CENTER_ID};
    use crate::chat::report_entries;
    use crate::core::picker::SequencePicker;
    use crate::core::stats::{StatsAggregator, UserStats};
    use crate::core::SessionPhase;
    use crate::oracle::ScriptedBackend;
    use std::time::Duration;

    fn controller_for(agent_id: &str, backend: ScriptedBackend) -> SessionController {
        let engine = TaskEngine::new(
            Arc::new(TaskCatalog::builtin()),
            StatsAggregator::new(UserStats::new("user_7", "Guest")),
        )
        .with_picker(SequencePicker::new(vec![1]));
        let oracle = OracleAdapter::new(Arc::new(backend), Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(100));
        SessionController::new(find_agent(agent_id).unwrap(), engine, Arc::new(oracle))
    }

    fn controller_with_catalog(catalog: TaskCatalog, backend: Arc<ScriptedBackend>) -> SessionController {
        let engine = TaskEngine::new(
            Arc::new(catalog),
            StatsAggregator::new(UserStats::new("user_7", "Guest")),
        );
        let oracle = OracleAdapter::new(backend, Duration::from_secs(5));
        SessionController::new(find_agent(TASK_CENTER_ID).unwrap(), engine, Arc::new(oracle))
    }

    fn controller(backend: ScriptedBackend) -> SessionController {
        controller_for(TASK_CENTER_ID, backend)
    }

    fn contents(ctl: &SessionController) -> Vec<String> {
        ctl.messages().into_iter().map(|m| m.content).collect()
    }

    fn current_correct(ctl: &SessionController) -> String {
        match &ctl.engine().current_prompt().unwrap().challenge {
            RoundChallenge::QuickJudgment(q) => q.correct.clone(),
            other => panic!("expected quick round, got {other:?}"),
        }
    }

    #[test]
    fn test_welcome_on_construction() {
        let ctl = controller(ScriptedBackend::new());
        let messages = ctl.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::Agent);
        assert!(messages[0].content.contains("请选择任务类型"));
    }

    #[tokio::test]
    async fn test_quick_start_and_answer_order() {
        let mut ctl = controller(ScriptedBackend::new());
        ctl.start_task(TaskType::QuickJudgment).await.unwrap();

        let messages = ctl.messages();
        assert_eq!(messages[1].content, "开始快判任务");
        assert_eq!(messages[1].sender, Sender::User);
        assert_eq!(messages[2].kind, MessageKind::ImageChoice);
        assert_eq!(messages[2].content, "第 1/10 题：请判断图中的内容");
        assert!(matches!(
            messages[2].payload,
            Some(TaskPayload::ImageChoice { ref correct_option, .. }) if correct_option == "狗"
        ));

        ctl.answer_quick_judgment("狗").unwrap();
        let tail: Vec<_> = contents(&ctl).into_iter().skip(3).collect();
        assert_eq!(
            tail,
            vec![
                "我选择：狗".to_string(),
                "✅ 回答正确！贡献度 +10".to_string(),
                "第 2/10 题：请判断图中的内容".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_quick_task_completion_report() {
        let mut ctl = controller(ScriptedBackend::new());
        ctl.start_task(TaskType::QuickJudgment).await.unwrap();
        for _ in 0..10 {
            let correct = current_correct(&ctl);
            ctl.answer_quick_judgment(&correct).unwrap();
        }

        let last = ctl.messages().pop().unwrap();
        assert_eq!(last.kind, MessageKind::Report);
        let entries = report_entries(&last.content).unwrap();
        let get = |k: &str| entries.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone());
        assert_eq!(get("taskType").as_deref(), Some("快判任务"));
        assert_eq!(get("score").as_deref(), Some("100"));
        assert_eq!(get("totalRounds").as_deref(), Some("10"));
        assert_eq!(get("username").as_deref(), Some("Guest"));
        assert!(get("timestamp").is_some());

        assert!(!ctl.view().task.is_active());
        assert_eq!(ctl.engine().stats().snapshot().stats.quick_score_total, 100);
    }

    #[tokio::test]
    async fn test_start_while_active_notifies() {
        let mut ctl = controller(ScriptedBackend::new());
        ctl.start_task(TaskType::QuickJudgment).await.unwrap();
        let before = ctl.engine().state().clone();
        let len = ctl.messages().len();

        let err = ctl.start_task(TaskType::Collection).await.unwrap_err();
        assert_eq!(err, TaskError::AlreadyActive);
        assert_eq!(ctl.engine().state(), &before);
        let messages = ctl.messages();
        assert_eq!(messages.len(), len + 1);
        assert_eq!(messages[len].content, "当前已有任务正在进行中，请先完成或放弃。");
    }

    #[tokio::test]
    async fn test_empty_collection_catalog_rejected_before_model_load() {
        let catalog = TaskCatalog {
            questions: TaskCatalog::builtin().questions,
            collection: CollectionCatalog {
                targets: vec![],
                ..builtin_collection()
            },
        };
        let backend = Arc::new(ScriptedBackend::new());
        let mut ctl = controller_with_catalog(catalog, backend.clone());

        let err = ctl.start_task(TaskType::Collection).await.unwrap_err();
        assert_eq!(err, TaskError::EmptyCatalog(TaskType::Collection));
        // 欢迎语之后只有一条说明：没有用户条目，也没有加载条目
        assert_eq!(
            contents(&ctl)[1..].to_vec(),
            vec!["采集任务题库为空，无法开始任务。".to_string()]
        );
        assert!(ctl.messages().iter().all(|m| m.kind != MessageKind::System));
        assert_eq!(backend.load_calls(), 0);
        assert!(!ctl.oracle().is_loaded().await);
        assert!(!ctl.view().model_loading);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "session contract violated")]
    fn test_unknown_log_entry_is_fatal_in_debug() {
        let mut ctl = controller(ScriptedBackend::new());
        // 日志中不存在的条目
        let _ = ctl.finish_loading(MessageId::new());
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_unknown_log_entry_is_reported_in_release() {
        let mut ctl = controller(ScriptedBackend::new());
        let id = MessageId::new();
        assert_eq!(ctl.finish_loading(id), Err(TaskError::NotFound(id)));
        assert_eq!(ctl.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collection_load_timeout_aborts_start() {
        let mut ctl = controller(ScriptedBackend::new().never_ready());
        let err = ctl.start_task(TaskType::Collection).await.unwrap_err();
        assert_eq!(err, TaskError::ModelLoadTimeout(Duration::from_secs(5)));

        let messages = ctl.messages();
        assert_eq!(messages[1].content, "开始采集任务");
        assert_eq!(messages[2].kind, MessageKind::System);
        assert!(!messages[2].is_loading());
        assert_eq!(messages[3].content, "模型加载失败，请检查网络连接。");
        assert!(messages.iter().all(|m| m.kind != MessageKind::ImageRequest));

        let view = ctl.view();
        assert!(!view.task.is_active());
        assert!(!view.model_loading);
        assert_eq!(view.phase, SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_collection_round_passes_with_translation() {
        let mut ctl = controller(ScriptedBackend::new().with_detection(&["cup", "person"]));
        ctl.start_task(TaskType::Collection).await.unwrap();
        assert!(contents(&ctl).contains(&"模型加载完成！".to_string()));
        let prompt = ctl.messages().pop().unwrap();
        assert_eq!(prompt.content, "第 1/10 题：请拍摄或上传一张包含【杯子】的照片");

        ctl.submit_collection_image(ImageRef::new("desk.jpg"), "cup")
            .await
            .unwrap();
        let messages = ctl.messages();
        let n = messages.len();
        assert_eq!(messages[n - 4].content, "已上传图片");
        assert!(!messages[n - 3].is_loading());
        assert_eq!(messages[n - 2].content, "✅ 审核通过！识别到了 杯子。贡献度 +10");
        assert_eq!(messages[n - 1].kind, MessageKind::ImageRequest);
        assert_eq!(ctl.engine().state().score(), 10);
    }

    #[tokio::test]
    async fn test_detection_error_counts_as_incorrect() {
        let mut ctl = controller(ScriptedBackend::new().with_detection_error("decoder crashed"));
        ctl.start_task(TaskType::Collection).await.unwrap();
        ctl.submit_collection_image(ImageRef::new("blurry.jpg"), "cup")
            .await
            .unwrap();

        assert!(contents(&ctl).contains(&"❌ 审核未通过。AI识别到了: []，未发现 杯子。".to_string()));
        let state = ctl.engine().state();
        assert!(state.is_active());
        assert_eq!(state.current_round(), 2);
        assert_eq!(state.score(), 0);
    }

    #[tokio::test]
    async fn test_abandon_while_resolving_discards_late_result() {
        let mut ctl = controller(ScriptedBackend::new());
        ctl.start_task(TaskType::Collection).await.unwrap();
        let pending = ctl
            .begin_collection_submission(ImageRef::new("cup.jpg"), "cup")
            .unwrap();
        assert_eq!(ctl.view().phase, SessionPhase::Resolving);
        assert_eq!(
            ctl.begin_collection_submission(ImageRef::new("cup.jpg"), "cup"),
            Err(TaskError::RoundPending)
        );

        ctl.abandon().unwrap();
        assert!(ctl.messages().iter().all(|m| !m.is_loading()));
        let len = ctl.messages().len();

        let labels: LabelSet = ["cup".to_string()].into_iter().collect();
        assert_eq!(
            ctl.finish_collection_submission(pending, labels),
            Err(TaskError::StaleSubmission)
        );
        assert_eq!(ctl.messages().len(), len);
        assert!(!ctl.engine().state().is_active());
        assert_eq!(ctl.engine().stats().snapshot().stats.collection_tasks_completed, 0);
    }

    #[tokio::test]
    async fn test_other_agents_do_not_run_tasks() {
        let mut ctl = controller_for("web3", ScriptedBackend::new());
        let err = ctl.start_task(TaskType::QuickJudgment).await.unwrap_err();
        assert!(matches!(err, TaskError::AgentHasNoTasks(_)));
        assert_eq!(ctl.messages().last().unwrap().content, "Web3 趋势雷达暂不支持任务，请前往任务中心。");

        let snapshot = ctl.view_stats();
        assert_eq!(snapshot.total_score, 0);
    }

    #[test]
    fn test_view_stats_report_keys() {
        let mut ctl = controller(ScriptedBackend::new());
        ctl.view_stats();
        let messages = ctl.messages();
        let n = messages.len();
        assert_eq!(messages[n - 2].content, "查看我的统计");
        let keys: Vec<String> = report_entries(&messages[n - 1].content)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        for key in [
            "userId",
            "username",
            "quickTasksCompleted",
            "collectionTasksCompleted",
            "quickScoreTotal",
            "collectionScoreTotal",
            "totalScore",
        ] {
            assert!(keys.iter().any(|k| k == key), "missing {key}");
        }
    }

    #[test]
    fn test_actions_without_task_are_explained() {
        let mut ctl = controller(ScriptedBackend::new());
        assert_eq!(ctl.answer_quick_judgment("狗"), Err(TaskError::NoActiveTask));
        assert_eq!(ctl.abandon(), Err(TaskError::NoActiveTask));
        let notices: Vec<_> = contents(&ctl)
            .into_iter()
            .filter(|c| c == "当前没有进行中的任务，请先选择任务类型。")
            .collect();
        assert_eq!(notices.len(), 2);
    }
}
