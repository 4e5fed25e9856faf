//! 检测能力适配器
//!
//! 持有后端与超时配置，会话启动时构建一次并注入控制器：
//! - load_model：按间隔轮询后端就绪后加载，整体受 load_timeout 约束，超时返回 ModelLoadTimeout；加载成功后缓存
//! - detect_objects：失败时返回空集合（fail closed），从不向调用方报错
//! 每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::oracle::{DetectionBackend, ImageRef, LabelSet, OracleError};

pub struct OracleAdapter {
    backend: Arc<dyn DetectionBackend>,
    load_timeout: Duration,
    poll_interval: Duration,
    min_score: f32,
    /// 模型是否已加载；锁同时串行化并发加载
    loaded: Mutex<bool>,
}

impl OracleAdapter {
    pub fn new(backend: Arc<dyn DetectionBackend>, load_timeout: Duration) -> Self {
        Self {
            backend,
            load_timeout,
            poll_interval: Duration::from_millis(100),
            min_score: 0.0,
            loaded: Mutex::new(false),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    #[cfg(test)]
    pub(crate) async fn is_loaded(&self) -> bool {
        *self.loaded.lock().await
    }

    /// 加载模型；已加载时直接返回
    pub async fn load_model(&self) -> Result<(), OracleError> {
        let mut loaded = self.loaded.lock().await;
        if *loaded {
            return Ok(());
        }

        let start = Instant::now();
        let result = match timeout(self.load_timeout, self.wait_and_load()).await {
            Ok(r) => r,
            Err(_) => Err(OracleError::ModelLoadTimeout(self.load_timeout)),
        };
        self.audit("load_model", outcome_of(&result), start, None);

        match &result {
            Ok(()) => {
                *loaded = true;
                tracing::info!(backend = self.backend.name(), "Detection model loaded");
            }
            Err(e) => tracing::warn!(backend = self.backend.name(), "Failed to load model: {}", e),
        }
        result
    }

    async fn wait_and_load(&self) -> Result<(), OracleError> {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.backend.is_ready().await {
                break;
            }
        }
        self.backend.load().await
    }

    /// 检测图片中的目标；任何失败都视为未检测到目标
    pub async fn detect_objects(&self, image: &ImageRef) -> LabelSet {
        if self.load_model().await.is_err() {
            return LabelSet::new();
        }

        let start = Instant::now();
        let result = self.backend.detect(image).await;
        self.audit("detect_objects", outcome_of(&result), start, Some(image));

        match result {
            Ok(detections) => detections
                .into_iter()
                .filter(|d| d.score >= self.min_score)
                .map(|d| d.label)
                .collect(),
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), image = %image, "Detection failed, treating as empty: {}", e);
                LabelSet::new()
            }
        }
    }

    fn audit(&self, call: &str, outcome: &str, start: Instant, image: Option<&ImageRef>) {
        let audit = serde_json::json!({
            "event": "oracle_audit",
            "backend": self.backend.name(),
            "call": call,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "image": image.map(|i| i.as_str()),
        });
        tracing::info!(audit = %audit.to_string(), "oracle");
    }
}

fn outcome_of<T>(result: &Result<T, OracleError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(OracleError::ModelLoadTimeout(_)) => "timeout",
        Err(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ScriptedBackend;

    fn adapter(backend: ScriptedBackend) -> (OracleAdapter, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let adapter = OracleAdapter::new(backend.clone(), Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(100));
        (adapter, backend)
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_times_out_when_backend_never_ready() {
        let (adapter, backend) = adapter(ScriptedBackend::new().never_ready());
        let err = adapter.load_model().await.unwrap_err();
        assert_eq!(err, OracleError::ModelLoadTimeout(Duration::from_secs(5)));
        assert!(!adapter.is_loaded().await);
        assert_eq!(backend.load_calls(), 0);
        // 约 5 秒内每 100ms 轮询一次
        assert!(backend.ready_polls() >= 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_waits_for_readiness_then_caches() {
        let (adapter, backend) = adapter(ScriptedBackend::new().ready_after(3));
        adapter.load_model().await.unwrap();
        adapter.load_model().await.unwrap();
        assert!(adapter.is_loaded().await);
        assert_eq!(backend.load_calls(), 1);
        assert_eq!(backend.ready_polls(), 4);
    }

    #[tokio::test]
    async fn test_load_failure_is_not_cached() {
        let (adapter, backend) = adapter(ScriptedBackend::new().failing_load("weights missing"));
        let err = adapter.load_model().await.unwrap_err();
        assert!(matches!(err, OracleError::LoadFailed(_)));
        assert!(adapter.load_model().await.is_err());
        assert_eq!(backend.load_calls(), 2);
    }

    #[tokio::test]
    async fn test_detection_error_fails_closed() {
        let (adapter, _) = adapter(ScriptedBackend::new().with_detection_error("decoder crashed"));
        let labels = adapter.detect_objects(&ImageRef::new("photo.jpg")).await;
        assert!(labels.is_empty());
    }

    #[tokio::test]
    async fn test_detect_loads_model_first() {
        let (adapter, backend) = adapter(ScriptedBackend::new().with_detection(&["cup", "person"]));
        let labels = adapter.detect_objects(&ImageRef::new("photo.jpg")).await;
        assert_eq!(labels.into_iter().collect::<Vec<_>>(), vec!["cup", "person"]);
        assert_eq!(backend.load_calls(), 1);
        assert_eq!(backend.detect_calls(), 1);
    }

    #[tokio::test]
    async fn test_low_confidence_detections_ignored() {
        let backend = Arc::new(ScriptedBackend::new().with_scored_detection(vec![
            crate::oracle::Detection::new("cup", 0.9),
            crate::oracle::Detection::new("book", 0.2),
        ]));
        let adapter = OracleAdapter::new(backend, Duration::from_secs(5)).with_min_score(0.5);
        let labels = adapter.detect_objects(&ImageRef::new("desk.jpg")).await;
        assert!(labels.contains("cup"));
        assert!(!labels.contains("book"));
    }
}
