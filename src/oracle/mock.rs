//! Scripted 检测后端（用于测试，无需模型）
//!
//! 可设定就绪前的轮询次数、加载失败、按顺序返回的检测结果与检测延迟，并记录调用次数。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::oracle::{Detection, DetectionBackend, ImageRef, OracleError};

pub type ScriptedDetection = Result<Vec<Detection>, OracleError>;

#[derive(Debug, Default)]
pub struct ScriptedBackend {
    /// None 表示永不就绪
    ready_after: Option<usize>,
    load_error: Option<String>,
    detections: Mutex<VecDeque<ScriptedDetection>>,
    detect_delay: Option<Duration>,
    polls: AtomicUsize,
    loads: AtomicUsize,
    detects: AtomicUsize,
}

impl ScriptedBackend {
    /// 立即就绪、加载成功、检测结果为空
    pub fn new() -> Self {
        Self {
            ready_after: Some(0),
            ..Default::default()
        }
    }

    pub fn never_ready(mut self) -> Self {
        self.ready_after = None;
        self
    }

    /// 前 n 次就绪检查返回 false
    pub fn ready_after(mut self, polls: usize) -> Self {
        self.ready_after = Some(polls);
        self
    }

    pub fn failing_load(mut self, reason: &str) -> Self {
        self.load_error = Some(reason.to_string());
        self
    }

    /// 追加一次检测结果（置信度 1.0）
    pub fn with_detection(self, labels: &[&str]) -> Self {
        self.with_scored_detection(labels.iter().map(|l| Detection::new(*l, 1.0)).collect())
    }

    pub fn with_scored_detection(self, detections: Vec<Detection>) -> Self {
        self.push(Ok(detections));
        self
    }

    pub fn with_detection_error(self, reason: &str) -> Self {
        self.push(Err(OracleError::DetectionFailure(reason.to_string())));
        self
    }

    pub fn with_detect_delay(mut self, delay: Duration) -> Self {
        self.detect_delay = Some(delay);
        self
    }

    /// 运行中追加检测结果
    pub fn push(&self, result: ScriptedDetection) {
        if let Ok(mut queue) = self.detections.lock() {
            queue.push_back(result);
        }
    }

    pub fn ready_polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn load_calls(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn detect_calls(&self) -> usize {
        self.detects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn is_ready(&self) -> bool {
        let seen = self.polls.fetch_add(1, Ordering::SeqCst);
        matches!(self.ready_after, Some(n) if seen >= n)
    }

    async fn load(&self) -> Result<(), OracleError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.load_error {
            Some(reason) => Err(OracleError::LoadFailed(reason.clone())),
            None => Ok(()),
        }
    }

    async fn detect(&self, _image: &ImageRef) -> Result<Vec<Detection>, OracleError> {
        self.detects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.detect_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .detections
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}
