//! 检测后端抽象
//!
//! 所有后端（文件名 / HTTP 服务 / Scripted）实现 DetectionBackend：is_ready（加载前轮询）、load、detect。
//! 后端可以失败；超时与失败兜底由 OracleAdapter 统一处理。

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 检测标签（固定英文词表，如 "cup"、"cell phone"）
pub type Label = String;

/// 检测结果标签集合
pub type LabelSet = BTreeSet<Label>;

/// 用户提交的图片引用（本地路径或 URL）
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 单个检测框（只保留类别与置信度）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: Label,
    pub score: f32,
}

impl Detection {
    pub fn new(label: impl Into<Label>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Model load timed out after {0:?}")]
    ModelLoadTimeout(Duration),

    #[error("Model load failed: {0}")]
    LoadFailed(String),

    #[error("Detection failed: {0}")]
    DetectionFailure(String),
}

#[async_trait]
pub trait DetectionBackend: Send + Sync {
    fn name(&self) -> &str;

    /// 后端是否已就绪（如服务已启动）；加载前按固定间隔轮询
    async fn is_ready(&self) -> bool;

    /// 加载模型
    async fn load(&self) -> Result<(), OracleError>;

    /// 对单张图片做目标检测
    async fn detect(&self, image: &ImageRef) -> Result<Vec<Detection>, OracleError>;
}
