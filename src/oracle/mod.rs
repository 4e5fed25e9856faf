//! 目标检测能力：后端抽象与实现（文件名 / HTTP / Scripted）+ 超时与兜底适配器

pub mod adapter;
pub mod filename;
pub mod http;
pub mod mock;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use adapter::OracleAdapter;
pub use filename::{coco_vocabulary, FilenameBackend, COCO_CLASSES};
pub use http::HttpBackend;
pub use mock::ScriptedBackend;
pub use traits::{Detection, DetectionBackend, ImageRef, Label, LabelSet, OracleError};

use crate::config::OracleSection;

/// 根据配置选择检测后端（http / filename），构建适配器
pub fn create_oracle_from_config(cfg: &OracleSection, vocabulary: Vec<Label>) -> OracleAdapter {
    let backend: Arc<dyn DetectionBackend> = match (cfg.backend.to_lowercase().as_str(), &cfg.base_url) {
        ("http", Some(base_url)) => {
            tracing::info!("Using HTTP detection backend ({})", base_url);
            Arc::new(HttpBackend::new(
                base_url,
                Duration::from_secs(cfg.request_timeout_secs),
            ))
        }
        ("http", None) => {
            tracing::warn!("oracle.backend = http but no base_url set, using filename backend");
            Arc::new(FilenameBackend::new(vocabulary))
        }
        ("filename", _) => Arc::new(FilenameBackend::new(vocabulary)),
        (other, _) => {
            tracing::warn!("Unknown detection backend '{}', using filename backend", other);
            Arc::new(FilenameBackend::new(vocabulary))
        }
    };

    OracleAdapter::new(backend, Duration::from_secs(cfg.load_timeout_secs))
        .with_poll_interval(Duration::from_millis(cfg.poll_interval_ms))
        .with_min_score(cfg.min_score)
}
