//! 静态目录：智能体列表、快判题库、采集目标
//!
//! 内置数据即默认目录；可通过 [catalog].path 指向 TOML 文件覆盖题库与采集目标（智能体列表固定）。

pub mod agents;
pub mod tasks;

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

pub use agents::{find_agent, Agent, AgentIcon, AGENTS, TASK_CENTER_ID};
pub use tasks::{builtin_collection, builtin_questions, CollectionCatalog, QuickQuestion};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid catalog: {0}")]
    Invalid(String),
}

/// 任务目录：快判题库 + 采集目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCatalog {
    pub questions: Vec<QuickQuestion>,
    pub collection: CollectionCatalog,
}

/// catalog.toml 结构；缺省的部分沿用内置数据
#[derive(Debug, Deserialize)]
struct CatalogToml {
    #[serde(default)]
    quick_questions: Option<Vec<QuickQuestion>>,
    #[serde(default)]
    collection: Option<CollectionCatalog>,
}

impl Default for TaskCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TaskCatalog {
    pub fn builtin() -> Self {
        Self {
            questions: builtin_questions(),
            collection: builtin_collection(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, CatalogError> {
        let raw: CatalogToml = toml::from_str(s)?;
        let catalog = Self {
            questions: raw.quick_questions.unwrap_or_else(builtin_questions),
            collection: raw.collection.unwrap_or_else(builtin_collection),
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 至少一道题、每题正确选项在选项内、至少一个采集目标
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.questions.is_empty() {
            return Err(CatalogError::Invalid("no quick questions".to_string()));
        }
        if let Some(q) = self.questions.iter().find(|q| !q.has_option(&q.correct)) {
            return Err(CatalogError::Invalid(format!(
                "correct option '{}' not among options {:?}",
                q.correct, q.options
            )));
        }
        if self.collection.targets.is_empty() {
            return Err(CatalogError::Invalid("no collection targets".to_string()));
        }
        Ok(())
    }
}
