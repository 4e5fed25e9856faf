//! TaskHive - 任务中心智能体
//!
//! 模块划分：
//! - **catalog**: 静态目录（智能体列表、快判题库、采集目标及中文译名）
//! - **chat**: 消息日志（只追加、按插入顺序，支持按 ID 更新加载标记）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 任务会话引擎、统计聚合、会话控制器、后台运行时
//! - **observability**: 日志初始化
//! - **oracle**: 目标检测能力适配（模型加载超时、检测失败兜底）
//! - **ui**: Ratatui TUI 界面

pub mod catalog;
pub mod chat;
pub mod config;
pub mod core;
pub mod observability;
pub mod oracle;
pub mod ui;

pub use core::{SessionController, TaskEngine, TaskType};
