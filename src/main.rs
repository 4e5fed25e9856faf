//! TaskHive - 任务中心智能体
//!
//! 入口：初始化日志、加载配置、组装会话并在后台运行，启动 TUI 主循环。
//! 用法：taskhive [config.toml]

use std::path::{Path, PathBuf};

use anyhow::Context;
use taskhive::config::{load_config, AppConfig};
use taskhive::core::{build_controller, spawn_session};
use taskhive::observability::{self, DEFAULT_LOG_FILE};
use taskhive::ui::run_app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init(Path::new(DEFAULT_LOG_FILE))
        .with_context(|| format!("Failed to open {DEFAULT_LOG_FILE}"))?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let controller = build_controller(&cfg).context("Failed to create session")?;
    let agent = controller.agent();
    let session = spawn_session(controller);

    run_app(agent, session).await.context("App run failed")?;
    Ok(())
}
