//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__ORACLE__BACKEND=http`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub task: TaskSection,
    #[serde(default)]
    pub oracle: OracleSection,
    #[serde(default)]
    pub catalog: CatalogSection,
}

/// [app] 段：打开的智能体、用户身份
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    /// TUI 启动时进入的智能体 ID
    #[serde(default = "default_agent")]
    pub agent: String,
    #[serde(default = "default_username")]
    pub username: String,
    /// 未设置时随机生成 user_XXXX
    pub user_id: Option<String>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            agent: default_agent(),
            username: default_username(),
            user_id: None,
        }
    }
}

fn default_agent() -> String {
    "task_center".to_string()
}

fn default_username() -> String {
    "Guest".to_string()
}

/// [task] 段：回合数、每题贡献度、随机种子
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSection {
    #[serde(default = "default_total_rounds")]
    pub total_rounds: u32,
    #[serde(default = "default_points_per_correct")]
    pub points_per_correct: u32,
    /// 采集目标抽取的固定种子；None 时使用系统熵
    pub seed: Option<u64>,
}

impl Default for TaskSection {
    fn default() -> Self {
        Self {
            total_rounds: default_total_rounds(),
            points_per_correct: default_points_per_correct(),
            seed: None,
        }
    }
}

fn default_total_rounds() -> u32 {
    10
}

fn default_points_per_correct() -> u32 {
    10
}

/// [oracle] 段：检测后端与超时
#[derive(Debug, Clone, Deserialize)]
pub struct OracleSection {
    /// 后端：filename / http
    #[serde(default = "default_backend")]
    pub backend: String,
    /// 模型加载总超时（秒）
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,
    /// 等待后端就绪的轮询间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 低于该置信度的检测结果忽略
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            load_timeout_secs: default_load_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            min_score: default_min_score(),
            base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "filename".to_string()
}

fn default_load_timeout_secs() -> u64 {
    5
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_min_score() -> f32 {
    0.5
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// [catalog] 段：可选的题库 / 采集目标 TOML 文件
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CatalogSection {
    pub path: Option<PathBuf>,
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
