//! 报告载荷：任务结算报告与统计报告
//!
//! 报告以扁平 JSON（稳定键集合）存入消息 content，渲染层按键值表通用展示，不做手工排版。

use serde::{Deserialize, Serialize};

use crate::core::stats::StatsSnapshot;

/// 任务结算报告
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub username: String,
    /// 本地时间字符串
    pub timestamp: String,
    /// 任务类型显示名（快判任务 / 采集任务）
    pub task_type: String,
    pub score: u32,
    pub total_rounds: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report {
    Task(TaskReport),
    Stats(StatsSnapshot),
}

impl Report {
    /// 序列化为消息 content；字段均为字符串与整数，不会失败
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// 将报告 content 解析为键值对（渲染层通用表格用）
pub fn report_entries(content: &str) -> Result<Vec<(String, String)>, serde_json::Error> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;
    Ok(map
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, value)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_report_key_set() {
        let report = Report::Task(TaskReport {
            username: "Guest".to_string(),
            timestamp: "2026-01-01 12:00:00".to_string(),
            task_type: "快判任务".to_string(),
            score: 70,
            total_rounds: 10,
        });
        let entries = report_entries(&report.to_content()).unwrap();
        let mut keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        keys.sort();
        assert_eq!(keys, vec!["score", "taskType", "timestamp", "totalRounds", "username"]);
        assert!(entries.contains(&("score".to_string(), "70".to_string())));
        assert!(entries.contains(&("taskType".to_string(), "快判任务".to_string())));
    }

    #[test]
    fn test_report_entries_rejects_plain_text() {
        assert!(report_entries("not json").is_err());
    }
}
