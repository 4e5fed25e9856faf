//! 统计聚合：完成的任务次数与得分累计
//!
//! 只在任务完成时记录；放弃的任务不计入。所有字段单调不减，会话期间不重置。

use serde::{Deserialize, Serialize};

use crate::core::TaskType;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_id: String,
    pub username: String,
    pub quick_tasks_completed: u32,
    pub collection_tasks_completed: u32,
    pub quick_score_total: u64,
    pub collection_score_total: u64,
}

impl UserStats {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            quick_tasks_completed: 0,
            collection_tasks_completed: 0,
            quick_score_total: 0,
            collection_score_total: 0,
        }
    }
}

/// 统计快照：UserStats 全部字段 + 派生 totalScore
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    #[serde(flatten)]
    pub stats: UserStats,
    pub total_score: u64,
}

#[derive(Debug)]
pub struct StatsAggregator {
    stats: UserStats,
}

impl StatsAggregator {
    pub fn new(stats: UserStats) -> Self {
        Self { stats }
    }

    /// 记录一次完成的任务（次数 +1、得分累加，一次性更新）
    pub fn record(&mut self, task_type: TaskType, final_score: u32) {
        let score = u64::from(final_score);
        let mut next = self.stats.clone();
        match task_type {
            TaskType::QuickJudgment => {
                next.quick_tasks_completed += 1;
                next.quick_score_total += score;
            }
            TaskType::Collection => {
                next.collection_tasks_completed += 1;
                next.collection_score_total += score;
            }
            TaskType::None => {
                tracing::error!("Ignoring stats record for task type none");
                return;
            }
        }
        self.stats = next;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_score: self.stats.quick_score_total + self.stats.collection_score_total,
            stats: self.stats.clone(),
        }
    }

    pub fn username(&self) -> &str {
        &self.stats.username
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_updates_matching_type_only() {
        let mut agg = StatsAggregator::new(UserStats::new("user_1", "Guest"));
        agg.record(TaskType::QuickJudgment, 80);
        agg.record(TaskType::Collection, 30);
        agg.record(TaskType::QuickJudgment, 100);

        let snap = agg.snapshot();
        assert_eq!(snap.stats.quick_tasks_completed, 2);
        assert_eq!(snap.stats.collection_tasks_completed, 1);
        assert_eq!(snap.stats.quick_score_total, 180);
        assert_eq!(snap.stats.collection_score_total, 30);
        assert_eq!(snap.total_score, 210);
    }

    #[test]
    fn test_none_type_is_ignored() {
        let mut agg = StatsAggregator::new(UserStats::new("user_1", "Guest"));
        let before = agg.snapshot();
        agg.record(TaskType::None, 50);
        assert_eq!(agg.snapshot(), before);
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let agg = StatsAggregator::new(UserStats::new("user_7", "Guest"));
        let value = serde_json::to_value(agg.snapshot()).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "userId",
            "username",
            "quickTasksCompleted",
            "collectionTasksCompleted",
            "quickScoreTotal",
            "collectionScoreTotal",
            "totalScore",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(obj.len(), 7);
    }
}
