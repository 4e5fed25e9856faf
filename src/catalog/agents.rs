//! 智能体目录：启动时固定加载，只读

use serde::Serialize;

/// 任务中心智能体 ID（唯一驱动任务会话的智能体）
pub const TASK_CENTER_ID: &str = "task_center";

/// 智能体图标标签（渲染层自行映射为具体图标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentIcon {
    Shield,
    Radar,
    Coin,
    Grid,
}

/// 单个智能体（按 id 唯一）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Agent {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// 颜色标签
    pub color: &'static str,
    pub icon: AgentIcon,
}

impl Agent {
    pub fn runs_tasks(&self) -> bool {
        self.id == TASK_CENTER_ID
    }

    /// 进入会话时的欢迎语
    pub fn welcome(&self) -> String {
        if self.runs_tasks() {
            format!(
                "欢迎来到{}！\n我是你的任务助手。完成任务可以获取贡献度。\n\n请选择任务类型：",
                self.name
            )
        } else {
            format!("欢迎来到{}！\n有什么可以帮您的吗？", self.name)
        }
    }
}

pub const AGENTS: &[Agent] = &[
    Agent {
        id: "safety",
        name: "安全意识教练",
        description: "在Web3中保持安全：发现欺诈并避免风险",
        color: "blue",
        icon: AgentIcon::Shield,
    },
    Agent {
        id: "web3",
        name: "Web3 趋势雷达",
        description: "实时发现Web3趋势",
        color: "cyan",
        icon: AgentIcon::Radar,
    },
    Agent {
        id: "token",
        name: "代币经济学设计师",
        description: "轻松设计完整的代币模型",
        color: "orange",
        icon: AgentIcon::Coin,
    },
    Agent {
        id: TASK_CENTER_ID,
        name: "任务中心",
        description: "为您的 Web3 社区增长设计和优化任务",
        color: "green",
        icon: AgentIcon::Grid,
    },
];

pub fn find_agent(id: &str) -> Option<&'static Agent> {
    AGENTS.iter().find(|a| a.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_ids_unique() {
        for (i, a) in AGENTS.iter().enumerate() {
            assert!(AGENTS[i + 1..].iter().all(|b| b.id != a.id), "duplicate id {}", a.id);
        }
    }

    #[test]
    fn test_only_task_center_runs_tasks() {
        let runners: Vec<_> = AGENTS.iter().filter(|a| a.runs_tasks()).collect();
        assert_eq!(runners.len(), 1);
        assert_eq!(runners[0].id, TASK_CENTER_ID);
        assert!(runners[0].welcome().contains("请选择任务类型"));
        assert!(find_agent("web3").unwrap().welcome().contains("有什么可以帮您的吗"));
        assert!(find_agent("missing").is_none());
    }
}
