//! 任务目录：快判题库（按回合顺序取题）与采集目标词表（检测标签 + 中文显示名）

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 快判题：图片 + 选项 + 正确选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickQuestion {
    pub image_url: String,
    pub options: Vec<String>,
    pub correct: String,
}

impl QuickQuestion {
    pub fn new(image_url: &str, options: &[&str], correct: &str) -> Self {
        Self {
            image_url: image_url.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct: correct.to_string(),
        }
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

/// 采集目标：固定词表（与检测模型输出的英文标签一致）及其显示译名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCatalog {
    pub targets: Vec<String>,
    #[serde(default)]
    pub translations: HashMap<String, String>,
}

impl CollectionCatalog {
    /// 标签的显示名；无译名时原样返回
    pub fn display<'a>(&'a self, label: &'a str) -> &'a str {
        self.translations
            .get(label)
            .map(String::as_str)
            .unwrap_or(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.targets.iter().any(|t| t == label)
    }
}

pub fn builtin_questions() -> Vec<QuickQuestion> {
    vec![
        QuickQuestion::new(
            "https://images.unsplash.com/photo-1543466835-00a7907e9de1?w=400&q=80",
            &["狗", "猫"],
            "狗",
        ),
        QuickQuestion::new(
            "https://images.unsplash.com/photo-1533738363-b7f9aef128ce?w=400&q=80",
            &["狗", "猫"],
            "猫",
        ),
        QuickQuestion::new(
            "https://images.unsplash.com/photo-1503376763036-066120622c74?w=400&q=80",
            &["汽车", "自行车"],
            "汽车",
        ),
        QuickQuestion::new(
            "https://images.unsplash.com/photo-1485965120184-e224f723d621?w=400&q=80",
            &["电脑", "手机"],
            "电脑",
        ),
        QuickQuestion::new(
            "https://images.unsplash.com/photo-1511367461989-f85a21fda167?w=400&q=80",
            &["人", "雕塑"],
            "人",
        ),
        QuickQuestion::new(
            "https://images.unsplash.com/photo-1562157873-818bc0726f68?w=400&q=80",
            &["衬衫", "裤子"],
            "衬衫",
        ),
        QuickQuestion::new(
            "https://images.unsplash.com/photo-1574158622682-e40e69881006?w=400&q=80",
            &["猫", "老虎"],
            "猫",
        ),
        QuickQuestion::new(
            "https://images.unsplash.com/photo-1568605117036-5fe5e7bab0b7?w=400&q=80",
            &["飞机", "汽车"],
            "汽车",
        ),
        QuickQuestion::new(
            "https://images.unsplash.com/photo-1505740420928-5e560c06d30e?w=400&q=80",
            &["耳机", "音响"],
            "耳机",
        ),
        QuickQuestion::new(
            "https://images.unsplash.com/photo-1583511655857-d19b40a7a54e?w=400&q=80",
            &["狗", "狼"],
            "狗",
        ),
    ]
}

pub fn builtin_collection() -> CollectionCatalog {
    let pairs = [
        ("person", "人"),
        ("cup", "杯子"),
        ("cell phone", "手机"),
        ("keyboard", "键盘"),
        ("bottle", "瓶子"),
        ("laptop", "笔记本电脑"),
        ("mouse", "鼠标"),
        ("book", "书"),
        ("chair", "椅子"),
        ("potted plant", "盆栽"),
    ];
    CollectionCatalog {
        targets: pairs.iter().map(|(label, _)| label.to_string()).collect(),
        translations: pairs
            .iter()
            .map(|(label, name)| (label.to_string(), name.to_string()))
            .collect(),
    }
}
