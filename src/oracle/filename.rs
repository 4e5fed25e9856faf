//! 文件名检测后端（离线演示用）
//!
//! 不跑真实模型：把图片文件名拆成单词，命中词表中的标签即视为检测到（如 `my_cell-phone.jpg` → `cell phone`）。
//! 文件不存在时检测失败。

use async_trait::async_trait;

use crate::oracle::{Detection, DetectionBackend, ImageRef, Label, OracleError};

/// COCO-SSD 可识别的 80 个类别
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// COCO 类别加上额外标签（去重，保持顺序）
pub fn coco_vocabulary(extra: &[Label]) -> Vec<Label> {
    let mut vocabulary: Vec<Label> = COCO_CLASSES.iter().map(|c| c.to_string()).collect();
    for label in extra {
        if !vocabulary.contains(label) {
            vocabulary.push(label.clone());
        }
    }
    vocabulary
}

pub struct FilenameBackend {
    vocabulary: Vec<Label>,
}

impl FilenameBackend {
    pub fn new(vocabulary: Vec<Label>) -> Self {
        Self { vocabulary }
    }

    /// 文件名中出现的词表标签
    fn labels_in(&self, image: &ImageRef) -> Vec<Detection> {
        let stem = image
            .as_path()
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let words: Vec<&str> = stem
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let padded = format!(" {} ", words.join(" "));

        self.vocabulary
            .iter()
            .filter(|label| padded.contains(&format!(" {} ", label)))
            .map(|label| Detection::new(label.clone(), 1.0))
            .collect()
    }
}

#[async_trait]
impl DetectionBackend for FilenameBackend {
    fn name(&self) -> &str {
        "filename"
    }

    async fn is_ready(&self) -> bool {
        true
    }

    async fn load(&self) -> Result<(), OracleError> {
        Ok(())
    }

    async fn detect(&self, image: &ImageRef) -> Result<Vec<Detection>, OracleError> {
        let exists = tokio::fs::try_exists(image.as_path()).await.unwrap_or(false);
        if !exists {
            return Err(OracleError::DetectionFailure(format!(
                "image not found: {}",
                image
            )));
        }
        Ok(self.labels_in(image))
    }
}
