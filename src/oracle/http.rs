//! HTTP 检测后端
//!
//! 对接独立的目标检测服务（COCO-SSD 兼容）：
//! - GET  {base}/health  返回 2xx 表示服务就绪
//! - POST {base}/load    加载模型
//! - POST {base}/detect  请求体为原始图片字节，返回 `{"predictions":[{"class":"cup","score":0.93}]}`

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::oracle::{Detection, DetectionBackend, ImageRef, OracleError};

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    class: String,
    #[serde(default = "default_score")]
    score: f32,
}

fn default_score() -> f32 {
    1.0
}

impl HttpBackend {
    pub fn new(base_url: &str, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn read_image(image: &ImageRef) -> Result<Vec<u8>, OracleError> {
        tokio::fs::read(image.as_path())
            .await
            .map_err(|e| OracleError::DetectionFailure(format!("read {}: {}", image, e)))
    }
}

#[async_trait]
impl DetectionBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn is_ready(&self) -> bool {
        match self.client.get(self.url("health")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!("Detection service not ready: {}", e);
                false
            }
        }
    }

    async fn load(&self) -> Result<(), OracleError> {
        self.client
            .post(self.url("load"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OracleError::LoadFailed(e.to_string()))?;
        Ok(())
    }

    async fn detect(&self, image: &ImageRef) -> Result<Vec<Detection>, OracleError> {
        let bytes = Self::read_image(image).await?;
        let resp = self
            .client
            .post(self.url("detect"))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OracleError::DetectionFailure(e.to_string()))?;
        let body: DetectResponse = resp
            .json()
            .await
            .map_err(|e| OracleError::DetectionFailure(format!("invalid response: {}", e)))?;
        Ok(body
            .predictions
            .into_iter()
            .map(|p| Detection::new(p.class, p.score))
            .collect())
    }
}
