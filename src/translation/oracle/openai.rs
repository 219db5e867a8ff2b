//! OpenAI Responses 端点实现

use std::time::Duration;

use async_trait::async_trait;

use super::protocol::{ResponsesRequest, ResponsesResponse};
use super::TranslationOracle;
use crate::translation::config::constants::DEFAULT_API_URL;
use crate::translation::error::{TranslationError, TranslationResult};

/// 基于 reqwest 的端点客户端
#[derive(Debug, Clone)]
pub struct OpenAiOracle {
    api_url: String,
    client: reqwest::Client,
}

impl OpenAiOracle {
    pub fn new() -> Self {
        Self::with_url(DEFAULT_API_URL)
    }

    /// 使用自定义端点（兼容 OpenAI 的服务）
    pub fn with_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// 使用自定义端点和请求超时，`None` 沿用传输层默认值
    pub fn with_timeout(api_url: impl Into<String>, timeout: Option<Duration>) -> TranslationResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            api_url: api_url.into(),
            client,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl Default for OpenAiOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranslationOracle for OpenAiOracle {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, api_key: &str, request: &ResponsesRequest) -> TranslationResult<String> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| TranslationError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranslationError::NetworkError(format!("读取响应失败: {}", e)))?;

        if !status.is_success() {
            return Err(TranslationError::TransportError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ResponsesResponse = serde_json::from_str(&body)
            .map_err(|e| TranslationError::SchemaError(format!("响应体不是有效的 JSON: {}", e)))?;

        Ok(parsed.output_text().unwrap_or_default().to_string())
    }
}
