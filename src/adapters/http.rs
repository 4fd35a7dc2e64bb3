use crate::domain::model::TransformationRule;
use crate::domain::ports::Transformer;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// 以 Messages API 格式呼叫遠端改寫服務
#[derive(Debug, Clone)]
pub struct HttpTransformer {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_key: Option<String>,
}

impl HttpTransformer {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            max_tokens,
            api_key,
        }
    }

    /// 啟動時讀取一次金鑰；缺少時延到第一次呼叫才報錯，dry-run 不需要金鑰
    pub fn from_env(
        api_key_env: &str,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self::new(endpoint, model, max_tokens, api_key)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl Transformer for HttpTransformer {
    async fn rewrite(&self, prompt: &str, rule: &TransformationRule) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| EtlError::service("API key is not configured"))?;

        let body = MessageRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        tracing::debug!(
            "🌐 POST {} (target '{}', model {})",
            self.endpoint,
            rule.target_id,
            self.model
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| EtlError::service(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(EtlError::service(format!(
                "service returned {}: {}",
                status,
                detail.trim()
            )));
        }

        let parsed: MessageResponse = response
            .json()
            .await
            .map_err(|e| EtlError::service(format!("malformed response: {}", e)))?;

        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        if text.is_empty() {
            return Err(EtlError::service("response contained no text content"));
        }

        Ok(text)
    }
}
