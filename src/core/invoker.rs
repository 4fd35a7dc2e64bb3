use crate::domain::model::TransformationRule;
use crate::domain::ports::Transformer;
use crate::utils::error::{EtlError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub const DEFAULT_CONCURRENT_REQUESTS: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// 對單一 (檔案, target) 呼叫改寫服務。
///
/// 規則停用轉換時直接回傳原文，不呼叫服務。其餘情況先組出提示詞，
/// 取得 semaphore 許可後送出，並以逾時限制等待時間。不重試，也不寫檔。
#[derive(Clone)]
pub struct TransformInvoker {
    transformer: Arc<dyn Transformer>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl TransformInvoker {
    pub fn new(transformer: Arc<dyn Transformer>, max_in_flight: usize, timeout: Duration) -> Self {
        Self {
            transformer,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            timeout,
        }
    }

    pub fn with_defaults(transformer: Arc<dyn Transformer>) -> Self {
        Self::new(
            transformer,
            DEFAULT_CONCURRENT_REQUESTS,
            DEFAULT_REQUEST_TIMEOUT,
        )
    }

    pub async fn invoke(&self, source_text: &str, rule: &TransformationRule) -> Result<String> {
        if !rule.transform_enabled {
            return Ok(source_text.to_string());
        }

        let prompt = rule.render_prompt(source_text);

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| EtlError::service("transformer request pool is closed"))?;

        tracing::debug!(
            "📡 Sending {} byte prompt for target '{}'",
            prompt.len(),
            rule.target_id
        );

        match tokio::time::timeout(self.timeout, self.transformer.rewrite(&prompt, rule)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e @ EtlError::ServiceError { .. })) => Err(e),
            Ok(Err(e)) => Err(EtlError::service(e.to_string())),
            Err(_) => Err(EtlError::service(format!(
                "request for target '{}' timed out after {:?}",
                rule.target_id, self.timeout
            ))),
        }
    }
}
