use crate::domain::model::TransformationRule;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// 目的地檔案系統
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &Path) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// 建立缺少的上層資料夾後寫入；失敗時不可留下部分內容
    fn write_file(
        &self,
        path: &Path,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 外部改寫服務
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn rewrite(&self, prompt: &str, rule: &TransformationRule) -> Result<String>;
}

pub trait ConfigProvider: Send + Sync {
    fn base_path(&self) -> &Path;
    fn output_path(&self) -> &Path;
    fn requested_targets(&self) -> &[String];
    fn source_extensions(&self) -> &[String];
    fn concurrent_requests(&self) -> usize;
    fn copy_concurrency(&self) -> usize;
    fn request_timeout(&self) -> Duration;
}
