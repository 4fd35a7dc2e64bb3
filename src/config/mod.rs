pub mod rules;

#[cfg(feature = "cli")]
pub use cli_config::CliConfig;

#[cfg(feature = "cli")]
mod cli_config {
    use crate::adapters::http::{
        DEFAULT_API_KEY_ENV, DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    };
    use crate::domain::ports::ConfigProvider;
    use crate::utils::error::Result;
    use crate::utils::validation::{
        validate_extensions, validate_non_empty_string, validate_path, validate_positive_number,
        validate_url, Validate,
    };
    use clap::Parser;
    use serde::{Deserialize, Serialize};
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    #[derive(Debug, Clone, Serialize, Deserialize, Parser)]
    #[command(name = "component-etl")]
    #[command(about = "Rewrite a component source tree into one output tree per target")]
    pub struct CliConfig {
        /// 掃描的根目錄
        #[arg(long, default_value = "src/components")]
        pub base: PathBuf,

        #[arg(long, default_value = "./output")]
        pub out: PathBuf,

        /// 逗號分隔；未指定時處理所有設定過的 target
        #[arg(long, value_delimiter = ',')]
        pub target: Vec<String>,

        /// target 規則檔（JSON，副檔名為 .toml 時以 TOML 解析）
        #[arg(long, default_value = "component-targets.json")]
        pub config: PathBuf,

        #[arg(long, value_delimiter = ',', default_values = ["jsx", "tsx"])]
        pub source_ext: Vec<String>,

        #[arg(long, default_value = "5")]
        pub concurrent_requests: usize,

        #[arg(long, default_value = "64")]
        pub copy_concurrency: usize,

        #[arg(long, default_value = "120")]
        pub timeout_seconds: u64,

        #[arg(long, default_value = DEFAULT_ENDPOINT)]
        pub endpoint: String,

        #[arg(long, default_value = DEFAULT_MODEL)]
        pub model: String,

        #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
        pub max_tokens: u32,

        /// 存放 API 金鑰的環境變數名稱
        #[arg(long, default_value = DEFAULT_API_KEY_ENV)]
        pub api_key_env: String,

        #[arg(long, help = "Plan jobs without writing any output")]
        pub dry_run: bool,

        #[arg(long, help = "Emit JSON logs and a JSON summary")]
        pub json: bool,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Enable system monitoring (CPU, memory usage)")]
        pub monitor: bool,
    }

    impl ConfigProvider for CliConfig {
        fn base_path(&self) -> &Path {
            &self.base
        }

        fn output_path(&self) -> &Path {
            &self.out
        }

        fn requested_targets(&self) -> &[String] {
            &self.target
        }

        fn source_extensions(&self) -> &[String] {
            &self.source_ext
        }

        fn concurrent_requests(&self) -> usize {
            self.concurrent_requests
        }

        fn copy_concurrency(&self) -> usize {
            self.copy_concurrency
        }

        fn request_timeout(&self) -> Duration {
            Duration::from_secs(self.timeout_seconds)
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validate_path("base", &self.base.to_string_lossy())?;
            validate_path("out", &self.out.to_string_lossy())?;
            validate_path("config", &self.config.to_string_lossy())?;
            validate_extensions("source_ext", &self.source_ext)?;
            validate_positive_number("concurrent_requests", self.concurrent_requests, 1)?;
            validate_positive_number("copy_concurrency", self.copy_concurrency, 1)?;
            validate_positive_number("timeout_seconds", self.timeout_seconds as usize, 1)?;
            validate_positive_number("max_tokens", self.max_tokens as usize, 1)?;
            validate_url("endpoint", &self.endpoint)?;
            validate_non_empty_string("model", &self.model)?;
            validate_non_empty_string("api_key_env", &self.api_key_env)?;
            Ok(())
        }
    }

}
