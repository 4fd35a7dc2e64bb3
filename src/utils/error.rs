use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Base root does not exist or is not a directory: {}", .path.display())]
    BaseRootMissing { path: PathBuf },

    #[error("Unknown target: {target}")]
    UnknownTarget { target: String },

    #[error("Invalid configuration for target '{target}': {message}")]
    InvalidConfig { target: String, message: String },

    #[error("Transformer service error: {message}")]
    ServiceError { message: String },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination {} already claimed by {}", .destination.display(), .claimed_by.display())]
    DestinationCollision {
        destination: PathBuf,
        claimed_by: PathBuf,
    },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Job task failed: {message}")]
    TaskError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Filesystem,
    Configuration,
    Service,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    /// 以路徑包裝 IO 錯誤
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::ServiceError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::BaseRootMissing { .. } | Self::Io { .. } | Self::DestinationCollision { .. } => {
                ErrorCategory::Filesystem
            }
            Self::UnknownTarget { .. }
            | Self::InvalidConfig { .. }
            | Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::ServiceError { .. } | Self::ApiError(_) => ErrorCategory::Service,
            Self::SerializationError(_) | Self::TaskError { .. } => ErrorCategory::Internal,
        }
    }

    /// 嚴重程度決定 CLI 的退出碼
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ServiceError { .. } | Self::ApiError(_) => ErrorSeverity::Medium,
            Self::Io { .. } | Self::DestinationCollision { .. } | Self::UnknownTarget { .. } => {
                ErrorSeverity::High
            }
            Self::InvalidConfig { .. }
            | Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::SerializationError(_) => ErrorSeverity::High,
            Self::BaseRootMissing { .. } | Self::TaskError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::BaseRootMissing { path } => format!(
                "Check that --base points at an existing components directory ({})",
                path.display()
            ),
            Self::UnknownTarget { target } => format!(
                "Add a rule for '{}' to the rules file or drop it from --target",
                target
            ),
            Self::InvalidConfig { target, .. } => format!(
                "Fix the rule for '{}': it needs outFolder, and destinationExtension plus a single {{source}} prompt placeholder when transform is true",
                target
            ),
            Self::ServiceError { .. } | Self::ApiError(_) => {
                "Check the API key, endpoint and rate limits, then rerun".to_string()
            }
            Self::Io { path, .. } => format!(
                "Check permissions and free space for {}",
                path.display()
            ),
            Self::DestinationCollision { .. } => {
                "Rename one of the colliding sources or give the target a different destinationExtension".to_string()
            }
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => {
                "Review the command-line flags and the rules file".to_string()
            }
            Self::SerializationError(_) => "Make sure the rules file is valid JSON or TOML".to_string(),
            Self::TaskError { .. } => "Rerun with --verbose and report the failing job".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Filesystem => format!("File system problem: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Service => format!("Transformer service problem: {}", self),
            ErrorCategory::Internal => format!("Internal error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
