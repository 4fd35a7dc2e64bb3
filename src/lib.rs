pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{HttpTransformer, LocalStorage};
pub use config::rules::{RawRuleConfig, RuleRegistry};
pub use core::{JobPlan, Orchestrator, OrchestratorOptions};
pub use domain::model::{Job, JobKind, RunResult, SourceUnit, TransformationRule};
pub use utils::error::{EtlError, Result};
