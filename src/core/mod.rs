pub mod classifier;
pub mod copier;
pub mod invoker;
pub mod mapper;
pub mod orchestrator;
pub mod scanner;

pub use crate::domain::model::{Job, JobKind, RunResult, SourceUnit, TransformationRule};
pub use crate::domain::ports::{ConfigProvider, Storage, Transformer};
pub use crate::utils::error::Result;
pub use orchestrator::{JobPlan, Orchestrator, OrchestratorOptions};
