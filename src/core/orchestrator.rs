use crate::config::rules::RuleRegistry;
use crate::core::classifier::{EntryClass, FileClassifier, DEFAULT_SOURCE_EXTENSIONS};
use crate::core::copier::VerbatimCopier;
use crate::core::invoker::{TransformInvoker, DEFAULT_CONCURRENT_REQUESTS, DEFAULT_REQUEST_TIMEOUT};
use crate::core::mapper::map_path;
use crate::core::scanner::{ensure_directory, FolderScanner};
use crate::domain::model::{
    Job, JobFailure, JobKind, JobState, RunResult, SourceUnit, TargetFailure, TransformationRule,
};
use crate::domain::ports::{ConfigProvider, Storage, Transformer};
use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::SystemMonitor;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

pub const DEFAULT_COPY_CONCURRENCY: usize = 64;

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub concurrent_requests: usize,
    pub copy_concurrency: usize,
    pub request_timeout: Duration,
    pub source_extensions: Vec<String>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            concurrent_requests: DEFAULT_CONCURRENT_REQUESTS,
            copy_concurrency: DEFAULT_COPY_CONCURRENCY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            source_extensions: DEFAULT_SOURCE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl OrchestratorOptions {
    pub fn from_provider<C: ConfigProvider>(config: &C) -> Self {
        Self {
            concurrent_requests: config.concurrent_requests(),
            copy_concurrency: config.copy_concurrency(),
            request_timeout: config.request_timeout(),
            source_extensions: config.source_extensions().to_vec(),
        }
    }
}

/// 探索與對應階段的結果，尚未做任何寫入
#[derive(Debug, Default)]
pub struct JobPlan {
    pub units: Vec<SourceUnit>,
    pub targets: Vec<String>,
    pub jobs: Vec<Job>,
    /// 目的地與先前的 job 衝突，不會執行
    pub rejected: Vec<JobFailure>,
    pub target_failures: Vec<TargetFailure>,
    pub scan_errors: Vec<EtlError>,
}

impl JobPlan {
    pub fn jobs_for<'a>(&'a self, target_id: &'a str) -> impl Iterator<Item = &'a Job> + 'a {
        self.jobs.iter().filter(move |job| job.target_id == target_id)
    }

    pub fn summary(&self) -> serde_json::Value {
        let mut per_target: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for target in &self.targets {
            per_target.insert(target.as_str(), (0, 0));
        }
        for job in &self.jobs {
            let counts = per_target.entry(job.target_id.as_str()).or_insert((0, 0));
            match job.kind {
                JobKind::Transform => counts.0 += 1,
                JobKind::Copy => counts.1 += 1,
            }
        }

        let targets: serde_json::Map<String, serde_json::Value> = per_target
            .into_iter()
            .map(|(target, (transform, copy))| {
                (
                    target.to_string(),
                    serde_json::json!({ "transform": transform, "copy": copy }),
                )
            })
            .collect();

        serde_json::json!({
            "units": self.units.iter().map(|u| u.to_string()).collect::<Vec<_>>(),
            "targets": targets,
            "jobs": self.jobs.len(),
            "collisions": self.rejected.len(),
            "target_failures": self
                .target_failures
                .iter()
                .map(|f| serde_json::json!({ "target": f.target_id, "error": f.error.to_string() }))
                .collect::<Vec<_>>(),
            "scan_errors": self.scan_errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
        })
    }
}

/// 規劃 (資料夾 × target) 工作並併發執行，彙總每個 job 的結果
pub struct Orchestrator<S: Storage + 'static> {
    registry: Arc<RuleRegistry>,
    scanner: FolderScanner,
    invoker: TransformInvoker,
    storage: Arc<S>,
    copier: VerbatimCopier<S>,
    io_permits: Arc<Semaphore>,
    monitor: SystemMonitor,
}

impl<S: Storage + 'static> Orchestrator<S> {
    pub fn new(
        registry: Arc<RuleRegistry>,
        transformer: Arc<dyn Transformer>,
        storage: Arc<S>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            registry,
            scanner: FolderScanner::new(FileClassifier::new(&options.source_extensions)),
            invoker: TransformInvoker::new(
                transformer,
                options.concurrent_requests,
                options.request_timeout,
            ),
            copier: VerbatimCopier::new(Arc::clone(&storage)),
            storage,
            io_permits: Arc::new(Semaphore::new(options.copy_concurrency.max(1))),
            monitor: SystemMonitor::new(false),
        }
    }

    /// 啟用或禁用系統監控
    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        self
    }

    /// 空的 `target_ids` 代表全部設定過的 target；重複的只保留第一個
    fn requested_targets(&self, target_ids: &[String]) -> Vec<String> {
        let requested = if target_ids.is_empty() {
            self.registry.target_ids()
        } else {
            target_ids.to_vec()
        };

        let mut seen = Vec::with_capacity(requested.len());
        for id in requested {
            let id = id.trim().to_string();
            if !id.is_empty() && !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }

    pub async fn plan(
        &self,
        base_root: &Path,
        out_root: &Path,
        target_ids: &[String],
    ) -> Result<JobPlan> {
        ensure_directory(base_root).await?;

        let mut plan = JobPlan::default();

        let mut rules: Vec<&TransformationRule> = Vec::new();
        for target_id in self.requested_targets(target_ids) {
            match self.registry.resolve(&target_id) {
                Ok(rule) => {
                    plan.targets.push(target_id);
                    rules.push(rule);
                }
                Err(e) => {
                    tracing::warn!("⏭️ Skipping target '{}': {}", target_id, e);
                    plan.target_failures.push(TargetFailure { target_id, error: e });
                }
            }
        }

        // 無法讀取的資料夾由下面的完整走訪回報，這裡只取 unit
        let (units, _) = self.scanner.discover_all(base_root).await?;
        tracing::info!(
            "🔍 Discovered {} source unit(s) under {}",
            units.len(),
            base_root.display()
        );
        plan.units = units;

        // unit 之外的檔案（共用樣式、根目錄的 index 等）同樣要鏡像到每個 target
        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
        let mut files = self.scanner.walk_files(base_root);
        while let Some(item) = files.next().await {
            let (source_path, class) = match item {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!("⚠️ Skipping unreadable folder: {}", e);
                    plan.scan_errors.push(e);
                    continue;
                }
            };

            let is_source = class == EntryClass::Transform;
            let kind = if is_source {
                JobKind::Transform
            } else {
                JobKind::Copy
            };

            for rule in &rules {
                let target_root = out_root.join(&rule.output_folder);
                let destination_path =
                    match map_path(&source_path, base_root, &target_root, rule, is_source) {
                        Ok(path) => path,
                        Err(e) => {
                            plan.scan_errors.push(e);
                            continue;
                        }
                    };

                let job = Job {
                    source_path: source_path.clone(),
                    target_id: rule.target_id.clone(),
                    destination_path,
                    kind,
                };

                if let Some(first) = claimed.get(&job.destination_path) {
                    let error = EtlError::DestinationCollision {
                        destination: job.destination_path.clone(),
                        claimed_by: first.clone(),
                    };
                    tracing::error!(
                        source = %job.source_path.display(),
                        target_id = %job.target_id,
                        destination = %job.destination_path.display(),
                        "❌ {}",
                        error
                    );
                    plan.rejected.push(JobFailure { job, error });
                    continue;
                }

                claimed.insert(job.destination_path.clone(), job.source_path.clone());
                tracing::trace!(state = ?JobState::Pending, "🗂️ Planned {}", job);
                plan.jobs.push(job);
            }
        }

        Ok(plan)
    }

    /// 執行整個流程。只有 `BaseRootMissing` 會讓整次執行失敗，
    /// 其餘錯誤都記錄在 `RunResult` 中。
    pub async fn run(
        &self,
        base_root: &Path,
        out_root: &Path,
        target_ids: &[String],
    ) -> Result<RunResult> {
        let started = Instant::now();
        let mut result = RunResult::new(format!(
            "run_{}",
            chrono::Utc::now().format("%Y%m%d_%H%M%S")
        ));

        self.monitor.log_stats("Run started");

        let plan = self.plan(base_root, out_root, target_ids).await?;
        tracing::info!(
            "🎬 Executing {} job(s) across {} target(s)",
            plan.jobs.len(),
            plan.targets.len()
        );
        self.monitor.log_stats("Planning completed");

        for failure in plan.target_failures {
            result.record_target_failure(failure.target_id, failure.error);
        }
        result.scan_errors = plan.scan_errors;
        for failure in plan.rejected {
            result.record_failure(failure.job, failure.error);
        }

        // 全部先派發，再逐一等待；任何一個失敗都不會中斷其他 job
        let handles: Vec<(Job, JoinHandle<Result<()>>)> = plan
            .jobs
            .into_iter()
            .map(|job| {
                let handle = self.spawn_job(job.clone());
                (job, handle)
            })
            .collect();

        for (job, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(EtlError::TaskError {
                    message: e.to_string(),
                }),
            };

            match outcome {
                Ok(()) => {
                    tracing::debug!(state = ?JobState::Succeeded, "✅ {}", job);
                    result.record_success();
                }
                Err(e) => {
                    tracing::error!(
                        state = ?JobState::Failed,
                        source = %job.source_path.display(),
                        target_id = %job.target_id,
                        destination = %job.destination_path.display(),
                        "❌ Job failed: {}",
                        e
                    );
                    result.record_failure(job, e);
                }
            }
        }

        result.duration = started.elapsed();
        self.monitor.log_final_stats();

        tracing::info!(
            "🏁 Run {} finished: {} succeeded, {} failed, {} target(s) skipped in {:?}",
            result.run_id,
            result.succeeded,
            result.failed(),
            result.target_failures.len(),
            result.duration
        );

        Ok(result)
    }

    fn spawn_job(&self, job: Job) -> JoinHandle<Result<()>> {
        let registry = Arc::clone(&self.registry);
        let invoker = self.invoker.clone();
        let copier = self.copier.clone();
        let storage = Arc::clone(&self.storage);
        let io_permits = Arc::clone(&self.io_permits);

        tokio::spawn(async move {
            tracing::trace!(state = ?JobState::Running, "▶️ {}", job);

            match job.kind {
                JobKind::Copy => {
                    let _permit = acquire(&io_permits).await?;
                    copier.copy(&job.source_path, &job.destination_path).await
                }
                JobKind::Transform => {
                    let rule = registry.resolve(&job.target_id)?;

                    // 停用轉換時原樣寫出位元組，不做 UTF-8 解碼
                    if !rule.transform_enabled {
                        let _permit = acquire(&io_permits).await?;
                        return copier.copy(&job.source_path, &job.destination_path).await;
                    }

                    let bytes = {
                        let _permit = acquire(&io_permits).await?;
                        storage.read_file(&job.source_path).await?
                    };
                    let source_text = String::from_utf8(bytes).map_err(|e| {
                        EtlError::io(
                            &job.source_path,
                            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                        )
                    })?;

                    let output = invoker.invoke(&source_text, rule).await?;

                    let _permit = acquire(&io_permits).await?;
                    storage
                        .write_file(&job.destination_path, output.as_bytes())
                        .await
                }
            }
        })
    }
}

async fn acquire(permits: &Semaphore) -> Result<tokio::sync::SemaphorePermit<'_>> {
    permits.acquire().await.map_err(|_| EtlError::TaskError {
        message: "I/O permit pool is closed".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct UpperTransformer;

    #[async_trait]
    impl Transformer for UpperTransformer {
        async fn rewrite(&self, prompt: &str, _rule: &TransformationRule) -> Result<String> {
            Ok(prompt.to_uppercase())
        }
    }

    fn rule(target: &str, enabled: bool, ext: &str, folder: &str) -> TransformationRule {
        TransformationRule {
            target_id: target.to_string(),
            transform_enabled: enabled,
            rewrite_template: "{source}".to_string(),
            destination_extension: ext.to_string(),
            output_folder: folder.to_string(),
        }
    }

    fn touch(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn orchestrator(rules: Vec<TransformationRule>) -> Orchestrator<LocalStorage> {
        Orchestrator::new(
            Arc::new(RuleRegistry::from_rules(rules)),
            Arc::new(UpperTransformer),
            Arc::new(LocalStorage::default()),
            OrchestratorOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_plan_mirrors_whole_tree_per_target() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        touch(&base, "atoms/Button.jsx", "b");
        touch(&base, "atoms/Button.css", "c");
        touch(&base, "atoms/icons/close.svg", "s");
        touch(&base, "loose/notes.txt", "n");

        let orch = orchestrator(vec![
            rule("react", true, "tsx", "react"),
            rule("vanilla", false, "js", "vanilla"),
        ]);
        let out = temp.path().join("out");
        let plan = orch.plan(&base, &out, &[]).await.unwrap();

        assert_eq!(plan.units, vec![SourceUnit::new("atoms")]);
        assert_eq!(plan.targets, vec!["react", "vanilla"]);
        assert_eq!(plan.jobs.len(), 8);
        assert!(plan.rejected.is_empty());

        let react: Vec<PathBuf> = plan
            .jobs_for("react")
            .map(|job| job.destination_path.strip_prefix(&out).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            react,
            vec![
                PathBuf::from("react/atoms/Button.css"),
                PathBuf::from("react/atoms/Button.tsx"),
                PathBuf::from("react/atoms/icons/close.svg"),
                PathBuf::from("react/loose/notes.txt"),
            ]
        );

        let summary = plan.summary();
        assert_eq!(summary["targets"]["react"]["transform"], 1);
        assert_eq!(summary["targets"]["react"]["copy"], 3);
        assert_eq!(summary["jobs"], 8);
    }

    #[tokio::test]
    async fn test_files_outside_units_are_copied_to_every_target() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        touch(&base, "atoms/Button.jsx", "button");
        touch(&base, "styles/theme.css", ":root { --accent: red; }");
        touch(&base, "index.js", "export * from './atoms/Button';");

        let orch = orchestrator(vec![
            rule("react", true, "tsx", "react"),
            rule("vanilla", false, "js", "vanilla"),
        ]);
        let out = temp.path().join("out");
        let result = orch.run(&base, &out, &[]).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.succeeded, 6);
        for target in ["react", "vanilla"] {
            assert_eq!(
                std::fs::read_to_string(out.join(target).join("styles/theme.css")).unwrap(),
                ":root { --accent: red; }"
            );
            assert_eq!(
                std::fs::read_to_string(out.join(target).join("index.js")).unwrap(),
                "export * from './atoms/Button';"
            );
        }
    }

    #[tokio::test]
    async fn test_nested_units_do_not_duplicate_jobs() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        touch(&base, "molecules/Card.jsx", "card");
        touch(&base, "molecules/Accordion/Accordion.jsx", "acc");

        let orch = orchestrator(vec![rule("react", true, "tsx", "react")]);
        let plan = orch
            .plan(&base, &temp.path().join("out"), &[])
            .await
            .unwrap();

        assert_eq!(
            plan.units,
            vec![
                SourceUnit::new("molecules"),
                SourceUnit::new("molecules/Accordion"),
            ]
        );
        assert_eq!(plan.jobs.len(), 2);
    }

    #[tokio::test]
    async fn test_destination_collision_is_rejected() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        touch(&base, "atoms/Button.jsx", "jsx");
        touch(&base, "atoms/Button.tsx", "tsx");

        let orch = orchestrator(vec![rule("react", true, "tsx", "react")]);
        let out = temp.path().join("out");
        let plan = orch.plan(&base, &out, &[]).await.unwrap();

        assert_eq!(plan.jobs.len(), 1);
        assert_eq!(plan.jobs[0].source_path, base.join("atoms/Button.jsx"));
        assert_eq!(plan.rejected.len(), 1);
        assert!(matches!(
            plan.rejected[0].error,
            EtlError::DestinationCollision { .. }
        ));

        let result = orch.run(&base, &out, &[]).await.unwrap();
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed(), 1);
        assert_eq!(
            std::fs::read_to_string(out.join("react/atoms/Button.tsx")).unwrap(),
            "JSX"
        );
    }

    #[tokio::test]
    async fn test_duplicate_requested_targets_run_once() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        touch(&base, "atoms/Button.jsx", "b");

        let orch = orchestrator(vec![rule("react", true, "tsx", "react")]);
        let targets = vec!["react".to_string(), " react".to_string()];
        let result = orch
            .run(&base, &temp.path().join("out"), &targets)
            .await
            .unwrap();

        assert_eq!(result.succeeded, 1);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_run_writes_transformed_output() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        touch(&base, "atoms/Button.jsx", "const button = 1;");

        let orch = orchestrator(vec![rule("react", true, "tsx", "react")]);
        let out = temp.path().join("out");
        let result = orch.run(&base, &out, &[]).await.unwrap();

        assert!(result.is_success());
        assert!(result.run_id.starts_with("run_"));
        assert_eq!(
            std::fs::read_to_string(out.join("react/atoms/Button.tsx")).unwrap(),
            "CONST BUTTON = 1;"
        );
    }

    #[tokio::test]
    async fn test_non_utf8_source_fails_only_its_transform_job() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        touch(&base, "atoms/Good.jsx", "ok");
        let bad = base.join("atoms/Bad.jsx");
        std::fs::write(&bad, [0xff, 0xfe, 0x00]).unwrap();

        let orch = orchestrator(vec![rule("react", true, "tsx", "react")]);
        let out = temp.path().join("out");
        let result = orch.run(&base, &out, &[]).await.unwrap();

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed(), 1);
        assert_eq!(result.failures[0].job.source_path, bad);
        assert!(!out.join("react/atoms/Bad.tsx").exists());
    }

    #[tokio::test]
    async fn test_disabled_target_copies_non_utf8_source_bytes() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        let bytes: &[u8] = b"// caf\xe9\nexport const A = 1;\n";
        std::fs::create_dir_all(base.join("atoms")).unwrap();
        std::fs::write(base.join("atoms/A.jsx"), bytes).unwrap();

        let orch = orchestrator(vec![rule("vanilla", false, "js", "vanilla")]);
        let out = temp.path().join("out");
        let result = orch.run(&base, &out, &[]).await.unwrap();

        assert!(result.is_success());
        assert_eq!(std::fs::read(out.join("vanilla/atoms/A.js")).unwrap(), bytes);
    }
}
