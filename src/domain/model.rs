use crate::utils::error::EtlError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 提示詞中代表原始碼的佔位符
pub const SOURCE_PLACEHOLDER: &str = "{source}";

/// 單一 target 的轉換規則
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformationRule {
    pub target_id: String,
    pub transform_enabled: bool,
    pub rewrite_template: String,
    /// 不含前導點；空字串表示保留原副檔名
    pub destination_extension: String,
    pub output_folder: String,
}

impl TransformationRule {
    /// 將原始碼填入提示詞模板
    pub fn render_prompt(&self, source_text: &str) -> String {
        self.rewrite_template.replacen(SOURCE_PLACEHOLDER, source_text, 1)
    }
}

/// 直接包含可辨識原始碼檔案的資料夾，路徑相對於掃描根目錄
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourceUnit {
    pub relative_path: PathBuf,
}

impl SourceUnit {
    pub fn new(relative_path: impl Into<PathBuf>) -> Self {
        Self {
            relative_path: relative_path.into(),
        }
    }

}

impl fmt::Display for SourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative_path.as_os_str().is_empty() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.relative_path.display())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Transform,
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// 一個 (檔案, target) 工作
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub source_path: PathBuf,
    pub target_id: String,
    pub destination_path: PathBuf,
    pub kind: JobKind,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} -> {} ({:?})",
            self.target_id,
            self.source_path.display(),
            self.destination_path.display(),
            self.kind
        )
    }
}

#[derive(Debug)]
pub struct JobFailure {
    pub job: Job,
    pub error: EtlError,
}

/// 整個 target 被略過（未知或設定錯誤）
#[derive(Debug)]
pub struct TargetFailure {
    pub target_id: String,
    pub error: EtlError,
}

/// 一次執行的彙總結果
#[derive(Debug)]
pub struct RunResult {
    pub run_id: String,
    pub succeeded: usize,
    pub failures: Vec<JobFailure>,
    pub target_failures: Vec<TargetFailure>,
    /// 掃描時無法讀取的資料夾
    pub scan_errors: Vec<EtlError>,
    pub duration: Duration,
}

impl RunResult {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            succeeded: 0,
            failures: Vec::new(),
            target_failures: Vec::new(),
            scan_errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, job: Job, error: EtlError) {
        self.failures.push(JobFailure { job, error });
    }

    pub fn record_target_failure(&mut self, target_id: impl Into<String>, error: EtlError) {
        self.target_failures.push(TargetFailure {
            target_id: target_id.into(),
            error,
        });
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn jobs_attempted(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    /// 任何 job、target 或掃描失敗都視為不成功
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.target_failures.is_empty() && self.scan_errors.is_empty()
    }

    /// 獲取執行摘要
    pub fn summary(&self) -> serde_json::Value {
        let failures: Vec<serde_json::Value> = self
            .failures
            .iter()
            .map(|f| {
                serde_json::json!({
                    "target": f.job.target_id,
                    "source": f.job.source_path.display().to_string(),
                    "destination": f.job.destination_path.display().to_string(),
                    "kind": f.job.kind,
                    "error": f.error.to_string(),
                })
            })
            .collect();

        let target_failures: Vec<serde_json::Value> = self
            .target_failures
            .iter()
            .map(|f| {
                serde_json::json!({
                    "target": f.target_id,
                    "error": f.error.to_string(),
                })
            })
            .collect();

        let scan_errors: Vec<String> = self.scan_errors.iter().map(|e| e.to_string()).collect();

        serde_json::json!({
            "run_id": self.run_id,
            "succeeded": self.succeeded,
            "failed": self.failed(),
            "jobs_attempted": self.jobs_attempted(),
            "duration_ms": self.duration.as_millis() as u64,
            "failures": failures,
            "target_failures": target_failures,
            "scan_errors": scan_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(target: &str) -> Job {
        Job {
            source_path: PathBuf::from("src/atoms/Button.jsx"),
            target_id: target.to_string(),
            destination_path: PathBuf::from("out/react/atoms/Button.tsx"),
            kind: JobKind::Transform,
        }
    }

    #[test]
    fn test_render_prompt_substitutes_once() {
        let rule = TransformationRule {
            target_id: "react".to_string(),
            transform_enabled: true,
            rewrite_template: "Convert to TypeScript:\n{source}\nKeep {source} literal".to_string(),
            destination_extension: "tsx".to_string(),
            output_folder: "react".to_string(),
        };
        let prompt = rule.render_prompt("const A = () => null;");
        assert_eq!(
            prompt,
            "Convert to TypeScript:\nconst A = () => null;\nKeep {source} literal"
        );
    }

    #[test]
    fn test_source_unit_display() {
        assert_eq!(SourceUnit::new("atoms/button").to_string(), "atoms/button");
        assert_eq!(SourceUnit::new("").to_string(), ".");
    }

    #[test]
    fn test_run_result_counts_and_summary() {
        let mut result = RunResult::new("run_test");
        result.record_success();
        result.record_success();
        result.record_failure(job("react"), EtlError::service("boom"));
        result.record_target_failure(
            "svelte",
            EtlError::UnknownTarget {
                target: "svelte".to_string(),
            },
        );

        assert_eq!(result.jobs_attempted(), 3);
        assert_eq!(result.failed(), 1);
        assert!(!result.is_success());

        let summary = result.summary();
        assert_eq!(summary["succeeded"], 2);
        assert_eq!(summary["failed"], 1);
        assert_eq!(summary["failures"][0]["target"], "react");
        assert_eq!(summary["failures"][0]["kind"], "transform");
        assert_eq!(summary["target_failures"][0]["target"], "svelte");
    }

    #[test]
    fn test_job_state_terminal() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }
}
