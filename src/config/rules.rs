use crate::domain::model::{TransformationRule, SOURCE_PLACEHOLDER};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_relative_folder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// 規則檔中的單一 target（尚未驗證）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRule {
    #[serde(default)]
    pub transform: bool,
    pub prompt: Option<String>,
    #[serde(alias = "destination_extension")]
    pub destination_extension: Option<String>,
    #[serde(alias = "out_folder")]
    pub out_folder: Option<String>,
}

/// target id -> 規則，原樣對應規則檔
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRuleConfig(pub BTreeMap<String, RawRule>);

impl RawRuleConfig {
    /// 依副檔名載入：`.toml` 用 TOML，其餘當作 JSON
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| EtlError::io(path, e))?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content)?;
        Ok(serde_json::from_str(&processed)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content)?;
        toml::from_str(&processed).map_err(|e| EtlError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn insert(&mut self, target_id: impl Into<String>, rule: RawRule) {
        self.0.insert(target_id.into(), rule);
    }
}

/// 替換環境變數 (例如 ${API_BASE})，未設定的保留原樣
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| {
        EtlError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        }
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.into_owned())
}

/// 已驗證的規則表。載入後唯讀，可在所有 job 之間共用。
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<String, TransformationRule>,
    rejected: BTreeMap<String, String>,
}

impl RuleRegistry {
    /// 嚴格驗證：任何一條規則有問題就整體失敗
    pub fn validate(raw: &RawRuleConfig) -> Result<Self> {
        if raw.0.is_empty() {
            return Err(EtlError::ConfigError {
                message: "No targets configured".to_string(),
            });
        }

        let mut rules = BTreeMap::new();
        for (target_id, raw_rule) in &raw.0 {
            let rule = validate_rule(target_id, raw_rule)?;
            rules.insert(target_id.clone(), rule);
        }

        Ok(Self {
            rules,
            rejected: BTreeMap::new(),
        })
    }

    /// 寬鬆載入：不合法的規則只會讓該 target 在 resolve 時失敗
    pub fn partition(raw: &RawRuleConfig) -> Self {
        let mut registry = Self::default();

        for (target_id, raw_rule) in &raw.0 {
            match validate_rule(target_id, raw_rule) {
                Ok(rule) => {
                    registry.rules.insert(target_id.clone(), rule);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Rule for target '{}' rejected: {}", target_id, e);
                    let reason = match e {
                        EtlError::InvalidConfig { message, .. } => message,
                        other => other.to_string(),
                    };
                    registry.rejected.insert(target_id.clone(), reason);
                }
            }
        }

        registry
    }

    pub fn from_rules(rules: impl IntoIterator<Item = TransformationRule>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|rule| (rule.target_id.clone(), rule))
                .collect(),
            rejected: BTreeMap::new(),
        }
    }

    pub fn resolve(&self, target_id: &str) -> Result<&TransformationRule> {
        if let Some(rule) = self.rules.get(target_id) {
            return Ok(rule);
        }

        match self.rejected.get(target_id) {
            Some(reason) => Err(EtlError::InvalidConfig {
                target: target_id.to_string(),
                message: reason.clone(),
            }),
            None => Err(EtlError::UnknownTarget {
                target: target_id.to_string(),
            }),
        }
    }

    /// 所有設定過的 target（包含被拒絕的），已排序
    pub fn target_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .rules
            .keys()
            .chain(self.rejected.keys())
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn invalid(target_id: &str, message: impl Into<String>) -> EtlError {
    EtlError::InvalidConfig {
        target: target_id.to_string(),
        message: message.into(),
    }
}

pub fn validate_rule(target_id: &str, raw: &RawRule) -> Result<TransformationRule> {
    if target_id.trim().is_empty() {
        return Err(invalid(target_id, "target id cannot be empty"));
    }

    let output_folder = match raw.out_folder.as_deref().map(str::trim) {
        Some(folder) if !folder.is_empty() => folder.to_string(),
        _ => return Err(invalid(target_id, "outFolder is required")),
    };
    validate_relative_folder("outFolder", &output_folder)
        .map_err(|e| invalid(target_id, e.to_string()))?;

    // `./react`、`react/` 與 `react` 是同一個輸出資料夾
    let output_folder = Path::new(&output_folder)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect::<PathBuf>()
        .to_string_lossy()
        .into_owned();

    let destination_extension = raw
        .destination_extension
        .as_deref()
        .map(|ext| ext.trim().trim_start_matches('.').to_string())
        .unwrap_or_default();

    if destination_extension.contains(['/', '\\']) {
        return Err(invalid(
            target_id,
            format!("destinationExtension '{}' is not a bare extension", destination_extension),
        ));
    }

    let rewrite_template = raw.prompt.clone().unwrap_or_default();

    if raw.transform {
        if destination_extension.is_empty() {
            return Err(invalid(
                target_id,
                "destinationExtension is required when transform is true",
            ));
        }

        let placeholders = rewrite_template.matches(SOURCE_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(invalid(
                target_id,
                format!(
                    "prompt must contain exactly one {} placeholder, found {}",
                    SOURCE_PLACEHOLDER, placeholders
                ),
            ));
        }
    }

    Ok(TransformationRule {
        target_id: target_id.to_string(),
        transform_enabled: raw.transform,
        rewrite_template,
        destination_extension,
        output_folder,
    })
}
