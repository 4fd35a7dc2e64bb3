use crate::domain::model::TransformationRule;
use crate::utils::error::{EtlError, Result};
use std::path::{Path, PathBuf};

/// 計算 `source_path` 在某個 target 輸出樹中的位置。純函式，不做 I/O。
///
/// 可辨識的原始碼檔會換成 `rule.destination_extension`（空字串則保留原副檔名），
/// 其他檔案維持原名。
pub fn map_path(
    source_path: &Path,
    base_root: &Path,
    target_output_folder: &Path,
    rule: &TransformationRule,
    is_recognized_source: bool,
) -> Result<PathBuf> {
    let relative = source_path
        .strip_prefix(base_root)
        .map_err(|_| EtlError::ConfigError {
            message: format!(
                "{} is not under base root {}",
                source_path.display(),
                base_root.display()
            ),
        })?;

    let mut destination = target_output_folder.join(relative);

    if is_recognized_source && !rule.destination_extension.is_empty() {
        destination.set_extension(&rule.destination_extension);
    }

    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(ext: &str) -> TransformationRule {
        TransformationRule {
            target_id: "react".to_string(),
            transform_enabled: true,
            rewrite_template: "{source}".to_string(),
            destination_extension: ext.to_string(),
            output_folder: "react".to_string(),
        }
    }

    #[test]
    fn test_source_file_gets_target_extension() {
        let dest = map_path(
            Path::new("src/components/atoms/Button.jsx"),
            Path::new("src/components"),
            Path::new("out/react"),
            &rule("tsx"),
            true,
        )
        .unwrap();
        assert_eq!(dest, PathBuf::from("out/react/atoms/Button.tsx"));
    }

    #[test]
    fn test_other_file_keeps_extension() {
        let dest = map_path(
            Path::new("src/components/atoms/Button.css"),
            Path::new("src/components"),
            Path::new("out/react"),
            &rule("tsx"),
            false,
        )
        .unwrap();
        assert_eq!(dest, PathBuf::from("out/react/atoms/Button.css"));
    }

    #[test]
    fn test_only_last_extension_is_replaced() {
        let dest = map_path(
            Path::new("base/Button.stories.jsx"),
            Path::new("base"),
            Path::new("out/vue"),
            &rule("vue"),
            true,
        )
        .unwrap();
        assert_eq!(dest, PathBuf::from("out/vue/Button.stories.vue"));
    }

    #[test]
    fn test_empty_destination_extension_keeps_original() {
        let dest = map_path(
            Path::new("base/atoms/Button.jsx"),
            Path::new("base"),
            Path::new("out/copy"),
            &rule(""),
            true,
        )
        .unwrap();
        assert_eq!(dest, PathBuf::from("out/copy/atoms/Button.jsx"));
    }

    #[test]
    fn test_source_outside_base_root_fails() {
        let result = map_path(
            Path::new("elsewhere/Button.jsx"),
            Path::new("base"),
            Path::new("out/react"),
            &rule("tsx"),
            true,
        );
        assert!(result.is_err());
    }
}
