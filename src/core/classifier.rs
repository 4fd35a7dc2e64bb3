use std::path::Path;

pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["jsx", "tsx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryClass {
    Recurse,
    Transform,
    CopyVerbatim,
}

/// 決定目錄項目要遞迴、轉換或原樣複製
#[derive(Debug, Clone)]
pub struct FileClassifier {
    extensions: Vec<String>,
}

impl FileClassifier {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn is_recognized_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }

    /// 符號連結指向的資料夾由呼叫端決定是否當成資料夾
    pub fn classify(&self, path: &Path, is_dir: bool) -> EntryClass {
        if is_dir {
            EntryClass::Recurse
        } else if self.is_recognized_source(path) {
            EntryClass::Transform
        } else {
            EntryClass::CopyVerbatim
        }
    }
}

impl Default for FileClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_EXTENSIONS)
    }
}
