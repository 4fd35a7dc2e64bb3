use crate::core::classifier::{EntryClass, FileClassifier};
use crate::domain::model::SourceUnit;
use crate::utils::error::{EtlError, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// 單一資料夾的內容（已排序，子資料夾已推入工作清單）
#[derive(Debug)]
struct DirListing {
    dir: PathBuf,
    files: Vec<(PathBuf, EntryClass)>,
}

/// 以明確的工作清單走訪目錄樹，不使用遞迴。
/// 每層項目先排序，走訪順序在同一個檔案系統快照下是固定的。
struct DirWalk<'a> {
    classifier: &'a FileClassifier,
    stack: Vec<PathBuf>,
}

impl<'a> DirWalk<'a> {
    fn new(classifier: &'a FileClassifier, root: PathBuf) -> Self {
        Self {
            classifier,
            stack: vec![root],
        }
    }

    async fn next_dir(&mut self) -> Option<Result<DirListing>> {
        let dir = self.stack.pop()?;
        Some(self.read_listing(dir).await)
    }

    async fn read_listing(&mut self, dir: PathBuf) -> Result<DirListing> {
        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| EtlError::io(&dir, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| EtlError::io(&dir, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| EtlError::io(&path, e))?;

            let is_dir = if file_type.is_symlink() {
                match tokio::fs::metadata(&path).await {
                    Ok(meta) if meta.is_dir() => {
                        tracing::debug!("⏭️ Skipping symlinked directory: {}", path.display());
                        continue;
                    }
                    _ => false,
                }
            } else {
                file_type.is_dir()
            };

            entries.push((path, is_dir));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        for (path, is_dir) in entries {
            match self.classifier.classify(&path, is_dir) {
                EntryClass::Recurse => subdirs.push(path),
                class => files.push((path, class)),
            }
        }

        // 反向推入，彈出時依字母順序
        self.stack.extend(subdirs.into_iter().rev());

        Ok(DirListing { dir, files })
    }
}

/// `discover` 回傳的惰性序列
pub struct SourceUnits<'a> {
    base_root: PathBuf,
    walk: DirWalk<'a>,
}

impl SourceUnits<'_> {
    /// 下一個直接包含原始碼檔案的資料夾；走訪完畢時回傳 `None`
    pub async fn next(&mut self) -> Option<Result<SourceUnit>> {
        loop {
            let listing = match self.walk.next_dir().await? {
                Ok(listing) => listing,
                Err(e) => return Some(Err(e)),
            };

            let qualifies = listing
                .files
                .iter()
                .any(|(_, class)| *class == EntryClass::Transform);
            if !qualifies {
                continue;
            }

            let relative = listing
                .dir
                .strip_prefix(&self.base_root)
                .map(Path::to_path_buf)
                .unwrap_or_default();
            return Some(Ok(SourceUnit::new(relative)));
        }
    }
}

/// `walk_files` 回傳的惰性序列
pub struct FileWalk<'a> {
    walk: DirWalk<'a>,
    pending: VecDeque<(PathBuf, EntryClass)>,
}

impl FileWalk<'_> {
    pub async fn next(&mut self) -> Option<Result<(PathBuf, EntryClass)>> {
        loop {
            if let Some(file) = self.pending.pop_front() {
                return Some(Ok(file));
            }

            match self.walk.next_dir().await? {
                Ok(listing) => self.pending.extend(listing.files),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FolderScanner {
    classifier: FileClassifier,
}

impl FolderScanner {
    pub fn new(classifier: FileClassifier) -> Self {
        Self { classifier }
    }

    /// 每次呼叫都重新走訪檔案系統，不快取
    pub async fn discover(&self, base_root: &Path) -> Result<SourceUnits<'_>> {
        ensure_directory(base_root).await?;

        Ok(SourceUnits {
            base_root: base_root.to_path_buf(),
            walk: DirWalk::new(&self.classifier, base_root.to_path_buf()),
        })
    }

    /// 收集所有 SourceUnit；無法讀取的子資料夾只記錄並略過
    pub async fn discover_all(&self, base_root: &Path) -> Result<(Vec<SourceUnit>, Vec<EtlError>)> {
        let mut units = Vec::new();
        let mut errors = Vec::new();
        let mut sequence = self.discover(base_root).await?;

        while let Some(item) = sequence.next().await {
            match item {
                Ok(unit) => units.push(unit),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping unreadable folder: {}", e);
                    errors.push(e);
                }
            }
        }

        Ok((units, errors))
    }

    /// 走訪 `root` 之下的所有檔案（含子資料夾）
    pub fn walk_files(&self, root: &Path) -> FileWalk<'_> {
        FileWalk {
            walk: DirWalk::new(&self.classifier, root.to_path_buf()),
            pending: VecDeque::new(),
        }
    }
}

/// 根目錄必須存在且是資料夾
pub async fn ensure_directory(base_root: &Path) -> Result<()> {
    match tokio::fs::metadata(base_root).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => Err(EtlError::BaseRootMissing {
            path: base_root.to_path_buf(),
        }),
    }
}
