use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::Path;
use std::sync::Arc;

/// 非原始碼檔案的逐位元組複製
pub struct VerbatimCopier<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> Clone for VerbatimCopier<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage> VerbatimCopier<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub async fn copy(&self, source_path: &Path, destination_path: &Path) -> Result<()> {
        let data = self.storage.read_file(source_path).await?;
        self.storage.write_file(destination_path, &data).await?;
        tracing::debug!(
            "📄 Copied {} -> {}",
            source_path.display(),
            destination_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_is_byte_identical_and_idempotent() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("base/atoms/logo.png");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        let bytes: Vec<u8> = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x00, 0xff];
        std::fs::write(&source, &bytes).unwrap();

        let copier = VerbatimCopier::new(Arc::new(LocalStorage::default()));
        let destination = temp.path().join("out/react/atoms/logo.png");

        copier.copy(&source, &destination).await.unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), bytes);

        copier.copy(&source, &destination).await.unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_copy_missing_source_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let copier = VerbatimCopier::new(Arc::new(LocalStorage::default()));
        let destination = temp.path().join("out/missing.css");

        let result = copier
            .copy(&temp.path().join("missing.css"), &destination)
            .await;
        assert!(result.is_err());
        assert!(!destination.exists());
    }
}
