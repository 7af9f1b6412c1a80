use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::services::ServiceError;

/// Object store for rendered documents, addressed by relative key.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `key`. The object is either fully written or absent.
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), ServiceError>;
    async fn download(&self, key: &str) -> Result<Vec<u8>, ServiceError>;
    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), ServiceError>;
}

/// Archive key of an invoice PDF.
pub fn invoice_pdf_key(user_id: i64, invoice_id: i64) -> String {
    format!("invoices/{}/{}.pdf", user_id, invoice_id)
}

fn storage_error(action: &str, key: &str, err: impl std::fmt::Display) -> ServiceError {
    ServiceError::Internal(anyhow::anyhow!("Failed to {} {}: {}", action, key, err))
}

/// Removes a temporary file on drop unless it was committed.
struct TempFile {
    path: PathBuf,
    committed: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Filesystem-backed [`Storage`] rooted at a base directory.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, ServiceError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| storage_error("create", &base_path.display().to_string(), e))?;
        Ok(Self { base_path })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, ServiceError> {
        let relative = Path::new(key);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !plain {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "Invalid storage key: {}",
                key
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), ServiceError> {
        let path = self.resolve(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| storage_error("resolve", key, "no parent directory"))?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| storage_error("create directory for", key, e))?;

        // Readers only ever see the renamed, complete file. The guard also
        // covers the future being dropped mid-write.
        let tmp = TempFile::new(parent.join(format!(".{}.tmp", Uuid::new_v4())));
        fs::write(&tmp.path, &data)
            .await
            .map_err(|e| storage_error("write", key, e))?;
        fs::rename(&tmp.path, &path)
            .await
            .map_err(|e| storage_error("commit", key, e))?;
        tmp.commit();

        tracing::debug!(key = %key, size = data.len(), "Stored object");
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, ServiceError> {
        let path = self.resolve(key)?;
        fs::read(path).await.map_err(|e| storage_error("read", key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        let path = self.resolve(key)?;
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("delete", key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let key = invoice_pdf_key(3, 14);

        storage.upload(&key, b"%PDF-1.4".to_vec()).await.unwrap();

        assert_eq!(storage.download(&key).await.unwrap(), b"%PDF-1.4");
        assert!(dir.path().join("invoices/3/14.pdf").exists());
    }

    #[tokio::test]
    async fn upload_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        storage.upload("invoices/1/1.pdf", vec![1, 2, 3]).await.unwrap();
        storage.upload("invoices/1/1.pdf", vec![4, 5]).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("invoices/1"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("1.pdf")]);
        assert_eq!(storage.download("invoices/1/1.pdf").await.unwrap(), vec![4, 5]);
    }

    #[test]
    fn uncommitted_temp_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let abandoned = dir.path().join(".abandoned.tmp");
        let kept = dir.path().join(".kept.tmp");
        std::fs::write(&abandoned, b"partial").unwrap();
        std::fs::write(&kept, b"complete").unwrap();

        drop(TempFile::new(abandoned.clone()));
        TempFile::new(kept.clone()).commit();

        assert!(!abandoned.exists());
        assert!(kept.exists());
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        // A directory at the target path makes the rename fail.
        std::fs::create_dir_all(dir.path().join("invoices/1/1.pdf/occupied")).unwrap();

        assert!(storage.upload("invoices/1/1.pdf", vec![1, 2, 3]).await.is_err());

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("invoices/1"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("1.pdf")]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        storage.upload("a.pdf", vec![1]).await.unwrap();
        storage.delete("a.pdf").await.unwrap();
        storage.delete("a.pdf").await.unwrap();
        assert!(storage.download("a.pdf").await.is_err());
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        assert!(storage.upload("../outside.pdf", vec![1]).await.is_err());
        assert!(storage.upload("/etc/passwd", vec![1]).await.is_err());
    }
}
