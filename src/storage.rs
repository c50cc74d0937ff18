//! Document storage seam. Attachments are consumed strictly through this
//! upload/URL contract; storage I/O never participates in the state-machine
//! critical section.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;

/// Result of storing one file
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub file_url: String,
    pub file_size: i64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store file content and return its public URL and size
    async fn store(&self, file_name: &str, content: &[u8]) -> Result<StoredDocument>;
}

/// Disk-backed store for development: files land under a root directory and
/// are addressed beneath a public base path.
pub struct LocalDiskStore {
    root: PathBuf,
    public_base: String,
}

impl LocalDiskStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }

    /// Keep only a safe subset of the client-supplied name
    fn sanitize(file_name: &str) -> String {
        let cleaned: String = file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.is_empty() {
            "unnamed".to_string()
        } else {
            cleaned
        }
    }
}

#[async_trait]
impl DocumentStore for LocalDiskStore {
    async fn store(&self, file_name: &str, content: &[u8]) -> Result<StoredDocument> {
        tokio::fs::create_dir_all(&self.root).await?;

        // Timestamp prefix keeps repeated uploads of the same name apart
        let stored_name = format!(
            "{}_{}",
            Utc::now().format("%Y%m%d%H%M%S%f"),
            Self::sanitize(file_name)
        );
        let path = self.root.join(&stored_name);
        tokio::fs::write(&path, content).await?;

        Ok(StoredDocument {
            file_url: format!("{}/{}", self.public_base.trim_end_matches('/'), stored_name),
            file_size: content.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_path_components() {
        assert_eq!(
            LocalDiskStore::sanitize("../../etc/passwd"),
            ".._.._etc_passwd"
        );
        assert_eq!(LocalDiskStore::sanitize("report v2.pdf"), "report_v2.pdf");
        assert_eq!(LocalDiskStore::sanitize(""), "unnamed");
    }

    #[tokio::test]
    async fn test_store_writes_file_and_builds_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDiskStore::new(dir.path(), "/files/");

        let stored = store.store("minutes.pdf", b"agenda").await.unwrap();
        assert_eq!(stored.file_size, 6);
        assert!(stored.file_url.starts_with("/files/"));
        assert!(stored.file_url.ends_with("_minutes.pdf"));

        let name = stored.file_url.rsplit('/').next().unwrap();
        let on_disk = tokio::fs::read(dir.path().join(name)).await.unwrap();
        assert_eq!(on_disk, b"agenda");
    }
}
