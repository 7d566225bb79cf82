//! Filesystem access used by `upload_file`.

use std::io;
use std::path::Path;

use async_trait::async_trait;

/// The two filesystem capabilities an upload needs.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Whether `path` resolves to an existing regular file.
    async fn exists(&self, path: &Path) -> bool;

    /// Read the whole file as UTF-8 text.
    async fn read_text(&self, path: &Path) -> io::Result<String>;
}

/// [`FileSource`] backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFiles;

#[async_trait]
impl FileSource for LocalFiles {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    async fn read_text(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.cbl");
        std::fs::write(&path, "       PROCEDURE DIVISION.\n").unwrap();

        let files = LocalFiles;
        assert!(files.exists(&path).await);
        assert_eq!(
            files.read_text(&path).await.unwrap(),
            "       PROCEDURE DIVISION.\n"
        );

        assert!(!files.exists(&dir.path().join("missing.cbl")).await);
        // directories are not uploadable files
        assert!(!files.exists(dir.path()).await);
    }
}
