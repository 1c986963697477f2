//! Local filesystem sink.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::Sink;
use crate::error::Result;

/// Stores files under a root directory, creating parent directories as needed.
#[derive(Debug, Clone)]
pub struct LocalSink {
    root: PathBuf,
}

impl LocalSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a logical path.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl Sink for LocalSink {
    async fn store(&self, path: &str, content: &[u8]) -> Result<()> {
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, content).await?;
        debug!("Wrote {} bytes to {}", content.len(), target.display());
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.resolve(path)).await?)
    }

    async fn load_cached(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let target = self.resolve(path);
        match tokio::fs::read(&target).await {
            Ok(content) if !content.is_empty() => Ok(Some(content)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_store_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let sink = LocalSink::new(dir.path());

        sink.store("files/20160501_R1_abc.pdf", b"%PDF").await.unwrap();

        let saved = std::fs::read(dir.path().join("files/20160501_R1_abc.pdf")).unwrap();
        assert_eq!(saved, b"%PDF");
        assert!(sink.exists("files/20160501_R1_abc.pdf").await.unwrap());
        assert!(!sink.exists("files/missing.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let dir = tempdir().unwrap();
        let sink = LocalSink::new(dir.path());

        sink.store("conan/page.html", b"first").await.unwrap();
        sink.store("conan/page.html", b"second").await.unwrap();

        assert_eq!(
            sink.load_cached("conan/page.html").await.unwrap(),
            Some(b"second".to_vec())
        );
    }

    #[tokio::test]
    async fn test_load_cached_ignores_missing_and_empty() {
        let dir = tempdir().unwrap();
        let sink = LocalSink::new(dir.path());

        assert_eq!(sink.load_cached("conan/none.html").await.unwrap(), None);

        sink.store("conan/empty.html", b"").await.unwrap();
        assert_eq!(sink.load_cached("conan/empty.html").await.unwrap(), None);
    }
}
