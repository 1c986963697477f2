//! The storage destination contract shared by all crawlers.

use async_trait::async_trait;

use crate::error::Result;

/// Durable storage of bytes at a logical path such as
/// `files/20160501_R1234_<hash>.pdf`.
///
/// Storing to an existing path overwrites it. The logical path is the only
/// key: it can be rebuilt from the document, format or image filename alone.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Persist `content` at `path`.
    async fn store(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Whether something is stored at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Previously stored, non-empty content usable instead of re-fetching.
    ///
    /// Only a sink that can read back cheaply and whose copy needs no refresh
    /// returns anything; the default never does.
    async fn load_cached(&self, _path: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    /// Human-readable destination for logs.
    fn describe(&self) -> String;
}
