//! In-memory sink.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::Sink;
use crate::error::Result;

/// Keeps stored content in a shared map and counts writes per path.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    writes: Arc<Mutex<Vec<String>>>,
    /// Serve stored content back through `load_cached`, like a local disk.
    serve_cached: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that hands stored content back as a cache.
    pub fn caching() -> Self {
        Self {
            serve_cached: true,
            ..Self::default()
        }
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
    }

    /// Stored paths in sorted order.
    pub fn paths(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Every `store` call, in order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn store(&self, path: &str, content: &[u8]) -> Result<()> {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string(), content.to_vec());
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_string());
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.get(path).is_some())
    }

    async fn load_cached(&self, path: &str) -> Result<Option<Vec<u8>>> {
        if !self.serve_cached {
            return Ok(None);
        }
        Ok(self.get(path).filter(|c| !c.is_empty()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
