//! The set of search URLs being watched.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use crate::store::{KvBackend, StoreError};

/// Outstanding searches, kept in a single set key.
///
/// Independent of per-search state: removing a search keeps its history.
#[derive(Clone)]
pub struct Registry {
    backend: Arc<dyn KvBackend>,
    key: String,
}

impl Registry {
    pub fn new(backend: Arc<dyn KvBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Start watching `url`. Adding twice is a no-op.
    pub async fn add(&self, url: &str) -> Result<(), StoreError> {
        self.backend.set_add(&self.key, &[url.to_string()]).await?;
        info!(search = %url, "Search added");
        Ok(())
    }

    /// Stop watching `url`. Unknown URLs are ignored.
    pub async fn remove(&self, url: &str) -> Result<(), StoreError> {
        self.backend.set_remove(&self.key, &[url.to_string()]).await?;
        info!(search = %url, "Search removed");
        Ok(())
    }

    pub async fn list(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.backend.set_members(&self.key).await?.into_iter().collect())
    }

    pub async fn contains(&self, url: &str) -> Result<bool, StoreError> {
        self.backend.set_contains(&self.key, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SearchStore;
    use crate::testing::MemoryBackend;

    fn registry() -> (Arc<MemoryBackend>, Registry) {
        let backend = Arc::new(MemoryBackend::new());
        (backend.clone(), Registry::new(backend, "outstanding_searches"))
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let (_, registry) = registry();
        registry.add("a").await.unwrap();
        registry.add("a").await.unwrap();
        registry.add("b").await.unwrap();

        let all = registry.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(registry.contains("a").await.unwrap());
        assert!(!registry.contains("c").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove() {
        let (_, registry) = registry();
        registry.add("a").await.unwrap();
        registry.remove("a").await.unwrap();
        registry.remove("never-added").await.unwrap();
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_keeps_search_history() {
        let (backend, registry) = registry();
        let store = SearchStore::new(backend.clone(), "search");

        registry.add("a").await.unwrap();
        store.record_scan("a", &["1".to_string()]).await.unwrap();
        registry.remove("a").await.unwrap();

        assert!(!store.is_first_run("a").await.unwrap());
        assert_eq!(store.seen_ids("a").await.len(), 1);
    }

    #[tokio::test]
    async fn test_contains_checks_one_member() {
        let (backend, registry) = registry();
        registry.add("a").await.unwrap();

        assert!(registry.contains("a").await.unwrap());
        let commands = backend.commands().await;
        assert_eq!(commands.last().map(String::as_str), Some("SISMEMBER"));
        assert!(!commands.iter().any(|c| c == "SMEMBERS"));
    }

    #[tokio::test]
    async fn test_list_failure_propagates() {
        let (backend, registry) = registry();
        backend.fail_on("SMEMBERS").await;
        assert!(registry.list().await.is_err());
    }
}
