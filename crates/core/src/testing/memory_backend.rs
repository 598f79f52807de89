//! In-memory storage backend for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::{KvBackend, StoreError};

/// In-process implementation of the KvBackend trait.
///
/// Provides controllable behavior for testing:
/// - Hash and set semantics matching the real backends
/// - Per-command fault injection, by Redis command name
/// - A log of executed commands for assertions
///
/// # Example
///
/// ```rust,ignore
/// let backend = MemoryBackend::new();
/// backend.fail_on("SADD").await;
/// assert!(backend.set_add("k", &["1".into()]).await.is_err());
///
/// backend.clear_failures().await;
/// backend.set_add("k", &["1".into()]).await?;
/// assert_eq!(backend.commands().await, vec!["SADD", "SADD"]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    hashes: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
    sets: Arc<RwLock<HashMap<String, HashSet<String>>>>,
    /// Commands that fail until cleared.
    failing: Arc<RwLock<HashSet<String>>>,
    /// Executed commands, in order.
    commands: Arc<RwLock<Vec<String>>>,
    closed: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `command` fail with [`StoreError::CommandFailed`].
    pub async fn fail_on(&self, command: &str) {
        self.failing.write().await.insert(command.to_uppercase());
    }

    /// Stop injecting failures.
    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
    }

    /// Commands executed so far, including failed ones.
    pub async fn commands(&self) -> Vec<String> {
        self.commands.read().await.clone()
    }

    async fn check(&self, command: &str) -> Result<(), StoreError> {
        self.commands.write().await.push(command.to_string());
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        if self.failing.read().await.contains(command) {
            return Err(StoreError::CommandFailed(format!(
                "{}: injected failure",
                command
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check("PING").await
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.check("HGET").await?;
        Ok(self
            .hashes
            .read()
            .await
            .get(key)
            .and_then(|h| h.get(field).cloned()))
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.check("HGETALL").await?;
        Ok(self.hashes.read().await.get(key).cloned().unwrap_or_default())
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        self.check("HSET").await?;
        let mut hashes = self.hashes.write().await;
        let hash = hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.to_string(), value.clone());
        }
        Ok(())
    }

    async fn hash_delete(&self, key: &str, fields: &[&str]) -> Result<(), StoreError> {
        self.check("HDEL").await?;
        let mut hashes = self.hashes.write().await;
        if let Some(hash) = hashes.get_mut(key) {
            for field in fields {
                hash.remove(*field);
            }
            if hash.is_empty() {
                hashes.remove(key);
            }
        }
        Ok(())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        self.check("SADD").await?;
        if members.is_empty() {
            return Ok(());
        }
        self.sets
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .extend(members.iter().cloned());
        Ok(())
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        self.check("SREM").await?;
        let mut sets = self.sets.write().await;
        if let Some(set) = sets.get_mut(key) {
            for member in members {
                set.remove(member);
            }
            if set.is_empty() {
                sets.remove(key);
            }
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check("SMEMBERS").await?;
        Ok(self
            .sets
            .read()
            .await
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check("SISMEMBER").await?;
        Ok(self
            .sets
            .read()
            .await
            .get(key)
            .is_some_and(|s| s.contains(member)))
    }

    async fn set_len(&self, key: &str) -> Result<usize, StoreError> {
        self.check("SCARD").await?;
        Ok(self.sets.read().await.get(key).map_or(0, |s| s.len()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check("DEL").await?;
        self.hashes.write().await.remove(key);
        self.sets.write().await.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
