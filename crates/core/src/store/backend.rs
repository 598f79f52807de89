//! Key/value + set storage abstraction.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Store command failed: {0}")]
    CommandFailed(String),

    #[error("Unexpected store response: {0}")]
    InvalidResponse(String),

    #[error("Store request timeout")]
    Timeout,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Store is closed")]
    Closed,
}

/// Remote-style storage with string-keyed hashes and sets.
///
/// Operations mirror the Redis commands of the same name. Missing keys read
/// as empty: `hash_get` returns `None`, set reads return nothing.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// HGET
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// HGETALL
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// HSET with one or more fields.
    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError>;

    /// HDEL
    async fn hash_delete(&self, key: &str, fields: &[&str]) -> Result<(), StoreError>;

    /// SADD. Adding nothing is a no-op.
    async fn set_add(&self, key: &str, members: &[String]) -> Result<(), StoreError>;

    /// SREM
    async fn set_remove(&self, key: &str, members: &[String]) -> Result<(), StoreError>;

    /// SMEMBERS
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// SISMEMBER
    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// SCARD
    async fn set_len(&self, key: &str) -> Result<usize, StoreError>;

    /// DEL for hash and set keys alike.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Release connections. Later calls fail with [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError>;
}
