//! Change-detection storage.
//!
//! [`KvBackend`] is the hash + set primitive layer (SQLite or Upstash);
//! [`SearchStore`] maps search URLs onto it.

mod backend;
mod search_store;
mod sqlite;
mod types;
mod upstash;

use std::sync::Arc;

use tracing::info;

use crate::config::{StoreBackend, StoreConfig};

pub use backend::{KvBackend, StoreError};
pub use search_store::SearchStore;
pub use sqlite::SqliteBackend;
pub use types::{ScanStatus, SearchMetadata};
pub use upstash::UpstashBackend;

/// Build the backend selected by `config`.
pub fn connect_backend(config: &StoreConfig) -> Result<Arc<dyn KvBackend>, StoreError> {
    match config.backend {
        StoreBackend::Sqlite => {
            let sqlite = config.sqlite.clone().unwrap_or_default();
            info!(path = %sqlite.path.display(), "Opening SQLite store");
            Ok(Arc::new(SqliteBackend::new(&sqlite.path)?))
        }
        StoreBackend::Upstash => {
            let upstash = config.upstash.as_ref().ok_or_else(|| {
                StoreError::ConnectionFailed("store.upstash section missing".to_string())
            })?;
            info!(url = %upstash.url, "Using Upstash store");
            Ok(Arc::new(UpstashBackend::new(upstash)?))
        }
    }
}

/// Build the backend and wrap it in a [`SearchStore`].
pub fn connect(config: &StoreConfig) -> Result<SearchStore, StoreError> {
    let backend = connect_backend(config)?;
    Ok(SearchStore::new(backend, config.key_prefix.clone()))
}
