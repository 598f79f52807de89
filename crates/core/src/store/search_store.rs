//! Per-search persisted state: seen listing ids and scan metadata.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::fingerprint::SearchKeys;
use crate::metrics;

use super::backend::{KvBackend, StoreError};
use super::types::{
    now_millis, parse_millis, ScanStatus, SearchMetadata, FIELD_CREATED, FIELD_LAST_FAILURE,
    FIELD_LAST_SCAN,
};

/// Change-detection state for every search, keyed by URL fingerprint.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct SearchStore {
    backend: Arc<dyn KvBackend>,
    key_prefix: String,
}

impl std::fmt::Debug for SearchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchStore")
            .field("backend", &self.backend.name())
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl SearchStore {
    pub fn new(backend: Arc<dyn KvBackend>, key_prefix: impl Into<String>) -> Self {
        Self {
            backend,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    pub fn keys(&self, url: &str) -> SearchKeys {
        SearchKeys::new(&self.key_prefix, url)
    }

    /// True when the search has never completed an update.
    pub async fn is_first_run(&self, url: &str) -> Result<bool, StoreError> {
        let keys = self.keys(url);
        let created = self
            .backend
            .hash_get(&keys.metadata, FIELD_CREATED)
            .await
            .inspect_err(|e| {
                record_error("is_first_run");
                error!(search = %url, error = %e, "Failed to read first-run marker");
            })?;
        Ok(created.is_none())
    }

    /// Ids previously seen for the search.
    ///
    /// A failed read is logged and treated as an empty history.
    pub async fn seen_ids(&self, url: &str) -> HashSet<String> {
        let keys = self.keys(url);
        match self.backend.set_members(&keys.ids).await {
            Ok(ids) => ids.into_iter().collect(),
            Err(e) => {
                record_error("seen_ids");
                warn!(
                    search = %url,
                    fingerprint = %keys.fingerprint.short(),
                    error = %e,
                    "Failed to read seen ids, treating as empty"
                );
                HashSet::new()
            }
        }
    }

    /// Add `ids` to the seen set and stamp a successful scan.
    ///
    /// `createMs` is only written when absent. Any previous failure marker
    /// is cleared.
    pub async fn record_scan(&self, url: &str, ids: &[String]) -> Result<(), StoreError> {
        let keys = self.keys(url);
        let result = async {
            self.backend.set_add(&keys.ids, ids).await?;

            let first = self
                .backend
                .hash_get(&keys.metadata, FIELD_CREATED)
                .await?
                .is_none();

            let now = now_millis();
            let mut fields = vec![(FIELD_LAST_SCAN, now.clone())];
            if first {
                fields.push((FIELD_CREATED, now));
            }
            self.backend.hash_set(&keys.metadata, &fields).await?;
            self.backend
                .hash_delete(&keys.metadata, &[FIELD_LAST_FAILURE])
                .await
        }
        .await;

        match &result {
            Ok(()) => debug!(
                search = %url,
                fingerprint = %keys.fingerprint.short(),
                ids = ids.len(),
                "Recorded scan"
            ),
            Err(e) => {
                record_error("record_scan");
                error!(search = %url, error = %e, "Failed to record scan");
            }
        }
        result
    }

    /// Mark the last scan as failed. Seen ids are left alone.
    pub async fn mark_failure(&self, url: &str) -> Result<(), StoreError> {
        let keys = self.keys(url);
        let fields = [
            (FIELD_LAST_SCAN, "0".to_string()),
            (FIELD_LAST_FAILURE, now_millis()),
        ];
        self.backend
            .hash_set(&keys.metadata, &fields)
            .await
            .inspect_err(|e| {
                record_error("mark_failure");
                error!(search = %url, error = %e, "Failed to mark scan failure");
            })
    }

    pub async fn last_scan(&self, url: &str) -> Result<ScanStatus, StoreError> {
        let keys = self.keys(url);
        let fields = self.backend.hash_get_all(&keys.metadata).await?;
        Ok(ScanStatus::from_fields(&fields))
    }

    /// Dashboard view of one search.
    pub async fn metadata(&self, url: &str) -> Result<SearchMetadata, StoreError> {
        let keys = self.keys(url);
        let (fields, count) = tokio::join!(
            self.backend.hash_get_all(&keys.metadata),
            self.backend.set_len(&keys.ids)
        );
        let fields = fields?;

        Ok(SearchMetadata {
            search_url: url.to_string(),
            created_at: fields.get(FIELD_CREATED).and_then(|v| parse_millis(v)),
            last_scan: ScanStatus::from_fields(&fields),
            property_count: count?,
            fingerprint: keys.fingerprint,
        })
    }

    /// Metadata for each URL, in the given order. Unreadable entries are
    /// logged and skipped.
    pub async fn all_metadata<I, S>(&self, urls: I) -> Vec<SearchMetadata>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        for url in urls {
            let url = url.as_ref();
            match self.metadata(url).await {
                Ok(meta) => out.push(meta),
                Err(e) => {
                    record_error("metadata");
                    warn!(search = %url, error = %e, "Failed to read search metadata");
                }
            }
        }
        out
    }

    /// Delete all history for a search. The next scan is a first run again.
    pub async fn forget(&self, url: &str) -> Result<(), StoreError> {
        let keys = self.keys(url);
        self.backend.delete(&keys.ids).await?;
        self.backend.delete(&keys.metadata).await?;
        debug!(search = %url, fingerprint = %keys.fingerprint.short(), "Forgot search history");
        Ok(())
    }

    pub async fn close(&self) -> Result<(), StoreError> {
        self.backend.close().await
    }
}

fn record_error(operation: &str) {
    metrics::STORE_ERRORS.with_label_values(&[operation]).inc();
}
