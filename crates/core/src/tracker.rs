//! New-vs-seen classification of one scrape.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::listing::Listing;
use crate::store::{SearchStore, StoreError};

/// Outcome of evaluating one scrape against persisted state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// Listings whose id was not seen before, in scrape order.
    pub new_listings: Vec<Listing>,
    /// No update had completed for this search before this one.
    pub is_first_run: bool,
    /// Size of the seen set before this scrape was recorded.
    pub seen_count: usize,
}

/// Diffs fresh scrapes against a [`SearchStore`] and records them.
#[derive(Debug, Clone)]
pub struct Tracker {
    store: SearchStore,
}

impl Tracker {
    pub fn new(store: SearchStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SearchStore {
        &self.store
    }

    /// Classify `fresh` for the search at `url` and record every id in it.
    ///
    /// Listings without an id cannot be tracked; they are neither recorded
    /// nor reported. First-run results are returned unfiltered, the caller
    /// decides whether to announce them.
    pub async fn evaluate(&self, url: &str, fresh: Vec<Listing>) -> Result<Evaluation, StoreError> {
        let (first_run, seen) = tokio::join!(self.store.is_first_run(url), self.store.seen_ids(url));
        let is_first_run = first_run?;

        let mut reported = HashSet::new();
        let mut fresh_ids = Vec::with_capacity(fresh.len());
        let mut new_listings = Vec::new();

        for listing in fresh {
            if !listing.has_id() || !reported.insert(listing.id.clone()) {
                continue;
            }
            fresh_ids.push(listing.id.clone());
            if !seen.contains(&listing.id) {
                new_listings.push(listing);
            }
        }

        self.store.record_scan(url, &fresh_ids).await?;

        debug!(
            search = %url,
            fresh = fresh_ids.len(),
            seen = seen.len(),
            new = new_listings.len(),
            first_run = is_first_run,
            "Evaluated scrape"
        );

        Ok(Evaluation {
            new_listings,
            is_first_run,
            seen_count: seen.len(),
        })
    }
}
