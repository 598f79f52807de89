//! One pass over every outstanding search.
//!
//! Searches are processed sequentially. A failure in one search marks that
//! search as failed and the run moves on; only an unreadable registry aborts
//! the run. New listings from every search are batched into a single
//! notification at the end.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::listing::{Extraction, ListingExtractor, StayParams};
use crate::metrics;
use crate::notifier::{total_listings, Notifier, SearchAlert};
use crate::registry::Registry;
use crate::renderer::{PageRenderer, RenderError};
use crate::store::StoreError;
use crate::tracker::{Evaluation, Tracker};

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to list outstanding searches: {0}")]
    Registry(#[source] StoreError),
}

/// Errors contained to a single search.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Caller-chosen behaviour for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunPolicy {
    /// Announce listings found on a search's first run.
    pub notify_on_first_run: bool,
}

impl From<&RunConfig> for RunPolicy {
    fn from(config: &RunConfig) -> Self {
        Self {
            notify_on_first_run: config.notify_on_first_run,
        }
    }
}

/// What happened to one search during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SearchOutcome {
    Scanned {
        url: String,
        /// Listings extracted from the page.
        found: usize,
        /// Listings not seen before.
        new: usize,
        first_run: bool,
        /// Set when the page held no recognizable payload.
        no_data_reason: Option<String>,
    },
    Failed {
        url: String,
        error: String,
    },
}

impl SearchOutcome {
    pub fn url(&self) -> &str {
        match self {
            SearchOutcome::Scanned { url, .. } | SearchOutcome::Failed { url, .. } => url,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SearchOutcome::Failed { .. })
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<SearchOutcome>,
    /// An aggregated notification was delivered.
    pub notified: bool,
    pub notification_error: Option<String>,
}

impl RunReport {
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn new_count(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                SearchOutcome::Scanned { new, .. } => *new,
                SearchOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

/// Drives registry, renderer, extractor, tracker and notifier for one run.
pub struct ScanRunner {
    registry: Registry,
    tracker: Tracker,
    renderer: Arc<dyn PageRenderer>,
    extractor: ListingExtractor,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ScanRunner {
    pub fn new(
        registry: Registry,
        tracker: Tracker,
        renderer: Arc<dyn PageRenderer>,
        extractor: ListingExtractor,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            registry,
            tracker,
            renderer,
            extractor,
            notifier,
        }
    }

    /// Scan every outstanding search once and send one notification.
    pub async fn run_once(&self, policy: RunPolicy) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let start = Instant::now();

        let span = info_span!("run", run_id = %run_id);
        async move {
            let mut searches: Vec<String> = self
                .registry
                .list()
                .await
                .map_err(RunError::Registry)?
                .into_iter()
                .collect();
            searches.sort();

            info!(searches = searches.len(), "Starting run");

            let mut outcomes = Vec::with_capacity(searches.len());
            let mut alerts = Vec::new();

            for url in &searches {
                let outcome = match self.scan(url).await {
                    Ok((evaluation, found, no_data_reason)) => {
                        let new = evaluation.new_listings.len();
                        let first_run = evaluation.is_first_run;
                        if !first_run || policy.notify_on_first_run {
                            alerts.push(SearchAlert::new(url.clone(), evaluation.new_listings));
                        } else if new > 0 {
                            info!(search = %url, baseline = new, "First run, establishing baseline");
                        }
                        SearchOutcome::Scanned {
                            url: url.clone(),
                            found,
                            new,
                            first_run,
                            no_data_reason,
                        }
                    }
                    Err(e) => {
                        error!(search = %url, error = %e, "Search failed");
                        if let Err(mark) = self.tracker.store().mark_failure(url).await {
                            warn!(search = %url, error = %mark, "Could not record failure");
                        }
                        SearchOutcome::Failed {
                            url: url.clone(),
                            error: e.to_string(),
                        }
                    }
                };

                let result = match &outcome {
                    SearchOutcome::Failed { .. } => "failed",
                    SearchOutcome::Scanned {
                        no_data_reason: Some(_),
                        ..
                    } => "no_data",
                    SearchOutcome::Scanned { .. } => "scanned",
                };
                metrics::SEARCHES_SCANNED.with_label_values(&[result]).inc();
                outcomes.push(outcome);
            }

            let (notified, notification_error) = self.deliver(&alerts).await;

            let report = RunReport {
                run_id: run_id.clone(),
                started_at,
                outcomes,
                notified,
                notification_error,
            };

            metrics::RUN_DURATION.observe(start.elapsed().as_secs_f64());
            info!(
                searches = report.outcomes.len(),
                failed = report.failed_count(),
                new = report.new_count(),
                notified = report.notified,
                "Run complete"
            );
            Ok::<_, RunError>(report)
        }
        .instrument(span)
        .await
    }

    /// Render, extract and evaluate one search.
    async fn scan(&self, url: &str) -> Result<(Evaluation, usize, Option<String>), ScanError> {
        let span = info_span!("scan", search = %url);
        async move {
            let page = self.renderer.render(url).await?;

            // Values the search URL leaves out may appear after redirects
            let stay = StayParams::from_search_url(url).or_from(&StayParams::from_query(
                page.query.iter().map(|(k, v)| (k, v)),
            ));
            let extraction = self.extractor.extract_with_stay(&page.document, &stay);
            let no_data_reason = extraction.no_data_reason().map(str::to_string);
            if let Some(reason) = &no_data_reason {
                metrics::EXTRACTION_NO_DATA.inc();
                warn!(reason = %reason, "No listing data on page");
            }
            let listings = match extraction {
                Extraction::Found(listings) => listings,
                Extraction::NoData { .. } => Vec::new(),
            };
            let found = listings.len();
            metrics::LISTINGS_EXTRACTED.inc_by(found as u64);

            let evaluation = self.tracker.evaluate(url, listings).await?;
            metrics::NEW_LISTINGS.inc_by(evaluation.new_listings.len() as u64);

            info!(
                found,
                new = evaluation.new_listings.len(),
                first_run = evaluation.is_first_run,
                "Search scanned"
            );
            Ok::<_, ScanError>((evaluation, found, no_data_reason))
        }
        .instrument(span)
        .await
    }

    /// Send the batch. Returns whether it was delivered and any error.
    async fn deliver(&self, alerts: &[SearchAlert]) -> (bool, Option<String>) {
        if total_listings(alerts) == 0 {
            info!("No new listings to notify");
            return (false, None);
        }

        let Some(notifier) = &self.notifier else {
            info!(
                listings = total_listings(alerts),
                "No notifier configured, skipping notification"
            );
            return (false, None);
        };

        match notifier.notify(alerts).await {
            Ok(()) => (true, None),
            Err(e) => {
                error!(notifier = notifier.name(), error = %e, "Notification failed");
                (false, Some(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SearchStore;
    use crate::testing::{fixtures, MemoryBackend, MockNotifier, MockRenderer};

    const A: &str = "https://www.airbnb.co.uk/s/Edinburgh/homes?adults=2";
    const B: &str = "https://www.airbnb.co.uk/s/Glasgow/homes?adults=1";

    struct Harness {
        backend: Arc<MemoryBackend>,
        renderer: Arc<MockRenderer>,
        notifier: Arc<MockNotifier>,
        runner: ScanRunner,
    }

    fn harness() -> Harness {
        let backend = Arc::new(MemoryBackend::new());
        let renderer = Arc::new(MockRenderer::new());
        let notifier = Arc::new(MockNotifier::new());
        let registry = Registry::new(backend.clone(), "outstanding_searches");
        let tracker = Tracker::new(SearchStore::new(backend.clone(), "search"));
        let runner = ScanRunner::new(
            registry,
            tracker,
            renderer.clone(),
            ListingExtractor::new("https://www.airbnb.co.uk"),
            Some(notifier.clone() as Arc<dyn Notifier>),
        );
        Harness {
            backend,
            renderer,
            notifier,
            runner,
        }
    }

    impl Harness {
        async fn watch(&self, url: &str) {
            Registry::new(self.backend.clone(), "outstanding_searches")
                .add(url)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let h = harness();
        let report = h.runner.run_once(RunPolicy::default()).await.unwrap();
        assert!(report.outcomes.is_empty());
        assert!(!report.notified);
        assert!(h.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_first_run_is_silent_by_default() {
        let h = harness();
        h.watch(A).await;
        h.renderer
            .set_page(A, fixtures::search_page(&["1", "2"]))
            .await;

        let report = h.runner.run_once(RunPolicy::default()).await.unwrap();
        assert_eq!(
            report.outcomes,
            vec![SearchOutcome::Scanned {
                url: A.to_string(),
                found: 2,
                new: 2,
                first_run: true,
                no_data_reason: None,
            }]
        );
        assert!(!report.notified);
        assert!(h.notifier.sent().await.is_empty());

        h.renderer
            .set_page(A, fixtures::search_page(&["1", "2", "3"]))
            .await;
        let report = h.runner.run_once(RunPolicy::default()).await.unwrap();
        assert!(report.notified);

        let sent = h.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), 1);
        assert_eq!(sent[0][0].listings[0].id, "3");
    }

    #[tokio::test]
    async fn test_first_run_notifies_when_asked() {
        let h = harness();
        h.watch(A).await;
        h.renderer.set_page(A, fixtures::search_page(&["1"])).await;

        let policy = RunPolicy {
            notify_on_first_run: true,
        };
        let report = h.runner.run_once(policy).await.unwrap();
        assert!(report.notified);
        assert_eq!(h.notifier.sent().await[0][0].listings.len(), 1);
    }

    #[tokio::test]
    async fn test_listing_urls_carry_search_params() {
        let h = harness();
        let url = "https://www.airbnb.co.uk/s/Edinburgh/homes?checkin=2025-08-12&checkout=2025-08-19&adults=2";
        h.watch(url).await;
        h.renderer.set_page(url, fixtures::search_page(&["7"])).await;

        let policy = RunPolicy {
            notify_on_first_run: true,
        };
        h.runner.run_once(policy).await.unwrap();

        let sent = h.notifier.sent().await;
        let listing_url = &sent[0][0].listings[0].url;
        assert!(listing_url.starts_with("https://www.airbnb.co.uk/rooms/7?"));
        assert!(listing_url.contains("check_in=2025-08-12"));
        assert!(listing_url.contains("check_out=2025-08-19"));
    }

    #[tokio::test]
    async fn test_listing_urls_fill_stay_from_final_url() {
        let h = harness();
        h.watch(A).await;
        h.renderer.set_page(A, fixtures::search_page(&["7"])).await;
        h.renderer
            .redirect(
                A,
                "https://www.airbnb.co.uk/s/Edinburgh/homes?adults=3&checkin=2025-10-01&checkout=2025-10-03",
            )
            .await;

        let policy = RunPolicy {
            notify_on_first_run: true,
        };
        h.runner.run_once(policy).await.unwrap();

        let sent = h.notifier.sent().await;
        let listing_url = &sent[0][0].listings[0].url;
        assert!(listing_url.contains("check_in=2025-10-01"));
        assert!(listing_url.contains("check_out=2025-10-03"));
        // The search URL's own values win
        assert!(listing_url.contains("adults=2"));
    }

    #[tokio::test]
    async fn test_render_failure_is_isolated() {
        let h = harness();
        h.watch(A).await;
        h.watch(B).await;
        h.renderer.set_page(B, fixtures::search_page(&["1"])).await;
        h.renderer.fail_url(A, RenderError::Timeout).await;

        let store = SearchStore::new(h.backend.clone(), "search");
        store.record_scan(A, &["old".to_string()]).await.unwrap();

        let report = h.runner.run_once(RunPolicy::default()).await.unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failed_count(), 1);
        assert!(report.outcomes[0].is_failed());
        assert_eq!(report.outcomes[0].url(), A);
        assert!(!report.outcomes[1].is_failed());

        assert!(store.last_scan(A).await.unwrap().is_failed());
        assert_eq!(store.seen_ids(A).await.len(), 1);
    }

    #[tokio::test]
    async fn test_no_data_page_counts_as_empty_scan() {
        let h = harness();
        h.watch(A).await;
        h.renderer
            .set_page(A, "<html><body>captcha</body></html>".to_string())
            .await;

        let report = h.runner.run_once(RunPolicy::default()).await.unwrap();
        match &report.outcomes[0] {
            SearchOutcome::Scanned {
                found,
                no_data_reason,
                first_run,
                ..
            } => {
                assert_eq!(*found, 0);
                assert!(*first_run);
                assert!(no_data_reason.is_some());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_state() {
        let h = harness();
        h.watch(A).await;
        h.renderer.set_page(A, fixtures::search_page(&["1"])).await;
        h.runner.run_once(RunPolicy::default()).await.unwrap();

        h.renderer
            .set_page(A, fixtures::search_page(&["1", "2"]))
            .await;
        h.notifier.set_next_error("chat not found").await;
        let report = h.runner.run_once(RunPolicy::default()).await.unwrap();
        assert!(!report.notified);
        assert!(report
            .notification_error
            .as_deref()
            .is_some_and(|e| e.contains("chat not found")));

        // Listing 2 was recorded and will not be announced again
        let report = h.runner.run_once(RunPolicy::default()).await.unwrap();
        assert_eq!(report.new_count(), 0);
    }

    #[tokio::test]
    async fn test_registry_failure_aborts_run() {
        let h = harness();
        h.watch(A).await;
        h.backend.fail_on("SMEMBERS").await;

        let result = h.runner.run_once(RunPolicy::default()).await;
        assert!(matches!(result, Err(RunError::Registry(_))));
        assert!(h.renderer.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_searches_processed_in_sorted_order() {
        let h = harness();
        h.watch(B).await;
        h.watch(A).await;
        h.renderer.set_page(A, fixtures::search_page(&[])).await;
        h.renderer.set_page(B, fixtures::search_page(&[])).await;

        h.runner.run_once(RunPolicy::default()).await.unwrap();
        assert_eq!(h.renderer.requests().await, vec![A.to_string(), B.to_string()]);
    }

    #[tokio::test]
    async fn test_without_notifier() {
        let backend = Arc::new(MemoryBackend::new());
        let renderer = Arc::new(MockRenderer::new());
        let registry = Registry::new(backend.clone(), "outstanding_searches");
        registry.add(A).await.unwrap();
        renderer.set_page(A, fixtures::search_page(&["1"])).await;

        let runner = ScanRunner::new(
            registry,
            Tracker::new(SearchStore::new(backend, "search")),
            renderer,
            ListingExtractor::default(),
            None,
        );
        let report = runner
            .run_once(RunPolicy {
                notify_on_first_run: true,
            })
            .await
            .unwrap();
        assert!(!report.notified);
        assert!(report.notification_error.is_none());
    }
}
