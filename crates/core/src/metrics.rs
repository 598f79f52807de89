//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Runs (duration, searches by result)
//! - Extraction (listings found, pages without data)
//! - Change detection (new listings, store errors)
//! - Notifications

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Runs
// =============================================================================

/// Searches processed by result.
pub static SEARCHES_SCANNED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("propalert_searches_scanned_total", "Total searches processed"),
        &["result"], // "scanned", "no_data", "failed"
    )
    .unwrap()
});

/// Run duration in seconds.
pub static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("propalert_run_duration_seconds", "Duration of a full run")
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
    )
    .unwrap()
});

// =============================================================================
// Extraction and change detection
// =============================================================================

/// Listings extracted from result pages.
pub static LISTINGS_EXTRACTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "propalert_listings_extracted_total",
        "Total listings extracted from result pages",
    )
    .unwrap()
});

/// Pages where no listing payload was found.
pub static EXTRACTION_NO_DATA: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "propalert_extraction_no_data_total",
        "Result pages without a recognizable listing payload",
    )
    .unwrap()
});

/// Listings not seen before.
pub static NEW_LISTINGS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("propalert_new_listings_total", "Total new listings detected").unwrap()
});

/// Store operation failures by operation.
pub static STORE_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("propalert_store_errors_total", "Failed store operations"),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Notifications
// =============================================================================

/// Notification messages by status.
pub static NOTIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("propalert_notifications_total", "Notification messages sent"),
        &["status"], // "sent", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(SEARCHES_SCANNED.clone()),
        Box::new(RUN_DURATION.clone()),
        Box::new(LISTINGS_EXTRACTED.clone()),
        Box::new(EXTRACTION_NO_DATA.clone()),
        Box::new(NEW_LISTINGS.clone()),
        Box::new(STORE_ERRORS.clone()),
        Box::new(NOTIFICATIONS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        SEARCHES_SCANNED.with_label_values(&["scanned"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"propalert_searches_scanned_total".to_string()));
    }
}
