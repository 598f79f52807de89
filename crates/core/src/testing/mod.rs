//! Testing utilities and in-process implementations of the external seams.
//!
//! This module provides an in-memory storage backend with fault injection
//! and mocks for the renderer and notifier, so the whole pipeline can be
//! exercised without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use propalert_core::testing::{fixtures, MemoryBackend, MockNotifier, MockRenderer};
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let renderer = MockRenderer::new();
//! renderer.set_page(url, fixtures::search_page(&["1", "2"])).await;
//!
//! // Make the next seen-id read fail
//! backend.fail_on("SMEMBERS").await;
//! ```

mod memory_backend;
mod mock_notifier;
mod mock_renderer;

pub use memory_backend::MemoryBackend;
pub use mock_notifier::MockNotifier;
pub use mock_renderer::MockRenderer;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{json, Value};

    use crate::listing::{Listing, MISSING_FIELD};

    /// Base URL used for fixture listing links.
    pub const LISTING_BASE: &str = "https://www.airbnb.co.uk";

    /// Create a listing with reasonable defaults. An empty id gives the
    /// record the extractor emits for items without one.
    pub fn listing(id: &str) -> Listing {
        if id.is_empty() {
            return Listing {
                id: String::new(),
                url: String::new(),
                price: 0,
                currency: String::new(),
                rating: 0.0,
                review_count: 0,
                name: MISSING_FIELD.to_string(),
                title: MISSING_FIELD.to_string(),
            };
        }
        Listing {
            id: id.to_string(),
            url: format!("{}/rooms/{}", LISTING_BASE, id),
            price: 120,
            currency: "£".to_string(),
            rating: 4.5,
            review_count: 10,
            name: format!("Listing {}", id),
            title: "Flat in Edinburgh".to_string(),
        }
    }

    pub fn listings(ids: &[&str]) -> Vec<Listing> {
        ids.iter().map(|id| listing(id)).collect()
    }

    /// One search result item as found in the page payload.
    pub fn result_item(id: &str) -> Value {
        json!({
            "listing": {
                "id": id,
                "name": format!("Listing {}", id),
                "title": "Flat in Edinburgh",
            },
            "avgRatingLocalized": "4.5 (10)",
            "structuredDisplayPrice": {
                "primaryLine": { "price": "£120 night" }
            },
        })
    }

    /// A results page whose deferred-state payload holds `ids`.
    pub fn search_page(ids: &[&str]) -> String {
        let results: Vec<Value> = ids.iter().map(|id| result_item(id)).collect();
        let payload = json!({
            "niobeMinimalClientData": [[
                "StaysSearch:{}",
                {
                    "data": {
                        "presentation": {
                            "staysSearch": {
                                "results": { "searchResults": results }
                            }
                        }
                    }
                }
            ]]
        });
        format!(
            r#"<!doctype html><html><head></head><body><div id="root"></div><script id="data-deferred-state-0" type="application/json">{}</script></body></html>"#,
            payload
        )
    }
}
