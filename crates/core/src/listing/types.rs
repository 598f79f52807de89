//! Listing record and extraction outcome.

use serde::{Deserialize, Serialize};

/// Placeholder for text fields the extractor could not find.
pub const MISSING_FIELD: &str = "<unavailable>";

/// A single listing as seen on one scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Upstream listing id. Empty if the item carried none.
    pub id: String,
    /// Detail page URL.
    pub url: String,
    /// Displayed price (0 if unparseable).
    pub price: u64,
    /// Currency symbol (empty if unparseable).
    pub currency: String,
    /// Average rating, 0.0 when absent.
    pub rating: f64,
    pub review_count: u64,
    pub name: String,
    pub title: String,
}

impl Listing {
    /// Whether the extractor found an id for this listing.
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// A copy of this listing pointing at a different URL.
    pub fn with_url(self, url: String) -> Self {
        Self { url, ..self }
    }

    /// "£120" style price label, empty when nothing was parsed.
    pub fn price_label(&self) -> String {
        if self.currency.is_empty() && self.price == 0 {
            String::new()
        } else {
            format!("{}{}", self.currency, self.price)
        }
    }
}

/// Result of running the extractor over one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// A results array was located. May be empty.
    Found(Vec<Listing>),
    /// No usable payload; `reason` says which lookup gave up.
    NoData { reason: String },
}

impl Extraction {
    pub fn no_data(reason: impl Into<String>) -> Self {
        Extraction::NoData {
            reason: reason.into(),
        }
    }

    pub fn listings(&self) -> &[Listing] {
        match self {
            Extraction::Found(listings) => listings,
            Extraction::NoData { .. } => &[],
        }
    }

    pub fn into_listings(self) -> Vec<Listing> {
        match self {
            Extraction::Found(listings) => listings,
            Extraction::NoData { .. } => Vec::new(),
        }
    }

    pub fn no_data_reason(&self) -> Option<&str> {
        match self {
            Extraction::Found(_) => None,
            Extraction::NoData { reason } => Some(reason),
        }
    }
}
