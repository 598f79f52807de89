//! Search payload location and per-item listing extraction.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::links::StayParams;
use super::parse::{parse_price, parse_rating};
use super::types::{Extraction, Listing, MISSING_FIELD};

/// Script elements that may carry the search payload, in priority order.
pub const PAYLOAD_SELECTORS: &[&str] = &[
    "#data-deferred-state-0",
    "#data-deferred-state",
    r#"script[type="application/json"]"#,
];

/// A known location of the search results array inside the payload.
#[derive(Debug, Clone, Copy)]
pub struct ResultPath {
    pub name: &'static str,
    /// JSON pointer to the array.
    pub pointer: &'static str,
}

impl ResultPath {
    /// The results array at this path, if the payload has one there.
    pub fn resolve<'a>(&self, payload: &'a Value) -> Option<&'a [Value]> {
        payload
            .pointer(self.pointer)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }
}

/// Known result locations, most recent page layout first.
pub const RESULT_PATHS: &[ResultPath] = &[
    ResultPath {
        name: "niobe[1].staysSearch",
        pointer: "/niobeMinimalClientData/1/data/presentation/staysSearch/results/searchResults",
    },
    ResultPath {
        name: "niobe[0][1].staysSearch",
        pointer: "/niobeMinimalClientData/0/1/data/presentation/staysSearch/results/searchResults",
    },
    ResultPath {
        name: "niobe[0][1].staySearch",
        pointer: "/niobeMinimalClientData/0/1/data/presentation/staySearch/results/searchResults",
    },
];

const ID_POINTERS: &[&str] = &["/listing/id", "/demandStayListing/id"];

const PRICE_POINTERS: &[&str] = &[
    "/structuredDisplayPrice/primaryLine/price",
    "/structuredDisplayPrice/primaryLine/discountedPrice",
    "/structuredDisplayPrice/primaryLine/originalPrice",
    "/pricingQuote/structuredStayDisplayPrice/primaryLine/price",
    "/pricingQuote/structuredStayDisplayPrice/primaryLine/discountedPrice",
    "/pricingQuote/structuredStayDisplayPrice/primaryLine/originalPrice",
];

const RATING_POINTERS: &[&str] = &["/avgRatingLocalized", "/listing/avgRatingLocalized"];

const NAME_POINTERS: &[&str] = &["/listing/name", "/listing/nameLocalized"];

const TITLE_POINTERS: &[&str] = &["/listing/title", "/title"];

/// Extracts listings from a rendered search-results document.
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    listing_base_url: String,
}

impl Default for ListingExtractor {
    fn default() -> Self {
        Self::new("https://www.airbnb.com")
    }
}

impl ListingExtractor {
    /// Create an extractor building detail links on `listing_base_url`.
    pub fn new(listing_base_url: impl Into<String>) -> Self {
        Self {
            listing_base_url: listing_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Extract listings from `document`.
    ///
    /// Never fails: a missing or malformed payload is reported as
    /// [`Extraction::NoData`] with a reason.
    pub fn extract(&self, document: &str) -> Extraction {
        let Some((selector, payload)) = find_payload(document) else {
            return Extraction::no_data("no embedded search payload found");
        };

        let data: Value = match serde_json::from_str(&payload) {
            Ok(data) => data,
            Err(e) => {
                return Extraction::no_data(format!(
                    "payload in {} is not valid JSON: {}",
                    selector, e
                ))
            }
        };

        // An empty array only counts when no other path has results
        let resolved: Vec<_> = RESULT_PATHS
            .iter()
            .filter_map(|path| path.resolve(&data).map(|results| (path, results)))
            .collect();
        let Some(&(path, results)) = resolved
            .iter()
            .find(|(_, results)| !results.is_empty())
            .or_else(|| resolved.first())
        else {
            return Extraction::no_data(format!(
                "payload in {} has no search results array",
                selector
            ));
        };

        debug!(
            selector = selector,
            path = path.name,
            results = results.len(),
            "Located search results"
        );

        Extraction::Found(results.iter().map(|item| self.listing_from_item(item)).collect())
    }

    /// Extract listings and make their links open with the stay dates and
    /// guests of `search_url`.
    pub fn extract_for_search(&self, document: &str, search_url: &str) -> Extraction {
        self.extract_with_stay(document, &StayParams::from_search_url(search_url))
    }

    /// Extract listings and put `stay` on every listing link.
    pub fn extract_with_stay(&self, document: &str, stay: &StayParams) -> Extraction {
        match self.extract(document) {
            Extraction::Found(listings) => Extraction::Found(
                listings
                    .into_iter()
                    .map(|listing| {
                        if listing.url.is_empty() {
                            listing
                        } else {
                            let url = stay.apply(&listing.url);
                            listing.with_url(url)
                        }
                    })
                    .collect(),
            ),
            no_data => no_data,
        }
    }

    fn listing_from_item(&self, item: &Value) -> Listing {
        let (price, currency) = first_text(item, PRICE_POINTERS)
            .map(parse_price)
            .unwrap_or_default();
        let (rating, review_count) = parse_rating(first_text(item, RATING_POINTERS));

        match first_id(item) {
            Some(id) => Listing {
                url: format!("{}/rooms/{}", self.listing_base_url, id),
                id,
                price,
                currency,
                rating,
                review_count,
                name: text_or_missing(item, NAME_POINTERS),
                title: text_or_missing(item, TITLE_POINTERS),
            },
            None => Listing {
                id: String::new(),
                url: String::new(),
                price,
                currency,
                rating,
                review_count,
                name: MISSING_FIELD.to_string(),
                title: MISSING_FIELD.to_string(),
            },
        }
    }
}

/// First payload element with non-empty text, with the selector that found it.
fn find_payload(document: &str) -> Option<(&'static str, String)> {
    let html = Html::parse_document(document);

    PAYLOAD_SELECTORS.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        html.select(&selector).find_map(|element| {
            let text: String = element.text().collect();
            if text.trim().is_empty() {
                None
            } else {
                Some((*raw, text))
            }
        })
    })
}

fn first_id(item: &Value) -> Option<String> {
    ID_POINTERS
        .iter()
        .find_map(|pointer| match item.pointer(pointer)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn first_text<'a>(item: &'a Value, pointers: &[&str]) -> Option<&'a str> {
    pointers
        .iter()
        .filter_map(|pointer| item.pointer(pointer).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

fn text_or_missing(item: &Value, pointers: &[&str]) -> String {
    first_text(item, pointers)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| MISSING_FIELD.to_string())
}
