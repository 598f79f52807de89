//! Listing extraction from rendered search-result pages.
//!
//! The upstream page embeds its search results in a JSON payload whose
//! location and shape change without notice. Extraction is best-effort:
//! every lookup that fails falls through to the next one, and a page with no
//! usable payload yields [`Extraction::NoData`] instead of an error.

mod extractor;
mod links;
mod parse;
mod types;

pub use extractor::{ListingExtractor, ResultPath, PAYLOAD_SELECTORS, RESULT_PATHS};
pub use links::{actionable_listing_url, StayParams};
pub use parse::{parse_price, parse_rating};
pub use types::{Extraction, Listing, MISSING_FIELD};
