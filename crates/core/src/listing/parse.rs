//! Display-string parsers for price and rating.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Leading currency symbol followed by digits, e.g. "£250 night" or "€1,250".
static PRICE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([£$€])\s*(\d[\d,]*)").unwrap());

/// "4.85 (120)"
static RATING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.?\d*)\s*\((\d+)\)").unwrap());

/// Parse a price display string into `(amount, currency_symbol)`.
///
/// Anything without a recognised symbol and amount yields `(0, "")`.
pub fn parse_price(text: &str) -> (u64, String) {
    PRICE_RE
        .captures(text)
        .and_then(|caps| {
            let amount: u64 = caps[2].replace(',', "").parse().ok()?;
            Some((amount, caps[1].to_string()))
        })
        .unwrap_or_default()
}

/// Parse a "rating (count)" display string into `(rating, review_count)`.
pub fn parse_rating(text: Option<&str>) -> (f64, u64) {
    text.and_then(|t| RATING_RE.captures(t))
        .and_then(|caps| {
            let rating: f64 = caps[1].parse().ok()?;
            let count: u64 = caps[2].parse().ok()?;
            Some((rating, count))
        })
        .unwrap_or((0.0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price_with_suffix() {
        assert_eq!(parse_price("£250 night"), (250, "£".to_string()));
    }

    #[test]
    fn test_parse_price_unparseable() {
        assert_eq!(parse_price("N/A"), (0, String::new()));
        assert_eq!(parse_price(""), (0, String::new()));
        assert_eq!(parse_price("£"), (0, String::new()));
    }

    #[test]
    fn test_parse_price_other_symbols() {
        assert_eq!(parse_price("$99"), (99, "$".to_string()));
        assert_eq!(parse_price("€ 75 per night"), (75, "€".to_string()));
    }

    #[test]
    fn test_parse_price_thousands_separator() {
        assert_eq!(parse_price("£1,250 total"), (1250, "£".to_string()));
    }

    #[test]
    fn test_parse_price_takes_first_amount() {
        // Discounted listings show the original price after the current one
        assert_eq!(parse_price("£180 £210 night"), (180, "£".to_string()));
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating(Some("4.85 (120)")), (4.85, 120));
        assert_eq!(parse_rating(Some("5.0 (3)")), (5.0, 3));
    }

    #[test]
    fn test_parse_rating_absent() {
        assert_eq!(parse_rating(None), (0.0, 0));
        assert_eq!(parse_rating(Some("New")), (0.0, 0));
        assert_eq!(parse_rating(Some("")), (0.0, 0));
    }

    #[test]
    fn test_parse_rating_integer_score() {
        assert_eq!(parse_rating(Some("5 (1)")), (5.0, 1));
    }
}
