//! HTML message formatting for listing alerts.

use url::Url;

use crate::listing::{Listing, MISSING_FIELD};

use super::{total_listings, SearchAlert};

/// Maximum message length accepted by the Telegram Bot API, in UTF-16 units.
pub const MESSAGE_LIMIT: usize = 4096;

const SEPARATOR: &str = "➖➖➖➖➖➖➖➖➖➖➖➖\n\n";

/// Describes a saved search from its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSummary {
    pub location: String,
    pub dates: String,
    pub guests: String,
    pub price_range: String,
}

impl SearchSummary {
    pub fn from_url(search_url: &str) -> Self {
        let Ok(url) = Url::parse(search_url) else {
            return Self {
                location: "Unknown location".to_string(),
                dates: "Unknown dates".to_string(),
                guests: "Unknown guests".to_string(),
                price_range: "Unknown price range".to_string(),
            };
        };

        let param = |name: &str| -> String {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default()
        };

        Self {
            location: location_from_path(url.path()),
            dates: dates_label(&param("checkin"), &param("checkout")),
            guests: guests_label(&param("adults"), &param("children")),
            price_range: price_range_label(&param("price_min"), &param("price_max")),
        }
    }
}

/// `/s/<location>/...` with dashes as spaces.
fn location_from_path(path: &str) -> String {
    let segment = path
        .strip_prefix("/s/")
        .and_then(|rest| rest.split('/').next())
        .filter(|s| !s.is_empty());

    match segment {
        Some(raw) => {
            let spaced = raw.replace('-', " ");
            urlencoding::decode(&spaced)
                .map(|s| s.into_owned())
                .unwrap_or(spaced)
        }
        None => "Unknown location".to_string(),
    }
}

fn dates_label(checkin: &str, checkout: &str) -> String {
    if checkin.is_empty() || checkout.is_empty() {
        "No dates specified".to_string()
    } else {
        format!("{} to {}", checkin, checkout)
    }
}

fn guests_label(adults: &str, children: &str) -> String {
    let adults = if adults.is_empty() { "0" } else { adults };
    let mut label = format!(
        "{} {}",
        adults,
        if adults == "1" { "adult" } else { "adults" }
    );
    if children.parse::<u32>().unwrap_or(0) > 0 {
        label.push_str(&format!(
            ", {} {}",
            children,
            if children == "1" { "child" } else { "children" }
        ));
    }
    label
}

fn price_range_label(min: &str, max: &str) -> String {
    match (min.is_empty(), max.is_empty()) {
        (false, false) => format!("${} - ${}", min, max),
        (false, true) => format!("From {}", min),
        (true, false) => format!("Up to {}", max),
        (true, true) => "Any price".to_string(),
    }
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{} {}", count, if count == 1 { one } else { many })
}

fn header(alerts: &[&SearchAlert]) -> String {
    let total: usize = alerts.iter().map(|a| a.listings.len()).sum();
    format!(
        "🔔 <b>{} Found Across {}</b>\n\n",
        plural(total, "New Listing", "New Listings"),
        plural(alerts.len(), "Search", "Searches")
    )
}

fn listing_block(index: usize, listing: &Listing) -> String {
    let name = if listing.name.is_empty() || listing.name == MISSING_FIELD {
        "Property Listing"
    } else {
        &listing.name
    };
    let price = listing.price_label();
    let price = if price.is_empty() {
        "Price unavailable".to_string()
    } else {
        escape_html(&price)
    };
    let rating = if listing.rating > 0.0 {
        format!("⭐{:.1} ({})", listing.rating, listing.review_count)
    } else {
        "No ratings".to_string()
    };

    format!(
        "  {}. <b>{}</b>\n  💰 {} • {}\n  🔗 <a href=\"{}\">View listing</a>\n\n",
        index,
        escape_html(name),
        price,
        rating,
        escape_html(&listing.url)
    )
}

fn search_block(number: usize, alert: &SearchAlert) -> String {
    let summary = SearchSummary::from_url(&alert.search_url);
    let mut block = format!(
        "<b>Search {}: {}</b>\n📅 {} • 👥 {} • 💰 {}\n🔍 <a href=\"{}\">View all results</a>\n\n",
        number,
        escape_html(&summary.location),
        escape_html(&summary.dates),
        escape_html(&summary.guests),
        escape_html(&summary.price_range),
        escape_html(&alert.search_url)
    );
    for (i, listing) in alert.listings.iter().enumerate() {
        block.push_str(&listing_block(i + 1, listing));
    }
    block
}

fn non_empty(alerts: &[SearchAlert]) -> Vec<&SearchAlert> {
    alerts.iter().filter(|a| !a.listings.is_empty()).collect()
}

/// The full aggregated message, or `None` when there is nothing to report.
pub fn format_aggregated(alerts: &[SearchAlert]) -> Option<String> {
    if total_listings(alerts) == 0 {
        return None;
    }
    let alerts = non_empty(alerts);

    let mut message = header(&alerts);
    for (i, alert) in alerts.iter().enumerate() {
        if i > 0 {
            message.push_str(SEPARATOR);
        }
        message.push_str(&search_block(i + 1, alert));
    }
    Some(message)
}

fn text_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// The aggregated message split into chunks of at most `limit` UTF-16 units.
///
/// Splits happen between searches first, then between lines of an oversized
/// search block.
pub fn format_messages(alerts: &[SearchAlert], limit: usize) -> Vec<String> {
    if total_listings(alerts) == 0 {
        return Vec::new();
    }
    let alerts = non_empty(alerts);

    let mut pieces = vec![header(&alerts)];
    for (i, alert) in alerts.iter().enumerate() {
        let mut block = String::new();
        if i > 0 {
            block.push_str(SEPARATOR);
        }
        block.push_str(&search_block(i + 1, alert));
        pieces.push(block);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for piece in pieces {
        if text_len(&current) + text_len(&piece) <= limit {
            current.push_str(&piece);
            continue;
        }
        if text_len(&piece) <= limit {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current = piece;
            continue;
        }
        for line in piece.split_inclusive('\n') {
            if text_len(&current) + text_len(line) > limit && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            if text_len(line) > limit {
                chunks.push(truncate_line(line, limit));
            } else {
                current.push_str(line);
            }
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .map(|c| c.trim_start_matches(SEPARATOR).to_string())
        .filter(|c| !c.trim().is_empty())
        .collect()
}

/// Cut an oversized line down to `limit` UTF-16 units.
///
/// Markup is dropped so the result never holds a half-open tag, and entities
/// are kept whole.
fn truncate_line(line: &str, limit: usize) -> String {
    let budget = limit.saturating_sub(2);
    let mut out = String::new();
    let mut used = 0;
    let mut rest = line;

    while let Some(c) = rest.chars().next() {
        if c == '<' {
            let end = rest.find('>').map_or(rest.len(), |i| i + 1);
            rest = &rest[end..];
            continue;
        }
        let token = match (c, rest.find(';')) {
            ('&', Some(end)) if end <= 8 => &rest[..=end],
            _ => &rest[..c.len_utf8()],
        };
        let units = text_len(token);
        if used + units > budget {
            out.push_str("…\n");
            break;
        }
        out.push_str(token);
        used += units;
        rest = &rest[token.len()..];
    }
    out
}
