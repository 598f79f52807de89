use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::SearchFingerprint;

/// Metadata hash field: first successful update.
pub(crate) const FIELD_CREATED: &str = "createMs";
/// Metadata hash field: last scan, `0` after a failure.
pub(crate) const FIELD_LAST_SCAN: &str = "lastScanMs";
/// Metadata hash field: when the last failure happened.
pub(crate) const FIELD_LAST_FAILURE: &str = "lastFailureMs";

/// Outcome of the most recent scan of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanStatus {
    /// Never scanned.
    Never,
    /// Last scan succeeded at this time.
    At { at: DateTime<Utc> },
    /// Last scan failed. `at` is unknown for records that only carry the
    /// `lastScanMs = 0` marker.
    Failed { at: Option<DateTime<Utc>> },
}

impl ScanStatus {
    /// Decode from the raw metadata hash fields.
    pub(crate) fn from_fields(fields: &HashMap<String, String>) -> Self {
        let failure = fields.get(FIELD_LAST_FAILURE).and_then(|v| parse_millis(v));
        if let Some(at) = failure {
            return ScanStatus::Failed { at: Some(at) };
        }

        match fields.get(FIELD_LAST_SCAN) {
            None => ScanStatus::Never,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(0) => ScanStatus::Failed { at: None },
                Ok(ms) => DateTime::from_timestamp_millis(ms)
                    .map(|at| ScanStatus::At { at })
                    .unwrap_or(ScanStatus::Failed { at: None }),
                Err(_) => ScanStatus::Never,
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ScanStatus::Failed { .. })
    }

    /// Human-readable label for status output.
    pub fn label(&self) -> String {
        match self {
            ScanStatus::Never => "never".to_string(),
            ScanStatus::At { at } => at.to_rfc3339(),
            ScanStatus::Failed { at: Some(at) } => format!("failed at {}", at.to_rfc3339()),
            ScanStatus::Failed { at: None } => "failed".to_string(),
        }
    }
}

/// Read model of one search's persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub search_url: String,
    pub fingerprint: SearchFingerprint,
    pub created_at: Option<DateTime<Utc>>,
    pub last_scan: ScanStatus,
    /// Number of listing ids ever seen.
    pub property_count: usize,
}

pub(crate) fn parse_millis(raw: &str) -> Option<DateTime<Utc>> {
    match raw.trim().parse::<i64>() {
        Ok(ms) if ms > 0 => DateTime::from_timestamp_millis(ms),
        _ => None,
    }
}

pub(crate) fn now_millis() -> String {
    Utc::now().timestamp_millis().to_string()
}
