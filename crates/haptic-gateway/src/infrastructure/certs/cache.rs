//! Certificate cache record.
//!
//! The sole durable state of the gateway besides the identity file itself:
//! when the remote source was last checked and what was downloaded. Read at
//! startup, overwritten after every successful fetch. A corrupt or missing
//! record simply means "refresh now" — it is never an error.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// On-disk record, stored as JSON next to the identity file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub last_checked: DateTime<Utc>,
    pub downloaded_at: DateTime<Utc>,
    /// Revision identifier of the fetched archive, when the source provides
    /// one. The raw-file source does not, so this stays `None` today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_revision: Option<String>,
}

impl CacheRecord {
    /// Fresh record stamped with the current instant.
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            last_checked: now,
            downloaded_at: now,
            source_revision: None,
        }
    }
}

/// Loads the record, degrading unreadable or unparseable files to `None`.
pub fn load_record(path: &Path) -> Option<CacheRecord> {
    if !path.exists() {
        return None;
    }
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to read cache record");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to parse cache record");
            None
        }
    }
}

/// Saves the record. Failures are logged, never fatal — the only cost of a
/// lost record is an extra refresh check on the next start.
pub fn save_record(path: &Path, record: &CacheRecord) {
    let json = match serde_json::to_string_pretty(record) {
        Ok(json) => json,
        Err(err) => {
            warn!(%err, "failed to serialize cache record");
            return;
        }
    };
    if let Err(err) = std::fs::write(path, json) {
        warn!(path = %path.display(), %err, "failed to save cache record");
    }
}

/// A refresh fetch is due iff no record exists or the last check is at least
/// `interval_hours` old (boundary inclusive: exactly the interval ⇒ true).
pub fn should_refresh(
    record: Option<&CacheRecord>,
    now: DateTime<Utc>,
    interval_hours: i64,
) -> bool {
    match record {
        None => true,
        Some(record) => now - record.last_checked >= Duration::hours(interval_hours),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().expect("timestamp")
    }

    fn record_checked_at(s: &str) -> CacheRecord {
        CacheRecord {
            last_checked: at(s),
            downloaded_at: at(s),
            source_revision: None,
        }
    }

    #[test]
    fn test_no_record_means_refresh() {
        assert!(should_refresh(None, Utc::now(), 24));
    }

    #[test]
    fn test_recent_check_skips_refresh() {
        let record = record_checked_at("2026-06-01T12:00:00Z");
        let now = at("2026-06-02T11:59:59Z");
        assert!(!should_refresh(Some(&record), now, 24));
    }

    #[test]
    fn test_exactly_twenty_four_hours_refreshes() {
        let record = record_checked_at("2026-06-01T12:00:00Z");
        let now = at("2026-06-02T12:00:00Z");
        assert!(should_refresh(Some(&record), now, 24));
    }

    #[test]
    fn test_stale_check_refreshes() {
        let record = record_checked_at("2026-05-01T00:00:00Z");
        let now = at("2026-06-01T00:00:00Z");
        assert!(should_refresh(Some(&record), now, 24));
    }

    #[test]
    fn test_record_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("certificate_cache.json");
        let record = record_checked_at("2026-06-01T12:00:00Z");

        save_record(&path, &record);
        let loaded = load_record(&path).expect("record present");

        assert_eq!(loaded, record);
    }

    #[test]
    fn test_missing_record_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_record(&dir.path().join("nope.json")).is_none());
    }

    #[test]
    fn test_corrupt_record_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("certificate_cache.json");
        std::fs::write(&path, "{not json").expect("write");
        assert!(load_record(&path).is_none());
    }
}
