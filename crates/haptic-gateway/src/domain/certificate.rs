//! Certificate lifecycle state.
//!
//! The state is *computed*, never set ad hoc: it is derived once at startup
//! from the presence of the cached identity file and the expiry timestamp of
//! its leaf certificate, and is not re-evaluated while the server runs (the
//! identity is loaded once per process).

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Lifecycle classification of the TLS identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CertificateState {
    /// Initialization has not run yet.
    NotLoaded,
    /// Loaded and more than the warning window away from expiry.
    Valid,
    /// Loaded but inside the warning window (14 days, inclusive).
    ExpiringSoon,
    /// Loaded but past its `notAfter` date. Still returned to the caller,
    /// which decides its own risk tolerance.
    Expired,
    /// No usable identity: fetch failed with no cache, file missing, or
    /// parse failure.
    Error,
}

/// State plus operator-facing context, as surfaced by the health endpoint
/// and the host status channel.
///
/// Invariant: `message` is `Some` exactly when `state != Valid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateReport {
    pub state: CertificateState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CertificateReport {
    /// Report used before `initialize` has run.
    pub fn not_loaded() -> Self {
        Self {
            state: CertificateState::NotLoaded,
            message: Some("Certificate not loaded".to_string()),
            expires_at: None,
        }
    }
}

/// Classifies a loaded identity by its expiry timestamp.
///
/// Boundaries: `not_after < now` is [`CertificateState::Expired`]; exactly
/// `warning_days` days remaining is [`CertificateState::ExpiringSoon`]
/// (inclusive); otherwise [`CertificateState::Valid`].
pub fn classify_expiry(
    not_after: DateTime<Utc>,
    now: DateTime<Utc>,
    warning_days: i64,
) -> CertificateState {
    if not_after < now {
        CertificateState::Expired
    } else if not_after - now <= Duration::days(warning_days) {
        CertificateState::ExpiringSoon
    } else {
        CertificateState::Valid
    }
}

/// Builds the report for a successfully loaded identity, pairing the
/// computed state with its operator message.
pub fn report_for_loaded(
    not_after: DateTime<Utc>,
    now: DateTime<Utc>,
    warning_days: i64,
) -> CertificateReport {
    let state = classify_expiry(not_after, now, warning_days);
    let message = match state {
        CertificateState::Expired => Some(
            "TLS certificate expired. Restart the gateway to download a new one.".to_string(),
        ),
        CertificateState::ExpiringSoon => {
            let days_left = (not_after - now).num_days();
            Some(format!(
                "TLS certificate expires in {days_left} days. It should have auto-renewed by now."
            ))
        }
        _ => None,
    };
    CertificateReport {
        state,
        message,
        expires_at: Some(not_after),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
