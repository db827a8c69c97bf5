//! Self-provisioning certificate lifecycle manager.
//!
//! Owns the TLS identity from fetch to classification:
//!
//! 1. Ensure the cache directory exists and load the [`cache::CacheRecord`].
//! 2. When a refresh is due (daily, or no record), fetch the
//!    password-protected archive and extract it flattened into the cache
//!    directory; overwrite the record on success.
//! 3. Load the cached identity file and classify it against its expiry.
//!
//! Failure posture: nothing here ever propagates an error past the manager
//! boundary. Every remote, archive, and parse failure degrades to a
//! [`CertificateState`] plus an operator-actionable message; the caller only
//! sees `initialize() -> bool` ("is there a usable identity?"). A fetch 404
//! ("not published yet") is transient and non-fatal; other fetch errors are
//! fatal only when no cached identity exists to fall back on.

use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::StatusSeverity;
use crate::domain::certificate::{report_for_loaded, CertificateReport, CertificateState};
use crate::domain::config::CertificateSourceConfig;

pub mod archive;
pub mod cache;
pub mod identity;

pub use identity::TlsIdentity;

use archive::FetchOutcome;

/// Errors internal to the certificate subsystem. These never cross the
/// manager boundary — `initialize` folds them into state + message.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Manages the on-disk identity cache and produces the loaded identity.
pub struct CertificateManager {
    cache_dir: PathBuf,
    source: CertificateSourceConfig,
    http: reqwest::Client,
    report: CertificateReport,
    identity: Option<TlsIdentity>,
}

impl CertificateManager {
    pub fn new(cache_dir: PathBuf, source: CertificateSourceConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("haptic-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            cache_dir,
            source,
            http,
            report: CertificateReport::not_loaded(),
            identity: None,
        }
    }

    /// Runs the full provisioning sequence.
    ///
    /// Returns `true` iff a usable identity was loaded — including expired
    /// and expiring-soon identities, which are returned for the caller's own
    /// risk tolerance. `false` means no identity: the server cannot start,
    /// but the process keeps running.
    pub async fn initialize(&mut self) -> bool {
        if let Err(err) = std::fs::create_dir_all(&self.cache_dir) {
            self.fail(format!(
                "Cannot create certificate cache directory: {err}. \
                 TLS setup failed; try restarting the gateway."
            ));
            return false;
        }

        let record = cache::load_record(&self.cache_file_path());
        if cache::should_refresh(record.as_ref(), Utc::now(), self.source.refresh_interval_hours)
        {
            info!("checking for a new certificate archive");
            match self.try_download().await {
                Ok(FetchOutcome::Downloaded) => {
                    cache::save_record(&self.cache_file_path(), &cache::CacheRecord::now());
                    info!("certificate archive downloaded and extracted");
                }
                Ok(FetchOutcome::NotPublished) => {
                    warn!("certificate archive not published yet; using cached identity if any");
                }
                Err(err) => {
                    if self.has_cached_identity() {
                        warn!(%err, "certificate refresh failed; falling back to cached identity");
                    } else {
                        error!(%err, "certificate fetch failed with no cached identity");
                        self.fail(
                            "Can't download the TLS certificate. Check your internet \
                             connection and try restarting the gateway."
                                .to_string(),
                        );
                        return false;
                    }
                }
            }
        }

        self.load_cached_identity()
    }

    /// State + message + expiry for the health endpoint and status channel.
    pub fn report(&self) -> CertificateReport {
        self.report.clone()
    }

    /// The loaded identity, when `initialize` returned `true`.
    pub fn identity(&self) -> Option<&TlsIdentity> {
        self.identity.as_ref()
    }

    /// Operator severity for the current state.
    pub fn severity(&self) -> StatusSeverity {
        match self.report.state {
            CertificateState::Valid => StatusSeverity::Normal,
            CertificateState::NotLoaded
            | CertificateState::ExpiringSoon
            | CertificateState::Expired => StatusSeverity::Warning,
            CertificateState::Error => StatusSeverity::Error,
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn cache_file_path(&self) -> PathBuf {
        self.cache_dir.join(&self.source.cache_file)
    }

    fn identity_file_path(&self) -> PathBuf {
        self.cache_dir.join(&self.source.identity_file)
    }

    fn has_cached_identity(&self) -> bool {
        self.identity_file_path().is_file()
    }

    /// Fetches and extracts the archive. The downloaded zip is deleted
    /// afterwards whether or not extraction succeeded.
    async fn try_download(&self) -> Result<FetchOutcome, CertificateError> {
        let zip_path = self.cache_dir.join("identity-archive.zip");

        let outcome = archive::fetch_archive(&self.http, &self.source.archive_url, &zip_path)
            .await;
        let result = match outcome {
            Ok(FetchOutcome::Downloaded) => archive::extract_flattened(
                &zip_path,
                &self.cache_dir,
                &self.source.archive_password,
            )
            .map(|_| FetchOutcome::Downloaded),
            other => other,
        };

        if zip_path.exists() {
            if let Err(err) = std::fs::remove_file(&zip_path) {
                warn!(%err, "failed to remove downloaded archive");
            }
        }
        result
    }

    /// Loads and classifies the cached identity file.
    fn load_cached_identity(&mut self) -> bool {
        let path = self.identity_file_path();
        if !path.is_file() {
            self.fail(
                "TLS certificate not found. Check your internet connection and restart \
                 the gateway."
                    .to_string(),
            );
            return false;
        }

        match identity::load_identity(&path) {
            Ok(loaded) => {
                self.report = report_for_loaded(
                    loaded.not_after,
                    Utc::now(),
                    self.source.expiry_warning_days,
                );
                match self.report.state {
                    CertificateState::Valid => {
                        info!(expires = %loaded.not_after.format("%Y-%m-%d"), "TLS certificate valid");
                    }
                    _ => {
                        if let Some(message) = &self.report.message {
                            warn!(%message, "certificate loaded with warnings");
                        }
                    }
                }
                self.identity = Some(loaded);
                true
            }
            Err(err) => {
                self.fail(format!("Failed to load the TLS certificate: {err}"));
                false
            }
        }
    }

    fn fail(&mut self, message: String) {
        error!(%message);
        self.report = CertificateReport {
            state: CertificateState::Error,
            message: Some(message),
            expires_at: None,
        };
        self.identity = None;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn source_with_unreachable_remote() -> CertificateSourceConfig {
        CertificateSourceConfig {
            // Reserved TLD: connection fails fast without touching a real host.
            archive_url: "https://gateway-certs.invalid/bundle.zip".to_string(),
            identity_file: "identity.pem".to_string(),
            ..Default::default()
        }
    }

    fn write_identity(dir: &std::path::Path) {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .expect("generate");
        let bundle = format!(
            "{}{}",
            certified.cert.pem(),
            certified.key_pair.serialize_pem()
        );
        std::fs::write(dir.join("identity.pem"), bundle).expect("write identity");
    }

    #[tokio::test]
    async fn test_fetch_failure_without_cache_is_fatal_error_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut manager = CertificateManager::new(
            dir.path().to_path_buf(),
            source_with_unreachable_remote(),
        );

        assert!(!manager.initialize().await);
        assert_eq!(manager.report().state, CertificateState::Error);
        assert!(manager.report().message.is_some());
        assert!(manager.identity().is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_with_cached_identity_still_loads() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_identity(dir.path());
        let mut manager = CertificateManager::new(
            dir.path().to_path_buf(),
            source_with_unreachable_remote(),
        );

        assert!(manager.initialize().await);
        assert_eq!(manager.report().state, CertificateState::Valid);
        assert!(manager.identity().is_some());
    }

    #[tokio::test]
    async fn test_fresh_record_skips_fetch_entirely() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_identity(dir.path());
        let source = source_with_unreachable_remote();
        cache::save_record(
            &dir.path().join(&source.cache_file),
            &cache::CacheRecord::now(),
        );
        let mut manager = CertificateManager::new(dir.path().to_path_buf(), source);

        // The unreachable remote would fail, but no fetch is attempted.
        assert!(manager.initialize().await);
        assert_eq!(manager.report().state, CertificateState::Valid);
    }

    #[tokio::test]
    async fn test_valid_state_has_no_message() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_identity(dir.path());
        let source = source_with_unreachable_remote();
        cache::save_record(
            &dir.path().join(&source.cache_file),
            &cache::CacheRecord::now(),
        );
        let mut manager = CertificateManager::new(dir.path().to_path_buf(), source);

        manager.initialize().await;
        assert!(manager.report().message.is_none());
        assert!(matches!(manager.severity(), StatusSeverity::Normal));
    }

    #[tokio::test]
    async fn test_error_state_maps_to_error_severity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut manager = CertificateManager::new(
            dir.path().to_path_buf(),
            source_with_unreachable_remote(),
        );
        manager.initialize().await;
        assert!(matches!(manager.severity(), StatusSeverity::Error));
    }
}
