//! Gateway lifecycle facade.
//!
//! [`HapticGateway`] is what the host application drives: `load()` once at
//! startup (register the catalog, provision certificates, start the
//! detector, start the server), `unload()` once at shutdown. Every failure
//! on the load path degrades — a missing identity or an occupied port leaves
//! the process running without a server, reported through the host status
//! channel.

use std::sync::Arc;

use tracing::{error, info, warn};

use haptic_core::catalog::WaveformCatalog;
use haptic_core::status::DeviceStatus;

use crate::application::{DeviceInventory, EventSink, Router, StatusReporter};
use crate::domain::config::GatewayConfig;
use crate::infrastructure::certs::CertificateManager;
use crate::infrastructure::detector::bluetooth::BluetoothProbe;
use crate::infrastructure::detector::DeviceDetector;
use crate::infrastructure::hid::HidBackend;
use crate::infrastructure::server::SecureControlServer;

/// Operator-facing severity on the host status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSeverity {
    Normal,
    Warning,
    Error,
}

/// The gateway core, wired from config plus the host collaborator seams.
pub struct HapticGateway {
    config: GatewayConfig,
    catalog: WaveformCatalog,
    events: Arc<dyn EventSink>,
    status: Arc<dyn StatusReporter>,
    detector: Arc<DeviceDetector>,
    server: Option<SecureControlServer>,
}

impl HapticGateway {
    pub fn new(
        config: GatewayConfig,
        backend: Arc<dyn HidBackend>,
        probe: Arc<dyn BluetoothProbe>,
        events: Arc<dyn EventSink>,
        status: Arc<dyn StatusReporter>,
    ) -> Self {
        let detector = Arc::new(DeviceDetector::new(
            backend,
            probe,
            config.device.clone(),
        ));
        Self {
            config,
            catalog: WaveformCatalog::standard(),
            events,
            status,
            detector,
            server: None,
        }
    }

    /// Startup sequence. Never fails: degraded outcomes are reported through
    /// the status channel and the process keeps running.
    pub async fn load(&mut self) {
        // Catalog registration with the host event bus.
        for waveform in self.catalog.entries() {
            self.events.register_event(waveform.name, waveform.description);
        }
        info!(count = self.catalog.len(), "registered haptic events");

        // TLS identity provisioning, once per process.
        let mut certificates = CertificateManager::new(
            self.config.certificate_cache_dir(),
            self.config.certificate.clone(),
        );
        certificates.initialize().await;
        let report = certificates.report();
        match &report.message {
            Some(message) => self.status.report(certificates.severity(), message),
            None => self
                .status
                .report(StatusSeverity::Normal, "TLS certificate valid"),
        }

        // Detector runs regardless of certificate state.
        self.detector.start_polling(self.config.poll_interval);

        // Server startup is asynchronous from the host's point of view and
        // degrades to a no-server state on failure.
        let router = Arc::new(Router::new(
            self.catalog.clone(),
            report,
            Arc::clone(&self.detector) as Arc<dyn DeviceInventory>,
            Arc::clone(&self.events),
        ));
        let server = SecureControlServer::new(
            certificates.identity(),
            self.config.listen_port,
            router,
        );
        match server.start().await {
            Ok(()) => {
                self.server = Some(server);
            }
            Err(err) => {
                error!(%err, "control server not started");
                self.status.report(
                    StatusSeverity::Error,
                    &format!("Control server not started: {err}"),
                );
            }
        }
    }

    /// Shutdown sequence: stop the detector, then drain the server.
    pub async fn unload(&mut self) {
        self.detector.stop_polling();
        if let Some(server) = self.server.take() {
            server.stop().await;
        }
        info!("gateway unloaded");
    }

    /// Whether the control server is currently accepting connections.
    pub fn server_running(&self) -> bool {
        self.server.as_ref().is_some_and(SecureControlServer::is_running)
    }

    /// Latest device snapshot, for hosts that render their own status UI.
    pub fn device_status(&self) -> DeviceStatus {
        self.detector.cached_status()
    }
}

// ── Logging collaborators ─────────────────────────────────────────────────────

/// Event sink for standalone runs: raising an event just logs it. Hosts
/// embedding the gateway supply their own sink wired to a real event bus.
pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn register_event(&self, name: &str, description: &str) {
        info!(event = name, %description, "event registered");
    }

    fn raise_event(&self, name: &str) {
        info!(event = name, "event raised");
    }
}

/// Status reporter for standalone runs: severities map onto log levels.
pub struct LoggingStatusReporter;

impl StatusReporter for LoggingStatusReporter {
    fn report(&self, severity: StatusSeverity, message: &str) {
        match severity {
            StatusSeverity::Normal => info!(%message, "status"),
            StatusSeverity::Warning => warn!(%message, "status"),
            StatusSeverity::Error => error!(%message, "status"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::domain::config::CertificateSourceConfig;
    use crate::infrastructure::detector::bluetooth::MockBluetoothProbe;
    use crate::infrastructure::hid::MockHidBackend;

    #[derive(Default)]
    struct RecordingSink {
        registered: Mutex<Vec<String>>,
    }

    impl EventSink for RecordingSink {
        fn register_event(&self, name: &str, _description: &str) {
            self.registered.lock().unwrap().push(name.to_string());
        }
        fn raise_event(&self, _name: &str) {}
    }

    #[derive(Default)]
    struct RecordingStatus {
        reports: Mutex<Vec<(StatusSeverity, String)>>,
    }

    impl StatusReporter for RecordingStatus {
        fn report(&self, severity: StatusSeverity, message: &str) {
            self.reports
                .lock()
                .unwrap()
                .push((severity, message.to_string()));
        }
    }

    fn offline_config(dir: &std::path::Path) -> GatewayConfig {
        GatewayConfig {
            data_dir: dir.to_path_buf(),
            certificate: CertificateSourceConfig {
                archive_url: "https://gateway-certs.invalid/bundle.zip".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn gateway(
        config: GatewayConfig,
        events: Arc<RecordingSink>,
        status: Arc<RecordingStatus>,
    ) -> HapticGateway {
        HapticGateway::new(
            config,
            Arc::new(MockHidBackend::empty()),
            Arc::new(MockBluetoothProbe { result: None }),
            events,
            status,
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_registers_full_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        let events = Arc::new(RecordingSink::default());
        let status = Arc::new(RecordingStatus::default());
        let mut gateway = gateway(offline_config(dir.path()), Arc::clone(&events), status);

        gateway.load().await;

        let registered = events.registered.lock().unwrap().clone();
        assert_eq!(registered.len(), 16);
        assert_eq!(registered[0], "sharp_state_change");
        gateway.unload().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_without_identity_degrades_to_no_server() {
        let dir = tempfile::tempdir().expect("tempdir");
        let events = Arc::new(RecordingSink::default());
        let status = Arc::new(RecordingStatus::default());
        let mut gateway = gateway(
            offline_config(dir.path()),
            events,
            Arc::clone(&status),
        );

        gateway.load().await;

        assert!(!gateway.server_running());
        let reports = status.reports.lock().unwrap().clone();
        // Certificate failure first, then the no-server degradation.
        assert!(reports
            .iter()
            .any(|(severity, _)| *severity == StatusSeverity::Error));
        assert!(reports
            .iter()
            .any(|(_, message)| message.contains("Control server not started")));
        gateway.unload().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_detector_runs_even_when_certificates_fail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let events = Arc::new(RecordingSink::default());
        let status = Arc::new(RecordingStatus::default());
        let mut gateway = gateway(offline_config(dir.path()), events, status);

        gateway.load().await;
        // The detector cache is readable regardless of certificate state.
        assert!(!gateway.device_status().is_connected);
        gateway.unload().await;
    }
}
