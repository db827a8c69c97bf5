//! Request routing.
//!
//! Maps `(method, path)` onto a typed [`ApiResponse`]. The exact table:
//!
//! | Method | Path             | Handler                                  |
//! |--------|------------------|------------------------------------------|
//! | GET    | `/`              | health/status snapshot                   |
//! | GET    | `/waveforms`     | pattern catalog + count                  |
//! | GET    | `/devices`       | device status + raw enumeration          |
//! | GET    | `/devices/hidpp` | raw receiver query results (diagnostic)  |
//! | POST   | `/haptic/{name}` | validate + dispatch detached, 200        |
//! | other  | any              | `None` → 404 body at the server          |
//!
//! OPTIONS preflight and the `/ws` upgrade never reach the router — the
//! server short-circuits both before routing.
//!
//! Trigger dispatch is a detached task with no result channel back to the
//! HTTP caller: the response returns before actuation, and dispatch failures
//! are observable only in the operator log.

use std::sync::Arc;

use tracing::{debug, info};

use haptic_core::catalog::WaveformCatalog;

use crate::application::{DeviceInventory, EventSink};
use crate::domain::certificate::CertificateReport;
use crate::domain::responses::{
    ApiResponse, DeviceListResponse, EndpointListing, HealthResponse, HidppDiagnosticResponse,
    TriggerAcceptedResponse, WaveformEntry, WaveformListResponse,
};

const SERVICE_NAME: &str = "haptic-gateway";

/// Dispatches validated requests against the catalog, the detector, and the
/// host event sink. Cheap to clone behind an `Arc`; one instance serves all
/// connections.
pub struct Router {
    catalog: WaveformCatalog,
    certificate: CertificateReport,
    inventory: Arc<dyn DeviceInventory>,
    events: Arc<dyn EventSink>,
}

impl Router {
    pub fn new(
        catalog: WaveformCatalog,
        certificate: CertificateReport,
        inventory: Arc<dyn DeviceInventory>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            catalog,
            certificate,
            inventory,
            events,
        }
    }

    /// Number of patterns; the WebSocket channel validates indices against it.
    pub fn pattern_count(&self) -> usize {
        self.catalog.len()
    }

    /// Routes one request. `None` means "no such route" (404 at the server).
    ///
    /// Paths are matched lowercased and without a trailing slash, mirroring
    /// what browsers send after URL normalization.
    pub fn handle(&self, method: &str, path: &str) -> Option<ApiResponse> {
        let method = method.to_ascii_uppercase();
        let path = normalize_path(path);

        debug!(%method, %path, "routing request");

        match (method.as_str(), path.as_str()) {
            ("GET", "/") => Some(self.health()),
            ("GET", "/waveforms") => Some(self.list_waveforms()),
            ("GET", "/devices") => Some(self.list_devices()),
            ("GET", "/devices/hidpp") => Some(self.receiver_diagnostics()),
            ("POST", p) if p.starts_with("/haptic/") || p == "/haptic" => {
                let name = p.strip_prefix("/haptic").unwrap_or("");
                Some(self.trigger(name.trim_matches('/')))
            }
            _ => None,
        }
    }

    /// Validates an index from the binary trigger channel and dispatches it.
    /// Returns `false` for out-of-range indices, which the channel ignores.
    pub fn trigger_by_index(&self, index: u8) -> bool {
        match self.catalog.by_index(index as usize) {
            Some(waveform) => {
                self.dispatch_detached(waveform.name.to_string());
                true
            }
            None => {
                debug!(index, "trigger index out of range, ignored");
                false
            }
        }
    }

    // ── Handlers ─────────────────────────────────────────────────────────────

    fn health(&self) -> ApiResponse {
        ApiResponse::Health(HealthResponse {
            success: true,
            service: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            certificate: self.certificate.clone(),
            device: self.inventory.cached_status(),
            endpoints: EndpointListing::default(),
        })
    }

    fn list_waveforms(&self) -> ApiResponse {
        let waveforms = self
            .catalog
            .entries()
            .iter()
            .enumerate()
            .map(|(index, w)| WaveformEntry {
                name: w.name.to_string(),
                description: w.description.to_string(),
                index,
            })
            .collect::<Vec<_>>();
        ApiResponse::WaveformList(WaveformListResponse {
            success: true,
            count: waveforms.len(),
            waveforms,
        })
    }

    fn list_devices(&self) -> ApiResponse {
        ApiResponse::DeviceList(DeviceListResponse {
            success: true,
            device: self.inventory.cached_status(),
            devices: self.inventory.enumerate(),
        })
    }

    fn receiver_diagnostics(&self) -> ApiResponse {
        let (paired_slots, connection_state) = self.inventory.receiver_diagnostics();
        ApiResponse::HidppDiagnostic(HidppDiagnosticResponse {
            success: true,
            paired_slots,
            connection_state,
        })
    }

    fn trigger(&self, name: &str) -> ApiResponse {
        if name.is_empty() {
            return ApiResponse::bad_request("Waveform name is required", None);
        }
        if !self.catalog.contains(name) {
            return ApiResponse::bad_request(
                format!("Unknown waveform: {name}"),
                Some(self.catalog.names()),
            );
        }

        self.dispatch_detached(name.to_string());
        ApiResponse::TriggerAccepted(TriggerAcceptedResponse {
            success: true,
            waveform: name.to_string(),
        })
    }

    /// Fires the event on a detached task so the HTTP response (or the next
    /// WebSocket frame) is never gated on actuation.
    fn dispatch_detached(&self, name: String) {
        let events = Arc::clone(&self.events);
        tokio::spawn(async move {
            events.raise_event(&name);
            info!(waveform = %name, "haptic event raised");
        });
    }
}

/// Lowercases and strips the trailing slash (except for the root path).
fn normalize_path(path: &str) -> String {
    let lowered = path.to_ascii_lowercase();
    if lowered.len() > 1 {
        lowered.trim_end_matches('/').to_string()
    } else {
        lowered
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
