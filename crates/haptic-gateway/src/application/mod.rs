//! Application layer: routing and the gateway lifecycle.
//!
//! The traits below are the seams to the host application and to the
//! detector. The HTTP/WebSocket server and the router only ever talk to
//! these traits, so tests drive the full request path with recording fakes
//! and no hardware or host process.

use haptic_core::status::{DeviceStatus, HidDeviceSummary, QueryResult};

pub mod gateway;
pub mod router;

pub use gateway::{HapticGateway, StatusSeverity};
pub use router::Router;

/// Host event dispatch.
///
/// `raise_event` is fire-and-forget from the gateway's perspective: failures
/// are the host's to log, never surfaced to the HTTP caller.
pub trait EventSink: Send + Sync {
    /// Registers a named pattern with the host at load time.
    fn register_event(&self, name: &str, description: &str);

    /// Asks the host to fire the pattern.
    fn raise_event(&self, name: &str);
}

/// Host status channel: operator-facing severity plus message, reported
/// whenever the certificate state is (re)computed or the server degrades.
pub trait StatusReporter: Send + Sync {
    fn report(&self, severity: StatusSeverity, message: &str);
}

/// Read access to device connectivity, served by the detector.
pub trait DeviceInventory: Send + Sync {
    /// Latest cached snapshot; never blocks on a poll.
    fn cached_status(&self) -> DeviceStatus;

    /// Raw vendor-filtered HID enumeration.
    fn enumerate(&self) -> Vec<HidDeviceSummary>;

    /// Runs both receiver queries on demand (diagnostic endpoint).
    fn receiver_diagnostics(&self) -> (QueryResult, QueryResult);
}
