//! Device detection.
//!
//! Polls on a timer and folds three probes into one cached
//! [`DeviceStatus`] snapshot, trying them in priority order and
//! short-circuiting on the first match:
//!
//! 1. **Direct HID enumeration** — a known peripheral product id surfaced as
//!    a HID node. The transport is classified from the product id's high
//!    byte (Bluetooth range vs. receiver range).
//! 2. **Receiver query** — a known receiver product id is present, so the
//!    connection-state register decides whether a peripheral is actually
//!    active behind it. A reachable receiver with an empty bitmap is an
//!    explicit *disconnected*, not a fall-through.
//! 3. **Platform Bluetooth fallback** — for pairings invisible to HID
//!    enumeration (see [`bluetooth`]).
//!
//! The snapshot is replaced wholesale under a lock (single writer, many
//! readers); subscribers are notified through a `watch` channel exactly when
//! `is_connected` or `connection_type` changes. Detection failures of any
//! kind degrade to "disconnected" — polling never stops because a probe
//! misbehaved.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use haptic_core::protocol::client::{query_connection_bitmap, query_paired_slots};
use haptic_core::status::{DeviceConnectionType, DeviceStatus, HidDeviceSummary, QueryResult};

use crate::application::DeviceInventory;
use crate::domain::config::DeviceIdentityConfig;
use crate::infrastructure::hid::HidBackend;

pub mod bluetooth;

use bluetooth::BluetoothProbe;

/// Product-id high byte marking a direct Bluetooth HID node.
const BLUETOOTH_PID_RANGE: u16 = 0xB000;

/// Product-id high byte marking a peripheral paired through the receiver.
const DONGLE_PID_RANGE: u16 = 0x4100;

/// Polling orchestrator with an atomically swapped status snapshot.
pub struct DeviceDetector {
    inner: Arc<DetectorInner>,
    running: Arc<AtomicBool>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

struct DetectorInner {
    backend: Arc<dyn HidBackend>,
    probe: Arc<dyn BluetoothProbe>,
    identity: DeviceIdentityConfig,
    cached: RwLock<DeviceStatus>,
    change_tx: watch::Sender<DeviceStatus>,
}

impl DeviceDetector {
    pub fn new(
        backend: Arc<dyn HidBackend>,
        probe: Arc<dyn BluetoothProbe>,
        identity: DeviceIdentityConfig,
    ) -> Self {
        let initial = DeviceStatus::disconnected();
        let (change_tx, _) = watch::channel(initial.clone());
        Self {
            inner: Arc::new(DetectorInner {
                backend,
                probe,
                identity,
                cached: RwLock::new(initial),
                change_tx,
            }),
            running: Arc::new(AtomicBool::new(false)),
            poll_task: Mutex::new(None),
        }
    }

    /// Starts the timer-driven poll loop. Detection runs on the blocking
    /// pool so HID timeouts never stall the async runtime.
    pub fn start_polling(&self, interval: Duration) {
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let running = Arc::clone(&self.running);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            while running.load(Ordering::Relaxed) {
                ticker.tick().await;
                let poll_inner = Arc::clone(&inner);
                match tokio::task::spawn_blocking(move || poll_inner.detect()).await {
                    Ok(status) => inner.apply(status),
                    Err(err) => warn!(%err, "detection task failed"),
                }
            }
            debug!("device polling stopped");
        });
        if let Ok(mut slot) = self.poll_task.lock() {
            *slot = Some(handle);
        }
    }

    /// Stops the poll loop. An in-flight poll is allowed to complete or time
    /// out naturally — it is not force-cancelled.
    pub fn stop_polling(&self) {
        self.running.store(false, Ordering::Relaxed);
        if let Ok(mut slot) = self.poll_task.lock() {
            slot.take();
        }
    }

    /// Latest snapshot without triggering a poll.
    pub fn cached_status(&self) -> DeviceStatus {
        match self.inner.cached.read() {
            Ok(cached) => cached.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Change notifications: receives a value exactly when `is_connected` or
    /// `connection_type` transitions.
    pub fn subscribe(&self) -> watch::Receiver<DeviceStatus> {
        self.inner.change_tx.subscribe()
    }

    /// One synchronous detect-and-apply cycle. The poll loop calls this on
    /// the blocking pool; tests call it directly.
    pub fn poll_once(&self) {
        let status = self.inner.detect();
        self.inner.apply(status);
    }
}

impl DetectorInner {
    /// Swaps in the new snapshot and notifies on transitions.
    fn apply(&self, status: DeviceStatus) {
        let transitioned = {
            let mut cached = match self.cached.write() {
                Ok(cached) => cached,
                Err(poisoned) => poisoned.into_inner(),
            };
            let transitioned = status.is_transition_from(&cached);
            *cached = status.clone();
            transitioned
        };
        if transitioned {
            debug!(
                connected = status.is_connected,
                connection_type = ?status.connection_type,
                "device status transition"
            );
            let _ = self.change_tx.send(status);
        }
    }

    /// Runs the priority detection chain. Infallible: every probe failure
    /// collapses into the disconnected snapshot.
    fn detect(&self) -> DeviceStatus {
        let devices = self.backend.enumerate();

        // 1. Direct connection: the peripheral itself is a HID node.
        for device in &devices {
            if self.identity.is_peripheral(device.product_id) {
                return DeviceStatus {
                    is_connected: true,
                    connection_type: classify_by_pid(device.product_id),
                    device_name: Some(device.display_name()),
                    product_id: Some(format!("0x{:04X}", device.product_id)),
                    vendor_id: Some(format!("0x{:04X}", device.vendor_id)),
                };
            }
        }

        // 2. Receiver present: ask it whether anything is active.
        if let Some(receiver) = devices
            .iter()
            .find(|d| self.identity.is_receiver(d.product_id))
        {
            let mut links = self.backend.open_receiver_links();
            let result = query_connection_bitmap(&mut links);
            if result.success {
                return match result.connected_devices.first() {
                    Some(record) => DeviceStatus {
                        is_connected: true,
                        connection_type: DeviceConnectionType::DongleLink,
                        device_name: record.device_name.clone(),
                        product_id: Some(format!("0x{:04X}", receiver.product_id)),
                        vendor_id: Some(format!("0x{:04X}", receiver.vendor_id)),
                    },
                    // Receiver reachable, bitmap empty: explicitly disconnected.
                    None => DeviceStatus {
                        is_connected: false,
                        connection_type: DeviceConnectionType::None,
                        device_name: Some("Receiver (no paired device active)".to_string()),
                        product_id: Some(format!("0x{:04X}", receiver.product_id)),
                        vendor_id: Some(format!("0x{:04X}", receiver.vendor_id)),
                    },
                };
            }
            debug!("receiver query failed, falling through to Bluetooth probe");
        }

        // 3. Platform fallback for pairings HID enumeration cannot see.
        if let Some(peripheral) = self.probe.probe() {
            return DeviceStatus {
                is_connected: true,
                connection_type: DeviceConnectionType::Bluetooth,
                device_name: Some(peripheral.name),
                product_id: peripheral
                    .product_id
                    .or_else(|| Some(self.identity.bluetooth_fallback_product_id.clone())),
                vendor_id: Some(format!("0x{:04X}", self.identity.vendor_id)),
            };
        }

        DeviceStatus::disconnected()
    }
}

/// Transport classification from the product id's high byte.
fn classify_by_pid(product_id: u16) -> DeviceConnectionType {
    match product_id & 0xFF00 {
        BLUETOOTH_PID_RANGE => DeviceConnectionType::Bluetooth,
        DONGLE_PID_RANGE => DeviceConnectionType::DongleLink,
        _ => DeviceConnectionType::Unknown,
    }
}

// ── Inventory port ────────────────────────────────────────────────────────────

impl DeviceInventory for DeviceDetector {
    fn cached_status(&self) -> DeviceStatus {
        DeviceDetector::cached_status(self)
    }

    fn enumerate(&self) -> Vec<HidDeviceSummary> {
        self.inner
            .backend
            .enumerate()
            .iter()
            .map(|device| device.summarize(&self.inner.identity))
            .collect()
    }

    fn receiver_diagnostics(&self) -> (QueryResult, QueryResult) {
        let mut links = self.inner.backend.open_receiver_links();
        let paired = query_paired_slots(&mut links);
        // Fresh links: the paired-slot sweep may have consumed the interface.
        let mut links = self.inner.backend.open_receiver_links();
        let state = query_connection_bitmap(&mut links);
        (paired, state)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
