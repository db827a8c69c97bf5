//! USB HID access.
//!
//! [`HidBackend`] is the seam between the detector and the OS HID stack:
//! enumerate vendor devices and open candidate links to the wireless
//! receiver. The real implementation wraps `hidapi`; [`MockHidBackend`] is
//! always compiled so detector tests run without hardware.
//!
//! Both operations are infallible by contract — an OS failure logs a warning
//! and yields an empty list, because detection must degrade, never abort.

use std::sync::Mutex;
use std::time::Duration;

use hidapi::HidApi;
use tracing::{debug, warn};

use haptic_core::protocol::{DeviceLink, LinkError, MockLink, MockReply};
use haptic_core::status::HidDeviceSummary;

use crate::domain::config::DeviceIdentityConfig;

/// One enumerated HID node, numeric form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    pub name: Option<String>,
}

impl DiscoveredDevice {
    /// Display name, falling back to a synthesized label when the OS does
    /// not report one.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("Vendor device (0x{:04X})", self.product_id),
        }
    }

    /// JSON-facing summary with classification flags.
    pub fn summarize(&self, identity: &DeviceIdentityConfig) -> HidDeviceSummary {
        HidDeviceSummary {
            name: self.display_name(),
            product_id: format!("0x{:04X}", self.product_id),
            vendor_id: format!("0x{:04X}", self.vendor_id),
            is_peripheral: identity.is_peripheral(self.product_id),
            is_receiver: identity.is_receiver(self.product_id),
        }
    }
}

/// OS HID seam used by the detector.
pub trait HidBackend: Send + Sync {
    /// Lists HID nodes for the configured vendor id.
    fn enumerate(&self) -> Vec<DiscoveredDevice>;

    /// Opens every HID interface exposed by a known receiver, in enumeration
    /// order. The caller probes them and uses the first that answers.
    fn open_receiver_links(&self) -> Vec<Box<dyn DeviceLink>>;
}

// ── hidapi implementation ─────────────────────────────────────────────────────

/// `hidapi`-backed implementation.
///
/// Refreshing the device list needs exclusive access to the `HidApi` handle,
/// so it lives behind a mutex; enumeration refreshes on every call to
/// observe hotplug.
pub struct HidapiBackend {
    api: Mutex<HidApi>,
    identity: DeviceIdentityConfig,
}

impl HidapiBackend {
    /// # Errors
    ///
    /// Returns the `hidapi` initialization error when the OS HID subsystem
    /// is unavailable.
    pub fn new(identity: DeviceIdentityConfig) -> Result<Self, hidapi::HidError> {
        Ok(Self {
            api: Mutex::new(HidApi::new()?),
            identity,
        })
    }
}

impl HidBackend for HidapiBackend {
    fn enumerate(&self) -> Vec<DiscoveredDevice> {
        let mut api = match self.api.lock() {
            Ok(api) => api,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = api.refresh_devices() {
            warn!(%err, "HID device refresh failed");
            return Vec::new();
        }
        api.device_list()
            .filter(|info| info.vendor_id() == self.identity.vendor_id)
            .map(|info| DiscoveredDevice {
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
                name: info.product_string().map(str::to_string),
            })
            .collect()
    }

    fn open_receiver_links(&self) -> Vec<Box<dyn DeviceLink>> {
        let api = match self.api.lock() {
            Ok(api) => api,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut links: Vec<Box<dyn DeviceLink>> = Vec::new();
        for info in api.device_list() {
            if info.vendor_id() != self.identity.vendor_id
                || !self.identity.is_receiver(info.product_id())
            {
                continue;
            }
            match info.open_device(&api) {
                Ok(device) => links.push(Box::new(HidapiLink { device })),
                Err(err) => {
                    debug!(product_id = info.product_id(), %err, "receiver interface not openable");
                }
            }
        }
        links
    }
}

/// One open HID stream speaking raw reports.
struct HidapiLink {
    device: hidapi::HidDevice,
}

impl DeviceLink for HidapiLink {
    fn write_report(&mut self, report: &[u8]) -> Result<(), LinkError> {
        self.device
            .write(report)
            .map(|_| ())
            .map_err(|err| LinkError::Io(err.to_string()))
    }

    fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, LinkError> {
        let millis = timeout.as_millis().min(i32::MAX as u128) as i32;
        match self.device.read_timeout(buf, millis) {
            // hidapi reports a timeout as a successful zero-byte read.
            Ok(0) => Err(LinkError::Timeout),
            Ok(n) => Ok(n),
            Err(err) => Err(LinkError::Io(err.to_string())),
        }
    }
}

// ── Mock implementation (always compiled for tests) ───────────────────────────

/// Scripted backend: a fixed device list plus replayable link scripts.
///
/// `open_receiver_links` rebuilds the links from the same scripts on every
/// call, so repeated detector polls see identical receiver behaviour.
#[derive(Default)]
pub struct MockHidBackend {
    pub devices: Vec<DiscoveredDevice>,
    pub link_scripts: Vec<Vec<MockReply>>,
}

impl MockHidBackend {
    pub fn new(devices: Vec<DiscoveredDevice>, link_scripts: Vec<Vec<MockReply>>) -> Self {
        Self {
            devices,
            link_scripts,
        }
    }

    /// Backend with no devices at all.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl HidBackend for MockHidBackend {
    fn enumerate(&self) -> Vec<DiscoveredDevice> {
        self.devices.clone()
    }

    fn open_receiver_links(&self) -> Vec<Box<dyn DeviceLink>> {
        self.link_scripts
            .iter()
            .map(|script| Box::new(MockLink::new(script.clone())) as Box<dyn DeviceLink>)
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
