//! Platform Bluetooth fallback probe.
//!
//! Direct HID enumeration cannot observe a system Bluetooth pairing on
//! macOS, so the detector's last resort shells out to the platform inventory
//! utility (`system_profiler SPBluetoothDataType`) and scans its structured
//! text output: devices listed under a "connected" section header count,
//! devices under a "not connected" header do not.
//!
//! This is a best-effort degraded path — the output format is locale- and
//! version-dependent — so every failure (spawn error, unparseable output,
//! device absent) yields "not detected", never an error. Other platforms get
//! [`NullBluetoothProbe`], which never detects anything: their transports
//! surface as HID nodes and are handled by the earlier detection steps.
//!
//! The platform implementation is selected at compile time and re-exported
//! as `NativeBluetoothProbe`, mirroring how the other OS seams in this
//! workspace are laid out.

/// A peripheral found by the fallback probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BluetoothPeripheral {
    pub name: String,
    /// Product id extracted from the inventory output, formatted `0xNNNN`,
    /// when the output included one.
    pub product_id: Option<String>,
}

/// Seam for the platform fallback.
pub trait BluetoothProbe: Send + Sync {
    /// Returns the peripheral iff it is currently *connected* (not merely
    /// paired).
    fn probe(&self) -> Option<BluetoothPeripheral>;
}

// ── Inventory output parsing ──────────────────────────────────────────────────

/// Section headers that start the "connected devices" block.
const CONNECTED_HEADERS: [&str; 2] = [
    "Connected:",
    "Devices (Paired, Configured, & Connected):",
];

/// Section headers that start the "paired but not connected" block.
const NOT_CONNECTED_HEADERS: [&str; 2] = [
    "Not Connected:",
    "Devices (Paired, Not Connected):",
];

/// Scans inventory output for a device whose name starts with `name_prefix`
/// inside a connected section, returning it with its product id when the
/// following lines carry one.
pub fn parse_inventory_output(output: &str, name_prefix: &str) -> Option<BluetoothPeripheral> {
    let mut in_connected_section = false;
    let mut found_device = false;

    for line in output.lines() {
        let trimmed = line.trim();

        if CONNECTED_HEADERS.iter().any(|h| trimmed.starts_with(h)) {
            in_connected_section = true;
            found_device = false;
            continue;
        }
        if NOT_CONNECTED_HEADERS.iter().any(|h| trimmed.starts_with(h)) {
            in_connected_section = false;
            found_device = false;
            continue;
        }

        if !in_connected_section {
            continue;
        }

        if trimmed.starts_with(name_prefix) {
            found_device = true;
        } else if found_device && trimmed.starts_with("Product ID:") {
            return Some(BluetoothPeripheral {
                name: name_prefix.to_string(),
                product_id: extract_hex_id(trimmed),
            });
        }
    }
    None
}

/// Pulls the first `0x`-prefixed hex token out of a line, uppercased.
fn extract_hex_id(line: &str) -> Option<String> {
    let start = line.find("0x")?;
    let digits: String = line[start + 2..]
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .collect();
    if digits.is_empty() {
        None
    } else {
        Some(format!("0x{}", digits.to_ascii_uppercase()))
    }
}

// ── macOS implementation ──────────────────────────────────────────────────────

#[cfg(target_os = "macos")]
pub mod macos {
    use std::process::Command;

    use tracing::debug;

    use super::{parse_inventory_output, BluetoothPeripheral, BluetoothProbe};

    /// Shells out to `system_profiler` and parses its Bluetooth inventory.
    pub struct SystemProfilerProbe {
        name_prefix: String,
    }

    impl SystemProfilerProbe {
        pub fn new(name_prefix: impl Into<String>) -> Self {
            Self {
                name_prefix: name_prefix.into(),
            }
        }
    }

    impl BluetoothProbe for SystemProfilerProbe {
        fn probe(&self) -> Option<BluetoothPeripheral> {
            let output = Command::new("system_profiler")
                .arg("SPBluetoothDataType")
                .output();
            match output {
                Ok(output) => {
                    let text = String::from_utf8_lossy(&output.stdout);
                    parse_inventory_output(&text, &self.name_prefix)
                }
                Err(err) => {
                    debug!(%err, "system_profiler not runnable");
                    None
                }
            }
        }
    }
}

#[cfg(target_os = "macos")]
pub use macos::SystemProfilerProbe as NativeBluetoothProbe;

// ── Other platforms ───────────────────────────────────────────────────────────

/// Probe that never detects anything.
pub struct NullBluetoothProbe;

impl NullBluetoothProbe {
    #[allow(clippy::new_without_default)]
    pub fn new(_name_prefix: impl Into<String>) -> Self {
        Self
    }
}

impl BluetoothProbe for NullBluetoothProbe {
    fn probe(&self) -> Option<BluetoothPeripheral> {
        None
    }
}

#[cfg(not(target_os = "macos"))]
pub use self::NullBluetoothProbe as NativeBluetoothProbe;

// ── Mock implementation (always compiled for tests) ───────────────────────────

/// Probe returning a fixed result.
pub struct MockBluetoothProbe {
    pub result: Option<BluetoothPeripheral>,
}

impl BluetoothProbe for MockBluetoothProbe {
    fn probe(&self) -> Option<BluetoothPeripheral> {
        self.result.clone()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
