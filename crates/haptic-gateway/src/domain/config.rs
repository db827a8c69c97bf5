//! Gateway configuration types.
//!
//! [`GatewayConfig`] is the single source of truth for all runtime settings.
//! It can be constructed from CLI arguments (the binary does this) or from
//! defaults (local development and tests). The device-id sets and the
//! certificate source are part of the config and are injected into the
//! components that need them — nothing reads them as ambient globals.

use std::path::PathBuf;
use std::time::Duration;

/// All runtime configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// TLS control-server port on loopback.
    pub listen_port: u16,

    /// Root data directory. The certificate cache lives in
    /// `<data_dir>/certificates/`.
    pub data_dir: PathBuf,

    /// Device-detector poll interval.
    pub poll_interval: Duration,

    /// Where the TLS identity archive comes from and how it is refreshed.
    pub certificate: CertificateSourceConfig,

    /// Which USB devices count as the peripheral and its receiver.
    pub device: DeviceIdentityConfig,
}

impl GatewayConfig {
    /// Directory holding the identity file and the cache record.
    pub fn certificate_cache_dir(&self) -> PathBuf {
        self.data_dir.join("certificates")
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_port: 41443,
            data_dir: PathBuf::from("."),
            poll_interval: Duration::from_secs(5),
            certificate: CertificateSourceConfig::default(),
            device: DeviceIdentityConfig::default(),
        }
    }
}

/// Remote source and refresh policy for the TLS identity.
#[derive(Debug, Clone)]
pub struct CertificateSourceConfig {
    /// Fixed, well-known URL of the password-protected identity archive.
    pub archive_url: String,

    /// Password for the archive.
    pub archive_password: String,

    /// File name of the TLS identity (PEM bundle: certificate chain plus
    /// PKCS#8 key) inside the archive and in the cache directory.
    pub identity_file: String,

    /// File name of the cache record, stored next to the identity.
    pub cache_file: String,

    /// A refresh fetch is attempted when the last check is at least this old.
    pub refresh_interval_hours: i64,

    /// Identities within this many days of expiry classify as expiring soon.
    pub expiry_warning_days: i64,
}

impl Default for CertificateSourceConfig {
    fn default() -> Self {
        Self {
            archive_url:
                "https://raw.githubusercontent.com/fallstop/HapticWebPlugin/certs/local.jmw.nz.zip"
                    .to_string(),
            archive_password: "password".to_string(),
            identity_file: "local.jmw.nz.pem".to_string(),
            cache_file: "certificate_cache.json".to_string(),
            refresh_interval_hours: 24,
            expiry_warning_days: 14,
        }
    }
}

/// USB identity of the peripheral family the detector looks for.
#[derive(Debug, Clone)]
pub struct DeviceIdentityConfig {
    /// USB vendor id shared by the peripheral and its receiver.
    pub vendor_id: u16,

    /// Product ids of directly connected peripherals (USB or system
    /// Bluetooth HID nodes).
    pub peripheral_product_ids: Vec<u16>,

    /// Product ids of the wireless receiver.
    pub receiver_product_ids: Vec<u16>,

    /// Display-name prefix the Bluetooth fallback probe matches in the
    /// platform inventory output.
    pub bluetooth_name_prefix: String,

    /// Product id reported when the fallback probe finds the device but the
    /// inventory output does not include one.
    pub bluetooth_fallback_product_id: String,
}

impl DeviceIdentityConfig {
    pub fn is_peripheral(&self, product_id: u16) -> bool {
        self.peripheral_product_ids.contains(&product_id)
    }

    pub fn is_receiver(&self, product_id: u16) -> bool {
        self.receiver_product_ids.contains(&product_id)
    }
}

impl Default for DeviceIdentityConfig {
    fn default() -> Self {
        Self {
            vendor_id: 0x046D,
            peripheral_product_ids: vec![
                0xB042, // Bluetooth
                0xB043, // Bluetooth (alternate)
                0x4108, // paired through the receiver
            ],
            receiver_product_ids: vec![0xC548, 0xC53A],
            bluetooth_name_prefix: "MX Master 4".to_string(),
            bluetooth_fallback_product_id: "0xB042".to_string(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listen_port() {
        assert_eq!(GatewayConfig::default().listen_port, 41443);
    }

    #[test]
    fn test_default_poll_interval_is_5s() {
        assert_eq!(
            GatewayConfig::default().poll_interval,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_cache_dir_is_under_data_dir() {
        let config = GatewayConfig {
            data_dir: PathBuf::from("/tmp/gw"),
            ..Default::default()
        };
        assert_eq!(
            config.certificate_cache_dir(),
            PathBuf::from("/tmp/gw/certificates")
        );
    }

    #[test]
    fn test_default_refresh_policy() {
        let source = CertificateSourceConfig::default();
        assert_eq!(source.refresh_interval_hours, 24);
        assert_eq!(source.expiry_warning_days, 14);
    }

    #[test]
    fn test_device_identity_classification() {
        let device = DeviceIdentityConfig::default();
        assert!(device.is_peripheral(0xB042));
        assert!(device.is_receiver(0xC548));
        assert!(!device.is_peripheral(0xC548));
        assert!(!device.is_receiver(0xB042));
    }
}
