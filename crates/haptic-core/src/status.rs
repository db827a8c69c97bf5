//! Device status snapshots and protocol query results.
//!
//! [`DeviceStatus`] is the single value shared between the detector (writer)
//! and the request handlers (readers). It is an immutable snapshot: the
//! detector builds a fresh value on every poll and swaps it in wholesale, so
//! readers never observe a partially updated record.

use serde::Serialize;

/// Transport over which the peripheral is currently reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceConnectionType {
    /// No peripheral detected.
    None,
    /// Direct system Bluetooth pairing.
    Bluetooth,
    /// Paired through the wireless USB receiver.
    DongleLink,
    /// Present but the transport could not be classified.
    Unknown,
}

/// Immutable connectivity snapshot produced by one detector poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub is_connected: bool,
    pub connection_type: DeviceConnectionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
}

impl DeviceStatus {
    /// The "nothing detected" snapshot. Also the initial cached value before
    /// the first poll completes.
    pub fn disconnected() -> Self {
        Self {
            is_connected: false,
            connection_type: DeviceConnectionType::None,
            device_name: None,
            product_id: None,
            vendor_id: None,
        }
    }

    /// True when this snapshot differs from `previous` in a way that must be
    /// announced to subscribers: a change of `is_connected` or
    /// `connection_type`. Name/id churn alone does not notify.
    pub fn is_transition_from(&self, previous: &DeviceStatus) -> bool {
        self.is_connected != previous.is_connected
            || self.connection_type != previous.connection_type
    }
}

/// One paired/connected peripheral as reported by a receiver query.
///
/// Produced transiently per protocol query; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedDeviceRecord {
    /// Pairing slot on the receiver, 1-based (1..=6).
    pub slot_index: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    /// Raw device-type code from the pairing-info register, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type_code: Option<u8>,
    /// Low byte of the wireless product id, formatted `0xNN`, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wireless_product_id: Option<String>,
    pub is_connected: bool,
}

/// One enumerated HID node, as reported by the raw device listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HidDeviceSummary {
    pub name: String,
    /// Formatted `0xNNNN`.
    pub product_id: String,
    /// Formatted `0xNNNN`.
    pub vendor_id: String,
    pub is_peripheral: bool,
    pub is_receiver: bool,
}

/// Outcome of one receiver query.
///
/// A query "succeeds" when a physical link answered at all — an empty
/// `connected_devices` list with `success: true` means the receiver is
/// reachable but no peripheral is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub connected_devices: Vec<ConnectedDeviceRecord>,
    /// Hex dump of the last raw response frame, for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response_hex: Option<String>,
}

impl QueryResult {
    /// Failure result carrying only an error message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            connected_devices: Vec::new(),
            raw_response_hex: None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_snapshot_has_no_identity_fields() {
        let status = DeviceStatus::disconnected();
        assert!(!status.is_connected);
        assert_eq!(status.connection_type, DeviceConnectionType::None);
        assert!(status.device_name.is_none());
        assert!(status.product_id.is_none());
    }

    #[test]
    fn test_transition_fires_on_connect() {
        let previous = DeviceStatus::disconnected();
        let next = DeviceStatus {
            is_connected: true,
            connection_type: DeviceConnectionType::DongleLink,
            device_name: Some("Device 1".to_string()),
            product_id: None,
            vendor_id: None,
        };
        assert!(next.is_transition_from(&previous));
    }

    #[test]
    fn test_transition_fires_on_transport_change_alone() {
        let previous = DeviceStatus {
            is_connected: true,
            connection_type: DeviceConnectionType::Bluetooth,
            device_name: None,
            product_id: None,
            vendor_id: None,
        };
        let next = DeviceStatus {
            connection_type: DeviceConnectionType::DongleLink,
            ..previous.clone()
        };
        assert!(next.is_transition_from(&previous));
    }

    #[test]
    fn test_name_churn_is_not_a_transition() {
        let previous = DeviceStatus {
            is_connected: true,
            connection_type: DeviceConnectionType::DongleLink,
            device_name: Some("Device 1".to_string()),
            product_id: None,
            vendor_id: None,
        };
        let next = DeviceStatus {
            device_name: Some("Device 2".to_string()),
            ..previous.clone()
        };
        assert!(!next.is_transition_from(&previous));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = DeviceStatus {
            is_connected: true,
            connection_type: DeviceConnectionType::DongleLink,
            device_name: Some("Device 1".to_string()),
            product_id: Some("0xC548".to_string()),
            vendor_id: Some("0x046D".to_string()),
        };
        let json = serde_json::to_value(&status).expect("serialize");
        assert_eq!(json["isConnected"], true);
        assert_eq!(json["connectionType"], "DongleLink");
        assert_eq!(json["productId"], "0xC548");
    }

    #[test]
    fn test_query_failure_carries_message_and_no_records() {
        let result = QueryResult::failure("no receiver reachable");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no receiver reachable"));
        assert!(result.connected_devices.is_empty());
    }
}
