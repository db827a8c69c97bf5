//! Typed API responses.
//!
//! One closed sum over the shapes the JSON API can produce, one variant per
//! route, each with its own serde-derived serialization rule. The web client
//! depends on these shapes staying stable — every body carries a `success`
//! flag and camelCase keys, matching what the original handlers emitted as
//! ad hoc object literals.

use serde::Serialize;

use haptic_core::status::{DeviceStatus, HidDeviceSummary, QueryResult};

use crate::domain::certificate::CertificateReport;

/// Everything a route handler can answer with.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ApiResponse {
    Health(HealthResponse),
    WaveformList(WaveformListResponse),
    DeviceList(DeviceListResponse),
    HidppDiagnostic(HidppDiagnosticResponse),
    TriggerAccepted(TriggerAcceptedResponse),
    Error(ErrorBody),
}

impl ApiResponse {
    /// HTTP status code this response is served with.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiResponse::Error(body) => body.status,
            _ => 200,
        }
    }

    /// 404 body for unmatched routes.
    pub fn not_found() -> Self {
        ApiResponse::Error(ErrorBody {
            success: false,
            error: "Not found".to_string(),
            available_waveforms: None,
            status: 404,
        })
    }

    /// 500 body for failures inside a handler.
    pub fn internal_error(message: impl Into<String>) -> Self {
        ApiResponse::Error(ErrorBody {
            success: false,
            error: message.into(),
            available_waveforms: None,
            status: 500,
        })
    }

    /// 400 body for trigger requests that fail validation.
    pub fn bad_request(message: impl Into<String>, available_waveforms: Option<Vec<String>>) -> Self {
        ApiResponse::Error(ErrorBody {
            success: false,
            error: message.into(),
            available_waveforms,
            status: 400,
        })
    }
}

/// `GET /` — service health snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub service: String,
    pub version: String,
    pub certificate: CertificateReport,
    pub device: DeviceStatus,
    pub endpoints: EndpointListing,
}

/// Endpoint listing embedded in the health response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointListing {
    pub health: &'static str,
    pub list_waveforms: &'static str,
    pub devices: &'static str,
    pub device_diagnostics: &'static str,
    pub trigger_haptic: &'static str,
    pub trigger_channel: &'static str,
}

impl Default for EndpointListing {
    fn default() -> Self {
        Self {
            health: "GET /",
            list_waveforms: "GET /waveforms",
            devices: "GET /devices",
            device_diagnostics: "GET /devices/hidpp",
            trigger_haptic: "POST /haptic/{waveform}",
            trigger_channel: "GET /ws (websocket)",
        }
    }
}

/// `GET /waveforms` — the pattern catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveformListResponse {
    pub success: bool,
    pub count: usize,
    pub waveforms: Vec<WaveformEntry>,
}

/// One catalog entry with its stable wire index.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveformEntry {
    pub name: String,
    pub description: String,
    /// Index used by the binary WebSocket trigger channel.
    pub index: usize,
}

/// `GET /devices` — cached status plus the raw enumeration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListResponse {
    pub success: bool,
    pub device: DeviceStatus,
    pub devices: Vec<HidDeviceSummary>,
}

/// `GET /devices/hidpp` — raw receiver query results, for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HidppDiagnosticResponse {
    pub success: bool,
    pub paired_slots: QueryResult,
    pub connection_state: QueryResult,
}

/// `POST /haptic/{name}` — accepted trigger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerAcceptedResponse {
    pub success: bool,
    pub waveform: String,
}

/// Error body for 4xx/5xx responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    /// Present only on unknown-waveform trigger rejections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_waveforms: Option<Vec<String>>,
    /// HTTP status, not part of the JSON body.
    #[serde(skip)]
    pub status: u16,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_404_with_stable_body() {
        let response = ApiResponse::not_found();
        assert_eq!(response.status_code(), 404);
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Not found");
        assert!(json.get("availableWaveforms").is_none());
    }

    #[test]
    fn test_bad_request_carries_available_waveforms() {
        let response = ApiResponse::bad_request(
            "Unknown waveform: nope",
            Some(vec!["wave".to_string(), "knock".to_string()]),
        );
        assert_eq!(response.status_code(), 400);
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["availableWaveforms"][1], "knock");
        assert!(json.get("waveform").is_none(), "no waveform key on errors");
    }

    #[test]
    fn test_trigger_accepted_shape() {
        let response = ApiResponse::TriggerAccepted(TriggerAcceptedResponse {
            success: true,
            waveform: "heartbeat".to_string(),
        });
        assert_eq!(response.status_code(), 200);
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["success"], true);
        assert_eq!(json["waveform"], "heartbeat");
    }

    #[test]
    fn test_status_is_not_serialized() {
        let response = ApiResponse::internal_error("boom");
        let json = serde_json::to_value(&response).expect("serialize");
        assert!(json.get("status").is_none());
        assert_eq!(response.status_code(), 500);
    }

    #[test]
    fn test_waveform_list_serializes_indices() {
        let response = ApiResponse::WaveformList(WaveformListResponse {
            success: true,
            count: 1,
            waveforms: vec![WaveformEntry {
                name: "wave".to_string(),
                description: "Smooth sinusoidal pattern".to_string(),
                index: 9,
            }],
        });
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(json["waveforms"][0]["index"], 9);
        assert_eq!(json["count"], 1);
    }
}
