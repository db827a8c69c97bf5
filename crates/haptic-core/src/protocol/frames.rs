//! Binary codec for HID++ request and response frames.
//!
//! Wire format (short report, 7 bytes):
//! ```text
//! [report_id:1][device_index:1][sub_id:1][register:1][p0:1][p1:1][p2:1]
//! ```
//! Long reports (20 bytes) share the first four bytes and carry 16 parameter
//! bytes. Responses echo the request header; a response whose first byte is
//! the error marker (0x8F) means "no payload for this register/feature/slot"
//! rather than a transport failure.

use thiserror::Error;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Report identifiers, first byte of every frame.
pub mod report_id {
    /// Short report, 7 bytes total.
    pub const SHORT: u8 = 0x10;
    /// Long report, 20 bytes total.
    pub const LONG: u8 = 0x11;
    /// Very long report, 64 bytes total. Not used by the gateway's queries.
    pub const VERY_LONG: u8 = 0x12;
}

/// Device-index byte: pairing slots are 0x01..=0x06, the receiver itself is
/// addressed with the broadcast index.
pub const RECEIVER_INDEX: u8 = 0xFF;

/// Number of pairing slots on a receiver.
pub const SLOT_COUNT: u8 = 6;

/// Sub-identifier bytes for register access on the receiver.
pub mod sub_id {
    pub const GET_REGISTER: u8 = 0x81;
    pub const SET_REGISTER: u8 = 0x80;
}

/// Receiver register numbers.
pub mod register {
    pub const ENABLE_NOTIFICATIONS: u8 = 0x00;
    /// Connection-state register: reply byte 5 is a 6-bit slot bitmap.
    pub const CONNECTION_STATE: u8 = 0x02;
    /// Pairing-info register: parameterized by 0x20 + slot - 1.
    pub const DEVICE_PAIRING: u8 = 0xB5;
}

/// Feature identifiers resolved through the root lookup table.
pub mod feature {
    pub const ROOT: u16 = 0x0000;
    pub const DEVICE_INFO: u16 = 0x0003;
    pub const DEVICE_NAME: u16 = 0x0005;
}

/// First byte of a "no payload for this request" response.
pub const ERROR_MARKER: u8 = 0x8F;

/// USB vendor id of the receiver and its peripherals.
pub const VENDOR_ID: u16 = 0x046D;

/// Known wireless-receiver product ids.
pub const RECEIVER_PRODUCT_IDS: [u16; 2] = [0xC548, 0xC53A];

/// Frame sizes.
pub const SHORT_FRAME_LEN: usize = 7;
pub const LONG_FRAME_LEN: usize = 20;

/// Function byte of the device-name feature that returns name characters.
const FUNCTION_GET_NAME_BYTES: u8 = 0x10;

/// Longest device name the protocol will report.
const MAX_NAME_LEN: u8 = 32;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors raised while interpreting a response frame.
///
/// Callers degrade every variant to "no record for this slot/query"; the
/// distinction exists for logging and tests, not for control flow.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The response is shorter than the minimum the parser needs.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The response starts with the error marker: the slot is empty or the
    /// register/feature is unsupported.
    #[error("error-marker response (0x8F), code 0x{code:02X}")]
    ErrorMarker { code: u8 },

    /// The response header does not echo the request it is matched against.
    #[error("response header does not match the request")]
    HeaderMismatch,
}

// ── Request builders ──────────────────────────────────────────────────────────

/// Builds a short "get register" frame addressed to `device_index`.
pub fn short_register_read(device_index: u8, register: u8, p0: u8) -> [u8; SHORT_FRAME_LEN] {
    [
        report_id::SHORT,
        device_index,
        sub_id::GET_REGISTER,
        register,
        p0,
        0x00,
        0x00,
    ]
}

/// Pairing-info request for one slot (1..=6), addressed to the receiver.
pub fn pairing_info_request(slot: u8) -> [u8; SHORT_FRAME_LEN] {
    short_register_read(
        RECEIVER_INDEX,
        register::DEVICE_PAIRING,
        0x20 + slot.saturating_sub(1),
    )
}

/// Connection-state request addressed to the receiver.
pub fn connection_state_request() -> [u8; SHORT_FRAME_LEN] {
    short_register_read(RECEIVER_INDEX, register::CONNECTION_STATE, 0x00)
}

/// Root-table lookup: resolves `feature_id` to a feature index on the device
/// in `slot`. Addressed to the slot, not the receiver.
pub fn root_feature_lookup_request(slot: u8, feature_id: u16) -> [u8; SHORT_FRAME_LEN] {
    [
        report_id::SHORT,
        slot,
        0x00, // feature index 0 = root table
        0x00, // function 0 = lookup
        (feature_id >> 8) as u8,
        (feature_id & 0xFF) as u8,
        0x00,
    ]
}

/// Character-count request against a resolved device-name feature index.
pub fn name_length_request(slot: u8, feature_index: u8) -> [u8; SHORT_FRAME_LEN] {
    [report_id::SHORT, slot, feature_index, 0x00, 0x00, 0x00, 0x00]
}

/// Name-bytes request (long report) against a resolved device-name feature
/// index, starting at character 0.
pub fn name_bytes_request(slot: u8, feature_index: u8) -> [u8; LONG_FRAME_LEN] {
    let mut frame = [0u8; LONG_FRAME_LEN];
    frame[0] = report_id::LONG;
    frame[1] = slot;
    frame[2] = feature_index;
    frame[3] = FUNCTION_GET_NAME_BYTES;
    frame
}

// ── Response parsers ──────────────────────────────────────────────────────────

/// Pairing-info payload for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingInfo {
    /// Low byte of the wireless product id.
    pub wireless_pid_low: u8,
    pub report_interval: u8,
    pub device_type: u8,
}

impl PairingInfo {
    /// An all-zero payload means the slot holds no pairing. This is a
    /// heuristic observed on real receivers, not a documented success code.
    pub fn is_empty_slot(&self) -> bool {
        self.wireless_pid_low == 0 && self.report_interval == 0 && self.device_type == 0
    }
}

fn require_len(frame: &[u8], needed: usize) -> Result<(), FrameError> {
    if frame.len() < needed {
        Err(FrameError::InsufficientData {
            needed,
            available: frame.len(),
        })
    } else {
        Ok(())
    }
}

fn check_error_marker(frame: &[u8]) -> Result<(), FrameError> {
    if frame.first() == Some(&ERROR_MARKER) {
        Err(FrameError::ErrorMarker {
            code: frame.get(4).copied().unwrap_or(0),
        })
    } else {
        Ok(())
    }
}

/// Parses the response to a [`pairing_info_request`].
///
/// # Errors
///
/// [`FrameError::ErrorMarker`] when the slot is empty or unsupported,
/// [`FrameError::HeaderMismatch`] when the response does not echo the
/// pairing-info register read, [`FrameError::InsufficientData`] when
/// truncated.
pub fn parse_pairing_info(frame: &[u8]) -> Result<PairingInfo, FrameError> {
    require_len(frame, SHORT_FRAME_LEN)?;
    check_error_marker(frame)?;
    if frame[0] != report_id::SHORT
        || frame[1] != RECEIVER_INDEX
        || frame[2] != sub_id::GET_REGISTER
        || frame[3] != register::DEVICE_PAIRING
    {
        return Err(FrameError::HeaderMismatch);
    }
    Ok(PairingInfo {
        wireless_pid_low: frame[4],
        report_interval: frame[5],
        device_type: frame[6],
    })
}

/// Parses the response to a [`connection_state_request`], returning the
/// 6-bit slot connectivity bitmap (bit i set ⇒ slot i+1 connected).
pub fn parse_connection_bitmap(frame: &[u8]) -> Result<u8, FrameError> {
    require_len(frame, 6)?;
    check_error_marker(frame)?;
    if frame[0] != report_id::SHORT
        || frame[1] != RECEIVER_INDEX
        || frame[2] != sub_id::GET_REGISTER
    {
        return Err(FrameError::HeaderMismatch);
    }
    Ok(frame[5] & 0x3F)
}

/// Expands a connectivity bitmap into 1-based slot numbers, ascending.
pub fn slots_from_bitmap(bitmap: u8) -> Vec<u8> {
    (0..SLOT_COUNT)
        .filter(|bit| bitmap & (1 << bit) != 0)
        .map(|bit| bit + 1)
        .collect()
}

/// Parses the feature index out of a root-table lookup response.
///
/// A zero index means the device does not expose the feature.
pub fn parse_feature_index(frame: &[u8]) -> Result<u8, FrameError> {
    require_len(frame, 5)?;
    check_error_marker(frame)?;
    Ok(frame[4])
}

/// Parses the declared character count out of a name-length response.
///
/// Counts of zero or above [`MAX_NAME_LEN`] are reported as a header
/// mismatch: the reply is structurally fine but unusable.
pub fn parse_name_length(frame: &[u8]) -> Result<u8, FrameError> {
    require_len(frame, 5)?;
    check_error_marker(frame)?;
    let length = frame[4];
    if length == 0 || length > MAX_NAME_LEN {
        return Err(FrameError::HeaderMismatch);
    }
    Ok(length)
}

/// Extracts the device name from a name-bytes response.
///
/// Keeps printable ASCII only, stops at the first NUL byte or after
/// `declared_len` characters, and trims surrounding whitespace. Returns
/// `None` when nothing printable remains.
pub fn parse_name_bytes(frame: &[u8], declared_len: u8) -> Result<Option<String>, FrameError> {
    require_len(frame, 5)?;
    check_error_marker(frame)?;
    let mut name = String::new();
    for &byte in frame.iter().skip(4).take(declared_len as usize) {
        if byte == 0x00 {
            break;
        }
        if (0x20..=0x7E).contains(&byte) {
            name.push(byte as char);
        }
    }
    let name = name.trim().to_string();
    Ok(if name.is_empty() { None } else { Some(name) })
}

/// Formats a response frame as dash-separated uppercase hex for diagnostics.
pub fn hex_dump(frame: &[u8]) -> String {
    frame
        .iter()
        .map(|byte| hex::encode_upper([*byte]))
        .collect::<Vec<_>>()
        .join("-")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Request builders ─────────────────────────────────────────────────────

    #[test]
    fn test_pairing_info_request_slot_one() {
        assert_eq!(
            pairing_info_request(1),
            [0x10, 0xFF, 0x81, 0xB5, 0x20, 0x00, 0x00]
        );
    }

    #[test]
    fn test_pairing_info_request_slot_six() {
        assert_eq!(
            pairing_info_request(6),
            [0x10, 0xFF, 0x81, 0xB5, 0x25, 0x00, 0x00]
        );
    }

    #[test]
    fn test_connection_state_request_bytes() {
        assert_eq!(
            connection_state_request(),
            [0x10, 0xFF, 0x81, 0x02, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_root_lookup_addresses_slot_not_receiver() {
        let frame = root_feature_lookup_request(3, feature::DEVICE_NAME);
        assert_eq!(frame, [0x10, 0x03, 0x00, 0x00, 0x00, 0x05, 0x00]);
    }

    #[test]
    fn test_name_bytes_request_is_long_report() {
        let frame = name_bytes_request(2, 0x06);
        assert_eq!(frame.len(), LONG_FRAME_LEN);
        assert_eq!(&frame[..5], &[0x11, 0x02, 0x06, 0x10, 0x00]);
        assert!(frame[5..].iter().all(|&b| b == 0));
    }

    // ── Pairing info ─────────────────────────────────────────────────────────

    #[test]
    fn test_parse_pairing_info_occupied_slot() {
        let frame = [0x10, 0xFF, 0x81, 0xB5, 0x08, 0x04, 0x02];
        let info = parse_pairing_info(&frame).expect("parse");
        assert_eq!(info.wireless_pid_low, 0x08);
        assert_eq!(info.device_type, 0x02);
        assert!(!info.is_empty_slot());
    }

    #[test]
    fn test_parse_pairing_info_all_zero_payload_is_empty_slot() {
        let frame = [0x10, 0xFF, 0x81, 0xB5, 0x00, 0x00, 0x00];
        let info = parse_pairing_info(&frame).expect("parse");
        assert!(info.is_empty_slot());
    }

    #[test]
    fn test_parse_pairing_info_error_marker() {
        let frame = [0x8F, 0xFF, 0x81, 0xB5, 0x0A, 0x00, 0x00];
        assert_eq!(
            parse_pairing_info(&frame),
            Err(FrameError::ErrorMarker { code: 0x0A })
        );
    }

    #[test]
    fn test_parse_pairing_info_wrong_register_is_mismatch() {
        let frame = [0x10, 0xFF, 0x81, 0x02, 0x01, 0x00, 0x00];
        assert_eq!(parse_pairing_info(&frame), Err(FrameError::HeaderMismatch));
    }

    #[test]
    fn test_parse_pairing_info_truncated() {
        let frame = [0x10, 0xFF, 0x81];
        assert!(matches!(
            parse_pairing_info(&frame),
            Err(FrameError::InsufficientData { .. })
        ));
    }

    // ── Connection bitmap ────────────────────────────────────────────────────

    #[test]
    fn test_parse_connection_bitmap_extracts_byte_five() {
        let frame = [0x10, 0xFF, 0x81, 0x02, 0x00, 0b0000_0101, 0x00];
        assert_eq!(parse_connection_bitmap(&frame), Ok(0b0000_0101));
    }

    #[test]
    fn test_parse_connection_bitmap_masks_to_six_bits() {
        let frame = [0x10, 0xFF, 0x81, 0x02, 0x00, 0xFF, 0x00];
        assert_eq!(parse_connection_bitmap(&frame), Ok(0b0011_1111));
    }

    #[test]
    fn test_parse_connection_bitmap_error_marker() {
        let frame = [0x8F, 0xFF, 0x81, 0x02, 0x03, 0x00, 0x00];
        assert_eq!(
            parse_connection_bitmap(&frame),
            Err(FrameError::ErrorMarker { code: 0x03 })
        );
    }

    #[test]
    fn test_slots_from_bitmap_one_and_three() {
        assert_eq!(slots_from_bitmap(0b0000_0101), vec![1, 3]);
    }

    #[test]
    fn test_slots_from_bitmap_empty() {
        assert!(slots_from_bitmap(0).is_empty());
    }

    #[test]
    fn test_slots_from_bitmap_all_six() {
        assert_eq!(slots_from_bitmap(0b0011_1111), vec![1, 2, 3, 4, 5, 6]);
    }

    // ── Feature protocol ─────────────────────────────────────────────────────

    #[test]
    fn test_parse_feature_index() {
        let frame = [0x10, 0x01, 0x00, 0x00, 0x06, 0x00, 0x00];
        assert_eq!(parse_feature_index(&frame), Ok(0x06));
    }

    #[test]
    fn test_parse_name_length_rejects_zero() {
        let frame = [0x10, 0x01, 0x06, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(parse_name_length(&frame), Err(FrameError::HeaderMismatch));
    }

    #[test]
    fn test_parse_name_length_rejects_oversized() {
        let frame = [0x10, 0x01, 0x06, 0x00, 0x40, 0x00, 0x00];
        assert_eq!(parse_name_length(&frame), Err(FrameError::HeaderMismatch));
    }

    #[test]
    fn test_parse_name_bytes_stops_at_nul() {
        let mut frame = vec![0x11, 0x01, 0x06, 0x10];
        frame.extend_from_slice(b"Mouse\0garbage");
        let name = parse_name_bytes(&frame, 13).expect("parse");
        assert_eq!(name.as_deref(), Some("Mouse"));
    }

    #[test]
    fn test_parse_name_bytes_filters_unprintable() {
        let mut frame = vec![0x11, 0x01, 0x06, 0x10];
        frame.extend_from_slice(&[0x01, b'M', b'X', 0x7F, 0x80]);
        let name = parse_name_bytes(&frame, 5).expect("parse");
        assert_eq!(name.as_deref(), Some("MX"));
    }

    #[test]
    fn test_parse_name_bytes_respects_declared_length() {
        let mut frame = vec![0x11, 0x01, 0x06, 0x10];
        frame.extend_from_slice(b"LongDeviceName");
        let name = parse_name_bytes(&frame, 4).expect("parse");
        assert_eq!(name.as_deref(), Some("Long"));
    }

    #[test]
    fn test_parse_name_bytes_empty_yields_none() {
        let frame = [0x11, 0x01, 0x06, 0x10, 0x00, 0x00, 0x00];
        assert_eq!(parse_name_bytes(&frame, 3), Ok(None));
    }

    // ── Hex dump ─────────────────────────────────────────────────────────────

    #[test]
    fn test_hex_dump_format() {
        assert_eq!(hex_dump(&[0x10, 0xFF, 0x8F]), "10-FF-8F");
    }
}
