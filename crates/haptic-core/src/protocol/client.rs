//! Receiver queries over an abstract device link.
//!
//! A receiver typically exposes more than one HID interface; not all of them
//! accept the register/feature frames this module sends. Both queries
//! therefore iterate the candidate links and settle on the first one that
//! yields a usable response. A link that answers nothing at all is skipped;
//! if no link answers, the query fails with "no receiver reachable".
//!
//! Failure posture: a per-slot timeout, an error-marker reply, or a malformed
//! frame never aborts a query — each degrades to "no record for this slot".
//! The only failure mode is the complete absence of a reachable link.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::protocol::frames::{self, FrameError};
use crate::status::{ConnectedDeviceRecord, QueryResult};

/// Per-slot read timeout for the pairing-info sweep.
pub const SLOT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Read timeout for connection-state and feature-protocol exchanges.
pub const STATE_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Response buffer size; long reports are the largest reply we expect.
const RESPONSE_BUF_LEN: usize = frames::LONG_FRAME_LEN;

// ── Link abstraction ──────────────────────────────────────────────────────────

/// Errors surfaced by a [`DeviceLink`] transport.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    /// No response arrived within the caller's deadline.
    #[error("read timed out")]
    Timeout,

    /// The underlying transport failed.
    #[error("link I/O error: {0}")]
    Io(String),
}

/// One candidate physical channel to a receiver.
///
/// The gateway implements this over a USB HID stream; tests use
/// [`MockLink`] with scripted replies.
pub trait DeviceLink: Send {
    /// Writes one complete request frame.
    fn write_report(&mut self, report: &[u8]) -> Result<(), LinkError>;

    /// Reads one response frame into `buf`, waiting at most `timeout`.
    /// Returns the number of bytes read.
    fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, LinkError>;
}

// ── Queries ───────────────────────────────────────────────────────────────────

/// Sweeps all six pairing slots via the pairing-info register.
///
/// Slot presence is inferred from a non-zero payload — a preserved heuristic,
/// not a documented success code. Timeouts and error-marker replies yield no
/// record for that slot; the query still succeeds if the link answered at
/// least once.
pub fn query_paired_slots(links: &mut [Box<dyn DeviceLink>]) -> QueryResult {
    for (link_index, link) in links.iter_mut().enumerate() {
        match sweep_pairing_slots(link.as_mut()) {
            Some((records, raw_hex)) => {
                debug!(link_index, records = records.len(), "pairing sweep answered");
                return QueryResult {
                    success: true,
                    error: None,
                    connected_devices: records,
                    raw_response_hex: raw_hex,
                };
            }
            None => {
                debug!(link_index, "link yielded no pairing responses, trying next");
            }
        }
    }
    QueryResult::failure("no receiver reachable")
}

/// Reads the connection-state register and resolves a name for every slot
/// whose connectivity bit is set.
///
/// Name resolution runs the feature protocol against the slot itself and
/// degrades to a `"Device N"` placeholder on any failure.
pub fn query_connection_bitmap(links: &mut [Box<dyn DeviceLink>]) -> QueryResult {
    for (link_index, link) in links.iter_mut().enumerate() {
        let link = link.as_mut();
        if link
            .write_report(&frames::connection_state_request())
            .is_err()
        {
            continue;
        }

        let mut buf = [0u8; RESPONSE_BUF_LEN];
        let read = match link.read_report(&mut buf, STATE_READ_TIMEOUT) {
            Ok(n) if n > 0 => n,
            Ok(_) | Err(_) => continue,
        };
        let response = &buf[..read];
        let raw_hex = frames::hex_dump(response);

        // The link answered: from here on the query succeeds even when the
        // reply cannot be interpreted as a bitmap.
        let mut result = QueryResult {
            success: true,
            error: None,
            connected_devices: Vec::new(),
            raw_response_hex: Some(raw_hex),
        };

        match frames::parse_connection_bitmap(response) {
            Ok(bitmap) => {
                for slot in frames::slots_from_bitmap(bitmap) {
                    let device_name = resolve_device_name(link, slot)
                        .unwrap_or_else(|| format!("Device {slot}"));
                    result.connected_devices.push(ConnectedDeviceRecord {
                        slot_index: slot,
                        device_name: Some(device_name),
                        device_type_code: None,
                        wireless_product_id: None,
                        is_connected: true,
                    });
                }
            }
            Err(err) => {
                debug!(link_index, %err, "connection-state reply not parseable");
            }
        }
        return result;
    }
    QueryResult::failure("no receiver reachable")
}

// ── Internals ─────────────────────────────────────────────────────────────────

/// Queries every pairing slot on one link.
///
/// Returns `None` when the link never produced a response frame (treated as
/// "wrong interface, try the next one"); otherwise the records collected plus
/// the hex dump of the last response seen.
fn sweep_pairing_slots(
    link: &mut dyn DeviceLink,
) -> Option<(Vec<ConnectedDeviceRecord>, Option<String>)> {
    let mut records = Vec::new();
    let mut last_hex = None;
    let mut answered = false;

    for slot in 1..=frames::SLOT_COUNT {
        if link.write_report(&frames::pairing_info_request(slot)).is_err() {
            return None;
        }

        let mut buf = [0u8; RESPONSE_BUF_LEN];
        let read = match link.read_report(&mut buf, SLOT_READ_TIMEOUT) {
            Ok(n) if n > 0 => n,
            Ok(_) => continue,
            Err(LinkError::Timeout) => continue,
            Err(LinkError::Io(_)) => continue,
        };
        answered = true;
        let response = &buf[..read];
        last_hex = Some(frames::hex_dump(response));

        match frames::parse_pairing_info(response) {
            Ok(info) if !info.is_empty_slot() => {
                records.push(ConnectedDeviceRecord {
                    slot_index: slot,
                    device_name: None,
                    device_type_code: Some(info.device_type),
                    wireless_product_id: Some(format!("0x{:02X}", info.wireless_pid_low)),
                    is_connected: true,
                });
            }
            Ok(_) => {} // empty slot
            Err(FrameError::ErrorMarker { .. }) => {} // slot empty or unsupported
            Err(err) => {
                debug!(slot, %err, "unparseable pairing-info reply");
            }
        }
    }

    answered.then_some((records, last_hex))
}

/// Three-step device-name resolution against one pairing slot:
/// root lookup → character count → name bytes. `None` on any failure.
fn resolve_device_name(link: &mut dyn DeviceLink, slot: u8) -> Option<String> {
    let lookup = frames::root_feature_lookup_request(slot, frames::feature::DEVICE_NAME);
    let reply = exchange(link, &lookup)?;
    let feature_index = frames::parse_feature_index(&reply).ok()?;
    if feature_index == 0 {
        return None;
    }

    let reply = exchange(link, &frames::name_length_request(slot, feature_index))?;
    let declared_len = frames::parse_name_length(&reply).ok()?;

    let reply = exchange(link, &frames::name_bytes_request(slot, feature_index))?;
    frames::parse_name_bytes(&reply, declared_len).ok().flatten()
}

/// One write/read exchange with the short state timeout.
fn exchange(link: &mut dyn DeviceLink, request: &[u8]) -> Option<Vec<u8>> {
    link.write_report(request).ok()?;
    let mut buf = [0u8; RESPONSE_BUF_LEN];
    let read = link.read_report(&mut buf, STATE_READ_TIMEOUT).ok()?;
    (read > 0).then(|| buf[..read].to_vec())
}

// ── Mock link (always compiled for tests) ─────────────────────────────────────

/// One scripted reply for a [`MockLink`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with these bytes.
    Frame(Vec<u8>),
    /// Simulate a read timeout.
    Timeout,
    /// Simulate a transport failure.
    IoError,
}

/// A scripted device link for tests: every read pops the next reply, every
/// write is recorded for assertion.
#[derive(Debug, Default)]
pub struct MockLink {
    replies: std::collections::VecDeque<MockReply>,
    /// All frames written to the link, in order.
    pub writes: Vec<Vec<u8>>,
    /// When set, every write fails immediately.
    pub fail_writes: bool,
}

impl MockLink {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: replies.into(),
            writes: Vec::new(),
            fail_writes: false,
        }
    }

    /// A link whose reads always time out, like an interface that does not
    /// speak the protocol.
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }
}

impl DeviceLink for MockLink {
    fn write_report(&mut self, report: &[u8]) -> Result<(), LinkError> {
        if self.fail_writes {
            return Err(LinkError::Io("write failed".to_string()));
        }
        self.writes.push(report.to_vec());
        Ok(())
    }

    fn read_report(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, LinkError> {
        match self.replies.pop_front() {
            Some(MockReply::Frame(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(MockReply::Timeout) | None => Err(LinkError::Timeout),
            Some(MockReply::IoError) => Err(LinkError::Io("read failed".to_string())),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
