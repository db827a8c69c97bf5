//! Integration tests for the receiver queries, driving the full
//! request/parse/degrade path over scripted links.

use haptic_core::protocol::frames;
use haptic_core::protocol::{DeviceLink, MockLink, MockReply};
use haptic_core::protocol::client::{query_connection_bitmap, query_paired_slots};

fn boxed(links: Vec<MockLink>) -> Vec<Box<dyn DeviceLink>> {
    links
        .into_iter()
        .map(|l| Box::new(l) as Box<dyn DeviceLink>)
        .collect()
}

// ── Pairing sweep ─────────────────────────────────────────────────────────────

#[test]
fn pairing_sweep_full_receiver_reports_all_slots() {
    let replies = (1..=6)
        .map(|slot| MockReply::Frame(vec![0x10, 0xFF, 0x81, 0xB5, slot, 0x04, 0x01]))
        .collect();
    let mut links = boxed(vec![MockLink::new(replies)]);

    let result = query_paired_slots(&mut links);

    assert!(result.success);
    assert_eq!(result.connected_devices.len(), 6);
    let slots: Vec<u8> = result.connected_devices.iter().map(|d| d.slot_index).collect();
    assert_eq!(slots, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn pairing_sweep_records_wireless_pid_low_byte() {
    let mut replies = vec![MockReply::Frame(vec![0x10, 0xFF, 0x81, 0xB5, 0xAB, 0x04, 0x01])];
    replies.extend((0..5).map(|_| MockReply::Frame(vec![0x10, 0xFF, 0x81, 0xB5, 0, 0, 0])));
    let mut links = boxed(vec![MockLink::new(replies)]);

    let result = query_paired_slots(&mut links);

    assert_eq!(
        result.connected_devices[0].wireless_product_id.as_deref(),
        Some("0xAB")
    );
}

#[test]
fn pairing_sweep_mixed_timeouts_and_errors_still_succeeds() {
    let replies = vec![
        MockReply::Timeout,
        MockReply::Frame(vec![0x8F, 0xFF, 0x81, 0xB5, 0x0A, 0x00, 0x00]),
        MockReply::Frame(vec![0x10, 0xFF, 0x81, 0xB5, 0x07, 0x04, 0x02]),
        MockReply::Timeout,
        MockReply::IoError,
        MockReply::Timeout,
    ];
    let mut links = boxed(vec![MockLink::new(replies)]);

    let result = query_paired_slots(&mut links);

    assert!(result.success, "one answered slot keeps the query successful");
    assert_eq!(result.connected_devices.len(), 1);
    assert_eq!(result.connected_devices[0].slot_index, 3);
}

#[test]
fn pairing_sweep_requests_are_addressed_per_slot() {
    let mut link = MockLink::new(
        (0..6)
            .map(|_| MockReply::Frame(vec![0x10, 0xFF, 0x81, 0xB5, 0, 0, 0]))
            .collect(),
    );
    // Drive the sweep directly so the writes stay observable afterwards.
    for slot in 1..=6u8 {
        link.write_report(&frames::pairing_info_request(slot)).unwrap();
    }
    assert_eq!(link.writes.len(), 6);
    assert_eq!(link.writes[0][4], 0x20);
    assert_eq!(link.writes[5][4], 0x25);
    for write in &link.writes {
        assert_eq!(write[0], 0x10);
        assert_eq!(write[1], 0xFF);
        assert_eq!(write[2], 0x81);
        assert_eq!(write[3], 0xB5);
    }
}

// ── Connection bitmap ─────────────────────────────────────────────────────────

#[test]
fn bitmap_query_slots_one_and_three_for_0b101() {
    let replies = vec![
        MockReply::Frame(vec![0x10, 0xFF, 0x81, 0x02, 0x00, 0b0000_0101, 0x00]),
        // both name resolutions fail fast, placeholders used
        MockReply::Timeout,
        MockReply::Timeout,
    ];
    let mut links = boxed(vec![MockLink::new(replies)]);

    let result = query_connection_bitmap(&mut links);

    assert!(result.success);
    let slots: Vec<u8> = result.connected_devices.iter().map(|d| d.slot_index).collect();
    assert_eq!(slots, vec![1, 3]);
}

#[test]
fn bitmap_query_full_name_resolution_path() {
    let name_frame = {
        let mut f = vec![0x11, 0x02, 0x07, 0x10];
        f.extend_from_slice(b"Trackpad\0\0\0\0\0\0\0\0");
        f
    };
    let replies = vec![
        MockReply::Frame(vec![0x10, 0xFF, 0x81, 0x02, 0x00, 0b0000_0010, 0x00]),
        MockReply::Frame(vec![0x10, 0x02, 0x00, 0x00, 0x07, 0x00, 0x00]), // feature index 7
        MockReply::Frame(vec![0x10, 0x02, 0x07, 0x00, 0x08, 0x00, 0x00]), // 8 characters
        MockReply::Frame(name_frame),
    ];
    let mut links = boxed(vec![MockLink::new(replies)]);

    let result = query_connection_bitmap(&mut links);

    assert_eq!(result.connected_devices.len(), 1);
    assert_eq!(result.connected_devices[0].slot_index, 2);
    assert_eq!(
        result.connected_devices[0].device_name.as_deref(),
        Some("Trackpad")
    );
}

#[test]
fn bitmap_query_first_silent_link_is_skipped() {
    let answering = MockLink::new(vec![MockReply::Frame(vec![
        0x10, 0xFF, 0x81, 0x02, 0x00, 0x00, 0x00,
    ])]);
    let mut links = boxed(vec![MockLink::silent(), answering]);

    let result = query_connection_bitmap(&mut links);

    assert!(result.success);
    assert!(result.connected_devices.is_empty());
}

#[test]
fn bitmap_query_keeps_raw_hex_for_diagnostics() {
    let replies = vec![MockReply::Frame(vec![
        0x10, 0xFF, 0x81, 0x02, 0x00, 0x05, 0x00,
    ])];
    // Name resolutions will time out; slots still appear with placeholders.
    let mut links = boxed(vec![MockLink::new(replies)]);

    let result = query_connection_bitmap(&mut links);

    assert_eq!(
        result.raw_response_hex.as_deref(),
        Some("10-FF-81-02-00-05-00")
    );
}
