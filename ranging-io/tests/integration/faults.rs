//! Fault tolerance: failed ticks never stop the schedule

use crate::harness::{anchor, TestHarness};
use ranging_io::{ErrorKind, ListenerScope, TagEvent};
use std::time::Duration;

#[test]
fn stuck_probe_ticks_keep_last_snapshot() {
    let h = TestHarness::spi();
    h.mock.set_anchors(&[anchor(1, 100, 0, 0), anchor(2, 200, 0, 0)]);
    h.module.start(Duration::from_millis(5)).unwrap();
    h.wait_event(|e| matches!(e, TagEvent::Connected(_)));

    h.mock.set_stuck_probe(true);
    assert!(h.wait_until(|| h.module.stats().consecutive_failures >= 3));
    assert!(h.module.is_polling());
    assert_eq!(h.module.get_tag_ids(), vec![1, 2]);

    match h.wait_event(|e| e.is_error()) {
        TagEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::Communication),
        _ => unreachable!(),
    }

    h.mock.set_stuck_probe(false);
    assert!(h.wait_until(|| h.module.stats().consecutive_failures == 0));
    h.module.stop().unwrap();

    // Recovery is an update, not a reconnect
    let after: Vec<TagEvent> = h.drain();
    assert!(after
        .iter()
        .all(|e| !matches!(e, TagEvent::Connected(_) | TagEvent::Disconnected(_))));
}

#[test]
fn invalid_length_byte_is_communication_error() {
    let h = TestHarness::spi();
    h.mock.set_probe_length_override(Some(0xFF));
    h.module.start(Duration::from_millis(10)).unwrap();

    match h.next_event() {
        TagEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::Communication),
        other => panic!("expected Error, got {:?}", other),
    }
    h.module.stop().unwrap();
}

#[test]
fn device_error_code_surfaces_as_event() {
    let h = TestHarness::uart();
    h.mock.set_anchors(&[anchor(7, 700, 0, 0), anchor(8, 0, 800, 0)]);
    h.mock.set_error_code(0x07);
    h.module.start(Duration::from_millis(10)).unwrap();

    match h.next_event() {
        TagEvent::Error { kind, detail } => {
            assert_eq!(kind, ErrorKind::Device);
            assert!(detail.contains("0x07"));
        }
        other => panic!("expected Error, got {:?}", other),
    }
    h.module.stop().unwrap();
    assert!(h.module.stats().failures >= 1);
}

// Declares two records but carries half of one
const TRUNCATED_REPORT: [u8; 6] = [0x40, 0x02, 0x00, 0x01, 0x00, 0x10];

fn first_error_kind(h: &TestHarness) -> ErrorKind {
    h.module.start(Duration::from_millis(10)).unwrap();
    let event = h.wait_event(|e| e.is_error());
    h.module.stop().unwrap();
    match event {
        TagEvent::Error { kind, .. } => kind,
        _ => unreachable!(),
    }
}

#[test]
fn spi_truncated_report_is_malformed() {
    // The length byte announces all 6 bytes, so the short body reaches the decoder
    let h = TestHarness::spi();
    h.mock.set_raw_response(Some(TRUNCATED_REPORT.to_vec()));
    assert_eq!(first_error_kind(&h), ErrorKind::MalformedResponse);
}

#[test]
fn uart_truncated_report_times_out() {
    // UART waits for the 33 bytes the header announces
    let h = TestHarness::uart();
    h.mock.set_raw_response(Some(TRUNCATED_REPORT.to_vec()));
    assert_eq!(first_error_kind(&h), ErrorKind::Communication);
}

#[test]
fn duplicate_ids_rejected() {
    let h = TestHarness::spi();
    h.mock
        .set_anchors(&[anchor(4, 10, 0, 0), anchor(4, 20, 0, 0)]);
    h.module.start(Duration::from_millis(10)).unwrap();

    match h.next_event() {
        TagEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::MalformedResponse),
        other => panic!("expected Error, got {:?}", other),
    }
    h.module.stop().unwrap();
    assert!(h.module.get_tag_ids().is_empty());
}

#[test]
fn panicking_listener_does_not_stop_polling() {
    let h = TestHarness::spi();
    h.mock.set_anchors(&[anchor(1, 10, 10, 10)]);
    h.module
        .subscribe(ListenerScope::AllTags, |_| panic!("listener failure"));

    h.module.start(Duration::from_millis(5)).unwrap();
    assert!(h.wait_until(|| h.module.stats().successes >= 3));
    assert!(h.module.is_polling());
    h.module.stop().unwrap();

    assert!(matches!(h.drain().first(), Some(TagEvent::Connected(_))));
}
