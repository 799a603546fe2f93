//! Connect / disconnect / data-available sequences

use crate::harness::{anchor, ids, TestHarness};
use ranging_io::{ListenerScope, TagEvent};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn first_poll_connects_all_anchors() {
    let h = TestHarness::spi();
    h.mock
        .set_anchors(&[anchor(4, 3000, 4000, 0), anchor(1, 0, 0, 1200)]);

    h.module.start(Duration::from_millis(20)).unwrap();

    match h.next_event() {
        TagEvent::Connected(readings) => {
            assert_eq!(ids(&readings), vec![4, 1]);
            assert_eq!(readings[0].distance_mm, 5000);
            assert_eq!(readings[1].distance_mm, 1200);
        }
        other => panic!("expected Connected, got {:?}", other),
    }
    assert_eq!(h.module.get_distance(4).unwrap(), 5000);
    assert_eq!(h.module.get_tag_ids(), vec![4, 1]);
}

#[test]
fn identical_polls_only_emit_data_available() {
    let h = TestHarness::spi();
    h.mock.set_anchors(&[anchor(1, 100, 0, 0), anchor(2, 0, 200, 0)]);

    h.module.start(Duration::from_millis(10)).unwrap();
    assert!(h.wait_until(|| h.module.stats().successes >= 5));
    h.module.stop().unwrap();

    let successes = h.module.stats().successes;
    let events = h.drain();
    assert!(matches!(events[0], TagEvent::Connected(_)));

    let rest = &events[1..];
    assert_eq!(rest.len() as u64, successes - 1);
    for event in rest {
        match event {
            TagEvent::DataAvailable(readings) => assert_eq!(ids(readings), vec![1, 2]),
            other => panic!("unexpected event {:?}", other),
        }
    }
}

#[test]
fn arrival_and_departure_reported_once() {
    let h = TestHarness::spi();
    h.mock.set_anchors(&[anchor(1, 10, 0, 0), anchor(2, 20, 0, 0)]);
    h.module.start(Duration::from_millis(10)).unwrap();
    h.wait_event(|e| matches!(e, TagEvent::Connected(_)));

    h.mock.set_anchors(&[anchor(1, 11, 0, 0), anchor(7, 70, 0, 0)]);

    let connected = h.wait_event(|e| matches!(e, TagEvent::Connected(_)));
    assert_eq!(ids(connected.readings()), vec![7]);
    match h.next_event() {
        TagEvent::Disconnected(readings) => {
            assert_eq!(ids(&readings), vec![2]);
            assert_eq!(readings[0].distance_mm, 20);
        }
        other => panic!("expected Disconnected, got {:?}", other),
    }
    match h.next_event() {
        TagEvent::DataAvailable(readings) => assert_eq!(ids(&readings), vec![1]),
        other => panic!("expected DataAvailable, got {:?}", other),
    }

    assert!(h.wait_until(|| h.module.stats().successes >= 6));
    h.module.stop().unwrap();

    let later = h.drain();
    assert!(later
        .iter()
        .all(|e| matches!(e, TagEvent::DataAvailable(r) if ids(r) == vec![1, 7])));

    let tag_ids = h.module.get_tag_ids();
    assert!(tag_ids.contains(&7));
    assert!(!tag_ids.contains(&2));
    assert!(h.module.get_distance(2).is_err());
}

#[test]
fn single_tag_listener_sees_only_its_anchor() {
    let h = TestHarness::spi();
    let (_, tag_rx) = h.module.subscribe_channel(ListenerScope::Tag(7));
    h.mock.set_anchors(&[anchor(1, 10, 0, 0)]);

    h.module.start(Duration::from_millis(10)).unwrap();
    h.wait_event(|e| matches!(e, TagEvent::Connected(_)));

    h.mock.upsert_anchor(7, ranging_io::Position::new(0, 700, 0), 60);
    h.wait_event(|e| matches!(e, TagEvent::Connected(r) if ids(r) == vec![7]));
    h.mock.remove_anchor(7);
    h.wait_event(|e| matches!(e, TagEvent::Disconnected(r) if ids(r) == vec![7]));

    h.mock.set_error_code(0x01);
    h.wait_event(|e| e.is_error());
    h.module.stop().unwrap();

    let seen: Vec<TagEvent> = tag_rx.try_iter().collect();
    assert!(matches!(&seen[0], TagEvent::Connected(r) if ids(r) == vec![7]));
    assert!(matches!(seen.last(), Some(TagEvent::Disconnected(r)) if ids(r) == vec![7]));
    for event in &seen[1..seen.len() - 1] {
        assert!(matches!(event, TagEvent::DataAvailable(r) if ids(r) == vec![7]));
    }
    assert!(seen.iter().all(|e| !e.is_error()));
}

#[test]
fn callback_listener_and_unsubscribe() {
    let h = TestHarness::uart();
    h.mock.set_uart_chunk_size(4);
    h.mock.set_anchors(&[anchor(9, 0, 0, 900)]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let id = h
        .module
        .subscribe(ListenerScope::AllTags, move |e| sink.lock().unwrap().push(e.clone()));

    h.module.start(Duration::from_millis(10)).unwrap();
    assert!(h.wait_until(|| seen.lock().unwrap().len() >= 2));
    assert!(h.module.unsubscribe(id));
    let count = seen.lock().unwrap().len();

    let ticks = h.module.stats().ticks;
    assert!(h.wait_until(|| h.module.stats().ticks >= ticks + 3));
    h.module.stop().unwrap();

    // At most one tick was already dispatching when we unsubscribed
    assert!(seen.lock().unwrap().len() <= count + 1);
    assert_eq!(h.module.get_distance(9).unwrap(), 900);
}

#[test]
fn dropped_receiver_is_unsubscribed() {
    let h = TestHarness::spi();
    let (_, rx) = h.module.subscribe_channel(ListenerScope::AllTags);
    drop(rx);
    assert_eq!(h.module.subscriber_count(), 2);
    h.mock.set_anchors(&[anchor(1, 1, 1, 1)]);

    h.module.start(Duration::from_millis(10)).unwrap();
    h.wait_event(|e| matches!(e, TagEvent::Connected(_)));
    h.wait_event(|e| matches!(e, TagEvent::DataAvailable(_)));
    h.module.stop().unwrap();
    assert_eq!(h.module.subscriber_count(), 1);
}
