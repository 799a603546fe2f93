//! Start/stop state machine and query errors

use crate::harness::{anchor, TestHarness};
use ranging_io::{ChannelKind, Error, ListenerScope, TagEvent};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn queries_before_and_after_start() {
    let h = TestHarness::spi();
    h.mock.set_anchors(&[anchor(3, 0, 300, 400)]);

    assert!(matches!(h.module.get_distance(3), Err(Error::NotPolling)));
    assert!(h.module.get_tag_ids().is_empty());

    h.module.start(Duration::from_millis(10)).unwrap();
    h.wait_event(|e| matches!(e, TagEvent::Connected(_)));

    assert_eq!(h.module.get_distance(3).unwrap(), 500);
    assert!(matches!(h.module.get_distance(0x99), Err(Error::UnknownTag(0x99))));
    let reading = h.module.get_reading(3).unwrap();
    assert_eq!(reading.quality, 80);
    assert_eq!(reading.position.z_mm, 400);

    // Stopping keeps the last snapshot queryable
    h.module.stop().unwrap();
    assert_eq!(h.module.get_distance(3).unwrap(), 500);
}

#[test]
fn no_exchanges_after_stop() {
    let h = TestHarness::spi();
    h.module.start(Duration::from_millis(5)).unwrap();
    assert!(h.wait_until(|| h.mock.request_count() >= 3));
    h.module.stop().unwrap();
    assert!(!h.module.is_polling());

    let exchanges = h.mock.exchange_count();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(h.mock.exchange_count(), exchanges);
}

#[test]
fn stop_twice_and_start_twice() {
    let h = TestHarness::uart();
    assert_eq!(h.module.channel_kind(), ChannelKind::Uart);

    h.module.stop().unwrap();
    h.module.start(Duration::from_millis(10)).unwrap();
    h.module.start(Duration::from_millis(10)).unwrap();
    assert!(h.module.is_polling());

    h.module.stop().unwrap();
    h.module.stop().unwrap();
    assert!(!h.module.is_polling());
    assert!(!h.mock.is_closed());
}

#[test]
fn restart_keeps_registry() {
    let h = TestHarness::spi();
    h.mock.set_anchors(&[anchor(5, 50, 0, 0)]);
    h.module.start(Duration::from_millis(10)).unwrap();
    h.wait_event(|e| matches!(e, TagEvent::Connected(_)));
    h.module.stop().unwrap();
    h.drain();

    h.module.start(Duration::from_millis(10)).unwrap();
    let event = h.next_event();
    h.module.stop().unwrap();
    assert!(matches!(event, TagEvent::DataAvailable(_)));
}

#[test]
fn start_default_uses_configured_period() {
    let h = TestHarness::spi();
    assert_eq!(h.module.config().polling.period_ms, 100);
    h.module.start_default().unwrap();
    assert!(h.wait_until(|| h.module.stats().ticks >= 1));
    h.module.stop().unwrap();
    assert!(matches!(
        h.module.start(Duration::ZERO),
        Err(Error::InvalidRequest(_))
    ));
}

#[test]
fn listener_can_stop_polling() {
    let h = TestHarness::spi();
    h.mock.set_anchors(&[anchor(2, 0, 0, 20)]);

    let weak = Arc::downgrade(&h.module);
    h.module.subscribe(ListenerScope::AllTags, move |event| {
        if matches!(event, TagEvent::Connected(_)) {
            if let Some(module) = weak.upgrade() {
                module.stop().unwrap();
            }
        }
    });

    h.module.start(Duration::from_millis(5)).unwrap();
    assert!(h.wait_until(|| !h.module.is_polling()));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(h.module.stats().ticks, 1);

    // The self-stopped run is joined by the next start
    h.module.start(Duration::from_millis(5)).unwrap();
    assert!(h.wait_until(|| h.module.stats().ticks >= 3));
    h.module.stop().unwrap();
}

#[test]
fn drop_releases_transport() {
    let h = TestHarness::spi();
    let mock = h.mock.clone();
    h.module.start(Duration::from_millis(5)).unwrap();
    drop(h);
    assert!(mock.is_closed());
    assert_eq!(mock.close_count(), 1);
}
