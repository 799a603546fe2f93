//! Test harness wrapping a mock-backed ranging module

use crossbeam_channel::Receiver;
use ranging_io::{
    AnchorId, ListenerScope, MockTransport, Position, RangingConfig, RangingModule, TagEvent,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound for anything the tests wait on
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(3);

/// Anchor entry as scripted into the mock
pub fn anchor(id: AnchorId, x: i32, y: i32, z: i32) -> (AnchorId, Position, u8) {
    (id, Position::new(x, y, z), 80)
}

/// Module under test plus the mock's control handle and an all-tags queue
pub struct TestHarness {
    pub mock: MockTransport,
    pub module: Arc<RangingModule>,
    pub events: Receiver<TagEvent>,
}

impl TestHarness {
    pub fn spi() -> Self {
        Self::new(MockTransport::spi())
    }

    pub fn uart() -> Self {
        Self::new(MockTransport::uart())
    }

    pub fn new(mock: MockTransport) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut config = RangingConfig::default();
        config.polling.stats_log_interval = 0;

        let module = Arc::new(RangingModule::with_transport(
            Box::new(mock.clone()),
            config,
        ));
        let (_, events) = module.subscribe_channel(ListenerScope::AllTags);
        Self {
            mock,
            module,
            events,
        }
    }

    /// Next event, failing the test if none arrives in time
    pub fn next_event(&self) -> TagEvent {
        self.events
            .recv_timeout(WAIT_TIMEOUT)
            .expect("timed out waiting for event")
    }

    /// Skip events until one matches
    pub fn wait_event(&self, matches: impl Fn(&TagEvent) -> bool) -> TagEvent {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) if matches(&event) => return event,
                Ok(_) => continue,
                Err(_) => panic!("timed out waiting for matching event"),
            }
        }
    }

    /// Everything queued right now
    pub fn drain(&self) -> Vec<TagEvent> {
        self.events.try_iter().collect()
    }

    pub fn wait_until(&self, cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        let _ = self.module.stop();
    }
}

pub fn ids(readings: &[ranging_io::AnchorReading]) -> Vec<AnchorId> {
    readings.iter().map(|r| r.id).collect()
}
