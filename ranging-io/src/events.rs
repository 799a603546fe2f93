//! Tag events and listener fan-out
//!
//! Listeners register with a scope. Dispatch clones the subscriber list under
//! its lock and delivers after releasing it, so a listener may subscribe,
//! unsubscribe or stop polling from inside its callback.

use crate::core::types::{AnchorId, AnchorReading};
use crate::error::{Error, ErrorKind};
use crate::registry::TagDiff;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Queue depth of channel subscriptions
pub const CHANNEL_CAPACITY: usize = 64;

/// Change notification delivered to listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    /// Anchors seen for the first time (or again after departing)
    Connected(Vec<AnchorReading>),
    /// Anchors missing from the latest poll, with their last readings
    Disconnected(Vec<AnchorReading>),
    /// Fresh readings for anchors present in both polls
    DataAvailable(Vec<AnchorReading>),
    /// A poll tick failed
    Error { kind: ErrorKind, detail: String },
}

impl TagEvent {
    pub fn readings(&self) -> &[AnchorReading] {
        match self {
            TagEvent::Connected(r) | TagEvent::Disconnected(r) | TagEvent::DataAvailable(r) => {
                r.as_slice()
            }
            TagEvent::Error { .. } => &[],
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TagEvent::Error { .. })
    }
}

/// Which events a subscription receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerScope {
    /// Every event, including tick errors
    AllTags,
    /// Only events touching this anchor, with a one-element list
    Tag(AnchorId),
}

/// Handle returned by subscribe, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Callback listener
pub type Listener = Arc<dyn Fn(&TagEvent) + Send + Sync>;

enum Sink {
    Callback(Listener),
    Channel(Sender<TagEvent>),
}

struct Subscriber {
    id: SubscriptionId,
    scope: ListenerScope,
    sink: Sink,
}

/// Outcome of delivering one event to one subscriber
enum Delivery {
    Delivered,
    Dropped,
    Gone,
}

impl Subscriber {
    fn deliver(&self, event: &TagEvent) -> Delivery {
        match &self.sink {
            Sink::Callback(f) => {
                if catch_unwind(AssertUnwindSafe(|| f(event))).is_err() {
                    log::error!("Listener {} panicked; event discarded", self.id.0);
                }
                Delivery::Delivered
            }
            Sink::Channel(tx) => match tx.try_send(event.clone()) {
                Ok(()) => Delivery::Delivered,
                Err(TrySendError::Full(_)) => {
                    log::warn!("Subscriber {} queue full, dropping event", self.id.0);
                    Delivery::Dropped
                }
                Err(TrySendError::Disconnected(_)) => Delivery::Gone,
            },
        }
    }
}

/// Subscriber registry and dispatcher
pub struct EventHub {
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn add(&self, scope: ListenerScope, sink: Sink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .push(Arc::new(Subscriber { id, scope, sink }));
        log::debug!("Subscription {} added ({:?})", id.0, scope);
        id
    }

    /// Register a callback
    pub fn subscribe<F>(&self, scope: ListenerScope, listener: F) -> SubscriptionId
    where
        F: Fn(&TagEvent) + Send + Sync + 'static,
    {
        self.add(scope, Sink::Callback(Arc::new(listener)))
    }

    /// Register a bounded channel; dropping the receiver ends the subscription
    pub fn subscribe_channel(&self, scope: ListenerScope) -> (SubscriptionId, Receiver<TagEvent>) {
        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        (self.add(scope, Sink::Channel(tx)), rx)
    }

    /// Remove a subscription. Returns false if it was not registered.
    ///
    /// A dispatch already in progress works on its own copy of the list, so
    /// one in-flight delivery to this subscriber may still happen after this
    /// returns.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Fan out the events for one successful poll
    pub fn publish_diff(&self, diff: &TagDiff) {
        if diff.is_empty() {
            return;
        }
        let subscribers = self.subscribers.lock().clone();
        let mut gone = Vec::new();

        for sub in &subscribers {
            for event in events_for(sub.scope, diff) {
                if let Delivery::Gone = sub.deliver(&event) {
                    gone.push(sub.id);
                    break;
                }
            }
        }
        self.prune(&gone);
    }

    /// Notify all-tags subscribers of a failed tick
    pub fn publish_error(&self, error: &Error) {
        let event = TagEvent::Error {
            kind: error.kind(),
            detail: error.to_string(),
        };
        let subscribers = self.subscribers.lock().clone();
        let mut gone = Vec::new();

        for sub in subscribers
            .iter()
            .filter(|s| s.scope == ListenerScope::AllTags)
        {
            if let Delivery::Gone = sub.deliver(&event) {
                gone.push(sub.id);
            }
        }
        self.prune(&gone);
    }

    fn prune(&self, gone: &[SubscriptionId]) {
        if gone.is_empty() {
            return;
        }
        self.subscribers.lock().retain(|s| !gone.contains(&s.id));
        log::debug!("Removed {} disconnected subscription(s)", gone.len());
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Events a subscriber with `scope` should see for `diff`, in delivery order
fn events_for(scope: ListenerScope, diff: &TagDiff) -> Vec<TagEvent> {
    let pick = |readings: &[AnchorReading]| -> Vec<AnchorReading> {
        match scope {
            ListenerScope::AllTags => readings.to_vec(),
            ListenerScope::Tag(id) => readings.iter().filter(|r| r.id == id).copied().collect(),
        }
    };

    let mut events = Vec::with_capacity(3);
    let connected = pick(diff.arrived.as_slice());
    if !connected.is_empty() {
        events.push(TagEvent::Connected(connected));
    }
    let disconnected = pick(diff.departed.as_slice());
    if !disconnected.is_empty() {
        events.push(TagEvent::Disconnected(disconnected));
    }
    let updated = pick(diff.updated.as_slice());
    if !updated.is_empty() {
        events.push(TagEvent::DataAvailable(updated));
    }
    events
}
