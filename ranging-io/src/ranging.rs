//! Ranging module facade
//!
//! One owned instance per physical module. Wires transport, codec, poller,
//! store and event hub together; hand an `Arc<RangingModule>` to whatever
//! needs distances or events.

use crate::config::RangingConfig;
use crate::core::types::{AnchorId, AnchorReading, DistanceSnapshot};
use crate::error::{Error, Result};
use crate::events::{EventHub, ListenerScope, SubscriptionId, TagEvent};
use crate::poller::{PollStatsSnapshot, Poller};
use crate::protocol::{HandshakeTiming, TlvCodec};
use crate::store::DistanceStore;
use crate::transport::{self, ChannelKind, Transport};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::Duration;

/// UWB ranging module
pub struct RangingModule {
    config: RangingConfig,
    channel_kind: ChannelKind,
    store: Arc<DistanceStore>,
    hub: Arc<EventHub>,
    poller: Poller,
}

impl RangingModule {
    /// Open the channel named in `config.module.channel`
    pub fn open(config: RangingConfig) -> Result<Self> {
        let transport = transport::open(&config.module.channel, &config)?;
        Ok(Self::with_transport(transport, config))
    }

    /// Build on an already opened transport (e.g. [`crate::MockTransport`])
    pub fn with_transport(transport: Box<dyn Transport>, config: RangingConfig) -> Self {
        let channel_kind = transport.kind();
        let codec = TlvCodec::new(transport, HandshakeTiming::from(&config.handshake));
        let store = Arc::new(DistanceStore::new());
        let hub = Arc::new(EventHub::new());
        let poller = Poller::new(
            codec,
            Arc::clone(&store),
            Arc::clone(&hub),
            config.polling.stats_log_interval,
        );

        log::info!("Ranging module ready on {:?} channel", channel_kind);
        Self {
            config,
            channel_kind,
            store,
            hub,
            poller,
        }
    }

    pub fn config(&self) -> &RangingConfig {
        &self.config
    }

    pub fn channel_kind(&self) -> ChannelKind {
        self.channel_kind
    }

    /// Start polling every `period`. No-op if already polling.
    pub fn start(&self, period: Duration) -> Result<()> {
        self.poller.start(period)
    }

    /// Start polling at `polling.period_ms`
    pub fn start_default(&self) -> Result<()> {
        if self.config.polling.period_ms == 0 {
            return Err(Error::Config("polling.period_ms must be non-zero".to_string()));
        }
        self.start(Duration::from_millis(self.config.polling.period_ms))
    }

    /// Stop polling. No-op if already stopped.
    pub fn stop(&self) -> Result<()> {
        self.poller.stop()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_polling()
    }

    /// Latest distance to `id` in millimetres
    pub fn get_distance(&self, id: AnchorId) -> Result<u32> {
        self.store.get_distance(id)
    }

    pub fn get_reading(&self, id: AnchorId) -> Result<AnchorReading> {
        self.store.get_reading(id)
    }

    /// Anchors in the current snapshot, in poll order
    pub fn get_tag_ids(&self) -> Vec<AnchorId> {
        self.store.get_tag_ids()
    }

    pub fn snapshot(&self) -> Arc<DistanceSnapshot> {
        self.store.snapshot()
    }

    /// Register a callback. It runs on the poll thread and must not block.
    pub fn subscribe<F>(&self, scope: ListenerScope, listener: F) -> SubscriptionId
    where
        F: Fn(&TagEvent) + Send + Sync + 'static,
    {
        self.hub.subscribe(scope, listener)
    }

    /// Register a bounded event queue for consumers on their own thread
    pub fn subscribe_channel(&self, scope: ListenerScope) -> (SubscriptionId, Receiver<TagEvent>) {
        self.hub.subscribe_channel(scope)
    }

    /// Remove a subscription. A tick already dispatching may still deliver
    /// one more event to it.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    pub fn stats(&self) -> PollStatsSnapshot {
        self.poller.stats()
    }
}
