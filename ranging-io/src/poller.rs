//! Background poll scheduler
//!
//! `Stopped → Running → Stopped`. While running, one thread owns the codec
//! and the tag registry, polls the module at a fixed rate, swaps the store
//! and publishes events. Stopping hands the codec back so polling can be
//! restarted on the same handle.

use crate::core::types::DistanceSnapshot;
use crate::error::{Error, Result};
use crate::events::EventHub;
use crate::protocol::TlvCodec;
use crate::registry::{TagDiff, TagRegistry};
use crate::store::DistanceStore;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_THREAD_NAME: &str = "ranging-poll";

static NEXT_POLLER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Set on poll threads: owning poller and its stop flag
    static CURRENT_POLL: RefCell<Option<(u64, Arc<AtomicBool>)>> = const { RefCell::new(None) };
}

/// Tick counters, readable from any thread
#[derive(Debug, Default)]
pub struct PollStats {
    ticks: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    consecutive_failures: AtomicU64,
}

/// Point-in-time copy of [`PollStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStatsSnapshot {
    pub ticks: u64,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
}

impl PollStatsSnapshot {
    /// Failed ticks as a percentage of all ticks
    pub fn error_rate(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            (self.failures as f64 / self.ticks as f64) * 100.0
        }
    }
}

impl PollStats {
    fn record_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self) -> u64 {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> PollStatsSnapshot {
        PollStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
        }
    }
}

/// Everything one tick needs; owned by the poll thread while running
struct TickContext {
    codec: TlvCodec,
    registry: TagRegistry,
    store: Arc<DistanceStore>,
    hub: Arc<EventHub>,
    stats: Arc<PollStats>,
    stats_log_interval: u64,
}

impl TickContext {
    fn tick(&mut self) {
        let tick = self.stats.record_tick();

        match self.poll_once() {
            Ok(diff) => {
                self.stats.record_success();
                log::trace!(
                    "Tick {}: {} arrived, {} departed, {} updated",
                    tick,
                    diff.arrived.len(),
                    diff.departed.len(),
                    diff.updated.len()
                );
                self.hub.publish_diff(&diff);
            }
            Err(e) => {
                let consecutive = self.stats.record_failure();
                log::warn!(
                    "Poll tick {} skipped ({} consecutive failures): {}",
                    tick,
                    consecutive,
                    e
                );
                self.hub.publish_error(&e);
            }
        }

        if self.stats_log_interval > 0 && tick % self.stats_log_interval == 0 {
            let stats = self.stats.snapshot();
            log::info!(
                "Poll stats: {} ticks, {:.2}% error rate, {} anchors",
                stats.ticks,
                stats.error_rate(),
                self.store.snapshot().len()
            );
        }
    }

    fn poll_once(&mut self) -> Result<TagDiff> {
        let readings = self.codec.request_positions()?;
        let snapshot = Arc::new(DistanceSnapshot::from_readings(readings)?);
        self.store.replace(Arc::clone(&snapshot));
        Ok(self.registry.apply(snapshot))
    }
}

struct RunHandle {
    stop_tx: Sender<()>,
    stop_flag: Arc<AtomicBool>,
    handle: JoinHandle<TickContext>,
}

struct PollerInner {
    /// Present while stopped
    ctx: Option<TickContext>,
    /// Present while running, or after a self-stop until reaped
    run: Option<RunHandle>,
}

/// Fixed-rate poll scheduler
pub struct Poller {
    id: u64,
    inner: Mutex<PollerInner>,
    running: AtomicBool,
    stats: Arc<PollStats>,
}

impl Poller {
    pub fn new(
        codec: TlvCodec,
        store: Arc<DistanceStore>,
        hub: Arc<EventHub>,
        stats_log_interval: u64,
    ) -> Self {
        let stats = Arc::new(PollStats::default());
        let ctx = TickContext {
            codec,
            registry: TagRegistry::new(),
            store,
            hub,
            stats: Arc::clone(&stats),
            stats_log_interval,
        };
        Self {
            id: NEXT_POLLER_ID.fetch_add(1, Ordering::Relaxed),
            inner: Mutex::new(PollerInner {
                ctx: Some(ctx),
                run: None,
            }),
            running: AtomicBool::new(false),
            stats,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PollStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop flag of the current run if called from this poller's own thread
    fn own_thread_stop_flag(&self) -> Option<Arc<AtomicBool>> {
        CURRENT_POLL.with(|current| {
            current
                .borrow()
                .as_ref()
                .filter(|(id, _)| *id == self.id)
                .map(|(_, flag)| Arc::clone(flag))
        })
    }

    /// Start polling every `period`, first tick immediately
    pub fn start(&self, period: Duration) -> Result<()> {
        if period.is_zero() {
            return Err(Error::InvalidRequest(
                "poll period must be non-zero".to_string(),
            ));
        }

        if let Some(flag) = self.own_thread_stop_flag() {
            if flag.load(Ordering::SeqCst) {
                return Err(Error::InvalidRequest(
                    "cannot restart polling from the poll thread after stopping it".to_string(),
                ));
            }
            log::debug!("start() from the poll thread ignored; already running");
            return Ok(());
        }

        let mut inner = self.inner.lock();

        if let Some(run) = inner.run.as_ref() {
            if !run.stop_flag.load(Ordering::SeqCst) {
                log::info!("Polling already running; start ignored");
                return Ok(());
            }
        }
        // A run that stopped itself from a listener is joined here
        if let Some(run) = inner.run.take() {
            self.join_run(&mut inner, run)?;
        }

        let ctx = inner.ctx.take().ok_or_else(|| {
            Error::Other("transport unavailable after poll thread failure".to_string())
        })?;
        ctx.store.mark_polling_started();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_flag = Arc::clone(&stop_flag);
        let poller_id = self.id;

        self.running.store(true, Ordering::SeqCst);
        let handle = thread::Builder::new()
            .name(POLL_THREAD_NAME.to_string())
            .spawn(move || Self::poll_loop(ctx, period, stop_rx, thread_flag, poller_id))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                log::error!("Failed to spawn poll thread: {}", e);
                Error::Other(format!("Failed to spawn poll thread: {}", e))
            })?;

        inner.run = Some(RunHandle {
            stop_tx,
            stop_flag,
            handle,
        });

        log::info!("Polling started every {:?}", period);
        Ok(())
    }

    /// Stop polling. No tick runs after this returns, except when called
    /// from the poll thread itself, where the current tick is the last.
    pub fn stop(&self) -> Result<()> {
        if let Some(flag) = self.own_thread_stop_flag() {
            if !flag.swap(true, Ordering::SeqCst) {
                self.running.store(false, Ordering::SeqCst);
                log::info!("Polling stop requested from the poll thread; current tick is the last");
            }
            return Ok(());
        }

        let mut inner = self.inner.lock();
        let Some(run) = inner.run.take() else {
            log::debug!("stop() while stopped ignored");
            return Ok(());
        };
        log::info!("Stopping poller...");
        self.join_run(&mut inner, run)?;
        log::info!("Poller stopped");
        Ok(())
    }

    /// Signal a run, wait for its thread and take back the tick context.
    /// The poll thread never takes `inner`, so joining under it is safe.
    fn join_run(&self, inner: &mut PollerInner, run: RunHandle) -> Result<()> {
        run.stop_flag.store(true, Ordering::SeqCst);
        drop(run.stop_tx);

        let joined = run.handle.join();
        self.running.store(false, Ordering::SeqCst);

        match joined {
            Ok(ctx) => {
                inner.ctx = Some(ctx);
                Ok(())
            }
            Err(_) => {
                log::error!("Poll thread panicked; transport lost");
                Err(Error::ThreadPanic)
            }
        }
    }

    fn poll_loop(
        mut ctx: TickContext,
        period: Duration,
        stop_rx: Receiver<()>,
        stop_flag: Arc<AtomicBool>,
        poller_id: u64,
    ) -> TickContext {
        CURRENT_POLL.with(|current| {
            *current.borrow_mut() = Some((poller_id, Arc::clone(&stop_flag)));
        });
        log::debug!("Poll thread running");

        let mut next_tick = Instant::now();
        loop {
            if stop_flag.load(Ordering::SeqCst) {
                break;
            }
            ctx.tick();
            if stop_flag.load(Ordering::SeqCst) {
                break;
            }

            next_tick += period;
            let now = Instant::now();
            if next_tick < now {
                log::debug!("Poll tick overran its period; rescheduling from now");
                next_tick = now;
            }

            match stop_rx.recv_timeout(next_tick.saturating_duration_since(now)) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        CURRENT_POLL.with(|current| current.borrow_mut().take());
        log::debug!("Poll thread exiting");
        ctx
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Error stopping poller on drop: {}", e);
        }
    }
}
