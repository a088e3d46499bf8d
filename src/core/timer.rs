//! One-second UI ticker for the active session.
//!
//! Elapsed time is recomputed from the wall clock on every tick, so delayed
//! or skipped ticks correct themselves. At most one ticker runs per timer:
//! `start` cancels the previous one before spawning the next.

use crate::core::clock::{Clock, millis_since};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

struct Ticker {
    anchor: DateTime<Utc>,
    cancel: CancellationToken,
}

pub struct Timer {
    clock: Arc<dyn Clock>,
    period: Duration,
    elapsed: Arc<watch::Sender<u64>>,
    running: Mutex<Option<Ticker>>,
    generation: Arc<AtomicU64>,
    ticks: Arc<AtomicU64>,
    cancellations: AtomicU64,
}

impl Timer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_period(clock, TICK_PERIOD)
    }

    pub fn with_period(clock: Arc<dyn Clock>, period: Duration) -> Self {
        let (elapsed, _) = watch::channel(0);
        Self {
            clock,
            period,
            elapsed: Arc::new(elapsed),
            running: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
            ticks: Arc::new(AtomicU64::new(0)),
            cancellations: AtomicU64::new(0),
        }
    }

    /// Start ticking against `anchor`, cancelling any running ticker first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, anchor: DateTime<Utc>) {
        let mut running = self.running.lock();
        if let Some(previous) = running.take() {
            previous.cancel.cancel();
            let _ = self.cancellations.fetch_add(1, Ordering::Relaxed);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let _ = self
            .elapsed
            .send_replace(millis_since(self.clock.as_ref(), anchor));

        let task = TickTask {
            clock: Arc::clone(&self.clock),
            period: self.period,
            anchor,
            generation,
            current: Arc::clone(&self.generation),
            elapsed: Arc::clone(&self.elapsed),
            ticks: Arc::clone(&self.ticks),
            cancel: cancel.clone(),
        };
        drop(tokio::spawn(task.run()));

        *running = Some(Ticker { anchor, cancel });
    }

    /// Stop ticking and reset elapsed to zero.
    pub fn stop(&self) {
        let mut running = self.running.lock();
        if let Some(previous) = running.take() {
            previous.cancel.cancel();
            let _ = self.cancellations.fetch_add(1, Ordering::Relaxed);
        }
        let _ = self.generation.fetch_add(1, Ordering::SeqCst);
        let _ = self.elapsed.send_replace(0);
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    pub fn anchor(&self) -> Option<DateTime<Utc>> {
        self.running.lock().as_ref().map(|t| t.anchor)
    }

    pub fn elapsed_millis(&self) -> u64 {
        *self.elapsed.borrow()
    }

    /// Receiver notified on every tick.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.elapsed.subscribe()
    }

    /// Total ticks delivered by all tickers so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// How many running tickers have been cancelled (by `start` or `stop`).
    pub fn cancellations(&self) -> u64 {
        self.cancellations.load(Ordering::Relaxed)
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(ticker) = self.running.get_mut().take() {
            ticker.cancel.cancel();
        }
    }
}

struct TickTask {
    clock: Arc<dyn Clock>,
    period: Duration,
    anchor: DateTime<Utc>,
    generation: u64,
    current: Arc<AtomicU64>,
    elapsed: Arc<watch::Sender<u64>>,
    ticks: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl TickTask {
    async fn run(self) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = interval.tick() => {
                    // a stale ticker must never overwrite a newer anchor
                    if self.current.load(Ordering::SeqCst) != self.generation {
                        break;
                    }
                    let millis = millis_since(self.clock.as_ref(), self.anchor);
                    let _ = self.ticks.fetch_add(1, Ordering::Relaxed);
                    let _ = self.elapsed.send_replace(millis);
                    trace!(elapsed_ms = millis, "tick");
                }
            }
        }
    }
}
