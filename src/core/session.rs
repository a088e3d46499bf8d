//! Attendance session manager.
//!
//! State is derived only from the latest record snapshot: a command never
//! flips the view locally, it waits for the stream to show the new record.
//! Missed or reordered notifications and writes from other devices are
//! absorbed by re-deriving everything from the next snapshot.

use crate::core::clock::Clock;
use crate::core::location::LocationResolver;
use crate::core::reconcile::{ActiveSession, reconcile};
use crate::core::timer::Timer;
use crate::errors::{AppError, AppResult, StreamError};
use crate::models::record::{AttendanceRecord, NewRecord, RecordId, RecordPatch, UserId};
use crate::models::session_view::{SessionView, SyncStatus};
use crate::store::{RecordStore, SubscriptionHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a check-in/check-out that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The write was accepted; the stream will confirm it.
    Submitted(RecordId),
    /// The manager was torn down while the command ran; the result is dropped.
    Discarded,
}

#[derive(Debug, Clone)]
struct MachineState {
    sync: SyncStatus,
    active: Option<ActiveSession>,
    open_sessions: usize,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            sync: SyncStatus::Loading,
            active: None,
            open_sessions: 0,
        }
    }
}

struct Inner {
    user: UserId,
    store: Arc<dyn RecordStore>,
    resolver: LocationResolver,
    clock: Arc<dyn Clock>,
    timer: Timer,
    state: Mutex<MachineState>,
    view: watch::Sender<SessionView>,
    in_flight: AtomicBool,
    alive: CancellationToken,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

/// Cheap to clone; clones share one state machine.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

/// Clears the in-flight flag when a command ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

enum Expect {
    Idle,
    Active,
}

impl SessionManager {
    pub fn new(
        user: UserId,
        store: Arc<dyn RecordStore>,
        resolver: LocationResolver,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let timer = Timer::new(Arc::clone(&clock));
        Self::with_timer(user, store, resolver, clock, timer)
    }

    pub fn with_timer(
        user: UserId,
        store: Arc<dyn RecordStore>,
        resolver: LocationResolver,
        clock: Arc<dyn Clock>,
        timer: Timer,
    ) -> Self {
        let (view, _) = watch::channel(SessionView::loading());
        Self {
            inner: Arc::new(Inner {
                user,
                store,
                resolver,
                clock,
                timer,
                state: Mutex::new(MachineState::default()),
                view,
                in_flight: AtomicBool::new(false),
                alive: CancellationToken::new(),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to the user's records and start applying snapshots.
    pub async fn attach(&self) -> AppResult<()> {
        if !self.is_alive() {
            return Err(AppError::Other("session manager was torn down".into()));
        }

        if self.inner.subscription.lock().is_some() {
            return Ok(());
        }

        let mut subscription = self.inner.store.subscribe(&self.inner.user).await?;
        *self.inner.subscription.lock() = Some(subscription.handle());

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let alive = self.inner.alive.clone();
        drop(tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    () = alive.cancelled() => break,
                    event = subscription.next() => event,
                };
                let Some(inner) = weak.upgrade() else { break };
                if !inner.is_alive() {
                    break;
                }
                match event {
                    Some(Ok(records)) => inner.apply_snapshot(&records),
                    Some(Err(e)) => inner.apply_stream_error(e),
                    None => {
                        inner.apply_stream_error(StreamError::Closed);
                        break;
                    }
                }
            }
            debug!("record stream pump stopped");
        }));

        info!(user = %self.inner.user, "attendance session attached");
        Ok(())
    }

    /// Apply a snapshot directly (the stream pump does this for attached
    /// managers).
    pub fn on_stream_update(&self, records: &[AttendanceRecord]) {
        self.inner.apply_snapshot(records);
    }

    pub fn on_stream_error(&self, err: StreamError) {
        self.inner.apply_stream_error(err);
    }

    pub fn view(&self) -> SessionView {
        self.inner.current_view()
    }

    /// Receiver updated on every applied snapshot or stream error.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.inner.view.subscribe()
    }

    pub fn timer(&self) -> &Timer {
        &self.inner.timer
    }

    pub fn user(&self) -> &UserId {
        &self.inner.user
    }

    /// True while a check-in/check-out is running; the UI should disable the
    /// button.
    pub fn is_busy(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    /// Wait until a published view satisfies `pred`.
    pub async fn wait_for<F>(&self, timeout: Duration, mut pred: F) -> AppResult<SessionView>
    where
        F: FnMut(&SessionView) -> bool,
    {
        let mut rx = self.watch();
        let waited = tokio::time::timeout(timeout, async {
            rx.wait_for(|v| pred(v)).await.map(|v| v.clone())
        })
        .await
        .map_err(|_| AppError::ConfirmationTimeout)?;

        let view = waited.map_err(|_| AppError::Stream(StreamError::Closed))?;
        Ok(self.inner.with_elapsed(view))
    }

    /// Check in when idle, check out when active.
    pub async fn toggle(&self) -> AppResult<CommandOutcome> {
        let view = self.inner.require_known()?;
        if view.is_active {
            self.check_out().await
        } else {
            self.check_in().await
        }
    }

    pub async fn check_in(&self) -> AppResult<CommandOutcome> {
        let inner = &self.inner;
        let _guard = inner.begin_command()?;
        inner.require(Expect::Idle)?;

        let location = inner.resolver.locate().await?;

        // another device may have checked in while we were locating
        inner.require(Expect::Idle)?;

        let record = NewRecord {
            checked_in_at: inner.clock.now(),
            check_in_location: location,
        };
        let result = inner.store.create(&inner.user, record).await;

        if !inner.is_alive() {
            debug!("manager torn down during check-in, discarding result");
            return Ok(CommandOutcome::Discarded);
        }

        let id = result?;
        info!(user = %inner.user, record = %id, "check-in submitted");
        Ok(CommandOutcome::Submitted(id))
    }

    pub async fn check_out(&self) -> AppResult<CommandOutcome> {
        let inner = &self.inner;
        let _guard = inner.begin_command()?;
        inner.require(Expect::Active)?;

        let location = inner.resolver.locate().await?;

        // target whatever the stream says is active now
        let id = inner
            .require(Expect::Active)?
            .ok_or(AppError::NotCheckedIn)?;

        let patch = RecordPatch {
            checked_out_at: inner.clock.now(),
            check_out_location: location,
        };
        let result = inner.store.update(&inner.user, &id, patch).await;

        if !inner.is_alive() {
            debug!("manager torn down during check-out, discarding result");
            return Ok(CommandOutcome::Discarded);
        }

        result?;
        info!(user = %inner.user, record = %id, "check-out submitted");
        Ok(CommandOutcome::Submitted(id))
    }

    /// Release the subscription and the timer. In-flight commands finish but
    /// their results are discarded. Idempotent.
    pub fn teardown(&self) {
        self.inner.shutdown();
    }
}

impl Inner {
    fn is_alive(&self) -> bool {
        !self.alive.is_cancelled()
    }

    fn begin_command(&self) -> AppResult<InFlight<'_>> {
        if !self.is_alive() {
            return Err(AppError::Other("session manager was torn down".into()));
        }
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::CommandInFlight)?;
        Ok(InFlight(&self.in_flight))
    }

    fn require_known(&self) -> AppResult<SessionView> {
        let view = self.current_view();
        match view.sync {
            SyncStatus::Live => Ok(view),
            SyncStatus::Loading => Err(AppError::StateUnknown),
            SyncStatus::Lost { reason } => {
                Err(AppError::Stream(StreamError::Disconnected(reason)))
            }
        }
    }

    /// Guard against the latest known state. Returns the active id, if any.
    fn require(&self, expect: Expect) -> AppResult<Option<RecordId>> {
        let view = self.require_known()?;
        match (expect, view.is_active) {
            (Expect::Idle, true) => Err(AppError::AlreadyCheckedIn),
            (Expect::Active, false) => Err(AppError::NotCheckedIn),
            _ => Ok(view.active_record_id),
        }
    }

    fn apply_snapshot(&self, records: &[AttendanceRecord]) {
        if !self.is_alive() {
            return;
        }
        let reconciled = reconcile(records);
        let mut state = self.state.lock();

        if reconciled.open_sessions > 1
            && let Some(active) = &reconciled.active
        {
            warn!(
                user = %self.user,
                open = reconciled.open_sessions,
                chosen = %active.id,
                "several open sessions visible, following the latest check-in"
            );
        }

        match &reconciled.active {
            Some(active) => {
                let same = state.active.as_ref() == Some(active);
                if let Some(previous) = &state.active
                    && previous.id != active.id
                {
                    info!(
                        previous = %previous.id,
                        current = %active.id,
                        "active session replaced by another writer"
                    );
                }
                if !same || !self.timer.is_running() {
                    self.timer.start(active.since);
                }
            }
            None => {
                if state.active.is_some() || self.timer.is_running() {
                    self.timer.stop();
                }
            }
        }

        *state = MachineState {
            sync: SyncStatus::Live,
            active: reconciled.active,
            open_sessions: reconciled.open_sessions,
        };
        debug!(
            user = %self.user,
            records = records.len(),
            active = state.active.is_some(),
            "snapshot applied"
        );

        let view = self.build_view(&state);
        drop(state);
        let _ = self.view.send_replace(view);
    }

    fn apply_stream_error(&self, err: StreamError) {
        if !self.is_alive() {
            return;
        }
        let mut state = self.state.lock();
        warn!(user = %self.user, error = %err, "record stream lost, keeping last known state");
        // last derived state stays, flagged as stale
        state.sync = SyncStatus::Lost {
            reason: err.to_string(),
        };
        let view = self.build_view(&state);
        drop(state);
        let _ = self.view.send_replace(view);
    }

    fn build_view(&self, state: &MachineState) -> SessionView {
        SessionView {
            is_active: state.active.is_some(),
            active_record_id: state.active.as_ref().map(|a| a.id.clone()),
            active_since: state.active.as_ref().map(|a| a.since),
            elapsed_millis: if state.active.is_some() {
                self.timer.elapsed_millis()
            } else {
                0
            },
            open_sessions: state.open_sessions,
            sync: state.sync.clone(),
        }
    }

    fn current_view(&self) -> SessionView {
        let state = self.state.lock();
        self.build_view(&state)
    }

    fn with_elapsed(&self, mut view: SessionView) -> SessionView {
        if view.is_active {
            view.elapsed_millis = self.timer.elapsed_millis();
        }
        view
    }

    fn shutdown(&self) {
        if self.alive.is_cancelled() {
            return;
        }
        self.alive.cancel();
        if let Some(handle) = self.subscription.lock().take() {
            handle.unsubscribe();
        }
        self.timer.stop();
        debug!(user = %self.user, "attendance session torn down");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
