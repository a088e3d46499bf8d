use chrono::{DateTime, Utc};

/// Wall-clock capability, injected so time-dependent behavior is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Milliseconds from `anchor` to the clock's current time, floored at zero.
pub fn millis_since(clock: &dyn Clock, anchor: DateTime<Utc>) -> u64 {
    (clock.now() - anchor).num_milliseconds().max(0) as u64
}
