//! Wall-clock access for the poll loop and the daily reset.
//!
//! Everything that needs "now" takes a `Clock` so day-boundary behavior can
//! be driven from tests with `MockClock` instead of waiting for midnight.

use chrono::{DateTime, Local, Utc};

/// Source of the current local time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }
}

/// System clock backed by `Local::now()`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[cfg(test)]
pub use mock::MockClock;
