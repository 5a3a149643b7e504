//! A `now()` abstraction threaded through every component that reads the clock: bank session
//! TTLs, GL cache TTLs, per-tx leases, batch/tx deadlines (§5, §9 "time source"). Production code
//! uses [`SystemClock`]; tests freeze time with [`FrozenClock`] instead of sleeping.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock whose value is fixed until explicitly advanced. Used by tests that need
/// deterministic TTL/deadline/lease-expiry behavior.
#[derive(Clone)]
pub struct FrozenClock {
    at: Arc<Mutex<DateTime<Utc>>>,
}

impl FrozenClock {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self { at: Arc::new(Mutex::new(instant)) }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.at.lock().expect("frozen clock lock poisoned");
        *guard += by;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.at.lock().expect("frozen clock lock poisoned") = instant;
    }
}

impl Clock for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        *self.at.lock().expect("frozen clock lock poisoned")
    }
}

/// Shared handle to a clock, the shape every collaborator actually holds (§9 "global state":
/// scoped resources passed by reference, never through a global).
pub type SharedClock = Arc<dyn Clock>;

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn frozen_clock_only_moves_on_explicit_advance() {
        let start = Utc::now();
        let clock = FrozenClock::at(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::seconds(300));
        assert_eq!(clock.now(), start + Duration::seconds(300));
    }
}
