use chrono::{DateTime, Utc};

/// Source of event timestamps for newly constructed records.
///
/// The facade consults the clock once per record, on the caller's thread,
/// and only when the caller did not supply an explicit timestamp. Swapping
/// the implementation for a fixed-time stub makes record timestamps
/// deterministic in tests.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Default clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Error type returned when reconfiguring the clock.
#[derive(thiserror::Error, Debug)]
pub enum ClockError {
    /// The clock slot can never be left empty; assigning `None` is
    /// rejected up front and the previous clock stays active.
    #[error("clock provider must not be absent")]
    MissingProvider,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_tracks_utc_now() {
        let before = Utc::now();
        let observed = SystemClock.now();
        let after = Utc::now();
        assert!(before <= observed && observed <= after);
    }
}
