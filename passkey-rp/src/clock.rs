use chrono::{DateTime, Utc};

/// The source of the current time.
///
/// Ceremony expiry, certificate validity and SafetyNet freshness are all judged against it, so a
/// fixed clock makes recorded ceremonies reproducible.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}
