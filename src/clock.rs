//! Time-of-day sources for peak window evaluation.

use chrono::{Local, NaiveTime};

/// Supplies the wall-clock time of day.
///
/// Peak windows are evaluated when the failure draw happens, after any
/// injected delay, so the clock is consulted once per intercepted request.
pub trait Clock: Send + Sync {
    /// Current local time of day.
    fn time_of_day(&self) -> NaiveTime;
}

/// Clock backed by the host's local time zone.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn time_of_day(&self) -> NaiveTime { Local::now().time() }
}

/// Clock frozen at a fixed time of day.
///
/// ```
/// use netcondition::clock::{Clock, FixedClock};
///
/// let clock = FixedClock::at(9, 30).expect("valid time");
/// assert_eq!(clock.time_of_day().to_string(), "09:30:00");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(NaiveTime);

impl FixedClock {
    /// Freeze the clock at `hour:minute`, or `None` if the time is invalid.
    #[must_use]
    pub fn at(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Freeze the clock at `time`.
    #[must_use]
    pub const fn new(time: NaiveTime) -> Self { Self(time) }
}

impl Clock for FixedClock {
    fn time_of_day(&self) -> NaiveTime { self.0 }
}
