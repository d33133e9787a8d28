//! Time abstraction traits for platform-agnostic timing.

/// Trait for abstracting time sources.
pub trait TimeSource<I: TimeInstant> {
    /// Returns the current time instant.
    fn now(&self) -> I;
}

/// Trait abstraction for duration types.
pub trait TimeDuration: Copy + PartialEq + PartialOrd {
    /// Zero duration constant.
    const ZERO: Self;

    /// Converts duration to milliseconds.
    fn as_millis(&self) -> u64;

    /// Creates duration from milliseconds.
    fn from_millis(millis: u64) -> Self;

    /// Saturating subtraction (returns ZERO on underflow).
    fn saturating_sub(self, other: Self) -> Self;
}

/// Trait abstraction for monotonic instant types.
pub trait TimeInstant: Copy + PartialOrd {
    /// Duration type for this instant.
    type Duration: TimeDuration;

    /// Calculates duration since an earlier instant.
    fn duration_since(&self, earlier: Self) -> Self::Duration;

    /// Adds duration to instant, returns None on overflow.
    fn checked_add(self, duration: Self::Duration) -> Option<Self>;
}

/// Tells the calling task when a service method needs to run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceTiming<D> {
    /// Sleep for this long, then call again.
    Delay(D),

    /// Nothing is scheduled. Block until external input (a command, a new
    /// button) arrives before calling again.
    Idle,
}

impl<D: TimeDuration> ServiceTiming<D> {
    /// Returns the delay, if one is scheduled.
    pub fn delay(&self) -> Option<D> {
        match self {
            ServiceTiming::Delay(d) => Some(*d),
            ServiceTiming::Idle => None,
        }
    }

    /// Combines two timings from services sharing one task, keeping the earlier wake-up.
    pub fn earliest(self, other: Self) -> Self {
        match (self, other) {
            (ServiceTiming::Delay(a), ServiceTiming::Delay(b)) => {
                if b < a {
                    ServiceTiming::Delay(b)
                } else {
                    ServiceTiming::Delay(a)
                }
            }
            (ServiceTiming::Delay(d), ServiceTiming::Idle)
            | (ServiceTiming::Idle, ServiceTiming::Delay(d)) => ServiceTiming::Delay(d),
            (ServiceTiming::Idle, ServiceTiming::Idle) => ServiceTiming::Idle,
        }
    }
}

/// Time left until `deadline`, or zero once it has passed.
pub(crate) fn remaining<I: TimeInstant>(now: I, deadline: I) -> I::Duration {
    if deadline > now {
        deadline.duration_since(now)
    } else {
        I::Duration::ZERO
    }
}

/// `start + duration`, saturating to `start` if the instant type overflows.
pub(crate) fn deadline_after<I: TimeInstant>(start: I, duration: I::Duration) -> I {
    start.checked_add(duration).unwrap_or(start)
}
