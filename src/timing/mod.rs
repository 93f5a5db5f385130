//! Reference clock and frame timestamp arithmetic
//!
//! Times are expressed in 100 ns units, signed, so a frame's start time may
//! legitimately be negative right after the stream starts.

use std::sync::Arc;
use std::time::Instant;

/// Signed count of 100 ns units.
pub type ReferenceTime = i64;

/// Reference-time units per second.
pub const UNITS_PER_SECOND: ReferenceTime = 10_000_000;

/// Monotonic time source used to stamp produced samples.
pub trait ReferenceClock: Send + Sync {
    /// Current time. Must never decrease.
    fn now(&self) -> ReferenceTime;
}

/// Monotonic clock backed by `Instant`, time zero at creation.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Arc<Instant>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Arc::new(Instant::now()),
        }
    }

    /// Share the timebase of another component.
    pub fn from_instant(start: Instant) -> Self {
        Self {
            start: Arc::new(start),
        }
    }

    pub fn start_instant(&self) -> Instant {
        *self.start
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceClock for SystemClock {
    #[inline]
    fn now(&self) -> ReferenceTime {
        // 100 ns per unit; saturate rather than wrap after ~29k years
        let nanos = self.start.elapsed().as_nanos() / 100;
        ReferenceTime::try_from(nanos).unwrap_or(ReferenceTime::MAX)
    }
}

/// Per-stream timestamping state, captured once at stream start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameClock {
    start: ReferenceTime,
    interval: ReferenceTime,
}

impl FrameClock {
    pub fn new(start: ReferenceTime, interval: ReferenceTime) -> Self {
        Self { start, interval }
    }

    pub fn start(&self) -> ReferenceTime {
        self.start
    }

    pub fn interval(&self) -> ReferenceTime {
        self.interval
    }

    /// Presentation range for a frame delivered at clock reading `now`.
    ///
    /// One interval is subtracted because the device holds one frame in its
    /// internal pipeline: the range describes capture time, not delivery.
    #[inline]
    pub fn frame_times(&self, now: ReferenceTime) -> (ReferenceTime, ReferenceTime) {
        let start = now
            .saturating_sub(self.start)
            .saturating_sub(self.interval);
        (start, start.saturating_add(self.interval))
    }
}

/// Frame interval for an integer frame rate.
pub fn interval_for_fps(fps: u32) -> ReferenceTime {
    UNITS_PER_SECOND / ReferenceTime::from(fps.max(1))
}

/// Integer frame rate for an interval, as the device expects it.
pub fn fps_for_interval(interval: ReferenceTime) -> u32 {
    if interval <= 0 {
        return 0;
    }
    u32::try_from(UNITS_PER_SECOND / interval).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        thread::sleep(Duration::from_millis(5));
        let t2 = clock.now();
        assert!(t2 > t1, "reference time must increase");
        assert!(t2 - t1 >= 50_000, "5ms is at least 50_000 units");
    }

    #[test]
    fn test_shared_timebase() {
        let clock1 = SystemClock::new();
        let clock2 = SystemClock::from_instant(clock1.start_instant());
        thread::sleep(Duration::from_millis(2));
        let diff = (clock1.now() - clock2.now()).abs();
        assert!(diff < 10_000, "clocks sharing a start are within 1ms");
    }

    #[test]
    fn test_frame_times_compensates_one_interval() {
        let clock = FrameClock::new(1_000, 333_333);
        let (start, end) = clock.frame_times(1_000 + 1_000_000);
        assert_eq!(start, 1_000_000 - 333_333);
        assert_eq!(end - start, 333_333);
    }

    #[test]
    fn test_first_frame_may_be_negative() {
        let clock = FrameClock::new(500, 166_666);
        let (start, end) = clock.frame_times(600);
        assert!(start < 0);
        assert_eq!(end, start + 166_666);
    }

    #[test]
    fn test_interval_fps_conversions() {
        assert_eq!(interval_for_fps(30), 333_333);
        assert_eq!(interval_for_fps(60), 166_666);
        assert_eq!(interval_for_fps(15), 666_666);
        assert_eq!(fps_for_interval(333_333), 30);
        assert_eq!(fps_for_interval(166_666), 60);
        assert_eq!(fps_for_interval(666_666), 15);
        assert_eq!(fps_for_interval(0), 0);
    }
}
