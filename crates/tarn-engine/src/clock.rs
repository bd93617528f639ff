//! World time: active time accumulated while the world runs.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tarn_core::WorldTime;

#[derive(Debug, Default)]
struct ClockState {
    banked: Duration,
    running_since: Option<Instant>,
}

/// A pausable monotonic clock.
///
/// Time banked before the last pause plus time elapsed since the last
/// resume. Shared between the facade, the consumer and the scheduler.
#[derive(Debug, Default)]
pub struct WorldClock {
    state: Mutex<ClockState>,
}

impl WorldClock {
    /// A paused clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start accumulating. No-op if already running.
    pub fn resume(&self) {
        let mut s = self.lock();
        if s.running_since.is_none() {
            s.running_since = Some(Instant::now());
        }
    }

    /// Stop accumulating, banking the elapsed time. No-op if paused.
    pub fn pause(&self) {
        let mut s = self.lock();
        if let Some(since) = s.running_since.take() {
            s.banked += since.elapsed();
        }
    }

    /// Whether the clock is accumulating.
    pub fn is_running(&self) -> bool {
        self.lock().running_since.is_some()
    }

    /// Current world time.
    pub fn now(&self) -> WorldTime {
        let s = self.lock();
        let elapsed = s.running_since.map_or(Duration::ZERO, |t| t.elapsed());
        WorldTime::from_duration(s.banked + elapsed)
    }

    /// Move the clock forward to `t` if it is behind. Never goes back.
    pub fn advance_to(&self, t: WorldTime) {
        let mut s = self.lock();
        let elapsed = s.running_since.map_or(Duration::ZERO, |t| t.elapsed());
        let target = Duration::from_millis(t.as_millis());
        let current = s.banked + elapsed;
        if target > current {
            s.banked += target - current;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn paused_clock_stands_still() {
        let clock = WorldClock::new();
        assert_eq!(clock.now(), WorldTime::ZERO);
        thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.now(), WorldTime::ZERO);
        assert!(!clock.is_running());
    }

    #[test]
    fn time_accumulates_across_pauses() {
        let clock = WorldClock::new();
        clock.resume();
        thread::sleep(Duration::from_millis(20));
        clock.pause();
        let banked = clock.now();
        assert!(banked >= WorldTime::from_millis(20));
        thread::sleep(Duration::from_millis(10));
        assert_eq!(clock.now(), banked);
        clock.resume();
        thread::sleep(Duration::from_millis(5));
        assert!(clock.now() > banked);
    }

    #[test]
    fn advance_never_rewinds() {
        let clock = WorldClock::new();
        clock.advance_to(WorldTime::from_millis(3_000));
        assert_eq!(clock.now(), WorldTime::from_millis(3_000));
        clock.advance_to(WorldTime::from_millis(1_000));
        assert_eq!(clock.now(), WorldTime::from_millis(3_000));
    }
}
