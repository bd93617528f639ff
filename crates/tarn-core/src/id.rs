//! Strongly-typed handles and the [`WorldTime`] clock value.

use std::fmt;
use std::time::Duration;

/// Stable handle to an atom in the world arena.
///
/// Handles are dense indices assigned at creation and never reused, so a
/// handle held after the atom is deleted still resolves to the (deleted)
/// node rather than to some unrelated successor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(pub u32);

impl AtomId {
    /// The arena slot this handle refers to.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for AtomId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Identifies one output sink registered on a Thing.
///
/// Returned by watcher registration and required to unregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId(pub u64);

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Accumulated active world time, in milliseconds.
///
/// World time only advances while the world is running; it is frozen
/// while stopped and resumes on restart. Scheduled events are keyed by it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorldTime(pub u64);

impl WorldTime {
    /// The moment the world was first started.
    pub const ZERO: WorldTime = WorldTime(0);

    /// Construct from whole milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Construct from a duration of active time.
    pub fn from_duration(d: Duration) -> Self {
        Self(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    /// Construct from fractional seconds, rounding to the nearest
    /// millisecond. Negative and non-finite inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }
        Self((secs * 1000.0).round() as u64)
    }

    /// Milliseconds of active time.
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Fractional seconds of active time.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// This time advanced by `d`, saturating at the maximum.
    pub fn after(self, d: Duration) -> Self {
        Self(self.0.saturating_add(Self::from_duration(d).0))
    }
}

impl fmt::Display for WorldTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.0 / 1000, self.0 % 1000)
    }
}
