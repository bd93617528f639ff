//! Delayed events: the schedule and the thread that releases them.
//!
//! The scheduler thread never touches the realm. Once per poll interval
//! it pops every entry whose fire time has been reached and pushes it onto
//! the job queue, earliest first, so the consumer sees matured events in
//! fire-time order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{select, Receiver};
use tracing::trace;

use tarn_core::WorldTime;
use tarn_world::Event;

use crate::queue::{Job, Shared};

struct Entry {
    fire_at: WorldTime,
    seq: u64,
    event: Event,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed: BinaryHeap is a max-heap and the earliest entry must pop
    // first. Ties go to the entry scheduled first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.fire_at, other.seq).cmp(&(self.fire_at, self.seq))
    }
}

/// Pending delayed events ordered by fire time.
#[derive(Default)]
pub struct Schedule {
    heap: BinaryHeap<Entry>,
    seq: u64,
}

impl Schedule {
    /// An empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `event` at `when`; the event's `fire_at` is set to match.
    pub fn push(&mut self, mut event: Event, when: WorldTime) {
        event.fire_at = when;
        self.seq += 1;
        self.heap.push(Entry {
            fire_at: when,
            seq: self.seq,
            event,
        });
    }

    /// Pop the earliest entry if it is due at `now`.
    pub fn pop_due(&mut self, now: WorldTime) -> Option<Event> {
        if self.heap.peek()?.fire_at > now {
            return None;
        }
        self.heap.pop().map(|e| e.event)
    }

    /// Fire time of the earliest entry.
    pub fn next_due(&self) -> Option<WorldTime> {
        self.heap.peek().map(|e| e.fire_at)
    }

    /// Pending events, earliest first.
    pub fn pending(&self) -> Vec<&Event> {
        let mut entries: Vec<&Entry> = self.heap.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|e| &e.event).collect()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedule")
            .field("pending", &self.heap.len())
            .field("next_due", &self.next_due())
            .finish()
    }
}

/// Move every matured entry onto the job queue. Returns how many moved.
pub(crate) fn release_due(shared: &Shared) -> usize {
    let now = shared.clock.now();
    let mut schedule = shared.schedule();
    let mut released = 0;
    while let Some(event) = schedule.pop_due(now) {
        trace!(event = %event.id, fire_at = %event.fire_at, now = %now, "timer released");
        if shared.jobs.send(Job::Event(event)).is_err() {
            break;
        }
        released += 1;
    }
    released
}

/// Scheduler thread body. Runs until the shutdown channel closes.
pub(crate) fn run_scheduler(shared: Arc<Shared>, shutdown: Receiver<()>, poll: Duration) {
    loop {
        select! {
            recv(shutdown) -> _ => break,
            default(poll) => {}
        }
        release_due(&shared);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn nothing_pops_early() {
        let mut s = Schedule::new();
        s.push(Event::new("late"), WorldTime::from_millis(200));
        assert_eq!(s.pop_due(WorldTime::from_millis(199)), None);
        assert_eq!(s.next_due(), Some(WorldTime::from_millis(200)));
        let ev = s.pop_due(WorldTime::from_millis(200)).unwrap();
        assert_eq!(ev.id, "late");
        assert_eq!(ev.fire_at, WorldTime::from_millis(200));
        assert!(s.is_empty());
    }

    #[test]
    fn equal_times_keep_scheduling_order() {
        let mut s = Schedule::new();
        for name in ["a", "b", "c"] {
            s.push(Event::new(name), WorldTime::from_millis(10));
        }
        let names: Vec<_> = s.pending().iter().map(|e| e.id.clone()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        let popped: Vec<_> = std::iter::from_fn(|| s.pop_due(WorldTime::from_millis(10)))
            .map(|e| e.id)
            .collect();
        assert_eq!(popped, ["a", "b", "c"]);
    }

    proptest! {
        #[test]
        fn pops_come_out_in_fire_order(times in prop::collection::vec(0u64..1_000, 1..50), now in 0u64..1_000) {
            let mut s = Schedule::new();
            for (i, t) in times.iter().enumerate() {
                s.push(Event::new(i.to_string()), WorldTime::from_millis(*t));
            }
            let now = WorldTime::from_millis(now);
            let mut last = WorldTime::ZERO;
            let mut count = 0;
            while let Some(ev) = s.pop_due(now) {
                prop_assert!(ev.fire_at <= now);
                prop_assert!(ev.fire_at >= last);
                last = ev.fire_at;
                count += 1;
            }
            prop_assert_eq!(count, times.iter().filter(|t| **t <= now.as_millis()).count());
        }
    }
}
