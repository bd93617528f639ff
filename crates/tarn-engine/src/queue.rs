//! The job queue shared by every producer and the single consumer.
//!
//! Jobs travel over one unbounded crossbeam channel. Producers are
//! [`EventSender`] clones, the scheduler thread, the facade, and the
//! consumer itself when handlers post follow-up events. The channel
//! outlives individual start/stop cycles, so queued work survives a stop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::warn;

use tarn_core::WorldTime;
use tarn_world::{Event, Posted, Realm};

use crate::clock::WorldClock;
use crate::error::EngineError;
use crate::timer::Schedule;

/// Work for the consumer thread.
pub(crate) enum Job {
    /// Deliver an event through the fault boundary.
    Event(Event),
    /// Run a closure against the realm (facade mutators, barriers).
    Call(Box<dyn FnOnce(&mut Realm) + Send>),
}

/// Counters published by whoever currently owns the realm.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    jobs: AtomicU64,
    dispatched: AtomicU64,
    handled: AtomicU64,
    faults: AtomicU64,
}

/// Point-in-time copy of the engine counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Jobs (events and facade calls) processed by the consumer.
    pub jobs: u64,
    /// Dispatch calls, nested ones included.
    pub dispatched: u64,
    /// Dispatch calls that reported handled.
    pub handled: u64,
    /// Handler faults contained at the dispatch boundary.
    pub faults: u64,
}

impl Counters {
    pub(crate) fn job_done(&self, realm: &Realm) {
        self.jobs.fetch_add(1, Ordering::Relaxed);
        self.publish(realm);
    }

    pub(crate) fn publish(&self, realm: &Realm) {
        let s = realm.stats();
        self.dispatched.store(s.dispatched, Ordering::Relaxed);
        self.handled.store(s.handled, Ordering::Relaxed);
        self.faults.store(s.faults, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> WorldStats {
        WorldStats {
            jobs: self.jobs.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }
}

/// State shared by the facade and both worker threads.
pub(crate) struct Shared {
    pub clock: WorldClock,
    pub jobs: Sender<Job>,
    pub counters: Counters,
    schedule: Mutex<Schedule>,
}

impl Shared {
    pub(crate) fn new(jobs: Sender<Job>) -> Self {
        Self {
            clock: WorldClock::new(),
            jobs,
            counters: Counters::default(),
            schedule: Mutex::new(Schedule::new()),
        }
    }

    pub(crate) fn schedule(&self) -> MutexGuard<'_, Schedule> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route everything the realm's handlers posted: immediate posts to
    /// the back of the queue, timed posts into the schedule.
    pub(crate) fn flush(&self, realm: &mut Realm) {
        for Posted { event, when } in realm.take_posted() {
            match when {
                Some(t) => self.schedule().push(event, t),
                None => {
                    if self.jobs.send(Job::Event(event)).is_err() {
                        warn!("job queue closed; posted event dropped");
                    }
                }
            }
        }
    }
}

/// Cloneable producer handle for submitting events from any thread.
#[derive(Clone)]
pub struct EventSender {
    shared: Arc<Shared>,
}

impl EventSender {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Queue an event behind everything already queued.
    ///
    /// Fails with [`EngineError::ShutDown`] once the world is gone.
    pub fn send(&self, event: Event) -> Result<(), EngineError> {
        self.shared
            .jobs
            .send(Job::Event(event))
            .map_err(|_| EngineError::ShutDown)
    }

    /// Schedule an event at world time `when`. It is never delivered
    /// before the world clock reaches `when`.
    pub fn send_at(&self, event: Event, when: WorldTime) {
        self.shared.schedule().push(event, when);
    }

    /// Schedule an event `delay` after the current world time.
    pub fn send_after(&self, event: Event, delay: Duration) {
        let when = self.shared.clock.now().after(delay);
        self.send_at(event, when);
    }

    /// Current world time.
    pub fn now(&self) -> WorldTime {
        self.shared.clock.now()
    }
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("now", &self.shared.clock.now())
            .finish_non_exhaustive()
    }
}
