//! The consumer thread: sole owner of the realm while the world runs.
//!
//! The realm is moved in at spawn and handed back through the thread's
//! `JoinHandle<Realm>` when the shutdown channel closes. No locks guard
//! world state; exclusive ownership does.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::{select, Receiver};
use tracing::{debug, warn};

use tarn_world::Realm;

use crate::queue::{Job, Shared};

/// Run one job against the realm and route whatever it posted.
///
/// Also used by the facade while the world is stopped, so a job behaves
/// the same whichever thread owns the realm.
pub(crate) fn run_job(realm: &mut Realm, job: Job, shared: &Shared) {
    realm.set_now(shared.clock.now());
    match job {
        Job::Event(mut event) => {
            realm.deliver(&mut event);
        }
        Job::Call(call) => {
            // Event handlers are already contained by `deliver`; this only
            // guards closures shipped in by the facade.
            if panic::catch_unwind(AssertUnwindSafe(|| call(realm))).is_err() {
                warn!("facade call panicked on the consumer thread");
            }
        }
    }
    shared.flush(realm);
    shared.counters.job_done(realm);
}

/// State held by the consumer thread's main loop.
pub(crate) struct Consumer {
    realm: Realm,
    shared: Arc<Shared>,
    jobs: Receiver<Job>,
    shutdown: Receiver<()>,
}

impl Consumer {
    pub(crate) fn new(realm: Realm, shared: Arc<Shared>, jobs: Receiver<Job>, shutdown: Receiver<()>) -> Self {
        Self {
            realm,
            shared,
            jobs,
            shutdown,
        }
    }

    /// Main loop. Blocks on the queue until the shutdown channel closes,
    /// then returns the realm to the caller.
    pub(crate) fn run(mut self) -> Realm {
        loop {
            select! {
                recv(self.shutdown) -> _ => break,
                recv(self.jobs) -> job => match job {
                    Ok(job) => run_job(&mut self.realm, job, &self.shared),
                    Err(_) => break,
                },
            }
        }
        debug!(pending = self.jobs.len(), "consumer stopped");
        self.realm
    }
}
