//! The [`World`] facade: lifecycle, event submission, mutators, and
//! state export/import.
//!
//! While stopped the facade owns the [`Realm`] and applies operations
//! directly. While running the realm lives on the consumer thread and
//! every operation is shipped there as a job with a reply channel, so the
//! consumer stays the only writer of world state.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info};

use tarn_core::{AtomId, Direction, WatcherId, WorldError, WorldTime};
use tarn_world::{Event, HandlerRegistry, Realm, Value, Watcher};

use crate::config::{ConfigError, EngineConfig};
use crate::consumer::{run_job, Consumer};
use crate::error::EngineError;
use crate::queue::{EventSender, Job, Shared, WorldStats};
use crate::state::{self, LoadedState};
use crate::timer::{self, run_scheduler};

struct Running {
    shutdown: Sender<()>,
    consumer: JoinHandle<Realm>,
    scheduler: JoinHandle<()>,
}

/// A simulation world: the realm plus the threads that drive it.
pub struct World {
    config: EngineConfig,
    shared: Arc<Shared>,
    jobs: Receiver<Job>,
    realm: Option<Realm>,
    running: Option<Running>,
    sender: EventSender,
}

impl World {
    /// A stopped world holding only the bootstrap atoms.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_handlers(config, HandlerRegistry::new())
    }

    /// A stopped world whose realm starts with `handlers` registered.
    pub fn with_handlers(config: EngineConfig, handlers: HandlerRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        let realm = Realm::with_handlers(config.realm.clone(), handlers);
        Ok(Self::assemble(config, realm))
    }

    /// A stopped world wrapping an already populated realm.
    pub fn from_realm(config: EngineConfig, realm: Realm) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(config, realm))
    }

    fn assemble(config: EngineConfig, realm: Realm) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared::new(tx));
        shared.clock.advance_to(realm.now());
        shared.counters.publish(&realm);
        Self {
            config,
            sender: EventSender::new(Arc::clone(&shared)),
            shared,
            jobs: rx,
            realm: Some(realm),
            running: None,
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Start the consumer and scheduler threads and resume the clock.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.running.is_some() {
            return Err(EngineError::AlreadyRunning);
        }
        let realm = self.realm.take().ok_or(EngineError::ConsumerLost)?;
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        let consumer = Consumer::new(
            realm,
            Arc::clone(&self.shared),
            self.jobs.clone(),
            shutdown_rx.clone(),
        );
        // If the spawn fails the closure, and the realm in it, is dropped.
        let consumer = thread::Builder::new()
            .name("tarn-consumer".into())
            .spawn(move || consumer.run())
            .map_err(|e| EngineError::ThreadSpawnFailed {
                reason: format!("consumer: {e}"),
            })?;

        let shared = Arc::clone(&self.shared);
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let scheduler = match thread::Builder::new()
            .name("tarn-scheduler".into())
            .spawn(move || run_scheduler(shared, shutdown_rx, poll))
        {
            Ok(handle) => handle,
            Err(e) => {
                drop(shutdown_tx);
                self.realm = consumer.join().ok();
                return Err(EngineError::ThreadSpawnFailed {
                    reason: format!("scheduler: {e}"),
                });
            }
        };

        self.shared.clock.resume();
        self.running = Some(Running {
            shutdown: shutdown_tx,
            consumer,
            scheduler,
        });
        info!(now = %self.shared.clock.now(), "world started");
        Ok(())
    }

    /// Stop both worker threads and pause the clock. Queued events stay
    /// queued; pending timers stay scheduled. No-op if already stopped.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        drop(running.shutdown);
        let _ = running.scheduler.join();
        let joined = running.consumer.join();
        self.shared.clock.pause();
        match joined {
            Ok(realm) => {
                self.shared.counters.publish(&realm);
                self.realm = Some(realm);
                info!(now = %self.shared.clock.now(), queued = self.jobs.len(), "world stopped");
                Ok(())
            }
            Err(_) => {
                error!("consumer thread panicked; realm lost");
                Err(EngineError::ConsumerLost)
            }
        }
    }

    /// Whether the worker threads are running.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current world time.
    pub fn now(&self) -> WorldTime {
        self.shared.clock.now()
    }

    /// Counters as last published by the realm's owner.
    pub fn stats(&self) -> WorldStats {
        self.shared.counters.snapshot()
    }

    /// Number of jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.jobs.len()
    }

    /// Number of pending delayed events.
    pub fn pending_timers(&self) -> usize {
        self.shared.schedule().len()
    }

    // ── Realm access ────────────────────────────────────────────

    /// Run `f` against the realm with exclusive access.
    ///
    /// While running, `f` is executed on the consumer thread in queue
    /// order and this call blocks until it returns. Events `f` posts are
    /// routed like any handler's.
    pub fn with_realm<R, F>(&mut self, f: F) -> Result<R, EngineError>
    where
        F: FnOnce(&mut Realm) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.running.is_some() {
            let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
            let job = Job::Call(Box::new(move |realm: &mut Realm| {
                let _ = reply_tx.send(f(realm));
            }));
            self.shared.jobs.send(job).map_err(|_| EngineError::ShutDown)?;
            return reply_rx.recv().map_err(|_| EngineError::ConsumerLost);
        }
        let realm = self.realm.as_mut().ok_or(EngineError::ConsumerLost)?;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let job = Job::Call(Box::new(move |realm: &mut Realm| {
            let _ = reply_tx.send(f(realm));
        }));
        run_job(realm, job, &self.shared);
        reply_rx.try_recv().map_err(|_| EngineError::ConsumerLost)
    }

    fn mutate<R, F>(&mut self, f: F) -> Result<R, EngineError>
    where
        F: FnOnce(&mut Realm) -> Result<R, WorldError> + Send + 'static,
        R: Send + 'static,
    {
        self.with_realm(f)?.map_err(EngineError::World)
    }

    /// Block until every job queued before this call has been processed.
    pub fn sync(&mut self) -> Result<(), EngineError> {
        if self.running.is_some() {
            self.with_realm(|_| ())
        } else {
            Ok(())
        }
    }

    // ── Events ──────────────────────────────────────────────────

    /// A cloneable handle for submitting events from other threads.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Queue an event behind everything already queued. While stopped it
    /// waits for the next start.
    pub fn send(&self, event: Event) -> Result<(), EngineError> {
        self.sender.send(event)
    }

    /// Deliver an event now and report whether it was handled. While
    /// running it still goes through the queue, behind earlier work.
    pub fn send_now(&mut self, event: Event) -> Result<bool, EngineError> {
        self.with_realm(move |realm| {
            let mut event = event;
            realm.deliver(&mut event)
        })
    }

    /// Schedule an event at world time `when`.
    pub fn send_at(&self, event: Event, when: WorldTime) {
        self.sender.send_at(event, when);
    }

    /// Schedule an event `delay` from now.
    pub fn send_after(&self, event: Event, delay: Duration) {
        self.sender.send_after(event, delay);
    }

    /// Release matured timers onto the queue immediately instead of
    /// waiting for the scheduler's next poll.
    pub fn release_timers(&self) -> usize {
        timer::release_due(&self.shared)
    }

    // ── Mutators ────────────────────────────────────────────────

    /// Create an atom under the named parents (the root if none). Things
    /// receive `create` and `start`.
    pub fn create(&mut self, id: Option<&str>, parents: &[&str]) -> Result<AtomId, EngineError> {
        let id = id.map(str::to_string);
        let parents: Vec<String> = parents.iter().map(|p| p.to_string()).collect();
        self.mutate(move |realm| {
            let parents: Vec<&str> = parents.iter().map(String::as_str).collect();
            realm.create_named(id.as_deref(), &parents)
        })
    }

    /// Delete an atom. Things receive `stop` and `destroy` first.
    pub fn delete(&mut self, atom: AtomId) -> Result<(), EngineError> {
        self.mutate(move |realm| realm.delete(atom))
    }

    /// Copy an atom; `deep` copies its contents too.
    pub fn clone_atom(&mut self, source: AtomId, id: Option<&str>, deep: bool) -> Result<AtomId, EngineError> {
        let id = id.map(str::to_string);
        self.mutate(move |realm| realm.clone_atom(source, id.as_deref(), deep))
    }

    /// Add an inheritance edge.
    pub fn inherit(&mut self, child: AtomId, parent: AtomId) -> Result<(), EngineError> {
        self.mutate(move |realm| realm.store_mut().inherit(child, parent))
    }

    /// Remove an inheritance edge.
    pub fn uninherit(&mut self, child: AtomId, parent: AtomId) -> Result<(), EngineError> {
        self.mutate(move |realm| realm.store_mut().uninherit(child, parent))
    }

    /// Set a local field, returning the previous local value.
    pub fn set_field(&mut self, atom: AtomId, name: &str, value: Value) -> Result<Option<Value>, EngineError> {
        let name = name.to_string();
        self.mutate(move |realm| realm.store_mut().set_field(atom, &name, value))
    }

    /// Remove a local field, returning its value.
    pub fn remove_field(&mut self, atom: AtomId, name: &str) -> Result<Option<Value>, EngineError> {
        let name = name.to_string();
        self.mutate(move |realm| realm.store_mut().remove_field(atom, &name))
    }

    /// Move a Thing into a container.
    pub fn move_to(&mut self, thing: AtomId, container: AtomId) -> Result<(), EngineError> {
        self.mutate(move |realm| realm.store_mut().move_to(thing, container))
    }

    /// Link two containers with a pair of exits.
    pub fn add_exit(
        &mut self,
        room: AtomId,
        dirs: Direction,
        exit: AtomId,
        dest: AtomId,
        back_dirs: Direction,
        back: AtomId,
    ) -> Result<(), EngineError> {
        self.mutate(move |realm| {
            realm
                .store_mut()
                .add_exit(room, dirs, exit, dest, back_dirs, back)
        })
    }

    /// Link a container to another one way.
    pub fn add_one_way_exit(
        &mut self,
        room: AtomId,
        dirs: Direction,
        exit: AtomId,
        dest: AtomId,
    ) -> Result<(), EngineError> {
        self.mutate(move |realm| realm.store_mut().add_one_way_exit(room, dirs, exit, dest))
    }

    /// Remove an exit and its far side, deleting both exit atoms.
    pub fn remove_exit(&mut self, room: AtomId, dir: Direction) -> Result<(), EngineError> {
        self.mutate(move |realm| realm.remove_exit(room, dir))
    }

    /// Attach an output sink to a Thing.
    pub fn watch(&mut self, thing: AtomId, sink: Box<dyn Watcher>, lead: bool) -> Result<WatcherId, EngineError> {
        self.mutate(move |realm| realm.store_mut().watch(thing, sink, lead))
    }

    /// Detach an output sink, handing it back.
    pub fn unwatch(&mut self, thing: AtomId, id: WatcherId) -> Result<Box<dyn Watcher>, EngineError> {
        self.mutate(move |realm| realm.store_mut().unwatch(thing, id))
    }

    /// Handle of the live atom with this identifier.
    pub fn lookup(&mut self, id: &str) -> Result<Option<AtomId>, EngineError> {
        let id = id.to_string();
        self.with_realm(move |realm| realm.store().lookup(&id))
    }

    /// Identifiers of every live atom, in creation order.
    pub fn atoms(&mut self) -> Result<Vec<String>, EngineError> {
        self.with_realm(|realm| {
            let store = realm.store();
            store
                .ids()
                .filter_map(|id| store.name_of(id).map(str::to_string))
                .collect()
        })
    }

    // ── State ───────────────────────────────────────────────────

    /// Render the dynamic state: every non-frozen atom and every pending
    /// timer.
    pub fn export_state(&mut self) -> Result<String, EngineError> {
        let shared = Arc::clone(&self.shared);
        self.with_realm(move |realm| {
            let now = shared.clock.now();
            let schedule = shared.schedule();
            state::export_state(realm, &schedule, now)
        })
    }

    /// Load dynamic state on top of the bootstrap atoms. Timers are
    /// scheduled and the clock is moved forward to the saved time.
    pub fn import_state(&mut self, text: &str) -> Result<usize, EngineError> {
        let text = text.to_string();
        let LoadedState {
            atoms,
            timers,
            saved_at,
        } = self.with_realm(move |realm| state::import_state(realm, &text))??;
        self.shared.clock.advance_to(saved_at);
        let mut schedule = self.shared.schedule();
        for event in timers {
            let when = event.fire_at;
            schedule.push(event, when);
        }
        Ok(atoms.len())
    }
}

impl Drop for World {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("running", &self.is_running())
            .field("now", &self.now())
            .field("queued", &self.jobs.len())
            .field("timers", &self.pending_timers())
            .finish_non_exhaustive()
    }
}
