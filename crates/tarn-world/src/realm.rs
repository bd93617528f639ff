//! The single-threaded world runtime.
//!
//! A [`Realm`] owns the atom store, the handler registry, the dispatch
//! context stack, and the outbox of events posted by handlers. Whoever
//! holds `&mut Realm` is the single writer of world state; the engine
//! keeps it on the consumer thread while the world runs.

use tarn_core::{AtomId, Direction, HandlerError, WorldError, WorldTime};

use crate::config::RealmConfig;
use crate::event::{Event, Frame};
use crate::handler::{Ctx, HandlerRef, HandlerRegistry};
use crate::store::Store;
use crate::value::Value;

/// Delivered to a Thing right after it is created.
pub const CREATE_EVENT: &str = "create";
/// Delivered to a Thing after `create`, and after it is loaded from state.
pub const START_EVENT: &str = "start";
/// Delivered to a Thing before it is deleted.
pub const STOP_EVENT: &str = "stop";
/// Delivered to a Thing after `stop`, just before deletion.
pub const DESTROY_EVENT: &str = "destroy";

/// An event a handler asked to run later.
#[derive(Clone, Debug, PartialEq)]
pub struct Posted {
    /// The event.
    pub event: Event,
    /// `None` to queue immediately; otherwise the world time to fire at.
    pub when: Option<WorldTime>,
}

/// Dispatch counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Dispatch calls, nested ones included.
    pub dispatched: u64,
    /// Dispatch calls that reported handled.
    pub handled: u64,
    /// Faults contained at the dispatch boundary.
    pub faults: u64,
}

/// The world runtime.
pub struct Realm {
    store: Store,
    handlers: HandlerRegistry,
    frames: Vec<Frame>,
    outbox: Vec<Posted>,
    now: WorldTime,
    config: RealmConfig,
    pub(crate) stats: DispatchStats,
}

impl Realm {
    /// A realm holding only the bootstrap atoms.
    pub fn new(config: RealmConfig) -> Self {
        Self::with_handlers(config, HandlerRegistry::new())
    }

    /// A realm with a pre-populated handler registry.
    pub fn with_handlers(config: RealmConfig, handlers: HandlerRegistry) -> Self {
        Self {
            store: Store::new(),
            handlers,
            frames: Vec::new(),
            outbox: Vec::new(),
            now: WorldTime::ZERO,
            config,
            stats: DispatchStats::default(),
        }
    }

    /// The atom store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The atom store, mutably.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    /// The handler registry.
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// The handler registry, mutably.
    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    /// Register a closure handler; shorthand for
    /// `handlers_mut().register(..)`.
    pub fn register<F>(&mut self, name: &str, f: F) -> Result<HandlerRef, WorldError>
    where
        F: Fn(&mut Ctx<'_>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.handlers.register(name, f)
    }

    /// Dispatch limits.
    pub fn config(&self) -> &RealmConfig {
        &self.config
    }

    /// Current world time as last set by the engine.
    pub fn now(&self) -> WorldTime {
        self.now
    }

    /// Set the world time handlers observe.
    pub fn set_now(&mut self, now: WorldTime) {
        self.now = now;
    }

    /// Dispatch counters.
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    // ── Context stack ───────────────────────────────────────────

    /// The dispatch context stack, outermost first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub(crate) fn check_depth(&self) -> Result<(), WorldError> {
        let limit = self.config.max_dispatch_depth;
        if self.frames.len() >= limit {
            return Err(WorldError::DispatchTooDeep { limit });
        }
        Ok(())
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub(crate) fn truncate_frames(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    // ── Outbox ──────────────────────────────────────────────────

    /// Queue an event behind everything already queued.
    pub fn post(&mut self, event: Event) {
        self.outbox.push(Posted { event, when: None });
    }

    /// Schedule an event at world time `when`.
    pub fn post_at(&mut self, mut event: Event, when: WorldTime) {
        event.fire_at = when;
        self.outbox.push(Posted {
            event,
            when: Some(when),
        });
    }

    /// Drain everything posted since the last call, in posting order.
    pub fn take_posted(&mut self) -> Vec<Posted> {
        std::mem::take(&mut self.outbox)
    }

    // ── Lifecycle ───────────────────────────────────────────────

    pub(crate) fn notify(&mut self, atom: AtomId, name: &str) {
        let mut event = Event::new(name).by(atom).on(atom);
        self.deliver(&mut event);
    }

    /// Create an atom. Things receive `create` then `start` before this
    /// returns.
    pub fn create(&mut self, id: Option<&str>, parents: &[AtomId]) -> Result<AtomId, WorldError> {
        let atom = self.store.create(id, parents)?;
        if self.store.atom(atom)?.kind().is_spatial() {
            self.notify(atom, CREATE_EVENT);
            self.notify(atom, START_EVENT);
        }
        Ok(atom)
    }

    /// Create an atom, naming parents by identifier.
    pub fn create_named(&mut self, id: Option<&str>, parents: &[&str]) -> Result<AtomId, WorldError> {
        let parents = parents
            .iter()
            .map(|p| self.store.find(p))
            .collect::<Result<Vec<_>, _>>()?;
        self.create(id, &parents)
    }

    /// Delete an atom. Things receive `stop` then `destroy` first.
    pub fn delete(&mut self, atom: AtomId) -> Result<(), WorldError> {
        let a = self.store.atom(atom)?;
        if a.is_frozen() {
            return Err(WorldError::Frozen {
                id: a.id().to_string(),
            });
        }
        if a.kind().is_spatial() {
            self.notify(atom, STOP_EVENT);
            self.notify(atom, DESTROY_EVENT);
            if !self.store.is_live(atom) {
                return Ok(());
            }
        }
        self.store.delete(atom)
    }

    /// Clone an atom (and with `deep`, everything it contains). Every
    /// Thing created receives `create` and `start`.
    pub fn clone_atom(&mut self, source: AtomId, id: Option<&str>, deep: bool) -> Result<AtomId, WorldError> {
        let created = self.store.clone_atom(source, id, deep)?;
        for &atom in &created {
            if self.store.atom(atom)?.kind().is_spatial() {
                self.notify(atom, CREATE_EVENT);
                self.notify(atom, START_EVENT);
            }
        }
        Ok(created[0])
    }

    /// Remove the exit in direction `dir` of `room` together with its far
    /// side, deleting both exit atoms. A missing far side is tolerated.
    pub fn remove_exit(&mut self, room: AtomId, dir: Direction) -> Result<(), WorldError> {
        let (exit, other) = self.store.unlink_exit(room, dir)?;
        for atom in std::iter::once(exit).chain(other) {
            if self.store.is_live(atom) {
                self.delete(atom)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Realm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realm")
            .field("atoms", &self.store.len())
            .field("handlers", &self.handlers)
            .field("now", &self.now)
            .field("frames", &self.frames.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn lifecycle_log(realm: &mut Realm) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let thing = realm.store().core().thing;
        for name in [CREATE_EVENT, START_EVENT, STOP_EVENT, DESTROY_EVENT] {
            let log = Arc::clone(&log);
            let handler = realm.register(name, move |ctx: &mut Ctx<'_>| {
                let who = ctx.current().and_then(|c| ctx.store().name_of(c)).unwrap_or("?");
                log.lock().unwrap().push(format!("{}:{who}", ctx.event().id));
                Ok(Value::Bool(true))
            }).unwrap();
            // Markers are frozen but their fields are not.
            realm.store_mut().set_field(thing, name, handler.into()).unwrap();
        }
        log
    }

    #[test]
    fn things_get_lifecycle_notifications_in_order() {
        let mut realm = Realm::new(RealmConfig::default());
        let log = lifecycle_log(&mut realm);
        let lamp = realm.create_named(Some("lamp"), &["thing"]).unwrap();
        realm.create(Some("idea"), &[]).unwrap();
        realm.delete(lamp).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            ["create:lamp", "start:lamp", "stop:lamp", "destroy:lamp"]
        );
    }

    #[test]
    fn remove_exit_deletes_both_sides() {
        let mut realm = Realm::new(RealmConfig::default());
        let core = realm.store().core();
        let hall = realm.create(Some("hall"), &[core.container]).unwrap();
        let yard = realm.create(Some("yard"), &[core.container]).unwrap();
        let door = realm.create(Some("door"), &[core.thing]).unwrap();
        let gate = realm.create(Some("gate"), &[core.thing]).unwrap();
        realm
            .store_mut()
            .add_exit(hall, Direction::EAST, door, yard, Direction::WEST, gate)
            .unwrap();

        realm.delete(gate).unwrap();
        realm.remove_exit(hall, Direction::EAST).unwrap();
        assert!(!realm.store().is_live(door));
        assert_eq!(realm.store().exit(hall, Direction::EAST), None);
    }

    #[test]
    fn posted_events_drain_in_order() {
        let mut realm = Realm::new(RealmConfig::default());
        realm.post(Event::new("a"));
        realm.post_at(Event::new("b"), WorldTime::from_millis(500));
        let posted = realm.take_posted();
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[0].when, None);
        assert_eq!(posted[1].event.fire_at, WorldTime::from_millis(500));
        assert!(realm.take_posted().is_empty());
    }
}
