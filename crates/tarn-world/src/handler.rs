//! Executable handlers and the context they run in.
//!
//! A handler is a pure function of an explicit [`Ctx`]: it reads the
//! event being dispatched through the context, mutates the world through
//! the context's realm, and returns a [`Value`] whose truthiness decides
//! whether the event was handled.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;

use tarn_core::{AtomId, HandlerError, WorldError, WorldTime};

use crate::event::{Event, Frame};
use crate::realm::Realm;
use crate::store::{validate_id, Store};
use crate::value::Value;

/// Code invoked when an event or property lookup reaches a handler value.
///
/// Implemented for every `Fn(&mut Ctx<'_>) -> Result<Value, HandlerError>`
/// closure; implement it directly for handlers that carry state.
pub trait Handler: Send + Sync + 'static {
    /// Run the handler.
    fn call(&self, ctx: &mut Ctx<'_>) -> Result<Value, HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&mut Ctx<'_>) -> Result<Value, HandlerError> + Send + Sync + 'static,
{
    fn call(&self, ctx: &mut Ctx<'_>) -> Result<Value, HandlerError> {
        self(ctx)
    }
}

/// A named, shareable handler. Two references are equal when their names
/// are; the name is what persistence writes.
#[derive(Clone)]
pub struct HandlerRef {
    name: Arc<str>,
    handler: Arc<dyn Handler>,
}

impl HandlerRef {
    /// Wrap a handler under `name`.
    pub fn new(name: &str, handler: Arc<dyn Handler>) -> Self {
        Self {
            name: Arc::from(name),
            handler,
        }
    }

    /// The registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the handler.
    pub fn call(&self, ctx: &mut Ctx<'_>) -> Result<Value, HandlerError> {
        self.handler.call(ctx)
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerRef").field(&self.name).finish()
    }
}

impl PartialEq for HandlerRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for HandlerRef {}

/// Name → handler table used to store handlers in fields and to resolve
/// `!name` references when loading state.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    entries: IndexMap<String, HandlerRef>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure under `name`, replacing any previous entry.
    ///
    /// Names follow the atom identifier rules so that `!name` survives
    /// persisted state. Values already holding the previous handler keep
    /// running it until they are rewritten.
    pub fn register<F>(&mut self, name: &str, f: F) -> Result<HandlerRef, WorldError>
    where
        F: Fn(&mut Ctx<'_>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.register_handler(name, Arc::new(f))
    }

    /// Register a shared handler object under `name`.
    pub fn register_handler(
        &mut self,
        name: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<HandlerRef, WorldError> {
        validate_id(name)?;
        let entry = HandlerRef::new(name, handler);
        self.entries.insert(name.to_string(), entry.clone());
        Ok(entry)
    }

    /// Look up a handler by name.
    pub fn get(&self, name: &str) -> Option<&HandlerRef> {
        self.entries.get(name)
    }

    /// Look up a handler by name as a storable value.
    pub fn value(&self, name: &str) -> Result<Value, WorldError> {
        self.get(name)
            .cloned()
            .map(Value::Handler)
            .ok_or_else(|| WorldError::UnknownHandler {
                name: name.to_string(),
            })
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

/// The explicit context a handler runs in.
///
/// Borrows the realm mutably for the duration of the call, so a handler
/// has exclusive access to the world while it runs.
pub struct Ctx<'r> {
    realm: &'r mut Realm,
    event: &'r mut Event,
    owner: AtomId,
}

impl<'r> Ctx<'r> {
    pub(crate) fn new(realm: &'r mut Realm, event: &'r mut Event, owner: AtomId) -> Self {
        Self {
            realm,
            event,
            owner,
        }
    }

    /// The realm, for arbitrary reads and mutations.
    pub fn realm(&mut self) -> &mut Realm {
        self.realm
    }

    /// Read-only view of the atom store.
    pub fn store(&self) -> &Store {
        self.realm.store()
    }

    /// The event being dispatched.
    pub fn event(&self) -> &Event {
        self.event
    }

    /// The event being dispatched, mutably (arguments, target).
    pub fn event_mut(&mut self) -> &mut Event {
        self.event
    }

    /// The atom that defines the running property.
    pub fn owner(&self) -> AtomId {
        self.owner
    }

    /// The event's actor.
    pub fn actor(&self) -> Option<AtomId> {
        self.event.actor
    }

    /// The event's current atom.
    pub fn current(&self) -> Option<AtomId> {
        self.event.current
    }

    /// The event's current lookup root.
    pub fn target(&self) -> Option<AtomId> {
        self.event.target
    }

    /// The container of the current atom.
    pub fn container(&self) -> Option<AtomId> {
        self.event
            .current
            .and_then(|c| self.realm.store().container_of(c))
    }

    /// Positional argument `i` (0-based).
    pub fn arg(&self, i: usize) -> Option<&Value> {
        self.event.args.get(i)
    }

    /// All positional arguments.
    pub fn args(&self) -> &[Value] {
        &self.event.args
    }

    /// The first atom-typed argument.
    pub fn atom_arg(&self) -> Option<AtomId> {
        self.event.first_atom_arg()
    }

    /// Current world time.
    pub fn now(&self) -> WorldTime {
        self.realm.now()
    }

    /// Frames of every dispatch enclosing this one, innermost last. The
    /// last entry is this handler's own frame.
    pub fn enclosing(&self) -> &[Frame] {
        self.realm.frames()
    }

    /// Defer to the next ancestor definition of the running property.
    ///
    /// Returns `Ok(false)` when no ancestor defines it.
    pub fn pass(&mut self) -> Result<bool, HandlerError> {
        self.realm.pass(self.event, self.owner)
    }

    /// Cooked property lookup (handlers invoked, null reads as absent).
    pub fn property(&mut self, atom: AtomId, name: &str) -> Result<Option<Value>, HandlerError> {
        self.realm.property(atom, name)
    }

    /// Cooked property lookup on the current atom.
    pub fn own_property(&mut self, name: &str) -> Result<Option<Value>, HandlerError> {
        let current = self.event.current.unwrap_or(self.owner);
        self.realm.property(current, name)
    }

    /// Dispatch a nested event synchronously.
    pub fn dispatch(&mut self, event: &mut Event) -> Result<bool, HandlerError> {
        self.realm.dispatch(event)
    }

    /// Deliver a message to an atom's watchers.
    pub fn tell(&mut self, atom: AtomId, message: &str) -> Result<(), WorldError> {
        self.realm.store_mut().tell(atom, message, Some(&*self.event))
    }

    /// Deliver a message to the event's actor, if there is one.
    pub fn tell_actor(&mut self, message: &str) -> Result<(), WorldError> {
        match self.event.actor {
            Some(actor) => self.tell(actor, message),
            None => Ok(()),
        }
    }

    /// Deliver a message to a container and everything in it that can
    /// hear, skipping `exclude`.
    pub fn announce(
        &mut self,
        container: AtomId,
        message: &str,
        exclude: &[AtomId],
    ) -> Result<(), WorldError> {
        self.realm
            .store_mut()
            .announce(container, message, Some(&*self.event), exclude)
    }

    /// Expand `{path}` references against this event.
    pub fn expand(&mut self, template: &str) -> Result<String, HandlerError> {
        self.realm.expand(template, self.event)
    }

    /// Queue a follow-up event behind everything already queued.
    pub fn post(&mut self, event: Event) {
        self.realm.post(event);
    }

    /// Schedule a follow-up event `delay` after now.
    pub fn post_after(&mut self, event: Event, delay: Duration) {
        let when = self.realm.now().after(delay);
        self.realm.post_at(event, when);
    }

    /// Schedule a follow-up event at an absolute world time.
    pub fn post_at(&mut self, event: Event, when: WorldTime) {
        self.realm.post_at(event, when);
    }
}
