//! Output sinks attached to Things.
//!
//! Every Thing carries an ordered chain of [`Watcher`]s. Messages told to
//! the Thing are handed to each watcher in chain order. At most one
//! watcher is the *lead*; it always sits at the head of the chain.

use tarn_core::{AtomId, WatcherId, WorldError};

use crate::event::Event;
use crate::store::Store;

/// An output sink.
pub trait Watcher: Send {
    /// Receive a message, with the event that produced it if any.
    fn notify(&mut self, message: &str, event: Option<&Event>);
}

impl<F> Watcher for F
where
    F: FnMut(&str, Option<&Event>) + Send,
{
    fn notify(&mut self, message: &str, event: Option<&Event>) {
        self(message, event)
    }
}

struct Entry {
    id: WatcherId,
    lead: bool,
    sink: Box<dyn Watcher>,
}

/// Ordered sink list of one Thing.
#[derive(Default)]
pub(crate) struct WatcherChain {
    entries: Vec<Entry>,
}

impl WatcherChain {
    pub(crate) fn has_lead(&self) -> bool {
        self.entries.first().is_some_and(|e| e.lead)
    }

    /// Insert a sink; leads go first, everything else is appended.
    pub(crate) fn insert(&mut self, id: WatcherId, sink: Box<dyn Watcher>, lead: bool) {
        let entry = Entry { id, lead, sink };
        if lead {
            self.entries.insert(0, entry);
        } else {
            self.entries.push(entry);
        }
    }

    pub(crate) fn remove(&mut self, id: WatcherId) -> Option<Box<dyn Watcher>> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos).sink)
    }

    pub(crate) fn notify(&mut self, message: &str, event: Option<&Event>) {
        for entry in &mut self.entries {
            entry.sink.notify(message, event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Store {
    /// Attach a sink to a Thing. A `lead` sink is placed first; a Thing
    /// accepts only one.
    pub fn watch(
        &mut self,
        thing: AtomId,
        sink: Box<dyn Watcher>,
        lead: bool,
    ) -> Result<WatcherId, WorldError> {
        let name = self.atom(thing)?.id().to_string();
        let id = self.next_watcher_id();
        let place = self
            .atom_mut(thing)?
            .place
            .as_mut()
            .ok_or(WorldError::NotAThing { id: name.clone() })?;
        if lead && place.watchers.has_lead() {
            return Err(WorldError::LeadWatcherTaken { id: name });
        }
        place.watchers.insert(id, sink, lead);
        Ok(id)
    }

    /// Detach a sink, handing it back.
    pub fn unwatch(&mut self, thing: AtomId, id: WatcherId) -> Result<Box<dyn Watcher>, WorldError> {
        let name = self.atom(thing)?.id().to_string();
        self.atom_mut(thing)?
            .place
            .as_mut()
            .and_then(|p| p.watchers.remove(id))
            .ok_or(WorldError::UnknownWatcher { id: name })
    }

    /// Number of sinks attached to an atom.
    pub fn watcher_count(&self, atom: AtomId) -> usize {
        self.get(atom)
            .and_then(|a| a.place.as_ref())
            .map_or(0, |p| p.watchers.len())
    }

    /// Deliver a message to one atom's sinks. Atoms without sinks
    /// silently drop it.
    pub fn tell(
        &mut self,
        atom: AtomId,
        message: &str,
        event: Option<&Event>,
    ) -> Result<(), WorldError> {
        if let Some(place) = self.atom_mut(atom)?.place.as_mut() {
            place.watchers.notify(message, event);
        }
        Ok(())
    }

    /// Deliver a message to a container's own sinks, then to every
    /// occupant reachable through the hearing traversal. Atoms in
    /// `exclude` receive nothing.
    pub fn announce(
        &mut self,
        container: AtomId,
        message: &str,
        event: Option<&Event>,
        exclude: &[AtomId],
    ) -> Result<(), WorldError> {
        self.atom(container)?;
        let mut audience = Vec::new();
        if !exclude.contains(&container) {
            audience.push(container);
        }
        audience.extend(
            self.can_hear(container, None)
                .filter(|id| !exclude.contains(id)),
        );
        for id in audience {
            self.tell(id, message, event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Box<dyn Watcher> {
        let log = Arc::clone(log);
        Box::new(move |msg: &str, _ev: Option<&Event>| {
            log.lock().unwrap().push(format!("{tag}:{msg}"));
        })
    }

    #[test]
    fn lead_goes_first_and_is_unique() {
        let mut store = Store::new();
        let thing = store.core().thing;
        let bob = store.create(Some("bob"), &[thing]).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        store.watch(bob, recorder(&log, "a"), false).unwrap();
        store.watch(bob, recorder(&log, "lead"), true).unwrap();
        assert_eq!(
            store.watch(bob, recorder(&log, "x"), true),
            Err(WorldError::LeadWatcherTaken { id: "bob".into() })
        );

        store.tell(bob, "hi", None).unwrap();
        assert_eq!(*log.lock().unwrap(), ["lead:hi", "a:hi"]);
    }

    #[test]
    fn unwatch_returns_the_sink() {
        let mut store = Store::new();
        let thing = store.core().thing;
        let bob = store.create(Some("bob"), &[thing]).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = store.watch(bob, recorder(&log, "a"), false).unwrap();

        let mut sink = store.unwatch(bob, id).unwrap();
        sink.notify("direct", None);
        store.tell(bob, "ignored", None).unwrap();
        assert_eq!(*log.lock().unwrap(), ["a:direct"]);
        assert!(matches!(
            store.unwatch(bob, id),
            Err(WorldError::UnknownWatcher { .. })
        ));
    }

    #[test]
    fn announce_reaches_the_room_then_its_listeners() {
        let mut store = Store::new();
        let core = store.core();
        let room = store.create(Some("room"), &[core.container]).unwrap();
        let ann = store.create(Some("ann"), &[core.mobile]).unwrap();
        let bo = store.create(Some("bo"), &[core.mobile]).unwrap();
        let crate_ = store.create(Some("crate"), &[core.container]).unwrap();
        let mouse = store.create(Some("mouse"), &[core.mobile]).unwrap();
        for (thing, into) in [(ann, room), (crate_, room), (mouse, crate_), (bo, room)] {
            store.move_to(thing, into).unwrap();
        }
        let log = Arc::new(Mutex::new(Vec::new()));
        for (id, tag) in [(room, "room"), (ann, "ann"), (bo, "bo"), (mouse, "mouse")] {
            store.watch(id, recorder(&log, tag), false).unwrap();
        }

        store.announce(room, "boom", None, &[ann]).unwrap();
        assert_eq!(*log.lock().unwrap(), ["room:boom", "mouse:boom", "bo:boom"]);

        log.lock().unwrap().clear();
        store.set_field(crate_, "open", false.into()).unwrap();
        store.announce(room, "hush", None, &[room]).unwrap();
        assert_eq!(*log.lock().unwrap(), ["ann:hush", "bo:hush"]);
    }

    #[test]
    fn plain_atoms_cannot_be_watched() {
        let mut store = Store::new();
        let idea = store.create(Some("idea"), &[]).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        assert!(matches!(
            store.watch(idea, recorder(&log, "a"), false),
            Err(WorldError::NotAThing { .. })
        ));
        assert_eq!(store.tell(idea, "quiet", None), Ok(()));
    }
}
