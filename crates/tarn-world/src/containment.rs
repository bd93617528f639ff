//! The containment relation and filtered content traversals.
//!
//! All traversals share one depth-first engine, [`Walk`]: a stack of
//! sibling iterators over container contents, with one predicate deciding
//! whether an atom is yielded and another deciding whether the walk
//! descends into its contents.

use std::slice;

use tarn_core::{AtomId, WorldError};

use crate::store::Store;
use crate::value::Value;

/// Depth-first walk over the contents of a container.
pub struct Walk<'s, A, D> {
    store: &'s Store,
    stack: Vec<slice::Iter<'s, AtomId>>,
    accept: A,
    descend: D,
}

impl<'s, A, D> Iterator for Walk<'s, A, D>
where
    A: FnMut(&Store, AtomId) -> bool,
    D: FnMut(&Store, AtomId) -> bool,
{
    type Item = AtomId;

    fn next(&mut self) -> Option<AtomId> {
        let store = self.store;
        loop {
            let next = self.stack.last_mut()?.next().copied();
            let Some(id) = next else {
                self.stack.pop();
                continue;
            };
            let Ok(atom) = store.atom(id) else { continue };
            let emit = (self.accept)(store, id);
            let contents = atom.contents();
            if !contents.is_empty() && (self.descend)(store, id) {
                self.stack.push(contents.iter());
            }
            if emit {
                return Some(id);
            }
        }
    }
}

impl Store {
    /// The Thing's container; `None` for plain atoms.
    pub fn container_of(&self, id: AtomId) -> Option<AtomId> {
        self.get(id).and_then(|a| a.container())
    }

    /// The Container's contents; empty for anything else.
    pub fn contents(&self, id: AtomId) -> &[AtomId] {
        self.get(id).map_or(&[][..], |a| a.contents())
    }

    /// Whether `id` sits somewhere inside `container`, at any depth.
    pub fn is_inside(&self, id: AtomId, container: AtomId) -> bool {
        let limbo = self.limbo();
        let mut cur = self.container_of(id);
        // Containment is acyclic apart from Limbo's self-reference, so
        // the walk is bounded by the arena size.
        for _ in 0..self.len() {
            match cur {
                Some(c) if c == container => return true,
                Some(c) if c == limbo => return false,
                Some(c) => cur = self.container_of(c),
                None => return false,
            }
        }
        false
    }

    /// Containers enclosing `id`, innermost first, ending at the outermost
    /// (usually a room, or Limbo).
    pub fn location_chain(&self, id: AtomId) -> Vec<AtomId> {
        let limbo = self.limbo();
        let mut chain = Vec::new();
        let mut cur = self.container_of(id);
        while let Some(c) = cur {
            if chain.contains(&c) {
                break;
            }
            chain.push(c);
            if c == limbo {
                break;
            }
            cur = self.container_of(c);
        }
        chain
    }

    /// Move a Thing into a Container.
    ///
    /// Fails for non-Things, non-Containers, Limbo itself, and moves that
    /// would put a container inside itself. Moving a Thing to where it
    /// already is does nothing.
    pub fn move_to(&mut self, thing: AtomId, container: AtomId) -> Result<(), WorldError> {
        let t = self.atom(thing)?;
        if !t.kind().is_spatial() {
            return Err(WorldError::NotAThing {
                id: t.id().to_string(),
            });
        }
        if thing == self.limbo() {
            return Err(WorldError::Frozen {
                id: t.id().to_string(),
            });
        }
        let c = self.atom(container)?;
        if !c.kind().holds_contents() {
            return Err(WorldError::NotAContainer {
                id: c.id().to_string(),
            });
        }
        if thing == container || self.is_inside(container, thing) {
            return Err(WorldError::ContainmentCycle {
                thing: t.id().to_string(),
                container: c.id().to_string(),
            });
        }
        if t.container() == Some(container) {
            return Ok(());
        }
        self.relocate(thing, container);
        Ok(())
    }

    /// Unchecked move; the caller has validated it.
    pub(crate) fn relocate(&mut self, thing: AtomId, container: AtomId) {
        self.detach(thing);
        if let Some(hold) = self.atom_mut(container).ok().and_then(|c| c.hold.as_mut()) {
            hold.contents.push(thing);
        }
        if let Some(place) = self.atom_mut(thing).ok().and_then(|t| t.place.as_mut()) {
            place.container = Some(container);
        }
    }

    /// Take a Thing out of its container's contents.
    pub(crate) fn detach(&mut self, thing: AtomId) {
        let Some(old) = self.container_of(thing) else { return };
        if old == thing {
            return;
        }
        if let Some(hold) = self.atom_mut(old).ok().and_then(|c| c.hold.as_mut()) {
            hold.contents.retain(|id| *id != thing);
        }
        if let Some(place) = self.atom_mut(thing).ok().and_then(|t| t.place.as_mut()) {
            place.container = None;
        }
    }

    // ── Traversals ──────────────────────────────────────────────

    /// General traversal: yield atoms for which `accept` holds, descend
    /// into those for which `descend` holds.
    pub fn walk<A, D>(&self, root: AtomId, accept: A, descend: D) -> Walk<'_, A, D>
    where
        A: FnMut(&Store, AtomId) -> bool,
        D: FnMut(&Store, AtomId) -> bool,
    {
        Walk {
            store: self,
            stack: vec![self.contents(root).iter()],
            accept,
            descend,
        }
    }

    /// Everything inside `root`, at any depth.
    pub fn all_contents(&self, root: AtomId) -> impl Iterator<Item = AtomId> + '_ {
        self.walk(root, |_, _| true, |_, _| true)
    }

    /// What `viewer` can see inside `root`.
    ///
    /// An atom shows when the saturating sum `visibility - concealment +
    /// viewer.perception` is non-negative. The walk descends through open
    /// containers, and through transparent ones when `allow_transparent`
    /// is set. The viewer itself is skipped, contents included.
    pub fn visible(
        &self,
        root: AtomId,
        viewer: AtomId,
        allow_transparent: bool,
    ) -> impl Iterator<Item = AtomId> + '_ {
        let perception = self.raw_int(viewer, "perception");
        self.walk(
            root,
            move |s, id| id != viewer && s.conspicuity(id).saturating_add(perception) >= 0,
            move |s, id| {
                id != viewer
                    && (s.raw_flag(id, "open", true)
                        || (allow_transparent && s.raw_flag(id, "transparent", false)))
            },
        )
    }

    /// What `viewer` can pick up inside `root`: visible atoms not sealed
    /// away inside closed containers.
    pub fn gettable(&self, root: AtomId, viewer: AtomId) -> impl Iterator<Item = AtomId> + '_ {
        self.visible(root, viewer, false)
    }

    /// Atoms inside `root` that can hear, optionally restricted to
    /// descendants of `required`. Sound does not pass closed containers.
    pub fn can_hear(
        &self,
        root: AtomId,
        required: Option<AtomId>,
    ) -> impl Iterator<Item = AtomId> + '_ {
        self.walk(
            root,
            move |s, id| required.is_none_or(|ty| s.is_a(id, ty)),
            |s, id| s.raw_flag(id, "open", true),
        )
    }

    fn conspicuity(&self, id: AtomId) -> i64 {
        self.raw_int(id, "visibility")
            .saturating_sub(self.raw_int(id, "concealment"))
    }

    /// Integer property read without invoking handlers; 0 if absent or
    /// not an integer.
    pub fn raw_int(&self, id: AtomId, name: &str) -> i64 {
        self.raw_property(id, name)
            .and_then(|v| v.as_int())
            .unwrap_or(0)
    }

    /// Boolean property read without invoking handlers. Integers count by
    /// truthiness; anything else reads as `default`.
    pub fn raw_flag(&self, id: AtomId, name: &str, default: bool) -> bool {
        match self.raw_property(id, name) {
            Some(Value::Bool(b)) => b,
            Some(Value::Int(n)) => n != 0,
            _ => default,
        }
    }
}
