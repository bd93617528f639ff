//! The atom arena and registry.
//!
//! Atoms live in a dense arena indexed by [`AtomId`]. Handles are never
//! reused: deleting an atom marks its slot and drops it from the
//! registry, so stale handles resolve to the tombstone rather than to an
//! unrelated successor.
//!
//! Every mutator validates its inputs before touching the graph, so a
//! returned error means nothing changed.

use std::cell::Ref;
use std::collections::VecDeque;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::debug;

use tarn_core::{AtomId, WatcherId, WorldError};

use crate::atom::{Atom, AtomKind};
use crate::resolve::{Resolution, Resolver};

/// Identifier of the root atom.
pub const ROOT_ID: &str = "root";
/// Identifier of the Thing marker.
pub const THING_ID: &str = "thing";
/// Identifier of the Container marker.
pub const CONTAINER_ID: &str = "container";
/// Identifier of the Mobile marker.
pub const MOBILE_ID: &str = "mobile";
/// Identifier of Limbo, the holding area for orphaned Things.
pub const LIMBO_ID: &str = "limbo";

const MAX_ID_LEN: usize = 64;

/// Handles to the bootstrap atoms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Core {
    /// The single parentless atom.
    pub root: AtomId,
    /// Marker every Thing descends from.
    pub thing: AtomId,
    /// Marker every Container descends from.
    pub container: AtomId,
    /// Marker every Mobile descends from.
    pub mobile: AtomId,
    /// The container of last resort.
    pub limbo: AtomId,
}

impl Core {
    /// Whether `id` is one of the bootstrap atoms.
    pub fn contains(&self, id: AtomId) -> bool {
        [self.root, self.thing, self.container, self.mobile, self.limbo].contains(&id)
    }
}

/// Check an identifier: 1-64 characters, an ASCII letter or `_` first,
/// then ASCII alphanumerics or `_`.
pub fn validate_id(id: &str) -> Result<(), WorldError> {
    let mut chars = id.chars();
    let valid = id.len() <= MAX_ID_LEN
        && chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(WorldError::InvalidId { id: id.to_string() })
    }
}

fn registry_key(id: &str) -> String {
    id.to_ascii_lowercase()
}

/// The atom arena, registry, and bootstrap singletons.
pub struct Store {
    atoms: Vec<Atom>,
    registry: IndexMap<String, AtomId>,
    serial: u64,
    watcher_serial: u64,
    core: Core,
    resolver: Resolver,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// A store holding only the bootstrap atoms.
    pub fn new() -> Self {
        let placeholder = AtomId(0);
        let mut store = Self {
            atoms: Vec::new(),
            registry: IndexMap::new(),
            serial: 0,
            watcher_serial: 0,
            core: Core {
                root: placeholder,
                thing: placeholder,
                container: placeholder,
                mobile: placeholder,
                limbo: placeholder,
            },
            resolver: Resolver::new(),
        };
        let root = store.insert_node(ROOT_ID, AtomKind::Atom);
        let thing = store.insert_node(THING_ID, AtomKind::Atom);
        store.link(thing, root);
        let container = store.insert_node(CONTAINER_ID, AtomKind::Atom);
        store.link(container, thing);
        let mobile = store.insert_node(MOBILE_ID, AtomKind::Atom);
        store.link(mobile, container);
        let limbo = store.insert_node(LIMBO_ID, AtomKind::Container);
        store.link(limbo, container);
        if let Some(place) = store.atoms[limbo.index()].place.as_mut() {
            place.container = Some(limbo);
        }
        for id in [root, thing, container, mobile, limbo] {
            store.atoms[id.index()].frozen = true;
        }
        store.core = Core {
            root,
            thing,
            container,
            mobile,
            limbo,
        };
        store
    }

    // ── Lookup ──────────────────────────────────────────────────

    /// Handles to the bootstrap atoms.
    pub fn core(&self) -> Core {
        self.core
    }

    /// The root atom.
    pub fn root(&self) -> AtomId {
        self.core.root
    }

    /// Limbo.
    pub fn limbo(&self) -> AtomId {
        self.core.limbo
    }

    /// Any atom the handle has ever referred to, deleted or not.
    pub fn get(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id.index())
    }

    /// A live atom.
    pub fn atom(&self, id: AtomId) -> Result<&Atom, WorldError> {
        match self.atoms.get(id.index()) {
            Some(atom) if !atom.deleted => Ok(atom),
            _ => Err(WorldError::StaleAtom { atom: id }),
        }
    }

    pub(crate) fn atom_mut(&mut self, id: AtomId) -> Result<&mut Atom, WorldError> {
        match self.atoms.get_mut(id.index()) {
            Some(atom) if !atom.deleted => Ok(atom),
            _ => Err(WorldError::StaleAtom { atom: id }),
        }
    }

    /// Whether the handle refers to a live atom.
    pub fn is_live(&self, id: AtomId) -> bool {
        self.atom(id).is_ok()
    }

    /// Case-insensitive lookup by identifier.
    pub fn lookup(&self, id: &str) -> Option<AtomId> {
        self.registry.get(&registry_key(id)).copied()
    }

    /// Case-insensitive lookup by identifier, as a result.
    pub fn find(&self, id: &str) -> Result<AtomId, WorldError> {
        self.lookup(id)
            .ok_or_else(|| WorldError::UnknownAtom { id: id.to_string() })
    }

    /// The identifier of an atom, deleted or not.
    pub fn name_of(&self, id: AtomId) -> Option<&str> {
        self.get(id).map(Atom::id)
    }

    /// Identifier for error messages; falls back to the handle.
    pub(crate) fn describe(&self, id: AtomId) -> String {
        self.name_of(id)
            .map_or_else(|| id.to_string(), str::to_string)
    }

    /// Live atoms in registration order.
    pub fn ids(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.registry.values().copied()
    }

    /// Number of live atoms, bootstrap atoms included.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Always false: the bootstrap atoms are permanent.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub(crate) fn next_watcher_id(&mut self) -> WatcherId {
        self.watcher_serial += 1;
        WatcherId(self.watcher_serial)
    }

    // ── Resolution ──────────────────────────────────────────────

    fn resolution(&self) -> Ref<'_, Resolution> {
        self.resolver.get(&self.atoms, self.core.root)
    }

    /// Longest path from the root.
    pub fn depth(&self, id: AtomId) -> u32 {
        self.resolution().depth.get(id.index()).copied().unwrap_or(0)
    }

    /// Longest path to a leaf.
    pub fn height(&self, id: AtomId) -> u32 {
        self.resolution().height.get(id.index()).copied().unwrap_or(0)
    }

    /// Parents in lookup precedence: deeper first, then shallower
    /// subtrees, then insertion order.
    pub fn ordered_parents(&self, id: AtomId) -> SmallVec<[AtomId; 2]> {
        self.resolution()
            .order
            .get(id.index())
            .cloned()
            .unwrap_or_default()
    }

    /// Every ancestor exactly once, breadth-first through ordered parents.
    pub fn ancestors(&self, id: AtomId) -> Vec<AtomId> {
        let res = self.resolution();
        Self::ancestors_in(&res, self.atoms.len(), id)
    }

    fn ancestors_in(res: &Resolution, n: usize, id: AtomId) -> Vec<AtomId> {
        let mut seen = vec![false; n];
        let mut out = Vec::new();
        let mut queue = VecDeque::new();
        if let Some(s) = seen.get_mut(id.index()) {
            *s = true;
        }
        queue.push_back(id);
        while let Some(next) = queue.pop_front() {
            let Some(parents) = res.order.get(next.index()) else {
                continue;
            };
            for &p in parents {
                if !seen[p.index()] {
                    seen[p.index()] = true;
                    out.push(p);
                    queue.push_back(p);
                }
            }
        }
        out
    }

    /// Ancestors in property lookup order: most-derived first, the root
    /// last.
    pub fn lookup_order(&self, id: AtomId) -> Vec<AtomId> {
        let res = self.resolution();
        let mut order = Self::ancestors_in(&res, self.atoms.len(), id);
        order.sort_by(|a, b| res.depth[b.index()].cmp(&res.depth[a.index()]));
        order
    }

    /// Every descendant exactly once, breadth-first.
    pub fn descendants(&self, id: AtomId) -> Vec<AtomId> {
        let mut seen = vec![false; self.atoms.len()];
        let mut out = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(next) = queue.pop_front() {
            let Some(atom) = self.get(next) else { continue };
            for &c in &atom.children {
                if !seen[c.index()] {
                    seen[c.index()] = true;
                    out.push(c);
                    queue.push_back(c);
                }
            }
        }
        out
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn descends_from(&self, id: AtomId, ancestor: AtomId) -> bool {
        if id == ancestor {
            return false;
        }
        let mut seen = vec![false; self.atoms.len()];
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(atom) = self.get(next) else { continue };
            for &p in &atom.parents {
                if p == ancestor {
                    return true;
                }
                if !seen[p.index()] {
                    seen[p.index()] = true;
                    stack.push(p);
                }
            }
        }
        false
    }

    /// Whether `id` is `ty` or descends from it.
    pub fn is_a(&self, id: AtomId, ty: AtomId) -> bool {
        id == ty || self.descends_from(id, ty)
    }

    /// Node type implied by a parent set: the most specific marker any
    /// parent is or descends from.
    pub(crate) fn kind_for(&self, parents: &[AtomId]) -> AtomKind {
        let core = self.core;
        let mut kind = AtomKind::Atom;
        for &p in parents {
            let implied = if self.is_a(p, core.mobile) {
                AtomKind::Mobile
            } else if self.is_a(p, core.container) {
                AtomKind::Container
            } else if self.is_a(p, core.thing) {
                AtomKind::Thing
            } else {
                AtomKind::Atom
            };
            kind = kind.max(implied);
        }
        kind
    }

    /// Parent a node of this kind falls back to when it loses its last
    /// parent.
    pub(crate) fn fallback_parent(&self, kind: AtomKind) -> AtomId {
        match kind {
            AtomKind::Atom => self.core.root,
            AtomKind::Thing => self.core.thing,
            AtomKind::Container => self.core.container,
            AtomKind::Mobile => self.core.mobile,
        }
    }

    // ── Raw graph edits ─────────────────────────────────────────

    pub(crate) fn insert_node(&mut self, id: &str, kind: AtomKind) -> AtomId {
        let handle = AtomId(self.atoms.len() as u32);
        self.atoms.push(Atom::new(id, kind));
        self.registry.insert(registry_key(id), handle);
        self.resolver.invalidate();
        handle
    }

    pub(crate) fn link(&mut self, child: AtomId, parent: AtomId) {
        self.atoms[child.index()].parents.push(parent);
        self.atoms[parent.index()].children.insert(child);
        self.resolver.invalidate();
    }

    fn unlink(&mut self, child: AtomId, parent: AtomId) {
        self.atoms[child.index()].parents.retain(|p| *p != parent);
        self.atoms[parent.index()].children.shift_remove(&child);
        self.resolver.invalidate();
    }

    /// After `child` lost a parent: re-attach it if it has none left, and
    /// keep a spatial node descending from its kind marker.
    fn repair_parents(&mut self, child: AtomId) {
        let atom = &self.atoms[child.index()];
        let kind = atom.kind;
        let remaining = atom.parents.clone();
        let needs_marker =
            remaining.is_empty() || (kind.is_spatial() && self.kind_for(&remaining) != kind);
        if needs_marker {
            let fallback = self.fallback_parent(kind);
            self.link(child, fallback);
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────

    fn generate_id(&mut self, base: &str) -> String {
        let mut base: String = base.chars().take(MAX_ID_LEN - 21).collect();
        if base.is_empty() {
            base.push_str("atom");
        }
        loop {
            self.serial += 1;
            let candidate = format!("{base}_{}", self.serial);
            if !self.registry.contains_key(&registry_key(&candidate)) {
                return candidate;
            }
        }
    }

    fn claim_id(&mut self, id: Option<&str>, base: AtomId) -> Result<String, WorldError> {
        match id {
            Some(id) => {
                validate_id(id)?;
                if self.lookup(id).is_some() {
                    return Err(WorldError::DuplicateId { id: id.to_string() });
                }
                Ok(id.to_string())
            }
            None => {
                let base = self.describe(base).to_ascii_lowercase();
                Ok(self.generate_id(&base))
            }
        }
    }

    /// Create an atom inheriting from `parents` (the root if empty).
    ///
    /// The node type is picked from the most specific marker among the
    /// parents' ancestry. New Things start in Limbo. Lifecycle
    /// notifications are the realm's business; see
    /// [`Realm::create`](crate::Realm::create).
    pub fn create(&mut self, id: Option<&str>, parents: &[AtomId]) -> Result<AtomId, WorldError> {
        let mut wanted: SmallVec<[AtomId; 2]> = SmallVec::new();
        for &p in parents {
            if !wanted.contains(&p) {
                wanted.push(p);
            }
        }
        if wanted.is_empty() {
            wanted.push(self.core.root);
        }
        for &p in &wanted {
            if self.atom(p)?.kind.is_spatial() {
                return Err(WorldError::IneligibleParent {
                    id: self.describe(p),
                });
            }
        }
        let kind = self.kind_for(&wanted);
        let name = self.claim_id(id, wanted[0])?;
        let handle = self.spawn(&name, kind, &wanted);
        debug!(atom = %name, kind = kind.class_name(), "atom created");
        Ok(handle)
    }

    fn spawn(&mut self, name: &str, kind: AtomKind, parents: &[AtomId]) -> AtomId {
        let handle = self.insert_node(name, kind);
        for &p in parents {
            self.link(handle, p);
        }
        if kind.is_spatial() {
            let limbo = self.core.limbo;
            self.relocate(handle, limbo);
        }
        handle
    }

    /// Add an inheritance edge. Inheriting an existing parent is a no-op.
    pub fn inherit(&mut self, child: AtomId, parent: AtomId) -> Result<(), WorldError> {
        let c = self.atom(child)?;
        let p = self.atom(parent)?;
        if c.frozen {
            return Err(WorldError::Frozen { id: c.id.clone() });
        }
        if child == parent || self.descends_from(parent, child) {
            return Err(WorldError::InheritanceCycle {
                child: c.id.clone(),
                parent: p.id.clone(),
            });
        }
        if p.kind.is_spatial() {
            return Err(WorldError::IneligibleParent { id: p.id.clone() });
        }
        if c.parents.contains(&parent) {
            return Ok(());
        }
        if c.kind.is_spatial() {
            let mut next = c.parents.clone();
            next.push(parent);
            if self.kind_for(&next) != c.kind {
                return Err(WorldError::KindMismatch {
                    id: c.id.clone(),
                    kind: c.kind.class_name(),
                });
            }
        }
        self.link(child, parent);
        Ok(())
    }

    /// Remove an inheritance edge. An atom losing its last parent
    /// re-attaches to the root, or to its kind marker if it is spatial.
    /// Removing an absent edge is a no-op.
    pub fn uninherit(&mut self, child: AtomId, parent: AtomId) -> Result<(), WorldError> {
        let c = self.atom(child)?;
        self.atom(parent)?;
        if c.frozen {
            return Err(WorldError::Frozen { id: c.id.clone() });
        }
        if !c.parents.contains(&parent) {
            return Ok(());
        }
        if c.kind.is_spatial() {
            let remaining: SmallVec<[AtomId; 2]> =
                c.parents.iter().copied().filter(|p| *p != parent).collect();
            if !remaining.is_empty() && self.kind_for(&remaining) != c.kind {
                return Err(WorldError::KindMismatch {
                    id: c.id.clone(),
                    kind: c.kind.class_name(),
                });
            }
        }
        self.unlink(child, parent);
        self.repair_parents(child);
        Ok(())
    }

    /// Make an atom's inheritance edges permanent. Frozen atoms count as
    /// core: they cannot be deleted and are never exported.
    pub fn freeze(&mut self, id: AtomId) -> Result<(), WorldError> {
        self.atom_mut(id)?.frozen = true;
        Ok(())
    }

    /// Remove an atom from the world, without lifecycle notifications.
    ///
    /// Contents move to Limbo, the atom leaves its container, orphaned
    /// children re-attach, sinks are dropped, and the identifier is freed.
    pub(crate) fn delete(&mut self, id: AtomId) -> Result<(), WorldError> {
        let atom = self.atom(id)?;
        if atom.frozen {
            return Err(WorldError::Frozen {
                id: atom.id.clone(),
            });
        }
        let name = atom.id.clone();
        let contents = atom.contents().to_vec();
        let children: Vec<AtomId> = atom.children.iter().copied().collect();
        let parents = atom.parents.clone();

        let limbo = self.core.limbo;
        for thing in contents {
            self.relocate(thing, limbo);
        }
        self.detach(id);
        for child in children {
            self.unlink(child, id);
            self.repair_parents(child);
        }
        for parent in parents {
            self.unlink(id, parent);
        }

        let atom = &mut self.atoms[id.index()];
        if let Some(place) = atom.place.as_mut() {
            place.watchers.clear();
        }
        if let Some(hold) = atom.hold.as_mut() {
            hold.exits = None;
        }
        atom.deleted = true;
        self.registry.shift_remove(&registry_key(&name));
        self.resolver.invalidate();
        debug!(atom = %name, "atom deleted");
        Ok(())
    }

    /// Duplicate an atom's parents and fields into a new atom. A deep
    /// clone also clones every contained Thing into the copy.
    ///
    /// Returns every atom created, the copy of `source` first. The
    /// bootstrap atoms cannot be cloned.
    pub(crate) fn clone_atom(
        &mut self,
        source: AtomId,
        id: Option<&str>,
        deep: bool,
    ) -> Result<Vec<AtomId>, WorldError> {
        let src = self.atom(source)?;
        // Bootstrap atoms are singletons; root has no parents to copy and
        // Limbo contains itself.
        if self.core.contains(source) {
            return Err(WorldError::Frozen { id: src.id.clone() });
        }
        let kind = src.kind;
        let parents = src.parents.clone();
        let fields = src.fields.clone();
        let contents = if deep { src.contents().to_vec() } else { Vec::new() };

        let name = self.claim_id(id, source)?;
        let copy = self.spawn(&name, kind, &parents);
        self.atoms[copy.index()].fields = fields;
        debug!(atom = %name, source = %self.describe(source), deep, "atom cloned");

        let mut created = vec![copy];
        for thing in contents {
            let sub = self.clone_atom(thing, None, true)?;
            self.relocate(sub[0], copy);
            created.extend(sub);
        }
        Ok(created)
    }

    /// Bare node used by state import; edges and placement come later.
    pub(crate) fn insert_bare(&mut self, id: &str, kind: AtomKind) -> Result<AtomId, WorldError> {
        validate_id(id)?;
        if self.lookup(id).is_some() {
            return Err(WorldError::DuplicateId { id: id.to_string() });
        }
        Ok(self.insert_node(id, kind))
    }

    /// Attach a full parent set to a fresh node, checking eligibility,
    /// cycles, and kind consistency against the set as a whole.
    pub(crate) fn attach_parents(
        &mut self,
        child: AtomId,
        parents: &[AtomId],
    ) -> Result<(), WorldError> {
        let kind = self.atom(child)?.kind;
        for &p in parents {
            let parent = self.atom(p)?;
            if parent.kind.is_spatial() {
                return Err(WorldError::IneligibleParent {
                    id: parent.id.clone(),
                });
            }
            if p == child || self.descends_from(p, child) {
                return Err(WorldError::InheritanceCycle {
                    child: self.describe(child),
                    parent: self.describe(p),
                });
            }
        }
        if kind.is_spatial() && !parents.is_empty() && self.kind_for(parents) != kind {
            return Err(WorldError::KindMismatch {
                id: self.describe(child),
                kind: kind.class_name(),
            });
        }
        for &p in parents {
            if !self.atoms[child.index()].parents.contains(&p) {
                self.link(child, p);
            }
        }
        if self.atoms[child.index()].parents.is_empty() {
            let fallback = self.fallback_parent(kind);
            self.link(child, fallback);
        }
        Ok(())
    }

    /// Drop a partially imported node entirely.
    pub(crate) fn purge(&mut self, id: AtomId) {
        if self.atom(id).is_err() {
            return;
        }
        let limbo = self.core.limbo;
        let contents = self.atoms[id.index()].contents().to_vec();
        for thing in contents {
            self.relocate(thing, limbo);
        }
        self.detach(id);
        let children: Vec<AtomId> = self.atoms[id.index()].children.iter().copied().collect();
        for child in children {
            self.unlink(child, id);
        }
        let parents = self.atoms[id.index()].parents.clone();
        for parent in parents {
            self.unlink(id, parent);
        }
        let name = self.atoms[id.index()].id.clone();
        self.atoms[id.index()].deleted = true;
        self.registry.shift_remove(&registry_key(&name));
        self.resolver.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_atoms_form_a_frozen_chain() {
        let store = Store::new();
        let core = store.core();
        assert!(store.atom(core.root).unwrap().parents().is_empty());
        assert_eq!(store.atom(core.thing).unwrap().parents(), [core.root]);
        assert_eq!(store.atom(core.mobile).unwrap().parents(), [core.container]);
        assert!(store.ids().all(|id| store.atom(id).unwrap().is_frozen()));
        assert_eq!(store.container_of(core.limbo), Some(core.limbo));
        assert!(store.contents(core.limbo).is_empty());
        assert_eq!(store.depth(core.mobile), 3);
    }

    #[test]
    fn ids_are_validated_and_case_insensitive() {
        let mut store = Store::new();
        let sword = store.create(Some("Sword"), &[]).unwrap();
        assert_eq!(store.lookup("SWORD"), Some(sword));
        assert_eq!(store.atom(sword).unwrap().id(), "Sword");
        assert_eq!(
            store.create(Some("sword"), &[]),
            Err(WorldError::DuplicateId { id: "sword".into() })
        );
        for bad in ["", "9lives", "has space", "dash-ed", &"x".repeat(65)] {
            assert!(matches!(
                store.create(Some(bad), &[]),
                Err(WorldError::InvalidId { .. })
            ));
        }
    }

    #[test]
    fn generated_ids_use_first_parent_and_skip_taken_names() {
        let mut store = Store::new();
        let weapon = store.create(Some("weapon"), &[]).unwrap();
        store.create(Some("weapon_1"), &[]).unwrap();
        let a = store.create(None, &[weapon]).unwrap();
        assert_eq!(store.atom(a).unwrap().id(), "weapon_2");
    }

    #[test]
    fn kind_comes_from_most_specific_marker() {
        let mut store = Store::new();
        let core = store.core();
        let idea = store.create(Some("idea"), &[]).unwrap();
        let rock = store.create(Some("rock"), &[idea, core.thing]).unwrap();
        let bag = store.create(Some("bag"), &[core.thing, core.container]).unwrap();
        assert_eq!(store.atom(idea).unwrap().kind(), AtomKind::Atom);
        assert_eq!(store.atom(rock).unwrap().kind(), AtomKind::Thing);
        assert_eq!(store.atom(bag).unwrap().kind(), AtomKind::Container);
        assert_eq!(store.container_of(rock), Some(core.limbo));
        assert!(store.contents(core.limbo).contains(&bag));
    }

    #[test]
    fn things_cannot_be_parents() {
        let mut store = Store::new();
        let core = store.core();
        let rock = store.create(Some("rock"), &[core.thing]).unwrap();
        let idea = store.create(Some("idea"), &[]).unwrap();
        assert_eq!(
            store.inherit(idea, rock),
            Err(WorldError::IneligibleParent { id: "rock".into() })
        );
        assert!(matches!(
            store.create(None, &[rock]),
            Err(WorldError::IneligibleParent { .. })
        ));
    }

    #[test]
    fn spatial_kind_cannot_change() {
        let mut store = Store::new();
        let core = store.core();
        let rock = store.create(Some("rock"), &[core.thing]).unwrap();
        assert_eq!(
            store.inherit(rock, core.container),
            Err(WorldError::KindMismatch {
                id: "rock".into(),
                kind: "Thing"
            })
        );
        let idea = store.create(Some("idea"), &[]).unwrap();
        store.inherit(rock, idea).unwrap();
        assert!(matches!(
            store.uninherit(rock, core.thing),
            Err(WorldError::KindMismatch { .. })
        ));
    }

    #[test]
    fn orphans_reattach_by_kind() {
        let mut store = Store::new();
        let core = store.core();
        let weapon = store.create(Some("weapon"), &[]).unwrap();
        let blade = store.create(Some("blade"), &[weapon]).unwrap();
        let sword = store.create(Some("sword"), &[weapon, core.thing]).unwrap();
        store.delete(weapon).unwrap();
        assert_eq!(store.atom(blade).unwrap().parents(), [core.root]);
        assert_eq!(store.atom(sword).unwrap().parents(), [core.thing]);

        store.uninherit(sword, core.thing).unwrap();
        assert_eq!(store.atom(sword).unwrap().parents(), [core.thing]);
        assert_eq!(store.atom(sword).unwrap().kind(), AtomKind::Thing);
    }

    #[test]
    fn delete_empties_contents_into_limbo() {
        let mut store = Store::new();
        let core = store.core();
        let room = store.create(Some("room"), &[core.container]).unwrap();
        let rock = store.create(Some("rock"), &[core.thing]).unwrap();
        store.move_to(rock, room).unwrap();
        store.delete(room).unwrap();

        assert_eq!(store.container_of(rock), Some(core.limbo));
        assert!(!store.contents(core.limbo).contains(&room));
        assert_eq!(store.lookup("room"), None);
        assert!(store.get(room).unwrap().is_deleted());
        assert_eq!(store.atom(room).unwrap_err(), WorldError::StaleAtom { atom: room });
    }

    #[test]
    fn frozen_atoms_refuse_edits_and_deletion() {
        let mut store = Store::new();
        let core = store.core();
        let idea = store.create(Some("idea"), &[]).unwrap();
        assert!(matches!(store.inherit(core.root, idea), Err(WorldError::Frozen { .. })));
        assert!(matches!(store.delete(core.limbo), Err(WorldError::Frozen { .. })));
        store.freeze(idea).unwrap();
        assert!(matches!(store.delete(idea), Err(WorldError::Frozen { .. })));
    }

    #[test]
    fn deep_clone_copies_contents() {
        let mut store = Store::new();
        let core = store.core();
        let chest = store.create(Some("chest"), &[core.container]).unwrap();
        let coin = store.create(Some("coin"), &[core.thing]).unwrap();
        store.set_field(coin, "value", 5.into()).unwrap();
        store.move_to(coin, chest).unwrap();

        let made = store.clone_atom(chest, Some("chest2"), true).unwrap();
        assert_eq!(made.len(), 2);
        let copy = made[0];
        assert_eq!(store.container_of(copy), Some(core.limbo));
        let inner = store.contents(copy).to_vec();
        assert_eq!(inner.len(), 1);
        assert_ne!(inner[0], coin);
        assert_eq!(store.field(inner[0], "value"), Some(5.into()));
        assert_eq!(store.contents(chest), [coin]);
    }

    #[test]
    fn lookup_order_is_most_derived_first() {
        let mut store = Store::new();
        let core = store.core();
        let a = store.create(Some("a"), &[]).unwrap();
        let b = store.create(Some("b"), &[a]).unwrap();
        let c = store.create(Some("c"), &[]).unwrap();
        let d = store.create(Some("d"), &[c, b]).unwrap();
        assert_eq!(store.ordered_parents(d).as_slice(), [b, c]);
        assert_eq!(store.lookup_order(d), [b, c, a, core.root]);
    }
}
