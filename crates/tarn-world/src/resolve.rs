//! Depth/height metrics and per-node parent ordering.
//!
//! Edge changes only mark the resolution dirty; the next query recomputes
//! it in full. Queries take `&self`, so the cache lives behind interior
//! mutability.

use std::cell::{Cell, Ref, RefCell};

use smallvec::SmallVec;

use tarn_core::AtomId;

use crate::atom::Atom;

/// Computed graph metrics.
#[derive(Debug, Default)]
pub(crate) struct Resolution {
    /// Longest path from the root.
    pub(crate) depth: Vec<u32>,
    /// Longest path to any leaf.
    pub(crate) height: Vec<u32>,
    /// Parents sorted by (depth desc, height asc, insertion order).
    pub(crate) order: Vec<SmallVec<[AtomId; 2]>>,
}

impl Resolution {
    fn compute(atoms: &[Atom], root: AtomId) -> Self {
        let n = atoms.len();

        // Downward from the root; a branch stops once the stored depth
        // already meets the proposal.
        let mut depth = vec![0u32; n];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let proposed = depth[id.index()] + 1;
            for &child in &atoms[id.index()].children {
                let slot = &mut depth[child.index()];
                if *slot >= proposed {
                    continue;
                }
                *slot = proposed;
                stack.push(child);
            }
        }

        // Upward from the leaves.
        let mut height = vec![0u32; n];
        let mut stack: Vec<AtomId> = atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| !a.deleted && a.children.is_empty())
            .map(|(i, _)| AtomId(i as u32))
            .collect();
        while let Some(id) = stack.pop() {
            let proposed = height[id.index()] + 1;
            for &parent in &atoms[id.index()].parents {
                let slot = &mut height[parent.index()];
                if *slot >= proposed {
                    continue;
                }
                *slot = proposed;
                stack.push(parent);
            }
        }

        let order = atoms
            .iter()
            .map(|atom| {
                let mut parents = atom.parents.clone();
                parents.sort_by(|a, b| {
                    depth[b.index()]
                        .cmp(&depth[a.index()])
                        .then(height[a.index()].cmp(&height[b.index()]))
                });
                parents
            })
            .collect();

        Self {
            depth,
            height,
            order,
        }
    }
}

/// Lazily recomputed [`Resolution`].
#[derive(Debug)]
pub(crate) struct Resolver {
    dirty: Cell<bool>,
    cache: RefCell<Resolution>,
}

impl Resolver {
    pub(crate) fn new() -> Self {
        Self {
            dirty: Cell::new(true),
            cache: RefCell::new(Resolution::default()),
        }
    }

    pub(crate) fn invalidate(&self) {
        self.dirty.set(true);
    }

    pub(crate) fn get(&self, atoms: &[Atom], root: AtomId) -> Ref<'_, Resolution> {
        if self.dirty.get() {
            *self.cache.borrow_mut() = Resolution::compute(atoms, root);
            self.dirty.set(false);
        }
        self.cache.borrow()
    }
}
