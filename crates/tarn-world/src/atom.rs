//! Graph nodes.

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use tarn_core::AtomId;

use crate::exit::ExitTable;
use crate::observer::WatcherChain;
use crate::value::Value;

/// Concrete node type of an atom.
///
/// Chosen at creation from the most specific built-in marker among the
/// atom's ancestors, and fixed for the atom's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AtomKind {
    /// A plain, non-spatial atom (types, abstract data).
    Atom,
    /// Occupies space inside a container.
    Thing,
    /// A Thing that holds other Things.
    Container,
    /// A Container used for actors and other movable holders.
    Mobile,
}

impl AtomKind {
    /// Class name written to persisted state.
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Atom => "Atom",
            Self::Thing => "Thing",
            Self::Container => "Container",
            Self::Mobile => "Mobile",
        }
    }

    /// Parse a persisted class name.
    pub fn from_class_name(name: &str) -> Option<Self> {
        match name {
            "Atom" => Some(Self::Atom),
            "Thing" => Some(Self::Thing),
            "Container" => Some(Self::Container),
            "Mobile" => Some(Self::Mobile),
            _ => None,
        }
    }

    /// Whether the atom occupies space (has a container).
    pub fn is_spatial(self) -> bool {
        self != Self::Atom
    }

    /// Whether the atom can hold other Things.
    pub fn holds_contents(self) -> bool {
        matches!(self, Self::Container | Self::Mobile)
    }
}

/// Where a Thing is and who is listening to it.
#[derive(Default)]
pub(crate) struct Placement {
    pub(crate) container: Option<AtomId>,
    pub(crate) watchers: WatcherChain,
}

/// What a Container holds.
#[derive(Default)]
pub(crate) struct Holding {
    pub(crate) contents: Vec<AtomId>,
    pub(crate) exits: Option<ExitTable>,
}

/// A node of the world graph.
pub struct Atom {
    pub(crate) id: String,
    pub(crate) kind: AtomKind,
    pub(crate) fields: IndexMap<String, Value>,
    pub(crate) parents: SmallVec<[AtomId; 2]>,
    pub(crate) children: IndexSet<AtomId>,
    pub(crate) frozen: bool,
    pub(crate) deleted: bool,
    pub(crate) place: Option<Placement>,
    pub(crate) hold: Option<Holding>,
}

impl Atom {
    pub(crate) fn new(id: &str, kind: AtomKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            fields: IndexMap::new(),
            parents: SmallVec::new(),
            children: IndexSet::new(),
            frozen: false,
            deleted: false,
            place: kind.is_spatial().then(Placement::default),
            hold: kind.holds_contents().then(Holding::default),
        }
    }

    /// Identifier, in the case it was created with.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Concrete node type.
    pub fn kind(&self) -> AtomKind {
        self.kind
    }

    /// Whether the inheritance edges are immutable.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Whether the atom has been deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Parents in insertion order. Lookup precedence uses
    /// [`Store::ordered_parents`](crate::Store::ordered_parents).
    pub fn parents(&self) -> &[AtomId] {
        &self.parents
    }

    /// Children in insertion order.
    pub fn children(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.children.iter().copied()
    }

    /// A locally defined (non-system) field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Locally defined fields in definition order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The Thing's container.
    pub fn container(&self) -> Option<AtomId> {
        self.place.as_ref().and_then(|p| p.container)
    }

    /// The Container's contents, in arrival order.
    pub fn contents(&self) -> &[AtomId] {
        self.hold.as_ref().map_or(&[][..], |h| h.contents.as_slice())
    }

    /// The Container's exit table, if any exit was ever set.
    pub fn exits(&self) -> Option<&ExitTable> {
        self.hold.as_ref().and_then(|h| h.exits.as_ref())
    }
}

impl std::fmt::Debug for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("parents", &self.parents)
            .field("frozen", &self.frozen)
            .field("deleted", &self.deleted)
            .finish_non_exhaustive()
    }
}
