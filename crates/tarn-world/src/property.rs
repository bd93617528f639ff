//! Field storage and property lookup.
//!
//! A *field* is defined on one atom. A *property* is a field looked up
//! along the atom's ancestry. Raw lookups return whatever is stored;
//! cooked lookups ([`Realm::property`]) run handlers until a plain value
//! comes out and read the null sentinel as absent.

use tarn_core::{AtomId, HandlerError, WorldError};

use crate::event::{Event, Frame};
use crate::handler::Ctx;
use crate::realm::Realm;
use crate::store::Store;
use crate::value::Value;

/// Field names computed from graph state. They can be read on any atom
/// (where applicable) but never written.
pub const SYSTEM_FIELDS: [&str; 6] = ["id", "class", "parents", "children", "container", "contents"];

/// Whether `name` is a computed system field.
pub fn is_system_field(name: &str) -> bool {
    SYSTEM_FIELDS.contains(&name)
}

impl Store {
    /// A computed system field of a live atom.
    pub fn system_field(&self, id: AtomId, name: &str) -> Option<Value> {
        let atom = self.atom(id).ok()?;
        let refs = |ids: &mut dyn Iterator<Item = AtomId>| Value::List(ids.map(Value::Atom).collect());
        match name {
            "id" => Some(Value::Str(atom.id().to_string())),
            "class" => Some(Value::Str(atom.kind().class_name().to_string())),
            "parents" => Some(refs(&mut atom.parents().iter().copied())),
            "children" => Some(refs(&mut atom.children())),
            "container" if atom.kind().is_spatial() => {
                Some(atom.container().map_or(Value::Null, Value::Atom))
            }
            "contents" if atom.kind().holds_contents() => {
                Some(refs(&mut atom.contents().iter().copied()))
            }
            _ => None,
        }
    }

    /// A locally defined field, system fields included.
    pub fn field(&self, id: AtomId, name: &str) -> Option<Value> {
        self.system_field(id, name)
            .or_else(|| self.atom(id).ok()?.field(name).cloned())
    }

    /// Whether the atom defines `name` itself (system fields excluded).
    pub fn defines(&self, id: AtomId, name: &str) -> bool {
        self.atom(id).is_ok_and(|a| a.field(name).is_some())
    }

    /// Define or overwrite a field, returning the previous local value.
    pub fn set_field(
        &mut self,
        id: AtomId,
        name: &str,
        value: Value,
    ) -> Result<Option<Value>, WorldError> {
        if is_system_field(name) {
            return Err(WorldError::SystemField {
                name: name.to_string(),
            });
        }
        Ok(self.atom_mut(id)?.fields.insert(name.to_string(), value))
    }

    /// Remove a local field, uncovering any inherited definition.
    pub fn remove_field(&mut self, id: AtomId, name: &str) -> Result<Option<Value>, WorldError> {
        if is_system_field(name) {
            return Err(WorldError::SystemField {
                name: name.to_string(),
            });
        }
        Ok(self.atom_mut(id)?.fields.shift_remove(name))
    }

    /// Property lookup without running handlers: the local field, else
    /// the first ancestor in lookup order that defines it.
    pub fn raw_property(&self, id: AtomId, name: &str) -> Option<Value> {
        self.raw_property_with_owner(id, name).map(|(_, v)| v)
    }

    /// Like [`Store::raw_property`], also naming the atom that defines
    /// the value.
    pub fn raw_property_with_owner(&self, id: AtomId, name: &str) -> Option<(AtomId, Value)> {
        if let Some(v) = self.field(id, name) {
            return Some((id, v));
        }
        self.lookup_order(id).into_iter().find_map(|ancestor| {
            self.atom(ancestor)
                .ok()?
                .field(name)
                .map(|v| (ancestor, v.clone()))
        })
    }

    /// The next definition of `name` after `owner`: the first atom in
    /// `owner`'s lookup order that defines it locally.
    pub fn precursor(&self, owner: AtomId, name: &str) -> Option<AtomId> {
        self.lookup_order(owner)
            .into_iter()
            .find(|&ancestor| self.defines(ancestor, name))
    }
}

impl Realm {
    /// Cooked property lookup.
    ///
    /// A handler value is run in a sub-context whose current atom is `id`
    /// and whose owner is the defining ancestor; if it returns another
    /// handler that one runs too, up to the configured cook depth. The
    /// null sentinel and undefined properties both read as `None`, so the
    /// result is never a handler.
    pub fn property(&mut self, id: AtomId, name: &str) -> Result<Option<Value>, HandlerError> {
        let Some((owner, mut value)) = self.store().raw_property_with_owner(id, name) else {
            return Ok(None);
        };
        let mut rounds = 0;
        loop {
            match value {
                Value::Null => return Ok(None),
                Value::Handler(handler) => {
                    rounds += 1;
                    let limit = self.config().max_cook_depth;
                    if rounds > limit {
                        return Err(WorldError::DispatchTooDeep { limit }.into());
                    }
                    self.check_depth()?;
                    let mut sub = Event::new(name).on(id);
                    sub.actor = self.frames().last().and_then(|f| f.actor).or(Some(id));
                    self.push_frame(Frame::new(&sub, owner));
                    let outcome = {
                        let mut ctx = Ctx::new(self, &mut sub, owner);
                        handler.call(&mut ctx)
                    };
                    self.pop_frame();
                    value = outcome?;
                }
                other => return Ok(Some(other)),
            }
        }
    }

    /// Cooked lookup that must produce an atom reference.
    pub fn atom_property(&mut self, id: AtomId, name: &str) -> Result<Option<AtomId>, HandlerError> {
        match self.property(id, name)? {
            None => Ok(None),
            Some(Value::Atom(a)) => Ok(Some(a)),
            Some(other) => Err(WorldError::TypeMismatch {
                expected: "atom",
                found: other.type_name(),
            }
            .into()),
        }
    }
}
