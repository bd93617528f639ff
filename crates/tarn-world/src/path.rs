//! Dotted property paths and message expansion.
//!
//! A path is a head naming an atom followed by one or more property
//! names: `me.name`, `arg2.weight`, `here.owner.name`. Every segment but
//! the last must cook to an atom reference.
//!
//! Heads:
//!
//! | head                  | atom                                       |
//! |-----------------------|--------------------------------------------|
//! | `current`, `this`     | the event's current atom                   |
//! | `actor`, `me`         | the event's actor                          |
//! | `container`, `here`   | the actor's container, else current's      |
//! | `arg`, `argN`         | the first / N-th atom-typed argument       |
//! | anything else         | the atom with that identifier              |

use tarn_core::{AtomId, HandlerError, WorldError};

use crate::event::Event;
use crate::realm::Realm;
use crate::store::Store;
use crate::value::Value;

fn invalid(path: &str) -> HandlerError {
    WorldError::InvalidPath {
        path: path.to_string(),
    }
    .into()
}

impl Realm {
    fn path_head(&self, head: &str, event: &Event) -> Option<AtomId> {
        let store = self.store();
        match head {
            "current" | "this" => event.current,
            "actor" | "me" => event.actor,
            "container" | "here" => event
                .actor
                .and_then(|a| store.container_of(a))
                .or_else(|| event.current.and_then(|c| store.container_of(c))),
            "arg" => event.first_atom_arg(),
            _ => match head.strip_prefix("arg").map(str::parse::<usize>) {
                Some(Ok(n)) => event.nth_atom_arg(n),
                _ => store.lookup(head),
            },
        }
    }

    /// Resolve a path to the atom and property name its last segment
    /// names.
    pub fn resolve_path(&mut self, path: &str, event: &Event) -> Result<(AtomId, String), HandlerError> {
        let mut segments = path.split('.');
        let head = segments.next().unwrap_or_default();
        let mut atom = self.path_head(head, event).ok_or_else(|| invalid(path))?;
        let mut last = segments.next().ok_or_else(|| invalid(path))?;
        for next in segments {
            atom = match self.property(atom, last)? {
                Some(Value::Atom(a)) => a,
                _ => return Err(invalid(path)),
            };
            last = next;
        }
        if last.is_empty() {
            return Err(invalid(path));
        }
        Ok((atom, last.to_string()))
    }

    /// Cooked value of the property a path names.
    pub fn path_value(&mut self, path: &str, event: &Event) -> Result<Option<Value>, HandlerError> {
        let (atom, name) = self.resolve_path(path, event)?;
        self.property(atom, &name)
    }

    /// Substitute every `{path}` in `template` with the rendered cooked
    /// value. `{{` and `}}` produce literal braces; an unterminated `{`
    /// is copied through as-is.
    pub fn expand(&mut self, template: &str, event: &Event) -> Result<String, HandlerError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if tail.starts_with("{{") || tail.starts_with("}}") {
                out.push_str(&tail[..1]);
                rest = &tail[2..];
            } else if let Some(stripped) = tail.strip_prefix('{') {
                match stripped.find('}') {
                    Some(end) => {
                        let value = self.path_value(&stripped[..end], event)?;
                        if let Some(value) = value {
                            out.push_str(&self.store().render(&value));
                        }
                        rest = &stripped[end + 1..];
                    }
                    None => {
                        out.push_str(tail);
                        rest = "";
                    }
                }
            } else {
                out.push('}');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl Store {
    /// Display text for a value. Atoms render as their raw `name`
    /// property, falling back to their identifier.
    pub fn render(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Str(s) => s.clone(),
            Value::Atom(id) => match self.raw_property(*id, "name") {
                Some(Value::Str(name)) => name,
                _ => self.describe(*id),
            },
            Value::List(items) => items
                .iter()
                .map(|v| self.render(v))
                .collect::<Vec<_>>()
                .join(", "),
            Value::Table(table) => table
                .iter()
                .map(|(k, v)| format!("{k}: {}", self.render(v)))
                .collect::<Vec<_>>()
                .join(", "),
            Value::Handler(h) => format!("<{}>", h.name()),
        }
    }
}
