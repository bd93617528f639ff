//! Event records and the dispatch context stack frame.

use std::fmt;

use tarn_core::{AtomId, WorldTime};

use crate::value::Value;

/// Which step of the fallback chain handled an unbound event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// The current atom's container accepted `container_<id>`.
    Container,
    /// The first atom-typed argument accepted `arg_<id>`.
    Argument,
    /// The current atom accepted the event directly.
    Direct,
}

/// A named occurrence routed to a property lookup on a target atom.
///
/// Built with the chaining constructors:
///
/// ```
/// use tarn_world::{Event, Value};
/// use tarn_core::AtomId;
///
/// let ev = Event::new("look")
///     .by(AtomId(7))
///     .on(AtomId(7))
///     .with_arg(Value::from("carefully"));
/// assert_eq!(ev.target, Some(AtomId(7)));
/// assert!(ev.bound);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Event identifier; also the property name looked up on the target.
    pub id: String,
    /// The simulated actor on whose behalf the event runs.
    pub actor: Option<AtomId>,
    /// The acting/originating atom.
    pub current: Option<AtomId>,
    /// The lookup root. Starts equal to `current`; reassigned by fallback
    /// routing and by `pass`.
    pub target: Option<AtomId>,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Earliest world time at which a scheduled event may fire.
    pub fire_at: WorldTime,
    /// Value returned by the handler that ran, if any.
    pub result: Option<Value>,
    /// Whether plain-message output has `{path}` references expanded.
    pub expand: bool,
    /// Unbound events go through the container/argument/direct fallback.
    pub bound: bool,
    /// Fallback step that handled an unbound event.
    pub route: Option<Route>,
}

impl Event {
    /// A bound event with no actor, current atom, or arguments.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            actor: None,
            current: None,
            target: None,
            args: Vec::new(),
            fire_at: WorldTime::ZERO,
            result: None,
            expand: false,
            bound: true,
            route: None,
        }
    }

    /// Set the actor.
    pub fn by(mut self, actor: AtomId) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Set the current atom; the target follows it.
    pub fn on(mut self, current: AtomId) -> Self {
        self.current = Some(current);
        self.target = Some(current);
        self
    }

    /// Override the target without touching the current atom.
    pub fn targeting(mut self, target: AtomId) -> Self {
        self.target = Some(target);
        self
    }

    /// Append one argument.
    pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replace the argument list.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Schedule for world time `at`.
    pub fn at(mut self, at: WorldTime) -> Self {
        self.fire_at = at;
        self
    }

    /// Route through the container/argument/direct fallback chain.
    pub fn unbound(mut self) -> Self {
        self.bound = false;
        self
    }

    /// Expand `{path}` references in plain-message output.
    pub fn expanding(mut self) -> Self {
        self.expand = true;
        self
    }

    /// The first argument holding an atom reference.
    pub fn first_atom_arg(&self) -> Option<AtomId> {
        self.args.iter().find_map(Value::as_atom)
    }

    /// The `n`-th (1-based) argument holding an atom reference.
    pub fn nth_atom_arg(&self, n: usize) -> Option<AtomId> {
        self.args
            .iter()
            .filter_map(Value::as_atom)
            .nth(n.checked_sub(1)?)
    }
}

/// One entry of the realm's context stack: the event being dispatched and
/// the atom whose property is running.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Event identifier at the time of the push.
    pub event_id: String,
    /// The event's actor.
    pub actor: Option<AtomId>,
    /// The event's current atom.
    pub current: Option<AtomId>,
    /// The lookup root the property was resolved from.
    pub target: Option<AtomId>,
    /// The atom that defines the running property.
    pub owner: AtomId,
}

impl Frame {
    pub(crate) fn new(event: &Event, owner: AtomId) -> Self {
        Self {
            event_id: event.id.clone(),
            actor: event.actor,
            current: event.current,
            target: event.target,
            owner,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} defined on {}", self.event_id, self.owner)?;
        if let Some(target) = self.target {
            write!(f, " via {target}")?;
        }
        if let Some(actor) = self.actor {
            write!(f, " for {actor}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_sets_current_and_target() {
        let ev = Event::new("poke").on(AtomId(2)).targeting(AtomId(5));
        assert_eq!(ev.current, Some(AtomId(2)));
        assert_eq!(ev.target, Some(AtomId(5)));
    }

    #[test]
    fn atom_args_skip_other_values() {
        let ev = Event::new("give")
            .with_arg(Value::from("gently"))
            .with_arg(AtomId(9))
            .with_arg(3)
            .with_arg(AtomId(4));
        assert_eq!(ev.first_atom_arg(), Some(AtomId(9)));
        assert_eq!(ev.nth_atom_arg(2), Some(AtomId(4)));
        assert_eq!(ev.nth_atom_arg(0), None);
        assert_eq!(ev.nth_atom_arg(3), None);
    }

    #[test]
    fn frame_display_mentions_owner_and_actor() {
        let ev = Event::new("look").by(AtomId(1)).on(AtomId(2));
        let frame = Frame::new(&ev, AtomId(3));
        assert_eq!(frame.to_string(), "look defined on #3 via #2 for #1");
    }
}
