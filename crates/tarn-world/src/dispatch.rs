//! Event dispatch and the fault boundary.
//!
//! [`Realm::dispatch`] resolves the event id as a property of the target
//! and acts on the value found. [`Realm::deliver`] wraps it: any handler
//! error or panic stops there, the context stack is restored, and the
//! actor is told what went wrong.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, warn};

use tarn_core::{AtomId, HandlerError};

use crate::event::{Event, Frame, Route};
use crate::handler::Ctx;
use crate::realm::Realm;
use crate::value::Value;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Realm {
    /// Dispatch an event, containing any fault it raises.
    ///
    /// Returns whether the event was handled; a fault counts as
    /// unhandled. On a fault the context stack is cut back to where it
    /// was, a diagnostic goes to the event's actor, and the fault is
    /// logged with the chain of enclosing events.
    pub fn deliver(&mut self, event: &mut Event) -> bool {
        let depth = self.frames().len();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(event)));
        let fault = match outcome {
            Ok(Ok(handled)) => return handled,
            Ok(Err(e)) => e,
            Err(payload) => HandlerError::Panicked {
                message: panic_message(payload.as_ref()),
            },
        };
        let trace: Vec<String> = self.frames().iter().map(Frame::to_string).collect();
        self.truncate_frames(depth);
        self.report_fault(event, &fault, &trace);
        false
    }

    fn report_fault(&mut self, event: &Event, fault: &HandlerError, trace: &[String]) {
        self.stats.faults += 1;
        error!(
            event = %event.id,
            actor = ?event.actor,
            target = ?event.target,
            trace = ?trace,
            "handler fault: {fault}"
        );
        let Some(actor) = event.actor else { return };
        let message = format!("[{}] failed: {fault}", event.id);
        let told = panic::catch_unwind(AssertUnwindSafe(|| {
            self.store_mut().tell(actor, &message, Some(event))
        }));
        match told {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(event = %event.id, "diagnostic not delivered: {e}"),
            Err(payload) => error!(
                event = %event.id,
                actor = %actor,
                "double fault while reporting handler fault: {}",
                panic_message(payload.as_ref())
            ),
        }
    }

    /// Dispatch an event without a fault boundary.
    ///
    /// Bound events look the event id up on the target (or the root when
    /// there is no target). Unbound events try the current atom's
    /// container (`container_<id>`), then the first atom argument
    /// (`arg_<id>`), then the target itself, and record which one
    /// handled them in [`Event::route`].
    pub fn dispatch(&mut self, event: &mut Event) -> Result<bool, HandlerError> {
        self.stats.dispatched += 1;
        let handled = if event.bound {
            self.dispatch_bound(event)?
        } else {
            self.dispatch_unbound(event)?
        };
        if handled {
            self.stats.handled += 1;
        }
        Ok(handled)
    }

    fn dispatch_bound(&mut self, event: &mut Event) -> Result<bool, HandlerError> {
        event.result = None;
        let root = event.target.unwrap_or_else(|| self.store().root());
        let Some((owner, value)) = self.store().raw_property_with_owner(root, &event.id) else {
            debug!(event = %event.id, target = %root, "no property for event");
            return Ok(false);
        };
        self.check_depth()?;
        self.push_frame(Frame::new(event, owner));
        let outcome = self.run(event, owner, value);
        self.pop_frame();
        outcome
    }

    fn run(&mut self, event: &mut Event, owner: AtomId, value: Value) -> Result<bool, HandlerError> {
        match value {
            Value::Handler(handler) => {
                let result = {
                    let mut ctx = Ctx::new(self, event, owner);
                    handler.call(&mut ctx)?
                };
                let handled = result.is_truthy();
                event.result = Some(result);
                Ok(handled)
            }
            Value::Bool(b) => Ok(b),
            Value::Int(n) => Ok(n != 0),
            Value::Null => Ok(false),
            message => {
                let text = match &message {
                    Value::Str(s) if event.expand => self.expand(s, event)?,
                    other => self.store().render(other),
                };
                if let Some(actor) = event.actor {
                    self.store_mut().tell(actor, &text, Some(&*event))?;
                }
                Ok(true)
            }
        }
    }

    fn try_route(&mut self, event: &mut Event, id: String, target: AtomId) -> Result<bool, HandlerError> {
        let saved_id = std::mem::replace(&mut event.id, id);
        let saved_target = event.target.replace(target);
        let outcome = self.dispatch_bound(event);
        event.id = saved_id;
        event.target = saved_target;
        outcome
    }

    fn dispatch_unbound(&mut self, event: &mut Event) -> Result<bool, HandlerError> {
        event.route = None;
        let container = event.current.and_then(|c| self.store().container_of(c));
        if let Some(container) = container {
            let id = format!("container_{}", event.id);
            if self.try_route(event, id, container)? {
                event.route = Some(Route::Container);
                return Ok(true);
            }
        }
        if let Some(arg) = event.first_atom_arg() {
            let id = format!("arg_{}", event.id);
            if self.try_route(event, id, arg)? {
                event.route = Some(Route::Argument);
                return Ok(true);
            }
        }
        if let Some(direct) = event.target.or(event.current) {
            let id = event.id.clone();
            if self.try_route(event, id, direct)? {
                event.route = Some(Route::Direct);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Re-dispatch `event` on the next definition of its property after
    /// `owner`, restoring the target afterwards. Unhandled when nothing
    /// further up defines it.
    pub fn pass(&mut self, event: &mut Event, owner: AtomId) -> Result<bool, HandlerError> {
        let Some(precursor) = self.store().precursor(owner, &event.id) else {
            return Ok(false);
        };
        let saved = event.target.replace(precursor);
        let outcome = self.dispatch_bound(event);
        event.target = saved;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tarn_core::WorldError;

    use super::*;
    use crate::config::RealmConfig;

    fn realm_with_actor() -> (Realm, AtomId, Arc<Mutex<Vec<String>>>) {
        let mut realm = Realm::new(RealmConfig::default());
        let mobile = realm.store().core().mobile;
        let alice = realm.create(Some("alice"), &[mobile]).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        realm
            .store_mut()
            .watch(
                alice,
                Box::new(move |msg: &str, _ev: Option<&Event>| {
                    sink.lock().unwrap().push(msg.to_string());
                }),
                true,
            )
            .unwrap();
        (realm, alice, log)
    }

    #[test]
    fn literal_values_decide_handling() {
        let (mut realm, alice, log) = realm_with_actor();
        let store = realm.store_mut();
        store.set_field(alice, "yes", true.into()).unwrap();
        store.set_field(alice, "zero", 0.into()).unwrap();
        store.set_field(alice, "nothing", Value::Null).unwrap();
        store.set_field(alice, "greet", "Hello there.".into()).unwrap();

        let ev = |id: &str| Event::new(id).by(alice).on(alice);
        assert_eq!(realm.dispatch(&mut ev("yes")), Ok(true));
        assert_eq!(realm.dispatch(&mut ev("zero")), Ok(false));
        assert_eq!(realm.dispatch(&mut ev("nothing")), Ok(false));
        assert_eq!(realm.dispatch(&mut ev("missing")), Ok(false));
        assert_eq!(realm.dispatch(&mut ev("greet")), Ok(true));
        assert_eq!(*log.lock().unwrap(), ["Hello there."]);
    }

    #[test]
    fn plain_messages_expand_when_asked() {
        let (mut realm, alice, log) = realm_with_actor();
        let store = realm.store_mut();
        store.set_field(alice, "name", "Alice".into()).unwrap();
        store.set_field(alice, "wave", "{me.name} waves.".into()).unwrap();
        realm
            .dispatch(&mut Event::new("wave").by(alice).on(alice))
            .unwrap();
        realm
            .dispatch(&mut Event::new("wave").by(alice).on(alice).expanding())
            .unwrap();
        assert_eq!(*log.lock().unwrap(), ["{me.name} waves.", "Alice waves."]);
    }

    #[test]
    fn handler_result_lands_in_the_event() {
        let (mut realm, alice, _) = realm_with_actor();
        let h = realm.register("count", |ctx: &mut Ctx<'_>| Ok(Value::Int(ctx.args().len() as i64))).unwrap();
        realm.store_mut().set_field(alice, "count", h.into()).unwrap();
        let mut ev = Event::new("count").on(alice).with_arg(1).with_arg(2);
        assert_eq!(realm.dispatch(&mut ev), Ok(true));
        assert_eq!(ev.result, Some(Value::Int(2)));
        assert!(realm.frames().is_empty());
    }

    #[test]
    fn pass_reaches_the_ancestor_definition() {
        let mut realm = Realm::new(RealmConfig::default());
        let base = realm.create(Some("base"), &[]).unwrap();
        let leaf = realm.create(Some("leaf"), &[base]).unwrap();
        let base_h = realm.register("base_poke", |ctx: &mut Ctx<'_>| {
            assert_eq!(ctx.target(), ctx.store().lookup("base"));
            Ok(Value::from("base"))
        }).unwrap();
        let leaf_h = realm.register("leaf_poke", |ctx: &mut Ctx<'_>| {
            let before = ctx.target();
            let handled = ctx.pass()?;
            assert_eq!(ctx.target(), before);
            let inner = ctx.event().result.clone();
            Ok(Value::List(vec![Value::Bool(handled), inner.unwrap_or(Value::Null)]))
        }).unwrap();
        realm.store_mut().set_field(base, "poke", base_h.into()).unwrap();
        realm.store_mut().set_field(leaf, "poke", leaf_h.into()).unwrap();

        let mut ev = Event::new("poke").on(leaf);
        assert_eq!(realm.dispatch(&mut ev), Ok(true));
        assert_eq!(
            ev.result,
            Some(Value::List(vec![true.into(), "base".into()]))
        );
    }

    #[test]
    fn pass_without_precursor_is_unhandled() {
        let mut realm = Realm::new(RealmConfig::default());
        let leaf = realm.create(Some("leaf"), &[]).unwrap();
        let h = realm.register("solo", |ctx: &mut Ctx<'_>| Ok(Value::Bool(ctx.pass()?))).unwrap();
        realm.store_mut().set_field(leaf, "solo", h.into()).unwrap();
        let mut ev = Event::new("solo").on(leaf);
        assert_eq!(realm.dispatch(&mut ev), Ok(false));
    }

    #[test]
    fn unbound_events_try_container_then_argument_then_direct() {
        let mut realm = Realm::new(RealmConfig::default());
        let core = realm.store().core();
        let room = realm.create(Some("room"), &[core.container]).unwrap();
        let bob = realm.create(Some("bob"), &[core.mobile]).unwrap();
        let apple = realm.create(Some("apple"), &[core.thing]).unwrap();
        realm.store_mut().move_to(bob, room).unwrap();

        let mut ev = Event::new("eat").by(bob).on(bob).with_arg(apple).unbound();
        assert_eq!(realm.dispatch(&mut ev), Ok(false));
        assert_eq!(ev.route, None);

        realm.store_mut().set_field(bob, "eat", true.into()).unwrap();
        assert_eq!(realm.dispatch(&mut ev), Ok(true));
        assert_eq!(ev.route, Some(Route::Direct));

        realm.store_mut().set_field(apple, "arg_eat", true.into()).unwrap();
        assert_eq!(realm.dispatch(&mut ev), Ok(true));
        assert_eq!(ev.route, Some(Route::Argument));

        realm.store_mut().set_field(room, "container_eat", true.into()).unwrap();
        assert_eq!(realm.dispatch(&mut ev), Ok(true));
        assert_eq!(ev.route, Some(Route::Container));
        assert_eq!(ev.id, "eat");
        assert_eq!(ev.target, Some(bob));
    }

    #[test]
    fn faults_are_contained_and_reported_to_the_actor() {
        let (mut realm, alice, log) = realm_with_actor();
        let boom = realm.register("boom", |_ctx: &mut Ctx<'_>| panic!("kaboom")).unwrap();
        let fail = realm.register("fail", |_ctx: &mut Ctx<'_>| Err(HandlerError::failed("nope"))).unwrap();
        realm.store_mut().set_field(alice, "boom", boom.into()).unwrap();
        realm.store_mut().set_field(alice, "fail", fail.into()).unwrap();

        assert!(!realm.deliver(&mut Event::new("boom").by(alice).on(alice)));
        assert!(!realm.deliver(&mut Event::new("fail").by(alice).on(alice)));
        assert!(realm.frames().is_empty());
        assert_eq!(realm.stats().faults, 2);
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[0].contains("kaboom"));
        assert!(log[1].contains("nope"));
    }

    #[test]
    fn runaway_recursion_hits_the_depth_limit() {
        let mut realm = Realm::new(RealmConfig {
            max_dispatch_depth: 8,
            ..RealmConfig::default()
        });
        let loop_h = realm.register("again", |ctx: &mut Ctx<'_>| {
            let mut next = ctx.event().clone();
            ctx.dispatch(&mut next).map(Value::Bool)
        }).unwrap();
        let idea = realm.create(Some("idea"), &[]).unwrap();
        realm.store_mut().set_field(idea, "again", loop_h.into()).unwrap();
        let mut ev = Event::new("again").on(idea);
        assert_eq!(
            realm.dispatch(&mut ev),
            Err(HandlerError::World(WorldError::DispatchTooDeep { limit: 8 }))
        );
        assert!(realm.frames().is_empty());
    }
}
