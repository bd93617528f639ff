//! Reusable handler fixtures.
//!
//! - [`say`]: tells the actor a fixed line and reports handled.
//! - [`CountingHandler`]: counts calls and returns a fixed value.
//! - [`FailingHandler`]: succeeds N times, then fails deterministically.
//! - [`relay_after`]: posts a follow-up event after a delay.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tarn_core::HandlerError;
use tarn_world::{Ctx, Event, Handler, HandlerRef, Value};

/// Handler that tells the actor `line`.
pub fn say(name: &str, line: &'static str) -> HandlerRef {
    HandlerRef::new(name, Arc::new(move |ctx: &mut Ctx<'_>| {
        ctx.tell_actor(line)?;
        Ok(Value::Bool(true))
    }))
}

/// Handler that posts `event` (re-aimed at the current atom) after
/// `delay`.
pub fn relay_after(name: &str, event: &'static str, delay: Duration) -> HandlerRef {
    HandlerRef::new(name, Arc::new(move |ctx: &mut Ctx<'_>| {
        let mut next = Event::new(event);
        if let Some(c) = ctx.current() {
            next = next.on(c);
        }
        if let Some(a) = ctx.actor() {
            next = next.by(a);
        }
        ctx.post_after(next, delay);
        Ok(Value::Bool(true))
    }))
}

/// Counts calls and returns a fixed value.
pub struct CountingHandler {
    pub value: Value,
    calls: AtomicUsize,
}

impl CountingHandler {
    pub fn new(value: impl Into<Value>) -> Arc<Self> {
        Arc::new(Self {
            value: value.into(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Handler for CountingHandler {
    fn call(&self, _ctx: &mut Ctx<'_>) -> Result<Value, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.clone())
    }
}

/// Succeeds `succeed_count` times, then fails every call after.
///
/// Uses `AtomicUsize` for the call counter so it satisfies `Sync`.
pub struct FailingHandler {
    pub succeed_count: usize,
    call_count: AtomicUsize,
}

impl FailingHandler {
    pub fn new(succeed_count: usize) -> Arc<Self> {
        Arc::new(Self {
            succeed_count,
            call_count: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Handler for FailingHandler {
    fn call(&self, _ctx: &mut Ctx<'_>) -> Result<Value, HandlerError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        if n >= self.succeed_count {
            return Err(HandlerError::failed(format!("failing after {} calls", self.succeed_count)));
        }
        Ok(Value::Bool(true))
    }
}
