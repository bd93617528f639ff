//! Tarn: a persistent multi-user simulation runtime.
//!
//! A world is a graph of atoms linked by multiple inheritance. Properties
//! resolve along the graph; Things sit inside Containers, and Containers
//! connect through exits. Events are dispatched to handlers found by
//! property lookup, one at a time, on a single consumer thread.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Tarn sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use tarn::prelude::*;
//!
//! let mut world = World::new(EngineConfig::default()).unwrap();
//! let hall = world.create(Some("hall"), &["container"]).unwrap();
//! let lamp = world.create(Some("lamp"), &["thing"]).unwrap();
//! world.set_field(lamp, "rub", "The lamp glows.".into()).unwrap();
//! world.move_to(lamp, hall).unwrap();
//!
//! let heard: Arc<Mutex<Vec<String>>> = Arc::default();
//! let log = Arc::clone(&heard);
//! let sink = move |msg: &str, _event: Option<&Event>| log.lock().unwrap().push(msg.to_string());
//! world.watch(lamp, Box::new(sink), true).unwrap();
//!
//! assert!(world.send_now(Event::new("rub").by(lamp).on(lamp)).unwrap());
//! assert_eq!(*heard.lock().unwrap(), ["The lamp glows."]);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tarn-core` | Handles, world time, directions, error types |
//! | [`world`] | `tarn-world` | Atom store, properties, containment, exits, dispatch, persistence |
//! | [`engine`] | `tarn-engine` | Consumer and scheduler threads, the `World` facade, state files |
//! | [`logging`] | | Subscriber setup for the `tracing` output |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod logging;

/// Handles, world time, direction flags, and errors (`tarn-core`).
pub use tarn_core as types;

/// The single-threaded world model (`tarn-world`).
///
/// [`world::Realm`] owns the [`world::Store`] and the handler registry
/// and performs dispatch. Use it directly for tools and tests that need
/// no threads.
pub use tarn_world as world;

/// The running runtime (`tarn-engine`).
///
/// [`engine::World`] drives a realm from a consumer thread, with
/// [`engine::EventSender`] for producers on other threads.
pub use tarn_engine as engine;

/// Common imports for typical Tarn usage.
pub mod prelude {
    // Core types and errors
    pub use tarn_core::{AtomId, Direction, HandlerError, StartupError, WatcherId, WorldError, WorldTime};

    // World model
    pub use tarn_world::{
        AtomKind, Ctx, Event, Handler, HandlerRef, HandlerRegistry, Realm, RealmConfig, Table, Value,
        Watcher,
    };

    // Engine
    pub use tarn_engine::{EngineConfig, EngineError, EventSender, World, WorldStats};
}
