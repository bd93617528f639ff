//! The Tarn world model.
//!
//! Atoms form a directed acyclic inheritance graph rooted at `root`.
//! Properties resolve through that graph most-derived first, spatial
//! atoms (Things) sit inside Containers, and events are dispatched by
//! looking their name up as a property of the target. Everything here is
//! single-threaded: a [`Realm`] is owned by exactly one writer at a time,
//! and the `tarn-engine` crate supplies the threads, queue and timer that
//! drive it.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod atom;
pub mod codec;
pub mod config;
pub mod containment;
pub mod dispatch;
pub mod event;
pub mod exit;
pub mod handler;
pub mod observer;
pub mod path;
pub mod persist;
pub mod property;
pub mod realm;
mod resolve;
pub mod store;
pub mod value;

pub use atom::{Atom, AtomKind};
pub use config::{RealmConfig, RealmConfigError};
pub use containment::Walk;
pub use event::{Event, Frame, Route};
pub use exit::{ExitSlot, ExitTable, DESTINATION, OTHER_SIDE};
pub use handler::{Ctx, Handler, HandlerRef, HandlerRegistry};
pub use observer::Watcher;
pub use persist::read_section;
pub use property::SYSTEM_FIELDS;
pub use realm::{DispatchStats, Posted, Realm, CREATE_EVENT, DESTROY_EVENT, START_EVENT, STOP_EVENT};
pub use store::{validate_id, Core, Store, CONTAINER_ID, LIMBO_ID, MOBILE_ID, ROOT_ID, THING_ID};
pub use value::{Table, Value};
