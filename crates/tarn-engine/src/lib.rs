//! Concurrency core and facade for the Tarn runtime.
//!
//! One consumer thread owns the [`Realm`](tarn_world::Realm) while the
//! world runs and performs every dispatch and mutation. Any number of
//! producers feed it through a single FIFO of jobs; a scheduler thread
//! moves matured delayed events into that FIFO. [`World`] ties the pieces
//! together and exposes lifecycle, event submission, mutators, and state
//! export/import.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
mod consumer;
pub mod error;
pub mod queue;
pub mod state;
pub mod timer;
pub mod world;

pub use clock::WorldClock;
pub use config::{ConfigError, EngineConfig};
pub use error::EngineError;
pub use queue::{EventSender, WorldStats};
pub use state::{LoadedState, STATE_MAGIC, STATE_VERSION};
pub use timer::Schedule;
pub use world::World;
