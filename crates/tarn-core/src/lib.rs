//! Core types for the Tarn simulation runtime.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental vocabulary used throughout the Tarn workspace:
//! atom handles, world time, direction flags, and the error types shared
//! by the world and engine crates.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod direction;
pub mod error;
pub mod id;

pub use direction::Direction;
pub use error::{HandlerError, StartupError, WorldError};
pub use id::{AtomId, WatcherId, WorldTime};
