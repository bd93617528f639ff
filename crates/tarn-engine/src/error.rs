//! Errors surfaced by the [`World`](crate::World) facade.

use std::error::Error;
use std::fmt;

use tarn_core::{StartupError, WorldError};

/// Failure of a facade operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    /// `start` was called while the world is already running.
    AlreadyRunning,
    /// The world has been dropped; its queue no longer accepts work.
    ShutDown,
    /// A worker thread could not be spawned.
    ThreadSpawnFailed {
        /// Which thread, and why.
        reason: String,
    },
    /// The consumer thread died and took the realm with it.
    ConsumerLost,
    /// A world operation was rejected.
    World(WorldError),
    /// Persisted state could not be loaded.
    Startup(StartupError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "world is already running"),
            Self::ShutDown => write!(f, "world has shut down"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
            Self::ConsumerLost => write!(f, "consumer thread was lost"),
            Self::World(e) => write!(f, "{e}"),
            Self::Startup(e) => write!(f, "state load failed: {e}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::World(e) => Some(e),
            Self::Startup(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WorldError> for EngineError {
    fn from(e: WorldError) -> Self {
        Self::World(e)
    }
}

impl From<StartupError> for EngineError {
    fn from(e: StartupError) -> Self {
        Self::Startup(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_errors_chain() {
        let err = EngineError::from(StartupError::malformed(3, "bad class"));
        assert_eq!(err.to_string(), "state load failed: line 3: bad class");
        assert!(err.source().is_some());
        assert!(EngineError::ConsumerLost.source().is_none());
    }
}
