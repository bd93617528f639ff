//! Error types for the Tarn runtime.
//!
//! Organized by fault kind: graph/runtime integrity ([`WorldError`]),
//! handler execution ([`HandlerError`]), and startup/state loading
//! ([`StartupError`]).

use std::error::Error;
use std::fmt;

use crate::direction::Direction;
use crate::id::AtomId;

/// Integrity faults raised while preparing or applying a mutation.
///
/// Every check runs before the graph is touched, so an operation that
/// returns one of these has left the world exactly as it found it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorldError {
    /// The identifier is empty, too long, or contains illegal characters.
    InvalidId {
        /// The rejected identifier.
        id: String,
    },
    /// Another live atom already uses this identifier.
    DuplicateId {
        /// The identifier in use.
        id: String,
    },
    /// No live atom has this identifier.
    UnknownAtom {
        /// The identifier that was looked up.
        id: String,
    },
    /// The handle refers to a deleted atom or lies outside the arena.
    StaleAtom {
        /// The stale handle.
        atom: AtomId,
    },
    /// The atom is frozen and its inheritance edges cannot change.
    Frozen {
        /// The frozen atom.
        id: String,
    },
    /// The edge would make an atom its own ancestor.
    InheritanceCycle {
        /// The would-be child.
        child: String,
        /// The would-be parent.
        parent: String,
    },
    /// Spatial atoms (Things) can never be inherited from.
    IneligibleParent {
        /// The rejected parent.
        id: String,
    },
    /// The change would alter the concrete node type of a spatial atom.
    KindMismatch {
        /// The atom whose type would change.
        id: String,
        /// The node type the atom has.
        kind: &'static str,
    },
    /// The move would place a container inside itself.
    ContainmentCycle {
        /// The atom being moved.
        thing: String,
        /// The requested destination.
        container: String,
    },
    /// The atom cannot occupy a container.
    NotAThing {
        /// The non-spatial atom.
        id: String,
    },
    /// The atom cannot hold other atoms.
    NotAContainer {
        /// The atom that was used as a container.
        id: String,
    },
    /// System fields are computed and cannot be written.
    SystemField {
        /// The field name.
        name: String,
    },
    /// The Thing already has a lead watcher.
    LeadWatcherTaken {
        /// The watched atom.
        id: String,
    },
    /// No watcher with this handle is registered on the atom.
    UnknownWatcher {
        /// The watched atom.
        id: String,
    },
    /// The container has no exit in this direction.
    NoExit {
        /// The container.
        id: String,
        /// The direction that was queried.
        direction: Direction,
    },
    /// The direction set is empty or not a single direction where one is
    /// required.
    InvalidDirection {
        /// The rejected set.
        direction: Direction,
    },
    /// A dotted path could not be resolved.
    InvalidPath {
        /// The path text.
        path: String,
    },
    /// No handler with this name is registered.
    UnknownHandler {
        /// The handler name.
        name: String,
    },
    /// Re-entrant dispatch or property cooking nested too deeply.
    DispatchTooDeep {
        /// The limit that was exceeded.
        limit: usize,
    },
    /// A value had a different type than the operation requires.
    TypeMismatch {
        /// What was expected.
        expected: &'static str,
        /// What was found.
        found: &'static str,
    },
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId { id } => write!(f, "invalid identifier '{id}'"),
            Self::DuplicateId { id } => write!(f, "identifier '{id}' already in use"),
            Self::UnknownAtom { id } => write!(f, "no atom named '{id}'"),
            Self::StaleAtom { atom } => write!(f, "atom {atom} has been deleted"),
            Self::Frozen { id } => write!(f, "atom '{id}' is frozen"),
            Self::InheritanceCycle { child, parent } => {
                write!(f, "'{child}' cannot inherit from its descendant '{parent}'")
            }
            Self::IneligibleParent { id } => {
                write!(f, "'{id}' is a spatial atom and cannot be inherited from")
            }
            Self::KindMismatch { id, kind } => {
                write!(f, "change would alter the node type of {kind} '{id}'")
            }
            Self::ContainmentCycle { thing, container } => {
                write!(f, "'{thing}' cannot be moved inside '{container}'")
            }
            Self::NotAThing { id } => write!(f, "'{id}' is not a thing"),
            Self::NotAContainer { id } => write!(f, "'{id}' is not a container"),
            Self::SystemField { name } => write!(f, "field '{name}' is read-only"),
            Self::LeadWatcherTaken { id } => write!(f, "'{id}' already has a lead watcher"),
            Self::UnknownWatcher { id } => write!(f, "no such watcher on '{id}'"),
            Self::NoExit { id, direction } => write!(f, "'{id}' has no exit {direction}"),
            Self::InvalidDirection { direction } => write!(f, "invalid direction {direction}"),
            Self::InvalidPath { path } => write!(f, "cannot resolve path '{path}'"),
            Self::UnknownHandler { name } => write!(f, "no handler named '{name}'"),
            Self::DispatchTooDeep { limit } => {
                write!(f, "dispatch nested deeper than {limit} levels")
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
        }
    }
}

impl Error for WorldError {}

/// Failure raised by handler code during dispatch or property cooking.
///
/// Contained at the dispatch boundary: the acting actor receives a
/// diagnostic and the consumer moves on to the next event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerError {
    /// A world operation performed by the handler failed.
    World(WorldError),
    /// The handler reported a failure of its own.
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The handler panicked; the payload message is preserved.
    Panicked {
        /// The panic message, if it was a string.
        message: String,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::World(e) => write!(f, "{e}"),
            Self::Failed { reason } => write!(f, "handler failed: {reason}"),
            Self::Panicked { message } => write!(f, "handler panicked: {message}"),
        }
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::World(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WorldError> for HandlerError {
    fn from(e: WorldError) -> Self {
        Self::World(e)
    }
}

/// Faults raised while initializing a world or loading persisted state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartupError {
    /// State references an atom that is neither in the batch nor already
    /// present as a bootstrap atom.
    MissingBootstrap {
        /// The missing identifier.
        id: String,
    },
    /// The state text could not be parsed.
    Malformed {
        /// One-based line number of the offending record.
        line: usize,
        /// What was wrong with it.
        detail: String,
    },
    /// The state header names a format version this build cannot read.
    UnsupportedVersion {
        /// The version found in the header.
        found: u32,
    },
    /// Applying the state violated a graph invariant.
    World(WorldError),
}

impl StartupError {
    /// Shorthand for [`StartupError::Malformed`].
    pub fn malformed(line: usize, detail: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBootstrap { id } => write!(f, "required atom '{id}' is missing"),
            Self::Malformed { line, detail } => write!(f, "line {line}: {detail}"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported state format version {found}")
            }
            Self::World(e) => write!(f, "{e}"),
        }
    }
}

impl Error for StartupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::World(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WorldError> for StartupError {
    fn from(e: WorldError) -> Self {
        Self::World(e)
    }
}
