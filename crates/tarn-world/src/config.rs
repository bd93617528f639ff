//! Dispatch limits.

use std::error::Error;
use std::fmt;

// ── RealmConfigError ──────────────────────────────────────────────

/// A dispatch limit rejected by [`RealmConfig::validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RealmConfigError {
    /// `max_dispatch_depth` is zero.
    ZeroDispatchDepth,
    /// `max_cook_depth` is zero.
    ZeroCookDepth,
}

impl fmt::Display for RealmConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroDispatchDepth => write!(f, "max_dispatch_depth must be at least 1"),
            Self::ZeroCookDepth => write!(f, "max_cook_depth must be at least 1"),
        }
    }
}

impl Error for RealmConfigError {}

// ── RealmConfig ───────────────────────────────────────────────────

/// Limits applied by a [`Realm`](crate::Realm) while dispatching events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealmConfig {
    /// Maximum nesting of dispatch and property-cooking frames before the
    /// realm raises `DispatchTooDeep`. Default: 64.
    pub max_dispatch_depth: usize,
    /// Maximum number of handlers a single cooked lookup may chain
    /// through. Default: 16.
    pub max_cook_depth: usize,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            max_dispatch_depth: 64,
            max_cook_depth: 16,
        }
    }
}

impl RealmConfig {
    /// Check that both limits are at least one.
    pub fn validate(&self) -> Result<(), RealmConfigError> {
        if self.max_dispatch_depth == 0 {
            return Err(RealmConfigError::ZeroDispatchDepth);
        }
        if self.max_cook_depth == 0 {
            return Err(RealmConfigError::ZeroCookDepth);
        }
        Ok(())
    }
}
