//! Engine configuration, validation, and error types.
//!
//! [`EngineConfig`] is the builder input for a [`World`](crate::World).
//! [`validate()`](EngineConfig::validate) checks every limit at startup so
//! the worker threads never see a nonsensical configuration.

use std::error::Error;
use std::fmt;

use tarn_world::{RealmConfig, RealmConfigError};

/// Largest accepted scheduler poll interval, in milliseconds.
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`EngineConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `poll_interval_ms` is zero or above [`MAX_POLL_INTERVAL_MS`].
    InvalidPollInterval {
        /// The rejected value.
        value: u64,
    },
    /// The realm's dispatch limits are invalid.
    InvalidRealm(RealmConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPollInterval { value } => write!(
                f,
                "poll_interval_ms must be within 1..={MAX_POLL_INTERVAL_MS}, got {value}"
            ),
            Self::InvalidRealm(e) => write!(f, "invalid realm config: {e}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRealm(e) => Some(e),
            Self::InvalidPollInterval { .. } => None,
        }
    }
}

impl From<RealmConfigError> for ConfigError {
    fn from(e: RealmConfigError) -> Self {
        Self::InvalidRealm(e)
    }
}

// ── EngineConfig ───────────────────────────────────────────────────

/// Complete configuration for a [`World`](crate::World).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// How often the scheduler thread checks for matured timers, in
    /// milliseconds. Bounds how late a scheduled event can be. Default: 50.
    pub poll_interval_ms: u64,
    /// Dispatch limits for the realm.
    pub realm: RealmConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            realm: RealmConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate all limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::InvalidPollInterval {
                value: self.poll_interval_ms,
            });
        }
        self.realm.validate()?;
        Ok(())
    }
}
