//! Error taxonomy for the playback engine.
//!
//! Only precondition and configuration problems ever reach the caller. Per
//! waypoint geocoding failures are absorbed by the scheduler, and the resolver
//! cannot fail.

use thiserror::Error;

/// The shipment cannot be played back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// The activity log has no events
    #[error("Activity log is empty")]
    EmptyActivity,

    /// Origin is missing a required field
    #[error("Origin is missing its {0}")]
    MissingOrigin(&'static str),

    /// Destination is missing a required field
    #[error("Destination is missing its {0}")]
    MissingDestination(&'static str),
}

/// Invalid playback timing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Delays must be non-zero")]
    ZeroDelay,

    /// The icon swap has to happen before the next step
    #[error("Short delay ({short_ms}ms) must be shorter than long delay ({long_ms}ms)")]
    DelayOrder { short_ms: u64, long_ms: u64 },
}

/// Errors returned by `PlaybackScheduler::start`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Invalid config: {0}")]
    Config(#[from] ConfigError),
}
