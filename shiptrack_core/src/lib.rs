//! ShipTrack Core - Activity Playback Engine
//!
//! Turns a carrier's newest-first tracking log into an animated walk across a
//! map:
//! 1. **Resolver**: collapses redundant scans into a finite waypoint sequence
//!    and picks a zoom level for each stop
//! 2. **Scheduler**: geocodes each waypoint, drives the map surface and paces
//!    the animation, surviving per-waypoint geocode failures
//! 3. **Cancellation**: a cancelled session makes no further collaborator calls

pub mod config;
pub mod error;
pub mod model;
pub mod playback;
pub mod resolver;

// Re-export key types for convenience
pub use config::{PlaybackConfig, ZoomLevels};
pub use error::{ConfigError, PlaybackError, PreconditionError};
pub use model::{ActivityEvent, Address, Location, ProgressStage, Shipment, StatusType};
pub use playback::{
    Collaborators, PlaybackHandle, PlaybackReport, PlaybackScheduler, PlaybackState, ScanState,
};
pub use resolver::{plan, resolve, Cursor, ScanPosition, Step, Waypoint};
