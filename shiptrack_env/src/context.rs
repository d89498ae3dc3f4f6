//! Core environment context trait for ShipTrack playback sessions.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// The central interface for Environment Interaction.
///
/// This trait abstracts the clock and the task spawner so that the playback
/// scheduler can run against wall-clock timers in production and against a
/// virtual clock in simulation.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and `tokio::spawn`
/// - **Simulation**: `SimContext` - virtual clock advanced by `sleep()`
///
/// # Determinism
///
/// Every delay a session waits on goes through [`PlaybackContext::sleep`], so a
/// simulated context controls exactly when the next waypoint appears.
#[async_trait]
pub trait PlaybackContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    ///
    /// Each playback session runs as one named task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    /// In simulation, returns the master seed.
    fn seed(&self) -> u64;
}
