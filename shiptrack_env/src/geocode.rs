//! Address lookup abstraction.

use async_trait::async_trait;
use crate::error::GeocodeError;
use crate::types::Coordinate;

/// Resolves a free-form postal address into a coordinate.
///
/// # Implementations
///
/// - **Production**: Wraps a geocoding web API
/// - **Simulation**: Table lookup with scripted failures and latency
///
/// # Failure
///
/// Any error is treated as "skip this waypoint" by the playback scheduler.
/// Implementations should not retry internally on its behalf.
#[async_trait]
pub trait Geocoder: Send + Sync + 'static {
    /// Looks up `address`.
    ///
    /// # Returns
    /// * `Ok(coordinate)` - First (best) match
    /// * `Err(GeocodeError)` - No match, transport failure or timeout
    async fn geocode(&self, address: &str) -> Result<Coordinate, GeocodeError>;
}
