//! Error types for the ShipTrack environment abstraction.

use thiserror::Error;

/// Failure to resolve an address into a coordinate.
///
/// The playback scheduler treats every variant the same way: the waypoint
/// is dropped and playback continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeError {
    /// The geocoder answered but had no match for the address
    #[error("No results for address: {0}")]
    NoResults(String),

    /// The lookup itself failed (connection closed, bad response, etc.)
    #[error("Geocode transport error: {0}")]
    Transport(String),

    /// Operation timed out
    #[error("Geocode timeout after {0}ms")]
    Timeout(u64),
}

impl GeocodeError {
    /// Creates a no-results error.
    pub fn no_results(address: impl Into<String>) -> Self {
        Self::NoResults(address.into())
    }

    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geocode_error_display() {
        let err = GeocodeError::no_results("1 Main St Reno NV 89501");
        assert_eq!(err.to_string(), "No results for address: 1 Main St Reno NV 89501");

        let err = GeocodeError::Timeout(250);
        assert_eq!(err.to_string(), "Geocode timeout after 250ms");
    }
}
