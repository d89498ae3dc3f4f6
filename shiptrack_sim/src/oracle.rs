//! Ground truth oracle for simulation.
//!
//! The Oracle knows what a fault-free playback of a shipment looks like,
//! computed by running the resolver alone. Simulated runs are checked against
//! it.

use shiptrack_core::{plan, Shipment, Waypoint, ZoomLevels};
use shiptrack_env::MarkerIcon;

use crate::map::MapCall;

/// Expected waypoint sequence for one shipment.
#[derive(Debug, Clone)]
pub struct Oracle {
    waypoints: Vec<Waypoint>,
}

impl Oracle {
    pub fn new(shipment: &Shipment, zoom: &ZoomLevels) -> Self {
        Self {
            waypoints: plan(shipment, zoom),
        }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn addresses(&self) -> Vec<&str> {
        self.waypoints.iter().map(|w| w.address.as_str()).collect()
    }

    /// Geocode queries must follow the expected order exactly.
    ///
    /// A cancelled session may stop early, so a prefix is accepted when
    /// `complete` is false.
    pub fn check_queries(&self, queries: &[String], complete: bool) -> Result<(), String> {
        let expected = self.addresses();
        if queries.len() > expected.len() || (complete && queries.len() != expected.len()) {
            return Err(format!(
                "expected {} geocode queries, saw {}",
                expected.len(),
                queries.len()
            ));
        }
        for (i, (got, want)) in queries.iter().zip(expected.iter()).enumerate() {
            if got != want {
                return Err(format!("query #{} was {:?}, expected {:?}", i, got, want));
            }
        }
        Ok(())
    }

    /// Icons passed to `place_marker` must be the expected icons in order,
    /// with skipped waypoints missing.
    pub fn check_placements(&self, calls: &[MapCall]) -> Result<(), String> {
        let placed: Vec<MarkerIcon> = calls
            .iter()
            .filter_map(|c| match c {
                MapCall::PlaceMarker { icon, .. } => Some(*icon),
                _ => None,
            })
            .collect();

        let mut expected = self.waypoints.iter().map(|w| w.icon);
        for icon in &placed {
            if !expected.any(|e| e == *icon) {
                return Err(format!("placed icons {:?} out of order", placed));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::delivered_shipment;
    use shiptrack_env::{Coordinate, MarkerHandle};

    fn place(icon: MarkerIcon, n: u64) -> MapCall {
        MapCall::PlaceMarker {
            at: Coordinate::new(0.0, 0.0),
            icon,
            handle: MarkerHandle(n),
        }
    }

    #[test]
    fn test_oracle_delivered_route() {
        let oracle = Oracle::new(&delivered_shipment(), &ZoomLevels::default());
        assert_eq!(
            oracle.addresses(),
            vec!["Dallas TX 75201", "Denver CO", "1 Main St Reno NV 89501"]
        );
    }

    #[test]
    fn test_check_queries_prefix() {
        let oracle = Oracle::new(&delivered_shipment(), &ZoomLevels::default());
        let partial = vec!["Dallas TX 75201".to_string()];
        assert!(oracle.check_queries(&partial, false).is_ok());
        assert!(oracle.check_queries(&partial, true).is_err());

        let wrong = vec!["Denver CO".to_string()];
        assert!(oracle.check_queries(&wrong, false).is_err());
    }

    #[test]
    fn test_check_placements_allows_gaps() {
        let oracle = Oracle::new(&delivered_shipment(), &ZoomLevels::default());
        let skipped_denver = vec![place(MarkerIcon::Start, 0), place(MarkerIcon::End, 1)];
        assert!(oracle.check_placements(&skipped_denver).is_ok());

        let reversed = vec![place(MarkerIcon::End, 0), place(MarkerIcon::Start, 1)];
        assert!(oracle.check_placements(&reversed).is_err());
    }
}
