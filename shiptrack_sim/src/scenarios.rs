//! Playback scenarios for DST.

use chrono::{DateTime, Duration, TimeZone, Utc};
use shiptrack_core::{ActivityEvent, Address, Location, Shipment, StatusType};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// PB-001: Label, one hub, delivered
    Delivered,

    /// PB-002: Still moving; playback ends at the destination sentinel
    InTransit,

    /// PB-003: Dozens of repeated hub scans collapse into a handful of stops
    NoisyLog,

    /// PB-004: Seeded geocoder outages drop waypoints, never the session
    GeocodeOutage,

    /// PB-005: Out-for-delivery scan in the destination state
    OutForDelivery,

    /// PB-006: Cancel right after the first marker
    CancelMidway,

    /// PB-007: Several sessions animating on one shared map
    ConcurrentSessions,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Delivered,
            ScenarioId::InTransit,
            ScenarioId::NoisyLog,
            ScenarioId::GeocodeOutage,
            ScenarioId::OutForDelivery,
            ScenarioId::CancelMidway,
            ScenarioId::ConcurrentSessions,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Delivered => "delivered",
            ScenarioId::InTransit => "in_transit",
            ScenarioId::NoisyLog => "noisy_log",
            ScenarioId::GeocodeOutage => "geocode_outage",
            ScenarioId::OutForDelivery => "out_for_delivery",
            ScenarioId::CancelMidway => "cancel_midway",
            ScenarioId::ConcurrentSessions => "concurrent_sessions",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Delivered => "Dallas -> Denver -> Reno, delivered: exactly three waypoints",
            ScenarioId::InTransit => "No delivery scan yet: playback ends on the destination",
            ScenarioId::NoisyLog => "Repeated same-city scans collapse into one stop each",
            ScenarioId::GeocodeOutage => "40% geocode failures: waypoints skipped, playback completes",
            ScenarioId::OutForDelivery => "Out-for-delivery scan keeps its own stop and local zoom",
            ScenarioId::CancelMidway => "Cancel after the first marker: no further map or geocode calls",
            ScenarioId::ConcurrentSessions => "Three sessions on one map, one cancelled",
        }
    }

    /// The shipment this scenario plays back.
    pub fn shipment(&self) -> Shipment {
        match self {
            ScenarioId::Delivered | ScenarioId::CancelMidway => delivered_shipment(),
            ScenarioId::InTransit => in_transit_shipment(),
            ScenarioId::NoisyLog | ScenarioId::GeocodeOutage | ScenarioId::ConcurrentSessions => {
                noisy_shipment()
            }
            ScenarioId::OutForDelivery => out_for_delivery_shipment(),
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "delivered" | "pb-001" => Ok(ScenarioId::Delivered),
            "in_transit" | "intransit" | "pb-002" => Ok(ScenarioId::InTransit),
            "noisy_log" | "noisylog" | "pb-003" => Ok(ScenarioId::NoisyLog),
            "geocode_outage" | "geocodeoutage" | "pb-004" => Ok(ScenarioId::GeocodeOutage),
            "out_for_delivery" | "outfordelivery" | "pb-005" => Ok(ScenarioId::OutForDelivery),
            "cancel_midway" | "cancelmidway" | "pb-006" => Ok(ScenarioId::CancelMidway),
            "concurrent_sessions" | "concurrentsessions" | "pb-007" => {
                Ok(ScenarioId::ConcurrentSessions)
            }
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// `hour` hours after the label was printed.
fn hours(hour: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_709_251_200, 0).single().unwrap_or_default() + Duration::hours(hour)
}

fn scan(hour: i64, code: &str, city: &str, state: &str) -> ActivityEvent {
    ActivityEvent::new(hours(hour), StatusType::from_code(code), Location::new(city, state))
}

fn dallas_to_reno(activity: Vec<ActivityEvent>) -> Shipment {
    Shipment::new(
        Address::new("Dallas", "TX", "75201"),
        Address::new("Reno", "NV", "89501").with_street("1 Main St"),
        activity,
    )
}

/// Dallas -> Denver -> Reno, delivered.
pub fn delivered_shipment() -> Shipment {
    dallas_to_reno(vec![
        scan(52, "D", "Reno", "NV").with_description("DELIVERED"),
        scan(30, "I", "Denver", "CO").with_description("ARRIVED AT FACILITY"),
        scan(2, "M", "Dallas", "TX").with_description("SHIPPER CREATED A LABEL"),
    ])
}

/// Last seen in Salt Lake City.
pub fn in_transit_shipment() -> Shipment {
    dallas_to_reno(vec![
        scan(44, "I", "Salt Lake City", "UT").with_description("DEPARTED FACILITY"),
        scan(31, "I", "Denver", "CO").with_description("DEPARTED FACILITY"),
        scan(30, "I", "Denver", "CO").with_description("ARRIVED AT FACILITY"),
        scan(2, "M", "Dallas", "TX").with_description("SHIPPER CREATED A LABEL"),
    ])
}

/// Hub-heavy log with repeated scans in most cities.
pub fn noisy_shipment() -> Shipment {
    dallas_to_reno(vec![
        scan(80, "D", "Reno", "NV").with_description("DELIVERED"),
        scan(74, "O", "Reno", "NV").with_code("OT").with_description("OUT FOR DELIVERY"),
        scan(70, "I", "Reno", "NV").with_description("ARRIVED AT FACILITY"),
        scan(66, "I", "Reno", "NV").with_description("PROCESSING AT FACILITY"),
        scan(58, "I", "Las Vegas", "NV").with_description("DEPARTED FACILITY"),
        scan(50, "I", "Las Vegas", "NV").with_description("ARRIVED AT FACILITY"),
        scan(40, "I", "Albuquerque", "NM").with_description("DEPARTED FACILITY"),
        scan(30, "I", "Amarillo", "TX").with_description("DEPARTED FACILITY"),
        scan(26, "I", "Amarillo", "TX").with_description("PROCESSING AT FACILITY"),
        scan(24, "I", "Amarillo", "TX").with_description("ARRIVED AT FACILITY"),
        scan(12, "I", "Fort Worth", "TX").with_description("DEPARTED FACILITY"),
        scan(8, "I", "Fort Worth", "TX").with_description("ARRIVED AT FACILITY"),
        scan(5, "I", "Dallas", "TX").with_description("DEPARTED FACILITY"),
        scan(4, "P", "Dallas", "TX").with_description("PICKUP SCAN"),
        scan(2, "M", "Dallas", "TX").with_description("SHIPPER CREATED A LABEL"),
    ])
}

/// Out for delivery from Sparks, not yet delivered.
pub fn out_for_delivery_shipment() -> Shipment {
    dallas_to_reno(vec![
        scan(60, "O", "Sparks", "NV").with_code("OT").with_description("OUT FOR DELIVERY"),
        scan(55, "I", "Sparks", "NV").with_description("ARRIVED AT FACILITY"),
        scan(30, "I", "Denver", "CO").with_description("DEPARTED FACILITY"),
        scan(2, "M", "Dallas", "TX").with_description("SHIPPER CREATED A LABEL"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert!("nope".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_fixtures_are_valid_and_newest_first() {
        for scenario in ScenarioId::all() {
            let shipment = scenario.shipment();
            assert!(shipment.validate().is_ok(), "{}", scenario);
            assert!(shipment
                .activity
                .windows(2)
                .all(|w| w[0].timestamp >= w[1].timestamp));
        }
    }
}
