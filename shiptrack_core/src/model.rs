//! Shipment data model.
//!
//! A [`Shipment`] is built once from the carrier's tracking response and is
//! read-only afterwards. Its `activity` log is ordered newest-first, exactly as
//! carriers report it: index 0 is the most recent scan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PreconditionError;

/// Carrier sub-code marking the out-for-delivery trigger scan.
pub const OUT_FOR_DELIVERY_TRIGGER: &str = "OT";

// ============================================================================
// STATUS
// ============================================================================

/// Normalized status of a carrier event.
///
/// Serialized through the carrier's one or two letter status code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusType {
    /// `M` - billing information received, label printed
    LabelCreated,
    /// `MV` - billing information voided
    Voided,
    /// `P` - picked up
    Pickup,
    /// `I` - in transit
    InTransit,
    /// `O` - out for delivery
    OutForDelivery,
    /// `D` - delivered
    Delivered,
    /// `X` - exception
    Exception,
    /// `RS` - returned to shipper
    ReturnedToShipper,
    /// `NA` - not available
    NotAvailable,
    /// Any code we do not map
    Unknown(String),
}

impl StatusType {
    /// Maps a carrier status code.
    pub fn from_code(code: &str) -> Self {
        let normalized = code.trim().to_uppercase();
        match normalized.as_str() {
            "M" => StatusType::LabelCreated,
            "MV" => StatusType::Voided,
            "P" => StatusType::Pickup,
            "I" => StatusType::InTransit,
            "O" => StatusType::OutForDelivery,
            "D" => StatusType::Delivered,
            "X" => StatusType::Exception,
            "RS" => StatusType::ReturnedToShipper,
            "NA" => StatusType::NotAvailable,
            _ => StatusType::Unknown(code.to_string()),
        }
    }

    /// Returns the carrier status code.
    pub fn code(&self) -> &str {
        match self {
            StatusType::LabelCreated => "M",
            StatusType::Voided => "MV",
            StatusType::Pickup => "P",
            StatusType::InTransit => "I",
            StatusType::OutForDelivery => "O",
            StatusType::Delivered => "D",
            StatusType::Exception => "X",
            StatusType::ReturnedToShipper => "RS",
            StatusType::NotAvailable => "NA",
            StatusType::Unknown(code) => code,
        }
    }
}

impl From<String> for StatusType {
    fn from(code: String) -> Self {
        StatusType::from_code(&code)
    }
}

impl From<StatusType> for String {
    fn from(status: StatusType) -> Self {
        status.code().to_string()
    }
}

impl std::fmt::Display for StatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// EVENTS AND ADDRESSES
// ============================================================================

/// City and state of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub state: String,
}

impl Location {
    pub fn new(city: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            state: state.into(),
        }
    }
}

/// One carrier-reported tracking event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    pub status_type: StatusType,
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub description: String,
    pub location: Location,
}

impl ActivityEvent {
    /// Creates an event with no sub-code and no description.
    pub fn new(timestamp: DateTime<Utc>, status_type: StatusType, location: Location) -> Self {
        Self {
            timestamp,
            status_type,
            status_code: String::new(),
            description: String::new(),
            location,
        }
    }

    /// Sets the carrier sub-code.
    pub fn with_code(mut self, status_code: impl Into<String>) -> Self {
        self.status_code = status_code.into();
        self
    }

    /// Sets the human readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// True for the "out for delivery" trigger scan.
    pub fn is_out_for_delivery_trigger(&self) -> bool {
        self.status_code.eq_ignore_ascii_case(OUT_FOR_DELIVERY_TRIGGER)
    }

    pub fn is_delivered(&self) -> bool {
        self.status_type == StatusType::Delivered
    }
}

/// Postal address. Origins usually carry no street line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub addr1: Option<String>,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
}

impl Address {
    /// Creates a city-level address.
    pub fn new(city: impl Into<String>, state: impl Into<String>, postal_code: impl Into<String>) -> Self {
        Self {
            addr1: None,
            city: city.into(),
            state: state.into(),
            postal_code: postal_code.into(),
        }
    }

    /// Sets the street line.
    pub fn with_street(mut self, addr1: impl Into<String>) -> Self {
        self.addr1 = Some(addr1.into());
        self
    }

    /// Geocoder query for this address: street line (if any), city, state, postal code.
    pub fn query(&self) -> String {
        let parts = [
            self.addr1.as_deref().unwrap_or(""),
            &self.city,
            &self.state,
            &self.postal_code,
        ];
        parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ============================================================================
// SHIPMENT
// ============================================================================

/// Coarse delivery progress shown next to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    LabelCreated,
    InTransit,
    OutForDelivery,
    Delivered,
}

/// The playback input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub origin: Address,
    pub destination: Address,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// Newest first
    pub activity: Vec<ActivityEvent>,
}

impl Shipment {
    pub fn new(origin: Address, destination: Address, activity: Vec<ActivityEvent>) -> Self {
        Self {
            origin,
            destination,
            estimated_delivery: None,
            activity,
        }
    }

    /// Parses a shipment from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Checks everything playback relies on.
    ///
    /// # Errors
    /// * `PreconditionError::EmptyActivity` - nothing to animate
    /// * `PreconditionError::MissingOrigin` / `MissingDestination` - blank city or state
    pub fn validate(&self) -> Result<(), PreconditionError> {
        if self.activity.is_empty() {
            return Err(PreconditionError::EmptyActivity);
        }
        if self.origin.city.trim().is_empty() {
            return Err(PreconditionError::MissingOrigin("city"));
        }
        if self.origin.state.trim().is_empty() {
            return Err(PreconditionError::MissingOrigin("state"));
        }
        if self.destination.city.trim().is_empty() {
            return Err(PreconditionError::MissingDestination("city"));
        }
        if self.destination.state.trim().is_empty() {
            return Err(PreconditionError::MissingDestination("state"));
        }
        Ok(())
    }

    /// Most recent event, if any.
    pub fn latest(&self) -> Option<&ActivityEvent> {
        self.activity.first()
    }

    /// Events in chronological order (oldest first).
    pub fn history(&self) -> impl Iterator<Item = &ActivityEvent> {
        self.activity.iter().rev()
    }

    /// Progress stage derived from the most recent event.
    ///
    /// An `O` status only counts as out for delivery when it carries the
    /// trigger sub-code; other `O` scans are still in transit.
    pub fn progress(&self) -> ProgressStage {
        match self.latest() {
            Some(event) => match event.status_type {
                StatusType::Delivered => ProgressStage::Delivered,
                StatusType::OutForDelivery if event.is_out_for_delivery_trigger() => {
                    ProgressStage::OutForDelivery
                }
                StatusType::OutForDelivery | StatusType::InTransit => ProgressStage::InTransit,
                _ => ProgressStage::LabelCreated,
            },
            None => ProgressStage::LabelCreated,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.activity.iter().any(ActivityEvent::is_delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap()
    }

    fn sample() -> Shipment {
        Shipment::new(
            Address::new("Dallas", "TX", "75201"),
            Address::new("Reno", "NV", "89501").with_street("1 Main St"),
            vec![
                ActivityEvent::new(at(12), StatusType::InTransit, Location::new("Denver", "CO")),
                ActivityEvent::new(at(8), StatusType::LabelCreated, Location::new("Dallas", "TX")),
            ],
        )
    }

    #[test]
    fn test_status_type_from_code() {
        assert_eq!(StatusType::from_code("D"), StatusType::Delivered);
        assert_eq!(StatusType::from_code("i"), StatusType::InTransit);
        assert_eq!(StatusType::from_code("RS"), StatusType::ReturnedToShipper);
        assert_eq!(StatusType::from_code("DD"), StatusType::Unknown("DD".to_string()));
        assert_eq!(StatusType::from_code("DD").code(), "DD");
    }

    #[test]
    fn test_unknown_status_keeps_carrier_text() {
        assert_eq!(StatusType::from_code("kb"), StatusType::Unknown("kb".to_string()));

        let status: StatusType = serde_json::from_str(r#""kb""#).unwrap();
        assert_eq!(serde_json::to_string(&status).unwrap(), r#""kb""#);
    }

    #[test]
    fn test_address_query_skips_blank_parts() {
        let origin = Address::new("Dallas", "TX", "75201");
        assert_eq!(origin.query(), "Dallas TX 75201");

        let dest = Address::new("Reno", "NV", "").with_street("1 Main St");
        assert_eq!(dest.query(), "1 Main St Reno NV");
    }

    #[test]
    fn test_validate_rejects_empty_activity() {
        let mut shipment = sample();
        shipment.activity.clear();
        assert_eq!(shipment.validate(), Err(PreconditionError::EmptyActivity));
    }

    #[test]
    fn test_validate_rejects_blank_endpoints() {
        let mut shipment = sample();
        shipment.origin.state = "  ".to_string();
        assert_eq!(shipment.validate(), Err(PreconditionError::MissingOrigin("state")));

        let mut shipment = sample();
        shipment.destination.city.clear();
        assert_eq!(shipment.validate(), Err(PreconditionError::MissingDestination("city")));

        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_progress_requires_trigger_for_out_for_delivery() {
        let mut shipment = sample();
        assert_eq!(shipment.progress(), ProgressStage::InTransit);

        let ofd = ActivityEvent::new(at(14), StatusType::OutForDelivery, Location::new("Reno", "NV"));
        shipment.activity.insert(0, ofd.clone());
        assert_eq!(shipment.progress(), ProgressStage::InTransit);

        shipment.activity[0] = ofd.with_code("OT");
        assert_eq!(shipment.progress(), ProgressStage::OutForDelivery);

        shipment.activity.insert(
            0,
            ActivityEvent::new(at(16), StatusType::Delivered, Location::new("Reno", "NV")),
        );
        assert_eq!(shipment.progress(), ProgressStage::Delivered);
        assert!(shipment.is_delivered());
    }

    #[test]
    fn test_history_is_oldest_first() {
        let shipment = sample();
        let cities: Vec<&str> = shipment.history().map(|e| e.location.city.as_str()).collect();
        assert_eq!(cities, vec!["Dallas", "Denver"]);
    }

    #[test]
    fn test_shipment_from_json() {
        let json = r#"{
            "origin": {"city": "Dallas", "state": "TX", "postal_code": "75201"},
            "destination": {"addr1": "1 Main St", "city": "Reno", "state": "NV", "postal_code": "89501"},
            "estimated_delivery": "2024-03-06T20:00:00Z",
            "activity": [
                {"time": "2024-03-05T16:00:00Z", "status_type": "D", "status_code": "KB",
                 "description": "DELIVERED", "location": {"city": "Reno", "state": "NV"}},
                {"time": "2024-03-04T08:00:00Z", "status_type": "M",
                 "location": {"city": "Dallas", "state": "TX"}}
            ]
        }"#;

        let shipment = Shipment::from_json(json).unwrap();
        assert_eq!(shipment.activity.len(), 2);
        assert_eq!(shipment.activity[0].status_type, StatusType::Delivered);
        assert_eq!(shipment.activity[1].status_type, StatusType::LabelCreated);
        assert_eq!(shipment.activity[1].status_code, "");
        assert_eq!(shipment.destination.addr1.as_deref(), Some("1 Main St"));
        assert!(shipment.estimated_delivery.is_some());
    }
}
