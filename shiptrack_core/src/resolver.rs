//! The Waypoint Resolver
//!
//! Walks the newest-first activity log backwards (oldest scan first) and
//! produces one map waypoint per call. Consecutive scans in the same city are
//! collapsed into a single stop unless the scan is the out-for-delivery trigger
//! or a delivery, which always get their own waypoint.
//!
//! The resolver is a pure function of the shipment and the scan position: no
//! I/O and no hidden state, so every decision can be tested against a literal
//! activity log.
//!
//! ```text
//!  cursor:  Origin ──► Event(len-1) ──► ... ──► Event(0) ──► Destination ──► Finished
//!                           │                      │
//!                           └──── Delivered ───────┴──────────────────────► Finished
//! ```

use shiptrack_env::MarkerIcon;

use crate::config::ZoomLevels;
use crate::model::{ActivityEvent, Shipment};

/// Where the scan is in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cursor {
    /// Nothing placed yet; the next waypoint is the origin
    Origin,

    /// Next event to consider (index into the newest-first log)
    Event(usize),

    /// Log exhausted without a delivery; the next waypoint is the destination
    Destination,

    /// Playback complete
    Finished,
}

impl Cursor {
    pub fn is_finished(&self) -> bool {
        matches!(self, Cursor::Finished)
    }
}

/// Cursor plus the last placed location, used for dedup and zoom decisions.
///
/// City and state are stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPosition {
    pub cursor: Cursor,
    pub city: String,
    pub state: String,
}

impl ScanPosition {
    /// Initial position for a shipment: before the origin, in the origin's state.
    pub fn start(shipment: &Shipment) -> Self {
        Self {
            cursor: Cursor::Origin,
            city: String::new(),
            state: shipment.origin.state.to_lowercase(),
        }
    }

    fn moved_to(&self, cursor: Cursor, city: &str, state: &str) -> Self {
        Self {
            cursor,
            city: city.to_lowercase(),
            state: state.to_lowercase(),
        }
    }

    fn with_cursor(&self, cursor: Cursor) -> Self {
        Self {
            cursor,
            ..self.clone()
        }
    }
}

/// A single resolved stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waypoint {
    /// Geocoder query
    pub address: String,

    /// Zoom to apply before panning; `None` keeps the current zoom
    pub zoom: Option<u8>,

    pub icon: MarkerIcon,

    /// No waypoint follows this one
    pub is_terminal: bool,
}

/// Output of one resolver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub waypoint: Waypoint,

    /// Position to resume from on the next call
    pub next: ScanPosition,

    /// Activity index the waypoint was taken from, if it came from the log
    pub event_index: Option<usize>,
}

/// Resolves the next waypoint.
///
/// Returns `None` once the cursor is [`Cursor::Finished`]. Never fails for a
/// shipment that passed `Shipment::validate`, and stays total even for an
/// empty log (origin straight to destination).
pub fn resolve(shipment: &Shipment, position: &ScanPosition, zoom: &ZoomLevels) -> Option<Step> {
    match position.cursor {
        Cursor::Finished => None,
        Cursor::Origin => Some(origin_step(shipment, position)),
        Cursor::Event(index) if index >= shipment.activity.len() => {
            Some(origin_step(shipment, position))
        }
        Cursor::Event(index) => Some(event_step(shipment, position, index, zoom)),
        Cursor::Destination => Some(in_transit_destination_step(shipment, position, zoom)),
    }
}

/// Resolves every waypoint from the start, without geocoding.
///
/// The result is the sequence a fault-free playback would place.
pub fn plan(shipment: &Shipment, zoom: &ZoomLevels) -> Vec<Waypoint> {
    let mut position = ScanPosition::start(shipment);
    let mut waypoints = Vec::new();

    while let Some(step) = resolve(shipment, &position, zoom) {
        let terminal = step.waypoint.is_terminal;
        waypoints.push(step.waypoint);
        position = step.next;
        if terminal {
            break;
        }
    }

    waypoints
}

fn origin_step(shipment: &Shipment, position: &ScanPosition) -> Step {
    let origin = &shipment.origin;
    let cursor = cursor_after(&shipment.activity, shipment.activity.len(), &origin.city);

    Step {
        waypoint: Waypoint {
            address: origin.query(),
            zoom: None,
            icon: MarkerIcon::Start,
            is_terminal: false,
        },
        // The label-created scan usually happens in the origin city; treat
        // the origin as the current city so it is deduped.
        next: position.moved_to(cursor, &origin.city, &origin.state),
        event_index: None,
    }
}

fn event_step(shipment: &Shipment, position: &ScanPosition, index: usize, zoom: &ZoomLevels) -> Step {
    let activity = &shipment.activity;

    let mut index = index;
    while index > 0 && is_repeat_scan(&activity[index], &position.city) {
        index -= 1;
    }

    let event = &activity[index];

    if event.is_delivered() {
        return Step {
            waypoint: destination_waypoint(shipment, zoom.street),
            next: position.with_cursor(Cursor::Finished),
            event_index: Some(index),
        };
    }

    // The newest scan repeats the current city too: nothing new to show.
    if index == 0 && is_repeat_scan(event, &position.city) {
        return in_transit_destination_step(shipment, position, zoom);
    }

    let level = if event.is_out_for_delivery_trigger() {
        zoom.local
    } else if same_place(&event.location.state, &position.state) {
        zoom.regional
    } else {
        zoom.interstate
    };

    let cursor = cursor_after(activity, index, &event.location.city);

    Step {
        waypoint: Waypoint {
            address: format!("{} {}", event.location.city, event.location.state),
            zoom: Some(level),
            icon: MarkerIcon::Route,
            is_terminal: false,
        },
        next: position.moved_to(cursor, &event.location.city, &event.location.state),
        event_index: Some(index),
    }
}

fn in_transit_destination_step(shipment: &Shipment, position: &ScanPosition, zoom: &ZoomLevels) -> Step {
    let level = if same_place(&shipment.destination.state, &position.state) {
        zoom.interstate
    } else {
        zoom.national
    };

    Step {
        waypoint: destination_waypoint(shipment, level),
        next: position.with_cursor(Cursor::Finished),
        event_index: None,
    }
}

fn destination_waypoint(shipment: &Shipment, level: u8) -> Waypoint {
    Waypoint {
        address: shipment.destination.query(),
        zoom: Some(level),
        icon: MarkerIcon::End,
        is_terminal: true,
    }
}

/// Cursor following a stop in `city` taken at `index` (the log length for the
/// origin). Goes straight to `Destination` when every newer scan would be
/// collapsed into this stop, so the stop is known to be the latest location.
fn cursor_after(activity: &[ActivityEvent], index: usize, city: &str) -> Cursor {
    if activity[..index].iter().all(|event| is_repeat_scan(event, city)) {
        Cursor::Destination
    } else {
        Cursor::Event(index - 1)
    }
}

/// Same city as the last stop and not a scan that must always be shown.
fn is_repeat_scan(event: &ActivityEvent, current_city: &str) -> bool {
    same_place(&event.location.city, current_city)
        && !event.is_out_for_delivery_trigger()
        && !event.is_delivered()
}

fn same_place(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Address, Location, StatusType};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn t(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(n)
    }

    fn scan(n: i64, status: StatusType, city: &str, state: &str) -> ActivityEvent {
        ActivityEvent::new(t(n), status, Location::new(city, state))
    }

    fn shipment(activity: Vec<ActivityEvent>) -> Shipment {
        Shipment::new(
            Address::new("Dallas", "TX", "75201"),
            Address::new("Reno", "NV", "89501").with_street("1 Main St"),
            activity,
        )
    }

    fn addresses(waypoints: &[Waypoint]) -> Vec<&str> {
        waypoints.iter().map(|w| w.address.as_str()).collect()
    }

    #[test]
    fn test_delivered_cross_country() {
        let shipment = shipment(vec![
            scan(3, StatusType::Delivered, "Reno", "NV"),
            scan(2, StatusType::InTransit, "Denver", "CO"),
            scan(1, StatusType::LabelCreated, "Dallas", "TX"),
        ]);
        let zoom = ZoomLevels::default();

        let waypoints = plan(&shipment, &zoom);
        assert_eq!(waypoints.len(), 3);

        assert_eq!(waypoints[0].address, "Dallas TX 75201");
        assert_eq!(waypoints[0].icon, MarkerIcon::Start);
        assert_eq!(waypoints[0].zoom, None);

        assert_eq!(waypoints[1].address, "Denver CO");
        assert_eq!(waypoints[1].icon, MarkerIcon::Route);
        assert_eq!(waypoints[1].zoom, Some(zoom.interstate));
        assert!(!waypoints[1].is_terminal);

        assert_eq!(waypoints[2].address, "1 Main St Reno NV 89501");
        assert_eq!(waypoints[2].icon, MarkerIcon::End);
        assert_eq!(waypoints[2].zoom, Some(zoom.street));
        assert!(waypoints[2].is_terminal);
    }

    #[test]
    fn test_origin_step_points_at_oldest_event() {
        let shipment = shipment(vec![
            scan(2, StatusType::InTransit, "Denver", "CO"),
            scan(1, StatusType::LabelCreated, "Dallas", "TX"),
        ]);
        let start = ScanPosition::start(&shipment);
        assert_eq!(start.state, "tx");

        let step = resolve(&shipment, &start, &ZoomLevels::default()).unwrap();
        assert_eq!(step.next.cursor, Cursor::Event(1));
        assert_eq!(step.next.city, "dallas");
        assert_eq!(step.event_index, None);
    }

    #[test]
    fn test_latest_stop_points_at_destination_when_rest_collapses() {
        let shipment = shipment(vec![
            scan(3, StatusType::InTransit, "Denver", "CO"),
            scan(2, StatusType::InTransit, "Denver", "CO"),
            scan(1, StatusType::LabelCreated, "Dallas", "TX"),
        ]);
        let zoom = ZoomLevels::default();

        let origin = resolve(&shipment, &ScanPosition::start(&shipment), &zoom).unwrap();
        assert_eq!(origin.next.cursor, Cursor::Event(2));

        let denver = resolve(&shipment, &origin.next, &zoom).unwrap();
        assert_eq!(denver.waypoint.address, "Denver CO");
        assert_eq!(denver.event_index, Some(1));
        assert_eq!(denver.next.cursor, Cursor::Destination);

        assert_eq!(plan(&shipment, &zoom).len(), 3);
    }

    #[test]
    fn test_origin_only_log_points_at_destination() {
        let shipment = shipment(vec![scan(1, StatusType::LabelCreated, "Dallas", "TX")]);
        let step = resolve(&shipment, &ScanPosition::start(&shipment), &ZoomLevels::default()).unwrap();
        assert_eq!(step.next.cursor, Cursor::Destination);
    }

    #[test]
    fn test_out_of_range_event_cursor_is_origin() {
        let shipment = shipment(vec![scan(1, StatusType::InTransit, "Denver", "CO")]);
        let position = ScanPosition {
            cursor: Cursor::Event(5),
            city: String::new(),
            state: "tx".to_string(),
        };
        let step = resolve(&shipment, &position, &ZoomLevels::default()).unwrap();
        assert_eq!(step.waypoint.icon, MarkerIcon::Start);
    }

    #[test]
    fn test_same_city_scans_collapse() {
        // Newest first: A and B in Tulsa, C in Amarillo.
        let shipment = shipment(vec![
            scan(3, StatusType::InTransit, "Tulsa", "OK"),
            scan(2, StatusType::InTransit, "Tulsa", "OK"),
            scan(1, StatusType::InTransit, "Amarillo", "TX"),
        ]);

        let waypoints = plan(&shipment, &ZoomLevels::default());
        assert_eq!(
            addresses(&waypoints),
            vec!["Dallas TX 75201", "Amarillo TX", "Tulsa OK", "1 Main St Reno NV 89501"]
        );
        assert_eq!(
            waypoints.iter().filter(|w| w.address == "Tulsa OK").count(),
            1
        );
    }

    #[test]
    fn test_city_match_is_case_insensitive() {
        let shipment = shipment(vec![
            scan(3, StatusType::InTransit, "DENVER", "CO"),
            scan(2, StatusType::InTransit, "Denver", "co"),
            scan(1, StatusType::LabelCreated, "dallas", "tx"),
        ]);

        let waypoints = plan(&shipment, &ZoomLevels::default());
        assert_eq!(
            addresses(&waypoints),
            vec!["Dallas TX 75201", "Denver co", "1 Main St Reno NV 89501"]
        );
    }

    #[test]
    fn test_out_for_delivery_is_never_skipped() {
        let shipment = shipment(vec![
            scan(4, StatusType::OutForDelivery, "Reno", "NV").with_code("OT"),
            scan(3, StatusType::InTransit, "Reno", "NV"),
            scan(2, StatusType::InTransit, "Denver", "CO"),
        ]);
        let zoom = ZoomLevels::default();

        let waypoints = plan(&shipment, &zoom);
        assert_eq!(
            addresses(&waypoints),
            vec!["Dallas TX 75201", "Denver CO", "Reno NV", "Reno NV", "1 Main St Reno NV 89501"]
        );
        assert_eq!(waypoints[2].zoom, Some(zoom.interstate));
        assert_eq!(waypoints[3].zoom, Some(zoom.local));
    }

    #[test]
    fn test_delivered_same_city_is_never_skipped() {
        let shipment = shipment(vec![
            scan(3, StatusType::Delivered, "Reno", "NV"),
            scan(2, StatusType::InTransit, "Reno", "NV"),
        ]);
        let zoom = ZoomLevels::default();

        let position = ScanPosition {
            cursor: Cursor::Event(0),
            city: "reno".to_string(),
            state: "nv".to_string(),
        };
        let step = resolve(&shipment, &position, &zoom).unwrap();
        assert!(step.waypoint.is_terminal);
        assert_eq!(step.waypoint.zoom, Some(zoom.street));
        assert_eq!(step.next.cursor, Cursor::Finished);
        assert_eq!(step.event_index, Some(0));
    }

    #[test]
    fn test_delivered_ends_playback_early() {
        // A late scan newer than the delivery is never reached.
        let shipment = shipment(vec![
            scan(5, StatusType::Exception, "Sparks", "NV"),
            scan(4, StatusType::Delivered, "Reno", "NV"),
            scan(3, StatusType::InTransit, "Denver", "CO"),
        ]);

        let waypoints = plan(&shipment, &ZoomLevels::default());
        assert_eq!(waypoints.len(), 3);
        assert!(waypoints.iter().all(|w| !w.address.contains("Sparks")));
    }

    #[test]
    fn test_same_state_move_uses_regional_zoom() {
        let shipment = shipment(vec![
            scan(2, StatusType::InTransit, "Austin", "TX"),
            scan(1, StatusType::InTransit, "Waco", "TX"),
        ]);
        let zoom = ZoomLevels::default();

        let waypoints = plan(&shipment, &zoom);
        assert_eq!(waypoints[1].zoom, Some(zoom.regional));
        assert_eq!(waypoints[2].zoom, Some(zoom.regional));
    }

    #[test]
    fn test_in_transit_destination_zoom() {
        let zoom = ZoomLevels::default();

        // Last scan in Nevada: destination is in the same state.
        let near = shipment(vec![scan(2, StatusType::InTransit, "Sparks", "NV")]);
        let waypoints = plan(&near, &zoom);
        let last = waypoints.last().unwrap();
        assert!(last.is_terminal);
        assert_eq!(last.icon, MarkerIcon::End);
        assert_eq!(last.zoom, Some(zoom.interstate));

        // Last scan in Colorado: zoom out further.
        let far = shipment(vec![scan(2, StatusType::InTransit, "Denver", "CO")]);
        let last = plan(&far, &zoom).pop().unwrap();
        assert_eq!(last.zoom, Some(zoom.national));
    }

    #[test]
    fn test_finished_cursor_resolves_nothing() {
        let shipment = shipment(vec![scan(1, StatusType::InTransit, "Denver", "CO")]);
        let position = ScanPosition {
            cursor: Cursor::Finished,
            city: String::new(),
            state: String::new(),
        };
        assert!(resolve(&shipment, &position, &ZoomLevels::default()).is_none());
    }

    #[test]
    fn test_empty_log_stays_total() {
        let shipment = shipment(vec![]);
        let waypoints = plan(&shipment, &ZoomLevels::default());
        assert_eq!(
            addresses(&waypoints),
            vec!["Dallas TX 75201", "1 Main St Reno NV 89501"]
        );
    }

    fn arb_event() -> impl Strategy<Value = ActivityEvent> {
        let city = prop::sample::select(vec!["Dallas", "Denver", "Reno", "Tulsa"]);
        let state = prop::sample::select(vec!["TX", "CO", "NV", "OK"]);
        let status = prop::sample::select(vec!["M", "I", "O", "D", "X"]);
        let code = prop::sample::select(vec!["", "OT", "KB"]);
        (city, state, status, code).prop_map(|(city, state, status, code)| {
            scan(0, StatusType::from_code(status), city, state).with_code(code)
        })
    }

    proptest! {
        #[test]
        fn prop_playback_terminates(activity in prop::collection::vec(arb_event(), 1..40)) {
            let shipment = shipment(activity);
            let zoom = ZoomLevels::default();
            let len = shipment.activity.len();

            let mut position = ScanPosition::start(&shipment);
            let mut calls = 0;
            // Within len + 1 calls the cursor must leave the log.
            while let Cursor::Origin | Cursor::Event(_) = position.cursor {
                let step = resolve(&shipment, &position, &zoom).unwrap();
                calls += 1;
                position = step.next;
            }
            prop_assert!(calls <= len + 1);

            let waypoints = plan(&shipment, &zoom);
            prop_assert!(waypoints.len() <= len + 2);
            prop_assert_eq!(waypoints.iter().filter(|w| w.is_terminal).count(), 1);
            prop_assert!(waypoints.last().unwrap().is_terminal);
        }

        #[test]
        fn prop_no_adjacent_duplicate_transit_stops(activity in prop::collection::vec(arb_event(), 1..40)) {
            let shipment = shipment(activity);
            let mut position = ScanPosition::start(&shipment);
            let mut previous_city = shipment.origin.city.to_lowercase();

            while let Some(step) = resolve(&shipment, &position, &ZoomLevels::default()) {
                if let Some(index) = step.event_index {
                    let event = &shipment.activity[index];
                    if !event.is_delivered() && !event.is_out_for_delivery_trigger() {
                        prop_assert_ne!(event.location.city.to_lowercase(), previous_city.clone());
                    }
                    previous_city = event.location.city.to_lowercase();
                }
                if step.waypoint.is_terminal {
                    break;
                }
                position = step.next;
            }
        }

        #[test]
        fn prop_delivered_is_always_terminal(activity in prop::collection::vec(arb_event(), 1..40)) {
            let shipment = shipment(activity);
            let mut position = ScanPosition::start(&shipment);

            while let Some(step) = resolve(&shipment, &position, &ZoomLevels::default()) {
                if let Some(index) = step.event_index {
                    if shipment.activity[index].is_delivered() {
                        prop_assert!(step.waypoint.is_terminal);
                        prop_assert_eq!(step.next.cursor, Cursor::Finished);
                    }
                }
                position = step.next;
            }
        }
    }
}
