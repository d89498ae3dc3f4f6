//! Recording map surface for simulation.

use serde::{Deserialize, Serialize};
use shiptrack_env::{Coordinate, MapSurface, MarkerHandle, MarkerIcon};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One call made against the map, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MapCall {
    SetZoom { level: u8 },
    PanTo { at: Coordinate },
    PlaceMarker { at: Coordinate, icon: MarkerIcon, handle: MarkerHandle },
    UpdateMarkerIcon { handle: MarkerHandle, icon: MarkerIcon },
}

/// A marker as currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub at: Coordinate,
    pub icon: MarkerIcon,
}

#[derive(Debug, Default)]
struct MapState {
    calls: Vec<MapCall>,
    markers: BTreeMap<MarkerHandle, MarkerRecord>,
    zoom: Option<u8>,
    center: Option<Coordinate>,
    next_handle: u64,
    /// Icon updates addressed to handles this map never issued
    stray_updates: usize,
}

/// A `MapSurface` that renders nothing and remembers everything.
///
/// Handles are issued from a single counter, so markers from concurrent
/// sessions never collide.
#[derive(Debug, Default)]
pub struct RecordingMap {
    state: Mutex<MapState>,
}

impl RecordingMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<MapCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Markers in placement order.
    pub fn markers(&self) -> Vec<(MarkerHandle, MarkerRecord)> {
        self.state().markers.iter().map(|(h, m)| (*h, *m)).collect()
    }

    pub fn marker_count(&self) -> usize {
        self.state().markers.len()
    }

    pub fn zoom(&self) -> Option<u8> {
        self.state().zoom
    }

    pub fn center(&self) -> Option<Coordinate> {
        self.state().center
    }

    /// Zoom levels set, in order.
    pub fn zoom_history(&self) -> Vec<u8> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                MapCall::SetZoom { level } => Some(*level),
                _ => None,
            })
            .collect()
    }

    pub fn stray_updates(&self) -> usize {
        self.state().stray_updates
    }
}

impl MapSurface for RecordingMap {
    fn set_zoom(&self, level: u8) {
        let mut state = self.state();
        state.zoom = Some(level);
        state.calls.push(MapCall::SetZoom { level });
    }

    fn pan_to(&self, at: Coordinate) {
        let mut state = self.state();
        state.center = Some(at);
        state.calls.push(MapCall::PanTo { at });
    }

    fn place_marker(&self, at: Coordinate, icon: MarkerIcon) -> MarkerHandle {
        let mut state = self.state();
        let handle = MarkerHandle(state.next_handle);
        state.next_handle += 1;
        state.markers.insert(handle, MarkerRecord { at, icon });
        state.calls.push(MapCall::PlaceMarker { at, icon, handle });
        handle
    }

    fn update_marker_icon(&self, handle: MarkerHandle, icon: MarkerIcon) {
        let mut guard = self.state();
        let state = &mut *guard;
        match state.markers.get_mut(&handle) {
            Some(marker) => marker.icon = icon,
            None => state.stray_updates += 1,
        }
        state.calls.push(MapCall::UpdateMarkerIcon { handle, icon });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_map_tracks_markers() {
        let map = RecordingMap::new();
        let dallas = Coordinate::new(32.78, -96.80);

        map.set_zoom(5);
        map.pan_to(dallas);
        let handle = map.place_marker(dallas, MarkerIcon::Start);
        map.update_marker_icon(handle, MarkerIcon::Settled);

        assert_eq!(map.call_count(), 4);
        assert_eq!(map.zoom(), Some(5));
        assert_eq!(map.center(), Some(dallas));
        assert_eq!(map.markers(), vec![(handle, MarkerRecord { at: dallas, icon: MarkerIcon::Settled })]);
        assert_eq!(map.stray_updates(), 0);
    }

    #[test]
    fn test_handles_are_unique() {
        let map = RecordingMap::new();
        let at = Coordinate::new(0.0, 0.0);
        let a = map.place_marker(at, MarkerIcon::Route);
        let b = map.place_marker(at, MarkerIcon::Route);
        assert_ne!(a, b);
        assert_eq!(map.marker_count(), 2);
    }

    #[test]
    fn test_unknown_handle_is_counted() {
        let map = RecordingMap::new();
        map.update_marker_icon(MarkerHandle(99), MarkerIcon::Settled);
        assert_eq!(map.stray_updates(), 1);
        assert_eq!(map.marker_count(), 0);
    }

    #[test]
    fn test_calls_serialize_with_op_tag() {
        let call = MapCall::SetZoom { level: 13 };
        let json = serde_json::to_string(&call).unwrap();
        assert_eq!(json, r#"{"op":"set_zoom","level":13}"#);
    }
}
