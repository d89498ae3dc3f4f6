//! Map rendering surface abstraction.

use crate::types::{Coordinate, MarkerHandle, MarkerIcon};

/// Narrow capability interface over an interactive map.
///
/// A single surface may be shared by several playback sessions. Each session
/// only ever addresses handles returned to it by [`MapSurface::place_marker`].
///
/// ```text
/// Session                       MapSurface
///   |-- set_zoom(5) ------------->|
///   |-- pan_to(at) -------------->|
///   |-- place_marker(at, Route) ->|-- MarkerHandle
///   |        ... 750ms ...        |
///   |-- update_marker_icon(h, Settled) ->|
/// ```
pub trait MapSurface: Send + Sync + 'static {
    /// Sets the zoom level.
    fn set_zoom(&self, level: u8);

    /// Centers the view on a coordinate.
    fn pan_to(&self, at: Coordinate);

    /// Places a marker and returns a handle to it.
    fn place_marker(&self, at: Coordinate, icon: MarkerIcon) -> MarkerHandle;

    /// Replaces the icon of an existing marker.
    fn update_marker_icon(&self, handle: MarkerHandle, icon: MarkerIcon);
}
