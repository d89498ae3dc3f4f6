//! ShipTrack Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seams that let the playback engine run
//! against a real map and geocoder in **Production** (tokio) and against
//! deterministic fakes in **Simulation**.
//!
//! # Core Concept: Injected Capabilities
//!
//! The engine never reaches for a global. Everything with a side effect or a
//! clock is handed in:
//! - Time (`now()`, `sleep()`, `spawn()`) via [`PlaybackContext`]
//! - Address lookup via [`Geocoder`]
//! - Marker placement, panning and zoom via [`MapSurface`]
//!
//! # Example
//!
//! ```ignore
//! use shiptrack_env::{Geocoder, MapSurface, MarkerIcon, PlaybackContext};
//!
//! async fn pin<Ctx: PlaybackContext, G: Geocoder, M: MapSurface>(
//!     ctx: &Ctx,
//!     geocoder: &G,
//!     map: &M,
//! ) {
//!     if let Ok(at) = geocoder.geocode("Denver CO").await {
//!         map.pan_to(at);
//!         map.place_marker(at, MarkerIcon::Route);
//!     }
//!     ctx.sleep(Duration::from_millis(1000)).await;
//! }
//! ```

mod context;
mod error;
mod geocode;
mod map;
mod tokio_impl;
mod types;

pub use context::PlaybackContext;
pub use error::GeocodeError;
pub use geocode::Geocoder;
pub use map::MapSurface;
pub use tokio_impl::TokioContext;
pub use types::{Coordinate, MarkerHandle, MarkerIcon, SessionId};
