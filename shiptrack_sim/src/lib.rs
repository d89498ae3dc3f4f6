//! ShipTrack Deterministic Simulation Testing (DST) Harness
//!
//! Runs the playback scheduler against a virtual clock, a scripted geocoder
//! and a recording map, so every scenario replays identically from a seed.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: the virtual clock jumps forward on every sleep
//! - **Geocoding**: a fixed gazetteer with seeded fault injection
//! - **Rendering**: map calls are recorded, never drawn
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   ScenarioRunner                     │
//! │  ┌───────────────┐   ┌──────────────────────────┐    │
//! │  │  SimContext   │◄──┤   PlaybackScheduler      │    │
//! │  │ (virtual time)│   │   session │ session ...  │    │
//! │  └───────────────┘   └────┬─────────────┬───────┘    │
//! │                           │             │            │
//! │                 ┌─────────▼───┐   ┌─────▼────────┐   │
//! │                 │ Scripted    │   │ Recording    │   │
//! │                 │ Geocoder    │   │ Map          │   │
//! │                 └─────────────┘   └─────┬────────┘   │
//! │                                         │            │
//! │                              ┌──────────▼─────────┐  │
//! │                              │ Oracle (planned    │  │
//! │                              │ waypoints)         │  │
//! │                              └────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use shiptrack_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::Delivered);
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod geocoder;
mod map;
mod oracle;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use exporter::{PlaybackExport, TraceFrame};
pub use geocoder::{synthesize_coordinate, ScriptedGeocoder};
pub use map::{MapCall, MarkerRecord, RecordingMap};
pub use oracle::Oracle;
pub use runner::{ScenarioResult, ScenarioRunner};
