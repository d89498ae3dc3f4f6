//! JSON exporter for playback traces.
//!
//! Dumps the map calls of a scenario run so a front end can replay the
//! animation step by step.

use crate::map::MapCall;
use crate::runner::ScenarioResult;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A single map call with its position in the trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceFrame {
    pub index: usize,

    #[serde(flatten)]
    pub call: MapCall,
}

/// Complete playback export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Virtual duration in milliseconds
    pub duration_ms: u64,

    pub waypoints_placed: usize,
    pub waypoints_skipped: usize,

    /// All map calls in order
    pub frames: Vec<TraceFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl PlaybackExport {
    /// Creates an empty export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_ms: 0,
            waypoints_placed: 0,
            waypoints_skipped: 0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Appends a map call.
    pub fn add_call(&mut self, call: MapCall) {
        let index = self.frames.len();
        self.frames.push(TraceFrame { index, call });
    }

    /// Number of markers placed in the trace.
    pub fn marker_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| matches!(f.call, MapCall::PlaceMarker { .. }))
            .count()
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

impl From<&ScenarioResult> for PlaybackExport {
    fn from(result: &ScenarioResult) -> Self {
        let mut export = Self::new(&result.scenario, result.seed);
        for call in &result.calls {
            export.add_call(call.clone());
        }
        export.duration_ms = result.virtual_time_ms;
        export.waypoints_placed = result.waypoints_placed;
        export.waypoints_skipped = result.waypoints_skipped;
        export.passed = result.passed;
        export.failure_reason = result.failure_reason.clone();
        export
    }
}
