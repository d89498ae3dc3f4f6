//! Scenario runner - executes playback scenarios on the virtual clock.

use crate::context::SimContext;
use crate::geocoder::ScriptedGeocoder;
use crate::map::{MapCall, RecordingMap};
use crate::oracle::Oracle;
use crate::scenarios::{self, ScenarioId};

use shiptrack_core::{
    Collaborators, PlaybackConfig, PlaybackReport, PlaybackScheduler, PlaybackState, Shipment,
};
use shiptrack_env::{MarkerIcon, PlaybackContext};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Virtual geocoder latency used by every scenario.
const GEOCODE_LATENCY: Duration = Duration::from_millis(40);

/// Failure rate used by the outage scenario unless overridden.
const OUTAGE_FAILURE_RATE: f64 = 0.4;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario name (or shipment file for custom runs)
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Markers placed across all sessions
    pub waypoints_placed: usize,

    /// Waypoints dropped after geocode failures
    pub waypoints_skipped: usize,

    /// Virtual time consumed
    pub virtual_time_ms: u64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Map calls in order, for export
    pub calls: Vec<MapCall>,
}

impl ScenarioResult {
    fn failed(scenario: &str, seed: u64, reason: String) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            passed: false,
            waypoints_placed: 0,
            waypoints_skipped: 0,
            virtual_time_ms: 0,
            failure_reason: Some(reason),
            calls: Vec::new(),
        }
    }
}

/// What a scenario body hands back on success.
struct Outcome {
    placed: usize,
    skipped: usize,
    context: Arc<SimContext>,
    map: Arc<RecordingMap>,
}

impl Outcome {
    fn from_report(report: &PlaybackReport, context: Arc<SimContext>, map: Arc<RecordingMap>) -> Self {
        Self {
            placed: report.waypoints_placed,
            skipped: report.waypoints_skipped,
            context,
            map,
        }
    }
}

fn ensure(condition: bool, reason: impl FnOnce() -> String) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason())
    }
}

/// Runs playback scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Playback timing and zoom policy
    config: PlaybackConfig,

    /// Overrides the geocoder failure rate when set
    failure_rate: Option<f64>,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            config: PlaybackConfig::default(),
            failure_rate: None,
        }
    }

    /// Sets the playback config.
    pub fn with_config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the geocoder failure rate (0.0 - 1.0).
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = Some(rate);
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        self.block_on(scenario.name(), self.run_async(scenario))
    }

    /// Plays back an arbitrary shipment against the gazetteer geocoder.
    ///
    /// Unknown places get synthesized coordinates, so any well-formed
    /// shipment completes.
    pub fn run_shipment(&self, name: &str, shipment: Shipment) -> ScenarioResult {
        info!("Starting shipment playback: {} (seed={})", name, self.seed);
        self.block_on(name, self.run_shipment_async(name, shipment))
    }

    /// Async form of [`ScenarioRunner::run`], for callers already on a runtime.
    pub async fn run_async(&self, scenario: ScenarioId) -> ScenarioResult {
        let outcome = match scenario {
            ScenarioId::Delivered => self.run_delivered().await,
            ScenarioId::InTransit => self.run_in_transit().await,
            ScenarioId::NoisyLog => self.run_noisy_log().await,
            ScenarioId::GeocodeOutage => self.run_geocode_outage().await,
            ScenarioId::OutForDelivery => self.run_out_for_delivery().await,
            ScenarioId::CancelMidway => self.run_cancel_midway().await,
            ScenarioId::ConcurrentSessions => self.run_concurrent_sessions().await,
        };
        self.finish(scenario.name(), outcome)
    }

    pub async fn run_shipment_async(&self, name: &str, shipment: Shipment) -> ScenarioResult {
        let outcome = self.run_custom(shipment).await;
        self.finish(name, outcome)
    }

    fn block_on<F>(&self, name: &str, future: F) -> ScenarioResult
    where
        F: Future<Output = ScenarioResult>,
    {
        match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime.block_on(future),
            Err(e) => ScenarioResult::failed(name, self.seed, format!("Failed to build runtime: {}", e)),
        }
    }

    fn finish(&self, name: &str, outcome: Result<Outcome, String>) -> ScenarioResult {
        match outcome {
            Ok(outcome) => ScenarioResult {
                scenario: name.to_string(),
                seed: self.seed,
                passed: true,
                waypoints_placed: outcome.placed,
                waypoints_skipped: outcome.skipped,
                virtual_time_ms: outcome.context.now().as_millis() as u64,
                failure_reason: None,
                calls: outcome.map.calls(),
            },
            Err(reason) => ScenarioResult::failed(name, self.seed, reason),
        }
    }

    fn geocoder(&self, context: &Arc<SimContext>, failure_rate: f64) -> ScriptedGeocoder {
        ScriptedGeocoder::gazetteer(self.seed)
            .with_latency(Arc::clone(context), GEOCODE_LATENCY)
            .with_failure_rate(self.failure_rate.unwrap_or(failure_rate))
    }

    /// Starts one session and waits for it.
    async fn play(
        &self,
        context: &Arc<SimContext>,
        shipment: Shipment,
        geocoder: Arc<ScriptedGeocoder>,
        map: Arc<RecordingMap>,
    ) -> Result<PlaybackReport, String> {
        let scheduler = PlaybackScheduler::new(Arc::clone(context));
        let handle = scheduler
            .start(
                Arc::new(shipment),
                Collaborators::new(geocoder, map),
                self.config.clone(),
            )
            .map_err(|e| e.to_string())?;
        let report = handle.wait().await;
        debug!(
            "  session {} -> {:?} (placed={}, skipped={})",
            report.session, report.final_state, report.waypoints_placed, report.waypoints_skipped
        );
        Ok(report)
    }

    /// PB-001: Delivered - the canonical three stop playback.
    ///
    /// **Assertion**: Dallas (Start) -> Denver (Route, interstate zoom) ->
    /// Reno (End, street zoom), geocoded in that order, nothing after.
    async fn run_delivered(&self) -> Result<Outcome, String> {
        let context = SimContext::shared(self.seed);
        let geocoder = Arc::new(self.geocoder(&context, 0.0));
        let map = Arc::new(RecordingMap::new());
        let shipment = scenarios::delivered_shipment();
        let oracle = Oracle::new(&shipment, &self.config.zoom);

        let report = self.play(&context, shipment, geocoder.clone(), map.clone()).await?;

        ensure(report.final_state == PlaybackState::Terminal, || {
            format!("ended in {:?}", report.final_state)
        })?;
        oracle.check_queries(&geocoder.queries(), self.failure_rate.is_none())?;
        oracle.check_placements(&map.calls())?;

        if self.failure_rate.is_none() {
            ensure(report.waypoints_placed == 3, || {
                format!("expected 3 waypoints, placed {}", report.waypoints_placed)
            })?;
            let zoom = self.config.zoom;
            ensure(map.zoom_history() == vec![zoom.interstate, zoom.street], || {
                format!("unexpected zoom history {:?}", map.zoom_history())
            })?;
        }

        Ok(Outcome::from_report(&report, context, map))
    }

    /// PB-002: InTransit - log ends without a delivery.
    ///
    /// **Assertion**: every stop placed, the destination closes the
    /// sequence, and the latest scan keeps its vehicle icon.
    async fn run_in_transit(&self) -> Result<Outcome, String> {
        let context = SimContext::shared(self.seed);
        let geocoder = Arc::new(self.geocoder(&context, 0.0));
        let map = Arc::new(RecordingMap::new());
        let shipment = scenarios::in_transit_shipment();
        let oracle = Oracle::new(&shipment, &self.config.zoom);

        let report = self.play(&context, shipment, geocoder.clone(), map.clone()).await?;

        ensure(report.final_state == PlaybackState::Terminal, || {
            format!("ended in {:?}", report.final_state)
        })?;
        oracle.check_queries(&geocoder.queries(), true)?;
        oracle.check_placements(&map.calls())?;

        if report.waypoints_skipped == 0 {
            let markers = map.markers();
            ensure(markers.len() == oracle.len(), || {
                format!("expected {} markers, saw {}", oracle.len(), markers.len())
            })?;
            let icons: Vec<MarkerIcon> = markers.iter().map(|(_, m)| m.icon).collect();
            let (earlier, latest) = icons.split_at(icons.len().saturating_sub(2));
            ensure(latest == [MarkerIcon::Route, MarkerIcon::End], || {
                format!("latest stop and destination icons were {:?}", latest)
            })?;
            ensure(earlier.iter().all(|i| *i == MarkerIcon::Settled), || {
                format!("earlier stops not settled: {:?}", icons)
            })?;
        }

        Ok(Outcome::from_report(&report, context, map))
    }

    /// PB-003: NoisyLog - repeated hub scans.
    ///
    /// **Assertion**: one stop per city visit; out-for-delivery keeps its own
    /// stop even in the same city.
    async fn run_noisy_log(&self) -> Result<Outcome, String> {
        let context = SimContext::shared(self.seed);
        let geocoder = Arc::new(self.geocoder(&context, 0.0));
        let map = Arc::new(RecordingMap::new());
        let shipment = scenarios::noisy_shipment();
        let events = shipment.activity.len();
        let oracle = Oracle::new(&shipment, &self.config.zoom);

        let report = self.play(&context, shipment, geocoder.clone(), map.clone()).await?;

        ensure(report.final_state == PlaybackState::Terminal, || {
            format!("ended in {:?}", report.final_state)
        })?;
        ensure(oracle.len() < events, || {
            format!("{} waypoints for {} events, nothing collapsed", oracle.len(), events)
        })?;
        oracle.check_queries(&geocoder.queries(), true)?;
        oracle.check_placements(&map.calls())?;

        let queries = geocoder.queries();
        for city in ["Fort Worth TX", "Amarillo TX", "Las Vegas NV"] {
            let count = queries.iter().filter(|q| q.as_str() == city).count();
            ensure(count == 1, || format!("{} geocoded {} times", city, count))?;
        }

        Ok(Outcome::from_report(&report, context, map))
    }

    /// PB-004: GeocodeOutage - seeded lookup failures.
    ///
    /// **Assertion**: the session still terminates; every waypoint is
    /// attempted exactly once and is either placed or skipped.
    async fn run_geocode_outage(&self) -> Result<Outcome, String> {
        let context = SimContext::shared(self.seed);
        let geocoder = Arc::new(self.geocoder(&context, OUTAGE_FAILURE_RATE));
        let map = Arc::new(RecordingMap::new());
        let shipment = scenarios::noisy_shipment();
        let oracle = Oracle::new(&shipment, &self.config.zoom);

        let report = self.play(&context, shipment, geocoder.clone(), map.clone()).await?;

        ensure(report.final_state == PlaybackState::Terminal, || {
            format!("ended in {:?}", report.final_state)
        })?;
        ensure(report.waypoints_placed + report.waypoints_skipped == oracle.len(), || {
            format!(
                "placed {} + skipped {} != {} waypoints",
                report.waypoints_placed,
                report.waypoints_skipped,
                oracle.len()
            )
        })?;
        ensure(map.marker_count() == report.waypoints_placed, || {
            format!("{} markers on map, report says {}", map.marker_count(), report.waypoints_placed)
        })?;
        oracle.check_queries(&geocoder.queries(), true)?;
        oracle.check_placements(&map.calls())?;
        ensure(map.stray_updates() == 0, || "icon update for unknown marker".to_string())?;

        Ok(Outcome::from_report(&report, context, map))
    }

    /// PB-005: OutForDelivery - not delivered yet, out for delivery nearby.
    ///
    /// **Assertion**: zoom goes interstate -> local for the out-for-delivery
    /// stop -> interstate for the same-state destination.
    async fn run_out_for_delivery(&self) -> Result<Outcome, String> {
        let context = SimContext::shared(self.seed);
        let geocoder = Arc::new(self.geocoder(&context, 0.0));
        let map = Arc::new(RecordingMap::new());
        let shipment = scenarios::out_for_delivery_shipment();
        let oracle = Oracle::new(&shipment, &self.config.zoom);

        let report = self.play(&context, shipment, geocoder.clone(), map.clone()).await?;

        ensure(report.final_state == PlaybackState::Terminal, || {
            format!("ended in {:?}", report.final_state)
        })?;
        oracle.check_queries(&geocoder.queries(), true)?;
        oracle.check_placements(&map.calls())?;

        if report.waypoints_skipped == 0 {
            let zoom = self.config.zoom;
            let expected = vec![zoom.interstate, zoom.local, zoom.interstate];
            ensure(map.zoom_history() == expected, || {
                format!("zoom history {:?}, expected {:?}", map.zoom_history(), expected)
            })?;
        }

        Ok(Outcome::from_report(&report, context, map))
    }

    /// PB-006: CancelMidway - cancel while the first marker settles.
    ///
    /// **Assertion**: after `cancel()` returns, the map and the geocoder see
    /// no further calls, and the session reports `Cancelled`.
    async fn run_cancel_midway(&self) -> Result<Outcome, String> {
        let context = SimContext::shared(self.seed);
        let geocoder = Arc::new(self.geocoder(&context, 0.0));
        let map = Arc::new(RecordingMap::new());
        let shipment = scenarios::delivered_shipment();

        let scheduler = PlaybackScheduler::new(Arc::clone(&context));
        let handle = scheduler
            .start(
                Arc::new(shipment),
                Collaborators::new(geocoder.clone(), map.clone()),
                self.config.clone(),
            )
            .map_err(|e| e.to_string())?;

        let mut state = handle.subscribe();
        loop {
            let current = *state.borrow_and_update();
            if current == PlaybackState::Settling || current.is_final() {
                break;
            }
            if state.changed().await.is_err() {
                break;
            }
        }
        handle.cancel();

        let map_calls = map.call_count();
        let geocode_calls = geocoder.calls();
        let report = handle.wait().await;
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }

        ensure(report.final_state == PlaybackState::Cancelled, || {
            format!("ended in {:?}", report.final_state)
        })?;
        ensure(map.call_count() == map_calls, || {
            format!("map calls went {} -> {} after cancel", map_calls, map.call_count())
        })?;
        ensure(geocoder.calls() == geocode_calls, || {
            format!("geocode calls went {} -> {} after cancel", geocode_calls, geocoder.calls())
        })?;

        Ok(Outcome::from_report(&report, context, map))
    }

    /// PB-007: ConcurrentSessions - three shipments on one map.
    ///
    /// **Assertion**: sessions finish independently, one cancellation does not
    /// disturb the others, and no session touches another's markers.
    async fn run_concurrent_sessions(&self) -> Result<Outcome, String> {
        let context = SimContext::shared(self.seed);
        let map = Arc::new(RecordingMap::new());
        let scheduler = PlaybackScheduler::new(Arc::clone(&context));

        let shipments = vec![
            scenarios::noisy_shipment(),
            scenarios::delivered_shipment(),
            scenarios::in_transit_shipment(),
        ];

        let mut handles = Vec::new();
        for shipment in shipments {
            let geocoder = Arc::new(self.geocoder(&context, 0.0));
            let handle = scheduler
                .start(
                    Arc::new(shipment),
                    Collaborators::new(geocoder, map.clone()),
                    self.config.clone(),
                )
                .map_err(|e| e.to_string())?;
            handles.push(handle);
        }

        // The second session is closed before it animates anything.
        handles[1].cancel();

        let mut reports = Vec::new();
        for handle in handles {
            reports.push(handle.wait().await);
        }

        let expected = [
            PlaybackState::Terminal,
            PlaybackState::Cancelled,
            PlaybackState::Terminal,
        ];
        for (report, want) in reports.iter().zip(expected) {
            ensure(report.final_state == want, || {
                format!("session {} ended in {:?}, expected {:?}", report.session, report.final_state, want)
            })?;
        }

        let placed: usize = reports.iter().map(|r| r.waypoints_placed).sum();
        let skipped: usize = reports.iter().map(|r| r.waypoints_skipped).sum();
        ensure(map.marker_count() == placed, || {
            format!("{} markers on map, sessions placed {}", map.marker_count(), placed)
        })?;
        ensure(map.stray_updates() == 0, || "icon update for unknown marker".to_string())?;
        ensure(reports[1].waypoints_placed == 0, || {
            format!("cancelled session placed {} markers", reports[1].waypoints_placed)
        })?;

        Ok(Outcome {
            placed,
            skipped,
            context,
            map,
        })
    }

    /// Custom shipment: terminates, attempts every waypoint in order.
    async fn run_custom(&self, shipment: Shipment) -> Result<Outcome, String> {
        let context = SimContext::shared(self.seed);
        let geocoder = Arc::new(self.geocoder(&context, 0.0).synthesize_unknown(true));
        let map = Arc::new(RecordingMap::new());
        let oracle = Oracle::new(&shipment, &self.config.zoom);

        let report = self.play(&context, shipment, geocoder.clone(), map.clone()).await?;

        ensure(report.final_state == PlaybackState::Terminal, || {
            format!("ended in {:?}", report.final_state)
        })?;
        oracle.check_queries(&geocoder.queries(), true)?;
        oracle.check_placements(&map.calls())?;

        Ok(Outcome::from_report(&report, context, map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_pass() {
        let runner = ScenarioRunner::new(42);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario);
            assert!(
                result.passed,
                "{} failed: {:?}",
                scenario,
                result.failure_reason
            );
        }
    }

    #[test]
    fn test_outage_scenario_across_seeds() {
        for seed in 0..8 {
            let result = ScenarioRunner::new(seed).run(ScenarioId::GeocodeOutage);
            assert!(result.passed, "seed {}: {:?}", seed, result.failure_reason);
        }
    }

    #[test]
    fn test_delivered_scenario_places_three_markers() {
        let result = ScenarioRunner::new(1).run(ScenarioId::Delivered);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.waypoints_placed, 3);
        assert_eq!(result.waypoints_skipped, 0);

        // Two full step delays plus three geocode round trips.
        assert_eq!(result.virtual_time_ms, 2 * 1000 + 3 * 40);
    }

    #[test]
    fn test_concurrent_sessions_overlap_in_virtual_time() {
        let runner = ScenarioRunner::new(42);
        let concurrent = runner.run(ScenarioId::ConcurrentSessions);
        assert!(concurrent.passed, "{:?}", concurrent.failure_reason);

        // The noisy log is the longest of the three sessions.
        let longest = runner.run(ScenarioId::NoisyLog);
        assert_eq!(concurrent.virtual_time_ms, longest.virtual_time_ms);
    }

    #[test]
    fn test_cancel_midway_places_one_marker() {
        let result = ScenarioRunner::new(5).run(ScenarioId::CancelMidway);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.waypoints_placed, 1);
    }

    #[test]
    fn test_custom_shipment_with_unknown_cities() {
        let mut shipment = scenarios::in_transit_shipment();
        shipment.activity[0].location.city = "Elko".to_string();
        shipment.activity[0].location.state = "NV".to_string();

        let result = ScenarioRunner::new(3).run_shipment("elko", shipment);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.waypoints_skipped, 0);
    }

    #[test]
    fn test_invalid_shipment_fails_cleanly() {
        let mut shipment = scenarios::delivered_shipment();
        shipment.activity.clear();

        let result = ScenarioRunner::new(3).run_shipment("empty", shipment);
        assert!(!result.passed);
        assert!(result.calls.is_empty());
        assert!(result
            .failure_reason
            .unwrap_or_default()
            .contains("Activity log is empty"));
    }
}
