//! Playback Scheduler - Drives one animated walk over a shipment's waypoints.
//!
//! This module connects the pure [`crate::resolver`] to the injected
//! collaborators (geocoder, map surface) and to the environment clock.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PlaybackSession                         │
//! │                                                             │
//! │   Stepping ──► AwaitingGeocode ──► Settling ──► Stepping    │
//! │      │               │                 │                    │
//! │      │          (terminal)         short delay: settle icon │
//! │      ▼               ▼              long delay: next step   │
//! │   Terminal        Terminal                                  │
//! │                                                             │
//! │   any state ── cancel() ──► Cancelled                       │
//! └─────────────────────────────────────────────────────────────┘
//!        │ geocode(address)            │ set_zoom / pan_to / place_marker
//!        ▼                             ▼
//!    Geocoder                      MapSurface
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use shiptrack_core::{Collaborators, PlaybackConfig, PlaybackScheduler};
//! use shiptrack_env::TokioContext;
//!
//! let scheduler = PlaybackScheduler::new(TokioContext::shared());
//! let handle = scheduler.start(shipment, Collaborators::new(geocoder, map), PlaybackConfig::default())?;
//!
//! // Later, e.g. when the view is closed
//! handle.cancel();
//! let report = handle.wait().await;
//! ```

use shiptrack_env::{
    Coordinate, GeocodeError, Geocoder, MapSurface, MarkerHandle, MarkerIcon, PlaybackContext,
    SessionId,
};
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PlaybackConfig;
use crate::error::PlaybackError;
use crate::model::Shipment;
use crate::resolver::{self, Cursor, ScanPosition, Waypoint};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

// ============================================================================
// STATE
// ============================================================================

/// Lifecycle of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    /// Created, not yet running
    Idle,

    /// Resolving the next waypoint
    Stepping,

    /// Waiting for the geocoder
    AwaitingGeocode,

    /// Waiting out the inter-step delays
    Settling,

    /// Last waypoint handled; absorbing
    Terminal,

    /// Stopped by `cancel()`; absorbing
    Cancelled,
}

impl PlaybackState {
    /// True for `Terminal` and `Cancelled`.
    pub fn is_final(&self) -> bool {
        matches!(self, PlaybackState::Terminal | PlaybackState::Cancelled)
    }
}

/// Mutable scan state owned by exactly one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanState {
    /// Resolver position
    pub position: ScanPosition,

    /// Marker placed by the current step, settled after the short delay.
    /// Cleared when the step's geocode fails.
    pub last_marker: Option<MarkerHandle>,

    /// Zoom the session last applied to the map
    pub zoom: u8,
}

impl ScanState {
    pub fn new(shipment: &Shipment, config: &PlaybackConfig) -> Self {
        Self {
            position: ScanPosition::start(shipment),
            last_marker: None,
            zoom: config.zoom.initial,
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    pub session: SessionId,

    /// `Terminal` or `Cancelled`
    pub final_state: PlaybackState,

    /// Markers placed on the map
    pub waypoints_placed: usize,

    /// Waypoints dropped because geocoding failed
    pub waypoints_skipped: usize,

    /// Resolver calls made
    pub steps: usize,
}

/// The external collaborators one session talks to.
pub struct Collaborators<G, M> {
    pub geocoder: Arc<G>,
    pub map: Arc<M>,
}

impl<G, M> Collaborators<G, M> {
    pub fn new(geocoder: Arc<G>, map: Arc<M>) -> Self {
        Self { geocoder, map }
    }
}

impl<G, M> Clone for Collaborators<G, M> {
    fn clone(&self) -> Self {
        Self {
            geocoder: Arc::clone(&self.geocoder),
            map: Arc::clone(&self.map),
        }
    }
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Cancellation flag serialized against side effects.
///
/// Every map mutation runs under `lock` after checking the token, and
/// `cancel()` flips the token under the same lock. Once `cancel()` returns no
/// further map call can start.
struct CancelGate {
    token: CancellationToken,
    lock: Mutex<()>,
}

impl CancelGate {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            lock: Mutex::new(()),
        }
    }

    fn cancel(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.token.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Runs `f` unless cancelled.
    fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.token.is_cancelled() {
            None
        } else {
            Some(f())
        }
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// Caller's handle on a running session.
///
/// Dropping the handle does not stop playback; call [`PlaybackHandle::cancel`].
pub struct PlaybackHandle {
    session: SessionId,
    gate: Arc<CancelGate>,
    state: watch::Receiver<PlaybackState>,
    report: oneshot::Receiver<PlaybackReport>,
}

impl PlaybackHandle {
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Current state.
    pub fn state(&self) -> PlaybackState {
        *self.state.borrow()
    }

    /// Receiver for state changes.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    /// Stops playback. No geocode or map call starts after this returns.
    ///
    /// Idempotent, and a no-op once the session is terminal.
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.gate.is_cancelled()
    }

    /// Waits for the session to reach `Terminal` or `Cancelled`.
    pub async fn wait(self) -> PlaybackReport {
        let session = self.session;
        let state = self.state;
        match self.report.await {
            Ok(report) => report,
            // Session task went away without reporting (runtime shut down).
            Err(_) => PlaybackReport {
                session,
                final_state: *state.borrow(),
                waypoints_placed: 0,
                waypoints_skipped: 0,
                steps: 0,
            },
        }
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Starts playback sessions on an environment context.
///
/// Generic over the context so that the same scheduler runs on tokio in
/// production and on a virtual clock in simulation. Sessions started from one
/// scheduler share nothing but the context.
pub struct PlaybackScheduler<Ctx>
where
    Ctx: PlaybackContext,
{
    context: Arc<Ctx>,
}

impl<Ctx> PlaybackScheduler<Ctx>
where
    Ctx: PlaybackContext,
{
    pub fn new(context: Arc<Ctx>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    /// Validates the inputs and spawns a new session.
    ///
    /// # Errors
    /// * `PlaybackError::Precondition` - empty log or missing origin/destination
    /// * `PlaybackError::Config` - invalid delays
    ///
    /// Nothing is placed on the map when this fails.
    pub fn start<G, M>(
        &self,
        shipment: Arc<Shipment>,
        collaborators: Collaborators<G, M>,
        config: PlaybackConfig,
    ) -> Result<PlaybackHandle, PlaybackError>
    where
        G: Geocoder,
        M: MapSurface,
    {
        shipment.validate()?;
        config.validate()?;

        let session_id = SessionId::new();
        let gate = Arc::new(CancelGate::new());
        let (state_tx, state_rx) = watch::channel(PlaybackState::Idle);
        let (report_tx, report_rx) = oneshot::channel();

        info!(
            session = %session_id,
            events = shipment.activity.len(),
            "Starting playback"
        );

        let session = PlaybackSession {
            id: session_id,
            context: Arc::clone(&self.context),
            scan: ScanState::new(&shipment, &config),
            shipment,
            geocoder: collaborators.geocoder,
            map: collaborators.map,
            config,
            gate: Arc::clone(&gate),
            state: state_tx,
            placed: 0,
            skipped: 0,
            steps: 0,
        };

        self.context.spawn("playback", async move {
            let report = session.run().await;
            let _ = report_tx.send(report);
        });

        Ok(PlaybackHandle {
            session: session_id,
            gate,
            state: state_rx,
            report: report_rx,
        })
    }
}

// ============================================================================
// SESSION
// ============================================================================

enum Lookup {
    Found(Coordinate),
    Failed(GeocodeError),
    Cancelled,
}

struct PlaybackSession<Ctx, G, M> {
    id: SessionId,
    context: Arc<Ctx>,
    shipment: Arc<Shipment>,
    geocoder: Arc<G>,
    map: Arc<M>,
    config: PlaybackConfig,
    gate: Arc<CancelGate>,
    state: watch::Sender<PlaybackState>,
    scan: ScanState,
    placed: usize,
    skipped: usize,
    steps: usize,
}

impl<Ctx, G, M> PlaybackSession<Ctx, G, M>
where
    Ctx: PlaybackContext,
    G: Geocoder,
    M: MapSurface,
{
    async fn run(mut self) -> PlaybackReport {
        let final_state = self.drive().await;
        self.set_state(final_state);

        info!(
            session = %self.id,
            state = ?final_state,
            placed = self.placed,
            skipped = self.skipped,
            "Playback finished"
        );

        PlaybackReport {
            session: self.id,
            final_state,
            waypoints_placed: self.placed,
            waypoints_skipped: self.skipped,
            steps: self.steps,
        }
    }

    /// Runs ticks until a final state is reached.
    async fn drive(&mut self) -> PlaybackState {
        loop {
            if self.gate.is_cancelled() {
                return PlaybackState::Cancelled;
            }

            self.set_state(PlaybackState::Stepping);
            let Some(step) = resolver::resolve(&self.shipment, &self.scan.position, &self.config.zoom)
            else {
                return PlaybackState::Terminal;
            };
            self.steps += 1;

            debug!(
                session = %self.id,
                cursor = ?self.scan.position.cursor,
                address = %step.waypoint.address,
                "Resolved waypoint"
            );

            self.set_state(PlaybackState::AwaitingGeocode);
            match self.geocode(&step.waypoint.address).await {
                Lookup::Cancelled => return PlaybackState::Cancelled,
                Lookup::Failed(err) => {
                    warn!(
                        session = %self.id,
                        address = %step.waypoint.address,
                        error = %err,
                        "Geocode failed, skipping waypoint"
                    );
                    self.skipped += 1;
                    self.scan.last_marker = None;
                }
                Lookup::Found(at) => {
                    if !self.place(&step.waypoint, at) {
                        return PlaybackState::Cancelled;
                    }
                }
            }

            // The latest known location keeps its vehicle icon.
            let latest = step.next.cursor == Cursor::Destination;
            self.scan.position = step.next;

            if step.waypoint.is_terminal {
                return PlaybackState::Terminal;
            }

            self.set_state(PlaybackState::Settling);
            let settle = self.scan.last_marker.filter(|_| !latest);
            if !self.settle(settle).await {
                return PlaybackState::Cancelled;
            }
        }
    }

    async fn geocode(&self, address: &str) -> Lookup {
        if self.gate.is_cancelled() {
            return Lookup::Cancelled;
        }

        tokio::select! {
            biased;
            _ = self.gate.token.cancelled() => Lookup::Cancelled,
            result = self.geocoder.geocode(address) => match result {
                Ok(at) => Lookup::Found(at),
                Err(err) => Lookup::Failed(err),
            },
        }
    }

    /// Zooms, pans and drops the marker, recording it as the scan's last
    /// marker. False if cancelled first.
    fn place(&mut self, waypoint: &Waypoint, at: Coordinate) -> bool {
        let zoom_change = waypoint.zoom.filter(|level| *level != self.scan.zoom);
        let map = &self.map;

        let handle = self.gate.run(|| {
            if let Some(level) = zoom_change {
                map.set_zoom(level);
            }
            map.pan_to(at);
            map.place_marker(at, waypoint.icon)
        });
        let Some(handle) = handle else {
            return false;
        };

        if let Some(level) = zoom_change {
            self.scan.zoom = level;
        }
        self.scan.last_marker = Some(handle);
        self.placed += 1;

        debug!(session = %self.id, marker = %handle, at = %at, "Placed marker");
        true
    }

    /// Waits out the step delays, swapping `marker` to its settled icon after
    /// the short one. Returns false if cancelled.
    async fn settle(&self, marker: Option<MarkerHandle>) -> bool {
        let short = self.config.short_delay();
        let rest = self.config.long_delay().saturating_sub(short);

        if !self.pause(short).await {
            return false;
        }

        if let Some(handle) = marker {
            let map = &self.map;
            if self
                .gate
                .run(|| map.update_marker_icon(handle, MarkerIcon::Settled))
                .is_none()
            {
                return false;
            }
        }

        self.pause(rest).await
    }

    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.gate.token.cancelled() => false,
            _ = self.context.sleep(duration) => true,
        }
    }

    fn set_state(&self, state: PlaybackState) {
        self.state.send_replace(state);
    }
}
