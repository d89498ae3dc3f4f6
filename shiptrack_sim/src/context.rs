//! Simulation context implementing PlaybackContext for deterministic testing.

use async_trait::async_trait;
use shiptrack_env::PlaybackContext;
use std::cell::Cell;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

tokio::task_local! {
    /// Virtual time of the current simulated task, in nanoseconds.
    static TASK_TIME_NS: Cell<u64>;
}

/// Simulation context backed by a virtual clock.
///
/// This implements `PlaybackContext` using:
/// - A virtual clock that can be advanced manually
/// - Simulated sleep that advances virtual time and yields to the scheduler
///
/// Tasks spawned through the context each keep their own timeline, starting
/// at the shared clock's time of spawning. A sleep moves the task's timeline
/// and pulls the shared clock up to it, so concurrent sessions overlap and the
/// shared clock reads the latest point any task has reached.
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner);
        *time += duration.as_nanos() as u64;
    }

    /// Moves virtual time forward to `time_ns`; never backwards.
    fn advance_to(&self, time_ns: u64) {
        let mut time = self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner);
        *time = (*time).max(time_ns);
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.virtual_time_ns.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
        }
    }
}

#[async_trait]
impl PlaybackContext for SimContext {
    fn now(&self) -> Duration {
        let time_ns = TASK_TIME_NS
            .try_with(Cell::get)
            .unwrap_or_else(|_| self.time_ns());
        Duration::from_nanos(time_ns)
    }

    async fn sleep(&self, duration: Duration) {
        let nanos = duration.as_nanos() as u64;
        let task_time = TASK_TIME_NS.try_with(|time| {
            time.set(time.get() + nanos);
            time.get()
        });
        match task_time {
            Ok(time_ns) => self.advance_to(time_ns),
            // Outside a spawned task: the caller owns the shared clock.
            Err(_) => self.advance_time(duration),
        }
        tokio::task::yield_now().await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tracing::trace!(task = name, seed = self.seed, "Spawning simulated task");
        tokio::spawn(TASK_TIME_NS.scope(Cell::new(self.time_ns()), future));
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
