//! Scripted geocoder with deterministic fault injection.

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shiptrack_env::{Coordinate, GeocodeError, Geocoder, PlaybackContext};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::context::SimContext;

/// City centers used by the canned scenarios.
const GAZETTEER: &[(&str, f64, f64)] = &[
    ("albuquerque nm", 35.0844, -106.6504),
    ("amarillo tx", 35.2220, -101.8313),
    ("dallas tx", 32.7767, -96.7970),
    ("denver co", 39.7392, -104.9903),
    ("fort worth tx", 32.7555, -97.3308),
    ("las vegas nv", 36.1699, -115.1398),
    ("louisville ky", 38.2527, -85.7585),
    ("memphis tn", 35.1495, -90.0490),
    ("reno nv", 39.5296, -119.8138),
    ("salt lake city ut", 40.7608, -111.8910),
    ("sparks nv", 39.5349, -119.7527),
    ("tulsa ok", 36.1540, -95.9928),
];

/// Lower-case and collapse whitespace.
fn normalize(address: &str) -> String {
    address
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// FNV-1a, stable across runs and platforms.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Deterministic point inside the contiguous United States for `address`.
pub fn synthesize_coordinate(address: &str) -> Coordinate {
    let mut rng = ChaCha8Rng::seed_from_u64(fnv1a(normalize(address).as_bytes()));
    Coordinate::new(rng.gen_range(25.0..49.0), rng.gen_range(-124.0..-67.0))
}

/// A `Geocoder` answering from a fixed table.
///
/// Faults are injected three ways: addresses that always fail, a seeded
/// random failure rate, and virtual latency on the simulation clock.
/// A query matches the longest table key it contains, so
/// `"1 Main St Reno NV 89501"` resolves through `"reno nv"`.
pub struct ScriptedGeocoder {
    table: BTreeMap<String, Coordinate>,
    failing: HashSet<String>,
    failure_rate: f64,
    synthesize_unknown: bool,
    latency: Option<(Arc<SimContext>, Duration)>,
    rng: Mutex<ChaCha8Rng>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedGeocoder {
    /// Empty table; every query fails with `NoResults`.
    pub fn new(seed: u64) -> Self {
        Self {
            table: BTreeMap::new(),
            failing: HashSet::new(),
            failure_rate: 0.0,
            synthesize_unknown: false,
            latency: None,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Table preloaded with the scenario cities.
    pub fn gazetteer(seed: u64) -> Self {
        GAZETTEER
            .iter()
            .fold(Self::new(seed), |g, (place, lat, lon)| g.with_place(place, *lat, *lon))
    }

    pub fn with_place(mut self, place: &str, lat: f64, lon: f64) -> Self {
        self.table.insert(normalize(place), Coordinate::new(lat, lon));
        self
    }

    /// Makes every lookup of exactly `address` fail.
    pub fn fail_on(mut self, address: &str) -> Self {
        self.failing.insert(normalize(address));
        self
    }

    /// Fails this fraction of lookups (0.0 - 1.0), drawn from the seeded RNG.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Answers unknown addresses with [`synthesize_coordinate`] instead of failing.
    pub fn synthesize_unknown(mut self, enabled: bool) -> Self {
        self.synthesize_unknown = enabled;
        self
    }

    /// Delays every answer on the simulation clock.
    pub fn with_latency(mut self, context: Arc<SimContext>, latency: Duration) -> Self {
        self.latency = Some((context, latency));
        self
    }

    /// Number of lookups so far.
    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Queries in the order received.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Table lookup without fault injection.
    pub fn lookup(&self, address: &str) -> Option<Coordinate> {
        let query = normalize(address);
        if let Some(at) = self.table.get(&query) {
            return Some(*at);
        }
        self.table
            .iter()
            .filter(|(key, _)| contains_words(&query, key))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, at)| *at)
    }

    fn roll_failure(&self) -> bool {
        if self.failure_rate <= 0.0 {
            return false;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen::<f64>() < self.failure_rate
    }
}

/// True if `needle`'s words appear contiguously in `haystack`.
fn contains_words(haystack: &str, needle: &str) -> bool {
    let hay: Vec<&str> = haystack.split(' ').collect();
    let words: Vec<&str> = needle.split(' ').collect();
    !words.is_empty() && hay.windows(words.len()).any(|w| w == words.as_slice())
}

#[async_trait]
impl Geocoder for ScriptedGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinate, GeocodeError> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(address.to_string());

        if let Some((context, latency)) = &self.latency {
            context.sleep(*latency).await;
        }

        if self.failing.contains(&normalize(address)) {
            return Err(GeocodeError::transport(format!("scripted failure for {address}")));
        }
        if self.roll_failure() {
            return Err(GeocodeError::transport("simulated outage"));
        }

        match self.lookup(address) {
            Some(at) => Ok(at),
            None if self.synthesize_unknown => Ok(synthesize_coordinate(address)),
            None => Err(GeocodeError::no_results(address)),
        }
    }
}
