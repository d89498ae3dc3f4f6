//! Playback timing and zoom policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Zoom levels used by the waypoint resolver.
///
/// Larger is closer. Defaults follow the usual web-map scale (3 = country,
/// 13 = street).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomLevels {
    /// Map zoom when playback starts
    pub initial: u8,

    /// Delivered: show the destination street
    pub street: u8,

    /// Out for delivery
    pub local: u8,

    /// New city, same state
    pub regional: u8,

    /// Crossing a state line
    pub interstate: u8,

    /// In-transit destination in another state
    pub national: u8,
}

impl Default for ZoomLevels {
    fn default() -> Self {
        Self {
            initial: 7,
            street: 13,
            local: 10,
            regional: 7,
            interstate: 5,
            national: 3,
        }
    }
}

/// Configuration for a playback session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Delay before the just-placed marker is swapped to its settled icon (default: 750)
    pub short_delay_ms: u64,

    /// Delay before the next waypoint is resolved (default: 1000)
    pub long_delay_ms: u64,

    /// Zoom policy
    pub zoom: ZoomLevels,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            short_delay_ms: 750,
            long_delay_ms: 1000,
            zoom: ZoomLevels::default(),
        }
    }
}

impl PlaybackConfig {
    pub fn short_delay(&self) -> Duration {
        Duration::from_millis(self.short_delay_ms)
    }

    pub fn long_delay(&self) -> Duration {
        Duration::from_millis(self.long_delay_ms)
    }

    /// Sets both delays.
    pub fn with_delays(mut self, short_delay_ms: u64, long_delay_ms: u64) -> Self {
        self.short_delay_ms = short_delay_ms;
        self.long_delay_ms = long_delay_ms;
        self
    }

    /// Checks the timing constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.short_delay_ms == 0 || self.long_delay_ms == 0 {
            return Err(ConfigError::ZeroDelay);
        }
        if self.short_delay_ms >= self.long_delay_ms {
            return Err(ConfigError::DelayOrder {
                short_ms: self.short_delay_ms,
                long_ms: self.long_delay_ms,
            });
        }
        Ok(())
    }
}
