//! Settings types. JSON keys are camelCase; every section fills missing
//! keys from its `Default`.

use std::time::Duration;

use fenrelay_core::wire::{DEFAULT_SEARCH_DEPTH, MAX_SEARCH_DEPTH, MIN_SEARCH_DEPTH};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    pub engine: EngineSettings,
    pub stability: StabilitySettings,
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject combinations the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SEARCH_DEPTH..=MAX_SEARCH_DEPTH).contains(&self.engine.search_depth) {
            return Err(SettingsError::InvalidValue(format!(
                "engine.searchDepth must be within {MIN_SEARCH_DEPTH}..={MAX_SEARCH_DEPTH}, got {}",
                self.engine.search_depth
            )));
        }
        if self.engine.url.trim().is_empty() {
            return Err(SettingsError::InvalidValue("engine.url is empty".into()));
        }
        if self.engine.reconnect_delay_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "engine.reconnectDelayMs must be positive".into(),
            ));
        }
        let round = self.stability.settle_delay_ms + self.stability.confirm_delay_ms;
        if self.stability.max_wait_ms < round {
            return Err(SettingsError::InvalidValue(format!(
                "stability.maxWaitMs ({}) is shorter than one sampling round ({round})",
                self.stability.max_wait_ms
            )));
        }
        Ok(())
    }
}

/// Engine connection settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// WebSocket URL of the analysis engine.
    pub url: String,
    /// Search depth sent with every request.
    pub search_depth: u32,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay_ms: u64,
    /// How long a sent request counts as "in flight" for status display.
    pub in_flight_window_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8085".to_string(),
            search_depth: DEFAULT_SEARCH_DEPTH,
            reconnect_delay_ms: 1000,
            in_flight_window_ms: 1200,
        }
    }
}

impl EngineSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn in_flight_window(&self) -> Duration {
        Duration::from_millis(self.in_flight_window_ms)
    }
}

/// Stability detector timings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StabilitySettings {
    pub settle_delay_ms: u64,
    pub confirm_delay_ms: u64,
    pub max_wait_ms: u64,
    /// Confirm the observer's current position as soon as a session starts.
    pub prime_on_start: bool,
}

impl Default for StabilitySettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 220,
            confirm_delay_ms: 120,
            max_wait_ms: 1500,
            prime_on_start: false,
        }
    }
}

impl StabilitySettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

/// Log output settings. `RUST_LOG` still wins over `level`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
