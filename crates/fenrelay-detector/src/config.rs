use std::time::Duration;

use fenrelay_settings::StabilitySettings;

/// Timings for one session's stability detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StabilityConfig {
    /// Wait after a report before the first live read.
    pub settle_delay: Duration,
    /// Gap between the two reads that must agree.
    pub confirm_delay: Duration,
    /// Stop re-arming once this much time has passed since the round began.
    pub max_wait: Duration,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(220),
            confirm_delay: Duration::from_millis(120),
            max_wait: Duration::from_millis(1500),
        }
    }
}

impl From<&StabilitySettings> for StabilityConfig {
    fn from(settings: &StabilitySettings) -> Self {
        Self {
            settle_delay: settings.settle_delay(),
            confirm_delay: settings.confirm_delay(),
            max_wait: settings.max_wait(),
        }
    }
}
