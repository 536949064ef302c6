//! Timing and naming knobs for a collaboration session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Interval between flush ticks (one animation frame).
    pub frame_interval: Duration,
    /// Delay before a selection caused by typing is broadcast.
    pub selection_debounce: Duration,
    /// Duration of the remote cursor label fade animation.
    pub label_fade: Duration,
    /// How long a remote cursor label stays visible before fading.
    pub label_hold: Duration,
    /// Prefix for generated decoration class names.
    pub class_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            selection_debounce: Duration::from_millis(500),
            label_fade: Duration::from_millis(300),
            label_hold: Duration::from_secs(1),
            class_prefix: "livecode".to_string(),
        }
    }
}
