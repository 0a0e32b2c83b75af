//! Editor configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default pixels per grid unit.
pub const DEFAULT_GRID_SIZE: f64 = 20.0;

/// Maximum number of undo states to keep.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Rotating default colors for new entities.
pub const DEFAULT_PALETTE: [&str; 8] = [
    "#00ff88", "#ff6b6b", "#4ecdc4", "#ffe66d", "#a8e6cf", "#ffd3b6", "#ffaaa5", "#ff8b94",
];

/// Tunables for a [`Canvas`](crate::Canvas) session.
///
/// Every field has a default, so a partial JSON object is enough:
///
/// ```
/// let config = gridsketch_core::EditorConfig::from_json(r#"{ "gridSize": 10 }"#).unwrap();
/// assert_eq!(config.grid_size, 10.0);
/// assert_eq!(config.history_capacity, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct EditorConfig {
    /// Pixels per grid unit.
    pub grid_size: f64,
    /// Undo stack capacity.
    pub history_capacity: usize,
    /// Hit-test tolerance in screen pixels (divided by zoom).
    pub hit_tolerance: f64,
    /// Distance in screen pixels under which the snap indicator is shown.
    pub snap_threshold: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Offset applied to pasted entities, in grid units.
    pub paste_offset: i64,
    /// Quiet period before a local change is pushed to the remote store.
    pub remote_debounce_ms: u64,
    /// Interval between remote store polls.
    pub remote_poll_ms: u64,
    /// Default entity colors, used round-robin.
    pub palette: Vec<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            hit_tolerance: 5.0,
            snap_threshold: 10.0,
            min_zoom: 0.1,
            max_zoom: 10.0,
            paste_offset: 1,
            remote_debounce_ms: 1000,
            remote_poll_ms: 2000,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl EditorConfig {
    /// Parse a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Replace out-of-range values with their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.grid_size.is_finite() && self.grid_size > 0.0) {
            log::warn!("invalid grid size {}, using {}", self.grid_size, defaults.grid_size);
            self.grid_size = defaults.grid_size;
        }
        if self.history_capacity == 0 {
            self.history_capacity = defaults.history_capacity;
        }
        if self.palette.is_empty() {
            self.palette = defaults.palette;
        }
        if self.min_zoom <= 0.0 || self.min_zoom > self.max_zoom {
            self.min_zoom = defaults.min_zoom;
            self.max_zoom = defaults.max_zoom;
        }
        self
    }

    pub fn remote_debounce(&self) -> Duration {
        Duration::from_millis(self.remote_debounce_ms)
    }

    pub fn remote_poll_interval(&self) -> Duration {
        Duration::from_millis(self.remote_poll_ms)
    }
}
