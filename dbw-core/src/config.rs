//! Node configuration
//!
//! Everything a [`DbwNode`](crate::DbwNode) needs at construction. All fields
//! have defaults so a partial TOML/JSON table deserializes into a usable config.

use crate::joints::AckermannGeometry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the by-wire node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbwConfig {
    /// Signal dictionary to load (None = built-in Pacifica dictionary)
    #[serde(default)]
    pub dbc_file: Option<PathBuf>,

    /// Frame of reference stamped on spatial reports
    #[serde(default = "default_frame_id")]
    pub frame_id: String,

    /// Enable/disable with the steering wheel cruise buttons
    #[serde(default = "default_true")]
    pub buttons: bool,

    /// Distance between front and rear axles (m)
    #[serde(default = "default_wheelbase")]
    pub ackermann_wheelbase: f64,

    /// Distance between left and right wheels (m)
    #[serde(default = "default_track")]
    pub ackermann_track: f64,

    /// Steering wheel angle to road wheel angle ratio
    #[serde(default = "default_steering_ratio")]
    pub steering_ratio: f64,

    /// Fail-safe sweep period in milliseconds (default: 50ms, 20 Hz)
    #[serde(default = "default_sweep_period")]
    pub sweep_period_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_frame_id() -> String {
    "base_footprint".to_string()
}

fn default_wheelbase() -> f64 {
    2.8498
}

fn default_track() -> f64 {
    1.5824
}

fn default_steering_ratio() -> f64 {
    14.8
}

fn default_sweep_period() -> u64 {
    50
}

impl Default for DbwConfig {
    fn default() -> Self {
        Self {
            dbc_file: None,
            frame_id: default_frame_id(),
            buttons: default_true(),
            ackermann_wheelbase: default_wheelbase(),
            ackermann_track: default_track(),
            steering_ratio: default_steering_ratio(),
            sweep_period_ms: default_sweep_period(),
        }
    }
}

impl DbwConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: load the signal dictionary from a DBC file
    pub fn with_dbc_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.dbc_file = Some(path.into());
        self
    }

    /// Builder method: set the frame of reference
    pub fn with_frame_id(mut self, frame_id: impl Into<String>) -> Self {
        self.frame_id = frame_id.into();
        self
    }

    /// Builder method: enable or disable the cruise buttons
    pub fn with_buttons(mut self, enabled: bool) -> Self {
        self.buttons = enabled;
        self
    }

    /// Builder method: set the Ackermann geometry
    pub fn with_geometry(mut self, wheelbase: f64, track: f64, steering_ratio: f64) -> Self {
        self.ackermann_wheelbase = wheelbase;
        self.ackermann_track = track;
        self.steering_ratio = steering_ratio;
        self
    }

    /// Builder method: set the fail-safe sweep period
    pub fn with_sweep_period_ms(mut self, period_ms: u64) -> Self {
        self.sweep_period_ms = period_ms;
        self
    }

    /// Sweep period as a Duration, never zero
    pub fn sweep_period(&self) -> Duration {
        Duration::from_millis(self.sweep_period_ms.max(1))
    }

    pub fn geometry(&self) -> AckermannGeometry {
        AckermannGeometry {
            wheelbase: self.ackermann_wheelbase,
            track: self.ackermann_track,
            steering_ratio: self.steering_ratio,
        }
    }
}
