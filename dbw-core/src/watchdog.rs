//! Watchdog status sources
//!
//! Every report of the by-wire kit carries a 5-bit watchdog status naming
//! which controller, and which check, tripped the watchdog. The mapping from
//! source to operator text is a lookup table rather than a branch per source.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What tripped the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchdogSource {
    #[default]
    None,
    OtherBrake,
    OtherAcceleratorPedal,
    OtherSteering,
    BrakeCounter,
    BrakeDisabled,
    BrakeCommand,
    BrakeReport,
    AcceleratorPedalCounter,
    AcceleratorPedalDisabled,
    AcceleratorPedalCommand,
    AcceleratorPedalReport,
    SteeringCounter,
    SteeringDisabled,
    SteeringCommand,
    SteeringReport,
}

/// Source and cause text, indexed by raw bus code
const SOURCE_TABLE: [(WatchdogSource, &str); 16] = [
    (WatchdogSource::None, "No watchdog event"),
    (WatchdogSource::OtherBrake, "Fault determined by brake controller"),
    (
        WatchdogSource::OtherAcceleratorPedal,
        "Fault determined by Accelerator Pedal controller",
    ),
    (WatchdogSource::OtherSteering, "Fault determined by steering controller"),
    (WatchdogSource::BrakeCounter, "Brake command counter failed to increment"),
    (
        WatchdogSource::BrakeDisabled,
        "Brake transition to disabled while in gear or moving",
    ),
    (WatchdogSource::BrakeCommand, "Brake command timeout after 100ms"),
    (WatchdogSource::BrakeReport, "Brake report timeout after 100ms"),
    (
        WatchdogSource::AcceleratorPedalCounter,
        "Accelerator Pedal command counter failed to increment",
    ),
    (
        WatchdogSource::AcceleratorPedalDisabled,
        "Accelerator Pedal transition to disabled while in gear or moving",
    ),
    (
        WatchdogSource::AcceleratorPedalCommand,
        "Accelerator Pedal command timeout after 100ms",
    ),
    (
        WatchdogSource::AcceleratorPedalReport,
        "Accelerator Pedal report timeout after 100ms",
    ),
    (
        WatchdogSource::SteeringCounter,
        "Steering command counter failed to increment",
    ),
    (
        WatchdogSource::SteeringDisabled,
        "Steering transition to disabled while in gear or moving",
    ),
    (WatchdogSource::SteeringCommand, "Steering command timeout after 100ms"),
    (WatchdogSource::SteeringReport, "Steering report timeout after 100ms"),
];

impl WatchdogSource {
    /// Decode a raw bus code; unknown codes read as `None`
    pub fn from_raw(raw: u8) -> Self {
        SOURCE_TABLE
            .get(raw as usize)
            .map(|(source, _)| *source)
            .unwrap_or(WatchdogSource::None)
    }

    /// Raw bus code
    pub fn raw(self) -> u8 {
        SOURCE_TABLE
            .iter()
            .position(|(source, _)| *source == self)
            .unwrap_or(0) as u8
    }

    /// Operator-facing cause text
    pub fn description(self) -> &'static str {
        SOURCE_TABLE[self.raw() as usize].1
    }

    pub fn is_none(self) -> bool {
        self == WatchdogSource::None
    }
}

impl fmt::Display for WatchdogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
