//! Command requests from the upstream command source
//!
//! Every field defaults to its neutral value so a request can be deserialized
//! from a partial description.

use crate::reports::{Gear, TurnSignal};
use serde::{Deserialize, Serialize};

/// Actuator control loop selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    #[default]
    Open,
    Closed,
}

impl ControlMode {
    pub fn raw(self) -> u8 {
        match self {
            ControlMode::Open => 0,
            ControlMode::Closed => 1,
        }
    }
}

/// Steering command dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteeringCommandType {
    #[default]
    Angle,
    Torque,
}

impl SteeringCommandType {
    pub fn raw(self) -> u8 {
        match self {
            SteeringCommandType::Angle => 0,
            SteeringCommandType::Torque => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrakeCmd {
    /// Pedal command (%)
    pub pedal_cmd: f64,
    pub control_mode: ControlMode,
    /// Ask the actuator to drop a latched driver override
    pub clear: bool,
    pub rolling_counter: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceleratorPedalCmd {
    /// Pedal command (%)
    pub pedal_cmd: f64,
    pub control_mode: ControlMode,
    pub clear: bool,
    /// Keep actuating through driver pedal input
    pub ignore: bool,
    pub rolling_counter: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringCmd {
    pub command_type: SteeringCommandType,
    /// Steering wheel angle (rad)
    pub steering_wheel_angle_cmd: f64,
    /// Steering wheel rate limit (rad/s); zero leaves the actuator default
    pub steering_wheel_angle_velocity: f64,
    /// Steering wheel torque (Nm)
    pub steering_wheel_torque_cmd: f64,
    pub control_mode: ControlMode,
    pub clear: bool,
    pub ignore: bool,
    /// Suppress the actuator's driver warnings
    pub quiet: bool,
    pub rolling_counter: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GearCmd {
    pub gear: Gear,
    pub clear: bool,
    pub rolling_counter: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MiscCmd {
    pub turn_signal: TurnSignal,
    /// Raw door toggle request, forwarded whether or not the system is enabled
    pub door_request: u8,
    pub rolling_counter: u8,
}

/// Any command request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Brake(BrakeCmd),
    AcceleratorPedal(AcceleratorPedalCmd),
    Steering(SteeringCmd),
    Gear(GearCmd),
    Misc(MiscCmd),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_command_defaults() {
        let cmd: SteeringCmd =
            serde_json::from_str(r#"{"steering_wheel_angle_cmd": 0.5, "rolling_counter": 3}"#)
                .unwrap();
        assert_eq!(cmd.command_type, SteeringCommandType::Angle);
        assert_eq!(cmd.control_mode, ControlMode::Open);
        assert!(!cmd.clear);
        assert_eq!(cmd.rolling_counter, 3);
    }

    #[test]
    fn test_tagged_command() {
        let cmd: Command =
            serde_json::from_str(r#"{"command": "gear", "gear": "drive", "rolling_counter": 9}"#)
                .unwrap();
        assert_eq!(
            cmd,
            Command::Gear(GearCmd {
                gear: Gear::Drive,
                clear: false,
                rolling_counter: 9
            })
        );
    }
}
