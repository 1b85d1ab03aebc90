//! Command encoding
//!
//! Each request starts from a neutral signal set. Actuation values and the
//! enable request are filled in only while the system is enabled; the clear
//! override bit is raised whenever arbitration allows it or the request asks
//! for it.

use crate::arbitration::{ArbitrationEngine, Subsystem};
use crate::codec::SignalCodec;
use crate::commands::{AcceleratorPedalCmd, BrakeCmd, GearCmd, MiscCmd, SteeringCmd, SteeringCommandType};
use crate::ids;
use crate::types::{CanFrame, Result, SignalSet};
use std::collections::HashMap;

/// Angle command limit in tenths of a degree
const STEERING_ANGLE_LIMIT_TENTHS: f64 = 5000.0;
/// Raw angle velocity range, 2 deg/s per unit
const STEERING_VELOCITY_MIN: f64 = 1.0;
const STEERING_VELOCITY_MAX: f64 = 254.0;

/// Arbitration outcome a command is encoded under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permission {
    /// Actuation allowed
    pub enabled: bool,
    /// Latched overrides may be cleared
    pub clear: bool,
}

impl Permission {
    pub fn from_engine(engine: &ArbitrationEngine) -> Self {
        Self {
            enabled: engine.enabled(),
            clear: engine.clear_requested(),
        }
    }
}

/// Builds outbound command frames
#[derive(Debug, Clone, Default)]
pub struct CommandEncoder {
    /// Last rolling counter forwarded per subsystem
    counters: HashMap<Subsystem, u8>,
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rolling counter most recently forwarded for a subsystem
    pub fn last_counter(&self, subsystem: Subsystem) -> u8 {
        self.counters.get(&subsystem).copied().unwrap_or(0)
    }

    pub fn brake<C: SignalCodec + ?Sized>(
        &mut self,
        codec: &C,
        cmd: &BrakeCmd,
        permission: Permission,
    ) -> Result<CanFrame> {
        self.counters.insert(Subsystem::Brake, cmd.rolling_counter);
        codec.encode(ids::BRAKE_CMD_NAME, &brake_signals(cmd, permission))
    }

    pub fn accelerator_pedal<C: SignalCodec + ?Sized>(
        &mut self,
        codec: &C,
        cmd: &AcceleratorPedalCmd,
        permission: Permission,
    ) -> Result<CanFrame> {
        self.counters.insert(Subsystem::AcceleratorPedal, cmd.rolling_counter);
        codec.encode(ids::ACCEL_PEDAL_CMD_NAME, &accelerator_pedal_signals(cmd, permission))
    }

    pub fn steering<C: SignalCodec + ?Sized>(
        &mut self,
        codec: &C,
        cmd: &SteeringCmd,
        permission: Permission,
    ) -> Result<CanFrame> {
        self.counters.insert(Subsystem::Steering, cmd.rolling_counter);
        codec.encode(ids::STEERING_CMD_NAME, &steering_signals(cmd, permission))
    }

    pub fn gear<C: SignalCodec + ?Sized>(
        &mut self,
        codec: &C,
        cmd: &GearCmd,
        permission: Permission,
    ) -> Result<CanFrame> {
        self.counters.insert(Subsystem::Gear, cmd.rolling_counter);
        codec.encode(ids::GEAR_CMD_NAME, &gear_signals(cmd, permission))
    }

    pub fn misc<C: SignalCodec + ?Sized>(
        &mut self,
        codec: &C,
        cmd: &MiscCmd,
        permission: Permission,
    ) -> Result<CanFrame> {
        codec.encode(ids::MISC_CMD_NAME, &misc_signals(cmd, permission))
    }

    /// Neutral frame with the clear override bit set, reusing the last counter
    pub fn neutral_clear<C: SignalCodec + ?Sized>(
        &self,
        codec: &C,
        subsystem: Subsystem,
    ) -> Result<CanFrame> {
        let counter = self.last_counter(subsystem);
        let permission = Permission {
            enabled: false,
            clear: true,
        };

        match subsystem {
            Subsystem::Brake => {
                let cmd = BrakeCmd {
                    rolling_counter: counter,
                    ..Default::default()
                };
                codec.encode(ids::BRAKE_CMD_NAME, &brake_signals(&cmd, permission))
            }
            Subsystem::AcceleratorPedal => {
                let cmd = AcceleratorPedalCmd {
                    rolling_counter: counter,
                    ..Default::default()
                };
                codec.encode(
                    ids::ACCEL_PEDAL_CMD_NAME,
                    &accelerator_pedal_signals(&cmd, permission),
                )
            }
            Subsystem::Steering => {
                let cmd = SteeringCmd {
                    rolling_counter: counter,
                    ..Default::default()
                };
                codec.encode(ids::STEERING_CMD_NAME, &steering_signals(&cmd, permission))
            }
            Subsystem::Gear => {
                let cmd = GearCmd {
                    rolling_counter: counter,
                    ..Default::default()
                };
                codec.encode(ids::GEAR_CMD_NAME, &gear_signals(&cmd, permission))
            }
        }
    }
}

pub fn brake_signals(cmd: &BrakeCmd, permission: Permission) -> SignalSet {
    let mut s = SignalSet::new();
    s.set("AKit_BrakePedalCmd", 0.0)
        .set("AKit_BrakeCtrlEnblCmd", false)
        .set("AKit_BrakePedalCtrlMode", cmd.control_mode.raw())
        .set("AKit_BrakePedalClearDriverOvrd", permission.clear || cmd.clear)
        .set("AKit_BrakeWatchdogCntr", cmd.rolling_counter);

    if permission.enabled {
        s.set("AKit_BrakePedalCmd", cmd.pedal_cmd)
            .set("AKit_BrakeCtrlEnblCmd", true);
    }
    s
}

pub fn accelerator_pedal_signals(cmd: &AcceleratorPedalCmd, permission: Permission) -> SignalSet {
    let mut s = SignalSet::new();
    s.set("AKit_AccelPdlCmd", 0.0)
        .set("AKit_AccelPdlEnblCmd", false)
        .set("AKit_AccelPdlCtrlMode", cmd.control_mode.raw())
        .set("AKit_AccelPdlClearDriverOvrd", permission.clear || cmd.clear)
        .set("Akit_AccelPdlIgnoreDriverOvrd", cmd.ignore)
        .set("AKit_AccelPdlWatchdogCntr", cmd.rolling_counter);

    if permission.enabled {
        s.set("AKit_AccelPdlCmd", cmd.pedal_cmd)
            .set("AKit_AccelPdlEnblCmd", true);
    }
    s
}

pub fn steering_signals(cmd: &SteeringCmd, permission: Permission) -> SignalSet {
    let mut s = SignalSet::new();
    s.set("AKit_SteeringWhlCmdType", 0u8)
        .set("AKit_SteeringWhlAngleCmd", 0.0)
        .set("AKit_SteeringWhlTrqCmd", 0.0)
        .set("AKit_SteeringWhlAngleVelocity", 0u8)
        .set("AKit_SteerCtrlEnblCmd", false)
        .set("AKit_SteeringWhlClearDriverOvrd", permission.clear || cmd.clear)
        .set("AKit_SteeringWhlIgnoreDriverOvrd", cmd.ignore)
        .set("AKit_SteeringWhlQuiet", cmd.quiet)
        .set("AKit_SteeringWhlCtrlMode", cmd.control_mode.raw())
        .set("AKit_SteerCmdWatchdogCntr", cmd.rolling_counter);

    if permission.enabled {
        s.set("AKit_SteeringWhlCmdType", cmd.command_type.raw());
        match cmd.command_type {
            SteeringCommandType::Angle => {
                s.set(
                    "AKit_SteeringWhlAngleCmd",
                    steering_angle_degrees(cmd.steering_wheel_angle_cmd),
                );
            }
            SteeringCommandType::Torque => {
                s.set("AKit_SteeringWhlTrqCmd", cmd.steering_wheel_torque_cmd);
            }
        }
        if let Some(velocity) = steering_velocity_raw(cmd.steering_wheel_angle_velocity) {
            s.set("AKit_SteeringWhlAngleVelocity", velocity);
        }
        s.set("AKit_SteerCtrlEnblCmd", true);
    }
    s
}

pub fn gear_signals(cmd: &GearCmd, permission: Permission) -> SignalSet {
    let gear = if permission.enabled { cmd.gear.raw() } else { 0 };
    let mut s = SignalSet::new();
    s.set("AKit_PrndStateCmd", gear)
        .set("AKit_PrndClearDriverOvrd", permission.clear || cmd.clear)
        .set("AKit_PrndCmdWatchdogCntr", cmd.rolling_counter);
    s
}

pub fn misc_signals(cmd: &MiscCmd, permission: Permission) -> SignalSet {
    let turn_signal = if permission.enabled { cmd.turn_signal.raw() } else { 0 };
    let mut s = SignalSet::new();
    s.set("AKit_TurnSignalCmd", turn_signal)
        .set("AKit_DoorToggleReq", cmd.door_request)
        .set("AKit_MiscCmdWatchdogCntr", cmd.rolling_counter);
    s
}

/// Steering wheel angle command in degrees, limited to +-500.0 in whole tenths
fn steering_angle_degrees(angle: f64) -> f64 {
    let tenths = (angle.to_degrees() * 10.0)
        .clamp(-STEERING_ANGLE_LIMIT_TENTHS, STEERING_ANGLE_LIMIT_TENTHS)
        .trunc();
    tenths / 10.0
}

/// Raw rate limit for a commanded angular rate; `None` leaves the field unset
fn steering_velocity_raw(velocity: f64) -> Option<u8> {
    (velocity.abs() > 0.0).then(|| {
        (velocity.abs().to_degrees() / 2.0)
            .round()
            .clamp(STEERING_VELOCITY_MIN, STEERING_VELOCITY_MAX) as u8
    })
}
