//! Typed vehicle reports
//!
//! One struct per inbound report identifier. Values are physical units after
//! the signal dictionary's scaling unless a field says otherwise.

use crate::types::Timestamp;
use crate::watchdog::WatchdogSource;
use serde::{Deserialize, Serialize};

/// Transmission gear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gear {
    #[default]
    None,
    Park,
    Reverse,
    Neutral,
    Drive,
    Low,
}

impl Gear {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Gear::Park,
            2 => Gear::Reverse,
            3 => Gear::Neutral,
            4 => Gear::Drive,
            5 => Gear::Low,
            _ => Gear::None,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            Gear::None => 0,
            Gear::Park => 1,
            Gear::Reverse => 2,
            Gear::Neutral => 3,
            Gear::Drive => 4,
            Gear::Low => 5,
        }
    }
}

/// Why the vehicle refused a gear change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GearReject {
    #[default]
    None,
    ShiftInProgress,
    Override,
    RotaryLow,
    RotaryPark,
    Vehicle,
}

impl GearReject {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => GearReject::ShiftInProgress,
            2 => GearReject::Override,
            3 => GearReject::RotaryLow,
            4 => GearReject::RotaryPark,
            5 => GearReject::Vehicle,
            _ => GearReject::None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GearReject::None => "None",
            GearReject::ShiftInProgress => "Shift in progress",
            GearReject::Override => "Override on brake, Accelerator Pedal, or steering",
            GearReject::RotaryLow => "Rotary shifter can't shift to Low",
            GearReject::RotaryPark => "Rotary shifter can't shift out of Park",
            GearReject::Vehicle => "Rejected by vehicle, try pressing the brakes",
        }
    }
}

/// Turn signal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnSignal {
    #[default]
    None,
    Left,
    Right,
}

impl TurnSignal {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => TurnSignal::Left,
            2 => TurnSignal::Right,
            _ => TurnSignal::None,
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            TurnSignal::None => 0,
            TurnSignal::Left => 1,
            TurnSignal::Right => 2,
        }
    }
}

/// Which multiplexed signal group a wheel speed report was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelSpeedSource {
    /// Wheel revolutions per minute
    Rpm,
    /// Wheel angular speed in rad/s
    AngularSpeed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrakeReport {
    pub timestamp: Timestamp,
    /// Driver pedal input (%)
    pub pedal_input: f64,
    /// Pedal position feedback (%)
    pub pedal_output: f64,
    pub enabled: bool,
    pub driver: bool,
    pub watchdog_source: WatchdogSource,
    pub fault_brake_system: bool,
    pub fault_dbw_system: bool,
    pub fault_ch1: bool,
    pub fault_ch2: bool,
    pub command_timeout: bool,
    pub rolling_counter: u8,
    /// Percent of maximum brake torque
    pub torque_actual: f64,
    pub intervention_active: bool,
    pub intervention_ready: bool,
    pub parking_brake_status: u8,
    pub control_type: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcceleratorPedalReport {
    pub timestamp: Timestamp,
    pub pedal_input: f64,
    pub pedal_output: f64,
    pub enabled: bool,
    pub ignore_driver: bool,
    pub driver: bool,
    pub torque_actual: f64,
    pub control_type: u8,
    pub rolling_counter: u8,
    pub watchdog_source: WatchdogSource,
    pub fault_accel_pedal_system: bool,
    pub fault_dbw_system: bool,
    pub fault_ch1: bool,
    pub fault_ch2: bool,
    pub command_timeout: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SteeringReport {
    pub timestamp: Timestamp,
    /// Steering wheel angle (rad)
    pub steering_wheel_angle: f64,
    /// Commanded steering wheel angle (rad)
    pub steering_wheel_angle_cmd: f64,
    /// Steering wheel torque (Nm)
    pub steering_wheel_torque: f64,
    pub enabled: bool,
    pub driver_override: bool,
    pub fault_steering_system: bool,
    pub fault_calibration: bool,
    /// Watchdog fault as seen by the arbitration engine after this report
    pub fault_dbw_system: bool,
    pub watchdog_source: WatchdogSource,
    pub command_timeout: bool,
    pub rolling_counter: u8,
    pub control_type: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GearReport {
    pub timestamp: Timestamp,
    pub state: Gear,
    pub enabled: bool,
    pub driver_override: bool,
    pub fault_gear_select_system: bool,
    /// Present only when the frame carried the full payload
    pub reject: Option<GearReject>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WheelSpeedReport {
    pub timestamp: Timestamp,
    /// None when the multiplexer selected neither group; speeds then read zero
    pub source: Option<WheelSpeedSource>,
    pub front_left: f64,
    pub front_right: f64,
    pub rear_left: f64,
    pub rear_right: f64,
}

impl WheelSpeedReport {
    /// Wheel angular speeds in rad/s, in FL, FR, RL, RR order
    pub fn angular_speeds(&self) -> [f64; 4] {
        let scale = match self.source {
            Some(WheelSpeedSource::Rpm) => 2.0 * std::f64::consts::PI / 60.0,
            _ => 1.0,
        };
        [
            self.front_left * scale,
            self.front_right * scale,
            self.rear_left * scale,
            self.rear_right * scale,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WheelPositionReport {
    pub timestamp: Timestamp,
    pub front_left: u16,
    pub front_right: u16,
    pub rear_left: u16,
    pub rear_right: u16,
    pub wheel_pulses_per_rev: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TirePressureReport {
    pub timestamp: Timestamp,
    /// kPa
    pub front_left: u16,
    pub front_right: u16,
    pub rear_left: u16,
    pub rear_right: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurroundReport {
    pub timestamp: Timestamp,
    /// m
    pub front_radar_object_distance: f64,
    /// m
    pub rear_radar_object_distance: f64,
    pub front_radar_distance_valid: bool,
    pub parking_sonar_data_valid: bool,
    pub front_left: u8,
    pub front_center: u8,
    pub front_right: u8,
    pub rear_left: u8,
    pub rear_center: u8,
    pub rear_right: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImuReport {
    pub timestamp: Timestamp,
    pub frame_id: String,
    /// rad/s
    pub yaw_rate: f64,
    /// m/s^2
    pub accel_x: f64,
    /// m/s^2
    pub accel_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverInputReport {
    pub timestamp: Timestamp,
    pub turn_signal: TurnSignal,
    pub high_beam_headlights: u8,
    pub wiper: u8,
    pub cruise_resume_button: bool,
    pub cruise_cancel_button: bool,
    pub cruise_accel_button: bool,
    pub cruise_decel_button: bool,
    pub cruise_on_off_button: bool,
    pub adaptive_cruise_on_off_button: bool,
    pub adaptive_cruise_increase_distance_button: bool,
    pub adaptive_cruise_decrease_distance_button: bool,
    pub door_or_hood_ajar: bool,
    pub airbag_deployed: bool,
    pub any_seatbelt_unbuckled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MiscReport {
    pub timestamp: Timestamp,
    /// %
    pub fuel_level: f64,
    pub drive_by_wire_enabled: bool,
    pub by_wire_ready: bool,
    pub general_actuator_fault: bool,
    pub general_driver_activity: bool,
    pub comms_fault: bool,
    /// m/s
    pub vehicle_speed: f64,
    pub software_build_number: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowVoltageSystemReport {
    pub timestamp: Timestamp,
    pub vehicle_battery_volts: f64,
    pub vehicle_battery_current: f64,
    pub vehicle_alternator_current: f64,
    pub aux_battery_volts: f64,
    pub aux_dcdc_current: f64,
    pub aux_battery_contactor: bool,
    pub aux_inverter_contactor: bool,
}

/// A decoded report of any kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "report", rename_all = "snake_case")]
pub enum Report {
    Brake(BrakeReport),
    AcceleratorPedal(AcceleratorPedalReport),
    Steering(SteeringReport),
    Gear(GearReport),
    WheelSpeed(WheelSpeedReport),
    WheelPosition(WheelPositionReport),
    TirePressure(TirePressureReport),
    Surround(SurroundReport),
    Imu(ImuReport),
    DriverInput(DriverInputReport),
    Misc(MiscReport),
    LowVoltageSystem(LowVoltageSystemReport),
}

impl Report {
    pub fn name(&self) -> &'static str {
        match self {
            Report::Brake(_) => "brake",
            Report::AcceleratorPedal(_) => "accelerator_pedal",
            Report::Steering(_) => "steering",
            Report::Gear(_) => "gear",
            Report::WheelSpeed(_) => "wheel_speed",
            Report::WheelPosition(_) => "wheel_position",
            Report::TirePressure(_) => "tire_pressure",
            Report::Surround(_) => "surround",
            Report::Imu(_) => "imu",
            Report::DriverInput(_) => "driver_input",
            Report::Misc(_) => "misc",
            Report::LowVoltageSystem(_) => "low_voltage_system",
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Report::Brake(r) => r.timestamp,
            Report::AcceleratorPedal(r) => r.timestamp,
            Report::Steering(r) => r.timestamp,
            Report::Gear(r) => r.timestamp,
            Report::WheelSpeed(r) => r.timestamp,
            Report::WheelPosition(r) => r.timestamp,
            Report::TirePressure(r) => r.timestamp,
            Report::Surround(r) => r.timestamp,
            Report::Imu(r) => r.timestamp,
            Report::DriverInput(r) => r.timestamp,
            Report::Misc(r) => r.timestamp,
            Report::LowVoltageSystem(r) => r.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_gear_codes() {
        for raw in 0..=5 {
            assert_eq!(Gear::from_raw(raw).raw(), raw);
        }
        assert_eq!(Gear::from_raw(7), Gear::None);
        assert_eq!(GearReject::from_raw(4), GearReject::RotaryPark);
        assert_eq!(
            GearReject::Vehicle.description(),
            "Rejected by vehicle, try pressing the brakes"
        );
    }

    #[test]
    fn test_rpm_converted_to_rad_per_second() {
        let report = WheelSpeedReport {
            timestamp: Utc::now(),
            source: Some(WheelSpeedSource::Rpm),
            front_left: 60.0,
            front_right: 0.0,
            rear_left: -30.0,
            rear_right: 0.0,
        };
        let speeds = report.angular_speeds();
        assert!((speeds[0] - 2.0 * std::f64::consts::PI).abs() < 1e-12);
        assert!((speeds[2] + std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_report_serializes_with_tag() {
        let report = Report::TirePressure(TirePressureReport {
            timestamp: Utc::now(),
            front_left: 240,
            front_right: 241,
            rear_left: 238,
            rear_right: 239,
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["report"], "tire_pressure");
        assert_eq!(json["front_right"], 241);
        assert_eq!(report.name(), "tire_pressure");
    }
}
