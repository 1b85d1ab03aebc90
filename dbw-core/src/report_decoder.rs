//! Report decoding
//!
//! Maps inbound frames to typed reports. Decoding is split in two:
//! [`ReportDecoder::decode`] is a pure table lookup from CAN ID to a decode
//! function, and the joint/VIN state that spans frames is advanced separately
//! by [`ReportDecoder::accumulate_joints`] and [`ReportDecoder::assemble_vin`].

use crate::arbitration::Subsystem;
use crate::codec::SignalCodec;
use crate::ids;
use crate::joints::{AckermannGeometry, JointAccumulator, JointState};
use crate::reports::*;
use crate::types::{CanFrame, SignalSet, Timestamp};
use crate::vin::VinAssembler;
use crate::watchdog::WatchdogSource;
use std::f64::consts::PI;

/// Steering report angles are in tenths of a degree
const STEERING_ANGLE_SCALE: f64 = 0.1 * PI / 180.0;
/// Steering report torque is in 1/16 Nm
const STEERING_TORQUE_SCALE: f64 = 0.0625;

/// Result of decoding one frame
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Report(Report),
    /// One multiplexed VIN fragment
    VinFragment { mux: u64, digits: Vec<u8> },
    /// A command frame sent by some other node
    ForeignCommand { subsystem: Subsystem, can_id: u32 },
}

/// What a decode function sees besides the signals
struct DecodeInput<'a> {
    timestamp: Timestamp,
    /// Payload is at least the dictionary's message size
    full_payload: bool,
    frame_id: &'a str,
}

type DecodeFn = fn(&DecodeInput<'_>, &SignalSet) -> Option<Decoded>;

/// Report decoding table, keyed by CAN ID
const DECODERS: [(u32, DecodeFn); 13] = [
    (ids::BRAKE_REPORT, decode_brake),
    (ids::ACCEL_PEDAL_REPORT, decode_accelerator_pedal),
    (ids::STEERING_REPORT, decode_steering),
    (ids::GEAR_REPORT, decode_gear),
    (ids::MISC_REPORT, decode_misc),
    (ids::WHEEL_SPEED_REPORT, decode_wheel_speed),
    (ids::WHEEL_POSITION_REPORT, decode_wheel_position),
    (ids::TIRE_PRESSURE_REPORT, decode_tire_pressure),
    (ids::SURROUND_REPORT, decode_surround),
    (ids::IMU_REPORT, decode_imu),
    (ids::DRIVER_INPUT_REPORT, decode_driver_input),
    (ids::LOW_VOLTAGE_REPORT, decode_low_voltage),
    (ids::VIN_REPORT, decode_vin),
];

/// Subsystem commanded by a foreign command frame
fn foreign_subsystem(can_id: u32) -> Option<Subsystem> {
    match can_id {
        ids::BRAKE_CMD => Some(Subsystem::Brake),
        ids::ACCEL_PEDAL_CMD => Some(Subsystem::AcceleratorPedal),
        ids::STEERING_CMD => Some(Subsystem::Steering),
        ids::GEAR_CMD => Some(Subsystem::Gear),
        _ => None,
    }
}

/// Smallest payload accepted for a report
fn minimum_payload(can_id: u32, message_size: usize) -> usize {
    match can_id {
        // Gear state fits in the first byte; the reject field needs the rest
        ids::GEAR_REPORT => 1,
        _ => message_size,
    }
}

/// Frame to report mapping plus the state that spans frames
#[derive(Debug, Clone)]
pub struct ReportDecoder {
    frame_id: String,
    joints: JointAccumulator,
    vin: VinAssembler,
}

impl ReportDecoder {
    pub fn new(frame_id: impl Into<String>, geometry: AckermannGeometry) -> Self {
        Self {
            frame_id: frame_id.into(),
            joints: JointAccumulator::new(geometry),
            vin: VinAssembler::new(),
        }
    }

    /// Decode a frame; bus noise and unknown IDs give `None`
    pub fn decode<C: SignalCodec>(&self, codec: &C, frame: &CanFrame) -> Option<Decoded> {
        if !frame.is_data_frame() {
            return None;
        }

        if let Some(subsystem) = foreign_subsystem(frame.can_id) {
            return Some(Decoded::ForeignCommand {
                subsystem,
                can_id: frame.can_id,
            });
        }

        let decode_fn = DECODERS
            .iter()
            .find(|(can_id, _)| *can_id == frame.can_id)
            .map(|(_, decode_fn)| *decode_fn)?;
        let message_size = codec.definition(frame.can_id)?.size;

        if frame.dlc() < minimum_payload(frame.can_id, message_size) {
            log::debug!(
                "Dropping short frame 0x{:03X}: {} of {} bytes",
                frame.can_id,
                frame.dlc(),
                message_size
            );
            return None;
        }

        let signals = match codec.decode(frame) {
            Ok(signals) => signals,
            Err(e) => {
                log::debug!("Frame 0x{:03X} not decoded: {}", frame.can_id, e);
                return None;
            }
        };

        let input = DecodeInput {
            timestamp: frame.timestamp(),
            full_payload: frame.dlc() >= message_size,
            frame_id: &self.frame_id,
        };
        decode_fn(&input, &signals)
    }

    /// Advance joint dead reckoning for wheel speed and steering reports
    pub fn accumulate_joints(&mut self, report: &Report) -> Option<JointState> {
        match report {
            Report::WheelSpeed(r) => Some(self.joints.update_wheels(r.timestamp, r.angular_speeds())),
            Report::Steering(r) => {
                Some(self.joints.update_steering(r.timestamp, r.steering_wheel_angle))
            }
            _ => None,
        }
    }

    /// Feed a VIN fragment; returns a newly completed VIN
    pub fn assemble_vin(&mut self, mux: u64, digits: &[u8]) -> Option<String> {
        self.vin.push(mux, digits)
    }

    pub fn vin(&self) -> Option<&str> {
        self.vin.vin()
    }
}

fn decode_brake(input: &DecodeInput<'_>, s: &SignalSet) -> Option<Decoded> {
    let fault_brake_system = s.flag("DBW_BrakeFault");
    Some(Decoded::Report(Report::Brake(BrakeReport {
        timestamp: input.timestamp,
        pedal_input: s.float("DBW_BrakePedalDriverInput"),
        pedal_output: s.float("DBW_BrakePedalPosnFdbck"),
        enabled: s.flag("DBW_BrakeEnabled"),
        driver: s.flag("DBW_BrakeDriverActivity"),
        watchdog_source: WatchdogSource::from_raw(s.uint8("DBW_BrakeWatchdogStatus")),
        fault_brake_system,
        fault_dbw_system: fault_brake_system,
        fault_ch1: s.flag("DBW_BrakeFault_Ch1"),
        fault_ch2: s.flag("DBW_BrakeFault_Ch2"),
        command_timeout: s.flag("DBW_BrakeCmdTimeout"),
        rolling_counter: s.uint8("DBW_BrakeRollingCntr"),
        torque_actual: s.float("DBW_BrakePcntTorqueActual"),
        intervention_active: s.flag("DBW_BrakeInterventionActv"),
        intervention_ready: s.flag("DBW_BrakeInterventionReady"),
        parking_brake_status: s.uint8("DBW_BrakeParkingBrkStatus"),
        control_type: s.uint8("DBW_BrakeCtrlType"),
    })))
}

fn decode_accelerator_pedal(input: &DecodeInput<'_>, s: &SignalSet) -> Option<Decoded> {
    let fault_accel_pedal_system = s.flag("DBW_AccelPdlFault");
    Some(Decoded::Report(Report::AcceleratorPedal(AcceleratorPedalReport {
        timestamp: input.timestamp,
        pedal_input: s.float("DBW_AccelPdlDriverInput"),
        pedal_output: s.float("DBW_AccelPdlPosnFdbck"),
        enabled: s.flag("DBW_AccelPdlEnabled"),
        ignore_driver: s.flag("DBW_AccelPdlIgnoreDriver"),
        driver: s.flag("DBW_AccelPdlDriverActivity"),
        torque_actual: s.float("DBW_AccelPcntTorqueActual"),
        control_type: s.uint8("DBW_AccelCtrlType"),
        rolling_counter: s.uint8("DBW_AccelPdlRollingCntr"),
        watchdog_source: WatchdogSource::from_raw(s.uint8("DBW_AccelPdlWatchdogStatus")),
        fault_accel_pedal_system,
        fault_dbw_system: fault_accel_pedal_system,
        fault_ch1: s.flag("DBW_AccelPdlFault_Ch1"),
        fault_ch2: s.flag("DBW_AccelPdlFault_Ch2"),
        command_timeout: s.flag("DBW_AccelPdlCmdTimeout"),
    })))
}

fn decode_steering(input: &DecodeInput<'_>, s: &SignalSet) -> Option<Decoded> {
    Some(Decoded::Report(Report::Steering(SteeringReport {
        timestamp: input.timestamp,
        steering_wheel_angle: s.float("DBW_SteeringWhlAngleAct") * STEERING_ANGLE_SCALE,
        steering_wheel_angle_cmd: s.float("DBW_SteeringWhlAngleDes") * STEERING_ANGLE_SCALE,
        steering_wheel_torque: s.float("DBW_SteeringWhlTorqueCmd") * STEERING_TORQUE_SCALE,
        enabled: s.flag("DBW_SteeringEnabled"),
        driver_override: s.flag("DBW_SteeringDriverActivity"),
        fault_steering_system: s.flag("DBW_SteeringFault"),
        fault_calibration: s.flag("DBW_SteeringCalFault"),
        // Filled in from the arbitration engine once the report is applied
        fault_dbw_system: false,
        watchdog_source: WatchdogSource::from_raw(s.uint8("DBW_SteeringWatchdogStatus")),
        command_timeout: s.flag("DBW_SteeringCmdTimeout"),
        rolling_counter: s.uint8("DBW_SteeringRollingCntr"),
        control_type: s.uint8("DBW_SteeringCtrlType"),
    })))
}

fn decode_gear(input: &DecodeInput<'_>, s: &SignalSet) -> Option<Decoded> {
    let reject = input
        .full_payload
        .then(|| GearReject::from_raw(s.uint8("DBW_PrndStateReject")));
    Some(Decoded::Report(Report::Gear(GearReport {
        timestamp: input.timestamp,
        state: Gear::from_raw(s.uint8("DBW_PrndStateActual")),
        enabled: s.flag("DBW_PrndCtrlEnabled"),
        driver_override: s.flag("DBW_PrndDriverActivity"),
        fault_gear_select_system: s.flag("DBW_PrndFault"),
        reject,
    })))
}

fn decode_misc(input: &DecodeInput<'_>, s: &SignalSet) -> Option<Decoded> {
    Some(Decoded::Report(Report::Misc(MiscReport {
        timestamp: input.timestamp,
        fuel_level: s.float("DBW_MiscFuelLvl"),
        drive_by_wire_enabled: s.flag("DBW_MiscByWireEnbled"),
        by_wire_ready: s.flag("DBW_MiscByWireReady"),
        general_actuator_fault: s.flag("DBW_MiscFault"),
        general_driver_activity: s.flag("DBW_MiscDriverActivity"),
        comms_fault: s.flag("DBW_MiscAKitCommFault"),
        vehicle_speed: s.float("DBW_MiscVehicleSpeed"),
        software_build_number: s.uint16("DBW_SoftwareBuildNumber"),
    })))
}

fn decode_wheel_speed(input: &DecodeInput<'_>, s: &SignalSet) -> Option<Decoded> {
    let (source, prefix) = match s.int("DBW_WhlSpdType") as u64 {
        ids::WHEEL_SPEED_MUX_RPM => (Some(WheelSpeedSource::Rpm), "DBW_WhlRpm"),
        ids::WHEEL_SPEED_MUX_RAD_S => (Some(WheelSpeedSource::AngularSpeed), "DBW_WhlSpd"),
        other => {
            log::debug!("Unknown wheel speed type {}", other);
            (None, "")
        }
    };
    let wheel = |corner: &str| match source {
        Some(_) => s.float(&format!("{}_{}", prefix, corner)),
        None => 0.0,
    };

    Some(Decoded::Report(Report::WheelSpeed(WheelSpeedReport {
        timestamp: input.timestamp,
        source,
        front_left: wheel("FL"),
        front_right: wheel("FR"),
        rear_left: wheel("RL"),
        rear_right: wheel("RR"),
    })))
}

fn decode_wheel_position(input: &DecodeInput<'_>, s: &SignalSet) -> Option<Decoded> {
    Some(Decoded::Report(Report::WheelPosition(WheelPositionReport {
        timestamp: input.timestamp,
        front_left: s.uint16("DBW_WhlPulseCnt_FL"),
        front_right: s.uint16("DBW_WhlPulseCnt_FR"),
        rear_left: s.uint16("DBW_WhlPulseCnt_RL"),
        rear_right: s.uint16("DBW_WhlPulseCnt_RR"),
        wheel_pulses_per_rev: s.uint16("DBW_WhlPulsesPerRev"),
    })))
}

fn decode_tire_pressure(input: &DecodeInput<'_>, s: &SignalSet) -> Option<Decoded> {
    Some(Decoded::Report(Report::TirePressure(TirePressureReport {
        timestamp: input.timestamp,
        front_left: s.uint16("DBW_TirePressFL"),
        front_right: s.uint16("DBW_TirePressFR"),
        rear_left: s.uint16("DBW_TirePressRL"),
        rear_right: s.uint16("DBW_TirePressRR"),
    })))
}

fn decode_surround(input: &DecodeInput<'_>, s: &SignalSet) -> Option<Decoded> {
    Some(Decoded::Report(Report::Surround(SurroundReport {
        timestamp: input.timestamp,
        front_radar_object_distance: s.float("DBW_RadarFrontObjDist"),
        rear_radar_object_distance: s.float("DBW_SonarRearDist"),
        front_radar_distance_valid: s.flag("DBW_RadarFrontObjDistVld"),
        parking_sonar_data_valid: s.flag("DBW_SonarVld"),
        front_left: s.uint8("DBW_SonarArcNumFL"),
        front_center: s.uint8("DBW_SonarArcNumFC"),
        front_right: s.uint8("DBW_SonarArcNumFR"),
        rear_left: s.uint8("DBW_SonarArcNumRL"),
        rear_center: s.uint8("DBW_SonarArcNumRC"),
        rear_right: s.uint8("DBW_SonarArcNumRR"),
    })))
}

fn decode_imu(input: &DecodeInput<'_>, s: &SignalSet) -> Option<Decoded> {
    Some(Decoded::Report(Report::Imu(ImuReport {
        timestamp: input.timestamp,
        frame_id: input.frame_id.to_string(),
        yaw_rate: s.float("DBW_ImuYawRate_Raw"),
        accel_x: s.float("DBW_ImuAccelX"),
        accel_y: s.float("DBW_ImuAccelY"),
    })))
}

fn decode_driver_input(input: &DecodeInput<'_>, s: &SignalSet) -> Option<Decoded> {
    Some(Decoded::Report(Report::DriverInput(DriverInputReport {
        timestamp: input.timestamp,
        turn_signal: TurnSignal::from_raw(s.uint8("DBW_DrvInptTurnSignal")),
        high_beam_headlights: s.uint8("DBW_DrvInptHiBeam"),
        wiper: s.uint8("DBW_DrvInptWiper"),
        cruise_resume_button: s.flag("DBW_DrvInptCruiseResumeBtn"),
        cruise_cancel_button: s.flag("DBW_DrvInptCruiseCancelBtn"),
        cruise_accel_button: s.flag("DBW_DrvInptCruiseAccelBtn"),
        cruise_decel_button: s.flag("DBW_DrvInptCruiseDecelBtn"),
        cruise_on_off_button: s.flag("DBW_DrvInptCruiseOnOffBtn"),
        adaptive_cruise_on_off_button: s.flag("DBW_DrvInptAccOnOffBtn"),
        adaptive_cruise_increase_distance_button: s.flag("DBW_DrvInptAccIncDistBtn"),
        adaptive_cruise_decrease_distance_button: s.flag("DBW_DrvInptAccDecDistBtn"),
        door_or_hood_ajar: s.flag("DBW_OccupAnyDoorOrHoodAjar"),
        airbag_deployed: s.flag("DBW_OccupAnyAirbagDeployed"),
        any_seatbelt_unbuckled: s.flag("DBW_OccupAnySeatbeltUnbuckled"),
    })))
}

fn decode_low_voltage(input: &DecodeInput<'_>, s: &SignalSet) -> Option<Decoded> {
    Some(Decoded::Report(Report::LowVoltageSystem(LowVoltageSystemReport {
        timestamp: input.timestamp,
        vehicle_battery_volts: s.float("DBW_LvVehBattVlt"),
        vehicle_battery_current: s.float("DBW_LvBattCurr"),
        vehicle_alternator_current: s.float("DBW_LvAlternatorCurr"),
        aux_battery_volts: s.float("DBW_LvDbwBattVlt"),
        aux_dcdc_current: s.float("DBW_LvDcdcCurr"),
        aux_battery_contactor: s.flag("DBW_LvBattContactorCmd"),
        aux_inverter_contactor: s.flag("DBW_LvInvtrContactorCmd"),
    })))
}

fn decode_vin(_input: &DecodeInput<'_>, s: &SignalSet) -> Option<Decoded> {
    let mux = s.int("DBW_VinMultiplexor") as u64;
    let digits = match mux {
        ids::VIN_MUX_FIRST => 1..=7,
        ids::VIN_MUX_MIDDLE => 8..=14,
        ids::VIN_MUX_LAST => 15..=17,
        _ => return None,
    };
    let digits = digits
        .map(|n| s.uint8(&format!("DBW_VinDigit_{:02}", n)))
        .collect();
    Some(Decoded::VinFragment { mux, digits })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DbcCodec;

    fn decoder() -> ReportDecoder {
        ReportDecoder::new(
            "base_footprint",
            AckermannGeometry {
                wheelbase: 2.8498,
                track: 1.5824,
                steering_ratio: 14.8,
            },
        )
    }

    fn frame(codec: &DbcCodec, name: &str, signals: &[(&str, f64)]) -> CanFrame {
        let set: SignalSet = signals.iter().map(|(n, v)| (*n, *v)).collect();
        codec.encode(name, &set).unwrap()
    }

    #[test]
    fn test_decode_brake_report() {
        let codec = DbcCodec::builtin().unwrap();
        let f = frame(
            &codec,
            "DBW_BrakeReport",
            &[
                ("DBW_BrakePedalDriverInput", 12.5),
                ("DBW_BrakeDriverActivity", 1.0),
                ("DBW_BrakeFault_Ch2", 1.0),
                ("DBW_BrakeWatchdogStatus", 6.0),
                ("DBW_BrakeRollingCntr", 42.0),
            ],
        );

        let Some(Decoded::Report(Report::Brake(report))) = decoder().decode(&codec, &f) else {
            panic!("expected a brake report");
        };
        assert!((report.pedal_input - 12.5).abs() < 1e-9);
        assert!(report.driver);
        assert!(!report.fault_ch1);
        assert!(report.fault_ch2);
        assert_eq!(report.watchdog_source, WatchdogSource::BrakeCommand);
        assert_eq!(report.rolling_counter, 42);
    }

    #[test]
    fn test_short_frame_dropped() {
        let codec = DbcCodec::builtin().unwrap();
        let mut f = frame(&codec, "DBW_BrakeReport", &[("DBW_BrakeEnabled", 1.0)]);
        f.data.truncate(7);
        assert_eq!(decoder().decode(&codec, &f), None);
    }

    #[test]
    fn test_rtr_and_unknown_ignored() {
        let codec = DbcCodec::builtin().unwrap();
        let mut f = frame(&codec, "DBW_MiscReport", &[]);
        f.is_remote_frame = true;
        assert_eq!(decoder().decode(&codec, &f), None);

        assert_eq!(decoder().decode(&codec, &CanFrame::new(0x123, vec![0; 8])), None);
    }

    #[test]
    fn test_steering_units() {
        let codec = DbcCodec::builtin().unwrap();
        let f = frame(
            &codec,
            "DBW_SteeringReport",
            &[
                ("DBW_SteeringWhlAngleAct", 900.0),
                ("DBW_SteeringWhlTorqueCmd", -32.0),
            ],
        );

        let Some(Decoded::Report(Report::Steering(report))) = decoder().decode(&codec, &f) else {
            panic!("expected a steering report");
        };
        assert!((report.steering_wheel_angle - PI / 2.0).abs() < 1e-9);
        assert!((report.steering_wheel_torque + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_gear_short_payload_has_no_reject() {
        let codec = DbcCodec::builtin().unwrap();
        let mut f = frame(
            &codec,
            "DBW_GearReport",
            &[("DBW_PrndStateActual", 4.0), ("DBW_PrndStateReject", 5.0)],
        );

        let Some(Decoded::Report(Report::Gear(full))) = decoder().decode(&codec, &f) else {
            panic!("expected a gear report");
        };
        assert_eq!(full.state, Gear::Drive);
        assert_eq!(full.reject, Some(GearReject::Vehicle));

        f.data.truncate(1);
        let Some(Decoded::Report(Report::Gear(short))) = decoder().decode(&codec, &f) else {
            panic!("expected a gear report");
        };
        assert_eq!(short.state, Gear::Drive);
        assert_eq!(short.reject, None);

        f.data.clear();
        assert_eq!(decoder().decode(&codec, &f), None);
    }

    #[test]
    fn test_wheel_speed_mux_selection() {
        let codec = DbcCodec::builtin().unwrap();
        let rpm = frame(
            &codec,
            "DBW_WheelSpeedReport",
            &[("DBW_WhlSpdType", 0.0), ("DBW_WhlRpm_FL", 120.25)],
        );
        let Some(Decoded::Report(Report::WheelSpeed(report))) = decoder().decode(&codec, &rpm) else {
            panic!("expected a wheel speed report");
        };
        assert_eq!(report.source, Some(WheelSpeedSource::Rpm));
        assert!((report.front_left - 120.25).abs() < 1e-9);

        let rad = frame(
            &codec,
            "DBW_WheelSpeedReport",
            &[("DBW_WhlSpdType", 1.0), ("DBW_WhlSpd_RR", -3.5)],
        );
        let Some(Decoded::Report(Report::WheelSpeed(report))) = decoder().decode(&codec, &rad) else {
            panic!("expected a wheel speed report");
        };
        assert_eq!(report.source, Some(WheelSpeedSource::AngularSpeed));
        assert!((report.rear_right + 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_vin_fragment_and_foreign_command() {
        let codec = DbcCodec::builtin().unwrap();
        let f = frame(
            &codec,
            "DBW_Vin",
            &[
                ("DBW_VinMultiplexor", 2.0),
                ("DBW_VinDigit_15", 52.0),
                ("DBW_VinDigit_16", 53.0),
                ("DBW_VinDigit_17", 54.0),
            ],
        );
        assert_eq!(
            decoder().decode(&codec, &f),
            Some(Decoded::VinFragment {
                mux: 2,
                digits: b"456".to_vec()
            })
        );

        let foreign = CanFrame::new(ids::STEERING_CMD, vec![0; 8]);
        assert_eq!(
            decoder().decode(&codec, &foreign),
            Some(Decoded::ForeignCommand {
                subsystem: Subsystem::Steering,
                can_id: ids::STEERING_CMD
            })
        );
    }

    #[test]
    fn test_imu_stamped_with_frame_id() {
        let codec = DbcCodec::builtin().unwrap();
        let f = frame(&codec, "DBW_ImuReport", &[("DBW_ImuAccelX", 1.25)]);
        let Some(Decoded::Report(Report::Imu(report))) = decoder().decode(&codec, &f) else {
            panic!("expected an imu report");
        };
        assert_eq!(report.frame_id, "base_footprint");
        assert!((report.accel_x - 1.25).abs() < 1e-9);
    }
}
