//! The by-wire node
//!
//! [`DbwNode`] is the one place the arbitration state is mutated. Bus frames,
//! command requests and sweep ticks all enter through `&mut self` methods and
//! run to completion; everything the node wants the outside world to see is
//! queued as [`NodeOutput`] and drained with [`DbwNode::take_outputs`].
//!
//! # Example
//!
//! ```no_run
//! use dbw_core::{BrakeCmd, DbwConfig, DbwNode, NodeOutput};
//!
//! let mut node = DbwNode::new(DbwConfig::default()).unwrap();
//! node.enable();
//! node.brake_command(&BrakeCmd { pedal_cmd: 20.0, ..Default::default() }).unwrap();
//!
//! for output in node.take_outputs() {
//!     if let NodeOutput::Transmit(frame) = output {
//!         println!("send 0x{:03X} {:02X?}", frame.can_id, frame.data);
//!     }
//! }
//! ```

use crate::arbitration::{ArbitrationEngine, ArbitrationEvent, FaultKind, Subsystem};
use crate::codec::{DbcCodec, SignalCodec};
use crate::commands::{AcceleratorPedalCmd, BrakeCmd, Command, GearCmd, MiscCmd, SteeringCmd};
use crate::config::DbwConfig;
use crate::diagnostics::Diagnostic;
use crate::encoder::{CommandEncoder, Permission};
use crate::ids;
use crate::joints::JointState;
use crate::report_decoder::{Decoded, ReportDecoder};
use crate::reports::{GearReject, Report};
use crate::sweeper::FailSafeSweeper;
use crate::throttle::Throttle;
use crate::types::{CanFrame, DbwError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Interval between repeated channel fault notices
const FAULT_REMINDER_INTERVAL: Duration = Duration::from_secs(5);
/// Interval between repeated foreign command notices
const FOREIGN_COMMAND_INTERVAL: Duration = Duration::from_secs(5);

/// Something the node wants published or transmitted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "output", content = "value", rename_all = "snake_case")]
pub enum NodeOutput {
    /// The system enabled state changed
    Enabled(bool),
    Report(Report),
    /// A newly assembled vehicle identification number
    Vin(String),
    JointStates(JointState),
    /// Frame to put on the bus
    Transmit(CanFrame),
    Diagnostic(Diagnostic),
}

/// Rising edge detector for the cruise buttons
#[derive(Debug, Clone, Copy, Default)]
struct ButtonState {
    cancel: bool,
    resume: bool,
}

#[derive(Debug)]
struct Reminders {
    brake: Throttle,
    accelerator_pedal: Throttle,
    steering: Throttle,
    /// One per subsystem so a steady foreign sender cannot mask another
    foreign_command: HashMap<Subsystem, Throttle>,
}

impl Reminders {
    fn new() -> Self {
        Self {
            brake: Throttle::new(FAULT_REMINDER_INTERVAL),
            accelerator_pedal: Throttle::new(FAULT_REMINDER_INTERVAL),
            steering: Throttle::new(FAULT_REMINDER_INTERVAL),
            foreign_command: HashMap::new(),
        }
    }

    fn foreign_command(&mut self, subsystem: Subsystem) -> &mut Throttle {
        self.foreign_command
            .entry(subsystem)
            .or_insert_with(|| Throttle::new(FOREIGN_COMMAND_INTERVAL))
    }

    fn fault(&mut self, subsystem: Subsystem) -> Option<&mut Throttle> {
        match subsystem {
            Subsystem::Brake => Some(&mut self.brake),
            Subsystem::AcceleratorPedal => Some(&mut self.accelerator_pedal),
            Subsystem::Steering => Some(&mut self.steering),
            Subsystem::Gear => None,
        }
    }
}

/// Drive-by-wire supervisory node
pub struct DbwNode<C: SignalCodec = DbcCodec> {
    config: DbwConfig,
    codec: C,
    engine: ArbitrationEngine,
    decoder: ReportDecoder,
    encoder: CommandEncoder,
    sweeper: FailSafeSweeper,
    buttons: ButtonState,
    gear_reject_warned: bool,
    reminders: Reminders,
    outputs: Vec<NodeOutput>,
}

impl DbwNode<DbcCodec> {
    /// Create a node over the configured signal dictionary
    pub fn new(config: DbwConfig) -> Result<Self> {
        let codec = match &config.dbc_file {
            Some(path) => DbcCodec::from_dbc_file(path)?,
            None => DbcCodec::builtin()?,
        };
        Self::with_codec(config, codec)
    }
}

impl<C: SignalCodec> DbwNode<C> {
    /// Create a node over an already loaded codec
    ///
    /// Fails if the codec lacks any report or command message the node uses.
    pub fn with_codec(config: DbwConfig, codec: C) -> Result<Self> {
        for can_id in ids::REPORT_IDS {
            codec
                .definition(can_id)
                .ok_or(DbwError::MessageNotFound(can_id))?;
        }
        for name in ids::COMMAND_NAMES {
            codec
                .definition_by_name(name)
                .ok_or_else(|| DbwError::MessageNameNotFound(name.to_string()))?;
        }

        log::info!(
            "DBW node ready: frame '{}', buttons {}, sweep every {:?}",
            config.frame_id,
            if config.buttons { "on" } else { "off" },
            config.sweep_period()
        );

        let mut node = Self {
            decoder: ReportDecoder::new(config.frame_id.clone(), config.geometry()),
            sweeper: FailSafeSweeper::new(config.sweep_period()),
            config,
            codec,
            engine: ArbitrationEngine::new(),
            encoder: CommandEncoder::new(),
            buttons: ButtonState::default(),
            gear_reject_warned: false,
            reminders: Reminders::new(),
            outputs: Vec::new(),
        };
        node.drain_engine();
        Ok(node)
    }

    pub fn config(&self) -> &DbwConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn engine(&self) -> &ArbitrationEngine {
        &self.engine
    }

    pub fn enabled(&self) -> bool {
        self.engine.enabled()
    }

    /// Last assembled VIN
    pub fn vin(&self) -> Option<&str> {
        self.decoder.vin()
    }

    /// Drain queued outputs, oldest first
    pub fn take_outputs(&mut self) -> Vec<NodeOutput> {
        std::mem::take(&mut self.outputs)
    }

    /// Process one received frame
    pub fn handle_frame(&mut self, frame: &CanFrame) {
        let Some(decoded) = self.decoder.decode(&self.codec, frame) else {
            return;
        };

        match decoded {
            Decoded::Report(report) => self.apply_report(report),
            Decoded::VinFragment { mux, digits } => {
                if let Some(vin) = self.decoder.assemble_vin(mux, &digits) {
                    self.outputs.push(NodeOutput::Vin(vin));
                }
            }
            Decoded::ForeignCommand { subsystem, can_id } => {
                if self.reminders.foreign_command(subsystem).ready() {
                    self.emit(Diagnostic::ForeignCommand { subsystem, can_id });
                }
            }
        }
    }

    /// Request actuation permission
    pub fn enable(&mut self) {
        self.engine.request_enable();
        self.drain_engine();
    }

    /// Revoke actuation permission
    pub fn disable(&mut self) {
        self.engine.request_disable();
        self.drain_engine();
    }

    pub fn brake_command(&mut self, cmd: &BrakeCmd) -> Result<()> {
        let frame = self.encoder.brake(&self.codec, cmd, self.permission())?;
        self.outputs.push(NodeOutput::Transmit(frame));
        Ok(())
    }

    pub fn accelerator_pedal_command(&mut self, cmd: &AcceleratorPedalCmd) -> Result<()> {
        let frame = self
            .encoder
            .accelerator_pedal(&self.codec, cmd, self.permission())?;
        self.outputs.push(NodeOutput::Transmit(frame));
        Ok(())
    }

    pub fn steering_command(&mut self, cmd: &SteeringCmd) -> Result<()> {
        let frame = self.encoder.steering(&self.codec, cmd, self.permission())?;
        self.outputs.push(NodeOutput::Transmit(frame));
        Ok(())
    }

    pub fn gear_command(&mut self, cmd: &GearCmd) -> Result<()> {
        let frame = self.encoder.gear(&self.codec, cmd, self.permission())?;
        self.outputs.push(NodeOutput::Transmit(frame));
        Ok(())
    }

    pub fn misc_command(&mut self, cmd: &MiscCmd) -> Result<()> {
        let frame = self.encoder.misc(&self.codec, cmd, self.permission())?;
        self.outputs.push(NodeOutput::Transmit(frame));
        Ok(())
    }

    /// Dispatch any command request
    pub fn command(&mut self, command: &Command) -> Result<()> {
        match command {
            Command::Brake(cmd) => self.brake_command(cmd),
            Command::AcceleratorPedal(cmd) => self.accelerator_pedal_command(cmd),
            Command::Steering(cmd) => self.steering_command(cmd),
            Command::Gear(cmd) => self.gear_command(cmd),
            Command::Misc(cmd) => self.misc_command(cmd),
        }
    }

    /// Run one fail-safe sweep now
    pub fn tick(&mut self) -> Result<()> {
        let frames = self.sweeper.sweep(&self.engine, &self.encoder, &self.codec)?;
        self.outputs.extend(frames.into_iter().map(NodeOutput::Transmit));
        Ok(())
    }

    /// Run the sweep if its period has elapsed; returns whether it ran
    pub fn poll_sweep(&mut self, now: Instant) -> Result<bool> {
        if !self.sweeper.due(now) {
            return Ok(false);
        }
        self.tick()?;
        Ok(true)
    }

    fn permission(&self) -> Permission {
        Permission::from_engine(&self.engine)
    }

    /// Apply a report's arbitration inputs, then publish it
    fn apply_report(&mut self, mut report: Report) {
        match &mut report {
            Report::Brake(r) => {
                self.engine
                    .report_fault(FaultKind::Brakes, r.fault_ch1 && r.fault_ch2);
                self.engine.report_watchdog(
                    r.fault_dbw_system,
                    r.watchdog_source,
                    r.intervention_active,
                );
                self.engine.driver_override(Subsystem::Brake, r.driver);
                self.engine
                    .report_timeout(Subsystem::Brake, r.command_timeout, r.enabled);
                self.channel_fault_reminder(Subsystem::Brake, r.fault_ch1, r.fault_ch2);
            }
            Report::AcceleratorPedal(r) => {
                self.engine
                    .report_fault(FaultKind::AcceleratorPedal, r.fault_ch1 && r.fault_ch2);
                self.engine
                    .report_watchdog_status(r.fault_dbw_system, r.watchdog_source);
                self.engine
                    .driver_override(Subsystem::AcceleratorPedal, r.driver);
                self.engine.report_timeout(
                    Subsystem::AcceleratorPedal,
                    r.command_timeout,
                    r.enabled,
                );
                self.channel_fault_reminder(Subsystem::AcceleratorPedal, r.fault_ch1, r.fault_ch2);
            }
            Report::Steering(r) => {
                self.engine
                    .report_fault(FaultKind::Steering, r.fault_steering_system);
                self.engine
                    .report_fault(FaultKind::SteeringCalibration, r.fault_calibration);
                self.engine
                    .report_watchdog_status(r.fault_steering_system, r.watchdog_source);
                self.engine
                    .driver_override(Subsystem::Steering, r.driver_override);
                self.engine
                    .report_timeout(Subsystem::Steering, r.command_timeout, r.enabled);
                r.fault_dbw_system = self.engine.watchdog_fault();
                let fault = r.fault_steering_system;
                self.channel_fault_reminder(Subsystem::Steering, fault, fault);
            }
            Report::Gear(r) => {
                self.engine
                    .driver_override(Subsystem::Gear, r.driver_override);
                if let Some(reject) = r.reject {
                    self.gear_reject(reject);
                }
            }
            Report::DriverInput(r) if self.config.buttons => {
                let pressed = ButtonState {
                    cancel: r.cruise_cancel_button,
                    resume: r.cruise_resume_button,
                };
                if pressed.cancel && !self.buttons.cancel {
                    self.engine.button_cancel();
                }
                if pressed.resume && !self.buttons.resume {
                    self.engine.request_enable();
                }
                self.buttons = pressed;
            }
            _ => {}
        }

        self.drain_engine();

        let joints = self.decoder.accumulate_joints(&report);
        self.outputs.push(NodeOutput::Report(report));
        if let Some(joints) = joints {
            self.outputs.push(NodeOutput::JointStates(joints));
        }
    }

    /// Throttled notice while either channel of a subsystem reports a fault
    fn channel_fault_reminder(&mut self, subsystem: Subsystem, channel_1: bool, channel_2: bool) {
        if !(channel_1 || channel_2) {
            return;
        }
        let due = self
            .reminders
            .fault(subsystem)
            .map(|throttle| throttle.ready())
            .unwrap_or(false);
        if due {
            self.emit(Diagnostic::SubsystemFault {
                subsystem,
                channel_1,
                channel_2,
            });
        }
    }

    /// Warn once per gear reject episode
    fn gear_reject(&mut self, reject: GearReject) {
        if reject == GearReject::None {
            self.gear_reject_warned = false;
        } else if !self.gear_reject_warned {
            self.gear_reject_warned = true;
            self.emit(Diagnostic::GearRejected(reject));
        }
    }

    fn drain_engine(&mut self) {
        for event in self.engine.take_events() {
            self.outputs.push(match event {
                ArbitrationEvent::EnabledChanged(enabled) => NodeOutput::Enabled(enabled),
                ArbitrationEvent::Diagnostic(diagnostic) => NodeOutput::Diagnostic(diagnostic),
            });
        }
    }

    fn emit(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.outputs.push(NodeOutput::Diagnostic(diagnostic));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalSet;

    fn node() -> DbwNode {
        DbwNode::new(DbwConfig::default()).unwrap()
    }

    fn report(node: &DbwNode, name: &str, signals: &[(&str, f64)]) -> CanFrame {
        let set: SignalSet = signals.iter().map(|(n, v)| (*n, *v)).collect();
        node.codec().encode(name, &set).unwrap()
    }

    #[test]
    fn test_initial_output_is_disabled() {
        let mut node = node();
        assert_eq!(node.take_outputs(), vec![NodeOutput::Enabled(false)]);
        assert!(node.take_outputs().is_empty());
    }

    #[test]
    fn test_missing_message_rejected() {
        let dbc = r#"VERSION ""

NS_ :

BS_:

BU_: DBW AKIT

BO_ 97 DBW_BrakeReport: 8 DBW
 SG_ DBW_BrakeEnabled : 20|1@1+ (1,0) [0|1] "" AKIT
"#;
        let codec = DbcCodec::from_dbc_str(dbc, "partial.dbc").unwrap();
        let result = DbwNode::with_codec(DbwConfig::default(), codec);
        assert!(matches!(result, Err(DbwError::MessageNotFound(_))));
    }

    #[test]
    fn test_cancel_button_edge() {
        let mut node = node();
        node.enable();
        node.take_outputs();

        let pressed = report(
            &node,
            "DBW_DriverInputReport",
            &[("DBW_DrvInptCruiseCancelBtn", 1.0)],
        );
        node.handle_frame(&pressed);
        assert!(!node.enabled());
        let outputs = node.take_outputs();
        assert_eq!(outputs[0], NodeOutput::Enabled(false));

        // Held button is not a new press
        node.enable();
        node.handle_frame(&pressed);
        assert!(node.enabled());
    }

    #[test]
    fn test_buttons_ignored_when_off() {
        let mut node = DbwNode::new(DbwConfig::default().with_buttons(false)).unwrap();
        let resume = report(
            &node,
            "DBW_DriverInputReport",
            &[("DBW_DrvInptCruiseResumeBtn", 1.0)],
        );
        node.handle_frame(&resume);
        assert!(!node.enabled());
    }

    #[test]
    fn test_gear_reject_latch() {
        let mut node = node();
        node.take_outputs();
        let rejected = report(&node, "DBW_GearReport", &[("DBW_PrndStateReject", 1.0)]);
        let cleared = report(&node, "DBW_GearReport", &[("DBW_PrndStateReject", 0.0)]);

        let count_rejects = |outputs: Vec<NodeOutput>| {
            outputs
                .iter()
                .filter(|o| matches!(o, NodeOutput::Diagnostic(Diagnostic::GearRejected(_))))
                .count()
        };

        node.handle_frame(&rejected);
        node.handle_frame(&rejected);
        assert_eq!(count_rejects(node.take_outputs()), 1);

        node.handle_frame(&cleared);
        node.handle_frame(&rejected);
        assert_eq!(count_rejects(node.take_outputs()), 1);
    }

    #[test]
    fn test_foreign_command_throttled() {
        let mut node = node();
        node.take_outputs();
        let foreign = CanFrame::new(ids::GEAR_CMD, vec![0; 8]);
        node.handle_frame(&foreign);
        node.handle_frame(&foreign);

        let outputs = node.take_outputs();
        assert_eq!(
            outputs,
            vec![NodeOutput::Diagnostic(Diagnostic::ForeignCommand {
                subsystem: Subsystem::Gear,
                can_id: ids::GEAR_CMD
            })]
        );
    }

    #[test]
    fn test_foreign_commands_throttled_per_subsystem() {
        let mut node = node();
        node.take_outputs();
        let steering = CanFrame::new(ids::STEERING_CMD, vec![0; 8]);
        let brake = CanFrame::new(ids::BRAKE_CMD, vec![0; 8]);
        node.handle_frame(&steering);
        node.handle_frame(&steering);
        node.handle_frame(&brake);

        let warned: Vec<Subsystem> = node
            .take_outputs()
            .into_iter()
            .filter_map(|o| match o {
                NodeOutput::Diagnostic(Diagnostic::ForeignCommand { subsystem, .. }) => {
                    Some(subsystem)
                }
                _ => None,
            })
            .collect();
        assert_eq!(warned, vec![Subsystem::Steering, Subsystem::Brake]);
    }

    #[test]
    fn test_steering_report_carries_watchdog_fault() {
        let mut node = node();
        let frame = report(
            &node,
            "DBW_SteeringReport",
            &[("DBW_SteeringFault", 1.0), ("DBW_SteeringWatchdogStatus", 14.0)],
        );
        node.handle_frame(&frame);

        let steering = node.take_outputs().into_iter().find_map(|o| match o {
            NodeOutput::Report(Report::Steering(r)) => Some(r),
            _ => None,
        });
        let steering = steering.unwrap();
        assert!(steering.fault_dbw_system);
        assert!(node.engine().watchdog_fault());
    }

    #[test]
    fn test_sweep_only_when_due() {
        let mut node = node();
        let brake = report(&node, "DBW_BrakeReport", &[("DBW_BrakeDriverActivity", 1.0)]);
        node.handle_frame(&brake);
        node.take_outputs();

        let t0 = Instant::now();
        assert!(node.poll_sweep(t0).unwrap());
        assert!(!node.poll_sweep(t0 + Duration::from_millis(10)).unwrap());

        let outputs = node.take_outputs();
        assert_eq!(outputs.len(), 1);
        assert!(matches!(&outputs[0], NodeOutput::Transmit(f) if f.can_id == ids::BRAKE_CMD));
    }
}
