//! Enable/fault/override arbitration
//!
//! [`ArbitrationEngine`] owns the single [`ArbitrationState`] and decides at
//! every input whether computer commands may actuate the vehicle.
//!
//! Rules:
//! - `enabled()` is the master flag AND no fault AND no driver override.
//! - The master flag is only set by an enable request while no fault is present.
//! - An override or fault arriving while enabled clears the master flag in the
//!   same call; a fault clears it even while an override holds the system back,
//!   so a pending enable never survives a fault.
//! - Every change of `enabled()` is published exactly once as
//!   [`ArbitrationEvent::EnabledChanged`].

use crate::diagnostics::{DisableCause, Diagnostic};
use crate::throttle::Throttle;
use crate::watchdog::WatchdogSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Interval between watchdog acknowledgment reminders
const WATCHDOG_REMINDER_INTERVAL: Duration = Duration::from_secs(2);

/// Actuated subsystems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    Brake,
    AcceleratorPedal,
    Steering,
    Gear,
}

impl Subsystem {
    pub const ALL: [Subsystem; 4] = [
        Subsystem::Brake,
        Subsystem::AcceleratorPedal,
        Subsystem::Steering,
        Subsystem::Gear,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Subsystem::Brake => "Brake",
            Subsystem::AcceleratorPedal => "Accelerator Pedal",
            Subsystem::Steering => "Steering",
            Subsystem::Gear => "Gear",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fault sources that block enabling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Brakes,
    AcceleratorPedal,
    Steering,
    SteeringCalibration,
    Watchdog,
}

impl FaultKind {
    /// Order in which refusal notices are reported
    pub const ALL: [FaultKind; 5] = [
        FaultKind::SteeringCalibration,
        FaultKind::Brakes,
        FaultKind::AcceleratorPedal,
        FaultKind::Steering,
        FaultKind::Watchdog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::Brakes => "Braking fault",
            FaultKind::AcceleratorPedal => "Accelerator Pedal fault",
            FaultKind::Steering => "Steering fault",
            FaultKind::SteeringCalibration => "Steering calibration fault",
            FaultKind::Watchdog => "Watchdog fault",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One boolean per subsystem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubsystemFlags {
    pub brake: bool,
    pub accelerator_pedal: bool,
    pub steering: bool,
    pub gear: bool,
}

impl SubsystemFlags {
    pub fn get(&self, subsystem: Subsystem) -> bool {
        match subsystem {
            Subsystem::Brake => self.brake,
            Subsystem::AcceleratorPedal => self.accelerator_pedal,
            Subsystem::Steering => self.steering,
            Subsystem::Gear => self.gear,
        }
    }

    pub fn set(&mut self, subsystem: Subsystem, value: bool) {
        match subsystem {
            Subsystem::Brake => self.brake = value,
            Subsystem::AcceleratorPedal => self.accelerator_pedal = value,
            Subsystem::Steering => self.steering = value,
            Subsystem::Gear => self.gear = value,
        }
    }

    pub fn any(&self) -> bool {
        self.brake || self.accelerator_pedal || self.steering || self.gear
    }

    /// Subsystems whose flag is set, in [`Subsystem::ALL`] order
    pub fn active(&self) -> impl Iterator<Item = Subsystem> + '_ {
        Subsystem::ALL.into_iter().filter(|s| self.get(*s))
    }
}

/// Everything the arbitration decision depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArbitrationState {
    /// Master enable flag, set only by an accepted enable request
    pub enabled: bool,
    pub override_active: SubsystemFlags,
    pub fault_brakes: bool,
    pub fault_accelerator_pedal: bool,
    pub fault_steering: bool,
    pub fault_steering_calibration: bool,
    pub fault_watchdog: bool,
    /// The watchdog is braking the vehicle
    pub watchdog_using_brakes: bool,
    /// A watchdog cause was reported for the current fault episode
    pub watchdog_warned: bool,
    /// Command timeout flags (brake, accelerator pedal, steering)
    pub timeout: SubsystemFlags,
    /// Bus-confirmed subsystem enable (brake, accelerator pedal, steering)
    pub subsystem_enabled_feedback: SubsystemFlags,
    /// Last value of `enabled()` sent outward
    pub last_published_enabled: bool,
}

impl Default for ArbitrationState {
    fn default() -> Self {
        Self {
            enabled: false,
            override_active: SubsystemFlags::default(),
            fault_brakes: false,
            fault_accelerator_pedal: false,
            fault_steering: false,
            fault_steering_calibration: false,
            fault_watchdog: false,
            watchdog_using_brakes: false,
            watchdog_warned: false,
            timeout: SubsystemFlags::default(),
            subsystem_enabled_feedback: SubsystemFlags::default(),
            // Forces the first publication
            last_published_enabled: true,
        }
    }
}

impl ArbitrationState {
    pub fn fault_flag(&self, kind: FaultKind) -> bool {
        match kind {
            FaultKind::Brakes => self.fault_brakes,
            FaultKind::AcceleratorPedal => self.fault_accelerator_pedal,
            FaultKind::Steering => self.fault_steering,
            FaultKind::SteeringCalibration => self.fault_steering_calibration,
            FaultKind::Watchdog => self.fault_watchdog,
        }
    }

    fn set_fault_flag(&mut self, kind: FaultKind, value: bool) {
        match kind {
            FaultKind::Brakes => self.fault_brakes = value,
            FaultKind::AcceleratorPedal => self.fault_accelerator_pedal = value,
            FaultKind::Steering => self.fault_steering = value,
            FaultKind::SteeringCalibration => self.fault_steering_calibration = value,
            FaultKind::Watchdog => self.fault_watchdog = value,
        }
    }

    pub fn any_fault(&self) -> bool {
        FaultKind::ALL.iter().any(|kind| self.fault_flag(*kind))
    }
}

/// Outward effects of an arbitration input
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "value", rename_all = "snake_case")]
pub enum ArbitrationEvent {
    /// `enabled()` changed to this value
    EnabledChanged(bool),
    Diagnostic(Diagnostic),
}

/// Input that can revoke the enabled state
#[derive(Debug, Clone, Copy)]
enum Gate {
    Override(Subsystem),
    Fault(FaultKind),
}

/// Owner of the arbitration state
#[derive(Debug)]
pub struct ArbitrationEngine {
    state: ArbitrationState,
    outbox: Vec<ArbitrationEvent>,
    watchdog_reminder: Throttle,
}

impl ArbitrationEngine {
    /// Create the engine and publish the initial (disabled) state
    pub fn new() -> Self {
        let mut engine = Self {
            state: ArbitrationState::default(),
            outbox: Vec::new(),
            watchdog_reminder: Throttle::new(WATCHDOG_REMINDER_INTERVAL),
        };
        engine.publish();
        engine
    }

    /// Actuation is permitted
    pub fn enabled(&self) -> bool {
        self.state.enabled && !self.fault() && !self.override_active()
    }

    /// Any fault source is active
    pub fn fault(&self) -> bool {
        self.state.any_fault()
    }

    /// The driver holds any actuator
    pub fn override_active(&self) -> bool {
        self.state.override_active.any()
    }

    /// Latched driver overrides may be cleared
    pub fn clear_requested(&self) -> bool {
        !self.fault()
    }

    pub fn watchdog_fault(&self) -> bool {
        self.state.fault_watchdog
    }

    pub fn state(&self) -> &ArbitrationState {
        &self.state
    }

    /// Drain queued outward effects, oldest first
    pub fn take_events(&mut self) -> Vec<ArbitrationEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Request actuation permission
    pub fn request_enable(&mut self) {
        if self.state.enabled {
            return;
        }

        if self.fault() {
            let active: Vec<FaultKind> = FaultKind::ALL
                .into_iter()
                .filter(|kind| self.state.fault_flag(*kind))
                .collect();
            for kind in active {
                self.emit(Diagnostic::EnableRefused(kind));
            }
            return;
        }

        self.state.enabled = true;
        if self.publish() {
            self.emit(Diagnostic::Enabled);
        } else {
            self.emit(Diagnostic::EnableWaiting);
        }
    }

    /// Revoke actuation permission
    pub fn request_disable(&mut self) {
        self.disable_with(DisableCause::Request);
    }

    /// Cruise cancel button pressed
    pub fn button_cancel(&mut self) {
        self.disable_with(DisableCause::CancelButton);
    }

    /// Driver is (or stopped) acting on a subsystem
    pub fn driver_override(&mut self, subsystem: Subsystem, active: bool) {
        self.apply_gate(Gate::Override(subsystem), active);
    }

    /// Subsystem fault reported by the bus
    pub fn report_fault(&mut self, kind: FaultKind, active: bool) {
        self.apply_gate(Gate::Fault(kind), active);
    }

    /// Watchdog status with the braking indicator
    pub fn report_watchdog(&mut self, fault: bool, source: WatchdogSource, braking: bool) {
        self.apply_gate(Gate::Fault(FaultKind::Watchdog), fault);

        if braking && !self.state.watchdog_using_brakes {
            self.emit(Diagnostic::WatchdogBraking);
        } else if !braking && self.state.watchdog_using_brakes {
            self.emit(Diagnostic::WatchdogDriverControl);
        }

        if fault && !source.is_none() && !self.state.watchdog_warned {
            self.emit(Diagnostic::WatchdogEvent(source));
            self.state.watchdog_warned = true;
        } else if !fault {
            self.state.watchdog_warned = false;
        }

        self.state.watchdog_using_brakes = braking;

        if fault
            && !self.state.watchdog_using_brakes
            && self.state.watchdog_warned
            && self.watchdog_reminder.ready()
        {
            self.emit(Diagnostic::WatchdogClearReminder);
        }
    }

    /// Watchdog status from a report without a braking indicator
    pub fn report_watchdog_status(&mut self, fault: bool, source: WatchdogSource) {
        let braking = self.state.watchdog_using_brakes;
        self.report_watchdog(fault, source, braking);
    }

    /// Command timeout and enable feedback of a subsystem
    ///
    /// Advisory only: never changes `enabled()`.
    pub fn report_timeout(&mut self, subsystem: Subsystem, timed_out: bool, feedback_enabled: bool) {
        let was_timed_out = self.state.timeout.get(subsystem);
        let was_enabled = self.state.subsystem_enabled_feedback.get(subsystem);

        if !was_timed_out && was_enabled && timed_out && !feedback_enabled {
            self.emit(Diagnostic::SubsystemTimeout(subsystem));
        }

        self.state.timeout.set(subsystem, timed_out);
        self.state.subsystem_enabled_feedback.set(subsystem, feedback_enabled);
    }

    fn disable_with(&mut self, cause: DisableCause) {
        if self.state.enabled {
            self.state.enabled = false;
            self.publish();
            self.emit(Diagnostic::Disabled(cause));
        }
    }

    /// Shared rule for overrides and faults
    fn apply_gate(&mut self, gate: Gate, active: bool) {
        let was_enabled = self.enabled();

        match gate {
            Gate::Override(subsystem) => {
                if active && was_enabled {
                    self.state.enabled = false;
                }
                self.state.override_active.set(subsystem, active);
            }
            Gate::Fault(kind) => {
                if active {
                    self.state.enabled = false;
                }
                self.state.set_fault_flag(kind, active);
            }
        }

        if self.publish() {
            if was_enabled {
                let cause = match gate {
                    Gate::Override(subsystem) => DisableCause::Override(subsystem),
                    Gate::Fault(kind) => DisableCause::Fault(kind),
                };
                self.emit(Diagnostic::Disabled(cause));
            } else {
                self.emit(Diagnostic::Enabled);
            }
        }
    }

    /// Queue `enabled()` if it differs from the last published value
    fn publish(&mut self) -> bool {
        let enabled = self.enabled();
        let changed = enabled != self.state.last_published_enabled;
        if changed {
            self.outbox.push(ArbitrationEvent::EnabledChanged(enabled));
        }
        self.state.last_published_enabled = enabled;
        changed
    }

    fn emit(&mut self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.outbox.push(ArbitrationEvent::Diagnostic(diagnostic));
    }
}

impl Default for ArbitrationEngine {
    fn default() -> Self {
        Self::new()
    }
}
