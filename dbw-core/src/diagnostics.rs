//! Operator diagnostics
//!
//! Every human-facing notice the node produces is a [`Diagnostic`] value. It is
//! logged once through the `log` facade at its own level and also handed to
//! the caller, so a host can forward it wherever operators look.

use crate::arbitration::{FaultKind, Subsystem};
use crate::reports::GearReject;
use crate::watchdog::WatchdogSource;
use log::Level;
use serde::Serialize;
use std::fmt;

/// Why the system dropped out of the enabled state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", content = "detail", rename_all = "snake_case")]
pub enum DisableCause {
    /// Explicit disable request
    Request,
    /// Cruise cancel button on the steering wheel
    CancelButton,
    /// Driver acted on an actuator
    Override(Subsystem),
    /// A subsystem or the watchdog reported a fault
    Fault(FaultKind),
}

impl fmt::Display for DisableCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisableCause::Request => Ok(()),
            DisableCause::CancelButton => write!(f, " Cancel button pressed."),
            DisableCause::Override(subsystem) => match subsystem {
                Subsystem::Brake | Subsystem::AcceleratorPedal => {
                    write!(f, " Driver override on brake/Accelerator Pedal pedal.")
                }
                Subsystem::Steering => write!(f, " Driver override on steering wheel."),
                Subsystem::Gear => write!(f, " Driver override on shifter."),
            },
            DisableCause::Fault(kind) => write!(f, " {}.", kind),
        }
    }
}

/// A notice for the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The enabled state was published as true
    Enabled,
    /// Enable accepted but an override still holds the system back
    EnableWaiting,
    /// Enable refused; one notice per active fault
    EnableRefused(FaultKind),
    Disabled(DisableCause),
    /// Subsystem feedback dropped after its command deadline passed
    SubsystemTimeout(Subsystem),
    WatchdogBraking,
    WatchdogDriverControl,
    WatchdogEvent(WatchdogSource),
    WatchdogClearReminder,
    /// Channel fault reminder
    SubsystemFault {
        subsystem: Subsystem,
        channel_1: bool,
        channel_2: bool,
    },
    GearRejected(GearReject),
    /// A command frame on the bus that this node did not send
    ForeignCommand { subsystem: Subsystem, can_id: u32 },
}

impl Diagnostic {
    /// Log level this notice is emitted at
    pub fn level(&self) -> Level {
        match self {
            Diagnostic::Enabled
            | Diagnostic::EnableWaiting
            | Diagnostic::WatchdogDriverControl => Level::Info,
            Diagnostic::Disabled(DisableCause::Fault(_)) => Level::Error,
            _ => Level::Warn,
        }
    }

    /// Log through the `log` facade
    pub fn log(&self) {
        log::log!(self.level(), "{}", self);
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "true, "
    } else {
        "false,"
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Enabled => write!(f, "DBW system enabled."),
            Diagnostic::EnableWaiting => {
                write!(f, "DBW system enable requested. Waiting for ready.")
            }
            Diagnostic::EnableRefused(kind) => write!(f, "DBW system not enabled. {}.", kind),
            Diagnostic::Disabled(cause) => write!(f, "DBW system disabled.{}", cause),
            Diagnostic::SubsystemTimeout(subsystem) => write!(
                f,
                "{} subsystem disabled after 100ms command timeout",
                subsystem
            ),
            Diagnostic::WatchdogBraking => {
                write!(f, "Watchdog event: Alerting driver and applying brakes.")
            }
            Diagnostic::WatchdogDriverControl => {
                write!(f, "Watchdog event: Driver has successfully taken control.")
            }
            Diagnostic::WatchdogEvent(source) => write!(f, "Watchdog event: {}", source),
            Diagnostic::WatchdogClearReminder => write!(
                f,
                "Watchdog event: Press left OK button on the steering wheel or cycle power to clear event."
            ),
            Diagnostic::SubsystemFault {
                subsystem: Subsystem::Steering,
                ..
            } => write!(f, "Steering fault: true"),
            Diagnostic::SubsystemFault {
                subsystem,
                channel_1,
                channel_2,
            } => write!(
                f,
                "{} fault. FLT1: {} FLT2: {}",
                subsystem,
                yes_no(*channel_1),
                yes_no(*channel_2)
            ),
            Diagnostic::GearRejected(reject) => {
                write!(f, "Gear shift rejected: {}", reject.description())
            }
            Diagnostic::ForeignCommand { subsystem, can_id } => write!(
                f,
                "DBW system: Another node on the CAN bus is commanding the vehicle!!! Subsystem: {}. Id: 0x{:03X}",
                subsystem, can_id
            ),
        }
    }
}
