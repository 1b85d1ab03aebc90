//! Drive-by-Wire Supervisory Core
//!
//! Arbitration between computer commands and the human driver for a by-wire
//! vehicle kit on a CAN bus. The library decides, at every input, whether
//! commands may actuate brake, accelerator pedal, steering and gear.
//!
//! # Architecture
//!
//! - A signal dictionary (DBC) describes every frame; [`DbcCodec`] turns frames
//!   into named physical signals and back through the [`SignalCodec`] trait
//! - [`ReportDecoder`] maps report frames to typed [`Report`]s
//! - [`ArbitrationEngine`] owns the enable/fault/override state and publishes
//!   every change of the enabled state exactly once
//! - [`CommandEncoder`] builds command frames, neutral unless enabled
//! - [`FailSafeSweeper`] periodically clears held driver overrides
//! - [`DbwNode`] wires them together behind `&mut self`
//!
//! The library does NOT:
//! - Talk to a CAN interface
//! - Schedule its own timers (the host calls [`DbwNode::poll_sweep`])
//! - Publish anywhere (outputs are drained with [`DbwNode::take_outputs`])
//!
//! # Example Usage
//!
//! ```no_run
//! use dbw_core::{CanFrame, DbwConfig, DbwNode, NodeOutput};
//! use std::time::Instant;
//!
//! let mut node = DbwNode::new(DbwConfig::default()).unwrap();
//!
//! // Frames from the bus
//! node.handle_frame(&CanFrame::new(0x061, vec![0; 8]));
//! node.poll_sweep(Instant::now()).unwrap();
//!
//! for output in node.take_outputs() {
//!     match output {
//!         NodeOutput::Enabled(enabled) => println!("enabled: {}", enabled),
//!         NodeOutput::Transmit(frame) => println!("tx 0x{:03X}", frame.can_id),
//!         other => println!("{:?}", other),
//!     }
//! }
//! ```

// Public modules
pub mod arbitration;
pub mod codec;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod encoder;
pub mod ids;
pub mod joints;
pub mod node;
pub mod report_decoder;
pub mod reports;
pub mod signals;
pub mod sweeper;
pub mod types;
pub mod vin;
pub mod watchdog;

// Internal modules (not exposed in public API)
mod throttle;

// Re-export main types for convenience
pub use arbitration::{
    ArbitrationEngine, ArbitrationEvent, ArbitrationState, FaultKind, Subsystem, SubsystemFlags,
};
pub use codec::{DbcCodec, SignalCodec};
pub use commands::{
    AcceleratorPedalCmd, BrakeCmd, Command, ControlMode, GearCmd, MiscCmd, SteeringCmd,
    SteeringCommandType,
};
pub use config::DbwConfig;
pub use diagnostics::{Diagnostic, DisableCause};
pub use encoder::{CommandEncoder, Permission};
pub use joints::{AckermannGeometry, JointSample, JointState};
pub use node::{DbwNode, NodeOutput};
pub use report_decoder::{Decoded, ReportDecoder};
pub use reports::*;
pub use signals::DatabaseStats;
pub use sweeper::FailSafeSweeper;
pub use types::{CanFrame, DbwError, Result, SignalSet, SignalValue, Timestamp};
pub use watchdog::WatchdogSource;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: the built-in dictionary covers every node message
        let codec = DbcCodec::builtin().unwrap();
        assert_eq!(codec.stats().num_messages, 18);
        assert!(DbwNode::with_codec(DbwConfig::default(), codec).is_ok());
        assert!(!VERSION.is_empty());
    }
}
