//! Scripted sessions
//!
//! A session is a JSON Lines file, one timed event per line:
//!
//! ```text
//! {"t": 0.00, "event": "frame", "can_id": 97, "data": [0, 0, 0, 0, 0, 0, 0, 0]}
//! {"t": 0.02, "event": "enable"}
//! {"t": 0.03, "event": "command", "command": "brake", "pedal_cmd": 25.0, "rolling_counter": 1}
//! ```

use anyhow::{Context, Result};
use dbw_core::{CanFrame, Command};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// What happens at one point of a session
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Frame {
        can_id: u32,
        #[serde(default)]
        data: Vec<u8>,
    },
    Enable,
    Disable,
    Command(Command),
}

/// An event with its offset into the session
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimedEvent {
    /// Seconds since the start of the session
    pub t: f64,
    #[serde(flatten)]
    pub event: SessionEvent,
}

impl TimedEvent {
    pub fn offset_ns(&self) -> u64 {
        (self.t.max(0.0) * 1e9).round() as u64
    }
}

/// Parse a whole session file
pub fn read_session(path: &Path) -> Result<Vec<TimedEvent>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session file: {:?}", path))?;
    let events = parse_session(&content).with_context(|| format!("In session {:?}", path))?;
    log::info!("Read {} session events from {:?}", events.len(), path);
    Ok(events)
}

pub fn parse_session(content: &str) -> Result<Vec<TimedEvent>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid event on line {}", index + 1))
        })
        .collect()
}

/// Session frames are standard data frames stamped with their offset
pub fn session_frame(can_id: u32, data: &[u8], offset_ns: u64) -> CanFrame {
    let mut frame = CanFrame::new(can_id, data.to_vec());
    frame.timestamp_ns = offset_ns;
    frame.is_extended = can_id > 0x7FF;
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbw_core::{BrakeCmd, SteeringCommandType};

    #[test]
    fn test_parse_session_lines() {
        let content = r#"
{"t": 0.0, "event": "frame", "can_id": 97, "data": [1, 2]}
{"t": 0.02, "event": "enable"}

{"t": 0.05, "event": "command", "command": "brake", "pedal_cmd": 25.0, "rolling_counter": 1}
{"t": 0.06, "event": "command", "command": "steering", "command_type": "torque"}
"#;
        let events = parse_session(content).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0].event,
            SessionEvent::Frame {
                can_id: 97,
                data: vec![1, 2]
            }
        );
        assert_eq!(events[1].event, SessionEvent::Enable);
        assert_eq!(events[1].offset_ns(), 20_000_000);
        assert_eq!(
            events[2].event,
            SessionEvent::Command(Command::Brake(BrakeCmd {
                pedal_cmd: 25.0,
                rolling_counter: 1,
                ..Default::default()
            }))
        );
        let SessionEvent::Command(Command::Steering(steering)) = &events[3].event else {
            panic!("expected a steering command");
        };
        assert_eq!(steering.command_type, SteeringCommandType::Torque);
    }

    #[test]
    fn test_bad_line_reports_position() {
        let err = parse_session("{\"t\": 0.0, \"event\": \"enable\"}\n{\"t\": 1}\n").unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }
}
