//! Printing node outputs

use crate::config::OutputFormat;
use anyhow::{Context, Result};
use dbw_core::{NodeOutput, Report};
use serde::Serialize;
use std::io::Write;

/// One output line, stamped with the session time it was produced at
#[derive(Serialize)]
struct Stamped<'a> {
    t: f64,
    #[serde(flatten)]
    output: &'a NodeOutput,
}

/// Writes node outputs in the configured format
pub struct OutputWriter {
    format: OutputFormat,
    sink: Box<dyn Write>,
    written: usize,
}

impl OutputWriter {
    pub fn new(format: OutputFormat, sink: Box<dyn Write>) -> Self {
        Self {
            format,
            sink,
            written: 0,
        }
    }

    /// Write every output produced at offset `t` (seconds)
    pub fn write_all(&mut self, t: f64, outputs: &[NodeOutput]) -> Result<()> {
        for output in outputs {
            match self.format {
                OutputFormat::Json => {
                    serde_json::to_writer(&mut self.sink, &Stamped { t, output })
                        .context("Failed to serialize output")?;
                    writeln!(self.sink)?;
                }
                OutputFormat::Text => writeln!(self.sink, "{:>10.3}  {}", t, describe(output))?,
            }
            self.written += 1;
        }
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush().context("Failed to flush output")
    }
}

/// Single-line human rendering
pub fn describe(output: &NodeOutput) -> String {
    match output {
        NodeOutput::Enabled(enabled) => format!("ENABLED   {}", enabled),
        NodeOutput::Vin(vin) => format!("VIN       {}", vin),
        NodeOutput::Transmit(frame) => {
            let bytes: Vec<String> = frame.data.iter().map(|b| format!("{:02X}", b)).collect();
            format!("TX        0x{:03X} [{}] {}", frame.can_id, frame.dlc(), bytes.join(" "))
        }
        NodeOutput::Diagnostic(diagnostic) => {
            format!("{:<9} {}", diagnostic.level().as_str(), diagnostic)
        }
        NodeOutput::JointStates(state) => {
            let joints: Vec<String> = state
                .joints
                .iter()
                .map(|j| format!("{}={:.3}", j.name, j.position))
                .collect();
            format!("JOINTS    {}", joints.join(" "))
        }
        NodeOutput::Report(report) => format!("REPORT    {}", describe_report(report)),
    }
}

fn describe_report(report: &Report) -> String {
    match report {
        Report::Brake(r) => format!(
            "brake input={:.1}% output={:.1}% enabled={} driver={}",
            r.pedal_input, r.pedal_output, r.enabled, r.driver
        ),
        Report::AcceleratorPedal(r) => format!(
            "accelerator_pedal input={:.1}% output={:.1}% enabled={} driver={}",
            r.pedal_input, r.pedal_output, r.enabled, r.driver
        ),
        Report::Steering(r) => format!(
            "steering angle={:.1}deg cmd={:.1}deg enabled={} driver={}",
            r.steering_wheel_angle.to_degrees(),
            r.steering_wheel_angle_cmd.to_degrees(),
            r.enabled,
            r.driver_override
        ),
        Report::Gear(r) => format!("gear state={:?} enabled={}", r.state, r.enabled),
        Report::Misc(r) => format!(
            "misc speed={:.2}m/s fuel={:.1}% build={}",
            r.vehicle_speed, r.fuel_level, r.software_build_number
        ),
        other => other.name().to_string(),
    }
}
