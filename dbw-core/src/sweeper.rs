//! Periodic override clearing
//!
//! While arbitration allows overrides to be cleared, every sweep sends a
//! neutral command with the clear bit set for each subsystem the driver still
//! holds, so a stale actuation command never lingers on the bus.

use crate::arbitration::{ArbitrationEngine, Subsystem};
use crate::codec::SignalCodec;
use crate::encoder::CommandEncoder;
use crate::types::{CanFrame, Result};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct FailSafeSweeper {
    period: Duration,
    next_due: Option<Instant>,
}

impl FailSafeSweeper {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a sweep is due at `now`, scheduling the next one if so
    ///
    /// After a long gap only one sweep is due; the schedule restarts from `now`.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(next) if now < next => false,
            Some(next) => {
                let following = next + self.period;
                self.next_due = Some(if following > now {
                    following
                } else {
                    now + self.period
                });
                true
            }
            None => {
                self.next_due = Some(now + self.period);
                true
            }
        }
    }

    /// Neutral clear frames for every held override
    pub fn sweep<C: SignalCodec + ?Sized>(
        &self,
        engine: &ArbitrationEngine,
        encoder: &CommandEncoder,
        codec: &C,
    ) -> Result<Vec<CanFrame>> {
        if !engine.clear_requested() {
            return Ok(Vec::new());
        }

        let overrides = engine.state().override_active;
        Subsystem::ALL
            .into_iter()
            .filter(|subsystem| overrides.get(*subsystem))
            .map(|subsystem| {
                log::trace!("Clearing {} override", subsystem);
                encoder.neutral_clear(codec, subsystem)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitration::FaultKind;
    use crate::codec::DbcCodec;
    use crate::ids;

    #[test]
    fn test_no_override_no_frames() {
        let codec = DbcCodec::builtin().unwrap();
        let sweeper = FailSafeSweeper::new(Duration::from_millis(50));
        let engine = ArbitrationEngine::new();
        let frames = sweeper
            .sweep(&engine, &CommandEncoder::new(), &codec)
            .unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn test_one_frame_per_held_override() {
        let codec = DbcCodec::builtin().unwrap();
        let sweeper = FailSafeSweeper::new(Duration::from_millis(50));
        let mut engine = ArbitrationEngine::new();
        engine.driver_override(Subsystem::Brake, true);
        engine.driver_override(Subsystem::Gear, true);

        let frames = sweeper
            .sweep(&engine, &CommandEncoder::new(), &codec)
            .unwrap();
        let ids: Vec<u32> = frames.iter().map(|f| f.can_id).collect();
        assert_eq!(ids, vec![ids::BRAKE_CMD, ids::GEAR_CMD]);

        // A fault blocks clearing
        engine.report_fault(FaultKind::Brakes, true);
        let frames = sweeper
            .sweep(&engine, &CommandEncoder::new(), &codec)
            .unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn test_due_schedule() {
        let mut sweeper = FailSafeSweeper::new(Duration::from_millis(50));
        let t0 = Instant::now();
        assert!(sweeper.due(t0));
        assert!(!sweeper.due(t0 + Duration::from_millis(49)));
        assert!(sweeper.due(t0 + Duration::from_millis(50)));
        assert!(!sweeper.due(t0 + Duration::from_millis(60)));

        // Long gap: one sweep, then the schedule restarts
        assert!(sweeper.due(t0 + Duration::from_millis(1000)));
        assert!(!sweeper.due(t0 + Duration::from_millis(1040)));
        assert!(sweeper.due(t0 + Duration::from_millis(1050)));
    }
}
