//! Sweep scheduling on the replayed session clock

/// Fixed-period sweep deadlines, in nanoseconds since the session start
#[derive(Debug, Clone)]
pub struct SweepSchedule {
    period_ns: u64,
    /// None once the clock has run past the representable range
    next_ns: Option<u64>,
}

impl SweepSchedule {
    pub fn new(period_ns: u64) -> Self {
        Self {
            period_ns: period_ns.max(1),
            next_ns: Some(0),
        }
    }

    /// The next sweep due at or before `offset_ns`, if any
    ///
    /// After a gap longer than one period only the last missed boundary is
    /// due; the schedule continues from there.
    pub fn next_due(&mut self, offset_ns: u64) -> Option<u64> {
        let next = self.next_ns.filter(|next| *next <= offset_ns)?;
        let missed = (offset_ns - next) / self.period_ns;
        let due = next + missed * self.period_ns;
        self.next_ns = due.checked_add(self.period_ns);
        Some(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_session;

    const PERIOD_NS: u64 = 50_000_000;

    fn drain(schedule: &mut SweepSchedule, offset_ns: u64) -> Vec<u64> {
        std::iter::from_fn(|| schedule.next_due(offset_ns)).collect()
    }

    #[test]
    fn test_every_boundary_on_dense_traffic() {
        let mut schedule = SweepSchedule::new(PERIOD_NS);
        let mut sweeps = Vec::new();
        for offset_ns in (0..=120_000_000).step_by(10_000_000) {
            sweeps.extend(drain(&mut schedule, offset_ns));
        }
        assert_eq!(sweeps, vec![0, 50_000_000, 100_000_000]);
    }

    #[test]
    fn test_long_gap_runs_one_sweep() {
        let mut schedule = SweepSchedule::new(PERIOD_NS);
        assert_eq!(drain(&mut schedule, 0), vec![0]);
        assert_eq!(drain(&mut schedule, 1_030_000_000), vec![1_000_000_000]);
        assert_eq!(drain(&mut schedule, 1_060_000_000), vec![1_050_000_000]);
    }

    #[test]
    fn test_far_session_event_is_bounded() {
        let events = parse_session(
            "{\"t\": 0.0, \"event\": \"enable\"}\n{\"t\": 1e9, \"event\": \"disable\"}\n",
        )
        .unwrap();
        let mut schedule = SweepSchedule::new(PERIOD_NS);

        let sweeps: Vec<u64> = events
            .iter()
            .flat_map(|event| drain(&mut schedule, event.offset_ns()))
            .collect();
        assert_eq!(sweeps, vec![0, 1_000_000_000_000_000_000]);
    }

    #[test]
    fn test_end_of_clock_stops() {
        let mut schedule = SweepSchedule::new(PERIOD_NS);
        let sweeps = drain(&mut schedule, u64::MAX);
        assert_eq!(sweeps.len(), 1);
        assert!(schedule.next_due(u64::MAX).is_none());

        let mut zero = SweepSchedule::new(0);
        assert_eq!(drain(&mut zero, 3), vec![3]);
    }
}
