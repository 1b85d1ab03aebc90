//! Rate limiting for repeated diagnostics

use std::time::{Duration, Instant};

/// Lets an action through at most once per interval
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True when the interval has passed since the last accepted call
    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }

    /// As [`ready`](Self::ready) against an explicit clock reading
    pub fn ready_at(&mut self, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_passes_then_waits() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_secs(2));

        assert!(throttle.ready_at(start));
        assert!(!throttle.ready_at(start + Duration::from_millis(1999)));
        assert!(throttle.ready_at(start + Duration::from_secs(2)));
        assert!(!throttle.ready_at(start + Duration::from_secs(3)));
    }

    #[test]
    fn test_clock_going_backwards_is_not_ready() {
        let start = Instant::now() + Duration::from_secs(10);
        let mut throttle = Throttle::new(Duration::from_secs(5));

        assert!(throttle.ready_at(start));
        assert!(!throttle.ready_at(start - Duration::from_secs(1)));
    }
}
