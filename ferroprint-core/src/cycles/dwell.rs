//! Dwell (`G4`)

use super::CycleContext;
use crate::engine::Outcome;

/// Pause after all queued motion has finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dwell {
    remaining_ms: i64,
    waiting_for_moves: bool,
}

impl Dwell {
    /// Dwell for `ms` milliseconds
    pub fn new(ms: i64) -> Self {
        Self {
            remaining_ms: ms,
            waiting_for_moves: true,
        }
    }

    /// Time left once the queue has drained
    pub fn remaining_ms(&self) -> i64 {
        self.remaining_ms
    }

    pub(crate) fn step(&mut self, cx: &mut CycleContext<'_>) -> Outcome {
        if self.waiting_for_moves {
            if !cx.slot.drained(cx.motion) {
                return Outcome::Pending;
            }
            self.waiting_for_moves = false;
        } else {
            self.remaining_ms -= i64::from(cx.elapsed_ms);
        }

        if self.remaining_ms <= 0 {
            Outcome::Done
        } else {
            Outcome::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycles::harness::Bench;
    use crate::cycles::Cycle;

    #[test]
    fn test_dwell_counts_down_after_drain() {
        let mut bench = Bench::new();
        bench.motion.drained = false;
        let mut cycle = Cycle::Dwell(Dwell::new(25));

        for _ in 0..3 {
            assert_eq!(bench.tick(&mut cycle, 10), Outcome::Pending);
        }
        assert_eq!(cycle, Cycle::Dwell(Dwell::new(25)));

        bench.motion.drained = true;
        assert_eq!(bench.tick(&mut cycle, 10), Outcome::Pending);
        assert_eq!(bench.tick(&mut cycle, 10), Outcome::Pending);
        assert_eq!(bench.tick(&mut cycle, 10), Outcome::Pending);
        assert_eq!(bench.tick(&mut cycle, 10), Outcome::Done);
    }

    #[test]
    fn test_zero_dwell_finishes_on_drain() {
        let mut bench = Bench::new();
        let mut cycle = Cycle::Dwell(Dwell::new(0));
        assert_eq!(bench.tick(&mut cycle, 0), Outcome::Done);
    }
}
