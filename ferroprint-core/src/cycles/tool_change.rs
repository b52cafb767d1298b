//! Tool change (`T<n>`)

use super::CycleContext;
use crate::engine::Outcome;
use crate::error::CommandError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum ToolChangePhase {
    /// Put the old tool's heaters on standby
    StandbyOld,
    /// Optionally wait for the old tool to reach standby temperature
    WaitOldCool,
    /// Make the new tool's heaters active
    SelectNew,
    /// Wait for the new tool to reach its active temperature
    WaitNewHeat,
    /// Switch the selection; later moves use the new offsets
    Activate,
}

/// Tool change cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ToolChange {
    old: Option<i32>,
    new: Option<i32>,
    phase: ToolChangePhase,
}

impl ToolChange {
    /// Change from `old` to `new`; `None` means no tool
    pub fn new(old: Option<i32>, new: Option<i32>) -> Self {
        Self {
            old,
            new,
            phase: ToolChangePhase::StandbyOld,
        }
    }

    /// Tool being selected
    pub fn target(&self) -> Option<i32> {
        self.new
    }

    pub(crate) fn step(&mut self, cx: &mut CycleContext<'_>) -> Outcome {
        match self.phase {
            ToolChangePhase::StandbyOld => {
                if let Some(tool) = self.old.and_then(|n| cx.tools.get_mut(n)) {
                    tool.standby(cx.thermal);
                }
                self.phase = ToolChangePhase::WaitOldCool;
                Outcome::Pending
            }
            ToolChangePhase::WaitOldCool => {
                let cooling = cx.config.wait_for_standby
                    && self
                        .old
                        .and_then(|n| cx.tools.get(n))
                        .is_some_and(|t| !t.at_temperature(&*cx.thermal));
                if !cooling {
                    self.phase = ToolChangePhase::SelectNew;
                }
                Outcome::Pending
            }
            ToolChangePhase::SelectNew => {
                let Some(number) = self.new else {
                    cx.tools.deselect();
                    return Outcome::Done;
                };
                match cx.tools.get_mut(number) {
                    Some(tool) => tool.activate(cx.thermal),
                    None => return Outcome::Error(CommandError::UnknownTool(number)),
                }
                self.phase = ToolChangePhase::WaitNewHeat;
                Outcome::Pending
            }
            ToolChangePhase::WaitNewHeat => {
                let heated = self
                    .new
                    .and_then(|n| cx.tools.get(n))
                    .map_or(true, |t| t.at_temperature(&*cx.thermal));
                if heated {
                    self.phase = ToolChangePhase::Activate;
                }
                Outcome::Pending
            }
            ToolChangePhase::Activate => match self.new {
                Some(number) => match cx.tools.select(number) {
                    Ok(()) => Outcome::Done,
                    Err(e) => Outcome::Error(e),
                },
                None => Outcome::Done,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycles::harness::Bench;
    use crate::cycles::Cycle;
    use crate::tool::Tool;
    use crate::traits::heater_for_extruder;

    fn bench_with_tools() -> Bench {
        let mut bench = Bench::new();
        for n in 0..2 {
            let mut tool = Tool::new(n, &[n as u8], &[heater_for_extruder(n as u8)]).unwrap();
            tool.set_active_temperatures(&[200.0 + n as f32]);
            tool.set_standby_temperatures(&[150.0]);
            tool.offsets = [n as f32, 0.0, 0.0];
            bench.tools.define(tool).unwrap();
        }
        bench
    }

    #[test]
    fn test_change_sequence() {
        let mut bench = bench_with_tools();
        bench.tools.select(0).unwrap();
        let h0 = heater_for_extruder(0).index();
        let h1 = heater_for_extruder(1).index();
        bench.thermal.active[h0] = true;

        let mut cycle = Cycle::ToolChange(ToolChange::new(Some(0), Some(1)));
        let (outcome, ticks) = bench.run(&mut cycle, 1, 20);
        assert_eq!(outcome, Outcome::Done);
        assert_eq!(ticks, 5);

        assert!(!bench.thermal.active[h0]);
        assert_eq!(bench.thermal.standby_targets[h0], 150.0);
        assert!(bench.thermal.active[h1]);
        assert_eq!(bench.thermal.targets[h1], 201.0);
        assert_eq!(bench.tools.current_number(), Some(1));
        assert_eq!(bench.tools.current_offsets(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_waits_for_new_heater() {
        let mut bench = bench_with_tools();
        let h1 = heater_for_extruder(1).index();
        bench.thermal.at_target[h1] = false;

        let mut cycle = Cycle::ToolChange(ToolChange::new(None, Some(1)));
        assert_eq!(bench.run(&mut cycle, 1, 10).0, Outcome::Pending);
        assert_eq!(bench.tools.current_number(), None);

        bench.thermal.at_target[h1] = true;
        assert_eq!(bench.run(&mut cycle, 1, 10).0, Outcome::Done);
        assert_eq!(bench.tools.current_number(), Some(1));
    }

    #[test]
    fn test_optional_wait_for_standby() {
        let mut bench = bench_with_tools();
        bench.tools.select(0).unwrap();
        bench.config.wait_for_standby = true;
        let h0 = heater_for_extruder(0).index();
        bench.thermal.at_target[h0] = false;

        let mut cycle = Cycle::ToolChange(ToolChange::new(Some(0), Some(1)));
        assert_eq!(bench.run(&mut cycle, 1, 10).0, Outcome::Pending);
        bench.thermal.at_target[h0] = true;
        assert_eq!(bench.run(&mut cycle, 1, 10).0, Outcome::Done);
    }

    #[test]
    fn test_deselect() {
        let mut bench = bench_with_tools();
        bench.tools.select(1).unwrap();
        let mut cycle = Cycle::ToolChange(ToolChange::new(Some(1), None));
        assert_eq!(bench.run(&mut cycle, 1, 10).0, Outcome::Done);
        assert_eq!(bench.tools.current_number(), None);
        assert_eq!(bench.tools.current_offsets(), [0.0; 3]);
    }
}
