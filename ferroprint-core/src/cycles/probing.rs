//! Z probing (`G30`, `G32`)
//!
//! Each point goes through the same phases: travel to the point at dive
//! height, probe downward with endstop checking, record the result, then
//! either move on to the next point or fit the bed plane.

use super::CycleContext;
use crate::bed::{ProbeTable, MAX_PROBE_POINTS};
use crate::engine::Outcome;
use crate::error::CommandError;
use crate::motion::{Axis, PendingMove};
use crate::traits::Motion;

/// What a probing cycle is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProbeMode {
    /// Probe at the current X, Y and set Z from the trigger height
    Here,
    /// Probe table point `index`; with `commit`, fit the plane through
    /// points `0..=index` afterwards
    Point { index: usize, commit: bool },
    /// Probe table points `0..count` and fit the plane
    Bed { count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum ProbePhase {
    MovingToPoint,
    Probing,
    Recording,
    AdvanceOrDone,
}

/// Probing cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Probing {
    mode: ProbeMode,
    /// Probe table index of the point in progress
    index: usize,
    phase: ProbePhase,
    /// The move for the current phase has been staged
    issued: bool,
}

impl Probing {
    /// Start a probing cycle
    pub fn new(mode: ProbeMode) -> Result<Self, CommandError> {
        let (index, phase) = match mode {
            ProbeMode::Here => (0, ProbePhase::Probing),
            ProbeMode::Point { index, .. } if index < MAX_PROBE_POINTS => {
                (index, ProbePhase::MovingToPoint)
            }
            ProbeMode::Bed { count } if (3..=MAX_PROBE_POINTS).contains(&count) => {
                (0, ProbePhase::MovingToPoint)
            }
            ProbeMode::Bed { .. } => return Err(CommandError::BedFitFailed),
            ProbeMode::Point { .. } => return Err(CommandError::InvalidProbePoint),
        };
        Ok(Self {
            mode,
            index,
            phase,
            issued: false,
        })
    }

    /// Cycle purpose
    pub fn mode(&self) -> ProbeMode {
        self.mode
    }

    pub(crate) fn step(&mut self, cx: &mut CycleContext<'_>) -> Outcome {
        match self.phase {
            ProbePhase::MovingToPoint => {
                if !self.issued {
                    if !cx.slot.is_free() {
                        return Outcome::Pending;
                    }
                    let Some(point) = cx.probes.get(self.index).copied() else {
                        return Outcome::Error(CommandError::InvalidProbePoint);
                    };
                    let probe = &cx.config.probe;
                    let mut mv = PendingMove::from_position(cx.slot.position(), probe.travel_feedrate);
                    mv.set_axis(Axis::X, point.x);
                    mv.set_axis(Axis::Y, point.y);
                    mv.set_axis(Axis::Z, probe.dive_height);
                    cx.slot.stage(mv);
                    self.issued = true;
                    return Outcome::Pending;
                }
                if cx.slot.drained(cx.motion) {
                    self.phase = ProbePhase::Probing;
                    self.issued = false;
                }
                Outcome::Pending
            }
            ProbePhase::Probing => {
                if !self.issued {
                    if !cx.slot.is_free() {
                        return Outcome::Pending;
                    }
                    let probe = &cx.config.probe;
                    let mut mv = PendingMove::from_position(cx.slot.position(), probe.feedrate);
                    mv.set_axis(Axis::Z, probe.travel_limit);
                    mv.check_endstops = true;
                    cx.slot.stage(mv);
                    self.issued = true;
                    return Outcome::Pending;
                }
                if cx.slot.drained(cx.motion) {
                    self.phase = ProbePhase::Recording;
                    self.issued = false;
                }
                Outcome::Pending
            }
            ProbePhase::Recording => {
                if !cx.motion.endstop_triggered() {
                    warn!("probe did not trigger at point {}", self.index);
                    let position = cx.motion.current_position();
                    cx.slot.sync_axes(&position);
                    return Outcome::Error(CommandError::ProbeNotTriggered);
                }
                let mut position = cx.motion.current_position();
                let trigger_height = cx.config.probe.trigger_height;

                if self.mode == ProbeMode::Here {
                    position[Axis::Z.index()] = trigger_height;
                    cx.motion.set_position(&position);
                    cx.slot.sync_axes(&position);
                    cx.slot.set_homed(Axis::Z, true);
                    return Outcome::Done;
                }

                cx.slot.sync_axes(&position);
                let z = position[Axis::Z.index()] - trigger_height;
                cx.probes.record(self.index, z);
                debug!("probe point {} z={}", self.index, z);
                self.phase = ProbePhase::AdvanceOrDone;
                Outcome::Pending
            }
            ProbePhase::AdvanceOrDone => match self.mode {
                ProbeMode::Point { commit: false, .. } => Outcome::Done,
                ProbeMode::Point { index, commit: true } => {
                    commit_plane(cx.probes, index + 1, cx.motion)
                }
                ProbeMode::Bed { count } if self.index + 1 < count => {
                    self.index += 1;
                    self.phase = ProbePhase::MovingToPoint;
                    Outcome::Pending
                }
                ProbeMode::Bed { count } => commit_plane(cx.probes, count, cx.motion),
                ProbeMode::Here => Outcome::Done,
            },
        }
    }
}

/// Fit the plane through the first `count` probe points and install it
pub fn commit_plane(probes: &ProbeTable, count: usize, motion: &mut dyn Motion) -> Outcome {
    match probes.fit(count) {
        Some(plane) => {
            info!("bed plane a={} b={} c={}", plane.a, plane.b, plane.c);
            motion.set_bed_transform(Some(plane));
            Outcome::Done
        }
        None => Outcome::Error(CommandError::BedFitFailed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycles::harness::Bench;
    use crate::cycles::Cycle;

    fn bench_with_points() -> Bench {
        let mut bench = Bench::new();
        bench.probes.set_location(0, 10.0, 10.0);
        bench.probes.set_location(1, 190.0, 10.0);
        bench.probes.set_location(2, 100.0, 190.0);
        bench
    }

    #[test]
    fn test_probe_here_sets_z() {
        let mut bench = Bench::new();
        bench.motion.trigger_at = Some(-0.3);
        let mut cycle = Cycle::Probing(Probing::new(ProbeMode::Here).unwrap());

        assert_eq!(bench.run(&mut cycle, 1, 20).0, Outcome::Done);
        assert_eq!(bench.slot.axis_position(Axis::Z), bench.config.probe.trigger_height);
        assert!(bench.slot.is_homed(Axis::Z));
        assert_eq!(bench.motion.submitted.len(), 1);
        assert!(bench.motion.submitted[0].check_endstops);
    }

    #[test]
    fn test_probe_not_triggered() {
        let mut bench = bench_with_points();
        let mut cycle = Cycle::Probing(
            Probing::new(ProbeMode::Point {
                index: 0,
                commit: false,
            })
            .unwrap(),
        );
        assert_eq!(
            bench.run(&mut cycle, 1, 20).0,
            Outcome::Error(CommandError::ProbeNotTriggered)
        );
        assert!(bench.probes.get(0).unwrap().z.is_none());
    }

    #[test]
    fn test_single_point_records_height() {
        let mut bench = bench_with_points();
        bench.motion.trigger_at = Some(1.0);
        let mut cycle = Cycle::Probing(
            Probing::new(ProbeMode::Point {
                index: 1,
                commit: false,
            })
            .unwrap(),
        );
        assert_eq!(bench.run(&mut cycle, 1, 20).0, Outcome::Done);

        let point = bench.probes.get(1).unwrap();
        let expected = 1.0 - bench.config.probe.trigger_height;
        assert_eq!(point.z, Some(expected));
        // Travel move then probing move
        assert_eq!(bench.motion.submitted.len(), 2);
        assert_eq!(bench.motion.submitted[0].axis(Axis::X), 190.0);
        assert!(bench.motion.transform.is_none());
    }

    #[test]
    fn test_bed_probe_fits_plane() {
        let mut bench = bench_with_points();
        bench.motion.trigger_at = Some(bench.config.probe.trigger_height);
        let mut cycle = Cycle::Probing(Probing::new(ProbeMode::Bed { count: 3 }).unwrap());

        assert_eq!(bench.run(&mut cycle, 1, 50).0, Outcome::Done);
        assert_eq!(bench.motion.submitted.len(), 6);
        let plane = bench.motion.transform.unwrap();
        assert!(plane.height_at(50.0, 50.0) < 1e-4 && plane.height_at(50.0, 50.0) > -1e-4);
    }

    #[test]
    fn test_invalid_requests() {
        assert_eq!(
            Probing::new(ProbeMode::Point {
                index: MAX_PROBE_POINTS,
                commit: false
            }),
            Err(CommandError::InvalidProbePoint)
        );
        assert_eq!(
            Probing::new(ProbeMode::Bed { count: 2 }),
            Err(CommandError::BedFitFailed)
        );
    }
}
