//! Queued motion planner with virtual endstops
//!
//! Moves are accepted into a fixed-depth queue and executed one after
//! another as [`QueuedMotion::tick`] advances time. Each move takes as
//! long as its longest single-drive travel at the requested feedrate.
//!
//! The planner keeps a physical position that the engine never sees
//! directly. [`Motion::set_position`] only changes the offset between
//! physical and logical coordinates, so homing against an endstop that
//! sits somewhere other than logical zero behaves as on a real machine.
//!
//! Endstop-checked moves stop where a virtual switch would trip: the
//! per-axis minimum endstop for X and Y, and for Z either the probe
//! surface (when a probe is fitted) or the Z endstop.

use heapless::Deque;

use ferroprint_core::bed::BedTransform;
use ferroprint_core::motion::{Axis, PendingMove, AXES, DRIVES, EXTRUDERS};
use ferroprint_core::traits::{Motion, Submit};

/// Number of moves the planner buffers
pub const QUEUE_DEPTH: usize = 8;

/// Z probe over a (possibly tilted) bed
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SimProbe {
    /// Physical bed surface
    pub bed: BedTransform,
    /// Nozzle height above the bed at which the probe triggers
    pub trigger_height: f32,
}

impl SimProbe {
    /// Physical Z at which the probe triggers over (x, y)
    pub fn trigger_z(&self, x: f32, y: f32) -> f32 {
        self.bed.height_at(x, y) + self.trigger_height
    }
}

/// One accepted move, already resolved to its physical end point
#[derive(Debug, Clone, Copy)]
struct Segment {
    end: [f32; AXES],
    extrusion: [f32; EXTRUDERS],
    duration_ms: u32,
    check_endstops: bool,
    triggered: bool,
}

/// Simulated motion planner
pub struct QueuedMotion {
    queue: Deque<Segment, QUEUE_DEPTH>,
    /// Time spent on the front segment
    progress_ms: u32,
    /// Where the tool physically is
    physical: [f32; AXES],
    /// Physical end of the last queued segment
    planned: [f32; AXES],
    /// physical - logical, per axis
    offset: [f32; AXES],
    /// Physical trip point of each axis minimum endstop
    endstops: [Option<f32>; AXES],
    probe: Option<SimProbe>,
    triggered: bool,
    extruded: [f32; EXTRUDERS],
    enabled: bool,
    transform: Option<BedTransform>,
    completed: u32,
}

impl Default for QueuedMotion {
    fn default() -> Self {
        Self::new([0.0; AXES])
    }
}

fn magnitude(v: f32) -> f32 {
    if v < 0.0 {
        -v
    } else {
        v
    }
}

/// Check if travelling from `from` to `to` passes `stop`
fn crosses(from: f32, to: f32, stop: f32) -> bool {
    (from >= stop && stop >= to) || (from <= stop && stop <= to)
}

impl QueuedMotion {
    /// Create a planner resting at a physical position
    ///
    /// The logical position starts equal to the physical one.
    pub fn new(physical: [f32; AXES]) -> Self {
        Self {
            queue: Deque::new(),
            progress_ms: 0,
            physical,
            planned: physical,
            offset: [0.0; AXES],
            endstops: [None; AXES],
            probe: None,
            triggered: false,
            extruded: [0.0; EXTRUDERS],
            enabled: false,
            transform: None,
            completed: 0,
        }
    }

    /// Fit a minimum endstop on an axis at a physical coordinate
    pub fn with_endstop(mut self, axis: Axis, at: f32) -> Self {
        self.endstops[axis.index()] = Some(at);
        self
    }

    /// Fit a Z probe
    pub fn with_probe(mut self, probe: SimProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Advance time, completing moves as they finish
    ///
    /// # Arguments
    /// * `elapsed_ms` - Time since the previous call
    pub fn tick(&mut self, elapsed_ms: u32) {
        let mut budget = elapsed_ms;
        while let Some(front) = self.queue.front().copied() {
            let left = front.duration_ms.saturating_sub(self.progress_ms);
            if budget < left {
                self.progress_ms += budget;
                return;
            }
            budget -= left;
            self.progress_ms = 0;
            self.queue.pop_front();
            self.complete(&front);
        }
    }

    fn complete(&mut self, segment: &Segment) {
        self.physical = segment.end;
        for (total, e) in self.extruded.iter_mut().zip(segment.extrusion) {
            *total += e;
        }
        if segment.check_endstops {
            self.triggered = segment.triggered;
            if segment.triggered {
                debug!("endstop triggered");
            }
        }
        self.completed += 1;
    }

    /// Physical trip point for an endstop-checked move of one axis
    fn stop_for(&self, axis: usize, at: &[f32; AXES]) -> Option<f32> {
        match self.probe {
            Some(probe) if axis == Axis::Z.index() => {
                Some(probe.trigger_z(at[Axis::X.index()], at[Axis::Y.index()]))
            }
            _ => self.endstops[axis],
        }
    }

    /// Resolve a move against the current plan
    fn plan(&self, mv: &PendingMove) -> Segment {
        let start = self.planned;
        let mut end = start;
        for i in 0..AXES {
            if mv.active[i] {
                end[i] = mv.coords[i] + self.offset[i];
            }
        }

        let mut triggered = false;
        if mv.check_endstops {
            // X/Y stops resolve first so the probe sees where it ends up
            for i in 0..AXES {
                if !mv.active[i] {
                    continue;
                }
                if let Some(stop) = self.stop_for(i, &end) {
                    if crosses(start[i], end[i], stop) {
                        end[i] = stop;
                        triggered = true;
                    }
                }
            }
        }

        let mut extrusion = [0.0; EXTRUDERS];
        for (e, i) in extrusion.iter_mut().zip(AXES..DRIVES) {
            if mv.active[i] {
                *e = mv.coords[i];
            }
        }

        let travel = (0..AXES)
            .map(|i| magnitude(end[i] - start[i]))
            .chain(extrusion.iter().map(|&e| magnitude(e)))
            .fold(0.0f32, |a, b| if b > a { b } else { a });
        let duration_ms = if mv.feedrate > 0.0 {
            (travel / mv.feedrate * 1000.0) as u32
        } else {
            0
        };

        Segment {
            end,
            extrusion,
            duration_ms,
            check_endstops: mv.check_endstops,
            triggered,
        }
    }

    /// Physical position of each axis
    pub fn physical_position(&self) -> [f32; AXES] {
        self.physical
    }

    /// Total filament pushed by each extruder
    pub fn extruded(&self) -> [f32; EXTRUDERS] {
        self.extruded
    }

    /// Check if the motor drivers are powered
    pub fn drives_enabled(&self) -> bool {
        self.enabled
    }

    /// Installed bed-levelling plane
    pub fn bed_transform(&self) -> Option<BedTransform> {
        self.transform
    }

    /// Number of moves executed so far
    pub fn completed(&self) -> u32 {
        self.completed
    }

    /// Number of moves waiting or in progress
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl Motion for QueuedMotion {
    fn submit(&mut self, mv: &PendingMove) -> Submit {
        if self.queue.is_full() {
            return Submit::Busy;
        }
        let segment = self.plan(mv);
        if self.queue.push_back(segment).is_err() {
            return Submit::Busy;
        }
        trace!("queued move, {} ms", segment.duration_ms);
        self.planned = segment.end;
        self.enabled = true;
        Submit::Accepted
    }

    fn queue_drained(&self) -> bool {
        self.queue.is_empty()
    }

    fn current_position(&self) -> [f32; AXES] {
        let mut logical = self.physical;
        for (l, o) in logical.iter_mut().zip(self.offset) {
            *l -= o;
        }
        logical
    }

    fn set_position(&mut self, position: &[f32; AXES]) {
        for i in 0..AXES {
            self.offset[i] = self.physical[i] - position[i];
        }
        self.planned = self.physical;
    }

    fn endstop_triggered(&self) -> bool {
        self.triggered
    }

    fn disable_drives(&mut self) {
        self.enabled = false;
    }

    fn set_bed_transform(&mut self, transform: Option<BedTransform>) {
        self.transform = transform;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn move_to(axis: usize, target: f32, feedrate: f32) -> PendingMove {
        let mut mv = PendingMove::from_position(&[0.0; DRIVES], feedrate);
        mv.coords[axis] = target;
        mv.active[axis] = true;
        mv
    }

    #[test]
    fn test_move_takes_time() {
        let mut motion = QueuedMotion::default();
        assert!(motion.submit(&move_to(0, 10.0, 100.0)).is_accepted());
        assert!(!motion.queue_drained());
        assert!(motion.drives_enabled());

        motion.tick(50);
        assert_eq!(motion.current_position(), [0.0; AXES]);
        motion.tick(50);
        assert!(motion.queue_drained());
        assert_eq!(motion.current_position(), [10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_queue_full_is_busy() {
        let mut motion = QueuedMotion::default();
        for i in 0..QUEUE_DEPTH {
            assert!(motion.submit(&move_to(0, i as f32, 10.0)).is_accepted());
        }
        assert_eq!(motion.submit(&move_to(0, 50.0, 10.0)), Submit::Busy);
        assert_eq!(motion.queued(), QUEUE_DEPTH);
    }

    #[test]
    fn test_long_tick_completes_several_moves() {
        let mut motion = QueuedMotion::default();
        motion.submit(&move_to(0, 10.0, 100.0));
        motion.submit(&move_to(1, 10.0, 100.0));
        motion.tick(1000);
        assert!(motion.queue_drained());
        assert_eq!(motion.completed(), 2);
        assert_eq!(motion.current_position(), [10.0, 10.0, 0.0]);
    }

    #[test]
    fn test_endstop_stops_move() {
        let mut motion = QueuedMotion::new([37.0, 0.0, 0.0]).with_endstop(Axis::X, 0.0);
        motion.set_position(&[0.0; AXES]);
        let mut mv = move_to(0, -400.0, 1000.0);
        mv.check_endstops = true;
        motion.submit(&mv);
        motion.tick(10_000);

        assert!(motion.endstop_triggered());
        assert_eq!(motion.physical_position()[0], 0.0);
        assert_eq!(motion.current_position()[0], -37.0);
    }

    #[test]
    fn test_unchecked_move_ignores_endstop() {
        let mut motion = QueuedMotion::new([10.0, 0.0, 0.0]).with_endstop(Axis::X, 0.0);
        motion.submit(&move_to(0, -15.0, 100.0));
        motion.tick(10_000);
        assert!(!motion.endstop_triggered());
        assert_eq!(motion.current_position()[0], -15.0);
    }

    #[test]
    fn test_set_position_shifts_logical_only() {
        let mut motion = QueuedMotion::new([37.0, 0.0, 0.0]);
        motion.set_position(&[0.0, 0.0, 0.0]);
        assert_eq!(motion.current_position(), [0.0; AXES]);
        assert_eq!(motion.physical_position()[0], 37.0);

        motion.submit(&move_to(0, 5.0, 100.0));
        motion.tick(1000);
        assert_eq!(motion.physical_position()[0], 42.0);
    }

    #[test]
    fn test_probe_follows_bed_plane() {
        let bed = BedTransform {
            a: 0.01,
            b: 0.0,
            c: 0.2,
        };
        let probe = SimProbe {
            bed,
            trigger_height: 0.7,
        };
        let mut motion = QueuedMotion::new([100.0, 50.0, 5.0]).with_probe(probe);
        let mut mv = move_to(2, -5.0, 10.0);
        mv.check_endstops = true;
        motion.submit(&mv);
        motion.tick(10_000);

        assert!(motion.endstop_triggered());
        assert!(close(motion.current_position()[2], 1.0 + 0.2 + 0.7));
    }

    #[test]
    fn test_probe_misses_above_travel_limit() {
        let probe = SimProbe {
            bed: BedTransform {
                a: 0.0,
                b: 0.0,
                c: -10.0,
            },
            trigger_height: 0.7,
        };
        let mut motion = QueuedMotion::new([0.0, 0.0, 5.0]).with_probe(probe);
        let mut mv = move_to(2, -5.0, 10.0);
        mv.check_endstops = true;
        motion.submit(&mv);
        motion.tick(10_000);

        assert!(!motion.endstop_triggered());
        assert_eq!(motion.current_position()[2], -5.0);
    }

    #[test]
    fn test_extrusion_accumulates() {
        let mut motion = QueuedMotion::default();
        let mut mv = PendingMove::from_position(&[0.0; DRIVES], 10.0);
        mv.set_extrusion(0, 2.0);
        mv.set_extrusion(1, 1.0);
        motion.submit(&mv);
        motion.submit(&mv);
        motion.tick(1000);
        assert_eq!(motion.extruded(), [4.0, 2.0]);
    }

    #[test]
    fn test_disable_and_transform() {
        let mut motion = QueuedMotion::default();
        motion.submit(&move_to(0, 1.0, 10.0));
        motion.disable_drives();
        assert!(!motion.drives_enabled());

        let plane = BedTransform {
            a: 0.0,
            b: 0.0,
            c: 0.1,
        };
        motion.set_bed_transform(Some(plane));
        assert_eq!(motion.bed_transform(), Some(plane));
    }
}
