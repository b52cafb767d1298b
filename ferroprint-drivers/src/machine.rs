//! A complete simulated controller
//!
//! [`Machine`] owns an engine and one of each collaborator and steps
//! them together, in the order a firmware main loop would: planner,
//! heaters, then the interpreter.

use ferroprint_core::config::MachineConfig;
use ferroprint_core::error::CommandError;
use ferroprint_core::traits::{HeaterId, Motion, Transport};
use ferroprint_core::{Engine, Io};

use crate::heater::HeaterBank;
use crate::link::LineLink;
use crate::motion::QueuedMotion;
use crate::storage::RamStorage;

/// Files on the simulated card
pub const CARD_FILES: usize = 16;

/// Largest file on the simulated card
pub const CARD_FILE_SIZE: usize = 2048;

/// Storage used by [`Machine`]
pub type CardStorage = RamStorage<CARD_FILES, CARD_FILE_SIZE>;

/// Engine plus simulated collaborators
pub struct Machine {
    pub engine: Engine,
    pub motion: QueuedMotion,
    pub heaters: HeaterBank,
    pub storage: CardStorage,
    pub network: LineLink,
    pub serial: LineLink,
    uptime_ms: u64,
}

/// Borrow the collaborators of a machine as an [`Io`]
macro_rules! io {
    ($m:expr) => {
        Io {
            motion: &mut $m.motion,
            thermal: &mut $m.heaters,
            storage: &mut $m.storage,
            network: &mut $m.network,
            serial: &mut $m.serial,
        }
    };
}

impl Machine {
    /// Assemble a machine around a planner
    pub fn new(config: MachineConfig, motion: QueuedMotion) -> Self {
        Self {
            engine: Engine::new(config),
            motion,
            heaters: HeaterBank::new(),
            storage: CardStorage::new(),
            network: LineLink::new(),
            serial: LineLink::new(),
            uptime_ms: 0,
        }
    }

    /// Start the configuration macro
    ///
    /// Its commands run over the following ticks.
    pub fn boot(&mut self) -> Result<(), CommandError> {
        let mut io = io!(self);
        self.engine.run_configuration(&mut io)
    }

    /// Run one main-loop iteration
    ///
    /// # Arguments
    /// * `elapsed_ms` - Simulated time since the previous tick
    pub fn tick(&mut self, elapsed_ms: u32) {
        self.uptime_ms += u64::from(elapsed_ms);
        self.motion.tick(elapsed_ms);
        for heater in self.heaters.update(elapsed_ms) {
            self.engine.tools_mut().flag_heater_fault(heater);
        }
        let mut io = io!(self);
        self.engine.spin(&mut io, elapsed_ms);
    }

    /// Check if nothing is left to do
    pub fn is_idle(&self) -> bool {
        !self.engine.have_incoming_data()
            && !self.engine.move_pending()
            && !self.network.has_line()
            && !self.serial.has_line()
            && self.motion.queue_drained()
    }

    /// Tick until idle
    ///
    /// Returns false if still busy after `max_ticks`.
    pub fn run_until_idle(&mut self, step_ms: u32, max_ticks: usize) -> bool {
        for _ in 0..max_ticks {
            self.tick(step_ms);
            if self.is_idle() {
                return true;
            }
        }
        warn!("still busy after {} ticks", max_ticks);
        false
    }

    /// Abort everything in progress
    pub fn cancel(&mut self) {
        let mut io = io!(self);
        self.engine.cancel(&mut io);
    }

    /// Clear a latched heater fault and re-enable the tools using it
    pub fn clear_heater_fault(&mut self, heater: HeaterId) {
        if let Some(h) = self.heaters.heater_mut(heater) {
            h.clear_fault();
        }
        self.engine.tools_mut().clear_heater_fault(heater);
        info!("heater {} fault cleared", heater.0);
    }

    /// Simulated time since start
    pub fn uptime_ms(&self) -> u64 {
        self.uptime_ms
    }
}

#[cfg(test)]
mod tests {
    use std::string::{String, ToString};
    use std::vec::Vec;

    use super::*;
    use crate::motion::SimProbe;
    use ferroprint_core::bed::BedTransform;
    use ferroprint_core::motion::{Axis, AXES};
    use ferroprint_core::traits::{heater_for_extruder, Thermal};

    const STEP_MS: u32 = 10;

    fn machine() -> Machine {
        Machine::new(MachineConfig::default(), QueuedMotion::default())
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn drain(link: &mut LineLink) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(reply) = link.take_reply() {
            out.push(reply.to_string());
        }
        out
    }

    /// Send lines over serial and run until everything has executed
    fn run(m: &mut Machine, lines: &[&str]) -> Vec<String> {
        for line in lines {
            assert!(m.serial.send_line(line));
        }
        assert!(m.run_until_idle(STEP_MS, 20_000));
        drain(&mut m.serial)
    }

    #[test]
    fn test_feedrate_and_relative_moves() {
        let mut m = machine();
        let replies = run(&mut m, &["G1 X10 F3000", "G91", "G1 X5"]);
        assert_eq!(replies, ["ok", "ok", "ok"]);
        assert_eq!(m.engine.modal().feedrate, 50.0);
        assert_eq!(m.motion.current_position(), [15.0, 0.0, 0.0]);
        assert_eq!(m.engine.position(), [15.0, 0.0, 0.0]);
    }

    #[test]
    fn test_move_takes_simulated_time() {
        let mut m = machine();
        // 10 mm at 50 mm/s
        run(&mut m, &["G1 X10 F3000"]);
        assert!(m.uptime_ms() >= 200);
        assert!(m.uptime_ms() < 300);
    }

    #[test]
    fn test_single_pending_move() {
        let mut m = machine();
        for i in 1..=12 {
            assert!(m.serial.send_line(&std::format!("G1 X{} F6", i)));
        }
        for _ in 0..20 {
            m.tick(STEP_MS);
        }

        assert_eq!(m.motion.queued(), crate::motion::QUEUE_DEPTH);
        assert!(m.engine.move_pending());
        assert!(m.serial.has_line());
        assert_eq!(m.serial.replies().count(), crate::motion::QUEUE_DEPTH + 1);
    }

    #[test]
    fn test_homing_against_endstops() {
        let motion = QueuedMotion::new([37.0, 52.0, 12.0])
            .with_endstop(Axis::X, 0.0)
            .with_endstop(Axis::Y, 0.0)
            .with_endstop(Axis::Z, 0.0);
        let mut m = Machine::new(MachineConfig::default(), motion);

        assert_eq!(run(&mut m, &["G28"]), ["ok"]);
        for axis in Axis::ALL {
            assert!(m.engine.is_homed(axis));
        }
        assert_eq!(m.motion.physical_position(), [0.0; AXES]);
        assert_eq!(m.engine.position(), [0.0; AXES]);
    }

    #[test]
    fn test_homing_is_idempotent() {
        let motion = QueuedMotion::new([0.0; AXES])
            .with_endstop(Axis::X, 0.0)
            .with_endstop(Axis::Y, 0.0)
            .with_endstop(Axis::Z, 0.0);
        let mut m = Machine::new(MachineConfig::default(), motion);

        run(&mut m, &["G28", "G1 X20 Y30 F6000"]);
        assert_eq!(m.motion.physical_position(), [20.0, 30.0, 0.0]);

        assert_eq!(run(&mut m, &["G28 X"]), ["ok"]);
        assert_eq!(m.motion.physical_position(), [0.0, 30.0, 0.0]);
        assert_eq!(m.engine.position(), [0.0, 30.0, 0.0]);

        assert_eq!(run(&mut m, &["G28 X"]), ["ok"]);
        assert_eq!(m.engine.position(), [0.0, 30.0, 0.0]);
        assert!(m.engine.is_homed(Axis::Y));
    }

    #[test]
    fn test_macro_moves_execute() {
        let mut m = machine();
        m.storage
            .add_file("sys/square.g", b"G91\nG1 X10\nG1 Y10\nG1 X-10\nG1 Y-10\nG1 X1\n")
            .unwrap();

        let replies = run(&mut m, &["G1 X50 Y50 F6000", "M98 Psquare.g", "G1 X60"]);
        assert_eq!(replies, ["ok", "ok", "ok"]);
        // G91 inside the macro does not leak out
        assert!(!m.engine.modal().axes_relative);
        assert_eq!(m.motion.current_position(), [60.0, 50.0, 0.0]);
        assert_eq!(m.motion.completed(), 7);
        assert_eq!(m.storage.open_count(), 0);
    }

    #[test]
    fn test_macro_nesting_overflow() {
        let mut m = machine();
        for i in 0..6 {
            let body = std::format!("G1 X{}\nM98 Pm{}.g\n", i, i + 1);
            m.storage.add_file(&std::format!("sys/m{}.g", i), body.as_bytes()).unwrap();
        }
        m.storage.add_file("sys/m6.g", b"G1 X99\n").unwrap();

        let replies = run(&mut m, &["M98 Pm0.g"]);
        assert_eq!(replies, ["Error: macro stack overflow", "ok"]);
        assert_eq!(m.engine.macro_depth(), 0);
        assert_eq!(m.motion.current_position()[0], 4.0);
        assert_eq!(m.storage.open_count(), 0);
    }

    #[test]
    fn test_boot_runs_configuration() {
        let mut m = machine();
        m.storage
            .add_file("sys/config.g", b"M563 P0 D0 H1\nG10 P0 X5 S210 R150\nM564 S2\n")
            .unwrap();
        m.boot().unwrap();
        assert!(m.run_until_idle(STEP_MS, 100));

        let tool = m.engine.tools().get(0).unwrap();
        assert_eq!(tool.offsets[0], 5.0);
        assert_eq!(tool.active_temperatures()[0], 210.0);
        // Nobody asked for the config, so nobody gets replies
        assert!(drain(&mut m.serial).is_empty());
    }

    #[test]
    fn test_boot_without_config() {
        let mut m = machine();
        assert_eq!(m.boot(), Err(CommandError::FileNotFound));
    }

    #[test]
    fn test_tool_change_waits_for_heat() {
        let mut m = machine();
        run(&mut m, &["M563 P0 D0 H1", "G10 P0 S200 R150"]);

        assert!(m.serial.send_line("T0"));
        for _ in 0..100 {
            m.tick(100);
        }
        // Ten seconds in, still heating
        assert!(drain(&mut m.serial).is_empty());
        assert!(m.engine.cycle_running());

        assert!(m.run_until_idle(100, 1_000));
        assert_eq!(drain(&mut m.serial), ["ok"]);
        let heater = heater_for_extruder(0);
        assert!(m.heaters.at_target(heater));
        assert!(m.heaters.temperature(heater) > 195.0);
        assert_eq!(m.engine.tools().current_number(), Some(0));
    }

    #[test]
    fn test_bed_heat_and_wait() {
        let mut m = machine();
        let replies = run(&mut m, &["M190 S60"]);
        assert_eq!(replies, ["ok"]);
        assert!(m.heaters.temperature(ferroprint_core::traits::BED_HEATER) > 57.0);
    }

    #[test]
    fn test_heater_fault_blocks_tool() {
        let mut m = machine();
        run(&mut m, &["M563 P0 D0 H1"]);

        let heater = heater_for_extruder(0);
        m.heaters.heater_mut(heater).unwrap().force_temperature(400.0);
        m.tick(STEP_MS);
        assert!(m.engine.tools().get(0).unwrap().has_heater_fault());

        assert_eq!(run(&mut m, &["T0"]), ["Error: tool has a heater fault"]);

        m.heaters.heater_mut(heater).unwrap().force_temperature(20.0);
        m.clear_heater_fault(heater);
        assert_eq!(run(&mut m, &["T0"]), ["ok"]);
    }

    #[test]
    fn test_bed_probe_fits_plane() {
        let bed = BedTransform {
            a: 0.001,
            b: -0.002,
            c: 0.3,
        };
        let config = MachineConfig::default();
        let probe = SimProbe {
            bed,
            trigger_height: config.probe.trigger_height,
        };
        let motion = QueuedMotion::new([0.0, 0.0, 10.0]).with_probe(probe);
        let mut m = Machine::new(config, motion);

        assert_eq!(run(&mut m, &["G32"]), ["ok"]);
        let fitted = m.motion.bed_transform().unwrap();
        assert!(close(fitted.a, bed.a));
        assert!(close(fitted.b, bed.b));
        assert!(close(fitted.c, bed.c));

        let p = m.engine.get_probe_coordinates(1).unwrap();
        assert!(close(p.z.unwrap(), bed.height_at(p.x, p.y)));
    }

    #[test]
    fn test_probe_miss_reported() {
        let probe = SimProbe {
            bed: BedTransform {
                a: 0.0,
                b: 0.0,
                c: -20.0,
            },
            trigger_height: 0.7,
        };
        let motion = QueuedMotion::new([0.0, 0.0, 10.0]).with_probe(probe);
        let mut m = Machine::new(MachineConfig::default(), motion);

        assert_eq!(run(&mut m, &["G30"]), ["Error: probe not triggered"]);
        assert!(!m.engine.is_homed(Axis::Z));
    }

    #[test]
    fn test_print_from_card() {
        let mut m = machine();
        m.storage
            .add_file("gcodes/part.g", b"; part\nG1 X5 F6000\n\nG1 X10 E1\nG1 Y10 E1\n")
            .unwrap();
        run(&mut m, &["M563 P0 D0 H1", "T0"]);

        assert_eq!(run(&mut m, &["M32 part.g"]), ["ok"]);
        assert!(!m.engine.print_file().is_running());
        assert_eq!(m.motion.current_position(), [10.0, 10.0, 0.0]);
        assert_eq!(m.motion.extruded()[0], 2.0);
        assert_eq!(m.storage.open_count(), 0);
    }

    #[test]
    fn test_print_after_deleting_selected_file() {
        let mut m = machine();
        m.storage.add_file("gcodes/a.g", b"G1 X5 F6000\n").unwrap();
        m.storage.add_file("gcodes/b.g", b"G1 X7 F6000\n").unwrap();

        let replies = run(&mut m, &["M23 a.g", "M30 a.g"]);
        assert_eq!(replies, ["ok File a.g selected", "ok"]);
        assert!(!m.storage.exists("gcodes/a.g"));
        assert!(!m.engine.print_file().is_selected());

        assert_eq!(run(&mut m, &["M23 b.g", "M24"]), ["ok File b.g selected", "ok"]);
        assert_eq!(m.motion.current_position()[0], 7.0);
        assert_eq!(m.storage.open_count(), 0);
    }

    #[test]
    fn test_capture_then_print() {
        let mut m = machine();
        let replies = run(&mut m, &["M28 saved.g", "G1 X7 F6000", "M29"]);
        assert_eq!(replies, ["ok Writing to file: saved.g", "ok", "ok Done saving file."]);
        assert_eq!(m.storage.contents("gcodes/saved.g"), Some(&b"G1 X7 F6000\n"[..]));
        assert_eq!(m.motion.completed(), 0);

        run(&mut m, &["M32 saved.g"]);
        assert_eq!(m.motion.current_position()[0], 7.0);
    }

    #[test]
    fn test_network_and_serial_both_served() {
        let mut m = machine();
        assert!(m.network.send_line("M114"));
        assert!(m.serial.send_line("G1 X3 F6000"));
        assert!(m.run_until_idle(STEP_MS, 1_000));

        let net = drain(&mut m.network);
        assert_eq!(net.len(), 1);
        assert!(net[0].starts_with("ok X:0.00"));
        assert_eq!(drain(&mut m.serial), ["ok"]);
    }

    #[test]
    fn test_cancel_stops_everything() {
        let mut m = machine();
        m.storage.add_file("sys/slow.g", b"G4 S60\nG1 X10\n").unwrap();
        assert!(m.serial.send_line("M98 Pslow.g"));
        for _ in 0..10 {
            m.tick(STEP_MS);
        }
        assert!(m.engine.cycle_running());

        m.cancel();
        assert_eq!(drain(&mut m.serial), ["ok"]);
        assert!(m.run_until_idle(STEP_MS, 10));
        assert_eq!(m.engine.macro_depth(), 0);
        assert_eq!(m.motion.completed(), 0);
        assert_eq!(m.storage.open_count(), 0);
    }
}
