//! Tick-driven execution engine
//!
//! [`Engine::spin`] is called once per control-loop iteration and does a
//! bounded amount of work:
//!
//! 1. Offer the pending move to the planner
//! 2. Advance the running canned cycle, if any, and stop there
//! 3. Refill input streams that have no line waiting
//! 4. Dispatch one line from the highest-priority ready stream
//!
//! A handler either finishes (`Done`), cannot proceed yet (`Pending`, the
//! line is kept and retried next tick) or fails (`Error`).

mod dispatch;
mod files;
mod moves;
mod reply;

use heapless::String;

use crate::bed::{ProbePoint, ProbeTable};
use crate::config::{LimitPolicy, MachineConfig};
use crate::cycles::{Cycle, CycleContext};
use crate::error::CommandError;
use crate::gcode::{ParseError, LINE_CAPACITY};
use crate::motion::{Axis, MoveSlot, PendingMove, AXES};
use crate::stack::{MacroStack, ModalStack, ModalState};
use crate::stream::{Origin, StreamRegistry};
use crate::tool::ToolTable;
use crate::traits::{FileHandle, Motion, Storage, Thermal, Transport};

pub use files::PrintFile;
pub use reply::REPLY_CAPACITY;

/// Result of a handler or cycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Finished; the line is consumed
    Done,
    /// Cannot proceed yet; try again next tick
    Pending,
    /// Failed; the line is consumed and the error reported
    Error(CommandError),
}

impl From<Result<Outcome, CommandError>> for Outcome {
    fn from(result: Result<Outcome, CommandError>) -> Self {
        result.unwrap_or_else(Outcome::Error)
    }
}

/// Collaborators borrowed for one call into the engine
pub struct Io<'a> {
    pub motion: &'a mut dyn Motion,
    pub thermal: &'a mut dyn Thermal,
    pub storage: &'a mut dyn Storage,
    pub network: &'a mut dyn Transport,
    pub serial: &'a mut dyn Transport,
}

impl<'a> Io<'a> {
    /// Host link for an origin, if it is one
    fn link(&mut self, origin: Origin) -> Option<&mut (dyn Transport + 'a)> {
        match origin {
            Origin::Network => Some(&mut *self.network),
            Origin::Serial => Some(&mut *self.serial),
            Origin::Macro | Origin::File => None,
        }
    }
}

/// A canned cycle and the stream whose command started it
#[derive(Debug, Clone, PartialEq)]
struct ActiveCycle {
    cycle: Cycle,
    owner: Origin,
}

/// The G-code execution engine
///
/// Owns all interpreter state. Collaborators are passed in through
/// [`Io`] on every call.
pub struct Engine {
    config: MachineConfig,
    streams: StreamRegistry,
    modal: ModalState,
    modal_stack: ModalStack,
    macros: MacroStack,
    print: PrintFile,
    slot: MoveSlot,
    /// mm per input unit (1.0 or 25.4)
    distance_scale: f32,
    tools: ToolTable,
    cycle: Option<ActiveCycle>,
    probes: ProbeTable,
    /// Probe table points used by `G32`
    probe_count: usize,
    /// Text produced by the command being executed
    reply: String<REPLY_CAPACITY>,
}

/// Upper bound on storage reads per stream per tick, to skip blank lines
const REFILL_BATCH: usize = 4;

impl Engine {
    /// Create an engine from a machine configuration
    pub fn new(config: MachineConfig) -> Self {
        let mut probes = ProbeTable::new();
        let probe_count = usize::from(config.probe.point_count).min(config.probe.points.len());
        for (i, &(x, y)) in config.probe.points.iter().enumerate() {
            probes.set_location(i, x, y);
        }
        Self {
            modal: ModalState::with_feedrate(config.default_feedrate),
            config,
            streams: StreamRegistry::new(),
            modal_stack: ModalStack::new(),
            macros: MacroStack::new(),
            print: PrintFile::new(),
            slot: MoveSlot::new(),
            distance_scale: 1.0,
            tools: ToolTable::new(),
            cycle: None,
            probes,
            probe_count,
            reply: String::new(),
        }
    }

    /// Run one control-loop iteration
    ///
    /// # Arguments
    /// * `io` - Collaborators
    /// * `elapsed_ms` - Time since the previous call, used by dwell
    pub fn spin(&mut self, io: &mut Io<'_>, elapsed_ms: u32) {
        self.slot.offer(io.motion);

        if self.cycle.is_some() {
            self.advance_cycle(io, elapsed_ms);
            return;
        }

        self.refill(io);

        if let Some(origin) = self.streams.select(!self.macros.is_empty()) {
            self.execute(io, origin);
        }
    }

    fn advance_cycle(&mut self, io: &mut Io<'_>, elapsed_ms: u32) {
        let Some(active) = self.cycle.as_mut() else {
            return;
        };
        let mut cx = CycleContext {
            slot: &mut self.slot,
            motion: &mut *io.motion,
            thermal: &mut *io.thermal,
            tools: &mut self.tools,
            probes: &mut self.probes,
            config: &self.config,
            elapsed_ms,
        };
        let outcome = active.cycle.step(&mut cx);
        if outcome == Outcome::Pending {
            return;
        }

        let owner = active.owner;
        let name = active.cycle.name();
        self.cycle = None;
        match outcome {
            Outcome::Error(e) => {
                warn!("{} aborted: {}", name, e.message());
                self.report_error(io, owner, e);
            }
            _ => {
                debug!("{} finished", name);
                self.acknowledge(io, owner);
            }
        }
    }

    fn start_cycle(&mut self, cycle: Cycle, owner: Origin) -> Outcome {
        debug!("{} started by {}", cycle.name(), owner.name());
        self.cycle = Some(ActiveCycle { cycle, owner });
        Outcome::Done
    }

    /// Fill every idle stream from its source
    fn refill(&mut self, io: &mut Io<'_>) {
        if !self.macros.is_empty() {
            self.refill_macro(io);
        }
        if self.print.is_running() {
            self.refill_print(io);
        }
        for origin in [Origin::Network, Origin::Serial] {
            self.refill_link(io, origin);
        }
    }

    fn refill_link(&mut self, io: &mut Io<'_>, origin: Origin) {
        if self.streams.get(origin).is_ready() {
            return;
        }
        let mut buf = [0u8; LINE_CAPACITY + 2];
        let Some(link) = io.link(origin) else {
            return;
        };
        if !link.has_line() {
            return;
        }
        if let Some(len) = link.next_line(&mut buf) {
            self.feed(io, origin, &buf[..len]);
        }
    }

    /// Put a line into a stream, reporting a rejected line
    ///
    /// Returns true when the stream now holds a line.
    fn feed(&mut self, io: &mut Io<'_>, origin: Origin, text: &[u8]) -> bool {
        let line = &mut self.streams.get_mut(origin).line;
        match line.put_line(text) {
            Ok(ready) => ready,
            Err(e) => {
                let resend = line.line_number();
                warn!("{} line rejected: {}", origin.name(), e.message());
                self.report_error(io, origin, e.into());
                if let (ParseError::ChecksumMismatch, Some(n)) = (e, resend) {
                    if origin.supports_resend() {
                        self.request_resend(io, origin, n);
                    }
                }
                false
            }
        }
    }

    /// Execute the waiting line of one stream
    fn execute(&mut self, io: &mut Io<'_>, origin: Origin) {
        let mut line = self.streams.get(origin).line.clone();
        let depth_before = self.macros.depth();
        self.reply.clear();

        let outcome = self.dispatch(io, origin, &mut line);
        match outcome {
            Outcome::Pending => return,
            Outcome::Done => {
                self.streams.get_mut(origin).line.clear();
                // Started a cycle or a macro: acknowledged when it finishes
                let deferred = self.cycle.is_some() || self.macros.depth() > depth_before;
                if !deferred {
                    self.acknowledge(io, origin);
                }
            }
            Outcome::Error(e) => {
                self.streams.get_mut(origin).line.clear();
                warn!("{}: {} ({})", origin.name(), e.message(), line.as_str());
                self.report_error(io, origin, e);
            }
        }
        self.reply.clear();
    }

    /// Take the pending move, for planners that pull instead of accepting
    /// [`Motion::submit`] offers
    pub fn read_move(&mut self) -> Option<PendingMove> {
        self.slot.take()
    }

    /// Abandon everything in progress
    ///
    /// Resets any cycle, drops the pending move, closes every macro file
    /// and the print file, drops every `M120` context and restores the
    /// modal state saved by the outermost macro.
    pub fn cancel(&mut self, io: &mut Io<'_>) {
        if let Some(active) = self.cycle.take() {
            warn!("{} cancelled", active.cycle.name());
        }
        self.slot.discard();

        let mut outermost = None;
        while let Ok(frame) = self.macros.pop() {
            io.storage.close(frame.file);
            outermost = Some(frame);
        }
        if let Some(frame) = outermost {
            self.modal = frame.saved;
            // The link that started the macro is still waiting for its ok
            if let Some(caller) = frame.caller.filter(|o| o.is_link()) {
                self.reply.clear();
                self.acknowledge(io, caller);
            }
        }
        self.modal_stack.clear();
        self.print.close(io.storage);

        self.streams.get_mut(Origin::Macro).line.clear();
        self.streams.get_mut(Origin::File).line.clear();
        let position = io.motion.current_position();
        self.slot.sync_axes(&position);
        info!("cancelled");
    }

    /// Check if an axis has been homed
    pub fn is_homed(&self, axis: Axis) -> bool {
        self.slot.is_homed(axis)
    }

    /// Commanded position of every axis
    pub fn position(&self) -> [f32; AXES] {
        self.slot.axes()
    }

    /// Current modal state
    pub fn modal(&self) -> &ModalState {
        &self.modal
    }

    /// Saved modal contexts (`M120`)
    pub fn modal_depth(&self) -> usize {
        self.modal_stack.depth()
    }

    /// Current macro nesting depth
    pub fn macro_depth(&self) -> usize {
        self.macros.depth()
    }

    /// Check if a canned cycle is running
    pub fn cycle_running(&self) -> bool {
        self.cycle.is_some()
    }

    /// Check if a move is staged but not yet taken by the planner
    pub fn move_pending(&self) -> bool {
        !self.slot.is_free()
    }

    /// Check if there is work queued: a waiting line, a running macro,
    /// a print in progress or a running cycle
    pub fn have_incoming_data(&self) -> bool {
        self.streams.any_ready()
            || !self.macros.is_empty()
            || self.print.is_running()
            || self.cycle.is_some()
    }

    /// Machine configuration in effect, including `M208` / `M564` changes
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Axis-limit policy in effect
    pub fn limit_policy(&self) -> LimitPolicy {
        self.config.limit_policy
    }

    /// Defined tools
    pub fn tools(&self) -> &ToolTable {
        &self.tools
    }

    /// Defined tools, for heater fault handling
    pub fn tools_mut(&mut self) -> &mut ToolTable {
        &mut self.tools
    }

    /// Probe point `index`, with its measured height once probed
    pub fn get_probe_coordinates(&self, index: usize) -> Option<ProbePoint> {
        self.probes.get(index).copied()
    }

    /// Print file state
    pub fn print_file(&self) -> &PrintFile {
        &self.print
    }

    /// Open file handle of the innermost macro
    pub fn current_macro(&self) -> Option<FileHandle> {
        self.macros.top().map(|f| f.file)
    }
}
