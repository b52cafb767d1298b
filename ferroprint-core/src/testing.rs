//! Collaborator mocks for unit tests

use std::collections::{BTreeMap, VecDeque};
use std::string::{String, ToString};
use std::vec::Vec;

use crate::bed::BedTransform;
use crate::motion::{PendingMove, AXES};
use crate::traits::{
    FileHandle, HeaterId, Motion, OpenMode, Storage, StorageError, Submit, Thermal, Transport,
    ABS_ZERO, MAX_HEATERS,
};

/// Planner that completes moves instantly
pub struct MockMotion {
    pub busy: bool,
    pub submitted: Vec<PendingMove>,
    pub drained: bool,
    pub position: [f32; AXES],
    pub triggered: bool,
    /// Moves with endstop checking stop here on the checked axis instead
    pub trigger_at: Option<f32>,
    pub drives_enabled: bool,
    pub transform: Option<BedTransform>,
}

impl MockMotion {
    pub fn new() -> Self {
        Self {
            busy: false,
            submitted: Vec::new(),
            drained: true,
            position: [0.0; AXES],
            triggered: false,
            trigger_at: None,
            drives_enabled: true,
            transform: None,
        }
    }
}

impl Motion for MockMotion {
    fn submit(&mut self, mv: &PendingMove) -> Submit {
        if self.busy {
            return Submit::Busy;
        }
        self.submitted.push(*mv);
        self.triggered = false;
        for i in 0..AXES {
            if !mv.active[i] {
                continue;
            }
            match (mv.check_endstops, self.trigger_at) {
                (true, Some(stop)) => {
                    self.position[i] = stop;
                    self.triggered = true;
                }
                _ => self.position[i] = mv.coords[i],
            }
        }
        Submit::Accepted
    }

    fn queue_drained(&self) -> bool {
        self.drained
    }

    fn current_position(&self) -> [f32; AXES] {
        self.position
    }

    fn set_position(&mut self, position: &[f32; AXES]) {
        self.position = *position;
    }

    fn endstop_triggered(&self) -> bool {
        self.triggered
    }

    fn disable_drives(&mut self) {
        self.drives_enabled = false;
    }

    fn set_bed_transform(&mut self, transform: Option<BedTransform>) {
        self.transform = transform;
    }
}

/// Heaters that reach their target when told to
pub struct MockThermal {
    pub targets: [f32; MAX_HEATERS],
    pub standby_targets: [f32; MAX_HEATERS],
    pub active: [bool; MAX_HEATERS],
    pub at_target: [bool; MAX_HEATERS],
    pub temperatures: [f32; MAX_HEATERS],
}

impl MockThermal {
    pub fn new() -> Self {
        Self {
            targets: [ABS_ZERO; MAX_HEATERS],
            standby_targets: [ABS_ZERO; MAX_HEATERS],
            active: [false; MAX_HEATERS],
            at_target: [true; MAX_HEATERS],
            temperatures: [20.0; MAX_HEATERS],
        }
    }
}

impl Thermal for MockThermal {
    fn set_target(&mut self, heater: HeaterId, temperature: f32) {
        self.targets[heater.index()] = temperature;
    }

    fn set_standby_target(&mut self, heater: HeaterId, temperature: f32) {
        self.standby_targets[heater.index()] = temperature;
    }

    fn set_active(&mut self, heater: HeaterId) {
        self.active[heater.index()] = true;
    }

    fn set_standby(&mut self, heater: HeaterId) {
        self.active[heater.index()] = false;
    }

    fn at_target(&self, heater: HeaterId) -> bool {
        self.at_target[heater.index()]
    }

    fn temperature(&self, heater: HeaterId) -> f32 {
        self.temperatures[heater.index()]
    }
}

struct OpenFile {
    path: String,
    pos: usize,
}

/// In-memory file system
pub struct MockStorage {
    pub files: BTreeMap<String, Vec<u8>>,
    handles: Vec<Option<OpenFile>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
            handles: Vec::new(),
        }
    }

    pub fn add(&mut self, path: &str, text: &str) {
        self.files.insert(path.to_string(), text.as_bytes().to_vec());
    }

    pub fn contents(&self, path: &str) -> Option<&str> {
        self.files
            .get(path)
            .and_then(|b| core::str::from_utf8(b).ok())
    }

    pub fn open_count(&self) -> usize {
        self.handles.iter().filter(|h| h.is_some()).count()
    }
}

impl Storage for MockStorage {
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle, StorageError> {
        match mode {
            OpenMode::Read if !self.files.contains_key(path) => {
                return Err(StorageError::NotFound)
            }
            OpenMode::Write => {
                self.files.insert(path.to_string(), Vec::new());
            }
            OpenMode::Read => {}
        }
        let file = OpenFile {
            path: path.to_string(),
            pos: 0,
        };
        let slot = match self.handles.iter().position(Option::is_none) {
            Some(i) => {
                self.handles[i] = Some(file);
                i
            }
            None => {
                self.handles.push(Some(file));
                self.handles.len() - 1
            }
        };
        Ok(FileHandle(slot as u8))
    }

    fn read_line(
        &mut self,
        handle: FileHandle,
        buf: &mut [u8],
    ) -> Result<Option<usize>, StorageError> {
        let file = self
            .handles
            .get_mut(handle.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(StorageError::BadHandle)?;
        let data = self.files.get(&file.path).ok_or(StorageError::NotFound)?;
        if file.pos >= data.len() {
            return Ok(None);
        }
        let rest = &data[file.pos..];
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        let n = end.min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        file.pos += (end + 1).min(rest.len());
        Ok(Some(n))
    }

    fn write(&mut self, handle: FileHandle, bytes: &[u8]) -> Result<(), StorageError> {
        let file = self
            .handles
            .get(handle.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(StorageError::BadHandle)?;
        self.files
            .get_mut(&file.path)
            .ok_or(StorageError::NotFound)?
            .extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self, handle: FileHandle) {
        if let Some(h) = self.handles.get_mut(handle.0 as usize) {
            *h = None;
        }
    }

    fn delete(&mut self, path: &str) -> Result<(), StorageError> {
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    fn fraction_read(&self, handle: FileHandle) -> Option<f32> {
        let file = self.handles.get(handle.0 as usize)?.as_ref()?;
        let len = self.files.get(&file.path)?.len();
        (len > 0).then(|| file.pos as f32 / len as f32)
    }
}

/// Host link fed from a queue of lines
pub struct MockLink {
    pub incoming: VecDeque<String>,
    pub replies: Vec<String>,
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            incoming: VecDeque::new(),
            replies: Vec::new(),
        }
    }

    pub fn send(&mut self, line: &str) {
        self.incoming.push_back(line.to_string());
    }
}

impl Transport for MockLink {
    fn has_line(&self) -> bool {
        !self.incoming.is_empty()
    }

    fn next_line(&mut self, buf: &mut [u8]) -> Option<usize> {
        let line = self.incoming.pop_front()?;
        let n = line.len().min(buf.len());
        buf[..n].copy_from_slice(&line.as_bytes()[..n]);
        Some(n)
    }

    fn reply(&mut self, text: &str) {
        self.replies.push(text.to_string());
    }
}
