//! Macro files, the print file and file capture

use heapless::String;

use super::{Engine, Io, Outcome, REFILL_BATCH};
use crate::config::MAX_PATH_LEN;
use crate::error::CommandError;
use crate::gcode::{LineBuffer, LINE_CAPACITY};
use crate::stack::MacroFrame;
use crate::stream::{Capture, Origin};
use crate::traits::{FileHandle, OpenMode, Storage, StorageError};

/// Join a configured directory and a file name
///
/// Names containing a `/` are taken as full paths.
pub(super) fn join_path(directory: &str, name: &str) -> Result<String<MAX_PATH_LEN>, CommandError> {
    let mut path = String::new();
    if !name.contains('/') {
        path.push_str(directory)
            .map_err(|_| StorageError::InvalidName)?;
    }
    path.push_str(name).map_err(|_| StorageError::InvalidName)?;
    Ok(path)
}

/// The file selected for printing
#[derive(Debug, Clone, Default)]
pub struct PrintFile {
    path: String<MAX_PATH_LEN>,
    handle: Option<FileHandle>,
    running: bool,
}

impl PrintFile {
    /// No file selected
    pub const fn new() -> Self {
        Self {
            path: String::new(),
            handle: None,
            running: false,
        }
    }

    /// Path of the selected file
    pub fn path(&self) -> Option<&str> {
        self.handle.map(|_| self.path.as_str())
    }

    /// Check if a file is selected
    pub fn is_selected(&self) -> bool {
        self.handle.is_some()
    }

    /// Check if the file is being printed (selected and not paused)
    pub fn is_running(&self) -> bool {
        self.running && self.handle.is_some()
    }

    pub(super) fn close(&mut self, storage: &mut dyn Storage) {
        if let Some(handle) = self.handle.take() {
            storage.close(handle);
        }
        self.path.clear();
        self.running = false;
    }
}

impl Engine {
    /// Run a macro file
    ///
    /// The macro's lines take priority over every other stream until it
    /// ends. The modal state is restored when it returns.
    ///
    /// # Arguments
    /// * `name` - File name, relative to the macro directory unless it contains `/`
    /// * `caller` - Stream to acknowledge when the macro ends, `None` for internal calls
    pub fn do_file_macro(
        &mut self,
        io: &mut Io<'_>,
        name: &str,
        caller: Option<Origin>,
    ) -> Result<(), CommandError> {
        if self.macros.is_full() {
            warn!("macro stack full, not running {}", name);
            return Err(CommandError::MacroStackOverflow);
        }
        let path = join_path(&self.config.macro_directory, name)?;
        let file = io.storage.open(&path, OpenMode::Read).map_err(|e| match e {
            StorageError::NotFound => CommandError::FileNotFound,
            other => CommandError::Storage(other),
        })?;

        let frame = MacroFrame {
            file,
            saved: self.modal,
            caller,
        };
        if self.macros.push(frame).is_err() {
            io.storage.close(file);
            return Err(CommandError::MacroStackOverflow);
        }
        self.streams.get_mut(Origin::Macro).line.clear();
        info!("macro {} started, depth {}", name, self.macros.depth());
        Ok(())
    }

    /// Leave the innermost macro
    pub(super) fn return_from_macro(&mut self, io: &mut Io<'_>) {
        let Ok(frame) = self.macros.pop() else {
            return;
        };
        io.storage.close(frame.file);
        self.modal = frame.saved;
        self.streams.get_mut(Origin::Macro).line.clear();
        debug!("macro finished, depth {}", self.macros.depth());

        if let Some(caller) = frame.caller.filter(|o| o.is_link()) {
            self.reply.clear();
            self.acknowledge(io, caller);
        }
    }

    /// Run the configured startup macro
    pub fn run_configuration(&mut self, io: &mut Io<'_>) -> Result<(), CommandError> {
        let name = self.config.config_file.clone();
        self.do_file_macro(io, &name, None)
    }

    pub(super) fn refill_macro(&mut self, io: &mut Io<'_>) {
        let mut buf = [0u8; LINE_CAPACITY + 2];
        for _ in 0..REFILL_BATCH {
            if self.streams.get(Origin::Macro).is_ready() {
                return;
            }
            let Some(frame) = self.macros.top() else {
                return;
            };
            match io.storage.read_line(frame.file, &mut buf) {
                Ok(Some(len)) => {
                    self.feed(io, Origin::Macro, &buf[..len]);
                }
                Ok(None) => {
                    self.return_from_macro(io);
                    return;
                }
                Err(e) => {
                    self.report_error(io, Origin::Macro, e.into());
                    self.return_from_macro(io);
                    return;
                }
            }
        }
    }

    /// Select a file for printing without starting it
    pub fn queue_file_to_print(&mut self, io: &mut Io<'_>, name: &str) -> Result<(), CommandError> {
        let path = join_path(&self.config.gcode_directory, name)?;
        // Closed first so a reused storage slot is never closed under the new file
        self.print.close(io.storage);
        self.streams.get_mut(Origin::File).line.clear();
        let handle = io.storage.open(&path, OpenMode::Read)?;
        self.print.handle = Some(handle);
        self.print.path = path;
        info!("file {} selected", name);
        Ok(())
    }

    /// `M30`: delete a file, deselecting it first if it is the print file
    pub(super) fn delete_file(&mut self, io: &mut Io<'_>, name: &str) -> Result<(), CommandError> {
        let path = join_path(&self.config.gcode_directory, name)?;
        if self.print.path() == Some(path.as_str()) {
            warn!("deleting the selected print file {}", name);
            self.print.close(io.storage);
            self.streams.get_mut(Origin::File).line.clear();
        }
        io.storage.delete(&path)?;
        Ok(())
    }

    /// Start or resume printing the selected file
    pub fn start_print(&mut self) -> Result<(), CommandError> {
        if !self.print.is_selected() {
            return Err(CommandError::NoFileSelected);
        }
        self.print.running = true;
        info!("print started: {}", self.print.path.as_str());
        Ok(())
    }

    /// Pause printing; the current line is kept
    pub fn pause_print(&mut self) {
        if self.print.running {
            info!("print paused");
        }
        self.print.running = false;
    }

    /// Check if a print is in progress
    pub fn is_printing(&self) -> bool {
        self.print.is_running()
    }

    /// Fraction of the print file read so far
    pub fn fraction_printed(&self, storage: &dyn Storage) -> Option<f32> {
        self.print.handle.and_then(|h| storage.fraction_read(h))
    }

    pub(super) fn refill_print(&mut self, io: &mut Io<'_>) {
        let mut buf = [0u8; LINE_CAPACITY + 2];
        for _ in 0..REFILL_BATCH {
            if self.streams.get(Origin::File).is_ready() {
                return;
            }
            let Some(handle) = self.print.handle else {
                return;
            };
            match io.storage.read_line(handle, &mut buf) {
                Ok(Some(len)) => {
                    self.feed(io, Origin::File, &buf[..len]);
                }
                Ok(None) => {
                    info!("print finished: {}", self.print.path.as_str());
                    self.print.close(io.storage);
                    return;
                }
                Err(e) => {
                    error!("print aborted: {}", e.message());
                    self.print.close(io.storage);
                    return;
                }
            }
        }
    }

    /// `M28`: send the following lines of this stream to a file
    pub(super) fn begin_capture(
        &mut self,
        io: &mut Io<'_>,
        origin: Origin,
        name: &str,
    ) -> Result<Outcome, CommandError> {
        let path = join_path(&self.config.gcode_directory, name)?;
        let file = io.storage.open(&path, OpenMode::Write)?;
        let stream = self.streams.get_mut(origin);
        if let Some(old) = stream.capture.replace(Capture { file }) {
            io.storage.close(old.file);
        }
        self.reply_fmt(format_args!("Writing to file: {}", name))?;
        Ok(Outcome::Done)
    }

    /// `M29`: stop capturing
    pub(super) fn end_capture(&mut self, io: &mut Io<'_>, origin: Origin) -> Result<Outcome, CommandError> {
        if let Some(capture) = self.streams.get_mut(origin).capture.take() {
            io.storage.close(capture.file);
            self.reply_fmt(format_args!("Done saving file."))?;
        }
        Ok(Outcome::Done)
    }

    /// Write a line to the capture file instead of executing it
    pub(super) fn capture_line(
        &mut self,
        io: &mut Io<'_>,
        capture: Capture,
        line: &LineBuffer,
    ) -> Result<Outcome, CommandError> {
        io.storage.write(capture.file, line.as_bytes())?;
        io.storage.write(capture.file, b"\n")?;
        Ok(Outcome::Done)
    }
}
