//! Fixed-capacity RAM file system
//!
//! A flat table of named byte buffers. Paths are stored whole, so
//! "directories" are just name prefixes. Lines end at `\n`; a trailing
//! `\r` is dropped on read.

use heapless::{String, Vec};

use ferroprint_core::config::MAX_PATH_LEN;
use ferroprint_core::traits::{FileHandle, OpenMode, Storage, StorageError};

/// Number of files that can be open at once
pub const MAX_OPEN_FILES: usize = 8;

struct RamFile<const SIZE: usize> {
    path: String<MAX_PATH_LEN>,
    data: Vec<u8, SIZE>,
}

#[derive(Debug, Clone, Copy)]
struct OpenFile {
    /// Index into the file table
    file: usize,
    pos: usize,
    mode: OpenMode,
}

/// RAM storage holding up to `FILES` files of `SIZE` bytes each
pub struct RamStorage<const FILES: usize, const SIZE: usize> {
    files: [Option<RamFile<SIZE>>; FILES],
    open: [Option<OpenFile>; MAX_OPEN_FILES],
}

impl<const FILES: usize, const SIZE: usize> Default for RamStorage<FILES, SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const FILES: usize, const SIZE: usize> RamStorage<FILES, SIZE> {
    /// Create empty storage
    pub fn new() -> Self {
        Self {
            files: core::array::from_fn(|_| None),
            open: [None; MAX_OPEN_FILES],
        }
    }

    fn find(&self, path: &str) -> Option<usize> {
        self.files
            .iter()
            .position(|f| f.as_ref().is_some_and(|f| f.path.as_str() == path))
    }

    /// Find a file or create an empty one
    fn find_or_create(&mut self, path: &str) -> Result<usize, StorageError> {
        if let Some(i) = self.find(path) {
            return Ok(i);
        }
        let name = String::try_from(path).map_err(|_| StorageError::InvalidName)?;
        let free = self
            .files
            .iter()
            .position(Option::is_none)
            .ok_or(StorageError::Full)?;
        self.files[free] = Some(RamFile {
            path: name,
            data: Vec::new(),
        });
        Ok(free)
    }

    fn handle(&self, handle: FileHandle) -> Result<OpenFile, StorageError> {
        self.open
            .get(usize::from(handle.0))
            .copied()
            .flatten()
            .ok_or(StorageError::BadHandle)
    }

    /// Create or replace a file with the given contents
    pub fn add_file(&mut self, path: &str, contents: &[u8]) -> Result<(), StorageError> {
        let i = self.find_or_create(path)?;
        let file = self.files[i].as_mut().ok_or(StorageError::Io)?;
        file.data.clear();
        file.data
            .extend_from_slice(contents)
            .map_err(|_| StorageError::Full)
    }

    /// Contents of a file
    pub fn contents(&self, path: &str) -> Option<&[u8]> {
        let i = self.find(path)?;
        self.files[i].as_ref().map(|f| f.data.as_slice())
    }

    /// Check if a file exists
    pub fn exists(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Number of open handles
    pub fn open_count(&self) -> usize {
        self.open.iter().filter(|h| h.is_some()).count()
    }
}

impl<const FILES: usize, const SIZE: usize> Storage for RamStorage<FILES, SIZE> {
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle, StorageError> {
        let slot = self
            .open
            .iter()
            .position(Option::is_none)
            .ok_or(StorageError::Full)?;
        let file = match mode {
            OpenMode::Read => self.find(path).ok_or(StorageError::NotFound)?,
            OpenMode::Write => {
                let i = self.find_or_create(path)?;
                if let Some(f) = self.files[i].as_mut() {
                    f.data.clear();
                }
                i
            }
        };
        self.open[slot] = Some(OpenFile { file, pos: 0, mode });
        trace!("opened file {} as handle {}", path, slot);
        Ok(FileHandle(slot as u8))
    }

    fn read_line(
        &mut self,
        handle: FileHandle,
        buf: &mut [u8],
    ) -> Result<Option<usize>, StorageError> {
        let open = self.handle(handle)?;
        if open.mode != OpenMode::Read {
            return Err(StorageError::BadHandle);
        }
        let file = self.files[open.file].as_ref().ok_or(StorageError::NotFound)?;
        let data = file.data.as_slice();
        if open.pos >= data.len() {
            return Ok(None);
        }

        let rest = &data[open.pos..];
        let (line, consumed) = match rest.iter().position(|&b| b == b'\n') {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let n = line.len().min(buf.len());
        buf[..n].copy_from_slice(&line[..n]);

        if let Some(o) = self.open[usize::from(handle.0)].as_mut() {
            o.pos += consumed;
        }
        Ok(Some(n))
    }

    fn write(&mut self, handle: FileHandle, bytes: &[u8]) -> Result<(), StorageError> {
        let open = self.handle(handle)?;
        if open.mode != OpenMode::Write {
            return Err(StorageError::BadHandle);
        }
        let file = self.files[open.file].as_mut().ok_or(StorageError::NotFound)?;
        file.data
            .extend_from_slice(bytes)
            .map_err(|_| StorageError::Full)
    }

    fn close(&mut self, handle: FileHandle) {
        if let Some(h) = self.open.get_mut(usize::from(handle.0)) {
            *h = None;
        }
    }

    fn delete(&mut self, path: &str) -> Result<(), StorageError> {
        let i = self.find(path).ok_or(StorageError::NotFound)?;
        self.files[i] = None;
        for h in self.open.iter_mut() {
            if h.is_some_and(|o| o.file == i) {
                *h = None;
            }
        }
        debug!("deleted {}", path);
        Ok(())
    }

    fn fraction_read(&self, handle: FileHandle) -> Option<f32> {
        let open = self.handle(handle).ok()?;
        let len = self.files[open.file].as_ref()?.data.len();
        (len > 0).then(|| open.pos as f32 / len as f32)
    }
}
