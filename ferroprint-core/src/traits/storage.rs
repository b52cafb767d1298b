//! File storage collaborator trait

/// Opaque handle to an open file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FileHandle(pub u8);

/// How a file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpenMode {
    /// Read from the start
    Read,
    /// Create or truncate, then append
    Write,
}

/// Errors from storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// No file with that name
    NotFound,
    /// Out of file handles or space
    Full,
    /// Handle does not refer to an open file
    BadHandle,
    /// Path does not fit the storage naming rules
    InvalidName,
    /// Underlying device error
    Io,
}

impl StorageError {
    /// Short human-readable description used in replies
    pub fn message(self) -> &'static str {
        match self {
            StorageError::NotFound => "file not found",
            StorageError::Full => "storage full",
            StorageError::BadHandle => "file not open",
            StorageError::InvalidName => "invalid file name",
            StorageError::Io => "storage error",
        }
    }
}

/// Trait for line-oriented file storage
pub trait Storage {
    /// Open a file
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<FileHandle, StorageError>;

    /// Read the next line (without terminator) into `buf`
    ///
    /// Returns `Ok(None)` at end of file. A line longer than `buf` is
    /// consumed whole, `buf` is filled and `buf.len()` is returned.
    fn read_line(&mut self, handle: FileHandle, buf: &mut [u8])
        -> Result<Option<usize>, StorageError>;

    /// Append bytes to a file opened for writing
    fn write(&mut self, handle: FileHandle, bytes: &[u8]) -> Result<(), StorageError>;

    /// Close a file
    fn close(&mut self, handle: FileHandle);

    /// Delete a file
    fn delete(&mut self, path: &str) -> Result<(), StorageError>;

    /// Fraction of a read file consumed so far, if known
    fn fraction_read(&self, _handle: FileHandle) -> Option<f32> {
        None
    }
}
