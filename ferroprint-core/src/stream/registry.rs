//! Per-origin stream registry

use super::origin::Origin;
use crate::gcode::LineBuffer;
use crate::traits::FileHandle;

/// Capture target while a stream is writing lines to a file (`M28`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capture {
    /// File receiving the captured lines
    pub file: FileHandle,
}

/// One source of command lines
#[derive(Debug, Clone)]
pub struct InputStream {
    origin: Origin,
    /// Line being assembled or held for dispatch
    pub line: LineBuffer,
    /// Set while lines go to a file instead of being executed
    pub capture: Option<Capture>,
}

impl InputStream {
    /// Create an idle stream for an origin
    pub const fn new(origin: Origin) -> Self {
        Self {
            origin,
            line: LineBuffer::new(),
            capture: None,
        }
    }

    /// Origin of this stream
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Check if a complete line is waiting for dispatch
    pub fn is_ready(&self) -> bool {
        self.line.is_ready()
    }
}

/// All input streams, indexed by [`Origin`]
#[derive(Debug, Clone)]
pub struct StreamRegistry {
    streams: [InputStream; Origin::COUNT],
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamRegistry {
    /// Create a registry with every stream idle
    pub const fn new() -> Self {
        Self {
            streams: [
                InputStream::new(Origin::Macro),
                InputStream::new(Origin::File),
                InputStream::new(Origin::Network),
                InputStream::new(Origin::Serial),
            ],
        }
    }

    /// Stream for an origin
    pub fn get(&self, origin: Origin) -> &InputStream {
        &self.streams[origin.index()]
    }

    /// Mutable stream for an origin
    pub fn get_mut(&mut self, origin: Origin) -> &mut InputStream {
        &mut self.streams[origin.index()]
    }

    /// Pick the next stream to dispatch from
    ///
    /// While a macro runs only the macro stream is eligible, so a macro
    /// completes before anything else is serviced. Otherwise the first
    /// ready stream in [`Origin::PRIORITY`] order wins.
    pub fn select(&self, macro_running: bool) -> Option<Origin> {
        if macro_running {
            return self.get(Origin::Macro).is_ready().then_some(Origin::Macro);
        }
        Origin::PRIORITY
            .into_iter()
            .filter(|&o| o != Origin::Macro)
            .find(|&o| self.get(o).is_ready())
    }

    /// Check if any stream holds a line
    pub fn any_ready(&self) -> bool {
        self.streams.iter().any(InputStream::is_ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(registry: &mut StreamRegistry, origin: Origin) {
        registry.get_mut(origin).line.put_line(b"G4 P1").unwrap();
    }

    #[test]
    fn test_nothing_ready() {
        let registry = StreamRegistry::new();
        assert_eq!(registry.select(false), None);
        assert!(!registry.any_ready());
    }

    #[test]
    fn test_priority_order() {
        let mut registry = StreamRegistry::new();
        ready(&mut registry, Origin::Serial);
        assert_eq!(registry.select(false), Some(Origin::Serial));
        ready(&mut registry, Origin::Network);
        assert_eq!(registry.select(false), Some(Origin::Network));
        ready(&mut registry, Origin::File);
        assert_eq!(registry.select(false), Some(Origin::File));
    }

    #[test]
    fn test_macro_excludes_other_streams() {
        let mut registry = StreamRegistry::new();
        ready(&mut registry, Origin::Serial);
        ready(&mut registry, Origin::File);
        assert_eq!(registry.select(true), None);
        ready(&mut registry, Origin::Macro);
        assert_eq!(registry.select(true), Some(Origin::Macro));
    }

    #[test]
    fn test_streams_are_independent() {
        let mut registry = StreamRegistry::new();
        registry.get_mut(Origin::Serial).line.put(b'G').unwrap();
        ready(&mut registry, Origin::Network);
        registry.get_mut(Origin::Network).line.clear();
        assert_eq!(registry.get(Origin::Serial).line.as_bytes(), b"G");
    }
}
