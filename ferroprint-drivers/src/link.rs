//! Line-oriented host link
//!
//! Bytes arrive in arbitrary chunks through [`LineLink::receive`] and are
//! handed to the engine one complete line at a time. Replies are queued
//! for the host side to collect with [`LineLink::take_reply`].

use heapless::{Deque, String};

use ferroprint_core::engine::REPLY_CAPACITY;
use ferroprint_core::traits::Transport;

/// Receive buffer size in bytes
pub const RX_CAPACITY: usize = 512;

/// Replies held until the host collects them
pub const TX_DEPTH: usize = 16;

/// Longest reply line kept; longer replies are cut
pub const REPLY_LINE: usize = REPLY_CAPACITY + 16;

/// One queued reply
pub type ReplyLine = String<REPLY_LINE>;

/// Host link over a byte stream
pub struct LineLink {
    rx: Deque<u8, RX_CAPACITY>,
    /// Complete lines in `rx`
    lines: usize,
    tx: Deque<ReplyLine, TX_DEPTH>,
    dropped_bytes: usize,
    dropped_replies: usize,
}

impl Default for LineLink {
    fn default() -> Self {
        Self::new()
    }
}

impl LineLink {
    /// Create an idle link
    pub const fn new() -> Self {
        Self {
            rx: Deque::new(),
            lines: 0,
            tx: Deque::new(),
            dropped_bytes: 0,
            dropped_replies: 0,
        }
    }

    /// Feed bytes received from the host
    ///
    /// Returns the number of bytes accepted. Bytes that do not fit are
    /// dropped.
    pub fn receive(&mut self, bytes: &[u8]) -> usize {
        for (n, &b) in bytes.iter().enumerate() {
            if self.rx.push_back(b).is_err() {
                self.dropped_bytes += bytes.len() - n;
                warn!("link receive overflow, {} bytes dropped", bytes.len() - n);
                return n;
            }
            if b == b'\n' {
                self.lines += 1;
            }
        }
        bytes.len()
    }

    /// Feed one line, adding the terminator
    pub fn send_line(&mut self, line: &str) -> bool {
        let needed = line.len() + 1;
        if self.rx.capacity() - self.rx.len() < needed {
            return false;
        }
        self.receive(line.as_bytes());
        self.receive(b"\n");
        true
    }

    /// Take the oldest queued reply
    pub fn take_reply(&mut self) -> Option<ReplyLine> {
        self.tx.pop_front()
    }

    /// Queued replies, oldest first
    pub fn replies(&self) -> impl Iterator<Item = &ReplyLine> {
        self.tx.iter()
    }

    /// Total bytes lost to receive overflow
    pub fn dropped_bytes(&self) -> usize {
        self.dropped_bytes
    }

    /// Replies discarded because the host did not collect them in time
    pub fn dropped_replies(&self) -> usize {
        self.dropped_replies
    }
}

impl Transport for LineLink {
    fn has_line(&self) -> bool {
        self.lines > 0
    }

    fn next_line(&mut self, buf: &mut [u8]) -> Option<usize> {
        if self.lines == 0 {
            return None;
        }
        let mut n = 0;
        while let Some(b) = self.rx.pop_front() {
            if b == b'\n' {
                break;
            }
            if n < buf.len() {
                buf[n] = b;
                n += 1;
            }
        }
        self.lines -= 1;
        if n > 0 && buf[n - 1] == b'\r' {
            n -= 1;
        }
        Some(n)
    }

    fn reply(&mut self, text: &str) {
        let mut line = ReplyLine::new();
        for c in text.chars() {
            if line.push(c).is_err() {
                break;
            }
        }
        if let Err(line) = self.tx.push_back(line) {
            // Host is not reading: the oldest reply goes
            if let Some(old) = self.tx.pop_front() {
                self.dropped_replies += 1;
                warn!("reply queue full, dropped {}", old.as_str());
            }
            if self.tx.push_back(line).is_err() {
                self.dropped_replies += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next(link: &mut LineLink) -> Option<std::string::String> {
        let mut buf = [0u8; 32];
        let n = link.next_line(&mut buf)?;
        Some(std::string::String::from_utf8(buf[..n].to_vec()).unwrap())
    }

    #[test]
    fn test_lines_assembled_from_chunks() {
        let mut link = LineLink::new();
        link.receive(b"G1 X");
        assert!(!link.has_line());
        link.receive(b"10\r\nM105\n");
        assert!(link.has_line());
        assert_eq!(next(&mut link).as_deref(), Some("G1 X10"));
        assert_eq!(next(&mut link).as_deref(), Some("M105"));
        assert_eq!(next(&mut link), None);
    }

    #[test]
    fn test_long_line_truncated() {
        let mut link = LineLink::new();
        link.send_line(&"X".repeat(40));
        link.send_line("G4");
        assert_eq!(next(&mut link).map(|l| l.len()), Some(32));
        assert_eq!(next(&mut link).as_deref(), Some("G4"));
    }

    #[test]
    fn test_receive_overflow() {
        let mut link = LineLink::new();
        let chunk = [b'M'; RX_CAPACITY + 10];
        assert_eq!(link.receive(&chunk), RX_CAPACITY);
        assert_eq!(link.dropped_bytes(), 10);
        assert!(!link.send_line("G1"));
    }

    #[test]
    fn test_reply_queue_drops_oldest() {
        let mut link = LineLink::new();
        for i in 0..TX_DEPTH + 2 {
            let mut text = ReplyLine::new();
            core::fmt::Write::write_fmt(&mut text, format_args!("ok {}", i)).unwrap();
            link.reply(&text);
        }
        assert_eq!(link.replies().count(), TX_DEPTH);
        assert_eq!(link.dropped_replies(), 2);
        assert_eq!(link.take_reply().as_deref(), Some("ok 2"));

        link.reply("ok");
        assert_eq!(link.dropped_replies(), 2);
    }
}
