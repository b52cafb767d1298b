//! Stream origins

/// Where a command line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Origin {
    /// Running macro file (innermost frame)
    Macro,
    /// File being printed
    File,
    /// Network host link
    Network,
    /// Serial host link
    Serial,
}

impl Origin {
    /// Number of origins
    pub const COUNT: usize = 4;

    /// Service order, highest priority first
    pub const PRIORITY: [Origin; Origin::COUNT] =
        [Origin::Macro, Origin::File, Origin::Network, Origin::Serial];

    /// Slot in per-origin tables
    pub const fn index(self) -> usize {
        match self {
            Origin::Macro => 0,
            Origin::File => 1,
            Origin::Network => 2,
            Origin::Serial => 3,
        }
    }

    /// Check if this origin is a host link that can be replied to
    pub const fn is_link(self) -> bool {
        matches!(self, Origin::Network | Origin::Serial)
    }

    /// Check if a line rejected for a bad checksum can be re-requested
    pub const fn supports_resend(self) -> bool {
        self.is_link()
    }

    /// Name used in log lines
    pub const fn name(self) -> &'static str {
        match self {
            Origin::Macro => "macro",
            Origin::File => "file",
            Origin::Network => "network",
            Origin::Serial => "serial",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_covers_every_origin_once() {
        for (i, origin) in Origin::PRIORITY.iter().enumerate() {
            assert_eq!(origin.index(), i);
        }
    }

    #[test]
    fn test_only_links_resend() {
        assert!(Origin::Serial.supports_resend());
        assert!(Origin::Network.supports_resend());
        assert!(!Origin::File.supports_resend());
        assert!(!Origin::Macro.supports_resend());
    }
}
