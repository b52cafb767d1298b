//! Axis and drive numbering

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of linear axes (X, Y, Z)
pub const AXES: usize = 3;

/// Number of extruder drives
pub const EXTRUDERS: usize = 2;

/// Total drives: axes first, then extruders
pub const DRIVES: usize = AXES + EXTRUDERS;

/// Linear axis identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in homing order
    pub const ALL: [Axis; AXES] = [Axis::X, Axis::Y, Axis::Z];

    /// Drive index of this axis
    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// G-code letter for this axis
    pub const fn letter(self) -> u8 {
        match self {
            Axis::X => b'X',
            Axis::Y => b'Y',
            Axis::Z => b'Z',
        }
    }

    /// Axis for a drive index, if that drive is an axis
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for axis in Axis::ALL {
            assert_eq!(Axis::from_index(axis.index()), Some(axis));
        }
        assert_eq!(Axis::from_index(AXES), None);
    }

    #[test]
    fn test_letters() {
        assert_eq!(Axis::X.letter(), b'X');
        assert_eq!(Axis::Z.letter(), b'Z');
    }
}
