//! Chip, lane and chip select identifiers

use crate::error::Error;
use std::{fmt, str::FromStr};

/// Parallel data lanes out of every ADC chip
pub const LANES: usize = 4;

/// One of the four HMCAD1511 chips on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Chip {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
}

impl Chip {
    pub const ALL: [Chip; 4] = [Chip::A, Chip::B, Chip::C, Chip::D];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// This chip's bit in a chip-indexed mask
    #[must_use]
    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl TryFrom<u8> for Chip {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Chip::A),
            1 => Ok(Chip::B),
            2 => Ok(Chip::C),
            3 => Ok(Chip::D),
            _ => Err(Error::InvalidChip(v.to_string())),
        }
    }
}

impl FromStr for Chip {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" | "a" | "A" => Ok(Chip::A),
            "1" | "b" | "B" => Ok(Chip::B),
            "2" | "c" | "C" => Ok(Chip::C),
            "3" | "d" | "D" => Ok(Chip::D),
            _ => Err(Error::InvalidChip(s.to_owned())),
        }
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Chip::A => 'A',
            Chip::B => 'B',
            Chip::C => 'C',
            Chip::D => 'D',
        };
        write!(f, "{letter}")
    }
}

/// Which chips listen to the 3-wire bus.
///
/// Bit 0 selects chip A. The lines themselves are active low, see [`ChipSelect::lines`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipSelect(u8);

impl ChipSelect {
    pub const ALL: Self = Self(0b1111);

    /// # Errors
    /// Returns an error if `mask` has bits set above the four chips
    pub fn new(mask: u8) -> Result<Self, Error> {
        if mask > 0b1111 {
            Err(Error::InvalidChipSelect(format!("{mask:#b}")))
        } else {
            Ok(Self(mask))
        }
    }

    /// Select exactly the given chips
    #[must_use]
    pub fn only(chips: &[Chip]) -> Self {
        Self(chips.iter().fold(0, |mask, chip| mask | chip.bit()))
    }

    #[must_use]
    pub fn mask(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn contains(self, chip: Chip) -> bool {
        self.0 & chip.bit() != 0
    }

    /// The active-low CSN lines as driven onto the bus
    #[must_use]
    pub fn lines(self) -> u8 {
        !self.0 & 0b1111
    }
}

impl Default for ChipSelect {
    fn default() -> Self {
        Self::ALL
    }
}

impl FromStr for ChipSelect {
    type Err = Error;

    /// Accepts `0b`, `0x` or plain decimal masks
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = if let Some(bin) = s.strip_prefix("0b") {
            u8::from_str_radix(bin, 2)
        } else if let Some(hex) = s.strip_prefix("0x") {
            u8::from_str_radix(hex, 16)
        } else {
            s.parse()
        };
        let mask = parsed.map_err(|_| Error::InvalidChipSelect(s.to_owned()))?;
        Self::new(mask)
    }
}

/// A single ADC channel: a chip and one of its lanes, written like `a1` or `D4`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelName {
    pub chip: Chip,
    /// Zero-based lane
    pub lane: usize,
}

impl FromStr for ChannelName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || Error::InvalidChannel(s.to_owned());
        let mut chars = s.chars();
        let (Some(c), Some(n), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(bad());
        };
        // Only letters name chips here, digits would be ambiguous with the lane
        if !c.is_ascii_alphabetic() {
            return Err(bad());
        }
        let chip = c.to_string().parse().map_err(|_| bad())?;
        let lane = match n.to_digit(10) {
            Some(n @ 1..=4) => n as usize - 1,
            _ => return Err(bad()),
        };
        Ok(Self { chip, lane })
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.chip, self.lane + 1)
    }
}
