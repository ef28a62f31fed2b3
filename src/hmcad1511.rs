//! Register map for the parts of the HMCAD1511 we program over the 3-wire bus
use packed_struct::prelude::*;
use std::str::FromStr;

use crate::{error::Error, register_address};

#[derive(Debug, Copy, Clone)]
#[repr(u8)]
enum Hmcad1511Address {
    Reset = 0x00,
    SleepPd = 0x0F,
    PatternCtl = 0x25,
    CustomPattern1 = 0x26,
    CustomPattern2 = 0x27,
    DeskewSyncPattern = 0x45,
    DataFormat = 0x46,
}

register_address! {Hmcad1511Address, Reset}
register_address! {Hmcad1511Address, SleepPd}
register_address! {Hmcad1511Address, PatternCtl}
register_address! {Hmcad1511Address, CustomPattern1}
register_address! {Hmcad1511Address, CustomPattern2}
register_address! {Hmcad1511Address, DeskewSyncPattern}
register_address! {Hmcad1511Address, DataFormat}

#[derive(PackedStruct, Debug, Default, Clone, Copy, PartialEq)]
#[packed_struct(bit_numbering = "lsb0", size_bytes = "2")]
pub struct Reset {
    /// Self-clearing software reset
    #[packed_field(bits = "0")]
    pub reset: bool,
}

#[derive(PackedStruct, Debug, Default, Clone, Copy, PartialEq)]
#[packed_struct(bit_numbering = "lsb0", size_bytes = "2")]
pub struct SleepPd {
    #[packed_field(bits = "9")]
    pub power_down: bool,
}

#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Default)]
pub enum Pattern {
    #[default]
    Disabled = 0b000,
    SingleCustom = 0b001,
    DualCustom = 0b010,
    Ramp = 0b100,
}

#[derive(PackedStruct, Debug, Default, Clone, Copy, PartialEq)]
#[packed_struct(bit_numbering = "lsb0", size_bytes = "2")]
pub struct PatternCtl {
    #[packed_field(bits = "4..=6", ty = "enum")]
    pub pattern: Pattern,
}

#[derive(PackedStruct, Debug, Default, Clone, Copy, PartialEq)]
#[packed_struct(bit_numbering = "lsb0", size_bytes = "2")]
pub struct CustomPattern1 {
    #[packed_field(bits = "8..=15")]
    pub bits: u8,
}

#[derive(PackedStruct, Debug, Default, Clone, Copy, PartialEq)]
#[packed_struct(bit_numbering = "lsb0", size_bytes = "2")]
pub struct CustomPattern2 {
    #[packed_field(bits = "8..=15")]
    pub bits: u8,
}

#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Default)]
pub enum DeskewSyncMode {
    #[default]
    Disabled = 0,
    /// 01010101 on every lane
    Deskew = 1,
    /// 11110000 on every lane
    Sync = 2,
}

#[derive(PackedStruct, Debug, Default, Clone, Copy, PartialEq)]
#[packed_struct(bit_numbering = "lsb0", size_bytes = "2")]
pub struct DeskewSyncPattern {
    #[packed_field(bits = "0..=1", ty = "enum")]
    pub mode: DeskewSyncMode,
}

#[derive(PackedStruct, Debug, Default, Clone, Copy, PartialEq)]
#[packed_struct(bit_numbering = "lsb0", size_bytes = "2")]
pub struct DataFormat {
    /// Two's complement output instead of offset binary
    #[packed_field(bits = "2")]
    pub invert_msb: bool,
    #[packed_field(bits = "3")]
    pub msb_first: bool,
}

/// What the chips put on their data lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestPattern {
    /// Ramp from 0 to 255
    Ramp,
    /// Alternating bits, used to find the data eye
    Deskew,
    /// Frame pattern, used to align word boundaries
    Sync,
    Custom,
    Dual,
    /// Sampled data
    #[default]
    None,
}

impl FromStr for TestPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ramp" => Ok(Self::Ramp),
            "deskew" | "eye" => Ok(Self::Deskew),
            "sync" | "frame" => Ok(Self::Sync),
            "custom" => Ok(Self::Custom),
            "dual" => Ok(Self::Dual),
            "none" => Ok(Self::None),
            _ => Err(Error::InvalidPattern(s.to_owned())),
        }
    }
}
