//! The `adc16_controller` device: bit-banged 3-wire programming of the HMCAD1511 chips plus
//! the delay tap, bit-slip and snapshot control bits

use crate::{
    chip::{Chip, ChipSelect},
    error::{Error, Result},
    hmcad1511::*,
    transport::{Transport, CONTROLLER},
    utils::RegisterAddress,
};
use packed_struct::prelude::*;
use tracing::{debug, trace};

/// Word index of the 3-wire lines
pub(crate) const THREE_WIRE: u32 = 0;
/// Word index of the delay, bit-slip and snapshot control bits
pub(crate) const CONTROL: u32 = 1;

/// Delay taps per lane
pub const TAPS: u8 = 32;
/// Lane mask covering every lane of a chip
pub const ALL_LANES: u8 = 0b1111;

// ======================================= #
// 3-Wire Word (word 0)                    #
// ======================================= #
// 31    SCLK                              #
// 30    SDATA                             #
// 26-29 CSN, active low, chip A in 26     #
// ======================================= #

#[derive(PackedStruct, Debug, Default)]
#[packed_struct(bit_numbering = "lsb0", size_bytes = "4")]
pub struct ThreeWireWord {
    #[packed_field(bits = "31")]
    pub sclk: bool,
    #[packed_field(bits = "30")]
    pub sdata: bool,
    #[packed_field(bits = "26..=29")]
    pub csn: Integer<u8, packed_bits::Bits<4>>,
}

impl ThreeWireWord {
    /// Clock low, data low, nobody selected
    #[must_use]
    pub fn idle() -> Self {
        Self {
            csn: 0b1111u8.into(),
            ..Default::default()
        }
    }

    fn bit(cs: ChipSelect, sdata: bool, sclk: bool) -> Self {
        Self {
            sclk,
            sdata,
            csn: cs.lines().into(),
        }
    }
}

// ======================================= #
// Control Word (word 1)                   #
// ======================================= #
// 16-31 Delay reset, a nibble per chip    #
//       (chip A in 16-19, D in 28-31)     #
// 11-15 Delay tap                         #
//  7-10 ISERDES bit-slip, chip A in 7     #
//     0 Snapshot request                  #
// ======================================= #

#[derive(PackedStruct, Debug, Default)]
#[packed_struct(bit_numbering = "lsb0", size_bytes = "4")]
pub struct ControlWord {
    #[packed_field(bits = "28..=31")]
    pub delay_rst_d: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "24..=27")]
    pub delay_rst_c: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "20..=23")]
    pub delay_rst_b: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "16..=19")]
    pub delay_rst_a: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "11..=15")]
    pub delay_tap: Integer<u8, packed_bits::Bits<5>>,
    #[packed_field(bits = "10")]
    pub bitslip_d: bool,
    #[packed_field(bits = "9")]
    pub bitslip_c: bool,
    #[packed_field(bits = "8")]
    pub bitslip_b: bool,
    #[packed_field(bits = "7")]
    pub bitslip_a: bool,
    #[packed_field(bits = "0")]
    pub snap_request: bool,
}

impl ControlWord {
    #[must_use]
    pub fn snap_request() -> Self {
        Self {
            snap_request: true,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn bitslip(chips: &[Chip]) -> Self {
        let mut word = Self::default();
        for chip in chips {
            match chip {
                Chip::A => word.bitslip_a = true,
                Chip::B => word.bitslip_b = true,
                Chip::C => word.bitslip_c = true,
                Chip::D => word.bitslip_d = true,
            }
        }
        word
    }

    #[must_use]
    pub fn tap(tap: u8) -> Self {
        Self {
            delay_tap: wrap_tap(tap).into(),
            ..Default::default()
        }
    }

    /// Add the delay reset strobes for `lanes` of `chip`, in gateware lane order
    #[must_use]
    pub fn with_delay_reset(mut self, chip: Chip, lanes: u8) -> Self {
        let strobe = reverse_lanes(lanes).into();
        match chip {
            Chip::A => self.delay_rst_a = strobe,
            Chip::B => self.delay_rst_b = strobe,
            Chip::C => self.delay_rst_c = strobe,
            Chip::D => self.delay_rst_d = strobe,
        }
        self
    }
}

/// The gateware numbers the delay reset strobes backwards from the lanes (strobe bit 3 is
/// lane 0), so lane masks get mirrored within their low nibble before they're written.
#[must_use]
pub fn reverse_lanes(lanes: u8) -> u8 {
    ((lanes & 1) << 3) | ((lanes & 2) << 1) | ((lanes & 4) >> 1) | ((lanes & 8) >> 3)
}

/// Taps wrap: the delay line only has five bits, so tap 32 is tap 0 again
#[must_use]
pub fn wrap_tap(tap: u8) -> u8 {
    tap % TAPS
}

/// Handle to the ADC16 controller of a connected board
#[derive(Debug)]
pub struct Adc16<T> {
    pub(crate) transport: T,
    /// Chips that receive 3-wire register writes
    cs: ChipSelect,
}

impl<T> Adc16<T>
where
    T: Transport,
{
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cs: ChipSelect::default(),
        }
    }

    #[must_use]
    pub fn chip_select(&self) -> ChipSelect {
        self.cs
    }

    /// Sets which chips the following register writes go to
    pub fn set_chip_select(&mut self, cs: ChipSelect) {
        self.cs = cs;
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> T {
        self.transport
    }

    pub(crate) async fn write_word(&mut self, index: u32, word: u32) -> Result<()> {
        trace!("Controller word {index} <- {word:#010x}");
        self.transport
            .write(CONTROLLER, index, word)
            .await
            .map_err(Error::transport)
    }

    async fn write_three_wire(&mut self, word: ThreeWireWord) -> Result<()> {
        self.write_word(THREE_WIRE, u32::from_be_bytes(word.pack()?))
            .await
    }

    pub(crate) async fn write_control(&mut self, word: ControlWord) -> Result<()> {
        self.write_word(CONTROL, u32::from_be_bytes(word.pack()?)).await
    }

    /// Clock one bit out, the chips sample SDATA on the rising edge
    async fn send_3wire_bit(&mut self, cs: ChipSelect, bit: bool) -> Result<()> {
        self.write_three_wire(ThreeWireWord::bit(cs, bit, false))
            .await?;
        self.write_three_wire(ThreeWireWord::bit(cs, bit, true))
            .await
    }

    /// Write `val` to ADC register `addr` of the chips in `cs`
    /// # Errors
    /// Returns an error on bad transport, leaving the bus mid-transfer
    pub async fn write_register_with(&mut self, cs: ChipSelect, addr: u8, val: u16) -> Result<()> {
        debug!(cs = cs.mask(), "3-wire write {addr:#04x} <- {val:#06x}");
        self.write_three_wire(ThreeWireWord::idle()).await?;
        for i in (0..8).rev() {
            self.send_3wire_bit(cs, (addr >> i) & 1 == 1).await?;
        }
        for i in (0..16).rev() {
            self.send_3wire_bit(cs, (val >> i) & 1 == 1).await?;
        }
        self.write_three_wire(ThreeWireWord::idle()).await
    }

    /// Write `val` to ADC register `addr` of the currently selected chips
    /// # Errors
    /// Returns an error on bad transport
    pub async fn write_register(&mut self, addr: u8, val: u16) -> Result<()> {
        let cs = self.cs;
        self.write_register_with(cs, addr, val).await
    }

    async fn write_reg<R>(&mut self, reg: &R) -> Result<()>
    where
        R: PackedStruct<ByteArray = [u8; 2]> + RegisterAddress,
    {
        let val = u16::from_be_bytes(reg.pack()?);
        self.write_register(R::address(), val).await
    }

    /// Software reset of the selected chips
    /// # Errors
    /// Returns an error on bad transport
    pub async fn adc_reset(&mut self) -> Result<()> {
        self.write_reg(&Reset { reset: true }).await
    }

    /// Power the selected chips down and back up
    /// # Errors
    /// Returns an error on bad transport
    pub async fn adc_power_cycle(&mut self) -> Result<()> {
        self.write_reg(&SleepPd { power_down: true }).await?;
        self.write_reg(&SleepPd { power_down: false }).await
    }

    /// Bring the selected chips to a clean slate
    /// # Errors
    /// Returns an error on bad transport
    pub async fn adc_init(&mut self) -> Result<()> {
        self.adc_reset().await?;
        self.adc_power_cycle().await
    }

    /// Selects a test pattern (or sampled data) on the selected chips
    /// # Errors
    /// Returns an error on bad transport
    pub async fn set_pattern(&mut self, pattern: TestPattern) -> Result<()> {
        self.write_reg(&PatternCtl::default()).await?;
        self.write_reg(&DeskewSyncPattern::default()).await?;
        match pattern {
            TestPattern::Ramp => {
                self.write_reg(&PatternCtl {
                    pattern: Pattern::Ramp,
                })
                .await
            }
            TestPattern::Deskew => {
                self.write_reg(&DeskewSyncPattern {
                    mode: DeskewSyncMode::Deskew,
                })
                .await
            }
            TestPattern::Sync => {
                self.write_reg(&DeskewSyncPattern {
                    mode: DeskewSyncMode::Sync,
                })
                .await
            }
            TestPattern::Custom => {
                self.write_reg(&PatternCtl {
                    pattern: Pattern::SingleCustom,
                })
                .await
            }
            TestPattern::Dual => {
                self.write_reg(&PatternCtl {
                    pattern: Pattern::DualCustom,
                })
                .await
            }
            TestPattern::None => Ok(()),
        }
    }

    /// Sets the output binary format and bit order.
    /// `invert_msb` gives two's complement instead of offset binary.
    /// # Errors
    /// Returns an error on bad transport
    pub async fn set_data_format(&mut self, invert_msb: bool, msb_first: bool) -> Result<()> {
        self.write_reg(&DataFormat {
            invert_msb,
            msb_first,
        })
        .await
    }

    /// # Errors
    /// Returns an error on bad transport
    pub async fn set_custom1(&mut self, bits: u8) -> Result<()> {
        self.write_reg(&CustomPattern1 { bits }).await
    }

    /// # Errors
    /// Returns an error on bad transport
    pub async fn set_custom2(&mut self, bits: u8) -> Result<()> {
        self.write_reg(&CustomPattern2 { bits }).await
    }

    /// Pulse the ISERDES bit-slip of `chips`, rotating their framing by one bit
    /// # Errors
    /// Returns an error on bad transport
    pub async fn bitslip(&mut self, chips: &[Chip]) -> Result<()> {
        self.write_control(ControlWord::default()).await?;
        self.write_control(ControlWord::bitslip(chips)).await?;
        self.write_control(ControlWord::default()).await
    }

    /// Sets the delay tap of `chip` to `tap` for the lanes in `lanes` (bit 0 is lane 0).
    /// Other lanes keep whatever tap they latched last.
    /// # Errors
    /// Returns an error on bad transport
    pub async fn delay_tap(&mut self, chip: Chip, tap: u8, lanes: u8) -> Result<()> {
        trace!(%chip, tap, lanes, "Setting delay tap");
        // Tap bits settle before the strobe goes up
        self.write_control(ControlWord::tap(tap)).await?;
        self.write_control(ControlWord::tap(tap).with_delay_reset(chip, lanes))
            .await?;
        self.write_control(ControlWord::default()).await
    }

    /// Latch a snapshot on every chip at once
    pub(crate) async fn snap_trigger(&mut self) -> Result<()> {
        self.write_control(ControlWord::default()).await?;
        self.write_control(ControlWord::snap_request()).await?;
        self.write_control(ControlWord::default()).await
    }
}
