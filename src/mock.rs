//! A simulated ADC16 board for tests.
//!
//! It decodes the 3-wire bus on rising clock edges the way the chips do, latches delay taps on
//! the reset strobes and counts bit-slip pulses. Snapshots are filled from a sampler function
//! at the moment the trigger goes high.

use crate::{
    chip::LANES,
    transport::{Transport, CONTROLLER},
};
use std::collections::BTreeMap;

pub const IDLE: u32 = 0x3c00_0000;

/// Produces the raw byte lane `lane` of `chip` shows at sample `index`
pub type Sampler = fn(board: &MockBoard, chip: usize, lane: usize, index: usize) -> u8;

#[derive(Debug, thiserror::Error)]
#[error("mock transport refused access number {0}")]
pub struct MockError(pub usize);

pub struct MockBoard {
    /// Every controller write, as (word index, word)
    pub writes: Vec<(u32, u32)>,
    /// Every completed 3-wire transfer, as (address, value)
    pub commands: Vec<(u8, u16)>,
    /// ADC register contents per chip
    pub registers: [BTreeMap<u8, u16>; 4],
    /// Latched delay tap per chip and lane
    pub taps: [[u8; LANES]; 4],
    /// Bit-slip pulses seen per chip
    pub slips: [usize; 4],
    pub triggers: usize,
    pub sampler: Sampler,
    /// Fail every write once this many have gone through
    pub fail_after: Option<usize>,
    pub captures: [Vec<u32>; 4],
    pub serial_bits: Vec<bool>,
    pub serial_csn: u8,
    pub last_control: u32,
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new(|_, _, _, _| 0)
    }
}

impl MockBoard {
    pub fn new(sampler: Sampler) -> Self {
        Self {
            writes: vec![],
            commands: vec![],
            registers: Default::default(),
            taps: [[0; LANES]; 4],
            slips: [0; 4],
            triggers: 0,
            sampler,
            fail_after: None,
            captures: Default::default(),
            serial_bits: vec![],
            serial_csn: 0b1111,
            last_control: 0,
        }
    }

    pub fn writes_to(&self, index: u32) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, w)| *w)
            .collect()
    }

    /// Deskew/sync pattern register of `chip`: 1 is deskew, 2 is sync
    pub fn deskew_sync(&self, chip: usize) -> u16 {
        self.registers[chip].get(&0x45).copied().unwrap_or(0)
    }

    fn three_wire(&mut self, word: u32) {
        if word == IDLE {
            if self.serial_bits.len() == 24 {
                let value = self
                    .serial_bits
                    .iter()
                    .fold(0u32, |acc, &b| (acc << 1) | u32::from(b));
                let addr = (value >> 16) as u8;
                let val = (value & 0xffff) as u16;
                for chip in 0..4 {
                    if self.serial_csn & (1 << chip) == 0 {
                        self.registers[chip].insert(addr, val);
                    }
                }
                self.commands.push((addr, val));
            }
            self.serial_bits.clear();
        } else if word >> 31 == 1 {
            self.serial_bits.push((word >> 30) & 1 == 1);
            self.serial_csn = ((word >> 26) & 0xf) as u8;
        }
    }

    fn control(&mut self, word: u32) {
        for chip in 0..4 {
            let slip = 1 << (7 + chip);
            if word & slip != 0 && self.last_control & slip == 0 {
                self.slips[chip] += 1;
            }
            let strobes = (word >> (16 + 4 * chip)) & 0xf;
            for bit in 0..LANES {
                if strobes & (1 << bit) != 0 {
                    self.taps[chip][LANES - 1 - bit] = ((word >> 11) & 0x1f) as u8;
                }
            }
        }
        if word & 1 == 1 && self.last_control & 1 == 0 {
            self.triggers += 1;
            let board: &MockBoard = self;
            let captures: [Vec<u32>; 4] = std::array::from_fn(|chip| {
                (0..1024)
                    .map(|i| {
                        let bytes: [u8; 4] =
                            std::array::from_fn(|lane| (board.sampler)(board, chip, lane, i));
                        u32::from_be_bytes(bytes)
                    })
                    .collect()
            });
            self.captures = captures;
        }
        self.last_control = word;
    }

    fn capture_word(&self, index: u32) -> u32 {
        let chip = (index / 1024) as usize - 1;
        self.captures[chip]
            .get((index % 1024) as usize)
            .copied()
            .unwrap_or(0)
    }

    fn check_failure(&self) -> Result<(), MockError> {
        match self.fail_after {
            Some(n) if self.writes.len() >= n => Err(MockError(self.writes.len())),
            _ => Ok(()),
        }
    }
}

impl Transport for MockBoard {
    type Error = MockError;

    async fn read(&mut self, name: &str, index: u32) -> Result<u32, Self::Error> {
        assert_eq!(name, CONTROLLER);
        Ok(self.capture_word(index))
    }

    async fn write(&mut self, name: &str, index: u32, word: u32) -> Result<(), Self::Error> {
        assert_eq!(name, CONTROLLER);
        self.check_failure()?;
        self.writes.push((index, word));
        match index {
            0 => self.three_wire(word),
            1 => self.control(word),
            _ => panic!("write to snapshot memory at {index}"),
        }
        Ok(())
    }

    async fn read_block(
        &mut self,
        name: &str,
        offset: u32,
        len: u32,
    ) -> Result<Vec<u32>, Self::Error> {
        assert_eq!(name, CONTROLLER);
        Ok((offset..offset + len).map(|i| self.capture_word(i)).collect())
    }
}
