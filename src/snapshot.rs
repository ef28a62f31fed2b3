//! Snapshot capture: one global trigger, then per-chip reads out of the controller's BRAMs

use crate::{
    chip::{Chip, LANES},
    controller::Adc16,
    error::{Error, Result},
    transport::{Transport, CONTROLLER},
};
use tracing::trace;

/// Depth of each chip's snapshot buffer, in samples per lane
pub const MAX_SAMPLES: usize = 1024;
/// Words between the start of consecutive chips' snapshot buffers
const CHIP_STRIDE: u32 = 1024;

/// Requests outside of `1..=1024` samples are quietly pulled into range
#[must_use]
pub fn clamp_sample_count(n: usize) -> usize {
    n.clamp(1, MAX_SAMPLES)
}

/// Raw sample byte to signed, `((v + 128) mod 256) - 128`
#[must_use]
pub fn to_signed(v: u8) -> i8 {
    ((i16::from(v) + 128) % 256 - 128) as i8
}

/// Samples captured from one chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipSnapshot {
    pub chip: Chip,
    /// Samples per lane after clamping
    pub samples: usize,
    pub lanes: [Vec<i8>; LANES],
}

impl ChipSnapshot {
    /// Every word holds one sample of each lane, lane 0 in the most significant byte
    fn from_words(chip: Chip, words: &[u32]) -> Self {
        let mut lanes: [Vec<i8>; LANES] = Default::default();
        for word in words {
            for (lane, byte) in lanes.iter_mut().zip(word.to_be_bytes()) {
                lane.push(to_signed(byte));
            }
        }
        Self {
            chip,
            samples: words.len(),
            lanes,
        }
    }

    #[must_use]
    pub fn lane(&self, lane: usize) -> &[i8] {
        &self.lanes[lane]
    }
}

impl<T> Adc16<T>
where
    T: Transport,
{
    /// Snap every chip at once and read back `sample_count` samples per lane of each of `chips`,
    /// in the order given
    /// # Errors
    /// Returns an error on bad transport
    pub async fn snapshot(
        &mut self,
        chips: &[Chip],
        sample_count: usize,
    ) -> Result<Vec<ChipSnapshot>> {
        let n = clamp_sample_count(sample_count);
        self.snap_trigger().await?;
        let mut out = Vec::with_capacity(chips.len());
        for &chip in chips {
            out.push(self.read_snapshot(chip, n).await?);
        }
        Ok(out)
    }

    /// Snap every chip and read back only `chip`
    /// # Errors
    /// Returns an error on bad transport
    pub async fn snapshot_one(&mut self, chip: Chip, sample_count: usize) -> Result<ChipSnapshot> {
        let n = clamp_sample_count(sample_count);
        self.snap_trigger().await?;
        self.read_snapshot(chip, n).await
    }

    async fn read_snapshot(&mut self, chip: Chip, n: usize) -> Result<ChipSnapshot> {
        let offset = CHIP_STRIDE * chip.index() as u32 + CHIP_STRIDE;
        trace!(%chip, offset, n, "Reading snapshot");
        let words = if n == 1 {
            vec![self
                .transport
                .read(CONTROLLER, offset)
                .await
                .map_err(Error::transport)?]
        } else {
            self.transport
                .read_block(CONTROLLER, offset, n as u32)
                .await
                .map_err(Error::transport)?
        };
        Ok(ChipSnapshot::from_words(chip, &words))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::CONTROL;
    use crate::mock::MockBoard;

    /// Encodes where each byte came from so reshaping mistakes show up
    fn tagged(_: &MockBoard, chip: usize, lane: usize, index: usize) -> u8 {
        ((chip << 6) | (lane << 4) | (index & 0xf)) as u8
    }

    #[test]
    fn test_sign_conversion() {
        assert_eq!(to_signed(0), 0);
        assert_eq!(to_signed(0x2a), 42);
        assert_eq!(to_signed(127), 127);
        assert_eq!(to_signed(128), -128);
        assert_eq!(to_signed(255), -1);
        for b in 0..=255u8 {
            let s = to_signed(b);
            assert_eq!(s, b as i8);
            assert_eq!(s as u8, b);
        }
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_sample_count(0), 1);
        assert_eq!(clamp_sample_count(1), 1);
        assert_eq!(clamp_sample_count(100), 100);
        assert_eq!(clamp_sample_count(1024), 1024);
        assert_eq!(clamp_sample_count(65536), 1024);
    }

    #[test]
    fn test_from_words() {
        let snap = ChipSnapshot::from_words(Chip::B, &[0x0180_7fff, 0x2a2a_2a2a]);
        assert_eq!(snap.samples, 2);
        assert_eq!(snap.lane(0), &[1, 42]);
        assert_eq!(snap.lane(1), &[-128, 42]);
        assert_eq!(snap.lane(2), &[127, 42]);
        assert_eq!(snap.lane(3), &[-1, 42]);
    }

    #[tokio::test]
    async fn test_snapshot_shapes() {
        let mut adc = Adc16::new(MockBoard::new(tagged));
        for n in [1, 1024] {
            let snaps = adc.snapshot(&[Chip::C, Chip::A], n).await.unwrap();
            assert_eq!(snaps.len(), 2);
            assert_eq!(snaps[0].chip, Chip::C);
            assert_eq!(snaps[1].chip, Chip::A);
            for snap in &snaps {
                assert_eq!(snap.samples, n);
                for lane in 0..LANES {
                    assert_eq!(snap.lane(lane).len(), n);
                    for (i, &s) in snap.lane(lane).iter().enumerate() {
                        let raw = ((snap.chip.index() << 6) | (lane << 4) | (i & 0xf)) as u8;
                        assert_eq!(s, to_signed(raw));
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_snapshot_clamps() {
        let mut adc = Adc16::new(MockBoard::new(tagged));
        assert_eq!(adc.snapshot_one(Chip::D, 0).await.unwrap().samples, 1);
        let snap = adc.snapshot_one(Chip::D, 5000).await.unwrap();
        assert_eq!(snap.samples, 1024);
        assert_eq!(snap.lane(3).len(), 1024);
    }

    #[tokio::test]
    async fn test_trigger_is_global() {
        let mut adc = Adc16::new(MockBoard::new(tagged));
        adc.snapshot(&[Chip::B], 16).await.unwrap();
        let board = adc.into_inner();
        assert_eq!(board.writes_to(CONTROL), vec![0, 1, 0]);
        assert_eq!(board.triggers, 1);
        // All four buffers latched even though only one was read
        assert!(board.captures.iter().all(|c| c.len() == 1024));
    }
}
