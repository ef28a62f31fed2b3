//! Link calibration: delay taps to center every lane in its data eye, then bit-slips to line
//! up the frame boundaries of every chip

use crate::{
    chip::{Chip, LANES},
    controller::{wrap_tap, Adc16, ALL_LANES, TAPS},
    error::Result,
    hmcad1511::TestPattern,
    snapshot::{to_signed, MAX_SAMPLES},
    transport::Transport,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Byte seen on every lane while the deskew pattern is on
pub const DESKEW_EXPECTED: u8 = 0x2a;
/// Byte seen on every lane while the sync pattern is on and the frame is aligned
pub const SYNC_EXPECTED: u8 = 0x70;
/// Bit-slip attempts before giving up on a chip
pub const MAX_BITSLIPS: usize = 8;

/// Mismatches of one lane at one tap, split over even and odd samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaneErrors {
    pub even: usize,
    pub odd: usize,
}

impl LaneErrors {
    fn count(samples: &[i8], expected: i8) -> Self {
        let mut errors = Self::default();
        for (i, &s) in samples.iter().enumerate() {
            if s != expected {
                if i % 2 == 0 {
                    errors.even += 1;
                } else {
                    errors.odd += 1;
                }
            }
        }
        errors
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.even == 0 && self.odd == 0
    }
}

/// Result of sweeping the delay taps of one chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapScan {
    pub chip: Chip,
    /// Taps with no errors, per lane, in sweep order
    pub good_taps: [Vec<u8>; LANES],
    /// Errors per lane, indexed by tap
    pub errors: [Vec<LaneErrors>; LANES],
    /// Tap each lane was left on, `None` when it had no good taps and wasn't touched
    pub selected: [Option<u8>; LANES],
}

impl TapScan {
    fn new(chip: Chip) -> Self {
        Self {
            chip,
            good_taps: Default::default(),
            errors: Default::default(),
            selected: [None; LANES],
        }
    }
}

/// Picks the middle of a lane's good taps.
///
/// A set spanning more than half the delay line is taken to be one window wrapping past tap 31,
/// so the low taps are moved up by 32 to make it contiguous before picking. A lane that is good
/// on every tap has no window edges at all and just gets the middle of the line.
#[must_use]
pub fn select_tap(good: &[u8]) -> Option<u8> {
    let min = *good.iter().min()?;
    let max = *good.iter().max()?;
    let mut taps = good.to_vec();
    if max - min > TAPS / 2 && taps.len() < usize::from(TAPS) {
        for t in &mut taps {
            if *t < TAPS / 2 {
                *t += TAPS;
            }
        }
        taps.sort_unstable();
    }
    Some(wrap_tap(taps[taps.len() / 2]))
}

impl<T> Adc16<T>
where
    T: Transport,
{
    /// Sweeps every delay tap of `chip` against the deskew pattern, then leaves each lane at the
    /// middle of its error-free window. The chips must already be putting out the deskew pattern.
    ///
    /// A lane without any good tap keeps whatever tap the sweep left it on.
    /// # Errors
    /// Returns an error on bad transport
    pub async fn calibrate_taps(&mut self, chip: Chip, expected: u8) -> Result<TapScan> {
        let expected = to_signed(expected);
        let mut scan = TapScan::new(chip);
        for tap in 0..TAPS {
            self.delay_tap(chip, tap, ALL_LANES).await?;
            let snap = self.snapshot_one(chip, MAX_SAMPLES).await?;
            let errors: [LaneErrors; LANES] =
                std::array::from_fn(|lane| LaneErrors::count(snap.lane(lane), expected));
            for (lane, errors) in errors.iter().enumerate() {
                if errors.is_clean() {
                    scan.good_taps[lane].push(tap);
                }
                scan.errors[lane].push(*errors);
            }
            debug!(%chip, tap, ?errors, "Tap swept");
        }
        for lane in 0..LANES {
            match select_tap(&scan.good_taps[lane]) {
                Some(tap) => {
                    self.delay_tap(chip, tap, 1 << lane).await?;
                    scan.selected[lane] = Some(tap);
                }
                None => warn!(%chip, lane, "No good delay taps, leaving the lane alone"),
            }
        }
        info!(%chip, selected = ?scan.selected, "Delay taps calibrated");
        Ok(scan)
    }

    /// First sample of lane 0
    async fn frame_sample(&mut self, chip: Chip) -> Result<i8> {
        let snap = self.snapshot_one(chip, 1).await?;
        Ok(snap.lane(0)[0])
    }

    /// Bit-slips each of `chips` until it reads back `expected` under the sync pattern, giving up
    /// after [`MAX_BITSLIPS`] slips. The chips must already be putting out the sync pattern.
    /// # Errors
    /// Returns an error on bad transport
    pub async fn synchronize(
        &mut self,
        chips: &[Chip],
        expected: u8,
    ) -> Result<BTreeMap<Chip, bool>> {
        let expected = to_signed(expected);
        let mut status = BTreeMap::new();
        for &chip in chips {
            for slip in 0..MAX_BITSLIPS {
                let sample = self.frame_sample(chip).await?;
                if sample == expected {
                    break;
                }
                debug!(%chip, slip, sample, "Frame not aligned, slipping");
                self.bitslip(&[chip]).await?;
            }
            let locked = self.frame_sample(chip).await? == expected;
            if locked {
                info!(%chip, "Frame aligned");
            } else {
                warn!(%chip, "Couldn't align frame");
            }
            status.insert(chip, locked);
        }
        Ok(status)
    }

    /// Full link calibration of all four chips: deskew every lane, then align every frame.
    /// Returns which chips ended up synchronized. A chip failing doesn't stop the others.
    /// # Errors
    /// Returns an error on bad transport
    pub async fn calibrate(&mut self, deskew_expected: u8, sync_expected: u8) -> Result<[bool; 4]> {
        self.set_pattern(TestPattern::Deskew).await?;
        for chip in Chip::ALL {
            self.calibrate_taps(chip, deskew_expected).await?;
        }
        self.set_pattern(TestPattern::Sync).await?;
        let status = self.synchronize(&Chip::ALL, sync_expected).await?;
        Ok(Chip::ALL.map(|chip| status.get(&chip).copied().unwrap_or(false)))
    }
}
