//! Control and calibration of the ADC16 digitizer: four HMCAD1511 chips sitting behind the
//! `adc16_controller` register of a CASPER design.
//!
//! Everything goes through a [`Transport`], one register access at a time. The [`Adc16`] handle
//! owns that transport for the whole session, so register writes always reach the board in the
//! order they were issued.

pub mod calibrate;
pub mod chip;
pub mod controller;
pub mod error;
pub mod hmcad1511;
pub mod snapshot;
pub mod transport;
pub mod utils;

#[cfg(test)]
pub(crate) mod mock;

pub use calibrate::{LaneErrors, TapScan, DESKEW_EXPECTED, SYNC_EXPECTED};
pub use chip::{ChannelName, Chip, ChipSelect, LANES};
pub use controller::Adc16;
pub use error::{Error, Result};
pub use hmcad1511::TestPattern;
pub use snapshot::ChipSnapshot;
pub use transport::{Transport, CONTROLLER};
