use adc16ctl::{ChannelName, Chip, ChipSelect, TestPattern};
use clap::{Parser, Subcommand};
use std::net::IpAddr;

/// Parses `0x`, `0b` or decimal integers
fn parse_int(s: &str) -> Result<u32, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b") {
        u32::from_str_radix(bin, 2)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("`{s}` isn't a number: {e}"))
}

fn parse_byte(s: &str) -> Result<u8, String> {
    u8::try_from(parse_int(s)?).map_err(|_| format!("`{s}` doesn't fit in a byte"))
}

fn parse_word(s: &str) -> Result<u16, String> {
    u16::try_from(parse_int(s)?).map_err(|_| format!("`{s}` doesn't fit in 16 bits"))
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Deskew every lane, then bit-slip every chip into frame alignment
    Calibrate {
        /// Byte the deskew pattern should read back as
        #[arg(long, default_value = "0x2a", value_parser = parse_byte)]
        deskew: u8,
        /// Byte the sync pattern should read back as
        #[arg(long, default_value = "0x70", value_parser = parse_byte)]
        sync: u8,
    },
    /// Sweep the delay taps of one chip against the deskew pattern and print the errors
    Taps {
        chip: Chip,
        #[arg(long, default_value = "0x2a", value_parser = parse_byte)]
        expected: u8,
    },
    /// Bit-slip chips until they read back the sync pattern
    Sync {
        /// Chips to align [all]
        chips: Vec<Chip>,
        #[arg(long, default_value = "0x70", value_parser = parse_byte)]
        expected: u8,
    },
    /// Capture a snapshot and print it, one column per channel
    Snap {
        /// Which channels to print, like a1,b3 [all]
        #[arg(short, long, value_delimiter = ',')]
        chans: Vec<ChannelName>,
        /// Samples per channel (1-1024)
        #[arg(short, long, default_value_t = 100)]
        length: usize,
    },
    /// Select a test pattern (ramp, deskew, sync, custom, dual or none)
    Pattern { pattern: TestPattern },
    /// Set the output data format
    Format {
        /// Output two's complement instead of offset binary
        #[arg(long)]
        invert_msb: bool,
        /// Send the most significant bit first
        #[arg(long)]
        msb_first: bool,
    },
    /// Reset and power cycle the ADCs
    Init,
    /// Write a raw ADC register
    Setreg {
        #[arg(value_parser = parse_byte)]
        addr: u8,
        #[arg(value_parser = parse_word)]
        value: u16,
    },
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Args {
    /// Address of the board's tcpborphserver
    pub(crate) address: IpAddr,
    #[command(subcommand)]
    pub(crate) command: Command,
    /// Port of the katcp tcpborphserver
    #[arg(short, long, default_value_t = 7147)]
    pub(crate) port: u16,
    /// Chips that receive ADC register writes, as a 4-bit mask (bit 0 is chip A)
    #[arg(long, default_value = "0b1111")]
    pub(crate) chip_select: ChipSelect,
    /// Print all log messages and debug information
    #[arg(short, long)]
    pub(crate) verbose: bool,
}
