mod api;
mod args;
mod handlers;

use adc16ctl::{Adc16, ChannelName, Chip, TapScan, CONTROLLER, LANES};
use anyhow::bail;
use clap::Parser;
use katcp::prelude::*;
use std::{collections::BTreeMap, net::SocketAddr};
use tokio::{net::TcpStream, sync::mpsc::unbounded_channel, task};
use tracing::{debug, info, Level};

use api::*;
use args::*;
use handlers::*;

/// Refuse designs that don't have the ADC16 controller in them
fn require_controller(devices: &[String]) -> anyhow::Result<()> {
    if !devices.iter().any(|dev| dev == CONTROLLER) {
        bail!("Design doesn't have an `{CONTROLLER}` device, is this an ADC16 design?");
    }
    debug!(devices = devices.len(), "Found `{CONTROLLER}`");
    Ok(())
}

fn print_scan(scan: &TapScan) {
    println!("Chip {} delay taps (even/odd errors, * is good)", scan.chip);
    for tap in 0..scan.errors[0].len() {
        let row: Vec<String> = (0..LANES)
            .map(|lane| {
                let errors = scan.errors[lane][tap];
                let mark = if errors.is_clean() { '*' } else { ' ' };
                format!("{:>5}/{:<5}{mark}", errors.even, errors.odd)
            })
            .collect();
        println!("{tap:>3}  {}", row.join(" "));
    }
    for (lane, selected) in scan.selected.iter().enumerate() {
        match selected {
            Some(tap) => println!("{}{}: tap {tap}", scan.chip, lane + 1),
            None => println!("{}{}: no good taps", scan.chip, lane + 1),
        }
    }
}

/// Print the requested channels as columns, grouping them by chip so each chip is read once
async fn print_snap(
    adc: &mut Adc16<State>,
    chans: Vec<ChannelName>,
    length: usize,
) -> anyhow::Result<()> {
    let chans = if chans.is_empty() {
        Chip::ALL
            .iter()
            .flat_map(|&chip| (0..LANES).map(move |lane| ChannelName { chip, lane }))
            .collect()
    } else {
        chans
    };
    let mut chip_chans: BTreeMap<Chip, Vec<usize>> = BTreeMap::new();
    for chan in &chans {
        chip_chans.entry(chan.chip).or_default().push(chan.lane);
    }
    let chips: Vec<Chip> = chip_chans.keys().copied().collect();
    let snaps = adc.snapshot(&chips, length).await?;
    let columns: Vec<(ChannelName, &[i8])> = snaps
        .iter()
        .flat_map(|snap| {
            chip_chans[&snap.chip].iter().map(move |&lane| {
                (
                    ChannelName {
                        chip: snap.chip,
                        lane,
                    },
                    snap.lane(lane),
                )
            })
        })
        .collect();
    let header: Vec<String> = columns.iter().map(|(name, _)| format!("{name:>5}")).collect();
    println!("{}", header.join(""));
    let samples = snaps.first().map_or(0, |snap| snap.samples);
    for i in 0..samples {
        let row: Vec<String> = columns
            .iter()
            .map(|(_, lane)| format!("{:>5}", lane[i]))
            .collect();
        println!("{}", row.join(""));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Grab the command line arguments
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();
    debug!("Logging started");
    // Create the channels
    let (tx, rx) = unbounded_channel::<Message>();
    // Connect to the katcp server
    let (reader, writer) = TcpStream::connect(SocketAddr::new(args.address, args.port))
        .await?
        .into_split();
    // Dispatch async informs in the background
    task::spawn(handle_informs(tx, reader, make_inform_dispatchers()));
    let mut state = State {
        unhandled_incoming_messages: rx,
        writer,
    };
    ping(&mut state).await?;
    if !fpga_programmed(&mut state).await? {
        bail!("FPGA not programmed");
    }
    require_controller(&listdev(&mut state).await?)?;

    let mut adc = Adc16::new(state);
    adc.set_chip_select(args.chip_select);
    match args.command {
        Command::Calibrate { deskew, sync } => {
            let status = adc.calibrate(deskew, sync).await?;
            for (chip, ok) in Chip::ALL.iter().zip(status) {
                info!(%chip, synchronized = ok);
            }
            if !status.iter().all(|&ok| ok) {
                bail!("Not every chip synchronized: {status:?}");
            }
        }
        Command::Taps { chip, expected } => {
            let scan = adc.calibrate_taps(chip, expected).await?;
            print_scan(&scan);
        }
        Command::Sync { chips, expected } => {
            let chips = if chips.is_empty() {
                Chip::ALL.to_vec()
            } else {
                chips
            };
            for (chip, ok) in adc.synchronize(&chips, expected).await? {
                println!("{chip}: {}", if ok { "synchronized" } else { "FAILED" });
            }
        }
        Command::Snap { chans, length } => print_snap(&mut adc, chans, length).await?,
        Command::Pattern { pattern } => adc.set_pattern(pattern).await?,
        Command::Format {
            invert_msb,
            msb_first,
        } => adc.set_data_format(invert_msb, msb_first).await?,
        Command::Init => adc.adc_init().await?,
        Command::Setreg { addr, value } => adc.write_register(addr, value).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_controller() {
        let devices = vec!["sys_clkcounter".to_owned(), "adc16_controller".to_owned()];
        assert!(require_controller(&devices).is_ok());
        assert!(require_controller(&devices[..1]).is_err());
        assert!(require_controller(&[]).is_err());
    }
}
