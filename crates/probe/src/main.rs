//! lpt-probe
//!
//! Pokes USB2LPT adapter registers from the command line and prints one
//! comma-separated result per operation.

mod ops;

use adapter::{AdapterOptions, LptAdapter, VENDOR_ID};
use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use ops::{ProbeOp, execute_all, format_results};
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "lpt-probe")]
#[command(author, version, about = "Read and write USB2LPT adapter registers")]
#[command(long_about = "
Runs register operations against a USB2LPT adapter in order and prints
the results as one comma-separated line.

OPERATIONS:
    out:A:V     write value V to register A
    in:A        read register A
    count       write 0..=255 to the data register
    reset       reset the adapter's USB port
    sleep:MS    pause for MS milliseconds

EXAMPLES:
    # Light every data line, then read the status register
    lpt-probe out:0:0xff in:1

    # Blink
    lpt-probe out:0:0xff sleep:500 out:0:0
")]
struct Args {
    /// Operations to run, in order
    #[arg(required = true, value_name = "OP")]
    ops: Vec<ProbeOp>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// USB vendor id of the adapter (decimal or 0x hex)
    #[arg(long, value_name = "ID", value_parser = common::parse_u16, default_value_t = VENDOR_ID)]
    vendor_id: u16,

    /// Per bulk transfer timeout in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    timeout_ms: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level).context("Failed to setup logging")?;

    let options = AdapterOptions {
        vendor_id: args.vendor_id,
        transfer_timeout: Duration::from_millis(args.timeout_ms),
    };
    let mut lpt = LptAdapter::open(options).context("Failed to initialize adapter")?;
    if let Some(identity) = lpt.identity() {
        info!("Using adapter {}", identity);
    }

    let results = execute_all(&mut lpt, &args.ops).context("Probe operation failed")?;
    println!("{}", format_results(&results));

    lpt.close();
    Ok(())
}
