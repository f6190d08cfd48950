//! cpu-monitor
//!
//! Shows host CPU load as an LED bar on a USB2LPT adapter's data port.
//! The adapter can be plugged in and out while the monitor runs.

use adapter::LptAdapter;
use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use monitor::config::{self, MonitorConfig};
use monitor::{LoadDriver, ProcStatSampler};
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cpu-monitor")]
#[command(author, version, about = "Show CPU load on a USB2LPT adapter's LEDs")]
#[command(long_about = "
Samples host CPU load and lights one more data line of a USB2LPT
parallel-port adapter for every 12.5% of load.

EXAMPLES:
    # Run with default config
    cpu-monitor

    # Sample faster with debug logging
    cpu-monitor --interval-ms 100 --log-level debug

    # Drive an adapter with a different vendor id
    cpu-monitor --vendor-id 0x16c0

CONFIGURATION:
    The monitor looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/usb2lpt/monitor.toml
    3. /etc/usb2lpt/monitor.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Sample interval in milliseconds
    #[arg(short, long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// USB vendor id of the adapter (decimal or 0x hex)
    #[arg(long, value_name = "ID", value_parser = common::parse_u16)]
    vendor_id: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = MonitorConfig::default();
        let path = MonitorConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(ref path) = args.config {
        config::load_config(path).context("Failed to load configuration")?
    } else {
        MonitorConfig::load_or_default()
    };

    // Command line wins over the config file
    if let Some(level) = args.log_level {
        config.monitor.log_level = level;
    }
    if let Some(interval) = args.interval_ms {
        config.monitor.sample_interval_ms = interval;
    }
    if let Some(vendor_id) = args.vendor_id {
        config.adapter.vendor_id = vendor_id;
    }
    config.validate().context("Invalid configuration")?;

    setup_logging(&config.monitor.log_level).context("Failed to setup logging")?;

    info!("cpu-monitor v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", config.monitor.log_level);

    let sampler = ProcStatSampler::new(&config.monitor.stat_path)
        .context("Failed to initialize CPU sampler")?;
    let adapter =
        LptAdapter::open(config.adapter_options()).context("Failed to initialize adapter")?;
    match adapter.identity() {
        Some(identity) => info!("Using adapter {}", identity),
        None => info!(
            "No adapter with vendor id {:04x} yet, will keep looking",
            config.adapter.vendor_id
        ),
    }

    let mut driver = LoadDriver::new(sampler, adapter).clear_on_exit(config.monitor.clear_on_exit);

    info!(
        "Sampling every {} ms, press Ctrl+C to stop",
        config.monitor.sample_interval_ms
    );

    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
            Err(e) => error!("Error waiting for Ctrl+C: {}", e),
        }
    };

    let result = monitor::run(&mut driver, config.sample_interval(), shutdown).await;
    if let Err(ref e) = result {
        error!("Monitor stopped: {:#}", e);
    }

    info!("Monitor shutdown complete");
    result
}
