//! CPU load monitor for the USB2LPT adapter
//!
//! Samples host CPU utilisation and shows it as a bar of LEDs on the
//! adapter's data port: one more lit line for every 12.5% of load.

pub mod config;
pub mod driver;
pub mod sampler;

pub use config::MonitorConfig;
pub use driver::{LoadDriver, TickReport, load_level, mask_for_load, run};
pub use sampler::{CpuTimes, LoadSampler, ProcStatSampler};
