//! Load-to-LED driver
//!
//! Every tick samples CPU load, turns it into a bar mask and writes that mask
//! to the adapter's data register. The adapter may come and go at any time;
//! an absent adapter is simply skipped until it shows up again.

use crate::sampler::LoadSampler;
use adapter::{LptAdapter, Outcome, UsbBackend};
use anyhow::{Context, Result};
use protocol::Register;
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Load percentage covered by one LED
pub const LEVEL_STEP: f64 = 12.5;

/// Number of LEDs on the data port
pub const MAX_LEVEL: u32 = 8;

/// Number of lit LEDs for a load percentage
pub fn load_level(percent: f64) -> u32 {
    // NaN fails this comparison too
    if !(percent > 0.0) {
        return 0;
    }
    (percent / LEVEL_STEP).floor().min(MAX_LEVEL as f64) as u32
}

/// Bar mask for a load percentage: the lowest `load_level` bits set
pub fn mask_for_load(percent: f64) -> u8 {
    let level = load_level(percent);
    if level >= MAX_LEVEL {
        0xff
    } else {
        ((1u16 << level) - 1) as u8
    }
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub load: f64,
    pub mask: u8,
    /// Whether the mask reached the adapter
    pub delivered: bool,
}

/// Couples a load sampler with the adapter
pub struct LoadDriver<S, B: UsbBackend> {
    sampler: S,
    adapter: LptAdapter<B>,
    clear_on_exit: bool,
}

impl<S: LoadSampler, B: UsbBackend> LoadDriver<S, B> {
    pub fn new(sampler: S, adapter: LptAdapter<B>) -> Self {
        Self {
            sampler,
            adapter,
            clear_on_exit: true,
        }
    }

    /// Whether [`run`] turns the LEDs off after a clean shutdown
    pub fn clear_on_exit(mut self, clear: bool) -> Self {
        self.clear_on_exit = clear;
        self
    }

    pub fn adapter(&self) -> &LptAdapter<B> {
        &self.adapter
    }

    /// Sample once and show the result
    pub fn tick(&mut self) -> Result<TickReport> {
        let load = self.sampler.sample().context("Failed to sample CPU load")?;
        let mask = mask_for_load(load);

        self.adapter
            .look_for_device()
            .context("Failed to look for adapter")?;
        let outcome = self
            .adapter
            .write_one(Register::Data, mask)
            .context("Failed to write LED mask")?;

        debug!("load {:5.1}% -> mask {:#04x}", load, mask);
        Ok(TickReport {
            load,
            mask,
            delivered: outcome.is_delivered(),
        })
    }

    /// Turn all LEDs off
    pub fn clear(&mut self) -> Result<Outcome<()>> {
        self.adapter
            .write_one(Register::Data, 0)
            .context("Failed to clear LEDs")
    }
}

impl<S, B: UsbBackend> std::fmt::Debug for LoadDriver<S, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadDriver")
            .field("adapter", &self.adapter)
            .field("clear_on_exit", &self.clear_on_exit)
            .finish_non_exhaustive()
    }
}

/// Tick `driver` every `period` until `shutdown` resolves or a tick fails
///
/// Ticks never overlap: a slow tick pushes the next one back. After a clean
/// shutdown the LEDs are cleared if the driver asks for it.
pub async fn run<S, B, F>(driver: &mut LoadDriver<S, B>, period: Duration, shutdown: F) -> Result<()>
where
    S: LoadSampler,
    B: UsbBackend,
    F: Future<Output = ()>,
{
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut was_delivered = None;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping monitor loop");
                break;
            }
            _ = ticker.tick() => {
                let report = driver.tick()?;
                if was_delivered != Some(report.delivered) {
                    if report.delivered {
                        info!("Showing CPU load on the adapter");
                    } else {
                        info!("Adapter not present, waiting for it");
                    }
                    was_delivered = Some(report.delivered);
                }
            }
        }
    }

    if driver.clear_on_exit {
        match driver.clear() {
            Ok(Outcome::Delivered(())) => debug!("LEDs cleared"),
            Ok(Outcome::DeviceAbsent) => {}
            Err(e) => warn!("Failed to clear LEDs on exit: {:#}", e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mask_boundaries() {
        assert_eq!(mask_for_load(0.0), 0x00);
        assert_eq!(mask_for_load(12.4), 0x00);
        assert_eq!(mask_for_load(12.5), 0x01);
        assert_eq!(mask_for_load(30.0), 0x03);
        assert_eq!(mask_for_load(50.0), 0x0f);
        assert_eq!(mask_for_load(87.5), 0x7f);
        assert_eq!(mask_for_load(99.9), 0x7f);
        assert_eq!(mask_for_load(100.0), 0xff);
    }

    #[test]
    fn test_mask_out_of_range_input() {
        assert_eq!(mask_for_load(-5.0), 0);
        assert_eq!(mask_for_load(f64::NAN), 0);
        assert_eq!(mask_for_load(250.0), 0xff);
        assert_eq!(mask_for_load(f64::INFINITY), 0xff);
    }

    proptest! {
        #[test]
        fn prop_mask_is_contiguous_bar(percent in 0.0f64..=100.0) {
            let mask = mask_for_load(percent);
            // Low bits only, no gaps
            prop_assert_eq!(mask & mask.wrapping_add(1), 0);
            prop_assert_eq!(mask.count_ones(), load_level(percent));
        }

        #[test]
        fn prop_mask_is_monotonic(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(mask_for_load(lo) <= mask_for_load(hi));
        }
    }
}
