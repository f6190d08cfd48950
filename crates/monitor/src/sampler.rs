//! CPU load sampling from `/proc/stat`
//!
//! The aggregate `cpu` line holds cumulative jiffies per state:
//!
//! ```text
//! cpu  user nice system idle iowait irq softirq steal guest guest_nice
//! ```
//!
//! Load over an interval is the share of non-idle jiffies between two reads.
//! `guest` and `guest_nice` are already counted in `user` and `nice`.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Source of CPU load percentages
pub trait LoadSampler {
    /// Load since the previous call, in percent within `[0, 100]`
    fn sample(&mut self) -> Result<f64>;
}

/// Cumulative jiffy counters from one read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

impl CpuTimes {
    /// Parse the aggregate `cpu` line
    pub fn parse(line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("cpu") => {}
            other => return Err(anyhow!("Expected aggregate cpu line, got {:?}", other)),
        }

        let values = fields
            .take(8)
            .map(|f| {
                f.parse::<u64>()
                    .with_context(|| format!("Invalid cpu counter '{}'", f))
            })
            .collect::<Result<Vec<u64>>>()?;

        // user nice system idle are mandatory on every kernel
        if values.len() < 4 {
            return Err(anyhow!(
                "cpu line has {} counters, expected at least 4",
                values.len()
            ));
        }

        let total: u64 = values.iter().sum();
        let idle = values[3] + values.get(4).copied().unwrap_or(0);
        Ok(Self {
            busy: total.saturating_sub(idle),
            total,
        })
    }

    /// Percentage of busy time between `earlier` and `self`
    pub fn load_since(&self, earlier: &CpuTimes) -> f64 {
        let total = self.total.saturating_sub(earlier.total);
        if total == 0 {
            return 0.0;
        }
        let busy = self.busy.saturating_sub(earlier.busy);
        (100.0 * busy as f64 / total as f64).clamp(0.0, 100.0)
    }
}

/// Number of per-CPU lines (`cpu0`, `cpu1`, ...) in a stat file
pub fn count_cpus(stat: &str) -> usize {
    stat.lines()
        .filter(|line| {
            line.strip_prefix("cpu")
                .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        })
        .count()
}

/// Sampler over the kernel's cumulative CPU counters
#[derive(Debug)]
pub struct ProcStatSampler {
    path: PathBuf,
    last: CpuTimes,
}

impl ProcStatSampler {
    /// Open the stat file and take the baseline reading
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = read_stat(&path)?;
        let last = parse_aggregate(&content)?;

        info!("Sampling {} CPU(s) from {}", count_cpus(&content), path.display());
        Ok(Self { path, last })
    }
}

impl LoadSampler for ProcStatSampler {
    fn sample(&mut self) -> Result<f64> {
        let now = parse_aggregate(&read_stat(&self.path)?)?;
        let load = now.load_since(&self.last);
        self.last = now;
        Ok(load)
    }
}

fn read_stat(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn parse_aggregate(content: &str) -> Result<CpuTimes> {
    let line = content
        .lines()
        .next()
        .ok_or_else(|| anyhow!("CPU stat file is empty"))?;
    CpuTimes::parse(line)
}
