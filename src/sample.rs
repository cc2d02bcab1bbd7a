//! Values returned by the accessors. Every call builds a fresh one.

use serde::{Deserialize, Serialize};

/// Seconds since boot.
pub type UptimeSeconds = u64;

/// Cumulative CPU tick counters since boot.
///
/// A single sample says nothing about current load. Take two samples some
/// time apart and compare them with [`CpuSample::utilization_since`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSample {
    /// Ticks spent in any non-idle state
    pub used: u64,
    /// Ticks spent in all states
    pub total: u64,
}

impl CpuSample {
    /// Busy fraction (0.0 to 1.0) between `earlier` and this sample, or
    /// `None` if no ticks elapsed in between.
    pub fn utilization_since(&self, earlier: &CpuSample) -> Option<f64> {
        let total_delta = self.total.saturating_sub(earlier.total);
        if total_delta == 0 {
            return None;
        }
        let used_delta = self.used.saturating_sub(earlier.used);
        Some((used_delta as f64 / total_delta as f64).min(1.0))
    }
}

impl From<CpuSample> for (u64, u64) {
    fn from(sample: CpuSample) -> Self {
        (sample.used, sample.total)
    }
}

/// Memory and swap usage, all in kilobytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemSwapSample {
    pub mem_used_kb: u64,
    pub mem_total_kb: u64,
    pub swap_used_kb: u64,
    pub swap_total_kb: u64,
}

impl From<MemSwapSample> for (u64, u64, u64, u64) {
    fn from(s: MemSwapSample) -> Self {
        (s.mem_used_kb, s.mem_total_kb, s.swap_used_kb, s.swap_total_kb)
    }
}
