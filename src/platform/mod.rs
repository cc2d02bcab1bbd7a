//! Per-OS implementations of the load accessors.
//!
//! Exactly one implementation is compiled in and exported as [`Native`]:
//! procfs on Linux and Android, sysctl on FreeBSD. Any other target is a
//! build error.

use crate::error::Result;
use crate::sample::{CpuSample, MemSwapSample, UptimeSeconds};

/// What every platform has to provide.
pub trait SystemLoad {
    /// Seconds since boot.
    fn uptime(&self) -> Result<UptimeSeconds>;

    /// Cumulative busy/total CPU ticks since boot. Not a rate: callers
    /// sample twice and diff.
    fn cpuload(&self) -> Result<CpuSample>;

    /// Memory and swap usage in kilobytes.
    fn memswap(&self) -> Result<MemSwapSample>;
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod procfs;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use self::procfs::Procfs as Native;

#[cfg(target_os = "freebsd")]
pub mod sysctl;
#[cfg(target_os = "freebsd")]
pub use self::sysctl::Sysctl as Native;

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
compile_error!("sysload supports Linux, Android and FreeBSD only");

/// Splits a kernel tick array into busy/total given the index of the idle slot.
#[cfg_attr(any(target_os = "linux", target_os = "android"), allow(dead_code))]
pub(crate) fn ticks_to_sample(ticks: &[u64], idle_slot: usize) -> CpuSample {
    let total = ticks.iter().fold(0u64, |acc, t| acc.saturating_add(*t));
    let idle = ticks.get(idle_slot).copied().unwrap_or(0);
    CpuSample {
        used: total.saturating_sub(idle),
        total,
    }
}

#[cfg_attr(any(target_os = "linux", target_os = "android"), allow(dead_code))]
pub(crate) fn pages_to_kb(pages: u64, page_size: u64) -> u64 {
    pages.saturating_mul(page_size) / 1024
}

/// Seconds between the boot timestamp and `now`, zero if the clock is
/// behind the boot time.
#[cfg_attr(any(target_os = "linux", target_os = "android"), allow(dead_code))]
pub(crate) fn uptime_from_boot(now_secs: u64, boot_secs: i64) -> UptimeSeconds {
    let boot = u64::try_from(boot_secs).unwrap_or(0);
    now_secs.saturating_sub(boot)
}

/// Builds a sample from page counts. Inactive pages count as free memory.
/// `swap` is `(used, total)` in pages, `None` when swap could not be read.
#[cfg_attr(any(target_os = "linux", target_os = "android"), allow(dead_code))]
pub(crate) fn memswap_from_pages(
    total: u64,
    free: u64,
    inactive: u64,
    page_size: u64,
    swap: Option<(u64, u64)>,
) -> MemSwapSample {
    let mem_total_kb = pages_to_kb(total, page_size);
    let reclaimable_kb =
        pages_to_kb(free, page_size).saturating_add(pages_to_kb(inactive, page_size));
    let (swap_used, swap_total) = swap.unwrap_or((0, 0));

    MemSwapSample {
        mem_used_kb: mem_total_kb.saturating_sub(reclaimable_kb),
        mem_total_kb,
        swap_used_kb: pages_to_kb(swap_used, page_size),
        swap_total_kb: pages_to_kb(swap_total, page_size),
    }
}
