//! Uptime, CPU load, memory and swap usage straight from the kernel.
//!
//! Linux and Android are read through procfs, FreeBSD through `sysctl(3)`
//! and libkvm. The backend is picked at build time and every call
//! reads live kernel state, nothing is cached.
//!
//! ```no_run
//! let first = sysload::cpuload()?;
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! let second = sysload::cpuload()?;
//! if let Some(busy) = second.utilization_since(&first) {
//!     println!("cpu {:.1}%", busy * 100.0);
//! }
//! # Ok::<(), sysload::PlatformError>(())
//! ```

pub mod error;
pub mod kernel;
pub mod platform;
pub mod sample;

pub use error::{PlatformError, QueryKind, Result};
pub use platform::{Native, SystemLoad};
pub use sample::{CpuSample, MemSwapSample, UptimeSeconds};

/// Seconds since boot.
pub fn uptime() -> Result<UptimeSeconds> {
    Native::default().uptime()
}

/// Cumulative busy/total CPU ticks since boot.
///
/// This is a counter, not a rate. To get the current load, call it twice
/// some time apart and use [`CpuSample::utilization_since`].
pub fn cpuload() -> Result<CpuSample> {
    Native::default().cpuload()
}

/// Memory and swap usage in kilobytes.
pub fn memswap() -> Result<MemSwapSample> {
    Native::default().memswap()
}
