//! Load metrics from sysctl(3), plus libkvm for swap (FreeBSD).

use super::{memswap_from_pages, ticks_to_sample, uptime_from_boot, SystemLoad};
use crate::error::Result;
use crate::kernel;
use crate::sample::{CpuSample, MemSwapSample, UptimeSeconds};
use libc::{c_char, c_int, c_long, c_uint, c_void};
use std::ptr::NonNull;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// cp_time slots from <sys/resource.h>: user, nice, sys, intr, idle.
const CPUSTATES: usize = 5;
const CP_IDLE: usize = 4;

/// sysctl-backed accessors.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sysctl;

/// Page size in bytes, read once per process.
fn page_size() -> u64 {
    static PAGE_SIZE: OnceLock<u64> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        // SAFETY: sysconf has no preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as u64
        } else {
            4096
        }
    })
}

fn pages(name: &str) -> Result<u64> {
    kernel::sysctlbyname_as::<u32>(name).map(u64::from)
}

impl SystemLoad for Sysctl {
    fn uptime(&self) -> Result<UptimeSeconds> {
        let boot: libc::timeval = kernel::sysctl_as(&[libc::CTL_KERN, libc::KERN_BOOTTIME])?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(uptime_from_boot(now, boot.tv_sec.into()))
    }

    fn cpuload(&self) -> Result<CpuSample> {
        let raw: [c_long; CPUSTATES] = kernel::sysctlbyname_as("kern.cp_time")?;
        let ticks: Vec<u64> = raw.iter().map(|t| (*t).max(0) as u64).collect();
        Ok(ticks_to_sample(&ticks, CP_IDLE))
    }

    fn memswap(&self) -> Result<MemSwapSample> {
        let total = pages("vm.stats.vm.v_page_count")?;
        let free = pages("vm.stats.vm.v_free_count")?;
        let inactive = pages("vm.stats.vm.v_inactive_count")?;

        let swap = match KvmHandle::open() {
            Some(kd) => kd.swap_totals(),
            None => {
                warn!("kvm_open() failed, reporting zero swap");
                None
            }
        };

        Ok(memswap_from_pages(total, free, inactive, page_size(), swap))
    }
}

/// `struct kvm_swap` from <kvm.h>.
#[repr(C)]
#[derive(Clone, Copy)]
struct KvmSwap {
    ksw_devname: [c_char; 32],
    ksw_used: c_uint,
    ksw_total: c_uint,
    ksw_flags: c_int,
    ksw_reserved1: c_uint,
    ksw_reserved2: c_uint,
}

#[link(name = "kvm")]
extern "C" {
    fn kvm_open(
        execfile: *const c_char,
        corefile: *const c_char,
        swapfile: *const c_char,
        flags: c_int,
        errstr: *const c_char,
    ) -> *mut c_void;
    fn kvm_close(kd: *mut c_void) -> c_int;
    fn kvm_getswapinfo(
        kd: *mut c_void,
        info: *mut KvmSwap,
        maxswap: c_int,
        flags: c_int,
    ) -> c_int;
}

const DEV_NULL: &[u8] = b"/dev/null\0";
const ERR_PREFIX: &[u8] = b"kvm_open\0";

/// An open kvm descriptor, closed on drop.
struct KvmHandle(NonNull<c_void>);

impl KvmHandle {
    fn open() -> Option<Self> {
        let null = DEV_NULL.as_ptr().cast::<c_char>();
        // SAFETY: all arguments are NUL-terminated static strings.
        let kd = unsafe { kvm_open(null, null, null, libc::O_RDONLY, ERR_PREFIX.as_ptr().cast()) };
        NonNull::new(kd).map(KvmHandle)
    }

    /// `(used, total)` across all swap devices, in pages.
    fn swap_totals(&self) -> Option<(u64, u64)> {
        // SAFETY: KvmSwap is plain C data; all-zero is valid.
        let mut info: [KvmSwap; 1] = unsafe { std::mem::zeroed() };
        // SAFETY: the descriptor is open and `info` has room for one entry.
        let found = unsafe { kvm_getswapinfo(self.0.as_ptr(), info.as_mut_ptr(), 1, 0) };
        if found < 0 {
            debug!("kvm_getswapinfo() failed");
            return None;
        }
        Some((u64::from(info[0].ksw_used), u64::from(info[0].ksw_total)))
    }
}

impl Drop for KvmHandle {
    fn drop(&mut self) {
        // SAFETY: the descriptor came from kvm_open and is closed once.
        unsafe {
            kvm_close(self.0.as_ptr());
        }
    }
}
