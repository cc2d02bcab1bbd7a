//! Kernel parameter queries through `sysctl(3)`.
//!
//! A parameter is addressed either by a MIB path (`[CTL_KERN, KERN_BOOTTIME]`)
//! or by its dotted name (`kern.cp_time`). [`query`] asks the kernel how big the
//! value is before fetching it, for parameters whose size is only known at
//! runtime. [`query_as`] fetches straight into a fixed-size scalar.
//!
//! Both go through a [`SysctlBackend`], so the protocol itself can be
//! exercised without a sysctl-capable kernel.

use crate::error::{PlatformError, QueryKind, Result};
use libc::c_int;
use std::mem::{self, MaybeUninit};
use std::slice;
use tracing::debug;

/// Address of a kernel parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelQuery<'a> {
    /// Numeric path into the kernel's parameter tree
    Mib(&'a [c_int]),
    /// Dotted symbolic name
    Name(&'a str),
}

impl KernelQuery<'_> {
    pub fn kind(&self) -> QueryKind {
        match self {
            KernelQuery::Mib(_) => QueryKind::Sysctl,
            KernelQuery::Name(_) => QueryKind::SysctlByName,
        }
    }
}

/// Raw access to kernel parameters.
///
/// `read` follows the `sysctl(3)` calling convention: with `buf` set to
/// `None` it only stores the size the value needs in `len`; otherwise it
/// copies the value into `buf` and stores the number of bytes written in
/// `len`. Failures return the errno observed right after the call.
pub trait SysctlBackend {
    fn read(
        &self,
        key: KernelQuery<'_>,
        buf: Option<&mut [u8]>,
        len: &mut usize,
    ) -> std::result::Result<(), i32>;
}

impl<B: SysctlBackend + ?Sized> SysctlBackend for &B {
    fn read(
        &self,
        key: KernelQuery<'_>,
        buf: Option<&mut [u8]>,
        len: &mut usize,
    ) -> std::result::Result<(), i32> {
        (**self).read(key, buf, len)
    }
}

/// Plain-old-data types a kernel value can be copied into.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` or primitive, contain no padding that
/// is read back, and accept any bit pattern (including all zeroes).
pub unsafe trait KernelScalar: Copy {}

unsafe impl KernelScalar for i32 {}
unsafe impl KernelScalar for u32 {}
unsafe impl KernelScalar for i64 {}
unsafe impl KernelScalar for u64 {}
unsafe impl KernelScalar for libc::timeval {}
unsafe impl<T: KernelScalar, const N: usize> KernelScalar for [T; N] {}

fn check_name(key: KernelQuery<'_>) -> Result<()> {
    match key {
        KernelQuery::Name(name) if name.is_empty() || name.contains('\0') => {
            Err(PlatformError::InvalidName(name.to_string()))
        }
        _ => Ok(()),
    }
}

fn kernel_error(key: KernelQuery<'_>, code: i32) -> PlatformError {
    debug!(?key, code, "kernel parameter read failed");
    PlatformError::Kernel {
        call: key.kind(),
        code,
    }
}

/// Reads a parameter of unknown size: probe the size, allocate exactly that
/// many bytes, then fetch. The returned buffer is trimmed to what the kernel
/// actually wrote.
pub fn query<B: SysctlBackend + ?Sized>(backend: &B, key: KernelQuery<'_>) -> Result<Vec<u8>> {
    check_name(key)?;

    let mut len = 0usize;
    backend
        .read(key, None, &mut len)
        .map_err(|code| kernel_error(key, code))?;

    let mut buf = vec![0u8; len];
    backend
        .read(key, Some(buf.as_mut_slice()), &mut len)
        .map_err(|code| kernel_error(key, code))?;
    buf.truncate(len);

    Ok(buf)
}

/// Reads a parameter of known type in a single call.
pub fn query_as<T, B>(backend: &B, key: KernelQuery<'_>) -> Result<T>
where
    T: KernelScalar,
    B: SysctlBackend + ?Sized,
{
    check_name(key)?;

    let size = mem::size_of::<T>();
    let mut value = MaybeUninit::<T>::zeroed();
    // SAFETY: the storage is zero-initialized and exactly `size` bytes long.
    let bytes = unsafe { slice::from_raw_parts_mut(value.as_mut_ptr().cast::<u8>(), size) };

    let mut len = size;
    backend
        .read(key, Some(bytes), &mut len)
        .map_err(|code| kernel_error(key, code))?;

    if len < size {
        return Err(PlatformError::ShortRead {
            call: key.kind(),
            expected: size,
            actual: len,
        });
    }

    // SAFETY: `T: KernelScalar` accepts any bit pattern.
    Ok(unsafe { value.assume_init() })
}

#[cfg(target_os = "freebsd")]
pub use self::native::{sysctl, sysctl_as, sysctlbyname, sysctlbyname_as, Libc};

#[cfg(target_os = "freebsd")]
mod native {
    use super::{query, query_as, KernelQuery, KernelScalar, SysctlBackend};
    use crate::error::Result;
    use libc::{c_int, c_uint, c_void, size_t};
    use std::io;
    use std::ptr;

    /// The C library's `sysctl(3)` family.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct Libc;

    fn last_errno(status: c_int) -> i32 {
        io::Error::last_os_error().raw_os_error().unwrap_or(status)
    }

    fn by_name(name: &str, old: *mut c_void, len: *mut size_t) -> std::result::Result<(), i32> {
        let name = std::ffi::CString::new(name).map_err(|_| libc::EINVAL)?;
        let status = unsafe { libc::sysctlbyname(name.as_ptr(), old, len, ptr::null(), 0) };
        if status != 0 {
            return Err(last_errno(status));
        }
        Ok(())
    }

    impl SysctlBackend for Libc {
        fn read(
            &self,
            key: KernelQuery<'_>,
            buf: Option<&mut [u8]>,
            len: &mut usize,
        ) -> std::result::Result<(), i32> {
            let old = match buf {
                Some(buf) => {
                    *len = buf.len();
                    buf.as_mut_ptr().cast::<c_void>()
                }
                None => ptr::null_mut(),
            };

            match key {
                KernelQuery::Mib(mib) => {
                    let status = unsafe {
                        libc::sysctl(
                            mib.as_ptr(),
                            mib.len() as c_uint,
                            old,
                            len as *mut usize as *mut size_t,
                            ptr::null_mut(),
                            0,
                        )
                    };
                    if status != 0 {
                        return Err(last_errno(status));
                    }
                    Ok(())
                }
                KernelQuery::Name(name) => by_name(name, old, len as *mut usize as *mut size_t),
            }
        }
    }

    pub fn sysctl(mib: &[c_int]) -> Result<Vec<u8>> {
        query(&Libc, KernelQuery::Mib(mib))
    }

    pub fn sysctl_as<T: KernelScalar>(mib: &[c_int]) -> Result<T> {
        query_as(&Libc, KernelQuery::Mib(mib))
    }

    pub fn sysctlbyname(name: &str) -> Result<Vec<u8>> {
        query(&Libc, KernelQuery::Name(name))
    }

    pub fn sysctlbyname_as<T: KernelScalar>(name: &str) -> Result<T> {
        query_as(&Libc, KernelQuery::Name(name))
    }
}
